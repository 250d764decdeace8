//! Streaming HTTP(S) transfer
//!
//! Builds a ureq agent per request so proxy and auth decisions are made for
//! the exact URL being fetched.

use super::proxy::{self, EnvLookup};
use super::progress::{ProgressObserver, TransferProgress};
use super::Credentials;
use crate::core::error::DownloadError;
use crate::core::output;
use base64::Engine;
use std::io::{Read, Write};
use std::time::Duration;
use url::Url;

/// Maximum number of redirects followed
const MAX_REDIRECTS: u32 = 10;

/// Read buffer for streaming the body
const BUFFER_SIZE: usize = 64 * 1024;

pub(crate) fn user_agent() -> String {
    format!(
        "distwrap/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// `Authorization` header value for HTTP basic auth.
pub(crate) fn basic_auth_header(credentials: &Credentials) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credentials.username, credentials.password
    ));
    format!("Basic {}", token)
}

/// Split userinfo out of a URL: the cleaned URL plus credentials, if any.
pub(crate) fn strip_userinfo(url: &Url) -> (Url, Option<Credentials>) {
    if url.username().is_empty() && url.password().is_none() {
        return (url.clone(), None);
    }

    let credentials = Credentials::new(
        percent_decode(url.username()),
        percent_decode(url.password().unwrap_or("")),
    );

    let mut clean = url.clone();
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    (clean, Some(credentials))
}

/// Decode `%XX` escapes as the URL parser leaves them in userinfo.
fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

/// Stream `url` into `out`, reporting to `observer`.
pub(crate) fn fetch(
    url: &Url,
    out: &mut impl Write,
    name: &str,
    credentials: Option<&Credentials>,
    timeout: Duration,
    observer: &dyn ProgressObserver,
    env: EnvLookup<'_>,
) -> Result<u64, DownloadError> {
    let (request_url, url_credentials) = strip_userinfo(url);
    let credentials = credentials.or(url_credentials.as_ref());
    let display_url = request_url.to_string();

    // Per connect and per read; a slow transfer that keeps receiving bytes never times out.
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .redirects(MAX_REDIRECTS)
        .redirect_auth_headers(ureq::RedirectAuthHeaders::SameHost)
        .user_agent(&user_agent());

    if let Some(proxy_url) = proxy::proxy_for(&request_url, env) {
        output::detail(&format!("using proxy {}", redact(&proxy_url)));
        let proxy = ureq::Proxy::new(&proxy_url).map_err(|e| DownloadError::Network {
            url: display_url.clone(),
            source: Box::new(e),
        })?;
        builder = builder.proxy(proxy);
    }

    let mut request = builder.build().get(request_url.as_str());
    if let Some(credentials) = credentials {
        request = request.set("Authorization", &basic_auth_header(credentials));
    }

    let response = request.call().map_err(|e| match e {
        ureq::Error::Status(code, response) => DownloadError::Status {
            url: display_url.clone(),
            code,
            reason: response.status_text().to_string(),
        },
        other => DownloadError::Network {
            url: display_url.clone(),
            source: Box::new(other),
        },
    })?;

    if !(200..300).contains(&response.status()) {
        return Err(DownloadError::Status {
            url: display_url,
            code: response.status(),
            reason: response.status_text().to_string(),
        });
    }

    if let Some(content_type) = response.header("content-type") {
        let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if mime == "text/html" {
            return Err(DownloadError::UnexpectedContent {
                url: display_url,
                content_type: content_type.to_string(),
            });
        }
        if mime.starts_with("text/") {
            output::warning(&format!(
                "{} was served as '{}', expected an archive",
                display_url, content_type
            ));
        }
    }

    let expected: Option<u64> = response
        .header("content-length")
        .and_then(|s| s.trim().parse().ok());

    let mut progress = TransferProgress::start(observer, name, expected);
    let mut reader = response.into_reader();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DownloadError::Interrupted {
                    url: display_url,
                    received: progress.transferred(),
                    source,
                });
            }
        };
        out.write_all(&buffer[..n])
            .map_err(|source| DownloadError::Interrupted {
                url: display_url.clone(),
                received: progress.transferred(),
                source,
            })?;
        progress.record(n);
    }

    let received = progress.transferred();
    if let Some(expected) = expected
        && received < expected
    {
        return Err(DownloadError::Interrupted {
            url: display_url,
            received,
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes", expected),
            ),
        });
    }

    Ok(received)
}

/// Hide the password part of a proxy URL before printing it.
fn redact(proxy_url: &str) -> String {
    match Url::parse(proxy_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => proxy_url.to_string(),
    }
}
