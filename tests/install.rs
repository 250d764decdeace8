//! End-to-end installs into a scratch cache.

mod common;

use common::{distribution_zip, zip_bytes, TestProject};
use distwrap::download::progress::NoProgress;
use distwrap::{
    Download, DownloadError, Downloader, Install, InstallError, Installer, PathAssembler,
    WrapperConfiguration, WrapperExecutor,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use url::Url;

/// Wraps the real downloader and counts how often it runs.
struct CountingDownload {
    inner: Downloader,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingDownload {
    fn new(delay: Duration) -> Self {
        Self {
            inner: Downloader::new()
                .with_proxy_env(|_| None)
                .with_progress(Arc::new(NoProgress)),
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Download for CountingDownload {
    fn download(&self, source: &Url, destination: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.download(source, destination)
    }
}

fn file_distribution(project: &TestProject, name: &str, bytes: &[u8]) -> WrapperConfiguration {
    let archive = project.write_file(&format!("repo/{name}"), bytes);
    WrapperConfiguration::new(Url::from_file_path(archive).unwrap())
}

#[test]
fn test_second_install_reuses_first() {
    let project = TestProject::new();
    let config = file_distribution(&project, "tool-1.0-bin.zip", &distribution_zip("tool-1.0"));
    let installer = Installer::new(
        CountingDownload::new(Duration::ZERO),
        PathAssembler::new(project.user_home()),
    );

    let first = installer.install(&config).unwrap();
    let second = installer.install(&config).unwrap();

    assert_eq!(first, second);
    assert_eq!(installer.downloader().calls.load(Ordering::SeqCst), 1);
    assert!(first.is_absolute());
    assert_eq!(first.file_name().unwrap(), "tool-1.0");
    assert!(first.join("bin/tool").is_file());
    assert!(first.join("lib/tool.jar").is_file());
}

#[test]
fn test_concurrent_installs_download_once() {
    const THREADS: usize = 8;

    let project = TestProject::new();
    let config = file_distribution(&project, "tool-1.0-bin.zip", &distribution_zip("tool-1.0"));
    let installer = Arc::new(Installer::new(
        CountingDownload::new(Duration::from_millis(100)),
        PathAssembler::new(project.user_home()),
    ));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let installer = Arc::clone(&installer);
            let barrier = Arc::clone(&barrier);
            let config = config.clone();
            std::thread::spawn(move || {
                barrier.wait();
                installer.install(&config).unwrap()
            })
        })
        .collect();
    let homes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(homes.iter().all(|h| h == &homes[0]));
    assert_eq!(installer.downloader().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stale_directory_without_marker_is_replaced() {
    let project = TestProject::new();
    let config = file_distribution(&project, "tool-1.0-bin.zip", &distribution_zip("tool-1.0"));
    let assembler = PathAssembler::new(project.user_home());
    let local = assembler.local_distribution(&config);

    // Debris of a crashed install: root dir present, no marker.
    let debris = local.distribution_dir().join("tool-1.0");
    std::fs::create_dir_all(debris.join("half")).unwrap();
    std::fs::create_dir_all(local.distribution_dir().join(".unpack-crashed")).unwrap();

    let installer = Installer::new(CountingDownload::new(Duration::ZERO), assembler);
    let home = installer.install(&config).unwrap();

    assert!(home.join("bin/tool").is_file());
    assert!(!home.join("half").exists());
    assert!(!local.distribution_dir().join(".unpack-crashed").exists());
}

#[test]
fn test_archive_without_root_directory() {
    let project = TestProject::new();
    let config = file_distribution(&project, "flat.zip", &zip_bytes(&[("tool", b"flat")]));
    let installer = Installer::new(Downloader::new(), PathAssembler::new(project.user_home()));

    let err = installer.install(&config).unwrap_err();
    assert!(matches!(err, InstallError::NoRootDirectory { .. }));
    assert!(err.to_string().contains("does not contain any directories"));
}

#[test]
fn test_tar_gz_distribution() {
    let project = TestProject::new();

    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::default(),
    ));
    let content = b"#!/bin/sh\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "tool-2.0/bin/tool", &content[..])
        .unwrap();
    let bytes = builder.into_inner().unwrap().finish().unwrap();

    let config = file_distribution(&project, "tool-2.0.tar.gz", &bytes);
    let installer = Installer::new(Downloader::new(), PathAssembler::new(project.user_home()));
    let home = installer.install(&config).unwrap();

    assert_eq!(home.file_name().unwrap(), "tool-2.0");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(home.join("bin/tool"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[test]
fn test_checksum_verified_from_properties() {
    let project = TestProject::new();
    let bytes = distribution_zip("tool-1.0");
    project.write_file("wrapper/tool-1.0-bin.zip", &bytes);
    let sum = {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(&bytes))
    };
    let file = project.write_properties(&format!(
        "distributionUrl=tool-1.0-bin.zip\ndistributionSha256Sum={}\n",
        sum.to_uppercase()
    ));

    let executor = WrapperExecutor::for_properties_file(&file).unwrap();
    let installer = Installer::new(Downloader::new(), PathAssembler::new(project.user_home()));
    let home = executor.execute(&installer).unwrap();
    assert!(home.join("bin/tool").is_file());
}

#[test]
fn test_custom_bases_place_archive_and_install_apart() {
    let project = TestProject::new();
    let config = file_distribution(&project, "tool-1.0-bin.zip", &distribution_zip("tool-1.0"))
        .with_distribution_base("dists-base", "dists")
        .with_zip_base(project.path().join("zips").to_string_lossy(), "archives");
    let assembler = PathAssembler::new(project.user_home());
    let local = assembler.local_distribution(&config);

    let installer = Installer::new(Downloader::new(), assembler);
    let home = installer.install(&config).unwrap();

    assert!(local.zip_file().is_file());
    assert!(local.zip_file().starts_with(project.path().join("zips/archives")));
    assert!(local
        .distribution_dir()
        .starts_with(project.user_home().join("dists-base/dists")));
    assert_eq!(
        home,
        dunce::canonicalize(local.distribution_dir().join("tool-1.0")).unwrap()
    );
}

mod http {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_distribution_downloaded_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/dists/tool-1.0-bin.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(distribution_zip("tool-1.0")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let project = TestProject::new();
        let url = Url::parse(&format!("{}/dists/tool-1.0-bin.zip", mock_server.uri())).unwrap();
        let config = WrapperConfiguration::new(url);
        let installer = Installer::new(
            Downloader::new().with_proxy_env(|_| None),
            PathAssembler::new(project.user_home()),
        );

        let first = installer.install(&config).unwrap();
        let second = installer.install(&config).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_html_served_as_octet_stream_is_not_an_archive() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tool.zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<!DOCTYPE html><html>Sign in</html>",
                    "application/octet-stream",
                ),
            )
            .mount(&mock_server)
            .await;

        let project = TestProject::new();
        let url = Url::parse(&format!("{}/tool.zip", mock_server.uri())).unwrap();
        let config = WrapperConfiguration::new(url);
        let assembler = PathAssembler::new(project.user_home());
        let zip_file = assembler.local_distribution(&config).zip_file().to_path_buf();
        let installer = Installer::new(Downloader::new().with_proxy_env(|_| None), assembler);

        let err = installer.install(&config).unwrap_err();
        assert!(matches!(err, InstallError::NotAnArchive { .. }));
        assert!(err.to_string().contains("HTML"));
        assert!(!zip_file.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_error_surfaces_as_download_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tool.zip"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let project = TestProject::new();
        let url = Url::parse(&format!("{}/tool.zip", mock_server.uri())).unwrap();
        let installer = Installer::new(
            Downloader::new().with_proxy_env(|_| None),
            PathAssembler::new(project.user_home()),
        );

        let err = installer.install(&WrapperConfiguration::new(url)).unwrap_err();
        assert!(matches!(
            err,
            InstallError::Download(DownloadError::Status { code: 503, .. })
        ));
    }
}
