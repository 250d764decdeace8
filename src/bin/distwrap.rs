//! distwrap CLI - fetch and unpack the distribution a wrapper properties file names
//!
//! Usage:
//!   distwrap [-v] [--properties <file>] [-Dkey=value]... [-- <tool args>...]
//!
//! Prints the path of the unpacked distribution on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use distwrap::core::env;
use distwrap::core::lock::DEFAULT_LOCK_TIMEOUT;
use distwrap::download::progress::BarProgress;
use distwrap::download::{self, DEFAULT_HTTP_TIMEOUT};
use distwrap::{output, Credentials, Downloader, Installer, PathAssembler, WrapperExecutor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use url::Url;

#[derive(Parser)]
#[command(name = "distwrap")]
#[command(about = "Download, cache and unpack the distribution named by a wrapper properties file")]
#[command(version)]
struct Cli {
    /// Wrapper properties file (default: this executable's path with a .properties extension)
    #[arg(long, env = env::PROPERTIES_ENV)]
    properties: Option<PathBuf>,

    /// Set a property, e.g. -Ddistwrap.user.home=/opt/cache
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_define)]
    defines: Vec<(String, String)>,

    /// Print progress details to stderr
    #[arg(short, long, env = env::VERBOSE_ENV)]
    verbose: bool,

    /// Username for HTTP basic authentication
    #[arg(long, env = env::USERNAME_ENV)]
    username: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(long, env = env::PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Fetch the distribution from this URL instead of distributionUrl
    #[arg(long, env = env::REPOURL_ENV)]
    repo_url: Option<Url>,

    /// Arguments for the launched tool (ignored)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    tool_args: Vec<String>,
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').unwrap_or((s, ""));
    if key.is_empty() {
        return Err(format!("invalid property definition '{}': empty key", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn default_properties_file() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot determine the executable path")?;
    Ok(exe.with_extension("properties"))
}

fn run(cli: Cli) -> Result<PathBuf> {
    let properties_file = match cli.properties {
        Some(path) => path,
        None => default_properties_file()?,
    };

    let property = cli
        .defines
        .iter()
        .rev()
        .find(|(key, _)| key == env::USER_HOME_PROPERTY)
        .map(|(_, value)| value.as_str());
    let user_home = env::resolve_user_home(
        property,
        std::env::var_os(env::USER_HOME_ENV),
        dirs::home_dir(),
    )
    .context("Cannot determine the user home directory; set DISTWRAP_USER_HOME")?;

    let mut executor = WrapperExecutor::for_properties_file(&properties_file)?;
    if let Some(repo_url) = cli.repo_url {
        output::info(&format!("using repository URL override {}", repo_url));
        executor = executor.with_distribution(repo_url);
    }

    let credentials = cli
        .username
        .map(|username| Credentials::new(username, cli.password.unwrap_or_default()));
    let http_timeout = env::duration_secs(
        std::env::var_os(env::HTTP_TIMEOUT_ENV),
        DEFAULT_HTTP_TIMEOUT,
        5,
        3600,
    );
    let lock_timeout = env::duration_secs(
        std::env::var_os(env::LOCK_TIMEOUT_ENV),
        DEFAULT_LOCK_TIMEOUT,
        1,
        24 * 3600,
    );

    let downloader = Downloader::new()
        .with_credentials(credentials)
        .with_timeout(http_timeout)
        .with_progress(Arc::new(BarProgress::new()));
    let installer =
        Installer::new(downloader, PathAssembler::new(user_home)).with_lock_timeout(lock_timeout);

    let home = executor
        .execute(&installer)
        .with_context(|| format!("Failed to install {}", download::redacted(executor.distribution())))?;
    Ok(home)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    output::set_verbose(cli.verbose);
    if !cli.tool_args.is_empty() {
        output::detail(&format!("ignoring {} tool argument(s)", cli.tool_args.len()));
    }

    match run(cli) {
        Ok(home) => {
            println!("{}", home.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
