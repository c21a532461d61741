//! Command-line flags and the validated, immutable export configuration.
//!
//! DESIGN
//! ======
//! Flags are parsed by clap into [`Cli`], then validated once into an
//! [`ExportConfig`] that is threaded explicitly into every component. Nothing
//! downstream reads flags or globals. Tunables that are rarely touched come
//! from environment variables with defaults, the same way the persistence
//! knobs of a long-running service would.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::browser::BrowserConfig;
use crate::render::AttributePoll;

pub const DEFAULT_WEBAPP_DIR: &str = "drawio/src/main/webapp";
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_ATTRIBUTE_RETRIES: u32 = 20;
const DEFAULT_ATTRIBUTE_INTERVAL_MS: u64 = 250;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("-in must not be empty")]
    MissingInput,
    #[error("-out must not be empty")]
    MissingOutput,
    #[error("input dir does not exist: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(r#"invalid format: "png" or "svg" is valid, but got [{0}]"#)]
    InvalidFormat(String),
    #[error("draw.io webapp dir does not exist: {}", .0.display())]
    WebappNotFound(PathBuf),
}

// =============================================================================
// FORMAT
// =============================================================================

/// Output format handed to the rendering engine and used as file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Png,
    Svg,
}

impl Format {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            other => Err(ConfigError::InvalidFormat(other.to_owned())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "drawio-export", version, about = "Export draw.io diagrams to PNG or SVG images")]
pub struct Cli {
    /// Directory scanned recursively for .dio and .drawio files.
    #[arg(long = "in", short = 'i', value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Directory exported images are written to.
    #[arg(long = "out", short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output format: png or svg.
    #[arg(long, short = 'f', default_value = "png")]
    pub format: String,

    /// Background color (e.g. white, red, #cccccc).
    #[arg(long = "bg", default_value = "white")]
    pub background: String,

    /// Verbose logging.
    #[arg(long)]
    pub debug: bool,

    /// Only run the draw.io static server until Ctrl-C.
    #[arg(long)]
    pub serve_only: bool,

    /// draw.io webapp directory served to the browser.
    #[arg(long, env = "DRAWIO_EXPORT_WEBAPP", default_value = DEFAULT_WEBAPP_DIR)]
    pub webapp: PathBuf,

    /// Chromium executable to launch. Searched on PATH when absent.
    #[arg(long, env = "DRAWIO_EXPORT_BROWSER")]
    pub browser: Option<PathBuf>,

    /// DevTools HTTP endpoint of an already running browser (e.g. http://127.0.0.1:9222).
    #[arg(long, env = "DRAWIO_EXPORT_BROWSER_URL", conflicts_with = "browser")]
    pub browser_url: Option<String>,

    /// Seconds a page may take to reach network idle.
    #[arg(long = "timeout", value_name = "SECS", default_value_t = DEFAULT_PAGE_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Long flags that also accept a single dash (`-in dir`, `-format=svg`).
const SINGLE_DASH_FLAGS: &[&str] =
    &["in", "out", "format", "bg", "debug", "serve-only", "webapp", "browser", "browser-url", "timeout"];

impl Cli {
    /// Parse process arguments after rewriting single-dash long flags.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite `-in`, `-format=svg` and the other single-dash long flags to their
/// `--` form. Short flags and values pass through untouched.
#[must_use]
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(rest) = arg.to_str().and_then(|a| a.strip_prefix('-')) else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_FLAGS.contains(&name) {
                OsString::from(format!("-{}", arg.to_string_lossy()))
            } else {
                arg
            }
        })
        .collect()
}

// =============================================================================
// EXPORT CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: Format,
    pub background: String,
    pub serve_only: bool,
    pub webapp: PathBuf,
    pub browser: BrowserConfig,
    pub page_timeout: Duration,
    pub attribute_poll: AttributePoll,
}

impl ExportConfig {
    /// Validate parsed flags.
    ///
    /// In `--serve-only` mode only the webapp directory is checked.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, before any server or file I/O.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let (input, output, format) = if cli.serve_only {
            (
                cli.input.unwrap_or_default(),
                cli.output.unwrap_or_default(),
                cli.format.parse().unwrap_or(Format::Png),
            )
        } else {
            let input = cli.input.filter(|p| !p.as_os_str().is_empty()).ok_or(ConfigError::MissingInput)?;
            let output = cli.output.filter(|p| !p.as_os_str().is_empty()).ok_or(ConfigError::MissingOutput)?;
            if !input.is_dir() {
                return Err(ConfigError::InputNotFound(input));
            }
            (input, output, cli.format.parse()?)
        };

        if !cli.webapp.is_dir() {
            return Err(ConfigError::WebappNotFound(cli.webapp));
        }

        let browser = BrowserConfig {
            executable: cli.browser,
            endpoint: cli.browser_url,
            no_sandbox: env_parse("DRAWIO_EXPORT_NO_SANDBOX", false),
            command_timeout: Duration::from_secs(env_parse(
                "DRAWIO_EXPORT_COMMAND_TIMEOUT_SECS",
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )),
            launch_timeout: Duration::from_secs(env_parse(
                "DRAWIO_EXPORT_LAUNCH_TIMEOUT_SECS",
                DEFAULT_LAUNCH_TIMEOUT_SECS,
            )),
        };
        let attribute_poll = AttributePoll {
            retries: env_parse("DRAWIO_EXPORT_ATTRIBUTE_RETRIES", DEFAULT_ATTRIBUTE_RETRIES),
            interval: Duration::from_millis(env_parse(
                "DRAWIO_EXPORT_ATTRIBUTE_INTERVAL_MS",
                DEFAULT_ATTRIBUTE_INTERVAL_MS,
            )),
        };

        Ok(Self {
            input,
            output,
            format,
            background: cli.background,
            serve_only: cli.serve_only,
            webapp: cli.webapp,
            browser,
            page_timeout: Duration::from_secs(cli.timeout_secs),
            attribute_poll,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
