use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Deployment environment.
///
/// Injected into the resolver explicitly rather than read from ambient
/// process state inside business logic. It never changes which candidate
/// locations are probed on the read path; it only selects the directory
/// root the rewriter treats as writable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment `{other}`; expected `development` or `production`"
            )),
        }
    }
}

/// What the process should do after configuration is parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Serve the HTTP proxy (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Run the reference rewriter once and exit.
    Rewrite { verify_only: bool },
}

/// Content columns the rewriter converges when nothing is configured.
const DEFAULT_CONTENT_TARGETS: &str =
    "pages.media,events.image,vendors.media,forum_posts.media,listings.photos";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory containing the legacy `uploads/` tree and bare bucket
    /// directories.
    pub web_root: String,
    /// Base directory of the local object store.
    pub storage_dir: String,
    pub database_url: String,
    pub environment: Environment,
    /// Upper bound for one candidate probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Rewriter batch size; also caps in-batch upload concurrency.
    pub batch_size: usize,
    /// Optional replacement for the embedded placeholder asset.
    pub placeholder_path: Option<String>,
    /// `table.column` specs the rewriter scans for media references.
    pub content_targets: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media-reference normalization and storage proxy")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_PROXY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_PROXY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding legacy media files (overrides MEDIA_PROXY_WEB_ROOT)
    #[arg(long)]
    pub web_root: Option<String>,

    /// Local object-store directory (overrides MEDIA_PROXY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MEDIA_PROXY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Deployment environment: development or production
    /// (overrides MEDIA_PROXY_ENVIRONMENT)
    #[arg(long)]
    pub environment: Option<String>,

    /// Per-candidate probe timeout in milliseconds
    /// (overrides MEDIA_PROXY_PROBE_TIMEOUT_MS)
    #[arg(long)]
    pub probe_timeout_ms: Option<u64>,

    /// Rewriter batch size (overrides MEDIA_PROXY_BATCH_SIZE)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Path to a custom placeholder asset
    /// (overrides MEDIA_PROXY_PLACEHOLDER)
    #[arg(long)]
    pub placeholder: Option<String>,

    /// Comma-separated `table.column` rewrite targets
    /// (overrides MEDIA_PROXY_CONTENT_TARGETS)
    #[arg(long)]
    pub content_targets: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Run the reference rewriter once and exit
    #[arg(long)]
    pub rewrite: bool,

    /// With --rewrite: only verify already-uploaded assets
    #[arg(long)]
    pub verify_only: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("MEDIA_PROXY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("MEDIA_PROXY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MEDIA_PROXY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading MEDIA_PROXY_PORT"),
        };
        let env_web_root = env::var("MEDIA_PROXY_WEB_ROOT").unwrap_or_else(|_| "./public".into());
        let env_storage =
            env::var("MEDIA_PROXY_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("MEDIA_PROXY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/media_proxy.db".into());
        let env_environment =
            env::var("MEDIA_PROXY_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let env_probe_timeout = match env::var("MEDIA_PROXY_PROBE_TIMEOUT_MS") {
            Ok(value) => Some(value.parse::<u64>().with_context(|| {
                format!("parsing MEDIA_PROXY_PROBE_TIMEOUT_MS value `{}`", value)
            })?),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading MEDIA_PROXY_PROBE_TIMEOUT_MS"),
        };
        let env_batch_size = match env::var("MEDIA_PROXY_BATCH_SIZE") {
            Ok(value) => Some(
                value
                    .parse::<usize>()
                    .with_context(|| format!("parsing MEDIA_PROXY_BATCH_SIZE value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading MEDIA_PROXY_BATCH_SIZE"),
        };
        let env_placeholder = env::var("MEDIA_PROXY_PLACEHOLDER").ok();
        let env_targets = env::var("MEDIA_PROXY_CONTENT_TARGETS")
            .unwrap_or_else(|_| DEFAULT_CONTENT_TARGETS.into());

        // --- Merge ---
        let environment = args
            .environment
            .unwrap_or(env_environment)
            .parse::<Environment>()
            .map_err(anyhow::Error::msg)
            .context("parsing deployment environment")?;
        let content_targets = args
            .content_targets
            .unwrap_or(env_targets)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            web_root: args.web_root.unwrap_or(env_web_root),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            environment,
            probe_timeout_ms: args
                .probe_timeout_ms
                .or(env_probe_timeout)
                .unwrap_or(100),
            batch_size: args.batch_size.or(env_batch_size).unwrap_or(25).max(1),
            placeholder_path: args.placeholder.or(env_placeholder),
            content_targets,
        };

        let mode = if args.migrate {
            RunMode::Migrate
        } else if args.rewrite {
            RunMode::Rewrite {
                verify_only: args.verify_only,
            }
        } else {
            RunMode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_common_spellings() {
        assert_eq!("development".parse(), Ok(Environment::Development));
        assert_eq!("dev".parse(), Ok(Environment::Development));
        assert_eq!("Production".parse(), Ok(Environment::Production));
        assert_eq!("prod".parse(), Ok(Environment::Production));
        assert!("staging".parse::<Environment>().is_err());
    }
}
