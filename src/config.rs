use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_IDENTITY_HEADER: &str = "x-ms-client-principal-name";

/// Which surfaces this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Upload front-end only.
    Web,
    /// Event Grid webhook and keep-warm timer only.
    Mover,
    /// Both.
    All,
}

impl Role {
    pub fn serves_web(self) -> bool {
        matches!(self, Role::Web | Role::All)
    }

    pub fn serves_mover(self) -> bool {
        matches!(self, Role::Mover | Role::All)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        <Role as ValueEnum>::from_str(value, true)
            .map_err(|_| anyhow::anyhow!("unknown role `{}` (expected web, mover or all)", value))
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub role: Role,
    /// Connection string of the account users upload into.
    pub public_storage: String,
    /// Connection string of the account holding the destination shares.
    pub private_storage: Option<String>,
    pub identity_header: String,
    pub keep_warm: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Secure upload front-end and blob-to-share mover")]
pub struct Args {
    /// Host to bind to (overrides SECURE_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SECURE_UPLOAD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Surfaces to serve (overrides SECURE_UPLOAD_ROLE)
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// Public storage connection string (overrides SECURE_UPLOAD_PUBLIC_STORAGE)
    #[arg(long)]
    pub public_storage: Option<String>,

    /// Private storage connection string (overrides SECURE_UPLOAD_PRIVATE_STORAGE)
    #[arg(long)]
    pub private_storage: Option<String>,

    /// Header carrying the signed-in principal (overrides SECURE_UPLOAD_IDENTITY_HEADER)
    #[arg(long)]
    pub identity_header: Option<String>,

    /// Keep-warm interval in seconds (overrides SECURE_UPLOAD_KEEP_WARM_SECS)
    #[arg(long)]
    pub keep_warm_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over the variables returned by `var`, over defaults.
    pub fn from_sources(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = var("SECURE_UPLOAD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&var, "SECURE_UPLOAD_PORT")?.unwrap_or(7071);
        let env_role = parse_var(&var, "SECURE_UPLOAD_ROLE")?.unwrap_or(Role::All);
        let env_keep_warm = parse_var(&var, "SECURE_UPLOAD_KEEP_WARM_SECS")?.unwrap_or(300);
        let env_identity = var("SECURE_UPLOAD_IDENTITY_HEADER")
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.into());

        let role = args.role.unwrap_or(env_role);
        let public_storage = args
            .public_storage
            .or_else(|| var("SECURE_UPLOAD_PUBLIC_STORAGE"))
            .filter(|s| !s.trim().is_empty())
            .context("public storage connection string is required (SECURE_UPLOAD_PUBLIC_STORAGE)")?;
        let private_storage = args
            .private_storage
            .or_else(|| var("SECURE_UPLOAD_PRIVATE_STORAGE"))
            .filter(|s| !s.trim().is_empty());
        if role.serves_mover() && private_storage.is_none() {
            bail!(
                "private storage connection string is required for the mover role \
                 (SECURE_UPLOAD_PRIVATE_STORAGE)"
            );
        }

        let keep_warm_secs = args.keep_warm_secs.unwrap_or(env_keep_warm);
        if keep_warm_secs == 0 {
            bail!("keep-warm interval must be at least one second");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            role,
            public_storage,
            private_storage,
            identity_header: args.identity_header.unwrap_or(env_identity),
            keep_warm: Duration::from_secs(keep_warm_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("parsing {} value `{}`: {}", name, value, err)),
        None => Ok(None),
    }
}
