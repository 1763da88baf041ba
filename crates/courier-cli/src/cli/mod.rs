//! CLI for the courier transfer core.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use courier_core::config::{self, CourierConfig};
use courier_core::{HttpClient, HttpClientBuilder, ServiceClient, ServiceDetails};

use commands::{run_checksum, run_download, run_get, run_head, run_upload, DownloadArgs};

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(about = "courier: resilient artifact transfers over HTTP", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub credentials: Credentials,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Credentials applied to every request of the command.
#[derive(Debug, Default, Clone, Args)]
pub struct Credentials {
    #[arg(long, global = true)]
    pub user: Option<String>,
    #[arg(long, global = true)]
    pub password: Option<String>,
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,
    /// Access token, sent as a bearer token (or basic auth with --user).
    #[arg(long, global = true)]
    pub token: Option<String>,
}

impl Credentials {
    /// Shared credential for the service `url` belongs to.
    pub fn service_details(&self, url: &str) -> ServiceDetails {
        let mut sd = ServiceDetails::new(url);
        if let Some(user) = &self.user {
            sd = sd.user(user.clone());
        }
        if let Some(password) = &self.password {
            sd = sd.basic(self.user.clone().unwrap_or_default(), password.clone());
        }
        if let Some(key) = &self.api_key {
            sd = sd.api_key(key.clone());
        }
        if let Some(token) = &self.token {
            sd = sd.access_token(token.clone());
        }
        sd
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send a GET request and print the response body.
    Get {
        url: String,
        /// Report a redirect instead of following it.
        #[arg(long)]
        no_follow: bool,
    },

    /// Send a HEAD request and print the response headers.
    Head { url: String },

    /// Download a file, in parallel chunks when the server allows it.
    Download(DownloadArgs),

    /// Upload a file with checksum headers (PUT).
    Upload {
        /// Local file to upload.
        path: PathBuf,
        /// Target URL.
        url: String,
    },

    /// Print SHA-1, MD5 and SHA-256 of a file.
    Checksum { path: PathBuf },
}

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub cfg: CourierConfig,
    pub client: HttpClient,
    pub credentials: Credentials,
}

impl Session {
    pub fn service(&self, url: &str) -> ServiceClient {
        let details = self.credentials.service_details(url).expiry_settings(&self.cfg);
        ServiceClient::new(self.client.clone(), Arc::new(details))
    }
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Checksum { path } = &cli.command {
            return run_checksum(path);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let client = HttpClientBuilder::from_config(&cfg).build()?;
        let session = Session {
            cfg,
            client,
            credentials: cli.credentials,
        };

        match cli.command {
            CliCommand::Get { url, no_follow } => run_get(&session, &url, !no_follow),
            CliCommand::Head { url } => run_head(&session, &url),
            CliCommand::Download(args) => run_download(&session, &args),
            CliCommand::Upload { path, url } => run_upload(&session, &path, &url),
            CliCommand::Checksum { path } => run_checksum(&path),
        }
    }
}

#[cfg(test)]
mod tests;
