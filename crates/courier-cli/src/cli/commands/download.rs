//! `courier download`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use courier_core::progress::LogProgress;
use courier_core::{DownloadDescriptor, DownloadOutcome, Downloader};

use crate::cli::Session;

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    pub url: String,
    /// Target directory (default: current directory).
    #[arg(long)]
    pub dest: Option<PathBuf>,
    /// Local file name (default: last path segment of the URL).
    #[arg(long)]
    pub name: Option<String>,
    /// Number of parallel range requests for large files.
    #[arg(long, value_name = "N")]
    pub split: Option<usize>,
    /// Expected SHA-1; defaults to the checksum the server reports.
    #[arg(long)]
    pub sha1: Option<String>,
    #[arg(long)]
    pub skip_checksum: bool,
}

/// Last non-empty path segment of `url`, without query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

pub fn run_download(session: &Session, args: &DownloadArgs) -> Result<()> {
    let Some(name) = args.name.clone().or_else(|| file_name_from_url(&args.url)) else {
        bail!("cannot derive a file name from {}; pass --name", args.url);
    };
    let dest = match &args.dest {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    let mut d = DownloadDescriptor::new(&args.url, dest, name).skip_checksum(args.skip_checksum);
    if let Some(sha1) = &args.sha1 {
        d = d.expected_sha1(sha1);
    }

    let service = session.service(&args.url);
    let progress = LogProgress::new();
    let mut downloader = Downloader::from_config(service.http_client(), &session.cfg).progress(Some(&progress));
    if let Some(split) = args.split {
        downloader = downloader.split_count(split);
    }
    let mut details = service.client_details();
    match service.download(&downloader, &d, &mut details)? {
        DownloadOutcome::Skipped => println!("{} is up to date", d.destination().display()),
        DownloadOutcome::Downloaded(_) => println!("downloaded {}", d.destination().display()),
        DownloadOutcome::Unexpected(resp) => {
            bail!("server response: HTTP {}\n{}", resp.status, resp.body_text())
        }
    }
    Ok(())
}
