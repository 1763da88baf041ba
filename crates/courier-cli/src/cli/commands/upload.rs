//! `courier upload`.

use anyhow::Result;
use courier_core::progress::LogProgress;
use std::path::Path;

use crate::cli::Session;

pub fn run_upload(session: &Session, path: &Path, url: &str) -> Result<()> {
    let service = session.service(url);
    let mut details = service.client_details();
    let progress = LogProgress::new();
    let resp = service.upload_file(path, url, &mut details, Some(&progress))?;
    println!("uploaded {} (HTTP {})", path.display(), resp.status);
    Ok(())
}
