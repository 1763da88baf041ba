//! `courier get` and `courier head`.

use anyhow::{bail, Result};
use std::io::Write;

use crate::cli::Session;

pub fn run_get(session: &Session, url: &str, follow_redirect: bool) -> Result<()> {
    let service = session.service(url);
    let mut details = service.client_details();
    let resp = service.send_get(url, follow_redirect, &mut details)?;
    if let Some(location) = &resp.redirect_url {
        println!("HTTP {} -> {}", resp.status, location);
        return Ok(());
    }
    std::io::stdout().write_all(&resp.body)?;
    if !resp.is_success() {
        bail!("server response: HTTP {}", resp.status);
    }
    Ok(())
}

pub fn run_head(session: &Session, url: &str) -> Result<()> {
    let service = session.service(url);
    let mut details = service.client_details();
    let resp = service.send_head(url, &mut details)?;
    println!("HTTP {}", resp.status);
    for (name, value) in resp.headers.iter() {
        println!("{}: {}", name, value);
    }
    Ok(())
}
