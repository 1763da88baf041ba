//! `courier checksum`: digests of a local file.

use anyhow::Result;
use courier_core::checksum;
use std::path::Path;

pub fn run_checksum(path: &Path) -> Result<()> {
    let sums = checksum::calc_path(path)?;
    println!("sha1    {}", sums.sha1);
    println!("md5     {}", sums.md5);
    println!("sha256  {}", sums.sha256);
    Ok(())
}
