//! CLI command handlers, one file per command.

mod checksum;
mod download;
mod request;
mod upload;

pub use checksum::run_checksum;
pub use download::{file_name_from_url, run_download, DownloadArgs};
pub use request::{run_get, run_head};
pub use upload::run_upload;
