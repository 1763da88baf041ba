//! File transfers: metadata probes, single-stream downloads, uploads and the
//! coordinator that picks between single-stream and chunked downloads.

mod coordinator;
mod descriptor;
mod download;
mod extract;
mod remote;
mod upload;

pub use coordinator::{should_download_file, DownloadOutcome, Downloader};
pub use descriptor::{ChunkedDownload, DownloadDescriptor};
pub(crate) use extract::explode;
pub use extract::Extractor;
pub use remote::RemoteFileDetails;
