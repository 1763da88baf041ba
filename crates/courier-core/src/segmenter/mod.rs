//! Range math and chunk planning.
//!
//! Splits a remote file into N byte ranges and computes HTTP Range header bounds.

mod range;

pub use range::{plan_chunks, Chunk, ChunkPlan};
