//! Secure Store Module
//!
//! Stores arbitrarily large secrets on a backend with a small per-item
//! ceiling by splitting them into chunks.

mod chunking;
mod store;


pub use chunking::{
    chunk_key, decode_chunk_count, encode_chunk_count, item_key, legacy_marker_key, meta_key,
    parse_legacy_count, split_chunks,
};
pub use store::{SecureChunkStore, SecureRead};

// == Public Constants ==
/// Largest value (in bytes) written to a single secure entry
pub const MAX_ITEM_SIZE: usize = 2048;
