//! Blob store and metadata store: the two persistence primitives underneath
//! the session engine.

mod blobs;
mod meta;

pub use blobs::BlobStore;
pub use meta::MetaStore;
