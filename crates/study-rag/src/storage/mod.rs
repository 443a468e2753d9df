//! Blob storage for user folders, documents and generated papers

pub mod blob;
pub mod local;
pub mod supabase;

pub use blob::{BlobEntry, BlobStore, WriteMode, WriteOutcome};
pub use local::LocalBlobStore;
pub use supabase::SupabaseBlobStore;
