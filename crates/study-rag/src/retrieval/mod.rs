//! Vector index, diversity-aware selection and index persistence

pub mod index;
pub mod mmr;
pub mod store;

pub use index::{DocumentSummary, FolderIndex, IndexEntry, IndexHeader, RetrievalMode, INDEX_FORMAT_VERSION};
pub use mmr::{cosine_similarity, mmr_select};
pub use store::IndexStore;
