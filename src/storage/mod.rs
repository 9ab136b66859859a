//! Storage layer.
//!
//! Two co-located backends share one record model:
//! - **Relational**: authoritative store with exact/range filtering
//! - **Vector**: fixed-dimension embedding index with cosine ranking
//!
//! [`HybridBackend`] composes them with dual-write and filter-after-rank search.

pub mod hybrid;
pub mod relational;
pub mod traits;
pub mod vector;

pub use hybrid::HybridBackend;
pub use relational::RelationalBackend;
pub use traits::MemoryBackend;
pub use vector::{VectorBackend, cosine_similarity};
