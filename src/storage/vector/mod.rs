//! Vector similarity backends.

mod brute_force;
mod similarity;

pub use brute_force::VectorBackend;
pub use similarity::cosine_similarity;
