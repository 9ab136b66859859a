//! Storage backend traits.

mod memory;

pub use memory::MemoryBackend;
