pub mod directives;
pub mod engine;
pub mod store;

pub use engine::{CacheEngine, Lookup};
pub use store::{CacheEntry, MAX_KEY_BYTES, MAX_VALUE_BYTES};
