pub mod extract;
pub mod range;

// Re-exports for public API
#[allow(unused_imports)]
pub use extract::FilterExtractor;
