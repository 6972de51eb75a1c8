pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod util;

// Re-exports for convenience
pub use config::{resolve, EnvSnapshot, ResolvedProvider};
pub use error::{CategorizeError, ErrorKind, LlmError};
pub use memory::{MemoryCategories, MemoryCategorizer};
