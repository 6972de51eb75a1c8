//! Memory categorization

pub mod categorizer;
pub mod prompt;

pub use categorizer::{
    categories_from_text, extract_json_object, MemoryCategories, MemoryCategorizer,
};
pub use prompt::MEMORY_CATEGORIZATION_PROMPT;
