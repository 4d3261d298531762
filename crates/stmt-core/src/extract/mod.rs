//! Transaction extraction from acquired text.
//!
//! The semantic extractor asks a language model for JSON; the fallback parser
//! reads pipe tables when that fails.

pub mod backend;
pub mod fallback;
pub mod patterns;
pub mod prompt;
pub mod semantic;

pub use backend::{CompletionBackend, CompletionRequest, HttpCompletionBackend};
pub use fallback::{RowRejection, parse_fallback, parse_row};
pub use semantic::{SemanticExtractor, clean_text, parse_response};
