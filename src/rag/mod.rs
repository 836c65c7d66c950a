//! Retrieval-augmented answering.
//!
//! - `index`: in-memory vector index over the documentation corpus
//! - `prompt`: template selection and substitution for the chat model

pub mod index;
pub mod prompt;

pub use index::{EmbeddedPassage, EmbeddingIndex, IndexHandle, RetrievalMatch};
pub use prompt::{PromptBuilder, PromptTemplate};
