//! Backend for a documentation Q&A chat.
//!
//! Answers free-text questions against a fixed documentation corpus:
//! the corpus is embedded into an in-memory vector index at startup,
//! each question retrieves the most similar passages, and a chat model
//! streams a grounded answer token by token into an observable
//! [`action::SearchAction`] record.

pub mod action;
pub mod answer;
pub mod core;
pub mod corpus;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
