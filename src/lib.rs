pub mod commands;
pub mod compiler;
pub mod config;
pub mod project;

pub use compiler::{scan, CompileError, ConversationMetadata, ReferenceResolver, Scanner};
