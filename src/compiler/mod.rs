pub mod ast;
pub mod config;
pub mod error;
pub mod expression;
pub mod logic;
pub mod metadata;
pub mod parser;
pub mod reference;
pub mod scope;
pub mod tags;

pub use config::PromptConfig;
pub use error::{CompileError, ErrorKind};
pub use metadata::{scan, ConversationMetadata, Scanner};
pub use reference::ReferenceResolver;
