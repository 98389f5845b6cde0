pub mod cache;
pub mod config;
pub mod cursor;
pub mod error;
pub mod fields;
pub mod generate;
pub mod lower;
pub mod repl;
pub mod resolve;
pub mod session;
pub mod simplify;
pub mod source;
pub mod summarize;
pub mod syntax;
pub mod tree;

pub use cursor::Cursor;
pub use error::{AstoundError, Result};
pub use session::Session;
pub use source::SourceText;
pub use tree::{ManualLink, NodeId, SyntaxNode, SyntaxTree};
