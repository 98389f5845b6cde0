use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the navigation and summarization core.
///
/// Navigation errors (`DuplicateChildKey`, `InvalidLocation`, `NoSuchChild`,
/// `AtRoot`) never move the cursor. `DefinitionNotFound` is recovered where it
/// occurs: its display text doubles as the substitute source text handed to the
/// summarizer. `MultipleBasesUnsupported` is only ever logged.
#[derive(Debug, Error)]
pub enum AstoundError {
    #[error("child already exists at key '{0}'")]
    DuplicateChildKey(String),

    #[error("no navigable node starts at {line},{col} under the current node")]
    InvalidLocation { line: usize, col: usize },

    #[error("no child at key '{0}'")]
    NoSuchChild(String),

    #[error("already at the root node")]
    AtRoot,

    #[error("cannot discover child fields of {kind}: {reason}")]
    UnresolvedKind { kind: String, reason: String },

    #[error("Function definition not found. Check imports and consider a manual link.")]
    DefinitionNotFound,

    #[error("class {class} has {count} bases; multiple inheritance is not resolved, using the first")]
    MultipleBasesUnsupported { class: String, count: usize },

    #[error("no text generation service configured (set the API key environment variable)")]
    GeneratorUnavailable,

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("failed to parse {0}")]
    Parse(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("field cache error: {0}")]
    Cache(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl AstoundError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Navigation errors are reported to the user and leave the session intact.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateChildKey(_) | Self::InvalidLocation { .. } | Self::NoSuchChild(_) | Self::AtRoot
        )
    }
}

pub type Result<T> = std::result::Result<T, AstoundError>;
