use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{AstoundError, Result};
use crate::lower::parse_python;
use crate::resolve::{LocalResolver, NameResolver};
use crate::syntax::RawNode;

/// A loaded file: its text, its lowered tree and a resolver scoped to it.
///
/// Immutable after load and shared by every node built from it.
pub struct SourceText {
    path: PathBuf,
    text: String,
    root: Rc<RawNode>,
    resolver: Box<dyn NameResolver>,
}

impl SourceText {
    pub fn open(path: impl AsRef<Path>) -> Result<Rc<Self>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AstoundError::io(path, e))?;
        Self::from_text(path, text).map(Rc::new)
    }

    /// Parse `text` as if it were read from `path`.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let text = text.into();
        let root = parse_python(&text).map_err(|e| match e {
            AstoundError::Parse(msg) => AstoundError::Parse(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        let resolver = LocalResolver::index(&root, &module_name(&path), Some(path.clone()));
        Ok(Self {
            path,
            text,
            root: Rc::new(root),
            resolver: Box::new(resolver),
        })
    }

    /// Swap in another resolution service.
    pub fn with_resolver(mut self, resolver: Box<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &Rc<RawNode> {
        &self.root
    }

    pub fn resolver(&self) -> &dyn NameResolver {
        self.resolver.as_ref()
    }

    /// Source text of a byte span; empty if the span is out of range.
    pub fn slice(&self, span: Range<usize>) -> &str {
        self.text.get(span).unwrap_or_default()
    }

    /// Lines `start..=end` (1-based) joined with newlines.
    pub fn lines(&self, start: usize, end: usize) -> String {
        let skip = start.saturating_sub(1);
        let take = (end + 1).saturating_sub(start.max(1));
        self.text
            .lines()
            .skip(skip)
            .take(take)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lines `start..=end` with right-aligned line numbers, for display.
    pub fn view_text(&self, start: usize, end: usize) -> String {
        let width = end.to_string().len();
        self.text
            .lines()
            .enumerate()
            .skip(start.saturating_sub(1))
            .take_while(|(idx, _)| idx + 1 <= end)
            .map(|(idx, line)| format!("{:>width$} | {line}", idx + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Debug for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceText")
            .field("path", &self.path)
            .field("bytes", &self.text.len())
            .finish()
    }
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("__main__")
        .to_string()
}
