use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::{AstoundError, Result};
use crate::session::Session;
use crate::source::SourceText;
use crate::summarize;
use crate::syntax::Position;
use crate::tree::{ManualLink, NodeId, SyntaxNode, SyntaxTree};

/// Navigation state over one [`SyntaxTree`].
///
/// `depth` counts edges from the root; it is zero exactly when the cursor is
/// on the root. Failed operations leave the position untouched.
pub struct Cursor {
    name: String,
    tree: SyntaxTree,
    current: NodeId,
    depth: usize,
}

impl Cursor {
    pub fn new(name: impl Into<String>, source: Rc<SourceText>) -> Self {
        let tree = SyntaxTree::new(source);
        let current = tree.root();
        Self {
            name: name.into(),
            tree,
            current,
            depth: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn current_node(&self) -> &SyntaxNode {
        self.tree.node(self.current)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn enter(&mut self, child: NodeId) {
        self.current = child;
        self.depth += 1;
    }

    /// Move to an attached child, attaching a location key on first use.
    pub fn down(&mut self, key: &str, session: &Session) -> Result<()> {
        if let Some(child) = self.tree.child(self.current, key) {
            self.enter(child);
            return Ok(());
        }
        let Some(at) = Position::parse_key(key) else {
            return Err(AstoundError::NoSuchChild(key.to_string()));
        };
        if let Some(child) = self.tree.child(self.current, &at.key()) {
            self.enter(child);
            return Ok(());
        }
        self.attach(key, session)
    }

    /// Attach the body leaf at `key` and move onto it.
    pub fn attach(&mut self, key: &str, session: &Session) -> Result<()> {
        let child = self.tree.attach_structural(self.current, key, session)?;
        self.enter(child);
        Ok(())
    }

    /// Attach under a caller-chosen name without moving.
    pub fn attach_manual(&mut self, name: &str, link: ManualLink) -> Result<NodeId> {
        self.tree.attach_manual(self.current, name, link)
    }

    /// Load `path` and attach its module under `path` as the key, without moving.
    pub fn link_source(&mut self, path: &str) -> Result<NodeId> {
        let source = SourceText::open(path)?;
        self.attach_manual(path, ManualLink::Source(source))
    }

    /// [`Self::link_source`], then move onto the linked module.
    pub fn link_source_and_descend(&mut self, path: &str) -> Result<()> {
        let child = self.link_source(path)?;
        self.enter(child);
        Ok(())
    }

    pub fn up(&mut self) -> Result<()> {
        let parent = self.current_node().parent().ok_or(AstoundError::AtRoot)?;
        self.current = parent;
        self.depth -= 1;
        Ok(())
    }

    /// Depth, current node, reachable-but-unattached leaves and attached children.
    pub fn report(&self, session: &Session) -> Result<String> {
        let node = self.current_node();
        let attached = node.children();
        let reachable = self.tree.body(self.current, session)?;

        let mut out = String::new();
        let _ = writeln!(out, "Cursor '{}' at depth {}", self.name, self.depth);
        let _ = writeln!(out, "Current node: {}", node.describe());

        let _ = writeln!(out, "Unattached children:");
        let mut any = false;
        for component in reachable.iter().filter(|c| !attached.contains_key(&c.key())) {
            any = true;
            let _ = writeln!(out, "  {}  [{}]", component.describe(), component.tag.trim());
        }
        if !any {
            let _ = writeln!(out, "  (none)");
        }

        let _ = writeln!(out, "Attached children:");
        if attached.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (key, child) in attached {
            let _ = writeln!(out, "  {key}: {}", self.tree.node(*child).describe());
        }
        Ok(out)
    }

    /// Outline of everything attached, with the cursor position starred.
    pub fn render_tree(&self) -> String {
        self.tree.render(self.tree.root(), Some(self.current))
    }

    /// Source lines spanned by the current node.
    pub fn node_text(&self) -> String {
        let node = self.current_node();
        match node.raw() {
            Some(raw) => node.source().view_text(raw.start.line, raw.end.line),
            None => String::new(),
        }
    }

    /// Lines `start..=end` of the current node's file.
    pub fn view_lines(&self, start: usize, end: usize) -> String {
        self.current_node().source().view_text(start, end)
    }

    pub fn summarize(&mut self, session: &Session) -> Result<String> {
        summarize::summarize(&mut self.tree, self.current, session)
    }

    pub fn inherited_from(&self) -> Option<String> {
        self.tree.inherited_from(self.current)
    }

    pub fn core_text(&self) -> String {
        self.tree.core_text(self.current)
    }
}
