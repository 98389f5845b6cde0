//! The simplified, caller-curated tree.
//!
//! Nodes live in an arena owned by [`SyntaxTree`]; a node owns its children
//! through their ids and points back at its parent by id. Nodes are only
//! ever added, never removed.

use std::cell::OnceCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{AstoundError, Result};
use crate::fields::FieldResolver;
use crate::session::Session;
use crate::simplify::{self, Component};
use crate::source::SourceText;
use crate::syntax::{NodeKind, Position, RawNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub struct SyntaxNode {
    /// `None` marks a placeholder left by a node that collapsed to nothing.
    raw: Option<Rc<RawNode>>,
    source: Rc<SourceText>,
    parent: Option<NodeId>,
    children: IndexMap<String, NodeId>,
    summary: String,
    inherited_from: OnceCell<Option<String>>,
}

impl SyntaxNode {
    fn build(raw: &Rc<RawNode>, source: Rc<SourceText>, parent: Option<NodeId>) -> Self {
        Self {
            raw: simplify::simplify(raw),
            source,
            parent,
            children: IndexMap::new(),
            summary: String::new(),
            inherited_from: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.raw.as_ref().map(|raw| raw.kind)
    }

    pub fn raw(&self) -> Option<&Rc<RawNode>> {
        self.raw.as_ref()
    }

    pub fn source(&self) -> &Rc<SourceText> {
        &self.source
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &IndexMap<String, NodeId> {
        &self.children
    }

    /// Cached summary; empty until computed.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn name(&self) -> String {
        match self.raw.as_deref() {
            Some(raw) if raw.kind == NodeKind::Module => self
                .source
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Some(raw) => raw.display_name(),
            None => String::new(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        self.kind().map(|kind| kind.label()).unwrap_or("<collapsed>")
    }

    /// `Kind 'name'`
    pub fn describe(&self) -> String {
        format!("{} '{}'", self.kind_label(), self.name())
    }
}

/// What a manual link attaches.
pub enum ManualLink {
    /// The root of an independently loaded file.
    Source(Rc<SourceText>),
    /// A deep copy of a node already in the tree.
    Node(NodeId),
}

pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn new(source: Rc<SourceText>) -> Self {
        let raw = Rc::clone(source.root());
        Self {
            nodes: vec![SyntaxNode::build(&raw, source, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: SyntaxNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.node(id).children.get(key).copied()
    }

    /// Navigable leaves directly inside the node's `body`.
    pub fn body(&self, id: NodeId, session: &Session) -> Result<Vec<Component>> {
        simplify::body(self.node(id).raw.as_ref(), session.split_depth(), session.fields())
    }

    pub fn split(&self, id: NodeId, tag: &str, max_depth: usize, fields: &dyn FieldResolver) -> Result<Vec<Component>> {
        simplify::split(self.node(id).raw.as_ref(), tag, max_depth, fields)
    }

    /// Attach the body leaf starting at `key` ("line,col") under `parent`.
    pub fn attach_structural(&mut self, parent: NodeId, key: &str, session: &Session) -> Result<NodeId> {
        let at = Position::parse_key(key).ok_or_else(|| AstoundError::NoSuchChild(key.to_string()))?;
        let key = at.key();
        if self.node(parent).children.contains_key(&key) {
            return Err(AstoundError::DuplicateChildKey(key));
        }

        let leaf = self
            .body(parent, session)?
            .into_iter()
            .find(|component| component.node.start == at)
            .ok_or(AstoundError::InvalidLocation {
                line: at.line,
                col: at.col,
            })?;

        let source = Rc::clone(&self.node(parent).source);
        let id = self.push(SyntaxNode::build(&leaf.node, source, Some(parent)));
        self.nodes[parent.0].children.insert(key, id);
        tracing::debug!(key = %at, node = %self.node(id).describe(), "attached structural child");
        Ok(id)
    }

    /// Attach a node under a caller-chosen `name`, independent of location.
    pub fn attach_manual(&mut self, parent: NodeId, name: &str, link: ManualLink) -> Result<NodeId> {
        if self.node(parent).children.contains_key(name) {
            return Err(AstoundError::DuplicateChildKey(name.to_string()));
        }
        let id = match link {
            ManualLink::Source(source) => {
                let root = Rc::clone(source.root());
                self.push(SyntaxNode::build(&root, source, Some(parent)))
            }
            ManualLink::Node(original) => self.copy_subtree(original, parent),
        };
        self.nodes[parent.0].children.insert(name.to_string(), id);
        tracing::debug!(name, node = %self.node(id).describe(), "attached manual link");
        Ok(id)
    }

    fn copy_subtree(&mut self, from: NodeId, parent: NodeId) -> NodeId {
        let original = self.node(from);
        let copy = SyntaxNode {
            raw: original.raw.clone(),
            source: Rc::clone(&original.source),
            parent: Some(parent),
            children: IndexMap::new(),
            summary: original.summary.clone(),
            inherited_from: OnceCell::new(),
        };
        let children: Vec<(String, NodeId)> = original.children.iter().map(|(k, v)| (k.clone(), *v)).collect();

        let id = self.push(copy);
        for (key, child) in children {
            let child_copy = self.copy_subtree(child, id);
            self.nodes[id.0].children.insert(key, child_copy);
        }
        id
    }

    /// Single base of the nearest enclosing class: `Some("")` for a class
    /// without bases, `None` when there is no enclosing class.
    pub fn inherited_from(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        node.inherited_from
            .get_or_init(|| match node.raw.as_deref() {
                Some(raw) if raw.kind == NodeKind::ClassDef => Some(first_base(raw, &node.source)),
                _ => node.parent.and_then(|parent| self.inherited_from(parent)),
            })
            .clone()
    }

    /// Source text handed to the summarizer for this node.
    pub fn core_text(&self, id: NodeId) -> String {
        let node = self.node(id);
        let Some(raw) = node.raw.as_deref() else {
            return String::new();
        };
        match raw.kind {
            NodeKind::Module => String::new(),
            NodeKind::Call => self.call_text(id, raw),
            _ => node.source.lines(raw.start.line, raw.end.line),
        }
    }

    fn call_text(&self, id: NodeId, call: &RawNode) -> String {
        let source = &self.node(id).source;
        let Some(candidate) = source.resolver().resolve(call.start).into_iter().next() else {
            tracing::debug!(at = %call.start, "call did not resolve");
            return AstoundError::DefinitionNotFound.to_string();
        };

        if candidate.is_super_call() {
            let base = self.inherited_from(id).unwrap_or_default();
            return format!("Function call '{}' inherited from {}", source.slice(call.span.clone()), base);
        }

        let defining = match candidate.path.as_deref() {
            Some(path) if path != source.path() => match SourceText::open(path) {
                Ok(other) => other,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot load defining file");
                    return AstoundError::DefinitionNotFound.to_string();
                }
            },
            _ => Rc::clone(source),
        };

        let target = candidate.short_name();
        let mut found: Option<&RawNode> = None;
        defining.root().walk(&mut |node| {
            if found.is_none() && node.kind.is_function_def() && node.display_name() == target {
                found = Some(node);
            }
        });
        match found {
            Some(def) => defining.lines(def.start.line, def.end.line),
            None => {
                tracing::debug!(name = %candidate.full_name, "resolved name has no function definition");
                AstoundError::DefinitionNotFound.to_string()
            }
        }
    }

    /// Store a computed summary. A summary, once set, is final.
    pub fn set_summary(&mut self, id: NodeId, summary: String) {
        let node = &mut self.nodes[id.0];
        if node.summary.is_empty() {
            node.summary = summary;
        }
    }

    /// Indented outline of attached nodes below `from`; `marker` is starred.
    pub fn render(&self, from: NodeId, marker: Option<NodeId>) -> String {
        let mut out = String::new();
        self.render_into(from, "<root>", 0, marker, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, key: &str, indent: usize, marker: Option<NodeId>, out: &mut String) {
        let star = if marker == Some(id) { " *" } else { "" };
        out.push_str(&format!("{}{key}: {}{star}\n", "  ".repeat(indent), self.node(id).describe()));
        for (child_key, child) in &self.node(id).children {
            self.render_into(*child, child_key, indent + 1, marker, out);
        }
    }
}

fn first_base(class: &RawNode, source: &SourceText) -> String {
    let bases = class.list_field("bases");
    let Some(first) = bases.first() else {
        return String::new();
    };
    if let Some(warning) = multiple_bases(class) {
        tracing::warn!("{warning}");
    }
    source
        .slice(first.span.clone())
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// The warning for a class declaring more than one base, if it does.
fn multiple_bases(class: &RawNode) -> Option<AstoundError> {
    let count = class.list_field("bases").len();
    (count > 1).then(|| AstoundError::MultipleBasesUnsupported {
        class: class.display_name(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::StaticFieldTable;
    use crate::resolve::NullResolver;

    fn session() -> Session {
        Session::new(Box::new(StaticFieldTable))
    }

    fn tree(src: &str) -> SyntaxTree {
        SyntaxTree::new(Rc::new(SourceText::from_text("shapes.py", src).unwrap()))
    }

    const CLASSES: &str = "\
class A:
    def foo(self):
        return 1

class B(A):
    def foo(self):
        return super().foo()

    def bar(self):
        helper()
        print(self)

class C(A, B):
    pass

def helper():
    return 2
";

    // ── structural attach ──

    #[test]
    fn attach_by_location() {
        let mut t = tree("x = 1\nprint(x)\n");
        let s = session();
        let call = t.attach_structural(t.root(), "2,0", &s).unwrap();
        assert_eq!(t.node(call).kind(), Some(NodeKind::Call));
        assert_eq!(t.node(call).name(), "print");
        assert_eq!(t.node(call).parent(), Some(t.root()));
        assert_eq!(t.child(t.root(), "2,0"), Some(call));
    }

    #[test]
    fn keys_are_normalized_before_duplicate_check() {
        let mut t = tree("x = 1\nprint(x)\n");
        let s = session();
        t.attach_structural(t.root(), "2,0", &s).unwrap();
        let err = t.attach_structural(t.root(), "2, 0", &s).unwrap_err();
        assert!(matches!(err, AstoundError::DuplicateChildKey(ref k) if k == "2,0"));
        assert_eq!(t.node(t.root()).children().len(), 1);
    }

    #[test]
    fn unknown_location_is_rejected() {
        let mut t = tree("x = 1\nprint(x)\n");
        let s = session();
        let err = t.attach_structural(t.root(), "1,2", &s).unwrap_err();
        assert!(matches!(err, AstoundError::InvalidLocation { line: 1, col: 2 }));
        assert!(matches!(
            t.attach_structural(t.root(), "nope", &s).unwrap_err(),
            AstoundError::NoSuchChild(_)
        ));
        assert_eq!(t.len(), 1);
    }

    // ── inheritance ──

    #[test]
    fn inherited_from_walks_up_to_the_class() {
        let mut t = tree(CLASSES);
        let s = session();
        let a = t.attach_structural(t.root(), "1,0", &s).unwrap();
        let b = t.attach_structural(t.root(), "5,0", &s).unwrap();
        let foo = t.attach_structural(b, "6,4", &s).unwrap();
        let call = t.attach_structural(foo, "7,15", &s).unwrap();

        assert_eq!(t.inherited_from(a).as_deref(), Some(""));
        assert_eq!(t.inherited_from(call).as_deref(), Some("A"));
        assert_eq!(t.inherited_from(t.root()), None);
    }

    #[test]
    fn multiple_bases_use_the_first() {
        let mut t = tree(CLASSES);
        let c = t.attach_structural(t.root(), "13,0", &session()).unwrap();
        assert_eq!(t.inherited_from(c).as_deref(), Some("A"));

        let class_c = t.node(c).raw().unwrap();
        assert!(matches!(
            multiple_bases(class_c),
            Some(AstoundError::MultipleBasesUnsupported { ref class, count: 2 }) if class == "C"
        ));
        let b = t.attach_structural(t.root(), "5,0", &session()).unwrap();
        assert!(multiple_bases(t.node(b).raw().unwrap()).is_none());
    }

    // ── core text ──

    #[test]
    fn module_text_is_empty_and_defs_use_their_lines() {
        let mut t = tree(CLASSES);
        assert_eq!(t.core_text(t.root()), "");
        let helper = t.attach_structural(t.root(), "16,0", &session()).unwrap();
        assert_eq!(t.core_text(helper), "def helper():\n    return 2");
    }

    #[test]
    fn super_calls_name_the_base() {
        let mut t = tree(CLASSES);
        let s = session();
        let b = t.attach_structural(t.root(), "5,0", &s).unwrap();
        let foo = t.attach_structural(b, "6,4", &s).unwrap();
        let call = t.attach_structural(foo, "7,15", &s).unwrap();

        let text = t.core_text(call);
        assert!(text.contains("super().foo()"));
        assert!(text.contains('A'));
    }

    #[test]
    fn calls_resolve_to_the_first_matching_definition() {
        let mut t = tree(CLASSES);
        let s = session();
        let b = t.attach_structural(t.root(), "5,0", &s).unwrap();
        let bar = t.attach_structural(b, "9,4", &s).unwrap();
        let helper = t.attach_structural(bar, "10,8", &s).unwrap();
        let print = t.attach_structural(bar, "11,8", &s).unwrap();

        assert_eq!(t.core_text(helper), "def helper():\n    return 2");
        assert_eq!(t.core_text(print), AstoundError::DefinitionNotFound.to_string());
    }

    #[test]
    fn super_inside_a_name_is_not_a_super_call() {
        let mut t = SyntaxTree::new(Rc::new(
            SourceText::from_text("superstore.py", "def supervise():\n    return 1\n\nsupervise()\n").unwrap(),
        ));
        let call = t.attach_structural(t.root(), "4,0", &session()).unwrap();
        assert_eq!(t.core_text(call), "def supervise():\n    return 1");
    }

    #[test]
    fn injected_resolver_replaces_the_local_index() {
        let source = SourceText::from_text("m.py", "def f():\n    pass\n\nf()\n")
            .unwrap()
            .with_resolver(Box::new(NullResolver));
        assert_eq!(source.text(), "def f():\n    pass\n\nf()\n");
        let mut t = SyntaxTree::new(Rc::new(source));
        let call = t.attach_structural(t.root(), "4,0", &session()).unwrap();
        assert_eq!(t.core_text(call), AstoundError::DefinitionNotFound.to_string());
    }

    #[test]
    fn split_depth_bounds_body_leaves() {
        let t = tree("total = price * qty\n");
        let shallow = Session::new(Box::new(StaticFieldTable)).with_split_depth(1);
        let leaves = t.body(t.root(), &shallow).unwrap();
        let described: Vec<String> = leaves.iter().map(|c| c.describe()).collect();
        assert_eq!(described, vec!["Name 'total' at key '1,0'", "BinOp '' at key '1,8' (truncated)"]);
    }

    // ── manual links ──

    #[test]
    fn manual_source_link_keeps_its_own_file() {
        let mut t = tree("x = 1\n");
        let other = Rc::new(SourceText::from_text("util.py", "def f():\n    pass\n").unwrap());
        let linked = t.attach_manual(t.root(), "util", ManualLink::Source(other)).unwrap();

        assert_eq!(t.node(linked).kind(), Some(NodeKind::Module));
        assert_eq!(t.node(linked).name(), "util.py");
        let f = t.attach_structural(linked, "1,0", &session()).unwrap();
        assert_eq!(t.core_text(f), "def f():\n    pass");
        assert!(matches!(
            t.attach_manual(t.root(), "util", ManualLink::Node(f)).unwrap_err(),
            AstoundError::DuplicateChildKey(_)
        ));
    }

    #[test]
    fn node_links_are_deep_copies_rebound_to_the_new_parent() {
        let mut t = tree(CLASSES);
        let s = session();
        let b = t.attach_structural(t.root(), "5,0", &s).unwrap();
        let foo = t.attach_structural(b, "6,4", &s).unwrap();
        t.attach_structural(foo, "7,15", &s).unwrap();
        let helper = t.attach_structural(t.root(), "16,0", &s).unwrap();

        let copy = t.attach_manual(helper, "foo copy", ManualLink::Node(foo)).unwrap();
        assert_ne!(copy, foo);
        assert_eq!(t.node(copy).parent(), Some(helper));
        assert_eq!(t.node(copy).children().len(), 1);
        assert_eq!(t.node(foo).parent(), Some(b));
        // No class above the copy any more.
        assert_eq!(t.inherited_from(copy), None);
        assert_eq!(t.inherited_from(foo).as_deref(), Some("A"));
    }

    #[test]
    fn summaries_are_final() {
        let mut t = tree("x = 1\n");
        let root = t.root();
        t.set_summary(root, "first".to_string());
        t.set_summary(root, "second".to_string());
        assert_eq!(t.node(root).summary(), "first");
    }

    #[test]
    fn render_marks_the_given_node() {
        let mut t = tree("x = 1\nprint(x)\n");
        let call = t.attach_structural(t.root(), "2,0", &session()).unwrap();
        let out = t.render(t.root(), Some(call));
        assert_eq!(out, "<root>: Module 'shapes.py'\n  2,0: Call 'print' *\n");
    }
}
