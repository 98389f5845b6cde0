//! Owned abstract-grammar tree for Python source.
//!
//! `RawNode` is what the engine navigates: kind labels and field names follow
//! Python's abstract grammar (`Assign.targets`, `Call.func`, ...), so field
//! discovery and simplification can be expressed per kind. The tree is built
//! once per file by [`crate::lower`] and shared via `Rc`.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Structural child key, `"line,col"`.
    pub fn key(&self) -> String {
        format!("{},{}", self.line, self.col)
    }

    /// Parse a structural key. Whitespace around either number is ignored.
    pub fn parse_key(key: &str) -> Option<Self> {
        let (line, col) = key.split_once(',')?;
        let line = line.trim().parse().ok()?;
        let col = col.trim().parse().ok()?;
        Some(Self { line, col })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    FunctionDef,
    AsyncFunctionDef,
    ClassDef,
    Return,
    Delete,
    Assign,
    AugAssign,
    AnnAssign,
    For,
    AsyncFor,
    While,
    If,
    With,
    AsyncWith,
    WithItem,
    Raise,
    Try,
    ExceptHandler,
    Assert,
    Import,
    ImportFrom,
    Alias,
    Global,
    Nonlocal,
    Expr,
    Pass,
    Break,
    Continue,
    BoolOp,
    NamedExpr,
    BinOp,
    UnaryOp,
    Lambda,
    IfExp,
    Dict,
    Set,
    ListComp,
    SetComp,
    DictComp,
    GeneratorExp,
    Comprehension,
    Await,
    Yield,
    YieldFrom,
    Compare,
    Call,
    Keyword,
    Constant,
    Attribute,
    Subscript,
    Slice,
    Starred,
    Name,
    List,
    Tuple,
    Arguments,
    Arg,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
    /// Concrete-tree kind with no abstract-grammar mapping.
    Unknown(&'static str),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Module => "Module",
            Self::FunctionDef => "FunctionDef",
            Self::AsyncFunctionDef => "AsyncFunctionDef",
            Self::ClassDef => "ClassDef",
            Self::Return => "Return",
            Self::Delete => "Delete",
            Self::Assign => "Assign",
            Self::AugAssign => "AugAssign",
            Self::AnnAssign => "AnnAssign",
            Self::For => "For",
            Self::AsyncFor => "AsyncFor",
            Self::While => "While",
            Self::If => "If",
            Self::With => "With",
            Self::AsyncWith => "AsyncWith",
            Self::WithItem => "withitem",
            Self::Raise => "Raise",
            Self::Try => "Try",
            Self::ExceptHandler => "ExceptHandler",
            Self::Assert => "Assert",
            Self::Import => "Import",
            Self::ImportFrom => "ImportFrom",
            Self::Alias => "alias",
            Self::Global => "Global",
            Self::Nonlocal => "Nonlocal",
            Self::Expr => "Expr",
            Self::Pass => "Pass",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::BoolOp => "BoolOp",
            Self::NamedExpr => "NamedExpr",
            Self::BinOp => "BinOp",
            Self::UnaryOp => "UnaryOp",
            Self::Lambda => "Lambda",
            Self::IfExp => "IfExp",
            Self::Dict => "Dict",
            Self::Set => "Set",
            Self::ListComp => "ListComp",
            Self::SetComp => "SetComp",
            Self::DictComp => "DictComp",
            Self::GeneratorExp => "GeneratorExp",
            Self::Comprehension => "comprehension",
            Self::Await => "Await",
            Self::Yield => "Yield",
            Self::YieldFrom => "YieldFrom",
            Self::Compare => "Compare",
            Self::Call => "Call",
            Self::Keyword => "keyword",
            Self::Constant => "Constant",
            Self::Attribute => "Attribute",
            Self::Subscript => "Subscript",
            Self::Slice => "Slice",
            Self::Starred => "Starred",
            Self::Name => "Name",
            Self::List => "List",
            Self::Tuple => "Tuple",
            Self::Arguments => "arguments",
            Self::Arg => "arg",
            Self::Eq => "Eq",
            Self::NotEq => "NotEq",
            Self::Lt => "Lt",
            Self::LtE => "LtE",
            Self::Gt => "Gt",
            Self::GtE => "GtE",
            Self::Is => "Is",
            Self::IsNot => "IsNot",
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Unknown(kind) => kind,
        }
    }

    pub fn is_function_def(&self) -> bool {
        matches!(self, Self::FunctionDef | Self::AsyncFunctionDef)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Field exists on the kind but holds nothing here (e.g. `Return` without a value).
    None,
    Node(Rc<RawNode>),
    Nodes(Vec<Rc<RawNode>>),
    Text(String),
    Texts(Vec<String>),
}

impl FieldValue {
    pub fn from_option(node: Option<RawNode>) -> Self {
        match node {
            Some(node) => Self::Node(Rc::new(node)),
            None => Self::None,
        }
    }

    pub fn nodes(nodes: Vec<RawNode>) -> Self {
        Self::Nodes(nodes.into_iter().map(Rc::new).collect())
    }

    /// Child nodes held by this value, in order. Text scalars hold none.
    pub fn children(&self) -> Vec<&Rc<RawNode>> {
        match self {
            Self::Node(node) => vec![node],
            Self::Nodes(nodes) => nodes.iter().collect(),
            Self::None | Self::Text(_) | Self::Texts(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawNode {
    pub kind: NodeKind,
    pub start: Position,
    pub end: Position,
    /// Byte range in the owning file's text.
    pub span: Range<usize>,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl RawNode {
    pub fn new(kind: NodeKind, start: Position, end: Position, span: Range<usize>) -> Self {
        Self {
            kind,
            start,
            end,
            span,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &'static str, value: FieldValue) -> Self {
        self.fields.push((name, value));
        self
    }

    pub fn with_node(self, name: &'static str, node: RawNode) -> Self {
        self.with_field(name, FieldValue::Node(Rc::new(node)))
    }

    pub fn with_text(self, name: &'static str, text: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::Text(text.into()))
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn node_field(&self, name: &str) -> Option<&Rc<RawNode>> {
        match self.field(name)? {
            FieldValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn list_field(&self, name: &str) -> &[Rc<RawNode>] {
        match self.field(name) {
            Some(FieldValue::Nodes(nodes)) => nodes,
            _ => &[],
        }
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        match self.field(name)? {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The name-like attribute of this node, wherever the kind stores it.
    pub fn display_name(&self) -> String {
        if self.kind == NodeKind::Call {
            return self
                .node_field("func")
                .map(|func| func.display_name())
                .unwrap_or_default();
        }
        ["name", "id", "attr", "arg", "asname"]
            .iter()
            .find_map(|alias| self.text_field(alias))
            .unwrap_or_default()
            .to_string()
    }

    /// Pre-order walk over this node and every descendant, following field order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a RawNode)) {
        visit(self);
        for (_, value) in &self.fields {
            for child in value.children() {
                child.walk(visit);
            }
        }
    }
}
