//! tree-sitter-python → abstract-grammar lowering.
//!
//! The concrete tree keeps every token; the engine wants Python's abstract
//! grammar (`Assign.targets`, `Call.func`, `If.orelse`, ...). Kinds with no
//! mapping are kept as `NodeKind::Unknown` with their tree-sitter fields.

use tree_sitter::{Node, Parser};

use crate::error::{AstoundError, Result};
use crate::syntax::{FieldValue, NodeKind, Position, RawNode};

/// Parse Python source text into an owned `Module` node.
pub fn parse_python(text: &str) -> Result<RawNode> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| AstoundError::Parse(format!("tree-sitter language: {e}")))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| AstoundError::Parse("tree-sitter returned no tree".to_string()))?;

    Ok(Lowerer { text }.module(tree.root_node()))
}

fn position(point: tree_sitter::Point) -> Position {
    Position::new(point.row + 1, point.column)
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Every child with the field name it sits under, anonymous tokens included.
fn fielded_children(node: Node<'_>) -> Vec<(Option<&'static str>, Node<'_>)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            out.push((cursor.field_name(), cursor.node()));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    fielded_children(node)
        .iter()
        .any(|(_, child)| !child.is_named() && child.kind() == token)
}

fn comparison_op(token: &str) -> Option<NodeKind> {
    Some(match token {
        "==" => NodeKind::Eq,
        "!=" | "<>" => NodeKind::NotEq,
        "<" => NodeKind::Lt,
        "<=" => NodeKind::LtE,
        ">" => NodeKind::Gt,
        ">=" => NodeKind::GtE,
        "is" => NodeKind::Is,
        "is not" => NodeKind::IsNot,
        "in" => NodeKind::In,
        "not in" => NodeKind::NotIn,
        _ => return None,
    })
}

struct Lowerer<'a> {
    text: &'a str,
}

impl<'a> Lowerer<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        &self.text[node.start_byte()..node.end_byte()]
    }

    fn base(&self, kind: NodeKind, node: Node<'_>) -> RawNode {
        RawNode::new(
            kind,
            position(node.start_position()),
            position(node.end_position()),
            node.start_byte()..node.end_byte(),
        )
    }

    fn module(&self, root: Node<'_>) -> RawNode {
        let body = self.statements(root);
        let mut module = self.base(NodeKind::Module, root);
        module.start = Position::new(1, 0);
        module.with_field("body", FieldValue::nodes(body))
    }

    fn statements(&self, node: Node<'_>) -> Vec<RawNode> {
        named_children(node)
            .into_iter()
            .flat_map(|child| match child.kind() {
                "block" => self.statements(child),
                _ => vec![self.statement(child)],
            })
            .collect()
    }

    /// Statements of the first `block` child (else/finally/except suites).
    fn suite(&self, node: Node<'_>) -> Vec<RawNode> {
        if let Some(body) = node.child_by_field_name("body") {
            return self.statements(body);
        }
        named_children(node)
            .into_iter()
            .find(|child| child.kind() == "block")
            .map(|block| self.statements(block))
            .unwrap_or_default()
    }

    fn opt_expr(&self, node: Option<Node<'_>>) -> FieldValue {
        FieldValue::from_option(node.map(|n| self.expr(n)))
    }

    fn statement(&self, node: Node<'_>) -> RawNode {
        match node.kind() {
            "expression_statement" => self.expression_statement(node),
            "return_statement" => self
                .base(NodeKind::Return, node)
                .with_field("value", self.opt_expr(named_children(node).first().copied())),
            "pass_statement" => self.base(NodeKind::Pass, node),
            "break_statement" => self.base(NodeKind::Break, node),
            "continue_statement" => self.base(NodeKind::Continue, node),
            "delete_statement" => {
                let targets = named_children(node)
                    .into_iter()
                    .flat_map(|child| self.elements(child))
                    .collect();
                self.base(NodeKind::Delete, node)
                    .with_field("targets", FieldValue::nodes(targets))
            }
            "if_statement" => self.if_statement(node),
            "for_statement" => self.for_statement(node),
            "while_statement" => self
                .base(NodeKind::While, node)
                .with_field("test", self.opt_expr(node.child_by_field_name("condition")))
                .with_field("body", self.body_field(node))
                .with_field("orelse", self.alternative_suite(node)),
            "try_statement" => self.try_statement(node),
            "with_statement" => self.with_statement(node),
            "function_definition" => self.function_def(node, Vec::new()),
            "class_definition" => self.class_def(node, Vec::new()),
            "decorated_definition" => self.decorated(node),
            "import_statement" => self.import(NodeKind::Import, node),
            "import_from_statement" | "future_import_statement" => self.import(NodeKind::ImportFrom, node),
            "assert_statement" => {
                let parts = named_children(node);
                self.base(NodeKind::Assert, node)
                    .with_field("test", self.opt_expr(parts.first().copied()))
                    .with_field("msg", self.opt_expr(parts.get(1).copied()))
            }
            "raise_statement" => {
                let exc = fielded_children(node)
                    .into_iter()
                    .find(|(field, child)| field.is_none() && child.is_named())
                    .map(|(_, child)| child);
                self.base(NodeKind::Raise, node)
                    .with_field("exc", self.opt_expr(exc))
                    .with_field("cause", self.opt_expr(node.child_by_field_name("cause")))
            }
            "global_statement" | "nonlocal_statement" => {
                let kind = if node.kind() == "global_statement" {
                    NodeKind::Global
                } else {
                    NodeKind::Nonlocal
                };
                let names = named_children(node)
                    .into_iter()
                    .map(|child| self.text(child).to_string())
                    .collect();
                self.base(kind, node).with_field("names", FieldValue::Texts(names))
            }
            _ => self.expr(node),
        }
    }

    fn body_field(&self, node: Node<'_>) -> FieldValue {
        let body = node
            .child_by_field_name("body")
            .or_else(|| node.child_by_field_name("consequence"))
            .map(|block| self.statements(block))
            .unwrap_or_default();
        FieldValue::nodes(body)
    }

    fn alternative_suite(&self, node: Node<'_>) -> FieldValue {
        let orelse = node
            .child_by_field_name("alternative")
            .map(|alt| self.suite(alt))
            .unwrap_or_default();
        FieldValue::nodes(orelse)
    }

    fn expression_statement(&self, node: Node<'_>) -> RawNode {
        let parts = named_children(node);
        match parts.as_slice() {
            [inner] if inner.kind() == "assignment" => self.assignment(node, *inner),
            [inner] if inner.kind() == "augmented_assignment" => self
                .base(NodeKind::AugAssign, node)
                .with_field("target", self.opt_expr(inner.child_by_field_name("left")))
                .with_text(
                    "op",
                    inner
                        .child_by_field_name("operator")
                        .map(|op| self.text(op))
                        .unwrap_or_default(),
                )
                .with_field("value", self.opt_expr(inner.child_by_field_name("right"))),
            [inner] => self.base(NodeKind::Expr, node).with_node("value", self.expr(*inner)),
            _ => {
                let elts = parts.iter().map(|part| self.expr(*part)).collect();
                let tuple = self
                    .base(NodeKind::Tuple, node)
                    .with_field("elts", FieldValue::nodes(elts));
                self.base(NodeKind::Expr, node).with_node("value", tuple)
            }
        }
    }

    fn assignment(&self, statement: Node<'_>, node: Node<'_>) -> RawNode {
        if let Some(annotation) = node.child_by_field_name("type") {
            return self
                .base(NodeKind::AnnAssign, statement)
                .with_field("target", self.opt_expr(node.child_by_field_name("left")))
                .with_node("annotation", self.expr(annotation))
                .with_field("value", self.opt_expr(node.child_by_field_name("right")));
        }

        // `a = b = v` nests assignments on the right-hand side.
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(self.expr(left));
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                right => break right,
            }
        };

        self.base(NodeKind::Assign, statement)
            .with_field("targets", FieldValue::nodes(targets))
            .with_field("value", self.opt_expr(value))
    }

    fn if_statement(&self, node: Node<'_>) -> RawNode {
        let mut alternatives = Vec::new();
        let mut cursor = node.walk();
        for alt in node.children_by_field_name("alternative", &mut cursor) {
            alternatives.push(alt);
        }

        let mut orelse = Vec::new();
        for alt in alternatives.into_iter().rev() {
            orelse = match alt.kind() {
                "elif_clause" => vec![self
                    .base(NodeKind::If, alt)
                    .with_field("test", self.opt_expr(alt.child_by_field_name("condition")))
                    .with_field("body", self.body_field(alt))
                    .with_field("orelse", FieldValue::nodes(orelse))],
                _ => self.suite(alt),
            };
        }

        self.base(NodeKind::If, node)
            .with_field("test", self.opt_expr(node.child_by_field_name("condition")))
            .with_field("body", self.body_field(node))
            .with_field("orelse", FieldValue::nodes(orelse))
    }

    fn for_statement(&self, node: Node<'_>) -> RawNode {
        let kind = if has_token(node, "async") {
            NodeKind::AsyncFor
        } else {
            NodeKind::For
        };
        self.base(kind, node)
            .with_field("target", self.opt_expr(node.child_by_field_name("left")))
            .with_field("iter", self.opt_expr(node.child_by_field_name("right")))
            .with_field("body", self.body_field(node))
            .with_field("orelse", self.alternative_suite(node))
    }

    fn try_statement(&self, node: Node<'_>) -> RawNode {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for child in named_children(node) {
            match child.kind() {
                "except_clause" | "except_group_clause" => handlers.push(self.except_handler(child)),
                "else_clause" => orelse = self.suite(child),
                "finally_clause" => finalbody = self.suite(child),
                _ => {}
            }
        }

        self.base(NodeKind::Try, node)
            .with_field("body", self.body_field(node))
            .with_field("handlers", FieldValue::nodes(handlers))
            .with_field("orelse", FieldValue::nodes(orelse))
            .with_field("finalbody", FieldValue::nodes(finalbody))
    }

    fn except_handler(&self, node: Node<'_>) -> RawNode {
        let parts: Vec<Node<'_>> = named_children(node)
            .into_iter()
            .filter(|child| child.kind() != "block")
            .collect();

        let (type_node, name) = match parts.as_slice() {
            [] => (None, None),
            [single] if single.kind() == "as_pattern" => {
                let inner = named_children(*single);
                let alias = single.child_by_field_name("alias").map(|a| self.text(a));
                (inner.first().copied(), alias)
            }
            [single] => (Some(*single), None),
            [first, second, ..] => (Some(*first), Some(self.text(*second))),
        };

        let handler = self
            .base(NodeKind::ExceptHandler, node)
            .with_field("type", self.opt_expr(type_node));
        let handler = match name {
            Some(name) => handler.with_text("name", name),
            None => handler.with_field("name", FieldValue::None),
        };
        handler.with_field("body", FieldValue::nodes(self.suite(node)))
    }

    fn with_statement(&self, node: Node<'_>) -> RawNode {
        let kind = if has_token(node, "async") {
            NodeKind::AsyncWith
        } else {
            NodeKind::With
        };

        let mut items = Vec::new();
        for clause in named_children(node).into_iter().filter(|c| c.kind() == "with_clause") {
            for item in named_children(clause) {
                let value = item.child_by_field_name("value").unwrap_or(item);
                let (context, vars) = if value.kind() == "as_pattern" {
                    let target = value
                        .child_by_field_name("alias")
                        .map(|alias| named_children(alias).first().copied().unwrap_or(alias));
                    (named_children(value).first().copied(), target)
                } else {
                    (Some(value), None)
                };
                items.push(
                    self.base(NodeKind::WithItem, item)
                        .with_field("context_expr", self.opt_expr(context))
                        .with_field("optional_vars", self.opt_expr(vars)),
                );
            }
        }

        self.base(kind, node)
            .with_field("items", FieldValue::nodes(items))
            .with_field("body", self.body_field(node))
    }

    fn decorated(&self, node: Node<'_>) -> RawNode {
        let decorators: Vec<RawNode> = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "decorator")
            .filter_map(|decorator| named_children(decorator).first().map(|e| self.expr(*e)))
            .collect();

        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "class_definition" => self.class_def(def, decorators),
            Some(def) => self.function_def(def, decorators),
            None => self.generic(node),
        }
    }

    fn function_def(&self, node: Node<'_>, decorators: Vec<RawNode>) -> RawNode {
        let kind = if has_token(node, "async") {
            NodeKind::AsyncFunctionDef
        } else {
            NodeKind::FunctionDef
        };
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();

        self.base(kind, node)
            .with_text("name", name)
            .with_field(
                "args",
                FieldValue::from_option(node.child_by_field_name("parameters").map(|p| self.parameters(p))),
            )
            .with_field("body", self.body_field(node))
            .with_field("decorator_list", FieldValue::nodes(decorators))
            .with_field("returns", self.opt_expr(node.child_by_field_name("return_type")))
    }

    fn class_def(&self, node: Node<'_>, decorators: Vec<RawNode>) -> RawNode {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();

        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            for arg in named_children(superclasses) {
                match arg.kind() {
                    "keyword_argument" => keywords.push(self.expr(arg)),
                    _ => bases.push(self.expr(arg)),
                }
            }
        }

        self.base(NodeKind::ClassDef, node)
            .with_text("name", name)
            .with_field("bases", FieldValue::nodes(bases))
            .with_field("keywords", FieldValue::nodes(keywords))
            .with_field("body", self.body_field(node))
            .with_field("decorator_list", FieldValue::nodes(decorators))
    }

    fn parameters(&self, node: Node<'_>) -> RawNode {
        let mut args = Vec::new();
        let mut defaults = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;

        for param in named_children(node) {
            let name_node = param.child_by_field_name("name").unwrap_or(param);
            let annotation = param.child_by_field_name("type");
            let (target, slot) = match param.kind() {
                "typed_parameter" => {
                    let inner = named_children(param).first().copied().unwrap_or(param);
                    match inner.kind() {
                        "list_splat_pattern" => (inner, 1),
                        "dictionary_splat_pattern" => (inner, 2),
                        _ => (inner, 0),
                    }
                }
                "list_splat_pattern" => (param, 1),
                "dictionary_splat_pattern" => (param, 2),
                "keyword_separator" | "positional_separator" => continue,
                _ => (name_node, 0),
            };

            let arg_name = match slot {
                0 => self.text(target).to_string(),
                _ => named_children(target)
                    .first()
                    .map(|n| self.text(*n).to_string())
                    .unwrap_or_default(),
            };
            let arg = self
                .base(NodeKind::Arg, param)
                .with_text("arg", arg_name)
                .with_field("annotation", self.opt_expr(annotation));

            if let Some(value) = param.child_by_field_name("value") {
                defaults.push(self.expr(value));
            }
            match slot {
                1 => vararg = Some(arg),
                2 => kwarg = Some(arg),
                _ => args.push(arg),
            }
        }

        self.base(NodeKind::Arguments, node)
            .with_field("args", FieldValue::nodes(args))
            .with_field("vararg", FieldValue::from_option(vararg))
            .with_field("kwarg", FieldValue::from_option(kwarg))
            .with_field("defaults", FieldValue::nodes(defaults))
    }

    fn import(&self, kind: NodeKind, node: Node<'_>) -> RawNode {
        let mut names = Vec::new();
        for (field, child) in fielded_children(node) {
            if child.kind() == "wildcard_import" {
                names.push(self.base(NodeKind::Alias, child).with_text("name", "*"));
                continue;
            }
            if field != Some("name") {
                continue;
            }
            let alias = match child.kind() {
                "aliased_import" => {
                    let name = child.child_by_field_name("name").map(|n| self.text(n)).unwrap_or_default();
                    let asname = child.child_by_field_name("alias").map(|n| self.text(n)).unwrap_or_default();
                    self.base(NodeKind::Alias, child)
                        .with_text("name", name)
                        .with_text("asname", asname)
                }
                _ => self.base(NodeKind::Alias, child).with_text("name", self.text(child)),
            };
            names.push(alias);
        }

        let import = self.base(kind, node);
        let import = match node.child_by_field_name("module_name") {
            Some(module) => import.with_text("module", self.text(module)),
            None if kind == NodeKind::ImportFrom => import.with_text("module", "__future__"),
            None => import,
        };
        import.with_field("names", FieldValue::nodes(names))
    }

    /// Elements of a comma list, or the node itself.
    fn elements(&self, node: Node<'_>) -> Vec<RawNode> {
        match node.kind() {
            "expression_list" | "pattern_list" => {
                named_children(node).into_iter().map(|e| self.expr(e)).collect()
            }
            _ => vec![self.expr(node)],
        }
    }

    fn expr(&self, node: Node<'_>) -> RawNode {
        match node.kind() {
            "identifier" | "keyword_identifier" => self.base(NodeKind::Name, node).with_text("id", self.text(node)),
            "attribute" => {
                let attr = node
                    .child_by_field_name("attribute")
                    .map(|a| self.text(a))
                    .unwrap_or_default();
                self.base(NodeKind::Attribute, node)
                    .with_field("value", self.opt_expr(node.child_by_field_name("object")))
                    .with_text("attr", attr)
            }
            "call" => self.call(node),
            "integer" | "float" | "string" | "concatenated_string" | "true" | "false" | "none" | "ellipsis" => {
                self.base(NodeKind::Constant, node).with_text("value", self.text(node))
            }
            "binary_operator" => self
                .base(NodeKind::BinOp, node)
                .with_field("left", self.opt_expr(node.child_by_field_name("left")))
                .with_text(
                    "op",
                    node.child_by_field_name("operator").map(|op| self.text(op)).unwrap_or_default(),
                )
                .with_field("right", self.opt_expr(node.child_by_field_name("right"))),
            "boolean_operator" => {
                let values = [node.child_by_field_name("left"), node.child_by_field_name("right")]
                    .into_iter()
                    .flatten()
                    .map(|v| self.expr(v))
                    .collect();
                self.base(NodeKind::BoolOp, node)
                    .with_text(
                        "op",
                        node.child_by_field_name("operator").map(|op| self.text(op)).unwrap_or_default(),
                    )
                    .with_field("values", FieldValue::nodes(values))
            }
            "not_operator" => self
                .base(NodeKind::UnaryOp, node)
                .with_text("op", "not")
                .with_field("operand", self.opt_expr(node.child_by_field_name("argument"))),
            "unary_operator" => self
                .base(NodeKind::UnaryOp, node)
                .with_text(
                    "op",
                    node.child_by_field_name("operator").map(|op| self.text(op)).unwrap_or_default(),
                )
                .with_field("operand", self.opt_expr(node.child_by_field_name("argument"))),
            "comparison_operator" => self.compare(node),
            "lambda" => self
                .base(NodeKind::Lambda, node)
                .with_field(
                    "args",
                    FieldValue::from_option(node.child_by_field_name("parameters").map(|p| self.parameters(p))),
                )
                .with_field("body", self.opt_expr(node.child_by_field_name("body"))),
            "conditional_expression" => {
                let parts = named_children(node);
                self.base(NodeKind::IfExp, node)
                    .with_field("test", self.opt_expr(parts.get(1).copied()))
                    .with_field("body", self.opt_expr(parts.first().copied()))
                    .with_field("orelse", self.opt_expr(parts.get(2).copied()))
            }
            "list" | "list_pattern" => self.sequence(NodeKind::List, node),
            "tuple" | "tuple_pattern" | "expression_list" | "pattern_list" => self.sequence(NodeKind::Tuple, node),
            "set" => self.sequence(NodeKind::Set, node),
            "dictionary" => self.dictionary(node),
            "parenthesized_expression" | "type" | "decorator" | "as_pattern_target" => {
                match named_children(node).first() {
                    Some(inner) => self.expr(*inner),
                    None => self.generic(node),
                }
            }
            "list_comprehension" => self.comprehension(NodeKind::ListComp, node),
            "set_comprehension" => self.comprehension(NodeKind::SetComp, node),
            "generator_expression" => self.comprehension(NodeKind::GeneratorExp, node),
            "dictionary_comprehension" => self.comprehension(NodeKind::DictComp, node),
            "subscript" => self.subscript(node),
            "slice" => self.slice(node),
            "await" => self
                .base(NodeKind::Await, node)
                .with_field("value", self.opt_expr(named_children(node).first().copied())),
            "yield" => {
                let kind = if has_token(node, "from") {
                    NodeKind::YieldFrom
                } else {
                    NodeKind::Yield
                };
                self.base(kind, node)
                    .with_field("value", self.opt_expr(named_children(node).first().copied()))
            }
            "list_splat" | "list_splat_pattern" => self
                .base(NodeKind::Starred, node)
                .with_field("value", self.opt_expr(named_children(node).first().copied())),
            "named_expression" => self
                .base(NodeKind::NamedExpr, node)
                .with_field("target", self.opt_expr(node.child_by_field_name("name")))
                .with_field("value", self.opt_expr(node.child_by_field_name("value"))),
            "keyword_argument" => {
                let arg = node.child_by_field_name("name").map(|n| self.text(n)).unwrap_or_default();
                self.base(NodeKind::Keyword, node)
                    .with_text("arg", arg)
                    .with_field("value", self.opt_expr(node.child_by_field_name("value")))
            }
            "dictionary_splat" => self
                .base(NodeKind::Keyword, node)
                .with_field("arg", FieldValue::None)
                .with_field("value", self.opt_expr(named_children(node).first().copied())),
            "as_pattern" => match named_children(node).first() {
                Some(inner) => self.expr(*inner),
                None => self.generic(node),
            },
            _ => self.generic(node),
        }
    }

    fn sequence(&self, kind: NodeKind, node: Node<'_>) -> RawNode {
        let elts = named_children(node).into_iter().map(|e| self.expr(e)).collect();
        self.base(kind, node).with_field("elts", FieldValue::nodes(elts))
    }

    fn dictionary(&self, node: Node<'_>) -> RawNode {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for entry in named_children(node) {
            match entry.kind() {
                "pair" => {
                    if let Some(key) = entry.child_by_field_name("key") {
                        keys.push(self.expr(key));
                    }
                    if let Some(value) = entry.child_by_field_name("value") {
                        values.push(self.expr(value));
                    }
                }
                _ => {
                    if let Some(inner) = named_children(entry).first() {
                        values.push(self.expr(*inner));
                    }
                }
            }
        }
        self.base(NodeKind::Dict, node)
            .with_field("keys", FieldValue::nodes(keys))
            .with_field("values", FieldValue::nodes(values))
    }

    fn call(&self, node: Node<'_>) -> RawNode {
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        match node.child_by_field_name("arguments") {
            Some(arguments) if arguments.kind() == "generator_expression" => args.push(self.expr(arguments)),
            Some(arguments) => {
                for arg in named_children(arguments) {
                    match arg.kind() {
                        "keyword_argument" | "dictionary_splat" => keywords.push(self.expr(arg)),
                        _ => args.push(self.expr(arg)),
                    }
                }
            }
            None => {}
        }

        self.base(NodeKind::Call, node)
            .with_field("func", self.opt_expr(node.child_by_field_name("function")))
            .with_field("args", FieldValue::nodes(args))
            .with_field("keywords", FieldValue::nodes(keywords))
    }

    fn compare(&self, node: Node<'_>) -> RawNode {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        for (field, child) in fielded_children(node) {
            if field == Some("operators") {
                let kind = comparison_op(child.kind()).unwrap_or(NodeKind::Unknown(child.kind()));
                ops.push(self.base(kind, child));
            } else if child.is_named() && child.kind() != "comment" {
                operands.push(self.expr(child));
            }
        }

        let mut operands = operands.into_iter();
        let left = operands.next();
        self.base(NodeKind::Compare, node)
            .with_field("left", FieldValue::from_option(left))
            .with_field("ops", FieldValue::nodes(ops))
            .with_field("comparators", FieldValue::nodes(operands.collect()))
    }

    fn comprehension(&self, kind: NodeKind, node: Node<'_>) -> RawNode {
        let mut generators: Vec<RawNode> = Vec::new();
        let mut ifs: Vec<Vec<RawNode>> = Vec::new();

        for clause in named_children(node) {
            match clause.kind() {
                "for_in_clause" => {
                    let target = self.opt_expr(clause.child_by_field_name("left"));
                    let iter = self.opt_expr(clause.child_by_field_name("right"));
                    generators.push(
                        self.base(NodeKind::Comprehension, clause)
                            .with_field("target", target)
                            .with_field("iter", iter),
                    );
                    ifs.push(Vec::new());
                }
                "if_clause" => {
                    if let (Some(slot), Some(test)) = (ifs.last_mut(), named_children(clause).first()) {
                        slot.push(self.expr(*test));
                    }
                }
                _ => {}
            }
        }

        let generators: Vec<RawNode> = generators
            .into_iter()
            .zip(ifs)
            .map(|(generator, ifs)| generator.with_field("ifs", FieldValue::nodes(ifs)))
            .collect();

        let body = node.child_by_field_name("body");
        let comp = self.base(kind, node);
        let comp = match (kind, body) {
            (NodeKind::DictComp, Some(pair)) => comp
                .with_field("key", self.opt_expr(pair.child_by_field_name("key")))
                .with_field("value", self.opt_expr(pair.child_by_field_name("value"))),
            (_, body) => comp.with_field("elt", self.opt_expr(body)),
        };
        comp.with_field("generators", FieldValue::nodes(generators))
    }

    fn subscript(&self, node: Node<'_>) -> RawNode {
        let mut cursor = node.walk();
        let indices: Vec<Node<'_>> = node.children_by_field_name("subscript", &mut cursor).collect();

        let slice = match indices.as_slice() {
            [single] => Some(self.expr(*single)),
            [] => None,
            many => {
                let elts = many.iter().map(|i| self.expr(*i)).collect();
                let first = many[0];
                let last = many[many.len() - 1];
                let mut tuple = RawNode::new(
                    NodeKind::Tuple,
                    position(first.start_position()),
                    position(last.end_position()),
                    first.start_byte()..last.end_byte(),
                );
                tuple.fields.push(("elts", FieldValue::nodes(elts)));
                Some(tuple)
            }
        };

        self.base(NodeKind::Subscript, node)
            .with_field("value", self.opt_expr(node.child_by_field_name("value")))
            .with_field("slice", FieldValue::from_option(slice))
    }

    fn slice(&self, node: Node<'_>) -> RawNode {
        let mut bounds: [Option<RawNode>; 3] = [None, None, None];
        let mut colons = 0usize;
        for (_, child) in fielded_children(node) {
            if !child.is_named() {
                if child.kind() == ":" {
                    colons += 1;
                }
                continue;
            }
            if let Some(slot) = bounds.get_mut(colons) {
                *slot = Some(self.expr(child));
            }
        }
        let [lower, upper, step] = bounds;
        self.base(NodeKind::Slice, node)
            .with_field("lower", FieldValue::from_option(lower))
            .with_field("upper", FieldValue::from_option(upper))
            .with_field("step", FieldValue::from_option(step))
    }

    /// Fallback for kinds without an abstract-grammar mapping: keep the
    /// tree-sitter field layout, unfielded named children under `children`.
    fn generic(&self, node: Node<'_>) -> RawNode {
        let mut groups: Vec<(&'static str, Vec<RawNode>)> = Vec::new();
        for (field, child) in fielded_children(node) {
            if !child.is_named() || child.kind() == "comment" {
                continue;
            }
            let name = field.unwrap_or("children");
            let lowered = self.statement(child);
            match groups.iter_mut().find(|(group, _)| *group == name) {
                Some((_, nodes)) => nodes.push(lowered),
                None => groups.push((name, vec![lowered])),
            }
        }

        let mut raw = self.base(NodeKind::Unknown(node.kind()), node);
        if groups.is_empty() {
            return raw.with_text("text", self.text(node));
        }
        for (name, mut nodes) in groups {
            let value = if nodes.len() == 1 {
                FieldValue::from_option(nodes.pop())
            } else {
                FieldValue::nodes(nodes)
            };
            raw.fields.push((name, value));
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(module: &RawNode) -> Vec<&RawNode> {
        module.list_field("body").iter().map(|n| n.as_ref()).collect()
    }

    #[test]
    fn assignment_and_call_statements() {
        let module = parse_python("x = 1\nprint(x)\n").unwrap();
        assert_eq!(module.kind, NodeKind::Module);
        let stmts = body(&module);
        assert_eq!(stmts.len(), 2);

        assert_eq!(stmts[0].kind, NodeKind::Assign);
        assert_eq!(stmts[0].start, Position::new(1, 0));
        let targets = stmts[0].list_field("targets");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, NodeKind::Name);
        assert_eq!(targets[0].text_field("id"), Some("x"));
        assert_eq!(stmts[0].node_field("value").unwrap().kind, NodeKind::Constant);

        assert_eq!(stmts[1].kind, NodeKind::Expr);
        let call = stmts[1].node_field("value").unwrap();
        assert_eq!(call.kind, NodeKind::Call);
        assert_eq!(call.start, Position::new(2, 0));
        assert_eq!(call.display_name(), "print");
        assert_eq!(call.list_field("args").len(), 1);
    }

    #[test]
    fn chained_assignment_collects_targets() {
        let module = parse_python("a = b = f()\n").unwrap();
        let assign = body(&module)[0];
        let names: Vec<String> = assign.list_field("targets").iter().map(|t| t.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(assign.node_field("value").unwrap().kind, NodeKind::Call);
    }

    #[test]
    fn class_with_base_and_method() {
        let src = "class B(A):\n    def run(self, x=1):\n        return super().run()\n";
        let module = parse_python(src).unwrap();
        let class = body(&module)[0];
        assert_eq!(class.kind, NodeKind::ClassDef);
        assert_eq!(class.display_name(), "B");
        assert_eq!(class.list_field("bases")[0].display_name(), "A");

        let method = &class.list_field("body")[0];
        assert_eq!(method.kind, NodeKind::FunctionDef);
        assert_eq!(method.start, Position::new(2, 4));
        let args = method.node_field("args").unwrap();
        assert_eq!(args.list_field("args").len(), 2);
        assert_eq!(args.list_field("defaults").len(), 1);

        let ret = &method.list_field("body")[0];
        assert_eq!(ret.kind, NodeKind::Return);
        let call = ret.node_field("value").unwrap();
        assert_eq!(call.kind, NodeKind::Call);
        assert_eq!(call.start, Position::new(3, 15));
    }

    #[test]
    fn elif_chain_nests_in_orelse() {
        let src = "if a:\n    pass\nelif b:\n    pass\nelse:\n    x = 2\n";
        let module = parse_python(src).unwrap();
        let top = body(&module)[0];
        assert_eq!(top.kind, NodeKind::If);
        let orelse = top.list_field("orelse");
        assert_eq!(orelse.len(), 1);
        assert_eq!(orelse[0].kind, NodeKind::If);
        let inner_else = orelse[0].list_field("orelse");
        assert_eq!(inner_else[0].kind, NodeKind::Assign);
    }

    #[test]
    fn comparisons_lower_operator_nodes() {
        let module = parse_python("a == b < c\n").unwrap();
        let compare = body(&module)[0].node_field("value").unwrap().clone();
        assert_eq!(compare.kind, NodeKind::Compare);
        let ops: Vec<NodeKind> = compare.list_field("ops").iter().map(|o| o.kind).collect();
        assert_eq!(ops, vec![NodeKind::Eq, NodeKind::Lt]);
        assert_eq!(compare.list_field("comparators").len(), 2);
    }

    #[test]
    fn decorated_async_function() {
        let src = "@cache\nasync def load(url):\n    await fetch(url)\n";
        let module = parse_python(src).unwrap();
        let def = body(&module)[0];
        assert_eq!(def.kind, NodeKind::AsyncFunctionDef);
        assert_eq!(def.start, Position::new(2, 0));
        assert_eq!(def.list_field("decorator_list").len(), 1);
    }
}
