//! Simplification rules: collapse noise kinds, stop at rich kinds, split
//! everything else into navigable leaves.

use std::rc::Rc;

use crate::error::Result;
use crate::fields::FieldResolver;
use crate::syntax::{NodeKind, RawNode};

/// What construction does with a node of a collapsing kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapse {
    /// Replace the node with the child held in this field.
    ToField(&'static str),
    /// Replace the node with nothing.
    ToNothing,
}

/// Kinds that construction replaces. Everything else is kept as is.
pub const COLLAPSE_TABLE: &[(NodeKind, Collapse)] = &[
    (NodeKind::Expr, Collapse::ToField("value")),
    (NodeKind::Return, Collapse::ToField("value")),
    (NodeKind::Yield, Collapse::ToField("value")),
    (NodeKind::Await, Collapse::ToField("value")),
    (NodeKind::UnaryOp, Collapse::ToField("operand")),
    (NodeKind::Assert, Collapse::ToField("test")),
    (NodeKind::Constant, Collapse::ToNothing),
    (NodeKind::Eq, Collapse::ToNothing),
    (NodeKind::List, Collapse::ToNothing),
    (NodeKind::Tuple, Collapse::ToNothing),
    (NodeKind::Dict, Collapse::ToNothing),
    (NodeKind::Import, Collapse::ToNothing),
    (NodeKind::ImportFrom, Collapse::ToNothing),
];

/// Kinds that are never decomposed: atomic units of navigation.
pub const RICH_KINDS: &[NodeKind] = &[
    NodeKind::Module,
    NodeKind::FunctionDef,
    NodeKind::AsyncFunctionDef,
    NodeKind::ClassDef,
    NodeKind::Call,
    NodeKind::Name,
];

pub fn collapse_rule(kind: NodeKind) -> Option<Collapse> {
    COLLAPSE_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, rule)| *rule)
}

pub fn is_rich(kind: NodeKind) -> bool {
    RICH_KINDS.contains(&kind)
}

/// Apply the collapse table until a kept kind (or nothing) remains.
///
/// A collapsing node whose designated field is empty collapses to nothing
/// (`return` without a value).
pub fn simplify(raw: &Rc<RawNode>) -> Option<Rc<RawNode>> {
    let mut current = Rc::clone(raw);
    loop {
        match collapse_rule(current.kind) {
            None => return Some(current),
            Some(Collapse::ToNothing) => return None,
            Some(Collapse::ToField(field)) => {
                current = Rc::clone(current.node_field(field)?);
            }
        }
    }
}

/// One navigable leaf produced by [`split`], with the path that reached it.
#[derive(Debug, Clone)]
pub struct Component {
    pub node: Rc<RawNode>,
    pub tag: String,
    pub truncated: bool,
}

impl Component {
    pub fn key(&self) -> String {
        self.node.start.key()
    }

    /// `Kind 'name' at key 'l,c'`
    pub fn describe(&self) -> String {
        let suffix = if self.truncated { " (truncated)" } else { "" };
        format!(
            "{} '{}' at key '{}'{}",
            self.node.kind,
            self.node.display_name(),
            self.key(),
            suffix
        )
    }
}

/// Flatten `node` into leaves without entering a rich descendant.
///
/// `node` is taken post-collapse; `None` is a collapsed placeholder and yields
/// nothing. Results follow field-declaration order, then list order.
pub fn split(
    node: Option<&Rc<RawNode>>,
    tag: &str,
    max_depth: usize,
    fields: &dyn FieldResolver,
) -> Result<Vec<Component>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };

    if is_rich(node.kind) {
        return Ok(vec![Component {
            node: Rc::clone(node),
            tag: tag.to_string(),
            truncated: false,
        }]);
    }
    if max_depth == 0 {
        return Ok(vec![Component {
            node: Rc::clone(node),
            tag: tag.to_string(),
            truncated: true,
        }]);
    }

    let mut components = Vec::new();
    for field in fields.fields_for(node)? {
        let Some(value) = node.field(&field) else {
            tracing::warn!(kind = %node.kind, field = %field, "node has no such field");
            continue;
        };
        let child_tag = format!("{tag} {}.{field} >>", node.kind);
        for child in value.children() {
            let simplified = simplify(child);
            components.extend(split(simplified.as_ref(), &child_tag, max_depth - 1, fields)?);
        }
    }
    Ok(components)
}

/// Leaves directly inside `node`'s `body` attribute, placeholders removed.
pub fn body(node: Option<&Rc<RawNode>>, max_depth: usize, fields: &dyn FieldResolver) -> Result<Vec<Component>> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };

    let mut components = Vec::new();
    for stmt in node.list_field("body") {
        let simplified = simplify(stmt);
        components.extend(split(simplified.as_ref(), "", max_depth, fields)?);
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::StaticFieldTable;
    use crate::lower::parse_python;

    fn first_stmt(src: &str) -> Rc<RawNode> {
        let module = parse_python(src).unwrap();
        Rc::clone(&module.list_field("body")[0])
    }

    #[test]
    fn expression_statement_collapses_to_inner_call() {
        let stmt = first_stmt("print(x)\n");
        assert_eq!(stmt.kind, NodeKind::Expr);
        let node = simplify(&stmt).unwrap();
        assert_eq!(node.kind, NodeKind::Call);
        assert_eq!(node.start, stmt.start);
    }

    #[test]
    fn nested_collapses_apply_recursively() {
        // Expr -> Await -> Call
        let module = parse_python("async def f():\n    await g()\n").unwrap();
        let def = &module.list_field("body")[0];
        let stmt = &def.list_field("body")[0];
        assert_eq!(simplify(stmt).unwrap().kind, NodeKind::Call);
    }

    #[test]
    fn constants_and_imports_collapse_to_nothing() {
        assert!(simplify(&first_stmt("42\n")).is_none());
        assert!(simplify(&first_stmt("import os\n")).is_none());
        assert!(simplify(&first_stmt("from a import b\n")).is_none());
        assert!(simplify(&first_stmt("return\n")).is_none());
    }

    #[test]
    fn rich_kinds_are_atomic_at_any_depth() {
        let fields = StaticFieldTable;
        let def = first_stmt("def f():\n    return 1\n");
        for depth in [0, 1, 5] {
            let parts = split(Some(&def), "t", depth, &fields).unwrap();
            assert_eq!(parts.len(), 1);
            assert!(Rc::ptr_eq(&parts[0].node, &def));
            assert_eq!(parts[0].tag, "t");
            assert!(!parts[0].truncated);
        }
    }

    #[test]
    fn depth_limit_marks_truncation() {
        let fields = StaticFieldTable;
        let node = simplify(&first_stmt("a.b + c\n")).unwrap();
        let parts = split(Some(&node), "", 0, &fields).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].truncated);
        assert!(parts[0].describe().ends_with("(truncated)"));
    }

    #[test]
    fn operators_split_into_operands() {
        let fields = StaticFieldTable;
        let node = simplify(&first_stmt("total = price * qty + tax(x)\n")).unwrap();
        let parts = split(Some(&node), "", 3, &fields).unwrap();
        let names: Vec<String> = parts.iter().map(|c| c.node.display_name()).collect();
        assert_eq!(names, vec!["total", "price", "qty", "tax"]);
        assert_eq!(parts[0].tag, " Assign.targets >>");
        assert_eq!(parts[1].tag, " Assign.value >> BinOp.left >> BinOp.left >>");
        assert_eq!(parts[3].node.kind, NodeKind::Call);
        assert_eq!(parts[3].tag, " Assign.value >> BinOp.right >>");
    }

    #[test]
    fn boolean_test_reaches_comparison_operands() {
        let fields = StaticFieldTable;
        let node = simplify(&first_stmt("assert a == b\n")).unwrap();
        assert_eq!(node.kind, NodeKind::Compare);
        let parts = split(Some(&node), "", 2, &fields).unwrap();
        let names: Vec<String> = parts.iter().map(|c| c.node.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn body_skips_collapsed_statements() {
        let fields = StaticFieldTable;
        let module = Rc::new(parse_python("import os\n1\nx = 1\nprint(x)\n").unwrap());
        let parts = body(Some(&module), 2, &fields).unwrap();
        let keys: Vec<String> = parts.iter().map(Component::key).collect();
        // `x` from the assignment target, then the print call.
        assert_eq!(keys, vec!["3,0", "4,0"]);
        assert_eq!(parts[1].node.kind, NodeKind::Call);
    }
}
