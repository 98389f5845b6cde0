//! File-scoped name/definition resolution for call sites.
//!
//! No imports are followed and nothing is executed: a call resolves to the
//! same-named definitions of its own file, to a Python builtin, or to nothing.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::syntax::{NodeKind, Position, RawNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Dotted name, e.g. `shapes.Square.area` or `builtins.super`.
    pub full_name: String,
    /// File holding the definition, when known.
    pub path: Option<PathBuf>,
}

impl Candidate {
    /// Whether this resolves to the `super` builtin, not merely a name containing it.
    pub fn is_super_call(&self) -> bool {
        self.full_name.split('.').any(|segment| segment == "super")
    }

    /// Last dotted component.
    pub fn short_name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }
}

pub trait NameResolver {
    /// Candidates for the expression starting at `at`, best first. May be empty.
    fn resolve(&self, at: Position) -> Vec<Candidate>;
}

/// Resolver that never finds anything; for sources without a usable index.
#[derive(Debug, Default)]
pub struct NullResolver;

impl NameResolver for NullResolver {
    fn resolve(&self, _at: Position) -> Vec<Candidate> {
        Vec::new()
    }
}

const PY_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "callable", "dict", "dir", "enumerate", "filter", "float", "format",
    "getattr", "hasattr", "hash", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "map", "max", "min", "next", "object", "open", "print", "range", "repr", "reversed", "round", "set",
    "setattr", "sorted", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

#[derive(Debug, Clone)]
struct Definition {
    name: String,
    qualified: String,
}

pub struct LocalResolver {
    path: Option<PathBuf>,
    /// Call start → dotted callee path (`obj.method`, `super().run`).
    calls: HashMap<Position, String>,
    definitions: Vec<Definition>,
}

impl LocalResolver {
    pub fn index(root: &RawNode, module: &str, path: Option<PathBuf>) -> Self {
        let mut calls = HashMap::new();
        root.walk(&mut |node| {
            if node.kind == NodeKind::Call {
                // Pre-order: the outermost call at a position wins.
                calls
                    .entry(node.start)
                    .or_insert_with(|| callee_path(node.node_field("func").map(|f| &**f)));
            }
        });

        let mut definitions = Vec::new();
        let mut scope = vec![module.to_string()];
        collect_definitions(root, &mut scope, &mut definitions);

        Self {
            path,
            calls,
            definitions,
        }
    }
}

fn callee_path(node: Option<&RawNode>) -> String {
    let Some(node) = node else {
        return "<expr>".to_string();
    };
    match node.kind {
        NodeKind::Name => node.text_field("id").unwrap_or_default().to_string(),
        NodeKind::Attribute => format!(
            "{}.{}",
            callee_path(node.node_field("value").map(|v| &**v)),
            node.text_field("attr").unwrap_or_default()
        ),
        NodeKind::Call => format!("{}()", callee_path(node.node_field("func").map(|f| &**f))),
        NodeKind::Subscript => format!("{}[]", callee_path(node.node_field("value").map(|v| &**v))),
        _ => "<expr>".to_string(),
    }
}

fn collect_definitions(node: &RawNode, scope: &mut Vec<String>, out: &mut Vec<Definition>) {
    let named_scope = matches!(
        node.kind,
        NodeKind::FunctionDef | NodeKind::AsyncFunctionDef | NodeKind::ClassDef
    );
    if named_scope {
        let name = node.display_name();
        scope.push(name.clone());
        out.push(Definition {
            name,
            qualified: scope.join("."),
        });
    }
    for (_, value) in &node.fields {
        for child in value.children() {
            collect_definitions(child, scope, out);
        }
    }
    if named_scope {
        scope.pop();
    }
}

impl NameResolver for LocalResolver {
    fn resolve(&self, at: Position) -> Vec<Candidate> {
        let Some(callee) = self.calls.get(&at) else {
            return Vec::new();
        };

        if callee.split('.').next() == Some("super()") {
            return vec![Candidate {
                full_name: "builtins.super".to_string(),
                path: None,
            }];
        }

        let target = callee
            .rsplit('.')
            .next()
            .unwrap_or(callee)
            .trim_end_matches("()")
            .trim_end_matches("[]");

        let local: Vec<Candidate> = self
            .definitions
            .iter()
            .filter(|def| def.name == target)
            .map(|def| Candidate {
                full_name: def.qualified.clone(),
                path: self.path.clone(),
            })
            .collect();
        if !local.is_empty() {
            return local;
        }

        if PY_BUILTINS.contains(&target) {
            return vec![Candidate {
                full_name: format!("builtins.{target}"),
                path: None,
            }];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::parse_python;

    const SRC: &str = "\
class A:
    def foo(self):
        return 1

class B(A):
    def foo(self):
        return super().foo()

    def bar(self):
        self.foo()
        print(len([]))
        unknown_thing()
";

    fn resolver() -> LocalResolver {
        let root = parse_python(SRC).unwrap();
        LocalResolver::index(&root, "shapes", Some(PathBuf::from("shapes.py")))
    }

    #[test]
    fn super_calls_resolve_to_builtin_super() {
        let found = resolver().resolve(Position::new(7, 15));
        assert_eq!(found.len(), 1);
        assert!(found[0].is_super_call());
    }

    #[test]
    fn method_calls_resolve_to_every_local_definition() {
        let found = resolver().resolve(Position::new(10, 8));
        let names: Vec<&str> = found.iter().map(|c| c.full_name.as_str()).collect();
        assert_eq!(names, vec!["shapes.A.foo", "shapes.B.foo"]);
        assert_eq!(found[0].short_name(), "foo");
        assert_eq!(found[0].path.as_deref(), Some(std::path::Path::new("shapes.py")));
    }

    #[test]
    fn names_containing_super_are_ordinary_calls() {
        let root = parse_python("def supervise():\n    return 1\n\nsupervise()\n").unwrap();
        let found = LocalResolver::index(&root, "superstore", None).resolve(Position::new(4, 0));
        assert_eq!(found[0].full_name, "superstore.supervise");
        assert!(!found[0].is_super_call());
    }

    #[test]
    fn builtins_and_unknowns() {
        let r = resolver();
        assert_eq!(r.resolve(Position::new(11, 8))[0].full_name, "builtins.print");
        assert_eq!(r.resolve(Position::new(11, 14))[0].full_name, "builtins.len");
        assert!(r.resolve(Position::new(12, 8)).is_empty());
        assert!(r.resolve(Position::new(1, 0)).is_empty());
    }
}
