//! Child-field discovery: which attributes of a node kind hold child nodes.
//!
//! The static table covers the lowered grammar. The oracle resolver asks a
//! text-generation service once per kind, validates the answer against a
//! concrete instance and stores it in a persistent [`FieldCache`].

use std::rc::Rc;

use crate::cache::FieldCache;
use crate::error::{AstoundError, Result};
use crate::generate::{GenerationRequest, GenerationSettings, TextGenerator};
use crate::syntax::{FieldValue, NodeKind, RawNode};

pub trait FieldResolver {
    /// Ordered child-holding fields of `sample`'s kind. `sample` is a concrete
    /// instance so answers can be validated against real attributes.
    fn fields_for(&self, sample: &RawNode) -> Result<Vec<String>>;
}

/// Compiled field table for every kind the lowering produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticFieldTable;

impl StaticFieldTable {
    pub fn lookup(kind: NodeKind) -> Option<&'static [&'static str]> {
        use NodeKind::*;
        let fields: &'static [&'static str] = match kind {
            Module => &["body"],
            FunctionDef | AsyncFunctionDef => &["args", "body", "decorator_list", "returns"],
            ClassDef => &["bases", "keywords", "body", "decorator_list"],
            Return | Await | Yield | YieldFrom | Expr | Starred | Keyword => &["value"],
            Delete => &["targets"],
            Assign => &["targets", "value"],
            AugAssign => &["target", "value"],
            AnnAssign => &["target", "annotation", "value"],
            For | AsyncFor => &["target", "iter", "body", "orelse"],
            While | If => &["test", "body", "orelse"],
            With | AsyncWith => &["items", "body"],
            WithItem => &["context_expr", "optional_vars"],
            Raise => &["exc", "cause"],
            Try => &["body", "handlers", "orelse", "finalbody"],
            ExceptHandler => &["type", "body"],
            Assert => &["test", "msg"],
            Import | ImportFrom => &["names"],
            BoolOp => &["values"],
            NamedExpr => &["target", "value"],
            BinOp => &["left", "right"],
            UnaryOp => &["operand"],
            Lambda => &["args", "body"],
            IfExp => &["test", "body", "orelse"],
            Dict => &["keys", "values"],
            Set | List | Tuple => &["elts"],
            ListComp | SetComp | GeneratorExp => &["elt", "generators"],
            DictComp => &["key", "value", "generators"],
            Comprehension => &["target", "iter", "ifs"],
            Compare => &["left", "comparators"],
            Call => &["func", "args", "keywords"],
            Attribute => &["value"],
            Subscript => &["value", "slice"],
            Slice => &["lower", "upper", "step"],
            Arguments => &["args", "vararg", "kwarg", "defaults"],
            Arg => &["annotation"],
            Alias | Global | Nonlocal | Pass | Break | Continue | Constant | Name => &[],
            Eq | NotEq | Lt | LtE | Gt | GtE | Is | IsNot | In | NotIn => &[],
            Unknown(_) => return None,
        };
        Some(fields)
    }
}

impl FieldResolver for StaticFieldTable {
    fn fields_for(&self, sample: &RawNode) -> Result<Vec<String>> {
        Self::lookup(sample.kind)
            .map(|fields| fields.iter().map(|f| f.to_string()).collect())
            .ok_or_else(|| AstoundError::UnresolvedKind {
                kind: sample.kind.label().to_string(),
                reason: "kind is not in the static field table".to_string(),
            })
    }
}

/// A candidate is valid when the instance has it and it holds nothing, a
/// node, or a list of nodes. Empty lists are accepted: the field may simply
/// be unused on this instance.
pub fn validate_field(sample: &RawNode, field: &str) -> bool {
    match sample.field(field) {
        None => {
            tracing::warn!(kind = %sample.kind, field, "oracle proposed a field the kind does not have");
            false
        }
        Some(FieldValue::None | FieldValue::Node(_) | FieldValue::Nodes(_)) => true,
        Some(FieldValue::Texts(texts)) if texts.is_empty() => true,
        Some(FieldValue::Text(_) | FieldValue::Texts(_)) => {
            tracing::warn!(kind = %sample.kind, field, "oracle proposed a field that holds no nodes");
            false
        }
    }
}

/// Split an oracle answer into field-name candidates, dropping stray characters.
pub fn parse_field_list(response: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for piece in response.split(',') {
        let name = piece
            .trim()
            .trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
        if name.is_empty() || out.iter().any(|seen| seen == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

fn split_cached(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

pub const DEFAULT_FIELD_SYSTEM: &str =
    "You are an expert on Python's ast module. Answer with a comma-separated list of field names and nothing else.";

pub const DEFAULT_FIELD_QUERY: &str = "Which subfields of a python ast node of type {kind} contain child nodes? \
Omit fields that contain only strings. Strongly consider fields named 'value', 'func', or 'body'. \
Return only immediate subfields, i.e. 'subfield' is ok but 'subfield.subsubfield' is not.";

/// Oracle-backed discovery with a persistent, insert-only cache.
pub struct OracleFieldResolver {
    cache: Box<dyn FieldCache>,
    generator: Rc<dyn TextGenerator>,
    model: String,
    settings: GenerationSettings,
    system: String,
    template: String,
}

impl OracleFieldResolver {
    pub fn new(cache: Box<dyn FieldCache>, generator: Rc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            cache,
            generator,
            model: model.into(),
            settings: GenerationSettings::field_query(),
            system: DEFAULT_FIELD_SYSTEM.to_string(),
            template: DEFAULT_FIELD_QUERY.to_string(),
        }
    }

    pub fn with_prompts(mut self, system: impl Into<String>, template: impl Into<String>) -> Self {
        self.system = system.into();
        self.template = template.into();
        self
    }

    /// Token budget only; temperature stays at 0 to keep cached answers stable.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.settings.max_tokens = max_tokens;
        self
    }

    fn unresolved(kind: &str, reason: impl ToString) -> AstoundError {
        AstoundError::UnresolvedKind {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FieldResolver for OracleFieldResolver {
    fn fields_for(&self, sample: &RawNode) -> Result<Vec<String>> {
        let kind = sample.kind.label();

        if let Some(cached) = self.cache.get(kind)? {
            tracing::debug!(kind, fields = %cached, "field cache hit");
            return Ok(split_cached(&cached));
        }

        tracing::info!(kind, "querying oracle for child fields");
        let prompt = self.template.replace("{kind}", kind);
        let request = GenerationRequest::new(&self.model, &self.settings, &self.system, prompt);
        let answer = self
            .generator
            .generate(&request)
            .map_err(|e| Self::unresolved(kind, e))?;

        let fields: Vec<String> = parse_field_list(&answer)
            .into_iter()
            .filter(|field| validate_field(sample, field))
            .collect();
        let joined = fields.join(",");
        tracing::debug!(kind, fields = %joined, "generated field list");

        self.cache.put(kind, &joined)?;
        Ok(fields)
    }
}

/// Static table first; the oracle only for kinds the table does not know.
pub struct LayeredFieldResolver {
    oracle: Option<OracleFieldResolver>,
}

impl LayeredFieldResolver {
    pub fn new(oracle: Option<OracleFieldResolver>) -> Self {
        Self { oracle }
    }
}

impl FieldResolver for LayeredFieldResolver {
    fn fields_for(&self, sample: &RawNode) -> Result<Vec<String>> {
        if let Some(fields) = StaticFieldTable::lookup(sample.kind) {
            return Ok(fields.iter().map(|f| f.to_string()).collect());
        }
        match &self.oracle {
            Some(oracle) => oracle.fields_for(sample),
            None => Err(OracleFieldResolver::unresolved(
                sample.kind.label(),
                "kind is not in the static field table and no oracle is configured",
            )),
        }
    }
}
