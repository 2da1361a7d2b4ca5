//! Owned expression AST and the per-compilation expression table.
//!
//! Every binding expression found during lowering is parsed once and stored here.
//! Later stages only ever refer to expressions through their [`ExprId`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::span::SourceSpan;

// ═══════════════════════════════════════════════════════════════════════════════
// IDS AND KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque expression handle, dense and stable within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expr#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExprKind {
    /// Plain property/value binding.
    IsProperty,
    /// `pattern of iterable` header of a loop controller.
    IsIterator,
    /// One `${}` part of an interpolation.
    Interpolation,
    /// Event handler body.
    IsFunction,
    /// Ref targets and other custom payloads.
    IsCustom,
}

// ═══════════════════════════════════════════════════════════════════════════════
// AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Literal {
    String { value: String },
    Number { value: f64, raw: String },
    Boolean { value: bool },
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    /// `$this` (ancestor 0), `$parent` (ancestor 1), ...
    AccessThis { span: SourceSpan, ancestor: u32 },
    AccessScope { span: SourceSpan, name: String },
    AccessMember {
        span: SourceSpan,
        object: Box<Expr>,
        name: String,
        name_span: SourceSpan,
        optional: bool,
    },
    AccessKeyed {
        span: SourceSpan,
        object: Box<Expr>,
        key: Box<Expr>,
        optional: bool,
    },
    Call {
        span: SourceSpan,
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    Unary { span: SourceSpan, operator: String, operand: Box<Expr> },
    Binary {
        span: SourceSpan,
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        span: SourceSpan,
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        span: SourceSpan,
        operator: String,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Primitive { span: SourceSpan, value: Literal },
    ArrayLiteral { span: SourceSpan, elements: Vec<Expr> },
    ObjectLiteral {
        span: SourceSpan,
        keys: Vec<String>,
        values: Vec<Expr>,
    },
    Template {
        span: SourceSpan,
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
    ArrowFunction {
        span: SourceSpan,
        params: Vec<String>,
        body: Box<Expr>,
    },
    Paren { span: SourceSpan, expression: Box<Expr> },
    ValueConverter {
        span: SourceSpan,
        expression: Box<Expr>,
        name: String,
        name_span: SourceSpan,
        args: Vec<Expr>,
    },
    BindingBehavior {
        span: SourceSpan,
        expression: Box<Expr>,
        name: String,
        name_span: SourceSpan,
        args: Vec<Expr>,
    },
    /// Unparseable source; the message was already reported as a diagnostic.
    Bad { span: SourceSpan, text: String, message: String },
}

impl Expr {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expr::AccessThis { span, .. }
            | Expr::AccessScope { span, .. }
            | Expr::AccessMember { span, .. }
            | Expr::AccessKeyed { span, .. }
            | Expr::Call { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Primitive { span, .. }
            | Expr::ArrayLiteral { span, .. }
            | Expr::ObjectLiteral { span, .. }
            | Expr::Template { span, .. }
            | Expr::ArrowFunction { span, .. }
            | Expr::Paren { span, .. }
            | Expr::ValueConverter { span, .. }
            | Expr::BindingBehavior { span, .. }
            | Expr::Bad { span, .. } => *span,
        }
    }

    /// Pre-order traversal over this node and all of its descendants.
    pub fn walk<'e>(&'e self, f: &mut dyn FnMut(&'e Expr)) {
        f(self);
        match self {
            Expr::AccessThis { .. }
            | Expr::AccessScope { .. }
            | Expr::Primitive { .. }
            | Expr::Bad { .. } => {}
            Expr::AccessMember { object, .. } => object.walk(f),
            Expr::AccessKeyed { object, key, .. } => {
                object.walk(f);
                key.walk(f);
            }
            Expr::Call { callee, args, .. } => {
                callee.walk(f);
                args.iter().for_each(|a| a.walk(f));
            }
            Expr::Unary { operand, .. } => operand.walk(f),
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                test.walk(f);
                consequent.walk(f);
                alternate.walk(f);
            }
            Expr::Assign { target, value, .. } => {
                target.walk(f);
                value.walk(f);
            }
            Expr::ArrayLiteral { elements, .. } => elements.iter().for_each(|e| e.walk(f)),
            Expr::ObjectLiteral { values, .. } => values.iter().for_each(|e| e.walk(f)),
            Expr::Template { expressions, .. } => expressions.iter().for_each(|e| e.walk(f)),
            Expr::ArrowFunction { body, .. } => body.walk(f),
            Expr::Paren { expression, .. } => expression.walk(f),
            Expr::ValueConverter {
                expression, args, ..
            }
            | Expr::BindingBehavior {
                expression, args, ..
            } => {
                expression.walk(f);
                args.iter().for_each(|a| a.walk(f));
            }
        }
    }

    /// Strips value converters, binding behaviors and parentheses.
    pub fn unwrap_tails(&self) -> &Expr {
        match self {
            Expr::ValueConverter { expression, .. }
            | Expr::BindingBehavior { expression, .. }
            | Expr::Paren { expression, .. } => expression.unwrap_tails(),
            other => other,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ITERATOR HEADERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BindingPattern {
    Identifier {
        span: SourceSpan,
        name: String,
    },
    Array {
        span: SourceSpan,
        elements: Vec<Option<BindingPattern>>,
        rest: Option<Box<BindingPattern>>,
    },
    Object {
        span: SourceSpan,
        keys: Vec<String>,
        values: Vec<BindingPattern>,
        rest: Option<Box<BindingPattern>>,
    },
    /// Anything else on the left of `of`; reported by the scope builder.
    Invalid { span: SourceSpan, text: String },
}

impl BindingPattern {
    pub fn span(&self) -> SourceSpan {
        match self {
            BindingPattern::Identifier { span, .. }
            | BindingPattern::Array { span, .. }
            | BindingPattern::Object { span, .. }
            | BindingPattern::Invalid { span, .. } => *span,
        }
    }
}

/// `key: id` style option following the iterable, after `;`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailOption {
    pub name: String,
    pub name_span: SourceSpan,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForOfStatement {
    pub span: SourceSpan,
    pub declaration: BindingPattern,
    pub iterable: Expr,
    pub tail: Vec<TailOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", content = "node", rename_all = "camelCase")]
pub enum ExprAst {
    Expression(Expr),
    ForOf(ForOfStatement),
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExprTableEntry {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: SourceSpan,
    pub code: String,
    pub ast: ExprAst,
}

impl ExprTableEntry {
    pub fn expression(&self) -> Option<&Expr> {
        match &self.ast {
            ExprAst::Expression(e) => Some(e),
            ExprAst::ForOf(_) => None,
        }
    }

    pub fn for_of(&self) -> Option<&ForOfStatement> {
        match &self.ast {
            ExprAst::ForOf(f) => Some(f),
            ExprAst::Expression(_) => None,
        }
    }
}

/// Deduplicated store of parsed expressions; entries are keyed by kind and span.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExprTable {
    entries: Vec<ExprTableEntry>,
    #[serde(skip)]
    index: HashMap<(ExprKind, SourceSpan), ExprId>,
}

impl ExprTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for an identical (kind, span) pair, or allocates the next one.
    pub fn intern(&mut self, kind: ExprKind, span: SourceSpan, code: &str, ast: ExprAst) -> ExprId {
        if let Some(id) = self.index.get(&(kind, span)) {
            return *id;
        }
        let id = ExprId(self.entries.len() as u32);
        self.entries.push(ExprTableEntry {
            id,
            kind,
            span,
            code: code.to_string(),
            ast,
        });
        self.index.insert((kind, span), id);
        id
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprTableEntry> {
        self.entries.get(id.0 as usize)
    }

    pub fn entries(&self) -> &[ExprTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
