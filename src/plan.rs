//! Type-overlay planning.
//!
//! For each frame this derives a type alias (`{prefix}_T{template}_F{frame}`) and one
//! lambda per owned expression. A lambda re-expresses the binding as a member access on
//! a single parameter typed as the frame alias, so an off-the-shelf checker can validate
//! it: `user.address.street` becomes `o => o.user.address.street`.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::bind::{Contextual, Frame, FrameId, FrameOrigin, LetValue, LocalBinding, PatternStep, ScopeModule};
use crate::error::{CompileFault, CompileResult};
use crate::expr::{Expr, ExprId, ExprKind, ExprTable, Literal};
use crate::span::SourceSpan;

lazy_static! {
    /// Identifiers that resolve to host globals rather than the binding scope.
    pub static ref TEMPLATE_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Math");
        s.insert("JSON");
        s.insert("Date");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Promise");
        s.insert("Map");
        s.insert("Set");
        s.insert("RegExp");
        s.insert("Intl");
        s.insert("BigInt");
        s.insert("Error");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("isNaN");
        s.insert("isFinite");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("encodeURI");
        s.insert("encodeURIComponent");
        s.insert("decodeURI");
        s.insert("decodeURIComponent");
        s.insert("console");
        s
    };
}

/// Caller-supplied knowledge about the view-model.
pub trait VmReflection {
    /// Type expression of the root `this`, e.g. `import('./app').App`.
    fn root_type(&self) -> String;
    /// Namespace for generated identifiers.
    fn synthetic_prefix(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticReflection {
    pub root_type: String,
    pub prefix: String,
}

impl StaticReflection {
    pub fn new(root_type: &str, prefix: &str) -> Self {
        Self {
            root_type: root_type.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl VmReflection for StaticReflection {
    fn root_type(&self) -> String {
        self.root_type.clone()
    }

    fn synthetic_prefix(&self) -> String {
        self.prefix.clone()
    }
}

const DEFAULT_PREFIX: &str = "__au";

// ═══════════════════════════════════════════════════════════════════════════════
// PLAN MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// A member-path sub-span of a lambda. `range` is relative to the start of the lambda text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSegment {
    pub path: String,
    pub range: SourceSpan,
    pub authored: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaPlan {
    pub expr_id: ExprId,
    pub frame_id: FrameId,
    pub this_type: String,
    pub param: String,
    pub lambda: String,
    pub body_offset: u32,
    pub authored: SourceSpan,
    pub segments: Vec<PlannedSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePlan {
    pub frame_id: FrameId,
    pub type_name: String,
    pub type_expr: String,
    pub lambdas: Vec<LambdaPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPlanModule {
    pub prefix: String,
    pub template_index: u32,
    pub frames: Vec<FramePlan>,
}

impl OverlayPlanModule {
    pub fn lambdas(&self) -> impl Iterator<Item = &LambdaPlan> {
        self.frames.iter().flat_map(|f| f.lambdas.iter())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLANNER
// ═══════════════════════════════════════════════════════════════════════════════

#[tracing::instrument(skip_all, fields(frames = scope.frames.len()))]
pub fn plan_overlay(
    scope: &ScopeModule,
    exprs: &ExprTable,
    reflection: &dyn VmReflection,
) -> CompileResult<OverlayPlanModule> {
    let root_type = reflection.root_type();
    if root_type.trim().is_empty() {
        return Err(CompileFault::MissingCollaborator("view-model root type"));
    }
    let prefix = match reflection.synthetic_prefix() {
        p if p.trim().is_empty() => DEFAULT_PREFIX.to_string(),
        p => p,
    };

    let planner = Planner {
        scope,
        exprs,
        prefix: prefix.clone(),
        template_index: 0,
        root_type,
    };

    let mut frames = Vec::with_capacity(scope.frames.len());
    for frame in &scope.frames {
        let type_name = planner.type_name(frame.id);
        let type_expr = planner.frame_type(frame);
        let mut lambdas = Vec::new();
        for expr_id in scope.exprs_in(frame.id) {
            let entry = exprs.get(expr_id).ok_or(CompileFault::UnknownExpression(expr_id))?;
            let Some(expr) = entry.expression() else {
                continue;
            };
            let this_type = match entry.kind {
                ExprKind::IsFunction => format!("{} & {{ $event: Event }}", type_name),
                _ => type_name.clone(),
            };
            let lambda = planner.lambda(expr_id, frame.id, expr, entry.span, this_type);
            trace!(expr = %expr_id, lambda = %lambda.lambda, "planned lambda");
            lambdas.push(lambda);
        }
        frames.push(FramePlan {
            frame_id: frame.id,
            type_name,
            type_expr,
            lambdas,
        });
    }

    debug!(lambdas = frames.iter().map(|f| f.lambdas.len()).sum::<usize>(), "planned overlay");
    Ok(OverlayPlanModule {
        prefix,
        template_index: 0,
        frames,
    })
}

struct Planner<'a> {
    scope: &'a ScopeModule,
    exprs: &'a ExprTable,
    prefix: String,
    template_index: u32,
    root_type: String,
}

/// Parenthesizes compound type expressions before they are indexed.
fn indexable(ty: &str) -> String {
    let simple = ty.chars().all(|c| {
        c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']' | '\'' | '<' | '>')
    });
    if simple {
        ty.to_string()
    } else {
        format!("({})", ty)
    }
}

fn index(ty: &str, key: &str) -> String {
    format!("{}['{}']", indexable(ty), key.replace('\'', "\\'"))
}

impl<'a> Planner<'a> {
    fn type_name(&self, frame: FrameId) -> String {
        format!("{}_T{}_F{}", self.prefix, self.template_index, frame.0)
    }

    fn collection_element(&self, iterable_type: &str) -> String {
        format!("{}_CollectionElement<{}>", self.prefix, iterable_type)
    }

    /// Type of an expression evaluated against `base`, or `any` when it is not a member path.
    fn expr_type(&self, id: ExprId, base: &str) -> String {
        self.exprs
            .get(id)
            .and_then(|e| e.expression())
            .and_then(|e| path_type(e, base))
            .unwrap_or_else(|| "any".to_string())
    }

    fn iterable_type(&self, header: ExprId, base: &str) -> String {
        self.exprs
            .get(header)
            .and_then(|e| e.for_of())
            .and_then(|f| path_type(&f.iterable, base))
            .unwrap_or_else(|| "any".to_string())
    }

    /// Nearest enclosing promise value, typed against that promise frame's parent.
    fn promise_type(&self, frame: &Frame) -> String {
        let mut current = frame.parent.and_then(|p| self.scope.frame(p));
        while let Some(f) = current {
            if let Some(FrameOrigin::Promise { value }) = &f.origin {
                let parent = f.parent.map(|p| self.type_name(p));
                return match (value, parent) {
                    (Some(v), Some(p)) => self.expr_type(*v, &p),
                    _ => "any".to_string(),
                };
            }
            current = f.parent.and_then(|p| self.scope.frame(p));
        }
        "any".to_string()
    }

    fn compose(base: &str, members: &[(String, String)]) -> String {
        if members.is_empty() {
            return base.to_string();
        }
        let keys: Vec<String> = members.iter().map(|(k, _)| format!("'{}'", k)).collect();
        let body: Vec<String> = members.iter().map(|(k, t)| format!("{}: {}", k, t)).collect();
        format!("Omit<{}, {}> & {{ {} }}", base, keys.join(" | "), body.join("; "))
    }

    fn frame_type(&self, frame: &Frame) -> String {
        let parent = frame.parent.map(|p| self.type_name(p));
        let Some(parent) = parent else {
            let lets = self.let_members(frame, &self.root_type);
            return Self::compose(&self.root_type, &lets);
        };

        let (base, mut members) = match &frame.origin {
            Some(FrameOrigin::Repeat { header }) => {
                let element = self.collection_element(&self.iterable_type(*header, &parent));
                let mut members = Vec::new();
                for local in &frame.locals {
                    let ty = match &local.binding {
                        LocalBinding::IteratorElement { path, .. } => apply_path(&element, path),
                        LocalBinding::Contextual { which } => match which {
                            Contextual::Index | Contextual::Length => "number".to_string(),
                            Contextual::Previous => format!("{} | null", element),
                            _ => "boolean".to_string(),
                        },
                        _ => continue,
                    };
                    members.push((local.name.clone(), ty));
                }
                members.push(("$parent".to_string(), parent.clone()));
                (parent.clone(), members)
            }
            Some(FrameOrigin::With { value }) => {
                let value_type = value
                    .map(|v| self.expr_type(v, &parent))
                    .unwrap_or_else(|| "any".to_string());
                (format!("{} & {{ $parent: {} }}", indexable(&value_type), parent), Vec::new())
            }
            _ => {
                let mut members = Vec::new();
                for local in &frame.locals {
                    let ty = match &local.binding {
                        LocalBinding::PromiseValue => format!("Awaited<{}>", self.promise_type(frame)),
                        LocalBinding::PromiseError => "any".to_string(),
                        _ => continue,
                    };
                    members.push((local.name.clone(), ty));
                }
                (parent.clone(), members)
            }
        };

        let intermediate = Self::compose(&base, &members);
        members.extend(self.let_members(frame, &intermediate));
        Self::compose(&base, &members)
    }

    fn let_members(&self, frame: &Frame, base: &str) -> Vec<(String, String)> {
        frame
            .locals
            .iter()
            .filter_map(|local| match &local.binding {
                LocalBinding::Let { value, .. } => {
                    let ty = match value {
                        LetValue::Expr(id) => self.expr_type(*id, base),
                        LetValue::Interpolation | LetValue::Literal => "string".to_string(),
                    };
                    Some((local.name.clone(), ty))
                }
                _ => None,
            })
            .collect()
    }

    fn lambda(
        &self,
        expr_id: ExprId,
        frame_id: FrameId,
        expr: &Expr,
        authored: SourceSpan,
        this_type: String,
    ) -> LambdaPlan {
        let param = if declares_param(expr, "o") {
            format!("{}_o", self.prefix)
        } else {
            "o".to_string()
        };
        let head = format!("{} => ", param);
        let mut printer = Printer {
            out: head.clone(),
            param: param.clone(),
            shadowed: Vec::new(),
            segments: Vec::new(),
        };
        printer.print(expr);

        LambdaPlan {
            expr_id,
            frame_id,
            this_type,
            param,
            lambda: printer.out,
            body_offset: head.len() as u32,
            authored,
            segments: printer.segments,
        }
    }
}

fn apply_path(element: &str, path: &[PatternStep]) -> String {
    let mut ty = element.to_string();
    for step in path {
        ty = match step {
            PatternStep::Index(i) => format!("{}[{}]", indexable(&ty), i),
            PatternStep::Key(k) => index(&ty, k),
            PatternStep::Rest => return "any".to_string(),
        };
    }
    ty
}

/// Indexed-access type of a member path, if `expr` is one.
pub fn path_type(expr: &Expr, base: &str) -> Option<String> {
    match expr {
        Expr::AccessScope { name, .. } if !TEMPLATE_GLOBALS.contains(name.as_str()) => {
            Some(index(base, name))
        }
        Expr::AccessThis { ancestor, .. } => {
            let mut ty = base.to_string();
            for _ in 0..*ancestor {
                ty = index(&ty, "$parent");
            }
            Some(ty)
        }
        Expr::AccessMember {
            object,
            name,
            optional,
            ..
        } => {
            let object_type = path_type(object, base)?;
            if *optional {
                Some(index(&format!("NonNullable<{}>", object_type), name))
            } else {
                Some(index(&object_type, name))
            }
        }
        Expr::AccessKeyed {
            object,
            key,
            optional,
            ..
        } => {
            let object_type = path_type(object, base)?;
            let object_type = if *optional {
                format!("NonNullable<{}>", object_type)
            } else {
                object_type
            };
            match key.as_ref() {
                Expr::Primitive {
                    value: Literal::String { value },
                    ..
                } => Some(index(&object_type, value)),
                Expr::Primitive {
                    value: Literal::Number { raw, .. },
                    ..
                } => Some(format!("{}[{}]", indexable(&object_type), raw)),
                _ => None,
            }
        }
        Expr::Paren { expression, .. } | Expr::BindingBehavior { expression, .. } => {
            path_type(expression, base)
        }
        _ => None,
    }
}

fn declares_param(expr: &Expr, name: &str) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let Expr::ArrowFunction { params, .. } = e {
            if params.iter().any(|p| p == name) {
                found = true;
            }
        }
    });
    found
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAMBDA PRINTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Start of a scope-rooted member chain being printed.
struct Chain {
    path: String,
    overlay_start: usize,
    authored_start: u32,
}

struct Printer {
    out: String,
    param: String,
    shadowed: Vec<String>,
    segments: Vec<PlannedSegment>,
}

impl Printer {
    fn segment(&mut self, path: &str, overlay_start: usize, authored: SourceSpan) {
        self.segments.push(PlannedSegment {
            path: path.to_string(),
            range: SourceSpan::new(overlay_start as u32, self.out.len() as u32),
            authored,
        });
    }

    fn list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.print(item);
        }
    }

    fn print(&mut self, expr: &Expr) -> Option<Chain> {
        match expr {
            Expr::AccessScope { span, name } => {
                if self.shadowed.iter().any(|s| s == name) || TEMPLATE_GLOBALS.contains(name.as_str()) {
                    self.out.push_str(name);
                    return None;
                }
                self.out.push_str(&self.param);
                self.out.push('.');
                let start = self.out.len();
                self.out.push_str(name);
                self.segment(name, start, *span);
                Some(Chain {
                    path: name.clone(),
                    overlay_start: start,
                    authored_start: span.start,
                })
            }
            Expr::AccessThis { span, ancestor } => {
                let start = self.out.len();
                self.out.push_str(&self.param);
                let mut parts = Vec::new();
                for _ in 0..*ancestor {
                    self.out.push_str(".$parent");
                    parts.push("$parent");
                }
                let path = parts.join(".");
                if !path.is_empty() {
                    self.segment(&path, start, *span);
                }
                Some(Chain {
                    path,
                    overlay_start: start,
                    authored_start: span.start,
                })
            }
            Expr::AccessMember {
                object,
                name,
                name_span,
                optional,
                ..
            } => {
                let chain = self.print(object);
                self.out.push_str(if *optional { "?." } else { "." });
                self.out.push_str(name);
                let chain = chain?;
                let path = if chain.path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", chain.path, name)
                };
                let authored = SourceSpan::new(chain.authored_start, name_span.end);
                self.segment(&path, chain.overlay_start, authored);
                Some(Chain { path, ..chain })
            }
            Expr::AccessKeyed {
                span,
                object,
                key,
                optional,
            } => {
                let chain = self.print(object);
                self.out.push_str(if *optional { "?.[" } else { "[" });
                self.print(key);
                self.out.push(']');
                let chain = chain?;
                let literal = match key.as_ref() {
                    Expr::Primitive {
                        value: Literal::String { value },
                        ..
                    } => value.clone(),
                    Expr::Primitive {
                        value: Literal::Number { raw, .. },
                        ..
                    } => raw.clone(),
                    _ => return None,
                };
                let path = if chain.path.is_empty() {
                    literal
                } else {
                    format!("{}.{}", chain.path, literal)
                };
                let authored = SourceSpan::new(chain.authored_start, span.end);
                self.segment(&path, chain.overlay_start, authored);
                Some(Chain { path, ..chain })
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                self.print(callee);
                self.out.push_str(if *optional { "?.(" } else { "(" });
                self.list(args);
                self.out.push(')');
                None
            }
            Expr::Unary {
                operator, operand, ..
            } => {
                self.out.push_str(operator);
                // `- -a` must not fuse into `--a`.
                let fuses = match operand.as_ref() {
                    Expr::Unary { operator: inner, .. } => operator
                        .chars()
                        .last()
                        .is_some_and(|c| inner.starts_with(c)),
                    _ => false,
                };
                if fuses || operator.chars().all(|c| c.is_alphabetic()) {
                    self.out.push(' ');
                }
                self.print(operand);
                None
            }
            Expr::Binary {
                operator,
                left,
                right,
                ..
            } => {
                self.print(left);
                self.out.push(' ');
                self.out.push_str(operator);
                self.out.push(' ');
                self.print(right);
                None
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.print(test);
                self.out.push_str(" ? ");
                self.print(consequent);
                self.out.push_str(" : ");
                self.print(alternate);
                None
            }
            Expr::Assign {
                operator,
                target,
                value,
                ..
            } => {
                self.print(target);
                self.out.push(' ');
                self.out.push_str(operator);
                self.out.push(' ');
                self.print(value);
                None
            }
            Expr::Primitive { value, .. } => {
                match value {
                    Literal::String { value } => self.out.push_str(&quote(value)),
                    Literal::Number { raw, .. } => self.out.push_str(raw),
                    Literal::Boolean { value } => self.out.push_str(if *value { "true" } else { "false" }),
                    Literal::Null => self.out.push_str("null"),
                    Literal::Undefined => self.out.push_str("undefined"),
                }
                None
            }
            Expr::ArrayLiteral { elements, .. } => {
                self.out.push('[');
                self.list(elements);
                self.out.push(']');
                None
            }
            Expr::ObjectLiteral { keys, values, .. } => {
                if keys.is_empty() {
                    self.out.push_str("{}");
                    return None;
                }
                self.out.push_str("{ ");
                for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if is_identifier(key) {
                        self.out.push_str(key);
                    } else {
                        self.out.push_str(&quote(key));
                    }
                    self.out.push_str(": ");
                    self.print(value);
                }
                self.out.push_str(" }");
                None
            }
            Expr::Template {
                quasis,
                expressions,
                ..
            } => {
                self.out.push('`');
                for (i, quasi) in quasis.iter().enumerate() {
                    self.out.push_str(quasi);
                    if let Some(e) = expressions.get(i) {
                        self.out.push_str("${");
                        self.print(e);
                        self.out.push('}');
                    }
                }
                self.out.push('`');
                None
            }
            Expr::ArrowFunction { params, body, .. } => {
                self.out.push('(');
                self.out.push_str(&params.join(", "));
                self.out.push_str(") => ");
                let depth = self.shadowed.len();
                self.shadowed.extend(params.iter().cloned());
                let wrap = matches!(body.as_ref(), Expr::ObjectLiteral { .. });
                if wrap {
                    self.out.push('(');
                }
                self.print(body);
                if wrap {
                    self.out.push(')');
                }
                self.shadowed.truncate(depth);
                None
            }
            Expr::Paren { expression, .. } => {
                self.out.push('(');
                self.print(expression);
                self.out.push(')');
                None
            }
            Expr::ValueConverter { expression, .. } | Expr::BindingBehavior { expression, .. } => {
                self.print(expression);
                None
            }
            Expr::Bad { .. } => {
                self.out.push_str("undefined");
                None
            }
        }
    }
}
