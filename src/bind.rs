//! Scope graph construction.
//!
//! Walks the linked template and produces one frame per lexical scope. The root
//! template is frame 0; every template controller pushes an overlay frame for its
//! definition. The current frame is threaded through the walk by value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::diagnostics::{self, Diagnostic};
use crate::error::{CompileFault, CompileResult};
use crate::expr::{BindingPattern, ExprId, ExprTable};
use crate::ir::{BindingSource, ExprRef, LetBinding};
use crate::link::{LinkedControllerProp, LinkedInstruction, LinkedModule, LinkedTemplate};
use crate::semantics::ControllerKind;
use crate::span::{LineIndex, SourceSpan};
use crate::visitor::{ExprRefCollector, LinkedVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameKind {
    Root,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromiseBranch {
    Pending,
    Then,
    Catch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FrameOrigin {
    Repeat { header: ExprId },
    If,
    Else,
    With { value: Option<ExprId> },
    Switch,
    Case,
    DefaultCase,
    Promise { value: Option<ExprId> },
    PromiseBranch { branch: PromiseBranch },
    Portal,
    Unknown { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternStep {
    Index(usize),
    Key(String),
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Contextual {
    Index,
    First,
    Last,
    Even,
    Odd,
    Middle,
    Length,
    Previous,
}

impl Contextual {
    pub const ALL: [Contextual; 8] = [
        Contextual::Index,
        Contextual::First,
        Contextual::Last,
        Contextual::Even,
        Contextual::Odd,
        Contextual::Middle,
        Contextual::Length,
        Contextual::Previous,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Contextual::Index => "$index",
            Contextual::First => "$first",
            Contextual::Last => "$last",
            Contextual::Even => "$even",
            Contextual::Odd => "$odd",
            Contextual::Middle => "$middle",
            Contextual::Length => "$length",
            Contextual::Previous => "$previous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "expr", rename_all = "camelCase")]
pub enum LetValue {
    Expr(ExprId),
    Interpolation,
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LocalBinding {
    /// Element of the iterated collection, reached through `path` from the element.
    IteratorElement { header: ExprId, path: Vec<PatternStep> },
    Contextual { which: Contextual },
    PromiseValue,
    PromiseError,
    Let { value: LetValue, to_binding_context: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalKind {
    IteratorVariable,
    Contextual,
    LetLocal,
}

impl LocalBinding {
    pub fn kind(&self) -> LocalKind {
        match self {
            LocalBinding::IteratorElement { .. } => LocalKind::IteratorVariable,
            LocalBinding::Contextual { .. }
            | LocalBinding::PromiseValue
            | LocalBinding::PromiseError => LocalKind::Contextual,
            LocalBinding::Let { .. } => LocalKind::LetLocal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDecl {
    pub name: String,
    pub binding: LocalBinding,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub kind: FrameKind,
    pub origin: Option<FrameOrigin>,
    pub locals: Vec<LocalDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeModule {
    pub frames: Vec<Frame>,
    pub expr_to_frame: BTreeMap<ExprId, FrameId>,
    /// Iterator headers, keyed to the frame whose element type they drive.
    pub iterator_headers: BTreeMap<ExprId, FrameId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScopeModule {
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0 as usize)
    }

    pub fn frame_of(&self, expr: ExprId) -> Option<FrameId> {
        self.expr_to_frame.get(&expr).copied()
    }

    /// Number of parent links between `id` and the root.
    pub fn depth(&self, id: FrameId) -> usize {
        let mut depth = 0;
        let mut current = self.frame(id).and_then(|f| f.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.frame(parent).and_then(|f| f.parent);
        }
        depth
    }

    /// Exprs owned by `frame`, in id order.
    pub fn exprs_in(&self, frame: FrameId) -> Vec<ExprId> {
        self.expr_to_frame
            .iter()
            .filter(|(_, f)| **f == frame)
            .map(|(e, _)| *e)
            .collect()
    }
}

/// Allocates frames with monotonically increasing ids.
#[derive(Default)]
struct FrameArena {
    frames: Vec<Frame>,
}

impl FrameArena {
    fn alloc(&mut self, parent: Option<FrameId>, origin: Option<FrameOrigin>) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        let kind = if parent.is_none() {
            FrameKind::Root
        } else {
            FrameKind::Overlay
        };
        self.frames.push(Frame {
            id,
            parent,
            kind,
            origin,
            locals: Vec::new(),
        });
        id
    }

    fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id.0 as usize)
    }

    fn validate(&self) -> CompileResult<()> {
        for frame in &self.frames {
            if let Some(parent) = frame.parent {
                if parent >= frame.id {
                    return Err(CompileFault::DanglingFrameParent {
                        frame: frame.id,
                        parent,
                    });
                }
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[tracing::instrument(skip_all, fields(module = %linked.name))]
pub fn build_scopes(
    linked: &LinkedModule,
    exprs: &ExprTable,
    source: &str,
) -> CompileResult<ScopeModule> {
    let mut binder = Binder {
        exprs,
        file: &linked.name,
        lines: LineIndex::new(source),
        arena: FrameArena::default(),
        expr_to_frame: BTreeMap::new(),
        iterator_headers: BTreeMap::new(),
        diagnostics: Vec::new(),
    };
    let root = binder.arena.alloc(None, None);
    binder.bind_template(&linked.root, root)?;
    binder.arena.validate()?;

    debug!(
        frames = binder.arena.frames.len(),
        exprs = binder.expr_to_frame.len(),
        "built scope graph"
    );

    Ok(ScopeModule {
        frames: binder.arena.frames,
        expr_to_frame: binder.expr_to_frame,
        iterator_headers: binder.iterator_headers,
        diagnostics: binder.diagnostics,
    })
}

struct Binder<'a> {
    exprs: &'a ExprTable,
    file: &'a str,
    lines: LineIndex,
    arena: FrameArena,
    expr_to_frame: BTreeMap<ExprId, FrameId>,
    iterator_headers: BTreeMap<ExprId, FrameId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Binder<'a> {
    fn report(&mut self, code: &str, message: String, span: SourceSpan) {
        self.diagnostics
            .push(Diagnostic::new(code, &message, self.file, span).locate(&self.lines));
    }

    fn record(&mut self, expr: ExprRef, frame: FrameId) -> CompileResult<()> {
        if self.exprs.get(expr.id).is_none() {
            return Err(CompileFault::UnknownExpression(expr.id));
        }
        trace!(expr = %expr.id, %frame, "recorded expression");
        self.expr_to_frame.entry(expr.id).or_insert(frame);
        Ok(())
    }

    fn record_source(&mut self, source: &BindingSource, frame: FrameId) -> CompileResult<()> {
        for r in source.expr_refs() {
            self.record(r, frame)?;
        }
        Ok(())
    }

    /// Adds a local; a later declaration of the same name replaces the earlier one.
    fn declare(&mut self, frame: FrameId, decl: LocalDecl) {
        let Some(target) = self.arena.get_mut(frame) else {
            return;
        };
        match target.locals.iter_mut().find(|l| l.name == decl.name) {
            Some(existing) => {
                let name = decl.name.clone();
                let span = decl.span;
                *existing = decl;
                self.report(
                    diagnostics::BIND_DUPLICATE_LOCAL,
                    format!("'{}' is already declared in this scope; the later declaration wins.", name),
                    span,
                );
            }
            None => target.locals.push(decl),
        }
    }

    fn bind_template(&mut self, template: &LinkedTemplate, frame: FrameId) -> CompileResult<()> {
        for row in &template.rows {
            for instruction in &row.instructions {
                self.bind_instruction(instruction, frame)?;
            }
        }
        Ok(())
    }

    fn bind_instruction(&mut self, instruction: &LinkedInstruction, frame: FrameId) -> CompileResult<()> {
        match instruction {
            LinkedInstruction::HydrateTemplateController {
                res, kind, def, props, ..
            } => self.bind_controller(res, *kind, def, props, frame),
            LinkedInstruction::HydrateLetElement {
                bindings,
                to_binding_context,
                ..
            } => self.bind_lets(bindings, *to_binding_context, frame),
            other => {
                let mut collector = ExprRefCollector::default();
                collector.visit_instruction(other);
                for (r, _) in collector.refs {
                    self.record(r, frame)?;
                }
                Ok(())
            }
        }
    }

    fn bind_lets(&mut self, bindings: &[LetBinding], to_binding_context: bool, frame: FrameId) -> CompileResult<()> {
        for binding in bindings {
            let value = match &binding.from {
                Some(BindingSource::Expr(r)) => LetValue::Expr(r.id),
                Some(BindingSource::Interp(_)) => LetValue::Interpolation,
                None => LetValue::Literal,
            };
            if let Some(from) = &binding.from {
                self.record_source(from, frame)?;
            }
            self.declare(
                frame,
                LocalDecl {
                    name: binding.to.clone(),
                    binding: LocalBinding::Let {
                        value,
                        to_binding_context,
                    },
                    span: binding.loc,
                },
            );
        }
        Ok(())
    }

    fn bind_controller(
        &mut self,
        res: &str,
        kind: Option<ControllerKind>,
        def: &LinkedTemplate,
        props: &[LinkedControllerProp],
        enclosing: FrameId,
    ) -> CompileResult<()> {
        let value = props.iter().find_map(|p| match p {
            LinkedControllerProp::Value {
                from: BindingSource::Expr(r),
                ..
            } => Some(r.id),
            _ => None,
        });
        let header = props.iter().find_map(|p| match p {
            LinkedControllerProp::Iterator { from, .. } => Some(*from),
            _ => None,
        });

        let origin = match (kind, header) {
            (Some(ControllerKind::Repeat), Some(h)) => FrameOrigin::Repeat { header: h.id },
            (Some(ControllerKind::Repeat), None) => FrameOrigin::Unknown {
                name: res.to_string(),
            },
            (Some(ControllerKind::If), _) => FrameOrigin::If,
            (Some(ControllerKind::Else), _) => FrameOrigin::Else,
            (Some(ControllerKind::With), _) => FrameOrigin::With { value },
            (Some(ControllerKind::Switch), _) => FrameOrigin::Switch,
            (Some(ControllerKind::Case), _) => FrameOrigin::Case,
            (Some(ControllerKind::DefaultCase), _) => FrameOrigin::DefaultCase,
            (Some(ControllerKind::Promise), _) => FrameOrigin::Promise { value },
            (Some(ControllerKind::Pending), _) => FrameOrigin::PromiseBranch {
                branch: PromiseBranch::Pending,
            },
            (Some(ControllerKind::Then), _) => FrameOrigin::PromiseBranch {
                branch: PromiseBranch::Then,
            },
            (Some(ControllerKind::Catch), _) => FrameOrigin::PromiseBranch {
                branch: PromiseBranch::Catch,
            },
            (Some(ControllerKind::Portal), _) => FrameOrigin::Portal,
            (None, _) => FrameOrigin::Unknown {
                name: res.to_string(),
            },
        };

        let frame = self.arena.alloc(Some(enclosing), Some(origin));
        trace!(%frame, parent = %enclosing, controller = res, "pushed frame");

        // Props evaluate in the enclosing scope.
        for prop in props {
            match prop {
                LinkedControllerProp::Value { from, .. } => self.record_source(from, enclosing)?,
                LinkedControllerProp::Iterator { from, .. } => {
                    if self.exprs.get(from.id).is_none() {
                        return Err(CompileFault::UnknownExpression(from.id));
                    }
                    self.iterator_headers.insert(from.id, frame);
                }
                LinkedControllerProp::Alias { name, span, .. } => {
                    let binding = match kind {
                        Some(ControllerKind::Catch) => LocalBinding::PromiseError,
                        _ => LocalBinding::PromiseValue,
                    };
                    self.declare(
                        frame,
                        LocalDecl {
                            name: name.clone(),
                            binding,
                            span: *span,
                        },
                    );
                }
                LinkedControllerProp::Static { .. } => {}
            }
        }

        if kind == Some(ControllerKind::Repeat) {
            if let Some(h) = header {
                self.declare_iterator_locals(h, frame);
            }
        }

        self.bind_template(def, frame)
    }

    fn declare_iterator_locals(&mut self, header: ExprRef, frame: FrameId) {
        let Some(for_of) = self.exprs.get(header.id).and_then(|e| e.for_of()) else {
            return;
        };

        let mut found = Vec::new();
        match flatten_pattern(&for_of.declaration, Vec::new(), &mut found) {
            Ok(()) => {
                for (name, path, span) in found {
                    self.declare(
                        frame,
                        LocalDecl {
                            name,
                            binding: LocalBinding::IteratorElement {
                                header: header.id,
                                path,
                            },
                            span,
                        },
                    );
                }
            }
            Err((span, text)) => self.report(
                diagnostics::BIND_INVALID_PATTERN,
                format!("'{}' is not a valid iterator declaration.", text),
                span,
            ),
        }

        for which in Contextual::ALL {
            self.declare(
                frame,
                LocalDecl {
                    name: which.name().to_string(),
                    binding: LocalBinding::Contextual { which },
                    span: for_of.span,
                },
            );
        }
    }
}

type FlatLocal = (String, Vec<PatternStep>, SourceSpan);

fn flatten_pattern(
    pattern: &BindingPattern,
    path: Vec<PatternStep>,
    out: &mut Vec<FlatLocal>,
) -> Result<(), (SourceSpan, String)> {
    match pattern {
        BindingPattern::Identifier { span, name } => {
            out.push((name.clone(), path, *span));
            Ok(())
        }
        BindingPattern::Array { elements, rest, .. } => {
            for (i, element) in elements.iter().enumerate() {
                if let Some(p) = element {
                    let mut next = path.clone();
                    next.push(PatternStep::Index(i));
                    flatten_pattern(p, next, out)?;
                }
            }
            if let Some(r) = rest {
                let mut next = path.clone();
                next.push(PatternStep::Rest);
                flatten_pattern(r, next, out)?;
            }
            Ok(())
        }
        BindingPattern::Object {
            keys, values, rest, ..
        } => {
            for (key, value) in keys.iter().zip(values) {
                let mut next = path.clone();
                next.push(PatternStep::Key(key.clone()));
                flatten_pattern(value, next, out)?;
            }
            if let Some(r) = rest {
                let mut next = path;
                next.push(PatternStep::Rest);
                flatten_pattern(r, next, out)?;
            }
            Ok(())
        }
        BindingPattern::Invalid { span, text } => Err((*span, text.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::link_module;
    use crate::lower::lower_document;
    use crate::semantics::Semantics;

    fn scopes(src: &str) -> (ScopeModule, ExprTable) {
        let semantics = Semantics::default();
        let ir = lower_document(src, "t.html", &semantics);
        let linked = link_module(&ir, &semantics, src);
        let scope = build_scopes(&linked, &ir.exprs, src).unwrap();
        (scope, ir.exprs)
    }

    fn local_names(frame: &Frame) -> Vec<&str> {
        frame.locals.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_root_only() {
        let (scope, exprs) = scopes("<template>${msg}</template>");
        assert_eq!(scope.frames.len(), 1);
        assert_eq!(scope.frames[0].kind, FrameKind::Root);
        assert_eq!(scope.frames[0].parent, None);
        assert_eq!(scope.frame_of(exprs.entries()[0].id), Some(FrameId::ROOT));
    }

    #[test]
    fn test_repeat_frame_and_header() {
        let src = r#"<div>${title}</div><li repeat.for="item of items">${item.name}</li>"#;
        let (scope, exprs) = scopes(src);
        assert_eq!(scope.frames.len(), 2);
        let repeat = &scope.frames[1];
        assert_eq!(repeat.parent, Some(FrameId::ROOT));
        assert!(matches!(repeat.origin, Some(FrameOrigin::Repeat { .. })));
        assert_eq!(local_names(repeat)[0], "item");
        assert!(local_names(repeat).contains(&"$index"));
        assert!(local_names(repeat).contains(&"$previous"));

        let by_code = |code: &str| exprs.entries().iter().find(|e| e.code == code).map(|e| e.id);
        assert_eq!(scope.frame_of(by_code("title").unwrap()), Some(FrameId(0)));
        assert_eq!(scope.frame_of(by_code("item.name").unwrap()), Some(FrameId(1)));
        let header = by_code("item of items").unwrap();
        assert_eq!(scope.frame_of(header), None);
        assert_eq!(scope.iterator_headers.get(&header), Some(&FrameId(1)));
    }

    #[test]
    fn test_controller_value_belongs_to_enclosing_frame() {
        let (scope, exprs) = scopes(r#"<div if.bind="visible">${x}</div>"#);
        let visible = exprs.entries().iter().find(|e| e.code == "visible").map(|e| e.id);
        assert_eq!(scope.frame_of(visible.unwrap()), Some(FrameId::ROOT));
        assert_eq!(scope.frames[1].origin, Some(FrameOrigin::If));
    }

    #[test]
    fn test_destructuring_paths() {
        let (scope, _) = scopes(r#"<li repeat.for="[key, { id, label: text }] of map"></li>"#);
        let frame = &scope.frames[1];
        let paths: Vec<(&str, Vec<PatternStep>)> = frame
            .locals
            .iter()
            .filter_map(|l| match &l.binding {
                LocalBinding::IteratorElement { path, .. } => Some((l.name.as_str(), path.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            paths,
            vec![
                ("key", vec![PatternStep::Index(0)]),
                ("id", vec![PatternStep::Index(1), PatternStep::Key("id".into())]),
                ("text", vec![PatternStep::Index(1), PatternStep::Key("label".into())]),
            ]
        );
    }

    #[test]
    fn test_invalid_pattern_still_creates_frame() {
        let (scope, _) = scopes(r#"<li repeat.for="a.b of items">${$index}</li>"#);
        assert_eq!(scope.frames.len(), 2);
        assert_eq!(scope.diagnostics.len(), 1);
        assert_eq!(scope.diagnostics[0].code, diagnostics::BIND_INVALID_PATTERN);
        assert!(local_names(&scope.frames[1]).contains(&"$index"));
    }

    #[test]
    fn test_promise_branches_are_isolated() {
        let src = r#"<div promise.bind="load"><p then="data">${data}</p><p catch="err">${err}</p></div>"#;
        let (scope, _) = scopes(src);
        assert_eq!(scope.frames.len(), 4);
        let then = &scope.frames[2];
        let catch = &scope.frames[3];
        assert_eq!(then.parent, Some(FrameId(1)));
        assert_eq!(catch.parent, Some(FrameId(1)));
        assert_eq!(local_names(then), vec!["data"]);
        assert_eq!(local_names(catch), vec!["err"]);
        assert_eq!(catch.locals[0].binding, LocalBinding::PromiseError);
    }

    #[test]
    fn test_let_locals_join_current_frame_and_duplicates_warn() {
        let src = r#"<let a.bind="x"></let><let a.bind="y" to-binding-context></let>"#;
        let (scope, _) = scopes(src);
        assert_eq!(scope.frames.len(), 1);
        let root = &scope.frames[0];
        assert_eq!(local_names(root), vec!["a"]);
        assert!(matches!(
            root.locals[0].binding,
            LocalBinding::Let {
                to_binding_context: true,
                ..
            }
        ));
        assert_eq!(scope.diagnostics.len(), 1);
        assert_eq!(scope.diagnostics[0].code, diagnostics::BIND_DUPLICATE_LOCAL);
    }

    #[test]
    fn test_nested_depth() {
        let src = r#"<ul repeat.for="row of rows"><li repeat.for="cell of row.cells">${cell}</li></ul>"#;
        let (scope, _) = scopes(src);
        assert_eq!(scope.frames.len(), 3);
        assert_eq!(scope.depth(FrameId(2)), 2);
        for frame in &scope.frames {
            if let Some(parent) = frame.parent {
                assert!(parent < frame.id);
            }
        }
    }

    #[test]
    fn test_arena_rejects_forward_parent() {
        let mut arena = FrameArena::default();
        arena.alloc(None, None);
        arena.frames.push(Frame {
            id: FrameId(1),
            parent: Some(FrameId(3)),
            kind: FrameKind::Overlay,
            origin: None,
            locals: vec![],
        });
        assert_eq!(
            arena.validate(),
            Err(CompileFault::DanglingFrameParent {
                frame: FrameId(1),
                parent: FrameId(3)
            })
        );
    }
}
