//! Markup → structural IR.
//!
//! Attribute syntax is `target.command[:modifier]`, with `:target` as shorthand for
//! `.bind` and `@event` for `.trigger`. Template controllers wrap their host in a nested
//! definition; when several controllers sit on one host, the first declared is the
//! outermost.

use tracing::{debug, trace};

use crate::diagnostics::{self, Diagnostic};
use crate::expr::{ExprAst, ExprKind, ExprTable};
use crate::expr_parser::{
    parse_expression, parse_iterator_header, split_interpolation, InterpolationPart, SyntaxError,
};
use crate::ir::{
    BindingMode, BindingSource, ControllerProp, DomNode, ExprRef, Instruction, InstructionRow,
    Interpolation, IrModule, LetBinding, NodeId, TemplateIr,
};
use crate::markup::{self, RawAttr, RawElement, RawNode};
use crate::semantics::{to_camel_case, ControllerKind, Semantics};
use crate::span::{LineIndex, SourceSpan};

/// Parsed attribute name.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrSyntax {
    pub target: String,
    pub command: Option<String>,
    pub modifier: Option<String>,
}

pub fn parse_attr_syntax(name: &str) -> AttrSyntax {
    fn split_modifier(s: &str) -> (String, Option<String>) {
        match s.split_once(':') {
            Some((head, modifier)) => (head.to_string(), Some(modifier.to_string())),
            None => (s.to_string(), None),
        }
    }

    if let Some(rest) = name.strip_prefix('@') {
        let (target, modifier) = split_modifier(rest);
        return AttrSyntax {
            target,
            command: Some("trigger".to_string()),
            modifier,
        };
    }
    if let Some(rest) = name.strip_prefix(':') {
        return AttrSyntax {
            target: rest.to_string(),
            command: Some("bind".to_string()),
            modifier: None,
        };
    }
    match name.rfind('.') {
        Some(dot) => {
            let (command, modifier) = split_modifier(&name[dot + 1..]);
            AttrSyntax {
                target: name[..dot].to_string(),
                command: Some(command),
                modifier,
            }
        }
        None => AttrSyntax {
            target: name.to_string(),
            command: None,
            modifier: None,
        },
    }
}

fn is_binding_command(command: &str) -> bool {
    BindingMode::from_command(command).is_some()
}

#[tracing::instrument(skip(source, semantics), fields(len = source.len()))]
pub fn lower_document(source: &str, file: &str, semantics: &Semantics) -> IrModule {
    let nodes = markup::scan(source);
    let mut lowerer = Lowerer {
        source,
        file,
        semantics,
        lines: LineIndex::new(source),
        exprs: ExprTable::new(),
        diagnostics: Vec::new(),
    };

    let significant: Vec<&RawNode> = nodes.iter().filter(|n| n.is_significant()).collect();
    let (children, span) = match significant.as_slice() {
        [RawNode::Element(el)] if el.tag == "template" && !lowerer.has_controller(el) => {
            (&el.children, el.span)
        }
        _ => (&nodes, SourceSpan::new(0, source.len() as u32)),
    };

    let root_id = NodeId::root();
    let mut rows = Vec::new();
    let dom_children = lowerer.lower_children(children, &root_id, &mut rows);
    let root = TemplateIr {
        dom: DomNode::Template {
            id: root_id,
            children: dom_children,
            span,
        },
        rows,
    };

    debug!(
        exprs = lowerer.exprs.len(),
        diagnostics = lowerer.diagnostics.len(),
        "lowered template"
    );

    IrModule {
        name: file.to_string(),
        root,
        exprs: lowerer.exprs,
        diagnostics: lowerer.diagnostics,
    }
}

struct Lowerer<'a> {
    source: &'a str,
    file: &'a str,
    semantics: &'a Semantics,
    lines: LineIndex,
    exprs: ExprTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lowerer<'a> {
    fn report(&mut self, code: &str, message: &str, span: SourceSpan) {
        let diagnostic = Diagnostic::new(code, message, self.file, span).locate(&self.lines);
        self.diagnostics.push(diagnostic);
    }

    fn report_syntax(&mut self, errors: Vec<SyntaxError>) {
        for error in errors {
            self.report(diagnostics::LOWER_EXPRESSION_SYNTAX, &error.message, error.span);
        }
    }

    fn controller_of(&self, attr: &RawAttr) -> Option<AttrSyntax> {
        let syntax = parse_attr_syntax(&attr.name);
        let is_controller = match syntax.command.as_deref() {
            Some("for") => true,
            None => self.semantics.controller(&syntax.target).is_some(),
            Some(cmd) => is_binding_command(cmd) && self.semantics.controller(&syntax.target).is_some(),
        };
        is_controller.then_some(syntax)
    }

    fn has_controller(&self, el: &RawElement) -> bool {
        el.attrs.iter().any(|a| self.controller_of(a).is_some())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn expression(&mut self, kind: ExprKind, code: &str, base: u32) -> ExprRef {
        let outcome = parse_expression(code, base);
        self.report_syntax(outcome.errors);
        let span = outcome.value.span();
        let text = span.slice(self.source).to_string();
        let id = self.exprs.intern(kind, span, &text, ExprAst::Expression(outcome.value));
        trace!(%id, ?kind, %span, "interned expression");
        ExprRef { id, span }
    }

    fn iterator(&mut self, code: &str, base: u32) -> ExprRef {
        let outcome = parse_iterator_header(code, base);
        self.report_syntax(outcome.errors);
        let span = outcome.value.span;
        let text = span.slice(self.source).to_string();
        let id = self
            .exprs
            .intern(ExprKind::IsIterator, span, &text, ExprAst::ForOf(outcome.value));
        ExprRef { id, span }
    }

    fn interpolation(&mut self, text: &str, base: u32) -> Option<Interpolation> {
        let parts = split_interpolation(text)?;
        let mut literals = Vec::new();
        let mut exprs = Vec::new();
        for part in parts {
            match part {
                InterpolationPart::Text(s) => literals.push(s),
                InterpolationPart::Expression { start, end } => {
                    let r = self.expression(ExprKind::Interpolation, &text[start..end], base + start as u32);
                    exprs.push(r);
                }
            }
        }
        Some(Interpolation {
            parts: literals,
            exprs,
            span: SourceSpan::new(base, base + text.len() as u32),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NODES
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_children(
        &mut self,
        children: &[RawNode],
        parent: &NodeId,
        rows: &mut Vec<InstructionRow>,
    ) -> Vec<DomNode> {
        children
            .iter()
            .enumerate()
            .map(|(i, child)| self.lower_node(child, parent.child(i), rows))
            .collect()
    }

    fn lower_node(&mut self, node: &RawNode, id: NodeId, rows: &mut Vec<InstructionRow>) -> DomNode {
        match node {
            RawNode::Text { text, span } => {
                if let Some(from) = self.interpolation(text, span.start) {
                    rows.push(InstructionRow {
                        target: id.clone(),
                        instructions: vec![Instruction::TextBinding { from, loc: *span }],
                    });
                }
                DomNode::Text {
                    id,
                    text: text.clone(),
                    span: *span,
                }
            }
            RawNode::Comment { text, span } => DomNode::Comment {
                id,
                text: text.clone(),
                span: *span,
            },
            RawNode::Element(el) => {
                let controllers: Vec<usize> = el
                    .attrs
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| self.controller_of(a).is_some())
                    .map(|(i, _)| i)
                    .collect();
                if controllers.is_empty() {
                    self.lower_plain(el, id, &[], rows)
                } else {
                    self.lower_controlled(el, id, &controllers, &controllers, rows)
                }
            }
        }
    }

    fn lower_controlled(
        &mut self,
        el: &RawElement,
        id: NodeId,
        pending: &[usize],
        skip: &[usize],
        rows: &mut Vec<InstructionRow>,
    ) -> DomNode {
        let Some((first, rest)) = pending.split_first() else {
            return self.lower_plain(el, id, skip, rows);
        };
        let attr = &el.attrs[*first];
        let syntax = parse_attr_syntax(&attr.name);
        let props = self.controller_props(&syntax, attr);

        let mut inner_rows = Vec::new();
        let def_children = if !rest.is_empty() {
            vec![self.lower_controlled(el, id.clone(), rest, skip, &mut inner_rows)]
        } else if el.tag == "template" {
            self.lower_children(&el.children, &id, &mut inner_rows)
        } else {
            vec![self.lower_plain(el, id.clone(), skip, &mut inner_rows)]
        };

        let def = TemplateIr {
            dom: DomNode::Template {
                id: id.clone(),
                children: def_children,
                span: el.span,
            },
            rows: inner_rows,
        };
        rows.push(InstructionRow {
            target: id.clone(),
            instructions: vec![Instruction::HydrateTemplateController {
                res: syntax.target,
                def,
                props,
                loc: attr.span(),
                name_span: attr.name_span,
            }],
        });

        DomNode::Comment {
            id,
            text: "au-controller".to_string(),
            span: el.span,
        }
    }

    fn controller_props(&mut self, syntax: &AttrSyntax, attr: &RawAttr) -> Vec<ControllerProp> {
        let controller = self.semantics.controller(&syntax.target);
        let to = controller
            .map(|c| c.default_property.clone())
            .unwrap_or_else(|| "value".to_string());
        let kind = controller.map(|c| c.kind);
        let value = attr.value_str();
        let base = attr.value_start();

        if syntax.command.as_deref() == Some("for") {
            let from = self.iterator(value, base);
            let to = if kind.is_some() { to } else { "items".to_string() };
            return vec![ControllerProp::Iterator {
                to,
                from,
                name_span: attr.name_span,
            }];
        }

        if matches!(kind, Some(ControllerKind::Then) | Some(ControllerKind::Catch)) {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return vec![];
            }
            let lead = (value.len() - value.trim_start().len()) as u32;
            return vec![ControllerProp::Alias {
                to,
                name: trimmed.to_string(),
                span: SourceSpan::new(base + lead, base + lead + trimmed.len() as u32),
            }];
        }

        match syntax.command.as_deref() {
            Some(cmd) => {
                let mode = BindingMode::from_command(cmd).unwrap_or(BindingMode::Default);
                let from = self.expression(ExprKind::IsProperty, value, base);
                vec![ControllerProp::Value {
                    to,
                    from: BindingSource::Expr(from),
                    mode,
                    name_span: attr.name_span,
                }]
            }
            None => match self.interpolation(value, base) {
                Some(interp) => vec![ControllerProp::Value {
                    to,
                    from: BindingSource::Interp(interp),
                    mode: BindingMode::ToView,
                    name_span: attr.name_span,
                }],
                None if !value.is_empty() => vec![ControllerProp::Static {
                    to,
                    value: value.to_string(),
                }],
                None => vec![],
            },
        }
    }

    fn lower_plain(
        &mut self,
        el: &RawElement,
        id: NodeId,
        skip: &[usize],
        rows: &mut Vec<InstructionRow>,
    ) -> DomNode {
        if el.tag == "let" {
            return self.lower_let(el, id, rows);
        }

        let custom = self.semantics.element(&el.tag).is_some();
        let mut instructions = Vec::new();
        let mut element_props = Vec::new();
        for (i, attr) in el.attrs.iter().enumerate() {
            if skip.contains(&i) {
                continue;
            }
            self.lower_attribute(el, attr, &mut instructions, &mut element_props);
        }
        if custom {
            instructions.insert(
                0,
                Instruction::HydrateElement {
                    res: el.tag.clone(),
                    props: element_props,
                    loc: el.span,
                },
            );
        }
        if !instructions.is_empty() {
            rows.push(InstructionRow {
                target: id.clone(),
                instructions,
            });
        }

        let children = self.lower_children(&el.children, &id, rows);
        if el.tag == "template" {
            DomNode::Template {
                id,
                children,
                span: el.span,
            }
        } else {
            DomNode::Element {
                id,
                tag: el.tag.clone(),
                children,
                span: el.span,
            }
        }
    }

    /// Sends a property binding to the custom attribute, custom element or native host.
    fn route_binding(
        &mut self,
        el: &RawElement,
        attr: &RawAttr,
        target: &str,
        binding: Instruction,
        instructions: &mut Vec<Instruction>,
        element_props: &mut Vec<Instruction>,
    ) {
        if let Some(res) = self.semantics.attribute(target) {
            let binding = match binding {
                Instruction::PropertyBinding {
                    from,
                    mode,
                    loc,
                    name_span,
                    ..
                } => Instruction::PropertyBinding {
                    from,
                    to: res.default_property.clone(),
                    mode,
                    loc,
                    name_span,
                },
                other => other,
            };
            instructions.push(Instruction::HydrateAttribute {
                res: target.to_string(),
                alias: None,
                props: vec![binding],
                loc: attr.span(),
                name_span: attr.name_span,
            });
        } else if self.semantics.element(&el.tag).is_some() {
            element_props.push(binding);
        } else {
            instructions.push(binding);
        }
    }

    fn lower_attribute(
        &mut self,
        el: &RawElement,
        attr: &RawAttr,
        instructions: &mut Vec<Instruction>,
        element_props: &mut Vec<Instruction>,
    ) {
        let syntax = parse_attr_syntax(&attr.name);
        let value = attr.value_str();
        let base = attr.value_start();
        let loc = attr.span();
        let name_span = attr.name_span;

        if syntax.command.is_none() && syntax.target == "ref" {
            let from = self.expression(ExprKind::IsCustom, value, base);
            instructions.push(Instruction::RefBinding {
                from,
                to: "element".to_string(),
                loc,
            });
            return;
        }

        match syntax.command.as_deref() {
            Some("ref") => {
                let from = self.expression(ExprKind::IsCustom, value, base);
                instructions.push(Instruction::RefBinding {
                    from,
                    to: syntax.target,
                    loc,
                });
            }
            Some(cmd @ ("trigger" | "capture")) => {
                let from = self.expression(ExprKind::IsFunction, value, base);
                instructions.push(Instruction::ListenerBinding {
                    from,
                    to: syntax.target,
                    capture: cmd == "capture",
                    modifier: syntax.modifier,
                    loc,
                    name_span,
                });
            }
            Some("style") => {
                let from = self.expression(ExprKind::IsProperty, value, base);
                instructions.push(Instruction::StylePropertyBinding {
                    from: BindingSource::Expr(from),
                    to: syntax.target,
                    loc,
                    name_span,
                });
            }
            Some(cmd @ ("class" | "attr")) => {
                let from = self.expression(ExprKind::IsProperty, value, base);
                let attr_name = if cmd == "class" {
                    "class".to_string()
                } else {
                    syntax.target.clone()
                };
                instructions.push(Instruction::AttributeBinding {
                    attr: attr_name,
                    to: syntax.target,
                    from: BindingSource::Expr(from),
                    loc,
                    name_span,
                });
            }
            Some(cmd) if is_binding_command(cmd) => {
                let mode = BindingMode::from_command(cmd).unwrap_or(BindingMode::Default);
                let from = self.expression(ExprKind::IsProperty, value, base);
                let binding = Instruction::PropertyBinding {
                    from: BindingSource::Expr(from),
                    to: syntax.target.clone(),
                    mode,
                    loc,
                    name_span,
                };
                self.route_binding(el, attr, &syntax.target, binding, instructions, element_props);
            }
            Some(other) => {
                self.report(
                    diagnostics::LOWER_UNKNOWN_COMMAND,
                    &format!("Unknown binding command '{}' on '{}'.", other, attr.name),
                    name_span,
                );
                instructions.push(Instruction::SetAttribute {
                    to: attr.name.clone(),
                    value: value.to_string(),
                    loc,
                });
            }
            None => {
                if let Some(interp) = self.interpolation(value, base) {
                    let binding = Instruction::PropertyBinding {
                        from: BindingSource::Interp(interp),
                        to: syntax.target.clone(),
                        mode: BindingMode::ToView,
                        loc,
                        name_span,
                    };
                    self.route_binding(el, attr, &syntax.target, binding, instructions, element_props);
                    return;
                }
                self.lower_static(el, attr, &syntax.target, instructions, element_props);
            }
        }
    }

    fn lower_static(
        &mut self,
        el: &RawElement,
        attr: &RawAttr,
        target: &str,
        instructions: &mut Vec<Instruction>,
        element_props: &mut Vec<Instruction>,
    ) {
        let value = attr.value_str().to_string();
        let loc = attr.span();

        if let Some(res) = self.semantics.attribute(target) {
            instructions.push(Instruction::HydrateAttribute {
                res: target.to_string(),
                alias: None,
                props: vec![Instruction::SetProperty {
                    to: res.default_property.clone(),
                    value,
                    loc,
                }],
                loc,
                name_span: attr.name_span,
            });
            return;
        }

        let bindable = self
            .semantics
            .element(&el.tag)
            .and_then(|res| res.find_bindable(target))
            .map(|b| b.name.clone());
        match (bindable, target) {
            (Some(to), _) => element_props.push(Instruction::SetProperty { to, value, loc }),
            (None, "class") => instructions.push(Instruction::SetClassAttribute { value, loc }),
            (None, "style") => instructions.push(Instruction::SetStyleAttribute { value, loc }),
            (None, _) => instructions.push(Instruction::SetAttribute {
                to: attr.name.clone(),
                value,
                loc,
            }),
        }
    }

    fn lower_let(&mut self, el: &RawElement, id: NodeId, rows: &mut Vec<InstructionRow>) -> DomNode {
        let mut to_binding_context = false;
        let mut bindings = Vec::new();

        for attr in &el.attrs {
            if attr.name == "to-binding-context" {
                to_binding_context = true;
                continue;
            }
            let syntax = parse_attr_syntax(&attr.name);
            let value = attr.value_str();
            let base = attr.value_start();
            let to = to_camel_case(&syntax.target);

            let (from, literal) = match syntax.command.as_deref() {
                Some(cmd) if is_binding_command(cmd) => {
                    let r = self.expression(ExprKind::IsProperty, value, base);
                    (Some(BindingSource::Expr(r)), None)
                }
                Some(other) => {
                    self.report(
                        diagnostics::LOWER_UNKNOWN_COMMAND,
                        &format!("Unknown binding command '{}' on <let>.", other),
                        attr.name_span,
                    );
                    continue;
                }
                None => match self.interpolation(value, base) {
                    Some(interp) => (Some(BindingSource::Interp(interp)), None),
                    None => (None, Some(value.to_string())),
                },
            };
            bindings.push(LetBinding {
                to,
                from,
                value: literal,
                loc: attr.span(),
            });
        }

        rows.push(InstructionRow {
            target: id.clone(),
            instructions: vec![Instruction::HydrateLetElement {
                bindings,
                to_binding_context,
                loc: el.span,
            }],
        });
        DomNode::Element {
            id,
            tag: "let".to_string(),
            children: Vec::new(),
            span: el.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(src: &str) -> IrModule {
        lower_document(src, "test.html", &Semantics::default())
    }

    #[test]
    fn test_parse_attr_syntax() {
        assert_eq!(
            parse_attr_syntax("value.bind"),
            AttrSyntax {
                target: "value".into(),
                command: Some("bind".into()),
                modifier: None
            }
        );
        let s = parse_attr_syntax("@click:prevent");
        assert_eq!(s.target, "click");
        assert_eq!(s.command.as_deref(), Some("trigger"));
        assert_eq!(s.modifier.as_deref(), Some("prevent"));
        assert_eq!(parse_attr_syntax(":title").command.as_deref(), Some("bind"));
        assert_eq!(parse_attr_syntax("repeat.for").target, "repeat");
        assert_eq!(parse_attr_syntax("data-id").command, None);
    }

    #[test]
    fn test_root_template_content_is_root() {
        let ir = lower("<template>${msg}</template>");
        assert_eq!(ir.root.dom.children().len(), 1);
        assert_eq!(ir.root.rows.len(), 1);
        assert_eq!(ir.root.rows[0].target.0, "0");
        assert!(matches!(
            ir.root.rows[0].instructions[0],
            Instruction::TextBinding { .. }
        ));
        assert_eq!(ir.exprs.len(), 1);
        assert_eq!(ir.exprs.entries()[0].code, "msg");
        assert_eq!(ir.exprs.entries()[0].kind, ExprKind::Interpolation);
    }

    #[test]
    fn test_repeat_wraps_host() {
        let ir = lower(r#"<li repeat.for="item of items">${item.name}</li>"#);
        let row = &ir.root.rows[0];
        match &row.instructions[0] {
            Instruction::HydrateTemplateController { res, def, props, .. } => {
                assert_eq!(res, "repeat");
                assert!(matches!(props[0], ControllerProp::Iterator { ref to, .. } if to == "items"));
                assert_eq!(def.rows.len(), 1);
                assert!(matches!(def.rows[0].instructions[0], Instruction::TextBinding { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ir.exprs.entries()[0].kind, ExprKind::IsIterator);
    }

    #[test]
    fn test_multiple_controllers_nest_first_outermost() {
        let ir = lower(r#"<div if.bind="show" repeat.for="x of xs"></div>"#);
        match &ir.root.rows[0].instructions[0] {
            Instruction::HydrateTemplateController { res, def, .. } => {
                assert_eq!(res, "if");
                match &def.rows[0].instructions[0] {
                    Instruction::HydrateTemplateController { res, .. } => assert_eq!(res, "repeat"),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_promise_branch_aliases() {
        let ir = lower(r#"<div promise.bind="load()"><span then="data">${data}</span><span catch.from-view="err"></span></div>"#);
        let promise_def = match &ir.root.rows[0].instructions[0] {
            Instruction::HydrateTemplateController { def, .. } => def,
            other => panic!("unexpected {:?}", other),
        };
        let aliases: Vec<String> = promise_def
            .rows
            .iter()
            .flat_map(|r| r.instructions.iter())
            .filter_map(|i| match i {
                Instruction::HydrateTemplateController { props, .. } => match props.first() {
                    Some(ControllerProp::Alias { name, .. }) => Some(name.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(aliases, vec!["data", "err"]);
    }

    #[test]
    fn test_listener_ref_and_static_attributes() {
        let ir = lower(r#"<button class="btn" @click="save($event)" ref="btn" data-x="1"></button>"#);
        let kinds: Vec<&str> = ir.root.rows[0]
            .instructions
            .iter()
            .map(|i| match i {
                Instruction::SetClassAttribute { .. } => "class",
                Instruction::ListenerBinding { .. } => "listener",
                Instruction::RefBinding { .. } => "ref",
                Instruction::SetAttribute { .. } => "attr",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["class", "listener", "ref", "attr"]);
        let kinds: Vec<ExprKind> = ir.exprs.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ExprKind::IsFunction, ExprKind::IsCustom]);
    }

    #[test]
    fn test_let_element() {
        let ir = lower(r#"<let full-name.bind="first + last" greeting="hi ${first}" to-binding-context></let>"#);
        match &ir.root.rows[0].instructions[0] {
            Instruction::HydrateLetElement {
                bindings,
                to_binding_context,
                ..
            } => {
                assert!(*to_binding_context);
                assert_eq!(bindings[0].to, "fullName");
                assert!(matches!(bindings[1].from, Some(BindingSource::Interp(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_and_syntax_error() {
        let ir = lower(r#"<div title.bogus="x" id.bind="a +"></div>"#);
        let codes: Vec<&str> = ir.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![diagnostics::LOWER_UNKNOWN_COMMAND, diagnostics::LOWER_EXPRESSION_SYNTAX]
        );
        assert_eq!(ir.diagnostics[0].location.line, 1);
    }

    #[test]
    fn test_custom_attribute_binding() {
        let ir = lower(r#"<div show.bind="visible"></div>"#);
        match &ir.root.rows[0].instructions[0] {
            Instruction::HydrateAttribute { res, props, .. } => {
                assert_eq!(res, "show");
                assert!(matches!(props[0], Instruction::PropertyBinding { ref to, .. } if to == "value"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
