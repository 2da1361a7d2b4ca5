//! Semantic linking: resolves nominal binding names against the semantics catalog.
//!
//! Resolution priority for a binding target is custom element/attribute bindable,
//! then native DOM property, then plain attribute, then style, then unknown. Nothing
//! here aborts; unresolved names link as [`Target::Unknown`] and are reported.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::diagnostics::{self, Diagnostic};
use crate::expr::{Expr, ExprTable};
use crate::ir::{
    BindingMode, BindingSource, ControllerProp, DomNode, ExprRef, Instruction, Interpolation,
    IrModule, LetBinding, NodeId, TemplateIr,
};
use crate::semantics::{ControllerKind, Semantics};
use crate::span::{LineIndex, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Target {
    ElementNativeProp { prop: String },
    ElementBindable { element: String, bindable: String },
    AttributeBindable { attribute: String, bindable: String },
    ControllerProp { controller: String, prop: String },
    Attribute { attr: String },
    Style { property: String },
    Unknown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LinkedControllerProp {
    Value {
        target: Target,
        from: BindingSource,
        mode: BindingMode,
    },
    Iterator {
        target: Target,
        from: ExprRef,
    },
    Static {
        to: String,
        value: String,
    },
    Alias {
        to: String,
        name: String,
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LinkedInstruction {
    PropertyBinding {
        from: BindingSource,
        target: Target,
        mode: BindingMode,
        loc: SourceSpan,
    },
    AttributeBinding {
        attr: String,
        to: String,
        from: BindingSource,
        target: Target,
        loc: SourceSpan,
    },
    StylePropertyBinding {
        from: BindingSource,
        target: Target,
        loc: SourceSpan,
    },
    ListenerBinding {
        from: ExprRef,
        event: String,
        capture: bool,
        modifier: Option<String>,
        known: bool,
        loc: SourceSpan,
    },
    RefBinding {
        from: ExprRef,
        to: String,
        loc: SourceSpan,
    },
    TextBinding {
        from: Interpolation,
        loc: SourceSpan,
    },
    SetAttribute {
        to: String,
        value: String,
        loc: SourceSpan,
    },
    SetProperty {
        target: Target,
        value: String,
        loc: SourceSpan,
    },
    SetClassAttribute {
        value: String,
        loc: SourceSpan,
    },
    SetStyleAttribute {
        value: String,
        loc: SourceSpan,
    },
    HydrateElement {
        res: String,
        props: Vec<LinkedInstruction>,
        loc: SourceSpan,
    },
    HydrateAttribute {
        res: String,
        alias: Option<String>,
        props: Vec<LinkedInstruction>,
        loc: SourceSpan,
    },
    HydrateTemplateController {
        res: String,
        /// `None` when the controller is not registered.
        kind: Option<ControllerKind>,
        def: LinkedTemplate,
        props: Vec<LinkedControllerProp>,
        loc: SourceSpan,
    },
    HydrateLetElement {
        bindings: Vec<LetBinding>,
        to_binding_context: bool,
        loc: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedRow {
    pub target: NodeId,
    pub instructions: Vec<LinkedInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedTemplate {
    pub dom: DomNode,
    pub rows: Vec<LinkedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedModule {
    pub name: String,
    pub root: LinkedTemplate,
    pub diagnostics: Vec<Diagnostic>,
}

/// Which custom resource a binding belongs to while its target is being resolved.
#[derive(Clone, Copy)]
enum Host<'s> {
    Native,
    Element(&'s str),
    Attribute(&'s str),
}

#[tracing::instrument(skip_all, fields(module = %ir.name))]
pub fn link_module(ir: &IrModule, semantics: &Semantics, source: &str) -> LinkedModule {
    let mut linker = Linker {
        semantics,
        exprs: &ir.exprs,
        file: &ir.name,
        source,
        lines: LineIndex::new(source),
        tags: HashMap::new(),
        diagnostics: Vec::new(),
    };
    let root = linker.link_template(&ir.root);
    linker.check_resources();
    debug!(diagnostics = linker.diagnostics.len(), "linked template");

    LinkedModule {
        name: ir.name.clone(),
        root,
        diagnostics: linker.diagnostics,
    }
}

struct Linker<'a> {
    semantics: &'a Semantics,
    exprs: &'a ExprTable,
    file: &'a str,
    source: &'a str,
    lines: LineIndex,
    tags: HashMap<NodeId, String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Linker<'a> {
    fn report(&mut self, code: &str, message: String, span: SourceSpan) {
        self.diagnostics
            .push(Diagnostic::new(code, &message, self.file, span).locate(&self.lines));
    }

    /// Narrows an attribute-name span to the leading target name (`badprop` in `badprop.bind`).
    fn target_name_span(&self, name_span: SourceSpan, target: &str) -> SourceSpan {
        let text = name_span.slice(self.source);
        let prefix = if text.starts_with('@') || text.starts_with(':') { 1 } else { 0 };
        let start = (name_span.start + prefix).min(name_span.end);
        SourceSpan::new(start, (start + target.len() as u32).min(name_span.end))
    }

    fn index_tags(&mut self, node: &DomNode) {
        if let Some(tag) = node.tag() {
            self.tags.insert(node.id().clone(), tag.to_string());
        }
        for child in node.children() {
            self.index_tags(child);
        }
    }

    fn link_template(&mut self, template: &TemplateIr) -> LinkedTemplate {
        self.index_tags(&template.dom);
        let rows = template
            .rows
            .iter()
            .map(|row| {
                let tag = self.tags.get(&row.target).cloned().unwrap_or_default();
                let instructions = row
                    .instructions
                    .iter()
                    .map(|ins| self.link_instruction(ins, &tag, Host::Native))
                    .collect();
                LinkedRow {
                    target: row.target.clone(),
                    instructions,
                }
            })
            .collect();
        LinkedTemplate {
            dom: template.dom.clone(),
            rows,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TARGETS AND MODES
    // ═══════════════════════════════════════════════════════════════════════════

    fn resolve_target(&self, tag: &str, host: Host, to: &str) -> (Target, BindingMode) {
        match host {
            Host::Attribute(res) => {
                if let Some(b) = self.semantics.attribute(res).and_then(|a| a.find_bindable(to)) {
                    return (
                        Target::AttributeBindable {
                            attribute: res.to_string(),
                            bindable: b.name.clone(),
                        },
                        b.mode,
                    );
                }
                return (
                    Target::Unknown {
                        reason: format!("custom attribute '{}' has no bindable '{}'", res, to),
                    },
                    BindingMode::ToView,
                );
            }
            Host::Element(res) => {
                if let Some(b) = self.semantics.element(res).and_then(|e| e.find_bindable(to)) {
                    return (
                        Target::ElementBindable {
                            element: res.to_string(),
                            bindable: b.name.clone(),
                        },
                        b.mode,
                    );
                }
            }
            Host::Native => {}
        }

        let prop = self.semantics.attr_to_prop(to);
        if self.semantics.is_native_prop(tag, &prop) {
            let mode = if self.semantics.is_two_way_default(tag, &prop) {
                BindingMode::TwoWay
            } else {
                BindingMode::ToView
            };
            return (Target::ElementNativeProp { prop }, mode);
        }
        if self.semantics.is_attribute_only(to) {
            return (Target::Attribute { attr: to.to_string() }, BindingMode::ToView);
        }
        if to == "style" {
            return (
                Target::Style {
                    property: "cssText".to_string(),
                },
                BindingMode::ToView,
            );
        }
        (
            Target::Unknown {
                reason: format!("'{}' is not a bindable, property or attribute of <{}>", to, tag),
            },
            BindingMode::ToView,
        )
    }

    fn effective_mode(explicit: BindingMode, resolved: BindingMode, source: &BindingSource) -> BindingMode {
        if source.is_interpolation() {
            return BindingMode::ToView;
        }
        match explicit {
            BindingMode::Default => resolved,
            other => other,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSTRUCTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn link_instruction(&mut self, ins: &Instruction, tag: &str, host: Host) -> LinkedInstruction {
        match ins {
            Instruction::PropertyBinding {
                from,
                to,
                mode,
                loc,
                name_span,
            } => {
                let (target, resolved) = self.resolve_target(tag, host, to);
                if let Target::Unknown { reason } = &target {
                    self.report(
                        diagnostics::RESOLVE_UNKNOWN_TARGET,
                        format!("Cannot bind '{}': {}.", to, reason),
                        self.target_name_span(*name_span, to),
                    );
                }
                LinkedInstruction::PropertyBinding {
                    from: from.clone(),
                    target,
                    mode: Self::effective_mode(*mode, resolved, from),
                    loc: *loc,
                }
            }
            Instruction::AttributeBinding {
                attr, to, from, loc, ..
            } => LinkedInstruction::AttributeBinding {
                attr: attr.clone(),
                to: to.clone(),
                from: from.clone(),
                target: Target::Attribute { attr: attr.clone() },
                loc: *loc,
            },
            Instruction::StylePropertyBinding { from, to, loc, .. } => {
                LinkedInstruction::StylePropertyBinding {
                    from: from.clone(),
                    target: Target::Style {
                        property: to.clone(),
                    },
                    loc: *loc,
                }
            }
            Instruction::ListenerBinding {
                from,
                to,
                capture,
                modifier,
                loc,
                name_span,
            } => {
                let known = self.semantics.is_known_event(tag, to);
                if !known {
                    self.report(
                        diagnostics::RESOLVE_UNKNOWN_EVENT,
                        format!("Unknown event '{}' on <{}>.", to, tag),
                        self.target_name_span(*name_span, to),
                    );
                }
                LinkedInstruction::ListenerBinding {
                    from: *from,
                    event: to.clone(),
                    capture: *capture,
                    modifier: modifier.clone(),
                    known,
                    loc: *loc,
                }
            }
            Instruction::RefBinding { from, to, loc } => LinkedInstruction::RefBinding {
                from: *from,
                to: to.clone(),
                loc: *loc,
            },
            Instruction::TextBinding { from, loc } => LinkedInstruction::TextBinding {
                from: from.clone(),
                loc: *loc,
            },
            Instruction::SetAttribute { to, value, loc } => LinkedInstruction::SetAttribute {
                to: to.clone(),
                value: value.clone(),
                loc: *loc,
            },
            Instruction::SetProperty { to, value, loc } => {
                let (target, _) = self.resolve_target(tag, host, to);
                LinkedInstruction::SetProperty {
                    target,
                    value: value.clone(),
                    loc: *loc,
                }
            }
            Instruction::SetClassAttribute { value, loc } => LinkedInstruction::SetClassAttribute {
                value: value.clone(),
                loc: *loc,
            },
            Instruction::SetStyleAttribute { value, loc } => LinkedInstruction::SetStyleAttribute {
                value: value.clone(),
                loc: *loc,
            },
            Instruction::HydrateElement { res, props, loc } => LinkedInstruction::HydrateElement {
                res: res.clone(),
                props: props
                    .iter()
                    .map(|p| self.link_instruction(p, tag, Host::Element(res)))
                    .collect(),
                loc: *loc,
            },
            Instruction::HydrateAttribute {
                res,
                alias,
                props,
                loc,
                ..
            } => LinkedInstruction::HydrateAttribute {
                res: res.clone(),
                alias: alias.clone(),
                props: props
                    .iter()
                    .map(|p| self.link_instruction(p, tag, Host::Attribute(res)))
                    .collect(),
                loc: *loc,
            },
            Instruction::HydrateTemplateController {
                res,
                def,
                props,
                loc,
                name_span,
            } => self.link_controller(res, def, props, *loc, *name_span),
            Instruction::HydrateLetElement {
                bindings,
                to_binding_context,
                loc,
            } => LinkedInstruction::HydrateLetElement {
                bindings: bindings.clone(),
                to_binding_context: *to_binding_context,
                loc: *loc,
            },
        }
    }

    fn link_controller(
        &mut self,
        res: &str,
        def: &TemplateIr,
        props: &[ControllerProp],
        loc: SourceSpan,
        name_span: SourceSpan,
    ) -> LinkedInstruction {
        let controller = self.semantics.controller(res);
        let kind = controller.map(|c| c.kind);
        let tail_options = controller.map(|c| c.tail_options.clone()).unwrap_or_default();
        if controller.is_none() {
            self.report(
                diagnostics::RESOLVE_UNKNOWN_CONTROLLER,
                format!("Unknown template controller '{}'.", res),
                self.target_name_span(name_span, res),
            );
        }

        let target_for = |to: &str| Target::ControllerProp {
            controller: res.to_string(),
            prop: to.to_string(),
        };

        let mut linked_props = Vec::new();
        for prop in props {
            let linked = match prop {
                ControllerProp::Value { to, from, mode, .. } => LinkedControllerProp::Value {
                    target: target_for(to),
                    from: from.clone(),
                    mode: Self::effective_mode(*mode, BindingMode::ToView, from),
                },
                ControllerProp::Iterator { to, from, .. } => {
                    if controller.is_some() {
                        self.check_tail_options(res, *from, &tail_options);
                    }
                    LinkedControllerProp::Iterator {
                        target: target_for(to),
                        from: *from,
                    }
                }
                ControllerProp::Static { to, value } => LinkedControllerProp::Static {
                    to: to.clone(),
                    value: value.clone(),
                },
                ControllerProp::Alias { to, name, span } => LinkedControllerProp::Alias {
                    to: to.clone(),
                    name: name.clone(),
                    span: *span,
                },
            };
            linked_props.push(linked);
        }

        LinkedInstruction::HydrateTemplateController {
            res: res.to_string(),
            kind,
            def: self.link_template(def),
            props: linked_props,
            loc,
        }
    }

    fn check_tail_options(&mut self, res: &str, header: ExprRef, allowed: &[String]) {
        let Some(for_of) = self.exprs.get(header.id).and_then(|e| e.for_of()) else {
            return;
        };
        for option in &for_of.tail {
            if !allowed.iter().any(|a| a == &option.name) {
                self.report(
                    diagnostics::RESOLVE_INVALID_TAIL_OPTION,
                    format!("'{}' does not accept the iterator option '{}'.", res, option.name),
                    option.name_span,
                );
            }
        }
    }

    /// Value converters and binding behaviors, checked over the whole expression table.
    fn check_resources(&mut self) {
        let mut unknown = Vec::new();
        for entry in self.exprs.entries() {
            let mut visit = |e: &Expr| match e {
                Expr::ValueConverter { name, name_span, .. }
                    if !self.semantics.converters.contains(name) =>
                {
                    unknown.push((diagnostics::RESOLVE_UNKNOWN_CONVERTER, "value converter", name.clone(), *name_span));
                }
                Expr::BindingBehavior { name, name_span, .. }
                    if !self.semantics.behaviors.contains(name) =>
                {
                    unknown.push((diagnostics::RESOLVE_UNKNOWN_BEHAVIOR, "binding behavior", name.clone(), *name_span));
                }
                _ => {}
            };
            if let Some(expr) = entry.expression() {
                expr.walk(&mut visit);
            } else if let Some(for_of) = entry.for_of() {
                for_of.iterable.walk(&mut visit);
            }
        }
        for (code, what, name, span) in unknown {
            self.report(code, format!("Unknown {} '{}'.", what, name), span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_document;
    use crate::semantics::ElementRes;

    fn link(src: &str, semantics: &Semantics) -> LinkedModule {
        let ir = lower_document(src, "test.html", semantics);
        link_module(&ir, semantics, src)
    }

    fn first(module: &LinkedModule) -> &LinkedInstruction {
        &module.root.rows[0].instructions[0]
    }

    #[test]
    fn test_native_property_and_two_way_default() {
        let m = link(r#"<input value.bind="name">"#, &Semantics::default());
        match first(&m) {
            LinkedInstruction::PropertyBinding { target, mode, .. } => {
                assert_eq!(target, &Target::ElementNativeProp { prop: "value".into() });
                assert_eq!(*mode, BindingMode::TwoWay);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(m.diagnostics.is_empty());
    }

    #[test]
    fn test_explicit_command_wins() {
        let m = link(r#"<input value.one-time="name">"#, &Semantics::default());
        assert!(matches!(
            first(&m),
            LinkedInstruction::PropertyBinding { mode: BindingMode::OneTime, .. }
        ));
    }

    #[test]
    fn test_element_bindable_beats_native_property() {
        let semantics = Semantics::default()
            .with_element(ElementRes::new("user-card").bindable("title", BindingMode::TwoWay));
        let m = link(r#"<user-card title.bind="t" id.bind="i"></user-card>"#, &semantics);
        match first(&m) {
            LinkedInstruction::HydrateElement { props, .. } => {
                assert!(matches!(
                    &props[0],
                    LinkedInstruction::PropertyBinding {
                        target: Target::ElementBindable { .. },
                        mode: BindingMode::TwoWay,
                        ..
                    }
                ));
                assert!(matches!(
                    &props[1],
                    LinkedInstruction::PropertyBinding {
                        target: Target::ElementNativeProp { .. },
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_attribute_only_and_unknown_target() {
        let src = r#"<div aria-label.bind="l" badprop.bind="x"></div>"#;
        let m = link(src, &Semantics::default());
        let row = &m.root.rows[0].instructions;
        assert!(matches!(
            &row[0],
            LinkedInstruction::PropertyBinding { target: Target::Attribute { .. }, .. }
        ));
        assert!(matches!(
            &row[1],
            LinkedInstruction::PropertyBinding { target: Target::Unknown { .. }, .. }
        ));
        assert_eq!(m.diagnostics.len(), 1);
        assert_eq!(m.diagnostics[0].code, diagnostics::RESOLVE_UNKNOWN_TARGET);
        assert_eq!(m.diagnostics[0].span.slice(src), "badprop");
    }

    #[test]
    fn test_unknown_event_and_controller() {
        let src = r#"<div @clack="go()"></div><li virtual-repeat.for="x of xs"></li>"#;
        let m = link(src, &Semantics::default());
        let codes: Vec<&str> = m.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![diagnostics::RESOLVE_UNKNOWN_EVENT, diagnostics::RESOLVE_UNKNOWN_CONTROLLER]
        );
        assert_eq!(m.diagnostics[0].span.slice(src), "clack");
        assert_eq!(m.diagnostics[1].span.slice(src), "virtual-repeat");
    }

    #[test]
    fn test_tail_options_and_resources() {
        let src = r#"<li repeat.for="x of xs; key: id; bogus: 1">${x | upper & debounce}</li>"#;
        let m = link(src, &Semantics::default());
        let codes: Vec<&str> = m.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![diagnostics::RESOLVE_INVALID_TAIL_OPTION, diagnostics::RESOLVE_UNKNOWN_CONVERTER]
        );
        assert_eq!(m.diagnostics[0].span.slice(src), "bogus");
        assert_eq!(m.diagnostics[1].span.slice(src), "upper");
    }

    #[test]
    fn test_shorthand_listener_span() {
        let src = r#"<div :titel="t" @clack="go()"></div>"#;
        let m = link(src, &Semantics::default());
        let spans: Vec<&str> = m.diagnostics.iter().map(|d| d.span.slice(src)).collect();
        assert_eq!(spans, vec!["titel", "clack"]);
    }
}
