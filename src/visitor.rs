use crate::ir::{BindingSource, ExprRef};
use crate::link::{LinkedControllerProp, LinkedInstruction, LinkedRow, LinkedTemplate};

/// Where an expression reference sits in a linked template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprRole {
    Binding,
    Listener,
    Ref,
    Text,
    Let,
    ControllerValue,
    IteratorHeader,
}

/// The LinkedVisitor trait defines the shared traversal of linked templates.
///
/// The scope builder walks rows itself so it can thread the current frame, and
/// defers to this trait for the expressions of each non-controller instruction.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call `walk_*` functions to continue traversal unless pruning is intended.
pub trait LinkedVisitor {
    fn visit_template(&mut self, template: &LinkedTemplate) {
        walk_template(self, template);
    }

    fn visit_row(&mut self, row: &LinkedRow) {
        walk_row(self, row);
    }

    fn visit_instruction(&mut self, instruction: &LinkedInstruction) {
        walk_instruction(self, instruction);
    }

    /// Controller props belong to the enclosing scope, the definition to the controller's own.
    fn visit_controller(
        &mut self,
        props: &[LinkedControllerProp],
        def: &LinkedTemplate,
    ) {
        walk_controller_props(self, props);
        self.visit_template(def);
    }

    fn visit_expr_ref(&mut self, _expr: &ExprRef, _role: ExprRole) {
        // Leaf, nothing to walk by default
    }
}

pub fn walk_template<V: LinkedVisitor + ?Sized>(visitor: &mut V, template: &LinkedTemplate) {
    for row in &template.rows {
        visitor.visit_row(row);
    }
}

pub fn walk_row<V: LinkedVisitor + ?Sized>(visitor: &mut V, row: &LinkedRow) {
    for instruction in &row.instructions {
        visitor.visit_instruction(instruction);
    }
}

pub fn walk_source<V: LinkedVisitor + ?Sized>(visitor: &mut V, source: &BindingSource, role: ExprRole) {
    for expr in source.expr_refs() {
        visitor.visit_expr_ref(&expr, role);
    }
}

pub fn walk_controller_props<V: LinkedVisitor + ?Sized>(
    visitor: &mut V,
    props: &[LinkedControllerProp],
) {
    for prop in props {
        match prop {
            LinkedControllerProp::Value { from, .. } => {
                walk_source(visitor, from, ExprRole::ControllerValue)
            }
            LinkedControllerProp::Iterator { from, .. } => {
                visitor.visit_expr_ref(from, ExprRole::IteratorHeader)
            }
            LinkedControllerProp::Static { .. } | LinkedControllerProp::Alias { .. } => {}
        }
    }
}

pub fn walk_instruction<V: LinkedVisitor + ?Sized>(
    visitor: &mut V,
    instruction: &LinkedInstruction,
) {
    match instruction {
        LinkedInstruction::PropertyBinding { from, .. }
        | LinkedInstruction::AttributeBinding { from, .. }
        | LinkedInstruction::StylePropertyBinding { from, .. } => {
            walk_source(visitor, from, ExprRole::Binding)
        }
        LinkedInstruction::ListenerBinding { from, .. } => {
            visitor.visit_expr_ref(from, ExprRole::Listener)
        }
        LinkedInstruction::RefBinding { from, .. } => visitor.visit_expr_ref(from, ExprRole::Ref),
        LinkedInstruction::TextBinding { from, .. } => {
            for expr in &from.exprs {
                visitor.visit_expr_ref(expr, ExprRole::Text);
            }
        }
        LinkedInstruction::HydrateElement { props, .. }
        | LinkedInstruction::HydrateAttribute { props, .. } => {
            for prop in props {
                visitor.visit_instruction(prop);
            }
        }
        LinkedInstruction::HydrateTemplateController { props, def, .. } => {
            visitor.visit_controller(props, def)
        }
        LinkedInstruction::HydrateLetElement { bindings, .. } => {
            for binding in bindings {
                if let Some(from) = &binding.from {
                    walk_source(visitor, from, ExprRole::Let);
                }
            }
        }
        LinkedInstruction::SetAttribute { .. }
        | LinkedInstruction::SetProperty { .. }
        | LinkedInstruction::SetClassAttribute { .. }
        | LinkedInstruction::SetStyleAttribute { .. } => {}
    }
}

/// Collects every expression reference with its role, in traversal order.
#[derive(Default)]
pub struct ExprRefCollector {
    pub refs: Vec<(ExprRef, ExprRole)>,
}

impl LinkedVisitor for ExprRefCollector {
    fn visit_expr_ref(&mut self, expr: &ExprRef, role: ExprRole) {
        self.refs.push((*expr, role));
    }
}
