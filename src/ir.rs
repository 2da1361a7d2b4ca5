//! Structural IR: the markup tree plus per-node instruction rows.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::expr::{ExprId, ExprTable};
use crate::span::SourceSpan;

/// Path-style node address, e.g. `"0/2/1"`. The template root is `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn root() -> Self {
        NodeId("root".to_string())
    }

    pub fn child(&self, index: usize) -> Self {
        if self.0 == "root" {
            NodeId(index.to_string())
        } else {
            NodeId(format!("{}/{}", self.0, index))
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOM
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomNode {
    Element {
        id: NodeId,
        tag: String,
        children: Vec<DomNode>,
        span: SourceSpan,
    },
    Template {
        id: NodeId,
        children: Vec<DomNode>,
        span: SourceSpan,
    },
    Text {
        id: NodeId,
        text: String,
        span: SourceSpan,
    },
    Comment {
        id: NodeId,
        text: String,
        span: SourceSpan,
    },
}

impl DomNode {
    pub fn id(&self) -> &NodeId {
        match self {
            DomNode::Element { id, .. }
            | DomNode::Template { id, .. }
            | DomNode::Text { id, .. }
            | DomNode::Comment { id, .. } => id,
        }
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } | DomNode::Template { children, .. } => children,
            DomNode::Text { .. } | DomNode::Comment { .. } => &[],
        }
    }

    /// Tag name for elements; `template` for template nodes.
    pub fn tag(&self) -> Option<&str> {
        match self {
            DomNode::Element { tag, .. } => Some(tag),
            DomNode::Template { .. } => Some("template"),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING SOURCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference to an entry of the expression table, with its authored span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprRef {
    pub id: ExprId,
    pub span: SourceSpan,
}

/// Literal text interleaved with expressions: `parts.len() == exprs.len() + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpolation {
    pub parts: Vec<String>,
    pub exprs: Vec<ExprRef>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BindingSource {
    Expr(ExprRef),
    Interp(Interpolation),
}

impl BindingSource {
    pub fn expr_refs(&self) -> Vec<ExprRef> {
        match self {
            BindingSource::Expr(r) => vec![*r],
            BindingSource::Interp(i) => i.exprs.clone(),
        }
    }

    pub fn is_interpolation(&self) -> bool {
        matches!(self, BindingSource::Interp(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingMode {
    /// Not yet decided; resolved by the linker.
    Default,
    OneTime,
    ToView,
    FromView,
    TwoWay,
}

impl BindingMode {
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "bind" => Some(BindingMode::Default),
            "one-time" => Some(BindingMode::OneTime),
            "to-view" => Some(BindingMode::ToView),
            "from-view" => Some(BindingMode::FromView),
            "two-way" => Some(BindingMode::TwoWay),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTRUCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerProp {
    Value {
        to: String,
        from: BindingSource,
        mode: BindingMode,
        name_span: SourceSpan,
    },
    Iterator {
        to: String,
        from: ExprRef,
        name_span: SourceSpan,
    },
    Static {
        to: String,
        value: String,
    },
    /// Local alias introduced by promise branches (`then="data"`).
    Alias {
        to: String,
        name: String,
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetBinding {
    pub to: String,
    pub from: Option<BindingSource>,
    /// Present for literal values.
    pub value: Option<String>,
    pub loc: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    PropertyBinding {
        from: BindingSource,
        to: String,
        mode: BindingMode,
        loc: SourceSpan,
        name_span: SourceSpan,
    },
    AttributeBinding {
        attr: String,
        to: String,
        from: BindingSource,
        loc: SourceSpan,
        name_span: SourceSpan,
    },
    StylePropertyBinding {
        from: BindingSource,
        to: String,
        loc: SourceSpan,
        name_span: SourceSpan,
    },
    ListenerBinding {
        from: ExprRef,
        to: String,
        capture: bool,
        modifier: Option<String>,
        loc: SourceSpan,
        name_span: SourceSpan,
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
        to: String,
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
        props: Vec<Instruction>,
        loc: SourceSpan,
    },
    HydrateAttribute {
        res: String,
        alias: Option<String>,
        props: Vec<Instruction>,
        loc: SourceSpan,
        name_span: SourceSpan,
    },
    HydrateTemplateController {
        res: String,
        def: TemplateIr,
        props: Vec<ControllerProp>,
        loc: SourceSpan,
        name_span: SourceSpan,
    },
    HydrateLetElement {
        bindings: Vec<LetBinding>,
        to_binding_context: bool,
        loc: SourceSpan,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRow {
    pub target: NodeId,
    pub instructions: Vec<Instruction>,
}

/// A template definition: the root template or the body of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateIr {
    pub dom: DomNode,
    pub rows: Vec<InstructionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrModule {
    pub name: String,
    pub root: TemplateIr,
    pub exprs: ExprTable,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_paths() {
        let root = NodeId::root();
        let first = root.child(0);
        assert_eq!(first.0, "0");
        assert_eq!(first.child(2).child(1).0, "0/2/1");
    }

    #[test]
    fn test_binding_mode_from_command() {
        assert_eq!(BindingMode::from_command("bind"), Some(BindingMode::Default));
        assert_eq!(BindingMode::from_command("two-way"), Some(BindingMode::TwoWay));
        assert_eq!(BindingMode::from_command("trigger"), None);
    }

    #[test]
    fn test_interpolation_refs() {
        let a = ExprRef { id: ExprId(0), span: SourceSpan::new(2, 3) };
        let b = ExprRef { id: ExprId(1), span: SourceSpan::new(8, 9) };
        let source = BindingSource::Interp(Interpolation {
            parts: vec!["".into(), " and ".into(), "".into()],
            exprs: vec![a, b],
            span: SourceSpan::new(0, 10),
        });
        assert!(source.is_interpolation());
        assert_eq!(source.expr_refs(), vec![a, b]);
    }
}
