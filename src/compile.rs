//! Pipeline facade: markup → IR → linked → scopes → plan → overlay → mapping.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::bind::{build_scopes, ScopeModule};
use crate::diagnostics::Diagnostic;
use crate::emit::{emit_overlay, OverlayArtifact, OverlayMode};
use crate::error::{CompileFault, CompileResult};
use crate::ir::IrModule;
use crate::link::{link_module, LinkedModule};
use crate::lower::lower_document;
use crate::mapping::{build_mapping, TemplateMapping};
use crate::plan::{plan_overlay, OverlayPlanModule, VmReflection};
use crate::semantics::Semantics;
use crate::visitor::{ExprRefCollector, ExprRole, LinkedVisitor};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub file_path: String,
    #[serde(default)]
    pub mode: OverlayMode,
    /// Overlay file stem; derived from `file_path` when absent.
    #[serde(default)]
    pub base_name: Option<String>,
    /// Resource catalog; the default HTML catalog when absent.
    #[serde(default)]
    pub semantics: Option<Semantics>,
}

impl CompileOptions {
    pub fn for_file(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: OverlayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn base_name(&self) -> String {
        if let Some(name) = &self.base_name {
            return name.clone();
        }
        let path = Path::new(&self.file_path);
        match (path.parent(), path.file_stem()) {
            (Some(dir), Some(stem)) if !dir.as_os_str().is_empty() => {
                dir.join(stem).to_string_lossy().into_owned()
            }
            (_, Some(stem)) => stem.to_string_lossy().into_owned(),
            _ => "template".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCompilation {
    pub ir: IrModule,
    pub linked: LinkedModule,
    pub scope: ScopeModule,
    pub plan: OverlayPlanModule,
    pub overlay: OverlayArtifact,
    pub mapping: TemplateMapping,
    /// All diagnostics, in stage order.
    pub diagnostics: Vec<Diagnostic>,
}

#[tracing::instrument(skip(markup, options, reflection), fields(file = %options.file_path))]
pub fn compile_template(
    markup: &str,
    options: &CompileOptions,
    reflection: &dyn VmReflection,
) -> CompileResult<TemplateCompilation> {
    let default_semantics;
    let semantics = match &options.semantics {
        Some(s) => s,
        None => {
            default_semantics = Semantics::default();
            &default_semantics
        }
    };
    let ir = lower_document(markup, &options.file_path, semantics);
    compile_ir(ir, markup, semantics, options, reflection)
}

/// Runs every stage after lowering. `markup` is only used to locate diagnostics.
pub fn compile_ir(
    ir: IrModule,
    markup: &str,
    semantics: &Semantics,
    options: &CompileOptions,
    reflection: &dyn VmReflection,
) -> CompileResult<TemplateCompilation> {
    let linked = link_module(&ir, semantics, markup);
    let scope = build_scopes(&linked, &ir.exprs, markup)?;
    check_total_mapping(&linked, &scope)?;

    let plan = plan_overlay(&scope, &ir.exprs, reflection)?;
    let overlay = emit_overlay(&plan, options.mode, &options.base_name());
    let mapping = build_mapping(&plan, &overlay)?;

    let diagnostics: Vec<Diagnostic> = ir
        .diagnostics
        .iter()
        .chain(&linked.diagnostics)
        .chain(&scope.diagnostics)
        .cloned()
        .collect();

    debug!(
        exprs = ir.exprs.len(),
        frames = scope.frames.len(),
        entries = mapping.entries.len(),
        diagnostics = diagnostics.len(),
        "compiled template"
    );

    Ok(TemplateCompilation {
        ir,
        linked,
        scope,
        plan,
        overlay,
        mapping,
        diagnostics,
    })
}

/// Every expression reachable from the linked tree must have landed in a frame.
fn check_total_mapping(linked: &LinkedModule, scope: &ScopeModule) -> CompileResult<()> {
    let mut collector = ExprRefCollector::default();
    collector.visit_template(&linked.root);
    for (r, role) in collector.refs {
        let mapped = match role {
            ExprRole::IteratorHeader => scope.iterator_headers.contains_key(&r.id),
            _ => scope.expr_to_frame.contains_key(&r.id),
        };
        if !mapped {
            return Err(CompileFault::UnmappedExpression(r.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::StaticReflection;

    #[test]
    fn test_base_name_from_path() {
        assert_eq!(CompileOptions::for_file("src/app.html").base_name(), "src/app");
        assert_eq!(CompileOptions::for_file("app.html").base_name(), "app");
        let mut options = CompileOptions::for_file("app.html");
        options.base_name = Some("custom".into());
        assert_eq!(options.base_name(), "custom");
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: CompileOptions =
            serde_json::from_str(r#"{ "filePath": "a/b.html", "mode": "loose", "baseName": "b" }"#).unwrap();
        assert_eq!(options.mode, OverlayMode::Loose);
        assert_eq!(options.base_name.as_deref(), Some("b"));
        assert!(options.semantics.is_none());
    }

    #[test]
    fn test_empty_root_type_faults() {
        let err = compile_template(
            "<div>${a}</div>",
            &CompileOptions::for_file("a.html"),
            &StaticReflection::new("  ", "p"),
        )
        .unwrap_err();
        assert!(matches!(err, CompileFault::MissingCollaborator(_)));
    }

    #[test]
    fn test_diagnostics_in_stage_order() {
        let src = r#"<div foo.bogus="x" repeat.for="a.b of items" title.bind="(("></div>"#;
        let out = compile_template(src, &CompileOptions::for_file("a.html"), &StaticReflection::new("App", "p"))
            .unwrap();
        let stages: Vec<_> = out.diagnostics.iter().map(|d| d.stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
        assert!(!stages.is_empty());
    }
}
