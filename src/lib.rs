//! # Template Overlay Compiler
//!
//! Compiles declarative HTML templates into a type-checkable overlay and keeps
//! provenance back to the authored markup.
//!
//! ## Pipeline
//!
//! 1. **Lower** (`lower`): markup → `IrModule`. Attributes are classified into
//!    instructions and every binding expression is parsed into the `ExprTable`.
//! 2. **Link** (`link`): instructions are resolved against `Semantics`
//!    (elements, attributes, controllers, DOM schema). Unknown targets become
//!    diagnostics, never faults.
//! 3. **Bind** (`bind`): one frame per lexical scope, every expression assigned
//!    to exactly one frame.
//! 4. **Plan** (`plan`): a type alias per frame and one lambda per expression.
//! 5. **Emit** (`emit`): overlay text in strict (`.ts`) or loose (`.js`) form.
//! 6. **Map** (`mapping`): overlay ⇄ authored span queries.
//!
//! ## Invariants
//!
//! - Frame ids are allocated in creation order and a parent id is always lower
//!   than its child's.
//! - Every expression in the linked tree maps to exactly one frame; iterator
//!   headers map to the frame they introduce.
//! - Overlay calls and mapping entries correspond one to one, in plan order.
//! - Identical input produces structurally equal output.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod bind;
pub mod cache;
pub mod compile;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod expr;
pub mod expr_parser;
pub mod ir;
pub mod link;
pub mod lower;
pub mod mapping;
pub mod markup;
pub mod plan;
pub mod semantics;
pub mod span;
pub mod visitor;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod property_tests;

pub use bind::{build_scopes, Frame, FrameId, ScopeModule};
pub use cache::{CompilationCache, TemplateDocument};
pub use compile::{compile_ir, compile_template, CompileOptions, TemplateCompilation};
pub use diagnostics::{Diagnostic, DiagnosticStage, Severity};
pub use emit::{emit_overlay, OverlayArtifact, OverlayMode};
pub use error::{CompileFault, CompileResult};
pub use expr::{ExprId, ExprTable};
pub use ir::IrModule;
pub use link::{link_module, LinkedModule};
pub use lower::lower_document;
pub use mapping::{build_mapping, MappingEntry, MappingHit, TemplateMapping};
pub use plan::{plan_overlay, OverlayPlanModule, StaticReflection, VmReflection};
pub use semantics::Semantics;
pub use span::{LineIndex, SourceSpan};

/// Compiles one template and returns the full compilation as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(
    markup: String,
    options_json: String,
    root_type: String,
    prefix: String,
) -> napi::Result<serde_json::Value> {
    let options: CompileOptions = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid compile options: {}", e)))?;
    let reflection = StaticReflection::new(&root_type, &prefix);
    let compiled = compile_template(&markup, &options, &reflection)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(&compiled).map_err(|e| napi::Error::from_reason(e.to_string()))
}
