//! Overlay text emission.
//!
//! Renders an [`OverlayPlanModule`] into a checker-facing source file and records,
//! for every lambda, the absolute offsets it occupies in that file.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bind::FrameId;
use crate::expr::ExprId;
use crate::plan::{LambdaPlan, OverlayPlanModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// Declarative type-annotated output.
    #[default]
    Strict,
    /// Doc-comment annotated output for untyped checkers.
    Loose,
}

impl OverlayMode {
    pub fn extension(&self) -> &'static str {
        match self {
            OverlayMode::Strict => "ts",
            OverlayMode::Loose => "js",
        }
    }
}

/// Absolute offsets of one lambda in the overlay text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCall {
    pub expr_id: ExprId,
    pub frame_id: FrameId,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySegment {
    pub expr_id: ExprId,
    pub path: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayArtifact {
    pub path: String,
    pub mode: OverlayMode,
    pub text: String,
    pub calls: Vec<OverlayCall>,
    pub segments: Vec<OverlaySegment>,
}

struct Writer {
    text: String,
    calls: Vec<OverlayCall>,
    segments: Vec<OverlaySegment>,
}

impl Writer {
    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Appends `lambda` between `before` and `after`, recording its absolute placement.
    fn call(&mut self, before: &str, lambda: &LambdaPlan, after: &str) {
        self.text.push_str(before);
        let start = self.text.len() as u32;
        self.text.push_str(&lambda.lambda);
        let end = self.text.len() as u32;
        self.text.push_str(after);
        self.text.push('\n');

        self.calls.push(OverlayCall {
            expr_id: lambda.expr_id,
            frame_id: lambda.frame_id,
            start,
            end,
        });
        for segment in &lambda.segments {
            self.segments.push(OverlaySegment {
                expr_id: lambda.expr_id,
                path: segment.path.clone(),
                start: start + segment.range.start,
                end: start + segment.range.end,
            });
        }
    }
}

#[tracing::instrument(skip(plan), fields(frames = plan.frames.len()))]
pub fn emit_overlay(plan: &OverlayPlanModule, mode: OverlayMode, base_name: &str) -> OverlayArtifact {
    let prefix = &plan.prefix;
    let mut w = Writer {
        text: String::new(),
        calls: Vec::new(),
        segments: Vec::new(),
    };

    match mode {
        OverlayMode::Strict => {
            w.line(&format!(
                "type {p}_CollectionElement<T> = T extends ReadonlyArray<infer E> ? E : T extends ReadonlySet<infer E> ? E : T extends ReadonlyMap<infer K, infer V> ? [K, V] : T extends number ? number : T extends Iterable<infer E> ? E : any;",
                p = prefix
            ));
            w.line(&format!(
                "declare function {}_access<T>(fn: (o: T) => unknown): void;",
                prefix
            ));
            for frame in &plan.frames {
                w.line(&format!("type {} = {};", frame.type_name, frame.type_expr));
                for lambda in &frame.lambdas {
                    w.call(
                        &format!("{}_access<{}>(", prefix, lambda.this_type),
                        lambda,
                        ");",
                    );
                }
            }
        }
        OverlayMode::Loose => {
            w.line("/**");
            w.line(" * @template T");
            w.line(&format!(
                " * @typedef {{T extends ReadonlyArray<infer E> ? E : T extends ReadonlySet<infer E> ? E : T extends ReadonlyMap<infer K, infer V> ? [K, V] : T extends number ? number : T extends Iterable<infer E> ? E : any}} {}_CollectionElement",
                prefix
            ));
            w.line(" */");
            w.line("/**");
            w.line(" * @template T");
            w.line(" * @param {(o: T) => unknown} fn");
            w.line(" * @returns {void}");
            w.line(" */");
            w.line(&format!("function {}_access(fn) {{}}", prefix));
            for frame in &plan.frames {
                w.line(&format!("/** @typedef {{{}}} {} */", frame.type_expr, frame.type_name));
                for lambda in &frame.lambdas {
                    w.call(
                        &format!(
                            "{}_access(/** @param {{{}}} {} */ ",
                            prefix, lambda.this_type, lambda.param
                        ),
                        lambda,
                        ");",
                    );
                }
            }
        }
    }

    debug!(calls = w.calls.len(), bytes = w.text.len(), "emitted overlay");
    OverlayArtifact {
        path: format!("{}.overlay.{}", base_name, mode.extension()),
        mode,
        text: w.text,
        calls: w.calls,
        segments: w.segments,
    }
}
