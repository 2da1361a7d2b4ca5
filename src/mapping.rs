//! Provenance between authored markup and overlay text.
//!
//! Each planned expression yields one [`MappingEntry`] pairing its authored span
//! with the overlay span of its lambda, plus member-path segments for
//! sub-expression navigation.

use serde::{Deserialize, Serialize};

use crate::bind::FrameId;
use crate::diagnostics::{self, Diagnostic};
use crate::emit::OverlayArtifact;
use crate::error::{CompileFault, CompileResult};
use crate::expr::ExprId;
use crate::plan::OverlayPlanModule;
use crate::span::{LineIndex, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSegment {
    pub path: String,
    pub authored: SourceSpan,
    pub overlay: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub expr_id: ExprId,
    pub frame_id: FrameId,
    pub authored: SourceSpan,
    pub overlay: SourceSpan,
    pub segments: Vec<MappingSegment>,
}

/// Result of a point query: the owning entry and, when one matched, its narrowest segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingHit<'m> {
    pub entry: &'m MappingEntry,
    pub segment: Option<&'m MappingSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMapping {
    pub entries: Vec<MappingEntry>,
}

pub fn build_mapping(plan: &OverlayPlanModule, artifact: &OverlayArtifact) -> CompileResult<TemplateMapping> {
    let mut calls = artifact.calls.iter();
    let mut entries = Vec::with_capacity(artifact.calls.len());

    for lambda in plan.lambdas() {
        let call = calls
            .next()
            .filter(|c| c.expr_id == lambda.expr_id)
            .ok_or(CompileFault::UnmappedExpression(lambda.expr_id))?;
        let segments = lambda
            .segments
            .iter()
            .map(|s| MappingSegment {
                path: s.path.clone(),
                authored: s.authored,
                overlay: s.range.shifted(call.start),
            })
            .collect();
        entries.push(MappingEntry {
            expr_id: lambda.expr_id,
            frame_id: lambda.frame_id,
            authored: lambda.authored,
            overlay: SourceSpan::new(call.start, call.end),
            segments,
        });
    }
    if let Some(extra) = calls.next() {
        return Err(CompileFault::UnmappedExpression(extra.expr_id));
    }

    Ok(TemplateMapping { entries })
}

/// Narrowest of `candidates`; the earliest wins when widths tie.
fn narrowest<'m, T, F>(candidates: impl Iterator<Item = &'m T>, width: F) -> Option<&'m T>
where
    T: 'm,
    F: Fn(&T) -> u32,
{
    let mut best: Option<&T> = None;
    for c in candidates {
        match best {
            Some(b) if width(c) >= width(b) => {}
            _ => best = Some(c),
        }
    }
    best
}

impl TemplateMapping {
    pub fn entry_for(&self, expr: ExprId) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.expr_id == expr)
    }

    /// Overlay offsets match inclusively, so a cursor just past a lambda still resolves.
    pub fn find_by_overlay(&self, offset: u32) -> Option<MappingHit<'_>> {
        let entry = narrowest(
            self.entries
                .iter()
                .filter(|e| e.overlay.contains_offset_inclusive(offset)),
            |e| e.overlay.width(),
        )?;
        let segment = narrowest(
            entry
                .segments
                .iter()
                .filter(|s| s.overlay.contains_offset_inclusive(offset)),
            |s| s.overlay.width(),
        );
        Some(MappingHit { entry, segment })
    }

    pub fn find_by_authored(&self, offset: u32) -> Option<MappingHit<'_>> {
        let entry = narrowest(
            self.entries.iter().filter(|e| e.authored.contains_offset(offset)),
            |e| e.authored.width(),
        )?;
        let segment = narrowest(
            entry
                .segments
                .iter()
                .filter(|s| s.authored.contains_offset(offset)),
            |s| s.authored.width(),
        );
        Some(MappingHit { entry, segment })
    }

    fn shrink_segment(&self, span: SourceSpan) -> Option<(&MappingEntry, &MappingSegment)> {
        let pairs: Vec<(&MappingEntry, &MappingSegment)> = self
            .entries
            .iter()
            .flat_map(|e| e.segments.iter().map(move |s| (e, s)))
            .filter(|(_, s)| s.overlay.contains_span(span))
            .collect();
        narrowest(pairs.iter(), |(_, s)| s.overlay.width()).copied()
    }

    /// Narrowest overlay segment covering `span`, or `span` unchanged.
    pub fn shrink(&self, span: SourceSpan) -> SourceSpan {
        self.shrink_segment(span)
            .map(|(_, s)| s.overlay)
            .unwrap_or(span)
    }

    /// Relocates an overlay span onto the authored markup.
    pub fn project_overlay_span(&self, span: SourceSpan) -> Option<SourceSpan> {
        if let Some((_, segment)) = self.shrink_segment(span) {
            if segment.overlay.width() == segment.authored.width() {
                let delta = span.start - segment.overlay.start;
                return Some(SourceSpan::new(
                    segment.authored.start + delta,
                    segment.authored.start + delta + span.width(),
                ));
            }
            return Some(segment.authored);
        }
        self.entries
            .iter()
            .find(|e| e.overlay.contains_span(span))
            .map(|e| e.authored)
    }

    /// Wraps a message reported by an external checker against the overlay.
    ///
    /// Spans that fall outside every entry keep the overlay offsets; the file still
    /// names the template so the caller can decide how to surface it.
    pub fn project_checker_diagnostic(
        &self,
        file: &str,
        lines: &LineIndex,
        overlay_span: SourceSpan,
        message: &str,
    ) -> Diagnostic {
        let span = self.project_overlay_span(overlay_span).unwrap_or(overlay_span);
        Diagnostic::new(diagnostics::TYPECHECK_MISMATCH, message, file, span).locate(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile_template, CompileOptions};
    use crate::plan::StaticReflection;

    fn segment(path: &str, authored: (u32, u32), overlay: (u32, u32)) -> MappingSegment {
        MappingSegment {
            path: path.to_string(),
            authored: SourceSpan::new(authored.0, authored.1),
            overlay: SourceSpan::new(overlay.0, overlay.1),
        }
    }

    fn sample() -> TemplateMapping {
        TemplateMapping {
            entries: vec![
                MappingEntry {
                    expr_id: ExprId(0),
                    frame_id: FrameId(0),
                    authored: SourceSpan::new(10, 20),
                    overlay: SourceSpan::new(100, 120),
                    segments: vec![
                        segment("a", (10, 11), (107, 108)),
                        segment("a.b", (10, 13), (107, 110)),
                        segment("a.c", (10, 13), (107, 110)),
                    ],
                },
                MappingEntry {
                    expr_id: ExprId(1),
                    frame_id: FrameId(0),
                    authored: SourceSpan::new(20, 25),
                    overlay: SourceSpan::new(130, 140),
                    segments: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_overlay_lookup_prefers_narrowest_then_first() {
        let m = sample();
        let hit = m.find_by_overlay(107).unwrap();
        assert_eq!(hit.entry.expr_id, ExprId(0));
        assert_eq!(hit.segment.unwrap().path, "a");

        let hit = m.find_by_overlay(109).unwrap();
        assert_eq!(hit.segment.unwrap().path, "a.b");
    }

    #[test]
    fn test_overlay_end_is_inclusive() {
        let m = sample();
        assert_eq!(m.find_by_overlay(120).unwrap().entry.expr_id, ExprId(0));
        assert!(m.find_by_overlay(125).is_none());
    }

    #[test]
    fn test_authored_end_is_exclusive() {
        let m = sample();
        assert_eq!(m.find_by_authored(20).unwrap().entry.expr_id, ExprId(1));
        assert_eq!(m.find_by_authored(19).unwrap().entry.expr_id, ExprId(0));
        let hit = m.find_by_authored(11).unwrap();
        assert_eq!(hit.segment.unwrap().path, "a.b");
        assert!(m.find_by_authored(25).is_none());
    }

    #[test]
    fn test_shrink_and_project() {
        let m = sample();
        assert_eq!(m.shrink(SourceSpan::new(108, 110)), SourceSpan::new(107, 110));
        assert_eq!(m.shrink(SourceSpan::new(0, 5)), SourceSpan::new(0, 5));
        assert_eq!(
            m.project_overlay_span(SourceSpan::new(108, 110)),
            Some(SourceSpan::new(11, 13))
        );
        assert_eq!(
            m.project_overlay_span(SourceSpan::new(132, 134)),
            Some(SourceSpan::new(20, 25))
        );
        assert_eq!(m.project_overlay_span(SourceSpan::new(0, 1)), None);
    }

    #[test]
    fn test_checker_diagnostic_lands_on_authored_member() {
        let src = "<div>\n  ${user.nmae}\n</div>";
        let compiled = compile_template(
            src,
            &CompileOptions::for_file("app.html"),
            &StaticReflection::new("App", "__m"),
        )
        .unwrap();
        let seg = compiled
            .overlay
            .segments
            .iter()
            .find(|s| s.path == "user.nmae")
            .unwrap();
        let name_start = seg.end - "nmae".len() as u32;
        let d = compiled.mapping.project_checker_diagnostic(
            "app.html",
            &LineIndex::new(src),
            SourceSpan::new(name_start, seg.end),
            "Property 'nmae' does not exist on type 'User'.",
        );
        assert_eq!(d.code, diagnostics::TYPECHECK_MISMATCH);
        assert_eq!(d.span.slice(src), "nmae");
        assert_eq!(d.location.line, 2);
    }
}
