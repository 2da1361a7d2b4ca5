//! Structural invariants checked over a corpus of templates.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::bind::FrameId;
    use crate::compile::{compile_template, CompileOptions, TemplateCompilation};
    use crate::emit::OverlayMode;
    use crate::plan::StaticReflection;
    use crate::visitor::{ExprRefCollector, ExprRole, LinkedVisitor};
    use pretty_assertions::assert_eq;

    /// Templates paired with the number of mapping entries they must produce.
    const CORPUS: &[(&str, usize)] = &[
        ("<template>${msg}</template>", 1),
        ("<div>${user.address.street}</div>", 1),
        ("<div>${user?.address?.street} and ${user?.name}</div>", 2),
        (r#"<div badprop.bind="x" title.bind="y"></div>"#, 2),
        (r#"<ul><li repeat.for="item of items">${item.name} ${$index}</li></ul>"#, 2),
        (
            r#"<div repeat.for="row of rows"><span repeat.for="cell of row.cells">${cell} ${$parent.row.id}</span></div>"#,
            2,
        ),
        (r#"<div if.bind="show">${a}</div><div else>${b}</div>"#, 3),
        (r#"<div with.bind="profile">${name}</div>"#, 2),
        (r#"<div promise.bind="load()"><p then="data">${data.x}</p><p catch="e">${e.message}</p></div>"#, 3),
        (r#"<div switch.bind="kind"><p case="a">${one}</p><p default-case>${other}</p></div>"#, 3),
        (r#"<let total.bind="a + b" label="x ${y}"></let><span>${total}</span>"#, 3),
        (r#"<button click.trigger="save($event)" ref="btn"></button>"#, 2),
        (r#"<input value.two-way="form.name | trim & debounce:200">"#, 1),
        (r#"<li repeat.for="[k, { id }] of map; key: id">${k}${id}</li>"#, 2),
        (r#"<div style.bind="css" class="a ${b}" aria-label.bind="label"></div>"#, 3),
        ("<div>${((</div>", 0),
    ];

    fn sources() -> impl Iterator<Item = &'static str> {
        CORPUS.iter().map(|(src, _)| *src)
    }

    fn compile_mode(src: &str, mode: OverlayMode) -> TemplateCompilation {
        let options = CompileOptions::for_file("corpus.html").with_mode(mode);
        compile_template(src, &options, &StaticReflection::new("Vm", "__p")).unwrap()
    }

    fn compile(src: &str) -> TemplateCompilation {
        compile_mode(src, OverlayMode::Strict)
    }

    #[test]
    fn test_corpus_produces_expected_entries() {
        for (src, expected) in CORPUS {
            let out = compile(src);
            assert_eq!(out.mapping.entries.len(), *expected, "{}", src);
            assert_eq!(out.overlay.calls.len(), *expected, "{}", src);
        }
        let segments: usize = sources()
            .map(|src| compile(src).mapping.entries.iter().map(|e| e.segments.len()).sum::<usize>())
            .sum();
        assert!(segments > 20, "only {} segments across the corpus", segments);
    }

    #[test]
    fn test_determinism() {
        for src in sources() {
            let a = compile(src);
            let b = compile(src);
            assert_eq!(a.scope, b.scope, "{}", src);
            assert_eq!(a.plan, b.plan, "{}", src);
            assert_eq!(a.overlay.text, b.overlay.text, "{}", src);
            assert_eq!(a.mapping, b.mapping, "{}", src);
        }
    }

    #[test]
    fn test_every_expression_maps_to_one_frame() {
        for src in sources() {
            let out = compile(src);
            let mut collector = ExprRefCollector::default();
            collector.visit_template(&out.linked.root);
            for (r, role) in collector.refs {
                let frame = match role {
                    ExprRole::IteratorHeader => out.scope.iterator_headers.get(&r.id).copied(),
                    _ => out.scope.frame_of(r.id),
                };
                let frame = frame.unwrap_or_else(|| panic!("{} unmapped in {}", r.id, src));
                assert!(out.scope.frame(frame).is_some());
            }
        }
    }

    #[test]
    fn test_frames_reach_root_in_depth_steps() {
        for src in sources() {
            let out = compile(src);
            for frame in &out.scope.frames {
                let mut steps = 0;
                let mut current = frame.parent;
                while let Some(p) = current {
                    assert!(p < frame.id || steps > 0);
                    steps += 1;
                    assert!(steps <= out.scope.frames.len(), "cycle in {}", src);
                    current = out.scope.frame(p).and_then(|f| f.parent);
                }
                assert_eq!(steps, out.scope.depth(frame.id));
                if frame.id != FrameId::ROOT {
                    assert!(frame.parent.is_some());
                }
            }
        }
    }

    #[test]
    fn test_calls_align_with_entries() {
        for src in sources() {
            for mode in [OverlayMode::Strict, OverlayMode::Loose] {
                let out = compile_mode(src, mode);
                assert_eq!(out.overlay.calls.len(), out.mapping.entries.len(), "{}", src);
                let calls: BTreeSet<_> = out.overlay.calls.iter().map(|c| c.expr_id).collect();
                let entries: BTreeSet<_> = out.mapping.entries.iter().map(|e| e.expr_id).collect();
                assert_eq!(calls, entries, "{}", src);
                for (call, entry) in out.overlay.calls.iter().zip(&out.mapping.entries) {
                    assert_eq!((call.start, call.end), (entry.overlay.start, entry.overlay.end));
                }
            }
        }
    }

    #[test]
    fn test_segments_are_contained_in_entries() {
        for src in sources() {
            let out = compile(src);
            for entry in &out.mapping.entries {
                for segment in &entry.segments {
                    assert!(entry.overlay.contains_span(segment.overlay), "{} {}", src, segment.path);
                    assert!(entry.authored.contains_span(segment.authored), "{} {}", src, segment.path);
                }
            }
        }
    }

    #[test]
    fn test_overlay_lookup_returns_narrowest_first_declared() {
        let mut checked = 0;
        for src in sources() {
            let out = compile(src);
            for entry in &out.mapping.entries {
                for segment in &entry.segments {
                    let offset = segment.overlay.start;
                    let hit = out.mapping.find_by_overlay(offset).unwrap();
                    let found = hit.segment.unwrap();
                    let best = hit
                        .entry
                        .segments
                        .iter()
                        .filter(|s| s.overlay.contains_offset_inclusive(offset))
                        .map(|s| s.overlay.width())
                        .min()
                        .unwrap();
                    assert_eq!(found.overlay.width(), best);
                    let first = hit
                        .entry
                        .segments
                        .iter()
                        .find(|s| s.overlay.contains_offset_inclusive(offset) && s.overlay.width() == best)
                        .unwrap();
                    assert!(std::ptr::eq(first, found));
                    checked += 1;
                }
            }
        }
        assert!(checked > 20, "only {} segment lookups", checked);
    }

    #[test]
    fn test_authored_end_boundary_is_exclusive() {
        let mut checked = 0;
        for src in sources() {
            let out = compile(src);
            for entry in &out.mapping.entries {
                if entry.authored.is_empty() {
                    continue;
                }
                let hit = out.mapping.find_by_authored(entry.authored.start);
                assert!(hit.is_some(), "{}", src);
                checked += 1;
                if let Some(hit) = out.mapping.find_by_authored(entry.authored.end) {
                    assert!(hit.entry.authored.contains_offset(entry.authored.end));
                    assert!(hit.entry.expr_id != entry.expr_id);
                }
                for segment in &entry.segments {
                    if let Some(hit) = out.mapping.find_by_authored(segment.authored.end) {
                        if let Some(s) = hit.segment {
                            assert!(s.authored.contains_offset(segment.authored.end));
                        }
                    }
                }
            }
        }
        assert!(checked > 20, "only {} entries checked", checked);
    }

    #[test]
    fn test_strict_and_loose_lambdas_match() {
        for src in sources() {
            let strict = compile_mode(src, OverlayMode::Strict);
            let loose = compile_mode(src, OverlayMode::Loose);
            for (s, l) in strict.mapping.entries.iter().zip(&loose.mapping.entries) {
                let st = &strict.overlay.text[s.overlay.start as usize..s.overlay.end as usize];
                let lt = &loose.overlay.text[l.overlay.start as usize..l.overlay.end as usize];
                assert_eq!(st, lt, "{}", src);
            }
        }
    }
}
