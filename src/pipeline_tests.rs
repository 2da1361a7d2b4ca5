//! End-to-end scenarios through the whole pipeline.
//!
//! Each test compiles a small template and checks the overlay text, the mapping,
//! and the aggregated diagnostics together.

#[cfg(test)]
mod tests {
    use crate::bind::{FrameId, FrameOrigin};
    use crate::compile::{compile_template, CompileOptions, TemplateCompilation};
    use crate::diagnostics::{self, DiagnosticStage};
    use crate::emit::OverlayMode;
    use crate::plan::StaticReflection;
    use crate::ir::BindingMode;
    use crate::semantics::{ElementRes, Semantics};
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> TemplateCompilation {
        compile_with(src, CompileOptions::for_file("app.html"))
    }

    fn compile_with(src: &str, options: CompileOptions) -> TemplateCompilation {
        compile_template(src, &options, &StaticReflection::new("import('./app').App", "__au")).unwrap()
    }

    fn call_text<'a>(out: &'a TemplateCompilation, index: usize) -> &'a str {
        let call = &out.overlay.calls[index];
        &out.overlay.text[call.start as usize..call.end as usize]
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // BASIC SCENARIOS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_literal_interpolation() {
        let src = "<template>${msg}</template>";
        let out = compile(src);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(out.scope.frames.len(), 1);
        assert_eq!(out.overlay.calls.len(), 1);
        assert_eq!(call_text(&out, 0), "o => o.msg");
        assert!(out.overlay.text.contains("type __au_T0_F0 = import('./app').App;"));

        let entry = &out.mapping.entries[0];
        assert_eq!(entry.authored.slice(src), "msg");
        assert_eq!(entry.frame_id, FrameId::ROOT);

        let msg_offset = src.find("msg").unwrap() as u32;
        let hit = out.mapping.find_by_authored(msg_offset + 1).unwrap();
        assert_eq!(hit.segment.map(|s| s.path.as_str()), Some("msg"));
    }

    #[test]
    fn test_nested_scope_repeat_vs_root() {
        let src = r#"<h1>${title}</h1><ul><li repeat.for="item of items">${item.name} ${title}</li></ul>"#;
        let out = compile(src);
        assert_eq!(out.scope.frames.len(), 2);
        assert!(matches!(out.scope.frames[1].origin, Some(FrameOrigin::Repeat { .. })));

        let frames: Vec<(String, FrameId)> = out
            .mapping
            .entries
            .iter()
            .map(|e| (e.authored.slice(src).to_string(), e.frame_id))
            .collect();
        assert_eq!(
            frames,
            vec![
                ("title".to_string(), FrameId(0)),
                ("item.name".to_string(), FrameId(1)),
                ("title".to_string(), FrameId(1)),
            ]
        );
        assert!(out
            .overlay
            .text
            .contains("__au_access<__au_T0_F1>(o => o.item.name);"));
    }

    #[test]
    fn test_member_chain_segments_nest_inside_entry() {
        let src = "<div>${user.address.street}</div>";
        let out = compile(src);
        let entry = &out.mapping.entries[0];
        let paths: Vec<&str> = entry.segments.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["user", "user.address", "user.address.street"]);
        for segment in &entry.segments {
            assert!(entry.overlay.contains_span(segment.overlay));
            assert!(entry.authored.contains_span(segment.authored));
        }

        let street = src.find("street").unwrap() as u32;
        let hit = out.mapping.find_by_authored(street).unwrap();
        assert_eq!(hit.segment.unwrap().path, "user.address.street");
        let address = src.find("address").unwrap() as u32;
        let hit = out.mapping.find_by_authored(address).unwrap();
        assert_eq!(hit.segment.unwrap().path, "user.address");
    }

    #[test]
    fn test_optional_chaining_segment() {
        let src = "<div>${user?.address?.street}</div>";
        let out = compile(src);
        assert_eq!(call_text(&out, 0), "o => o.user?.address?.street");
        let segment = out.mapping.entries[0]
            .segments
            .iter()
            .find(|s| s.path == "user.address.street")
            .unwrap();
        assert_eq!(segment.authored.slice(src), "user?.address?.street");
        assert_eq!(
            &out.overlay.text[segment.overlay.start as usize..segment.overlay.end as usize],
            "user?.address?.street"
        );
    }

    #[test]
    fn test_unresolved_target_still_emits_overlay() {
        let src = r#"<div badprop.bind="x"></div>"#;
        let out = compile(src);
        assert_eq!(out.overlay.calls.len(), 1);
        assert_eq!(call_text(&out, 0), "o => o.x");

        let unknown: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.code == diagnostics::RESOLVE_UNKNOWN_TARGET)
            .collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].stage, DiagnosticStage::Resolve);
        assert!(unknown[0].span.slice(src).contains("badprop"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTROLLERS AND LOCALS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_promise_branches_isolate_locals() {
        let src = r#"<div promise.bind="load()"><span pending>...</span><span then="data">${data.total}</span><span catch="err">${err.message}</span></div>"#;
        let out = compile(src);
        assert_eq!(out.scope.frames.len(), 5);
        let then = out
            .plan
            .frames
            .iter()
            .find(|f| f.type_expr.contains("data: Awaited<"))
            .unwrap();
        assert_eq!(then.lambdas.len(), 1);
        assert_eq!(then.lambdas[0].lambda, "o => o.data.total");

        let catch = out.plan.frames.iter().find(|f| f.type_expr.contains("err: any")).unwrap();
        assert_ne!(then.frame_id, catch.frame_id);
        assert!(!catch.type_expr.contains("data"));
    }

    #[test]
    fn test_let_duplicates_warn_but_compile() {
        let src = r#"<let total.bind="a + b"></let><let total.bind="c"></let>${total}"#;
        let out = compile(src);
        let dup: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.code == diagnostics::BIND_DUPLICATE_LOCAL)
            .collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].severity, crate::diagnostics::Severity::Warning);
        assert!(out.plan.frames[0].type_expr.contains("total: "));
        assert_eq!(out.overlay.calls.len(), 3);
    }

    #[test]
    fn test_destructuring_header_types() {
        let src = r#"<li repeat.for="[key, value] of entries">${key}: ${value}</li>"#;
        let out = compile(src);
        let ty = &out.plan.frames[1].type_expr;
        assert!(ty.contains("key: __au_CollectionElement<__au_T0_F0['entries']>[0]"), "{}", ty);
        assert!(ty.contains("value: __au_CollectionElement<__au_T0_F0['entries']>[1]"), "{}", ty);
        // The header itself is not a hover target.
        assert_eq!(out.mapping.entries.len(), 2);
    }

    #[test]
    fn test_custom_element_bindable() {
        let semantics = Semantics::html().with_element(
            ElementRes::new("user-card").bindable("userName", BindingMode::ToView),
        );
        let mut options = CompileOptions::for_file("app.html");
        options.semantics = Some(semantics);
        let out = compile_with(r#"<user-card user-name.bind="me.name"></user-card>"#, options);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(call_text(&out, 0), "o => o.me.name");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // MODES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_loose_and_strict_map_the_same_expressions() {
        let src = r#"<div repeat.for="x of xs" click.trigger="pick(x, $event)">${x.label}</div>"#;
        let strict = compile(src);
        let loose = compile_with(src, CompileOptions::for_file("app.html").with_mode(OverlayMode::Loose));

        assert_eq!(strict.overlay.path, "app.overlay.ts");
        assert_eq!(loose.overlay.path, "app.overlay.js");
        assert_eq!(strict.mapping.entries.len(), loose.mapping.entries.len());
        for (s, l) in strict.mapping.entries.iter().zip(&loose.mapping.entries) {
            assert_eq!(s.expr_id, l.expr_id);
            assert_eq!(s.authored, l.authored);
            let s_text = &strict.overlay.text[s.overlay.start as usize..s.overlay.end as usize];
            let l_text = &loose.overlay.text[l.overlay.start as usize..l.overlay.end as usize];
            assert_eq!(s_text, l_text);
        }
        assert!(strict.overlay.text.contains("& { $event: Event }"));
    }

    #[test]
    fn test_compilation_serializes_to_json() {
        let out = compile("<div>${a}</div>");
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["overlay"]["mode"], "strict");
        assert_eq!(json["mapping"]["entries"][0]["exprId"], 0);
        assert!(json["scope"]["exprToFrame"].is_object());
    }
}
