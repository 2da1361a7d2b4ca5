//! Expression parsing for binding values.
//!
//! The JavaScript-compatible core of an expression is parsed with oxc and converted
//! into the owned [`Expr`] tree. The template-only syntax around it is handled here:
//! value converter / binding behavior tails (`x | name:arg & name`), iterator headers
//! (`pattern of iterable; key: id`) and `${}` interpolation splitting.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast as js;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use regex::Regex;

use crate::expr::{BindingPattern, Expr, ForOfStatement, Literal, TailOption};
use crate::span::SourceSpan;

lazy_static! {
    static ref TAIL_OPTION_RE: Regex =
        Regex::new(r"^\s*([A-Za-z_$][\w$.\-]*)\s*:\s*(.*?)\s*$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub span: SourceSpan,
    pub message: String,
}

/// A parse result that always carries a value; problems are listed alongside it.
#[derive(Debug, Clone)]
pub struct ParseOutcome<T> {
    pub value: T,
    pub errors: Vec<SyntaxError>,
}

fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte positions in `code` that sit outside brackets, strings and template literals
/// and satisfy `pred`.
fn top_level_positions(code: &str, pred: impl Fn(&[u8], usize) -> bool) -> Vec<usize> {
    let bytes = code.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_string: Option<u8> = None;
    let mut in_template = false;
    let mut template_brace_depth = 0;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\\' && (in_string.is_some() || in_template) {
            i += 2;
            continue;
        }
        if let Some(quote) = in_string {
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        if in_template {
            if c == b'`' && template_brace_depth == 0 {
                in_template = false;
            } else if c == b'$' && bytes.get(i + 1) == Some(&b'{') {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == b'}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        // A closer at depth 0 must reach `pred` before it unbalances the count.
        if depth == 0 && pred(bytes, i) {
            out.push(i);
        }
        match c {
            b'"' | b'\'' => in_string = Some(c),
            b'`' => in_template = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }

    out
}

fn is_single(bytes: &[u8], i: usize, ch: u8) -> bool {
    bytes[i] == ch
        && bytes.get(i + 1) != Some(&ch)
        && (i == 0 || bytes[i - 1] != ch)
        && bytes.get(i + 1) != Some(&b'=')
}

/// Trim whitespace off both ends of `code[start..end]`, returning the narrowed range.
fn trim_range(code: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &code[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead == slice.len() {
        return (start, start);
    }
    (start + lead, end - trail)
}

/// Find the end of a balanced `{...}` starting at `start` (which must be `{`).
/// Returns the index just past the closing brace.
pub fn find_balanced_brace_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }
    let closing = top_level_positions(&text[start + 1..], |b, i| b[i] == b'}');
    // A close brace at depth 0 relative to the content closes the opening brace.
    closing.first().map(|rel| start + 1 + rel + 1)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
enum TailKind {
    Converter,
    Behavior,
}

/// Parse a binding expression located at absolute offset `base` in the document.
pub fn parse_expression(code: &str, base: u32) -> ParseOutcome<Expr> {
    let mut errors = Vec::new();
    let splits = top_level_positions(code, |b, i| is_single(b, i, b'|') || is_single(b, i, b'&'));

    let core_end = splits.first().copied().unwrap_or(code.len());
    let (core_start, core_stop) = trim_range(code, 0, core_end);
    let mut expr = parse_core(&code[core_start..core_stop], base + core_start as u32, &mut errors);

    let bytes = code.as_bytes();
    for (n, &at) in splits.iter().enumerate() {
        let kind = if bytes[at] == b'|' {
            TailKind::Converter
        } else {
            TailKind::Behavior
        };
        let seg_end = splits.get(n + 1).copied().unwrap_or(code.len());
        let segment = &code[at + 1..seg_end];
        let colons = top_level_positions(segment, |b, i| b[i] == b':');

        let name_end = colons.first().copied().unwrap_or(segment.len());
        let (ns, ne) = trim_range(segment, 0, name_end);
        let name_span = SourceSpan::new(base + (at + 1 + ns) as u32, base + (at + 1 + ne) as u32);
        let name = segment[ns..ne].to_string();
        if name.is_empty() {
            errors.push(SyntaxError {
                span: SourceSpan::new(base + at as u32, base + seg_end as u32),
                message: "Expected a resource name after the tail separator.".to_string(),
            });
        }

        let mut args = Vec::new();
        for (k, &colon) in colons.iter().enumerate() {
            let arg_end = colons.get(k + 1).copied().unwrap_or(segment.len());
            let (as_, ae) = trim_range(segment, colon + 1, arg_end);
            let arg_base = base + (at + 1 + as_) as u32;
            args.push(parse_core(&segment[as_..ae], arg_base, &mut errors));
        }

        let end = args.last().map(|a| a.span().end).unwrap_or(name_span.end);
        let span = SourceSpan::new(expr.span().start, end);
        expr = match kind {
            TailKind::Converter => Expr::ValueConverter {
                span,
                expression: Box::new(expr),
                name,
                name_span,
                args,
            },
            TailKind::Behavior => Expr::BindingBehavior {
                span,
                expression: Box::new(expr),
                name,
                name_span,
                args,
            },
        };
    }

    ParseOutcome { value: expr, errors }
}

fn parse_core(code: &str, base: u32, errors: &mut Vec<SyntaxError>) -> Expr {
    let span = SourceSpan::new(base, base + code.len() as u32);
    if code.trim().is_empty() {
        let message = "Expected an expression.".to_string();
        errors.push(SyntaxError { span, message: message.clone() });
        return Expr::Bad {
            span,
            text: String::new(),
            message,
        };
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type()).parse_expression();
    match ret {
        Ok(expression) => {
            let mut converter = Converter { code, base, errors };
            converter.expression(&expression)
        }
        Err(diagnostics) => {
            let message = diagnostics
                .first()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "Invalid expression syntax.".to_string());
            errors.push(SyntaxError {
                span,
                message: message.clone(),
            });
            Expr::Bad {
                span,
                text: code.to_string(),
                message,
            }
        }
    }
}

/// Converts the oxc arena AST into the owned AST, rebasing spans onto the document.
struct Converter<'c, 'e> {
    code: &'c str,
    base: u32,
    errors: &'e mut Vec<SyntaxError>,
}

impl Converter<'_, '_> {
    fn span(&self, span: oxc_span::Span) -> SourceSpan {
        SourceSpan::from(span).shifted(self.base)
    }

    fn text(&self, span: oxc_span::Span) -> &str {
        self.code
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    fn unsupported(&mut self, span: oxc_span::Span, what: &str) -> Expr {
        let message = format!("{} is not supported in binding expressions.", what);
        let span_abs = self.span(span);
        self.errors.push(SyntaxError {
            span: span_abs,
            message: message.clone(),
        });
        Expr::Bad {
            span: span_abs,
            text: self.text(span).to_string(),
            message,
        }
    }

    fn boxed(&mut self, expr: &js::Expression) -> Box<Expr> {
        Box::new(self.expression(expr))
    }

    fn expression(&mut self, expr: &js::Expression) -> Expr {
        match expr {
            js::Expression::Identifier(id) => {
                let span = self.span(id.span);
                match id.name.as_str() {
                    "$this" => Expr::AccessThis { span, ancestor: 0 },
                    "$parent" => Expr::AccessThis { span, ancestor: 1 },
                    "undefined" => Expr::Primitive {
                        span,
                        value: Literal::Undefined,
                    },
                    name => Expr::AccessScope {
                        span,
                        name: name.to_string(),
                    },
                }
            }
            js::Expression::ThisExpression(t) => Expr::AccessThis {
                span: self.span(t.span),
                ancestor: 0,
            },
            js::Expression::StaticMemberExpression(m) => self.static_member(m),
            js::Expression::ComputedMemberExpression(m) => self.computed_member(m),
            js::Expression::CallExpression(c) => self.call(c),
            js::Expression::ChainExpression(chain) => match &chain.expression {
                js::ChainElement::CallExpression(c) => self.call(c),
                js::ChainElement::StaticMemberExpression(m) => self.static_member(m),
                js::ChainElement::ComputedMemberExpression(m) => self.computed_member(m),
                _ => self.unsupported(chain.span, "This optional chain"),
            },
            js::Expression::UnaryExpression(u) => Expr::Unary {
                span: self.span(u.span),
                operator: u.operator.as_str().to_string(),
                operand: self.boxed(&u.argument),
            },
            js::Expression::BinaryExpression(b) => Expr::Binary {
                span: self.span(b.span),
                operator: b.operator.as_str().to_string(),
                left: self.boxed(&b.left),
                right: self.boxed(&b.right),
            },
            js::Expression::LogicalExpression(l) => Expr::Binary {
                span: self.span(l.span),
                operator: l.operator.as_str().to_string(),
                left: self.boxed(&l.left),
                right: self.boxed(&l.right),
            },
            js::Expression::ConditionalExpression(c) => Expr::Conditional {
                span: self.span(c.span),
                test: self.boxed(&c.test),
                consequent: self.boxed(&c.consequent),
                alternate: self.boxed(&c.alternate),
            },
            js::Expression::AssignmentExpression(a) => {
                let target = match &a.left {
                    js::AssignmentTarget::AssignmentTargetIdentifier(id) => Expr::AccessScope {
                        span: self.span(id.span),
                        name: id.name.to_string(),
                    },
                    js::AssignmentTarget::StaticMemberExpression(m) => self.static_member(m),
                    js::AssignmentTarget::ComputedMemberExpression(m) => self.computed_member(m),
                    other => self.unsupported(other.span(), "This assignment target"),
                };
                Expr::Assign {
                    span: self.span(a.span),
                    operator: a.operator.as_str().to_string(),
                    target: Box::new(target),
                    value: self.boxed(&a.right),
                }
            }
            js::Expression::StringLiteral(s) => Expr::Primitive {
                span: self.span(s.span),
                value: Literal::String {
                    value: s.value.to_string(),
                },
            },
            js::Expression::NumericLiteral(n) => Expr::Primitive {
                span: self.span(n.span),
                value: Literal::Number {
                    value: n.value,
                    raw: self.text(n.span).to_string(),
                },
            },
            js::Expression::BooleanLiteral(b) => Expr::Primitive {
                span: self.span(b.span),
                value: Literal::Boolean { value: b.value },
            },
            js::Expression::NullLiteral(n) => Expr::Primitive {
                span: self.span(n.span),
                value: Literal::Null,
            },
            js::Expression::ArrayExpression(arr) => {
                let mut elements = Vec::new();
                for elem in &arr.elements {
                    if let Some(e) = elem.as_expression() {
                        elements.push(self.expression(e));
                    }
                }
                Expr::ArrayLiteral {
                    span: self.span(arr.span),
                    elements,
                }
            }
            js::Expression::ObjectExpression(obj) => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for prop in &obj.properties {
                    match prop {
                        js::ObjectPropertyKind::ObjectProperty(p) => {
                            let key = match &p.key {
                                js::PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                                js::PropertyKey::StringLiteral(s) => s.value.to_string(),
                                other => self.text(other.span()).to_string(),
                            };
                            keys.push(key);
                            values.push(self.expression(&p.value));
                        }
                        js::ObjectPropertyKind::SpreadProperty(s) => {
                            let bad = self.unsupported(s.span, "Object spread");
                            keys.push(String::new());
                            values.push(bad);
                        }
                    }
                }
                Expr::ObjectLiteral {
                    span: self.span(obj.span),
                    keys,
                    values,
                }
            }
            js::Expression::TemplateLiteral(tpl) => Expr::Template {
                span: self.span(tpl.span),
                quasis: tpl.quasis.iter().map(|q| q.value.raw.to_string()).collect(),
                expressions: tpl.expressions.iter().map(|e| self.expression(e)).collect(),
            },
            js::Expression::ArrowFunctionExpression(func) => {
                let mut params = Vec::new();
                for param in &func.params.items {
                    match &param.pattern {
                        js::BindingPattern::BindingIdentifier(id) => params.push(id.name.to_string()),
                        other => {
                            return self.unsupported(other.span(), "Destructured arrow parameter")
                        }
                    }
                }
                let body = match func.body.statements.first() {
                    Some(js::Statement::ExpressionStatement(stmt)) if func.expression => {
                        self.expression(&stmt.expression)
                    }
                    _ => return self.unsupported(func.span, "A block-bodied arrow function"),
                };
                Expr::ArrowFunction {
                    span: self.span(func.span),
                    params,
                    body: Box::new(body),
                }
            }
            js::Expression::ParenthesizedExpression(p) => Expr::Paren {
                span: self.span(p.span),
                expression: self.boxed(&p.expression),
            },
            other => self.unsupported(other.span(), "This expression form"),
        }
    }

    fn static_member(&mut self, m: &js::StaticMemberExpression) -> Expr {
        let object = self.expression(&m.object);
        let span = self.span(m.span);
        if let Expr::AccessThis { ancestor, .. } = &object {
            if m.property.name.as_str() == "$parent" && !m.optional {
                return Expr::AccessThis {
                    span,
                    ancestor: ancestor + 1,
                };
            }
        }
        Expr::AccessMember {
            span,
            object: Box::new(object),
            name: m.property.name.to_string(),
            name_span: self.span(m.property.span),
            optional: m.optional,
        }
    }

    fn computed_member(&mut self, m: &js::ComputedMemberExpression) -> Expr {
        Expr::AccessKeyed {
            span: self.span(m.span),
            object: self.boxed(&m.object),
            key: self.boxed(&m.expression),
            optional: m.optional,
        }
    }

    fn call(&mut self, c: &js::CallExpression) -> Expr {
        let callee = self.boxed(&c.callee);
        let mut args = Vec::new();
        for arg in &c.arguments {
            match arg.as_expression() {
                Some(e) => args.push(self.expression(e)),
                None => args.push(self.unsupported(arg.span(), "Argument spread")),
            }
        }
        Expr::Call {
            span: self.span(c.span),
            callee,
            args,
            optional: c.optional,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ITERATOR HEADERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse `pattern of iterable[; name: value]*` located at absolute offset `base`.
pub fn parse_iterator_header(code: &str, base: u32) -> ParseOutcome<ForOfStatement> {
    let mut errors = Vec::new();
    let semicolons = top_level_positions(code, |b, i| b[i] == b';');
    let head_end = semicolons.first().copied().unwrap_or(code.len());
    let head = &code[..head_end];

    let of_positions = top_level_positions(head, |b, i| {
        b[i] == b'o'
            && b.get(i + 1) == Some(&b'f')
            && i > 0
            && b[i - 1].is_ascii_whitespace()
            && b.get(i + 2).map(|c| c.is_ascii_whitespace()).unwrap_or(false)
    });

    let (declaration, iterable) = match of_positions.first() {
        Some(&of) => {
            let (ls, le) = trim_range(head, 0, of);
            let declaration = parse_binding_pattern(&head[ls..le], base + ls as u32);
            let (rs, re) = trim_range(head, of + 2, head.len());
            let iterable = parse_expression(&head[rs..re], base + rs as u32);
            errors.extend(iterable.errors);
            (declaration, iterable.value)
        }
        None => {
            let (s, e) = trim_range(head, 0, head.len());
            let span = SourceSpan::new(base + s as u32, base + e as u32);
            let message = "Iterator header is missing the `of` keyword.".to_string();
            errors.push(SyntaxError {
                span,
                message: message.clone(),
            });
            (
                BindingPattern::Invalid {
                    span,
                    text: head[s..e].to_string(),
                },
                Expr::Bad {
                    span: SourceSpan::new(span.end, span.end),
                    text: String::new(),
                    message,
                },
            )
        }
    };

    let mut tail = Vec::new();
    for (n, &at) in semicolons.iter().enumerate() {
        let end = semicolons.get(n + 1).copied().unwrap_or(code.len());
        let piece = &code[at + 1..end];
        if piece.trim().is_empty() {
            continue;
        }
        match TAIL_OPTION_RE.captures(piece) {
            Some(caps) => {
                let name = caps.get(1).map(|m| (m.start(), m.end(), m.as_str()));
                let value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                if let Some((s, e, text)) = name {
                    tail.push(TailOption {
                        name: text.to_string(),
                        name_span: SourceSpan::new(
                            base + (at + 1 + s) as u32,
                            base + (at + 1 + e) as u32,
                        ),
                        value: value.to_string(),
                    });
                }
            }
            None => {
                let (s, e) = trim_range(piece, 0, piece.len());
                let name_span =
                    SourceSpan::new(base + (at + 1 + s) as u32, base + (at + 1 + e) as u32);
                tail.push(TailOption {
                    name: piece[s..e].to_string(),
                    name_span,
                    value: String::new(),
                });
            }
        }
    }

    let (s, e) = trim_range(code, 0, code.len());
    ParseOutcome {
        value: ForOfStatement {
            span: SourceSpan::new(base + s as u32, base + e as u32),
            declaration,
            iterable,
            tail,
        },
        errors,
    }
}

/// Parse the declaration side of an iterator header by handing oxc a `let` statement.
pub fn parse_binding_pattern(code: &str, base: u32) -> BindingPattern {
    const PREFIX: &str = "let ";
    let span = SourceSpan::new(base, base + code.len() as u32);
    let invalid = || BindingPattern::Invalid {
        span,
        text: code.to_string(),
    };
    if code.is_empty() {
        return invalid();
    }

    let source = format!("{}{} = 0;", PREFIX, code);
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &source, source_type()).parse();
    if !ret.errors.is_empty() || ret.program.body.len() != 1 {
        return invalid();
    }

    let rebase = |s: oxc_span::Span| {
        SourceSpan::new(
            s.start - PREFIX.len() as u32 + base,
            s.end - PREFIX.len() as u32 + base,
        )
    };

    match ret.program.body.first() {
        Some(js::Statement::VariableDeclaration(decl)) if decl.declarations.len() == 1 => {
            convert_pattern(&decl.declarations[0].id, &rebase, &source).unwrap_or_else(invalid)
        }
        _ => invalid(),
    }
}

fn convert_pattern(
    pattern: &js::BindingPattern,
    rebase: &dyn Fn(oxc_span::Span) -> SourceSpan,
    source: &str,
) -> Option<BindingPattern> {
    match pattern {
        js::BindingPattern::BindingIdentifier(id) => Some(BindingPattern::Identifier {
            span: rebase(id.span),
            name: id.name.to_string(),
        }),
        js::BindingPattern::ArrayPattern(arr) => {
            let mut elements = Vec::new();
            for elem in &arr.elements {
                match elem {
                    Some(p) => elements.push(Some(convert_pattern(p, rebase, source)?)),
                    None => elements.push(None),
                }
            }
            let rest = match &arr.rest {
                Some(r) => Some(Box::new(convert_pattern(&r.argument, rebase, source)?)),
                None => None,
            };
            Some(BindingPattern::Array {
                span: rebase(arr.span),
                elements,
                rest,
            })
        }
        js::BindingPattern::ObjectPattern(obj) => {
            let mut keys = Vec::new();
            let mut values = Vec::new();
            for prop in &obj.properties {
                if prop.computed {
                    return None;
                }
                let key = match &prop.key {
                    js::PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                    js::PropertyKey::StringLiteral(s) => s.value.to_string(),
                    other => {
                        let s = other.span();
                        source.get(s.start as usize..s.end as usize)?.to_string()
                    }
                };
                keys.push(key);
                values.push(convert_pattern(&prop.value, rebase, source)?);
            }
            let rest = match &obj.rest {
                Some(r) => Some(Box::new(convert_pattern(&r.argument, rebase, source)?)),
                None => None,
            };
            Some(BindingPattern::Object {
                span: rebase(obj.span),
                keys,
                values,
                rest,
            })
        }
        // Default values are not meaningful for iterated items.
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTERPOLATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Text(String),
    /// Byte range of the expression source between `${` and `}`, relative to the text.
    Expression { start: usize, end: usize },
}

/// Split text on balanced `${ }` regions. Returns `None` when there is no interpolation.
pub fn split_interpolation(text: &str) -> Option<Vec<InterpolationPart>> {
    let mut parts = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    let bytes = text.as_bytes();
    let mut found = false;

    while i + 1 < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(end) = find_balanced_brace_end(text, i + 1) {
                parts.push(InterpolationPart::Text(text[literal_start..i].to_string()));
                parts.push(InterpolationPart::Expression {
                    start: i + 2,
                    end: end - 1,
                });
                found = true;
                i = end;
                literal_start = end;
                continue;
            }
        }
        i += 1;
    }

    if !found {
        return None;
    }
    parts.push(InterpolationPart::Text(text[literal_start..].to_string()));
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_balanced_brace() {
        assert_eq!(find_balanced_brace_end("{hello}", 0), Some(7));
        assert_eq!(find_balanced_brace_end("{obj.map(x => x)}", 0), Some(17));
        assert_eq!(find_balanced_brace_end("{'string with } brace'}", 0), Some(23));
        assert_eq!(find_balanced_brace_end("{ {a: 1}.a }", 0), Some(12));
        assert_eq!(find_balanced_brace_end("{unclosed", 0), None);
    }

    #[test]
    fn test_split_interpolation() {
        let parts = split_interpolation("Hi ${user.name}!").unwrap();
        assert_eq!(
            parts,
            vec![
                InterpolationPart::Text("Hi ".to_string()),
                InterpolationPart::Expression { start: 5, end: 14 },
                InterpolationPart::Text("!".to_string()),
            ]
        );
        assert_eq!(
            split_interpolation("${a} x").unwrap(),
            vec![
                InterpolationPart::Text(String::new()),
                InterpolationPart::Expression { start: 2, end: 3 },
                InterpolationPart::Text(" x".to_string()),
            ]
        );
        assert!(split_interpolation("plain text").is_none());
        assert!(split_interpolation("${unclosed").is_none());
    }

    #[test]
    fn test_member_chain_spans_are_absolute() {
        let out = parse_expression("user.address.street", 10);
        assert!(out.errors.is_empty());
        match out.value {
            Expr::AccessMember {
                span,
                name,
                name_span,
                object,
                optional,
            } => {
                assert_eq!(span, SourceSpan::new(10, 29));
                assert_eq!(name, "street");
                assert_eq!(name_span, SourceSpan::new(23, 29));
                assert!(!optional);
                assert!(matches!(*object, Expr::AccessMember { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_optional_chain_is_flattened() {
        let out = parse_expression("user?.address?.street", 0);
        assert!(out.errors.is_empty());
        match out.value {
            Expr::AccessMember { optional, object, .. } => {
                assert!(optional);
                assert!(matches!(*object, Expr::AccessMember { optional: true, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parent_access() {
        let out = parse_expression("$parent.$parent.title", 0);
        match out.value {
            Expr::AccessMember { object, name, .. } => {
                assert_eq!(name, "title");
                assert!(matches!(*object, Expr::AccessThis { ancestor: 2, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_converter_and_behavior_tails() {
        let out = parse_expression("price | currency:'EUR' & debounce:200", 0);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        match out.value {
            Expr::BindingBehavior {
                name, expression, args, ..
            } => {
                assert_eq!(name, "debounce");
                assert_eq!(args.len(), 1);
                match *expression {
                    Expr::ValueConverter { name, name_span, .. } => {
                        assert_eq!(name, "currency");
                        assert_eq!(name_span, SourceSpan::new(8, 16));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_logical_operators_are_not_tails() {
        let out = parse_expression("a || b && c", 0);
        assert!(out.errors.is_empty());
        assert!(matches!(out.value, Expr::Binary { .. }));
    }

    #[test]
    fn test_syntax_error_yields_bad_node() {
        let out = parse_expression("a +", 4);
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(out.value, Expr::Bad { .. }));
        assert_eq!(out.value.span(), SourceSpan::new(4, 7));
    }

    #[test]
    fn test_iterator_header_patterns() {
        let out = parse_iterator_header("item of items", 0);
        assert!(out.errors.is_empty());
        assert!(matches!(
            out.value.declaration,
            BindingPattern::Identifier { ref name, .. } if name == "item"
        ));
        assert_eq!(out.value.iterable.span(), SourceSpan::new(8, 13));

        let out = parse_iterator_header("[key, value] of map", 0);
        match out.value.declaration {
            BindingPattern::Array { elements, span, .. } => {
                assert_eq!(elements.len(), 2);
                assert_eq!(span, SourceSpan::new(0, 12));
            }
            other => panic!("unexpected {:?}", other),
        }

        let out = parse_iterator_header("{ id, label } of rows", 0);
        match out.value.declaration {
            BindingPattern::Object { keys, .. } => assert_eq!(keys, vec!["id", "label"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_iterator_header_tail_options() {
        let out = parse_iterator_header("item of items; key: id; bogus: 1", 0);
        let names: Vec<_> = out.value.tail.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["key", "bogus"]);
        assert_eq!(out.value.tail[0].name_span, SourceSpan::new(15, 18));
        assert_eq!(out.value.tail[0].value, "id");
    }

    #[test]
    fn test_invalid_iterator_declaration() {
        let out = parse_iterator_header("item.x of items", 0);
        assert!(matches!(out.value.declaration, BindingPattern::Invalid { .. }));

        let out = parse_iterator_header("items", 0);
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(out.value.declaration, BindingPattern::Invalid { .. }));
    }
}
