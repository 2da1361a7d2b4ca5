use serde::{Deserialize, Serialize};

use crate::span::{LineIndex, SourceLocation, SourceSpan};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const LOWER_EXPRESSION_SYNTAX: &str = "E-LOWER-001";
pub const LOWER_UNKNOWN_COMMAND: &str = "E-LOWER-002";

pub const RESOLVE_UNKNOWN_CONTROLLER: &str = "E-RESOLVE-001";
pub const RESOLVE_UNKNOWN_EVENT: &str = "E-RESOLVE-002";
pub const RESOLVE_UNKNOWN_TARGET: &str = "E-RESOLVE-003";
pub const RESOLVE_INVALID_TAIL_OPTION: &str = "E-RESOLVE-004";
pub const RESOLVE_UNKNOWN_CONVERTER: &str = "E-RESOLVE-005";
pub const RESOLVE_UNKNOWN_BEHAVIOR: &str = "E-RESOLVE-006";

pub const BIND_DUPLICATE_LOCAL: &str = "E-BIND-001";
pub const BIND_INVALID_PATTERN: &str = "E-BIND-002";

pub const TYPECHECK_MISMATCH: &str = "E-TYPECHECK-001";

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticStage {
    Lower,
    Resolve,
    Bind,
    Typecheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

fn stage_of(code: &str) -> DiagnosticStage {
    if code.starts_with("E-LOWER") {
        DiagnosticStage::Lower
    } else if code.starts_with("E-RESOLVE") {
        DiagnosticStage::Resolve
    } else if code.starts_with("E-BIND") {
        DiagnosticStage::Bind
    } else {
        DiagnosticStage::Typecheck
    }
}

/// One-line summary for each code, surfaced alongside the specific message.
pub fn summary(code: &str) -> &'static str {
    match code {
        LOWER_EXPRESSION_SYNTAX => "Binding expressions must be syntactically valid.",
        LOWER_UNKNOWN_COMMAND => "Attribute commands must be one of the known binding commands.",
        RESOLVE_UNKNOWN_CONTROLLER => "Template controllers must be registered resources.",
        RESOLVE_UNKNOWN_EVENT => "Listeners must target a known DOM or component event.",
        RESOLVE_UNKNOWN_TARGET => {
            "Bindings must target a bindable, a native property, or a known attribute."
        }
        RESOLVE_INVALID_TAIL_OPTION => "Iterator headers only accept declared tail options.",
        RESOLVE_UNKNOWN_CONVERTER => "Value converters must be registered resources.",
        RESOLVE_UNKNOWN_BEHAVIOR => "Binding behaviors must be registered resources.",
        BIND_DUPLICATE_LOCAL => "Each scope declares a local name at most once.",
        BIND_INVALID_PATTERN => "Iterator declarations must be identifiers or destructuring patterns.",
        TYPECHECK_MISMATCH => "Template expressions must satisfy the view-model's types.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub stage: DiagnosticStage,
    pub severity: Severity,
    pub message: String,
    pub summary: String,
    pub file: String,
    pub span: SourceSpan,
    #[serde(default)]
    pub location: SourceLocation,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: &str, file: &str, span: SourceSpan) -> Self {
        Self::with_details(code, message, file, span, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        span: SourceSpan,
        hints: Vec<String>,
    ) -> Self {
        let stage = stage_of(code);
        let severity = match stage {
            DiagnosticStage::Bind => Severity::Warning,
            _ => Severity::Error,
        };
        Diagnostic {
            code: code.to_string(),
            stage,
            severity,
            message: message.to_string(),
            summary: summary(code).to_string(),
            file: file.to_string(),
            span,
            location: SourceLocation::default(),
            hints,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Fill in line/column from the authored text.
    pub fn locate(mut self, index: &LineIndex) -> Self {
        self.location = index.location(self.span.start);
        self
    }
}
