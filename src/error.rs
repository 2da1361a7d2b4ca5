use crate::bind::FrameId;
use crate::expr::ExprId;

/// Conditions that abort a compilation outright.
///
/// Problems with template content are never faults; they are reported as
/// [`Diagnostic`](crate::diagnostics::Diagnostic)s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileFault {
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("frame {frame} references parent {parent} which was not allocated before it")]
    DanglingFrameParent { frame: FrameId, parent: FrameId },

    #[error("expression {0} is not present in the expression table")]
    UnknownExpression(ExprId),

    #[error("expression {0} occurs in a binding but was never assigned to a frame")]
    UnmappedExpression(ExprId),
}

pub type CompileResult<T> = Result<T, CompileFault>;
