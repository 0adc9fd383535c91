//! Paint-layer errors.

use thiserror::Error;

/// Rejections from state attribute parsing. Callers treat these as
/// "ignore the set and keep the previous value", matching attribute
/// semantics, but surface them to diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaintError {
    #[error("unparseable color style: {0:?}")]
    BadColor(String),

    #[error("unknown line cap: {0:?}")]
    BadLineCap(String),

    #[error("unknown line join: {0:?}")]
    BadLineJoin(String),

    #[error("unknown fill rule: {0:?}")]
    BadFillRule(String),
}
