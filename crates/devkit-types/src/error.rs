//! The closed error taxonomy shared by the evaluator and session layers.
//!
//! Errors are never swallowed by the core: the evaluator and process
//! propagate them upward with whatever partial output was already
//! produced. The boundary handler maps each category to a distinct
//! reaction marker and may stash the scrubbed detail for later
//! retrieval via [`TracebackStore`].

use std::time::Duration;

use thiserror::Error;

/// Marker attached to a message when an operation completed cleanly.
pub const SUCCESS_MARKER: char = '\u{2611}'; // ☑

/// Error taxonomy for evaluator and session operations.
#[derive(Debug, Error)]
pub enum DevError {
    /// Source failed to parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// No output within the idle window, or a deadline elapsed.
    #[error("no output in the last {0:?}")]
    Timeout(Duration),

    /// Unresolved name during evaluation.
    #[error("name {0:?} is not defined")]
    Reference(String),

    /// Index/key/type/value errors raised by evaluated code.
    #[error("{0}")]
    Runtime(String),

    /// Division by zero and friends.
    #[error("{0}")]
    Arithmetic(String),

    /// Cooperative cancellation via forced kill.
    #[error("{0}")]
    Interrupted(String),

    /// Operation attempted against an already-terminated session.
    #[error("{0}")]
    ConnectionRefused(String),

    /// Anything not covered by the categories above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The closed category set, used for marker selection and bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Syntax,
    Timeout,
    Reference,
    Runtime,
    Arithmetic,
    Interrupted,
    ConnectionRefused,
    Other,
}

impl ErrorCategory {
    /// The reaction marker shown for this category.
    pub fn marker(self) -> char {
        match self {
            ErrorCategory::Syntax => '\u{1f4a2}',            // 💢
            ErrorCategory::Timeout => '\u{23f0}',            // ⏰
            ErrorCategory::Reference => '\u{2753}',          // ❓
            ErrorCategory::Runtime => '\u{2757}',            // ❗
            ErrorCategory::Arithmetic => '\u{2049}',         // ⁉
            ErrorCategory::Interrupted => '\u{23f9}',        // ⏹
            ErrorCategory::ConnectionRefused => '\u{26d4}',  // ⛔
            ErrorCategory::Other => '\u{203c}',              // ‼
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Reference => "reference",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Arithmetic => "arithmetic",
            ErrorCategory::Interrupted => "interrupted",
            ErrorCategory::ConnectionRefused => "connection refused",
            ErrorCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl DevError {
    /// Shorthand for a timeout after `secs` seconds.
    pub fn timeout_secs(secs: u64) -> Self {
        DevError::Timeout(Duration::from_secs(secs))
    }

    /// The category this error falls under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DevError::Syntax(_) => ErrorCategory::Syntax,
            DevError::Timeout(_) => ErrorCategory::Timeout,
            DevError::Reference(_) => ErrorCategory::Reference,
            DevError::Runtime(_) => ErrorCategory::Runtime,
            DevError::Arithmetic(_) => ErrorCategory::Arithmetic,
            DevError::Interrupted(_) => ErrorCategory::Interrupted,
            DevError::ConnectionRefused(_) => ErrorCategory::ConnectionRefused,
            DevError::Other(_) => ErrorCategory::Other,
        }
    }

    /// The reaction marker for this error.
    pub fn marker(&self) -> char {
        self.category().marker()
    }
}

/// Holds full error detail for later retrieval.
///
/// Detail is only stored while saving is enabled, and draining the store
/// discards it. Callers are expected to scrub path fragments and secret
/// values before pushing.
#[derive(Debug, Default)]
pub struct TracebackStore {
    saved: Vec<(ErrorCategory, String)>,
    enabled: bool,
}

impl TracebackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable saving of error detail.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an error's detail if saving is enabled.
    pub fn push(&mut self, category: ErrorCategory, detail: impl Into<String>) {
        if self.enabled {
            self.saved.push((category, detail.into()));
        }
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Take all saved detail, clearing the store and disabling saving.
    pub fn drain(&mut self) -> Vec<(ErrorCategory, String)> {
        self.enabled = false;
        std::mem::take(&mut self.saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_distinct_per_category() {
        let categories = [
            ErrorCategory::Syntax,
            ErrorCategory::Timeout,
            ErrorCategory::Reference,
            ErrorCategory::Runtime,
            ErrorCategory::Arithmetic,
            ErrorCategory::Interrupted,
            ErrorCategory::ConnectionRefused,
            ErrorCategory::Other,
        ];
        let markers: std::collections::HashSet<char> =
            categories.iter().map(|c| c.marker()).collect();
        assert_eq!(markers.len(), categories.len());
    }

    #[test]
    fn category_mapping() {
        assert_eq!(
            DevError::Syntax("bad".into()).category(),
            ErrorCategory::Syntax
        );
        assert_eq!(
            DevError::timeout_secs(60).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            DevError::Other(anyhow::anyhow!("boom")).category(),
            ErrorCategory::Other
        );
    }

    #[test]
    fn store_ignores_pushes_while_disabled() {
        let mut store = TracebackStore::new();
        store.push(ErrorCategory::Runtime, "detail");
        assert!(store.is_empty());
    }

    #[test]
    fn drain_clears_and_disables() {
        let mut store = TracebackStore::new();
        store.enable();
        store.push(ErrorCategory::Runtime, "detail");
        let drained = store.drain();
        assert_eq!(drained.len(), 1);
        assert!(store.is_empty());
        assert!(!store.is_enabled());
    }
}
