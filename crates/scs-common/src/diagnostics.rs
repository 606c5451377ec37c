//! Non-fatal decode diagnostics.
//!
//! Structurally broken data is an error. Data that is well formed but
//! semantically incomplete (an unknown enum nibble, a dangling reference) is
//! tolerated: the decoder records a [`Diagnostic`], applies its documented
//! fallback and carries on. The sink is passed in explicitly so callers and
//! tests can inspect what was tolerated; every entry is also emitted as a
//! `tracing` event.

use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Severity {
    Info,
    Warning,
}

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}", self.message)
    }
}

/// Collects diagnostics produced during a decode or parse call.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    /// Record an informational note.
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{message}");
        self.entries.push(Diagnostic {
            severity: Severity::Info,
            message,
        });
    }

    /// All recorded diagnostics, in order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Only the warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move all diagnostics out of another sink into this one.
    pub fn append(&mut self, other: &mut Diagnostics) {
        self.entries.append(&mut other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_recorded_in_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info("opened");
        diagnostics.warn("unknown road size 9");
        diagnostics.warn("unknown colour 7");

        assert_eq!(diagnostics.len(), 3);
        let warnings: Vec<_> = diagnostics.warnings().map(|d| d.message.as_str()).collect();
        assert_eq!(warnings, ["unknown road size 9", "unknown colour 7"]);
        assert_eq!(
            diagnostics.entries()[1].to_string(),
            "warning: unknown road size 9"
        );
    }
}
