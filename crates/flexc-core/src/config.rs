//! Build configuration.

use crate::diagnostics::DiagnosticKind;
use crate::l10n::DEFAULT_LOCALE;

/// Options shared by every phase of a build.
///
/// # Example
///
/// ```
/// use flexc_core::{CompilerConfig, DiagnosticKind};
///
/// let config = CompilerConfig::new()
///     .with_strict(false)
///     .with_style_conflict_severity(DiagnosticKind::Error);
/// assert!(!config.strict);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Report constant initializers that do not match the declared type.
    pub strict: bool,
    pub locale: String,
    pub show_warnings: bool,
    /// Severity of a style conflict. `Warning` lets the build complete.
    pub style_conflict_severity: DiagnosticKind,
    /// Target Flash Player major version. Types the player does not support
    /// are reported in analyze4.
    pub target_player_major: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: true,
            locale: DEFAULT_LOCALE.to_string(),
            show_warnings: true,
            style_conflict_severity: DiagnosticKind::Warning,
            target_player_major: 10,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_show_warnings(mut self, show: bool) -> Self {
        self.show_warnings = show;
        self
    }

    pub fn with_style_conflict_severity(mut self, kind: DiagnosticKind) -> Self {
        self.style_conflict_severity = kind;
        self
    }

    pub fn with_target_player_major(mut self, major: u32) -> Self {
        self.target_player_major = major;
        self
    }
}
