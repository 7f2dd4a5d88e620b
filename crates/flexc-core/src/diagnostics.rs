use std::fmt;

use crate::l10n::LocalizationManager;
use crate::CompilerMessage;

/// A single diagnostic logged during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity level of this diagnostic
    pub kind: DiagnosticKind,
    pub message: CompilerMessage,
    /// Reporting name of the source, if the diagnostic belongs to one
    pub source: Option<String>,
    /// 1-based line, 0 if unknown
    pub line: u32,
    /// 1-based column, 0 if unknown
    pub col: u32,
}

impl Diagnostic {
    /// Render with a localization manager instead of the English fallback.
    pub fn render(&self, l10n: &LocalizationManager) -> String {
        format_line(self, &l10n.localize(&self.message))
    }
}

/// The severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Stops the pipeline at the next gate check.
    Error,
    Warning,
    Info,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Info => "info",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulates the diagnostics of one build.
///
/// Phases consult [`Diagnostics::error_count`] at entry and after each step;
/// once it is nonzero every remaining phase returns early.
#[derive(Debug)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    show_warnings: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
            show_warnings: true,
        }
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// When off, warnings are counted but not recorded.
    pub fn set_show_warnings(&mut self, show: bool) {
        self.show_warnings = show;
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(
            kind = diagnostic.kind.as_str(),
            key = diagnostic.message.key(),
            source = diagnostic.source.as_deref().unwrap_or(""),
            "{}",
            diagnostic.message
        );

        match diagnostic.kind {
            DiagnosticKind::Error => self.error_count += 1,
            DiagnosticKind::Warning => {
                self.warning_count += 1;
                if !self.show_warnings {
                    return;
                }
            }
            DiagnosticKind::Info => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn log(&mut self, kind: DiagnosticKind, source: Option<&str>, message: CompilerMessage) {
        self.add_diagnostic(Diagnostic {
            kind,
            message,
            source: source.map(str::to_string),
            line: 0,
            col: 0,
        });
    }

    pub fn log_error(&mut self, source: Option<&str>, message: CompilerMessage) {
        self.log(DiagnosticKind::Error, source, message);
    }

    pub fn log_warning(&mut self, source: Option<&str>, message: CompilerMessage) {
        self.log(DiagnosticKind::Warning, source, message);
    }

    pub fn log_info(&mut self, source: Option<&str>, message: CompilerMessage) {
        self.log(DiagnosticKind::Info, source, message);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Warning)
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }

    /// Move everything out, leaving the collection empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        self.warning_count = 0;
        std::mem::take(&mut self.diagnostics)
    }

    /// Writes all diagnostics, localized, one per line.
    pub fn emit<W: std::io::Write>(
        &self,
        writer: &mut W,
        l10n: &LocalizationManager,
    ) -> std::io::Result<()> {
        for diagnostic in &self.diagnostics {
            writeln!(writer, "{}", diagnostic.render(l10n))?;
        }
        Ok(())
    }
}

fn format_line(d: &Diagnostic, text: &str) -> String {
    match (&d.source, d.line) {
        (Some(source), 0) => format!("{}: {}: {}", source, d.kind, text),
        (Some(source), line) => format!("{}:{}:{}: {}: {}", source, line, d.col, d.kind, text),
        (None, _) => format!("{}: {}", d.kind, text),
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_line(self, &self.message.to_string()))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
