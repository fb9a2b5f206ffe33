//! diagnostics and source locations
//!
//! User facing problems are never returned as `Err`. Every stage pushes [Diagnostic]s into a
//! [Diagnostics] batch and keeps going, so that a single run reports as many problems as
//! possible. [Diagnostics::has_errors] decides whether the next stage may run.
use crate::expression::Expression;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("Warning"),
            Severity::Error => f.write_str("Error"),
        }
    }
}

/// A position in a source file
///
/// `line` and `column` start at 1, `byte` is the offset from the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

/// A range within a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceRange {
    /// `None` for documents that were not loaded from disk
    pub filename: Option<PathBuf>,
    pub start: Pos,
    pub end: Pos,
}

impl SourceRange {
    pub fn bytes(&self) -> Range<usize> {
        self.start.byte..self.end.byte
    }

    /// Range spanning from the start of `self` to the end of `other`
    pub fn to(&self, other: &SourceRange) -> SourceRange {
        SourceRange {
            filename: self.filename.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn filename_display(&self) -> String {
        match &self.filename {
            Some(path) => path.display().to_string(),
            None => "<input>".to_string(),
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filename = self.filename_display();
        if self.start.line == self.end.line {
            write!(
                f,
                "{filename}:{},{}-{}",
                self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{filename}:{},{}-{},{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// A single problem found in the configuration
///
/// `subject` points at the construct that is wrong, `context` optionally at the larger
/// construct around it (for example the block header an extraneous label belongs to).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub subject: Option<SourceRange>,
    pub context: Option<SourceRange>,
    pub expression: Option<Expression>,
}

impl Diagnostic {
    pub fn new(severity: Severity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: String::new(),
            subject: None,
            context: None,
            expression: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(Severity::Error, summary)
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(Severity::Warning, summary)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_subject(mut self, subject: SourceRange) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_context(mut self, context: SourceRange) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_expression(mut self, expression: Expression) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(subject) = &self.subject {
            write!(f, "\n\n  on {subject}")?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n\n{}", self.detail)?;
        }
        Ok(())
    }
}

/// An ordered batch of [Diagnostic]s
#[derive(derive_new::new, Debug, Clone, Default)]
pub struct Diagnostics {
    #[new(default)]
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(
            severity = %diagnostic.severity,
            summary = %diagnostic.summary,
            "diagnostic"
        );
        self.diagnostics.push(diagnostic);
    }

    pub fn append(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self {
            diagnostics: iter.into_iter().collect(),
        }
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.diagnostics.iter().enumerate() {
            if index > 0 {
                f.write_str("\n\n")?;
            }
            diagnostic.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(start: (usize, usize), end: (usize, usize)) -> SourceRange {
        SourceRange {
            filename: Some("file.hcl".into()),
            start: Pos {
                line: start.0,
                column: start.1,
                byte: 0,
            },
            end: Pos {
                line: end.0,
                column: end.1,
                byte: 0,
            },
        }
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning("careful"));
        assert!(!diagnostics.has_errors());

        diagnostics.push(Diagnostic::error("broken"));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn range_display() {
        assert_eq!(range((7, 2), (7, 13)).to_string(), "file.hcl:7,2-13");
        assert_eq!(range((1, 1), (3, 2)).to_string(), "file.hcl:1,1-3,2");
    }

    #[test]
    fn diagnostic_display() {
        let diagnostic = Diagnostic::error("Unsupported resource")
            .with_detail("Resources of type \"x\" are not supported.")
            .with_subject(range((2, 9), (2, 12)));

        assert_eq!(
            diagnostic.to_string(),
            "Error: Unsupported resource\n\n  on file.hcl:2,9-12\n\nResources of type \"x\" are not supported."
        );
    }
}
