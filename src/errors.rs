//! HQL error handling.
//!
//! Every stage reports failures through the single [`HqlError`] type. Each
//! variant carries a diagnostic code, the named source it came from and a
//! labelled span so `miette` can render it without re-running anything.
//! Construction goes through [`SourceContext`], which knows the file name and
//! text of the module being compiled.

use crate::ast::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Source text and name used to attach context to diagnostics.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceContext {
    /// Create a source context from real file content
    pub fn from_file(name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("; {}", context).into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.to_string()))
    }

    pub fn parse_error(&self, message: impl Into<String>, span: Span) -> HqlError {
        let (line, column) = line_column(&self.content, span.start);
        HqlError::Parse {
            message: message.into(),
            line,
            column,
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    pub fn expansion_error(
        &self,
        macro_name: &str,
        reason: ExpansionFailure,
        span: Span,
    ) -> HqlError {
        HqlError::MacroExpansion {
            macro_name: macro_name.to_string(),
            reason,
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    pub fn import_error(&self, specifier: &str, reason: ImportFailure, span: Span) -> HqlError {
        HqlError::ImportResolution {
            specifier: specifier.to_string(),
            reason,
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    pub fn purity_error(&self, function_name: &str, offending_symbol: &str, span: Span) -> HqlError {
        HqlError::PureFunctionViolation {
            function_name: function_name.to_string(),
            offending_symbol: offending_symbol.to_string(),
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    pub fn ambiguous_arguments(&self, callee: &str, span: Span) -> HqlError {
        HqlError::AmbiguousArguments {
            callee: callee.to_string(),
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    pub fn malformed(&self, form: &str, message: impl Into<String>, span: Span) -> HqlError {
        HqlError::MalformedForm {
            form: form.to_string(),
            message: message.into(),
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }

    /// Internal errors indicate compiler bugs, not user errors.
    pub fn internal(&self, message: impl Into<String>, span: Span) -> HqlError {
        HqlError::InternalLoweringInvariant {
            message: message.into(),
            src: self.to_named_source(),
            span: to_source_span(span),
        }
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Why a macro invocation could not be expanded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpansionFailure {
    #[error("expansion did not terminate within {limit} nested macro invocations")]
    NonTerminating { limit: usize },
    #[error("{0}")]
    TransformerThrew(String),
}

/// Why an import specifier could not be materialized.
#[derive(Debug, Clone, Error)]
pub enum ImportFailure {
    #[error("module not found: {path}")]
    NotFound { path: String },
    #[error("failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },
    #[error("invalid specifier ({reason})")]
    InvalidSpecifier { reason: String },
    #[error("module does not export '{name}'")]
    UnknownExport { name: String },
    #[error("dependency failed to compile: {cause}")]
    DependencyFailed { cause: Box<HqlError> },
}

/// The unified error type for every compilation stage.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum HqlError {
    #[error("parse error at {line}:{column}: {message}")]
    #[diagnostic(code(hql::parse))]
    Parse {
        message: String,
        line: usize,
        column: usize,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("syntax error")]
        span: SourceSpan,
    },

    #[error("macro expansion of '{macro_name}' failed: {reason}")]
    #[diagnostic(code(hql::macro_expansion))]
    MacroExpansion {
        macro_name: String,
        reason: ExpansionFailure,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("while expanding this form")]
        span: SourceSpan,
    },

    #[error("cannot resolve import '{specifier}': {reason}")]
    #[diagnostic(code(hql::import))]
    ImportResolution {
        specifier: String,
        reason: ImportFailure,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("imported here")]
        span: SourceSpan,
    },

    #[error("pure function '{function_name}' references external symbol '{offending_symbol}'")]
    #[diagnostic(
        code(hql::purity),
        help("pass the value in as a parameter, or declare the function with `fn`")
    )]
    PureFunctionViolation {
        function_name: String,
        offending_symbol: String,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("declared pure here")]
        span: SourceSpan,
    },

    #[error("call to '{callee}' mixes positional and named arguments")]
    #[diagnostic(
        code(hql::ambiguous_arguments),
        help("pass every argument by name, or every argument by position")
    )]
    AmbiguousArguments {
        callee: String,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("ambiguous call")]
        span: SourceSpan,
    },

    #[error("malformed {form}: {message}")]
    #[diagnostic(code(hql::malformed))]
    MalformedForm {
        form: String,
        message: String,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("in this form")]
        span: SourceSpan,
    },

    #[error("internal lowering invariant violated: {message}")]
    #[diagnostic(
        code(hql::internal),
        help("this is a compiler bug; please report it with the source that triggered it")
    )]
    InternalLoweringInvariant {
        message: String,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("i/o error on {path}: {message}")]
    #[diagnostic(code(hql::io))]
    Io { path: String, message: String },

    #[error("configuration error: {message}")]
    #[diagnostic(code(hql::config))]
    Config { message: String },
}

/// Coarse grouping used by hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Macro,
    Import,
    Lowering,
    Internal,
    Io,
    Config,
}

impl HqlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::MacroExpansion { .. } => ErrorCategory::Macro,
            Self::ImportResolution { .. } => ErrorCategory::Import,
            Self::PureFunctionViolation { .. }
            | Self::AmbiguousArguments { .. }
            | Self::MalformedForm { .. } => ErrorCategory::Lowering,
            Self::InternalLoweringInvariant { .. } => ErrorCategory::Internal,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Fatal errors abort the module being compiled; the rest are collected
    /// per top-level form.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Parse
                | ErrorCategory::Import
                | ErrorCategory::Internal
                | ErrorCategory::Io
                | ErrorCategory::Config
        )
    }

    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Converts an AST span to a miette span.
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end)
}

/// 1-based line and display column of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    use unicode_width::UnicodeWidthStr;

    let offset = offset.min(source.len());
    let prefix = source.get(..offset).unwrap_or(source);
    let line = prefix.matches('\n').count() + 1;
    let line_start = prefix.rfind('\n').map_or(0, |i| i + 1);
    let column = prefix[line_start..].width() + 1;
    (line, column)
}

/// Prints an HqlError with full miette diagnostics.
pub fn print_error(error: HqlError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one() {
        let src = "(a\n  (b c))";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 5), (2, 3));
    }

    #[test]
    fn categories_drive_fatality() {
        let ctx = SourceContext::from_file("t.hql", "(f x: 1 2)");
        assert!(!ctx.ambiguous_arguments("f", Span::new(0, 10)).is_fatal());
        assert!(ctx.parse_error("unexpected", Span::new(0, 1)).is_fatal());
        assert!(ctx.internal("boom", Span::new(0, 1)).is_fatal());
    }

    #[test]
    fn purity_message_names_both_symbols() {
        let ctx = SourceContext::from_file("t.hql", "(fx f (x) (+ x y))");
        let err = ctx.purity_error("f", "y", Span::new(0, 18));
        assert_eq!(
            err.to_string(),
            "pure function 'f' references external symbol 'y'"
        );
    }
}
