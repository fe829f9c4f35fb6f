//! Diagnostic rendering for tool output.
//!
//! Two formats, matching what build integrations expect:
//!
//! - classic: `(L,C -> C): <code> error: <prose>` — the default
//! - Visual Studio: `<path>(L,C): error <code>: <prose>` — clickable in
//!   MSVC-style build panes

use nzsl_ast::CompilerError;
use std::path::Path;

/// Diagnostic output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Classic,
    VisualStudio,
}

impl LogFormat {
    /// Parse a `--log-format` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "classic" => Some(LogFormat::Classic),
            "vs" => Some(LogFormat::VisualStudio),
            _ => None,
        }
    }
}

/// Classic rendering (also the error's `Display`).
pub fn format_classic(error: &CompilerError) -> String {
    error.to_string()
}

/// Visual Studio rendering: absolute path, `(line,column)`, code, prose.
pub fn format_visual_studio(error: &CompilerError, source_path: &Path) -> String {
    format!(
        "{}({},{}): error {}{}: {}",
        source_path.display(),
        error.location.start_line,
        error.location.start_column,
        error.kind.category().prefix(),
        error.kind.code(),
        error.kind
    )
}

/// Render with the requested format.
pub fn format_error(error: &CompilerError, format: LogFormat, source_path: &Path) -> String {
    match format {
        LogFormat::Classic => format_classic(error),
        LogFormat::VisualStudio => format_visual_studio(error, source_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{ErrorKind, SourceLocation};
    use std::path::PathBuf;

    fn sample_error() -> CompilerError {
        ErrorKind::UnknownIdentifier {
            identifier: "foo".to_string(),
        }
        .at(SourceLocation::new(5, 11, 5, 13))
    }

    #[test]
    fn test_classic_format() {
        assert_eq!(
            format_classic(&sample_error()),
            "(5,11 -> 13): CUnknownIdentifier error: unknown identifier foo"
        );
    }

    #[test]
    fn test_visual_studio_format() {
        let path = PathBuf::from("/project/shaders/test.nzsl");
        assert_eq!(
            format_visual_studio(&sample_error(), &path),
            "/project/shaders/test.nzsl(5,11): error CUnknownIdentifier: unknown identifier foo"
        );
    }

    #[test]
    fn test_format_names() {
        assert_eq!(LogFormat::from_name("classic"), Some(LogFormat::Classic));
        assert_eq!(LogFormat::from_name("vs"), Some(LogFormat::VisualStudio));
        assert_eq!(LogFormat::from_name("json"), None);
    }
}
