use std::fmt;

/// An error produced while scanning GLSL source.
#[derive(Debug, Clone, PartialEq)]
pub struct GlslError {
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
}

impl GlslError {
    pub(crate) fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { message: msg.into(), line, col }
    }
}

impl fmt::Display for GlslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "glsl error at {}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for GlslError {}
