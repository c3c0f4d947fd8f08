//! Parsing of driver compiler logs into line-tagged diagnostics.
//!
//! Recognised log formats:
//!
//! | vendor          | example                                                   |
//! |-----------------|-----------------------------------------------------------|
//! | Nvidia          | `0(7): error C1008: undefined variable "MV"`              |
//! | ATI / Intel     | `ERROR: 0:131: '{' : syntax error parse error`            |
//! | Mesa / Nouveau  | `0:28(16): error: syntax error, unexpected ')'`           |
//!
//! Anything else is kept verbatim with no line number.

use std::fmt;

/// One entry of a shader compiler log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDiagnostic {
    /// 1-based source line the driver blamed, when it could be extracted.
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ShaderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "on line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Splits a single log line into `(line, message)`.
pub fn parse_error_line(error: &str) -> (Option<usize>, String) {
    let error = error.trim();
    if let Some(parsed) = parse_nvidia(error)
        .or_else(|| parse_ati_intel(error))
        .or_else(|| parse_mesa(error))
    {
        return (Some(parsed.0), parsed.1.to_string());
    }
    (None, error.to_string())
}

/// Parses a whole compiler log, skipping blank lines.
pub fn parse_compiler_log(log: &str) -> Vec<ShaderDiagnostic> {
    log.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            let (line, message) = parse_error_line(l);
            ShaderDiagnostic { line, message }
        })
        .collect()
}

/// Renders diagnostics against the offending source, quoting the blamed line
/// under each entry. Every output line is prefixed with `indent` spaces.
pub fn format_diagnostics(code: &str, diagnostics: &[ShaderDiagnostic], indent: usize) -> String {
    let lines: Vec<&str> = code.split('\n').map(str::trim).collect();
    let pad = " ".repeat(indent);
    let mut out = Vec::new();
    for diag in diagnostics {
        out.push(format!("{pad}{diag}"));
        if let Some(n) = diag.line {
            if n > 0 && n <= lines.len() {
                out.push(format!("{pad}  {}", lines[n - 1]));
            }
        }
    }
    out.join("\n")
}

// ── vendor formats ────────────────────────────────────────────────────────

/// Consumes a run of ASCII digits, returning the value and the remainder.
fn digits(s: &str) -> Option<(usize, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].parse().ok()?, &s[end..]))
}

/// `(\d+)\((\d+)\)\s*:\s(.*)`
fn parse_nvidia(s: &str) -> Option<(usize, &str)> {
    let (_, rest) = digits(s)?;
    let rest = rest.strip_prefix('(')?;
    let (line, rest) = digits(rest)?;
    let rest = rest.strip_prefix(')')?.trim_start();
    let msg = rest.strip_prefix(':')?;
    let msg = strip_one_space(msg)?;
    Some((line, msg))
}

/// `ERROR:\s(\d+):(\d+):\s(.*)`
fn parse_ati_intel(s: &str) -> Option<(usize, &str)> {
    let rest = strip_one_space(s.strip_prefix("ERROR:")?)?;
    let (_, rest) = digits(rest)?;
    let (line, rest) = digits(rest.strip_prefix(':')?)?;
    let msg = strip_one_space(rest.strip_prefix(':')?)?;
    Some((line, msg))
}

/// `(\d+):(\d+)\((\d+)\):\s(.*)`
fn parse_mesa(s: &str) -> Option<(usize, &str)> {
    let (_, rest) = digits(s)?;
    let (line, rest) = digits(rest.strip_prefix(':')?)?;
    let (_, rest) = digits(rest.strip_prefix('(')?)?;
    let msg = strip_one_space(rest.strip_prefix("):")?)?;
    Some((line, msg))
}

fn strip_one_space(s: &str) -> Option<&str> {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => Some(chars.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvidia_format() {
        let (line, msg) = parse_error_line("0(7): error C1008: undefined variable \"MV\"");
        assert_eq!(line, Some(7));
        assert_eq!(msg, "error C1008: undefined variable \"MV\"");
    }

    #[test]
    fn ati_intel_format() {
        let (line, msg) = parse_error_line("ERROR: 0:131: '{' : syntax error parse error");
        assert_eq!(line, Some(131));
        assert_eq!(msg, "'{' : syntax error parse error");
    }

    #[test]
    fn mesa_format() {
        let (line, msg) =
            parse_error_line("0:28(16): error: syntax error, unexpected ')', expecting '('");
        assert_eq!(line, Some(28));
        assert_eq!(msg, "error: syntax error, unexpected ')', expecting '('");
    }

    #[test]
    fn unknown_format_is_verbatim() {
        assert_eq!(parse_error_line("link failed"), (None, "link failed".to_string()));
    }

    #[test]
    fn log_skips_blank_lines() {
        let diags = parse_compiler_log("\n0(2): error A\n\n   \nsomething else\n");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].line, Some(2));
        assert_eq!(diags[1].line, None);
    }

    #[test]
    fn format_quotes_source_line() {
        let code = "void main() {\n    gl_Position = vec4(1.0)\n}";
        let diags = parse_compiler_log("0:2(28): error: syntax error");
        let text = format_diagnostics(code, &diags, 0);
        assert_eq!(text, "on line 2: error: syntax error\n  gl_Position = vec4(1.0)");
    }

    #[test]
    fn format_quotes_last_line() {
        let code = "a\nb\nlast";
        let diags = vec![ShaderDiagnostic { line: Some(3), message: "oops".into() }];
        assert!(format_diagnostics(code, &diags, 0).ends_with("  last"));
    }

    #[test]
    fn format_applies_indent_and_skips_out_of_range() {
        let diags = vec![ShaderDiagnostic { line: Some(40), message: "far".into() }];
        assert_eq!(format_diagnostics("x", &diags, 4), "    on line 40: far");
    }
}
