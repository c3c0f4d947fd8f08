//! Conversion between the desktop GLSL 1.20 and GLSL ES 1.00 dialects.
//!
//! The two dialects used by the object model differ only in preamble:
//! ES requires a default float precision and rejects `#version 120`, while
//! desktop drivers reject precision statements without `#version 130+`.

/// GLSL flavour expected by an interpreter.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ShaderDialect {
    /// Desktop OpenGL 2.1 (`#version 120`).
    #[default]
    Desktop,
    /// OpenGL ES 2.0 / WebGL 1.
    Es2,
}

impl ShaderDialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Es2 => "es2",
        }
    }
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Rewrites `code` for `dialect`. Removed lines are blanked rather than
/// dropped so compiler line numbers still match the original source.
pub fn convert_shader(code: &str, dialect: ShaderDialect) -> String {
    match dialect {
        ShaderDialect::Es2 => to_es2(code),
        ShaderDialect::Desktop => to_desktop(code),
    }
}

fn is_directive(line: &str, name: &str) -> bool {
    line.trim_start()
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim_start().starts_with(name))
}

fn is_precision_statement(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("precision")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

fn to_es2(code: &str) -> String {
    let has_precision = code.lines().any(is_precision_statement);
    let mut lines: Vec<String> = code
        .lines()
        .map(|l| if is_directive(l, "version") { String::new() } else { l.to_string() })
        .collect();
    if !has_precision {
        // #extension lines must stay ahead of any statement.
        let at = lines
            .iter()
            .rposition(|l| is_directive(l, "extension"))
            .map_or(0, |i| i + 1);
        lines.insert(at, "precision highp float;".to_string());
    }
    lines.join("\n")
}

fn to_desktop(code: &str) -> String {
    let has_version = code.lines().any(|l| is_directive(l, "version"));
    let body = code
        .lines()
        .map(|l| if is_precision_statement(l) { String::new() } else { strip_qualifiers(l) })
        .collect::<Vec<_>>()
        .join("\n");
    if has_version { body } else { format!("#version 120\n{body}") }
}

/// Removes precision qualifier words from one line.
fn strip_qualifiers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if PRECISION_QUALIFIERS.contains(&word.as_str()) {
            // Eat the separator that followed the qualifier.
            word.clear();
            return true;
        }
        out.push_str(word);
        word.clear();
        false
    };
    let mut skip_space = false;
    for c in line.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            skip_space = flush(&mut word, &mut out);
        }
        if skip_space && c == ' ' {
            skip_space = false;
            continue;
        }
        skip_space = false;
        out.push(c);
    }
    if !word.is_empty() {
        flush(&mut word, &mut out);
    }
    out
}
