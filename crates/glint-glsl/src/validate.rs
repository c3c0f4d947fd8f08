//! A lightweight structural check of shader source.
//!
//! This is not a GLSL compiler. It catches the mistakes that make a real
//! driver reject a shader outright (stray characters, unbalanced brackets,
//! missing statement terminators, no `main`) and reports them as a
//! Mesa-style compiler log, so callers can treat it like a driver.

use crate::lexer::{Lexer, Spanned, Token};

/// Checks `src`, returning a compiler log on failure.
pub fn check(src: &str) -> Result<(), String> {
    let tokens = match Lexer::new(src).tokenize() {
        Ok(t) => t,
        Err(e) => return Err(entry(e.line, e.col, &e.message)),
    };

    let mut errors = Vec::new();
    check_brackets(&tokens, &mut errors);
    check_terminators(&tokens, &mut errors);
    check_literals(&tokens, &mut errors);
    if !has_main(&tokens) {
        errors.push(entry(1, 1, "no function with name 'main'"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors.join("\n")) }
}

fn entry(line: usize, col: usize, message: &str) -> String {
    format!("0:{line}({col}): error: {message}")
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Ident(w) => format!("identifier '{w}'"),
        Token::Number(n) => format!("literal '{n}'"),
        Token::Punct(c) => format!("'{c}'"),
        Token::Directive(d) => format!("'#{d}'"),
        Token::Eof => "end of file".to_string(),
    }
}

fn check_brackets(tokens: &[Spanned], errors: &mut Vec<String>) {
    let mut stack: Vec<(char, &Spanned)> = Vec::new();
    for t in tokens {
        let Token::Punct(c) = t.tok else { continue };
        match c {
            '(' | '[' | '{' => stack.push((c, t)),
            ')' | ']' | '}' => {
                let want = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == want => {}
                    _ => {
                        errors.push(entry(
                            t.line,
                            t.col,
                            &format!("syntax error, unexpected '{c}'"),
                        ));
                        return;
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((open, t)) = stack.pop() {
        errors.push(entry(t.line, t.col, &format!("syntax error, unclosed '{open}'")));
    }
}

/// A `}` closing a block must follow `;`, `{` or another `}`.
fn check_terminators(tokens: &[Spanned], errors: &mut Vec<String>) {
    for pair in tokens.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.tok != Token::Punct('}') {
            continue;
        }
        let ok = matches!(
            prev.tok,
            Token::Punct(';') | Token::Punct('{') | Token::Punct('}') | Token::Directive(_)
        );
        if !ok {
            errors.push(entry(
                cur.line,
                cur.col,
                "syntax error, unexpected '}', expecting ',' or ';'",
            ));
        }
    }
}

/// A literal can never be directly followed by an identifier or literal.
fn check_literals(tokens: &[Spanned], errors: &mut Vec<String>) {
    for pair in tokens.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if matches!(prev.tok, Token::Number(_))
            && matches!(cur.tok, Token::Ident(_) | Token::Number(_))
        {
            errors.push(entry(
                cur.line,
                cur.col,
                &format!("syntax error, unexpected {}", describe(&cur.tok)),
            ));
        }
    }
}

fn has_main(tokens: &[Spanned]) -> bool {
    tokens.windows(3).any(|w| {
        matches!(&w[0].tok, Token::Ident(t) if t == "void")
            && matches!(&w[1].tok, Token::Ident(n) if n == "main")
            && w[2].tok == Token::Punct('(')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::parse_compiler_log;

    const VALID: &str = "attribute vec2 a_position;\n\
                         void main() {\n\
                             gl_Position = vec4(a_position, 0.0, 1.0);\n\
                         }\n";

    #[test]
    fn valid_shader_passes() {
        assert_eq!(check(VALID), Ok(()));
    }

    #[test]
    fn directives_are_fine() {
        let src = "#version 120\n#define SCALE 2.0\nvoid main() { float x = SCALE; }";
        assert_eq!(check(src), Ok(()));
    }

    #[test]
    fn stray_character_is_reported_with_line() {
        let log = check("void main() {\n  gl_Position = $;\n}").unwrap_err();
        let diags = parse_compiler_log(&log);
        assert_eq!(diags[0].line, Some(2));
    }

    #[test]
    fn missing_semicolon() {
        let log = check("void main() {\n  float x = 1.0\n}").unwrap_err();
        assert!(log.starts_with("0:3(1): error:"));
    }

    #[test]
    fn unbalanced_paren() {
        let log = check("void main() {\n  float x = (1.0;\n}").unwrap_err();
        assert!(log.contains("unexpected"));
    }

    #[test]
    fn unclosed_brace() {
        let log = check("void main() {\n  float x = 1.0;\n").unwrap_err();
        assert!(log.contains("unclosed '{'"));
    }

    #[test]
    fn literal_followed_by_identifier() {
        let log = check("void main() {\n  float x = 1.0 y;\n}").unwrap_err();
        let diags = parse_compiler_log(&log);
        assert_eq!(diags[0].line, Some(2));
    }

    #[test]
    fn missing_main() {
        let log = check("float f() { return 1.0; }").unwrap_err();
        assert!(log.contains("'main'"));
    }
}
