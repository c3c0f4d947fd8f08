//! Discovery of `uniform` / `attribute` declarations from shader source.
//!
//! Handles the declaration forms:
//! - `uniform float a;`
//! - `uniform float a[3];` (expanded to `a[0]`, `a[1]`, `a[2]`)
//! - `uniform float a, b, c;`
//! - precision qualifiers (`uniform highp vec4 a;`)
//!
//! Declarations of types outside [`GlslType`] (user structs, for example)
//! are skipped.

use crate::error::GlslError;
use crate::lexer::{Lexer, Spanned, Token};

/// GLSL variable types understood by the object model.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GlslType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

impl GlslType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "bool" => Self::Bool,
            "bvec2" => Self::BVec2,
            "bvec3" => Self::BVec3,
            "bvec4" => Self::BVec4,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            "sampler3D" => Self::Sampler3D,
            "samplerCube" => Self::SamplerCube,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Int => "int",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::Bool => "bool",
            Self::BVec2 => "bvec2",
            Self::BVec3 => "bvec3",
            Self::BVec4 => "bvec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::Sampler3D => "sampler3D",
            Self::SamplerCube => "samplerCube",
        }
    }

    /// Number of scalar components a value of this type holds.
    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Sampler2D | Self::Sampler3D | Self::SamplerCube => 1,
            Self::Vec2 | Self::IVec2 | Self::BVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::BVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::BVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D | Self::Sampler3D | Self::SamplerCube)
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, Self::Mat2 | Self::Mat3 | Self::Mat4)
    }

    /// True for types whose values are uploaded as integers.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int
                | Self::IVec2
                | Self::IVec3
                | Self::IVec4
                | Self::Bool
                | Self::BVec2
                | Self::BVec3
                | Self::BVec4
        ) || self.is_sampler()
    }
}

/// Storage qualifier of a discovered declaration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Qualifier {
    Uniform,
    Attribute,
}

impl Qualifier {
    fn keyword(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Attribute => "attribute",
        }
    }
}

/// One declared variable. Array declarations are expanded per element, so
/// `name` may look like `weights[2]`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Declaration {
    pub name: String,
    pub ty: GlslType,
}

const PRECISIONS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Returns the uniforms declared in `src`, in source order.
pub fn uniforms(src: &str) -> Result<Vec<Declaration>, GlslError> {
    scan(src, Qualifier::Uniform)
}

/// Returns the attributes declared in `src`, in source order.
pub fn attributes(src: &str) -> Result<Vec<Declaration>, GlslError> {
    scan(src, Qualifier::Attribute)
}

/// Scans `src` for top-level declarations with the given qualifier.
pub fn scan(src: &str, qualifier: Qualifier) -> Result<Vec<Declaration>, GlslError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if is_ident(&tokens[i], qualifier.keyword()) {
            i = parse_declaration(&tokens, i + 1, &mut out)?;
        } else {
            i += 1;
        }
    }
    Ok(out)
}

fn is_ident(tok: &Spanned, word: &str) -> bool {
    matches!(&tok.tok, Token::Ident(w) if w == word)
}

fn ident(tok: &Spanned) -> Option<&str> {
    match &tok.tok {
        Token::Ident(w) => Some(w.as_str()),
        _ => None,
    }
}

/// Parses `[precision] type name ([N])? (, name ([N])?)* ;` starting at `i`.
/// Returns the index after the terminating `;`.
fn parse_declaration(
    tokens: &[Spanned],
    mut i: usize,
    out: &mut Vec<Declaration>,
) -> Result<usize, GlslError> {
    let at = |i: usize| tokens.get(i).unwrap_or(&tokens[tokens.len() - 1]);

    if ident(at(i)).is_some_and(|w| PRECISIONS.contains(&w)) {
        i += 1;
    }

    let ty_tok = at(i);
    let ty_name = ident(ty_tok)
        .ok_or_else(|| GlslError::new("expected a type name", ty_tok.line, ty_tok.col))?;
    let Some(ty) = GlslType::from_name(ty_name) else {
        let end = tokens[i..]
            .iter()
            .position(|t| matches!(t.tok, Token::Punct(';') | Token::Eof))
            .map_or(tokens.len(), |p| i + p + 1);
        return Ok(end);
    };
    i += 1;

    loop {
        let name_tok = at(i);
        let name = ident(name_tok)
            .ok_or_else(|| GlslError::new("expected a variable name", name_tok.line, name_tok.col))?
            .to_string();
        i += 1;

        if at(i).tok == Token::Punct('[') {
            let size_tok = at(i + 1);
            let size = match &size_tok.tok {
                Token::Number(n) => n.trim_end_matches(['u', 'U']).parse::<usize>().ok(),
                _ => None,
            }
            .ok_or_else(|| GlslError::new("expected an array size", size_tok.line, size_tok.col))?;
            if size == 0 {
                return Err(GlslError::new(
                    "size of array declaration cannot be zero",
                    size_tok.line,
                    size_tok.col,
                ));
            }
            if at(i + 2).tok != Token::Punct(']') {
                let t = at(i + 2);
                return Err(GlslError::new("expected `]`", t.line, t.col));
            }
            i += 3;
            out.extend((0..size).map(|k| Declaration { name: format!("{name}[{k}]"), ty }));
        } else {
            out.push(Declaration { name, ty });
        }

        match &at(i).tok {
            Token::Punct(',') => i += 1,
            Token::Punct(';') => return Ok(i + 1),
            _ => {
                let t = at(i);
                return Err(GlslError::new("expected `,` or `;` in declaration", t.line, t.col));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(decls: &[Declaration]) -> Vec<&str> {
        decls.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn single_uniform() {
        let u = uniforms("uniform float u_scale;").unwrap();
        assert_eq!(u, vec![Declaration { name: "u_scale".into(), ty: GlslType::Float }]);
    }

    #[test]
    fn multiple_names_share_type() {
        let u = uniforms("uniform vec2 a, b,c;").unwrap();
        assert_eq!(names(&u), ["a", "b", "c"]);
        assert!(u.iter().all(|d| d.ty == GlslType::Vec2));
    }

    #[test]
    fn arrays_are_expanded() {
        let u = uniforms("uniform float w[3];").unwrap();
        assert_eq!(names(&u), ["w[0]", "w[1]", "w[2]"]);
    }

    #[test]
    fn zero_sized_array_is_rejected() {
        assert!(uniforms("uniform float w[0];").is_err());
    }

    #[test]
    fn precision_qualifier_is_skipped() {
        let a = attributes("attribute highp vec3 a_position;").unwrap();
        assert_eq!(a[0].ty, GlslType::Vec3);
    }

    #[test]
    fn commented_out_declarations_are_ignored() {
        let src = "// uniform float hidden;\n/* uniform vec4 gone; */\nuniform mat4 u_mvp;";
        assert_eq!(names(&uniforms(src).unwrap()), ["u_mvp"]);
    }

    #[test]
    fn qualifiers_do_not_mix() {
        let src = "attribute vec2 a_pos; uniform sampler2D u_tex;";
        assert_eq!(names(&attributes(src).unwrap()), ["a_pos"]);
        assert_eq!(names(&uniforms(src).unwrap()), ["u_tex"]);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let u = uniforms("uniform Light u_light;\nuniform float u_gain;").unwrap();
        assert_eq!(names(&u), ["u_gain"]);
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let err = uniforms("uniform float a b;").unwrap_err();
        assert_eq!((err.line, err.col), (1, 17));
    }

    #[test]
    fn type_properties() {
        assert_eq!(GlslType::Mat3.components(), 9);
        assert!(GlslType::Sampler2D.is_sampler());
        assert!(GlslType::BVec2.is_integer());
        assert!(!GlslType::Vec4.is_integer());
        assert_eq!(GlslType::from_name("ivec3"), Some(GlslType::IVec3));
    }
}
