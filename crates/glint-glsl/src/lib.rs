//! GLSL source tooling for the **glint** GL object model.
//!
//! This crate is intentionally dependency-free so shader tooling can be used
//! by editors, linters and the interpreter without pulling in GL bindings.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`convert`] | `ShaderDialect`, `convert_shader` |
//! | [`decl`] | `GlslType`, `Declaration`, `uniforms`, `attributes` |
//! | [`diagnostics`] | `ShaderDiagnostic`, compiler-log parsing and formatting |
//! | [`error`] | `GlslError` |
//! | [`lexer`] | `Lexer`, `Token`, `strip_comments` |
//! | [`validate`] | structural `check` producing a Mesa-style log |
//!
//! # Quick start
//!
//! ```rust
//! use glint_glsl::{uniforms, GlslType};
//!
//! let src = r#"
//!     uniform mat4 u_mvp;
//!     uniform float u_weights[2];
//!     void main() { }
//! "#;
//!
//! let decls = uniforms(src).unwrap();
//! assert_eq!(decls[0].ty, GlslType::Mat4);
//! assert_eq!(decls[2].name, "u_weights[1]");
//! ```

pub mod convert;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod validate;

pub use convert::{convert_shader, ShaderDialect};
pub use decl::{attributes, uniforms, Declaration, GlslType, Qualifier};
pub use diagnostics::{format_diagnostics, parse_compiler_log, ShaderDiagnostic};
pub use error::GlslError;

#[cfg(test)]
mod shader_tests {
    use super::*;

    const VERT: &str = "\
attribute vec2 a_position;
attribute vec2 a_texcoord;
uniform mat4 u_transform;
varying vec2 v_texcoord;
void main() {
    v_texcoord = a_texcoord;
    gl_Position = u_transform * vec4(a_position, 0.0, 1.0);
}";

    const FRAG: &str = "\
uniform sampler2D u_texture;
uniform vec4 u_tint, u_fog;
varying vec2 v_texcoord;
void main() {
    gl_FragColor = texture2D(u_texture, v_texcoord) * u_tint;
}";

    #[test] fn vertex_attributes() {
        let a = attributes(VERT).unwrap();
        assert_eq!(a.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), ["a_position", "a_texcoord"]);
    }
    #[test] fn fragment_uniforms() {
        let u = uniforms(FRAG).unwrap();
        assert_eq!(u.len(), 3);
        assert_eq!(u[0].ty, GlslType::Sampler2D);
    }
    #[test] fn both_shaders_validate() {
        validate::check(VERT).unwrap();
        validate::check(FRAG).unwrap();
    }
    #[test] fn converted_shaders_still_validate() {
        validate::check(&convert_shader(FRAG, ShaderDialect::Es2)).unwrap();
        validate::check(&convert_shader(FRAG, ShaderDialect::Desktop)).unwrap();
    }
    #[test] fn broken_shader_round_trips_through_diagnostics() {
        let src = VERT.replace("0.0, 1.0);", "0.0, 1.0)");
        let log = validate::check(&src).unwrap_err();
        let diags = parse_compiler_log(&log);
        let text = format_diagnostics(&src, &diags, 0);
        assert!(text.starts_with("on line 8:"));
        assert!(text.contains("  }"));
    }
}
