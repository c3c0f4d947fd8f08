use std::cell::RefCell;
use std::rc::Rc;

use glint_glsl::Declaration;

use super::object::GlObject;
use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{Command, DataArgs, ObjectId, ObjectKind, ShaderStage};

/// Shader source and its GL object. Compilation happens in the interpreter
/// when the DATA command carrying the source is executed.
#[derive(Debug)]
pub struct Shader {
    obj:   GlObject,
    stage: ShaderStage,
    code:  Rc<RefCell<String>>,
}

impl Shader {
    pub fn new(ctx: &GlContext, stage: ShaderStage, code: &str) -> Result<Self> {
        let kind = match stage {
            ShaderStage::Vertex => ObjectKind::VertexShader,
            ShaderStage::Fragment => ObjectKind::FragmentShader,
        };
        let mut shader = Self {
            obj: GlObject::new(ctx, kind),
            stage,
            code: Rc::new(RefCell::new(String::new())),
        };
        shader.set_code(code)?;
        Ok(shader)
    }

    pub fn id(&self) -> ObjectId {
        self.obj.id()
    }

    pub fn object(&self) -> &GlObject {
        &self.obj
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn code(&self) -> String {
        self.code.borrow().clone()
    }

    /// Source cell shared with programs this shader is attached to.
    pub(crate) fn code_cell(&self) -> &Rc<RefCell<String>> {
        &self.code
    }

    /// Replaces the source. Programs using this shader must relink.
    pub fn set_code(&mut self, code: &str) -> Result<()> {
        self.obj.push(Command::Data {
            id: self.obj.id(),
            args: DataArgs::Shader { source: code.to_string() },
        })?;
        *self.code.borrow_mut() = code.to_string();
        Ok(())
    }

    pub fn uniforms(&self) -> Result<Vec<Declaration>> {
        glint_glsl::uniforms(&self.code.borrow()).map_err(|e| GlooError::Value(e.to_string()))
    }

    pub fn attributes(&self) -> Result<Vec<Declaration>> {
        glint_glsl::attributes(&self.code.borrow()).map_err(|e| GlooError::Value(e.to_string()))
    }

    pub fn is_deleted(&self) -> bool {
        self.obj.is_deleted()
    }

    pub fn delete(&mut self) {
        self.obj.delete();
    }
}

impl AsRef<Shader> for Shader {
    fn as_ref(&self) -> &Shader {
        self
    }
}

macro_rules! stage_shader {
    ($(#[$meta:meta])* $name:ident, $stage:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(Shader);

        impl $name {
            pub fn new(ctx: &GlContext, code: &str) -> Result<Self> {
                Shader::new(ctx, $stage, code).map(Self)
            }

            pub fn set_code(&mut self, code: &str) -> Result<()> {
                self.0.set_code(code)
            }

            pub fn delete(&mut self) {
                self.0.delete();
            }
        }

        impl std::ops::Deref for $name {
            type Target = Shader;

            fn deref(&self) -> &Shader {
                &self.0
            }
        }

        impl AsRef<Shader> for $name {
            fn as_ref(&self) -> &Shader {
                &self.0
            }
        }
    };
}

stage_shader!(
    /// Vertex stage shader.
    VertexShader,
    ShaderStage::Vertex
);

stage_shader!(
    /// Fragment stage shader.
    FragmentShader,
    ShaderStage::Fragment
);
