//! Programs: shader attachment, staged variables and draw calls.
//!
//! Variables are staged on the wrapper and replayed after every link, so
//! values set before the shaders are complete reach the program once it
//! links. Declarations come from the attached sources, not the driver.

use std::cell::RefCell;
use std::rc::Rc;

use glint_glsl::{Declaration, GlslType};

use super::buffer::{BufferShared, BufferView, IndexBuffer, VertexBuffer};
use super::object::GlObject;
use super::shader::{FragmentShader, Shader, VertexShader};
use super::texture::Sampled;
use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{
    ActiveVariable, AttributeSource, Command, ObjectId, ObjectKind, PrimitiveMode, Selection,
    ShaderStage, VertexLayout,
};

// ── values ────────────────────────────────────────────────────────────────

/// Flattened uniform value. Matrices are given column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformValue(Vec<f32>);

impl UniformValue {
    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self(vec![v])
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self(vec![v as f32])
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self(vec![if v { 1.0 } else { 0.0 }])
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(v: [f32; N]) -> Self {
        Self(v.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for UniformValue {
    fn from(v: [i32; N]) -> Self {
        Self(v.iter().map(|x| *x as f32).collect())
    }
}

impl<const N: usize> From<[[f32; N]; N]> for UniformValue {
    fn from(m: [[f32; N]; N]) -> Self {
        Self(m.iter().flatten().copied().collect())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        Self(v.to_vec())
    }
}

/// Vertex buffer region an attribute reads from.
#[derive(Debug, Clone)]
pub struct BufferBinding {
    vbo:    ObjectId,
    layout: Option<VertexLayout>,
    offset: usize,
    stride: usize,
    /// Fixed element count for views; whole buffers are measured at draw.
    count:  Option<usize>,
    view:   Option<BufferView>,
    shared: Rc<BufferShared>,
}

impl BufferBinding {
    fn vertex_count(&self) -> Result<usize> {
        if self.shared.deleted.get() {
            return Err(GlooError::Resource(format!("vertex buffer {} was deleted", self.vbo)));
        }
        if let Some(view) = &self.view
            && !view.is_valid()
        {
            return Err(GlooError::Resource(format!(
                "view of vertex buffer {} was invalidated by a resize",
                self.vbo
            )));
        }
        if let Some(count) = self.count {
            return Ok(count);
        }
        let itemsize = self.layout.map_or(1, VertexLayout::itemsize).max(1);
        Ok(self.shared.nbytes.get().saturating_sub(self.offset) / itemsize)
    }
}

/// What an attribute is bound to.
#[derive(Debug, Clone)]
pub enum AttributeInput {
    Buffer(BufferBinding),
    Constant(Vec<f32>),
}

impl From<&VertexBuffer> for AttributeInput {
    fn from(vbo: &VertexBuffer) -> Self {
        Self::Buffer(BufferBinding {
            vbo: vbo.id(),
            layout: vbo.layout(),
            offset: 0,
            stride: 0,
            count: None,
            view: None,
            shared: Rc::clone(vbo.shared()),
        })
    }
}

impl From<&BufferView> for AttributeInput {
    fn from(view: &BufferView) -> Self {
        Self::Buffer(BufferBinding {
            vbo: view.buffer_id(),
            layout: Some(view.layout()),
            offset: view.offset(),
            stride: view.stride(),
            count: Some(view.count()),
            view: Some(view.clone()),
            shared: Rc::clone(view.shared()),
        })
    }
}

impl From<f32> for AttributeInput {
    fn from(v: f32) -> Self {
        Self::Constant(vec![v])
    }
}

impl<const N: usize> From<[f32; N]> for AttributeInput {
    fn from(v: [f32; N]) -> Self {
        Self::Constant(v.to_vec())
    }
}

// ── Program ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Attached {
    id:    ObjectId,
    stage: ShaderStage,
    code:  Rc<RefCell<String>>,
}

#[derive(Debug, Clone)]
struct StagedAttribute {
    ty:     GlslType,
    input:  AttributeInput,
    source: AttributeSource,
}

/// A linked pair (or more) of shaders plus the values fed to them.
#[derive(Debug)]
pub struct Program {
    obj:        GlObject,
    shaders:    Vec<Attached>,
    /// Shaders created by [`Program::from_source`]; deleted with the program.
    owned:      Vec<Shader>,
    uniforms:   Vec<(String, GlslType, Vec<f32>)>,
    attributes: Vec<(String, StagedAttribute)>,
    samplers:   Vec<(String, ObjectId)>,
    /// Sources as of the last LINK, `None` until linked.
    linked:     Option<Vec<String>>,
}

impl Program {
    pub fn new(ctx: &GlContext) -> Self {
        Self {
            obj: GlObject::new(ctx, ObjectKind::Program),
            shaders: Vec::new(),
            owned: Vec::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            samplers: Vec::new(),
            linked: None,
        }
    }

    /// Program with both stages attached and linked.
    pub fn with_shaders(ctx: &GlContext, vert: &VertexShader, frag: &FragmentShader) -> Result<Self> {
        let mut program = Self::new(ctx);
        program.attach(vert)?;
        program.attach(frag)?;
        Ok(program)
    }

    /// Program owning new shaders built from `vert` and `frag` sources.
    pub fn from_source(ctx: &GlContext, vert: &str, frag: &str) -> Result<Self> {
        let mut program = Self::new(ctx);
        let vs = Shader::new(ctx, ShaderStage::Vertex, vert)?;
        let fs = Shader::new(ctx, ShaderStage::Fragment, frag)?;
        program.attach(&vs)?;
        program.attach(&fs)?;
        program.owned = vec![vs, fs];
        Ok(program)
    }

    pub fn id(&self) -> ObjectId {
        self.obj.id()
    }

    pub fn object(&self) -> &GlObject {
        &self.obj
    }

    pub fn shader_ids(&self) -> Vec<ObjectId> {
        self.shaders.iter().map(|s| s.id).collect()
    }

    fn has_stage(&self, stage: ShaderStage) -> bool {
        self.shaders.iter().any(|s| s.stage == stage)
    }

    fn is_complete(&self) -> bool {
        self.has_stage(ShaderStage::Vertex) && self.has_stage(ShaderStage::Fragment)
    }

    /// True once LINK is queued and no attached source changed since.
    pub fn is_linked(&self) -> bool {
        self.linked.as_ref().is_some_and(|sources| *sources == self.sources())
    }

    fn sources(&self) -> Vec<String> {
        self.shaders.iter().map(|s| s.code.borrow().clone()).collect()
    }

    /// Attaches a shader. Attaching the same shader twice does nothing.
    /// Links once both stages are present.
    pub fn attach(&mut self, shader: &impl AsRef<Shader>) -> Result<()> {
        let shader = shader.as_ref();
        self.obj.check_alive()?;
        shader.object().check_alive()?;
        if self.shaders.iter().any(|s| s.id == shader.id()) {
            return Ok(());
        }
        self.shaders.push(Attached {
            id: shader.id(),
            stage: shader.stage(),
            code: Rc::clone(shader.code_cell()),
        });
        self.push_shaders()?;
        if self.is_complete() { self.link() } else { Ok(()) }
    }

    /// Detaches a shader. The program needs relinking before the next draw.
    pub fn detach(&mut self, shader: &impl AsRef<Shader>) -> Result<()> {
        let id = shader.as_ref().id();
        let before = self.shaders.len();
        self.shaders.retain(|s| s.id != id);
        if self.shaders.len() == before {
            return Err(GlooError::Value(format!("shader {id} is not attached to program {}", self.id())));
        }
        self.owned.retain(|s| s.id() != id);
        self.push_shaders()
    }

    fn push_shaders(&mut self) -> Result<()> {
        self.obj.push(Command::Shaders { id: self.obj.id(), shaders: self.shader_ids() })?;
        self.linked = None;
        Ok(())
    }

    /// Queues LINK and replays every staged variable still declared.
    pub fn link(&mut self) -> Result<()> {
        self.obj.check_alive()?;
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !self.has_stage(stage) {
                return Err(GlooError::Resource(format!(
                    "program {} has no {stage:?} shader",
                    self.id()
                )));
            }
        }
        self.obj.push(Command::Link { id: self.obj.id() })?;
        self.linked = Some(self.sources());
        self.replay()
    }

    fn replay(&mut self) -> Result<()> {
        let uniforms = self.declared_uniforms()?;
        let attributes = self.declared_attributes()?;
        let declared = |list: &[Declaration], name: &str, ty: GlslType| {
            list.iter().any(|d| d.name == name && d.ty == ty)
        };
        let id = self.obj.id();
        let mut commands = Vec::new();
        for (name, ty, values) in &self.uniforms {
            if declared(&uniforms, name, *ty) {
                commands.push(Command::Uniform { id, name: name.clone(), ty: *ty, values: values.clone() });
            }
        }
        for (name, staged) in &self.attributes {
            if declared(&attributes, name, staged.ty) {
                commands.push(Command::Attribute {
                    id,
                    name: name.clone(),
                    ty: staged.ty,
                    source: staged.source.clone(),
                });
            }
        }
        for (name, texture) in &self.samplers {
            if uniforms.iter().any(|d| d.name == *name && d.ty.is_sampler()) {
                commands.push(Command::Texture { id, name: name.clone(), texture: *texture });
            }
        }
        for command in commands {
            self.obj.push(command)?;
        }
        Ok(())
    }

    fn declarations(&self, attributes: bool) -> Result<Vec<Declaration>> {
        let mut out: Vec<Declaration> = Vec::new();
        for shader in &self.shaders {
            let code = shader.code.borrow();
            let found = if attributes {
                if shader.stage != ShaderStage::Vertex {
                    continue;
                }
                glint_glsl::attributes(&code)
            } else {
                glint_glsl::uniforms(&code)
            }
            .map_err(|e| GlooError::Value(format!("shader {}: {e}", shader.id)))?;
            for decl in found {
                if !out.iter().any(|d| d.name == decl.name) {
                    out.push(decl);
                }
            }
        }
        Ok(out)
    }

    /// Uniforms declared by the attached sources, in source order.
    pub fn declared_uniforms(&self) -> Result<Vec<Declaration>> {
        self.declarations(false)
    }

    /// Attributes declared by the attached vertex sources.
    pub fn declared_attributes(&self) -> Result<Vec<Declaration>> {
        self.declarations(true)
    }

    fn lookup(list: Vec<Declaration>, name: &str, what: &str, program: ObjectId) -> Result<GlslType> {
        list.into_iter()
            .find(|d| d.name == name)
            .map(|d| d.ty)
            .ok_or_else(|| GlooError::Value(format!("program {program} declares no {what} '{name}'")))
    }

    /// Sets a uniform. The value is kept and re-sent after every relink.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        self.obj.check_alive()?;
        let ty = Self::lookup(self.declared_uniforms()?, name, "uniform", self.id())?;
        if ty.is_sampler() {
            return Err(GlooError::Type(format!(
                "'{name}' is a {}; bind a texture with set_texture",
                ty.name()
            )));
        }
        let values = value.into().0;
        if values.len() != ty.components() {
            return Err(GlooError::Value(format!(
                "uniform '{name}' is a {} and takes {} values, got {}",
                ty.name(),
                ty.components(),
                values.len()
            )));
        }
        match self.uniforms.iter_mut().find(|(n, _, _)| n == name) {
            Some(entry) => *entry = (name.to_string(), ty, values.clone()),
            None => self.uniforms.push((name.to_string(), ty, values.clone())),
        }
        if self.is_linked() {
            self.obj.push(Command::Uniform { id: self.obj.id(), name: name.to_string(), ty, values })?;
        }
        Ok(())
    }

    /// Binds an attribute to a vertex buffer, a view of one, or a constant.
    pub fn set_attribute(&mut self, name: &str, input: impl Into<AttributeInput>) -> Result<()> {
        self.obj.check_alive()?;
        let ty = Self::lookup(self.declared_attributes()?, name, "attribute", self.id())?;
        let input = input.into();
        let source = match &input {
            AttributeInput::Buffer(binding) => {
                if binding.shared.deleted.get() {
                    return Err(GlooError::Resource(format!("vertex buffer {} was deleted", binding.vbo)));
                }
                let layout = binding.layout.ok_or_else(|| {
                    GlooError::Value(format!("vertex buffer {} has no data to bind to '{name}'", binding.vbo))
                })?;
                if layout.components as usize > ty.components() {
                    return Err(GlooError::Value(format!(
                        "attribute '{name}' is a {}; buffer elements have {} components",
                        ty.name(),
                        layout.components
                    )));
                }
                AttributeSource::Buffer {
                    vbo: binding.vbo,
                    layout,
                    stride: binding.stride,
                    offset: binding.offset,
                }
            }
            AttributeInput::Constant(values) => {
                if values.len() != ty.components() {
                    return Err(GlooError::Value(format!(
                        "attribute '{name}' is a {} and takes {} values, got {}",
                        ty.name(),
                        ty.components(),
                        values.len()
                    )));
                }
                AttributeSource::Constant(values.clone())
            }
        };
        let staged = StagedAttribute { ty, input, source: source.clone() };
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = staged,
            None => self.attributes.push((name.to_string(), staged)),
        }
        if self.is_linked() {
            self.obj.push(Command::Attribute { id: self.obj.id(), name: name.to_string(), ty, source })?;
        }
        Ok(())
    }

    /// Binds a texture to a sampler uniform. Units are chosen at draw.
    pub fn set_texture<T: Sampled>(&mut self, name: &str, texture: &T) -> Result<()> {
        self.obj.check_alive()?;
        texture.check_alive()?;
        let ty = Self::lookup(self.declared_uniforms()?, name, "sampler", self.id())?;
        if ty != texture.sampler_type() {
            return Err(GlooError::Type(format!(
                "'{name}' is a {}, not a {}",
                ty.name(),
                texture.sampler_type().name()
            )));
        }
        let tex = texture.sampler_id();
        match self.samplers.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = tex,
            None => self.samplers.push((name.to_string(), tex)),
        }
        if self.is_linked() {
            self.obj.push(Command::Texture { id: self.obj.id(), name: name.to_string(), texture: tex })?;
        }
        Ok(())
    }

    /// Checks every declared variable is staged and returns the number of
    /// vertices all buffer-bound attributes can supply.
    fn prepare_draw(&mut self) -> Result<usize> {
        self.obj.check_alive()?;
        if !self.is_complete() {
            return Err(GlooError::Resource(format!(
                "program {} needs a vertex and a fragment shader to draw",
                self.id()
            )));
        }
        if !self.is_linked() {
            log::debug!("program {}: sources changed, relinking", self.id());
            self.link()?;
        }
        let mut count: Option<usize> = None;
        for decl in self.declared_attributes()? {
            let staged = self
                .attributes
                .iter()
                .find(|(n, _)| *n == decl.name)
                .map(|(_, s)| s)
                .ok_or_else(|| {
                    GlooError::Resource(format!("program {}: attribute '{}' is not set", self.id(), decl.name))
                })?;
            if let AttributeInput::Buffer(binding) = &staged.input {
                let n = binding.vertex_count()?;
                count = Some(count.map_or(n, |c| c.min(n)));
            }
        }
        for decl in self.declared_uniforms()? {
            let set = if decl.ty.is_sampler() {
                self.samplers.iter().any(|(n, _)| *n == decl.name)
            } else {
                self.uniforms.iter().any(|(n, _, _)| *n == decl.name)
            };
            if !set {
                log::warn!("program {}: uniform '{}' is not set", self.id(), decl.name);
            }
        }
        Ok(count.unwrap_or(0))
    }

    /// Draws with `mode`, using all vertices or the given index buffer.
    pub fn draw(&mut self, mode: PrimitiveMode, indices: Option<&IndexBuffer>) -> Result<()> {
        let vertices = self.prepare_draw()?;
        let selection = match indices {
            None => Selection::Arrays { first: 0, count: vertices },
            Some(ibo) => {
                ibo.object().check_alive()?;
                let index_type = ibo.index_type().ok_or_else(|| {
                    GlooError::Value(format!("index buffer {} has no data", ibo.id()))
                })?;
                Selection::Elements { ibuf: ibo.id(), index_type, count: ibo.len() }
            }
        };
        self.obj.push(Command::Draw { id: self.obj.id(), mode, selection })
    }

    /// Draws `count` vertices starting at `first`.
    pub fn draw_range(&mut self, mode: PrimitiveMode, first: usize, count: usize) -> Result<()> {
        let vertices = self.prepare_draw()?;
        if first + count > vertices {
            return Err(GlooError::Value(format!(
                "range [{first}, {}) exceeds the {vertices} vertices bound",
                first + count
            )));
        }
        self.obj.push(Command::Draw {
            id: self.obj.id(),
            mode,
            selection: Selection::Arrays { first, count },
        })
    }

    /// Active uniforms reported by the interpreter after linking. Flushes.
    pub fn active_uniforms(&self) -> Result<Vec<ActiveVariable>> {
        self.obj.context().active_uniforms(self.id())
    }

    /// Active attributes reported by the interpreter after linking. Flushes.
    pub fn active_attributes(&self) -> Result<Vec<ActiveVariable>> {
        self.obj.context().active_attributes(self.id())
    }

    pub fn is_deleted(&self) -> bool {
        self.obj.is_deleted()
    }

    pub fn delete(&mut self) {
        self.obj.delete();
        for shader in &mut self.owned {
            shader.delete();
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.delete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlConfig;
    use crate::gloo::Texture2D;
    use crate::glir::{HeadlessBackend, LocalParser, Opcode};

    const VERT: &str = "\
attribute vec2 a_position;
attribute vec3 a_color;
uniform float u_scale;
varying vec3 v_color;
void main() {
    v_color = a_color;
    gl_Position = vec4(a_position * u_scale, 0.0, 1.0);
}
";

    const FRAG: &str = "\
uniform sampler2D u_tex;
varying vec3 v_color;
void main() {
    gl_FragColor = vec4(v_color, 1.0) * texture2D(u_tex, vec2(0.5, 0.5));
}
";

    fn ops(ctx: &GlContext) -> Vec<Opcode> {
        ctx.pending_commands().iter().map(Command::opcode).collect()
    }

    fn headless() -> GlContext {
        GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(4, 4)))
            .unwrap()
            .0
    }

    // ── attach / link ──

    #[test]
    fn links_once_both_stages_are_attached() {
        let ctx = GlContext::new(GlConfig::default());
        let vs = VertexShader::new(&ctx, VERT).unwrap();
        let fs = FragmentShader::new(&ctx, FRAG).unwrap();
        let mut prog = Program::new(&ctx);
        prog.attach(&vs).unwrap();
        prog.attach(&vs).unwrap();
        assert!(!prog.is_linked());
        assert!(matches!(prog.link(), Err(GlooError::Resource(_))));
        prog.attach(&fs).unwrap();
        assert!(prog.is_linked());
        assert_eq!(prog.shader_ids(), [vs.id(), fs.id()]);
        let tail: Vec<_> = ops(&ctx).into_iter().rev().take(2).collect();
        assert_eq!(tail, [Opcode::Link, Opcode::Shaders]);
    }

    #[test]
    fn staged_values_are_replayed_after_link() {
        let ctx = GlContext::new(GlConfig::default());
        let vs = VertexShader::new(&ctx, VERT).unwrap();
        let fs = FragmentShader::new(&ctx, FRAG).unwrap();
        let mut prog = Program::new(&ctx);
        prog.attach(&vs).unwrap();
        prog.set_uniform("u_scale", 2.0f32).unwrap();
        assert_eq!(ops(&ctx).last(), Some(&Opcode::Shaders));
        prog.attach(&fs).unwrap();
        let cmds = ctx.pending_commands();
        let n = cmds.len();
        assert_eq!(cmds[n - 2].opcode(), Opcode::Link);
        assert_eq!(
            cmds[n - 1],
            Command::Uniform { id: prog.id(), name: "u_scale".into(), ty: GlslType::Float, values: vec![2.0] }
        );
    }

    #[test]
    fn code_change_relinks_at_draw() {
        let ctx = GlContext::new(GlConfig::default());
        let mut vs = VertexShader::new(&ctx, "attribute vec2 a_position;\nvoid main() { gl_Position = vec4(a_position, 0.0, 1.0); }\n").unwrap();
        let fs = FragmentShader::new(&ctx, "void main() { gl_FragColor = vec4(1.0); }\n").unwrap();
        let mut prog = Program::with_shaders(&ctx, &vs, &fs).unwrap();
        let vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 3]).unwrap();
        prog.set_attribute("a_position", &vbo).unwrap();
        vs.set_code("attribute vec2 a_position;\nvoid main() { gl_Position = vec4(a_position, 1.0, 1.0); }\n")
            .unwrap();
        assert!(!prog.is_linked());
        prog.draw(PrimitiveMode::Triangles, None).unwrap();
        let tail: Vec<_> = ops(&ctx).into_iter().rev().take(3).collect();
        assert_eq!(tail, [Opcode::Draw, Opcode::Attribute, Opcode::Link]);
    }

    // ── variables ──

    #[test]
    fn uniform_checks() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        assert!(matches!(prog.set_uniform("u_missing", 1.0f32), Err(GlooError::Value(_))));
        assert!(matches!(prog.set_uniform("u_scale", [1.0f32, 2.0]), Err(GlooError::Value(_))));
        assert!(matches!(prog.set_uniform("u_tex", 0i32), Err(GlooError::Type(_))));
        let n = ctx.pending_len();
        prog.set_uniform("u_scale", 0.5f32).unwrap();
        assert_eq!(ctx.pending_len(), n + 1);
    }

    #[test]
    fn attribute_checks() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let wide = VertexBuffer::with_data(&ctx, &[[0.0f32; 4]; 3]).unwrap();
        assert!(matches!(prog.set_attribute("a_position", &wide), Err(GlooError::Value(_))));
        assert!(matches!(prog.set_attribute("a_color", [1.0f32, 0.0]), Err(GlooError::Value(_))));
        prog.set_attribute("a_color", [1.0f32, 0.0, 0.0]).unwrap();
        let empty = VertexBuffer::new(&ctx, Default::default());
        assert!(matches!(prog.set_attribute("a_position", &empty), Err(GlooError::Value(_))));
    }

    #[test]
    fn sampler_type_must_match() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let tex3d = crate::gloo::Texture3D::new(&ctx);
        assert!(matches!(prog.set_texture("u_tex", &tex3d), Err(GlooError::Type(_))));
        let tex = Texture2D::new(&ctx);
        prog.set_texture("u_tex", &tex).unwrap();
        assert_eq!(
            ctx.pending_commands().last(),
            Some(&Command::Texture { id: prog.id(), name: "u_tex".into(), texture: tex.id() })
        );
    }

    // ── draw ──

    #[test]
    fn draw_requires_attributes() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let pos = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 6]).unwrap();
        prog.set_attribute("a_position", &pos).unwrap();
        assert!(matches!(prog.draw(PrimitiveMode::Triangles, None), Err(GlooError::Resource(_))));
        let colors = VertexBuffer::with_data(&ctx, &[[1.0f32; 3]; 4]).unwrap();
        prog.set_attribute("a_color", &colors).unwrap();
        prog.draw(PrimitiveMode::Triangles, None).unwrap();
        let draw = ctx.pending_commands().pop().unwrap();
        assert_eq!(
            draw,
            Command::Draw {
                id: prog.id(),
                mode: PrimitiveMode::Triangles,
                selection: Selection::Arrays { first: 0, count: 4 },
            }
        );
    }

    #[test]
    fn draw_with_deleted_buffer_fails() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let mut pos = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 3]).unwrap();
        prog.set_attribute("a_position", &pos).unwrap();
        prog.set_attribute("a_color", [1.0f32; 3]).unwrap();
        pos.delete();
        assert!(matches!(prog.draw(PrimitiveMode::Points, None), Err(GlooError::Resource(_))));
    }

    #[test]
    fn draw_elements_and_ranges() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let pos = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 4]).unwrap();
        prog.set_attribute("a_position", &pos.view(0..4).unwrap()).unwrap();
        prog.set_attribute("a_color", [1.0f32; 3]).unwrap();
        let ibo = IndexBuffer::with_data(&ctx, &[0u16, 1, 2, 2, 3, 0]).unwrap();
        prog.draw(PrimitiveMode::Triangles, Some(&ibo)).unwrap();
        assert!(matches!(
            ctx.pending_commands().last(),
            Some(Command::Draw { selection: Selection::Elements { count: 6, .. }, .. })
        ));
        assert!(matches!(prog.draw_range(PrimitiveMode::Lines, 2, 3), Err(GlooError::Value(_))));
        prog.draw_range(PrimitiveMode::Lines, 2, 2).unwrap();
    }

    #[test]
    fn headless_draw_and_active_variables() {
        let ctx = headless();
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let pos = VertexBuffer::with_data(&ctx, &[[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        let tex = Texture2D::with_data(&ctx, &[255u8; 4], &[1, 1, 4]).unwrap();
        prog.set_attribute("a_position", &pos).unwrap();
        prog.set_attribute("a_color", [1.0f32, 1.0, 1.0]).unwrap();
        prog.set_uniform("u_scale", 1.0f32).unwrap();
        prog.set_texture("u_tex", &tex).unwrap();
        prog.draw(PrimitiveMode::Triangles, None).unwrap();
        ctx.flush().unwrap();
        assert!(prog.object().valid());
        let names: Vec<_> = prog.active_attributes().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, ["a_position", "a_color"]);
        let uniforms: Vec<_> = prog.active_uniforms().unwrap().into_iter().map(|v| v.name).collect();
        assert!(uniforms.contains(&"u_scale".to_string()));
    }

    #[test]
    fn delete_takes_owned_shaders() {
        let ctx = GlContext::new(GlConfig::default());
        let mut prog = Program::from_source(&ctx, VERT, FRAG).unwrap();
        let shaders = prog.shader_ids();
        prog.delete();
        let deleted: Vec<_> = ctx
            .pending_commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Delete { id } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(deleted, [prog.id(), shaders[0], shaders[1]]);
    }
}
