//! The graphics API seam used by [`LocalParser`](super::LocalParser).
//!
//! Methods take explicit handles rather than relying on bind state, so an
//! implementation is free to bind/unbind as its API requires.

use glint_glsl::GlslType;

use super::command::{GlCall, VertexLayout};
use super::enums::*;
use super::parser::{ActiveVariable, Handle};
use crate::error::Result;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture3D,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// What a framebuffer attachment point refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attachment {
    None,
    Texture2D(Handle),
    RenderBuffer(Handle),
}

/// Optional features checked at interpretation time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Capabilities {
    pub texture_3d: bool,
    /// `float32` texel storage.
    pub float_textures: bool,
    pub max_texture_size: usize,
    pub max_texture_units: usize,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { texture_3d: false, float_textures: false, max_texture_size: 2048, max_texture_units: 8 }
    }
}

pub trait GlBackend {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Size of the default framebuffer in pixels.
    fn framebuffer_size(&self) -> (usize, usize);

    // ── objects ──

    fn create_buffer(&mut self) -> Result<Handle>;
    fn create_texture(&mut self) -> Result<Handle>;
    fn create_shader(&mut self, stage: ShaderStage) -> Result<Handle>;
    fn create_program(&mut self) -> Result<Handle>;
    fn create_renderbuffer(&mut self) -> Result<Handle>;
    fn create_framebuffer(&mut self) -> Result<Handle>;
    fn delete_object(&mut self, kind: ObjectKind, handle: Handle);

    // ── buffers ──

    /// (Re)allocates `nbytes` of uninitialised storage.
    fn buffer_size(
        &mut self,
        target: BufferTarget,
        buffer: Handle,
        nbytes: usize,
        usage: BufferUsage,
    ) -> Result<()>;

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        buffer: Handle,
        offset: usize,
        data: &[u8],
    ) -> Result<()>;

    // ── textures ──

    /// (Re)allocates a level. `shape` is `[h, w, c]` or `[d, h, w, c]`.
    #[allow(clippy::too_many_arguments)]
    fn texture_image(
        &mut self,
        target: TextureTarget,
        texture: Handle,
        level: u32,
        shape: &[usize],
        format: TextureFormat,
        texel: TexelType,
    ) -> Result<()>;

    /// Uploads `data` of `shape` at `offset` (`[y, x]` or `[z, y, x]`).
    #[allow(clippy::too_many_arguments)]
    fn texture_sub_image(
        &mut self,
        target: TextureTarget,
        texture: Handle,
        level: u32,
        offset: &[usize],
        shape: &[usize],
        format: TextureFormat,
        texel: TexelType,
        data: &[u8],
    ) -> Result<()>;

    fn texture_interpolation(
        &mut self,
        target: TextureTarget,
        texture: Handle,
        min: Interpolation,
        mag: Interpolation,
    );

    fn texture_wrapping(&mut self, target: TextureTarget, texture: Handle, wrap: &[Wrapping]);

    // ── shaders & programs ──

    /// Sets source and compiles. `Err` carries the driver's info log.
    fn compile_shader(&mut self, shader: Handle, source: &str) -> std::result::Result<(), String>;
    fn attach_shader(&mut self, program: Handle, shader: Handle);
    fn detach_shader(&mut self, program: Handle, shader: Handle);
    /// Links. `Err` carries the driver's info log.
    fn link_program(&mut self, program: Handle) -> std::result::Result<(), String>;
    fn active_uniforms(&self, program: Handle) -> Vec<ActiveVariable>;
    fn active_attributes(&self, program: Handle) -> Vec<ActiveVariable>;
    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32>;
    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32>;
    fn use_program(&mut self, program: Option<Handle>);

    /// Uploads to the program in use. Integer and sampler types are
    /// converted from `values` by truncation.
    fn set_uniform(&mut self, location: i32, ty: GlslType, values: &[f32]);

    fn enable_attribute(
        &mut self,
        location: u32,
        buffer: Handle,
        layout: VertexLayout,
        stride: usize,
        offset: usize,
    );
    fn constant_attribute(&mut self, location: u32, values: &[f32]);
    fn disable_attribute(&mut self, location: u32);
    fn bind_texture_unit(&mut self, unit: u32, target: TextureTarget, texture: Option<Handle>);

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) -> Result<()>;
    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        indices: Handle,
        index_type: IndexType,
        count: usize,
    ) -> Result<()>;

    // ── render targets ──

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: Handle,
        format: RenderBufferFormat,
        shape: [usize; 2],
    ) -> Result<()>;
    fn bind_framebuffer(&mut self, framebuffer: Option<Handle>);
    fn framebuffer_attach(
        &mut self,
        framebuffer: Handle,
        point: AttachmentPoint,
        attachment: Attachment,
    ) -> Result<()>;

    // ── state ──

    /// `Unsupported` if the binding lacks the call.
    fn gl_call(&mut self, call: &GlCall) -> Result<()>;

    /// Reads RGBA8 pixels from the bound framebuffer, rows bottom to top.
    fn read_pixels(&mut self, x: i32, y: i32, width: usize, height: usize) -> Result<Vec<u8>>;
}
