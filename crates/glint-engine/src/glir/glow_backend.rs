//! [`GlBackend`] over a real OpenGL / OpenGL ES 2.0 context via `glow`.
//!
//! The caller owns context creation and must keep the context current on
//! the calling thread while the backend is used.

use glint_glsl::GlslType;
use glow::HasContext;

use super::backend::*;
use super::command::{ClearFlags, GlCall, VertexLayout};
use super::enums::*;
use super::parser::{ActiveVariable, Handle};
use crate::error::{GlooError, Result};

pub struct GlowBackend {
    gl: glow::Context,
    capabilities: Capabilities,
    size: (usize, usize),
    bound_framebuffer: Option<Handle>,
    vao: Option<glow::NativeVertexArray>,
}

// ── handle conversion ─────────────────────────────────────────────────────

fn buffer(h: Handle) -> glow::NativeBuffer {
    glow::NativeBuffer(h.non_zero())
}

fn texture(h: Handle) -> glow::NativeTexture {
    glow::NativeTexture(h.non_zero())
}

fn shader(h: Handle) -> glow::NativeShader {
    glow::NativeShader(h.non_zero())
}

fn program(h: Handle) -> glow::NativeProgram {
    glow::NativeProgram(h.non_zero())
}

fn renderbuffer(h: Handle) -> glow::NativeRenderbuffer {
    glow::NativeRenderbuffer(h.non_zero())
}

fn framebuffer(h: Handle) -> glow::NativeFramebuffer {
    glow::NativeFramebuffer(h.non_zero())
}

fn backend_err(what: &str) -> impl FnOnce(String) -> GlooError + '_ {
    move |e| GlooError::Backend(format!("{what}: {e}"))
}

// ── enum conversion ───────────────────────────────────────────────────────

fn gl_buffer_target(t: BufferTarget) -> u32 {
    match t {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn gl_texture_target(t: TextureTarget) -> u32 {
    match t {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Texture3D => glow::TEXTURE_3D,
    }
}

fn gl_usage(u: BufferUsage) -> u32 {
    match u {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

fn gl_format(f: TextureFormat) -> u32 {
    match f {
        TextureFormat::Luminance => glow::LUMINANCE,
        TextureFormat::Alpha => glow::ALPHA,
        TextureFormat::LuminanceAlpha => glow::LUMINANCE_ALPHA,
        TextureFormat::Rgb => glow::RGB,
        TextureFormat::Rgba => glow::RGBA,
    }
}

fn gl_renderbuffer_format(f: RenderBufferFormat) -> u32 {
    match f {
        RenderBufferFormat::Color => glow::RGBA4,
        RenderBufferFormat::Depth => glow::DEPTH_COMPONENT16,
        RenderBufferFormat::Stencil => glow::STENCIL_INDEX8,
    }
}

fn gl_attachment(p: AttachmentPoint) -> u32 {
    match p {
        AttachmentPoint::Color => glow::COLOR_ATTACHMENT0,
        AttachmentPoint::Depth => glow::DEPTH_ATTACHMENT,
        AttachmentPoint::Stencil => glow::STENCIL_ATTACHMENT,
    }
}

fn gl_interpolation(i: Interpolation) -> i32 {
    match i {
        Interpolation::Nearest => glow::NEAREST as i32,
        Interpolation::Linear => glow::LINEAR as i32,
    }
}

fn gl_wrapping(w: Wrapping) -> i32 {
    match w {
        Wrapping::Repeat => glow::REPEAT as i32,
        Wrapping::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
        Wrapping::MirroredRepeat => glow::MIRRORED_REPEAT as i32,
    }
}

fn gl_mode(m: PrimitiveMode) -> u32 {
    match m {
        PrimitiveMode::Points => glow::POINTS,
        PrimitiveMode::Lines => glow::LINES,
        PrimitiveMode::LineStrip => glow::LINE_STRIP,
        PrimitiveMode::LineLoop => glow::LINE_LOOP,
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn gl_vertex_type(t: VertexType) -> u32 {
    match t {
        VertexType::I8 => glow::BYTE,
        VertexType::U8 => glow::UNSIGNED_BYTE,
        VertexType::I16 => glow::SHORT,
        VertexType::U16 => glow::UNSIGNED_SHORT,
        VertexType::F32 => glow::FLOAT,
    }
}

fn gl_index_type(t: IndexType) -> u32 {
    match t {
        IndexType::U8 => glow::UNSIGNED_BYTE,
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

fn gl_capability(c: Capability) -> u32 {
    match c {
        Capability::Blend => glow::BLEND,
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::CullFace => glow::CULL_FACE,
        Capability::ScissorTest => glow::SCISSOR_TEST,
        Capability::StencilTest => glow::STENCIL_TEST,
        Capability::PolygonOffsetFill => glow::POLYGON_OFFSET_FILL,
        Capability::Dither => glow::DITHER,
        Capability::SampleAlphaToCoverage => glow::SAMPLE_ALPHA_TO_COVERAGE,
        Capability::SampleCoverage => glow::SAMPLE_COVERAGE,
    }
}

fn gl_blend_factor(f: BlendFactor) -> u32 {
    match f {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendFactor::ConstantColor => glow::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => glow::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => glow::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => glow::ONE_MINUS_CONSTANT_ALPHA,
        BlendFactor::SrcAlphaSaturate => glow::SRC_ALPHA_SATURATE,
    }
}

fn gl_blend_equation(e: BlendEquation) -> u32 {
    match e {
        BlendEquation::Add => glow::FUNC_ADD,
        BlendEquation::Subtract => glow::FUNC_SUBTRACT,
        BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
    }
}

fn gl_compare(f: CompareFunc) -> u32 {
    match f {
        CompareFunc::Never => glow::NEVER,
        CompareFunc::Less => glow::LESS,
        CompareFunc::Equal => glow::EQUAL,
        CompareFunc::LessEqual => glow::LEQUAL,
        CompareFunc::Greater => glow::GREATER,
        CompareFunc::NotEqual => glow::NOTEQUAL,
        CompareFunc::GreaterEqual => glow::GEQUAL,
        CompareFunc::Always => glow::ALWAYS,
    }
}

/// Calls glow 0.13 has no entry point for.
fn unsupported(call: &GlCall) -> Option<GlooError> {
    match call {
        GlCall::Hint { target, mode } => Some(GlooError::Unsupported(format!("hint {target} {mode}"))),
        _ => None,
    }
}

fn gl_texel_type(t: TexelType) -> u32 {
    match t {
        TexelType::I8 => glow::BYTE,
        TexelType::U8 => glow::UNSIGNED_BYTE,
        TexelType::I16 => glow::SHORT,
        TexelType::U16 => glow::UNSIGNED_SHORT,
        TexelType::I32 => glow::INT,
        TexelType::U32 => glow::UNSIGNED_INT,
        TexelType::F32 => glow::FLOAT,
    }
}

fn gl_face(f: Face) -> u32 {
    match f {
        Face::Front => glow::FRONT,
        Face::Back => glow::BACK,
        Face::FrontAndBack => glow::FRONT_AND_BACK,
    }
}

fn gl_front_face(f: FrontFace) -> u32 {
    match f {
        FrontFace::Cw => glow::CW,
        FrontFace::Ccw => glow::CCW,
    }
}

fn glsl_type(gl_type: u32) -> Option<GlslType> {
    Some(match gl_type {
        glow::FLOAT => GlslType::Float,
        glow::FLOAT_VEC2 => GlslType::Vec2,
        glow::FLOAT_VEC3 => GlslType::Vec3,
        glow::FLOAT_VEC4 => GlslType::Vec4,
        glow::INT => GlslType::Int,
        glow::INT_VEC2 => GlslType::IVec2,
        glow::INT_VEC3 => GlslType::IVec3,
        glow::INT_VEC4 => GlslType::IVec4,
        glow::BOOL => GlslType::Bool,
        glow::BOOL_VEC2 => GlslType::BVec2,
        glow::BOOL_VEC3 => GlslType::BVec3,
        glow::BOOL_VEC4 => GlslType::BVec4,
        glow::FLOAT_MAT2 => GlslType::Mat2,
        glow::FLOAT_MAT3 => GlslType::Mat3,
        glow::FLOAT_MAT4 => GlslType::Mat4,
        glow::SAMPLER_2D => GlslType::Sampler2D,
        glow::SAMPLER_3D => GlslType::Sampler3D,
        glow::SAMPLER_CUBE => GlslType::SamplerCube,
        _ => return None,
    })
}

/// Expands an active variable reported as `name[0]` with `size > 1` into
/// one entry per element.
fn expand_active(name: String, size: i32, ty: GlslType, out: &mut Vec<ActiveVariable>) {
    match name.strip_suffix("[0]") {
        Some(base) if size > 1 => {
            out.extend((0..size).map(|i| ActiveVariable { name: format!("{base}[{i}]"), ty }));
        }
        _ => out.push(ActiveVariable { name, ty }),
    }
}

// ── GlowBackend ───────────────────────────────────────────────────────────

impl GlowBackend {
    /// Wraps a loaded context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread whenever the backend is
    /// used, and must outlive every handle the backend creates.
    pub unsafe fn new(gl: glow::Context, size: (usize, usize)) -> Self {
        let (capabilities, vao) = unsafe {
            let version = gl.version();
            log::info!(
                "OpenGL {}.{}{} ({})",
                version.major,
                version.minor,
                if version.is_embedded { " ES" } else { "" },
                version.vendor_info
            );
            let capabilities = Capabilities {
                texture_3d: !version.is_embedded || version.major >= 3,
                float_textures: !version.is_embedded
                    || version.major >= 3
                    || gl.supported_extensions().contains("GL_OES_texture_float"),
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE).max(0) as usize,
                max_texture_units: gl.get_parameter_i32(glow::MAX_TEXTURE_IMAGE_UNITS).max(0) as usize,
            };
            // Core profiles refuse to draw without a bound vertex array.
            let vao = if version.major >= 3 { gl.create_vertex_array().ok() } else { None };
            if vao.is_some() {
                gl.bind_vertex_array(vao);
            }
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            (capabilities, vao)
        };
        Self { gl, capabilities, size, bound_framebuffer: None, vao }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Updates the default framebuffer size after a surface resize.
    pub fn set_framebuffer_size(&mut self, width: usize, height: usize) {
        self.size = (width, height);
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        if let Some(vao) = self.vao.take() {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }
}

impl GlBackend for GlowBackend {
    fn name(&self) -> &str {
        "glow"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn framebuffer_size(&self) -> (usize, usize) {
        self.size
    }

    fn create_buffer(&mut self) -> Result<Handle> {
        let b = unsafe { self.gl.create_buffer() }.map_err(backend_err("create_buffer"))?;
        Ok(Handle::from_non_zero(b.0))
    }

    fn create_texture(&mut self) -> Result<Handle> {
        let t = unsafe { self.gl.create_texture() }.map_err(backend_err("create_texture"))?;
        Ok(Handle::from_non_zero(t.0))
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Handle> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let s = unsafe { self.gl.create_shader(ty) }.map_err(backend_err("create_shader"))?;
        Ok(Handle::from_non_zero(s.0))
    }

    fn create_program(&mut self) -> Result<Handle> {
        let p = unsafe { self.gl.create_program() }.map_err(backend_err("create_program"))?;
        Ok(Handle::from_non_zero(p.0))
    }

    fn create_renderbuffer(&mut self) -> Result<Handle> {
        let r = unsafe { self.gl.create_renderbuffer() }
            .map_err(backend_err("create_renderbuffer"))?;
        Ok(Handle::from_non_zero(r.0))
    }

    fn create_framebuffer(&mut self) -> Result<Handle> {
        let f = unsafe { self.gl.create_framebuffer() }
            .map_err(backend_err("create_framebuffer"))?;
        Ok(Handle::from_non_zero(f.0))
    }

    fn delete_object(&mut self, kind: ObjectKind, handle: Handle) {
        unsafe {
            match kind {
                ObjectKind::VertexBuffer | ObjectKind::IndexBuffer => {
                    self.gl.delete_buffer(buffer(handle))
                }
                ObjectKind::Texture2D | ObjectKind::Texture3D => {
                    self.gl.delete_texture(texture(handle))
                }
                ObjectKind::VertexShader | ObjectKind::FragmentShader => {
                    self.gl.delete_shader(shader(handle))
                }
                ObjectKind::Program => self.gl.delete_program(program(handle)),
                ObjectKind::RenderBuffer => self.gl.delete_renderbuffer(renderbuffer(handle)),
                ObjectKind::FrameBuffer => {
                    if self.bound_framebuffer == Some(handle) {
                        self.bound_framebuffer = None;
                    }
                    self.gl.delete_framebuffer(framebuffer(handle))
                }
            }
        }
    }

    fn buffer_size(
        &mut self,
        target: BufferTarget,
        buf: Handle,
        nbytes: usize,
        usage: BufferUsage,
    ) -> Result<()> {
        let target = gl_buffer_target(target);
        unsafe {
            self.gl.bind_buffer(target, Some(buffer(buf)));
            self.gl.buffer_data_size(target, nbytes as i32, gl_usage(usage));
        }
        Ok(())
    }

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        buf: Handle,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        let target = gl_buffer_target(target);
        unsafe {
            self.gl.bind_buffer(target, Some(buffer(buf)));
            self.gl.buffer_sub_data_u8_slice(target, offset as i32, data);
        }
        Ok(())
    }

    fn texture_image(
        &mut self,
        target: TextureTarget,
        tex: Handle,
        level: u32,
        shape: &[usize],
        format: TextureFormat,
        texel: TexelType,
    ) -> Result<()> {
        let gl_target = gl_texture_target(target);
        let fmt = gl_format(format);
        let ty = gl_texel_type(texel);
        unsafe {
            self.gl.bind_texture(gl_target, Some(texture(tex)));
            match (target, shape) {
                (TextureTarget::Texture2D, [h, w, _]) => self.gl.tex_image_2d(
                    gl_target,
                    level as i32,
                    fmt as i32,
                    *w as i32,
                    *h as i32,
                    0,
                    fmt,
                    ty,
                    None,
                ),
                (TextureTarget::Texture3D, [d, h, w, _]) => self.gl.tex_image_3d(
                    gl_target,
                    level as i32,
                    fmt as i32,
                    *w as i32,
                    *h as i32,
                    *d as i32,
                    0,
                    fmt,
                    ty,
                    None,
                ),
                _ => {
                    return Err(GlooError::Value(format!(
                        "shape {shape:?} does not match {target:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn texture_sub_image(
        &mut self,
        target: TextureTarget,
        tex: Handle,
        level: u32,
        offset: &[usize],
        shape: &[usize],
        format: TextureFormat,
        texel: TexelType,
        data: &[u8],
    ) -> Result<()> {
        let gl_target = gl_texture_target(target);
        let fmt = gl_format(format);
        let ty = gl_texel_type(texel);
        let pixels = glow::PixelUnpackData::Slice(data);
        unsafe {
            self.gl.bind_texture(gl_target, Some(texture(tex)));
            match (shape, offset) {
                ([h, w, _], [y, x]) => self.gl.tex_sub_image_2d(
                    gl_target,
                    level as i32,
                    *x as i32,
                    *y as i32,
                    *w as i32,
                    *h as i32,
                    fmt,
                    ty,
                    pixels,
                ),
                ([d, h, w, _], [z, y, x]) => self.gl.tex_sub_image_3d(
                    gl_target,
                    level as i32,
                    *x as i32,
                    *y as i32,
                    *z as i32,
                    *w as i32,
                    *h as i32,
                    *d as i32,
                    fmt,
                    ty,
                    pixels,
                ),
                _ => {
                    return Err(GlooError::Value(format!(
                        "shape {shape:?} / offset {offset:?} do not match {target:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn texture_interpolation(
        &mut self,
        target: TextureTarget,
        tex: Handle,
        min: Interpolation,
        mag: Interpolation,
    ) {
        let target = gl_texture_target(target);
        unsafe {
            self.gl.bind_texture(target, Some(texture(tex)));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, gl_interpolation(min));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, gl_interpolation(mag));
        }
    }

    fn texture_wrapping(&mut self, target: TextureTarget, tex: Handle, wrap: &[Wrapping]) {
        let gl_target = gl_texture_target(target);
        let params = [glow::TEXTURE_WRAP_S, glow::TEXTURE_WRAP_T, glow::TEXTURE_WRAP_R];
        unsafe {
            self.gl.bind_texture(gl_target, Some(texture(tex)));
            for (param, mode) in params.iter().zip(wrap) {
                self.gl.tex_parameter_i32(gl_target, *param, gl_wrapping(*mode));
            }
        }
    }

    fn compile_shader(&mut self, s: Handle, source: &str) -> std::result::Result<(), String> {
        unsafe {
            self.gl.shader_source(shader(s), source);
            self.gl.compile_shader(shader(s));
            if self.gl.get_shader_compile_status(shader(s)) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader(s)))
            }
        }
    }

    fn attach_shader(&mut self, p: Handle, s: Handle) {
        unsafe { self.gl.attach_shader(program(p), shader(s)) }
    }

    fn detach_shader(&mut self, p: Handle, s: Handle) {
        unsafe { self.gl.detach_shader(program(p), shader(s)) }
    }

    fn link_program(&mut self, p: Handle) -> std::result::Result<(), String> {
        unsafe {
            self.gl.link_program(program(p));
            if self.gl.get_program_link_status(program(p)) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program(p)))
            }
        }
    }

    fn active_uniforms(&self, p: Handle) -> Vec<ActiveVariable> {
        let mut out = Vec::new();
        unsafe {
            for i in 0..self.gl.get_active_uniforms(program(p)) {
                let Some(u) = self.gl.get_active_uniform(program(p), i) else { continue };
                match glsl_type(u.utype) {
                    Some(ty) => expand_active(u.name, u.size, ty, &mut out),
                    None => log::warn!("uniform {} has unsupported GL type {:#x}", u.name, u.utype),
                }
            }
        }
        out
    }

    fn active_attributes(&self, p: Handle) -> Vec<ActiveVariable> {
        let mut out = Vec::new();
        unsafe {
            for i in 0..self.gl.get_active_attributes(program(p)) {
                let Some(a) = self.gl.get_active_attribute(program(p), i) else { continue };
                match glsl_type(a.atype) {
                    Some(ty) => expand_active(a.name, a.size, ty, &mut out),
                    None => {
                        log::warn!("attribute {} has unsupported GL type {:#x}", a.name, a.atype)
                    }
                }
            }
        }
        out
    }

    fn uniform_location(&self, p: Handle, name: &str) -> Option<i32> {
        unsafe { self.gl.get_uniform_location(program(p), name) }.map(|l| l.0 as i32)
    }

    fn attrib_location(&self, p: Handle, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program(p), name) }
    }

    fn use_program(&mut self, p: Option<Handle>) {
        unsafe { self.gl.use_program(p.map(program)) }
    }

    fn set_uniform(&mut self, location: i32, ty: GlslType, values: &[f32]) {
        let loc = glow::NativeUniformLocation(location as u32);
        let loc = Some(&loc);
        let ints: Vec<i32> = values.iter().map(|v| *v as i32).collect();
        unsafe {
            match ty {
                GlslType::Float => self.gl.uniform_1_f32_slice(loc, values),
                GlslType::Vec2 => self.gl.uniform_2_f32_slice(loc, values),
                GlslType::Vec3 => self.gl.uniform_3_f32_slice(loc, values),
                GlslType::Vec4 => self.gl.uniform_4_f32_slice(loc, values),
                GlslType::Int
                | GlslType::Bool
                | GlslType::Sampler2D
                | GlslType::Sampler3D
                | GlslType::SamplerCube => self.gl.uniform_1_i32_slice(loc, &ints),
                GlslType::IVec2 | GlslType::BVec2 => self.gl.uniform_2_i32_slice(loc, &ints),
                GlslType::IVec3 | GlslType::BVec3 => self.gl.uniform_3_i32_slice(loc, &ints),
                GlslType::IVec4 | GlslType::BVec4 => self.gl.uniform_4_i32_slice(loc, &ints),
                GlslType::Mat2 => self.gl.uniform_matrix_2_f32_slice(loc, false, values),
                GlslType::Mat3 => self.gl.uniform_matrix_3_f32_slice(loc, false, values),
                GlslType::Mat4 => self.gl.uniform_matrix_4_f32_slice(loc, false, values),
            }
        }
    }

    fn enable_attribute(
        &mut self,
        location: u32,
        buf: Handle,
        layout: VertexLayout,
        stride: usize,
        offset: usize,
    ) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer(buf)));
            self.gl.enable_vertex_attrib_array(location);
            self.gl.vertex_attrib_pointer_f32(
                location,
                layout.components as i32,
                gl_vertex_type(layout.ty),
                false,
                stride as i32,
                offset as i32,
            );
        }
    }

    fn constant_attribute(&mut self, location: u32, values: &[f32]) {
        let mut v = [0.0, 0.0, 0.0, 1.0];
        for (dst, src) in v.iter_mut().zip(values) {
            *dst = *src;
        }
        unsafe {
            self.gl.disable_vertex_attrib_array(location);
            self.gl.vertex_attrib_4_f32(location, v[0], v[1], v[2], v[3]);
        }
    }

    fn disable_attribute(&mut self, location: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(location) }
    }

    fn bind_texture_unit(&mut self, unit: u32, target: TextureTarget, tex: Option<Handle>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(gl_texture_target(target), tex.map(texture));
        }
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) -> Result<()> {
        unsafe { self.gl.draw_arrays(gl_mode(mode), first as i32, count as i32) };
        Ok(())
    }

    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        indices: Handle,
        index_type: IndexType,
        count: usize,
    ) -> Result<()> {
        unsafe {
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer(indices)));
            self.gl.draw_elements(gl_mode(mode), count as i32, gl_index_type(index_type), 0);
        }
        Ok(())
    }

    fn renderbuffer_storage(
        &mut self,
        rb: Handle,
        format: RenderBufferFormat,
        shape: [usize; 2],
    ) -> Result<()> {
        unsafe {
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer(rb)));
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                gl_renderbuffer_format(format),
                shape[1] as i32,
                shape[0] as i32,
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, fb: Option<Handle>) {
        self.bound_framebuffer = fb;
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, fb.map(framebuffer)) }
    }

    fn framebuffer_attach(
        &mut self,
        fb: Handle,
        point: AttachmentPoint,
        attachment: Attachment,
    ) -> Result<()> {
        let gl_point = gl_attachment(point);
        let status = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer(fb)));
            match attachment {
                Attachment::Texture2D(t) => self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    gl_point,
                    glow::TEXTURE_2D,
                    Some(texture(t)),
                    0,
                ),
                Attachment::RenderBuffer(r) => self.gl.framebuffer_renderbuffer(
                    glow::FRAMEBUFFER,
                    gl_point,
                    glow::RENDERBUFFER,
                    Some(renderbuffer(r)),
                ),
                Attachment::None => {
                    self.gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, gl_point, glow::RENDERBUFFER, None)
                }
            }
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, self.bound_framebuffer.map(framebuffer));
            status
        };
        // Incomplete is normal while attachments are still being added.
        if status != glow::FRAMEBUFFER_COMPLETE {
            log::debug!("framebuffer {} incomplete after {point} attach: {status:#x}", fb.get());
        }
        Ok(())
    }

    fn gl_call(&mut self, call: &GlCall) -> Result<()> {
        if let Some(err) = unsupported(call) {
            return Err(err);
        }
        let gl = &self.gl;
        unsafe {
            match *call {
                GlCall::Viewport { x, y, width, height } => gl.viewport(x, y, width, height),
                GlCall::Scissor { x, y, width, height } => gl.scissor(x, y, width, height),
                GlCall::Clear(ClearFlags { color, depth, stencil }) => {
                    let mut mask = 0;
                    if color {
                        mask |= glow::COLOR_BUFFER_BIT;
                    }
                    if depth {
                        mask |= glow::DEPTH_BUFFER_BIT;
                    }
                    if stencil {
                        mask |= glow::STENCIL_BUFFER_BIT;
                    }
                    gl.clear(mask)
                }
                GlCall::ClearColor([r, g, b, a]) => gl.clear_color(r, g, b, a),
                GlCall::ClearDepth(d) => gl.clear_depth_f32(d),
                GlCall::ClearStencil(s) => gl.clear_stencil(s),
                GlCall::Enable(c) => gl.enable(gl_capability(c)),
                GlCall::Disable(c) => gl.disable(gl_capability(c)),
                GlCall::BlendFunc { src_rgb, dst_rgb, src_alpha, dst_alpha } => gl.blend_func_separate(
                    gl_blend_factor(src_rgb),
                    gl_blend_factor(dst_rgb),
                    gl_blend_factor(src_alpha),
                    gl_blend_factor(dst_alpha),
                ),
                GlCall::BlendEquation(e) => gl.blend_equation(gl_blend_equation(e)),
                GlCall::DepthFunc(f) => gl.depth_func(gl_compare(f)),
                GlCall::DepthMask(m) => gl.depth_mask(m),
                GlCall::ColorMask([r, g, b, a]) => gl.color_mask(r, g, b, a),
                GlCall::CullFace(f) => gl.cull_face(gl_face(f)),
                GlCall::FrontFace(f) => gl.front_face(gl_front_face(f)),
                GlCall::LineWidth(w) => gl.line_width(w),
                GlCall::PolygonOffset { factor, units } => gl.polygon_offset(factor, units),
                GlCall::Hint { .. } => {}
                GlCall::Finish => gl.finish(),
                GlCall::Flush => gl.flush(),
            }
        }
        Ok(())
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: usize, height: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; width * height * 4];
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(&mut out),
            );
        }
        Ok(out)
    }
}
