//! In-memory [`GlBackend`] that emulates enough of GL to run the object
//! model without a driver.
//!
//! - buffers, textures and render buffers keep their bytes
//! - shaders are checked with `glint_glsl::validate` and fail like a driver
//! - linking reports every declared uniform/attribute as active
//! - draws are validated against bound buffers but not rasterized
//! - clears fill the bound color target, which `read_pixels` returns
//!
//! Every call is recorded in a log for inspection.

use std::collections::{HashMap, HashSet};

use glint_glsl::{validate, GlslType};

use super::backend::*;
use super::command::{ClearFlags, GlCall, VertexLayout};
use super::enums::*;
use super::parser::{ActiveVariable, Handle};
use crate::error::{GlooError, Result};

#[derive(Debug)]
struct TextureLevel {
    shape: Vec<usize>,
    format: TextureFormat,
    texel: TexelType,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessTexture {
    levels: HashMap<u32, TextureLevel>,
    interpolation: Option<(Interpolation, Interpolation)>,
    wrapping: Vec<Wrapping>,
}

#[derive(Debug)]
struct HeadlessShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct HeadlessProgram {
    attached: Vec<Handle>,
    linked: bool,
    uniforms: Vec<ActiveVariable>,
    attributes: Vec<ActiveVariable>,
    values: HashMap<i32, Vec<f32>>,
}

#[derive(Debug)]
struct HeadlessRenderbuffer {
    shape: [usize; 2],
    format: RenderBufferFormat,
    /// RGBA8 for color storage, empty otherwise.
    data: Vec<u8>,
}

#[derive(Debug, Copy, Clone)]
struct BoundAttribute {
    buffer: Handle,
    layout: VertexLayout,
    stride: usize,
    offset: usize,
}

/// GL emulation backed by plain memory.
#[derive(Debug)]
pub struct HeadlessBackend {
    capabilities: Capabilities,
    size: (usize, usize),
    next_handle: u32,

    buffers: HashMap<Handle, Vec<u8>>,
    textures: HashMap<Handle, HeadlessTexture>,
    shaders: HashMap<Handle, HeadlessShader>,
    programs: HashMap<Handle, HeadlessProgram>,
    renderbuffers: HashMap<Handle, Option<HeadlessRenderbuffer>>,
    framebuffers: HashMap<Handle, HashMap<AttachmentPoint, Attachment>>,

    current_program: Option<Handle>,
    bound_framebuffer: Option<Handle>,
    attributes: HashMap<u32, BoundAttribute>,
    texture_units: HashMap<u32, Handle>,
    enabled: HashSet<Capability>,
    clear_color: [f32; 4],

    /// Default framebuffer, RGBA8, rows bottom to top.
    surface: Vec<u8>,
    draws: usize,
    calls: Vec<String>,
}

impl HeadlessBackend {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_capabilities(width, height, Capabilities::default())
    }

    pub fn with_capabilities(width: usize, height: usize, capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            size: (width, height),
            next_handle: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            current_program: None,
            bound_framebuffer: None,
            attributes: HashMap::new(),
            texture_units: HashMap::new(),
            enabled: HashSet::new(),
            clear_color: [0.0; 4],
            surface: vec![0; width * height * 4],
            draws: 0,
            calls: Vec::new(),
        }
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Number of draws executed.
    pub fn draw_count(&self) -> usize {
        self.draws
    }

    /// Contents of a buffer.
    pub fn buffer_data(&self, buffer: Handle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Bytes and shape of a texture level.
    pub fn texture_level(&self, texture: Handle, level: u32) -> Option<(&[usize], &[u8])> {
        let l = self.textures.get(&texture)?.levels.get(&level)?;
        Some((&l.shape, &l.data))
    }

    pub fn texture_interpolation_of(&self, texture: Handle) -> Option<(Interpolation, Interpolation)> {
        self.textures.get(&texture)?.interpolation
    }

    pub fn texture_wrapping_of(&self, texture: Handle) -> Option<&[Wrapping]> {
        Some(&self.textures.get(&texture)?.wrapping)
    }

    /// Last value uploaded to `name` in `program`.
    pub fn uniform_value(&self, program: Handle, name: &str) -> Option<&[f32]> {
        let p = self.programs.get(&program)?;
        let loc = p.uniforms.iter().position(|u| u.name == name)? as i32;
        p.values.get(&loc).map(Vec::as_slice)
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    pub fn bound_framebuffer(&self) -> Option<Handle> {
        self.bound_framebuffer
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn allocate(&mut self) -> Result<Handle> {
        let handle = Handle::new(self.next_handle)
            .ok_or_else(|| GlooError::Backend("handle space exhausted".into()))?;
        self.next_handle += 1;
        Ok(handle)
    }

    fn buffer_mut(&mut self, buffer: Handle) -> Result<&mut Vec<u8>> {
        self.buffers
            .get_mut(&buffer)
            .ok_or_else(|| GlooError::Backend(format!("no buffer with handle {}", buffer.get())))
    }

    fn texture_mut(&mut self, texture: Handle) -> Result<&mut HeadlessTexture> {
        self.textures
            .get_mut(&texture)
            .ok_or_else(|| GlooError::Backend(format!("no texture with handle {}", texture.get())))
    }

    /// Checks that every enabled attribute can supply `vertices` vertices.
    fn check_attributes(&self, vertices: usize) -> Result<()> {
        if vertices == 0 {
            return Ok(());
        }
        for (location, attr) in &self.attributes {
            let len = self.buffers.get(&attr.buffer).map_or(0, Vec::len);
            let itemsize = attr.layout.itemsize();
            let stride = if attr.stride == 0 { itemsize } else { attr.stride };
            let needed = (vertices - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(attr.offset))
                .and_then(|n| n.checked_add(itemsize));
            if needed.is_none_or(|n| n > len) {
                return Err(GlooError::Backend(format!(
                    "attribute {location} reads past the end of a buffer of {len} bytes"
                )));
            }
        }
        Ok(())
    }

    fn check_program(&self) -> Result<()> {
        match self.current_program.and_then(|p| self.programs.get(&p)) {
            Some(p) if p.linked => Ok(()),
            Some(_) => Err(GlooError::Backend("draw with an unlinked program".into())),
            None => Err(GlooError::Backend("draw without a program".into())),
        }
    }

    /// Fills the bound color target with the clear color.
    fn clear_color_target(&mut self) {
        let rgba = self.clear_color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        let target = self
            .bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .and_then(|a| a.get(&AttachmentPoint::Color).copied());
        match target {
            None => {
                for px in self.surface.chunks_exact_mut(4) {
                    px.copy_from_slice(&rgba);
                }
            }
            Some(Attachment::Texture2D(tex)) => {
                // Only 8-bit color targets are rasterized.
                let level = self.textures.get_mut(&tex).and_then(|t| t.levels.get_mut(&0));
                if let Some(level) = level.filter(|l| l.texel == TexelType::U8) {
                    let channels = level.format.channels();
                    let texel = texel_from_rgba(rgba, level.format);
                    for px in level.data.chunks_exact_mut(channels) {
                        px.copy_from_slice(&texel[..channels]);
                    }
                }
            }
            Some(Attachment::RenderBuffer(rb)) => {
                if let Some(Some(rb)) = self.renderbuffers.get_mut(&rb) {
                    for px in rb.data.chunks_exact_mut(4) {
                        px.copy_from_slice(&rgba);
                    }
                }
            }
            Some(Attachment::None) => {}
        }
    }

    /// RGBA8 view of the bound color target: `(width, height, pixels)`.
    fn color_target(&self) -> Result<(usize, usize, Vec<u8>)> {
        let Some(fb) = self.bound_framebuffer else {
            return Ok((self.size.0, self.size.1, self.surface.clone()));
        };
        let attachment = self
            .framebuffers
            .get(&fb)
            .and_then(|a| a.get(&AttachmentPoint::Color).copied())
            .unwrap_or(Attachment::None);
        match attachment {
            Attachment::Texture2D(tex) => {
                let level = self
                    .textures
                    .get(&tex)
                    .and_then(|t| t.levels.get(&0))
                    .ok_or_else(|| GlooError::Backend("color texture has no storage".into()))?;
                if level.texel != TexelType::U8 {
                    return Err(GlooError::Backend(format!("cannot read {} color texels", level.texel)));
                }
                let channels = level.format.channels();
                let data = level
                    .data
                    .chunks_exact(channels)
                    .flat_map(|t| rgba_from_texel(t, level.format))
                    .collect();
                Ok((level.shape[1], level.shape[0], data))
            }
            Attachment::RenderBuffer(rb) => match self.renderbuffers.get(&rb) {
                Some(Some(rb)) if rb.format == RenderBufferFormat::Color => {
                    Ok((rb.shape[1], rb.shape[0], rb.data.clone()))
                }
                _ => Err(GlooError::Backend("color render buffer has no storage".into())),
            },
            Attachment::None => {
                Err(GlooError::Backend("framebuffer has no color attachment".into()))
            }
        }
    }
}

fn texel_from_rgba(rgba: [u8; 4], format: TextureFormat) -> [u8; 4] {
    match format {
        TextureFormat::Luminance => [rgba[0], 0, 0, 0],
        TextureFormat::Alpha => [rgba[3], 0, 0, 0],
        TextureFormat::LuminanceAlpha => [rgba[0], rgba[3], 0, 0],
        TextureFormat::Rgb | TextureFormat::Rgba => rgba,
    }
}

fn rgba_from_texel(texel: &[u8], format: TextureFormat) -> [u8; 4] {
    match format {
        TextureFormat::Luminance => [texel[0], texel[0], texel[0], 255],
        TextureFormat::Alpha => [0, 0, 0, texel[0]],
        TextureFormat::LuminanceAlpha => [texel[0], texel[0], texel[0], texel[1]],
        TextureFormat::Rgb => [texel[0], texel[1], texel[2], 255],
        TextureFormat::Rgba => [texel[0], texel[1], texel[2], texel[3]],
    }
}

/// Normalizes `[h, w, c]` / `[d, h, w, c]` and `[y, x]` / `[z, y, x]` to 3D.
fn as_3d(shape: &[usize], offset: &[usize]) -> ([usize; 4], [usize; 3]) {
    match (shape, offset) {
        ([h, w, c], [y, x]) => ([1, *h, *w, *c], [0, *y, *x]),
        ([d, h, w, c], [z, y, x]) => ([*d, *h, *w, *c], [*z, *y, *x]),
        ([h, w, c], _) => ([1, *h, *w, *c], [0; 3]),
        ([d, h, w, c], _) => ([*d, *h, *w, *c], [0; 3]),
        _ => ([0; 4], [0; 3]),
    }
}

impl GlBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn framebuffer_size(&self) -> (usize, usize) {
        self.size
    }

    fn create_buffer(&mut self) -> Result<Handle> {
        let h = self.allocate()?;
        self.buffers.insert(h, Vec::new());
        self.record(format!("create_buffer {}", h.get()));
        Ok(h)
    }

    fn create_texture(&mut self) -> Result<Handle> {
        let h = self.allocate()?;
        self.textures.insert(h, HeadlessTexture::default());
        self.record(format!("create_texture {}", h.get()));
        Ok(h)
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Handle> {
        let h = self.allocate()?;
        self.shaders.insert(h, HeadlessShader { stage, source: String::new(), compiled: false });
        self.record(format!("create_shader {stage:?} {}", h.get()));
        Ok(h)
    }

    fn create_program(&mut self) -> Result<Handle> {
        let h = self.allocate()?;
        self.programs.insert(h, HeadlessProgram::default());
        self.record(format!("create_program {}", h.get()));
        Ok(h)
    }

    fn create_renderbuffer(&mut self) -> Result<Handle> {
        let h = self.allocate()?;
        self.renderbuffers.insert(h, None);
        self.record(format!("create_renderbuffer {}", h.get()));
        Ok(h)
    }

    fn create_framebuffer(&mut self) -> Result<Handle> {
        let h = self.allocate()?;
        self.framebuffers.insert(h, HashMap::new());
        self.record(format!("create_framebuffer {}", h.get()));
        Ok(h)
    }

    fn delete_object(&mut self, kind: ObjectKind, handle: Handle) {
        match kind {
            ObjectKind::VertexBuffer | ObjectKind::IndexBuffer => {
                self.buffers.remove(&handle);
            }
            ObjectKind::Texture2D | ObjectKind::Texture3D => {
                self.textures.remove(&handle);
            }
            // Attached shaders stay usable until detached, as in GL.
            ObjectKind::VertexShader | ObjectKind::FragmentShader => {}
            ObjectKind::Program => {
                self.programs.remove(&handle);
                if self.current_program == Some(handle) {
                    self.current_program = None;
                }
            }
            ObjectKind::RenderBuffer => {
                self.renderbuffers.remove(&handle);
            }
            ObjectKind::FrameBuffer => {
                self.framebuffers.remove(&handle);
                if self.bound_framebuffer == Some(handle) {
                    self.bound_framebuffer = None;
                }
            }
        }
        self.record(format!("delete {kind} {}", handle.get()));
    }

    fn buffer_size(
        &mut self,
        _target: BufferTarget,
        buffer: Handle,
        nbytes: usize,
        usage: BufferUsage,
    ) -> Result<()> {
        let data = self.buffer_mut(buffer)?;
        *data = vec![0; nbytes];
        self.record(format!("buffer_size {} {nbytes} {usage}", buffer.get()));
        Ok(())
    }

    fn buffer_sub_data(
        &mut self,
        _target: BufferTarget,
        buffer: Handle,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        let storage = self.buffer_mut(buffer)?;
        let end = offset + data.len();
        if end > storage.len() {
            return Err(GlooError::Backend(format!(
                "buffer write [{offset}, {end}) beyond {} bytes",
                storage.len()
            )));
        }
        storage[offset..end].copy_from_slice(data);
        self.record(format!("buffer_sub_data {} {offset} {}", buffer.get(), data.len()));
        Ok(())
    }

    fn texture_image(
        &mut self,
        target: TextureTarget,
        texture: Handle,
        level: u32,
        shape: &[usize],
        format: TextureFormat,
        texel: TexelType,
    ) -> Result<()> {
        if target == TextureTarget::Texture3D && !self.capabilities.texture_3d {
            return Err(GlooError::Unsupported("3D textures".into()));
        }
        if texel.is_float() && !self.capabilities.float_textures {
            return Err(GlooError::Unsupported("float textures".into()));
        }
        let size = shape.iter().product::<usize>() * texel.size();
        self.texture_mut(texture)?.levels.insert(level, TextureLevel {
            shape: shape.to_vec(),
            format,
            texel,
            data: vec![0; size],
        });
        self.record(format!("texture_image {} {level} {shape:?} {format} {texel}", texture.get()));
        Ok(())
    }

    fn texture_sub_image(
        &mut self,
        _target: TextureTarget,
        texture: Handle,
        level: u32,
        offset: &[usize],
        shape: &[usize],
        _format: TextureFormat,
        texel: TexelType,
        data: &[u8],
    ) -> Result<()> {
        let storage = self
            .texture_mut(texture)?
            .levels
            .get_mut(&level)
            .ok_or_else(|| GlooError::Backend(format!("texture level {level} not allocated")))?;
        if texel != storage.texel {
            return Err(GlooError::Backend(format!(
                "{texel} texels uploaded to {} storage",
                storage.texel
            )));
        }
        let ([d, h, w, c], [oz, oy, ox]) = as_3d(shape, offset);
        let ([sd, sh, sw, _], _) = as_3d(&storage.shape, &[]);
        let fits = oz + d <= sd && oy + h <= sh && ox + w <= sw;
        if !fits || data.len() != d * h * w * c * texel.size() {
            return Err(GlooError::Backend(format!(
                "{} bytes of {shape:?} at {offset:?} do not fit level {level}",
                data.len()
            )));
        }
        let row = w * c * texel.size();
        for z in 0..d {
            for y in 0..h {
                let src = (z * h + y) * row;
                let dst = (((z + oz) * sh + (y + oy)) * sw + ox) * c * texel.size();
                storage.data[dst..dst + row].copy_from_slice(&data[src..src + row]);
            }
        }
        self.record(format!("texture_sub_image {} {level} {offset:?} {shape:?}", texture.get()));
        Ok(())
    }

    fn texture_interpolation(
        &mut self,
        _target: TextureTarget,
        texture: Handle,
        min: Interpolation,
        mag: Interpolation,
    ) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.interpolation = Some((min, mag));
        }
        self.record(format!("texture_interpolation {} {min} {mag}", texture.get()));
    }

    fn texture_wrapping(&mut self, _target: TextureTarget, texture: Handle, wrap: &[Wrapping]) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.wrapping = wrap.to_vec();
        }
        self.record(format!("texture_wrapping {} {wrap:?}", texture.get()));
    }

    fn compile_shader(&mut self, shader: Handle, source: &str) -> std::result::Result<(), String> {
        self.record(format!("compile_shader {}", shader.get()));
        let Some(s) = self.shaders.get_mut(&shader) else {
            return Err(format!("no shader with handle {}", shader.get()));
        };
        s.source = source.to_string();
        s.compiled = false;
        validate::check(source)?;
        s.compiled = true;
        Ok(())
    }

    fn attach_shader(&mut self, program: Handle, shader: Handle) {
        if let Some(p) = self.programs.get_mut(&program) {
            if !p.attached.contains(&shader) {
                p.attached.push(shader);
            }
        }
        self.record(format!("attach_shader {} {}", program.get(), shader.get()));
    }

    fn detach_shader(&mut self, program: Handle, shader: Handle) {
        if let Some(p) = self.programs.get_mut(&program) {
            p.attached.retain(|s| *s != shader);
        }
        self.record(format!("detach_shader {} {}", program.get(), shader.get()));
    }

    fn link_program(&mut self, program: Handle) -> std::result::Result<(), String> {
        self.record(format!("link_program {}", program.get()));
        let attached = self
            .programs
            .get(&program)
            .map(|p| p.attached.clone())
            .ok_or_else(|| format!("no program with handle {}", program.get()))?;

        let mut uniforms: Vec<ActiveVariable> = Vec::new();
        let mut attributes: Vec<ActiveVariable> = Vec::new();
        for handle in &attached {
            let shader = self
                .shaders
                .get(handle)
                .ok_or_else(|| format!("shader {} is gone", handle.get()))?;
            if !shader.compiled {
                return Err(format!("shader {} is not compiled", handle.get()));
            }
            let decls = glint_glsl::uniforms(&shader.source).map_err(|e| e.to_string())?;
            for d in decls {
                match uniforms.iter().find(|u| u.name == d.name) {
                    Some(u) if u.ty != d.ty => {
                        return Err(format!(
                            "uniform '{}' declared as both {} and {}",
                            d.name,
                            u.ty.name(),
                            d.ty.name()
                        ));
                    }
                    Some(_) => {}
                    None => uniforms.push(ActiveVariable { name: d.name, ty: d.ty }),
                }
            }
            if shader.stage == ShaderStage::Vertex {
                let decls = glint_glsl::attributes(&shader.source).map_err(|e| e.to_string())?;
                attributes.extend(decls.into_iter().map(|d| ActiveVariable { name: d.name, ty: d.ty }));
            }
        }

        if let Some(p) = self.programs.get_mut(&program) {
            p.linked = true;
            p.uniforms = uniforms;
            p.attributes = attributes;
            p.values.clear();
        }
        Ok(())
    }

    fn active_uniforms(&self, program: Handle) -> Vec<ActiveVariable> {
        self.programs.get(&program).map(|p| p.uniforms.clone()).unwrap_or_default()
    }

    fn active_attributes(&self, program: Handle) -> Vec<ActiveVariable> {
        self.programs.get(&program).map(|p| p.attributes.clone()).unwrap_or_default()
    }

    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32> {
        let p = self.programs.get(&program)?;
        p.uniforms.iter().position(|u| u.name == name).map(|i| i as i32)
    }

    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32> {
        let p = self.programs.get(&program)?;
        p.attributes.iter().position(|a| a.name == name).map(|i| i as u32)
    }

    fn use_program(&mut self, program: Option<Handle>) {
        self.current_program = program;
    }

    fn set_uniform(&mut self, location: i32, ty: GlslType, values: &[f32]) {
        let values = if ty.is_integer() {
            values.iter().map(|v| v.trunc()).collect()
        } else {
            values.to_vec()
        };
        if let Some(p) = self.current_program.and_then(|h| self.programs.get_mut(&h)) {
            p.values.insert(location, values);
        }
        self.record(format!("set_uniform {location} {}", ty.name()));
    }

    fn enable_attribute(
        &mut self,
        location: u32,
        buffer: Handle,
        layout: VertexLayout,
        stride: usize,
        offset: usize,
    ) {
        self.attributes.insert(location, BoundAttribute { buffer, layout, stride, offset });
        self.record(format!("enable_attribute {location} {}", buffer.get()));
    }

    fn constant_attribute(&mut self, location: u32, values: &[f32]) {
        self.attributes.remove(&location);
        self.record(format!("constant_attribute {location} {values:?}"));
    }

    fn disable_attribute(&mut self, location: u32) {
        self.attributes.remove(&location);
        self.record(format!("disable_attribute {location}"));
    }

    fn bind_texture_unit(&mut self, unit: u32, _target: TextureTarget, texture: Option<Handle>) {
        match texture {
            Some(t) => self.texture_units.insert(unit, t),
            None => self.texture_units.remove(&unit),
        };
        self.record(format!("bind_texture_unit {unit} {}", texture.map_or(0, Handle::get)));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) -> Result<()> {
        self.check_program()?;
        let end = first
            .checked_add(count)
            .ok_or_else(|| GlooError::Backend(format!("draw range {first}+{count} overflows")))?;
        self.check_attributes(end)?;
        self.draws += 1;
        self.record(format!("draw_arrays {mode} {first} {count}"));
        Ok(())
    }

    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        indices: Handle,
        index_type: IndexType,
        count: usize,
    ) -> Result<()> {
        self.check_program()?;
        let bytes = self
            .buffers
            .get(&indices)
            .ok_or_else(|| GlooError::Backend(format!("no index buffer {}", indices.get())))?;
        let size = index_type.size();
        let max = bytes
            .chunks_exact(size)
            .take(count)
            .map(|c| match index_type {
                IndexType::U8 => c[0] as usize,
                IndexType::U16 => u16::from_ne_bytes([c[0], c[1]]) as usize,
                IndexType::U32 => u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as usize,
            })
            .max();
        if let Some(max) = max {
            self.check_attributes(max + 1)?;
        }
        self.draws += 1;
        self.record(format!("draw_elements {mode} {count} {index_type}"));
        Ok(())
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: Handle,
        format: RenderBufferFormat,
        shape: [usize; 2],
    ) -> Result<()> {
        let slot = self.renderbuffers.get_mut(&renderbuffer).ok_or_else(|| {
            GlooError::Backend(format!("no render buffer {}", renderbuffer.get()))
        })?;
        let data = match format {
            RenderBufferFormat::Color => vec![0; shape[0] * shape[1] * 4],
            _ => Vec::new(),
        };
        *slot = Some(HeadlessRenderbuffer { shape, format, data });
        self.record(format!("renderbuffer_storage {} {format} {shape:?}", renderbuffer.get()));
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<Handle>) {
        self.bound_framebuffer = framebuffer;
        self.record(format!("bind_framebuffer {}", framebuffer.map_or(0, Handle::get)));
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: Handle,
        point: AttachmentPoint,
        attachment: Attachment,
    ) -> Result<()> {
        let fb = self.framebuffers.get_mut(&framebuffer).ok_or_else(|| {
            GlooError::Backend(format!("no framebuffer {}", framebuffer.get()))
        })?;
        match attachment {
            Attachment::None => fb.remove(&point),
            other => fb.insert(point, other),
        };
        self.record(format!("framebuffer_attach {} {point} {attachment:?}", framebuffer.get()));
        Ok(())
    }

    fn gl_call(&mut self, call: &GlCall) -> Result<()> {
        match call {
            GlCall::ClearColor(c) => self.clear_color = *c,
            GlCall::Clear(ClearFlags { color: true, .. }) => self.clear_color_target(),
            GlCall::Enable(cap) => {
                self.enabled.insert(*cap);
            }
            GlCall::Disable(cap) => {
                self.enabled.remove(cap);
            }
            _ => {}
        }
        self.record(format!("{} {call:?}", call.name()));
        Ok(())
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: usize, height: usize) -> Result<Vec<u8>> {
        let (tw, th, pixels) = self.color_target()?;
        if x < 0 || y < 0 || x as usize + width > tw || y as usize + height > th {
            return Err(GlooError::Backend(format!(
                "read of {width}x{height} at ({x}, {y}) outside a {tw}x{th} target"
            )));
        }
        let (x, y) = (x as usize, y as usize);
        let mut out = Vec::with_capacity(width * height * 4);
        for row in y..y + height {
            let start = (row * tw + x) * 4;
            out.extend_from_slice(&pixels[start..start + width * 4]);
        }
        self.record(format!("read_pixels {x} {y} {width} {height}"));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(b: &mut HeadlessBackend, stage: ShaderStage, src: &str) -> Handle {
        let h = b.create_shader(stage).unwrap();
        b.compile_shader(h, src).unwrap();
        h
    }

    #[test]
    fn buffers_keep_bytes() {
        let mut b = HeadlessBackend::new(1, 1);
        let h = b.create_buffer().unwrap();
        b.buffer_size(BufferTarget::Array, h, 4, BufferUsage::Static).unwrap();
        b.buffer_sub_data(BufferTarget::Array, h, 1, &[5, 6]).unwrap();
        assert_eq!(b.buffer_data(h), Some(&[0u8, 5, 6, 0][..]));
        assert!(b.buffer_sub_data(BufferTarget::Array, h, 3, &[1, 1]).is_err());
        assert_eq!(b.calls()[1], format!("buffer_size {} 4 static", h.get()));
    }

    #[test]
    fn texture_sub_image_writes_rows() {
        let mut b = HeadlessBackend::new(1, 1);
        let t = b.create_texture().unwrap();
        b.texture_image(TextureTarget::Texture2D, t, 0, &[2, 2, 1], TextureFormat::Luminance, TexelType::U8)
            .unwrap();
        b.texture_sub_image(
            TextureTarget::Texture2D,
            t,
            0,
            &[1, 0],
            &[1, 2, 1],
            TextureFormat::Luminance,
            TexelType::U8,
            &[7, 9],
        )
        .unwrap();
        assert_eq!(b.texture_level(t, 0).unwrap().1, &[0, 0, 7, 9]);
    }

    #[test]
    fn float_texels_need_the_capability() {
        let mut b = HeadlessBackend::new(1, 1);
        let t = b.create_texture().unwrap();
        let err = b
            .texture_image(TextureTarget::Texture2D, t, 0, &[1, 1, 1], TextureFormat::Luminance, TexelType::F32)
            .unwrap_err();
        assert!(matches!(err, GlooError::Unsupported(_)));

        let caps = Capabilities { float_textures: true, ..Capabilities::default() };
        let mut b = HeadlessBackend::with_capabilities(1, 1, caps);
        let t = b.create_texture().unwrap();
        b.texture_image(TextureTarget::Texture2D, t, 0, &[1, 2, 1], TextureFormat::Luminance, TexelType::F32)
            .unwrap();
        let texel = 0.5f32.to_ne_bytes();
        b.texture_sub_image(
            TextureTarget::Texture2D,
            t,
            0,
            &[0, 1],
            &[1, 1, 1],
            TextureFormat::Luminance,
            TexelType::F32,
            &texel,
        )
        .unwrap();
        let (shape, data) = b.texture_level(t, 0).unwrap();
        assert_eq!(shape, &[1, 2, 1]);
        assert_eq!(&data[4..8], &texel[..]);
    }

    #[test]
    fn invalid_shader_fails_like_a_driver() {
        let mut b = HeadlessBackend::new(1, 1);
        let h = b.create_shader(ShaderStage::Fragment).unwrap();
        let log = b.compile_shader(h, "void main() {\n  float x = 1.0\n}").unwrap_err();
        assert!(log.starts_with("0:3("));
    }

    #[test]
    fn link_reports_declared_variables() {
        let mut b = HeadlessBackend::new(1, 1);
        let vs = compiled(
            &mut b,
            ShaderStage::Vertex,
            "attribute vec3 a_pos;\nuniform mat4 u_mvp;\nvoid main() { gl_Position = u_mvp * vec4(a_pos, 1.0); }",
        );
        let fs = compiled(&mut b, ShaderStage::Fragment, "uniform mat4 u_mvp;\nvoid main() { }");
        let p = b.create_program().unwrap();
        b.attach_shader(p, vs);
        b.attach_shader(p, fs);
        b.link_program(p).unwrap();
        assert_eq!(b.uniform_location(p, "u_mvp"), Some(0));
        assert_eq!(b.attrib_location(p, "a_pos"), Some(0));
        assert_eq!(b.active_uniforms(p).len(), 1);
    }

    #[test]
    fn conflicting_uniform_types_fail_link() {
        let mut b = HeadlessBackend::new(1, 1);
        let vs = compiled(&mut b, ShaderStage::Vertex, "uniform float u_x;\nvoid main() { }");
        let fs = compiled(&mut b, ShaderStage::Fragment, "uniform vec2 u_x;\nvoid main() { }");
        let p = b.create_program().unwrap();
        b.attach_shader(p, vs);
        b.attach_shader(p, fs);
        let log = b.link_program(p).unwrap_err();
        assert!(log.contains("u_x"));
    }

    #[test]
    fn integer_uniforms_truncate() {
        let mut b = HeadlessBackend::new(1, 1);
        let vs = compiled(&mut b, ShaderStage::Vertex, "uniform int u_n;\nvoid main() { }");
        let p = b.create_program().unwrap();
        b.attach_shader(p, vs);
        b.link_program(p).unwrap();
        b.use_program(Some(p));
        b.set_uniform(0, GlslType::Int, &[2.7]);
        assert_eq!(b.uniform_value(p, "u_n"), Some(&[2.0][..]));
    }

    #[test]
    fn clear_and_read_surface() {
        let mut b = HeadlessBackend::new(2, 1);
        b.gl_call(&GlCall::ClearColor([1.0, 0.0, 0.0, 1.0])).unwrap();
        b.gl_call(&GlCall::Clear(ClearFlags::COLOR)).unwrap();
        b.gl_call(&GlCall::Enable(Capability::Blend)).unwrap();
        assert!(b.is_enabled(Capability::Blend));
        assert_eq!(b.read_pixels(1, 0, 1, 1).unwrap(), vec![255, 0, 0, 255]);
        assert!(b.read_pixels(0, 0, 3, 1).is_err());
    }

    #[test]
    fn renderbuffer_color_target() {
        let mut b = HeadlessBackend::new(1, 1);
        let rb = b.create_renderbuffer().unwrap();
        b.renderbuffer_storage(rb, RenderBufferFormat::Color, [1, 2]).unwrap();
        let fb = b.create_framebuffer().unwrap();
        b.framebuffer_attach(fb, AttachmentPoint::Color, Attachment::RenderBuffer(rb)).unwrap();
        b.bind_framebuffer(Some(fb));
        b.gl_call(&GlCall::ClearColor([0.0, 0.0, 1.0, 1.0])).unwrap();
        b.gl_call(&GlCall::Clear(ClearFlags::ALL)).unwrap();
        assert_eq!(b.read_pixels(0, 0, 2, 1).unwrap(), vec![0, 0, 255, 255, 0, 0, 255, 255]);
        b.delete_object(ObjectKind::FrameBuffer, fb);
        assert_eq!(b.bound_framebuffer(), None);
    }

    #[test]
    fn draw_without_program_fails() {
        let mut b = HeadlessBackend::new(1, 1);
        assert!(b.draw_arrays(PrimitiveMode::Points, 0, 1).is_err());
        assert_eq!(b.draw_count(), 0);
    }
}
