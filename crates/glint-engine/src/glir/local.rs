use std::collections::HashMap;

use glint_glsl::{format_diagnostics, parse_compiler_log, GlslType};

use super::backend::{Attachment, BufferTarget, GlBackend, ShaderStage, TextureTarget};
use super::command::*;
use super::enums::*;
use super::parser::{ActiveVariable, GlirParser, Handle, Pixels, Realization};
use crate::error::{GlooError, Result};

// ── table entries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct LevelStorage {
    shape: Vec<usize>,
    format: TextureFormat,
    texel: TexelType,
}

#[derive(Debug, Default)]
struct ProgramState {
    /// Attached shaders with their stage, as last set by SHADERS.
    shaders: Vec<(ObjectId, Handle, ShaderStage)>,
    linked: bool,
    uniforms: Vec<ActiveVariable>,
    attributes: Vec<ActiveVariable>,
    uniform_locations: HashMap<String, Option<i32>>,
    /// Attribute bindings by name, in first-set order.
    bindings: Vec<(String, AttributeSource)>,
    /// Sampler → texture, in first-set order. Units follow this order.
    samplers: Vec<(String, ObjectId)>,
}

#[derive(Debug)]
enum ObjectState {
    Buffer { nbytes: usize },
    Texture { levels: HashMap<u32, LevelStorage> },
    Shader { stage: ShaderStage, compiled: bool },
    Program(Box<ProgramState>),
    RenderBuffer { shape: Option<[usize; 2]> },
    FrameBuffer { attachments: HashMap<AttachmentPoint, ObjectId> },
}

#[derive(Debug)]
struct GlirObject {
    kind: ObjectKind,
    handle: Handle,
    state: ObjectState,
}

fn buffer_target(kind: ObjectKind) -> BufferTarget {
    match kind {
        ObjectKind::IndexBuffer => BufferTarget::ElementArray,
        _ => BufferTarget::Array,
    }
}

fn texture_target(kind: ObjectKind) -> TextureTarget {
    match kind {
        ObjectKind::Texture3D => TextureTarget::Texture3D,
        _ => TextureTarget::Texture2D,
    }
}

fn texture_ndim(kind: ObjectKind) -> usize {
    match kind {
        ObjectKind::Texture3D => 3,
        _ => 2,
    }
}

/// Looks up a program entry. Borrows only the table.
/// `offset + len <= size`, false on overflow.
fn span_fits(offset: usize, len: usize, size: usize) -> bool {
    offset.checked_add(len).is_some_and(|end| end <= size)
}

fn volume(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, d| n.checked_mul(*d))
}

fn program_entry(
    table: &mut HashMap<ObjectId, GlirObject>,
    opcode: Opcode,
    id: ObjectId,
) -> Result<(Handle, &mut ProgramState)> {
    let obj = table.get_mut(&id).ok_or(GlooError::UnknownObject { opcode, id })?;
    let (kind, handle) = (obj.kind, obj.handle);
    match &mut obj.state {
        ObjectState::Program(state) => Ok((handle, state)),
        _ => Err(GlooError::Type(format!("{opcode} cannot target {kind} {id}"))),
    }
}

// ── LocalParser ───────────────────────────────────────────────────────────

/// Executes commands against a [`GlBackend`], owning the object table.
pub struct LocalParser<B: GlBackend> {
    backend: B,
    table: HashMap<ObjectId, GlirObject>,
    /// Ids deleted during the current or the previous batch, with the
    /// batch that deleted them. Later commands for them are skipped.
    deleted: HashMap<ObjectId, u64>,
    batch: u64,
    framebuffer_stack: Vec<ObjectId>,
    viewport: Option<[i32; 4]>,
}

impl<B: GlBackend> LocalParser<B> {
    pub fn new(backend: B) -> Self {
        log::debug!("local GLIR interpreter on backend '{}'", backend.name());
        Self {
            backend,
            table: HashMap::new(),
            deleted: HashMap::new(),
            batch: 0,
            framebuffer_stack: Vec::new(),
            viewport: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// True while `id` has a table entry.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.table.contains_key(&id)
    }

    pub fn is_deleted(&self, id: ObjectId) -> bool {
        self.deleted.contains_key(&id)
    }

    /// Number of live table entries.
    pub fn object_count(&self) -> usize {
        self.table.len()
    }

    /// Allocated byte size of a buffer, if `id` is a realized buffer.
    pub fn buffer_size(&self, id: ObjectId) -> Option<usize> {
        match self.table.get(&id)?.state {
            ObjectState::Buffer { nbytes } => Some(nbytes),
            _ => None,
        }
    }

    /// Framebuffers currently bound, innermost last.
    pub fn framebuffer_stack(&self) -> &[ObjectId] {
        &self.framebuffer_stack
    }

    /// Executes one command.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        if let Some(id) = command.target() {
            let skip = self.deleted.contains_key(&id)
                && !matches!(command, Command::Create { .. } | Command::Delete { .. });
            if skip {
                log::debug!("skipping {} for deleted object {id}", command.opcode());
                return Ok(());
            }
        }

        match command {
            Command::Current => {
                log::debug!("CURRENT");
                Ok(())
            }
            Command::Swap => {
                log::debug!("SWAP");
                Ok(())
            }
            Command::Create { id, kind } => self.create(id, kind),
            Command::Delete { id } => {
                self.delete(id);
                Ok(())
            }
            Command::Size { id, args } => self.size(id, args),
            Command::Data { id, args } => self.data(id, args),
            Command::Attribute { id, name, ty, source } => self.attribute(id, name, ty, source),
            Command::Uniform { id, name, ty, values } => self.uniform(id, &name, ty, &values),
            Command::Texture { id, name, texture } => self.texture(id, name, texture),
            Command::Interpolation { id, min, mag } => {
                let (kind, handle) = self.texture_handle(Opcode::Interpolation, id)?;
                self.backend.texture_interpolation(texture_target(kind), handle, min, mag);
                Ok(())
            }
            Command::Wrapping { id, wrap } => {
                let (kind, handle) = self.texture_handle(Opcode::Wrapping, id)?;
                if wrap.len() != texture_ndim(kind) {
                    return Err(GlooError::Value(format!(
                        "texture {id} needs {} wrapping modes, got {}",
                        texture_ndim(kind),
                        wrap.len()
                    )));
                }
                self.backend.texture_wrapping(texture_target(kind), handle, &wrap);
                Ok(())
            }
            Command::Shaders { id, shaders } => self.shaders(id, &shaders),
            Command::Link { id } => self.link(id),
            Command::Draw { id, mode, selection } => self.draw(id, mode, selection),
            Command::Attach { id, point, target } => self.attach(id, point, target),
            Command::Framebuffer { id, bind } => self.framebuffer(id, bind),
            Command::Func(call) => {
                if let GlCall::Viewport { x, y, width, height } = call {
                    self.viewport = Some([x, y, width, height]);
                }
                log::debug!("FUNC {}", call.name());
                self.backend.gl_call(&call)
            }
        }
    }

    // ── lookup helpers ──

    fn get(&self, opcode: Opcode, id: ObjectId) -> Result<&GlirObject> {
        self.table.get(&id).ok_or(GlooError::UnknownObject { opcode, id })
    }

    fn get_mut(&mut self, opcode: Opcode, id: ObjectId) -> Result<&mut GlirObject> {
        self.table.get_mut(&id).ok_or(GlooError::UnknownObject { opcode, id })
    }

    fn wrong_kind(opcode: Opcode, id: ObjectId, kind: ObjectKind) -> GlooError {
        GlooError::Type(format!("{opcode} cannot target {kind} {id}"))
    }

    fn texture_handle(&self, opcode: Opcode, id: ObjectId) -> Result<(ObjectKind, Handle)> {
        let obj = self.get(opcode, id)?;
        if !obj.kind.is_texture() {
            return Err(Self::wrong_kind(opcode, id, obj.kind));
        }
        Ok((obj.kind, obj.handle))
    }

    // ── CREATE / DELETE ──

    fn create(&mut self, id: ObjectId, kind: ObjectKind) -> Result<()> {
        if self.table.contains_key(&id) {
            log::warn!("object {id} created twice; ignoring");
            return Ok(());
        }
        let (handle, state) = match kind {
            ObjectKind::VertexBuffer | ObjectKind::IndexBuffer => {
                (self.backend.create_buffer()?, ObjectState::Buffer { nbytes: 0 })
            }
            ObjectKind::Texture2D | ObjectKind::Texture3D => {
                if kind == ObjectKind::Texture3D && !self.backend.capabilities().texture_3d {
                    return Err(GlooError::Unsupported(format!(
                        "3D textures are not available on backend '{}'",
                        self.backend.name()
                    )));
                }
                (self.backend.create_texture()?, ObjectState::Texture { levels: HashMap::new() })
            }
            ObjectKind::VertexShader | ObjectKind::FragmentShader => {
                let stage = if kind == ObjectKind::VertexShader {
                    ShaderStage::Vertex
                } else {
                    ShaderStage::Fragment
                };
                let handle = self.backend.create_shader(stage)?;
                (handle, ObjectState::Shader { stage, compiled: false })
            }
            ObjectKind::Program => {
                (self.backend.create_program()?, ObjectState::Program(Box::default()))
            }
            ObjectKind::RenderBuffer => {
                (self.backend.create_renderbuffer()?, ObjectState::RenderBuffer { shape: None })
            }
            ObjectKind::FrameBuffer => (
                self.backend.create_framebuffer()?,
                ObjectState::FrameBuffer { attachments: HashMap::new() },
            ),
        };
        log::debug!("CREATE {kind} {id} -> handle {}", handle.get());
        self.deleted.remove(&id);
        self.table.insert(id, GlirObject { kind, handle, state });
        Ok(())
    }

    fn delete(&mut self, id: ObjectId) {
        self.deleted.insert(id, self.batch);
        let Some(obj) = self.table.remove(&id) else {
            log::debug!("DELETE {id}: not realized, nothing to free");
            return;
        };
        if obj.kind == ObjectKind::FrameBuffer && self.framebuffer_stack.contains(&id) {
            self.framebuffer_stack.retain(|fb| *fb != id);
            let top = self.framebuffer_stack.last().and_then(|fb| self.table.get(fb));
            self.backend.bind_framebuffer(top.map(|o| o.handle));
        }
        log::debug!("DELETE {} {id}", obj.kind);
        self.backend.delete_object(obj.kind, obj.handle);
    }

    // ── SIZE / DATA ──

    fn size(&mut self, id: ObjectId, args: SizeArgs) -> Result<()> {
        let caps = self.backend.capabilities();
        let obj = self.table.get_mut(&id).ok_or(GlooError::UnknownObject { opcode: Opcode::Size, id })?;
        match (&mut obj.state, args) {
            (ObjectState::Buffer { nbytes }, SizeArgs::Buffer { nbytes: n, usage }) => {
                self.backend.buffer_size(buffer_target(obj.kind), obj.handle, n, usage)?;
                *nbytes = n;
                Ok(())
            }
            (ObjectState::Texture { levels }, SizeArgs::Texture { level, shape, format, texel }) => {
                let ndim = texture_ndim(obj.kind);
                if shape.len() != ndim + 1 {
                    return Err(GlooError::Value(format!(
                        "texture {id} shape {shape:?} must have {} dimensions",
                        ndim + 1
                    )));
                }
                if shape[ndim] != format.channels() {
                    return Err(GlooError::Value(format!(
                        "texture {id}: format {format} does not match {} channels",
                        shape[ndim]
                    )));
                }
                if shape[..ndim].iter().any(|d| *d > caps.max_texture_size) {
                    return Err(GlooError::Unsupported(format!(
                        "texture {id} shape {shape:?} exceeds the maximum size {}",
                        caps.max_texture_size
                    )));
                }
                if texel.is_float() && !caps.float_textures {
                    return Err(GlooError::Unsupported(format!(
                        "texture {id}: {texel} texels need float texture support"
                    )));
                }
                self.backend.texture_image(texture_target(obj.kind), obj.handle, level, &shape, format, texel)?;
                levels.insert(level, LevelStorage { shape, format, texel });
                Ok(())
            }
            (ObjectState::RenderBuffer { shape: stored }, SizeArgs::RenderBuffer { shape, format }) => {
                self.backend.renderbuffer_storage(obj.handle, format, shape)?;
                *stored = Some(shape);
                Ok(())
            }
            _ => Err(Self::wrong_kind(Opcode::Size, id, obj.kind)),
        }
    }

    fn data(&mut self, id: ObjectId, args: DataArgs) -> Result<()> {
        let caps = self.backend.capabilities();
        let obj = self.table.get_mut(&id).ok_or(GlooError::UnknownObject { opcode: Opcode::Data, id })?;
        let (kind, handle) = (obj.kind, obj.handle);
        match (&mut obj.state, args) {
            (ObjectState::Buffer { nbytes }, DataArgs::Buffer { offset, data }) => {
                let target = buffer_target(kind);
                if *nbytes == 0 && offset == 0 {
                    // DATA without a prior SIZE allocates to fit.
                    self.backend.buffer_size(target, handle, data.len(), BufferUsage::Dynamic)?;
                    *nbytes = data.len();
                }
                if !span_fits(offset, data.len(), *nbytes) {
                    return Err(GlooError::Value(format!(
                        "write of {} bytes at offset {offset} exceeds buffer {id} of {} bytes",
                        data.len(),
                        nbytes
                    )));
                }
                log::debug!("DATA {kind} {id}: {} bytes at {offset}", data.len());
                self.backend.buffer_sub_data(target, handle, offset, &data)
            }
            (ObjectState::Texture { levels }, DataArgs::Texture { level, offset, shape, texel, data }) => {
                let ndim = texture_ndim(kind);
                if shape.len() != ndim + 1 || offset.len() != ndim {
                    return Err(GlooError::Value(format!(
                        "texture {id}: data shape {shape:?} / offset {offset:?} do not match a {ndim}D texture"
                    )));
                }
                let target = texture_target(kind);
                if !levels.contains_key(&level) {
                    // Unallocated level: allocate from the data itself.
                    if offset.iter().any(|o| *o != 0) {
                        return Err(GlooError::Value(format!(
                            "texture {id} level {level} is not allocated; cannot write at {offset:?}"
                        )));
                    }
                    let format = TextureFormat::from_channels(shape[ndim]).ok_or_else(|| {
                        GlooError::Value(format!("texture {id}: {} channels", shape[ndim]))
                    })?;
                    if texel.is_float() && !caps.float_textures {
                        return Err(GlooError::Unsupported(format!(
                            "texture {id}: {texel} texels need float texture support"
                        )));
                    }
                    self.backend.texture_image(target, handle, level, &shape, format, texel)?;
                    levels.insert(level, LevelStorage { shape: shape.clone(), format, texel });
                }
                let storage = &levels[&level];
                if texel != storage.texel {
                    return Err(GlooError::Value(format!(
                        "texture {id}: {texel} data for level {level} of {} texels",
                        storage.texel
                    )));
                }
                let fits = shape[ndim] == storage.shape[ndim]
                    && (0..ndim).all(|d| span_fits(offset[d], shape[d], storage.shape[d]));
                if !fits {
                    return Err(GlooError::Value(format!(
                        "texture {id}: data {shape:?} at {offset:?} does not fit level {level} of shape {:?}",
                        storage.shape
                    )));
                }
                let expected = volume(&shape).and_then(|n| n.checked_mul(texel.size()));
                if expected != Some(data.len()) {
                    return Err(GlooError::Value(format!(
                        "texture {id}: {} bytes given for shape {shape:?}",
                        data.len()
                    )));
                }
                let format = storage.format;
                log::debug!("DATA {kind} {id}: level {level} {shape:?} at {offset:?}");
                self.backend.texture_sub_image(target, handle, level, &offset, &shape, format, texel, &data)
            }
            (ObjectState::Shader { compiled, .. }, DataArgs::Shader { source }) => {
                *compiled = false;
                match self.backend.compile_shader(handle, &source) {
                    Ok(()) => {
                        *compiled = true;
                        log::debug!("compiled {kind} {id}");
                        Ok(())
                    }
                    Err(log) => {
                        let diagnostics = parse_compiler_log(&log);
                        let report = format_diagnostics(&source, &diagnostics, 2);
                        Err(GlooError::ShaderCompile { id, diagnostics, report })
                    }
                }
            }
            _ => Err(Self::wrong_kind(Opcode::Data, id, kind)),
        }
    }

    // ── programs ──

    fn shaders(&mut self, id: ObjectId, shaders: &[ObjectId]) -> Result<()> {
        let mut resolved = Vec::with_capacity(shaders.len());
        for sid in shaders {
            let obj = self.get(Opcode::Shaders, *sid)?;
            match obj.state {
                ObjectState::Shader { stage, .. } => resolved.push((*sid, obj.handle, stage)),
                _ => return Err(Self::wrong_kind(Opcode::Shaders, *sid, obj.kind)),
            }
        }
        let (handle, state) = program_entry(&mut self.table, Opcode::Shaders, id)?;
        let old = std::mem::replace(&mut state.shaders, resolved.clone());
        state.linked = false;
        for (_, shader, _) in old {
            self.backend.detach_shader(handle, shader);
        }
        for (_, shader, _) in resolved {
            self.backend.attach_shader(handle, shader);
        }
        Ok(())
    }

    fn link(&mut self, id: ObjectId) -> Result<()> {
        let (handle, state) = program_entry(&mut self.table, Opcode::Link, id)?;
        let attached = state.shaders.clone();
        let has = |stage| attached.iter().any(|(_, _, s)| *s == stage);
        if !has(ShaderStage::Vertex) || !has(ShaderStage::Fragment) {
            return Err(GlooError::ProgramLink {
                id,
                log: "a program needs at least one vertex and one fragment shader".into(),
            });
        }
        let uncompiled = attached.iter().find(|(sid, _, _)| {
            matches!(
                self.table.get(sid).map(|o| &o.state),
                Some(ObjectState::Shader { compiled: false, .. })
            )
        });
        if let Some((sid, _, _)) = uncompiled {
            return Err(GlooError::ProgramLink { id, log: format!("shader {sid} is not compiled") });
        }

        self.backend
            .link_program(handle)
            .map_err(|log| GlooError::ProgramLink { id, log })?;

        let uniforms = self.backend.active_uniforms(handle);
        let attributes = self.backend.active_attributes(handle);
        let (_, state) = program_entry(&mut self.table, Opcode::Link, id)?;
        state.linked = true;
        state.uniforms = uniforms;
        state.attributes = attributes;
        state.uniform_locations.clear();
        log::debug!(
            "linked program {id}: {} uniform(s), {} attribute(s)",
            state.uniforms.len(),
            state.attributes.len()
        );
        Ok(())
    }

    fn uniform(&mut self, id: ObjectId, name: &str, ty: GlslType, values: &[f32]) -> Result<()> {
        if ty.is_sampler() {
            return Err(GlooError::Type(format!("sampler {name} must be set with TEXTURE")));
        }
        if values.len() != ty.components() {
            return Err(GlooError::Value(format!(
                "uniform {name} of type {} needs {} values, got {}",
                ty.name(),
                ty.components(),
                values.len()
            )));
        }
        let (handle, state) = program_entry(&mut self.table, Opcode::Uniform, id)?;
        if !state.linked {
            log::debug!("program {id} is not linked; dropping uniform {name}");
            return Ok(());
        }
        let location = match state.uniform_locations.get(name) {
            Some(loc) => *loc,
            None => {
                let loc = self.backend.uniform_location(handle, name);
                state.uniform_locations.insert(name.to_string(), loc);
                loc
            }
        };
        let Some(location) = location else {
            log::debug!("uniform {name} is not active in program {id}");
            return Ok(());
        };
        self.backend.use_program(Some(handle));
        self.backend.set_uniform(location, ty, values);
        Ok(())
    }

    fn attribute(
        &mut self,
        id: ObjectId,
        name: String,
        ty: GlslType,
        source: AttributeSource,
    ) -> Result<()> {
        if let AttributeSource::Buffer { vbo, .. } = &source {
            let obj = self.get(Opcode::Attribute, *vbo)?;
            if obj.kind != ObjectKind::VertexBuffer {
                return Err(Self::wrong_kind(Opcode::Attribute, *vbo, obj.kind));
            }
        }
        if let AttributeSource::Constant(values) = &source {
            if values.is_empty() || values.len() > 4 {
                return Err(GlooError::Value(format!(
                    "constant attribute {name} ({}) needs 1 to 4 values",
                    ty.name()
                )));
            }
        }
        let (_, state) = program_entry(&mut self.table, Opcode::Attribute, id)?;
        match state.bindings.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = source,
            None => state.bindings.push((name, source)),
        }
        Ok(())
    }

    fn texture(&mut self, id: ObjectId, name: String, texture: ObjectId) -> Result<()> {
        self.texture_handle(Opcode::Texture, texture)?;
        let (_, state) = program_entry(&mut self.table, Opcode::Texture, id)?;
        match state.samplers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = texture,
            None => state.samplers.push((name, texture)),
        }
        Ok(())
    }

    fn draw(&mut self, id: ObjectId, mode: PrimitiveMode, selection: Selection) -> Result<()> {
        let max_units = self.backend.capabilities().max_texture_units;

        // Resolve everything up front so the backend is only touched once
        // the draw is known to be valid.
        let obj = self.get(Opcode::Draw, id)?;
        let ObjectState::Program(state) = &obj.state else {
            return Err(Self::wrong_kind(Opcode::Draw, id, obj.kind));
        };
        let program = obj.handle;
        if !state.linked {
            return Err(GlooError::Resource(format!("program {id} is not linked")));
        }

        let mut attributes = Vec::new();
        for (name, source) in &state.bindings {
            let Some(location) = self.backend.attrib_location(program, name) else {
                log::debug!("attribute {name} is not active in program {id}");
                continue;
            };
            match source {
                AttributeSource::Buffer { vbo, layout, stride, offset } => {
                    match self.table.get(vbo) {
                        Some(buf) => {
                            attributes.push((location, Some((buf.handle, *layout, *stride, *offset)), None))
                        }
                        None => log::debug!("attribute {name}: buffer {vbo} was deleted"),
                    }
                }
                AttributeSource::Constant(values) => {
                    attributes.push((location, None, Some(values.clone())))
                }
            }
        }

        let mut textures = Vec::new();
        for (name, tex) in &state.samplers {
            let Some(tobj) = self.table.get(tex) else {
                log::debug!("sampler {name}: texture {tex} was deleted");
                continue;
            };
            let Some(location) = self.backend.uniform_location(program, name) else {
                log::debug!("sampler {name} is not active in program {id}");
                continue;
            };
            textures.push((location, texture_target(tobj.kind), tobj.handle));
        }
        if textures.len() > max_units {
            return Err(GlooError::Unsupported(format!(
                "program {id} binds {} textures; backend allows {max_units}",
                textures.len()
            )));
        }

        let indices = match selection {
            Selection::Arrays { .. } => None,
            Selection::Elements { ibuf, index_type, count } => {
                let iobj = self.get(Opcode::Draw, ibuf)?;
                let ObjectState::Buffer { nbytes } = iobj.state else {
                    return Err(Self::wrong_kind(Opcode::Draw, ibuf, iobj.kind));
                };
                if iobj.kind != ObjectKind::IndexBuffer {
                    return Err(Self::wrong_kind(Opcode::Draw, ibuf, iobj.kind));
                }
                if count.checked_mul(index_type.size()).is_none_or(|n| n > nbytes) {
                    return Err(GlooError::Value(format!(
                        "draw of {count} {index_type} indices exceeds index buffer {ibuf} ({nbytes} bytes)"
                    )));
                }
                Some(iobj.handle)
            }
        };

        self.backend.use_program(Some(program));
        for (location, buffer, constant) in &attributes {
            match (buffer, constant) {
                (Some((handle, layout, stride, offset)), _) => {
                    self.backend.enable_attribute(*location, *handle, *layout, *stride, *offset)
                }
                (None, Some(values)) => self.backend.constant_attribute(*location, values),
                (None, None) => {}
            }
        }
        for (unit, (location, target, handle)) in textures.iter().enumerate() {
            self.backend.bind_texture_unit(unit as u32, *target, Some(*handle));
            self.backend.set_uniform(*location, GlslType::Int, &[unit as f32]);
        }

        let result = match (selection, indices) {
            (Selection::Arrays { first, count }, _) => {
                log::debug!("DRAW program {id}: {mode} arrays [{first}, {count}]");
                self.backend.draw_arrays(mode, first, count)
            }
            (Selection::Elements { index_type, count, .. }, Some(ibuf)) => {
                log::debug!("DRAW program {id}: {mode} {count} {index_type} elements");
                self.backend.draw_elements(mode, ibuf, index_type, count)
            }
            (Selection::Elements { .. }, None) => Ok(()),
        };

        for (location, buffer, _) in &attributes {
            if buffer.is_some() {
                self.backend.disable_attribute(*location);
            }
        }
        for (unit, (_, target, _)) in textures.iter().enumerate() {
            self.backend.bind_texture_unit(unit as u32, *target, None);
        }
        result
    }

    // ── framebuffers ──

    fn attach(&mut self, id: ObjectId, point: AttachmentPoint, target: Option<ObjectId>) -> Result<()> {
        let attachment = match target {
            None => Attachment::None,
            Some(tid) => {
                let obj = self.get(Opcode::Attach, tid)?;
                match obj.kind {
                    ObjectKind::Texture2D => Attachment::Texture2D(obj.handle),
                    ObjectKind::RenderBuffer => Attachment::RenderBuffer(obj.handle),
                    other => return Err(Self::wrong_kind(Opcode::Attach, tid, other)),
                }
            }
        };
        let obj = self.get_mut(Opcode::Attach, id)?;
        let (kind, handle) = (obj.kind, obj.handle);
        let ObjectState::FrameBuffer { attachments } = &mut obj.state else {
            return Err(Self::wrong_kind(Opcode::Attach, id, kind));
        };
        match target {
            Some(tid) => attachments.insert(point, tid),
            None => attachments.remove(&point),
        };
        log::debug!("ATTACH {point} of framebuffer {id}: {attachment:?}");
        self.backend.framebuffer_attach(handle, point, attachment)
    }

    fn framebuffer(&mut self, id: ObjectId, bind: bool) -> Result<()> {
        let obj = self.get(Opcode::Framebuffer, id)?;
        if obj.kind != ObjectKind::FrameBuffer {
            return Err(Self::wrong_kind(Opcode::Framebuffer, id, obj.kind));
        }
        let handle = obj.handle;
        if bind {
            self.framebuffer_stack.push(id);
            self.backend.bind_framebuffer(Some(handle));
        } else {
            match self.framebuffer_stack.iter().rposition(|fb| *fb == id) {
                Some(pos) => {
                    if pos + 1 != self.framebuffer_stack.len() {
                        log::warn!("framebuffer {id} unbound out of order");
                    }
                    self.framebuffer_stack.remove(pos);
                }
                None => log::warn!("framebuffer {id} unbound but was not bound"),
            }
            let top = self.framebuffer_stack.last().and_then(|fb| self.table.get(fb));
            self.backend.bind_framebuffer(top.map(|o| o.handle));
        }
        Ok(())
    }
}

impl<B: GlBackend> GlirParser for LocalParser<B> {
    fn is_remote(&self) -> bool {
        false
    }

    fn parse(&mut self, commands: Vec<Command>) -> Result<()> {
        // Ids are never reused, so a deletion only matters to commands
        // queued alongside it.
        self.batch += 1;
        let batch = self.batch;
        self.deleted.retain(|_, deleted_in| *deleted_in + 1 >= batch);
        for command in commands {
            self.execute(command)?;
        }
        Ok(())
    }

    fn realization(&self, id: ObjectId) -> Realization {
        self.table
            .get(&id)
            .map_or(Realization::Unrealized, |o| Realization::Realized(o.handle))
    }

    fn read_pixels(&mut self, region: Option<[i32; 4]>) -> Result<Pixels> {
        let [x, y, w, h] = match region.or(self.viewport) {
            Some(r) => r,
            None => {
                let (w, h) = self.backend.framebuffer_size();
                [0, 0, w as i32, h as i32]
            }
        };
        if w <= 0 || h <= 0 {
            return Err(GlooError::Value(format!("cannot read a {w}x{h} region")));
        }
        let (width, height) = (w as usize, h as usize);
        let raw = self.backend.read_pixels(x, y, width, height)?;
        // GL rows run bottom to top.
        let row = width * 4;
        let data = raw.chunks_exact(row).rev().flatten().copied().collect();
        Ok(Pixels { width, height, data })
    }

    fn active_uniforms(&self, program: ObjectId) -> Result<Vec<ActiveVariable>> {
        match &self.get(Opcode::Link, program)?.state {
            ObjectState::Program(state) => Ok(state.uniforms.clone()),
            _ => Err(GlooError::Type(format!("object {program} is not a program"))),
        }
    }

    fn active_attributes(&self, program: ObjectId) -> Result<Vec<ActiveVariable>> {
        match &self.get(Opcode::Link, program)?.state {
            ObjectState::Program(state) => Ok(state.attributes.clone()),
            _ => Err(GlooError::Type(format!("object {program} is not a program"))),
        }
    }
}
