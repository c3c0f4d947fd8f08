//! GLIR commands: the closed instruction set flowing from wrappers to
//! interpreters.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use glint_glsl::GlslType;

use super::enums::*;

// ── ObjectId ──────────────────────────────────────────────────────────────

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a GL object.
///
/// Id `0` is reserved on the wire for commands that target no object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(NonZeroU64);

impl ObjectId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 allocations to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── payloads ──────────────────────────────────────────────────────────────

/// Element layout of a vertex buffer: scalar type and 1–4 components.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    pub ty: VertexType,
    pub components: u8,
}

impl VertexLayout {
    pub fn new(ty: VertexType, components: u8) -> Self {
        Self { ty, components }
    }

    /// Bytes per element.
    pub fn itemsize(self) -> usize {
        self.ty.size() * self.components as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeArgs {
    Buffer { nbytes: usize, usage: BufferUsage },
    /// `shape` is `[h, w, c]` for 2D textures and `[d, h, w, c]` for 3D.
    Texture { level: u32, shape: Vec<usize>, format: TextureFormat, texel: TexelType },
    /// `shape` is `[h, w]`.
    RenderBuffer { shape: [usize; 2], format: RenderBufferFormat },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataArgs {
    Buffer { offset: usize, data: Bytes },
    /// `offset` is `[y, x]` or `[z, y, x]`; `shape` is the shape of `data`
    /// in the same layout as the level shape.
    Texture { level: u32, offset: Vec<usize>, shape: Vec<usize>, texel: TexelType, data: Bytes },
    Shader { source: String },
}

/// Where an attribute reads its values from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSource {
    Buffer { vbo: ObjectId, layout: VertexLayout, stride: usize, offset: usize },
    /// A constant generic vertex attribute.
    Constant(Vec<f32>),
}

/// Vertex selection of a DRAW.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    Arrays { first: usize, count: usize },
    Elements { ibuf: ObjectId, index_type: IndexType, count: usize },
}

/// Which buffers a clear call resets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearFlags {
    pub const COLOR: Self = Self { color: true, depth: false, stencil: false };
    pub const ALL: Self = Self { color: true, depth: true, stencil: true };
    pub const COLOR_DEPTH: Self = Self { color: true, depth: true, stencil: false };
}

impl Default for ClearFlags {
    fn default() -> Self {
        Self::COLOR_DEPTH
    }
}

/// State calls without a target object, carried by FUNC.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    Scissor { x: i32, y: i32, width: i32, height: i32 },
    Clear(ClearFlags),
    ClearColor([f32; 4]),
    ClearDepth(f32),
    ClearStencil(i32),
    Enable(Capability),
    Disable(Capability),
    BlendFunc {
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    BlendEquation(BlendEquation),
    DepthFunc(CompareFunc),
    DepthMask(bool),
    ColorMask([bool; 4]),
    CullFace(Face),
    FrontFace(FrontFace),
    LineWidth(f32),
    PolygonOffset { factor: f32, units: f32 },
    Hint { target: HintTarget, mode: HintMode },
    Finish,
    Flush,
}

impl GlCall {
    /// Wire name of the call.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Viewport { .. } => "viewport",
            Self::Scissor { .. } => "scissor",
            Self::Clear(_) => "clear",
            Self::ClearColor(_) => "clear_color",
            Self::ClearDepth(_) => "clear_depth",
            Self::ClearStencil(_) => "clear_stencil",
            Self::Enable(_) => "enable",
            Self::Disable(_) => "disable",
            Self::BlendFunc { .. } => "blend_func",
            Self::BlendEquation(_) => "blend_equation",
            Self::DepthFunc(_) => "depth_func",
            Self::DepthMask(_) => "depth_mask",
            Self::ColorMask(_) => "color_mask",
            Self::CullFace(_) => "cull_face",
            Self::FrontFace(_) => "front_face",
            Self::LineWidth(_) => "line_width",
            Self::PolygonOffset { .. } => "polygon_offset",
            Self::Hint { .. } => "hint",
            Self::Finish => "finish",
            Self::Flush => "flush",
        }
    }
}

// ── Command ───────────────────────────────────────────────────────────────

/// Opcode of a [`Command`], without its payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Current,
    Swap,
    Create,
    Delete,
    Size,
    Data,
    Attribute,
    Uniform,
    Texture,
    Interpolation,
    Wrapping,
    Shaders,
    Link,
    Draw,
    Attach,
    Framebuffer,
    Func,
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Self::Current,
        Self::Swap,
        Self::Create,
        Self::Delete,
        Self::Size,
        Self::Data,
        Self::Attribute,
        Self::Uniform,
        Self::Texture,
        Self::Interpolation,
        Self::Wrapping,
        Self::Shaders,
        Self::Link,
        Self::Draw,
        Self::Attach,
        Self::Framebuffer,
        Self::Func,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Swap => "SWAP",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Size => "SIZE",
            Self::Data => "DATA",
            Self::Attribute => "ATTRIBUTE",
            Self::Uniform => "UNIFORM",
            Self::Texture => "TEXTURE",
            Self::Interpolation => "INTERPOLATION",
            Self::Wrapping => "WRAPPING",
            Self::Shaders => "SHADERS",
            Self::Link => "LINK",
            Self::Draw => "DRAW",
            Self::Attach => "ATTACH",
            Self::Framebuffer => "FRAMEBUFFER",
            Self::Func => "FUNC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, fully resolved GLIR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Current,
    Swap,
    Create { id: ObjectId, kind: ObjectKind },
    Delete { id: ObjectId },
    Size { id: ObjectId, args: SizeArgs },
    Data { id: ObjectId, args: DataArgs },
    Attribute { id: ObjectId, name: String, ty: GlslType, source: AttributeSource },
    Uniform { id: ObjectId, name: String, ty: GlslType, values: Vec<f32> },
    /// Binds a texture to a sampler; units are assigned at DRAW.
    Texture { id: ObjectId, name: String, texture: ObjectId },
    Interpolation { id: ObjectId, min: Interpolation, mag: Interpolation },
    Wrapping { id: ObjectId, wrap: Vec<Wrapping> },
    Shaders { id: ObjectId, shaders: Vec<ObjectId> },
    Link { id: ObjectId },
    Draw { id: ObjectId, mode: PrimitiveMode, selection: Selection },
    Attach { id: ObjectId, point: AttachmentPoint, target: Option<ObjectId> },
    Framebuffer { id: ObjectId, bind: bool },
    Func(GlCall),
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Current => Opcode::Current,
            Self::Swap => Opcode::Swap,
            Self::Create { .. } => Opcode::Create,
            Self::Delete { .. } => Opcode::Delete,
            Self::Size { .. } => Opcode::Size,
            Self::Data { .. } => Opcode::Data,
            Self::Attribute { .. } => Opcode::Attribute,
            Self::Uniform { .. } => Opcode::Uniform,
            Self::Texture { .. } => Opcode::Texture,
            Self::Interpolation { .. } => Opcode::Interpolation,
            Self::Wrapping { .. } => Opcode::Wrapping,
            Self::Shaders { .. } => Opcode::Shaders,
            Self::Link { .. } => Opcode::Link,
            Self::Draw { .. } => Opcode::Draw,
            Self::Attach { .. } => Opcode::Attach,
            Self::Framebuffer { .. } => Opcode::Framebuffer,
            Self::Func(_) => Opcode::Func,
        }
    }

    /// Object the command targets, `None` for CURRENT, SWAP and FUNC.
    pub fn target(&self) -> Option<ObjectId> {
        match self {
            Self::Current | Self::Swap | Self::Func(_) => None,
            Self::Create { id, .. }
            | Self::Delete { id }
            | Self::Size { id, .. }
            | Self::Data { id, .. }
            | Self::Attribute { id, .. }
            | Self::Uniform { id, .. }
            | Self::Texture { id, .. }
            | Self::Interpolation { id, .. }
            | Self::Wrapping { id, .. }
            | Self::Shaders { id, .. }
            | Self::Link { id }
            | Self::Draw { id, .. }
            | Self::Attach { id, .. }
            | Self::Framebuffer { id, .. } => Some(*id),
        }
    }

    /// Target id as it appears on the wire (`0` for none).
    pub fn raw_target(&self) -> u64 {
        self.target().map_or(0, ObjectId::get)
    }

    /// Other objects the command reads from, besides its target.
    pub fn references(&self) -> Vec<ObjectId> {
        match self {
            Self::Attribute { source: AttributeSource::Buffer { vbo, .. }, .. } => vec![*vbo],
            Self::Texture { texture, .. } => vec![*texture],
            Self::Shaders { shaders, .. } => shaders.clone(),
            Self::Draw { selection: Selection::Elements { ibuf, .. }, .. } => vec![*ibuf],
            Self::Attach { target: Some(t), .. } => vec![*t],
            _ => Vec::new(),
        }
    }

    /// One-line human readable rendering; byte payloads are summarised.
    pub fn describe(&self) -> String {
        let op = self.opcode();
        let id = self.raw_target();
        let args = match self {
            Self::Current | Self::Swap | Self::Delete { .. } | Self::Link { .. } => String::new(),
            Self::Create { kind, .. } => kind.to_string(),
            Self::Size { args, .. } => match args {
                SizeArgs::Buffer { nbytes, usage } => format!("{nbytes} {usage}"),
                SizeArgs::Texture { level, shape, format, texel } => {
                    format!("level={level} {shape:?} {format} {texel}")
                }
                SizeArgs::RenderBuffer { shape, format } => format!("{shape:?} {format}"),
            },
            Self::Data { args, .. } => match args {
                DataArgs::Buffer { offset, data } => format!("{offset} bytes[{}]", data.len()),
                DataArgs::Texture { level, offset, shape, texel, data } => {
                    format!("level={level} {offset:?} {shape:?} {texel} bytes[{}]", data.len())
                }
                DataArgs::Shader { source } => format!("source[{}]", source.len()),
            },
            Self::Attribute { name, ty, source, .. } => match source {
                AttributeSource::Buffer { vbo, layout, stride, offset } => format!(
                    "{name} {} vbo={vbo} {}x{} stride={stride} offset={offset}",
                    ty.name(),
                    layout.ty,
                    layout.components
                ),
                AttributeSource::Constant(v) => format!("{name} {} {v:?}", ty.name()),
            },
            Self::Uniform { name, ty, values, .. } => format!("{name} {} {values:?}", ty.name()),
            Self::Texture { name, texture, .. } => format!("{name} {texture}"),
            Self::Interpolation { min, mag, .. } => format!("{min} {mag}"),
            Self::Wrapping { wrap, .. } => {
                wrap.iter().map(|w| w.name()).collect::<Vec<_>>().join(" ")
            }
            Self::Shaders { shaders, .. } => {
                shaders.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" ")
            }
            Self::Draw { mode, selection, .. } => match selection {
                Selection::Arrays { first, count } => format!("{mode} [{first}, {count}]"),
                Selection::Elements { ibuf, index_type, count } => {
                    format!("{mode} [{ibuf}, {index_type}, {count}]")
                }
            },
            Self::Attach { point, target, .. } => {
                format!("{point} {}", target.map_or(0, ObjectId::get))
            }
            Self::Framebuffer { bind, .. } => bind.to_string(),
            Self::Func(call) => format!("{} {call:?}", call.name()),
        };
        if args.is_empty() { format!("{op} {id}") } else { format!("{op} {id} {args}") }
    }
}
