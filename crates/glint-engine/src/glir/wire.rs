//! JSON wire form of GLIR commands.
//!
//! Each command becomes an array `[OPCODE, id, args...]` holding only
//! primitives. Byte payloads are pulled out into a side list and replaced by
//! `{"buffer_index": i}`. The side list travels either out of band
//! ([`ArraySerialization::Binary`]) or inline as base64 entries in the
//! envelope ([`ArraySerialization::Base64`]):
//!
//! ```json
//! {"msg_type": "glir_commands",
//!  "commands": [["CREATE", 1, "VertexBuffer"], ["DATA", 1, 0, {"buffer_index": 0}]],
//!  "buffers": [{"storage_type": "base64", "buffer": "AAAA"}]}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use glint_glsl::GlslType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::command::*;
use super::enums::*;
use crate::error::{GlooError, Result};

pub const MSG_TYPE: &str = "glir_commands";
const BASE64: &str = "base64";

/// How byte payloads are shipped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ArraySerialization {
    /// Raw buffers next to the JSON header.
    #[default]
    Binary,
    /// Base64 strings inside the JSON header.
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base64Buffer {
    pub storage_type: String,
    pub buffer: String,
}

/// The JSON part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub msg_type: String,
    pub commands: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Base64Buffer>,
}

/// One flush worth of commands in wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct GlirMessage {
    pub header: Envelope,
    /// Out-of-band buffers; empty in base64 mode.
    pub binary_buffers: Vec<Bytes>,
}

impl GlirMessage {
    pub fn command_count(&self) -> usize {
        self.header.commands.len()
    }

    /// Moves binary buffers into the header as base64 entries.
    pub fn into_base64(mut self) -> Self {
        let encoded = self.binary_buffers.drain(..).map(|b| base64_entry(&b));
        self.header.buffers.extend(encoded);
        self
    }

    /// Serializes the header. Binary buffers are not included; call
    /// [`into_base64`](Self::into_base64) first to embed them.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.header).map_err(|e| GlooError::Wire(e.to_string()))
    }

    /// Parses a header produced by [`to_json`](Self::to_json).
    pub fn from_json(text: &str) -> Result<Self> {
        let header: Envelope =
            serde_json::from_str(text).map_err(|e| GlooError::Wire(e.to_string()))?;
        Ok(Self { header, binary_buffers: Vec::new() })
    }

    /// Side buffers in index order, whichever way they were shipped.
    pub fn buffers(&self) -> Result<Vec<Bytes>> {
        if !self.binary_buffers.is_empty() {
            return Ok(self.binary_buffers.clone());
        }
        self.header
            .buffers
            .iter()
            .enumerate()
            .map(|(i, b)| {
                if b.storage_type != BASE64 {
                    return Err(GlooError::Wire(format!(
                        "buffer {i} has storage type '{}'",
                        b.storage_type
                    )));
                }
                STANDARD
                    .decode(&b.buffer)
                    .map(Bytes::from)
                    .map_err(|e| GlooError::Wire(format!("buffer {i}: {e}")))
            })
            .collect()
    }
}

fn base64_entry(data: &[u8]) -> Base64Buffer {
    Base64Buffer { storage_type: BASE64.to_string(), buffer: STANDARD.encode(data) }
}

// ── encoding ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Extractor {
    buffers: Vec<Bytes>,
}

impl Extractor {
    fn extract(&mut self, data: &Bytes) -> Value {
        self.buffers.push(data.clone());
        json!({ "buffer_index": self.buffers.len() - 1 })
    }
}

/// Encodes `commands`, returning the JSON arrays and the extracted buffers.
pub fn encode_commands(commands: &[Command]) -> (Vec<Value>, Vec<Bytes>) {
    let mut extractor = Extractor::default();
    let values = commands.iter().map(|c| encode(c, &mut extractor)).collect();
    (values, extractor.buffers)
}

/// Builds a full message for `commands`.
pub fn encode_message(commands: &[Command], mode: ArraySerialization) -> GlirMessage {
    let (commands, buffers) = encode_commands(commands);
    let message = GlirMessage {
        header: Envelope { msg_type: MSG_TYPE.to_string(), commands, buffers: Vec::new() },
        binary_buffers: buffers,
    };
    match mode {
        ArraySerialization::Binary => message,
        ArraySerialization::Base64 => message.into_base64(),
    }
}

fn encode(cmd: &Command, ex: &mut Extractor) -> Value {
    let mut out = vec![json!(cmd.opcode().as_str()), json!(cmd.raw_target())];
    match cmd {
        Command::Current | Command::Swap | Command::Delete { .. } | Command::Link { .. } => {}
        Command::Create { kind, .. } => out.push(json!(kind.name())),
        Command::Size { args, .. } => match args {
            SizeArgs::Buffer { nbytes, usage } => {
                out.extend([json!(nbytes), json!(usage.name())]);
            }
            SizeArgs::Texture { level, shape, format, texel } => {
                out.extend([json!(level), json!(shape), json!(format.name()), json!(texel.name())]);
            }
            SizeArgs::RenderBuffer { shape, format } => {
                out.extend([json!(shape), json!(format.name())]);
            }
        },
        Command::Data { args, .. } => match args {
            DataArgs::Buffer { offset, data } => {
                out.extend([json!(offset), ex.extract(data)]);
            }
            DataArgs::Texture { level, offset, shape, texel, data } => {
                out.extend([
                    json!(level),
                    json!(offset),
                    json!(shape),
                    json!(texel.name()),
                    ex.extract(data),
                ]);
            }
            DataArgs::Shader { source } => out.push(json!(source)),
        },
        Command::Attribute { name, ty, source, .. } => {
            out.extend([json!(name), json!(ty.name())]);
            match source {
                AttributeSource::Buffer { vbo, layout, stride, offset } => out.extend([
                    json!(vbo.get()),
                    json!(layout.ty.name()),
                    json!(layout.components),
                    json!(stride),
                    json!(offset),
                ]),
                AttributeSource::Constant(values) => out.push(json!(values)),
            }
        }
        Command::Uniform { name, ty, values, .. } => {
            out.extend([json!(name), json!(ty.name()), json!(values)]);
        }
        Command::Texture { name, texture, .. } => {
            out.extend([json!(name), json!(texture.get())]);
        }
        Command::Interpolation { min, mag, .. } => {
            out.extend([json!(min.name()), json!(mag.name())]);
        }
        Command::Wrapping { wrap, .. } => {
            out.push(json!(wrap.iter().map(|w| w.name()).collect::<Vec<_>>()));
        }
        Command::Shaders { shaders, .. } => {
            out.push(json!(shaders.iter().map(|s| s.get()).collect::<Vec<_>>()));
        }
        Command::Draw { mode, selection, .. } => {
            out.push(json!(mode.name()));
            out.push(match selection {
                Selection::Arrays { first, count } => json!([first, count]),
                Selection::Elements { ibuf, index_type, count } => {
                    json!([ibuf.get(), index_type.name(), count])
                }
            });
        }
        Command::Attach { point, target, .. } => {
            out.extend([json!(point.name()), json!(target.map_or(0, ObjectId::get))]);
        }
        Command::Framebuffer { bind, .. } => out.push(json!(bind)),
        Command::Func(call) => {
            out.push(json!(call.name()));
            encode_call(call, &mut out);
        }
    }
    Value::Array(out)
}

fn encode_call(call: &GlCall, out: &mut Vec<Value>) {
    match call {
        GlCall::Viewport { x, y, width, height } | GlCall::Scissor { x, y, width, height } => {
            out.extend([json!(x), json!(y), json!(width), json!(height)]);
        }
        GlCall::Clear(flags) => {
            let mut names = Vec::new();
            if flags.color {
                names.push("color");
            }
            if flags.depth {
                names.push("depth");
            }
            if flags.stencil {
                names.push("stencil");
            }
            out.push(json!(names));
        }
        GlCall::ClearColor(rgba) => out.extend(rgba.iter().map(|c| json!(c))),
        GlCall::ClearDepth(d) => out.push(json!(d)),
        GlCall::ClearStencil(s) => out.push(json!(s)),
        GlCall::Enable(cap) | GlCall::Disable(cap) => out.push(json!(cap.name())),
        GlCall::BlendFunc { src_rgb, dst_rgb, src_alpha, dst_alpha } => out.extend([
            json!(src_rgb.name()),
            json!(dst_rgb.name()),
            json!(src_alpha.name()),
            json!(dst_alpha.name()),
        ]),
        GlCall::BlendEquation(e) => out.push(json!(e.name())),
        GlCall::DepthFunc(f) => out.push(json!(f.name())),
        GlCall::DepthMask(m) => out.push(json!(m)),
        GlCall::ColorMask(mask) => out.extend(mask.iter().map(|m| json!(m))),
        GlCall::CullFace(f) => out.push(json!(f.name())),
        GlCall::FrontFace(f) => out.push(json!(f.name())),
        GlCall::LineWidth(w) => out.push(json!(w)),
        GlCall::PolygonOffset { factor, units } => out.extend([json!(factor), json!(units)]),
        GlCall::Hint { target, mode } => out.extend([json!(target.name()), json!(mode.name())]),
        GlCall::Finish | GlCall::Flush => {}
    }
}

// ── decoding ──────────────────────────────────────────────────────────────

fn wire_err(op: &str, msg: impl std::fmt::Display) -> GlooError {
    GlooError::Wire(format!("{op}: {msg}"))
}

/// Cursor over the arguments of one wire command.
struct Args<'a> {
    op: &'a str,
    items: &'a [Value],
    pos: usize,
    buffers: &'a [Bytes],
}

impl<'a> Args<'a> {
    fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }

    fn peek(&self) -> Option<&'a Value> {
        self.items.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Value> {
        let v = self
            .items
            .get(self.pos)
            .ok_or_else(|| wire_err(self.op, format!("missing argument {}", self.pos)))?;
        self.pos += 1;
        Ok(v)
    }

    fn u64(&mut self) -> Result<u64> {
        let v = self.next()?;
        v.as_u64().ok_or_else(|| wire_err(self.op, format!("expected integer, got {v}")))
    }

    fn usize(&mut self) -> Result<usize> {
        let v = self.u64()?;
        usize::try_from(v).map_err(|_| wire_err(self.op, format!("{v} does not fit usize")))
    }

    fn u32(&mut self) -> Result<u32> {
        let v = self.u64()?;
        u32::try_from(v).map_err(|_| wire_err(self.op, format!("{v} does not fit u32")))
    }

    fn i32(&mut self) -> Result<i32> {
        let v = self.next()?;
        v.as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| wire_err(self.op, format!("expected i32, got {v}")))
    }

    fn f32(&mut self) -> Result<f32> {
        let v = self.next()?;
        v.as_f64().map(|f| f as f32).ok_or_else(|| wire_err(self.op, format!("expected number, got {v}")))
    }

    fn bool(&mut self) -> Result<bool> {
        let v = self.next()?;
        v.as_bool().ok_or_else(|| wire_err(self.op, format!("expected bool, got {v}")))
    }

    fn str(&mut self) -> Result<&'a str> {
        let v = self.next()?;
        v.as_str().ok_or_else(|| wire_err(self.op, format!("expected string, got {v}")))
    }

    fn named<T>(&mut self, what: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
        let s = self.str()?;
        parse(s).ok_or_else(|| wire_err(self.op, format!("unknown {what} '{s}'")))
    }

    fn array(&mut self) -> Result<&'a [Value]> {
        let v = self.next()?;
        v.as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| wire_err(self.op, format!("expected array, got {v}")))
    }

    /// Nested array as a sub-cursor.
    fn sub(&mut self) -> Result<Args<'a>> {
        let items = self.array()?;
        Ok(Args { op: self.op, items, pos: 0, buffers: self.buffers })
    }

    fn usizes(&mut self) -> Result<Vec<usize>> {
        let mut sub = self.sub()?;
        (0..sub.remaining()).map(|_| sub.usize()).collect()
    }

    fn f32s(&mut self) -> Result<Vec<f32>> {
        let mut sub = self.sub()?;
        (0..sub.remaining()).map(|_| sub.f32()).collect()
    }

    fn id(&mut self) -> Result<ObjectId> {
        let raw = self.u64()?;
        ObjectId::from_raw(raw).ok_or_else(|| wire_err(self.op, "object id 0"))
    }

    fn opt_id(&mut self) -> Result<Option<ObjectId>> {
        Ok(ObjectId::from_raw(self.u64()?))
    }

    fn buffer(&mut self) -> Result<Bytes> {
        let v = self.next()?;
        let index = v
            .get("buffer_index")
            .and_then(Value::as_u64)
            .ok_or_else(|| wire_err(self.op, format!("expected buffer reference, got {v}")))?;
        self.buffers
            .get(index as usize)
            .cloned()
            .ok_or_else(|| wire_err(self.op, format!("buffer index {index} out of range")))
    }

    fn glsl_type(&mut self) -> Result<GlslType> {
        self.named("GLSL type", GlslType::from_name)
    }

    fn finish(&self) -> Result<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(wire_err(self.op, format!("{} unexpected trailing argument(s)", self.remaining())))
        }
    }
}

/// Decodes every command of `message`.
pub fn decode_message(message: &GlirMessage) -> Result<Vec<Command>> {
    if message.header.msg_type != MSG_TYPE {
        return Err(GlooError::Wire(format!(
            "unexpected message type '{}'",
            message.header.msg_type
        )));
    }
    let buffers = message.buffers()?;
    message.header.commands.iter().map(|v| decode_command(v, &buffers)).collect()
}

/// Decodes one wire array, resolving buffer references against `buffers`.
pub fn decode_command(value: &Value, buffers: &[Bytes]) -> Result<Command> {
    let items = value
        .as_array()
        .ok_or_else(|| GlooError::Wire(format!("command is not an array: {value}")))?;
    let op_name = items
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| GlooError::Wire(format!("command without opcode: {value}")))?;
    let opcode = Opcode::parse(op_name)
        .ok_or_else(|| GlooError::Wire(format!("unknown opcode '{op_name}'")))?;
    let mut a = Args { op: op_name, items, pos: 1, buffers };
    let raw_id = a.u64()?;
    let id = || ObjectId::from_raw(raw_id).ok_or_else(|| wire_err(op_name, "object id 0"));

    let cmd = match opcode {
        Opcode::Current => Command::Current,
        Opcode::Swap => Command::Swap,
        Opcode::Create => Command::Create {
            id: id()?,
            kind: a.named("object kind", ObjectKind::from_name)?,
        },
        Opcode::Delete => Command::Delete { id: id()? },
        Opcode::Link => Command::Link { id: id()? },
        Opcode::Size => {
            let args = match (a.remaining(), a.peek()) {
                (2, Some(Value::Array(_))) => {
                    let shape = a.usizes()?;
                    let [h, w] = shape[..] else {
                        return Err(wire_err(op_name, "render buffer shape needs 2 dimensions"));
                    };
                    SizeArgs::RenderBuffer {
                        shape: [h, w],
                        format: a.named("render buffer format", RenderBufferFormat::from_name)?,
                    }
                }
                (2, _) => SizeArgs::Buffer {
                    nbytes: a.usize()?,
                    usage: a.named("usage", BufferUsage::from_name)?,
                },
                _ => SizeArgs::Texture {
                    level: a.u32()?,
                    shape: a.usizes()?,
                    format: a.named("texture format", TextureFormat::from_name)?,
                    texel: a.named("texel type", TexelType::from_name)?,
                },
            };
            Command::Size { id: id()?, args }
        }
        Opcode::Data => {
            let args = match (a.remaining(), a.peek()) {
                (1, Some(Value::String(_))) => DataArgs::Shader { source: a.str()?.to_string() },
                (2, _) => DataArgs::Buffer { offset: a.usize()?, data: a.buffer()? },
                _ => DataArgs::Texture {
                    level: a.u32()?,
                    offset: a.usizes()?,
                    shape: a.usizes()?,
                    texel: a.named("texel type", TexelType::from_name)?,
                    data: a.buffer()?,
                },
            };
            Command::Data { id: id()?, args }
        }
        Opcode::Attribute => {
            let name = a.str()?.to_string();
            let ty = a.glsl_type()?;
            let source = if matches!(a.peek(), Some(Value::Array(_))) {
                AttributeSource::Constant(a.f32s()?)
            } else {
                let vbo = a.id()?;
                let vty = a.named("vertex type", VertexType::from_name)?;
                let components = a.u64()? as u8;
                AttributeSource::Buffer {
                    vbo,
                    layout: VertexLayout::new(vty, components),
                    stride: a.usize()?,
                    offset: a.usize()?,
                }
            };
            Command::Attribute { id: id()?, name, ty, source }
        }
        Opcode::Uniform => Command::Uniform {
            id: id()?,
            name: a.str()?.to_string(),
            ty: a.glsl_type()?,
            values: a.f32s()?,
        },
        Opcode::Texture => Command::Texture {
            id: id()?,
            name: a.str()?.to_string(),
            texture: a.id()?,
        },
        Opcode::Interpolation => Command::Interpolation {
            id: id()?,
            min: a.named("interpolation", Interpolation::from_name)?,
            mag: a.named("interpolation", Interpolation::from_name)?,
        },
        Opcode::Wrapping => {
            let mut sub = a.sub()?;
            let wrap = (0..sub.remaining())
                .map(|_| sub.named("wrapping", Wrapping::from_name))
                .collect::<Result<_>>()?;
            Command::Wrapping { id: id()?, wrap }
        }
        Opcode::Shaders => {
            let mut sub = a.sub()?;
            let shaders = (0..sub.remaining()).map(|_| sub.id()).collect::<Result<_>>()?;
            Command::Shaders { id: id()?, shaders }
        }
        Opcode::Draw => {
            let mode = a.named("primitive mode", PrimitiveMode::from_name)?;
            let mut sel = a.sub()?;
            let selection = if sel.remaining() == 3 {
                Selection::Elements {
                    ibuf: sel.id()?,
                    index_type: sel.named("index type", IndexType::from_name)?,
                    count: sel.usize()?,
                }
            } else {
                Selection::Arrays { first: sel.usize()?, count: sel.usize()? }
            };
            sel.finish()?;
            Command::Draw { id: id()?, mode, selection }
        }
        Opcode::Attach => Command::Attach {
            id: id()?,
            point: a.named("attachment point", AttachmentPoint::from_name)?,
            target: a.opt_id()?,
        },
        Opcode::Framebuffer => Command::Framebuffer { id: id()?, bind: a.bool()? },
        Opcode::Func => Command::Func(decode_call(&mut a)?),
    };
    a.finish()?;
    Ok(cmd)
}

fn decode_call(a: &mut Args<'_>) -> Result<GlCall> {
    let name = a.str()?;
    Ok(match name {
        "viewport" => GlCall::Viewport { x: a.i32()?, y: a.i32()?, width: a.i32()?, height: a.i32()? },
        "scissor" => GlCall::Scissor { x: a.i32()?, y: a.i32()?, width: a.i32()?, height: a.i32()? },
        "clear" => {
            let mut sub = a.sub()?;
            let mut flags = ClearFlags { color: false, depth: false, stencil: false };
            for _ in 0..sub.remaining() {
                match sub.str()? {
                    "color" => flags.color = true,
                    "depth" => flags.depth = true,
                    "stencil" => flags.stencil = true,
                    other => return Err(wire_err("FUNC clear", format!("unknown buffer '{other}'"))),
                }
            }
            GlCall::Clear(flags)
        }
        "clear_color" => GlCall::ClearColor([a.f32()?, a.f32()?, a.f32()?, a.f32()?]),
        "clear_depth" => GlCall::ClearDepth(a.f32()?),
        "clear_stencil" => GlCall::ClearStencil(a.i32()?),
        "enable" => GlCall::Enable(a.named("capability", Capability::from_name)?),
        "disable" => GlCall::Disable(a.named("capability", Capability::from_name)?),
        "blend_func" => GlCall::BlendFunc {
            src_rgb: a.named("blend factor", BlendFactor::from_name)?,
            dst_rgb: a.named("blend factor", BlendFactor::from_name)?,
            src_alpha: a.named("blend factor", BlendFactor::from_name)?,
            dst_alpha: a.named("blend factor", BlendFactor::from_name)?,
        },
        "blend_equation" => {
            GlCall::BlendEquation(a.named("blend equation", BlendEquation::from_name)?)
        }
        "depth_func" => GlCall::DepthFunc(a.named("compare function", CompareFunc::from_name)?),
        "depth_mask" => GlCall::DepthMask(a.bool()?),
        "color_mask" => GlCall::ColorMask([a.bool()?, a.bool()?, a.bool()?, a.bool()?]),
        "cull_face" => GlCall::CullFace(a.named("face", Face::from_name)?),
        "front_face" => GlCall::FrontFace(a.named("front face", FrontFace::from_name)?),
        "line_width" => GlCall::LineWidth(a.f32()?),
        "polygon_offset" => GlCall::PolygonOffset { factor: a.f32()?, units: a.f32()? },
        "hint" => GlCall::Hint {
            target: a.named("hint target", HintTarget::from_name)?,
            mode: a.named("hint mode", HintMode::from_name)?,
        },
        "finish" => GlCall::Finish,
        "flush" => GlCall::Flush,
        other => return Err(wire_err("FUNC", format!("unknown call '{other}'"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(vbo: ObjectId, prog: ObjectId) -> Vec<Command> {
        vec![
            Command::Create { id: vbo, kind: ObjectKind::VertexBuffer },
            Command::Uniform {
                id: prog,
                name: "u_scale".into(),
                ty: GlslType::Vec3,
                values: vec![1.0, 2.0, 3.0],
            },
            Command::Data {
                id: vbo,
                args: DataArgs::Buffer { offset: 0, data: Bytes::from(vec![0u8; 24]) },
            },
            Command::Data {
                id: vbo,
                args: DataArgs::Buffer { offset: 20, data: Bytes::from(vec![1u8, 0, 1, 0]) },
            },
        ]
    }

    // ── envelope shape ──

    #[test]
    fn byte_payloads_become_buffer_references() {
        let (vbo, prog) = (ObjectId::next(), ObjectId::next());
        let msg = encode_message(&sample(vbo, prog), ArraySerialization::Binary);
        assert_eq!(msg.header.msg_type, "glir_commands");
        let v = vbo.get();
        assert_eq!(
            msg.header.commands,
            vec![
                json!(["CREATE", v, "VertexBuffer"]),
                json!(["UNIFORM", prog.get(), "u_scale", "vec3", [1.0, 2.0, 3.0]]),
                json!(["DATA", v, 0, {"buffer_index": 0}]),
                json!(["DATA", v, 20, {"buffer_index": 1}]),
            ]
        );
        assert_eq!(msg.binary_buffers.len(), 2);
        assert_eq!(&msg.binary_buffers[0][..], &[0u8; 24][..]);
        assert!(msg.header.buffers.is_empty());
    }

    #[test]
    fn base64_buffers_are_inline() {
        let msg = encode_message(&sample(ObjectId::next(), ObjectId::next()), ArraySerialization::Base64);
        assert!(msg.binary_buffers.is_empty());
        assert_eq!(msg.header.buffers[0].storage_type, "base64");
        assert_eq!(msg.header.buffers[0].buffer, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert_eq!(msg.header.buffers[1].buffer, "AQABAA==");
        let text = msg.to_json().unwrap();
        assert!(text.starts_with(r#"{"msg_type":"glir_commands","commands":[["CREATE","#));
    }

    // ── decoding ──

    #[test]
    fn json_text_decodes_back() {
        let (vbo, prog) = (ObjectId::next(), ObjectId::next());
        let cmds = sample(vbo, prog);
        let text = encode_message(&cmds, ArraySerialization::Binary).into_base64().to_json().unwrap();
        let back = decode_message(&GlirMessage::from_json(&text).unwrap()).unwrap();
        assert_eq!(back, cmds);
    }

    #[test]
    fn overloaded_shapes_are_told_apart() {
        let id = ObjectId::next();
        let ibuf = ObjectId::next();
        let cmds = vec![
            Command::Size { id, args: SizeArgs::RenderBuffer { shape: [4, 8], format: RenderBufferFormat::Depth } },
            Command::Size { id, args: SizeArgs::Buffer { nbytes: 64, usage: BufferUsage::Static } },
            Command::Size {
                id,
                args: SizeArgs::Texture {
                    level: 0,
                    shape: vec![2, 2, 4],
                    format: TextureFormat::Rgba,
                    texel: TexelType::F32,
                },
            },
            Command::Data { id, args: DataArgs::Shader { source: "void main() {}".into() } },
            Command::Data {
                id,
                args: DataArgs::Texture {
                    level: 1,
                    offset: vec![0, 1],
                    shape: vec![1, 1, 4],
                    texel: TexelType::U8,
                    data: Bytes::from_static(&[9, 9, 9, 9]),
                },
            },
            Command::Attribute {
                id,
                name: "a_color".into(),
                ty: GlslType::Vec4,
                source: AttributeSource::Constant(vec![1.0, 0.5, 0.0, 1.0]),
            },
            Command::Attribute {
                id,
                name: "a_position".into(),
                ty: GlslType::Vec2,
                source: AttributeSource::Buffer {
                    vbo: ibuf,
                    layout: VertexLayout::new(VertexType::F32, 2),
                    stride: 8,
                    offset: 0,
                },
            },
            Command::Draw {
                id,
                mode: PrimitiveMode::Triangles,
                selection: Selection::Elements { ibuf, index_type: IndexType::U16, count: 6 },
            },
            Command::Draw { id, mode: PrimitiveMode::Points, selection: Selection::Arrays { first: 2, count: 3 } },
            Command::Attach { id, point: AttachmentPoint::Color, target: None },
            Command::Framebuffer { id, bind: true },
        ];
        let msg = encode_message(&cmds, ArraySerialization::Binary);
        assert_eq!(decode_message(&msg).unwrap(), cmds);
    }

    #[test]
    fn func_calls_decode_back() {
        let calls = vec![
            GlCall::Viewport { x: 0, y: 0, width: 640, height: 480 },
            GlCall::Clear(ClearFlags::COLOR_DEPTH),
            GlCall::ClearColor([0.0, 0.5, 1.0, 1.0]),
            GlCall::Enable(Capability::Blend),
            GlCall::BlendFunc {
                src_rgb: BlendFactor::SrcAlpha,
                dst_rgb: BlendFactor::OneMinusSrcAlpha,
                src_alpha: BlendFactor::One,
                dst_alpha: BlendFactor::Zero,
            },
            GlCall::DepthFunc(CompareFunc::LessEqual),
            GlCall::ColorMask([true, true, true, false]),
            GlCall::Hint { target: HintTarget::GenerateMipmap, mode: HintMode::Nicest },
            GlCall::Finish,
        ];
        let cmds: Vec<_> = calls.into_iter().map(Command::Func).collect();
        let msg = encode_message(&cmds, ArraySerialization::Binary);
        assert_eq!(msg.header.commands[1], json!(["FUNC", 0, "clear", ["color", "depth"]]));
        assert_eq!(decode_message(&msg).unwrap(), cmds);
    }

    #[test]
    fn malformed_commands_are_rejected() {
        let bad = [
            json!("CREATE"),
            json!(["BOGUS", 1]),
            json!(["CREATE", 0, "VertexBuffer"]),
            json!(["CREATE", 1, "Teapot"]),
            json!(["DATA", 1, 0, {"buffer_index": 3}]),
            json!(["LINK", 1, "extra"]),
            json!(["SIZE", 1, 4_294_967_296u64, [2, 2, 4], "rgba", "uint8"]),
            json!(["SIZE", 1, 0, [2, 2, 4], "rgba", "float64"]),
        ];
        for value in &bad {
            assert!(matches!(decode_command(value, &[]), Err(GlooError::Wire(_))), "{value}");
        }
    }

    #[test]
    fn wrong_message_type() {
        let mut msg = encode_message(&[], ArraySerialization::Binary);
        msg.header.msg_type = "comm_open".into();
        assert!(decode_message(&msg).is_err());
    }
}
