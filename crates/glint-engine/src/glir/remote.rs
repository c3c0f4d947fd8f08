//! Interpreter that forwards commands to an external executor, typically a
//! WebGL client, instead of executing them.

use std::io::Write;

use anyhow::Context as _;
use glint_glsl::ShaderDialect;

use super::backend::Capabilities;
use super::command::{Command, ObjectId};
use super::headless::HeadlessBackend;
use super::local::LocalParser;
use super::parser::{ActiveVariable, GlirParser, Pixels, Realization};
use super::wire::{self, ArraySerialization, GlirMessage};
use crate::error::{GlooError, Result};

/// The party that receives serialized command lists.
pub trait GlirExecutor {
    /// Accepts one flush worth of commands.
    fn send(&mut self, message: GlirMessage) -> anyhow::Result<()>;

    /// Shader dialect the executor compiles.
    fn dialect(&self) -> ShaderDialect {
        ShaderDialect::Es2
    }

    /// Preferred array transport.
    fn array_serialization(&self) -> ArraySerialization {
        ArraySerialization::Binary
    }
}

/// Forwards every flush to a [`GlirExecutor`]. Never allocates handles.
pub struct RemoteParser<E: GlirExecutor> {
    executor: E,
    sent: usize,
}

impl<E: GlirExecutor> RemoteParser<E> {
    pub fn new(executor: E) -> Self {
        log::debug!("remote GLIR interpreter (dialect {})", executor.dialect().name());
        Self { executor, sent: 0 }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Number of messages handed off so far.
    pub fn messages_sent(&self) -> usize {
        self.sent
    }
}

impl<E: GlirExecutor> GlirParser for RemoteParser<E> {
    fn is_remote(&self) -> bool {
        true
    }

    fn shader_dialect(&self) -> Option<ShaderDialect> {
        Some(self.executor.dialect())
    }

    fn parse(&mut self, commands: Vec<Command>) -> Result<()> {
        let message = wire::encode_message(&commands, self.executor.array_serialization());
        log::debug!(
            "sending {} command(s), {} buffer(s)",
            message.command_count(),
            message.binary_buffers.len() + message.header.buffers.len()
        );
        self.executor.send(message).map_err(GlooError::Executor)?;
        self.sent += 1;
        Ok(())
    }

    fn realization(&self, _id: ObjectId) -> Realization {
        Realization::Unrealized
    }

    fn read_pixels(&mut self, _region: Option<[i32; 4]>) -> Result<Pixels> {
        Err(GlooError::RemoteReadback("read_pixels"))
    }

    fn active_uniforms(&self, _program: ObjectId) -> Result<Vec<ActiveVariable>> {
        Err(GlooError::RemoteReadback("active_uniforms"))
    }

    fn active_attributes(&self, _program: ObjectId) -> Result<Vec<ActiveVariable>> {
        Err(GlooError::RemoteReadback("active_attributes"))
    }
}

// ── executors ─────────────────────────────────────────────────────────────

/// Writes each message as one line of JSON. Buffers are embedded as base64.
pub struct JsonLinesExecutor<W: Write> {
    out: W,
    dialect: ShaderDialect,
}

impl<W: Write> JsonLinesExecutor<W> {
    pub fn new(out: W) -> Self {
        Self { out, dialect: ShaderDialect::Es2 }
    }

    pub fn with_dialect(out: W, dialect: ShaderDialect) -> Self {
        Self { out, dialect }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> GlirExecutor for JsonLinesExecutor<W> {
    fn send(&mut self, message: GlirMessage) -> anyhow::Result<()> {
        let line = message.into_base64().to_json()?;
        writeln!(self.out, "{line}").context("writing GLIR message")?;
        self.out.flush().context("flushing GLIR output")?;
        Ok(())
    }

    fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn array_serialization(&self) -> ArraySerialization {
        ArraySerialization::Base64
    }
}

/// Decodes every message and replays it into a headless local interpreter.
///
/// Exercises the full wire path in-process.
pub struct LoopbackExecutor {
    parser: LocalParser<HeadlessBackend>,
    mode: ArraySerialization,
    received: usize,
}

impl LoopbackExecutor {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_backend(HeadlessBackend::with_capabilities(
            width,
            height,
            Capabilities { texture_3d: true, ..Capabilities::default() },
        ))
    }

    pub fn with_backend(backend: HeadlessBackend) -> Self {
        Self { parser: LocalParser::new(backend), mode: ArraySerialization::Binary, received: 0 }
    }

    /// Sets the array transport requested from the sender.
    pub fn with_serialization(mut self, mode: ArraySerialization) -> Self {
        self.mode = mode;
        self
    }

    pub fn parser(&self) -> &LocalParser<HeadlessBackend> {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut LocalParser<HeadlessBackend> {
        &mut self.parser
    }

    pub fn messages_received(&self) -> usize {
        self.received
    }
}

impl GlirExecutor for LoopbackExecutor {
    fn send(&mut self, message: GlirMessage) -> anyhow::Result<()> {
        self.received += 1;
        let commands = wire::decode_message(&message)?;
        self.parser.parse(commands)?;
        Ok(())
    }

    fn array_serialization(&self) -> ArraySerialization {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::glir::command::{DataArgs, SizeArgs};
    use crate::glir::enums::{BufferUsage, ObjectKind};

    fn upload(id: ObjectId) -> Vec<Command> {
        vec![
            Command::Create { id, kind: ObjectKind::VertexBuffer },
            Command::Size { id, args: SizeArgs::Buffer { nbytes: 4, usage: BufferUsage::Static } },
            Command::Data {
                id,
                args: DataArgs::Buffer { offset: 0, data: Bytes::from_static(&[1, 2, 3, 4]) },
            },
        ]
    }

    #[test]
    fn remote_has_no_handles_and_no_readback() {
        let mut parser = RemoteParser::new(JsonLinesExecutor::new(Vec::new()));
        let id = ObjectId::next();
        parser.parse(upload(id)).unwrap();
        assert!(parser.is_remote());
        assert_eq!(parser.shader_dialect(), Some(ShaderDialect::Es2));
        assert_eq!(parser.realization(id), Realization::Unrealized);
        assert!(matches!(parser.read_pixels(None), Err(GlooError::RemoteReadback(_))));
        assert!(matches!(parser.active_uniforms(id), Err(GlooError::RemoteReadback(_))));
    }

    #[test]
    fn json_lines_one_message_per_line() {
        let mut parser = RemoteParser::new(JsonLinesExecutor::new(Vec::new()));
        parser.parse(upload(ObjectId::next())).unwrap();
        parser.parse(vec![Command::Swap]).unwrap();
        let text = String::from_utf8(parser.executor_mut().out.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""buffers":[{"storage_type":"base64","buffer":"AQIDBA=="}]"#));
        assert_eq!(lines[1], r#"{"msg_type":"glir_commands","commands":[["SWAP",0]]}"#);
        assert_eq!(parser.messages_sent(), 2);
    }

    #[test]
    fn loopback_replays_into_local_table() {
        for mode in [ArraySerialization::Binary, ArraySerialization::Base64] {
            let mut parser = RemoteParser::new(LoopbackExecutor::new(4, 4).with_serialization(mode));
            let id = ObjectId::next();
            parser.parse(upload(id)).unwrap();
            let local = parser.executor().parser();
            assert!(local.contains(id));
            let handle = local.realization(id).handle().unwrap();
            assert_eq!(local.backend().buffer_data(handle), Some(&[1u8, 2, 3, 4][..]));
        }
    }

    #[test]
    fn loopback_errors_surface_as_executor_errors() {
        let mut parser = RemoteParser::new(LoopbackExecutor::new(4, 4));
        let err = parser.parse(vec![Command::Link { id: ObjectId::next() }]).unwrap_err();
        assert!(matches!(err, GlooError::Executor(_)));
        assert!(err.to_string().contains("unknown object"));
    }
}
