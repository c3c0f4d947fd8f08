use std::collections::HashSet;

use glint_glsl::{convert_shader, ShaderDialect};

use super::command::{Command, DataArgs, ObjectId, SizeArgs};
use super::parser::GlirParser;
use crate::error::Result;

/// Ordered backlog of commands awaiting a flush.
///
/// - `push()` is O(1)
/// - commands are never reordered; filtering only drops superseded uploads
#[derive(Debug, Default)]
pub struct GlirQueue {
    commands: Vec<Command>,
    /// Number of completed flushes.
    epoch: u64,
}

impl GlirQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Pending commands in push order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Counter bumped by every flush; used for "need update" tracking.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drops every pending command without executing it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Removes and returns the backlog, filtered for a parser that expects
    /// shader sources in `dialect` (`None` = unchanged).
    pub fn take(&mut self, dialect: Option<ShaderDialect>) -> Vec<Command> {
        self.epoch += 1;
        filter(std::mem::take(&mut self.commands), dialect)
    }

    /// Hands the whole backlog to `parser` and clears it.
    ///
    /// The queue is emptied even when the parser fails; commands are not
    /// retried.
    pub fn flush(&mut self, parser: &mut dyn GlirParser) -> Result<()> {
        let commands = self.take(parser.shader_dialect());
        if commands.is_empty() {
            return Ok(());
        }
        log::trace!("flushing {} command(s)", commands.len());
        parser.parse(commands)
    }

    /// Debug rendering of the pending commands, one line each.
    pub fn describe(&self) -> Vec<String> {
        self.commands.iter().map(Command::describe).collect()
    }

    /// Logs `describe()` at debug level.
    pub fn show(&self) {
        for line in self.describe() {
            log::debug!("{line}");
        }
    }
}

/// Upload slot a SIZE/DATA command writes to: the object, plus the level for
/// textures.
type Slot = (ObjectId, Option<u32>);

fn size_slot(id: ObjectId, args: &SizeArgs) -> Slot {
    match args {
        SizeArgs::Texture { level, .. } => (id, Some(*level)),
        SizeArgs::Buffer { .. } | SizeArgs::RenderBuffer { .. } => (id, None),
    }
}

fn data_slot(id: ObjectId, args: &DataArgs) -> Option<Slot> {
    match args {
        DataArgs::Buffer { .. } => Some((id, None)),
        DataArgs::Texture { level, .. } => Some((id, Some(*level))),
        DataArgs::Shader { .. } => None,
    }
}

/// Drops SIZE/DATA commands made obsolete by a later SIZE of the same slot,
/// and converts shader sources to `dialect`.
///
/// DRAW, FRAMEBUFFER and ATTACH may read the older contents, so nothing is
/// pruned across them.
pub fn filter(commands: Vec<Command>, dialect: Option<ShaderDialect>) -> Vec<Command> {
    let mut resized: HashSet<Slot> = HashSet::new();
    let mut keep = vec![true; commands.len()];

    for (i, cmd) in commands.iter().enumerate().rev() {
        match cmd {
            Command::Draw { .. } | Command::Framebuffer { .. } | Command::Attach { .. } => {
                resized.clear();
            }
            Command::Size { id, args } => {
                let slot = size_slot(*id, args);
                if !resized.insert(slot) {
                    keep[i] = false;
                }
            }
            Command::Data { id, args } => {
                if data_slot(*id, args).is_some_and(|slot| resized.contains(&slot)) {
                    keep[i] = false;
                }
            }
            _ => {}
        }
    }

    let pruned = keep.iter().filter(|k| !**k).count();
    if pruned > 0 {
        log::trace!("pruned {pruned} superseded upload(s)");
    }

    commands
        .into_iter()
        .zip(keep)
        .filter_map(|(cmd, keep)| keep.then_some(cmd))
        .map(|cmd| match (cmd, dialect) {
            (Command::Data { id, args: DataArgs::Shader { source } }, Some(dialect)) => {
                let source = convert_shader(&source, dialect);
                Command::Data { id, args: DataArgs::Shader { source } }
            }
            (cmd, _) => cmd,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::glir::command::Selection;
    use crate::glir::enums::{BufferUsage, ObjectKind, PrimitiveMode, TexelType, TextureFormat};

    fn size(id: ObjectId, nbytes: usize) -> Command {
        Command::Size { id, args: SizeArgs::Buffer { nbytes, usage: BufferUsage::Dynamic } }
    }

    fn data(id: ObjectId, offset: usize, len: usize) -> Command {
        Command::Data { id, args: DataArgs::Buffer { offset, data: Bytes::from(vec![0u8; len]) } }
    }

    fn tex_size(id: ObjectId, level: u32) -> Command {
        Command::Size {
            id,
            args: SizeArgs::Texture {
                level,
                shape: vec![2, 2, 4],
                format: TextureFormat::Rgba,
                texel: TexelType::U8,
            },
        }
    }

    fn draw(id: ObjectId) -> Command {
        Command::Draw {
            id,
            mode: PrimitiveMode::Points,
            selection: Selection::Arrays { first: 0, count: 1 },
        }
    }

    #[test]
    fn later_size_supersedes_earlier_uploads() {
        let b = ObjectId::next();
        let cmds = vec![
            Command::Create { id: b, kind: ObjectKind::VertexBuffer },
            size(b, 16),
            data(b, 0, 16),
            size(b, 16),
            data(b, 0, 16),
        ];
        let out = filter(cmds, None);
        assert_eq!(out.len(), 3);
        assert!(matches!(out[1], Command::Size { .. }));
        assert!(matches!(out[2], Command::Data { .. }));
    }

    #[test]
    fn other_objects_are_untouched() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        let out = filter(vec![data(a, 0, 4), size(b, 8), data(b, 0, 8)], None);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn draw_is_a_barrier() {
        let b = ObjectId::next();
        let p = ObjectId::next();
        let out = filter(vec![size(b, 4), data(b, 0, 4), draw(p), size(b, 8)], None);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn texture_levels_are_independent() {
        let t = ObjectId::next();
        let out = filter(vec![tex_size(t, 0), tex_size(t, 1), tex_size(t, 0)], None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], tex_size(t, 1));
    }

    #[test]
    fn shader_sources_are_converted() {
        let s = ObjectId::next();
        let cmd = Command::Data {
            id: s,
            args: DataArgs::Shader { source: "void main() {}".into() },
        };
        let out = filter(vec![cmd.clone()], Some(ShaderDialect::Es2));
        let Command::Data { args: DataArgs::Shader { source }, .. } = &out[0] else {
            panic!("expected shader data");
        };
        assert!(source.starts_with("precision highp float;"));
        assert_eq!(filter(vec![cmd.clone()], None), vec![cmd]);
    }

    #[test]
    fn take_clears_and_bumps_epoch() {
        let mut q = GlirQueue::new();
        q.push(Command::Current);
        assert_eq!(q.epoch(), 0);
        assert_eq!(q.take(None), vec![Command::Current]);
        assert!(q.is_empty());
        assert_eq!(q.epoch(), 1);
    }

    #[test]
    fn describe_lines() {
        let mut q = GlirQueue::new();
        let b = ObjectId::next();
        q.push(Command::Create { id: b, kind: ObjectKind::IndexBuffer });
        q.push(data(b, 0, 6));
        assert_eq!(
            q.describe(),
            vec![format!("CREATE {b} IndexBuffer"), format!("DATA {b} 0 bytes[6]")]
        );
    }
}
