use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{Command, Handle, ObjectId, ObjectKind};

/// Identity and lifecycle shared by every GL object wrapper.
///
/// Construction queues CREATE; nothing touches the graphics API until the
/// context is flushed into a local interpreter.
#[derive(Debug)]
pub struct GlObject {
    id:        ObjectId,
    kind:      ObjectKind,
    ctx:       GlContext,
    deleted:   bool,
    /// Epoch of the context queue at the last push.
    last_push: Option<u64>,
}

impl GlObject {
    pub fn new(ctx: &GlContext, kind: ObjectKind) -> Self {
        let mut obj = Self {
            id: ObjectId::next(),
            kind,
            ctx: ctx.clone(),
            deleted: false,
            last_push: None,
        };
        obj.record(Command::Create { id: obj.id, kind });
        obj
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn context(&self) -> &GlContext {
        &self.ctx
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn record(&mut self, command: Command) {
        self.ctx.push(command);
        self.last_push = Some(self.ctx.epoch());
    }

    /// Fails with a resource error once the object is deleted.
    pub fn check_alive(&self) -> Result<()> {
        if self.deleted {
            Err(GlooError::Resource(format!("{} {} was deleted", self.kind, self.id)))
        } else {
            Ok(())
        }
    }

    /// Queues `command` on behalf of this object.
    pub fn push(&mut self, command: Command) -> Result<()> {
        self.check_alive()?;
        self.record(command);
        Ok(())
    }

    /// True if commands were queued since the context's last flush.
    pub fn need_update(&self) -> bool {
        self.last_push == Some(self.ctx.epoch())
    }

    /// Queues DELETE. Later calls do nothing.
    pub fn delete(&mut self) {
        if self.deleted {
            return;
        }
        self.ctx.push(Command::Delete { id: self.id });
        self.deleted = true;
    }

    /// Native handle, if the interpreter realized the object and it is
    /// not deleted.
    pub fn handle(&self) -> Option<Handle> {
        if self.deleted {
            return None;
        }
        self.ctx.realization(self.id).handle()
    }

    pub fn valid(&self) -> bool {
        self.handle().is_some()
    }
}

impl Drop for GlObject {
    fn drop(&mut self) {
        self.delete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlConfig;
    use crate::glir::{HeadlessBackend, LocalParser, Opcode};

    #[test]
    fn create_is_queued_not_executed() {
        let (ctx, parser) =
            GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(1, 1)))
                .unwrap();
        let obj = GlObject::new(&ctx, ObjectKind::VertexBuffer);
        assert!(obj.need_update());
        assert!(!obj.valid());
        assert!(!parser.borrow().contains(obj.id()));
        ctx.flush().unwrap();
        assert!(!obj.need_update());
        assert!(obj.valid());
    }

    #[test]
    fn delete_twice_queues_once() {
        let ctx = GlContext::new(GlConfig::default());
        let mut obj = GlObject::new(&ctx, ObjectKind::Program);
        obj.delete();
        obj.delete();
        let ops: Vec<_> = ctx.pending_commands().iter().map(Command::opcode).collect();
        assert_eq!(ops, [Opcode::Create, Opcode::Delete]);
        assert!(!obj.valid());
        assert!(matches!(obj.push(Command::Link { id: obj.id() }), Err(GlooError::Resource(_))));
        drop(obj);
        assert_eq!(ctx.pending_len(), 2);
    }

    #[test]
    fn drop_queues_delete() {
        let ctx = GlContext::new(GlConfig::default());
        let id = GlObject::new(&ctx, ObjectKind::Texture2D).id();
        assert_eq!(ctx.pending_commands().last(), Some(&Command::Delete { id }));
    }
}
