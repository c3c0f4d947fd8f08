//! Contexts: one command queue per drawing surface, plus the namespace
//! whose interpreter the queue flushes into.
//!
//! `GlContext` is a cheap handle (`Rc`); clones refer to the same queue.
//! Contexts are `!Send` and meant to be used from one thread.

mod config;
mod current;
mod namespace;

pub use config::GlConfig;
pub use current::CurrentGuard;
pub use namespace::{HeadlessSurface, Registration, SharedNamespace, SurfaceBackend};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{GlooError, Result};
use crate::glir::{
    ActiveVariable, Command, GlirParser, GlirQueue, ObjectId, Pixels, Realization,
};

struct ContextInner {
    config:       GlConfig,
    queue:        RefCell<GlirQueue>,
    shared:       Rc<SharedNamespace>,
    registration: Cell<Option<Registration>>,
}

#[derive(Clone)]
pub struct GlContext(Rc<ContextInner>);

impl std::fmt::Debug for GlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlContext")
            .field("pending", &self.0.queue.borrow().len())
            .field("epoch", &self.epoch())
            .field("namespace", &self.0.shared.name())
            .finish()
    }
}

impl GlContext {
    /// Context with its own, new namespace.
    pub fn new(config: GlConfig) -> Self {
        Self::with_namespace(config, Rc::new(SharedNamespace::new()))
    }

    /// Context sharing `other`'s namespace, and so its objects.
    pub fn new_shared(config: GlConfig, other: &GlContext) -> Self {
        Self::with_namespace(config, Rc::clone(&other.0.shared))
    }

    fn with_namespace(config: GlConfig, shared: Rc<SharedNamespace>) -> Self {
        Self(Rc::new(ContextInner {
            config,
            queue: RefCell::new(GlirQueue::new()),
            shared,
            registration: Cell::new(None),
        }))
    }

    /// New context with `parser` installed. The returned handle keeps the
    /// concrete type for inspection.
    pub fn with_parser<P: GlirParser + 'static>(
        config: GlConfig,
        parser: P,
    ) -> Result<(Self, Rc<RefCell<P>>)> {
        let ctx = Self::new(config);
        let parser = Rc::new(RefCell::new(parser));
        ctx.set_parser(parser.clone())?;
        Ok((ctx, parser))
    }

    pub fn config(&self) -> &GlConfig {
        &self.0.config
    }

    pub fn shared(&self) -> &Rc<SharedNamespace> {
        &self.0.shared
    }

    /// True if both handles refer to the same context.
    pub fn ptr_eq(&self, other: &GlContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// True if both contexts flush into the same namespace.
    pub fn shares_with(&self, other: &GlContext) -> bool {
        Rc::ptr_eq(&self.0.shared, &other.0.shared)
    }

    pub fn set_parser(&self, parser: Rc<RefCell<dyn GlirParser>>) -> Result<()> {
        self.0.shared.set_parser(parser)
    }

    /// Registers this context's surface with the namespace. Allowed once
    /// per context.
    pub fn create_shared(
        &self,
        name: &str,
        backend: Rc<dyn SurfaceBackend>,
    ) -> Result<Registration> {
        if let Some(reg) = self.0.registration.get() {
            return Err(GlooError::Namespace(format!(
                "context already registered with the namespace as {reg:?}"
            )));
        }
        let reg = self.0.shared.join(name, backend)?;
        self.0.registration.set(Some(reg));
        Ok(reg)
    }

    /// Unregisters this context's surface, if it registered one.
    pub fn leave_shared(&self) -> Result<()> {
        match self.0.registration.take() {
            Some(reg) => self.0.shared.leave(reg),
            None => Ok(()),
        }
    }

    pub fn registration(&self) -> Option<Registration> {
        self.0.registration.get()
    }

    // ── queue ──

    /// Appends a command to this context's queue.
    pub fn push(&self, command: Command) {
        self.0.queue.borrow_mut().push(command);
    }

    /// Number of completed flushes of this context's queue.
    pub fn epoch(&self) -> u64 {
        self.0.queue.borrow().epoch()
    }

    pub fn pending_len(&self) -> usize {
        self.0.queue.borrow().len()
    }

    /// Debug rendering of the pending commands.
    pub fn pending(&self) -> Vec<String> {
        self.0.queue.borrow().describe()
    }

    /// Logs the pending commands at debug level.
    pub fn show(&self) {
        self.0.queue.borrow().show();
    }

    /// Opcode/target pairs of the pending commands, for inspection.
    pub fn pending_commands(&self) -> Vec<Command> {
        self.0.queue.borrow().commands().to_vec()
    }

    /// Hands the backlog to the namespace interpreter.
    ///
    /// Without an interpreter the backlog is kept and an error returned.
    /// Otherwise the queue is cleared even if interpretation fails.
    pub fn flush(&self) -> Result<()> {
        let parser = self.0.shared.parser()?;
        let mut queue = self.0.queue.borrow_mut();
        if !queue.is_empty() {
            self.0.shared.mark_flushed();
        }
        let mut parser = parser.borrow_mut();
        queue.flush(&mut *parser)
    }

    /// Discards the backlog without executing it.
    pub fn discard_pending(&self) {
        self.0.queue.borrow_mut().clear();
    }

    // ── interpreter queries ──

    /// Realization state of `id` in the namespace table.
    pub fn realization(&self, id: ObjectId) -> Realization {
        match self.0.shared.parser() {
            Ok(parser) => parser.borrow().realization(id),
            Err(_) => Realization::Unrealized,
        }
    }

    /// Flushes, then reads RGBA pixels (rows top to bottom) from the bound
    /// framebuffer. `region` is `[x, y, width, height]`, default viewport.
    pub fn read_pixels(&self, region: Option<[i32; 4]>) -> Result<Pixels> {
        self.flush()?;
        let parser = self.0.shared.parser()?;
        let mut parser = parser.borrow_mut();
        parser.read_pixels(region)
    }

    pub fn active_uniforms(&self, program: ObjectId) -> Result<Vec<ActiveVariable>> {
        self.flush()?;
        let parser = self.0.shared.parser()?;
        let parser = parser.borrow();
        parser.active_uniforms(program)
    }

    pub fn active_attributes(&self, program: ObjectId) -> Result<Vec<ActiveVariable>> {
        self.flush()?;
        let parser = self.0.shared.parser()?;
        let parser = parser.borrow();
        parser.active_attributes(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glir::{HeadlessBackend, LocalParser, ObjectKind};

    fn headless() -> (GlContext, Rc<RefCell<LocalParser<HeadlessBackend>>>) {
        GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(4, 4)))
            .unwrap()
    }

    #[test]
    fn flush_without_parser_keeps_backlog() {
        let ctx = GlContext::new(GlConfig::default());
        ctx.push(Command::Swap);
        assert!(matches!(ctx.flush(), Err(GlooError::Namespace(_))));
        assert_eq!(ctx.pending_len(), 1);
    }

    #[test]
    fn flush_clears_and_bumps_epoch() {
        let (ctx, parser) = headless();
        let id = ObjectId::next();
        ctx.push(Command::Create { id, kind: ObjectKind::Program });
        assert_eq!(ctx.epoch(), 0);
        ctx.flush().unwrap();
        assert_eq!(ctx.pending_len(), 0);
        assert_eq!(ctx.epoch(), 1);
        assert!(parser.borrow().contains(id));
        assert!(ctx.realization(id).is_realized());
    }

    #[test]
    fn failed_flush_still_clears() {
        let (ctx, _parser) = headless();
        ctx.push(Command::Link { id: ObjectId::next() });
        assert!(ctx.flush().is_err());
        assert_eq!(ctx.pending_len(), 0);
    }

    #[test]
    fn create_shared_once_per_context() {
        let (a, _) = headless();
        let b = GlContext::new_shared(GlConfig::default(), &a);
        assert!(a.shares_with(&b));
        a.create_shared("scene", Rc::new(HeadlessSurface::new(4, 4))).unwrap();
        let err = a.create_shared("scene", Rc::new(HeadlessSurface::new(4, 4))).unwrap_err();
        assert!(matches!(err, GlooError::Namespace(_)));
        b.create_shared("scene", Rc::new(HeadlessSurface::new(2, 2))).unwrap();
        assert_eq!(a.shared().surface_count(), 2);
        a.leave_shared().unwrap();
        assert_eq!(b.shared().backend().unwrap().physical_size(), (2, 2));
    }

    #[test]
    fn parser_cannot_change_after_flush() {
        let (ctx, _) = headless();
        ctx.push(Command::Swap);
        ctx.flush().unwrap();
        let other = Rc::new(RefCell::new(LocalParser::new(HeadlessBackend::new(1, 1))));
        assert!(ctx.set_parser(other).is_err());
    }

    #[test]
    fn read_pixels_flushes_first() {
        let (ctx, _) = headless();
        ctx.push(Command::Func(crate::glir::GlCall::ClearColor([0.0, 0.0, 1.0, 1.0])));
        ctx.push(Command::Func(crate::glir::GlCall::Clear(crate::glir::ClearFlags::COLOR)));
        let px = ctx.read_pixels(Some([0, 0, 1, 1])).unwrap();
        assert_eq!(px.pixel(0, 0), Some([0, 0, 255, 255]));
    }
}
