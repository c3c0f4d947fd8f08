use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{GlooError, Result};
use crate::glir::GlirParser;

/// A drawing surface taking part in a shared namespace.
///
/// Implemented by windowing backends; the namespace only needs to tell
/// surfaces apart and report on them.
pub trait SurfaceBackend {
    fn backend_name(&self) -> &str;

    /// Size of the drawable in physical pixels.
    fn physical_size(&self) -> (u32, u32);
}

/// Surface with no window behind it, for offscreen and test use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessSurface {
    pub width:  u32,
    pub height: u32,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl SurfaceBackend for HeadlessSurface {
    fn backend_name(&self) -> &str {
        "headless"
    }

    fn physical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Token returned by [`SharedNamespace::join`]; hand it back to `leave`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Registration(u64);

/// Surfaces sharing one interpreter and its object table.
///
/// The namespace name is fixed by the first surface that joins. The
/// interpreter may be replaced only until the first command reaches it.
pub struct SharedNamespace {
    name:     RefCell<Option<String>>,
    parser:   RefCell<Option<Rc<RefCell<dyn GlirParser>>>>,
    flushed:  Cell<bool>,
    surfaces: RefCell<Vec<(Registration, Rc<dyn SurfaceBackend>)>>,
    next_reg: Cell<u64>,
}

impl Default for SharedNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedNamespace {
    pub fn new() -> Self {
        Self {
            name:     RefCell::new(None),
            parser:   RefCell::new(None),
            flushed:  Cell::new(false),
            surfaces: RefCell::new(Vec::new()),
            next_reg: Cell::new(1),
        }
    }

    /// Namespace name, once a surface has joined.
    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    /// Registers `backend` under namespace `name`.
    pub fn join(&self, name: &str, backend: Rc<dyn SurfaceBackend>) -> Result<Registration> {
        {
            let mut current = self.name.borrow_mut();
            match current.as_deref() {
                Some(existing) if existing != name => {
                    return Err(GlooError::Namespace(format!(
                        "namespace is '{existing}', cannot join as '{name}'"
                    )));
                }
                Some(_) => {}
                None => *current = Some(name.to_string()),
            }
        }
        let reg = Registration(self.next_reg.get());
        self.next_reg.set(reg.0 + 1);
        log::debug!("surface '{}' joined namespace '{name}'", backend.backend_name());
        self.surfaces.borrow_mut().push((reg, backend));
        Ok(reg)
    }

    /// Unregisters a surface. Unknown registrations are an error.
    pub fn leave(&self, registration: Registration) -> Result<()> {
        let mut surfaces = self.surfaces.borrow_mut();
        let pos = surfaces
            .iter()
            .position(|(r, _)| *r == registration)
            .ok_or_else(|| GlooError::Namespace(format!("{registration:?} is not registered")))?;
        let (_, backend) = surfaces.remove(pos);
        log::debug!("surface '{}' left the namespace", backend.backend_name());
        Ok(())
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.borrow().len()
    }

    /// First registered surface still present.
    pub fn backend(&self) -> Result<Rc<dyn SurfaceBackend>> {
        self.surfaces
            .borrow()
            .first()
            .map(|(_, b)| Rc::clone(b))
            .ok_or_else(|| GlooError::Namespace("no surface backend is registered".into()))
    }

    /// Installs the interpreter. Refused once commands have been flushed,
    /// so one table never mixes local and remote objects.
    pub fn set_parser(&self, parser: Rc<RefCell<dyn GlirParser>>) -> Result<()> {
        if self.flushed.get() {
            return Err(GlooError::Namespace(
                "cannot replace the interpreter after commands were flushed".into(),
            ));
        }
        log::debug!(
            "namespace interpreter set ({})",
            if parser.borrow().is_remote() { "remote" } else { "local" }
        );
        *self.parser.borrow_mut() = Some(parser);
        Ok(())
    }

    pub fn parser(&self) -> Result<Rc<RefCell<dyn GlirParser>>> {
        self.parser
            .borrow()
            .clone()
            .ok_or_else(|| GlooError::Namespace("no interpreter is installed".into()))
    }

    pub fn has_parser(&self) -> bool {
        self.parser.borrow().is_some()
    }

    pub fn is_remote(&self) -> bool {
        self.parser.borrow().as_ref().is_some_and(|p| p.borrow().is_remote())
    }

    pub(crate) fn mark_flushed(&self) {
        self.flushed.set(true);
    }

    pub fn has_flushed(&self) -> bool {
        self.flushed.get()
    }
}
