use std::num::NonZeroU32;

use glint_glsl::{GlslType, ShaderDialect};

use super::command::{Command, ObjectId};
use crate::error::Result;

/// Native identifier of a realized GL object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[inline]
    pub fn from_non_zero(raw: NonZeroU32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn non_zero(self) -> NonZeroU32 {
        self.0
    }
}

/// Whether an object has a native handle yet.
///
/// Only the interpreter's table can move an object from `Unrealized` to
/// `Realized`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Realization {
    #[default]
    Unrealized,
    Realized(Handle),
}

impl Realization {
    pub fn handle(self) -> Option<Handle> {
        match self {
            Self::Realized(h) => Some(h),
            Self::Unrealized => None,
        }
    }

    pub fn is_realized(self) -> bool {
        matches!(self, Self::Realized(_))
    }
}

/// A uniform or attribute reported active by a linked program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveVariable {
    pub name: String,
    pub ty: GlslType,
}

/// RGBA8 pixels read back from a framebuffer, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixels {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Pixels {
    /// RGBA value at `(x, y)` with `y` counted from the top.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        let p = self.data.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// An interpreter for flushed command lists.
///
/// Local interpreters execute against a graphics backend and own the
/// `ObjectId → handle` table. Remote interpreters forward commands and never
/// allocate handles.
pub trait GlirParser {
    fn is_remote(&self) -> bool;

    /// Dialect shader sources should be converted to before `parse`.
    /// `None` leaves sources unchanged.
    fn shader_dialect(&self) -> Option<ShaderDialect> {
        None
    }

    /// Executes (or forwards) `commands` in order.
    fn parse(&mut self, commands: Vec<Command>) -> Result<()>;

    /// Realization state of `id` in the interpreter's table.
    fn realization(&self, id: ObjectId) -> Realization;

    /// Reads RGBA pixels from the bound framebuffer. `region` is
    /// `[x, y, width, height]`; `None` reads the current viewport.
    fn read_pixels(&mut self, region: Option<[i32; 4]>) -> Result<Pixels>;

    fn active_uniforms(&self, program: ObjectId) -> Result<Vec<ActiveVariable>>;

    fn active_attributes(&self, program: ObjectId) -> Result<Vec<ActiveVariable>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert_eq!(Handle::new(0), None);
        assert_eq!(Handle::new(7).map(Handle::get), Some(7));
    }

    #[test]
    fn realization_handle() {
        let h = Handle::new(3).unwrap();
        assert_eq!(Realization::Realized(h).handle(), Some(h));
        assert!(!Realization::Unrealized.is_realized());
    }

    #[test]
    fn pixel_lookup() {
        let px = Pixels { width: 2, height: 1, data: vec![1, 2, 3, 4, 5, 6, 7, 8] };
        assert_eq!(px.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(px.pixel(2, 0), None);
    }
}
