//! The thread's "current" context: a stack with scoped acquisition.

use std::cell::RefCell;

use super::GlContext;
use crate::glir::Command;

thread_local! {
    static CURRENT: RefCell<Vec<GlContext>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a context current until dropped, then restores the previous one.
///
/// Guards must be dropped in reverse order of creation; dropping an outer
/// guard first also releases every inner one.
#[must_use = "the context stops being current when the guard is dropped"]
pub struct CurrentGuard {
    depth: usize,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

impl GlContext {
    /// Makes this context current on the calling thread and queues a
    /// CURRENT command.
    pub fn make_current(&self) -> CurrentGuard {
        let depth = CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len() - 1
        });
        self.push(Command::Current);
        CurrentGuard { depth }
    }

    /// The innermost current context on this thread.
    pub fn current() -> Option<GlContext> {
        CURRENT.with(|stack| stack.borrow().last().cloned())
    }

    /// True if this context is the innermost current one.
    pub fn is_current(&self) -> bool {
        Self::current().is_some_and(|c| c.ptr_eq(self))
    }
}
