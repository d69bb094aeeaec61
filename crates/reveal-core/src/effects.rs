use std::cell::RefCell;
use std::rc::Rc;

/// At-most-once cleanup guard.
///
/// Every registration in this crate (watchers, timers, listeners, observers)
/// hands one of these back. Clones share the same slot, so running any clone
/// runs the cleanup exactly once.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// A guard with nothing to release.
    pub fn noop() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    /// Runs at most once (safe to call multiple times).
    pub fn run(&self) {
        let f = self.0.borrow_mut().take();
        if let Some(f) = f {
            f()
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.borrow().is_none()
    }

    /// Folds several guards into one.
    pub fn all(guards: impl IntoIterator<Item = Dispose>) -> Self {
        let guards: Vec<Dispose> = guards.into_iter().collect();
        Self::new(move || {
            for g in guards {
                g.run();
            }
        })
    }
}

impl std::fmt::Debug for Dispose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispose")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Ties `dispose` to the current scope, if one exists, and hands it back.
pub fn scoped(dispose: Dispose) -> Dispose {
    if let Some(scope) = crate::scope::current_scope() {
        let d2 = dispose.clone();
        scope.add_disposer(move || d2.run());
    }
    dispose
}

/// Runs `f()` immediately and returns its `Dispose`, registered with the
/// current scope.
pub fn effect<F>(f: F) -> Dispose
where
    F: FnOnce() -> Dispose + 'static,
{
    scoped(f())
}

/// Registers `f` to run when the current scope is disposed. Without a scope
/// the closure is dropped unrun.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    if let Some(scope) = crate::scope::current_scope() {
        scope.add_disposer(f);
    }
}
