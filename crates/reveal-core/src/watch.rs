//! Explicit dependency watching.
//!
//! A watcher names its dependencies up front through a [`Source`] (a signal,
//! a [`MaybeSignal`], a tuple or a `Vec` of those) and receives the new and
//! previous value whenever any of them changes:
//!
//! ```rust
//! use reveal_core::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let a = signal(1);
//! let b = signal("x".to_string());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let stop = watch(
//!     (a.clone(), b.clone()),
//!     {
//!         let seen = seen.clone();
//!         move |(n, s), _prev| seen.borrow_mut().push(format!("{n}{s}"))
//!     },
//!     WatchOptions::default(),
//! );
//!
//! a.set(2);
//! stop.run();
//! b.set("y".into());
//! assert_eq!(*seen.borrow(), vec!["1x", "2x"]);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::{Dispose, MaybeSignal, Signal, scoped};

/// Something a watcher can read and subscribe to.
pub trait Source: 'static {
    type Value: Clone + PartialEq + 'static;

    fn current(&self) -> Self::Value;

    /// Calls `notify` whenever a dependency changes until the returned guard runs.
    fn track(&self, notify: Rc<dyn Fn()>) -> Dispose;
}

impl<T: Clone + PartialEq + 'static> Source for Signal<T> {
    type Value = T;

    fn current(&self) -> T {
        self.get()
    }

    fn track(&self, notify: Rc<dyn Fn()>) -> Dispose {
        let id = self.subscribe(move |_| notify());
        let signal = self.clone();
        Dispose::new(move || {
            signal.unsubscribe(id);
        })
    }
}

impl<T: Clone + PartialEq + 'static> Source for MaybeSignal<T> {
    type Value = T;

    fn current(&self) -> T {
        self.get()
    }

    fn track(&self, notify: Rc<dyn Fn()>) -> Dispose {
        match self {
            MaybeSignal::Static(_) => Dispose::noop(),
            MaybeSignal::Dynamic(s) => s.track(notify),
        }
    }
}

impl<S: Source> Source for Vec<S> {
    type Value = Vec<S::Value>;

    fn current(&self) -> Self::Value {
        self.iter().map(Source::current).collect()
    }

    fn track(&self, notify: Rc<dyn Fn()>) -> Dispose {
        Dispose::all(self.iter().map(|s| s.track(notify.clone())))
    }
}

macro_rules! tuple_source {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Source),+> Source for ($($name,)+) {
            type Value = ($($name::Value,)+);

            fn current(&self) -> Self::Value {
                ($(self.$idx.current(),)+)
            }

            fn track(&self, notify: Rc<dyn Fn()>) -> Dispose {
                let guards: SmallVec<[Dispose; 4]> =
                    smallvec::smallvec![$(self.$idx.track(notify.clone())),+];
                Dispose::all(guards)
            }
        }
    };
}

tuple_source!(A: 0, B: 1);
tuple_source!(A: 0, B: 1, C: 2);
tuple_source!(A: 0, B: 1, C: 2, D: 3);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Skip the initial run; only react to later changes.
    pub defer: bool,
}

impl WatchOptions {
    pub fn deferred() -> Self {
        Self { defer: true }
    }
}

type OnChange<V> = Box<dyn FnMut(&V, Option<&V>)>;

struct Watcher<S: Source> {
    source: S,
    prev: RefCell<Option<S::Value>>,
    on_change: RefCell<OnChange<S::Value>>,
    running: Cell<bool>,
    dirty: Cell<bool>,
    alive: Cell<bool>,
}

impl<S: Source> Watcher<S> {
    fn run(&self) {
        if !self.alive.get() {
            return;
        }
        // Re-entrant trigger: let the outer run pick up the new value.
        if self.running.replace(true) {
            self.dirty.set(true);
            return;
        }
        loop {
            self.dirty.set(false);
            let next = self.source.current();
            let prev = self.prev.borrow_mut().replace(next.clone());
            if prev.as_ref() != Some(&next) {
                let mut on_change = self.on_change.borrow_mut();
                (&mut **on_change)(&next, prev.as_ref());
            }
            if !self.dirty.get() || !self.alive.get() {
                break;
            }
        }
        self.running.set(false);
    }
}

/// Like [`watch`], but not tied to the current scope: the caller owns the
/// returned guard.
pub fn watch_unscoped<S: Source>(
    source: S,
    on_change: impl FnMut(&S::Value, Option<&S::Value>) + 'static,
    options: WatchOptions,
) -> Dispose {
    let watcher = Rc::new(Watcher {
        source,
        prev: RefCell::new(None),
        on_change: RefCell::new(Box::new(on_change)),
        running: Cell::new(false),
        dirty: Cell::new(false),
        alive: Cell::new(true),
    });

    if options.defer {
        *watcher.prev.borrow_mut() = Some(watcher.source.current());
    }

    let detach = watcher.source.track(Rc::new({
        let watcher = watcher.clone();
        move || watcher.run()
    }));

    if !options.defer {
        watcher.run();
    }

    Dispose::new(move || {
        watcher.alive.set(false);
        detach.run();
    })
}

/// Calls `on_change(current, previous)` whenever `source` yields a new value.
///
/// Runs once immediately (with `previous == None`) unless
/// [`WatchOptions::defer`] is set. Values equal to the previous one are
/// skipped. The watcher is released with the current scope.
pub fn watch<S: Source>(
    source: S,
    on_change: impl FnMut(&S::Value, Option<&S::Value>) + 'static,
    options: WatchOptions,
) -> Dispose {
    scoped(watch_unscoped(source, on_change, options))
}

/// [`watch`] whose callback also receives what its previous run returned
/// (`None` on the first run), so state can be carried between runs.
pub fn watch_fold<S: Source, R: 'static>(
    source: S,
    mut on_change: impl FnMut(&S::Value, Option<&S::Value>, Option<R>) -> R + 'static,
    options: WatchOptions,
) -> Dispose {
    let mut last: Option<R> = None;
    watch(
        source,
        move |current, previous| last = Some(on_change(current, previous, last.take())),
        options,
    )
}
