use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::rc::Rc;

use web_time::Duration;

use crate::{
    Dispose, MaybeSignal, Scheduler, Source, TaskHandle, WatchOptions, on_cleanup, watch,
};

struct LoopInner {
    scheduler: Rc<dyn Scheduler>,
    task: RefCell<Box<dyn FnMut()>>,
    delay: MaybeSignal<Option<i64>>,
    timer: Cell<Option<TaskHandle>>,
    stopped: Cell<bool>,
    disposed: Cell<bool>,
}

impl LoopInner {
    fn clear_timer(&self) {
        if let Some(handle) = self.timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn delay(&self) -> Option<u64> {
        self.delay
            .get()
            .and_then(|ms| u64::try_from(ms).ok())
    }

    fn exec(self: &Rc<Self>) {
        self.clear_timer();
        if self.stopped.get() || self.disposed.get() || self.delay().is_none() {
            return;
        }

        // The task changed the delay from inside itself; the outer call
        // reschedules with the fresh value.
        let Ok(mut task) = self.task.try_borrow_mut() else {
            return;
        };
        (&mut **task)();
        drop(task);

        if self.stopped.get() || self.disposed.get() {
            return;
        }
        let Some(ms) = self.delay() else {
            return;
        };
        let inner = self.clone();
        let handle = self.scheduler.set_timeout(
            Duration::from_millis(ms),
            Box::new(move || {
                inner.timer.set(None);
                inner.exec();
            }),
        );
        self.timer.set(Some(handle));
    }
}

/// Handle returned by [`loop_exec`].
#[derive(Clone)]
pub struct LoopExec {
    inner: Rc<LoopInner>,
}

impl LoopExec {
    /// Pauses the loop; a later [`start`](Self::start) resumes it.
    pub fn stop(&self) {
        self.inner.stopped.set(true);
        self.inner.clear_timer();
    }

    /// Resumes a stopped loop, executing immediately. No-op after disposal.
    pub fn start(&self) {
        if self.inner.disposed.get() {
            return;
        }
        self.inner.stopped.set(false);
        self.inner.exec();
    }

    /// Stops the loop for good.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.timer.get().is_some()
    }
}

/// Repeatedly runs `task`, waiting `delay` milliseconds between runs.
///
/// The first run happens immediately. `None` or a negative delay suspends
/// the loop without error; every change of a reactive delay re-runs the task
/// right away and reschedules with the new value. A task error is logged and
/// does not stop the loop. Disposing the current scope ends the loop.
pub fn loop_exec<E, F>(
    scheduler: Rc<dyn Scheduler>,
    mut task: F,
    delay: impl Into<MaybeSignal<Option<i64>>>,
) -> LoopExec
where
    E: Display,
    F: FnMut() -> Result<(), E> + 'static,
{
    let inner = Rc::new(LoopInner {
        scheduler,
        task: RefCell::new(Box::new(move || {
            if let Err(err) = task() {
                log::warn!("loop_exec: task failed, continuing: {err}");
            }
        })),
        delay: delay.into(),
        timer: Cell::new(None),
        stopped: Cell::new(false),
        disposed: Cell::new(false),
    });

    let stop_watch = watch(
        inner.delay.clone(),
        {
            let inner = inner.clone();
            move |_, _| inner.exec()
        },
        WatchOptions::default(),
    );

    let handle = LoopExec { inner };
    on_cleanup({
        let handle = handle.clone();
        move || {
            handle.dispose();
            stop_watch.run();
        }
    });
    handle
}

struct Pending<A> {
    scheduler: Rc<dyn Scheduler>,
    callback: Rc<dyn Fn(A)>,
    delay: MaybeSignal<Duration>,
    timer: Cell<Option<TaskHandle>>,
}

impl<A: 'static> Pending<A> {
    fn new(
        scheduler: Rc<dyn Scheduler>,
        callback: impl Fn(A) + 'static,
        delay: MaybeSignal<Duration>,
    ) -> Rc<Self> {
        let pending = Rc::new(Self {
            scheduler,
            callback: Rc::new(callback),
            delay,
            timer: Cell::new(None),
        });
        on_cleanup({
            let pending = Rc::downgrade(&pending);
            move || {
                if let Some(p) = pending.upgrade() {
                    p.cancel();
                }
            }
        });
        pending
    }

    fn schedule(self: &Rc<Self>, args: A) {
        let weak = Rc::downgrade(self);
        let handle = self.scheduler.set_timeout(
            self.delay.get(),
            Box::new(move || {
                if let Some(p) = weak.upgrade() {
                    p.timer.set(None);
                    (p.callback)(args);
                }
            }),
        );
        self.timer.set(Some(handle));
    }

    fn cancel(&self) {
        if let Some(handle) = self.timer.take() {
            self.scheduler.cancel(handle);
        }
    }
}

/// A debounced callback: see [`debounce`].
pub struct Debounced<A>(Rc<Pending<A>>);

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: 'static> Debounced<A> {
    /// Restarts the wait; only the last call's arguments are delivered.
    pub fn call(&self, args: A) {
        self.0.cancel();
        self.0.schedule(args);
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.0.timer.get().is_some()
    }
}

/// Delays `callback` until `delay` has passed without another call.
/// A pending call is dropped when the current scope is disposed.
pub fn debounce<A: 'static>(
    scheduler: Rc<dyn Scheduler>,
    callback: impl Fn(A) + 'static,
    delay: impl Into<MaybeSignal<Duration>>,
) -> Debounced<A> {
    Debounced(Pending::new(scheduler, callback, delay.into()))
}

/// A throttled callback: see [`throttle`].
pub struct Throttled<A>(Rc<Pending<A>>);

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: 'static> Throttled<A> {
    /// Ignored while a call is already waiting.
    pub fn call(&self, args: A) {
        if self.0.timer.get().is_some() {
            return;
        }
        self.0.schedule(args);
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.0.timer.get().is_some()
    }
}

/// Runs `callback` at most once per `delay`, with the arguments of the call
/// that opened the window.
pub fn throttle<A: 'static>(
    scheduler: Rc<dyn Scheduler>,
    callback: impl Fn(A) + 'static,
    delay: impl Into<MaybeSignal<Duration>>,
) -> Throttled<A> {
    Throttled(Pending::new(scheduler, callback, delay.into()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebouncedWatchOptions {
    pub defer: bool,
    pub delay: Duration,
}

impl Default for DebouncedWatchOptions {
    fn default() -> Self {
        Self {
            defer: false,
            delay: Duration::from_millis(10),
        }
    }
}

impl DebouncedWatchOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer = true;
        self
    }
}

/// A [`watch`] whose callback is debounced.
pub fn debounced_watch<S: Source>(
    scheduler: Rc<dyn Scheduler>,
    source: S,
    on_change: impl Fn(&S::Value, Option<&S::Value>) + 'static,
    options: DebouncedWatchOptions,
) -> Dispose {
    let debounced = debounce(
        scheduler,
        move |(current, previous): (S::Value, Option<S::Value>)| {
            on_change(&current, previous.as_ref())
        },
        options.delay,
    );
    let cancel = debounced.clone();
    let stop = watch(
        source,
        move |current, previous| debounced.call((current.clone(), previous.cloned())),
        WatchOptions {
            defer: options.defer,
        },
    );
    Dispose::new(move || {
        stop.run();
        cancel.cancel();
    })
}
