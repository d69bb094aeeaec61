//! Timer and animation-frame capability.
//!
//! Nothing in this workspace reaches for a global event loop. Code that needs
//! to wait is handed an `Rc<dyn Scheduler>`; the browser host implements it on
//! top of `setTimeout`/`requestAnimationFrame`, tests and headless hosts use
//! [`ManualScheduler`] and drive virtual time by hand.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use web_time::Duration;

use crate::Dispose;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskHandle {
    Timeout(u64),
    Frame(u64),
}

pub trait Scheduler: 'static {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle;

    fn request_animation_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle;

    /// Cancelling a handle that already ran is a no-op.
    fn cancel(&self, handle: TaskHandle);
}

/// Schedules `f` after `delay`; running the guard cancels it.
pub fn timeout(
    scheduler: Rc<dyn Scheduler>,
    delay: Duration,
    f: impl FnOnce() + 'static,
) -> Dispose {
    let handle = scheduler.set_timeout(delay, Box::new(f));
    Dispose::new(move || scheduler.cancel(handle))
}

/// Schedules `f` for the next animation frame; running the guard cancels it.
pub fn next_frame(scheduler: Rc<dyn Scheduler>, f: impl FnOnce() + 'static) -> Dispose {
    let handle = scheduler.request_animation_frame(Box::new(f));
    Dispose::new(move || scheduler.cancel(handle))
}

struct Timer {
    id: u64,
    due: Duration,
    // Zero-delay timers queued while timers are firing wait for the next `advance`.
    held: bool,
    task: Box<dyn FnOnce()>,
}

/// A deterministic scheduler with a virtual clock.
///
/// Timers fire in due order (ties in creation order) during [`advance`];
/// frame callbacks fire during [`run_frame`]. Callbacks queued while frames
/// run wait for the following frame.
///
/// [`advance`]: ManualScheduler::advance
/// [`run_frame`]: ManualScheduler::run_frame
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    firing: Cell<bool>,
    timers: RefCell<Vec<Timer>>,
    frames: RefCell<Vec<(u64, Box<dyn FnOnce()>)>>,
    frame_count: Cell<u64>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.get()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Moves the clock forward, firing every timer that falls due on the way.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        for t in self.timers.borrow_mut().iter_mut() {
            t.held = false;
        }

        let was_firing = self.firing.replace(true);
        while let Some(timer) = self.take_due(target) {
            self.now.set(self.now.get().max(timer.due));
            (timer.task)();
        }
        self.firing.set(was_firing);
        self.now.set(target);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Runs the callbacks queued before this call. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let frames = std::mem::take(&mut *self.frames.borrow_mut());
        self.frame_count.set(self.frame_count.get() + 1);
        let n = frames.len();
        for (_, task) in frames {
            task();
        }
        n
    }

    fn take_due(&self, target: Duration) -> Option<Timer> {
        let mut timers = self.timers.borrow_mut();
        let idx = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target && !t.held)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(timers.remove(idx))
    }

    fn id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let id = self.id();
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.now.get() + delay,
            held: self.firing.get() && delay.is_zero(),
            task,
        });
        TaskHandle::Timeout(id)
    }

    fn request_animation_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        let id = self.id();
        self.frames.borrow_mut().push((id, task));
        TaskHandle::Frame(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        match handle {
            TaskHandle::Timeout(id) => self.timers.borrow_mut().retain(|t| t.id != id),
            TaskHandle::Frame(id) => self.frames.borrow_mut().retain(|(fid, _)| *fid != id),
        }
    }
}
