//! Presence: keep an element mounted while it animates out.
//!
//! A single state machine drives both flavours. What "the current phase is
//! done" means is delegated to a [`Completion`]:
//!
//! - [`MotionCompletion`] waits for the element's CSS motion to end
//!   ([`create_presence`]);
//! - [`TimedCompletion`] waits fixed enter/exit durations ([`make_presence`],
//!   [`create_item_presence`]).
//!
//! ```text
//!  Idle ──show──▶ PreEnter ──frame──▶ Entering ──done──▶ Entered
//!   ▲               │ hide             │ hide ▲            │ hide
//!   │               ▼                  ▼      │ show       ▼
//!   └──────────── Exited ◀──done──── Exiting ◀───────────────┘
//! ```
//!
//! Phase changes are applied one at a time: a completion or intent change
//! raised while a transition is being applied waits in a queue until the
//! transition has finished.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use reveal_core::{
    Dispose, MaybeSignal, Scheduler, Signal, WatchOptions, on_cleanup, signal, timeout, watch,
    watch_unscoped,
};
use web_time::Duration;

use crate::motion::{self, MotionEndOptions};
use crate::Dom;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PresencePhase {
    /// Not mounted.
    #[default]
    Idle,
    /// Mounted but not yet visible; waits one animation frame.
    PreEnter,
    Entering,
    Entered,
    Exiting,
    /// Exit finished. Collapses to `Idle` immediately.
    Exited,
}

impl PresencePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PreEnter => "pre-enter",
            Self::Entering => "entering",
            Self::Entered => "entered",
            Self::Exiting => "exiting",
            Self::Exited => "exited",
        }
    }

    /// The four-state naming: `closed`, `opening`, `opened`, `closing`.
    pub fn legacy_name(self) -> &'static str {
        match self {
            Self::Idle | Self::Exited => "closed",
            Self::PreEnter | Self::Entering => "opening",
            Self::Entered => "opened",
            Self::Exiting => "closing",
        }
    }
}

impl fmt::Display for PresencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which contract the derived accessors follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceKind {
    /// Driven by CSS motion on an element.
    Motion,
    /// Driven by fixed durations.
    Timed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Enter,
    Exit,
}

/// Decides when `Entering` or `Exiting` is over.
pub trait Completion {
    /// Arranges for `done` to run once `stage` has finished (possibly
    /// synchronously). Running the returned guard cancels the wait.
    fn begin(&self, stage: Stage, done: Box<dyn FnOnce()>) -> Dispose;
}

/// Waits for CSS motion on the element; holds while the element is absent.
pub struct MotionCompletion<D: Dom> {
    dom: Rc<D>,
    element: MaybeSignal<Option<D::Node>>,
    options: MotionEndOptions,
}

impl<D: Dom> MotionCompletion<D> {
    pub fn new(
        dom: Rc<D>,
        element: impl Into<MaybeSignal<Option<D::Node>>>,
        options: MotionEndOptions,
    ) -> Self {
        Self {
            dom,
            element: element.into(),
            options,
        }
    }
}

impl<D: Dom> Completion for MotionCompletion<D> {
    fn begin(&self, stage: Stage, done: Box<dyn FnOnce()>) -> Dispose {
        let done = Rc::new(RefCell::new(Some(done)));
        let current = Rc::new(RefCell::new(Dispose::noop()));

        let stop = watch_unscoped(
            self.element.clone(),
            {
                let dom = self.dom.clone();
                let current = current.clone();
                let options = self.options;
                move |node, _| {
                    current.borrow().run();
                    let Some(node) = node else {
                        log::debug!("presence: {stage:?} waiting for an element");
                        return;
                    };
                    let done = done.clone();
                    let guard = motion::install(
                        &dom,
                        node,
                        move |end| {
                            log::trace!("presence: {stage:?} finished ({end})");
                            let done = done.borrow_mut().take();
                            if let Some(done) = done {
                                done();
                            }
                        },
                        options,
                    );
                    *current.borrow_mut() = guard;
                }
            },
            WatchOptions::default(),
        );

        Dispose::new(move || {
            stop.run();
            current.borrow().run();
        })
    }
}

/// Waits `enter` / `exit` on the scheduler. A zero duration finishes
/// synchronously. Durations are read when the stage begins.
pub struct TimedCompletion {
    scheduler: Rc<dyn Scheduler>,
    enter: MaybeSignal<Duration>,
    exit: MaybeSignal<Duration>,
}

impl TimedCompletion {
    pub fn new(
        scheduler: Rc<dyn Scheduler>,
        enter: impl Into<MaybeSignal<Duration>>,
        exit: impl Into<MaybeSignal<Duration>>,
    ) -> Self {
        Self {
            scheduler,
            enter: enter.into(),
            exit: exit.into(),
        }
    }
}

impl Completion for TimedCompletion {
    fn begin(&self, stage: Stage, done: Box<dyn FnOnce()>) -> Dispose {
        let duration = match stage {
            Stage::Enter => self.enter.get(),
            Stage::Exit => self.exit.get(),
        };
        if duration.is_zero() {
            done();
            return Dispose::noop();
        }
        timeout(self.scheduler.clone(), duration, done)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineOptions {
    pub kind: PresenceKind,
    /// Start in `PreEnter` instead of `Entered` when initially shown.
    pub initial_enter: bool,
    /// Pass through `PreEnter` (one frame) before `Entering` on show.
    pub enter_on_next_frame: bool,
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Show(bool),
    Frame { epoch: u64 },
    Done { epoch: u64 },
}

struct PresenceMachine {
    kind: PresenceKind,
    enter_on_next_frame: bool,
    scheduler: Rc<dyn Scheduler>,
    completion: Box<dyn Completion>,
    phase: Signal<PresencePhase>,
    show: Cell<bool>,
    epoch: Cell<u64>,
    pending: RefCell<Dispose>,
    queue: RefCell<VecDeque<Trigger>>,
    applying: Cell<bool>,
    disposed: Cell<bool>,
    stop_watch: RefCell<Dispose>,
}

impl PresenceMachine {
    fn dispatch(self: &Rc<Self>, trigger: Trigger) {
        if self.disposed.get() {
            return;
        }
        self.queue.borrow_mut().push_back(trigger);
        if self.applying.replace(true) {
            return;
        }
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(trigger) = next else { break };
            if self.disposed.get() {
                self.queue.borrow_mut().clear();
                break;
            }
            self.step(trigger);
        }
        self.applying.set(false);
    }

    fn step(self: &Rc<Self>, trigger: Trigger) {
        use PresencePhase::*;

        let phase = self.phase.get();
        let current = self.epoch.get();
        let next = match trigger {
            Trigger::Show(show) => {
                self.show.set(show);
                match (phase, show) {
                    (Idle | Exited, true) if self.enter_on_next_frame => Some(PreEnter),
                    (Idle | Exited, true) => Some(Entering),
                    (PreEnter, false) => Some(Exited),
                    (Entering | Entered, false) => Some(Exiting),
                    (Exiting, true) => Some(Entering),
                    _ => None,
                }
            }
            Trigger::Frame { epoch } if epoch == current && phase == PreEnter => Some(Entering),
            Trigger::Done { epoch } if epoch == current => match phase {
                Entering => Some(Entered),
                Exiting => Some(Exited),
                _ => None,
            },
            _ => None,
        };

        if let Some(next) = next {
            self.enter(next);
        }
    }

    fn enter(self: &Rc<Self>, next: PresencePhase) {
        let previous = self.pending.replace(Dispose::noop());
        previous.run();

        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);
        log::trace!("presence: {} -> {next}", self.phase.get());
        self.phase.set(next);
        if self.disposed.get() {
            return;
        }

        let weak = Rc::downgrade(self);
        let guard = match next {
            PresencePhase::PreEnter => {
                let handle = self.scheduler.request_animation_frame(Box::new(move || {
                    if let Some(machine) = weak.upgrade() {
                        machine.dispatch(Trigger::Frame { epoch });
                    }
                }));
                let scheduler = self.scheduler.clone();
                Dispose::new(move || scheduler.cancel(handle))
            }
            PresencePhase::Entering | PresencePhase::Exiting => {
                let stage = if next == PresencePhase::Entering {
                    Stage::Enter
                } else {
                    Stage::Exit
                };
                self.completion.begin(stage, done_callback(weak, epoch))
            }
            PresencePhase::Exited => {
                self.enter(PresencePhase::Idle);
                return;
            }
            PresencePhase::Idle | PresencePhase::Entered => return,
        };
        *self.pending.borrow_mut() = guard;
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.queue.borrow_mut().clear();
        let pending = self.pending.replace(Dispose::noop());
        pending.run();
        let stop = self.stop_watch.replace(Dispose::noop());
        stop.run();
        log::debug!("presence: disposed in {}", self.phase.get());
    }
}

fn done_callback(weak: Weak<PresenceMachine>, epoch: u64) -> Box<dyn FnOnce()> {
    Box::new(move || {
        if let Some(machine) = weak.upgrade() {
            machine.dispatch(Trigger::Done { epoch });
        }
    })
}

/// Handle to a presence state machine.
///
/// Cloning shares the machine. It is disposed with the scope it was created
/// in, or explicitly with [`Presence::dispose`].
#[derive(Clone)]
pub struct Presence {
    machine: Rc<PresenceMachine>,
}

impl Presence {
    /// Builds a machine over any [`Completion`] strategy.
    pub fn new(
        scheduler: Rc<dyn Scheduler>,
        show: impl Into<MaybeSignal<bool>>,
        completion: Box<dyn Completion>,
        options: MachineOptions,
    ) -> Self {
        let show = show.into();
        let initially = show.get();
        let machine = Rc::new(PresenceMachine {
            kind: options.kind,
            enter_on_next_frame: options.enter_on_next_frame,
            scheduler,
            completion,
            phase: signal(PresencePhase::Idle),
            show: Cell::new(initially),
            epoch: Cell::new(0),
            pending: RefCell::new(Dispose::noop()),
            queue: RefCell::new(VecDeque::new()),
            applying: Cell::new(false),
            disposed: Cell::new(false),
            stop_watch: RefCell::new(Dispose::noop()),
        });

        if initially {
            let initial = if options.initial_enter {
                PresencePhase::PreEnter
            } else {
                PresencePhase::Entered
            };
            machine.applying.set(true);
            machine.enter(initial);
            machine.applying.set(false);
        }

        let stop = watch_unscoped(
            show,
            {
                let machine = machine.clone();
                move |show, _| machine.dispatch(Trigger::Show(*show))
            },
            WatchOptions::deferred(),
        );
        *machine.stop_watch.borrow_mut() = stop;

        let presence = Self { machine };
        on_cleanup({
            let presence = presence.clone();
            move || presence.dispose()
        });
        presence
    }

    pub fn kind(&self) -> PresenceKind {
        self.machine.kind
    }

    pub fn phase(&self) -> PresencePhase {
        self.machine.phase.get()
    }

    /// Subscribe to this to react to every phase, including `Exited`.
    pub fn phase_signal(&self) -> Signal<PresencePhase> {
        self.machine.phase.clone()
    }

    /// Whether the element should be in the tree.
    pub fn is_mounted(&self) -> bool {
        self.phase() != PresencePhase::Idle
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.phase(), PresencePhase::Entering | PresencePhase::Entered)
    }

    /// For [`PresenceKind::Timed`] this includes the frame before the element
    /// becomes visible.
    pub fn is_entering(&self) -> bool {
        match self.machine.kind {
            PresenceKind::Motion => self.phase() == PresencePhase::Entering,
            PresenceKind::Timed => {
                self.machine.show.get()
                    && matches!(self.phase(), PresencePhase::PreEnter | PresencePhase::Entering)
            }
        }
    }

    pub fn is_exiting(&self) -> bool {
        self.phase() == PresencePhase::Exiting
    }

    pub fn is_animating(&self) -> bool {
        self.is_entering() || self.is_exiting()
    }

    pub fn is_disposed(&self) -> bool {
        self.machine.disposed.get()
    }

    /// Cancels any pending frame, timer or motion listener. The phase is
    /// frozen afterwards.
    pub fn dispose(&self) {
        self.machine.dispose();
    }
}

impl fmt::Debug for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presence")
            .field("kind", &self.machine.kind)
            .field("phase", &self.phase())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresenceOptions {
    pub initial_enter: bool,
    pub enter_on_next_frame: bool,
    pub motion: MotionEndOptions,
}

impl PresenceOptions {
    pub fn with_initial_enter(mut self, initial_enter: bool) -> Self {
        self.initial_enter = initial_enter;
        self
    }

    pub fn with_enter_on_next_frame(mut self, enter_on_next_frame: bool) -> Self {
        self.enter_on_next_frame = enter_on_next_frame;
        self
    }

    pub fn with_motion(mut self, motion: MotionEndOptions) -> Self {
        self.motion = motion;
        self
    }
}

/// Presence driven by CSS motion on `element`.
///
/// Showing moves to `Entering` and waits for the element's animation or
/// transitions to end; without any motion it lands in `Entered` before this
/// returns. Hiding does the same through `Exiting`.
pub fn create_presence<D: Dom>(
    dom: &Rc<D>,
    show: impl Into<MaybeSignal<bool>>,
    element: impl Into<MaybeSignal<Option<D::Node>>>,
    options: PresenceOptions,
) -> Presence {
    let completion = MotionCompletion::new(dom.clone(), element, options.motion);
    Presence::new(
        dom.clone(),
        show,
        Box::new(completion),
        MachineOptions {
            kind: PresenceKind::Motion,
            initial_enter: options.initial_enter,
            enter_on_next_frame: options.enter_on_next_frame,
        },
    )
}

#[derive(Clone, Debug, Default)]
pub struct TimedPresenceOptions {
    pub enter_duration: MaybeSignal<Duration>,
    pub exit_duration: MaybeSignal<Duration>,
    pub initial_enter: bool,
}

impl TimedPresenceOptions {
    pub fn new(
        enter_duration: impl Into<MaybeSignal<Duration>>,
        exit_duration: impl Into<MaybeSignal<Duration>>,
    ) -> Self {
        Self {
            enter_duration: enter_duration.into(),
            exit_duration: exit_duration.into(),
            initial_enter: false,
        }
    }

    /// Same duration both ways.
    pub fn symmetric(duration: Duration) -> Self {
        Self::new(duration, duration)
    }

    pub fn with_initial_enter(mut self, initial_enter: bool) -> Self {
        self.initial_enter = initial_enter;
        self
    }
}

/// Presence driven by fixed durations. Entering always waits one animation
/// frame in `PreEnter` so the mounted element can paint before it starts
/// transitioning.
pub fn make_presence(
    scheduler: Rc<dyn Scheduler>,
    show: impl Into<MaybeSignal<bool>>,
    options: TimedPresenceOptions,
) -> Presence {
    let completion = TimedCompletion::new(
        scheduler.clone(),
        options.enter_duration,
        options.exit_duration,
    );
    Presence::new(
        scheduler,
        show,
        Box::new(completion),
        MachineOptions {
            kind: PresenceKind::Timed,
            initial_enter: options.initial_enter,
            enter_on_next_frame: true,
        },
    )
}

/// [`make_presence`] bound to an optional payload.
///
/// `mounted_item` keeps the last shown payload while it exits. A different
/// payload is only latched once the previous one has fully exited.
pub struct ItemPresence<T> {
    presence: Presence,
    mounted_item: Signal<Option<T>>,
    stop: Dispose,
}

impl<T> Clone for ItemPresence<T> {
    fn clone(&self) -> Self {
        Self {
            presence: self.presence.clone(),
            mounted_item: self.mounted_item.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<T: Clone> ItemPresence<T> {
    pub fn mounted_item(&self) -> Option<T> {
        self.mounted_item.get()
    }

    pub fn mounted_item_signal(&self) -> Signal<Option<T>> {
        self.mounted_item.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.presence.is_mounted() && self.mounted_item.with(Option::is_some)
    }

    pub fn phase(&self) -> PresencePhase {
        self.presence.phase()
    }

    pub fn is_visible(&self) -> bool {
        self.presence.is_visible()
    }

    pub fn is_entering(&self) -> bool {
        self.presence.is_entering()
    }

    pub fn is_exiting(&self) -> bool {
        self.presence.is_exiting()
    }

    pub fn is_animating(&self) -> bool {
        self.presence.is_animating()
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn dispose(&self) {
        self.stop.run();
        self.presence.dispose();
    }
}

pub fn create_item_presence<T: Clone + PartialEq + 'static>(
    scheduler: Rc<dyn Scheduler>,
    item: Signal<Option<T>>,
    options: TimedPresenceOptions,
) -> ItemPresence<T> {
    let initial = item.get();
    let should_mount = signal(initial.is_some());
    let mounted_item = signal(initial);
    let presence = make_presence(scheduler, &should_mount, options);

    let stop = watch(
        (item, mounted_item.clone(), presence.phase_signal()),
        {
            let presence = presence.clone();
            let mounted_item = mounted_item.clone();
            move |(item, mounted, _), _| {
                if mounted != item {
                    if presence.is_mounted() {
                        should_mount.set(false);
                    } else if item.is_some() {
                        mounted_item.set(item.clone());
                        should_mount.set(true);
                    }
                } else {
                    should_mount.set(item.is_some());
                }
            }
        },
        WatchOptions::default(),
    );

    ItemPresence {
        presence,
        mounted_item,
        stop,
    }
}
