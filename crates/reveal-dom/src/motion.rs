//! Motion-end detection.
//!
//! [`on_motion_end`] reads the element's computed style once and decides what
//! to wait for: a finite CSS animation (`animationend`), running transitions
//! (`transitionrun`/`transitionend`, optionally `transitioncancel`), or
//! nothing at all.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use reveal_core::{Dispose, MaybeSignal, WatchOptions, scoped, watch_unscoped};
use smallvec::SmallVec;

use crate::listener::add_listeners;
use crate::{Dom, DomEvent, ListenerOptions, MotionStyle, handler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionEnd {
    AnimationEnd,
    TransitionEnd,
    TransitionCancel,
    /// Nothing was going to move; reported synchronously.
    NoMotion,
}

impl fmt::Display for MotionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AnimationEnd => "animationend",
            Self::TransitionEnd => "transitionend",
            Self::TransitionCancel => "transitioncancel",
            Self::NoMotion => "no-motion",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionType {
    Animation,
    Transition,
    /// Both kinds; an animation wins when both are present.
    #[default]
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionEndOptions {
    pub motion_type: MotionType,
    /// Report [`MotionEnd::NoMotion`] right away when nothing animates.
    pub exec_when_no_motion: bool,
    /// Treat `transitioncancel` like `transitionend`.
    pub detect_cancelled: bool,
}

impl Default for MotionEndOptions {
    fn default() -> Self {
        Self {
            motion_type: MotionType::Auto,
            exec_when_no_motion: true,
            detect_cancelled: false,
        }
    }
}

impl MotionEndOptions {
    pub fn with_motion_type(mut self, motion_type: MotionType) -> Self {
        self.motion_type = motion_type;
        self
    }

    pub fn with_exec_when_no_motion(mut self, exec: bool) -> Self {
        self.exec_when_no_motion = exec;
        self
    }

    pub fn with_detect_cancelled(mut self, detect: bool) -> Self {
        self.detect_cancelled = detect;
        self
    }
}

fn split_list(value: &str) -> SmallVec<[&str; 4]> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses a CSS `<time>` (`0.3s`, `150ms`) into seconds.
fn parse_time(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<f64>().ok().map(|v| v / 1000.0)
    } else if let Some(s) = value.strip_suffix('s') {
        s.trim().parse::<f64>().ok()
    } else {
        None
    }
}

/// The `index`-th entry of a CSS list, repeating the list as the browser does.
fn cycled<'a>(list: &[&'a str], index: usize) -> &'a str {
    if list.is_empty() {
        "0s"
    } else {
        list[index % list.len()]
    }
}

impl MotionStyle {
    /// A named animation that ends: some iteration count is finite and some
    /// duration is positive.
    pub fn has_animation(&self) -> bool {
        let names = split_list(&self.animation_name);
        if names.is_empty() || names.iter().all(|n| *n == "none") {
            return false;
        }
        let counts = split_list(&self.animation_iteration_count);
        let finite = counts.is_empty() || counts.iter().any(|c| *c != "infinite");
        let durations = split_list(&self.animation_duration);
        let moves = durations
            .iter()
            .any(|d| parse_time(d).is_some_and(|t| t > 0.0));
        finite && moves
    }

    /// A transitioned property with a positive combined duration.
    pub fn has_transition(&self) -> bool {
        let properties = split_list(&self.transition_property);
        let durations = split_list(&self.transition_duration);
        let delays = split_list(&self.transition_delay);
        properties.iter().enumerate().any(|(i, property)| {
            if *property == "none" {
                return false;
            }
            let duration = parse_time(cycled(&durations, i)).unwrap_or(0.0).max(0.0);
            let delay = parse_time(cycled(&delays, i)).unwrap_or(0.0);
            duration + delay > 0.0
        })
    }
}

type Callback = Box<dyn FnOnce(MotionEnd)>;

struct Detector {
    callback: RefCell<Option<Callback>>,
    listeners: RefCell<Dispose>,
    pending: RefCell<SmallVec<[String; 4]>>,
}

impl Detector {
    fn resolve(&self, end: MotionEnd) {
        let Some(callback) = self.callback.borrow_mut().take() else {
            return;
        };
        self.listeners.borrow().run();
        log::trace!("motion: resolved with {end}");
        callback(end);
    }

    fn release(&self) {
        self.callback.borrow_mut().take();
        self.listeners.borrow().run();
    }
}

/// Unscoped form of [`on_motion_end`].
pub(crate) fn install<D: Dom>(
    dom: &Rc<D>,
    node: &D::Node,
    callback: impl FnOnce(MotionEnd) + 'static,
    options: MotionEndOptions,
) -> Dispose {
    let style = dom.computed_motion_style(node);
    let allow_animation = matches!(options.motion_type, MotionType::Animation | MotionType::Auto);
    let allow_transition = matches!(options.motion_type, MotionType::Transition | MotionType::Auto);

    let detector = Rc::new(Detector {
        callback: RefCell::new(Some(Box::new(callback))),
        listeners: RefCell::new(Dispose::noop()),
        pending: RefCell::new(SmallVec::new()),
    });

    if allow_animation && style.has_animation() {
        let on_end = {
            let detector = detector.clone();
            let node = node.clone();
            handler(move |e: &D::Event| {
                if e.target().as_ref() == Some(&node) {
                    detector.resolve(MotionEnd::AnimationEnd);
                }
            })
        };
        *detector.listeners.borrow_mut() =
            add_listeners(dom, node, &["animationend"], &[on_end], ListenerOptions::empty());
        log::debug!("motion: waiting for animationend ({})", style.animation_name);
    } else if allow_transition && style.has_transition() {
        let on_end = {
            let detector = detector.clone();
            let node = node.clone();
            handler(move |e: &D::Event| {
                if e.target().as_ref() != Some(&node) {
                    return;
                }
                if let Some(property) = e.property_name() {
                    detector.pending.borrow_mut().retain(|p| *p != property);
                }
                if detector.pending.borrow().is_empty() {
                    let end = if e.event_type() == "transitioncancel" {
                        MotionEnd::TransitionCancel
                    } else {
                        MotionEnd::TransitionEnd
                    };
                    detector.resolve(end);
                }
            })
        };
        let on_run = {
            let detector = detector.clone();
            let node = node.clone();
            handler(move |e: &D::Event| {
                if e.target().as_ref() != Some(&node) {
                    return;
                }
                if let Some(property) = e.property_name() {
                    let mut pending = detector.pending.borrow_mut();
                    if !pending.contains(&property) {
                        pending.push(property);
                    }
                }
            })
        };

        let end_events: &[&str] = if options.detect_cancelled {
            &["transitionend", "transitioncancel"]
        } else {
            &["transitionend"]
        };
        *detector.listeners.borrow_mut() = Dispose::all([
            add_listeners(dom, node, end_events, &[on_end], ListenerOptions::empty()),
            add_listeners(dom, node, &["transitionrun"], &[on_run], ListenerOptions::empty()),
        ]);
        log::debug!(
            "motion: waiting for transitions ({})",
            style.transition_property
        );
    } else {
        if options.exec_when_no_motion {
            detector.resolve(MotionEnd::NoMotion);
        }
        return Dispose::noop();
    }

    Dispose::new(move || detector.release())
}

/// Calls `callback` once every CSS motion on `node` has ended.
///
/// The computed style is read once, at call time. Listeners are removed as
/// soon as the callback runs, when the returned guard runs, or when the
/// current scope is disposed.
pub fn on_motion_end<D: Dom>(
    dom: &Rc<D>,
    node: &D::Node,
    callback: impl FnOnce(MotionEnd) + 'static,
    options: MotionEndOptions,
) -> Dispose {
    scoped(install(dom, node, callback, options))
}

/// Reactive [`on_motion_end`]: re-installed whenever `element` changes,
/// inert while it is absent.
pub fn create_on_motion_end<D: Dom>(
    dom: &Rc<D>,
    element: impl Into<MaybeSignal<Option<D::Node>>>,
    callback: impl Fn(MotionEnd) + 'static,
    options: MotionEndOptions,
) -> Dispose {
    let callback: Rc<dyn Fn(MotionEnd)> = Rc::new(callback);
    let current = Rc::new(RefCell::new(Dispose::noop()));

    let stop = watch_unscoped(
        element.into(),
        {
            let dom = dom.clone();
            let current = current.clone();
            move |node, _| {
                current.borrow().run();
                if let Some(node) = node {
                    let callback = callback.clone();
                    let guard = install(&dom, node, move |end| callback(end), options);
                    *current.borrow_mut() = guard;
                }
            }
        },
        WatchOptions::default(),
    );

    scoped(Dispose::new(move || {
        stop.run();
        current.borrow().run();
    }))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use reveal_core::{Scope, signal};

    use super::*;
    use crate::{MemoryDom, MemoryEvent};

    fn recorder() -> (Rc<RefCell<Vec<MotionEnd>>>, impl FnOnce(MotionEnd) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let cb = {
            let seen = seen.clone();
            move |end: MotionEnd| seen.borrow_mut().push(end)
        };
        (seen, cb)
    }

    #[test]
    fn style_classification() {
        assert!(MotionStyle::animation("fade", "0.3s").has_animation());
        assert!(!MotionStyle::animation("none", "0.3s").has_animation());
        assert!(!MotionStyle::animation("fade", "0s").has_animation());
        assert!(!MotionStyle::animation("spin", "1s").with_iteration_count("infinite").has_animation());
        assert!(
            MotionStyle::animation("spin, fade", "1s, 200ms")
                .with_iteration_count("infinite, 1")
                .has_animation()
        );

        assert!(MotionStyle::transition("opacity", "150ms").has_transition());
        assert!(!MotionStyle::transition("all", "0s").has_transition());
        assert!(!MotionStyle::transition("none", "1s").has_transition());
        assert!(MotionStyle::transition("all", "0s").with_transition_delay("50ms").has_transition());
        assert!(MotionStyle::transition("opacity, transform", "0s, 1s").has_transition());
        assert!(!MotionStyle::default().has_animation());
        assert!(!MotionStyle::default().has_transition());
    }

    #[test]
    fn no_motion_resolves_synchronously() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let (seen, cb) = recorder();

        on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        assert_eq!(*seen.borrow(), vec![MotionEnd::NoMotion]);
        assert_eq!(dom.total_listeners(), 0);
    }

    #[test]
    fn no_motion_can_be_silent() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let (seen, cb) = recorder();

        on_motion_end(&dom, &el, cb, MotionEndOptions::default().with_exec_when_no_motion(false));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn animation_end_from_descendant_is_ignored() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let child = dom.create_child(&el);
        dom.set_motion_style(&el, MotionStyle::animation("fade", "200ms"));
        let (seen, cb) = recorder();

        on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        dom.dispatch(&child, MemoryEvent::new("animationend"));
        assert!(seen.borrow().is_empty());

        dom.dispatch(&el, MemoryEvent::new("animationend"));
        dom.dispatch(&el, MemoryEvent::new("animationend"));
        assert_eq!(*seen.borrow(), vec![MotionEnd::AnimationEnd]);
        assert_eq!(dom.total_listeners(), 0);
    }

    #[test]
    fn animation_wins_over_transition_in_auto_mode() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let mut style = MotionStyle::animation("fade", "1s");
        style.transition_property = "opacity".into();
        style.transition_duration = "1s".into();
        dom.set_motion_style(&el, style);
        let (seen, cb) = recorder();

        on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        dom.dispatch(&el, MemoryEvent::transition("transitionend", "opacity"));
        assert!(seen.borrow().is_empty());
        dom.dispatch(&el, MemoryEvent::new("animationend"));
        assert_eq!(*seen.borrow(), vec![MotionEnd::AnimationEnd]);
    }

    #[test]
    fn transition_only_mode_skips_animation() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        dom.set_motion_style(&el, MotionStyle::animation("fade", "1s"));
        let (seen, cb) = recorder();

        on_motion_end(
            &dom,
            &el,
            cb,
            MotionEndOptions::default().with_motion_type(MotionType::Transition),
        );
        assert_eq!(*seen.borrow(), vec![MotionEnd::NoMotion]);
    }

    #[test]
    fn waits_for_every_running_transition() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        dom.set_motion_style(&el, MotionStyle::transition("opacity, transform", "200ms"));
        let (seen, cb) = recorder();

        on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        dom.dispatch(&el, MemoryEvent::transition("transitionrun", "opacity"));
        dom.dispatch(&el, MemoryEvent::transition("transitionrun", "transform"));

        dom.dispatch(&el, MemoryEvent::transition("transitionend", "opacity"));
        assert!(seen.borrow().is_empty());

        dom.dispatch(&el, MemoryEvent::transition("transitionend", "transform"));
        assert_eq!(*seen.borrow(), vec![MotionEnd::TransitionEnd]);
        assert_eq!(dom.total_listeners(), 0);
    }

    #[test]
    fn cancel_counts_only_when_requested() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        dom.set_motion_style(&el, MotionStyle::transition("opacity", "200ms"));

        let (ignored, cb) = recorder();
        let stop = on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        dom.dispatch(&el, MemoryEvent::transition("transitionrun", "opacity"));
        dom.dispatch(&el, MemoryEvent::transition("transitioncancel", "opacity"));
        assert!(ignored.borrow().is_empty());
        stop.run();

        let (seen, cb) = recorder();
        on_motion_end(&dom, &el, cb, MotionEndOptions::default().with_detect_cancelled(true));
        dom.dispatch(&el, MemoryEvent::transition("transitionrun", "opacity"));
        dom.dispatch(&el, MemoryEvent::transition("transitioncancel", "opacity"));
        assert_eq!(*seen.borrow(), vec![MotionEnd::TransitionCancel]);
    }

    #[test]
    fn cleanup_is_idempotent_and_silences_callback() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        dom.set_motion_style(&el, MotionStyle::animation("fade", "1s"));
        let (seen, cb) = recorder();

        let stop = on_motion_end(&dom, &el, cb, MotionEndOptions::default());
        assert_eq!(dom.listener_count(&el), 1);
        stop.run();
        stop.run();
        dom.dispatch(&el, MemoryEvent::new("animationend"));
        assert!(seen.borrow().is_empty());
        assert_eq!(dom.listener_count(&el), 0);
    }

    #[test]
    fn scope_disposal_detaches() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        dom.set_motion_style(&el, MotionStyle::transition("opacity", "1s"));
        let scope = Scope::new();
        scope.run(|| {
            on_motion_end(&dom, &el, |_| {}, MotionEndOptions::default());
        });
        assert_eq!(dom.listener_count(&el), 2);
        scope.dispose();
        assert_eq!(dom.listener_count(&el), 0);
    }

    #[test]
    fn reactive_variant_follows_element() {
        let dom = Rc::new(MemoryDom::new());
        let a = dom.create_element();
        let b = dom.create_element();
        dom.set_motion_style(&a, MotionStyle::animation("fade", "1s"));
        dom.set_motion_style(&b, MotionStyle::animation("fade", "1s"));
        let element = signal(None);
        let hits = Rc::new(Cell::new(0));

        let stop = {
            let hits = hits.clone();
            create_on_motion_end(
                &dom,
                &element,
                move |_| hits.set(hits.get() + 1),
                MotionEndOptions::default(),
            )
        };
        assert_eq!(dom.total_listeners(), 0);

        element.set(Some(a));
        element.set(Some(b));
        assert_eq!(dom.listener_count(&a), 0);
        dom.dispatch(&a, MemoryEvent::new("animationend"));
        dom.dispatch(&b, MemoryEvent::new("animationend"));
        assert_eq!(hits.get(), 1);

        stop.run();
        assert_eq!(dom.total_listeners(), 0);
    }
}
