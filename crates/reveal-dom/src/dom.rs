//! The host boundary.
//!
//! Everything in this crate talks to the document through [`Dom`]. The browser
//! implementation lives in [`crate::web`]; [`crate::MemoryDom`] is an
//! in-memory document used by tests and headless hosts.

use std::rc::Rc;

use reveal_core::Scheduler;

use crate::ListenerOptions;

/// The parts of an event the utilities in this crate look at.
pub trait DomEvent {
    type Node;

    fn event_type(&self) -> String;

    fn target(&self) -> Option<Self::Node>;

    /// Nodes the event travels through, innermost first.
    fn composed_path(&self) -> Vec<Self::Node>;

    /// Click count for pointer events; `0` for keyboard-synthesized clicks.
    fn detail(&self) -> i32;

    /// `propertyName` of transition events.
    fn property_name(&self) -> Option<String>;
}

pub type EventHandler<E> = Rc<dyn Fn(&E)>;

pub type IntersectionCallback<N> = Rc<dyn Fn(Vec<IntersectionEntry<N>>)>;

/// Computed style strings relevant to motion, comma separated as the
/// browser reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MotionStyle {
    pub animation_name: String,
    pub animation_duration: String,
    pub animation_iteration_count: String,
    pub transition_property: String,
    pub transition_duration: String,
    pub transition_delay: String,
}

impl MotionStyle {
    /// A single finite animation.
    pub fn animation(name: &str, duration: &str) -> Self {
        Self {
            animation_name: name.to_string(),
            animation_duration: duration.to_string(),
            animation_iteration_count: "1".to_string(),
            ..Self::default()
        }
    }

    /// A single transition without delay.
    pub fn transition(property: &str, duration: &str) -> Self {
        Self {
            transition_property: property.to_string(),
            transition_duration: duration.to_string(),
            transition_delay: "0s".to_string(),
            ..Self::default()
        }
    }

    pub fn with_iteration_count(mut self, count: &str) -> Self {
        self.animation_iteration_count = count.to_string();
        self
    }

    pub fn with_transition_delay(mut self, delay: &str) -> Self {
        self.transition_delay = delay.to_string();
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionOptions<N> {
    pub root: Option<N>,
    pub root_margin: String,
    pub threshold: Vec<f64>,
}

impl<N> Default for IntersectionOptions<N> {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: "0px".to_string(),
            threshold: vec![0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionEntry<N> {
    pub target: N,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("no global `window` is available")]
    NoWindow,
    #[error("window has no document")]
    NoDocument,
    #[error("document has no <head>")]
    NoHead,
    #[error("host call failed: {0}")]
    Host(String),
}

/// A document host: event targets, computed style, intersection observers,
/// injected style sheets, plus timers through [`Scheduler`].
pub trait Dom: Scheduler {
    type Node: Clone + PartialEq + 'static;
    type Event: DomEvent<Node = Self::Node> + 'static;
    type Registration: 'static;
    type Observer: 'static;

    /// The global event target.
    fn window(&self) -> Self::Node;

    fn add_event_listener(
        &self,
        target: &Self::Node,
        event: &str,
        handler: EventHandler<Self::Event>,
        options: ListenerOptions,
    ) -> Self::Registration;

    /// Removing an already removed registration is a no-op.
    fn remove_event_listener(&self, registration: Self::Registration);

    fn computed_motion_style(&self, node: &Self::Node) -> MotionStyle;

    fn create_intersection_observer(
        &self,
        options: &IntersectionOptions<Self::Node>,
        callback: IntersectionCallback<Self::Node>,
    ) -> Self::Observer;

    fn observe(&self, observer: &Self::Observer, node: &Self::Node);

    fn unobserve(&self, observer: &Self::Observer, node: &Self::Node);

    fn disconnect(&self, observer: &Self::Observer);

    /// Creates `<style id=..>` in the document head, or replaces its text.
    fn upsert_style_element(&self, id: &str, css: &str);
}
