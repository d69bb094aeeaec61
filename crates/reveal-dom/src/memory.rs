//! In-memory document host.
//!
//! `MemoryDom` keeps nodes, listeners and observers in slotmap arenas and runs
//! timers and frames on an embedded [`ManualScheduler`]. Events are delivered
//! with [`MemoryDom::dispatch`] (capture then bubble along the parent chain),
//! intersection changes with [`MemoryDom::intersect`].

use std::cell::RefCell;
use std::rc::Rc;

use reveal_core::{ManualScheduler, Scheduler, TaskHandle};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use web_time::Duration;

use crate::{
    Dom, DomEvent, EventHandler, IntersectionCallback, IntersectionEntry, IntersectionOptions,
    ListenerOptions, MotionStyle,
};

new_key_type! {
    pub struct NodeId;
    pub struct ListenerId;
    pub struct ObserverId;
}

#[derive(Clone, Debug)]
pub struct MemoryEvent {
    event_type: String,
    target: Option<NodeId>,
    path: Vec<NodeId>,
    detail: i32,
    property_name: Option<String>,
}

impl MemoryEvent {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: None,
            path: Vec::new(),
            detail: 1,
            property_name: None,
        }
    }

    /// A transition event for `property`.
    pub fn transition(event_type: &str, property: &str) -> Self {
        Self::new(event_type).with_property(property)
    }

    pub fn with_detail(mut self, detail: i32) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_property(mut self, property: &str) -> Self {
        self.property_name = Some(property.to_string());
        self
    }
}

impl DomEvent for MemoryEvent {
    type Node = NodeId;

    fn event_type(&self) -> String {
        self.event_type.clone()
    }

    fn target(&self) -> Option<NodeId> {
        self.target
    }

    fn composed_path(&self) -> Vec<NodeId> {
        self.path.clone()
    }

    fn detail(&self) -> i32 {
        self.detail
    }

    fn property_name(&self) -> Option<String> {
        self.property_name.clone()
    }
}

#[derive(Default)]
struct NodeData {
    parent: Option<NodeId>,
    motion: MotionStyle,
}

struct Listener {
    node: NodeId,
    event: String,
    handler: EventHandler<MemoryEvent>,
    options: ListenerOptions,
}

struct ObserverData {
    callback: IntersectionCallback<NodeId>,
    options: IntersectionOptions<NodeId>,
    targets: SmallVec<[NodeId; 4]>,
}

pub struct MemoryDom {
    scheduler: ManualScheduler,
    window: NodeId,
    nodes: RefCell<SlotMap<NodeId, NodeData>>,
    listeners: RefCell<SlotMap<ListenerId, Listener>>,
    observers: RefCell<SlotMap<ObserverId, ObserverData>>,
    styles: RefCell<Vec<(String, String)>>,
    style_writes: std::cell::Cell<usize>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let window = nodes.insert(NodeData::default());
        Self {
            scheduler: ManualScheduler::new(),
            window,
            nodes: RefCell::new(nodes),
            listeners: RefCell::new(SlotMap::with_key()),
            observers: RefCell::new(SlotMap::with_key()),
            styles: RefCell::new(Vec::new()),
            style_writes: std::cell::Cell::new(0),
        }
    }

    /// The clock driving this host's timers and frames.
    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn advance_ms(&self, ms: u64) {
        self.scheduler.advance_ms(ms);
    }

    pub fn run_frame(&self) -> usize {
        self.scheduler.run_frame()
    }

    /// A detached element.
    pub fn create_element(&self) -> NodeId {
        self.nodes.borrow_mut().insert(NodeData::default())
    }

    pub fn create_child(&self, parent: &NodeId) -> NodeId {
        self.nodes.borrow_mut().insert(NodeData {
            parent: Some(*parent),
            ..NodeData::default()
        })
    }

    pub fn set_motion_style(&self, node: &NodeId, style: MotionStyle) {
        if let Some(data) = self.nodes.borrow_mut().get_mut(*node) {
            data.motion = style;
        }
    }

    /// The node and its ancestors, innermost first, ending at the window.
    pub fn path(&self, node: &NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut path = vec![*node];
        let mut cursor = nodes.get(*node).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if path.contains(&id) {
                break;
            }
            path.push(id);
            cursor = nodes.get(id).and_then(|n| n.parent);
        }
        if path.last() != Some(&self.window) {
            path.push(self.window);
        }
        path
    }

    /// Delivers `event` at `target`: capture listeners outermost first, then
    /// the remaining listeners innermost first.
    pub fn dispatch(&self, target: &NodeId, mut event: MemoryEvent) {
        event.target = Some(*target);
        event.path = self.path(target);
        log::trace!("memory dom: dispatch {} at {:?}", event.event_type, target);

        let capture = event.path.iter().rev().map(|n| (*n, true));
        let bubble = event.path.iter().map(|n| (*n, false));
        let order: Vec<(NodeId, bool)> = capture.chain(bubble).collect();

        for (node, capturing) in order {
            let matching: Vec<ListenerId> = self
                .listeners
                .borrow()
                .iter()
                .filter(|(_, l)| {
                    l.node == node
                        && l.event == event.event_type
                        && l.options.contains(ListenerOptions::CAPTURE) == capturing
                })
                .map(|(id, _)| id)
                .collect();

            for id in matching {
                let handler = {
                    let mut listeners = self.listeners.borrow_mut();
                    let Some(listener) = listeners.get(id) else {
                        continue;
                    };
                    let handler = listener.handler.clone();
                    if listener.options.contains(ListenerOptions::ONCE) {
                        listeners.remove(id);
                    }
                    handler
                };
                handler(&event);
            }
        }
    }

    /// Reports an intersection change for `node` to every observer watching it.
    pub fn intersect(&self, node: &NodeId, is_intersecting: bool) {
        let callbacks: Vec<IntersectionCallback<NodeId>> = self
            .observers
            .borrow()
            .values()
            .filter(|o| o.targets.contains(node))
            .map(|o| o.callback.clone())
            .collect();
        for callback in callbacks {
            callback(vec![IntersectionEntry {
                target: *node,
                is_intersecting,
                intersection_ratio: if is_intersecting { 1.0 } else { 0.0 },
            }]);
        }
    }

    /// Hands `entries` to one observer's callback as-is, observed or not.
    pub fn deliver(&self, observer: ObserverId, entries: Vec<IntersectionEntry<NodeId>>) {
        let callback = self.observers.borrow().get(observer).map(|o| o.callback.clone());
        if let Some(callback) = callback {
            callback(entries);
        }
    }

    pub fn listener_count(&self, node: &NodeId) -> usize {
        self.listeners
            .borrow()
            .values()
            .filter(|l| l.node == *node)
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Observers created so far, in creation order.
    pub fn observer_ids(&self) -> Vec<ObserverId> {
        self.observers.borrow().keys().collect()
    }

    pub fn observer_options(&self, observer: ObserverId) -> Option<IntersectionOptions<NodeId>> {
        self.observers.borrow().get(observer).map(|o| o.options.clone())
    }

    /// Targets currently observed across all observers.
    pub fn observed_count(&self) -> usize {
        self.observers.borrow().values().map(|o| o.targets.len()).sum()
    }

    pub fn is_observed(&self, node: &NodeId) -> bool {
        self.observers
            .borrow()
            .values()
            .any(|o| o.targets.contains(node))
    }

    pub fn style_text(&self, id: &str) -> Option<String> {
        self.styles
            .borrow()
            .iter()
            .find(|(sid, _)| sid == id)
            .map(|(_, css)| css.clone())
    }

    pub fn style_count(&self) -> usize {
        self.styles.borrow().len()
    }

    /// Number of times any style element was created or rewritten.
    pub fn style_writes(&self) -> usize {
        self.style_writes.get()
    }
}

impl Scheduler for MemoryDom {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.scheduler.set_timeout(delay, task)
    }

    fn request_animation_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.scheduler.request_animation_frame(task)
    }

    fn cancel(&self, handle: TaskHandle) {
        self.scheduler.cancel(handle);
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;
    type Event = MemoryEvent;
    type Registration = ListenerId;
    type Observer = ObserverId;

    fn window(&self) -> NodeId {
        self.window
    }

    fn add_event_listener(
        &self,
        target: &NodeId,
        event: &str,
        handler: EventHandler<MemoryEvent>,
        options: ListenerOptions,
    ) -> ListenerId {
        self.listeners.borrow_mut().insert(Listener {
            node: *target,
            event: event.to_string(),
            handler,
            options,
        })
    }

    fn remove_event_listener(&self, registration: ListenerId) {
        self.listeners.borrow_mut().remove(registration);
    }

    fn computed_motion_style(&self, node: &NodeId) -> MotionStyle {
        self.nodes
            .borrow()
            .get(*node)
            .map(|n| n.motion.clone())
            .unwrap_or_default()
    }

    fn create_intersection_observer(
        &self,
        options: &IntersectionOptions<NodeId>,
        callback: IntersectionCallback<NodeId>,
    ) -> ObserverId {
        self.observers.borrow_mut().insert(ObserverData {
            callback,
            options: options.clone(),
            targets: SmallVec::new(),
        })
    }

    fn observe(&self, observer: &ObserverId, node: &NodeId) {
        if let Some(o) = self.observers.borrow_mut().get_mut(*observer)
            && !o.targets.contains(node)
        {
            o.targets.push(*node);
        }
    }

    fn unobserve(&self, observer: &ObserverId, node: &NodeId) {
        if let Some(o) = self.observers.borrow_mut().get_mut(*observer) {
            o.targets.retain(|t| t != node);
        }
    }

    fn disconnect(&self, observer: &ObserverId) {
        if let Some(o) = self.observers.borrow_mut().get_mut(*observer) {
            o.targets.clear();
        }
    }

    fn upsert_style_element(&self, id: &str, css: &str) {
        let mut styles = self.styles.borrow_mut();
        match styles.iter_mut().find(|(sid, _)| sid == id) {
            Some((_, existing)) => *existing = css.to_string(),
            None => styles.push((id.to_string(), css.to_string())),
        }
        self.style_writes.set(self.style_writes.get() + 1);
    }
}
