//! Intersection-based visibility.
//!
//! A [`VisibilityObserver`] owns exactly one native intersection observer and
//! multiplexes any number of element registrations over it. Registrations live
//! in an arena keyed by [`EntryKey`]; entries delivered for a registration that
//! is already gone are dropped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use reveal_core::{
    Dispose, MaybeSignal, Signal, WatchOptions, on_cleanup, scoped, signal, watch_unscoped,
};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::{Dom, IntersectionEntry, IntersectionOptions};

new_key_type! {
    pub struct EntryKey;
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityOptions<N> {
    pub intersection: IntersectionOptions<N>,
    /// Value reported before the first intersection entry arrives.
    pub initial_value: bool,
}

impl<N> Default for VisibilityOptions<N> {
    fn default() -> Self {
        Self {
            intersection: IntersectionOptions::default(),
            initial_value: false,
        }
    }
}

impl<N> VisibilityOptions<N> {
    pub fn with_initial_value(mut self, initial_value: bool) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn with_root_margin(mut self, root_margin: &str) -> Self {
        self.intersection.root_margin = root_margin.to_string();
        self
    }

    pub fn with_threshold(mut self, threshold: impl Into<Vec<f64>>) -> Self {
        self.intersection.threshold = threshold.into();
        self
    }
}

type EntryCallback<N> = Rc<dyn Fn(&IntersectionEntry<N>)>;

struct Entry<N> {
    node: N,
    callback: EntryCallback<N>,
}

type Entries<N> = RefCell<SlotMap<EntryKey, Entry<N>>>;

struct Inner<D: Dom> {
    dom: Rc<D>,
    observer: D::Observer,
    entries: Rc<Entries<D::Node>>,
    initial_value: bool,
    disposed: Cell<bool>,
}

impl<D: Dom> Inner<D> {
    fn add_entry(&self, node: D::Node, callback: EntryCallback<D::Node>) -> Option<EntryKey> {
        if self.disposed.get() {
            return None;
        }
        let mut entries = self.entries.borrow_mut();
        let first = !entries.values().any(|e| e.node == node);
        if first {
            self.dom.observe(&self.observer, &node);
        }
        let key = entries.insert(Entry { node, callback });
        log::debug!("visibility: registered {key:?} ({} total)", entries.len());
        Some(key)
    }

    fn remove_entry(&self, key: EntryKey) {
        let mut entries = self.entries.borrow_mut();
        let Some(removed) = entries.remove(key) else {
            return;
        };
        if !entries.values().any(|e| e.node == removed.node) {
            self.dom.unobserve(&self.observer, &removed.node);
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let removed: Vec<Entry<D::Node>> = self.entries.borrow_mut().drain().map(|(_, e)| e).collect();
        let mut nodes: SmallVec<[D::Node; 4]> = SmallVec::new();
        for entry in removed {
            if !nodes.contains(&entry.node) {
                nodes.push(entry.node);
            }
        }
        for node in &nodes {
            self.dom.unobserve(&self.observer, node);
        }
        self.dom.disconnect(&self.observer);
        log::debug!("visibility: observer disconnected");
    }
}

impl<D: Dom> Drop for Inner<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One element's slot in the arena, released when both the returned signal
/// and the owning scope (if any) are done with it.
struct Registration<D: Dom> {
    inner: Rc<Inner<D>>,
    key: Rc<Cell<Option<EntryKey>>>,
    stop: Dispose,
}

impl<D: Dom> Registration<D> {
    fn release(&self) {
        self.stop.run();
        if let Some(key) = self.key.take() {
            self.inner.remove_entry(key);
        }
    }
}

impl<D: Dom> Drop for Registration<D> {
    fn drop(&mut self) {
        self.release();
    }
}

fn deliver<N: PartialEq>(entries: &Weak<Entries<N>>, batch: Vec<IntersectionEntry<N>>) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    for entry in batch {
        let callbacks: SmallVec<[EntryCallback<N>; 2]> = entries
            .borrow()
            .values()
            .filter(|e| e.node == entry.target)
            .map(|e| e.callback.clone())
            .collect();
        if callbacks.is_empty() {
            log::trace!("visibility: dropped entry for an unregistered element");
        }
        for callback in callbacks {
            callback(&entry);
        }
    }
}

/// One native intersection observer shared by many elements.
pub struct VisibilityObserver<D: Dom> {
    inner: Rc<Inner<D>>,
}

impl<D: Dom> Clone for VisibilityObserver<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Dom> VisibilityObserver<D> {
    /// Creates the native observer. It is disconnected with the current scope.
    pub fn new(dom: &Rc<D>, options: VisibilityOptions<D::Node>) -> Self {
        let entries: Rc<Entries<D::Node>> = Rc::new(RefCell::new(SlotMap::with_key()));
        let observer = dom.create_intersection_observer(&options.intersection, {
            let entries = Rc::downgrade(&entries);
            Rc::new(move |batch: Vec<IntersectionEntry<D::Node>>| deliver(&entries, batch))
        });

        let this = Self {
            inner: Rc::new(Inner {
                dom: dom.clone(),
                observer,
                entries,
                initial_value: options.initial_value,
                disposed: Cell::new(false),
            }),
        };
        on_cleanup({
            let inner = this.inner.clone();
            move || inner.dispose()
        });
        this
    }

    /// Tracks `element` and reports whether it intersects.
    ///
    /// Swapping the element moves the registration; an absent element keeps
    /// the last reported value. The registration ends with the current scope,
    /// or once every handle to the returned signal is dropped.
    pub fn use_visibility(&self, element: impl Into<MaybeSignal<Option<D::Node>>>) -> Signal<bool> {
        let visible = signal(self.inner.initial_value);
        let key: Rc<Cell<Option<EntryKey>>> = Rc::new(Cell::new(None));

        let stop = watch_unscoped(
            element.into(),
            {
                let inner = self.inner.clone();
                let key = key.clone();
                let weak = visible.downgrade();
                move |node, _| {
                    if let Some(old) = key.take() {
                        inner.remove_entry(old);
                    }
                    if let Some(node) = node {
                        let weak = weak.clone();
                        key.set(inner.add_entry(
                            node.clone(),
                            Rc::new(move |entry: &IntersectionEntry<D::Node>| {
                                if let Some(visible) = weak.upgrade() {
                                    visible.set(entry.is_intersecting);
                                }
                            }),
                        ));
                    }
                }
            },
            WatchOptions::default(),
        );

        let registration = Rc::new(Registration {
            inner: self.inner.clone(),
            key,
            stop,
        });
        on_cleanup({
            let registration = registration.clone();
            move || registration.release()
        });
        visible.keep_alive(registration);
        visible
    }

    /// Number of live element registrations.
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Unobserves every element and disconnects the native observer once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

/// Single-element [`VisibilityObserver`].
pub fn create_visibility_observer<D: Dom>(
    dom: &Rc<D>,
    element: impl Into<MaybeSignal<Option<D::Node>>>,
    options: VisibilityOptions<D::Node>,
) -> Signal<bool> {
    VisibilityObserver::new(dom, options).use_visibility(element)
}

/// Observes a reactive list of targets and hands raw entries to `callback`.
///
/// Whenever any target changes, every previous target is unobserved and the
/// present ones are observed again. The guard disconnects the observer.
pub fn create_intersection_observer<D: Dom>(
    dom: &Rc<D>,
    targets: Vec<MaybeSignal<Option<D::Node>>>,
    callback: impl Fn(Vec<IntersectionEntry<D::Node>>) + 'static,
    options: IntersectionOptions<D::Node>,
) -> Dispose {
    let observer = Rc::new(dom.create_intersection_observer(&options, Rc::new(callback)));
    let observed: Rc<RefCell<Vec<D::Node>>> = Rc::new(RefCell::new(Vec::new()));

    let stop = watch_unscoped(
        targets,
        {
            let dom = dom.clone();
            let observer = observer.clone();
            let observed = observed.clone();
            move |elements, _| {
                let previous = std::mem::take(&mut *observed.borrow_mut());
                for node in &previous {
                    dom.unobserve(&observer, node);
                }
                let mut now = observed.borrow_mut();
                for node in elements.iter().flatten() {
                    if !now.contains(node) {
                        dom.observe(&observer, node);
                        now.push(node.clone());
                    }
                }
            }
        },
        WatchOptions::default(),
    );

    let dom = dom.clone();
    scoped(Dispose::new(move || {
        stop.run();
        observed.borrow_mut().clear();
        dom.disconnect(&observer);
    }))
}

#[cfg(test)]
mod tests {
    use reveal_core::Scope;

    use super::*;
    use crate::{MemoryDom, NodeId};

    #[test]
    fn one_native_observer_per_instance() {
        let dom = Rc::new(MemoryDom::new());
        let a = dom.create_element();
        let b = dom.create_element();

        let vis = VisibilityObserver::new(&dom, VisibilityOptions::default().with_root_margin("10px"));
        let seen_a = vis.use_visibility(Some(a));
        let seen_b = vis.use_visibility(Some(b));

        let ids = dom.observer_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            dom.observer_options(ids[0]).map(|o| o.root_margin),
            Some("10px".to_string())
        );
        assert_eq!(dom.observed_count(), 2);

        dom.intersect(&a, true);
        assert!(seen_a.get());
        assert!(!seen_b.get());

        dom.intersect(&a, false);
        dom.intersect(&b, true);
        assert!(!seen_a.get());
        assert!(seen_b.get());
    }

    #[test]
    fn swapping_elements_moves_the_registration() {
        let dom = Rc::new(MemoryDom::new());
        let a = dom.create_element();
        let b = dom.create_element();
        let element = signal(Some(a));

        let visible = create_visibility_observer(&dom, &element, VisibilityOptions::default());
        assert!(dom.is_observed(&a));

        element.set(Some(b));
        assert!(!dom.is_observed(&a));
        assert!(dom.is_observed(&b));

        dom.intersect(&a, true);
        assert!(!visible.get());
        dom.intersect(&b, true);
        assert!(visible.get());

        element.set(None);
        assert_eq!(dom.observed_count(), 0);
        assert!(visible.get());
    }

    #[test]
    fn shared_node_stays_observed_until_last_registration_leaves() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let first = signal(Some(el));
        let second = signal(Some(el));

        let vis = VisibilityObserver::new(&dom, VisibilityOptions::default());
        let v1 = vis.use_visibility(&first);
        let v2 = vis.use_visibility(&second);
        assert_eq!(vis.len(), 2);
        assert_eq!(dom.observed_count(), 1);

        dom.intersect(&el, true);
        assert!(v1.get() && v2.get());

        first.set(None);
        assert!(dom.is_observed(&el));
        second.set(None);
        assert!(!dom.is_observed(&el));
        assert!(vis.is_empty());
    }

    #[test]
    fn initial_value_is_reported_first() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let visible = create_visibility_observer(
            &dom,
            Some(el),
            VisibilityOptions::default().with_initial_value(true),
        );
        assert!(visible.get());
        dom.intersect(&el, false);
        assert!(!visible.get());
    }

    #[test]
    fn static_element_without_scope_keeps_reporting() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let visible = create_visibility_observer(&dom, Some(el), VisibilityOptions::default());
        assert!(dom.is_observed(&el));

        dom.intersect(&el, true);
        assert!(visible.get());
        dom.intersect(&el, false);
        assert!(!visible.get());

        drop(visible);
        assert!(!dom.is_observed(&el));
        assert_eq!(dom.observed_count(), 0);
    }

    #[test]
    fn stray_entries_are_swallowed() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let other = dom.create_element();
        let visible = create_visibility_observer(&dom, Some(el), VisibilityOptions::default());

        let observer = dom.observer_ids()[0];
        dom.deliver(
            observer,
            vec![IntersectionEntry {
                target: other,
                is_intersecting: true,
                intersection_ratio: 1.0,
            }],
        );
        assert!(!visible.get());
    }

    #[test]
    fn dispose_unobserves_everything() {
        let dom = Rc::new(MemoryDom::new());
        let a = dom.create_element();
        let b = dom.create_element();

        let vis = VisibilityObserver::new(&dom, VisibilityOptions::default());
        let seen = vis.use_visibility(Some(a));
        vis.use_visibility(Some(b));

        vis.dispose();
        vis.dispose();
        assert!(vis.is_disposed());
        assert_eq!(dom.observed_count(), 0);
        dom.intersect(&a, true);
        assert!(!seen.get());

        let late = vis.use_visibility(Some(a));
        assert_eq!(dom.observed_count(), 0);
        assert!(!late.get());
    }

    #[test]
    fn scope_disposal_leaves_no_registrations() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let element = signal(Some(el));
        let scope = Scope::new();

        scope.run(|| {
            let vis = VisibilityObserver::new(&dom, VisibilityOptions::default());
            vis.use_visibility(&element);
            vis.use_visibility(Some(el));
        });
        assert_eq!(dom.observed_count(), 1);

        scope.dispose();
        assert_eq!(dom.observed_count(), 0);
        assert_eq!(element.subscriber_count(), 0);
    }

    #[test]
    fn raw_observer_follows_target_list() {
        let dom = Rc::new(MemoryDom::new());
        let a = dom.create_element();
        let b = dom.create_element();
        let second = signal(None::<NodeId>);
        let hits = Rc::new(RefCell::new(Vec::new()));

        let stop = {
            let hits = hits.clone();
            create_intersection_observer(
                &dom,
                vec![MaybeSignal::Static(Some(a)), (&second).into()],
                move |entries| {
                    hits.borrow_mut()
                        .extend(entries.into_iter().map(|e| (e.target, e.is_intersecting)))
                },
                IntersectionOptions::default(),
            )
        };
        assert_eq!(dom.observed_count(), 1);

        second.set(Some(b));
        assert_eq!(dom.observed_count(), 2);
        dom.intersect(&b, true);
        assert_eq!(*hits.borrow(), vec![(b, true)]);

        stop.run();
        assert_eq!(dom.observed_count(), 0);
        assert_eq!(second.subscriber_count(), 0);
    }
}
