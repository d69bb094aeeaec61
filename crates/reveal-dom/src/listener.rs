use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use reveal_core::{Dispose, MaybeSignal, WatchOptions, scoped, watch_unscoped};
use smallvec::SmallVec;

use crate::{Dom, EventHandler};

bitflags! {
    /// Flags passed through to `addEventListener`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ListenerOptions: u8 {
        const CAPTURE = 1;
        const PASSIVE = 1 << 1;
        const ONCE    = 1 << 2;
    }
}

/// Wraps a closure as a shareable [`EventHandler`].
pub fn handler<E>(f: impl Fn(&E) + 'static) -> EventHandler<E> {
    Rc::new(f)
}

/// Unscoped registration; the caller owns the guard.
pub(crate) fn add_listeners<D: Dom, S: AsRef<str>>(
    dom: &Rc<D>,
    target: &D::Node,
    events: &[S],
    handlers: &[EventHandler<D::Event>],
    options: ListenerOptions,
) -> Dispose {
    let mut registrations: SmallVec<[D::Registration; 4]> = SmallVec::new();
    for event in events {
        for h in handlers {
            registrations.push(dom.add_event_listener(target, event.as_ref(), h.clone(), options));
        }
    }
    log::debug!(
        "listener: registered {} handler(s) for {} event(s) {:?}",
        handlers.len(),
        events.len(),
        options
    );

    let dom = dom.clone();
    Dispose::new(move || {
        for registration in registrations {
            dom.remove_event_listener(registration);
        }
    })
}

/// Adds every `handler` for every event in `events` on `target`.
///
/// A missing target registers nothing. The returned guard removes all
/// registrations and is also released with the current scope.
pub fn make_event_listener<D: Dom, S: AsRef<str>>(
    dom: &Rc<D>,
    target: Option<&D::Node>,
    events: &[S],
    handlers: &[EventHandler<D::Event>],
    options: ListenerOptions,
) -> Dispose {
    let Some(target) = target else {
        return Dispose::noop();
    };
    scoped(add_listeners(dom, target, events, handlers, options))
}

/// [`make_event_listener`] on the host's window.
pub fn make_window_listener<D: Dom, S: AsRef<str>>(
    dom: &Rc<D>,
    events: &[S],
    handlers: &[EventHandler<D::Event>],
    options: ListenerOptions,
) -> Dispose {
    let window = dom.window();
    make_event_listener(dom, Some(&window), events, handlers, options)
}

/// Reactive [`make_event_listener`]: whenever the target, the event list or
/// the options change, the previous registrations are removed and the new
/// set is added. Nothing is registered while the target is absent or the
/// event list is empty.
pub fn create_event_listener<D: Dom>(
    dom: &Rc<D>,
    target: impl Into<MaybeSignal<Option<D::Node>>>,
    events: impl Into<MaybeSignal<Vec<String>>>,
    handlers: Vec<EventHandler<D::Event>>,
    options: impl Into<MaybeSignal<ListenerOptions>>,
) -> Dispose {
    let current = Rc::new(RefCell::new(Dispose::noop()));

    let stop = watch_unscoped(
        (target.into(), events.into(), options.into()),
        {
            let dom = dom.clone();
            let current = current.clone();
            move |(target, events, options), _| {
                current.borrow().run();
                let Some(target) = target else {
                    return;
                };
                if events.is_empty() {
                    return;
                }
                *current.borrow_mut() = add_listeners(&dom, target, events, &handlers, *options);
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
    use crate::{DomEvent, MemoryDom, MemoryEvent};

    fn counting(hits: &Rc<Cell<u32>>) -> EventHandler<MemoryEvent> {
        let hits = hits.clone();
        handler(move |_| hits.set(hits.get() + 1))
    }

    #[test]
    fn registers_every_event_and_handler_pair() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));

        let stop = make_event_listener(
            &dom,
            Some(&el),
            &["click", "keydown"],
            &[counting(&a), counting(&b)],
            ListenerOptions::empty(),
        );
        assert_eq!(dom.listener_count(&el), 4);

        dom.dispatch(&el, MemoryEvent::new("click"));
        dom.dispatch(&el, MemoryEvent::new("keydown"));
        assert_eq!((a.get(), b.get()), (2, 2));

        stop.run();
        stop.run();
        assert_eq!(dom.listener_count(&el), 0);
        dom.dispatch(&el, MemoryEvent::new("click"));
        assert_eq!(a.get(), 2);
    }

    #[test]
    fn missing_target_is_a_noop() {
        let dom = Rc::new(MemoryDom::new());
        let hits = Rc::new(Cell::new(0));
        let stop = make_event_listener(
            &dom,
            None,
            &["click"],
            &[counting(&hits)],
            ListenerOptions::empty(),
        );
        assert_eq!(dom.total_listeners(), 0);
        stop.run();
    }

    #[test]
    fn once_listener_fires_a_single_time() {
        let dom = Rc::new(MemoryDom::new());
        let hits = Rc::new(Cell::new(0));
        make_window_listener(&dom, &["resize"], &[counting(&hits)], ListenerOptions::ONCE);

        let window = dom.window();
        dom.dispatch(&window, MemoryEvent::new("resize"));
        dom.dispatch(&window, MemoryEvent::new("resize"));
        assert_eq!(hits.get(), 1);
        assert_eq!(dom.listener_count(&window), 0);
    }

    #[test]
    fn released_with_scope() {
        let dom = Rc::new(MemoryDom::new());
        let el = dom.create_element();
        let scope = Scope::new();
        scope.run(|| {
            make_event_listener(
                &dom,
                Some(&el),
                &["click"],
                &[handler(|_| {})],
                ListenerOptions::PASSIVE,
            );
        });
        assert_eq!(dom.listener_count(&el), 1);
        scope.dispose();
        assert_eq!(dom.listener_count(&el), 0);
    }

    #[test]
    fn reactive_listener_follows_target_and_events() {
        let dom = Rc::new(MemoryDom::new());
        let first = dom.create_element();
        let second = dom.create_element();
        let target = signal(None);
        let events = signal(vec!["click".to_string()]);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let stop = create_event_listener(
            &dom,
            &target,
            &events,
            vec![{
                let seen = seen.clone();
                handler(move |e: &MemoryEvent| seen.borrow_mut().push(e.event_type()))
            }],
            ListenerOptions::empty(),
        );
        assert_eq!(dom.total_listeners(), 0);

        target.set(Some(first));
        assert_eq!(dom.listener_count(&first), 1);

        target.set(Some(second));
        assert_eq!(dom.listener_count(&first), 0);
        assert_eq!(dom.listener_count(&second), 1);

        events.set(vec!["focus".into(), "blur".into()]);
        assert_eq!(dom.listener_count(&second), 2);
        dom.dispatch(&second, MemoryEvent::new("click"));
        dom.dispatch(&second, MemoryEvent::new("blur"));
        assert_eq!(*seen.borrow(), vec!["blur".to_string()]);

        events.set(Vec::new());
        assert_eq!(dom.total_listeners(), 0);

        events.set(vec!["click".into()]);
        stop.run();
        assert_eq!(dom.total_listeners(), 0);
        assert_eq!(target.subscriber_count(), 0);
    }
}
