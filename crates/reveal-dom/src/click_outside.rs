use std::cell::Cell;
use std::rc::Rc;

use reveal_core::{Dispose, MaybeSignal, scoped};

use crate::listener::add_listeners;
use crate::{Dom, DomEvent, ListenerOptions, handler};

pub struct ClickOutsideOptions<N> {
    /// Clicks landing on (or inside) any of these never count as outside.
    pub ignore: Vec<MaybeSignal<Option<N>>>,
}

impl<N> Default for ClickOutsideOptions<N> {
    fn default() -> Self {
        Self { ignore: Vec::new() }
    }
}

impl<N> ClickOutsideOptions<N> {
    pub fn with_ignore(mut self, node: impl Into<MaybeSignal<Option<N>>>) -> Self {
        self.ignore.push(node.into());
        self
    }
}

fn touches<E: DomEvent>(event: &E, path: &[E::Node], node: &E::Node) -> bool
where
    E::Node: PartialEq,
{
    event.target().as_ref() == Some(node) || path.contains(node)
}

/// Calls `on_outside` for clicks outside `target`.
///
/// A click only counts when the pointer also went down outside the target and
/// the ignored nodes, so a drag that starts inside and ends outside is not an
/// outside click. Keyboard-activated clicks (`detail == 0`) have no pointer
/// phase and are judged by the ignore list alone. Nothing fires while the
/// target is absent.
pub fn click_outside<D: Dom>(
    dom: &Rc<D>,
    target: impl Into<MaybeSignal<Option<D::Node>>>,
    on_outside: impl Fn(&D::Event) + 'static,
    options: ClickOutsideOptions<D::Node>,
) -> Dispose {
    let target = target.into();
    let ignore = Rc::new(options.ignore);
    let armed = Rc::new(Cell::new(false));

    let is_ignored = {
        let ignore = ignore.clone();
        move |event: &D::Event, path: &[D::Node]| {
            ignore
                .iter()
                .any(|node| node.with(|n| n.as_ref().is_some_and(|n| touches(event, path, n))))
        }
    };

    let on_click = {
        let target = target.clone();
        let armed = armed.clone();
        let is_ignored = is_ignored.clone();
        handler(move |event: &D::Event| {
            let Some(el) = target.get() else {
                return;
            };
            let path = event.composed_path();
            if touches(event, &path, &el) {
                return;
            }
            let ignored = is_ignored(event, &path);
            let fire = if event.detail() == 0 {
                !ignored
            } else {
                armed.get() && !ignored
            };
            armed.set(true);
            if fire {
                log::trace!("click_outside: outside click");
                on_outside(event);
            }
        })
    };

    let on_pointer_down = handler(move |event: &D::Event| {
        let Some(el) = target.get() else {
            return;
        };
        let path = event.composed_path();
        armed.set(!(touches(event, &path, &el) || is_ignored(event, &path)));
    });

    let window = dom.window();
    scoped(Dispose::all([
        add_listeners(dom, &window, &["click"], &[on_click], ListenerOptions::PASSIVE),
        add_listeners(
            dom,
            &window,
            &["pointerdown"],
            &[on_pointer_down],
            ListenerOptions::PASSIVE,
        ),
    ]))
}

#[cfg(test)]
mod tests {
    use reveal_core::{Scope, signal};

    use super::*;
    use crate::{MemoryDom, MemoryEvent, NodeId};

    struct Page {
        dom: Rc<MemoryDom>,
        target: NodeId,
        inner: NodeId,
        outside: NodeId,
        menu: NodeId,
    }

    fn page() -> Page {
        let dom = Rc::new(MemoryDom::new());
        let body = dom.create_element();
        let target = dom.create_child(&body);
        let inner = dom.create_child(&target);
        let outside = dom.create_child(&body);
        let menu = dom.create_child(&body);
        Page {
            dom,
            target,
            inner,
            outside,
            menu,
        }
    }

    impl Page {
        fn press(&self, down: &NodeId, up: &NodeId) {
            self.dom.dispatch(down, MemoryEvent::new("pointerdown"));
            self.dom.dispatch(up, MemoryEvent::new("click"));
        }
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn(&MemoryEvent) + 'static) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        (hits, move |_: &MemoryEvent| h.set(h.get() + 1))
    }

    #[test]
    fn fires_for_a_full_outside_click() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(&p.dom, Some(p.target), cb, ClickOutsideOptions::default());

        p.press(&p.outside, &p.outside);
        assert_eq!(hits.get(), 1);
        p.press(&p.outside, &p.outside);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn ignores_clicks_inside() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(&p.dom, Some(p.target), cb, ClickOutsideOptions::default());

        p.press(&p.target, &p.target);
        p.press(&p.inner, &p.inner);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn drag_from_inside_to_outside_does_not_fire() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(&p.dom, Some(p.target), cb, ClickOutsideOptions::default());

        p.press(&p.inner, &p.outside);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn ignored_nodes_never_count() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(
            &p.dom,
            Some(p.target),
            cb,
            ClickOutsideOptions::default().with_ignore(Some(p.menu)),
        );

        p.press(&p.menu, &p.menu);
        assert_eq!(hits.get(), 0);
        p.press(&p.outside, &p.menu);
        assert_eq!(hits.get(), 0);
        p.press(&p.menu, &p.outside);
        assert_eq!(hits.get(), 0);
        p.press(&p.outside, &p.outside);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn keyboard_clicks_use_the_ignore_list_only() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(
            &p.dom,
            Some(p.target),
            cb,
            ClickOutsideOptions::default().with_ignore(Some(p.menu)),
        );

        p.dom.dispatch(&p.outside, MemoryEvent::new("click").with_detail(0));
        assert_eq!(hits.get(), 1);
        p.dom.dispatch(&p.menu, MemoryEvent::new("click").with_detail(0));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn click_without_pointer_down_is_skipped_once() {
        let p = page();
        let (hits, cb) = counter();
        click_outside(&p.dom, Some(p.target), cb, ClickOutsideOptions::default());

        p.dom.dispatch(&p.outside, MemoryEvent::new("click"));
        assert_eq!(hits.get(), 0);
        p.dom.dispatch(&p.outside, MemoryEvent::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn absent_target_is_inert() {
        let p = page();
        let (hits, cb) = counter();
        let target = signal(None);
        click_outside(&p.dom, &target, cb, ClickOutsideOptions::default());

        p.press(&p.outside, &p.outside);
        assert_eq!(hits.get(), 0);

        target.set(Some(p.target));
        p.press(&p.outside, &p.outside);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn disposal_removes_window_listeners() {
        let p = page();
        let scope = Scope::new();
        scope.run(|| {
            click_outside(&p.dom, Some(p.target), |_| {}, ClickOutsideOptions::default());
        });
        let window = p.dom.window();
        assert_eq!(p.dom.listener_count(&window), 2);
        scope.dispose();
        assert_eq!(p.dom.listener_count(&window), 0);
    }
}
