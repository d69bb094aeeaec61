//! Browser host on top of `web-sys`.
//!
//! Nodes are plain `EventTarget`s, so `window`, elements and shadow roots can
//! all be passed where a [`Dom::Node`] is expected.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Element, Event, EventTarget, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, TransitionEvent, UiEvent, Window,
};
use web_time::Duration;

use reveal_core::{Scheduler, TaskHandle};

use crate::{
    Dom, DomError, DomEvent, EventHandler, IntersectionCallback, IntersectionEntry,
    IntersectionOptions, ListenerOptions, MotionStyle,
};

/// A DOM event as seen by this crate.
#[derive(Clone, Debug)]
pub struct WebEvent(pub Event);

impl DomEvent for WebEvent {
    type Node = EventTarget;

    fn event_type(&self) -> String {
        self.0.type_()
    }

    fn target(&self) -> Option<EventTarget> {
        self.0.target()
    }

    fn composed_path(&self) -> Vec<EventTarget> {
        self.0
            .composed_path()
            .iter()
            .filter_map(|v| v.dyn_into::<EventTarget>().ok())
            .collect()
    }

    fn detail(&self) -> i32 {
        self.0.dyn_ref::<UiEvent>().map_or(0, |e| e.detail())
    }

    fn property_name(&self) -> Option<String> {
        self.0
            .dyn_ref::<TransitionEvent>()
            .map(|e| e.property_name())
    }
}

pub struct WebRegistration {
    target: EventTarget,
    event: String,
    capture: bool,
    closure: Closure<dyn FnMut(Event)>,
}

pub struct WebObserver {
    inner: Option<IntersectionObserver>,
    _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

pub struct WebDom {
    window: Window,
    document: web_sys::Document,
}

impl WebDom {
    pub fn new() -> Result<Self, DomError> {
        let window = web_sys::window().ok_or(DomError::NoWindow)?;
        let document = window.document().ok_or(DomError::NoDocument)?;
        Ok(Self { window, document })
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.document
    }

    // Listeners may be removed from inside their own callback; the closure
    // must outlive that call.
    fn defer_drop<T: 'static>(&self, value: T) {
        let task = Closure::once_into_js(move || drop(value));
        if let Err(e) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(task.unchecked_ref(), 0)
        {
            log::warn!("web: could not defer listener release: {e:?}");
        }
    }

    fn write_style(&self, id: &str, css: &str) -> Result<(), DomError> {
        if let Some(existing) = self.document.get_element_by_id(id) {
            existing.set_text_content(Some(css));
            return Ok(());
        }
        let head = self.document.head().ok_or(DomError::NoHead)?;
        let style = self
            .document
            .create_element("style")
            .map_err(|e| DomError::Host(format!("{e:?}")))?;
        style.set_id(id);
        style.set_text_content(Some(css));
        head.append_child(&style)
            .map_err(|e| DomError::Host(format!("{e:?}")))?;
        Ok(())
    }
}

fn millis(delay: Duration) -> i32 {
    delay.as_millis().min(i32::MAX as u128) as i32
}

impl Scheduler for WebDom {
    // Cancelled callbacks are never invoked, so their JS function is left to
    // the collector.
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let cb = Closure::once_into_js(move || task());
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), millis(delay))
        {
            Ok(id) => TaskHandle::Timeout(id as u64),
            Err(e) => {
                log::warn!("web: setTimeout failed: {e:?}");
                TaskHandle::Timeout(0)
            }
        }
    }

    fn request_animation_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        let cb = Closure::once_into_js(move |_: f64| task());
        match self.window.request_animation_frame(cb.unchecked_ref()) {
            Ok(id) => TaskHandle::Frame(id as u64),
            Err(e) => {
                log::warn!("web: requestAnimationFrame failed: {e:?}");
                TaskHandle::Frame(0)
            }
        }
    }

    fn cancel(&self, handle: TaskHandle) {
        match handle {
            TaskHandle::Timeout(0) | TaskHandle::Frame(0) => {}
            TaskHandle::Timeout(id) => self.window.clear_timeout_with_handle(id as i32),
            TaskHandle::Frame(id) => {
                let _ = self.window.cancel_animation_frame(id as i32);
            }
        }
    }
}

impl Dom for WebDom {
    type Node = EventTarget;
    type Event = WebEvent;
    type Registration = WebRegistration;
    type Observer = WebObserver;

    fn window(&self) -> EventTarget {
        self.window.clone().unchecked_into()
    }

    fn add_event_listener(
        &self,
        target: &EventTarget,
        event: &str,
        handler: EventHandler<WebEvent>,
        options: ListenerOptions,
    ) -> WebRegistration {
        let closure =
            Closure::<dyn FnMut(Event)>::new(move |e: Event| handler(&WebEvent(e)));
        let capture = options.contains(ListenerOptions::CAPTURE);
        let opts = AddEventListenerOptions::new();
        opts.set_capture(capture);
        opts.set_passive(options.contains(ListenerOptions::PASSIVE));
        opts.set_once(options.contains(ListenerOptions::ONCE));
        if let Err(e) = target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &opts,
        ) {
            log::warn!("web: addEventListener({event}) failed: {e:?}");
        }
        WebRegistration {
            target: target.clone(),
            event: event.to_string(),
            capture,
            closure,
        }
    }

    fn remove_event_listener(&self, registration: WebRegistration) {
        let _ = registration
            .target
            .remove_event_listener_with_callback_and_bool(
                &registration.event,
                registration.closure.as_ref().unchecked_ref(),
                registration.capture,
            );
        self.defer_drop(registration.closure);
    }

    fn computed_motion_style(&self, node: &EventTarget) -> MotionStyle {
        let Some(el) = node.dyn_ref::<Element>() else {
            return MotionStyle::default();
        };
        let Ok(Some(style)) = self.window.get_computed_style(el) else {
            return MotionStyle::default();
        };
        let read = |name: &str| style.get_property_value(name).unwrap_or_default();
        MotionStyle {
            animation_name: read("animation-name"),
            animation_duration: read("animation-duration"),
            animation_iteration_count: read("animation-iteration-count"),
            transition_property: read("transition-property"),
            transition_duration: read("transition-duration"),
            transition_delay: read("transition-delay"),
        }
    }

    fn create_intersection_observer(
        &self,
        options: &IntersectionOptions<EventTarget>,
        callback: IntersectionCallback<EventTarget>,
    ) -> WebObserver {
        let closure = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _: IntersectionObserver| {
                let entries = entries
                    .iter()
                    .filter_map(|v| v.dyn_into::<IntersectionObserverEntry>().ok())
                    .map(|e| IntersectionEntry {
                        target: e.target().unchecked_into::<EventTarget>(),
                        is_intersecting: e.is_intersecting(),
                        intersection_ratio: e.intersection_ratio(),
                    })
                    .collect();
                callback(entries);
            },
        );

        let init = IntersectionObserverInit::new();
        init.set_root(options.root.as_ref().and_then(|r| r.dyn_ref::<Element>()));
        init.set_root_margin(&options.root_margin);
        let threshold: js_sys::Array = options
            .threshold
            .iter()
            .map(|t| JsValue::from_f64(*t))
            .collect();
        init.set_threshold(&threshold);

        let inner =
            match IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init) {
                Ok(o) => Some(o),
                Err(e) => {
                    log::warn!("web: IntersectionObserver unavailable: {e:?}");
                    None
                }
            };
        WebObserver {
            inner,
            _callback: closure,
        }
    }

    fn observe(&self, observer: &WebObserver, node: &EventTarget) {
        if let (Some(o), Some(el)) = (&observer.inner, node.dyn_ref::<Element>()) {
            o.observe(el);
        }
    }

    fn unobserve(&self, observer: &WebObserver, node: &EventTarget) {
        if let (Some(o), Some(el)) = (&observer.inner, node.dyn_ref::<Element>()) {
            o.unobserve(el);
        }
    }

    fn disconnect(&self, observer: &WebObserver) {
        if let Some(o) = &observer.inner {
            o.disconnect();
        }
    }

    fn upsert_style_element(&self, id: &str, css: &str) {
        if let Err(e) = self.write_style(id, css) {
            log::warn!("web: could not write <style id={id}>: {e}");
        }
    }
}
