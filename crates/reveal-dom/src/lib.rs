//! # Enter/exit presence and DOM interaction helpers
//!
//! `reveal-dom` builds on `reveal-core` and talks to a document only through
//! the [`Dom`] trait:
//!
//! - [`create_presence`] / [`make_presence`] / [`create_item_presence`]: a
//!   mount/visibility state machine for elements that animate in and out.
//! - [`on_motion_end`] / [`create_on_motion_end`]: wait for CSS animations or
//!   transitions to finish, or learn right away that there are none.
//! - [`make_event_listener`] / [`create_event_listener`]: scoped listeners,
//!   optionally re-attached when their target or event list changes.
//! - [`click_outside`], [`VisibilityObserver`], [`mount_style`] and the
//!   class/style helpers in [`css`].
//!
//! [`MemoryDom`] is an in-memory document with a virtual clock; the browser
//! host, `WebDom`, is behind the `web` feature on `wasm32`.
//!
//! ## Presence
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use reveal_core::*;
//! use reveal_dom::*;
//!
//! let dom = Rc::new(MemoryDom::new());
//! let panel = dom.create_element();
//! dom.set_motion_style(&panel, MotionStyle::transition("opacity", "200ms"));
//!
//! let show = signal(false);
//! let presence = create_presence(&dom, &show, Some(panel), PresenceOptions::default());
//! assert_eq!(presence.phase(), PresencePhase::Idle);
//!
//! show.set(true);
//! assert_eq!(presence.phase(), PresencePhase::Entering);
//!
//! dom.dispatch(&panel, MemoryEvent::transition("transitionend", "opacity"));
//! assert_eq!(presence.phase(), PresencePhase::Entered);
//! ```
//!
//! ## Timed presence
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use reveal_core::*;
//! use reveal_dom::*;
//! use web_time::Duration;
//!
//! let dom = Rc::new(MemoryDom::new());
//! let show = signal(true);
//! let presence = make_presence(
//!     dom.clone(),
//!     &show,
//!     TimedPresenceOptions::symmetric(Duration::from_millis(150)).with_initial_enter(true),
//! );
//!
//! dom.run_frame();
//! assert!(presence.is_entering());
//! dom.advance_ms(150);
//! assert_eq!(presence.phase(), PresencePhase::Entered);
//!
//! show.set(false);
//! dom.advance_ms(150);
//! assert!(!presence.is_mounted());
//! ```

pub mod click_outside;
pub mod css;
pub mod dom;
pub mod listener;
pub mod memory;
pub mod motion;
pub mod presence;
pub mod style;
pub mod visibility;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

pub use click_outside::*;
pub use css::*;
pub use dom::*;
pub use listener::*;
pub use memory::*;
pub use motion::*;
pub use presence::*;
pub use style::*;
pub use visibility::*;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub use web::*;
