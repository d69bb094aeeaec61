//! # Signals, scopes and timing
//!
//! `reveal-core` is the host-independent half of Reveal. It knows nothing
//! about documents or elements; it provides the pieces the DOM utilities are
//! built from:
//!
//! - `Signal<T>`: observable value cell, and `MaybeSignal<T>` for options that
//!   may be either fixed or reactive.
//! - `Scope` / `Dispose`: ownership of registrations. Anything created inside
//!   `Scope::run` is released when the scope is disposed.
//! - `watch` / `watch_fold`: explicit-dependency watchers with previous-value
//!   tracking.
//! - `ReactiveList`: a `Signal<Vec<T>>` with insert/remove/swap/move/sort.
//! - `Scheduler`: timers and animation frames as an injected capability, with
//!   `ManualScheduler` for tests.
//! - `loop_exec`, `debounce`, `throttle`, `debounced_watch`: timing helpers.
//! - `color`: hex, sRGB and OKLCH conversions.
//!
//! ## Signals
//!
//! ```rust
//! use reveal_core::*;
//!
//! let count = signal(0);
//! count.set(1);
//! count.update(|v| *v += 1);
//! assert_eq!(count.get(), 2);
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use reveal_core::*;
//! use std::{cell::Cell, rc::Rc};
//!
//! let runs = Rc::new(Cell::new(0));
//! let scope = Scope::new();
//! let count = signal(0);
//!
//! scope.run(|| {
//!     let runs = runs.clone();
//!     watch(count.clone(), move |_, _| runs.set(runs.get() + 1), WatchOptions::default());
//! });
//!
//! count.set(1);
//! scope.dispose();
//! count.set(2);
//! assert_eq!(runs.get(), 2);
//! ```
//!
//! ## Loops on virtual time
//!
//! ```rust
//! use reveal_core::*;
//! use std::{cell::Cell, rc::Rc};
//!
//! let scheduler = Rc::new(ManualScheduler::new());
//! let ticks = Rc::new(Cell::new(0));
//!
//! let handle = loop_exec(
//!     scheduler.clone(),
//!     {
//!         let ticks = ticks.clone();
//!         move || -> Result<(), std::convert::Infallible> {
//!             ticks.set(ticks.get() + 1);
//!             Ok(())
//!         }
//!     },
//!     Some(100),
//! );
//!
//! scheduler.advance_ms(250);
//! assert_eq!(ticks.get(), 3);
//! handle.dispose();
//! ```

pub mod color;
pub mod effects;
pub mod list;
pub mod maybe;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod timing;
pub mod watch;

pub use color::*;
pub use effects::*;
pub use list::*;
pub use maybe::*;
pub use scheduler::*;
pub use scope::*;
pub use signal::*;
pub use timing::*;
pub use watch::*;
