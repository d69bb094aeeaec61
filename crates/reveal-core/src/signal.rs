use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle returned by [`Signal::subscribe`].
    pub struct SubId;
}

type Subscriber<T> = Rc<dyn Fn(&T)>;

/// Observable value cell.
///
/// Cloning a `Signal` clones the handle, not the value. Writes made while the
/// signal is already notifying (a subscriber writing back into the signal it
/// observes) are coalesced: the current pass finishes, then every subscriber
/// is notified once more with the latest value.
pub struct Signal<T>(Rc<Inner<T>>);

struct Inner<T> {
    value: RefCell<T>,
    subs: RefCell<SlotMap<SubId, Subscriber<T>>>,
    notifying: Cell<bool>,
    dirty: Cell<bool>,
    owned: RefCell<Vec<Box<dyn Any>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&*self.0.value.borrow()).finish()
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(Inner {
            value: RefCell::new(value),
            subs: RefCell::new(SlotMap::with_key()),
            notifying: Cell::new(false),
            dirty: Cell::new(false),
            owned: RefCell::new(Vec::new()),
        }))
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.value.borrow())
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.0.subs.borrow_mut().insert(Rc::new(f))
    }

    /// Returns `false` if `id` was already removed.
    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.0.subs.borrow_mut().remove(id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subs.borrow().len()
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A handle that does not keep the cell alive.
    pub fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal(Rc::downgrade(&self.0))
    }

    /// Moves `value` into the cell; it is dropped when the last handle is.
    pub fn keep_alive(&self, value: impl Any) {
        self.0.owned.borrow_mut().push(Box::new(value));
    }
}

/// Non-owning [`Signal`] handle, see [`Signal::downgrade`].
pub struct WeakSignal<T>(Weak<Inner<T>>);

impl<T> Clone for WeakSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> WeakSignal<T> {
    pub fn upgrade(&self) -> Option<Signal<T>> {
        self.0.upgrade().map(Signal)
    }
}

impl<T: Clone> Signal<T> {
    pub fn get(&self) -> T {
        self.0.value.borrow().clone()
    }

    pub fn set(&self, v: T) {
        *self.0.value.borrow_mut() = v;
        self.notify();
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.value.borrow_mut());
        self.notify();
    }

    fn notify(&self) {
        if self.0.notifying.get() {
            self.0.dirty.set(true);
            return;
        }

        // Resets the flag even if a subscriber unwinds.
        struct Guard<'a>(&'a Cell<bool>);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }
        self.0.notifying.set(true);
        let _guard = Guard(&self.0.notifying);

        loop {
            self.0.dirty.set(false);
            let value = self.get();
            let subs: Vec<Subscriber<T>> = self.0.subs.borrow().values().cloned().collect();
            for s in subs {
                s(&value);
            }
            if !self.0.dirty.get() {
                break;
            }
        }
    }
}

pub fn signal<T>(t: T) -> Signal<T> {
    Signal::new(t)
}
