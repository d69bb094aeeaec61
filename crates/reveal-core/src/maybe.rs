use crate::Signal;

/// A value that is either fixed or read from a [`Signal`].
///
/// Options and targets across the crate accept `impl Into<MaybeSignal<T>>`,
/// so callers can pass a plain value or a signal interchangeably.
pub enum MaybeSignal<T> {
    Static(T),
    Dynamic(Signal<T>),
}

impl<T: Clone> Clone for MaybeSignal<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(v) => Self::Static(v.clone()),
            Self::Dynamic(s) => Self::Dynamic(s.clone()),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MaybeSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Dynamic(s) => f.debug_tuple("Dynamic").field(s).finish(),
        }
    }
}

impl<T: Default> Default for MaybeSignal<T> {
    fn default() -> Self {
        Self::Static(T::default())
    }
}

impl<T: Clone> MaybeSignal<T> {
    pub fn get(&self) -> T {
        match self {
            Self::Static(v) => v.clone(),
            Self::Dynamic(s) => s.get(),
        }
    }
}

impl<T> MaybeSignal<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            Self::Static(v) => f(v),
            Self::Dynamic(s) => s.with(f),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

impl<T> From<T> for MaybeSignal<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

impl<T> From<Signal<T>> for MaybeSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::Dynamic(signal)
    }
}

impl<T> From<&Signal<T>> for MaybeSignal<T> {
    fn from(signal: &Signal<T>) -> Self {
        Self::Dynamic(signal.clone())
    }
}
