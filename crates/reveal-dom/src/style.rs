use parking_lot::Mutex;

use crate::Dom;

/// Ids of `<style>` elements this process has already injected.
///
/// Entries are never removed. A registry is usually a `static` shared by every
/// component that injects styles:
///
/// ```rust
/// use reveal_dom::StyleRegistry;
///
/// static STYLES: StyleRegistry = StyleRegistry::new();
/// assert!(!STYLES.contains("toast"));
/// ```
pub struct StyleRegistry {
    mounted: Mutex<Vec<String>>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    pub const fn new() -> Self {
        Self {
            mounted: parking_lot::const_mutex(Vec::new()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mounted.lock().iter().any(|m| m == id)
    }

    pub fn len(&self) -> usize {
        self.mounted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.lock().is_empty()
    }

    fn record(&self, id: &str) {
        let mut mounted = self.mounted.lock();
        if !mounted.iter().any(|m| m == id) {
            mounted.push(id.to_string());
        }
    }
}

/// Like [`mount_style`], computing the CSS only when it is actually written.
pub fn mount_style_with<D: Dom>(
    dom: &D,
    registry: &StyleRegistry,
    id: &str,
    refresh: bool,
    css: impl FnOnce() -> String,
) -> bool {
    if registry.contains(id) && !refresh {
        return false;
    }
    dom.upsert_style_element(id, &css());
    registry.record(id);
    log::debug!("style: mounted <style id={id}> (refresh: {refresh})");
    true
}

/// Writes `css` into `<style id=..>` in the document head.
///
/// An id already in `registry` is left alone unless `refresh` is set, in
/// which case its text is replaced. Returns whether anything was written.
pub fn mount_style<D: Dom>(
    dom: &D,
    registry: &StyleRegistry,
    css: &str,
    id: &str,
    refresh: bool,
) -> bool {
    mount_style_with(dom, registry, id, refresh, || css.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::MemoryDom;

    #[test]
    fn mounts_once_unless_refreshed() {
        let dom = MemoryDom::new();
        let registry = StyleRegistry::new();

        assert!(mount_style(&dom, &registry, ".a{}", "theme", false));
        assert!(!mount_style(&dom, &registry, ".b{}", "theme", false));
        assert_eq!(dom.style_text("theme").as_deref(), Some(".a{}"));

        assert!(mount_style(&dom, &registry, ".b{}", "theme", true));
        assert_eq!(dom.style_text("theme").as_deref(), Some(".b{}"));
        assert_eq!(dom.style_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registries_are_independent() {
        let dom = MemoryDom::new();
        let first = StyleRegistry::new();
        let second = StyleRegistry::default();

        mount_style(&dom, &first, ".a{}", "x", false);
        assert!(first.contains("x"));
        assert!(second.is_empty());
        assert!(mount_style(&dom, &second, ".c{}", "x", false));
        assert_eq!(dom.style_writes(), 2);
    }

    #[test]
    fn lazy_css_is_not_built_when_skipped() {
        let dom = MemoryDom::new();
        let registry = StyleRegistry::new();
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            ".lazy{}".to_string()
        };

        mount_style_with(&dom, &registry, "lazy", false, build);
        mount_style_with(&dom, &registry, "lazy", false, build);
        assert_eq!(builds.get(), 1);
    }
}
