use std::fmt;

/// Joins class names with spaces, skipping absent and empty entries.
///
/// ```rust
/// use reveal_dom::combine_class;
///
/// assert_eq!(combine_class("btn", [Some("primary"), None, Some("")]), "btn primary");
/// assert_eq!(combine_class("", ["a", "b"]), "a b");
/// ```
pub fn combine_class<'a, I, S>(default: &'a str, others: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<Option<&'a str>>,
{
    std::iter::once(Some(default))
        .chain(others.into_iter().map(Into::into))
        .flatten()
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inline style declarations in insertion order. Inserting an existing
/// property replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleMap(Vec<(String, String)>);

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<String>) {
        let property = property.into();
        let value = value.into();
        match self.0.iter_mut().find(|(p, _)| *p == property) {
            Some(slot) => slot.1 = value,
            None => self.0.push((property, value)),
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StyleMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = StyleMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl fmt::Display for StyleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (p, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{p}: {v};")?;
        }
        Ok(())
    }
}

fn is_property_name(name: &str) -> bool {
    let body = name.strip_prefix("--").unwrap_or(name);
    !body.is_empty()
        && !body.starts_with('-')
        && !body.contains("--")
        && body.chars().all(|c| c == '-' || c == '_' || c.is_alphanumeric())
}

/// Parses `"color: red; --gap: 4px"` into a [`StyleMap`].
///
/// Declarations without a colon or with a malformed property name are
/// dropped. Values keep everything up to the next `;`, trimmed.
pub fn parse_inline_style(style: &str) -> StyleMap {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            is_property_name(name).then(|| (name, value.trim()))
        })
        .collect()
}

/// Second argument of [`combine_style`].
#[derive(Clone, Copy, Debug, Default)]
pub enum StyleSource<'a> {
    #[default]
    None,
    Inline(&'a str),
    Map(&'a StyleMap),
}

impl<'a> From<&'a str> for StyleSource<'a> {
    fn from(s: &'a str) -> Self {
        StyleSource::Inline(s)
    }
}

impl<'a> From<Option<&'a str>> for StyleSource<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(StyleSource::None, StyleSource::Inline)
    }
}

impl<'a> From<&'a StyleMap> for StyleSource<'a> {
    fn from(m: &'a StyleMap) -> Self {
        StyleSource::Map(m)
    }
}

impl<'a> From<Option<&'a StyleMap>> for StyleSource<'a> {
    fn from(m: Option<&'a StyleMap>) -> Self {
        m.map_or(StyleSource::None, StyleSource::Map)
    }
}

/// Merges `extra` over `base`. Properties in `extra` win; order follows
/// `base` with new properties appended.
pub fn combine_style<'a>(base: &StyleMap, extra: impl Into<StyleSource<'a>>) -> StyleMap {
    let mut out = base.clone();
    match extra.into() {
        StyleSource::None => {}
        StyleSource::Inline(s) => {
            for (p, v) in parse_inline_style(s).0 {
                out.insert(p, v);
            }
        }
        StyleSource::Map(m) => {
            for (p, v) in m.iter() {
                out.insert(p, v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names() {
        assert_eq!(combine_class("a", [Some("b"), Some("c")]), "a b c");
        assert_eq!(combine_class("a", [None, Some("c")]), "a c");
        assert_eq!(combine_class("", Vec::<Option<&str>>::new()), "");
        assert_eq!(combine_class("solo", std::iter::empty::<&str>()), "solo");
    }

    #[test]
    fn parses_inline_declarations() {
        let map = parse_inline_style("background-color: blue; font-size:14px ;--accent : #f00;");
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("background-color"), Some("blue"));
        assert_eq!(map.get("font-size"), Some("14px"));
        assert_eq!(map.get("--accent"), Some("#f00"));
    }

    #[test]
    fn keeps_colons_inside_values() {
        let map = parse_inline_style("background: url(http://x/y.png) no-repeat");
        assert_eq!(map.get("background"), Some("url(http://x/y.png) no-repeat"));
    }

    #[test]
    fn drops_malformed_declarations() {
        let map = parse_inline_style("color red; : blue; -bad: 1; ok: 2;;");
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("ok", "2")]);
    }

    #[test]
    fn combine_overrides_and_appends() {
        let base: StyleMap = [("color", "red"), ("margin", "0")].into_iter().collect();

        let merged = combine_style(&base, "margin: 4px; padding: 2px");
        assert_eq!(merged.to_string(), "color: red; margin: 4px; padding: 2px;");

        let extra: StyleMap = [("color", "blue")].into_iter().collect();
        let merged = combine_style(&base, &extra);
        assert_eq!(merged.get("color"), Some("blue"));
        assert_eq!(merged.get("margin"), Some("0"));
    }

    #[test]
    fn combine_with_nothing_is_a_copy() {
        let base = parse_inline_style("color: red");
        assert_eq!(combine_style(&base, None::<&str>), base);
        assert_eq!(combine_style(&base, StyleSource::None), base);
    }
}
