//! In-memory element tree for response documents.

/// A parsed element with its attributes, text and children.
///
/// Responses from the source are small enough to buffer fully, so the
/// decoder works over this owned tree rather than a streaming cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name, as written in the document (after sanitization).
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated text content directly inside this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the value of an attribute (case-insensitive name match).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first direct child with the given tag (case-insensitive).
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterates the direct children with the given tag.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    /// Trimmed text of the first child with the given tag, if non-empty.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Looks a field up as a child element first, then as an attribute.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.text_of(name)
            .or_else(|| self.attr(name).map(str::trim).filter(|v| !v.is_empty()))
    }

    /// Collects every descendant (depth-first, document order) with the tag.
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    /// Collects descendants whose tag is one of `names`, without looking
    /// inside a match.
    pub fn outermost<'a>(&'a self, names: &[&str]) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_outermost(names, &mut out);
        out
    }

    fn collect_outermost<'a>(&'a self, names: &[&str], out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if names.iter().any(|n| child.name.eq_ignore_ascii_case(n)) {
                out.push(child);
            } else {
                child.collect_outermost(names, out);
            }
        }
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name.eq_ignore_ascii_case(name) {
                out.push(child);
            }
            child.collect(name, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Element {
        let mut guid = Element::new("GUID");
        guid.text = " abc-1 ".into();
        let mut empty = Element::new("PARENT");
        empty.text = "   ".into();
        Element {
            name: "LEDGER".into(),
            attributes: vec![("NAME".into(), "Cash".into())],
            text: String::new(),
            children: vec![guid, empty],
        }
    }

    #[test]
    fn field_lookup_prefers_children() {
        let el = ledger();
        assert_eq!(el.field("guid"), Some("abc-1"));
        assert_eq!(el.field("NAME"), Some("Cash"));
        assert_eq!(el.field("PARENT"), None);
        assert_eq!(el.attr("name"), Some("Cash"));
    }

    #[test]
    fn descendants_walks_nested_levels() {
        let mut root = Element::new("ENVELOPE");
        let mut body = Element::new("BODY");
        body.children.push(ledger());
        body.children.push(ledger());
        root.children.push(body);
        root.children.push(ledger());

        assert_eq!(root.descendants("LEDGER").len(), 3);
        assert!(root.child("BODY").is_some());
        assert_eq!(root.children_named("ledger").count(), 1);
    }

    #[test]
    fn outermost_stops_at_matches() {
        let mut inner = Element::new("A.LIST");
        inner.children.push(Element::new("A.LIST"));
        let mut wrapper = Element::new("WRAP");
        wrapper.children.push(inner);
        let mut root = Element::new("VOUCHER");
        root.children.push(Element::new("B.LIST"));
        root.children.push(wrapper);

        let found = root.outermost(&["a.list", "B.LIST"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "B.LIST");
        assert_eq!(found[1].children.len(), 1);
    }
}
