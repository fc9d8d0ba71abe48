//! Thin helpers over the html5ever reference-counted DOM

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// A parsed HTML fragment.
///
/// Owns the DOM: dropping the document node clears every descendant's
/// children, so handles from [`Fragment::root`] are only walkable while the
/// fragment is alive.
pub struct Fragment {
    dom: RcDom,
}

impl Fragment {
    /// The synthetic root element whose children are the fragment's
    /// top-level nodes
    pub fn root(&self) -> Handle {
        let document = &self.dom.document;
        let root = document.children.borrow().first().cloned();
        root.unwrap_or_else(|| document.clone())
    }
}

/// Parse an HTML fragment as if it were the contents of `<body>`
pub fn parse(html: &str) -> Fragment {
    let dom = parse_fragment(
        RcDom::default(),
        Default::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        vec![],
    )
    .one(html);
    Fragment { dom }
}

/// Lowercase tag name of an element node
pub fn tag(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

pub fn is_tag(node: &Handle, expected: &str) -> bool {
    tag(node) == Some(expected)
}

/// Attribute value, if present
pub fn attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == attr_name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Attribute value, treating an empty string as absent
pub fn non_empty_attr(node: &Handle, attr_name: &str) -> Option<String> {
    attr(node, attr_name).filter(|v| !v.is_empty())
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class")
        .map(|classes| classes.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

/// Text content of a text node, or `None` for anything else
pub fn text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Concatenated text of a node and all its descendants
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    if let Some(t) = text(node) {
        out.push_str(&t);
        return;
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

/// First descendant element with the given tag (depth-first, document order)
pub fn find_descendant(node: &Handle, wanted: &str) -> Option<Handle> {
    for child in node.children.borrow().iter() {
        if is_tag(child, wanted) {
            return Some(child.clone());
        }
        if let Some(found) = find_descendant(child, wanted) {
            return Some(found);
        }
    }
    None
}

/// Serialized markup of a node's children
pub fn inner_html(node: &Handle) -> String {
    let mut buf = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    if let Err(e) = serialize(&mut buf, &handle, opts) {
        tracing::warn!("Failed to serialize embed markup: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Escape text for use inside an element
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape text for use inside a double-quoted attribute
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_children() {
        let fragment = parse("<p>one</p><p>two</p>");
        let root = fragment.root();
        let kids = children(&root);
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|k| is_tag(k, "p")));
        assert_eq!(text_content(&root), "onetwo");
    }

    #[test]
    fn test_attr_and_class() {
        let fragment = parse(r#"<div class="media-embed youtube-embed" data-x="">x</div>"#);
        let root = fragment.root();
        let div = children(&root).remove(0);
        assert!(has_class(&div, "media-embed"));
        assert!(has_class(&div, "youtube-embed"));
        assert!(!has_class(&div, "embed"));
        assert_eq!(attr(&div, "data-x"), Some(String::new()));
        assert_eq!(non_empty_attr(&div, "data-x"), None);
    }

    #[test]
    fn test_inner_html() {
        let fragment = parse(r#"<div><span class="a">hi</span></div>"#);
        let root = fragment.root();
        let div = children(&root).remove(0);
        assert_eq!(inner_html(&div), r#"<span class="a">hi</span>"#);
    }

    #[test]
    fn test_nested_tree_walkable() {
        let fragment = parse("<ul><li><p>deep <em>text</em></p></li></ul>");
        let root = fragment.root();
        let ul = children(&root).remove(0);
        assert!(is_tag(&ul, "ul"));
        let em = find_descendant(&ul, "em").unwrap();
        assert_eq!(text_content(&em), "text");
        assert_eq!(text_content(&root), "deep text");
    }

    #[test]
    fn test_root_outlives_repeated_access() {
        let fragment = parse("<h1>a</h1><p>b</p>");
        assert_eq!(children(&fragment.root()).len(), 2);
        assert_eq!(children(&fragment.root()).len(), 2);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr(r#"say "hi""#), "say &quot;hi&quot;");
    }
}
