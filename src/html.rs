//! Tolerant HTML parsing into a small owned tree.
//!
//! html5ever does the tokenizing and tree repair; a private [`TreeSink`] collects
//! the result into reference-counted nodes which are then copied into plain
//! [`Node`] values so the renderers can walk them without any interior mutability.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName};

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    /// Lowercase local name (`p`, `h1`, `strong`, ...).
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a single declaration in the inline `style` attribute.
    pub fn style_property(&self, property: &str) -> Option<&str> {
        self.attr("style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            collect_text(child, &mut out);
        }
        out
    }

    /// True when a non-blank text node sits directly under this element.
    pub fn has_direct_text(&self) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, Node::Text(t) if !t.trim().is_empty()))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn heading_level(&self) -> Option<u8> {
        heading_level(&self.tag)
    }
}

pub fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(t),
        Node::Element(el) => {
            for child in &el.children {
                collect_text(child, out);
            }
        }
    }
}

/// The children of `<body>` after parsing an editor HTML string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(Node::as_element)
    }
}

/// Parse an HTML fragment. Never fails: html5ever repairs malformed markup and
/// anything it cannot place ends up outside `<body>` and is discarded.
pub fn parse_fragment(html: &str) -> Fragment {
    let sink = parse_document(FragmentSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());

    let body = find_child(&sink.document, "html").and_then(|html| find_child(&html, "body"));
    let nodes = body
        .map(|body| body.children.borrow().iter().filter_map(to_owned_node).collect())
        .unwrap_or_default();
    Fragment { nodes }
}

fn find_child(parent: &Handle, tag: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|c| matches!(&c.data, SinkData::Element { name, .. } if name.local.as_ref() == tag))
        .cloned()
}

fn to_owned_node(handle: &Handle) -> Option<Node> {
    match &handle.data {
        SinkData::Element { name, attrs } => Some(Node::Element(Element {
            tag: name.local.to_string(),
            attrs: attrs.borrow().clone(),
            children: handle
                .children
                .borrow()
                .iter()
                .filter_map(to_owned_node)
                .collect(),
        })),
        SinkData::Text(text) => Some(Node::Text(text.borrow().clone())),
        SinkData::Document | SinkData::Other => None,
    }
}

type Handle = Rc<SinkNode>;

struct SinkNode {
    data: SinkData,
    parent: RefCell<Option<Weak<SinkNode>>>,
    children: RefCell<Vec<Handle>>,
}

enum SinkData {
    Document,
    Element {
        name: QualName,
        attrs: RefCell<Vec<(String, String)>>,
    },
    Text(RefCell<String>),
    /// Comments, doctypes and processing instructions.
    Other,
}

impl SinkNode {
    fn new(data: SinkData) -> Handle {
        Rc::new(SinkNode {
            data,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }
}

fn parent_of(node: &Handle) -> Option<Handle> {
    node.parent.borrow().as_ref().and_then(Weak::upgrade)
}

fn detach(node: &Handle) {
    let parent = node.parent.borrow_mut().take().and_then(|w| w.upgrade());
    if let Some(parent) = parent {
        parent.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, node));
    }
}

fn append_text_to(parent: &Handle, text: &str) {
    if let Some(last) = parent.children.borrow().last()
        && let SinkData::Text(existing) = &last.data
    {
        existing.borrow_mut().push_str(text);
        return;
    }
    let node = SinkNode::new(SinkData::Text(RefCell::new(text.to_string())));
    *node.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(node);
}

fn append_node_to(parent: &Handle, child: Handle) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

struct FragmentSink {
    document: Handle,
}

impl FragmentSink {
    fn new() -> Self {
        Self {
            document: SinkNode::new(SinkData::Document),
        }
    }
}

impl TreeSink for FragmentSink {
    type Handle = Handle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };
        match &target.data {
            SinkData::Element { name, .. } => name,
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs
            .into_iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect();
        SinkNode::new(SinkData::Element {
            name,
            attrs: RefCell::new(attrs),
        })
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        SinkNode::new(SinkData::Other)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        SinkNode::new(SinkData::Other)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_node_to(parent, node),
            NodeOrText::AppendText(text) => append_text_to(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if parent_of(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = parent_of(sibling) else {
            return;
        };
        let Some(idx) = parent
            .children
            .borrow()
            .iter()
            .position(|c| Rc::ptr_eq(c, sibling))
        else {
            return;
        };

        let node = match new_node {
            NodeOrText::AppendText(text) => {
                if idx > 0 {
                    let prev = parent.children.borrow()[idx - 1].clone();
                    if let SinkData::Text(existing) = &prev.data {
                        existing.borrow_mut().push_str(&text);
                        return;
                    }
                }
                SinkNode::new(SinkData::Text(RefCell::new(text.to_string())))
            }
            NodeOrText::AppendNode(node) => {
                detach(&node);
                node
            }
        };

        // Detaching may have shifted the sibling's index.
        let idx = parent
            .children
            .borrow()
            .iter()
            .position(|c| Rc::ptr_eq(c, sibling))
            .unwrap_or(idx);
        *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
        parent.children.borrow_mut().insert(idx, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        if let SinkData::Element {
            attrs: existing, ..
        } = &target.data
        {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                let name = attr.name.local.to_string();
                if !existing.iter().any(|(k, _)| *k == name) {
                    existing.push((name, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in children {
            *child.parent.borrow_mut() = Some(Rc::downgrade(new_parent));
            new_parent.children.borrow_mut().push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_children_become_top_level_nodes() {
        let fragment = parse_fragment("<h1>Title</h1><p>Body <b>bold</b></p>");
        let tags: Vec<&str> = fragment.elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["h1", "p"]);
        assert_eq!(fragment.nodes[1].text_content(), "Body bold");
    }

    #[test]
    fn unclosed_tags_are_repaired() {
        let fragment = parse_fragment("<p>one<p>two<ul><li>a<li>b</ul>");
        let tags: Vec<&str> = fragment.elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["p", "p", "ul"]);
        let items: Vec<String> = fragment
            .elements()
            .last()
            .unwrap()
            .child_elements()
            .map(Element::text_content)
            .collect();
        assert_eq!(items, ["a", "b"]);
    }

    #[test]
    fn entities_and_style_lookup() {
        let fragment = parse_fragment(r#"<p><span style="color: red; FONT-SIZE: 14pt">a&amp;b</span></p>"#);
        let p = fragment.elements().next().unwrap();
        let span = p.child_elements().next().unwrap();
        assert_eq!(span.style_property("font-size"), Some("14pt"));
        assert_eq!(span.text_content(), "a&b");
    }

    #[test]
    fn comments_are_discarded() {
        let fragment = parse_fragment("<p>a<!-- note -->b</p>");
        let p = fragment.elements().next().unwrap();
        assert!(p.children.iter().all(|c| matches!(c, Node::Text(_))));
        assert_eq!(p.text_content(), "ab");
    }
}
