//! Page structure handed to the extractors.
//!
//! The bridge serializes the rendered DOM as a nested [`Node`] tree. On
//! deserialization it is flattened into a preorder arena: every element
//! knows its parent and the end of its subtree, so "descendants of `i`" is
//! the index range `i + 1..end`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rendered bounding box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Wire form of one element. Also the builder used to assemble snapshots
/// in tests and fakes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub tag: String,
    /// The element's own text, excluding child elements.
    pub text: String,
    pub attrs: BTreeMap<String, String>,
    pub rect: Option<Rect>,
    /// Computed CSS `color`.
    pub color: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub text: String,
    pub attrs: BTreeMap<String, String>,
    pub rect: Option<Rect>,
    pub color: Option<String>,
    pub parent: Option<usize>,
    pub depth: usize,
    /// Exclusive end of this element's subtree in the arena.
    pub end: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn own_text(&self) -> &str {
        self.text.trim()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SnapshotWire {
    url: String,
    text: String,
    root: Option<Node>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "SnapshotWire")]
pub struct PageSnapshot {
    pub url: String,
    /// Line-broken rendered body text.
    pub text: String,
    elements: Vec<Element>,
}

impl From<SnapshotWire> for PageSnapshot {
    fn from(wire: SnapshotWire) -> Self {
        match wire.root {
            Some(root) => PageSnapshot::new(&wire.url, &wire.text, root),
            None => PageSnapshot {
                url: wire.url,
                text: wire.text,
                elements: Vec::new(),
            },
        }
    }
}

impl PageSnapshot {
    /// Build a snapshot from a node tree. When `text` is empty the body text
    /// is derived from the elements' own text, one line per element.
    pub fn new(url: &str, text: &str, root: Node) -> Self {
        let mut elements = Vec::new();
        flatten(root, None, 0, &mut elements);
        let text = if text.trim().is_empty() {
            elements
                .iter()
                .map(|e| e.own_text())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            text.to_string()
        };
        Self {
            url: url.to_string(),
            text,
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Element {
        &self.elements[idx]
    }

    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.elements.iter().enumerate()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Direct children of `idx`, in document order.
    pub fn children(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut i = idx + 1;
        while i < self.elements[idx].end {
            out.push(i);
            i = self.elements[i].end;
        }
        out
    }

    /// `idx` and all its descendants, in document order.
    pub fn subtree(&self, idx: usize) -> std::ops::Range<usize> {
        idx..self.elements[idx].end
    }

    pub fn is_leaf(&self, idx: usize) -> bool {
        self.elements[idx].end == idx + 1
    }

    pub fn contains(&self, ancestor: usize, idx: usize) -> bool {
        self.subtree(ancestor).contains(&idx)
    }

    pub fn ancestors(&self, idx: usize) -> Ancestors<'_> {
        Ancestors {
            page: self,
            next: self.elements[idx].parent,
        }
    }

    /// Concatenated own text of the subtree, whitespace-joined.
    pub fn text_content(&self, idx: usize) -> String {
        self.subtree(idx)
            .map(|i| self.elements[i].own_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Leaves with non-empty text inside `idx`, in document order.
    pub fn text_leaves(&self, idx: usize) -> Vec<usize> {
        self.subtree(idx)
            .filter(|&i| !self.elements[i].own_text().is_empty())
            .collect()
    }

    /// First `href` found on `idx` or inside it.
    pub fn first_link(&self, idx: usize) -> Option<&str> {
        self.subtree(idx)
            .filter_map(|i| self.elements[i].attr("href"))
            .map(str::trim)
            .find(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
    }

    /// Resolve a link target against the page URL.
    pub fn resolve(&self, href: &str) -> String {
        match url::Url::parse(&self.url).and_then(|base| base.join(href)) {
            Ok(u) => u.to_string(),
            Err(_) => href.to_string(),
        }
    }
}

pub struct Ancestors<'a> {
    page: &'a PageSnapshot,
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cur = self.next?;
        self.next = self.page.elements[cur].parent;
        Some(cur)
    }
}

fn flatten(node: Node, parent: Option<usize>, depth: usize, out: &mut Vec<Element>) {
    let idx = out.len();
    out.push(Element {
        tag: node.tag.to_ascii_lowercase(),
        text: node.text,
        attrs: node.attrs,
        rect: node.rect,
        color: node.color,
        parent,
        depth,
        end: idx + 1,
    });
    for child in node.children {
        flatten(child, Some(idx), depth + 1, out);
    }
    out[idx].end = out.len();
}

/// Parse a CSS color (`rgb()`, `rgba()`, `#rrggbb`, `#rgb`).
pub fn parse_color(css: &str) -> Option<(u8, u8, u8)> {
    let s = css.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        let expand = |c: char| c.to_digit(16).map(|d| (d * 17) as u8);
        return match hex.len() {
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            3 => {
                let mut it = hex.chars();
                Some((expand(it.next()?)?, expand(it.next()?)?, expand(it.next()?)?))
            }
            _ => None,
        };
    }
    let inner = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f64>().ok());
    let r = parts.next()??;
    let g = parts.next()??;
    let b = parts.next()??;
    Some((r.clamp(0.0, 255.0) as u8, g.clamp(0.0, 255.0) as u8, b.clamp(0.0, 255.0) as u8))
}

/// Colored (non-gray) text. Consoles render discount and tax amounts in an
/// accent color while prices stay black or gray.
pub fn is_accent_color(css: &str) -> bool {
    match parse_color(css) {
        Some((r, g, b)) => {
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            max - min >= 48
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PageSnapshot {
        PageSnapshot::new(
            "https://pos.example.com/orders?page=1",
            "",
            Node::new("BODY").children([
                Node::new("div")
                    .attr("class", "row")
                    .child(Node::new("span").text("Shirt"))
                    .child(Node::new("a").attr("href", "/orders/7").text("Open")),
                Node::new("p").text("Footer"),
            ]),
        )
    }

    #[test]
    fn flattening_preserves_structure() {
        let page = sample();
        assert_eq!(page.len(), 5);
        assert_eq!(page.get(0).tag, "body");
        assert_eq!(page.children(0), vec![1, 4]);
        assert_eq!(page.children(1), vec![2, 3]);
        assert_eq!(page.subtree(1), 1..4);
        assert!(page.is_leaf(2));
        assert_eq!(page.ancestors(3).collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(page.get(3).depth, 2);
    }

    #[test]
    fn text_and_links() {
        let page = sample();
        assert_eq!(page.text_content(1), "Shirt Open");
        assert_eq!(page.text, "Shirt\nOpen\nFooter");
        assert_eq!(page.first_link(1), Some("/orders/7"));
        assert_eq!(page.resolve("/orders/7"), "https://pos.example.com/orders/7");
        assert_eq!(page.resolve("?page=2"), "https://pos.example.com/orders?page=2");
    }

    #[test]
    fn deserializes_bridge_json() {
        let json = serde_json::json!({
            "url": "https://pos.example.com/orders/1",
            "text": "Order 1\nTotal $5.00",
            "root": {
                "tag": "body",
                "children": [
                    {"tag": "span", "text": "Total", "rect": {"x": 0.0, "y": 0.0, "width": 10.0, "height": 5.0}},
                    {"tag": "span", "text": "$5.00", "color": "rgb(200, 0, 0)"}
                ]
            }
        });
        let page: PageSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page.lines().count(), 2);
        assert_eq!(page.get(1).rect.unwrap().center_x(), 5.0);
        assert_eq!(page.get(2).color.as_deref(), Some("rgb(200, 0, 0)"));
    }

    #[test]
    fn accent_colors() {
        assert!(is_accent_color("rgb(200, 0, 0)"));
        assert!(is_accent_color("#0a8f3c"));
        assert!(!is_accent_color("rgb(33, 33, 33)"));
        assert!(!is_accent_color("#777"));
        assert!(!is_accent_color("inherit"));
    }
}
