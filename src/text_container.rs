//! Selection-to-offset resolution.
//!
//! A rendering region exposes its visible text as the concatenation of its
//! text nodes. Offsets are always computed against that plain text, so inline
//! wrappers (strong, emphasis) never shift them.

use log::debug;
use serde::Serialize;

/// A user selection as reported by the surface. `anchor` is where the drag
/// started, `focus` where it ended; either may come first in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange<P> {
    pub anchor: P,
    pub focus: P,
}

impl<P> SelectionRange<P> {
    pub fn new(anchor: P, focus: P) -> Self {
        Self { anchor, focus }
    }
}

/// Character offsets into a section's plain text, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// A selection ready to become an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSelection {
    pub start: usize,
    pub end: usize,
    /// The selected text with surrounding whitespace removed.
    pub text: String,
}

/// The narrow capability the engine needs from a rendering surface.
pub trait TextContainer {
    type Point;

    /// Key of the section this container renders.
    fn section_key(&self) -> &str;

    fn plain_text(&self) -> String;

    /// Maps a live selection to raw character offsets, or `None` when either
    /// end lies outside this container.
    fn resolve_range_to_offsets(&self, range: &SelectionRange<Self::Point>) -> Option<OffsetRange>;
}

/// Resolves a selection to trimmed offsets and text.
///
/// Returns `None` for collapsed selections, selections outside the container
/// and selections containing only whitespace.
pub fn resolve_selection<C: TextContainer>(
    container: &C,
    range: &SelectionRange<C::Point>,
) -> Option<ResolvedSelection> {
    let offsets = container.resolve_range_to_offsets(range)?;
    if offsets.is_collapsed() {
        return None;
    }

    let text = container.plain_text();
    let selected: Vec<char> = text
        .chars()
        .skip(offsets.start)
        .take(offsets.end - offsets.start)
        .collect();

    let leading = selected.iter().take_while(|c| c.is_whitespace()).count();
    if leading == selected.len() {
        debug!("Selection {}..{} is whitespace only", offsets.start, offsets.end);
        return None;
    }
    let trailing = selected.iter().rev().take_while(|c| c.is_whitespace()).count();

    let start = offsets.start + leading;
    let end = offsets.start + selected.len() - trailing;
    Some(ResolvedSelection {
        start,
        end,
        text: selected[leading..selected.len() - trailing].iter().collect(),
    })
}

/// Inline content of a section: text nodes, possibly wrapped in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineNode {
    Text(String),
    Element {
        tag: String,
        children: Vec<InlineNode>,
    },
}

impl InlineNode {
    pub fn text(value: impl Into<String>) -> Self {
        InlineNode::Text(value.into())
    }

    pub fn element(tag: impl Into<String>, children: Vec<InlineNode>) -> Self {
        InlineNode::Element {
            tag: tag.into(),
            children,
        }
    }

    fn collect_text_nodes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            InlineNode::Text(value) => out.push(value),
            InlineNode::Element { children, .. } => {
                for child in children {
                    child.collect_text_nodes(out);
                }
            }
        }
    }
}

/// Position inside an [`InlineRegion`]: the region's key, the ordinal of a
/// text node in document order, and a character offset inside that node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePoint {
    pub region: String,
    pub text_node: usize,
    pub offset: usize,
}

impl NodePoint {
    pub fn new(region: impl Into<String>, text_node: usize, offset: usize) -> Self {
        Self {
            region: region.into(),
            text_node,
            offset,
        }
    }
}

/// A section-scoped region made of inline nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRegion {
    key: String,
    nodes: Vec<InlineNode>,
}

impl InlineRegion {
    pub fn new(key: impl Into<String>, nodes: Vec<InlineNode>) -> Self {
        Self {
            key: key.into(),
            nodes,
        }
    }

    /// Builds a region from light markup: `**strong**` and `*emphasis*`.
    /// Unbalanced markers are kept as literal text.
    pub fn from_markup(key: impl Into<String>, markup: &str) -> Self {
        Self::new(key, parse_markup(markup))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn text_nodes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.nodes {
            node.collect_text_nodes(&mut out);
        }
        out
    }

    fn point_to_offset(&self, point: &NodePoint, text_nodes: &[&str]) -> Option<usize> {
        if point.region != self.key {
            return None;
        }
        let node = text_nodes.get(point.text_node)?;
        if point.offset > node.chars().count() {
            return None;
        }
        let preceding: usize = text_nodes[..point.text_node]
            .iter()
            .map(|text| text.chars().count())
            .sum();
        Some(preceding + point.offset)
    }
}

impl TextContainer for InlineRegion {
    type Point = NodePoint;

    fn section_key(&self) -> &str {
        self.key()
    }

    fn plain_text(&self) -> String {
        self.text_nodes().concat()
    }

    fn resolve_range_to_offsets(&self, range: &SelectionRange<NodePoint>) -> Option<OffsetRange> {
        let text_nodes = self.text_nodes();
        let anchor = self.point_to_offset(&range.anchor, &text_nodes)?;
        let focus = self.point_to_offset(&range.focus, &text_nodes)?;
        Some(OffsetRange::new(anchor, focus))
    }
}

fn parse_markup(markup: &str) -> Vec<InlineNode> {
    let mut nodes = Vec::new();
    let mut plain = String::new();
    let mut rest = markup;

    while !rest.is_empty() {
        let (marker, tag) = if rest.starts_with("**") {
            ("**", "strong")
        } else if rest.starts_with('*') {
            ("*", "em")
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                plain.push(c);
            }
            rest = chars.as_str();
            continue;
        };

        let body = &rest[marker.len()..];
        match body.find(marker) {
            Some(close) if close > 0 => {
                if !plain.is_empty() {
                    nodes.push(InlineNode::Text(std::mem::take(&mut plain)));
                }
                nodes.push(InlineNode::element(tag, parse_markup(&body[..close])));
                rest = &body[close + marker.len()..];
            }
            _ => {
                plain.push_str(marker);
                rest = body;
            }
        }
    }

    if !plain.is_empty() {
        nodes.push(InlineNode::Text(plain));
    }
    nodes
}
