//! Hover connector between a margin marker and its anchored text.
//!
//! Measurement is a synchronous pass over already laid-out regions. Both
//! anchors are expressed relative to the shared container's top-left corner.

use crate::annotation::{AnnotationId, ColorId};
use crate::palette::{Rgba, color_definition};
use log::debug;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Self::new(
            f32::from(rect.x),
            f32::from(rect.y),
            f32::from(rect.width),
            f32::from(rect.height),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectorLine {
    /// Trailing edge of the margin marker, vertically centered.
    pub from: Point,
    /// Leading edge of the text mark, vertically centered.
    pub to: Point,
    pub color: ColorId,
}

impl ConnectorLine {
    pub fn stroke(&self) -> Rgba {
        color_definition(self.color).stroke
    }
}

/// Line from `margin`'s right edge to `text`'s left edge, both at their
/// vertical centers, in container-relative coordinates. `None` when either
/// anchor is missing.
pub fn compute_connector(
    container: Bounds,
    margin: Option<Bounds>,
    text: Option<Bounds>,
    color: ColorId,
) -> Option<ConnectorLine> {
    let (margin, text) = (margin?, text?);
    Some(ConnectorLine {
        from: Point {
            x: margin.right() - container.x,
            y: margin.center_y() - container.y,
        },
        to: Point {
            x: text.x - container.x,
            y: text.center_y() - container.y,
        },
        color,
    })
}

/// A laid-out surface able to report where an annotation's elements ended up.
pub trait AnchorSource {
    fn container_bounds(&self) -> Bounds;
    fn margin_anchor(&self, annotation_id: &str) -> Option<Bounds>;
    fn text_anchor(&self, annotation_id: &str) -> Option<Bounds>;
}

pub fn measure_connector<S: AnchorSource + ?Sized>(
    source: &S,
    annotation_id: &str,
    color: ColorId,
) -> Option<ConnectorLine> {
    compute_connector(
        source.container_bounds(),
        source.margin_anchor(annotation_id),
        source.text_anchor(annotation_id),
        color,
    )
}

/// The single active hover target and its connector, if one could be drawn.
#[derive(Debug, Clone, Default)]
pub struct HoverTracker {
    hovered: Option<AnnotationId>,
    connector: Option<ConnectorLine>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous target and re-measures.
    pub fn hover_enter<S: AnchorSource + ?Sized>(
        &mut self,
        annotation_id: &str,
        color: ColorId,
        source: &S,
    ) -> Option<ConnectorLine> {
        self.hovered = Some(annotation_id.to_string());
        self.connector = measure_connector(source, annotation_id, color);
        if self.connector.is_none() {
            debug!("No connector for {annotation_id}: an anchor is not rendered");
        }
        self.connector
    }

    pub fn hover_leave(&mut self) {
        self.hovered = None;
        self.connector = None;
    }

    /// Drops the hover state if it points at `annotation_id`. Returns whether it did.
    pub fn forget(&mut self, annotation_id: &str) -> bool {
        if self.hovered.as_deref() == Some(annotation_id) {
            self.hover_leave();
            true
        } else {
            false
        }
    }

    /// Drops the connector of `annotation_id` while it stays hovered, for an
    /// annotation that lost its margin anchor. Returns whether a line was dropped.
    pub fn invalidate_connector(&mut self, annotation_id: &str) -> bool {
        if self.hovered.as_deref() != Some(annotation_id) {
            return false;
        }
        self.connector.take().is_some()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn connector(&self) -> Option<&ConnectorLine> {
        self.connector.as_ref()
    }
}

/// Draws a connector as box-drawing glyphs. Only blank cells inside `clip`
/// are touched, so labels and text already in the buffer stay intact.
#[derive(Debug, Clone)]
pub struct ConnectorWidget<'a> {
    line: &'a ConnectorLine,
    container: Rect,
    clip: Option<Rect>,
}

impl<'a> ConnectorWidget<'a> {
    pub fn new(line: &'a ConnectorLine, container: Rect) -> Self {
        Self {
            line,
            container,
            clip: None,
        }
    }

    pub fn clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }

    fn put(&self, buf: &mut Buffer, area: Rect, x: i32, y: i32, symbol: &str, style: Style) {
        let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y)) else {
            return;
        };
        let inside = |rect: Rect| {
            x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
        };
        if !inside(area) || self.clip.is_some_and(|clip| !inside(clip)) {
            return;
        }
        if let Some(cell) = buf.cell_mut((x, y))
            && cell.symbol() == " "
        {
            cell.set_symbol(symbol).set_style(style);
        }
    }
}

impl Widget for ConnectorWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(self.line.stroke().to_color());
        let origin_x = i32::from(self.container.x);
        let origin_y = i32::from(self.container.y);

        let from_x = origin_x + self.line.from.x.floor() as i32;
        let from_y = origin_y + self.line.from.y.floor() as i32;
        // last cell before the text mark
        let to_x = origin_x + self.line.to.x.ceil() as i32 - 1;
        let to_y = origin_y + self.line.to.y.floor() as i32;

        if to_x < from_x {
            return;
        }

        if from_y == to_y {
            for x in from_x..=to_x {
                self.put(buf, area, x, from_y, "─", style);
            }
            return;
        }

        let elbow = from_x + (to_x - from_x) / 2;
        let down = to_y > from_y;
        for x in from_x..elbow {
            self.put(buf, area, x, from_y, "─", style);
        }
        self.put(buf, area, elbow, from_y, if down { "┐" } else { "┘" }, style);
        let (top, bottom) = if down { (from_y, to_y) } else { (to_y, from_y) };
        for y in top + 1..bottom {
            self.put(buf, area, elbow, y, "│", style);
        }
        self.put(buf, area, elbow, to_y, if down { "└" } else { "┌" }, style);
        for x in elbow + 1..=to_x {
            self.put(buf, area, x, to_y, "─", style);
        }
    }
}
