use crate::annotation::{Annotation, AnnotationId, AnnotationStyle, ColorId};
use crate::palette::{Decoration, MarkVisual, Rgba, hover_shadow, mark_visual};
use crate::span_splitter::{Segment, split};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Serialize;

const MARK_PREFIX: &str = "annotation-mark-";
const MARGIN_PREFIX: &str = "annotation-margin-";

/// Which rendered element an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Mark,
    Margin,
}

pub fn mark_element_id(annotation_id: &str) -> String {
    format!("{MARK_PREFIX}{annotation_id}")
}

pub fn margin_element_id(annotation_id: &str) -> String {
    format!("{MARGIN_PREFIX}{annotation_id}")
}

/// Reverse of [`mark_element_id`] / [`margin_element_id`].
pub fn parse_element_id(element_id: &str) -> Option<(ElementKind, &str)> {
    if let Some(id) = element_id.strip_prefix(MARK_PREFIX) {
        return (!id.is_empty()).then_some((ElementKind::Mark, id));
    }
    if let Some(id) = element_id.strip_prefix(MARGIN_PREFIX) {
        return (!id.is_empty()).then_some((ElementKind::Margin, id));
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMark {
    pub segment: Segment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<MarkVisual>,
    pub hovered: bool,
}

impl RenderedMark {
    pub fn annotation_id(&self) -> Option<&str> {
        self.segment.annotation_id.as_deref()
    }

    /// Terminal style for this mark. `background` is the surface color the
    /// translucent fills are blended onto.
    pub fn style(&self, background: Rgba) -> Style {
        let Some(visual) = &self.visual else {
            return Style::default();
        };

        let mut style = Style::default();
        if let Some(fill) = visual.fill {
            style = style.bg(fill.over(background).to_color());
        }
        if let Some(stroke) = visual.stroke {
            let stroke = stroke.to_color();
            style = match visual.decoration {
                Decoration::Underline => style
                    .add_modifier(Modifier::UNDERLINED)
                    .underline_color(stroke),
                Decoration::Border => style.fg(stroke).add_modifier(Modifier::BOLD),
                Decoration::Ellipse => style.fg(stroke).add_modifier(Modifier::ITALIC),
                Decoration::Brackets => style
                    .fg(stroke)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
                Decoration::Background | Decoration::MarginOnly => style.fg(stroke),
            };
        }
        if self.hovered {
            let ring = hover_shadow(visual.color).color.over(background);
            style = style.bg(ring.to_color());
        }
        style
    }
}

/// Margin entry for an aside or for a mark that carries a note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginMarker {
    pub annotation_id: AnnotationId,
    pub element_id: String,
    pub style: AnnotationStyle,
    pub color: ColorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub is_aside: bool,
    /// Character offset of the anchored text, `None` for asides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_offset: Option<usize>,
    pub hovered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    pub section_key: String,
    pub text: String,
    pub marks: Vec<RenderedMark>,
    pub margin: Vec<MarginMarker>,
}

impl RenderedSection {
    pub fn mark_for(&self, annotation_id: &str) -> Option<&RenderedMark> {
        self.marks
            .iter()
            .find(|mark| mark.annotation_id() == Some(annotation_id))
    }

    pub fn margin_for(&self, annotation_id: &str) -> Option<&MarginMarker> {
        self.margin
            .iter()
            .find(|marker| marker.annotation_id == annotation_id)
    }

    /// Single-line rendition, before any wrapping.
    pub fn to_line(&self, background: Rgba) -> Line<'static> {
        Line::from(
            self.marks
                .iter()
                .filter(|mark| !mark.segment.text.is_empty())
                .map(|mark| Span::styled(mark.segment.text.clone(), mark.style(background)))
                .collect::<Vec<_>>(),
        )
    }
}

/// Lists margin entries: anchored notes in text order, then asides by creation time.
pub fn margin_markers(
    text_len: usize,
    annotations: &[Annotation],
    hovered: Option<&str>,
) -> Vec<MarginMarker> {
    let mut anchored: Vec<(usize, &Annotation)> = annotations
        .iter()
        .filter(|annotation| !annotation.is_aside() && annotation.has_note())
        .filter_map(|annotation| {
            let range = annotation.anchor()?;
            (range.start < text_len).then_some((range.start, annotation))
        })
        .collect();
    anchored.sort_by(|(a_offset, a), (b_offset, b)| {
        a_offset.cmp(b_offset).then(a.created_at.cmp(&b.created_at))
    });

    let mut asides: Vec<&Annotation> = annotations.iter().filter(|a| a.is_aside()).collect();
    asides.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    anchored
        .into_iter()
        .map(|(offset, annotation)| (Some(offset), annotation))
        .chain(asides.into_iter().map(|annotation| (None, annotation)))
        .map(|(anchor_offset, annotation)| MarginMarker {
            annotation_id: annotation.id.clone(),
            element_id: margin_element_id(&annotation.id),
            style: annotation.style,
            color: annotation.color,
            note: annotation.note.clone(),
            is_aside: anchor_offset.is_none(),
            anchor_offset,
            hovered: hovered == Some(annotation.id.as_str()),
        })
        .collect()
}

/// Splits a section and attaches identifiers and visuals to every segment.
pub fn render_section(
    section_key: &str,
    text: &str,
    annotations: &[Annotation],
    hovered: Option<&str>,
) -> RenderedSection {
    let marks = split(text, annotations)
        .into_iter()
        .map(|segment| {
            let annotation = segment
                .annotation_id
                .as_deref()
                .and_then(|id| annotations.iter().find(|a| a.id == id));
            RenderedMark {
                element_id: annotation.map(|a| mark_element_id(&a.id)),
                visual: annotation.map(|a| mark_visual(a.style, a.color)),
                hovered: annotation.is_some_and(|a| hovered == Some(a.id.as_str())),
                segment,
            }
        })
        .collect();

    RenderedSection {
        section_key: section_key.to_string(),
        text: text.to_string(),
        marks,
        margin: margin_markers(text.chars().count(), annotations, hovered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ASIDE_OFFSET;
    use crate::palette::color_definition;
    use chrono::{TimeZone, Utc};
    use ratatui::style::Color;

    const TEXT: &str = "The team shipped the feature early.";

    fn annotation(id: &str, start: i64, end: i64, note: Option<&str>) -> Annotation {
        Annotation {
            id: id.to_string(),
            owner_id: "story-1".to_string(),
            section_key: "result".to_string(),
            start_offset: start,
            end_offset: end,
            annotated_text: String::new(),
            style: AnnotationStyle::Underline,
            color: ColorId::Blue,
            note: note.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_element_ids_round_trip() {
        assert_eq!(mark_element_id("a1"), "annotation-mark-a1");
        assert_eq!(
            parse_element_id("annotation-margin-a1"),
            Some((ElementKind::Margin, "a1"))
        );
        assert_eq!(parse_element_id(&mark_element_id("x")), Some((ElementKind::Mark, "x")));
        assert_eq!(parse_element_id("annotation-mark-"), None);
        assert_eq!(parse_element_id("sidebar"), None);
    }

    #[test]
    fn test_render_section_tags_annotated_segments() {
        let section = render_section("result", TEXT, &[annotation("a1", 4, 8, None)], None);
        assert_eq!(section.marks.len(), 3);
        assert_eq!(section.marks[0].element_id, None);
        assert_eq!(section.marks[1].element_id.as_deref(), Some("annotation-mark-a1"));
        let visual = section.marks[1].visual.unwrap();
        assert_eq!(visual.style, AnnotationStyle::Underline);
        assert_eq!(visual.color, ColorId::Blue);
        assert!(section.margin.is_empty(), "no note, no margin entry");
    }

    #[test]
    fn test_margin_lists_notes_then_asides() {
        let mut later_aside = annotation("aside-2", ASIDE_OFFSET, ASIDE_OFFSET, Some("second"));
        later_aside.created_at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        let annotations = vec![
            later_aside,
            annotation("late", 21, 28, Some("why early?")),
            annotation("aside-1", ASIDE_OFFSET, ASIDE_OFFSET, Some("first")),
            annotation("early", 4, 8, Some("who?")),
            annotation("silent", 9, 16, None),
        ];

        let section = render_section("result", TEXT, &annotations, Some("late"));
        let ids: Vec<&str> = section.margin.iter().map(|m| m.annotation_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "aside-1", "aside-2"]);
        assert_eq!(section.margin[0].anchor_offset, Some(4));
        assert!(section.margin[2].is_aside);
        assert!(section.margin_for("late").unwrap().hovered);
        assert!(section.mark_for("late").unwrap().hovered);
        assert!(section.mark_for("aside-1").is_none());
    }

    #[test]
    fn test_terminal_styles() {
        let background = Rgba::rgb(0x000000);
        let section = render_section("result", TEXT, &[annotation("a1", 4, 8, None)], None);
        let style = section.marks[1].style(background);
        let stroke = color_definition(ColorId::Blue).stroke;
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
        assert_eq!(style.underline_color, Some(Color::Rgb(stroke.r, stroke.g, stroke.b)));
        assert_eq!(section.marks[0].style(background), Style::default());

        let mut highlight = annotation("h", 4, 8, None);
        highlight.style = AnnotationStyle::Highlight;
        let section = render_section("result", TEXT, &[highlight], None);
        let fill = color_definition(ColorId::Blue).fill.over(background);
        assert_eq!(section.marks[1].style(background).bg, Some(fill.to_color()));
    }

    #[test]
    fn test_hovered_mark_gets_ring_background() {
        let background = Rgba::rgb(0x1B2B34);
        let section = render_section("result", TEXT, &[annotation("a1", 4, 8, None)], Some("a1"));
        let ring = hover_shadow(ColorId::Blue).color.over(background);
        assert_eq!(section.marks[1].style(background).bg, Some(ring.to_color()));
    }

    #[test]
    fn test_to_line_preserves_text() {
        let section = render_section("result", TEXT, &[annotation("a1", 4, 8, None)], None);
        let line = section.to_line(Rgba::rgb(0x000000));
        let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
        assert_eq!(text, TEXT);
        assert_eq!(line.spans.len(), 3);
    }
}
