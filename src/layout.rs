//! Terminal layout of a rendered section: a margin column for notes, a
//! gutter, and a word-wrapped text column.
//!
//! Every laid-out line remembers the character range of the section text it
//! shows, so cells can be mapped back to offsets and marks can be measured.

use crate::connector::{AnchorSource, Bounds};
use crate::palette::{Rgba, color_definition};
use crate::render::RenderedSection;
use crate::selection::CellPoint;
use crate::text_container::{OffsetRange, SelectionRange, TextContainer};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Widget;
use std::ops::Range;
use textwrap::WordSeparator;
use textwrap::core::break_words;
use textwrap::wrap_algorithms::wrap_first_fit;
use unicode_width::UnicodeWidthChar;

const MARKER_GLYPH: &str = "▍";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub margin_width: u16,
    pub gutter: u16,
    /// First laid-out line shown at the top of the area.
    pub scroll: u16,
    pub background: Rgba,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            margin_width: 24,
            gutter: 3,
            scroll: 0,
            background: Rgba::rgb(0x1B2B34),
        }
    }
}

/// A piece of one rendered mark that landed on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRun {
    /// Display column within the text column.
    pub column: u16,
    pub width: u16,
    pub text: String,
    pub range: Range<usize>,
    /// Index into `RenderedSection::marks`.
    pub mark: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub range: Range<usize>,
    pub runs: Vec<LayoutRun>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarginSlot {
    pub annotation_id: String,
    /// Line index, before scrolling.
    pub line: usize,
    pub label: String,
    pub width: u16,
}

#[derive(Debug, Clone)]
pub struct SectionLayout {
    section: RenderedSection,
    area: Rect,
    options: LayoutOptions,
    lines: Vec<LayoutLine>,
    margin: Vec<MarginSlot>,
}

fn char_width(c: char) -> u16 {
    c.width().unwrap_or(0) as u16
}

fn str_width(text: &str) -> u16 {
    // whitespace runs are never wrapped, so one line can outgrow a u16
    text.chars().fold(0u16, |width, c| width.saturating_add(char_width(c)))
}

/// Character ranges of the wrapped lines of `text`.
fn wrap_ranges(text: &str, width: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut paragraph_start = 0;

    for paragraph in text.split('\n') {
        let words = break_words(WordSeparator::AsciiSpace.find_words(paragraph), width);

        // an empty paragraph still comes back as one (empty) line
        let mut cursor = paragraph_start;
        for line in wrap_first_fit(words.as_slice(), &[width as f64]) {
            let len: usize = line
                .iter()
                .map(|word| word.word.chars().count() + word.whitespace.chars().count())
                .sum();
            ranges.push(cursor..cursor + len);
            cursor += len;
        }

        // skip the newline itself
        paragraph_start += paragraph.chars().count() + 1;
    }

    ranges
}

fn truncate_to_width(text: &str, max_width: u16) -> String {
    let mut out = String::new();
    let mut used: u16 = 0;
    for c in text.chars() {
        let w = char_width(c);
        if used.saturating_add(w) > max_width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

impl SectionLayout {
    pub fn new(section: RenderedSection, area: Rect, options: LayoutOptions) -> Self {
        let text_width = area
            .width
            .saturating_sub(options.margin_width.saturating_add(options.gutter))
            .max(1);
        let chars: Vec<char> = section.text.chars().collect();

        let lines: Vec<LayoutLine> = wrap_ranges(&section.text, usize::from(text_width))
            .into_iter()
            .map(|range| {
                let mut runs = Vec::new();
                let mut column = 0;
                for (mark, rendered) in section.marks.iter().enumerate() {
                    let start = rendered.segment.range.start.max(range.start);
                    let end = rendered.segment.range.end.min(range.end);
                    if start >= end {
                        continue;
                    }
                    let text: String = chars[start..end].iter().collect();
                    let width = str_width(&text);
                    runs.push(LayoutRun {
                        column,
                        width,
                        text,
                        range: start..end,
                        mark,
                    });
                    column = column.saturating_add(width);
                }
                LayoutLine { range, runs }
            })
            .collect();

        let margin = Self::place_margin(&section, &lines, options.margin_width);

        Self {
            section,
            area,
            options,
            lines,
            margin,
        }
    }

    /// Anchored notes sit on the line of their text, pushed down when a
    /// previous note already took that line; asides follow in free lines.
    fn place_margin(
        section: &RenderedSection,
        lines: &[LayoutLine],
        margin_width: u16,
    ) -> Vec<MarginSlot> {
        if margin_width < 2 {
            return Vec::new();
        }

        let line_of = |offset: usize| {
            lines
                .iter()
                .position(|line| offset < line.range.end.max(line.range.start + 1))
                .unwrap_or(lines.len().saturating_sub(1))
        };

        let mut next_free = 0;
        section
            .margin
            .iter()
            .map(|marker| {
                let desired = marker.anchor_offset.map(line_of).unwrap_or(next_free);
                let line = desired.max(next_free);
                next_free = line + 1;

                let note = marker
                    .note
                    .as_deref()
                    .map(str::trim)
                    .filter(|note| !note.is_empty())
                    .unwrap_or(marker.style.as_str());
                let first_line = note.lines().next().unwrap_or_default();
                let label = format!(
                    "{MARKER_GLYPH}{}",
                    truncate_to_width(first_line, margin_width - 2)
                );
                MarginSlot {
                    annotation_id: marker.annotation_id.clone(),
                    line,
                    width: str_width(&label),
                    label,
                }
            })
            .collect()
    }

    pub fn section(&self) -> &RenderedSection {
        &self.section
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn lines(&self) -> &[LayoutLine] {
        &self.lines
    }

    pub fn margin(&self) -> &[MarginSlot] {
        &self.margin
    }

    pub fn text_area(&self) -> Rect {
        let offset = self
            .options
            .margin_width
            .saturating_add(self.options.gutter)
            .min(self.area.width);
        Rect::new(
            self.area.x + offset,
            self.area.y,
            self.area.width - offset,
            self.area.height,
        )
    }

    /// Margin and gutter, where a connector may be drawn.
    pub fn connector_area(&self) -> Rect {
        let text = self.text_area();
        Rect::new(self.area.x, self.area.y, text.x - self.area.x, self.area.height)
    }

    fn line_index(&self, row: u16) -> usize {
        usize::from(row) + usize::from(self.options.scroll)
    }

    /// Screen row of a laid-out line, if it is currently visible.
    fn visible_row(&self, line: usize) -> Option<u16> {
        let line = u16::try_from(line).ok()?;
        let row = line.checked_sub(self.options.scroll)?;
        (row < self.area.height).then_some(self.area.y + row)
    }

    /// Offset of the caret sitting before `column` on `line`.
    fn line_offset_at(&self, line: &LayoutLine, column: u16) -> usize {
        let mut used: u16 = 0;
        for (idx, c) in self.section.text.chars().enumerate().skip(line.range.start) {
            if idx >= line.range.end {
                break;
            }
            let w = char_width(c);
            if column < used.saturating_add(w.max(1)) {
                return idx;
            }
            used = used.saturating_add(w);
        }
        line.range.end
    }

    /// Converts an absolute screen position to a text-column cell.
    pub fn screen_to_cell(&self, x: u16, y: u16) -> Option<CellPoint> {
        let text = self.text_area();
        if y < text.y || y >= text.bottom() || x < text.x {
            return None;
        }
        Some(CellPoint::new(y - text.y, x - text.x))
    }

    pub fn mark_at(&self, point: CellPoint) -> Option<&str> {
        let line = self.lines.get(self.line_index(point.row))?;
        let run = line
            .runs
            .iter()
            .find(|run| {
                point.column >= run.column && point.column < run.column.saturating_add(run.width)
            })?;
        self.section.marks[run.mark].annotation_id()
    }
}

impl TextContainer for SectionLayout {
    type Point = CellPoint;

    fn section_key(&self) -> &str {
        &self.section.section_key
    }

    fn plain_text(&self) -> String {
        self.section.text.clone()
    }

    /// Points are caret positions: column `n` sits before the `n`th cell.
    fn resolve_range_to_offsets(&self, range: &SelectionRange<CellPoint>) -> Option<OffsetRange> {
        let offset = |point: &CellPoint| {
            if point.row >= self.area.height {
                return None;
            }
            let line = self.lines.get(self.line_index(point.row))?;
            Some(self.line_offset_at(line, point.column))
        };
        Some(OffsetRange::new(offset(&range.anchor)?, offset(&range.focus)?))
    }
}

impl AnchorSource for SectionLayout {
    fn container_bounds(&self) -> Bounds {
        Bounds::from(self.area)
    }

    fn margin_anchor(&self, annotation_id: &str) -> Option<Bounds> {
        let slot = self
            .margin
            .iter()
            .find(|slot| slot.annotation_id == annotation_id)?;
        let row = self.visible_row(slot.line)?;
        Some(Bounds::new(
            f32::from(self.area.x),
            f32::from(row),
            f32::from(slot.width),
            1.0,
        ))
    }

    fn text_anchor(&self, annotation_id: &str) -> Option<Bounds> {
        let text = self.text_area();
        self.lines.iter().enumerate().find_map(|(idx, line)| {
            let run = line.runs.iter().find(|run| {
                self.section.marks[run.mark].annotation_id() == Some(annotation_id)
            })?;
            let row = self.visible_row(idx)?;
            Some(Bounds::new(
                f32::from(text.x.saturating_add(run.column)),
                f32::from(row),
                f32::from(run.width),
                1.0,
            ))
        })
    }
}

impl Widget for &SectionLayout {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = area.intersection(self.area);
        let text = self.text_area().intersection(area);

        for slot in &self.margin {
            let Some(row) = self.visible_row(slot.line) else {
                continue;
            };
            if row >= area.bottom() {
                continue;
            }
            let Some(marker) = self.section.margin_for(&slot.annotation_id) else {
                continue;
            };
            let stroke = color_definition(marker.color).stroke.to_color();
            let mut style = Style::default().fg(stroke);
            if marker.hovered {
                style = style.add_modifier(Modifier::BOLD);
            }
            buf.set_stringn(
                area.x,
                row,
                &slot.label,
                usize::from(self.options.margin_width),
                style,
            );
        }

        for (idx, line) in self.lines.iter().enumerate() {
            let Some(row) = self.visible_row(idx) else {
                continue;
            };
            if row >= text.bottom() {
                continue;
            }
            for run in &line.runs {
                if run.column >= text.width {
                    break;
                }
                let style = self.section.marks[run.mark].style(self.options.background);
                buf.set_stringn(
                    text.x + run.column,
                    row,
                    &run.text,
                    usize::from(text.width - run.column),
                    style,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ASIDE_OFFSET, Annotation, AnnotationStyle, ColorId};
    use crate::connector::measure_connector;
    use crate::render::render_section;
    use crate::text_container::resolve_selection;
    use chrono::{TimeZone, Utc};

    const TEXT: &str = "The team shipped the feature early.";

    fn annotation(id: &str, start: i64, end: i64, note: Option<&str>) -> Annotation {
        Annotation {
            id: id.to_string(),
            owner_id: "story-1".to_string(),
            section_key: "result".to_string(),
            start_offset: start,
            end_offset: end,
            annotated_text: String::new(),
            style: AnnotationStyle::Highlight,
            color: ColorId::Rose,
            note: note.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    fn options(margin_width: u16) -> LayoutOptions {
        LayoutOptions {
            margin_width,
            gutter: 2,
            ..LayoutOptions::default()
        }
    }

    fn layout(annotations: &[Annotation], width: u16, margin_width: u16) -> SectionLayout {
        let section = render_section("result", TEXT, annotations, None);
        SectionLayout::new(section, Rect::new(0, 0, width, 6), options(margin_width))
    }

    fn line_texts(layout: &SectionLayout) -> Vec<String> {
        layout
            .lines()
            .iter()
            .map(|line| line.runs.iter().map(|run| run.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_wrap_ranges_are_contiguous() {
        let ranges = wrap_ranges(TEXT, 12);
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, TEXT.chars().count());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_wrap_ranges_skip_newlines() {
        let ranges = wrap_ranges("one\n\ntwo", 20);
        assert_eq!(ranges, vec![0..3, 4..4, 5..8]);
    }

    #[test]
    fn test_lines_split_marks_across_wraps() {
        // text column is 12 wide
        let layout = layout(&[annotation("a1", 4, 20, None)], 14, 0);
        assert_eq!(
            line_texts(&layout),
            vec!["The team ", "shipped the ", "feature ", "early."]
        );
        let first = &layout.lines()[0];
        assert_eq!(first.runs.len(), 2);
        assert_eq!(first.runs[1].text, "team ");
        assert_eq!(first.runs[1].column, 4);
        assert_eq!(layout.lines()[1].runs[0].text, "shipped the");
    }

    #[test]
    fn test_cells_resolve_to_offsets() {
        let layout = layout(&[], 14, 0);
        let range = SelectionRange::new(CellPoint::new(1, 0), CellPoint::new(1, 7));
        let resolved = resolve_selection(&layout, &range).unwrap();
        assert_eq!(resolved.text, "shipped");
        assert_eq!((resolved.start, resolved.end), (9, 16));

        let across = SelectionRange::new(CellPoint::new(2, 3), CellPoint::new(0, 4));
        let resolved = resolve_selection(&layout, &across).unwrap();
        assert_eq!(resolved.text, "team shipped the fea");

        let past_end = SelectionRange::new(CellPoint::new(3, 0), CellPoint::new(3, 40));
        assert_eq!(resolve_selection(&layout, &past_end).unwrap().text, "early.");

        let outside = SelectionRange::new(CellPoint::new(0, 0), CellPoint::new(9, 0));
        assert_eq!(resolve_selection(&layout, &outside), None);
    }

    #[test]
    fn test_margin_slots_follow_anchor_lines() {
        let annotations = vec![
            annotation("a1", 4, 8, Some("Who was on the team?")),
            annotation("a2", 0, 3, Some("Opening")),
            annotation("aside", ASIDE_OFFSET, ASIDE_OFFSET, Some("Context for the reader")),
            annotation("a3", 29, 35, Some("How early?")),
        ];
        let layout = layout(&annotations, 26, 12);
        let slots: Vec<(&str, usize)> = layout
            .margin()
            .iter()
            .map(|slot| (slot.annotation_id.as_str(), slot.line))
            .collect();
        // a2 and a1 both start on line 0, a1 is pushed down
        assert_eq!(slots, vec![("a2", 0), ("a1", 1), ("a3", 3), ("aside", 4)]);
        assert_eq!(layout.margin()[1].label, "▍Who was on");
        assert_eq!(layout.margin()[1].width, 11);
    }

    #[test]
    fn test_anchors_and_connector() {
        let annotations = vec![annotation("a1", 9, 16, Some("Shipped"))];
        let section = render_section("result", TEXT, &annotations, Some("a1"));
        let layout = SectionLayout::new(section, Rect::new(5, 2, 26, 6), options(12));

        let margin = layout.margin_anchor("a1").unwrap();
        assert_eq!(margin, Bounds::new(5.0, 3.0, 8.0, 1.0));
        let text = layout.text_anchor("a1").unwrap();
        // text column starts at 5 + 12 + 2
        assert_eq!(text, Bounds::new(19.0, 3.0, 7.0, 1.0));

        let line = measure_connector(&layout, "a1", ColorId::Rose).unwrap();
        assert_eq!((line.from.x, line.from.y), (8.0, 1.5));
        assert_eq!((line.to.x, line.to.y), (14.0, 1.5));
    }

    #[test]
    fn test_scrolled_away_anchor_is_missing() {
        let annotations = vec![annotation("a1", 29, 35, Some("late"))];
        let section = render_section("result", TEXT, &annotations, None);
        let layout = SectionLayout::new(section, Rect::new(0, 0, 26, 1), options(12));
        assert!(layout.text_anchor("a1").is_none());
        assert!(measure_connector(&layout, "a1", ColorId::Rose).is_none());

        let no_margin = layout_without_margin();
        assert!(no_margin.margin_anchor("a1").is_none());
        assert!(no_margin.text_anchor("a1").is_some());
    }

    fn layout_without_margin() -> SectionLayout {
        layout(&[annotation("a1", 4, 8, Some("note"))], 20, 0)
    }

    #[test]
    fn test_mark_at_cell() {
        let layout = layout(&[annotation("a1", 4, 8, None)], 14, 0);
        assert_eq!(layout.mark_at(CellPoint::new(0, 5)), Some("a1"));
        assert_eq!(layout.mark_at(CellPoint::new(0, 1)), None);
        assert_eq!(layout.mark_at(CellPoint::new(7, 1)), None);
    }

    #[test]
    fn test_screen_to_cell() {
        let section = render_section("result", TEXT, &[], None);
        let layout = SectionLayout::new(section, Rect::new(2, 1, 30, 4), options(10));
        assert_eq!(layout.screen_to_cell(14, 2), Some(CellPoint::new(1, 0)));
        assert_eq!(layout.screen_to_cell(5, 2), None, "inside the margin");
        assert_eq!(layout.screen_to_cell(14, 9), None);
    }

    #[test]
    fn test_widget_renders_margin_and_text() {
        let annotations = vec![annotation("a1", 4, 8, Some("Crew"))];
        let section = render_section("result", TEXT, &annotations, None);
        let area = Rect::new(0, 0, 26, 4);
        let layout = SectionLayout::new(section, area, options(8));
        let mut buf = Buffer::empty(area);
        (&layout).render(area, &mut buf);

        let row: String = (0..26).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert_eq!(row, "▍Crew     The team shipped");
        let fill = color_definition(ColorId::Rose)
            .fill
            .over(LayoutOptions::default().background);
        assert_eq!(buf[(14, 0)].bg, fill.to_color());
    }

    #[test]
    fn test_long_whitespace_run_saturates_width() {
        let text = format!("a{}b", " ".repeat(70_000));
        let annotations = vec![annotation("a1", 0, 70_002, Some("Gap"))];
        let section = render_section("result", &text, &annotations, None);
        let area = Rect::new(0, 0, 40, 3);
        let layout = SectionLayout::new(section, area, options(8));

        let first = &layout.lines()[0];
        assert_eq!(first.runs[0].width, u16::MAX);
        assert_eq!(layout.mark_at(CellPoint::new(0, 30)), Some("a1"));

        let mut buf = Buffer::empty(area);
        (&layout).render(area, &mut buf);
        assert_eq!(buf[(10, 0)].symbol(), "a");
    }
}
