//! Mouse-drag selection state for the terminal surface

use crate::text_container::SelectionRange;

/// A cell inside a section's text column, relative to the column's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellPoint {
    pub row: u16,
    pub column: u16,
}

impl CellPoint {
    pub fn new(row: u16, column: u16) -> Self {
        Self { row, column }
    }
}

/// Text selection state
#[derive(Clone, Debug, Default)]
pub struct TextSelection {
    /// Where the drag started
    pub start: Option<CellPoint>,
    /// Where the drag currently is
    pub end: Option<CellPoint>,
    /// Whether the button is still held
    pub is_selecting: bool,
}

impl TextSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_at(&mut self, point: CellPoint) {
        self.start = Some(point);
        self.end = Some(point);
        self.is_selecting = true;
    }

    pub fn update_end(&mut self, point: CellPoint) {
        if self.is_selecting {
            self.end = Some(point);
        }
    }

    pub fn finish(&mut self) {
        self.is_selecting = false;
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
        self.is_selecting = false;
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start != end)
    }

    /// Get ordered selection bounds (start before end)
    #[must_use]
    pub fn get_ordered_bounds(&self) -> Option<(CellPoint, CellPoint)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Some((start, end)),
            (Some(start), Some(end)) => Some((end, start)),
            _ => None,
        }
    }

    /// The selection in the shape a `TextContainer` consumes, drag direction kept.
    #[must_use]
    pub fn as_range(&self) -> Option<SelectionRange<CellPoint>> {
        Some(SelectionRange::new(self.start?, self.end?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_lifecycle() {
        let mut selection = TextSelection::new();
        assert!(!selection.has_selection());

        selection.start_at(CellPoint::new(2, 10));
        assert!(!selection.has_selection(), "a click is not a selection");

        selection.update_end(CellPoint::new(1, 4));
        assert!(selection.has_selection());
        assert_eq!(
            selection.get_ordered_bounds(),
            Some((CellPoint::new(1, 4), CellPoint::new(2, 10)))
        );

        selection.finish();
        selection.update_end(CellPoint::new(5, 5));
        assert_eq!(selection.end, Some(CellPoint::new(1, 4)), "ignored after finish");

        let range = selection.as_range().unwrap();
        assert_eq!(range.anchor, CellPoint::new(2, 10));
        assert_eq!(range.focus, CellPoint::new(1, 4));

        selection.clear();
        assert!(selection.as_range().is_none());
        assert!(!selection.is_selecting);
    }
}
