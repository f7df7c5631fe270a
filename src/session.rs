//! One open narrative: its sections, the cached annotations, and the
//! interaction state around them (popover, hover, terminal selection).

use crate::annotation::{
    Annotation, AnnotationInput, AnnotationPatch, AnnotationStyle, ColorId, Owner,
};
use crate::connector::{AnchorSource, ConnectorLine, HoverTracker};
use crate::document::{Section, StoryDocument};
use crate::layout::{LayoutOptions, SectionLayout};
use crate::popover::{ApplyOutcome, CreateTicket, PendingSelection, PopoverController};
use crate::render::{RenderedSection, render_section};
use crate::selection::{CellPoint, TextSelection};
use crate::settings::{get_default_color, get_default_style};
use crate::store::{AnnotationService, StoreError};
use crate::text_container::{SelectionRange, TextContainer, resolve_selection};
use log::{debug, info};
use ratatui::layout::Rect;

pub struct AnnotationSession {
    owner: Owner,
    sections: Vec<Section>,
    annotations: Vec<Annotation>,
    popover: PopoverController,
    hover: HoverTracker,
    selection: TextSelection,
    /// Section the terminal selection was started in.
    selection_section: Option<String>,
    default_style: AnnotationStyle,
    default_color: ColorId,
}

impl AnnotationSession {
    pub fn new(owner: Owner, sections: Vec<Section>, annotations: Vec<Annotation>) -> Self {
        Self {
            owner,
            sections,
            annotations,
            popover: PopoverController::new(),
            hover: HoverTracker::new(),
            selection: TextSelection::new(),
            selection_section: None,
            default_style: get_default_style(),
            default_color: get_default_color(),
        }
    }

    /// Overrides the style and color picked up from the loaded settings.
    pub fn with_defaults(mut self, style: AnnotationStyle, color: ColorId) -> Self {
        self.default_style = style;
        self.default_color = color;
        self
    }

    pub fn defaults(&self) -> (AnnotationStyle, ColorId) {
        (self.default_style, self.default_color)
    }

    pub fn from_document(document: StoryDocument) -> Self {
        Self::new(document.owner, document.sections, document.annotations)
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_text(&self, section_key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|section| section.key == section_key)
            .map(|section| section.text.as_str())
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, annotation_id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == annotation_id)
    }

    pub fn annotations_for(&self, section_key: &str) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.section_key == section_key)
            .cloned()
            .collect()
    }

    pub fn popover(&self) -> &PopoverController {
        &self.popover
    }

    pub fn hover(&self) -> &HoverTracker {
        &self.hover
    }

    pub fn selection(&self) -> &TextSelection {
        &self.selection
    }

    pub fn render_section(&self, section_key: &str) -> Option<RenderedSection> {
        let text = self.section_text(section_key)?;
        Some(render_section(
            section_key,
            text,
            &self.annotations_for(section_key),
            self.hover.hovered(),
        ))
    }

    pub fn layout_section(
        &self,
        section_key: &str,
        area: Rect,
        options: LayoutOptions,
    ) -> Option<SectionLayout> {
        Some(SectionLayout::new(
            self.render_section(section_key)?,
            area,
            options,
        ))
    }

    /// Resolves a selection made in `container` and opens the create popover.
    /// Returns false, leaving the popover untouched, when nothing usable was selected.
    pub fn select<C: TextContainer>(
        &mut self,
        section_key: &str,
        container: &C,
        range: &SelectionRange<C::Point>,
    ) -> bool {
        if container.section_key() != section_key || self.section_text(section_key).is_none() {
            debug!(
                "Ignoring selection in {:?} for section {section_key:?}",
                container.section_key()
            );
            return false;
        }
        let Some(resolved) = resolve_selection(container, range) else {
            return false;
        };
        self.popover
            .open_selection(PendingSelection::new(section_key, resolved));
        true
    }

    pub fn begin_drag(&mut self, section_key: &str, point: CellPoint) {
        self.selection.start_at(point);
        self.selection_section = Some(section_key.to_string());
    }

    pub fn drag_to(&mut self, point: CellPoint) {
        self.selection.update_end(point);
    }

    /// Button released over `layout`. Opens the create popover when the drag
    /// covered text in the section it started in.
    pub fn end_drag(&mut self, layout: &SectionLayout) -> bool {
        self.selection.finish();
        let Some(range) = self.selection.as_range() else {
            return false;
        };
        let section_key = layout.section().section_key.clone();
        if self.selection_section.as_deref() != Some(section_key.as_str()) {
            debug!("Drag ended outside its starting section");
            return false;
        }
        self.select(&section_key, layout, &range)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selection_section = None;
    }

    /// Click on a rendered mark or margin marker.
    pub fn open_mark(&mut self, annotation_id: &str) -> bool {
        let Some(annotation) = self.annotation(annotation_id).cloned() else {
            return false;
        };
        self.popover.open_mark(annotation);
        true
    }

    pub fn close_popover(&mut self) {
        self.popover.close();
    }

    pub fn begin_apply(
        &self,
        style: AnnotationStyle,
        color: ColorId,
        note: Option<String>,
    ) -> Option<CreateTicket> {
        self.popover.begin_apply(style, color, note)
    }

    pub fn complete_apply(
        &mut self,
        ticket: CreateTicket,
        result: Result<Annotation, StoreError>,
    ) -> ApplyOutcome {
        let outcome = self.popover.complete_apply(ticket, result);
        if let ApplyOutcome::Applied(annotation) = &outcome {
            info!("Created annotation {} on {}", annotation.id, annotation.section_key);
            self.annotations.push(annotation.clone());
            self.clear_selection();
        }
        outcome
    }

    pub fn apply(
        &mut self,
        service: &mut AnnotationService<'_>,
        style: AnnotationStyle,
        color: ColorId,
        note: Option<String>,
    ) -> ApplyOutcome {
        let Some(ticket) = self.begin_apply(style, color, note) else {
            return ApplyOutcome::Stale;
        };
        let result = service.create(ticket.input.clone());
        self.complete_apply(ticket, result)
    }

    /// Creates from the pending selection with the default style and color.
    pub fn apply_default(
        &mut self,
        service: &mut AnnotationService<'_>,
        note: Option<String>,
    ) -> ApplyOutcome {
        let (style, color) = self.defaults();
        self.apply(service, style, color, note)
    }

    /// Margin-only note on a section; does not touch the popover.
    pub fn add_aside(
        &mut self,
        service: &mut AnnotationService<'_>,
        section_key: &str,
        note: &str,
        color: ColorId,
    ) -> Result<Annotation, StoreError> {
        let annotation = service.create(AnnotationInput::aside(section_key, note, color))?;
        self.annotations.push(annotation.clone());
        Ok(annotation)
    }

    /// Saves the edited annotation. Returns whether anything was saved.
    pub fn save(
        &mut self,
        service: &mut AnnotationService<'_>,
        patch: &AnnotationPatch,
    ) -> Result<bool, StoreError> {
        let Some(updated) = self.popover.save(service, patch)? else {
            return Ok(false);
        };
        // a cleared note takes the margin marker, and the connector's end, with it
        if !updated.has_note()
            && !updated.is_aside()
            && self.hover.invalidate_connector(&updated.id)
        {
            debug!("Dropped connector of {} after its note was cleared", updated.id);
        }
        if let Some(cached) = self.annotations.iter_mut().find(|a| a.id == updated.id) {
            *cached = updated;
        }
        Ok(true)
    }

    /// Deletes the edited annotation. Returns whether anything was removed.
    pub fn remove(&mut self, service: &mut AnnotationService<'_>) -> Result<bool, StoreError> {
        let Some(removed) = self.popover.remove(service)? else {
            return Ok(false);
        };
        self.annotations.retain(|a| a.id != removed);
        if self.hover.forget(&removed) {
            debug!("Cleared hover on removed annotation {removed}");
        }
        Ok(true)
    }

    pub fn hover_enter<S: AnchorSource + ?Sized>(
        &mut self,
        annotation_id: &str,
        source: &S,
    ) -> Option<ConnectorLine> {
        let color = self.annotation(annotation_id)?.color;
        self.hover.hover_enter(annotation_id, color, source)
    }

    pub fn hover_leave(&mut self) {
        self.hover.hover_leave();
    }
}
