//! The create/edit popover attached to a selection or a mark.
//!
//! Persistence may resolve after the user has already moved on. Every
//! transition that abandons the current context bumps a generation counter,
//! and a create result is only accepted if it carries the generation that
//! was current when the request went out.

use crate::annotation::{
    Annotation, AnnotationId, AnnotationInput, AnnotationPatch, AnnotationStyle, ColorId,
};
use crate::store::{AnnotationService, StoreError};
use crate::text_container::ResolvedSelection;
use log::debug;

/// A resolved selection waiting for style, color and note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub section_key: String,
    pub start: usize,
    pub end: usize,
    pub annotated_text: String,
}

impl PendingSelection {
    pub fn new(section_key: impl Into<String>, selection: ResolvedSelection) -> Self {
        Self {
            section_key: section_key.into(),
            start: selection.start,
            end: selection.end,
            annotated_text: selection.text,
        }
    }

    pub fn to_input(
        &self,
        style: AnnotationStyle,
        color: ColorId,
        note: Option<String>,
    ) -> AnnotationInput {
        AnnotationInput {
            section_key: self.section_key.clone(),
            start_offset: self.start as i64,
            end_offset: self.end as i64,
            annotated_text: self.annotated_text.clone(),
            style,
            color,
            note: note.filter(|note| !note.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PopoverState {
    #[default]
    Closed,
    Create(PendingSelection),
    Edit(Annotation),
}

/// A create request in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTicket {
    generation: u64,
    pub input: AnnotationInput,
}

impl CreateTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Applied(Annotation),
    /// The popover moved on before the result arrived; nothing changed.
    Stale,
    /// The controller stays in Create so the user can retry.
    Failed(StoreError),
}

#[derive(Debug, Default)]
pub struct PopoverController {
    state: PopoverState,
    generation: u64,
}

impl PopoverController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PopoverState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, PopoverState::Closed)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The annotation being edited, if any.
    pub fn editing(&self) -> Option<&Annotation> {
        match &self.state {
            PopoverState::Edit(annotation) => Some(annotation),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        match &self.state {
            PopoverState::Create(pending) => Some(pending),
            _ => None,
        }
    }

    fn transition(&mut self, state: PopoverState) {
        self.generation += 1;
        self.state = state;
    }

    pub fn open_selection(&mut self, pending: PendingSelection) {
        debug!(
            "Popover: create for {} [{}..{}]",
            pending.section_key, pending.start, pending.end
        );
        self.transition(PopoverState::Create(pending));
    }

    pub fn open_mark(&mut self, annotation: Annotation) {
        debug!("Popover: edit {}", annotation.id);
        self.transition(PopoverState::Edit(annotation));
    }

    /// Close button, outside click and Escape all land here.
    pub fn close(&mut self) {
        if self.is_open() {
            debug!("Popover: closed");
        }
        self.transition(PopoverState::Closed);
    }

    pub fn begin_apply(
        &self,
        style: AnnotationStyle,
        color: ColorId,
        note: Option<String>,
    ) -> Option<CreateTicket> {
        let pending = self.pending()?;
        Some(CreateTicket {
            generation: self.generation,
            input: pending.to_input(style, color, note),
        })
    }

    pub fn complete_apply(
        &mut self,
        ticket: CreateTicket,
        result: Result<Annotation, StoreError>,
    ) -> ApplyOutcome {
        if ticket.generation != self.generation || self.pending().is_none() {
            debug!(
                "Popover: dropping create result for generation {} (now {})",
                ticket.generation, self.generation
            );
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(annotation) => {
                self.transition(PopoverState::Edit(annotation.clone()));
                ApplyOutcome::Applied(annotation)
            }
            Err(e) => ApplyOutcome::Failed(e),
        }
    }

    /// Create and wait for the result in one step.
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

    /// Sends `patch` for the edited annotation. On success the popover closes
    /// and the patched annotation is returned.
    pub fn save(
        &mut self,
        service: &mut AnnotationService<'_>,
        patch: &AnnotationPatch,
    ) -> Result<Option<Annotation>, StoreError> {
        let Some(annotation) = self.editing() else {
            return Ok(None);
        };
        let mut updated = annotation.clone();
        if !patch.is_empty() {
            service.update(&updated.id, patch)?;
            updated.apply_patch(patch);
        }
        self.transition(PopoverState::Closed);
        Ok(Some(updated))
    }

    /// Deletes the edited annotation and closes. Returns the removed id.
    pub fn remove(
        &mut self,
        service: &mut AnnotationService<'_>,
    ) -> Result<Option<AnnotationId>, StoreError> {
        let Some(annotation) = self.editing() else {
            return Ok(None);
        };
        let id = annotation.id.clone();
        service.delete(&id)?;
        self.transition(PopoverState::Closed);
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Owner, OwnerKind};
    use crate::test_utils::{FailingBackend, InMemoryBackend};

    fn feature_selection() -> PendingSelection {
        PendingSelection::new(
            "result",
            ResolvedSelection {
                start: 21,
                end: 28,
                text: "feature".to_string(),
            },
        )
    }

    fn owner() -> Owner {
        Owner::Story("story-1".to_string())
    }

    #[test]
    fn test_apply_highlight_moves_to_edit() {
        let mut backend = InMemoryBackend::new(OwnerKind::Story);
        let inputs = backend.inputs();
        let mut service = AnnotationService::new(owner(), &mut backend);
        let mut popover = PopoverController::new();
        popover.open_selection(feature_selection());

        let outcome = popover.apply(&mut service, AnnotationStyle::Highlight, ColorId::Rose, None);

        let sent = inputs.borrow();
        assert_eq!(
            sent.as_slice(),
            [AnnotationInput {
                section_key: "result".to_string(),
                start_offset: 21,
                end_offset: 28,
                annotated_text: "feature".to_string(),
                style: AnnotationStyle::Highlight,
                color: ColorId::Rose,
                note: None,
            }]
        );
        let ApplyOutcome::Applied(created) = outcome else {
            panic!("expected Applied, got {outcome:?}");
        };
        assert_eq!(popover.state(), &PopoverState::Edit(created));
    }

    #[test]
    fn test_failed_create_stays_in_create() {
        let mut backend = FailingBackend::new("offline");
        let mut service = AnnotationService::new(owner(), &mut backend);
        let mut popover = PopoverController::new();
        popover.open_selection(feature_selection());

        let outcome = popover.apply(&mut service, AnnotationStyle::Box, ColorId::Amber, None);
        assert!(matches!(outcome, ApplyOutcome::Failed(StoreError::Backend(_))));
        assert_eq!(popover.pending(), Some(&feature_selection()));
    }

    #[test]
    fn test_late_result_after_close_is_stale() {
        let mut backend = InMemoryBackend::new(OwnerKind::Story);
        let mut service = AnnotationService::new(owner(), &mut backend);
        let mut popover = PopoverController::new();
        popover.open_selection(feature_selection());

        let ticket = popover
            .begin_apply(AnnotationStyle::Circle, ColorId::Cyan, Some("  ".to_string()))
            .unwrap();
        assert_eq!(ticket.input.note, None, "blank notes are not sent");
        popover.close();
        let result = service.create(ticket.input.clone());

        assert!(matches!(popover.complete_apply(ticket, result), ApplyOutcome::Stale));
        assert_eq!(popover.state(), &PopoverState::Closed);
    }

    #[test]
    fn test_late_result_after_new_selection_is_stale() {
        let mut popover = PopoverController::new();
        popover.open_selection(feature_selection());
        let ticket = popover
            .begin_apply(AnnotationStyle::Underline, ColorId::Blue, None)
            .unwrap();

        let mut other = feature_selection();
        other.start = 4;
        other.end = 8;
        other.annotated_text = "team".to_string();
        popover.open_selection(other.clone());

        let outcome = popover.complete_apply(ticket, Err(StoreError::backend("late")));
        assert!(matches!(outcome, ApplyOutcome::Stale));
        assert_eq!(popover.pending(), Some(&other));
    }

    #[test]
    fn test_begin_apply_needs_create_state() {
        let popover = PopoverController::new();
        assert!(popover.begin_apply(AnnotationStyle::Box, ColorId::Amber, None).is_none());
    }

    #[test]
    fn test_save_and_remove() {
        let mut backend = InMemoryBackend::new(OwnerKind::Story);
        let mut service = AnnotationService::new(owner(), &mut backend);
        let mut popover = PopoverController::new();
        popover.open_selection(feature_selection());
        let ApplyOutcome::Applied(created) =
            popover.apply(&mut service, AnnotationStyle::Highlight, ColorId::Rose, None)
        else {
            panic!("create failed");
        };

        let saved = popover
            .save(&mut service, &AnnotationPatch::default().note("launched a week early"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.note.as_deref(), Some("launched a week early"));
        assert_eq!(popover.state(), &PopoverState::Closed);

        popover.open_mark(saved);
        let removed = popover.remove(&mut service).unwrap();
        assert_eq!(removed, Some(created.id.clone()));
        assert!(!popover.is_open());

        // already gone on the backend side
        popover.open_mark(created);
        assert!(matches!(popover.remove(&mut service), Err(StoreError::NotFound { .. })));
        assert!(popover.editing().is_some(), "failed remove keeps Edit");
    }

    #[test]
    fn test_failed_save_stays_in_edit() {
        let mut backend = FailingBackend::new("timeout");
        let mut service = AnnotationService::new(owner(), &mut backend);
        let mut popover = PopoverController::new();
        let annotation = crate::test_utils::annotation("a1", 4, 8);
        popover.open_mark(annotation.clone());

        let err = popover
            .save(&mut service, &AnnotationPatch::default().color(ColorId::Emerald))
            .unwrap_err();
        assert_eq!(err.to_string(), "backend: timeout");
        assert_eq!(popover.editing(), Some(&annotation));
    }
}
