//! Seam to the persistence collaborator.
//!
//! Stories and derivations are saved through different endpoints. The
//! endpoint is picked once, from the owner's tag, when a service is handed
//! out; callers never branch on the owner kind themselves.

use crate::annotation::{Annotation, AnnotationInput, AnnotationPatch, Owner, OwnerKind};
use log::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("annotation {annotation_id} not found for {owner_id}")]
    NotFound {
        owner_id: String,
        annotation_id: String,
    },

    #[error("invalid annotation: {0}")]
    Invalid(String),

    #[error("backend: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// One owner kind's create/update/delete endpoints.
pub trait AnnotationBackend {
    fn create(&mut self, owner_id: &str, input: AnnotationInput) -> Result<Annotation, StoreError>;

    fn update(
        &mut self,
        owner_id: &str,
        annotation_id: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), StoreError>;

    fn delete(&mut self, owner_id: &str, annotation_id: &str) -> Result<(), StoreError>;
}

/// Checks the offsets of an input against the section length it targets.
pub fn validate_input(input: &AnnotationInput, section_len: usize) -> Result<(), StoreError> {
    if input.section_key.trim().is_empty() {
        return Err(StoreError::Invalid("missing section key".to_string()));
    }
    if input.is_aside() {
        return Ok(());
    }
    let (start, end) = (input.start_offset, input.end_offset);
    if start < 0 || start > end || end > section_len as i64 {
        return Err(StoreError::Invalid(format!(
            "range {start}..{end} outside section of length {section_len}"
        )));
    }
    Ok(())
}

/// The story and derivation backends side by side.
pub struct BackendRegistry {
    story: Box<dyn AnnotationBackend>,
    derivation: Box<dyn AnnotationBackend>,
}

impl BackendRegistry {
    pub fn new(story: Box<dyn AnnotationBackend>, derivation: Box<dyn AnnotationBackend>) -> Self {
        Self { story, derivation }
    }

    pub fn service(&mut self, owner: Owner) -> AnnotationService<'_> {
        let backend: &mut dyn AnnotationBackend = match owner.kind() {
            OwnerKind::Story => self.story.as_mut(),
            OwnerKind::Derivation => self.derivation.as_mut(),
        };
        AnnotationService::new(owner, backend)
    }
}

/// Persistence operations bound to a single owner.
pub struct AnnotationService<'a> {
    owner: Owner,
    backend: &'a mut dyn AnnotationBackend,
}

impl<'a> AnnotationService<'a> {
    pub fn new(owner: Owner, backend: &'a mut dyn AnnotationBackend) -> Self {
        Self { owner, backend }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn create(&mut self, input: AnnotationInput) -> Result<Annotation, StoreError> {
        debug!(
            "Creating {} annotation on {} [{}..{}]",
            input.style.as_str(),
            self.owner,
            input.start_offset,
            input.end_offset
        );
        self.backend
            .create(self.owner.id(), input)
            .inspect_err(|e| warn!("Create failed for {}: {e}", self.owner))
    }

    pub fn update(
        &mut self,
        annotation_id: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), StoreError> {
        debug!("Updating annotation {annotation_id} on {}", self.owner);
        self.backend
            .update(self.owner.id(), annotation_id, patch)
            .inspect_err(|e| warn!("Update of {annotation_id} failed: {e}"))
    }

    pub fn delete(&mut self, annotation_id: &str) -> Result<(), StoreError> {
        debug!("Deleting annotation {annotation_id} on {}", self.owner);
        self.backend
            .delete(self.owner.id(), annotation_id)
            .inspect_err(|e| warn!("Delete of {annotation_id} failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationStyle, ColorId};
    use crate::test_utils::InMemoryBackend;

    fn input(start: i64, end: i64) -> AnnotationInput {
        AnnotationInput {
            section_key: "situation".to_string(),
            start_offset: start,
            end_offset: end,
            annotated_text: "team".to_string(),
            style: AnnotationStyle::Underline,
            color: ColorId::Blue,
            note: None,
        }
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input(&input(4, 8), 35).is_ok());
        assert!(validate_input(&input(0, 35), 35).is_ok());
        assert!(validate_input(&AnnotationInput::aside("task", "n", ColorId::Amber), 0).is_ok());
        assert!(matches!(validate_input(&input(8, 4), 35), Err(StoreError::Invalid(_))));
        assert!(validate_input(&input(-2, 4), 35).is_err());
        assert!(validate_input(&input(30, 40), 35).is_err());

        let mut no_section = input(0, 1);
        no_section.section_key = " ".to_string();
        assert!(validate_input(&no_section, 35).is_err());
    }

    #[test]
    fn test_registry_routes_by_owner_tag() {
        let stories = InMemoryBackend::new(OwnerKind::Story);
        let derivations = InMemoryBackend::new(OwnerKind::Derivation);
        let story_log = stories.calls();
        let derivation_log = derivations.calls();
        let mut registry = BackendRegistry::new(Box::new(stories), Box::new(derivations));

        let created = registry
            .service(Owner::Derivation("d-1".to_string()))
            .create(input(4, 8))
            .unwrap();
        assert_eq!(created.owner_id, "d-1");
        assert!(story_log.borrow().is_empty());
        assert_eq!(derivation_log.borrow().as_slice(), ["create d-1".to_string()]);

        registry
            .service(Owner::Story("s-1".to_string()))
            .create(input(0, 3))
            .unwrap();
        assert_eq!(story_log.borrow().as_slice(), ["create s-1".to_string()]);
        assert_eq!(derivation_log.borrow().len(), 1);
    }

    #[test]
    fn test_service_propagates_not_found() {
        let mut backend = InMemoryBackend::new(OwnerKind::Story);
        let mut service = AnnotationService::new(Owner::Story("s-1".to_string()), &mut backend);
        let err = service.delete("missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(err.to_string(), "annotation missing not found for s-1");
    }
}
