//! Backends and fixtures shared by unit and integration tests.

use crate::annotation::{
    Annotation, AnnotationId, AnnotationInput, AnnotationPatch, AnnotationStyle, ColorId,
    OwnerKind,
};
use crate::store::{AnnotationBackend, StoreError, validate_input};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const SCENARIO_TEXT: &str = "The team shipped the feature early.";

/// Keeps annotations in memory and records every call it receives.
///
/// Creation times advance one second per create, so later creates always
/// win overlaps.
pub struct InMemoryBackend {
    kind: OwnerKind,
    epoch: DateTime<Utc>,
    sequence: i64,
    section_lengths: HashMap<String, usize>,
    records: HashMap<AnnotationId, Annotation>,
    calls: Rc<RefCell<Vec<String>>>,
    inputs: Rc<RefCell<Vec<AnnotationInput>>>,
}

impl InMemoryBackend {
    pub fn new(kind: OwnerKind) -> Self {
        Self {
            kind,
            epoch: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            sequence: 0,
            section_lengths: HashMap::new(),
            records: HashMap::new(),
            calls: Rc::new(RefCell::new(Vec::new())),
            inputs: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Enables range validation against `text` for `section_key`.
    pub fn with_section(mut self, section_key: &str, text: &str) -> Self {
        self.section_lengths
            .insert(section_key.to_string(), text.chars().count());
        self
    }

    /// Shared log of `"<op> <owner>"` entries, readable after the backend is boxed.
    pub fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }

    pub fn inputs(&self) -> Rc<RefCell<Vec<AnnotationInput>>> {
        Rc::clone(&self.inputs)
    }

    pub fn get(&self, annotation_id: &str) -> Option<&Annotation> {
        self.records.get(annotation_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, op: &str, owner_id: &str) {
        self.calls.borrow_mut().push(format!("{op} {owner_id}"));
    }

    fn owned_mut(
        &mut self,
        owner_id: &str,
        annotation_id: &str,
    ) -> Result<&mut Annotation, StoreError> {
        self.records
            .get_mut(annotation_id)
            .filter(|annotation| annotation.owner_id == owner_id)
            .ok_or_else(|| StoreError::NotFound {
                owner_id: owner_id.to_string(),
                annotation_id: annotation_id.to_string(),
            })
    }
}

impl AnnotationBackend for InMemoryBackend {
    fn create(&mut self, owner_id: &str, input: AnnotationInput) -> Result<Annotation, StoreError> {
        self.record("create", owner_id);
        self.inputs.borrow_mut().push(input.clone());

        let section_len = self
            .section_lengths
            .get(&input.section_key)
            .copied()
            .unwrap_or(usize::MAX >> 1);
        validate_input(&input, section_len)?;

        self.sequence += 1;
        let digest = md5::compute(format!(
            "{}:{owner_id}:{}:{}",
            self.kind.as_str(),
            input.section_key,
            self.sequence
        ));
        let id = format!("{digest:x}")[..12].to_string();
        let created_at = self.epoch + Duration::seconds(self.sequence);

        let annotation = input.into_annotation(id.clone(), owner_id, created_at);
        self.records.insert(id, annotation.clone());
        Ok(annotation)
    }

    fn update(
        &mut self,
        owner_id: &str,
        annotation_id: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), StoreError> {
        self.record("update", owner_id);
        self.owned_mut(owner_id, annotation_id)?.apply_patch(patch);
        Ok(())
    }

    fn delete(&mut self, owner_id: &str, annotation_id: &str) -> Result<(), StoreError> {
        self.record("delete", owner_id);
        self.owned_mut(owner_id, annotation_id)?;
        self.records.remove(annotation_id);
        Ok(())
    }
}

/// Rejects every call with the same backend error.
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl AnnotationBackend for FailingBackend {
    fn create(
        &mut self,
        _owner_id: &str,
        _input: AnnotationInput,
    ) -> Result<Annotation, StoreError> {
        Err(StoreError::backend(self.message.clone()))
    }

    fn update(&mut self, _: &str, _: &str, _: &AnnotationPatch) -> Result<(), StoreError> {
        Err(StoreError::backend(self.message.clone()))
    }

    fn delete(&mut self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::backend(self.message.clone()))
    }
}

/// A blue underline on section "result" of story "story-1".
pub fn annotation(id: &str, start: i64, end: i64) -> Annotation {
    Annotation {
        id: id.to_string(),
        owner_id: "story-1".to_string(),
        section_key: "result".to_string(),
        start_offset: start,
        end_offset: end,
        annotated_text: String::new(),
        style: AnnotationStyle::Underline,
        color: ColorId::Blue,
        note: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    }
}
