//! Partitioning of section text into plain and annotated segments.
//!
//! The output always covers the whole text exactly once, in order. Each
//! segment carries at most one annotation. Where anchored ranges overlap,
//! the overlapped stretch is cut into sub-segments and the most recently
//! created annotation owns it (ties go to the one listed later).

use crate::annotation::{Annotation, AnnotationId};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    /// Character range of this segment within the section text.
    pub range: Range<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<AnnotationId>,
}

impl Segment {
    pub fn is_annotated(&self) -> bool {
        self.annotation_id.is_some()
    }
}

/// Segment boundaries without the copied text, indexing into the annotation slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpan {
    pub range: Range<usize>,
    pub annotation: Option<usize>,
}

#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    created_at: DateTime<Utc>,
    index: usize,
}

impl Candidate {
    fn covers(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }

    fn precedence(&self) -> (DateTime<Utc>, usize) {
        (self.created_at, self.index)
    }
}

/// Clips every anchored annotation to `[0, len]` and drops asides, inverted
/// ranges and ranges that end up empty.
fn candidates(len: usize, annotations: &[Annotation]) -> Vec<Candidate> {
    let len = len as i64;
    let mut result = Vec::with_capacity(annotations.len());

    for (index, annotation) in annotations.iter().enumerate() {
        if annotation.is_aside() {
            continue;
        }
        if annotation.start_offset > annotation.end_offset {
            warn!(
                "Dropping annotation {} with inverted range {}..{}",
                annotation.id, annotation.start_offset, annotation.end_offset
            );
            continue;
        }

        let start = annotation.start_offset.clamp(0, len);
        let end = annotation.end_offset.clamp(0, len);
        if start >= end {
            debug!(
                "Annotation {} has no visible range within 0..{len}",
                annotation.id
            );
            continue;
        }

        result.push(Candidate {
            start: start as usize,
            end: end as usize,
            created_at: annotation.created_at,
            index,
        });
    }

    result
}

/// Computes segment boundaries over a text of `len` characters.
pub fn partition(len: usize, annotations: &[Annotation]) -> Vec<SegmentSpan> {
    if len == 0 {
        return Vec::new();
    }

    let candidates = candidates(len, annotations);
    if candidates.is_empty() {
        return vec![SegmentSpan {
            range: 0..len,
            annotation: None,
        }];
    }

    let mut boundaries: Vec<usize> = Vec::with_capacity(candidates.len() * 2 + 2);
    boundaries.push(0);
    boundaries.push(len);
    for candidate in &candidates {
        boundaries.push(candidate.start);
        boundaries.push(candidate.end);
    }
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut spans: Vec<SegmentSpan> = Vec::new();
    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);
        let owner = candidates
            .iter()
            .filter(|candidate| candidate.covers(start, end))
            .max_by_key(|candidate| candidate.precedence())
            .map(|candidate| candidate.index);

        match spans.last_mut() {
            Some(previous) if previous.annotation == owner => previous.range.end = end,
            _ => spans.push(SegmentSpan {
                range: start..end,
                annotation: owner,
            }),
        }
    }

    spans
}

/// Splits `text` into segments under `annotations`. Offsets are character
/// offsets; malformed ranges never cause a failure.
pub fn split(text: &str, annotations: &[Annotation]) -> Vec<Segment> {
    // byte position of every char boundary, including the end of the text
    let mut byte_offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    byte_offsets.push(text.len());
    let len = byte_offsets.len() - 1;

    partition(len, annotations)
        .into_iter()
        .map(|span| Segment {
            text: text[byte_offsets[span.range.start]..byte_offsets[span.range.end]].to_string(),
            range: span.range,
            annotation_id: span.annotation.map(|idx| annotations[idx].id.clone()),
        })
        .collect()
}
