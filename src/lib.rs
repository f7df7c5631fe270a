// Export modules for use in tests
pub mod annotation;
pub mod connector;
pub mod document;
pub mod layout;
pub mod palette;
pub mod popover;
pub mod render;
pub mod selection;
pub mod session;
pub mod settings;
pub mod span_splitter;
pub mod store;
pub mod text_container;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use annotation::{Annotation, AnnotationInput, AnnotationPatch, AnnotationStyle, ColorId, Owner};
pub use session::AnnotationSession;
pub use span_splitter::{Segment, split};
pub use store::{AnnotationBackend, AnnotationService, BackendRegistry, StoreError};
