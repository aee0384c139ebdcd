//! Route annotation domain model.
//!
//! Lines, their attributes and derived metrics, the grade classifier, the
//! client-side store mirroring the remote collection, and the scene graph
//! mirror describing what is drawn on top of the structure.

/// Grade string to display style classification.
pub mod grade;

/// Line annotation, attributes, metrics and display types.
pub mod model;

/// Remote wire record and conversion from local lines.
pub mod record;

/// Overlay entities (lines, labels, markers, preview) as plain data.
pub mod scene;

/// Client-side store of committed lines.
pub mod store;

pub use grade::{GradeStyle, classify};
pub use model::{AnnotationId, AttributeField, LineAnnotation, LineAttributes, LineMetrics, Scope};
pub use record::ProblemRecord;
pub use scene::{MarkerRole, SceneEntity, SceneGraph, SceneId};
pub use store::{AnnotationStore, LoadReport};
