use bevy::prelude::*;
use constants::render_settings::{LABEL_NUDGE_PX, LABEL_OVERLAP_THRESHOLD_PX};

use crate::annotation::{AnnotationId, LineAnnotation};
use crate::engine::viewer::Viewer;

/// Per-line label placement state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub owner: AnnotationId,
    pub anchor: Vec3,
    pub text: String,
    pub color: Srgba,
    /// Screen nudge applied on top of the base placement; persists across frames.
    pub offset: Vec2,
    /// Projected anchor from the latest resolve pass.
    pub screen: Option<Vec2>,
}

/// Keeps labels in creation order and de-clutters them once per frame.
#[derive(Debug)]
pub struct LabelPlacementEngine {
    labels: Vec<PlacedLabel>,
    pub threshold: f32,
    pub nudge: f32,
}

impl Default for LabelPlacementEngine {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            threshold: LABEL_OVERLAP_THRESHOLD_PX,
            nudge: LABEL_NUDGE_PX,
        }
    }
}

/// Middle point by index, `points[len / 2]`.
pub fn compute_anchor(points: &[Vec3]) -> Option<Vec3> {
    points.get(points.len() / 2).copied()
}

impl LabelPlacementEngine {
    /// Creates the label for a line or refreshes anchor, text and color.
    /// A line with no points loses its label.
    pub fn upsert(&mut self, line: &LineAnnotation) {
        let Some(anchor) = compute_anchor(&line.points) else {
            self.remove(line.id);
            return;
        };
        let text = line.attributes.label_text();
        let color = line.grade_style().color;

        match self.labels.iter_mut().find(|label| label.owner == line.id) {
            Some(label) => {
                label.anchor = anchor;
                label.text = text;
                label.color = color;
            }
            None => self.labels.push(PlacedLabel {
                owner: line.id,
                anchor,
                text,
                color,
                offset: Vec2::ZERO,
                screen: None,
            }),
        }
    }

    pub fn remove(&mut self, owner: AnnotationId) {
        self.labels.retain(|label| label.owner != owner);
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn get(&self, owner: AnnotationId) -> Option<&PlacedLabel> {
        self.labels.iter().find(|label| label.owner == owner)
    }

    pub fn labels(&self) -> &[PlacedLabel] {
        &self.labels
    }

    /// Single asymmetric pass: for every pair `i < j` whose anchors project
    /// closer than `threshold`, label `j` is pushed down by `nudge`;
    /// otherwise its offset resets. Later pairs overwrite earlier decisions.
    pub fn resolve_overlap(&mut self, viewer: &dyn Viewer) {
        for label in &mut self.labels {
            label.screen = viewer.world_to_screen(label.anchor);
        }

        let count = self.labels.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let (Some(a), Some(b)) = (self.labels[i].screen, self.labels[j].screen) else {
                    continue;
                };

                self.labels[j].offset = if a.distance(b) < self.threshold {
                    Vec2::new(0.0, self.nudge)
                } else {
                    Vec2::ZERO
                };
            }
        }
    }
}
