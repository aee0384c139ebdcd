use bevy::prelude::*;
use constants::render_settings::VERTEX_PICK_THRESHOLD_PX;

use crate::annotation::{AnnotationId, ProblemRecord};
use crate::engine::viewer::Viewer;
use crate::remote::outbox::PersistOp;
use crate::tools::editor::EditorParts;
use crate::tools::handlers::{HandlerKind, HandlerRegistration, HandlerRegistry};

/// Click-to-remove on endpoint markers while editing.
#[derive(Debug, Default)]
pub struct VertexEditController {
    registration: Option<HandlerRegistration>,
}

impl VertexEditController {
    pub fn is_armed(&self) -> bool {
        self.registration.is_some()
    }

    pub fn arm(&mut self, handlers: &mut HandlerRegistry) {
        if self.registration.is_none() {
            self.registration = Some(handlers.register(HandlerKind::VertexPick));
        }
    }

    pub fn disarm(&mut self, handlers: &mut HandlerRegistry) {
        if let Some(registration) = self.registration.take() {
            registration.dispose(handlers);
        }
    }

    /// Removes the marker under `screen` and every point of its owner line
    /// equal to the marker position. Returns the edited line.
    pub fn remove_vertex_at(
        &mut self,
        screen: Vec2,
        viewer: &dyn Viewer,
        parts: &mut EditorParts<'_>,
    ) -> Option<AnnotationId> {
        if !self.is_armed() {
            return None;
        }

        let (marker, position) = parts.scene.nearest_marker(
            screen,
            VERTEX_PICK_THRESHOLD_PX,
            |world| viewer.world_to_screen(world),
        )?;
        let owner = parts.store.find_owner_of_point(position)?;

        parts
            .store
            .update(owner, |line| line.points.retain(|point| *point != position));
        parts.scene.remove(marker);

        let line = parts.store.get(owner)?;
        if line.points.is_empty() {
            if let Some(label) = parts.scene.label_of(owner) {
                parts.scene.remove(label);
            }
        }
        parts.scene.touch_owner(owner);
        parts.labels.upsert(line);

        if let Some(remote_id) = line.remote_id.clone() {
            parts.outbox.push(PersistOp::Update {
                local: owner,
                remote_id,
                record: ProblemRecord::from_line(line, parts.store.frame()),
                user_initiated: false,
            });
        }

        info!(
            "Removed vertex {:?} from {} ({} points left)",
            position,
            owner,
            line.points.len()
        );
        Some(owner)
    }
}
