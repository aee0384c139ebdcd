use std::collections::{HashSet, VecDeque};

use bevy::prelude::*;
use constants::coordinate_system::GeoFrame;
use constants::render_settings::{CENTER_VIEW_PITCH_DEG, FRAMING_RANGE_FACTOR, SELECTION_THRESHOLD_PX};
use serde::Serialize;

use crate::annotation::{
    AnnotationId, AnnotationStore, AttributeField, LineAttributes, LoadReport, ProblemRecord,
    SceneEntity, SceneGraph, Scope,
};
use crate::engine::viewer::Viewer;
use crate::remote::outbox::{PersistOp, PersistOutcome, PersistenceOutbox};
use crate::tools::drawing::{DrawingController, DrawingPhase};
use crate::tools::handlers::{HandlerKind, HandlerRegistry};
use crate::tools::labels::LabelPlacementEngine;
use crate::tools::popup::PopupMode;
use crate::tools::projector::SurfaceProjector;
use crate::tools::selection::{
    CameraFraming, SelectionChange, SelectionController, bounding_sphere, frame_toward, hit_test,
};
use crate::tools::vertex_edit::VertexEditController;

/// Mutable views over the editor state shared by the tool controllers.
pub struct EditorParts<'a> {
    pub scope: &'a Scope,
    pub store: &'a mut AnnotationStore,
    pub scene: &'a mut SceneGraph,
    pub handlers: &'a mut HandlerRegistry,
    pub labels: &'a mut LabelPlacementEngine,
    pub outbox: &'a mut PersistenceOutbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Message the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotification {
    pub level: NotificationLevel,
    pub message: String,
}

/// State changes reported to the host page.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorNotice {
    EditingChanged(bool),
    DrawingStateChanged(DrawingPhase),
    LineCommitted { id: AnnotationId, name: String },
    SelectionChanged(Option<AnnotationId>),
    LinesLoaded { loaded: usize, dropped: usize },
    Notification(UserNotification),
}

/// Bounding sphere of the loaded structure, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureBounds {
    pub center: Vec3,
    pub radius: f32,
}

/// Owns every piece of annotation state for one structure.
#[derive(Resource, Debug)]
pub struct AnnotationEditor {
    scope: Scope,
    store: AnnotationStore,
    scene: SceneGraph,
    handlers: HandlerRegistry,
    labels: LabelPlacementEngine,
    outbox: PersistenceOutbox,
    projector: SurfaceProjector,
    drawing: DrawingController,
    selection: SelectionController,
    vertex_edit: VertexEditController,
    editing: bool,
    structure: Option<StructureBounds>,
    camera_request: Option<CameraFraming>,
    /// Lines deleted by the user while their create was still in flight.
    deleted_unsaved: HashSet<AnnotationId>,
    notifications: VecDeque<UserNotification>,
    notices: Vec<EditorNotice>,
}

impl AnnotationEditor {
    pub fn new(scope: Scope, frame: GeoFrame) -> Self {
        Self {
            scope,
            store: AnnotationStore::new(frame),
            scene: SceneGraph::default(),
            handlers: HandlerRegistry::default(),
            labels: LabelPlacementEngine::default(),
            outbox: PersistenceOutbox::default(),
            projector: SurfaceProjector::default(),
            drawing: DrawingController::default(),
            selection: SelectionController::default(),
            vertex_edit: VertexEditController::default(),
            editing: false,
            structure: None,
            camera_request: None,
            deleted_unsaved: HashSet::new(),
            notifications: VecDeque::new(),
            notices: Vec::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn labels(&self) -> &LabelPlacementEngine {
        &self.labels
    }

    pub fn outbox(&self) -> &PersistenceOutbox {
        &self.outbox
    }

    pub fn take_outbox(&mut self) -> Vec<PersistOp> {
        self.outbox.drain()
    }

    pub fn drawing(&self) -> &DrawingController {
        &self.drawing
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn is_vertex_edit_armed(&self) -> bool {
        self.vertex_edit.is_armed()
    }

    pub fn set_structure(&mut self, frame: GeoFrame, bounds: StructureBounds) {
        self.store.set_frame(frame);
        self.structure = Some(bounds);
    }

    pub fn structure(&self) -> Option<StructureBounds> {
        self.structure
    }

    // Editing mode

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Turning editing on arms vertex removal; turning it off also drops the
    /// drawing session and the selection.
    pub fn set_editing(&mut self, editing: bool) -> bool {
        if self.editing == editing {
            return false;
        }
        self.editing = editing;
        self.cancel_drawing();

        if editing {
            self.vertex_edit.arm(&mut self.handlers);
        } else {
            self.vertex_edit.disarm(&mut self.handlers);
            self.clear_selection();
        }

        info!("Editing mode {}", if editing { "on" } else { "off" });
        self.notices.push(EditorNotice::EditingChanged(editing));
        true
    }

    pub fn toggle_editing(&mut self) -> bool {
        self.set_editing(!self.editing)
    }

    // Drawing

    pub fn drawing_phase(&self) -> DrawingPhase {
        self.drawing.phase()
    }

    /// Arms a drawing session; only while editing. Vertex removal stays
    /// disarmed for the session's lifetime.
    pub fn start_drawing(&mut self) -> bool {
        if !self.editing {
            warn!("Drawing requires editing mode");
            return false;
        }
        self.vertex_edit.disarm(&mut self.handlers);
        self.drawing.start(&mut self.handlers, &mut self.scene);
        self.notices
            .push(EditorNotice::DrawingStateChanged(DrawingPhase::Capturing));
        true
    }

    pub fn cancel_drawing(&mut self) -> bool {
        if !self.drawing.cancel(&mut self.handlers, &mut self.scene) {
            return false;
        }
        self.end_session();
        true
    }

    fn end_session(&mut self) {
        if self.editing {
            self.vertex_edit.arm(&mut self.handlers);
        }
        self.notices
            .push(EditorNotice::DrawingStateChanged(DrawingPhase::Idle));
    }

    pub fn draft(&self) -> Option<&LineAttributes> {
        self.drawing.draft()
    }

    pub fn edit_draft_field(&mut self, field: AttributeField, value: String) -> bool {
        match self.drawing.draft_mut() {
            Some(draft) => {
                *draft.field_mut(field) = value;
                true
            }
            None => false,
        }
    }

    /// Commits the pending line with `attributes`, or the edited draft.
    pub fn confirm_attributes(&mut self, attributes: Option<LineAttributes>) -> Option<AnnotationId> {
        let mut parts = EditorParts {
            scope: &self.scope,
            store: &mut self.store,
            scene: &mut self.scene,
            handlers: &mut self.handlers,
            labels: &mut self.labels,
            outbox: &mut self.outbox,
        };
        let id = self.drawing.confirm(attributes, &mut parts)?;

        let name = self
            .store
            .get(id)
            .map(|line| line.attributes.name.clone())
            .unwrap_or_default();
        self.notices.push(EditorNotice::LineCommitted { id, name });
        self.end_session();
        Some(id)
    }

    // Pointer input

    pub fn on_primary_click(&mut self, screen: Vec2, viewer: &mut dyn Viewer) {
        if self.handlers.is_armed(HandlerKind::PrimaryClick) {
            let captured =
                self.drawing
                    .primary_click(screen, &self.projector, viewer, &mut self.scene);
            if captured.is_none() {
                debug!("Click at {:?} did not hit any surface", screen);
            }
            return;
        }

        if self.handlers.is_armed(HandlerKind::VertexPick) {
            let mut parts = EditorParts {
                scope: &self.scope,
                store: &mut self.store,
                scene: &mut self.scene,
                handlers: &mut self.handlers,
                labels: &mut self.labels,
                outbox: &mut self.outbox,
            };
            self.vertex_edit.remove_vertex_at(screen, viewer, &mut parts);
        }

        self.select_at(screen, viewer);
    }

    pub fn on_pointer_move(&mut self, screen: Vec2, viewer: &mut dyn Viewer) {
        if self.handlers.is_armed(HandlerKind::PointerMove) {
            self.drawing
                .pointer_move(screen, &self.projector, viewer, &mut self.scene);
        }
    }

    pub fn on_secondary_click(&mut self) -> bool {
        if !self.handlers.is_armed(HandlerKind::SecondaryClick) {
            return false;
        }
        let finished = self.drawing.secondary_click();
        if finished {
            self.notices
                .push(EditorNotice::DrawingStateChanged(DrawingPhase::AttributeCapture));
        }
        finished
    }

    pub fn on_cancel_key(&mut self) -> bool {
        if self.handlers.is_armed(HandlerKind::CancelKey) {
            return self.cancel_drawing();
        }
        if self.selection.popup().is_some() {
            return self.close_popup();
        }
        false
    }

    // Selection

    fn select_at(&mut self, screen: Vec2, viewer: &dyn Viewer) {
        let hit = if self.scene.lines_visible() {
            hit_test(&self.store, viewer, screen, SELECTION_THRESHOLD_PX)
        } else {
            None
        };

        match hit {
            Some(id) => {
                self.select(id);
            }
            None => {
                self.clear_selection();
            }
        }
    }

    /// Selects a line as if it had been clicked.
    pub fn select(&mut self, id: AnnotationId) -> SelectionChange {
        let mode = if self.editing {
            PopupMode::Edit
        } else {
            PopupMode::ReadOnly
        };
        let change = self
            .selection
            .select(id, mode, &mut self.store, &mut self.scene);

        if let SelectionChange::Selected { id, .. } = change {
            let reference = self.reference_center();
            if let (Some(line), Some(reference)) = (self.store.get(id), reference) {
                self.camera_request = frame_toward(&line.points, reference, self.store.frame());
            }
            self.notices.push(EditorNotice::SelectionChanged(Some(id)));
        }
        change
    }

    pub fn clear_selection(&mut self) -> SelectionChange {
        let change = self.selection.clear(&mut self.store, &mut self.scene);
        if matches!(change, SelectionChange::Cleared(_)) {
            self.notices.push(EditorNotice::SelectionChanged(None));
        }
        change
    }

    fn reference_center(&self) -> Option<Vec3> {
        if let Some(structure) = self.structure {
            return Some(structure.center);
        }
        let points: Vec<Vec3> = self
            .store
            .iter()
            .flat_map(|line| line.points.iter().copied())
            .collect();
        bounding_sphere(&points).map(|(center, _)| center)
    }

    pub fn close_popup(&mut self) -> bool {
        self.selection.close_popup()
    }

    fn editable_selection(&self) -> Option<AnnotationId> {
        let popup = self.selection.popup()?;
        (popup.mode == PopupMode::Edit).then_some(popup.tracked)
    }

    /// Applies a popup field edit locally; metrics and style follow at once.
    pub fn edit_selected_field(&mut self, field: AttributeField, value: String) -> bool {
        let Some(id) = self.editable_selection() else {
            return false;
        };
        if !self
            .store
            .update(id, |line| *line.attributes.field_mut(field) = value)
        {
            return false;
        }
        self.scene.touch_owner(id);
        if let Some(line) = self.store.get(id) {
            self.labels.upsert(line);
        }
        true
    }

    /// Persists the full snapshot of the edited line.
    pub fn request_update(&mut self) -> bool {
        let Some(id) = self.editable_selection() else {
            return false;
        };
        let Some(line) = self.store.get(id) else {
            return false;
        };
        let Some(remote_id) = line.remote_id.clone() else {
            self.notify(
                NotificationLevel::Error,
                "This problem has not been saved yet and cannot be updated.",
            );
            return false;
        };

        let record = ProblemRecord::from_line(line, self.store.frame());
        self.outbox.push(PersistOp::Update {
            local: id,
            remote_id,
            record,
            user_initiated: true,
        });
        true
    }

    /// First step of deletion: the popup asks for confirmation.
    pub fn request_delete(&mut self) -> bool {
        if self.editable_selection().is_none() {
            return false;
        }
        match self.selection.popup_mut() {
            Some(popup) => {
                popup.confirming_delete = true;
                true
            }
            None => false,
        }
    }

    pub fn cancel_delete(&mut self) {
        if let Some(popup) = self.selection.popup_mut() {
            popup.confirming_delete = false;
        }
    }

    /// Removes the line locally, then remotely when it has a remote id.
    /// A later remote failure does not bring it back.
    pub fn confirm_delete(&mut self) -> Option<AnnotationId> {
        let popup = self.selection.popup()?;
        if !popup.confirming_delete {
            return None;
        }
        let id = popup.tracked;

        let line = self.store.remove(id)?;
        self.scene.remove_owned(id);
        self.labels.remove(id);
        self.selection.forget(id);
        self.notices.push(EditorNotice::SelectionChanged(None));

        match line.remote_id {
            Some(remote_id) => self.outbox.push(PersistOp::Delete {
                local: id,
                remote_id,
                user_initiated: true,
            }),
            None => {
                warn!("Deleted {} before it was ever saved remotely", id);
                self.deleted_unsaved.insert(id);
            }
        }
        info!("Deleted {} '{}'", id, line.attributes.name);
        Some(id)
    }

    // Per-frame

    /// Label de-cluttering and popup tracking for the current camera.
    pub fn update_frame(&mut self, viewer: &dyn Viewer) {
        self.labels.resolve_overlap(viewer);
        self.selection.update_popup(&self.store, viewer);
    }

    // Loading and persistence

    pub fn request_reload(&mut self) {
        self.outbox.push(PersistOp::List {
            scope: self.scope.clone(),
        });
    }

    /// Replaces every committed line; the drawing session is left alone.
    pub fn load_records(&mut self, records: Vec<ProblemRecord>) -> LoadReport {
        self.selection = SelectionController::default();
        self.scene.clear_owned();
        self.labels.clear();

        let report = self.store.load(records);
        for id in &report.loaded {
            self.scene.add(SceneEntity::Line { owner: *id });
            self.scene.add(SceneEntity::Label { owner: *id });
            if let Some(line) = self.store.get(*id) {
                self.labels.upsert(line);
            }
        }

        self.notices.push(EditorNotice::LinesLoaded {
            loaded: report.loaded.len(),
            dropped: report.dropped.len(),
        });
        report
    }

    pub fn apply_outcome(&mut self, outcome: PersistOutcome) {
        match outcome {
            PersistOutcome::Listed { scope, result } => match result {
                Ok(records) if scope == self.scope => {
                    self.load_records(records);
                }
                Ok(_) => debug!("Ignoring listing for stale scope {}", scope),
                Err(error) => {
                    error!("Loading lines for {} failed: {}", scope, error);
                    self.notify(
                        NotificationLevel::Error,
                        format!("Could not load problems: {error}"),
                    );
                }
            },
            PersistOutcome::Created { local, result } => match result {
                Ok(record) => self.attach_remote_id(local, record.id),
                Err(error) => {
                    error!("Saving {} failed: {}", local, error);
                    self.notify(
                        NotificationLevel::Error,
                        format!("Could not save the new problem: {error}"),
                    );
                }
            },
            PersistOutcome::Updated {
                local,
                user_initiated,
                result,
            } => match result {
                Ok(()) => {
                    info!("Updated {} remotely", local);
                    if user_initiated {
                        self.notify(NotificationLevel::Info, "Problem updated.");
                    }
                }
                Err(error) => {
                    error!("Updating {} failed: {}", local, error);
                    self.notify(
                        NotificationLevel::Error,
                        format!("Could not update the problem: {error}"),
                    );
                }
            },
            PersistOutcome::Deleted {
                local,
                remote_id,
                user_initiated,
                result,
            } => match result {
                Ok(()) => {
                    info!("Deleted {} (remote {}) remotely", local, remote_id);
                    if user_initiated {
                        self.notify(NotificationLevel::Info, "Problem deleted.");
                    }
                }
                Err(error) => {
                    error!("Deleting {} failed: {}", local, error);
                    self.notify(
                        NotificationLevel::Error,
                        format!("Could not delete the problem remotely: {error}"),
                    );
                }
            },
        }
    }

    fn attach_remote_id(&mut self, local: AnnotationId, remote_id: Option<String>) {
        let Some(remote_id) = remote_id else {
            warn!("Create response for {} carried no id", local);
            return;
        };

        if let Some(line) = self.store.get_mut(local) {
            info!("{} saved as remote {}", local, remote_id);
            line.remote_id = Some(remote_id);
            return;
        }

        let deleted_by_user = self.deleted_unsaved.remove(&local);
        if let Some(reloaded) = self.store.find_by_remote_id(&remote_id) {
            // A listing already shows the record again; keep both sides in step.
            debug!("{} already reloaded as {} (remote {})", local, reloaded, remote_id);
        } else if deleted_by_user {
            info!("Removing remote {} of {} deleted while saving", remote_id, local);
            self.outbox.push(PersistOp::Delete {
                local,
                remote_id,
                user_initiated: false,
            });
        } else {
            // Replaced by a listing taken before the create landed.
            info!("{} saved as remote {}; it appears on the next reload", local, remote_id);
        }
    }

    pub fn export_records(&self) -> Vec<ProblemRecord> {
        self.store.export_records()
    }

    // View

    /// Frames every line (or the structure when there are none).
    pub fn center_view(&mut self) -> Option<CameraFraming> {
        let points: Vec<Vec3> = self
            .store
            .iter()
            .flat_map(|line| line.points.iter().copied())
            .collect();
        let (center, radius) = bounding_sphere(&points)
            .or_else(|| self.structure.map(|bounds| (bounds.center, bounds.radius)))?;

        let framing = CameraFraming {
            center,
            range: radius * FRAMING_RANGE_FACTOR,
            heading: 0.0,
            pitch: CENTER_VIEW_PITCH_DEG.to_radians(),
        };
        self.camera_request = Some(framing);
        Some(framing)
    }

    pub fn take_camera_request(&mut self) -> Option<CameraFraming> {
        self.camera_request.take()
    }

    pub fn set_lines_visible(&mut self, visible: bool) {
        self.scene.set_lines_visible(visible);
    }

    pub fn set_labels_visible(&mut self, visible: bool) {
        self.scene.set_labels_visible(visible);
    }

    // Notifications

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let notification = UserNotification {
            level,
            message: message.into(),
        };
        self.notices
            .push(EditorNotice::Notification(notification.clone()));
        self.notifications.push_back(notification);
    }

    pub fn current_notification(&self) -> Option<&UserNotification> {
        self.notifications.front()
    }

    pub fn dismiss_notification(&mut self) -> Option<UserNotification> {
        self.notifications.pop_front()
    }

    pub fn take_notices(&mut self) -> Vec<EditorNotice> {
        std::mem::take(&mut self.notices)
    }
}
