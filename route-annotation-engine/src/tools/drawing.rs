use bevy::prelude::*;
use serde::Serialize;

use crate::annotation::{
    AnnotationId, LineAttributes, MarkerRole, ProblemRecord, SceneEntity, SceneGraph, SceneId,
};
use crate::engine::viewer::Viewer;
use crate::remote::outbox::PersistOp;
use crate::tools::editor::EditorParts;
use crate::tools::handlers::{HandlerKind, HandlerRegistration, HandlerRegistry};
use crate::tools::projector::SurfaceProjector;

/// Externally visible state of the drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingPhase {
    Idle,
    Capturing,
    AttributeCapture,
}

const SESSION_HANDLERS: [HandlerKind; 4] = [
    HandlerKind::PrimaryClick,
    HandlerKind::PointerMove,
    HandlerKind::SecondaryClick,
    HandlerKind::CancelKey,
];

#[derive(Debug)]
struct DrawingSession {
    points: Vec<Vec3>,
    floating: Option<Vec3>,
    floating_marker: Option<SceneId>,
    preview_line: Option<SceneId>,
    draft: LineAttributes,
    awaiting_attributes: bool,
    registrations: Vec<HandlerRegistration>,
}

impl DrawingSession {
    fn arm(handlers: &mut HandlerRegistry) -> Self {
        Self {
            points: Vec::new(),
            floating: None,
            floating_marker: None,
            preview_line: None,
            draft: LineAttributes::default(),
            awaiting_attributes: false,
            registrations: SESSION_HANDLERS
                .iter()
                .map(|kind| handlers.register(*kind))
                .collect(),
        }
    }

    /// Disposes every registration and removes the session's preview entities.
    fn teardown(self, handlers: &mut HandlerRegistry, scene: &mut SceneGraph) -> Vec<Vec3> {
        for registration in self.registrations {
            registration.dispose(handlers);
        }
        for id in [self.floating_marker, self.preview_line].into_iter().flatten() {
            scene.remove(id);
        }
        self.points
    }
}

/// Multi-click polyline capture: clicks add points, a secondary click
/// finishes capture, attributes are confirmed before commit.
#[derive(Debug, Default)]
pub struct DrawingController {
    session: Option<DrawingSession>,
}

impl DrawingController {
    pub fn phase(&self) -> DrawingPhase {
        match &self.session {
            None => DrawingPhase::Idle,
            Some(session) if session.awaiting_attributes => DrawingPhase::AttributeCapture,
            Some(_) => DrawingPhase::Capturing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn points(&self) -> &[Vec3] {
        self.session
            .as_ref()
            .map(|session| session.points.as_slice())
            .unwrap_or(&[])
    }

    pub fn floating_point(&self) -> Option<Vec3> {
        self.session.as_ref()?.floating
    }

    /// Captured points followed by the floating point while capturing.
    pub fn preview_points(&self) -> Vec<Vec3> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let mut points = session.points.clone();
        if !session.awaiting_attributes {
            points.extend(session.floating);
        }
        points
    }

    pub fn draft(&self) -> Option<&LineAttributes> {
        self.session
            .as_ref()
            .filter(|session| session.awaiting_attributes)
            .map(|session| &session.draft)
    }

    pub fn draft_mut(&mut self) -> Option<&mut LineAttributes> {
        self.session
            .as_mut()
            .filter(|session| session.awaiting_attributes)
            .map(|session| &mut session.draft)
    }

    /// Arms a fresh session, tearing down any previous one.
    pub fn start(&mut self, handlers: &mut HandlerRegistry, scene: &mut SceneGraph) {
        self.cancel(handlers, scene);
        self.session = Some(DrawingSession::arm(handlers));
        info!("Drawing session started");
    }

    /// Appends the projected point; the first point creates the floating
    /// marker and the live preview line.
    pub fn primary_click(
        &mut self,
        screen: Vec2,
        projector: &SurfaceProjector,
        viewer: &mut dyn Viewer,
        scene: &mut SceneGraph,
    ) -> Option<Vec3> {
        let session = self
            .session
            .as_mut()
            .filter(|session| !session.awaiting_attributes)?;
        let point = projector.project(viewer, screen)?;

        session.points.push(point);
        if session.points.len() == 1 {
            session.floating = Some(point);
            session.floating_marker = Some(scene.add(SceneEntity::Point {
                owner: None,
                position: point,
                role: MarkerRole::Floating,
            }));
            session.preview_line = Some(scene.add(SceneEntity::PreviewLine));
        }
        debug!("Captured point {} at {:?}", session.points.len(), point);
        Some(point)
    }

    /// Moves the floating marker; ignored before the first point.
    pub fn pointer_move(
        &mut self,
        screen: Vec2,
        projector: &SurfaceProjector,
        viewer: &mut dyn Viewer,
        scene: &mut SceneGraph,
    ) -> Option<Vec3> {
        let session = self
            .session
            .as_mut()
            .filter(|session| !session.awaiting_attributes && !session.points.is_empty())?;
        let point = projector.project(viewer, screen)?;

        session.floating = Some(point);
        if let Some(marker) = session.floating_marker {
            scene.move_point(marker, point);
        }
        Some(point)
    }

    /// Ends capture when at least two points exist.
    pub fn secondary_click(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.awaiting_attributes || session.points.len() < 2 {
            return false;
        }
        session.awaiting_attributes = true;
        session.draft = LineAttributes::default();
        info!(
            "Drawing capture finished with {} points, awaiting attributes",
            session.points.len()
        );
        true
    }

    /// Discards the session in any phase.
    pub fn cancel(&mut self, handlers: &mut HandlerRegistry, scene: &mut SceneGraph) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let discarded = session.teardown(handlers, scene);
        info!("Drawing session cancelled ({} points discarded)", discarded.len());
        true
    }

    /// Commits the captured line with `attributes` (or the draft): store add,
    /// line and label entities, endpoint markers, remote create.
    pub fn confirm(
        &mut self,
        attributes: Option<LineAttributes>,
        parts: &mut EditorParts<'_>,
    ) -> Option<AnnotationId> {
        if self.phase() != DrawingPhase::AttributeCapture {
            return None;
        }
        let session = self.session.take()?;
        let attributes = attributes.unwrap_or_else(|| session.draft.clone());
        let points = session.teardown(parts.handlers, parts.scene);

        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return None;
        };
        let id = parts.store.add(attributes, points, None);
        let line = parts.store.get(id)?;

        parts.scene.add(SceneEntity::Line { owner: id });
        parts.scene.add(SceneEntity::Label { owner: id });
        for position in [first, last] {
            parts.scene.add(SceneEntity::Point {
                owner: Some(id),
                position,
                role: MarkerRole::Endpoint,
            });
        }
        parts.labels.upsert(line);

        parts.outbox.push(PersistOp::Create {
            local: id,
            scope: parts.scope.clone(),
            record: ProblemRecord::from_line(line, parts.store.frame()),
        });

        info!(
            "Committed {} '{}' ({:.2} m long, {:.2} m high)",
            id, line.attributes.name, line.metrics.length, line.metrics.height
        );
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationStore, Scope};
    use crate::remote::outbox::PersistenceOutbox;
    use crate::test_support::MockViewer;
    use crate::tools::labels::LabelPlacementEngine;
    use assert_matches::assert_matches;
    use constants::coordinate_system::GeoFrame;

    #[derive(Default)]
    struct Fixture {
        scope: Option<Scope>,
        store: AnnotationStore,
        scene: SceneGraph,
        handlers: HandlerRegistry,
        labels: LabelPlacementEngine,
        outbox: PersistenceOutbox,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scope: Some(Scope::new("acme", "north", "block-a")),
                store: AnnotationStore::new(GeoFrame::default()),
                ..Default::default()
            }
        }

        fn parts(&mut self) -> EditorParts<'_> {
            EditorParts {
                scope: self.scope.as_ref().expect("fixture scope"),
                store: &mut self.store,
                scene: &mut self.scene,
                handlers: &mut self.handlers,
                labels: &mut self.labels,
                outbox: &mut self.outbox,
            }
        }
    }

    fn capture(
        controller: &mut DrawingController,
        fixture: &mut Fixture,
        viewer: &mut MockViewer,
        points: &[Vec3],
    ) {
        let projector = SurfaceProjector::default();
        for point in points {
            let screen = viewer.add_surface_point(*point);
            controller.primary_click(screen, &projector, viewer, &mut fixture.scene);
        }
    }

    #[test]
    fn start_arms_four_handlers() {
        let mut fixture = Fixture::new();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);

        assert_eq!(controller.phase(), DrawingPhase::Capturing);
        assert_eq!(fixture.handlers.armed_count(), 4);
        assert!(fixture.scene.is_empty());
    }

    #[test]
    fn first_point_creates_floating_marker_and_preview() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);

        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::ZERO]);

        assert_eq!(fixture.scene.count(|e| matches!(e, SceneEntity::PreviewLine)), 1);
        assert_eq!(
            fixture.scene.count(|e| matches!(e, SceneEntity::Point { role: MarkerRole::Floating, .. })),
            1
        );
    }

    #[test]
    fn pointer_move_updates_floating_point_only() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::with_structure_plane(0.0);
        let projector = SurfaceProjector::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);

        assert_eq!(
            controller.pointer_move(Vec2::new(700.0, 300.0), &projector, &mut viewer, &mut fixture.scene),
            None
        );

        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::ZERO]);
        let moved = controller
            .pointer_move(Vec2::new(700.0, 300.0), &projector, &mut viewer, &mut fixture.scene)
            .expect("structure plane hit");

        assert_eq!(controller.points().len(), 1);
        assert_eq!(controller.floating_point(), Some(moved));
        assert_eq!(controller.preview_points().len(), 2);
    }

    #[test]
    fn secondary_click_needs_two_points() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);

        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::ZERO]);
        assert!(!controller.secondary_click());
        assert_eq!(controller.phase(), DrawingPhase::Capturing);

        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::X]);
        assert!(controller.secondary_click());
        assert_eq!(controller.phase(), DrawingPhase::AttributeCapture);
        assert!(controller.draft().is_some());
    }

    #[test]
    fn missed_projection_adds_nothing() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let projector = SurfaceProjector::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);

        let added = controller.primary_click(Vec2::new(5.0, 5.0), &projector, &mut viewer, &mut fixture.scene);
        assert_eq!(added, None);
        assert!(controller.points().is_empty());
    }

    #[test]
    fn cancel_leaves_nothing_behind() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);
        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::ZERO, Vec3::X, Vec3::Y]);
        controller.secondary_click();

        assert!(controller.cancel(&mut fixture.handlers, &mut fixture.scene));
        assert_eq!(controller.phase(), DrawingPhase::Idle);
        assert_eq!(fixture.handlers.armed_count(), 0);
        assert!(fixture.scene.is_empty());
        assert!(fixture.store.is_empty());
        assert!(fixture.outbox.is_empty());
    }

    #[test]
    fn restart_tears_down_previous_session() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);
        capture(&mut controller, &mut fixture, &mut viewer, &[Vec3::ZERO]);

        controller.start(&mut fixture.handlers, &mut fixture.scene);
        assert_eq!(fixture.handlers.armed_count(), 4);
        assert!(fixture.scene.is_empty());
        assert!(controller.points().is_empty());
    }

    #[test]
    fn confirm_commits_line_with_endpoint_markers() {
        let mut fixture = Fixture::new();
        let mut viewer = MockViewer::default();
        let mut controller = DrawingController::default();
        controller.start(&mut fixture.handlers, &mut fixture.scene);
        capture(
            &mut controller,
            &mut fixture,
            &mut viewer,
            &[Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), Vec3::new(2.0, 3.0, 0.0)],
        );

        assert_eq!(controller.confirm(None, &mut fixture.parts()), None);
        controller.secondary_click();
        let id = controller
            .confirm(Some(LineAttributes::new("Crack", "6b", "")), &mut fixture.parts())
            .expect("committed");

        assert_eq!(controller.phase(), DrawingPhase::Idle);
        assert_eq!(fixture.handlers.armed_count(), 0);
        assert_eq!(fixture.store.get(id).map(|l| l.points.len()), Some(3));
        assert_eq!(fixture.scene.count(|e| matches!(e, SceneEntity::PreviewLine)), 0);
        assert_eq!(
            fixture.scene.count(|e| matches!(e, SceneEntity::Point { role: MarkerRole::Endpoint, .. })),
            2
        );
        assert!(fixture.scene.line_of(id).is_some());
        assert!(fixture.labels.get(id).is_some());
        assert_matches!(fixture.outbox.pending(), [PersistOp::Create { local, .. }] if *local == id);
    }
}
