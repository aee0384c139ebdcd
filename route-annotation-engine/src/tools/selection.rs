use bevy::prelude::*;
use constants::coordinate_system::{GeoFrame, Geodetic};
use constants::render_settings::{FRAMING_RANGE_FACTOR, MIN_FRAMING_RADIUS};

use crate::annotation::{AnnotationId, AnnotationStore, SceneGraph};
use crate::engine::viewer::Viewer;
use crate::tools::popup::{Popup, PopupId, PopupMode};

/// Camera re-framing request: look at `center` from `range` metres away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFraming {
    pub center: Vec3,
    pub range: f32,
    /// Radians clockwise from north.
    pub heading: f32,
    /// Radians, negative looking down.
    pub pitch: f32,
}

/// Distance from `p` to segment `ab`, parameter clamped to the segment.
pub fn point_to_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / length_squared).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Closest line whose projected polyline passes within `threshold` pixels.
/// Segments with an unprojectable endpoint are skipped.
pub fn hit_test(
    store: &AnnotationStore,
    viewer: &dyn Viewer,
    click: Vec2,
    threshold: f32,
) -> Option<AnnotationId> {
    let mut best: Option<(AnnotationId, f32)> = None;

    for line in store.iter() {
        for segment in line.points.windows(2) {
            let (Some(a), Some(b)) = (
                viewer.world_to_screen(segment[0]),
                viewer.world_to_screen(segment[1]),
            ) else {
                continue;
            };

            let distance = point_to_segment_distance(click, a, b);
            if distance < threshold && best.is_none_or(|(_, d)| distance < d) {
                best = Some((line.id, distance));
            }
        }
    }

    best.map(|(id, _)| id)
}

/// Center and radius enclosing `points` (axis-aligned box centre, max distance).
pub fn bounding_sphere(points: &[Vec3]) -> Option<(Vec3, f32)> {
    let first = *points.first()?;
    let (min, max) = points
        .iter()
        .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
    let center = (min + max) * 0.5;
    let radius = points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0f32, f32::max)
        .max(MIN_FRAMING_RADIUS);
    Some((center, radius))
}

/// Frames a line looking from its midpoint toward the structure centre, so the
/// camera faces the wall the line is drawn on.
pub fn frame_toward(points: &[Vec3], reference: Vec3, frame: &GeoFrame) -> Option<CameraFraming> {
    let (center, radius) = bounding_sphere(points)?;

    let (heading, pitch) = if points.len() >= 2 {
        let midpoint = (points[0] + points[points.len() - 1]) * 0.5;
        let from = frame.world_to_geodetic(midpoint);
        let to = frame.world_to_geodetic(reference);

        let d_lat = (to.lat - from.lat).to_radians();
        let d_lon = (to.lon - from.lon).to_radians();
        let heading = d_lon.atan2(d_lat).rem_euclid(std::f64::consts::TAU) as f32;

        let from_ground = frame.geodetic_to_world(&Geodetic {
            height: 0.0,
            ..from
        });
        let to_ground = frame.geodetic_to_world(&Geodetic {
            height: 0.0,
            ..to
        });
        let horizontal = from_ground.distance(to_ground);
        let rise = (to.height - from.height) as f32;
        (heading, -rise.atan2(horizontal))
    } else {
        (0.0, -std::f32::consts::FRAC_PI_4)
    };

    Some(CameraFraming {
        center,
        range: radius * FRAMING_RANGE_FACTOR,
        heading,
        pitch,
    })
}

/// Result of a selection transition, for notifications and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Selected {
        id: AnnotationId,
        previous: Option<AnnotationId>,
    },
    Reopened(AnnotationId),
    Cleared(AnnotationId),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub annotation: AnnotationId,
    pub popup: Option<Popup>,
}

/// Singleton selection with its highlight and popup.
#[derive(Debug, Default)]
pub struct SelectionController {
    selection: Option<Selection>,
    next_popup: u64,
}

impl SelectionController {
    pub fn current(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selection.as_ref().map(|selection| selection.annotation)
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.selection.as_ref()?.popup.as_ref()
    }

    pub fn popup_mut(&mut self) -> Option<&mut Popup> {
        self.selection.as_mut()?.popup.as_mut()
    }

    fn open_popup(&mut self, tracked: AnnotationId, mode: PopupMode) -> Popup {
        self.next_popup += 1;
        Popup::new(PopupId(self.next_popup), tracked, mode)
    }

    /// Selects `id`, tinting it and resetting the previous line. Re-selecting
    /// the current line only re-opens its popup.
    pub fn select(
        &mut self,
        id: AnnotationId,
        mode: PopupMode,
        store: &mut AnnotationStore,
        scene: &mut SceneGraph,
    ) -> SelectionChange {
        if !store.contains(id) {
            return SelectionChange::Unchanged;
        }

        let popup = self.open_popup(id, mode);
        if self.selected() == Some(id) {
            if let Some(selection) = self.selection.as_mut() {
                selection.popup = Some(popup);
            }
            return SelectionChange::Reopened(id);
        }

        let previous = self.selected();
        if let Some(previous) = previous {
            Self::set_highlight(previous, false, store, scene);
        }
        Self::set_highlight(id, true, store, scene);

        self.selection = Some(Selection {
            annotation: id,
            popup: Some(popup),
        });
        SelectionChange::Selected { id, previous }
    }

    /// Clears selection and popup, restoring the line's grade style.
    pub fn clear(&mut self, store: &mut AnnotationStore, scene: &mut SceneGraph) -> SelectionChange {
        match self.selection.take() {
            Some(selection) => {
                Self::set_highlight(selection.annotation, false, store, scene);
                SelectionChange::Cleared(selection.annotation)
            }
            None => SelectionChange::Unchanged,
        }
    }

    /// Drops the selection of a line that no longer exists.
    pub fn forget(&mut self, id: AnnotationId) -> bool {
        if self.selected() == Some(id) {
            self.selection = None;
            return true;
        }
        false
    }

    pub fn close_popup(&mut self) -> bool {
        self.selection
            .as_mut()
            .and_then(|selection| selection.popup.take())
            .is_some()
    }

    fn set_highlight(
        id: AnnotationId,
        highlighted: bool,
        store: &mut AnnotationStore,
        scene: &mut SceneGraph,
    ) {
        if let Some(line) = store.get_mut(id) {
            line.set_highlighted(highlighted);
            if let Some(scene_id) = scene.line_of(id) {
                scene.touch(scene_id);
            }
        }
    }

    /// Re-projects the popup for the current camera.
    pub fn update_popup(&mut self, store: &AnnotationStore, viewer: &dyn Viewer) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        let Some(popup) = selection.popup.as_mut() else {
            return;
        };
        if let Some(line) = store.get(popup.tracked) {
            popup.reanchor(&line.points, viewer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{LineAttributes, SceneEntity, classify};
    use crate::annotation::model::LineDisplay;
    use crate::test_support::MockViewer;
    use assert_matches::assert_matches;

    fn store_with_two_lines() -> (AnnotationStore, AnnotationId, AnnotationId) {
        let mut store = AnnotationStore::new(GeoFrame::default());
        let a = store.add(
            LineAttributes::new("a", "6a", ""),
            vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            None,
        );
        let b = store.add(
            LineAttributes::new("b", "7b", ""),
            vec![Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
            None,
        );
        (store, a, b)
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Vec2::ZERO;
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(point_to_segment_distance(Vec2::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(point_to_segment_distance(Vec2::new(13.0, 4.0), a, b), 5.0);
        assert_eq!(point_to_segment_distance(Vec2::new(1.0, 1.0), a, a), 2f32.sqrt());
    }

    #[test]
    fn hit_test_picks_global_minimum_under_threshold() {
        let (store, a, b) = store_with_two_lines();
        let viewer = MockViewer::default();

        // 0.2 m above line a = 20 px; 0.8 m below b = 80 px.
        let click = viewer.screen_of(Vec3::new(0.0, 0.2, 0.0));
        assert_eq!(hit_test(&store, &viewer, click, 25.0), Some(a));

        let click = viewer.screen_of(Vec3::new(0.0, 0.9, 0.0));
        assert_eq!(hit_test(&store, &viewer, click, 25.0), Some(b));

        let click = viewer.screen_of(Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(hit_test(&store, &viewer, click, 25.0), None);
    }

    #[test]
    fn selection_is_a_singleton() {
        let (mut store, a, b) = store_with_two_lines();
        let mut scene = SceneGraph::default();
        scene.add(SceneEntity::Line { owner: a });
        scene.add(SceneEntity::Line { owner: b });
        let mut controller = SelectionController::default();

        controller.select(a, PopupMode::ReadOnly, &mut store, &mut scene);
        let change = controller.select(b, PopupMode::ReadOnly, &mut store, &mut scene);

        assert_matches!(change, SelectionChange::Selected { id, previous: Some(prev) } if id == b && prev == a);
        let highlighted: Vec<_> = store.iter().filter(|line| line.highlighted).map(|l| l.id).collect();
        assert_eq!(highlighted, vec![b]);
        assert_eq!(
            store.get(a).map(|line| line.display),
            Some(LineDisplay::normal(classify("6a")))
        );
    }

    #[test]
    fn reselect_reopens_popup_without_restyling() {
        let (mut store, a, _) = store_with_two_lines();
        let mut scene = SceneGraph::default();
        let mut controller = SelectionController::default();

        controller.select(a, PopupMode::ReadOnly, &mut store, &mut scene);
        let first_popup = controller.popup().map(|popup| popup.id);
        controller.close_popup();
        assert!(controller.popup().is_none());

        let change = controller.select(a, PopupMode::Edit, &mut store, &mut scene);
        assert_eq!(change, SelectionChange::Reopened(a));
        assert_ne!(controller.popup().map(|popup| popup.id), first_popup);
        assert_eq!(controller.popup().map(|popup| popup.mode), Some(PopupMode::Edit));
        assert!(store.get(a).is_some_and(|line| line.highlighted));
    }

    #[test]
    fn clear_restores_grade_style() {
        let (mut store, a, _) = store_with_two_lines();
        let mut scene = SceneGraph::default();
        let mut controller = SelectionController::default();

        controller.select(a, PopupMode::ReadOnly, &mut store, &mut scene);
        assert_eq!(controller.clear(&mut store, &mut scene), SelectionChange::Cleared(a));
        assert_eq!(controller.selected(), None);
        assert!(store.get(a).is_some_and(|line| !line.highlighted));
    }

    #[test]
    fn framing_looks_toward_reference_center() {
        let frame = GeoFrame::new(Geodetic::new(45.0, 6.0, 1000.0));
        // Line 10 m south of the structure centre, same height.
        let points = [Vec3::new(-1.0, 0.0, 10.0), Vec3::new(1.0, 0.0, 10.0)];
        let framing = frame_toward(&points, Vec3::ZERO, &frame).expect("two points");

        assert!(framing.heading.abs() < 1e-3 || (framing.heading - std::f32::consts::TAU).abs() < 1e-3);
        assert!(framing.pitch.abs() < 1e-2);
        assert!((framing.range - 5.0).abs() < 1e-3);
        assert_eq!(framing.center, Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn single_point_framing_uses_default_angles() {
        let framing = frame_toward(&[Vec3::ONE], Vec3::ZERO, &GeoFrame::default()).expect("one point");
        assert_eq!(framing.heading, 0.0);
        assert_eq!(framing.pitch, -std::f32::consts::FRAC_PI_4);
    }
}
