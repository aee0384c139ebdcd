use bevy::prelude::*;
use constants::render_settings::SURFACE_OFFSET;

use crate::engine::viewer::Viewer;

/// Which stage of the fallback chain produced a surface point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSource {
    Depth,
    Structure,
    Ellipsoid,
}

/// Maps screen positions onto the visible surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceProjector {
    pub offset: f32,
}

impl Default for SurfaceProjector {
    fn default() -> Self {
        Self {
            offset: SURFACE_OFFSET,
        }
    }
}

impl SurfaceProjector {
    pub fn project(&self, viewer: &mut dyn Viewer, screen: Vec2) -> Option<Vec3> {
        self.project_with_source(viewer, screen)
            .map(|(point, _)| point)
    }

    /// First success of depth pick, structure ray cast, ellipsoid ray cast,
    /// pulled `offset` metres toward the camera.
    pub fn project_with_source(
        &self,
        viewer: &mut dyn Viewer,
        screen: Vec2,
    ) -> Option<(Vec3, ProjectionSource)> {
        let (hit, source) = viewer
            .pick_depth(screen)
            .map(|hit| (hit, ProjectionSource::Depth))
            .or_else(|| {
                viewer
                    .pick_structure(screen)
                    .map(|hit| (hit, ProjectionSource::Structure))
            })
            .or_else(|| {
                viewer
                    .pick_ellipsoid(screen)
                    .map(|hit| (hit, ProjectionSource::Ellipsoid))
            })?;

        let toward_camera = (viewer.camera_position() - hit).normalize_or_zero();
        Some((hit + toward_camera * self.offset, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockViewer;

    #[test]
    fn depth_hit_wins_and_is_offset_toward_camera() {
        let mut viewer = MockViewer::with_structure_plane(-5.0);
        let surface = Vec3::new(1.0, 2.0, 0.0);
        let screen = viewer.add_surface_point(surface);

        let (point, source) = SurfaceProjector::default()
            .project_with_source(&mut viewer, screen)
            .expect("depth hit");

        assert_eq!(source, ProjectionSource::Depth);
        assert!((point.distance(surface) - SURFACE_OFFSET).abs() < 1e-5);
        assert!(point.z > surface.z);
    }

    #[test]
    fn falls_back_to_structure_then_ellipsoid() {
        let projector = SurfaceProjector::default();
        let mut viewer = MockViewer::with_structure_plane(-5.0);
        let (_, source) = projector
            .project_with_source(&mut viewer, Vec2::new(10.0, 10.0))
            .expect("structure hit");
        assert_eq!(source, ProjectionSource::Structure);

        let mut viewer = MockViewer {
            ellipsoid_plane: Some(-50.0),
            ..default()
        };
        let (point, source) = projector
            .project_with_source(&mut viewer, Vec2::new(10.0, 10.0))
            .expect("ellipsoid hit");
        assert_eq!(source, ProjectionSource::Ellipsoid);
        assert!(point.z > -50.0);
    }

    #[test]
    fn total_miss_yields_none() {
        let mut viewer = MockViewer::default();
        assert_eq!(
            SurfaceProjector::default().project(&mut viewer, Vec2::ZERO),
            None
        );
    }
}
