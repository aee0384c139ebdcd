use bevy::prelude::*;

use crate::engine::viewer::Viewer;

/// Orthographic front view: camera far out on +Z looking down -Z, world
/// metres scaled to pixels around the viewport centre.
pub struct MockViewer {
    pub camera: Vec3,
    pub pitch: f32,
    pub scale: f32,
    pub center: Vec2,
    /// Exact screen positions that hit visible geometry.
    pub depth_hits: Vec<(Vec2, Vec3)>,
    /// Structure modelled as the plane `z = value`.
    pub structure_plane: Option<f32>,
    pub ellipsoid_plane: Option<f32>,
}

impl Default for MockViewer {
    fn default() -> Self {
        Self {
            camera: Vec3::new(0.0, 0.0, 1000.0),
            pitch: -0.2,
            scale: 100.0,
            center: Vec2::new(640.0, 360.0),
            depth_hits: Vec::new(),
            structure_plane: None,
            ellipsoid_plane: None,
        }
    }
}

impl MockViewer {
    pub fn with_structure_plane(z: f32) -> Self {
        Self {
            structure_plane: Some(z),
            ..default()
        }
    }

    fn unproject(&self, screen: Vec2) -> Vec2 {
        Vec2::new(
            (screen.x - self.center.x) / self.scale,
            (self.center.y - screen.y) / self.scale,
        )
    }

    pub fn screen_of(&self, world: Vec3) -> Vec2 {
        Vec2::new(
            self.center.x + world.x * self.scale,
            self.center.y - world.y * self.scale,
        )
    }

    /// Registers a depth hit so clicking the returned screen point picks `world`.
    pub fn add_surface_point(&mut self, world: Vec3) -> Vec2 {
        let screen = self.screen_of(world);
        self.depth_hits.push((screen, world));
        screen
    }
}

impl Viewer for MockViewer {
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        (world.z < self.camera.z).then(|| self.screen_of(world))
    }

    fn camera_position(&self) -> Vec3 {
        self.camera
    }

    fn camera_pitch(&self) -> f32 {
        self.pitch
    }

    fn pick_depth(&mut self, screen: Vec2) -> Option<Vec3> {
        self.depth_hits
            .iter()
            .find(|(at, _)| at.distance(screen) < 0.5)
            .map(|(_, world)| *world)
    }

    fn pick_structure(&mut self, screen: Vec2) -> Option<Vec3> {
        let xy = self.unproject(screen);
        self.structure_plane.map(|z| xy.extend(z))
    }

    fn pick_ellipsoid(&mut self, screen: Vec2) -> Option<Vec3> {
        let xy = self.unproject(screen);
        self.ellipsoid_plane.map(|z| xy.extend(z))
    }
}
