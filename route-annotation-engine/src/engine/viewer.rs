use bevy::picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use bevy::prelude::*;
use constants::coordinate_system::GeoFrame;

/// Capabilities the annotation tools need from the 3D view.
pub trait Viewer {
    /// Viewport position of a world point, `None` when behind the camera.
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2>;

    fn camera_position(&self) -> Vec3;

    /// Camera pitch in radians, negative when looking down.
    fn camera_pitch(&self) -> f32;

    /// Closest hit against visible rendered geometry, overlays excluded.
    fn pick_depth(&mut self, screen: Vec2) -> Option<Vec3>;

    /// Ray cast against the structure model only.
    fn pick_structure(&mut self, screen: Vec2) -> Option<Vec3>;

    /// Ray cast against the WGS84 ellipsoid.
    fn pick_ellipsoid(&mut self, screen: Vec2) -> Option<Vec3>;
}

/// [`Viewer`] over the live Bevy camera and mesh ray casting.
pub struct BevyViewer<'a, 'w, 's> {
    pub camera: &'a Camera,
    pub camera_transform: &'a GlobalTransform,
    pub ray_cast: &'a mut MeshRayCast<'w, 's>,
    pub frame: &'a GeoFrame,
    pub is_overlay: &'a dyn Fn(Entity) -> bool,
    pub is_structure: &'a dyn Fn(Entity) -> bool,
}

impl BevyViewer<'_, '_, '_> {
    fn ray(&self, screen: Vec2) -> Option<Ray3d> {
        self.camera
            .viewport_to_world(self.camera_transform, screen)
            .ok()
    }
}

impl Viewer for BevyViewer<'_, '_, '_> {
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        self.camera
            .world_to_viewport(self.camera_transform, world)
            .ok()
    }

    fn camera_position(&self) -> Vec3 {
        self.camera_transform.translation()
    }

    fn camera_pitch(&self) -> f32 {
        self.camera_transform.forward().y.clamp(-1.0, 1.0).asin()
    }

    fn pick_depth(&mut self, screen: Vec2) -> Option<Vec3> {
        let ray = self.ray(screen)?;
        let is_overlay = self.is_overlay;
        let filter = |entity: Entity| !is_overlay(entity);
        let settings = MeshRayCastSettings::default()
            .with_filter(&filter)
            .with_visibility(RayCastVisibility::VisibleInView);

        self.ray_cast
            .cast_ray(ray, &settings)
            .first()
            .map(|(_, hit)| hit.point)
    }

    fn pick_structure(&mut self, screen: Vec2) -> Option<Vec3> {
        let ray = self.ray(screen)?;
        let is_structure = self.is_structure;
        let filter = |entity: Entity| is_structure(entity);
        let settings = MeshRayCastSettings::default()
            .with_filter(&filter)
            .with_visibility(RayCastVisibility::Any);

        self.ray_cast
            .cast_ray(ray, &settings)
            .first()
            .map(|(_, hit)| hit.point)
    }

    fn pick_ellipsoid(&mut self, screen: Vec2) -> Option<Vec3> {
        let ray = self.ray(screen)?;
        self.frame
            .ray_ellipsoid_intersection(ray.origin, *ray.direction)
    }
}
