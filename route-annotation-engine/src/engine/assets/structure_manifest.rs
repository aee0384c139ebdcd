use bevy::prelude::*;
use constants::coordinate_system::{GeoFrame, Geodetic};
use serde::{Deserialize, Serialize};

/// Sphere enclosing the structure model, centre in geodetic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphereData {
    pub center: Geodetic,
    pub radius: f64,
}

/// Per-structure manifest as a Bevy asset. Mirrors the JSON file exactly.
///
/// ```json
/// {
///   "origin": { "lat": 46.02, "lon": 7.74, "height": 2210.0 },
///   "model": "structure.glb",
///   "bounding_sphere": { "center": { "lat": 46.02, "lon": 7.74, "height": 2215.0 }, "radius": 18.5 }
/// }
/// ```
#[derive(Asset, Debug, Clone, PartialEq, Serialize, Deserialize, TypePath)]
pub struct StructureManifest {
    /// Geodetic anchor of the local world frame.
    pub origin: Geodetic,
    /// glTF file next to the manifest. Missing means the structure is
    /// annotated against the ellipsoid only.
    #[serde(default)]
    pub model: Option<String>,
    pub bounding_sphere: BoundingSphereData,
}

impl StructureManifest {
    pub fn frame(&self) -> GeoFrame {
        GeoFrame::new(self.origin)
    }

    /// Bounding sphere centre and radius in world space.
    pub fn world_bounds(&self) -> (Vec3, f32) {
        let center = self.frame().geodetic_to_world(&self.bounding_sphere.center);
        (center, self.bounding_sphere.radius as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "origin": { "lat": 46.0, "lon": 7.0, "height": 2000.0 },
        "model": "wall.glb",
        "bounding_sphere": { "center": { "lat": 46.0, "lon": 7.0, "height": 2010.0 }, "radius": 12.0 }
    }"#;

    #[test]
    fn parses_and_places_bounds_above_origin() {
        let manifest: StructureManifest = serde_json::from_str(MANIFEST).expect("valid manifest");
        assert_eq!(manifest.model.as_deref(), Some("wall.glb"));

        let (center, radius) = manifest.world_bounds();
        assert!(center.x.abs() < 1e-3 && center.z.abs() < 1e-3);
        assert!((center.y - 10.0).abs() < 1e-3);
        assert_eq!(radius, 12.0);
    }

    #[test]
    fn model_is_optional() {
        let manifest: StructureManifest = serde_json::from_str(
            r#"{ "origin": { "lat": 0, "lon": 0, "height": 0 },
                 "bounding_sphere": { "center": { "lat": 0, "lon": 0, "height": 0 }, "radius": 1 } }"#,
        )
        .expect("valid manifest");
        assert_eq!(manifest.model, None);
    }
}
