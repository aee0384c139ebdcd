use bevy::math::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (metres)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (metres)
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// First eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Geodetic position: latitude/longitude in degrees, ellipsoidal height in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geodetic {
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
}

impl Geodetic {
    pub fn new(lat: f64, lon: f64, height: f64) -> Self {
        Self { lat, lon, height }
    }

    pub fn to_ecef(&self) -> DVec3 {
        let phi = self.lat.to_radians();
        let lambda = self.lon.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_phi * sin_phi).sqrt();

        DVec3::new(
            (n + self.height) * cos_phi * cos_lambda,
            (n + self.height) * cos_phi * sin_lambda,
            (n * (1.0 - WGS84_E2) + self.height) * sin_phi,
        )
    }

    /// Iterative inverse (Bowring-style fixed point), converges to sub-millimetre
    /// within a handful of rounds for terrestrial heights.
    pub fn from_ecef(ecef: DVec3) -> Self {
        let lon = ecef.y.atan2(ecef.x);
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();

        if p < 1e-9 {
            let lat = if ecef.z >= 0.0 { 90.0 } else { -90.0 };
            return Self::new(lat, lon.to_degrees(), ecef.z.abs() - WGS84_B);
        }

        let mut phi = ecef.z.atan2(p * (1.0 - WGS84_E2));
        let mut height = 0.0;
        for _ in 0..8 {
            let sin_phi = phi.sin();
            let n = WGS84_A / (1.0 - WGS84_E2 * sin_phi * sin_phi).sqrt();
            height = p / phi.cos() - n;
            phi = ecef.z.atan2(p * (1.0 - WGS84_E2 * n / (n + height)));
        }

        Self::new(phi.to_degrees(), lon.to_degrees(), height)
    }
}

/// Local East-Up-South frame anchored at a geodetic origin.
/// World axes: +X east, +Y up, +Z south (Bevy's right-handed, Y-up convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFrame {
    origin: Geodetic,
    origin_ecef: DVec3,
    east: DVec3,
    north: DVec3,
    up: DVec3,
}

impl Default for GeoFrame {
    fn default() -> Self {
        Self::new(Geodetic::default())
    }
}

impl GeoFrame {
    pub fn new(origin: Geodetic) -> Self {
        let phi = origin.lat.to_radians();
        let lambda = origin.lon.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_lambda, cos_lambda) = lambda.sin_cos();

        Self {
            origin,
            origin_ecef: origin.to_ecef(),
            east: DVec3::new(-sin_lambda, cos_lambda, 0.0),
            north: DVec3::new(-sin_phi * cos_lambda, -sin_phi * sin_lambda, cos_phi),
            up: DVec3::new(cos_phi * cos_lambda, cos_phi * sin_lambda, sin_phi),
        }
    }

    pub fn origin(&self) -> Geodetic {
        self.origin
    }

    pub fn ecef_to_world(&self, ecef: DVec3) -> Vec3 {
        let d = ecef - self.origin_ecef;
        Vec3::new(
            d.dot(self.east) as f32,
            d.dot(self.up) as f32,
            -d.dot(self.north) as f32,
        )
    }

    pub fn world_to_ecef(&self, world: Vec3) -> DVec3 {
        self.origin_ecef + self.world_direction_to_ecef(world)
    }

    fn world_direction_to_ecef(&self, world: Vec3) -> DVec3 {
        let w = world.as_dvec3();
        self.east * w.x + self.up * w.y - self.north * w.z
    }

    pub fn geodetic_to_world(&self, geodetic: &Geodetic) -> Vec3 {
        self.ecef_to_world(geodetic.to_ecef())
    }

    pub fn world_to_geodetic(&self, world: Vec3) -> Geodetic {
        Geodetic::from_ecef(self.world_to_ecef(world))
    }

    /// Nearest forward intersection of a world-space ray with the WGS84 ellipsoid.
    /// Solved in ECEF with f64 precision; a ray starting inside hits the far side.
    pub fn ray_ellipsoid_intersection(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let o = self.world_to_ecef(origin);
        let d = self.world_direction_to_ecef(direction);
        if d.length_squared() == 0.0 {
            return None;
        }

        let scale = DVec3::new(1.0 / WGS84_A, 1.0 / WGS84_A, 1.0 / WGS84_B);
        let os = o * scale;
        let ds = d * scale;

        let a = ds.dot(ds);
        let b = 2.0 * os.dot(ds);
        let c = os.dot(os) - 1.0;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        let near = (-b - root) / (2.0 * a);
        let far = (-b + root) / (2.0 * a);
        let t = if near >= 0.0 {
            near
        } else if far >= 0.0 {
            far
        } else {
            return None;
        };

        Some(self.ecef_to_world(o + d * t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecef_round_trip_is_stable() {
        let position = Geodetic::new(46.5197, 6.6323, 412.7);
        let back = Geodetic::from_ecef(position.to_ecef());

        assert!((back.lat - position.lat).abs() < 1e-9);
        assert!((back.lon - position.lon).abs() < 1e-9);
        assert!((back.height - position.height).abs() < 1e-4);
    }

    #[test]
    fn frame_origin_maps_to_world_origin() {
        let frame = GeoFrame::new(Geodetic::new(40.0, -3.7, 650.0));
        let world = frame.geodetic_to_world(&frame.origin());
        assert!(world.length() < 1e-3);
    }

    #[test]
    fn frame_axes_are_east_up_south() {
        let origin = Geodetic::new(40.0, -3.7, 650.0);
        let frame = GeoFrame::new(origin);

        let above = frame.geodetic_to_world(&Geodetic::new(40.0, -3.7, 660.0));
        assert!((above.y - 10.0).abs() < 1e-3);

        let north = frame.geodetic_to_world(&Geodetic::new(40.0001, -3.7, 650.0));
        assert!(north.z < 0.0);

        let east = frame.geodetic_to_world(&Geodetic::new(40.0, -3.6999, 650.0));
        assert!(east.x > 0.0);
    }

    #[test]
    fn downward_ray_hits_ellipsoid_below_origin() {
        let frame = GeoFrame::new(Geodetic::new(10.0, 20.0, 100.0));
        let hit = frame
            .ray_ellipsoid_intersection(Vec3::ZERO, Vec3::NEG_Y)
            .expect("ray points at the ground");
        let geodetic = frame.world_to_geodetic(hit);
        assert!(geodetic.height.abs() < 1e-2);
    }

    #[test]
    fn upward_ray_misses_ellipsoid() {
        let frame = GeoFrame::new(Geodetic::new(10.0, 20.0, 100.0));
        assert_eq!(frame.ray_ellipsoid_intersection(Vec3::ZERO, Vec3::Y), None);
    }
}
