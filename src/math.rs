//! Pose math on OpenXR types, plus the conversion into the host's
//! left-handed coordinate system.

use std::f32::consts::TAU;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use openxr as xr;

pub fn rotation(q: &xr::Quaternionf) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Apply `q` as a rotation to `v`.
pub fn rotate(q: &xr::Quaternionf, v: &xr::Vector3f) -> xr::Vector3f {
    let r = rotation(q) * Vector3::new(v.x, v.y, v.z);
    xr::Vector3f {
        x: r.x,
        y: r.y,
        z: r.z,
    }
}

/// Compose two poses: rotate-then-translate `b` into `a`'s frame.
pub fn compose(a: &xr::Posef, b: &xr::Posef) -> xr::Posef {
    let qa = rotation(&a.orientation);
    let q = (qa * rotation(&b.orientation)).into_inner();
    let p = Vector3::new(a.position.x, a.position.y, a.position.z)
        + qa * Vector3::new(b.position.x, b.position.y, b.position.z);
    xr::Posef {
        orientation: xr::Quaternionf {
            x: q.coords.x,
            y: q.coords.y,
            z: q.coords.z,
            w: q.coords.w,
        },
        position: xr::Vector3f {
            x: p.x,
            y: p.y,
            z: p.z,
        },
    }
}

/// Heading of an orientation, as the yaw of its forward (+Z) vector
/// projected onto the XZ plane.
///
/// The runtime keeps the XZ plane parallel with the floor, so yaw is the
/// only component recentering ever needs.
pub fn yaw_of(q: &xr::Quaternionf) -> f32 {
    let forward = rotate(
        q,
        &xr::Vector3f {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        },
    );
    forward.x.atan2(forward.z)
}

pub fn wrap_yaw(yaw: f32) -> f32 {
    yaw % TAU
}

/// A pure-yaw pose: rotation about +Y only, no translation.
pub fn yaw_pose(yaw: f32) -> xr::Posef {
    let half = yaw * 0.5;
    xr::Posef {
        orientation: xr::Quaternionf {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        },
        position: xr::Vector3f {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
    }
}

/// RH (OpenXR) -> LH (host) position: Z is inverted.
pub fn position_to_host(p: &xr::Vector3f) -> Vector3<f32> {
    Vector3::new(p.x, p.y, -p.z)
}

/// RH (OpenXR) -> LH (host) orientation: the rotation axis flips with
/// the handedness, and the sign convention flips with it.
pub fn orientation_to_host(q: &xr::Quaternionf) -> Quaternion<f32> {
    Quaternion::new(q.w, -q.x, -q.y, q.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPS: f32 = 1e-5;

    fn quat(x: f32, y: f32, z: f32, w: f32) -> xr::Quaternionf {
        xr::Quaternionf { x, y, z, w }
    }

    fn vec3(x: f32, y: f32, z: f32) -> xr::Vector3f {
        xr::Vector3f { x, y, z }
    }

    #[test]
    fn rotate_identity() {
        let v = rotate(&quat(0.0, 0.0, 0.0, 1.0), &vec3(1.0, 2.0, 3.0));
        assert!((v.x - 1.0).abs() < EPS);
        assert!((v.y - 2.0).abs() < EPS);
        assert!((v.z - 3.0).abs() < EPS);
    }

    #[test]
    fn rotate_quarter_turn_about_y() {
        let half = FRAC_PI_2 * 0.5;
        let q = quat(0.0, half.sin(), 0.0, half.cos());
        let v = rotate(&q, &vec3(0.0, 0.0, 1.0));
        assert!((v.x - 1.0).abs() < EPS);
        assert!(v.y.abs() < EPS);
        assert!(v.z.abs() < EPS);
    }

    #[test]
    fn compose_translates_through_rotation() {
        let a = xr::Posef {
            orientation: yaw_pose(FRAC_PI_2).orientation,
            position: vec3(1.0, 0.0, 0.0),
        };
        let b = xr::Posef {
            orientation: yaw_pose(FRAC_PI_2).orientation,
            position: vec3(0.0, 0.0, 1.0),
        };
        let r = compose(&a, &b);
        // a rotates b's +Z offset onto +X, then adds its own offset
        assert!((r.position.x - 2.0).abs() < EPS);
        assert!(r.position.y.abs() < EPS);
        assert!(r.position.z.abs() < EPS);
        // two quarter turns make a half turn
        assert!(r.orientation.x.abs() < EPS);
        assert!((r.orientation.y.abs() - (PI * 0.5).sin()).abs() < EPS);
        assert!(r.orientation.z.abs() < EPS);
        assert!(r.orientation.w.abs() < EPS);
    }

    #[test]
    fn yaw_of_forward_looking_plus_x() {
        // HMD looking down +X: forward (0,0,1) must have been yawed 90deg
        let q = yaw_pose(FRAC_PI_2).orientation;
        assert!((yaw_of(&q) - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn yaw_pose_is_pure_yaw() {
        let p = yaw_pose(FRAC_PI_2);
        assert_eq!(p.orientation.x, 0.0);
        assert_eq!(p.orientation.z, 0.0);
        assert!((p.orientation.y - (FRAC_PI_2 * 0.5).sin()).abs() < EPS);
        assert!((p.orientation.w - (FRAC_PI_2 * 0.5).cos()).abs() < EPS);
        assert_eq!(p.position.x, 0.0);
        assert_eq!(p.position.y, 0.0);
        assert_eq!(p.position.z, 0.0);
    }

    #[test]
    fn yaw_wraps_mod_tau() {
        assert!((wrap_yaw(TAU + 0.5) - 0.5).abs() < EPS);
        assert!((wrap_yaw(0.5) - 0.5).abs() < EPS);
    }

    #[test]
    fn host_conversion_values() {
        let p = position_to_host(&vec3(1.0, 2.0, 3.0));
        assert_eq!((p.x, p.y, p.z), (1.0, 2.0, -3.0));

        let q = orientation_to_host(&quat(0.1, 0.2, 0.3, 0.9284767));
        assert!((q.coords.x + 0.1).abs() < EPS);
        assert!((q.coords.y + 0.2).abs() < EPS);
        assert!((q.coords.z - 0.3).abs() < EPS);
        assert!((q.coords.w - 0.9284767).abs() < EPS);
    }

    #[test]
    fn host_conversion_is_involution() {
        let p0 = vec3(1.0, 2.0, 3.0);
        let p1 = position_to_host(&p0);
        let p2 = position_to_host(&vec3(p1.x, p1.y, p1.z));
        assert_eq!((p2.x, p2.y, p2.z), (p0.x, p0.y, p0.z));

        let q0 = quat(0.1, 0.2, 0.3, 0.9284767);
        let q1 = orientation_to_host(&q0);
        let q2 = orientation_to_host(&quat(q1.coords.x, q1.coords.y, q1.coords.z, q1.coords.w));
        assert_eq!(
            (q2.coords.x, q2.coords.y, q2.coords.z, q2.coords.w),
            (q0.x, q0.y, q0.z, q0.w)
        );
    }
}
