//! Pinhole camera model.
//!
//! `P = K [R | t]` maps homogeneous world points into pixel coordinates, with
//! `K` the intrinsics and `[R | t]` the world-to-camera transform.

use anyhow::{anyhow, Result};
use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector2, Vector3};

/// Raspberry Pi camera v2 lens focal length, millimetres.
const PI_V2_FOCAL_MM: f64 = 3.11;
/// Raspberry Pi camera v2 sensor size, millimetres.
const PI_V2_SENSOR_MM: (f64, f64) = (3.936, 2.460);

#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    width: u32,
    height: u32,
    intrinsics: Matrix3<f64>,
    extrinsics: Matrix3x4<f64>,
    projection: Matrix3x4<f64>,
}

impl PinholeCamera {
    /// `focal` and `principal` are in pixels; `rotation` and `translation`
    /// take world coordinates into the camera frame (translation in metres).
    pub fn new(
        width: u32,
        height: u32,
        focal: Vector2<f64>,
        principal: Point2<f64>,
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Self {
        #[rustfmt::skip]
        let intrinsics = Matrix3::new(
            focal.x, 0.0,     principal.x,
            0.0,     focal.y, principal.y,
            0.0,     0.0,     1.0,
        );
        let mut extrinsics = Matrix3x4::zeros();
        extrinsics.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        extrinsics.set_column(3, &translation);

        Self {
            width,
            height,
            intrinsics,
            extrinsics,
            projection: intrinsics * extrinsics,
        }
    }

    /// Raspberry Pi camera v2 at the given resolution, principal point at
    /// the image centre. Defaults to `R = I`, `t = 0`.
    pub fn pi_v2(
        width: u32,
        height: u32,
        rotation: Option<Matrix3<f64>>,
        translation: Option<Vector3<f64>>,
    ) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        let focal = Vector2::new(
            PI_V2_FOCAL_MM * w / PI_V2_SENSOR_MM.0,
            PI_V2_FOCAL_MM * h / PI_V2_SENSOR_MM.1,
        );
        Self::new(
            width,
            height,
            focal,
            Point2::new(w / 2.0, h / 2.0),
            rotation.unwrap_or_else(Matrix3::identity),
            translation.unwrap_or_else(Vector3::zeros),
        )
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn intrinsics(&self) -> &Matrix3<f64> {
        &self.intrinsics
    }

    pub fn extrinsics(&self) -> &Matrix3x4<f64> {
        &self.extrinsics
    }

    pub fn projection(&self) -> &Matrix3x4<f64> {
        &self.projection
    }

    /// Project world points to pixel coordinates.
    ///
    /// Fails if any point lands on the camera plane (zero depth).
    pub fn forward_project(&self, points: &[Point3<f64>]) -> Result<Vec<Point2<f64>>> {
        points
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let p = self.projection * point.to_homogeneous();
                if p.z == 0.0 {
                    return Err(anyhow!("point {} ({}) has zero depth", idx, point));
                }
                Ok(Point2::new(p.x / p.z, p.y / p.z))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn pi_v2_intrinsics() {
        let camera = PinholeCamera::pi_v2(640, 480, None, None);
        let k = camera.intrinsics();
        assert!(close(k[(0, 0)], 3.11 * 640.0 / 3.936));
        assert!(close(k[(1, 1)], 3.11 * 480.0 / 2.460));
        assert!(close(k[(0, 2)], 320.0));
        assert!(close(k[(1, 2)], 240.0));
        assert_eq!(camera.extrinsics().fixed_view::<3, 3>(0, 0), Matrix3::identity());
        assert_eq!(camera.size(), (640, 480));
    }

    #[test]
    fn optical_axis_hits_principal_point() -> Result<()> {
        let camera = PinholeCamera::pi_v2(640, 480, None, None);
        let pixels = camera.forward_project(&[Point3::new(0.0, 0.0, 2.0)])?;
        assert!(close(pixels[0].x, 320.0));
        assert!(close(pixels[0].y, 240.0));
        Ok(())
    }

    #[test]
    fn projection_scales_with_depth() -> Result<()> {
        let camera = PinholeCamera::new(
            100,
            100,
            Vector2::new(100.0, 100.0),
            Point2::new(50.0, 50.0),
            Matrix3::identity(),
            Vector3::new(0.0, 0.0, 1.0),
        );
        // translation pushes the world origin one metre in front of the camera
        let pixels = camera.forward_project(&[Point3::new(0.1, -0.2, 0.0), Point3::new(0.1, -0.2, 1.0)])?;
        assert!(close(pixels[0].x, 60.0));
        assert!(close(pixels[0].y, 30.0));
        assert!(close(pixels[1].x, 55.0));
        assert!(close(pixels[1].y, 40.0));
        Ok(())
    }

    #[test]
    fn zero_depth_is_an_error() {
        let camera = PinholeCamera::pi_v2(640, 480, None, None);
        let err = camera
            .forward_project(&[Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 0.0)])
            .unwrap_err();
        assert!(err.to_string().contains("point 1"));
    }
}
