use crate::{Float, Point3f, Vec3f};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldOfView {
    /// Horizontal field of view in degrees. The vertical one follows from the aspect ratio.
    Horizontal(Float),
    Vertical(Float),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelSampling {
    /// Uniformly jittered within the pixel.
    Jittered,
    /// Always through the pixel center.
    Center,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3f,
    pub look_at: Point3f,
    pub up: Vec3f,
    pub fov: FieldOfView,
    pub resolution: (u32, u32),
    pub sampling: PixelSampling,
    pub lens_radius: Float,
    pub focal_distance: Float,
}

impl Camera {
    pub fn new(position: Point3f, look_at: Point3f, up: Vec3f, fov: FieldOfView, resolution: (u32, u32)) -> Self {
        Self {
            position,
            look_at,
            up,
            fov,
            resolution,
            sampling: PixelSampling::Jittered,
            lens_radius: 0.0,
            focal_distance: 1.0,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    pub fn with_sampling(mut self, sampling: PixelSampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn aspect(&self) -> Float {
        self.resolution.0 as Float / self.resolution.1.max(1) as Float
    }

    /// `(tan(fov_x / 2), tan(fov_y / 2))`.
    pub fn tan_half_fov(&self) -> (Float, Float) {
        let aspect = self.aspect();
        match self.fov {
            FieldOfView::Horizontal(deg) => {
                let tx = (deg.to_radians() * 0.5).tan();
                (tx, tx / aspect)
            }
            FieldOfView::Vertical(deg) => {
                let ty = (deg.to_radians() * 0.5).tan();
                (ty * aspect, ty)
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3f::new(0.0, 0.0, 5.0),
            Point3f::new(0.0, 0.0, 0.0),
            Vec3f::new(0.0, 1.0, 0.0),
            FieldOfView::Vertical(45.0),
            (64, 64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fov_derived_from_aspect() {
        let cam = Camera::new(
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, -1.0),
            Vec3f::new(0.0, 1.0, 0.0),
            FieldOfView::Horizontal(90.0),
            (200, 100),
        );
        let (tx, ty) = cam.tan_half_fov();
        assert_abs_diff_eq!(tx, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ty, 0.5, epsilon = 1e-6);

        let cam = Camera { fov: FieldOfView::Vertical(90.0), ..cam };
        let (tx, ty) = cam.tan_half_fov();
        assert_abs_diff_eq!(tx, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ty, 1.0, epsilon = 1e-6);
    }
}
