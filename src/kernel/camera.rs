use cgmath::InnerSpace;

use crate::compiler::layout::CameraRecord;
use crate::sampling::concentric_sample_disk;
use crate::{Float, Point2f, Point3f, Ray, Vec3f};

/// Primary ray through pixel `(x, y)`, row 0 at the top. `u_pixel` jitters within the pixel
/// unless the camera samples pixel centers; `u_lens` picks the aperture point.
pub fn generate_ray(camera: &CameraRecord, x: u32, y: u32, u_pixel: Point2f, u_lens: Point2f) -> Ray {
    let offset = if camera.sampling == 1 { Point2f::new(0.5, 0.5) } else { u_pixel };
    let sx = 2.0 * (x as Float + offset.x) / camera.width as Float - 1.0;
    let sy = 1.0 - 2.0 * (y as Float + offset.y) / camera.height as Float;

    let origin = Point3f::from(camera.position);
    let right = Vec3f::from(camera.right);
    let up = Vec3f::from(camera.up);
    let dir = Vec3f::from(camera.forward) + right * sx + up * sy;

    if camera.lens_radius > 0.0 {
        // the forward component of `dir` is one, so this point lies on the focal plane
        let focus = origin + dir * camera.focal_distance;
        let lens = concentric_sample_disk(u_lens);
        let lens_origin = origin
            + (right.normalize() * lens.x + up.normalize() * lens.y) * camera.lens_radius;
        return Ray::new(lens_origin, (focus - lens_origin).normalize());
    }
    Ray::new(origin, dir.normalize())
}
