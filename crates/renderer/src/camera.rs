//! Camera for rendering the scene.

use glam::{Mat4, Vec3};

/// A fixed look-at camera with a perspective projection.
///
/// The projection matrix includes the Vulkan Y-flip, so clip space matches
/// Vulkan's convention (Y pointing down).
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport aspect ratio (width / height).
    pub aspect: f32,
    /// Near clip plane distance.
    pub near: f32,
    /// Far clip plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, 10.0),
            target: Vec3::ZERO,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Create a camera at `position` looking at `target`.
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            aspect,
            ..Self::default()
        }
    }

    /// Update the aspect ratio, typically after a window resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Get the projection matrix (with Vulkan Y-flip).
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_set_aspect() {
        let mut camera = Camera::default();
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn test_view_matrix_moves_target_to_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0);
        let view = camera.view_matrix();
        let target_view = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(target_view.z < 0.0);
        assert!(target_view.x.abs() < 1e-6);
        assert!(target_view.y.abs() < 1e-6);
    }
}
