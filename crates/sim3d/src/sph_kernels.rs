//! SPH smoothing kernels.
//!
//! Standard (poly6) and spiky kernels after Mueller et al., "Particle-based
//! fluid simulation for interactive applications", SCA 2003.

use std::f32::consts::PI;

use glam::Vec3;

/// Standard (poly6) smoothing kernel.
#[derive(Clone, Copy, Debug)]
pub struct SphStdKernel3 {
    /// Kernel radius.
    pub h: f32,
    h2: f32,
    h3: f32,
    h5: f32,
}

impl SphStdKernel3 {
    pub fn new(kernel_radius: f32) -> Self {
        let h = kernel_radius;
        let h2 = h * h;
        let h3 = h2 * h;
        let h5 = h2 * h3;
        Self { h, h2, h3, h5 }
    }

    /// Kernel value at the given distance.
    pub fn value(&self, distance: f32) -> f32 {
        if distance * distance >= self.h2 {
            0.0
        } else {
            let x = 1.0 - distance * distance / self.h2;
            315.0 / (64.0 * PI * self.h3) * x * x * x
        }
    }

    /// First derivative at the given distance.
    pub fn first_derivative(&self, distance: f32) -> f32 {
        if distance >= self.h {
            0.0
        } else {
            let x = 1.0 - distance * distance / self.h2;
            -945.0 / (32.0 * PI * self.h5) * distance * x * x
        }
    }

    /// Gradient at a point offset from the kernel center.
    pub fn gradient(&self, point: Vec3) -> Vec3 {
        let dist = point.length();
        if dist > 0.0 {
            self.gradient_at(dist, point / dist)
        } else {
            Vec3::ZERO
        }
    }

    /// Gradient from distance and direction toward the kernel center.
    pub fn gradient_at(&self, distance: f32, direction_to_center: Vec3) -> Vec3 {
        -self.first_derivative(distance) * direction_to_center
    }

    /// Second derivative at the given distance.
    pub fn second_derivative(&self, distance: f32) -> f32 {
        if distance * distance >= self.h2 {
            0.0
        } else {
            let x = distance * distance / self.h2;
            945.0 / (32.0 * PI * self.h5) * (1.0 - x) * (3.0 * x - 1.0)
        }
    }
}

/// Spiky smoothing kernel; its gradient stays nonzero toward the center,
/// which keeps pressure forces repulsive at short range.
#[derive(Clone, Copy, Debug)]
pub struct SphSpikyKernel3 {
    /// Kernel radius.
    pub h: f32,
    h3: f32,
    h4: f32,
    h5: f32,
}

impl SphSpikyKernel3 {
    pub fn new(kernel_radius: f32) -> Self {
        let h = kernel_radius;
        let h2 = h * h;
        let h3 = h2 * h;
        let h4 = h2 * h2;
        let h5 = h3 * h2;
        Self { h, h3, h4, h5 }
    }

    /// Kernel value at the given distance.
    pub fn value(&self, distance: f32) -> f32 {
        if distance >= self.h {
            0.0
        } else {
            let x = 1.0 - distance / self.h;
            15.0 / (PI * self.h3) * x * x * x
        }
    }

    /// First derivative at the given distance.
    pub fn first_derivative(&self, distance: f32) -> f32 {
        if distance >= self.h {
            0.0
        } else {
            let x = 1.0 - distance / self.h;
            -45.0 / (PI * self.h4) * x * x
        }
    }

    /// Gradient at a point offset from the kernel center.
    pub fn gradient(&self, point: Vec3) -> Vec3 {
        let dist = point.length();
        if dist > 0.0 {
            self.gradient_at(dist, point / dist)
        } else {
            Vec3::ZERO
        }
    }

    /// Gradient from distance and direction toward the kernel center.
    pub fn gradient_at(&self, distance: f32, direction_to_center: Vec3) -> Vec3 {
        -self.first_derivative(distance) * direction_to_center
    }

    /// Second derivative at the given distance.
    pub fn second_derivative(&self, distance: f32) -> f32 {
        if distance >= self.h {
            0.0
        } else {
            let x = 1.0 - distance / self.h;
            90.0 / (PI * self.h5) * x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_kernel_peak_at_center() {
        let kernel = SphStdKernel3::new(1.0);
        assert!(kernel.value(0.0) > kernel.value(0.5));
        assert_eq!(kernel.value(1.0), 0.0);
        assert_eq!(kernel.value(2.0), 0.0);
    }

    #[test]
    fn test_std_kernel_integrates_to_one() {
        // Riemann sum over the support should recover unity.
        let h = 1.0f32;
        let kernel = SphStdKernel3::new(h);
        let n = 40;
        let dx = 2.0 * h / n as f32;
        let mut sum = 0.0;
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let p = Vec3::new(
                        -h + (i as f32 + 0.5) * dx,
                        -h + (j as f32 + 0.5) * dx,
                        -h + (k as f32 + 0.5) * dx,
                    );
                    sum += kernel.value(p.length()) * dx * dx * dx;
                }
            }
        }
        assert!((sum - 1.0).abs() < 0.02, "integral = {}", sum);
    }

    #[test]
    fn test_spiky_gradient_points_away_from_neighbor() {
        let kernel = SphSpikyKernel3::new(1.0);
        // Gradient of W centered at origin, evaluated toward +X, points
        // along +X (repulsive direction).
        let g = kernel.gradient(Vec3::new(0.5, 0.0, 0.0));
        assert!(g.x > 0.0);
        assert_eq!(g.y, 0.0);
    }

    #[test]
    fn test_gradient_zero_at_center_and_outside() {
        let kernel = SphSpikyKernel3::new(1.0);
        assert_eq!(kernel.gradient(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(kernel.gradient(Vec3::new(2.0, 0.0, 0.0)), Vec3::ZERO);
    }
}
