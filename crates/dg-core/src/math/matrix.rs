// Copyright 2025 The DG Engine Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Column-major 4x4 matrix used for model and camera transforms.

use super::vector::{Vec3, Vec4};
use super::EPSILON;
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// The memory layout matches what a shader expects for a `mat4` uniform, so
/// [`Mat4::to_cols_array`] can be handed to the device unchanged.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = v.extend(1.0);
        m
    }

    /// Creates a non-uniform scaling matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    /// Creates a counter-clockwise rotation around the Z axis.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle of rotation in radians.
    #[inline]
    pub fn from_rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, s, 0.0, 0.0),
            Vec4::new(-s, c, 0.0, 0.0),
            Vec4::Z,
            Vec4::W,
        )
    }

    /// Creates an orthographic projection mapping the given box to the
    /// `[-1, 1]` clip cube on every axis.
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let rml = right - left;
        let tmb = top - bottom;
        let fmn = far - near;
        Self::from_cols(
            Vec4::new(2.0 / rml, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tmb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 / fmn, 0.0),
            Vec4::new(
                -(right + left) / rml,
                -(top + bottom) / tmb,
                -(far + near) / fmn,
                1.0,
            ),
        )
    }

    /// Computes the inverse of the matrix by Gauss-Jordan elimination.
    /// Returns `None` if the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        // Rows of the augmented system [self | I].
        let mut a = [[0.0f32; 8]; 4];
        for (r, row) in a.iter_mut().enumerate() {
            let src = self.row(r).to_array();
            row[..4].copy_from_slice(&src);
            row[4 + r] = 1.0;
        }

        for col in 0..4 {
            let pivot = (col..4)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() < EPSILON {
                return None;
            }
            a.swap(col, pivot);

            let inv = 1.0 / a[col][col];
            for v in a[col].iter_mut() {
                *v *= inv;
            }
            for r in 0..4 {
                if r != col {
                    let factor = a[r][col];
                    if factor != 0.0 {
                        for c in 0..8 {
                            a[r][c] -= factor * a[col][c];
                        }
                    }
                }
            }
        }

        let col = |c: usize| Vec4::new(a[0][4 + c], a[1][4 + c], a[2][4 + c], a[3][4 + c]);
        Some(Self::from_cols(col(0), col(1), col(2), col(3)))
    }

    /// Returns the 16 elements in column-major order.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(self.cols)
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        let mut cols = [Vec4::ZERO; 4];
        for (out, rhs_col) in cols.iter_mut().zip(rhs.cols) {
            *out = self * rhs_col;
        }
        Self { cols }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    /// Transforms a `Vec4` by this matrix.
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, PI};

    fn mat_approx_eq(a: &Mat4, b: &Mat4) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| approx_eq(*x, *y))
    }

    #[test]
    fn test_translation_moves_points() {
        let m = Mat4::from_translation(Vec3::new(2.0, -3.0, 1.0));
        let p = m * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!(p, Vec4::new(3.0, -2.0, 1.0, 1.0));
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let m = Mat4::from_rotation_z(PI / 2.0);
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(approx_eq(p.x, 0.0));
        assert!(approx_eq(p.y, 1.0));
    }

    #[test]
    fn test_inverse_of_trs() {
        let m = Mat4::from_translation(Vec3::new(4.0, 5.0, 0.0))
            * Mat4::from_rotation_z(0.7)
            * Mat4::from_scale(Vec3::new(2.0, 3.0, 1.0));
        let inv = m.inverse().expect("trs matrix is invertible");
        assert!(mat_approx_eq(&(m * inv), &Mat4::IDENTITY));
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let m = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(m.inverse().is_none());
    }

    #[test]
    fn test_orthographic_maps_corners() {
        let m = Mat4::orthographic(0.0, 100.0, 0.0, 50.0, -1.0, 1.0);
        let p = m * Vec4::new(100.0, 50.0, 0.0, 1.0);
        assert!(approx_eq(p.x, 1.0));
        assert!(approx_eq(p.y, 1.0));
        let q = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(approx_eq(q.x, -1.0));
        assert!(approx_eq(q.y, -1.0));
    }
}
