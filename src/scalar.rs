//! Passive quantities carried by the flow: tracer particles and a
//! concentration field. Neither feeds back into the structure.

use nalgebra::DMatrix;

use crate::datatypes::{EulerianField, Grid, Point};
use crate::delta::DeltaKernel;
use crate::motion::move_lagrangian_points;

/// Massless tracer particles
#[derive(Debug, Clone, Default)]
pub struct Tracers {
    pub positions: Vec<Point>,
}

impl Tracers {
    pub fn new(positions: Vec<Point>) -> Tracers {
        Tracers { positions }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Midpoint update: predict with `(u0, v0)` then correct with `(u_mid, v_mid)`
    pub fn advance(
        &mut self,
        kernel: DeltaKernel,
        grid: &Grid,
        old: (&EulerianField, &EulerianField),
        mid: (&EulerianField, &EulerianField),
        dt: f64,
    ) {
        if self.positions.is_empty() {
            return;
        }
        let (half, _) = move_lagrangian_points(
            kernel,
            grid,
            old.0,
            old.1,
            &self.positions,
            &self.positions,
            0.5 * dt,
            None,
        );
        let (full, _) = move_lagrangian_points(
            kernel,
            grid,
            mid.0,
            mid.1,
            &self.positions,
            &half,
            dt,
            None,
        );
        self.positions = full;
    }
}

/// One explicit step of `c_t + u·∇c = D ∆c`.
///
/// First-order upwind advection and five-point diffusion, both periodic.
/// Stable while `dt·(|u|/dx + |v|/dy) ≤ 1` and `D·dt·(2/dx² + 2/dy²) ≤ 1`.
pub fn advect_diffuse(
    grid: &Grid,
    c: &EulerianField,
    u: &EulerianField,
    v: &EulerianField,
    diffusivity: f64,
    dt: f64,
) -> EulerianField {
    let (nx, ny) = (grid.nx, grid.ny);
    let (dx, dy) = (grid.dx, grid.dy);

    DMatrix::from_fn(nx, ny, |i, j| {
        let ip = (i + 1) % nx;
        let im = (i + nx - 1) % nx;
        let jp = (j + 1) % ny;
        let jm = (j + ny - 1) % ny;

        let here = c[(i, j)];
        let (uu, vv) = (u[(i, j)], v[(i, j)]);

        let cx = if uu > 0.0 {
            (here - c[(im, j)]) / dx
        } else {
            (c[(ip, j)] - here) / dx
        };
        let cy = if vv > 0.0 {
            (here - c[(i, jm)]) / dy
        } else {
            (c[(i, jp)] - here) / dy
        };

        let laplacian = (c[(ip, j)] - 2.0 * here + c[(im, j)]) / (dx * dx)
            + (c[(i, jp)] - 2.0 * here + c[(i, jm)]) / (dy * dy);

        here + dt * (diffusivity * laplacian - uu * cx - vv * cy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uniform_concentration_is_steady() {
        let grid = Grid::new(8, 8, 1.0, 1.0).unwrap();
        let c = DMatrix::from_element(8, 8, 0.7);
        let u = DMatrix::from_element(8, 8, 0.3);
        let v = DMatrix::from_element(8, 8, -0.2);
        let next = advect_diffuse(&grid, &c, &u, &v, 0.01, 1e-3);
        assert!(next.iter().all(|x| (x - 0.7).abs() < 1e-14));
    }

    #[test]
    fn diffusion_conserves_mass_and_flattens_peaks() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let mut c = grid.zeros();
        c[(8, 8)] = 1.0;
        let zero = grid.zeros();

        let next = advect_diffuse(&grid, &c, &zero, &zero, 0.1, 1e-4);
        assert_abs_diff_eq!(next.sum(), 1.0, epsilon = 1e-12);
        assert!(next[(8, 8)] < 1.0);
        assert!(next[(9, 8)] > 0.0);
    }

    #[test]
    fn tracers_follow_uniform_flow() {
        let grid = Grid::new(8, 8, 1.0, 1.0).unwrap();
        let u = DMatrix::from_element(8, 8, 1.0);
        let v = grid.zeros();
        let mut tracers = Tracers::new(vec![Point::new(0.95, 0.5)]);
        tracers.advance(DeltaKernel::Peskin4, &grid, (&u, &v), (&u, &v), 0.1);
        assert_abs_diff_eq!(tracers.positions[0].x, 0.05, epsilon = 1e-12);
    }
}
