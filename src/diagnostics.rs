use crate::datatypes::{EulerianField, Grid, Point};
use crate::fluid::{d_dx, d_dy, FluidState};

/// `∂v/∂x − ∂u/∂y` with centered differences
pub fn vorticity(grid: &Grid, state: &FluidState) -> EulerianField {
    d_dx(grid, &state.v) - d_dy(grid, &state.u)
}

/// `∂u/∂x + ∂v/∂y` with centered differences
pub fn divergence(grid: &Grid, state: &FluidState) -> EulerianField {
    d_dx(grid, &state.u) + d_dy(grid, &state.v)
}

pub fn velocity_magnitude(state: &FluidState) -> EulerianField {
    state.u.zip_map(&state.v, |u, v| u.hypot(v))
}

/// Largest `dt·(|u|/dx + |v|/dy)` over the grid
pub fn cfl_number(grid: &Grid, state: &FluidState, dt: f64) -> f64 {
    state
        .u
        .iter()
        .zip(state.v.iter())
        .map(|(u, v)| dt * (u.abs() / grid.dx + v.abs() / grid.dy))
        .fold(0.0, f64::max)
}

pub fn kinetic_energy(grid: &Grid, state: &FluidState, rho: f64) -> f64 {
    let sum: f64 = state
        .u
        .iter()
        .zip(state.v.iter())
        .map(|(u, v)| u * u + v * v)
        .sum();
    0.5 * rho * sum * grid.cell_area()
}

/// Splits each point's force into normal and tangential parts.
///
/// The tangent at point `k` is taken from its neighbours `k−1` and `k+1` in
/// point order (one-sided at the ends).
///
/// # Returns
/// `(normal, tangential)` components per point
pub fn decompose_forces(grid: &Grid, positions: &[Point], forces: &[Point]) -> Vec<(f64, f64)> {
    let n = positions.len();
    (0..n)
        .map(|k| {
            let before = if k > 0 { k - 1 } else { k };
            let after = if k + 1 < n { k + 1 } else { k };
            let t = grid.offset(&positions[before], &positions[after]);
            let length = t.norm();
            if length == 0.0 {
                return (0.0, 0.0);
            }
            let tangent = t / length;
            let normal = Point::new(-tangent.y, tangent.x);
            (forces[k].dot(&normal), forces[k].dot(&tangent))
        })
        .collect()
}
