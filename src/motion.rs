use crate::datatypes::{EulerianField, Grid, Point};
use crate::delta::DeltaKernel;
use crate::transfer::interpolate_vector;

/// Moves Lagrangian points with the local fluid velocity
///
/// The velocity is interpolated at `reference`, which is the half-step
/// configuration during the corrector so that the update realizes the
/// midpoint rule.
///
/// # Arguments
/// * `kernel` - Delta kernel used for interpolation
/// * `grid` - The Eulerian grid
/// * `u`, `v` - Velocity fields to interpolate
/// * `current` - Positions the update starts from
/// * `reference` - Positions the velocity is sampled at
/// * `dt` - Step length
/// * `slip` - Optional per-point slip velocity added to the fluid velocity
///
/// # Returns
/// The wrapped new positions and the interpolated fluid velocities
#[allow(clippy::too_many_arguments)]
pub fn move_lagrangian_points(
    kernel: DeltaKernel,
    grid: &Grid,
    u: &EulerianField,
    v: &EulerianField,
    current: &[Point],
    reference: &[Point],
    dt: f64,
    slip: Option<&[Point]>,
) -> (Vec<Point>, Vec<Point>) {
    let velocities = interpolate_vector(kernel, grid, u, v, reference);

    let moved = current
        .iter()
        .zip(&velocities)
        .enumerate()
        .map(|(k, (x, vel))| {
            let drift = slip.map(|s| s[k]).unwrap_or_else(Point::zeros);
            grid.wrap(&(x + (vel + drift) * dt))
        })
        .collect();

    (moved, velocities)
}
