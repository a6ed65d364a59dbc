//! Spreading of Lagrangian quantities onto the grid and interpolation of grid
//! fields back to Lagrangian points.
//!
//! Both directions are built from the same [`Stencil`], which makes them exact
//! adjoints under the `dx·dy` weighted grid inner product:
//! `Σ_grid spread(F)·u·dx·dy == Σ_points F·interpolate(u)`.

use rayon::prelude::*;

use crate::datatypes::{EulerianField, Grid, Point};
use crate::delta::DeltaKernel;

/// Wrapped node indices and tensor-product weights for one Lagrangian point
#[derive(Debug, Clone, Copy)]
pub struct Stencil {
    pub i: [usize; 4],
    pub j: [usize; 4],
    pub wx: [f64; 4],
    pub wy: [f64; 4],
}

impl Stencil {
    pub fn new(kernel: DeltaKernel, grid: &Grid, position: &Point) -> Stencil {
        let p = grid.wrap(position);
        let (first_i, wx) = kernel.stencil_weights(p.x / grid.dx);
        let (first_j, wy) = kernel.stencil_weights(p.y / grid.dy);

        let mut i = [0; 4];
        let mut j = [0; 4];
        for k in 0..4 {
            i[k] = grid.wrap_i(first_i + k as i64);
            j[k] = grid.wrap_j(first_j + k as i64);
        }

        Stencil { i, j, wx, wy }
    }

    /// Iterates `(i, j, weight)` over the 16 nodes of the stencil
    pub fn nodes(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..4).flat_map(move |a| {
            (0..4).map(move |b| (self.i[a], self.j[b], self.wx[a] * self.wy[b]))
        })
    }

    pub fn interpolate(&self, field: &EulerianField) -> f64 {
        self.nodes().map(|(i, j, w)| field[(i, j)] * w).sum()
    }
}

/// Builds the stencils of all points in parallel
pub fn build_stencils(kernel: DeltaKernel, grid: &Grid, positions: &[Point]) -> Vec<Stencil> {
    positions
        .par_iter()
        .map(|p| Stencil::new(kernel, grid, p))
        .collect()
}

/// Spreads one scalar per Lagrangian point onto the grid
///
/// # Arguments
/// * `kernel` - The delta kernel
/// * `grid` - The Eulerian grid
/// * `positions` - Lagrangian positions
/// * `values` - One value per position
///
/// # Returns
/// A grid density whose integral `Σ f·dx·dy` equals `Σ values`
pub fn spread(
    kernel: DeltaKernel,
    grid: &Grid,
    positions: &[Point],
    values: &[f64],
) -> EulerianField {
    let stencils = build_stencils(kernel, grid, positions);
    spread_with(grid, &stencils, values)
}

pub fn spread_with(grid: &Grid, stencils: &[Stencil], values: &[f64]) -> EulerianField {
    let mut field = grid.zeros();
    let scale = 1.0 / grid.cell_area();
    for (stencil, value) in std::iter::zip(stencils, values) {
        if *value == 0.0 {
            continue;
        }
        for (i, j, w) in stencil.nodes() {
            field[(i, j)] += value * w * scale;
        }
    }
    field
}

/// Spreads Lagrangian vectors (forces) onto the grid
///
/// # Returns
/// The x and y component fields, in that order
pub fn spread_vector(
    kernel: DeltaKernel,
    grid: &Grid,
    positions: &[Point],
    values: &[Point],
) -> (EulerianField, EulerianField) {
    let stencils = build_stencils(kernel, grid, positions);
    spread_vector_with(grid, &stencils, values)
}

pub fn spread_vector_with(
    grid: &Grid,
    stencils: &[Stencil],
    values: &[Point],
) -> (EulerianField, EulerianField) {
    let mut fx = grid.zeros();
    let mut fy = grid.zeros();
    let scale = 1.0 / grid.cell_area();
    for (stencil, value) in std::iter::zip(stencils, values) {
        for (i, j, w) in stencil.nodes() {
            fx[(i, j)] += value.x * w * scale;
            fy[(i, j)] += value.y * w * scale;
        }
    }
    (fx, fy)
}

/// Interpolates a grid field at each Lagrangian point
pub fn interpolate(
    kernel: DeltaKernel,
    grid: &Grid,
    field: &EulerianField,
    positions: &[Point],
) -> Vec<f64> {
    positions
        .par_iter()
        .map(|p| Stencil::new(kernel, grid, p).interpolate(field))
        .collect()
}

/// Interpolates a velocity-like pair of fields at each Lagrangian point
pub fn interpolate_vector(
    kernel: DeltaKernel,
    grid: &Grid,
    u: &EulerianField,
    v: &EulerianField,
    positions: &[Point],
) -> Vec<Point> {
    positions
        .par_iter()
        .map(|p| {
            let stencil = Stencil::new(kernel, grid, p);
            Point::new(stencil.interpolate(u), stencil.interpolate(v))
        })
        .collect()
}
