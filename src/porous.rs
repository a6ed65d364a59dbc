//! Slip velocities of porous and poroelastic points.
//!
//! A porous point leaks through the structure normal to it with velocity
//! `U_p = −α (F·n̂) / |X_s| n̂`, where the tangent `X_s` comes from a
//! finite-difference stencil over the ordered porous points. The stencil flag
//! picks the stencil: `0` five-point central, `±1` three-point central, `−2`
//! forward at a chain start and `2` backward at a chain end.
//!
//! A poroelastic point drifts through the fluid with the Darcy slip `F / α`
//! and drags on the fluid around it with `α (U − ũ)`, where `U` is the
//! point's own velocity and `ũ` the fluid velocity sampled at the point.

use crate::datatypes::{Grid, Point};
use crate::error::{IbError, IbResult};
use crate::forces::{ElementKind, ForceElement, PoroelasticPoint, PorousPoint};

pub fn porous_points(elements: &[ForceElement]) -> Vec<PorousPoint> {
    elements
        .iter()
        .filter_map(|e| match &e.kind {
            ElementKind::PorousPoint(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

pub fn poroelastic_points(elements: &[ForceElement]) -> Vec<PoroelasticPoint> {
    elements
        .iter()
        .filter_map(|e| match &e.kind {
            ElementKind::PoroelasticPoint(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

/// Checks that every porous stencil stays inside the porous point list
pub fn validate_porous_stencils(porous: &[PorousPoint]) -> IbResult<()> {
    let n = porous.len() as i64;
    for (k, point) in porous.iter().enumerate() {
        let k = k as i64;
        let (lo, hi) = stencil_reach(point.stencil_flag);
        if k + lo < 0 || k + hi >= n {
            return Err(IbError::Config(format!(
                "Porous point {} with stencil flag {} needs neighbours outside the porous list",
                point.index + 1,
                point.stencil_flag
            )));
        }
    }
    Ok(())
}

fn stencil_reach(flag: i32) -> (i64, i64) {
    match flag {
        0 => (-2, 2),
        -2 => (0, 1),
        2 => (-1, 0),
        _ => (-1, 1),
    }
}

/// Tangent `∂X/∂s` at porous list entry `k`
fn tangent(grid: &Grid, porous: &[PorousPoint], positions: &[Point], k: usize, ds: f64) -> Point {
    let at = |offset: i64| positions[porous[(k as i64 + offset) as usize].index];
    let x = at(0);
    let rel = |offset: i64| grid.offset(&x, &at(offset));

    match porous[k].stencil_flag {
        0 => (rel(-2) - rel(-1) * 8.0 + rel(1) * 8.0 - rel(2)) / (12.0 * ds),
        -2 => rel(1) / ds,
        2 => -rel(-1) / ds,
        _ => (rel(1) - rel(-1)) / (2.0 * ds),
    }
}

/// Normal slip velocity of every porous point
///
/// # Arguments
/// * `grid` - The Eulerian grid
/// * `porous` - Ordered porous points
/// * `positions` - Lagrangian positions
/// * `forces` - Assembled Lagrangian forces
/// * `ds` - Lagrangian spacing of the porous chain
///
/// # Returns
/// One slip velocity per Lagrangian point, zero for non-porous points
pub fn porous_slip(
    grid: &Grid,
    porous: &[PorousPoint],
    positions: &[Point],
    forces: &[Point],
    ds: f64,
) -> Vec<Point> {
    let mut slip = vec![Point::zeros(); positions.len()];
    for (k, point) in porous.iter().enumerate() {
        let t = tangent(grid, porous, positions, k, ds);
        let stretch = t.norm();
        if stretch == 0.0 {
            continue;
        }
        let normal = Point::new(-t.y, t.x) / stretch;
        let f = forces[point.index];
        slip[point.index] = normal * (-point.porosity * f.dot(&normal) / stretch);
    }
    slip
}

/// Darcy slip `F / α` of every poroelastic point
pub fn poroelastic_slip(
    poroelastic: &[PoroelasticPoint],
    point_count: usize,
    forces: &[Point],
) -> Vec<Point> {
    let mut slip = vec![Point::zeros(); point_count];
    for p in poroelastic {
        slip[p.index] = forces[p.index] / p.coefficient;
    }
    slip
}

/// Brinkman drag `α (U − ũ)` of every poroelastic point
///
/// # Arguments
/// * `poroelastic` - The poroelastic points
/// * `point_velocities` - Velocities the points actually moved with
/// * `fluid_velocities` - Fluid velocities interpolated at the points
///
/// # Returns
/// One drag per Lagrangian point, zero for all other points
pub fn poroelastic_drag(
    poroelastic: &[PoroelasticPoint],
    point_velocities: &[Point],
    fluid_velocities: &[Point],
) -> Vec<Point> {
    let mut drag = vec![Point::zeros(); point_velocities.len()];
    for p in poroelastic {
        drag[p.index] = (point_velocities[p.index] - fluid_velocities[p.index]) * p.coefficient;
    }
    drag
}
