use nalgebra::{DMatrix, Vector2};

use crate::error::{IbError, IbResult};

/// A Lagrangian point position, force or velocity
pub type Point = Vector2<f64>;

/// A periodic grid field indexed `(i, j)`; `nrows = nx`, `ncols = ny`
pub type EulerianField = DMatrix<f64>;

/// Uniform periodic Eulerian grid. Grid node `(i, j)` sits at `(i·dx, j·dy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    pub lx: f64,
    pub ly: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Grid {
    /// Builds a grid, rejecting shapes the 4-point stencil cannot live on
    ///
    /// # Arguments
    /// * `nx`, `ny` - Number of cells in each direction
    /// * `lx`, `ly` - Domain lengths
    ///
    /// # Returns
    /// A validated Grid
    pub fn new(nx: usize, ny: usize, lx: f64, ly: f64) -> IbResult<Grid> {
        if nx < 4 || ny < 4 {
            return Err(IbError::Config(format!(
                "Grid must have at least 4 cells per direction, got {nx}x{ny}"
            )));
        }
        if lx <= 0.0 || ly <= 0.0 || !lx.is_finite() || !ly.is_finite() {
            return Err(IbError::Config(format!(
                "Domain lengths must be positive, got lx = {lx}, ly = {ly}"
            )));
        }

        Ok(Grid {
            nx,
            ny,
            lx,
            ly,
            dx: lx / nx as f64,
            dy: ly / ny as f64,
        })
    }

    pub fn zeros(&self) -> EulerianField {
        DMatrix::zeros(self.nx, self.ny)
    }

    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// Wraps a grid index into `0..n`
    #[inline]
    pub fn wrap_i(&self, i: i64) -> usize {
        i.rem_euclid(self.nx as i64) as usize
    }

    #[inline]
    pub fn wrap_j(&self, j: i64) -> usize {
        j.rem_euclid(self.ny as i64) as usize
    }

    /// Wraps a position into `[0, lx) x [0, ly)`
    pub fn wrap(&self, p: &Point) -> Point {
        Point::new(wrap_coordinate(p.x, self.lx), wrap_coordinate(p.y, self.ly))
    }

    /// Minimum-image displacement pointing from `from` to `to`
    pub fn offset(&self, from: &Point, to: &Point) -> Point {
        let mut d = to - from;
        d.x -= self.lx * (d.x / self.lx).round();
        d.y -= self.ly * (d.y / self.ly).round();
        d
    }
}

fn wrap_coordinate(x: f64, length: f64) -> f64 {
    let wrapped = x.rem_euclid(length);
    // rem_euclid can round up to exactly `length` for tiny negative inputs
    if wrapped >= length {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidParameters {
    /// Dynamic viscosity
    pub mu: f64,
    /// Density
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeParameters {
    pub dt: f64,
    pub t_final: f64,
}

/// Unit gravity direction plus its magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    direction: Point,
    pub acceleration: f64,
}

impl Gravity {
    /// Normalizes `direction`; a zero vector is a configuration error
    pub fn new(direction: Point, acceleration: f64) -> IbResult<Gravity> {
        let norm = direction.norm();
        if norm <= 0.0 || !norm.is_finite() {
            return Err(IbError::Config(
                "Gravity direction must be a non-zero vector".to_owned(),
            ));
        }
        Ok(Gravity {
            direction: direction / norm,
            acceleration,
        })
    }

    pub fn direction(&self) -> Point {
        self.direction
    }

    /// Acceleration vector `g·ĝ`
    pub fn vector(&self) -> Point {
        self.direction * self.acceleration
    }
}
