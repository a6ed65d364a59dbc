//! Incompressible Navier–Stokes on the periodic grid.
//!
//! One call advances `(u, v, p)` by `dt`:
//!
//! 1. centered, periodic advection `(u·∇)u` from the current velocity
//! 2. right-hand side `ρu/dt − ρ(u·∇)u + f`
//! 3. in Fourier space, solve for the pressure with the centered gradient
//!    symbol and divide by the implicit viscous operator `ρ/dt − μ·L̂`, where
//!    `L̂` is the five-point Laplacian symbol
//! 4. transform back
//!
//! Using the same centered symbol for the projection as for the divergence
//! makes the discrete divergence of the result vanish to round-off.

use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::DMatrix;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::datatypes::{EulerianField, FluidParameters, Grid};
use crate::error::{IbError, IbResult};

#[derive(Debug, Clone, PartialEq)]
pub struct FluidState {
    pub u: EulerianField,
    pub v: EulerianField,
    pub p: EulerianField,
}

impl FluidState {
    pub fn at_rest(grid: &Grid) -> FluidState {
        FluidState {
            u: grid.zeros(),
            v: grid.zeros(),
            p: grid.zeros(),
        }
    }

    /// Builds a state by sampling velocity functions at the grid nodes
    pub fn from_fn<U, V>(grid: &Grid, u: U, v: V) -> FluidState
    where
        U: Fn(f64, f64) -> f64,
        V: Fn(f64, f64) -> f64,
    {
        FluidState {
            u: DMatrix::from_fn(grid.nx, grid.ny, |i, j| {
                u(i as f64 * grid.dx, j as f64 * grid.dy)
            }),
            v: DMatrix::from_fn(grid.nx, grid.ny, |i, j| {
                v(i as f64 * grid.dx, j as f64 * grid.dy)
            }),
            p: grid.zeros(),
        }
    }

    pub fn is_finite(&self) -> bool {
        all_finite(&self.u) && all_finite(&self.v) && all_finite(&self.p)
    }
}

pub fn all_finite(field: &EulerianField) -> bool {
    field.iter().all(|x| x.is_finite())
}

/// Centered first difference in x with periodic wrap
pub fn d_dx(grid: &Grid, f: &EulerianField) -> EulerianField {
    DMatrix::from_fn(grid.nx, grid.ny, |i, j| {
        let ip = (i + 1) % grid.nx;
        let im = (i + grid.nx - 1) % grid.nx;
        (f[(ip, j)] - f[(im, j)]) / (2.0 * grid.dx)
    })
}

/// Centered first difference in y with periodic wrap
pub fn d_dy(grid: &Grid, f: &EulerianField) -> EulerianField {
    DMatrix::from_fn(grid.nx, grid.ny, |i, j| {
        let jp = (j + 1) % grid.ny;
        let jm = (j + grid.ny - 1) % grid.ny;
        (f[(i, jp)] - f[(i, jm)]) / (2.0 * grid.dy)
    })
}

/// FFT-based projection solver. Plans are built once per grid.
pub struct FluidSolver {
    grid: Grid,
    forward_x: Arc<dyn Fft<f64>>,
    forward_y: Arc<dyn Fft<f64>>,
    inverse_x: Arc<dyn Fft<f64>>,
    inverse_y: Arc<dyn Fft<f64>>,
    /// `sin(k dx)/dx`, zero at the mean and Nyquist modes
    gradient_x: Vec<f64>,
    gradient_y: Vec<f64>,
    /// Negated five-point Laplacian symbol, `4/dx² sin²(k dx/2) + ...`
    neg_laplacian: Vec<f64>,
}

impl FluidSolver {
    pub fn new(grid: &Grid) -> FluidSolver {
        let mut planner = FftPlanner::<f64>::new();

        let gradient_x = gradient_symbol(grid.nx, grid.dx);
        let gradient_y = gradient_symbol(grid.ny, grid.dy);

        let mut neg_laplacian = vec![0.0; grid.nx * grid.ny];
        for j in 0..grid.ny {
            let sy = (PI * j as f64 / grid.ny as f64).sin();
            for i in 0..grid.nx {
                let sx = (PI * i as f64 / grid.nx as f64).sin();
                neg_laplacian[i + grid.nx * j] =
                    4.0 * sx * sx / (grid.dx * grid.dx) + 4.0 * sy * sy / (grid.dy * grid.dy);
            }
        }

        FluidSolver {
            grid: *grid,
            forward_x: planner.plan_fft_forward(grid.nx),
            forward_y: planner.plan_fft_forward(grid.ny),
            inverse_x: planner.plan_fft_inverse(grid.nx),
            inverse_y: planner.plan_fft_inverse(grid.ny),
            gradient_x,
            gradient_y,
            neg_laplacian,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Advances the fluid one step under the given forcing
    ///
    /// # Arguments
    /// * `state` - Velocity and pressure, overwritten with the new values
    /// * `fx`, `fy` - Eulerian force density
    /// * `params` - Viscosity and density
    /// * `dt` - Time step
    ///
    /// # Returns
    /// An error if the forcing or the resulting state is not finite
    pub fn advance(
        &self,
        state: &mut FluidState,
        fx: &EulerianField,
        fy: &EulerianField,
        params: FluidParameters,
        dt: f64,
    ) -> IbResult<()> {
        if !all_finite(fx) || !all_finite(fy) {
            return Err(IbError::Divergence(
                "Non-finite Eulerian forcing passed to the fluid solver".to_owned(),
            ));
        }

        let grid = &self.grid;
        let FluidParameters { mu, rho } = params;

        // Explicit advection, centered and periodic
        let adv_u = state.u.component_mul(&d_dx(grid, &state.u))
            + state.v.component_mul(&d_dy(grid, &state.u));
        let adv_v = state.u.component_mul(&d_dx(grid, &state.v))
            + state.v.component_mul(&d_dy(grid, &state.v));

        let rhs_u = &state.u * (rho / dt) - adv_u * rho + fx;
        let rhs_v = &state.v * (rho / dt) - adv_v * rho + fy;

        let mut u_hat = self.forward(&rhs_u);
        let mut v_hat = self.forward(&rhs_v);
        let mut p_hat = vec![Complex::new(0.0, 0.0); u_hat.len()];

        let i_unit = Complex::new(0.0, 1.0);
        for j in 0..grid.ny {
            let gy = self.gradient_y[j];
            for i in 0..grid.nx {
                let k = i + grid.nx * j;
                let gx = self.gradient_x[i];
                let g2 = gx * gx + gy * gy;

                // The mean mode and modes invisible to the centered gradient
                // carry no pressure
                if g2 > 0.0 {
                    let div = (u_hat[k] * gx + v_hat[k] * gy) * i_unit;
                    p_hat[k] = -div / g2;
                }

                let operator = rho / dt + mu * self.neg_laplacian[k];
                u_hat[k] = (u_hat[k] - i_unit * gx * p_hat[k]) / operator;
                v_hat[k] = (v_hat[k] - i_unit * gy * p_hat[k]) / operator;
            }
        }

        state.u = self.inverse(u_hat);
        state.v = self.inverse(v_hat);
        state.p = self.inverse(p_hat);

        if !state.is_finite() {
            return Err(IbError::Divergence(
                "Fluid solve produced non-finite velocity or pressure".to_owned(),
            ));
        }

        Ok(())
    }

    fn forward(&self, field: &EulerianField) -> Vec<Complex<f64>> {
        let mut data: Vec<Complex<f64>> =
            field.iter().map(|x| Complex::new(*x, 0.0)).collect();
        self.transform(&mut data, &self.forward_x, &self.forward_y);
        data
    }

    fn inverse(&self, mut data: Vec<Complex<f64>>) -> EulerianField {
        self.transform(&mut data, &self.inverse_x, &self.inverse_y);
        let scale = 1.0 / (self.grid.nx * self.grid.ny) as f64;
        DMatrix::from_iterator(
            self.grid.nx,
            self.grid.ny,
            data.iter().map(|c| c.re * scale),
        )
    }

    /// 2-D transform: x lines are contiguous, y lines go through a transpose
    fn transform(
        &self,
        data: &mut [Complex<f64>],
        along_x: &Arc<dyn Fft<f64>>,
        along_y: &Arc<dyn Fft<f64>>,
    ) {
        let (nx, ny) = (self.grid.nx, self.grid.ny);

        data.par_chunks_mut(nx).for_each(|line| along_x.process(line));

        let mut transposed = transpose(data, nx, ny);
        transposed
            .par_chunks_mut(ny)
            .for_each(|line| along_y.process(line));

        data.copy_from_slice(&transpose(&transposed, ny, nx));
    }
}

fn gradient_symbol(n: usize, h: f64) -> Vec<f64> {
    (0..n)
        .map(|m| {
            if m == 0 || 2 * m == n {
                0.0
            } else {
                (2.0 * PI * m as f64 / n as f64).sin() / h
            }
        })
        .collect()
}

/// Transposes a buffer of `cols` contiguous runs of length `rows`
fn transpose(data: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for c in 0..cols {
        for r in 0..rows {
            out[c + cols * r] = data[r + rows * c];
        }
    }
    out
}
