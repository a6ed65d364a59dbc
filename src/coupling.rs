//! Collaborators that drive the structure or the fluid from outside the
//! force library: prescribed activation series and background flows.

use crate::datatypes::{EulerianField, Grid, Point};
use crate::error::{IbError, IbResult};
use crate::fluid::FluidState;
use crate::forces::{ElementKind, ForceElement};

/// Stateful additive Eulerian forcing evaluated once per step
pub trait BackgroundFlow: Send {
    /// # Returns
    /// The `(fx, fy)` force density to add to the step's forcing
    fn forcing(
        &mut self,
        grid: &Grid,
        state: &FluidState,
        time: f64,
    ) -> (EulerianField, EulerianField);
}

/// Penalizes the velocity toward `target` inside an axis-aligned region
#[derive(Debug, Clone)]
pub struct PenaltyInflow {
    pub target: Point,
    /// Lower-left corner of the region
    pub lower: Point,
    /// Upper-right corner of the region
    pub upper: Point,
    pub stiffness: f64,
    mask: Option<Vec<(usize, usize)>>,
}

impl PenaltyInflow {
    pub fn new(target: Point, lower: Point, upper: Point, stiffness: f64) -> IbResult<PenaltyInflow> {
        if upper.x <= lower.x || upper.y <= lower.y {
            return Err(IbError::Config(format!(
                "Inflow region [{}, {}] x [{}, {}] is empty",
                lower.x, upper.x, lower.y, upper.y
            )));
        }
        if stiffness < 0.0 {
            return Err(IbError::Config(format!(
                "Inflow penalty stiffness must be non-negative, got {stiffness}"
            )));
        }
        Ok(PenaltyInflow {
            target,
            lower,
            upper,
            stiffness,
            mask: None,
        })
    }

    /// Grid nodes inside the region, found on first use
    fn mask(&mut self, grid: &Grid) -> &[(usize, usize)] {
        let (lower, upper) = (self.lower, self.upper);
        self.mask.get_or_insert_with(|| {
            let mut nodes = Vec::new();
            for j in 0..grid.ny {
                let y = j as f64 * grid.dy;
                for i in 0..grid.nx {
                    let x = i as f64 * grid.dx;
                    if (lower.x..=upper.x).contains(&x) && (lower.y..=upper.y).contains(&y) {
                        nodes.push((i, j));
                    }
                }
            }
            nodes
        })
    }
}

impl BackgroundFlow for PenaltyInflow {
    fn forcing(
        &mut self,
        grid: &Grid,
        state: &FluidState,
        _time: f64,
    ) -> (EulerianField, EulerianField) {
        let mut fx = grid.zeros();
        let mut fy = grid.zeros();
        let (target, stiffness) = (self.target, self.stiffness);
        for &(i, j) in self.mask(grid) {
            fx[(i, j)] = stiffness * (target.x - state.u[(i, j)]);
            fy[(i, j)] = stiffness * (target.y - state.v[(i, j)]);
        }
        (fx, fy)
    }
}

/// Prescribed activation rows, one per time step.
///
/// Row entries belong to the Lagrangian points `start..=end`. Springs whose
/// master point lies in that range get stiffness `peak_stiffness · a⁴`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationSeries {
    rows: Vec<Vec<f64>>,
    start: usize,
    end: usize,
    peak_stiffness: f64,
}

impl ActivationSeries {
    /// # Arguments
    /// * `rows` - Activation per step, each row covering `start..=end`
    /// * `start`, `end` - Zero-based inclusive point range
    /// * `peak_stiffness` - Stiffness at full activation
    pub fn new(
        rows: Vec<Vec<f64>>,
        start: usize,
        end: usize,
        peak_stiffness: f64,
    ) -> IbResult<ActivationSeries> {
        if end < start {
            return Err(IbError::Config(format!(
                "Activation range end {} precedes start {}",
                end + 1,
                start + 1
            )));
        }
        if rows.is_empty() {
            return Err(IbError::Config("Activation series has no rows".to_owned()));
        }
        let width = end - start + 1;
        if let Some((step, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(IbError::Config(format!(
                "Activation row {} has {} entries, expected {width}",
                step + 1,
                row.len()
            )));
        }
        Ok(ActivationSeries {
            rows,
            start,
            end,
            peak_stiffness,
        })
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Activation row for `step`, holding the last row once the series runs out
    pub fn row(&self, step: usize) -> &[f64] {
        let last = self.rows.len() - 1;
        &self.rows[step.min(last)]
    }

    /// Overrides spring stiffnesses from the row for `step`
    pub fn apply(&self, step: usize, elements: &mut [ForceElement]) {
        let row = self.row(step);
        let stiffness_at = |master: usize| -> Option<f64> {
            if master < self.start || master > self.end {
                return None;
            }
            Some(self.peak_stiffness * row[master - self.start].powi(4))
        };

        for element in elements.iter_mut() {
            match &mut element.kind {
                ElementKind::Spring(s) => {
                    if let Some(k) = stiffness_at(s.master) {
                        s.stiffness = k;
                    }
                }
                ElementKind::DampedSpring(d) => {
                    if let Some(k) = stiffness_at(d.spring.master) {
                        d.spring.stiffness = k;
                    }
                }
                _ => {}
            }
        }
    }
}
