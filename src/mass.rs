//! Massive boundary points.
//!
//! Each mass point carries its own position and velocity and is tied to a
//! Lagrangian point by a linear spring. Within one fluid step it goes through
//! an explicit phase cycle:
//!
//! ```text
//! Synchronized --predict_position(dt/2)--> PositionPredicted
//!   --predict_velocity(F, dt/2)--> VelocityPredicted
//!   --finalize(F, dt)--> Synchronized
//! ```
//!
//! `finalize` rolls the position back to the start of the step before
//! advancing it by the full `dt` with the half-step velocity, so the mass
//! points end the step synchronized with the fluid.

use crate::datatypes::{Gravity, Grid, Point};
use crate::error::{IbError, IbResult};
use crate::forces::{ElementKind, ForceElement};

#[derive(Debug, Clone, PartialEq)]
pub struct MassState {
    /// Tethered Lagrangian point
    pub index: usize,
    pub stiffness: f64,
    pub mass: f64,
    pub position: Point,
    pub velocity: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MassPhase {
    Synchronized,
    PositionPredicted {
        start: Vec<Point>,
    },
    VelocityPredicted {
        start: Vec<Point>,
        half_velocity: Vec<Point>,
    },
}

#[derive(Debug, Clone)]
pub struct MassPoints {
    points: Vec<MassState>,
    gravity: Option<Gravity>,
    phase: MassPhase,
}

impl MassPoints {
    /// Collects the mass point elements, starting each mass on its tethered point
    ///
    /// # Arguments
    /// * `elements` - All force elements of the structure
    /// * `positions` - Initial Lagrangian positions
    /// * `gravity` - Gravity acting on the masses, if enabled
    pub fn from_elements(
        elements: &[ForceElement],
        positions: &[Point],
        gravity: Option<Gravity>,
    ) -> MassPoints {
        let points = elements
            .iter()
            .filter_map(|e| match &e.kind {
                ElementKind::MassPoint(m) => Some(MassState {
                    index: m.index,
                    stiffness: m.stiffness,
                    mass: m.mass,
                    position: positions[m.index],
                    velocity: m.initial_velocity,
                }),
                _ => None,
            })
            .collect();

        MassPoints::new(points, gravity)
    }

    pub fn new(points: Vec<MassState>, gravity: Option<Gravity>) -> MassPoints {
        MassPoints {
            points,
            gravity,
            phase: MassPhase::Synchronized,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn states(&self) -> &[MassState] {
        &self.points
    }

    pub fn phase(&self) -> &MassPhase {
        &self.phase
    }

    /// Adds the spring reaction `k(X_m − X)` onto each tethered point
    pub fn accumulate_reaction(&self, grid: &Grid, positions: &[Point], forces: &mut [Point]) {
        for m in &self.points {
            forces[m.index] += grid.offset(&positions[m.index], &m.position) * m.stiffness;
        }
    }

    /// Force the boundary exerts on each mass, `k(X − X_m)`
    pub fn boundary_forces(&self, grid: &Grid, positions: &[Point]) -> Vec<Point> {
        self.points
            .iter()
            .map(|m| grid.offset(&m.position, &positions[m.index]) * m.stiffness)
            .collect()
    }

    fn acceleration(&self, m: &MassState, boundary: &Point) -> Point {
        let weight = self
            .gravity
            .map(|g| g.vector() * m.mass)
            .unwrap_or_else(Point::zeros);
        (boundary + weight) / m.mass
    }

    /// Moves the masses to the half step with their current velocity
    pub fn predict_position(&mut self, grid: &Grid, half_dt: f64) -> IbResult<()> {
        if self.phase != MassPhase::Synchronized {
            return Err(self.out_of_order("predict_position"));
        }

        let start: Vec<Point> = self.points.iter().map(|m| m.position).collect();
        for m in self.points.iter_mut() {
            m.position = grid.wrap(&(m.position + m.velocity * half_dt));
        }
        self.phase = MassPhase::PositionPredicted { start };
        Ok(())
    }

    /// Computes the half-step velocity from the half-step boundary force
    pub fn predict_velocity(&mut self, boundary: &[Point], half_dt: f64) -> IbResult<()> {
        let start = match std::mem::replace(&mut self.phase, MassPhase::Synchronized) {
            MassPhase::PositionPredicted { start } => start,
            other => {
                self.phase = other;
                return Err(self.out_of_order("predict_velocity"));
            }
        };

        let half_velocity = self
            .points
            .iter()
            .zip(boundary)
            .map(|(m, f)| m.velocity + self.acceleration(m, f) * half_dt)
            .collect();
        self.phase = MassPhase::VelocityPredicted {
            start,
            half_velocity,
        };
        Ok(())
    }

    /// Rolls positions back, advances them a full step with the half-step
    /// velocity, then advances the velocity a full step
    pub fn finalize(&mut self, grid: &Grid, boundary: &[Point], dt: f64) -> IbResult<()> {
        let (start, half_velocity) =
            match std::mem::replace(&mut self.phase, MassPhase::Synchronized) {
                MassPhase::VelocityPredicted {
                    start,
                    half_velocity,
                } => (start, half_velocity),
                other => {
                    self.phase = other;
                    return Err(self.out_of_order("finalize"));
                }
            };

        let velocities: Vec<Point> = self
            .points
            .iter()
            .zip(boundary)
            .map(|(m, f)| m.velocity + self.acceleration(m, f) * dt)
            .collect();

        for (k, m) in self.points.iter_mut().enumerate() {
            m.position = grid.wrap(&(start[k] + half_velocity[k] * dt));
            m.velocity = velocities[k];
        }
        Ok(())
    }

    fn out_of_order(&self, operation: &str) -> IbError {
        IbError::Config(format!(
            "Mass point update '{operation}' called in the {} phase",
            phase_name(&self.phase)
        ))
    }
}

fn phase_name(phase: &MassPhase) -> &'static str {
    match phase {
        MassPhase::Synchronized => "synchronized",
        MassPhase::PositionPredicted { .. } => "position predicted",
        MassPhase::VelocityPredicted { .. } => "velocity predicted",
    }
}
