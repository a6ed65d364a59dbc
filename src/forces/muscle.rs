//! Hill-type muscle fibers between a master and a slave point.
//!
//! The contractile force is the product of a Gaussian force–length curve and
//! the Hill force–velocity relation `(v + a)(F + b) = (F_max + a)·b`, solved
//! for `F = (b·F_max − a·v) / (v + b)`. Shortening speed is estimated from the
//! fiber length now and at the previous step.

use crate::datatypes::Point;

use super::ForceContext;

#[derive(Debug, Clone, PartialEq)]
pub struct Muscle {
    pub master: usize,
    pub slave: usize,
    /// Length of peak isometric force
    pub max_length: f64,
    /// Width of the force–length curve
    pub muscle_const: f64,
    pub hill_a: f64,
    pub hill_b: f64,
    pub max_force: f64,
    /// Activation in `[0, 1]`, driven by a schedule
    pub activation: f64,
}

impl Muscle {
    pub fn force_length(&self, length: f64) -> f64 {
        let q = (length / self.max_length - 1.0) / self.muscle_const;
        (-q * q).exp()
    }

    pub fn force_velocity(&self, speed: f64) -> f64 {
        (self.hill_b * self.max_force - self.hill_a * speed) / (speed + self.hill_b)
    }

    /// Scalar contractile force for the current and previous fiber lengths
    pub fn contractile_force(&self, length: f64, previous_length: f64, dt: f64) -> f64 {
        let speed = (length - previous_length).abs() / dt;
        self.activation * self.force_length(length) * self.force_velocity(speed)
    }

    fn lengths(&self, ctx: &ForceContext) -> (Point, f64, f64) {
        let d = ctx.separation(self.master, self.slave);
        let previous = ctx.previous_separation(self.master, self.slave);
        (d, d.norm(), previous.norm())
    }

    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let (d, length, previous_length) = self.lengths(ctx);
        if length == 0.0 {
            return;
        }
        let magnitude = self.contractile_force(length, previous_length, ctx.dt);
        apply_fiber_force(self.master, self.slave, d, length, magnitude, forces);
    }
}

/// Hill muscle with an additional nonlinear elastic element that only
/// resists stretch beyond the optimal length
#[derive(Debug, Clone, PartialEq)]
pub struct Muscle3 {
    pub muscle: Muscle,
    pub spring_stiffness: f64,
    pub spring_exponent: f64,
}

impl Muscle3 {
    pub fn elastic_force(&self, length: f64) -> f64 {
        let strain = (length / self.muscle.max_length - 1.0).max(0.0);
        self.spring_stiffness * strain.powf(self.spring_exponent)
    }

    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let (d, length, previous_length) = self.muscle.lengths(ctx);
        if length == 0.0 {
            return;
        }
        let magnitude = self
            .muscle
            .contractile_force(length, previous_length, ctx.dt)
            + self.elastic_force(length);
        apply_fiber_force(
            self.muscle.master,
            self.muscle.slave,
            d,
            length,
            magnitude,
            forces,
        );
    }
}

/// Positive magnitude pulls the two ends together
fn apply_fiber_force(
    master: usize,
    slave: usize,
    d: Point,
    length: f64,
    magnitude: f64,
    forces: &mut [Point],
) {
    let f = d * (magnitude / length);
    forces[master] += f;
    forces[slave] -= f;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::Grid;
    use approx::assert_abs_diff_eq;

    fn muscle() -> Muscle {
        Muscle {
            master: 0,
            slave: 1,
            max_length: 0.2,
            muscle_const: 0.3,
            hill_a: 0.25,
            hill_b: 4.0,
            max_force: 2.0,
            activation: 1.0,
        }
    }

    #[test]
    fn isometric_at_optimal_length_gives_max_force() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = vec![Point::new(0.3, 0.5), Point::new(0.5, 0.5)];
        let velocities = vec![Point::zeros(); 2];
        let ctx = ForceContext::new(&grid, &positions, &positions, &velocities, 1e-3, 0.0);

        let mut forces = vec![Point::zeros(); 2];
        muscle().accumulate(&ctx, &mut forces);
        assert_abs_diff_eq!(forces[0].x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(forces[1].x, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn shortening_reduces_force() {
        let m = muscle();
        let isometric = m.contractile_force(0.2, 0.2, 1e-3);
        let shortening = m.contractile_force(0.2, 0.2001, 1e-3);
        assert!(shortening < isometric);
        assert_abs_diff_eq!(
            shortening,
            (4.0 * 2.0 - 0.25 * 0.1) / (0.1 + 4.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn force_length_curve_peaks_at_optimum() {
        let m = muscle();
        assert_abs_diff_eq!(m.force_length(0.2), 1.0, epsilon = 1e-15);
        assert!(m.force_length(0.26) < 1.0);
        assert_abs_diff_eq!(m.force_length(0.26), m.force_length(0.14), epsilon = 1e-12);
    }

    #[test]
    fn inactive_muscle_is_force_free() {
        let m = Muscle {
            activation: 0.0,
            ..muscle()
        };
        assert_eq!(m.contractile_force(0.25, 0.2, 1e-3), 0.0);
    }

    #[test]
    fn elastic_element_only_resists_stretch() {
        let m3 = Muscle3 {
            muscle: muscle(),
            spring_stiffness: 5.0,
            spring_exponent: 2.0,
        };
        assert_eq!(m3.elastic_force(0.15), 0.0);
        assert_abs_diff_eq!(m3.elastic_force(0.3), 5.0 * 0.25, epsilon = 1e-12);
    }
}
