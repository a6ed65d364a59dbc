use crate::datatypes::Point;

use super::ForceContext;

/// Torsional beam over three consecutive points.
///
/// Penalizes the discrete curvature `κ = (X_r − X_q) × (X_q − X_p)` against a
/// preferred value with energy `k/2 (κ − C)²`. Invariant under rigid rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub prev: usize,
    pub mid: usize,
    pub next: usize,
    pub stiffness: f64,
    pub curvature: f64,
}

impl Beam {
    pub fn current_curvature(&self, ctx: &ForceContext) -> f64 {
        let a = ctx.separation(self.prev, self.mid);
        let b = ctx.separation(self.mid, self.next);
        b.x * a.y - b.y * a.x
    }

    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let a = ctx.separation(self.prev, self.mid);
        let b = ctx.separation(self.mid, self.next);
        let kappa = b.x * a.y - b.y * a.x;
        let scale = -self.stiffness * (kappa - self.curvature);

        // Gradients of κ with respect to each of the three points
        let d_prev = Point::new(b.y, -b.x);
        let d_mid = Point::new(-(a.y + b.y), a.x + b.x);
        let d_next = Point::new(a.y, -a.x);

        forces[self.prev] += d_prev * scale;
        forces[self.mid] += d_mid * scale;
        forces[self.next] += d_next * scale;
    }
}

/// Beam penalizing the second difference `X_r − 2X_q + X_p` against a fixed
/// vector, so it resists rotation as well as bending
#[derive(Debug, Clone, PartialEq)]
pub struct NonInvariantBeam {
    pub prev: usize,
    pub mid: usize,
    pub next: usize,
    pub stiffness: f64,
    pub curvature_x: f64,
    pub curvature_y: f64,
}

impl NonInvariantBeam {
    pub fn second_difference(&self, ctx: &ForceContext) -> Point {
        ctx.separation(self.mid, self.next) - ctx.separation(self.prev, self.mid)
    }

    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let deviation = self.second_difference(ctx)
            - Point::new(self.curvature_x, self.curvature_y);
        let f = deviation * self.stiffness;

        forces[self.prev] -= f;
        forces[self.mid] += f * 2.0;
        forces[self.next] -= f;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::Grid;
    use approx::assert_abs_diff_eq;

    fn bent_triple() -> Vec<Point> {
        vec![
            Point::new(0.40, 0.50),
            Point::new(0.50, 0.53),
            Point::new(0.60, 0.50),
        ]
    }

    #[test]
    fn straight_beam_with_zero_curvature_is_force_free() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = vec![
            Point::new(0.4, 0.5),
            Point::new(0.5, 0.5),
            Point::new(0.6, 0.5),
        ];
        let velocities = vec![Point::zeros(); 3];
        let ctx = ForceContext::new(&grid, &positions, &positions, &velocities, 1e-3, 0.0);

        let mut forces = vec![Point::zeros(); 3];
        Beam {
            prev: 0,
            mid: 1,
            next: 2,
            stiffness: 1e3,
            curvature: 0.0,
        }
        .accumulate(&ctx, &mut forces);
        for f in forces {
            assert_abs_diff_eq!(f.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn beam_force_is_momentum_free_and_restoring() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = bent_triple();
        let velocities = vec![Point::zeros(); 3];
        let ctx = ForceContext::new(&grid, &positions, &positions, &velocities, 1e-3, 0.0);

        let beam = Beam {
            prev: 0,
            mid: 1,
            next: 2,
            stiffness: 1e3,
            curvature: 0.0,
        };
        let mut forces = vec![Point::zeros(); 3];
        beam.accumulate(&ctx, &mut forces);

        let total: Point = forces.iter().sum();
        assert_abs_diff_eq!(total.norm(), 0.0, epsilon = 1e-12);
        // The raised middle point is pushed back down
        assert!(forces[1].y < 0.0);

        // Stepping along the force lowers |κ - C|
        let relaxed: Vec<Point> = positions
            .iter()
            .zip(&forces)
            .map(|(p, f)| p + f * 1e-3)
            .collect();
        let relaxed_ctx = ForceContext::new(&grid, &relaxed, &relaxed, &velocities, 1e-3, 0.0);
        assert!(beam.current_curvature(&relaxed_ctx).abs() < beam.current_curvature(&ctx).abs());
    }

    #[test]
    fn beam_at_preferred_curvature_is_force_free() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = bent_triple();
        let velocities = vec![Point::zeros(); 3];
        let ctx = ForceContext::new(&grid, &positions, &positions, &velocities, 1e-3, 0.0);

        let mut beam = Beam {
            prev: 0,
            mid: 1,
            next: 2,
            stiffness: 1e3,
            curvature: 0.0,
        };
        beam.curvature = beam.current_curvature(&ctx);

        let mut forces = vec![Point::zeros(); 3];
        beam.accumulate(&ctx, &mut forces);
        for f in forces {
            assert_abs_diff_eq!(f.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn non_invariant_beam_resists_rotation() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = bent_triple();
        let velocities = vec![Point::zeros(); 3];
        let ctx = ForceContext::new(&grid, &positions, &positions, &velocities, 1e-3, 0.0);

        let reference = NonInvariantBeam {
            prev: 0,
            mid: 1,
            next: 2,
            stiffness: 10.0,
            curvature_x: 0.0,
            curvature_y: 0.0,
        };
        let d = reference.second_difference(&ctx);
        let beam = NonInvariantBeam {
            curvature_x: d.x,
            curvature_y: d.y,
            ..reference
        };

        // Rotate the triple by 90 degrees about the middle point
        let c = positions[1];
        let rotated: Vec<Point> = positions
            .iter()
            .map(|p| {
                let r = p - c;
                c + Point::new(-r.y, r.x)
            })
            .collect();
        let rotated_ctx = ForceContext::new(&grid, &rotated, &rotated, &velocities, 1e-3, 0.0);

        let mut at_rest = vec![Point::zeros(); 3];
        beam.accumulate(&ctx, &mut at_rest);
        let mut after_rotation = vec![Point::zeros(); 3];
        beam.accumulate(&rotated_ctx, &mut after_rotation);

        assert_abs_diff_eq!(at_rest[1].norm(), 0.0, epsilon = 1e-12);
        assert!(after_rotation[1].norm() > 1e-3);
        let total: Point = after_rotation.iter().sum();
        assert_abs_diff_eq!(total.norm(), 0.0, epsilon = 1e-12);
    }
}
