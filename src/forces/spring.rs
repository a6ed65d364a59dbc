use crate::datatypes::Point;

use super::ForceContext;

/// Spring between two Lagrangian points. `exponent = 1` is Hooke's law.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    pub master: usize,
    pub slave: usize,
    pub stiffness: f64,
    pub rest_length: f64,
    pub exponent: f64,
}

impl Spring {
    pub fn linear(master: usize, slave: usize, stiffness: f64, rest_length: f64) -> Spring {
        Spring {
            master,
            slave,
            stiffness,
            rest_length,
            exponent: 1.0,
        }
    }

    /// Force exerted on the master point; the slave receives the negation
    pub fn master_force(&self, ctx: &ForceContext) -> Point {
        let d = ctx.separation(self.master, self.slave);
        let length = d.norm();
        if length == 0.0 {
            return Point::zeros();
        }

        let stretch = length - self.rest_length;
        let magnitude = if self.exponent == 1.0 {
            self.stiffness * stretch
        } else {
            self.stiffness * stretch.signum() * stretch.abs().powf(self.exponent)
        };

        d * (magnitude / length)
    }

    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let f = self.master_force(ctx);
        forces[self.master] += f;
        forces[self.slave] -= f;
    }
}

/// Spring plus a dashpot acting along the connecting line
#[derive(Debug, Clone, PartialEq)]
pub struct DampedSpring {
    pub spring: Spring,
    pub damping: f64,
}

impl DampedSpring {
    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let spring = &self.spring;
        let mut f = spring.master_force(ctx);

        let d = ctx.separation(spring.master, spring.slave);
        let length = d.norm();
        if length > 0.0 {
            let e = d / length;
            let relative = ctx.velocities[spring.slave] - ctx.velocities[spring.master];
            f += e * (self.damping * relative.dot(&e));
        }

        forces[spring.master] += f;
        forces[spring.slave] -= f;
    }
}
