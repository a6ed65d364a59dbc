//! Structural force elements.
//!
//! Every element adds its nodal contribution into one shared force buffer, so
//! the per-step assembly is a single uniform pass over an ordered element list.

use std::fmt::Debug;
use std::sync::Arc;

use rayon::prelude::*;

use crate::datatypes::{Grid, Point};
use crate::error::{IbError, IbResult};

pub mod beam;
pub mod body;
pub mod muscle;
pub mod spring;
pub mod target;

pub use beam::{Beam, NonInvariantBeam};
pub use body::BodyForce;
pub use muscle::{Muscle, Muscle3};
pub use spring::{DampedSpring, Spring};
pub use target::TargetPoint;

/// Read-only state a force element is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct ForceContext<'a> {
    pub grid: &'a Grid,
    /// Positions the force is evaluated at (the half-step positions)
    pub positions: &'a [Point],
    /// Positions the forces were evaluated at on the previous step, exactly
    /// `dt` before `positions`
    pub previous: &'a [Point],
    /// Most recent interpolated point velocities
    pub velocities: &'a [Point],
    pub dt: f64,
    pub time: f64,
}

impl<'a> ForceContext<'a> {
    pub fn new(
        grid: &'a Grid,
        positions: &'a [Point],
        previous: &'a [Point],
        velocities: &'a [Point],
        dt: f64,
        time: f64,
    ) -> ForceContext<'a> {
        ForceContext {
            grid,
            positions,
            previous,
            velocities,
            dt,
            time,
        }
    }

    /// Minimum-image vector from point `a` to point `b`
    #[inline]
    pub fn separation(&self, a: usize, b: usize) -> Point {
        self.grid.offset(&self.positions[a], &self.positions[b])
    }

    #[inline]
    pub fn previous_separation(&self, a: usize, b: usize) -> Point {
        self.grid.offset(&self.previous[a], &self.previous[b])
    }
}

/// A user-supplied force contribution
pub trait CustomForce: Send + Sync + Debug {
    fn name(&self) -> &str {
        "general force"
    }

    /// Point indices the force touches, checked at setup
    fn indices(&self) -> Vec<usize>;

    fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]);
}

/// A point tethered by a linear spring to its own massive copy
#[derive(Debug, Clone, PartialEq)]
pub struct MassPoint {
    pub index: usize,
    pub stiffness: f64,
    pub mass: f64,
    pub initial_velocity: Point,
}

/// A point that slips normal to the structure in proportion to its load
#[derive(Debug, Clone, PartialEq)]
pub struct PorousPoint {
    pub index: usize,
    pub porosity: f64,
    /// Position within its chain: 0 interior, -2/-1 at the start, 1/2 at the end
    pub stencil_flag: i32,
}

/// A point that drifts through the fluid with a Darcy slip `F / α`
#[derive(Debug, Clone, PartialEq)]
pub struct PoroelasticPoint {
    pub index: usize,
    pub coefficient: f64,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Spring(Spring),
    DampedSpring(DampedSpring),
    Beam(Beam),
    NonInvariantBeam(NonInvariantBeam),
    TargetPoint(TargetPoint),
    Muscle(Muscle),
    Muscle3(Muscle3),
    MassPoint(MassPoint),
    PorousPoint(PorousPoint),
    PoroelasticPoint(PoroelasticPoint),
    General(Arc<dyn CustomForce>),
}

impl ElementKind {
    pub fn name(&self) -> &str {
        match self {
            ElementKind::Spring(_) => "spring",
            ElementKind::DampedSpring(_) => "damped spring",
            ElementKind::Beam(_) => "beam",
            ElementKind::NonInvariantBeam(_) => "non-invariant beam",
            ElementKind::TargetPoint(_) => "target point",
            ElementKind::Muscle(_) => "muscle",
            ElementKind::Muscle3(_) => "3-element muscle",
            ElementKind::MassPoint(_) => "mass point",
            ElementKind::PorousPoint(_) => "porous point",
            ElementKind::PoroelasticPoint(_) => "poroelastic point",
            ElementKind::General(force) => force.name(),
        }
    }

    /// Lagrangian point indices referenced by the element
    pub fn indices(&self) -> Vec<usize> {
        match self {
            ElementKind::Spring(s) => vec![s.master, s.slave],
            ElementKind::DampedSpring(d) => vec![d.spring.master, d.spring.slave],
            ElementKind::Beam(b) => vec![b.prev, b.mid, b.next],
            ElementKind::NonInvariantBeam(b) => vec![b.prev, b.mid, b.next],
            ElementKind::TargetPoint(t) => vec![t.index],
            ElementKind::Muscle(m) => vec![m.master, m.slave],
            ElementKind::Muscle3(m) => vec![m.muscle.master, m.muscle.slave],
            ElementKind::MassPoint(m) => vec![m.index],
            ElementKind::PorousPoint(p) => vec![p.index],
            ElementKind::PoroelasticPoint(p) => vec![p.index],
            ElementKind::General(force) => force.indices(),
        }
    }

    /// Checks point indices and parameters that would make the force undefined
    pub fn validate(&self, point_count: usize) -> IbResult<()> {
        for index in self.indices() {
            if index >= point_count {
                return Err(IbError::Index {
                    element: self.name().to_owned(),
                    index: index + 1,
                    count: point_count,
                });
            }
        }

        match self {
            ElementKind::Muscle(m) | ElementKind::Muscle3(Muscle3 { muscle: m, .. }) => {
                if m.hill_b <= 0.0 || m.max_length <= 0.0 || m.muscle_const == 0.0 {
                    return Err(IbError::Config(format!(
                        "Muscle between points {} and {} needs positive hill_b and max_length \
                         and a non-zero muscle constant",
                        m.master + 1,
                        m.slave + 1
                    )));
                }
            }
            ElementKind::MassPoint(m) if m.mass <= 0.0 => {
                return Err(IbError::Config(format!(
                    "Mass point at point {} has non-positive mass {}",
                    m.index + 1,
                    m.mass
                )));
            }
            ElementKind::PoroelasticPoint(p) if p.coefficient <= 0.0 => {
                return Err(IbError::Config(format!(
                    "Poroelastic point {} needs a positive coefficient",
                    p.index + 1
                )));
            }
            ElementKind::PorousPoint(p) if !(-2..=2).contains(&p.stencil_flag) => {
                return Err(IbError::Config(format!(
                    "Porous point {} has stencil flag {} outside -2..=2",
                    p.index + 1,
                    p.stencil_flag
                )));
            }
            _ => {}
        }

        Ok(())
    }

    /// Adds this element's nodal forces into `forces`.
    ///
    /// Mass, porous and poroelastic points contribute nothing here; their
    /// effect enters through the mass subsystem and the slip corrections.
    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        match self {
            ElementKind::Spring(s) => s.accumulate(ctx, forces),
            ElementKind::DampedSpring(d) => d.accumulate(ctx, forces),
            ElementKind::Beam(b) => b.accumulate(ctx, forces),
            ElementKind::NonInvariantBeam(b) => b.accumulate(ctx, forces),
            ElementKind::TargetPoint(t) => t.accumulate(ctx, forces),
            ElementKind::Muscle(m) => m.accumulate(ctx, forces),
            ElementKind::Muscle3(m) => m.accumulate(ctx, forces),
            ElementKind::General(force) => force.accumulate(ctx, forces),
            ElementKind::MassPoint(_)
            | ElementKind::PorousPoint(_)
            | ElementKind::PoroelasticPoint(_) => {}
        }
    }
}

/// Per-step parameter update, called with `(element, time, positions)`
pub type Schedule = Arc<dyn Fn(&mut ElementKind, f64, &[Point]) + Send + Sync>;

#[derive(Clone)]
pub struct ForceElement {
    pub kind: ElementKind,
    schedule: Option<Schedule>,
}

impl Debug for ForceElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceElement")
            .field("kind", &self.kind)
            .field("scheduled", &self.schedule.is_some())
            .finish()
    }
}

impl From<ElementKind> for ForceElement {
    fn from(kind: ElementKind) -> Self {
        ForceElement {
            kind,
            schedule: None,
        }
    }
}

impl ForceElement {
    pub fn with_schedule(kind: ElementKind, schedule: Schedule) -> ForceElement {
        ForceElement {
            kind,
            schedule: Some(schedule),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Runs the attached schedule, if any
    pub fn update(&mut self, time: f64, positions: &[Point]) {
        if let Some(schedule) = &self.schedule {
            schedule(&mut self.kind, time, positions);
        }
    }
}

/// Sums every element's contribution into one nodal force buffer
///
/// # Arguments
/// * `elements` - The ordered element collection
/// * `ctx` - Positions and state to evaluate against
///
/// # Returns
/// One force per Lagrangian point
pub fn assemble_forces(elements: &[ForceElement], ctx: &ForceContext) -> Vec<Point> {
    let n = ctx.positions.len();
    elements
        .par_iter()
        .fold(
            || vec![Point::zeros(); n],
            |mut forces, element| {
                element.kind.accumulate(ctx, &mut forces);
                forces
            },
        )
        .reduce(
            || vec![Point::zeros(); n],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Fails on the first element with an out-of-range index or bad parameters
pub fn validate_elements(elements: &[ForceElement], point_count: usize) -> IbResult<()> {
    for element in elements {
        element.kind.validate(point_count)?;
    }
    Ok(())
}
