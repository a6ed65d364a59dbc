//! Force elements driven through full coupled steps.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;

use ib2d::config::SimulationConfig;
use ib2d::datatypes::{FluidParameters, Grid, Point, TimeParameters};
use ib2d::fluid::FluidState;
use ib2d::forces::{
    CustomForce, DampedSpring, ElementKind, ForceContext, Muscle, PoroelasticPoint, PorousPoint,
    Schedule, Spring, TargetPoint,
};
use ib2d::porous::porous_slip;
use ib2d::transfer::interpolate_vector;
use ib2d::{Simulation, Structure};

fn unit_config(n: usize, mu: f64, dt: f64) -> SimulationConfig {
    SimulationConfig::new(
        Grid::new(n, n, 1.0, 1.0).unwrap(),
        FluidParameters { mu, rho: 1.0 },
        TimeParameters { dt, t_final: 1.0 },
    )
}

/// Records the rate a force element sees for point 0
#[derive(Debug, Default)]
struct SpeedLog {
    speeds: Mutex<Vec<f64>>,
}

impl CustomForce for SpeedLog {
    fn indices(&self) -> Vec<usize> {
        vec![0]
    }

    fn accumulate(&self, ctx: &ForceContext, _forces: &mut [Point]) {
        let d = ctx.grid.offset(&ctx.previous[0], &ctx.positions[0]);
        self.speeds.lock().unwrap().push(d.x / ctx.dt);
    }
}

#[test]
fn test_rate_history_spans_exactly_one_step() {
    let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
    let log = Arc::new(SpeedLog::default());
    let mut structure = Structure::new(vec![Point::new(0.9, 0.3)]);
    structure.push(ElementKind::General(log.clone()));

    let mut sim = Simulation::new(unit_config(16, 0.05, 0.01), structure)
        .unwrap()
        .with_fluid(FluidState::from_fn(&grid, |_, _| 0.5, |_, _| 0.0))
        .unwrap();
    for _ in 0..5 {
        sim.step().unwrap();
    }

    let speeds = log.speeds.lock().unwrap();
    assert_eq!(speeds.len(), 5);
    // No history on the first step
    assert_abs_diff_eq!(speeds[0], 0.0, epsilon = 1e-12);
    for speed in &speeds[1..] {
        assert_abs_diff_eq!(*speed, 0.5, epsilon = 1e-9);
    }
}

#[test]
fn test_muscle_force_uses_shortening_speed() {
    let muscle = Muscle {
        master: 0,
        slave: 1,
        max_length: 0.2,
        muscle_const: 0.3,
        hill_a: 0.25,
        hill_b: 0.5,
        max_force: 5.0,
        activation: 1.0,
    };
    let mut structure = Structure::new(vec![Point::new(0.4, 0.5), Point::new(0.6, 0.5)]);
    structure.push(ElementKind::Muscle(muscle.clone()));
    let dt = 1e-3;
    let mut sim = Simulation::new(unit_config(32, 0.05, dt), structure).unwrap();

    for _ in 0..2 {
        sim.step().unwrap();
    }
    let grid = sim.config().grid;
    let before = sim.previous().to_vec();
    sim.step().unwrap();
    let after = sim.previous();

    let previous_length = grid.offset(&before[0], &before[1]).norm();
    let length = grid.offset(&after[0], &after[1]).norm();
    assert!(length < previous_length, "fiber did not shorten");

    let expected = muscle.contractile_force(length, previous_length, dt);
    assert_abs_diff_eq!(sim.forces()[0].norm(), expected, epsilon = 1e-10);
    assert_abs_diff_eq!(sim.forces()[1].norm(), expected, epsilon = 1e-10);

    let isometric = muscle.activation * muscle.force_length(length) * muscle.max_force;
    assert!(expected < isometric, "{expected} vs isometric {isometric}");
}

#[test]
fn test_damped_spring_reads_interpolated_velocities() {
    let grid = Grid::new(32, 32, 1.0, 1.0).unwrap();
    let positions = vec![Point::new(0.3, 0.25), Point::new(0.55, 0.5)];
    let chord = (positions[1] - positions[0]).norm();
    let mut structure = Structure::new(positions);
    structure.push(ElementKind::DampedSpring(DampedSpring {
        spring: Spring::linear(0, 1, 0.0, chord),
        damping: 2.0,
    }));

    let shear = FluidState::from_fn(&grid, |_, y| (2.0 * PI * y).sin(), |_, _| 0.0);
    let mut sim = Simulation::new(unit_config(32, 0.01, 1e-3), structure)
        .unwrap()
        .with_fluid(shear)
        .unwrap();

    sim.step().unwrap();
    let velocities = sim.velocities().to_vec();
    assert!(velocities[0].x > 0.5);
    assert!(velocities[1].x.abs() < 0.1);

    sim.step().unwrap();
    let half = sim.previous();
    let d = grid.offset(&half[0], &half[1]);
    let e = d / d.norm();
    let expected = e * (2.0 * (velocities[1] - velocities[0]).dot(&e));

    assert!(expected.norm() > 0.1);
    assert_abs_diff_eq!(sim.forces()[0].x, expected.x, epsilon = 1e-12);
    assert_abs_diff_eq!(sim.forces()[0].y, expected.y, epsilon = 1e-12);
    assert_abs_diff_eq!(sim.forces()[1].x, -expected.x, epsilon = 1e-12);
    assert_abs_diff_eq!(sim.forces()[1].y, -expected.y, epsilon = 1e-12);
}

#[test]
fn test_porous_chain_slips_normal_to_itself() {
    let config = unit_config(32, 0.05, 1e-3);
    let ds = config.lagrangian_spacing;
    let n = 7;
    let positions: Vec<Point> = (0..n)
        .map(|k| Point::new(0.3 + k as f64 * ds, 0.5))
        .collect();

    let mut solid = Structure::new(positions.clone());
    for (k, x) in positions.iter().enumerate() {
        solid.push(ElementKind::TargetPoint(TargetPoint {
            index: k,
            stiffness: 100.0,
            anchor: Point::new(x.x, 0.51),
        }));
    }
    let mut porous = solid.clone();
    let flags = [-2, -1, 0, 0, 0, 1, 2];
    let porous_points: Vec<PorousPoint> = (0..n)
        .map(|k| PorousPoint {
            index: k,
            porosity: 0.5,
            stencil_flag: flags[k],
        })
        .collect();
    for p in &porous_points {
        porous.push(ElementKind::PorousPoint(p.clone()));
    }

    let mut plain_sim = Simulation::new(config.clone(), solid).unwrap();
    let mut porous_sim = Simulation::new(config.clone(), porous).unwrap();
    plain_sim.step().unwrap();
    porous_sim.step().unwrap();

    let grid = config.grid;
    let dt = config.time.dt;
    let slip = porous_slip(
        &grid,
        &porous_points,
        porous_sim.previous(),
        porous_sim.forces(),
        ds,
    );
    for k in 0..n {
        let moved = grid.offset(&plain_sim.positions()[k], &porous_sim.positions()[k]);
        assert_abs_diff_eq!(moved.x, slip[k].x * dt, epsilon = 1e-12);
        assert_abs_diff_eq!(moved.y, slip[k].y * dt, epsilon = 1e-12);
        // Load of 1 along +y on a unit tangent, porosity 0.5
        assert_abs_diff_eq!(moved.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(moved.y, -0.5 * dt, epsilon = 1e-9);
    }
}

#[test]
fn test_scheduled_rest_length_changes_forces() {
    let schedule: Schedule = Arc::new(|kind, time, _positions| {
        if let ElementKind::Spring(s) = kind {
            s.rest_length = 0.1 - time;
        }
    });
    let mut structure = Structure::new(vec![Point::new(0.45, 0.5), Point::new(0.55, 0.5)]);
    structure.push_scheduled(ElementKind::Spring(Spring::linear(0, 1, 20.0, 0.1)), schedule);
    let dt = 1e-3;
    let mut sim = Simulation::new(unit_config(32, 0.05, dt), structure).unwrap();

    sim.step().unwrap();
    assert_abs_diff_eq!(sim.forces()[0].norm(), 0.0, epsilon = 1e-12);

    sim.step().unwrap();
    let grid = sim.config().grid;
    let half = sim.previous();
    let length = grid.offset(&half[0], &half[1]).norm();
    let expected = 20.0 * (length - (0.1 - dt));
    assert_abs_diff_eq!(sim.forces()[0].x, expected, epsilon = 1e-12);
    assert_abs_diff_eq!(expected, 20.0 * dt, epsilon = 1e-6);
}

#[test]
fn test_poroelastic_drag_follows_realized_slip() {
    let mut structure = Structure::new(vec![Point::new(0.5, 0.5)]);
    structure
        .push(ElementKind::TargetPoint(TargetPoint {
            index: 0,
            stiffness: 10.0,
            anchor: Point::new(0.52, 0.5),
        }))
        .push(ElementKind::PoroelasticPoint(PoroelasticPoint {
            index: 0,
            coefficient: 4.0,
        }));
    let dt = 1e-3;
    let mut sim = Simulation::new(unit_config(16, 0.05, dt), structure).unwrap();
    let x0 = sim.positions()[0];

    sim.step().unwrap();
    assert_eq!(sim.drag()[0], Point::zeros());
    let x1 = sim.positions()[0];
    let fluid = sim.fluid().clone();

    sim.step().unwrap();
    let grid = sim.config().grid;
    let sampled = interpolate_vector(sim.config().kernel, &grid, &fluid.u, &fluid.v, &[x1]);
    let expected = (grid.offset(&x0, &x1) / dt - sampled[0]) * 4.0;

    // Darcy slip of the first step dominates
    assert!(expected.x > 0.1, "{expected:?}");
    assert_abs_diff_eq!(sim.drag()[0].x, expected.x, epsilon = 1e-10);
    assert_abs_diff_eq!(sim.drag()[0].y, expected.y, epsilon = 1e-10);
}
