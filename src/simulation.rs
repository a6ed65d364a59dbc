//! The time-stepping controller.
//!
//! Each step is a half-step predictor followed by a midpoint corrector:
//!
//! 1. move the structure to `X^{n+½}` with `u^n`
//! 2. run element schedules and the activation series
//! 3. evaluate forces at `X^{n+½}` (mass points predicted to the half step)
//! 4. spread them, subtract the spread poroelastic drag, add body forces and
//!    the background flow, solve for `u^{n+1}`
//! 5. move the structure from `X^n` to `X^{n+1}` with `½(u^n + u^{n+1})`
//!    sampled at `X^{n+½}`, plus porous and poroelastic slip
//! 6. finish the mass points, tracers and concentration
//!
//! Rate-dependent forces compare the half-step positions of consecutive
//! steps, which lie exactly `dt` apart.

use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::config::{ConcentrationConfig, SimulationConfig};
use crate::coupling::{ActivationSeries, BackgroundFlow};
use crate::datatypes::{EulerianField, Grid, Point, TimeParameters};
use crate::diagnostics::cfl_number;
use crate::error::{IbError, IbResult};
use crate::fluid::{FluidSolver, FluidState};
use crate::forces::{assemble_forces, BodyForce, ForceContext, ForceElement};
use crate::forces::{PoroelasticPoint, PorousPoint};
use crate::mass::MassPoints;
use crate::motion::move_lagrangian_points;
use crate::porous::{
    poroelastic_drag, poroelastic_points, poroelastic_slip, porous_points, porous_slip,
    validate_porous_stencils,
};
use crate::scalar::{advect_diffuse, Tracers};
use crate::structure::Structure;
use crate::transfer::{build_stencils, spread_vector_with, Stencil};

/// Borrowed view of the state handed to an output sink
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub step: usize,
    pub time: f64,
    pub dt: f64,
    pub rho: f64,
    pub grid: &'a Grid,
    pub fluid: &'a FluidState,
    pub positions: &'a [Point],
    /// Forces from the most recent step, zero before the first
    pub forces: &'a [Point],
    pub tracers: &'a [Point],
    pub concentration: Option<&'a EulerianField>,
}

/// Receives snapshots at the output cadence
pub trait OutputSink {
    fn write(&mut self, snapshot: &Snapshot) -> IbResult<()>;
}

/// Summary of one completed step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    pub cfl: f64,
    pub max_force: f64,
}

pub struct Simulation {
    config: SimulationConfig,
    solver: FluidSolver,
    fluid: FluidState,
    positions: Vec<Point>,
    /// Half-step positions of the last step
    previous: Vec<Point>,
    velocities: Vec<Point>,
    /// Realized point velocities over the last step
    point_velocities: Vec<Point>,
    forces: Vec<Point>,
    drag: Vec<Point>,
    elements: Vec<ForceElement>,
    masses: MassPoints,
    porous: Vec<PorousPoint>,
    poroelastic: Vec<PoroelasticPoint>,
    body_forces: Vec<BodyForce>,
    tracers: Tracers,
    concentration: Option<EulerianField>,
    background: Option<Box<dyn BackgroundFlow>>,
    activation: Option<ActivationSeries>,
    time: f64,
    step: usize,
}

impl Simulation {
    /// Validates the configuration and structure and sets the fluid at rest
    ///
    /// # Arguments
    /// * `config` - The run configuration
    /// * `structure` - Initial Lagrangian points and their force elements
    ///
    /// # Returns
    /// A simulation at `t = 0`, or the first configuration problem found
    pub fn new(config: SimulationConfig, structure: Structure) -> IbResult<Simulation> {
        config.validate()?;
        structure.validate()?;

        let grid = config.grid;
        let Structure { positions, elements } = structure;

        if let Some(k) = positions
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(IbError::Input(format!(
                "Lagrangian point {} has a non-finite position",
                k + 1
            )));
        }
        let positions: Vec<Point> = positions.iter().map(|p| grid.wrap(p)).collect();

        let porous = porous_points(&elements);
        validate_porous_stencils(&porous)?;
        let poroelastic = poroelastic_points(&elements);

        let gravity = config.gravity.map(|g| g.gravity);
        let masses = MassPoints::from_elements(&elements, &positions, gravity);

        let mut body_forces = Vec::new();
        if let Some(g) = config.gravity.filter(|g| g.apply_to_fluid) {
            body_forces.push(BodyForce::Gravity {
                rho: config.fluid.rho,
                gravity: g.gravity,
            });
        }
        if let (Some(b), Some(g), Some(c)) =
            (config.boussinesq, config.gravity, &config.concentration)
        {
            body_forces.push(BodyForce::Boussinesq {
                rho: config.fluid.rho,
                expansion: b.expansion,
                gravity: g.gravity,
                background: c.background,
            });
        }

        let concentration = config
            .concentration
            .as_ref()
            .map(|c| initial_concentration(&grid, c));

        info!(
            "{}x{} grid, {} Lagrangian points, {} force elements ({} mass, {} porous, {} poroelastic)",
            grid.nx,
            grid.ny,
            positions.len(),
            elements.len(),
            masses.len(),
            porous.len(),
            poroelastic.len()
        );

        let n = positions.len();
        Ok(Simulation {
            solver: FluidSolver::new(&grid),
            fluid: FluidState::at_rest(&grid),
            previous: positions.clone(),
            velocities: vec![Point::zeros(); n],
            point_velocities: vec![Point::zeros(); n],
            forces: vec![Point::zeros(); n],
            drag: vec![Point::zeros(); n],
            positions,
            elements,
            masses,
            porous,
            poroelastic,
            body_forces,
            tracers: Tracers::default(),
            concentration,
            background: None,
            activation: None,
            time: 0.0,
            step: 0,
            config,
        })
    }

    pub fn with_tracers(mut self, positions: Vec<Point>) -> Simulation {
        let grid = self.config.grid;
        self.tracers = Tracers::new(positions.iter().map(|p| grid.wrap(p)).collect());
        self
    }

    pub fn with_background_flow(mut self, flow: Box<dyn BackgroundFlow>) -> Simulation {
        self.background = Some(flow);
        self
    }

    pub fn with_activation(mut self, series: ActivationSeries) -> IbResult<Simulation> {
        if series.end() >= self.positions.len() {
            return Err(IbError::Index {
                element: "activation series".to_owned(),
                index: series.end() + 1,
                count: self.positions.len(),
            });
        }
        self.activation = Some(series);
        Ok(self)
    }

    /// Replaces the initial fluid state
    pub fn with_fluid(mut self, fluid: FluidState) -> IbResult<Simulation> {
        let grid = self.config.grid;
        let shape = (grid.nx, grid.ny);
        if fluid.u.shape() != shape || fluid.v.shape() != shape || fluid.p.shape() != shape {
            return Err(IbError::Config(format!(
                "Initial fluid state is {:?}, grid is {:?}",
                fluid.u.shape(),
                shape
            )));
        }
        if !fluid.is_finite() {
            return Err(IbError::Input(
                "Initial fluid state is not finite".to_owned(),
            ));
        }
        self.fluid = fluid;
        Ok(self)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn fluid(&self) -> &FluidState {
        &self.fluid
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn forces(&self) -> &[Point] {
        &self.forces
    }

    /// Positions the last step's forces were evaluated at
    pub fn previous(&self) -> &[Point] {
        &self.previous
    }

    /// Poroelastic drag subtracted from the forcing on the last step
    pub fn drag(&self) -> &[Point] {
        &self.drag
    }

    /// Fluid velocities interpolated onto the structure during the last step
    pub fn velocities(&self) -> &[Point] {
        &self.velocities
    }

    pub fn elements(&self) -> &[ForceElement] {
        &self.elements
    }

    pub fn masses(&self) -> &MassPoints {
        &self.masses
    }

    pub fn tracers(&self) -> &[Point] {
        &self.tracers.positions
    }

    pub fn concentration(&self) -> Option<&EulerianField> {
        self.concentration.as_ref()
    }

    /// True once the clock has reached the final time
    pub fn is_finished(&self) -> bool {
        let TimeParameters { dt, t_final } = self.config.time;
        self.time >= t_final - 0.5 * dt
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            step: self.step,
            time: self.time,
            dt: self.config.time.dt,
            rho: self.config.fluid.rho,
            grid: &self.config.grid,
            fluid: &self.fluid,
            positions: &self.positions,
            forces: &self.forces,
            tracers: &self.tracers.positions,
            concentration: self.concentration.as_ref(),
        }
    }

    /// Advances the coupled system by one time step
    ///
    /// # Returns
    /// A summary of the step, or a divergence error if any force, velocity
    /// or pressure became non-finite. The run cannot continue after an error.
    pub fn step(&mut self) -> IbResult<StepReport> {
        let grid = self.config.grid;
        let kernel = self.config.kernel;
        let dt = self.config.time.dt;
        let half_dt = 0.5 * dt;
        let time = self.time;

        // Predictor
        let (half, sampled) = move_lagrangian_points(
            kernel,
            &grid,
            &self.fluid.u,
            &self.fluid.v,
            &self.positions,
            &self.positions,
            half_dt,
            None,
        );

        for element in self.elements.iter_mut() {
            element.update(time, &self.positions);
        }
        if let Some(series) = &self.activation {
            series.apply(self.step, &mut self.elements);
        }

        self.masses.predict_position(&grid, half_dt)?;

        // No rate history before the first step
        let previous: &[Point] = if self.step == 0 {
            &half
        } else {
            &self.previous
        };
        let ctx = ForceContext::new(&grid, &half, previous, &self.velocities, dt, time);
        let mut forces = assemble_forces(&self.elements, &ctx);
        self.masses.accumulate_reaction(&grid, &half, &mut forces);
        if let Some(k) = forces
            .iter()
            .position(|f| !f.x.is_finite() || !f.y.is_finite())
        {
            return Err(IbError::Divergence(format!(
                "Non-finite force on Lagrangian point {} at t = {time:.6e}",
                k + 1
            )));
        }

        let boundary = self.masses.boundary_forces(&grid, &half);
        self.masses.predict_velocity(&boundary, half_dt)?;

        // Fluid solve
        let drag = if self.poroelastic.is_empty() || self.step == 0 {
            None
        } else {
            Some(poroelastic_drag(
                &self.poroelastic,
                &self.point_velocities,
                &sampled,
            ))
        };
        let stencils = build_stencils(kernel, &grid, &half);
        let (mut fx, mut fy) = spread_forcing(&grid, &stencils, &forces, drag.as_deref());
        for body in &self.body_forces {
            body.apply(&mut fx, &mut fy, self.concentration.as_ref())?;
        }
        if let Some(flow) = self.background.as_mut() {
            let (bx, by) = flow.forcing(&grid, &self.fluid, time);
            fx += bx;
            fy += by;
        }

        let old = self.fluid.clone();
        self.solver
            .advance(&mut self.fluid, &fx, &fy, self.config.fluid, dt)
            .map_err(|err| at_time(err, time))?;

        // Corrector
        let u_mid = (&old.u + &self.fluid.u) * 0.5;
        let v_mid = (&old.v + &self.fluid.v) * 0.5;

        let slip = if self.poroelastic.is_empty() {
            None
        } else {
            Some(poroelastic_slip(
                &self.poroelastic,
                self.positions.len(),
                &forces,
            ))
        };
        let (mut next, velocities) = move_lagrangian_points(
            kernel,
            &grid,
            &u_mid,
            &v_mid,
            &self.positions,
            &half,
            dt,
            slip.as_deref(),
        );
        if !self.porous.is_empty() {
            let drift = porous_slip(
                &grid,
                &self.porous,
                &half,
                &forces,
                self.config.lagrangian_spacing,
            );
            for (x, s) in next.iter_mut().zip(&drift) {
                *x = grid.wrap(&(*x + s * dt));
            }
        }

        self.masses.finalize(&grid, &boundary, dt)?;

        self.tracers
            .advance(kernel, &grid, (&old.u, &old.v), (&u_mid, &v_mid), dt);
        if let (Some(c), Some(params)) = (self.concentration.as_mut(), &self.config.concentration) {
            *c = advect_diffuse(&grid, c, &self.fluid.u, &self.fluid.v, params.diffusivity, dt);
        }

        let max_force = forces.iter().map(|f| f.norm()).fold(0.0, f64::max);
        self.point_velocities = self
            .positions
            .iter()
            .zip(&next)
            .map(|(x0, x1)| grid.offset(x0, x1) / dt)
            .collect();
        self.positions = next;
        self.previous = half;
        self.velocities = velocities;
        self.forces = forces;
        if let Some(drag) = drag {
            self.drag = drag;
        }
        self.step += 1;
        self.time += dt;

        let cfl = cfl_number(&grid, &self.fluid, dt);
        if cfl > 1.0 {
            warn!("CFL number {cfl:.3} exceeds 1 at step {}", self.step);
        }
        debug!(
            "step {} t = {:.6e} cfl = {cfl:.4} max |F| = {max_force:.4e}",
            self.step, self.time
        );

        Ok(StepReport {
            step: self.step,
            time: self.time,
            cfl,
            max_force,
        })
    }

    /// Steps until the final time, writing a snapshot every `output_every` steps
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> IbResult<()> {
        let TimeParameters { dt, t_final } = self.config.time;
        let remaining = ((t_final - self.time) / dt).round().max(0.0) as u64;
        info!("stepping {remaining} times with dt = {dt:e} to t = {t_final}");

        if self.step == 0 {
            sink.write(&self.snapshot())?;
        }

        let bar = ProgressBar::new(remaining);
        let mut peak_cfl: f64 = 0.0;
        while !self.is_finished() {
            let report = self.step()?;
            peak_cfl = peak_cfl.max(report.cfl);
            bar.inc(1);

            if report.step % self.config.output_every == 0 {
                sink.write(&self.snapshot())?;
            }
        }
        bar.finish_with_message(format!("completed {} steps", self.step));

        info!(
            "reached t = {:.6e} after {} steps, peak CFL {peak_cfl:.4}",
            self.time, self.step
        );
        Ok(())
    }
}

/// Spreads the Lagrangian forces and subtracts the spread poroelastic drag
fn spread_forcing(
    grid: &Grid,
    stencils: &[Stencil],
    forces: &[Point],
    drag: Option<&[Point]>,
) -> (EulerianField, EulerianField) {
    let (mut fx, mut fy) = spread_vector_with(grid, stencils, forces);
    if let Some(drag) = drag {
        let (dx, dy) = spread_vector_with(grid, stencils, drag);
        fx -= dx;
        fy -= dy;
    }
    (fx, fy)
}

fn at_time(err: IbError, time: f64) -> IbError {
    match err {
        IbError::Divergence(msg) => IbError::Divergence(format!("{msg} at t = {time:.6e}")),
        other => other,
    }
}

fn initial_concentration(grid: &Grid, params: &ConcentrationConfig) -> EulerianField {
    let mut c = EulerianField::from_element(grid.nx, grid.ny, params.background);
    if let Some(blob) = params.blob {
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                let node = Point::new(i as f64 * grid.dx, j as f64 * grid.dy);
                if grid.offset(&blob.center, &node).norm() <= blob.radius {
                    c[(i, j)] = blob.value;
                }
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoussinesqConfig, ConcentrationBlob, GravityConfig};
    use crate::datatypes::{FluidParameters, Gravity};
    use crate::delta::DeltaKernel;
    use crate::forces::{ElementKind, MassPoint, Spring};
    use approx::assert_abs_diff_eq;

    fn config(n: usize) -> SimulationConfig {
        SimulationConfig::new(
            Grid::new(n, n, 1.0, 1.0).unwrap(),
            FluidParameters { mu: 0.01, rho: 1.0 },
            TimeParameters {
                dt: 1e-3,
                t_final: 1e-2,
            },
        )
    }

    struct Counter(usize);

    impl OutputSink for Counter {
        fn write(&mut self, _snapshot: &Snapshot) -> IbResult<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn empty_structure_in_rest_fluid_stays_at_rest() {
        let mut sim = Simulation::new(config(16), Structure::default()).unwrap();
        let report = sim.step().unwrap();
        assert_eq!(report.step, 1);
        assert_abs_diff_eq!(sim.fluid().u.amax(), 0.0);
        assert_abs_diff_eq!(sim.time(), 1e-3, epsilon = 1e-15);
    }

    #[test]
    fn run_writes_initial_and_cadence_snapshots() {
        let mut cfg = config(16);
        cfg.output_every = 5;
        let mut sim = Simulation::new(cfg, Structure::default()).unwrap();
        let mut sink = Counter(0);
        sim.run(&mut sink).unwrap();

        assert_eq!(sim.step_count(), 10);
        // initial, step 5, step 10
        assert_eq!(sink.0, 3);
    }

    #[test]
    fn out_of_range_element_is_rejected_before_stepping() {
        let mut structure = Structure::new(vec![Point::new(0.5, 0.5)]);
        structure.push(ElementKind::Spring(Spring::linear(0, 3, 1.0, 0.1)));
        let err = Simulation::new(config(16), structure).err().unwrap();
        assert!(matches!(err, IbError::Index { index: 4, .. }), "{err}");
    }

    #[test]
    fn infinite_stiffness_is_reported_as_divergence() {
        let mut structure = Structure::new(vec![Point::new(0.4, 0.5), Point::new(0.6, 0.5)]);
        structure.push(ElementKind::Spring(Spring::linear(0, 1, f64::INFINITY, 0.1)));
        let mut sim = Simulation::new(config(16), structure).unwrap();
        let err = sim.step().unwrap_err();
        assert!(matches!(err, IbError::Divergence(_)), "{err}");
    }

    #[test]
    fn mass_phase_cycle_closes_every_step() {
        let mut structure = Structure::new(vec![Point::new(0.5, 0.5)]);
        structure.push(ElementKind::MassPoint(MassPoint {
            index: 0,
            stiffness: 1.0,
            mass: 1.0,
            initial_velocity: Point::zeros(),
        }));
        let mut sim = Simulation::new(config(16), structure).unwrap();
        for _ in 0..3 {
            sim.step().unwrap();
            assert_eq!(sim.masses().phase(), &crate::mass::MassPhase::Synchronized);
        }
    }

    #[test]
    fn boussinesq_blob_sets_up_flow() {
        let mut cfg = config(16);
        cfg.gravity = Some(GravityConfig {
            gravity: Gravity::new(Point::new(0.0, -1.0), 1.0).unwrap(),
            apply_to_fluid: false,
        });
        cfg.boussinesq = Some(BoussinesqConfig { expansion: 1.0 });
        cfg.concentration = Some(ConcentrationConfig {
            diffusivity: 0.0,
            background: 0.0,
            blob: Some(ConcentrationBlob {
                center: Point::new(0.5, 0.5),
                radius: 0.2,
                value: 1.0,
            }),
        });
        let mut sim = Simulation::new(cfg, Structure::default()).unwrap();
        assert_abs_diff_eq!(sim.concentration().unwrap()[(8, 8)], 1.0);
        sim.step().unwrap();
        // Heavy blob sinks
        assert!(sim.fluid().v[(8, 8)] < 0.0);
    }

    #[test]
    fn drag_is_subtracted_from_the_spread_forcing() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let positions = vec![Point::new(0.5, 0.5), Point::new(0.2, 0.7)];
        let stencils = build_stencils(DeltaKernel::default(), &grid, &positions);
        let forces = vec![Point::new(1.0, -2.0), Point::new(0.5, 0.5)];
        let drag = vec![Point::new(0.25, 0.75), Point::zeros()];

        let (px, py) = spread_forcing(&grid, &stencils, &forces, None);
        let (fx, fy) = spread_forcing(&grid, &stencils, &forces, Some(&drag));
        let (dx, dy) = spread_vector_with(&grid, &stencils, &drag);

        assert!(((&px - &fx) - &dx).amax() < 1e-12);
        assert!(((&py - &fy) - &dy).amax() < 1e-12);
        // Only the poroelastic neighbourhood changes
        assert!((&px - &fx)[(8, 8)].abs() > 0.0);
        assert_abs_diff_eq!((&px - &fx)[(3, 11)], 0.0, epsilon = 1e-15);
    }
}
