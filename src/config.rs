use crate::datatypes::{FluidParameters, Gravity, Grid, Point, TimeParameters};
use crate::delta::DeltaKernel;
use crate::error::{IbError, IbResult};

/// Circular patch of raised concentration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationBlob {
    pub center: Point,
    pub radius: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationConfig {
    pub diffusivity: f64,
    /// Reference value `C₀` of the Boussinesq term and the initial fill
    pub background: f64,
    pub blob: Option<ConcentrationBlob>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityConfig {
    pub gravity: Gravity,
    /// Also apply `ρ·g` to the fluid, not just to mass points
    pub apply_to_fluid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoussinesqConfig {
    pub expansion: f64,
}

/// Immutable run configuration, built once before stepping starts
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub grid: Grid,
    pub fluid: FluidParameters,
    pub time: TimeParameters,
    pub kernel: DeltaKernel,
    pub gravity: Option<GravityConfig>,
    pub boussinesq: Option<BoussinesqConfig>,
    pub concentration: Option<ConcentrationConfig>,
    /// Emit a snapshot every this many steps
    pub output_every: usize,
    /// Lagrangian spacing used by the porous tangent stencil
    pub lagrangian_spacing: f64,
}

impl SimulationConfig {
    /// A configuration with no optional physics, output every step
    pub fn new(grid: Grid, fluid: FluidParameters, time: TimeParameters) -> SimulationConfig {
        SimulationConfig {
            grid,
            fluid,
            time,
            kernel: DeltaKernel::default(),
            gravity: None,
            boussinesq: None,
            concentration: None,
            output_every: 1,
            lagrangian_spacing: 0.5 * grid.dx.min(grid.dy),
        }
    }

    /// Checks every precondition that must hold before stepping
    pub fn validate(&self) -> IbResult<()> {
        let TimeParameters { dt, t_final } = self.time;
        if dt <= 0.0 || !dt.is_finite() {
            return Err(IbError::Config(format!(
                "Time step must be positive, got dt = {dt}"
            )));
        }
        if t_final < 0.0 || !t_final.is_finite() {
            return Err(IbError::Config(format!(
                "Final time must be non-negative, got {t_final}"
            )));
        }
        if self.fluid.rho <= 0.0 || !self.fluid.rho.is_finite() {
            return Err(IbError::Config(format!(
                "Fluid density must be positive, got rho = {}",
                self.fluid.rho
            )));
        }
        if self.fluid.mu < 0.0 || !self.fluid.mu.is_finite() {
            return Err(IbError::Config(format!(
                "Fluid viscosity must be non-negative, got mu = {}",
                self.fluid.mu
            )));
        }
        if self.output_every == 0 {
            return Err(IbError::Config(
                "Output cadence must be at least one step".to_owned(),
            ));
        }
        if self.lagrangian_spacing <= 0.0 {
            return Err(IbError::Config(format!(
                "Lagrangian spacing must be positive, got {}",
                self.lagrangian_spacing
            )));
        }
        if let Some(c) = &self.concentration {
            if c.diffusivity < 0.0 {
                return Err(IbError::Config(format!(
                    "Concentration diffusivity must be non-negative, got {}",
                    c.diffusivity
                )));
            }
        }
        if self.boussinesq.is_some() {
            if self.gravity.is_none() {
                return Err(IbError::Config(
                    "Boussinesq forcing requires gravity to be enabled".to_owned(),
                ));
            }
            if self.concentration.is_none() {
                return Err(IbError::Config(
                    "Boussinesq forcing requires a background concentration".to_owned(),
                ));
            }
        }

        Ok(())
    }
}
