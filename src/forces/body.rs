use crate::datatypes::{EulerianField, Gravity};
use crate::error::{IbError, IbResult};

/// Body forces added directly to the Eulerian forcing rather than spread
/// from the structure
#[derive(Debug, Clone, PartialEq)]
pub enum BodyForce {
    /// `ρ·g·ĝ`
    Gravity { rho: f64, gravity: Gravity },
    /// `ρ·β·g·ĝ·(C − C₀)`
    Boussinesq {
        rho: f64,
        expansion: f64,
        gravity: Gravity,
        background: f64,
    },
}

impl BodyForce {
    /// Adds this body force into `fx`, `fy`
    ///
    /// # Arguments
    /// * `fx`, `fy` - The Eulerian forcing being assembled
    /// * `concentration` - The scalar field, required for Boussinesq forcing
    pub fn apply(
        &self,
        fx: &mut EulerianField,
        fy: &mut EulerianField,
        concentration: Option<&EulerianField>,
    ) -> IbResult<()> {
        match self {
            BodyForce::Gravity { rho, gravity } => {
                let g = gravity.vector() * *rho;
                fx.add_scalar_mut(g.x);
                fy.add_scalar_mut(g.y);
            }
            BodyForce::Boussinesq {
                rho,
                expansion,
                gravity,
                background,
            } => {
                let Some(c) = concentration else {
                    return Err(IbError::Config(
                        "Boussinesq forcing needs a concentration field".to_owned(),
                    ));
                };
                let g = gravity.vector() * (*rho * *expansion);
                for (k, ck) in c.iter().enumerate() {
                    let excess = ck - background;
                    fx[k] += g.x * excess;
                    fy[k] += g.y * excess;
                }
            }
        }
        Ok(())
    }
}
