//! Two-dimensional immersed boundary method on a periodic grid.
//!
//! A structure made of Lagrangian points and force elements is coupled to an
//! incompressible fluid through a discrete delta kernel. Forces are spread
//! onto the grid, the fluid is advanced spectrally, and the structure moves
//! with the interpolated fluid velocity.

pub mod config;
pub mod coupling;
pub mod datatypes;
pub mod delta;
pub mod diagnostics;
pub mod error;
pub mod fluid;
pub mod forces;
pub mod input;
pub mod mass;
pub mod motion;
pub mod porous;
pub mod post_processor;
pub mod scalar;
pub mod simulation;
pub mod structure;
pub mod transfer;

pub use error::{IbError, IbResult};
pub use simulation::{OutputSink, Simulation, Snapshot};
pub use structure::Structure;
