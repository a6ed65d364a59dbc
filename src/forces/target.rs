use crate::datatypes::Point;

use super::ForceContext;

/// Tethers one point to a fixed anchor in space
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPoint {
    pub index: usize,
    pub stiffness: f64,
    pub anchor: Point,
}

impl TargetPoint {
    pub fn accumulate(&self, ctx: &ForceContext, forces: &mut [Point]) {
        let d = ctx.grid.offset(&ctx.positions[self.index], &self.anchor);
        forces[self.index] += d * self.stiffness;
    }
}
