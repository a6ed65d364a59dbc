use crate::datatypes::Point;
use crate::error::IbResult;
use crate::forces::{validate_elements, ElementKind, ForceElement, Schedule};

/// The immersed structure: Lagrangian points plus the ordered force elements
/// acting on them. Counts are fixed once the simulation starts.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub positions: Vec<Point>,
    pub elements: Vec<ForceElement>,
}

impl Structure {
    pub fn new(positions: Vec<Point>) -> Structure {
        Structure {
            positions,
            elements: Vec::new(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    pub fn push(&mut self, kind: ElementKind) -> &mut Structure {
        self.elements.push(kind.into());
        self
    }

    pub fn push_scheduled(&mut self, kind: ElementKind, schedule: Schedule) -> &mut Structure {
        self.elements.push(ForceElement::with_schedule(kind, schedule));
        self
    }

    /// Number of elements of each kind, in first-seen order
    pub fn census(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for element in &self.elements {
            let name = element.kind.name();
            match counts.iter_mut().find(|(n, _)| n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name.to_owned(), 1)),
            }
        }
        counts
    }

    pub fn validate(&self) -> IbResult<()> {
        validate_elements(&self.elements, self.point_count())
    }
}

/// Supplies a structure from some external source
pub trait StructureLoader {
    fn load(&self) -> IbResult<Structure>;
}
