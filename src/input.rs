//! JSON input files.
//!
//! Point ids in the `structure` section are 1-based and converted to 0-based
//! indices here. Element rows are plain number arrays:
//!
//! | section              | row                                        |
//! |----------------------|--------------------------------------------|
//! | `springs`            | `[m, s, k, L0]` or `[m, s, k, L0, beta]`   |
//! | `damped_springs`     | `[m, s, k, L0, c]`                         |
//! | `beams`              | `[p, q, r, k]` or `[p, q, r, k, C]`        |
//! | `noninvariant_beams` | `[p, q, r, k]` or `[p, q, r, k, Cx, Cy]`   |
//! | `targets`            | `[i, k]` or `[i, k, x, y]`                 |
//! | `muscles`            | `[m, s, Lmax, S, a, b, Fmax]` (+ activation) |
//! | `muscles3`           | muscle row + `[k_nl, alpha_nl]`            |
//! | `mass_points`        | `[i, k, mass]`                             |
//! | `porous`             | `[i, alpha, flag]`                         |
//! | `poroelastic`        | `[i, alpha]`                               |
//!
//! Omitted beam curvatures are taken from the initial configuration, and an
//! omitted target anchor is the point's initial position.

use std::path::{Path, PathBuf};

use json::JsonValue;
use log::info;

use crate::config::{
    BoussinesqConfig, ConcentrationBlob, ConcentrationConfig, GravityConfig, SimulationConfig,
};
use crate::coupling::{ActivationSeries, PenaltyInflow};
use crate::datatypes::{FluidParameters, Gravity, Grid, Point, TimeParameters};
use crate::delta::DeltaKernel;
use crate::error::{IbError, IbResult};
use crate::forces::{
    Beam, DampedSpring, ElementKind, MassPoint, Muscle, Muscle3, NonInvariantBeam,
    PoroelasticPoint, PorousPoint, Spring, TargetPoint,
};
use crate::structure::{Structure, StructureLoader};

/// Everything an input file describes
#[derive(Debug)]
pub struct RunSetup {
    pub config: SimulationConfig,
    pub structure: Structure,
    pub tracers: Vec<Point>,
    pub background_flow: Option<PenaltyInflow>,
    pub activation: Option<ActivationSeries>,
}

/// Reads and checks the top-level layout of an input file
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object
pub fn load_input_file(input_file: &Path) -> IbResult<JsonValue> {
    let file_string = std::fs::read_to_string(input_file).map_err(|err| {
        IbError::Input(format!(
            "Unable to open input file {}: {err}",
            input_file.display()
        ))
    })?;

    let input_json = json::parse(&file_string)
        .map_err(|err| IbError::Input(format!("Error in input file json: {err}")))?;

    for section in ["grid", "fluid", "time", "structure"] {
        if !input_json.has_key(section) {
            return Err(IbError::Input(format!(
                "Input json missing {section} section"
            )));
        }
    }

    Ok(input_json)
}

/// Parses a whole input document
pub fn parse_input(input_json: &JsonValue) -> IbResult<RunSetup> {
    let config = parse_config(input_json)?;
    let structure = parse_structure(&input_json["structure"], &config.grid)?;

    let tracers = if input_json.has_key("tracers") {
        number_rows(input_json, "tracers", 2, 2)?
            .into_iter()
            .map(|row| Point::new(row[0], row[1]))
            .collect()
    } else {
        Vec::new()
    };

    let background_flow = if input_json.has_key("background_flow") {
        Some(parse_background_flow(&input_json["background_flow"])?)
    } else {
        None
    };

    let activation = if input_json.has_key("activation") {
        Some(parse_activation(&input_json["activation"])?)
    } else {
        None
    };

    info!(
        "loaded {} points, {} elements and {} tracers from input file",
        structure.point_count(),
        structure.elements.len(),
        tracers.len()
    );

    Ok(RunSetup {
        config,
        structure,
        tracers,
        background_flow,
        activation,
    })
}

/// Parses the grid, fluid, time and optional physics sections
pub fn parse_config(input_json: &JsonValue) -> IbResult<SimulationConfig> {
    let grid_json = &input_json["grid"];
    let grid = Grid::new(
        required_usize(grid_json, "grid", "nx")?,
        required_usize(grid_json, "grid", "ny")?,
        required_f64(grid_json, "grid", "lx")?,
        required_f64(grid_json, "grid", "ly")?,
    )?;

    let fluid = FluidParameters {
        mu: required_f64(&input_json["fluid"], "fluid", "mu")?,
        rho: required_f64(&input_json["fluid"], "fluid", "rho")?,
    };
    let time = TimeParameters {
        dt: required_f64(&input_json["time"], "time", "dt")?,
        t_final: required_f64(&input_json["time"], "time", "t_final")?,
    };

    let mut config = SimulationConfig::new(grid, fluid, time);

    if input_json.has_key("kernel") {
        let name = input_json["kernel"]
            .as_str()
            .ok_or_else(|| IbError::Input("Kernel must be given by name".to_owned()))?;
        config.kernel = DeltaKernel::from_name(name)
            .ok_or_else(|| IbError::Input(format!("Unknown delta kernel '{name}'")))?;
    }
    if input_json.has_key("output") {
        config.output_every = required_usize(&input_json["output"], "output", "every")?;
    }
    if input_json.has_key("lagrangian_spacing") {
        config.lagrangian_spacing = input_json["lagrangian_spacing"]
            .as_f64()
            .ok_or_else(|| IbError::Input("Bad value for lagrangian_spacing".to_owned()))?;
    }

    if input_json.has_key("gravity") {
        let g = &input_json["gravity"];
        let direction = required_pair(g, "gravity", "direction")?;
        config.gravity = Some(GravityConfig {
            gravity: Gravity::new(direction, required_f64(g, "gravity", "acceleration")?)?,
            apply_to_fluid: g["apply_to_fluid"].as_bool().unwrap_or(false),
        });
    }
    if input_json.has_key("boussinesq") {
        config.boussinesq = Some(BoussinesqConfig {
            expansion: required_f64(&input_json["boussinesq"], "boussinesq", "expansion")?,
        });
    }
    if input_json.has_key("concentration") {
        let c = &input_json["concentration"];
        let blob = if c.has_key("blob") {
            let b = &c["blob"];
            Some(ConcentrationBlob {
                center: Point::new(
                    required_f64(b, "concentration blob", "x")?,
                    required_f64(b, "concentration blob", "y")?,
                ),
                radius: required_f64(b, "concentration blob", "radius")?,
                value: required_f64(b, "concentration blob", "value")?,
            })
        } else {
            None
        };
        config.concentration = Some(ConcentrationConfig {
            diffusivity: required_f64(c, "concentration", "diffusivity")?,
            background: required_f64(c, "concentration", "background")?,
            blob,
        });
    }

    config.validate()?;
    Ok(config)
}

/// Parses the `structure` section against the grid it will live on
pub fn parse_structure(structure_json: &JsonValue, grid: &Grid) -> IbResult<Structure> {
    let positions: Vec<Point> = number_rows(structure_json, "points", 2, 2)?
        .into_iter()
        .map(|row| Point::new(row[0], row[1]))
        .collect();
    let count = positions.len();
    let id = |value: f64, element: &str| point_id(value, element, count);

    let mut structure = Structure::new(positions);

    for row in number_rows(structure_json, "springs", 4, 5)? {
        let mut spring = Spring::linear(id(row[0], "spring")?, id(row[1], "spring")?, row[2], row[3]);
        if let Some(exponent) = row.get(4) {
            spring.exponent = *exponent;
        }
        structure.push(ElementKind::Spring(spring));
    }

    for row in number_rows(structure_json, "damped_springs", 5, 5)? {
        let spring = Spring::linear(
            id(row[0], "damped spring")?,
            id(row[1], "damped spring")?,
            row[2],
            row[3],
        );
        structure.push(ElementKind::DampedSpring(DampedSpring {
            spring,
            damping: row[4],
        }));
    }

    for row in number_rows(structure_json, "beams", 4, 5)? {
        let (prev, mid, next) = (id(row[0], "beam")?, id(row[1], "beam")?, id(row[2], "beam")?);
        let curvature = match row.get(4) {
            Some(c) => *c,
            None => {
                let p = &structure.positions;
                let a = grid.offset(&p[prev], &p[mid]);
                let b = grid.offset(&p[mid], &p[next]);
                b.x * a.y - b.y * a.x
            }
        };
        structure.push(ElementKind::Beam(Beam {
            prev,
            mid,
            next,
            stiffness: row[3],
            curvature,
        }));
    }

    for row in number_rows(structure_json, "noninvariant_beams", 4, 6)? {
        let element = "non-invariant beam";
        let (prev, mid, next) = (id(row[0], element)?, id(row[1], element)?, id(row[2], element)?);
        let (curvature_x, curvature_y) = match row.len() {
            6 => (row[4], row[5]),
            4 => {
                let p = &structure.positions;
                let d = grid.offset(&p[mid], &p[next]) - grid.offset(&p[prev], &p[mid]);
                (d.x, d.y)
            }
            _ => {
                return Err(IbError::Input(
                    "noninvariant_beams rows need both curvature components or neither"
                        .to_owned(),
                ))
            }
        };
        structure.push(ElementKind::NonInvariantBeam(NonInvariantBeam {
            prev,
            mid,
            next,
            stiffness: row[3],
            curvature_x,
            curvature_y,
        }));
    }

    for row in number_rows(structure_json, "targets", 2, 4)? {
        let index = id(row[0], "target point")?;
        let anchor = match row.len() {
            4 => Point::new(row[2], row[3]),
            2 => structure.positions[index],
            _ => {
                return Err(IbError::Input(
                    "targets rows need both anchor coordinates or neither".to_owned(),
                ))
            }
        };
        structure.push(ElementKind::TargetPoint(TargetPoint {
            index,
            stiffness: row[1],
            anchor,
        }));
    }

    for row in number_rows(structure_json, "muscles", 7, 8)? {
        let muscle = muscle_from_row(&row, "muscle", count)?;
        structure.push(ElementKind::Muscle(muscle));
    }

    for row in number_rows(structure_json, "muscles3", 9, 9)? {
        let muscle = muscle_from_row(&row[..7], "3-element muscle", count)?;
        structure.push(ElementKind::Muscle3(Muscle3 {
            muscle,
            spring_stiffness: row[7],
            spring_exponent: row[8],
        }));
    }

    for row in number_rows(structure_json, "mass_points", 3, 3)? {
        structure.push(ElementKind::MassPoint(MassPoint {
            index: id(row[0], "mass point")?,
            stiffness: row[1],
            mass: row[2],
            initial_velocity: Point::zeros(),
        }));
    }

    for row in number_rows(structure_json, "porous", 3, 3)? {
        structure.push(ElementKind::PorousPoint(PorousPoint {
            index: id(row[0], "porous point")?,
            porosity: row[1],
            stencil_flag: stencil_flag(row[2], row[0])?,
        }));
    }

    for row in number_rows(structure_json, "poroelastic", 2, 2)? {
        structure.push(ElementKind::PoroelasticPoint(PoroelasticPoint {
            index: id(row[0], "poroelastic point")?,
            coefficient: row[1],
        }));
    }

    structure.validate()?;
    Ok(structure)
}

fn muscle_from_row(row: &[f64], element: &str, count: usize) -> IbResult<Muscle> {
    Ok(Muscle {
        master: point_id(row[0], element, count)?,
        slave: point_id(row[1], element, count)?,
        max_length: row[2],
        muscle_const: row[3],
        hill_a: row[4],
        hill_b: row[5],
        max_force: row[6],
        activation: row.get(7).copied().unwrap_or(1.0),
    })
}

fn parse_background_flow(flow: &JsonValue) -> IbResult<PenaltyInflow> {
    let region = &flow["region"];
    PenaltyInflow::new(
        required_pair(flow, "background_flow", "velocity")?,
        Point::new(
            required_f64(region, "background_flow region", "x_min")?,
            required_f64(region, "background_flow region", "y_min")?,
        ),
        Point::new(
            required_f64(region, "background_flow region", "x_max")?,
            required_f64(region, "background_flow region", "y_max")?,
        ),
        required_f64(flow, "background_flow", "stiffness")?,
    )
}

fn parse_activation(activation: &JsonValue) -> IbResult<ActivationSeries> {
    let start = required_usize(activation, "activation", "start")?;
    let end = required_usize(activation, "activation", "end")?;
    if start == 0 || end == 0 {
        return Err(IbError::Input(
            "Activation start and end are 1-based point ids".to_owned(),
        ));
    }
    let rows = number_rows(activation, "rows", 1, usize::MAX)?;
    ActivationSeries::new(
        rows,
        start - 1,
        end - 1,
        required_f64(activation, "activation", "peak_stiffness")?,
    )
}

/// Converts a 1-based point id to an index, checking it against the point count
fn point_id(value: f64, element: &str, count: usize) -> IbResult<usize> {
    if value.fract() != 0.0 || value < 1.0 {
        return Err(IbError::Input(format!(
            "{element} references point id {value}, ids are positive integers"
        )));
    }
    let index = value as usize;
    if index > count {
        return Err(IbError::Index {
            element: element.to_owned(),
            index,
            count,
        });
    }
    Ok(index - 1)
}

fn stencil_flag(value: f64, id: f64) -> IbResult<i32> {
    if value.fract() != 0.0 || !(-2.0..=2.0).contains(&value) {
        return Err(IbError::Input(format!(
            "porous point {id} has stencil flag {value}, flags are integers in -2..=2"
        )));
    }
    Ok(value as i32)
}

/// Reads `parent[key]` as an array of number rows with `min..=max` entries.
/// A missing key is an empty list.
fn number_rows(parent: &JsonValue, key: &str, min: usize, max: usize) -> IbResult<Vec<Vec<f64>>> {
    if !parent.has_key(key) {
        return Ok(Vec::new());
    }
    let list = &parent[key];
    if !list.is_array() {
        return Err(IbError::Input(format!("{key} must be an array of rows")));
    }

    list.members()
        .enumerate()
        .map(|(r, row)| {
            if !row.is_array() || row.len() < min || row.len() > max {
                return Err(IbError::Input(format!(
                    "Row {} of {key} must be an array of {}",
                    r + 1,
                    if min == max {
                        format!("{min} numbers")
                    } else {
                        format!("at least {min} numbers")
                    }
                )));
            }
            row.members()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| IbError::Input(format!("Bad value in row {} of {key}", r + 1)))
                })
                .collect()
        })
        .collect()
}

fn required_f64(parent: &JsonValue, section: &str, key: &str) -> IbResult<f64> {
    if !parent.has_key(key) {
        return Err(IbError::Input(format!(
            "Input json missing {key} field in {section} section"
        )));
    }
    parent[key]
        .as_f64()
        .ok_or_else(|| IbError::Input(format!("Bad value for {key} in {section} section")))
}

fn required_usize(parent: &JsonValue, section: &str, key: &str) -> IbResult<usize> {
    if !parent.has_key(key) {
        return Err(IbError::Input(format!(
            "Input json missing {key} field in {section} section"
        )));
    }
    parent[key]
        .as_usize()
        .ok_or_else(|| IbError::Input(format!("Bad value for {key} in {section} section")))
}

fn required_pair(parent: &JsonValue, section: &str, key: &str) -> IbResult<Point> {
    let value = &parent[key];
    match (value[0].as_f64(), value[1].as_f64()) {
        (Some(x), Some(y)) if value.len() == 2 => Ok(Point::new(x, y)),
        _ => Err(IbError::Input(format!(
            "{key} in {section} section must be a pair of numbers"
        ))),
    }
}

/// Loads the structure section of an input file
#[derive(Debug, Clone)]
pub struct JsonStructureLoader {
    path: PathBuf,
    grid: Grid,
}

impl JsonStructureLoader {
    pub fn new(path: &Path, grid: Grid) -> JsonStructureLoader {
        JsonStructureLoader {
            path: path.to_path_buf(),
            grid,
        }
    }
}

impl StructureLoader for JsonStructureLoader {
    fn load(&self) -> IbResult<Structure> {
        let input_json = load_input_file(&self.path)?;
        parse_structure(&input_json["structure"], &self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{
        "grid": {"nx": 16, "ny": 16, "lx": 1.0, "ly": 1.0},
        "fluid": {"mu": 0.01, "rho": 1.0},
        "time": {"dt": 0.001, "t_final": 0.01},
        "kernel": "cosine4",
        "output": {"every": 5},
        "structure": {
            "points": [[0.4, 0.5], [0.5, 0.5], [0.6, 0.5]],
            "springs": [[1, 2, 10.0, 0.1], [2, 3, 10.0, 0.1, 2.0]],
            "beams": [[1, 2, 3, 0.5]],
            "targets": [[2, 100.0]],
            "mass_points": [[3, 50.0, 0.2]]
        },
        "tracers": [[0.1, 0.1]]
    }"#;

    #[test]
    fn parses_a_complete_document() {
        let setup = parse_input(&json::parse(INPUT).unwrap()).unwrap();

        assert_eq!(setup.config.kernel, DeltaKernel::Cosine4);
        assert_eq!(setup.config.output_every, 5);
        assert_eq!(setup.structure.point_count(), 3);
        assert_eq!(setup.structure.elements.len(), 5);
        assert_eq!(setup.tracers.len(), 1);

        match &setup.structure.elements[1].kind {
            ElementKind::Spring(s) => {
                assert_eq!((s.master, s.slave), (1, 2));
                assert_eq!(s.exponent, 2.0);
            }
            other => panic!("expected a spring, got {other:?}"),
        }
        match &setup.structure.elements[2].kind {
            // straight chain has no curvature
            ElementKind::Beam(b) => assert!(b.curvature.abs() < 1e-15),
            other => panic!("expected a beam, got {other:?}"),
        }
        match &setup.structure.elements[3].kind {
            ElementKind::TargetPoint(t) => assert_eq!(t.anchor, Point::new(0.5, 0.5)),
            other => panic!("expected a target point, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_id_is_an_index_error() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let structure = json::parse(r#"{"points": [[0.1, 0.1]], "springs": [[1, 2, 1.0, 0.1]]}"#)
            .unwrap();
        let err = parse_structure(&structure, &grid).unwrap_err();
        assert!(
            matches!(err, IbError::Index { index: 2, count: 1, .. }),
            "{err}"
        );
    }

    #[test]
    fn missing_section_is_reported() {
        let mut document = json::parse(INPUT).unwrap();
        document.remove("fluid");
        let err = parse_config(&document).unwrap_err().to_string();
        assert!(err.contains("mu"), "{err}");
    }

    #[test]
    fn boussinesq_without_gravity_fails_to_parse() {
        let mut document = json::parse(INPUT).unwrap();
        document["boussinesq"] = json::object! { expansion: 0.2 };
        document["concentration"] = json::object! { diffusivity: 0.0, background: 0.0 };
        assert!(matches!(parse_config(&document), Err(IbError::Config(_))));
    }

    #[test]
    fn fractional_stencil_flag_is_rejected() {
        let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
        let structure = json::parse(
            r#"{"points": [[0.1, 0.1], [0.2, 0.1], [0.3, 0.1]],
                "porous": [[1, 0.5, -2], [2, 0.5, 0.7], [3, 0.5, 2]]}"#,
        )
        .unwrap();
        let err = parse_structure(&structure, &grid).unwrap_err();
        assert!(matches!(err, IbError::Input(_)), "{err}");
        assert!(err.to_string().contains("0.7"), "{err}");
    }
}
