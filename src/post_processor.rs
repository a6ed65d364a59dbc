use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::datatypes::Point;
use crate::diagnostics::{
    cfl_number, decompose_forces, divergence, kinetic_energy, velocity_magnitude, vorticity,
};
use crate::error::{IbError, IbResult};
use crate::simulation::{OutputSink, Snapshot};

/// Writes one Lagrangian CSV per snapshot plus a JSON-lines diagnostics log
///
/// Files written into `directory`:
/// * `lagrangian_{step:06}.csv` with columns `x,y,fx,fy,fn,ft`
/// * `tracers_{step:06}.csv` with columns `x,y`, when tracers exist
/// * `eulerian_{step:06}.csv` with columns `x,y,u,v,p,vorticity,speed`, when
///   field output is enabled
/// * `diagnostics.jsonl`, one object per snapshot
#[derive(Debug, Clone)]
pub struct CsvOutput {
    directory: PathBuf,
    fields: bool,
    written: usize,
}

impl CsvOutput {
    /// Creates the output directory if needed and truncates the diagnostics log
    pub fn new(directory: &Path) -> IbResult<CsvOutput> {
        std::fs::create_dir_all(directory).map_err(|err| {
            IbError::PostProcessor(format!(
                "Failed to create output directory {}: {err}",
                directory.display()
            ))
        })?;
        create(&directory.join("diagnostics.jsonl"))?;

        Ok(CsvOutput {
            directory: directory.to_path_buf(),
            fields: false,
            written: 0,
        })
    }

    /// Also write the full Eulerian fields with every snapshot
    pub fn with_fields(mut self) -> CsvOutput {
        self.fields = true;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of snapshots written so far
    pub fn written(&self) -> usize {
        self.written
    }

    fn write_lagrangian(&self, snapshot: &Snapshot) -> IbResult<PathBuf> {
        let path = self
            .directory
            .join(format!("lagrangian_{:06}.csv", snapshot.step));
        let mut file = BufWriter::new(create(&path)?);
        let components = decompose_forces(snapshot.grid, snapshot.positions, snapshot.forces);

        write_line(&mut file, &path, "x,y,fx,fy,fn,ft")?;
        for ((x, f), (normal, tangential)) in snapshot
            .positions
            .iter()
            .zip(snapshot.forces)
            .zip(&components)
        {
            write_line(
                &mut file,
                &path,
                &format!(
                    "{x},{y},{fx},{fy},{normal},{tangential}",
                    x = x.x,
                    y = x.y,
                    fx = f.x,
                    fy = f.y,
                ),
            )?;
        }
        file.flush().map_err(|err| write_error(&path, err))?;
        Ok(path)
    }

    fn write_tracers(&self, snapshot: &Snapshot) -> IbResult<()> {
        if snapshot.tracers.is_empty() {
            return Ok(());
        }
        let path = self
            .directory
            .join(format!("tracers_{:06}.csv", snapshot.step));
        let mut file = BufWriter::new(create(&path)?);
        write_line(&mut file, &path, "x,y")?;
        for p in snapshot.tracers {
            write_line(&mut file, &path, &format!("{},{}", p.x, p.y))?;
        }
        file.flush().map_err(|err| write_error(&path, err))
    }

    fn write_fields(&self, snapshot: &Snapshot) -> IbResult<()> {
        let grid = snapshot.grid;
        let fluid = snapshot.fluid;
        let w = vorticity(grid, fluid);
        let speed = velocity_magnitude(fluid);

        let path = self
            .directory
            .join(format!("eulerian_{:06}.csv", snapshot.step));
        let mut file = BufWriter::new(create(&path)?);
        write_line(&mut file, &path, "x,y,u,v,p,vorticity,speed")?;
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                write_line(
                    &mut file,
                    &path,
                    &format!(
                        "{},{},{},{},{},{},{}",
                        i as f64 * grid.dx,
                        j as f64 * grid.dy,
                        fluid.u[(i, j)],
                        fluid.v[(i, j)],
                        fluid.p[(i, j)],
                        w[(i, j)],
                        speed[(i, j)]
                    ),
                )?;
            }
        }
        file.flush().map_err(|err| write_error(&path, err))
    }

    fn append_diagnostics(&self, snapshot: &Snapshot) -> IbResult<()> {
        let grid = snapshot.grid;
        let fluid = snapshot.fluid;

        let max_vorticity = vorticity(grid, fluid).amax();
        let max_divergence = divergence(grid, fluid).amax();
        let total_force = snapshot
            .forces
            .iter()
            .fold(Point::zeros(), |acc, f| acc + f);

        let mut record = json::object! {
            step: snapshot.step,
            time: snapshot.time,
            cfl: cfl_number(grid, fluid, snapshot.dt),
            max_speed: velocity_magnitude(fluid).max(),
            kinetic_energy: kinetic_energy(grid, fluid, snapshot.rho),
            max_vorticity: max_vorticity,
            max_divergence: max_divergence,
            total_force: vec![total_force.x, total_force.y],
        };
        if let Some(c) = snapshot.concentration {
            record["concentration_total"] = (c.sum() * grid.cell_area()).into();
        }

        let path = self.directory.join("diagnostics.jsonl");
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|err| write_error(&path, err))?;
        write_line(&mut file, &path, &record.dump())
    }
}

impl OutputSink for CsvOutput {
    fn write(&mut self, snapshot: &Snapshot) -> IbResult<()> {
        let path = self.write_lagrangian(snapshot)?;
        self.write_tracers(snapshot)?;
        if self.fields {
            self.write_fields(snapshot)?;
        }
        self.append_diagnostics(snapshot)?;
        self.written += 1;

        info!(
            "wrote step {} (t = {:.6e}) to {}",
            snapshot.step,
            snapshot.time,
            path.display()
        );
        Ok(())
    }
}

fn create(path: &Path) -> IbResult<File> {
    File::create(path).map_err(|err| {
        IbError::PostProcessor(format!("Failed to create {}: {err}", path.display()))
    })
}

fn write_line(file: &mut impl Write, path: &Path, line: &str) -> IbResult<()> {
    writeln!(file, "{line}").map_err(|err| write_error(path, err))
}

fn write_error(path: &Path, err: std::io::Error) -> IbError {
    IbError::PostProcessor(format!("Failed to write {}: {err}", path.display()))
}
