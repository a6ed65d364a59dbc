use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use ib2d::error::IbResult;
use ib2d::input::{load_input_file, parse_input};
use ib2d::post_processor::CsvOutput;
use ib2d::Simulation;

/// Two-dimensional immersed boundary solver
#[derive(Parser, Debug)]
#[command(name = "ib2d", version, about, long_about = None)]
struct Cli {
    /// Input file describing the grid, fluid, time stepping and structure
    input_json: PathBuf,

    /// Directory the snapshots and diagnostics log are written to
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Also write the Eulerian velocity, pressure and vorticity fields
    #[arg(long)]
    fields: bool,

    /// Only parse and validate the input
    #[arg(long)]
    check: bool,
}

fn run(cli: &Cli) -> IbResult<()> {
    let input_json = load_input_file(&cli.input_json)?;
    let setup = parse_input(&input_json)?;

    let mut simulation = Simulation::new(setup.config, setup.structure)?.with_tracers(setup.tracers);
    if let Some(flow) = setup.background_flow {
        simulation = simulation.with_background_flow(Box::new(flow));
    }
    if let Some(series) = setup.activation {
        simulation = simulation.with_activation(series)?;
    }

    if cli.check {
        info!("input file {} is valid", cli.input_json.display());
        return Ok(());
    }

    let mut output = CsvOutput::new(&cli.output_dir)?;
    if cli.fields {
        output = output.with_fields();
    }
    simulation.run(&mut output)?;
    info!(
        "wrote {} snapshots to {}",
        output.written(),
        output.directory().display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
