//! Command-line driver for the transport solver.

mod problem;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use ndarray_npy::NpzWriter;
use neutral::constants::VALIDATE_TOLERANCE;
use neutral::event::Material;
use neutral::mesh::Mesh2d;
use neutral::source::inject_particles;
use neutral::store::{ParticleStore, DEFAULT_BLOCK_WIDTH};
use neutral::tally::{EnergyTally, TallyMode};
use neutral::transport::solve_transport_2d;
use problem::Problem;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Runs a two-dimensional Monte Carlo neutral-particle transport problem.
#[derive(Parser)]
#[command(author, version, about)]
struct Opts {
    /// Path of the problem description file.
    problem: PathBuf,
    /// Number of worker threads; defaults to all cores.
    #[arg(long)]
    threads: Option<usize>,
    /// Number of particle lanes per block.
    #[arg(default_value_t = DEFAULT_BLOCK_WIDTH, long)]
    block_width: usize,
    /// Buffer tally contributions per lane and flush them on facet
    /// crossings instead of writing every deposit immediately.
    #[arg(long)]
    deferred_tally: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(&Opts::parse()) {
        Ok(passed) => {
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the configured problem to completion. Returns `false` if a
/// configured reference tally failed to validate.
fn run(opts: &Opts) -> Result<bool> {
    if let Some(threads) = opts.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("could not size the worker pool")?;
    }

    let problem = Problem::from_path(&opts.problem)?;
    let cs_scatter = problem.load_table(&opts.problem, &problem.cs_scatter)?;
    let cs_absorb = problem.load_table(&opts.problem, &problem.cs_absorb)?;

    let mut mesh = Mesh2d::uniform(
        problem.nx,
        problem.ny,
        problem.mesh.width,
        problem.mesh.height,
        problem.density,
    );
    for patch in &problem.density_patches {
        mesh.set_density_patch(patch.x, patch.y, patch.width, patch.height, patch.density);
    }

    let material = Material::default();
    let tally_mode = if opts.deferred_tally {
        TallyMode::DeferredFlush
    } else {
        TallyMode::AtomicPerWrite
    };

    let mut store = ParticleStore::new(problem.nparticles, opts.block_width)?;
    inject_particles(
        &mesh,
        &problem.source_region(),
        &mut store,
        problem.initial_energy,
        problem.dt,
    )?;

    let (table_min, table_max) = cs_scatter.energy_bounds();
    ensure!(
        problem.initial_energy >= table_min && problem.initial_energy <= table_max,
        "initial energy {} eV is outside the cross-section tables",
        problem.initial_energy
    );

    let min_cell = mesh
        .edgedx()
        .iter()
        .chain(mesh.edgedy())
        .fold(f64::INFINITY, |acc, &width| acc.min(width));
    let census_path = neutral::event::speed_from_energy(problem.initial_energy) * problem.dt;
    tracing::info!(
        nx = problem.nx,
        ny = problem.ny,
        nparticles = problem.nparticles,
        block_width = opts.block_width,
        "problem loaded; a census path covers {:.2} cells",
        census_path / min_cell
    );

    let tally = EnergyTally::new(problem.nx, problem.ny, 0, 0);
    let mut wallclock = 0.0;
    let mut elapsed_sim_time = 0.0;

    for step in 1..=problem.iterations {
        let start = Instant::now();
        // the master key changes every step, never within one
        let report = solve_transport_2d(
            &mesh,
            &material,
            &cs_scatter,
            &cs_absorb,
            &mut store,
            &tally,
            tally_mode,
            problem.nparticles,
            problem.dt,
            step as u64,
        )?;
        let step_time = start.elapsed().as_secs_f64();
        wallclock += step_time;
        elapsed_sim_time += problem.dt;

        tracing::info!(
            step,
            facets = report.facet_events,
            collisions = report.collision_events,
            particles = report.processed_particles,
            "step took {step_time:.4} s ({wallclock:.4} s total)"
        );

        if problem.visit_dump {
            dump_tally(&tally, step)?;
        }

        if elapsed_sim_time >= problem.mesh.sim_end {
            tracing::info!("reached end of simulation time");
            break;
        }
    }

    let grand_sum = tally.grand_sum();
    tracing::info!("final energy deposition tally {grand_sum:.15e}");

    let Some(expected) = problem.expected_tally else {
        return Ok(true);
    };

    let within = (grand_sum - expected).abs() <= VALIDATE_TOLERANCE * expected.abs();
    if within {
        tracing::info!("validation PASSED: expected {expected:.12e}, got {grand_sum:.12e}");
    } else {
        tracing::error!("validation FAILED: expected {expected:.12e}, got {grand_sum:.12e}");
    }
    Ok(within)
}

/// Writes the tally grid of one step next to the working directory.
fn dump_tally(tally: &EnergyTally, step: usize) -> Result<()> {
    let path = format!("energy{step}.npz");
    let mut writer = NpzWriter::new(File::create(&path)?);
    writer.add_array("energy_deposition", &tally.to_array())?;
    writer.finish()?;
    tracing::info!("wrote {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        Opts::command().debug_assert();
    }
}
