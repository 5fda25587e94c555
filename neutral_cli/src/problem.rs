//! Problem description files.

use anyhow::{Context, Result};
use neutral::source::SourceRegion;
use neutral::table::CrossSection;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Physical extent and duration of the simulated domain.
#[derive(Debug, Deserialize)]
pub struct MeshExtent {
    /// Domain width, in metres.
    pub width: f64,
    /// Domain height, in metres.
    pub height: f64,
    /// Simulated time after which the run stops, in seconds.
    pub sim_end: f64,
}

/// The rectangular particle source.
#[derive(Debug, Deserialize)]
pub struct SourceRect {
    /// Left edge of the source region.
    pub x: f64,
    /// Bottom edge of the source region.
    pub y: f64,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
}

/// A rectangular density override.
#[derive(Debug, Deserialize)]
pub struct DensityPatch {
    /// Left edge of the patch.
    pub x: f64,
    /// Bottom edge of the patch.
    pub y: f64,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
    /// Density inside the patch.
    pub density: f64,
}

/// A complete transport problem, as read from a YAML file.
#[derive(Debug, Deserialize)]
pub struct Problem {
    /// Global cell count along x.
    pub nx: usize,
    /// Global cell count along y.
    pub ny: usize,
    /// Time step length, in seconds.
    pub dt: f64,
    /// Maximum number of time steps.
    pub iterations: usize,
    /// Number of source particles; must fill whole blocks.
    pub nparticles: usize,
    /// Mono-energetic source energy, in eV.
    pub initial_energy: f64,
    /// The particle source.
    pub source: SourceRect,
    /// Domain extent and end time.
    pub mesh: MeshExtent,
    /// Uniform background density.
    pub density: f64,
    /// Optional density overrides, applied in order.
    #[serde(default)]
    pub density_patches: Vec<DensityPatch>,
    /// Path of the scattering cross-section table, relative to the problem
    /// file.
    pub cs_scatter: PathBuf,
    /// Path of the absorption cross-section table, relative to the problem
    /// file.
    pub cs_absorb: PathBuf,
    /// Reference grand sum to validate against, if known.
    #[serde(default)]
    pub expected_tally: Option<f64>,
    /// Dump the tally grid after every step.
    #[serde(default)]
    pub visit_dump: bool,
}

impl Problem {
    /// Reads a problem description from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read problem file `{}`", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("could not parse problem file `{}`", path.display()))
    }

    /// The source region of this problem.
    #[must_use]
    pub fn source_region(&self) -> SourceRegion {
        SourceRegion {
            x: self.source.x,
            y: self.source.y,
            width: self.source.width,
            height: self.source.height,
        }
    }

    /// Loads one of the cross-section tables named by this problem,
    /// resolving relative paths against the problem file's directory.
    ///
    /// # Errors
    ///
    /// Fails if the table cannot be read, parsed or validated.
    pub fn load_table(&self, problem_path: &Path, table_path: &Path) -> Result<CrossSection> {
        let resolved = if table_path.is_relative() {
            problem_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(table_path)
        } else {
            table_path.to_path_buf()
        };
        let text = fs::read_to_string(&resolved).with_context(|| {
            format!("could not read cross-section table `{}`", resolved.display())
        })?;
        CrossSection::from_text(&text).with_context(|| {
            format!("invalid cross-section table `{}`", resolved.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_problem() {
        let text = "
nx: 10
ny: 10
dt: 1.0e-9
iterations: 5
nparticles: 1024
initial_energy: 1.0e6
source: {x: 0.0, y: 0.0, width: 10.0, height: 10.0}
mesh: {width: 10.0, height: 10.0, sim_end: 1.0e-6}
density: 1.0
cs_scatter: data/scatter.cs
cs_absorb: data/absorb.cs
";
        let problem: Problem = serde_yaml::from_str(text).unwrap();
        assert_eq!(problem.nx, 10);
        assert_eq!(problem.iterations, 5);
        assert!(problem.expected_tally.is_none());
        assert!(problem.density_patches.is_empty());
        assert!(!problem.visit_dump);
    }
}
