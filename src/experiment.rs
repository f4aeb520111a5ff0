//! Ties the pieces together for one experiment configuration: the spatial setup and simulation
//! grid are built once, then each replicate draws its own seeding schedule and parameters.
//!
//! The experiment configuration is JSON:
//!
//! ```json
//! {
//!   "name": "minimal",
//!   "start_date": "2020-01-31",
//!   "end_date": "2020-05-31",
//!   "dt": "1/6",
//!   "nsim": 10,
//!   "spatial_setup": {
//!     "base_path": "data",
//!     "geodata": "geodata.csv",
//!     "mobility": "mobility.txt",
//!     "popnodes": "population",
//!     "nodenames": "geoid",
//!     "check_symmetry": false
//!   },
//!   "seeding": { "method": "FolderDraw", "folder_path": "data/importation/" },
//!   "seir": {
//!     "parameters": {
//!       "sigma": "1/5.2",
//!       "gamma": { "distribution": "uniform", "low": "1/6", "high": "1/2.6" },
//!       "R0s": { "distribution": "uniform", "low": 2, "high": 3 }
//!     }
//!   },
//!   "npi": { "file": "data/npi.csv" },
//!   "dynfilter": "data/filter.txt"
//! }
//! ```
//!
//! `dt` defaults to `1/6`, `nbetas` to `nsim`, `base_path` to the current directory;
//! `check_symmetry` (off unless `true`), `npi` and `dynfilter` are optional.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::config::Config;
use crate::error::SetupError;
use crate::matrix::DenseMatrix;
use crate::npi::NpiSeries;
use crate::parameters::{parameters_draw, DrawnParameters};
use crate::random::{replicate_rng, ParametersRng, SeedingRng};
use crate::seeding::seeding_draw;
use crate::setup::{parse_date, SetupOptions, SimulationSetup, DEFAULT_DT};
use crate::spatial::SpatialSetup;

/// Everything one replicate hands to the integrator.
#[derive(Clone, Debug, PartialEq)]
pub struct Replicate {
    pub replicate_id: usize,
    /// `(t_span + 1, nnodes)` importation counts.
    pub seeding: DenseMatrix,
    pub parameters: DrawnParameters,
}

#[derive(Debug)]
pub struct Experiment {
    setup: SimulationSetup,
    seeding_config: Config,
    parameters_config: Config,
    npi: NpiSeries,
    base_seed: u64,
}

impl Experiment {
    /// Builds the spatial setup and simulation grid described by `config`. `nsim`, if given,
    /// overrides the configured number of replicates.
    ///
    /// # Errors
    /// Returns any configuration, I/O, or validation error met while building the setup.
    pub fn from_config(
        config: &Config,
        base_seed: u64,
        nsim: Option<usize>,
    ) -> Result<Self, SetupError> {
        let name = config.get_string("name")?;

        let spatial_config = config.get("spatial_setup")?;
        let base_path = if spatial_config.has("base_path") {
            PathBuf::from(spatial_config.get_string("base_path")?)
        } else {
            PathBuf::new()
        };
        let spatset = SpatialSetup::new(
            &name,
            &base_path.join(spatial_config.get_string("geodata")?),
            &base_path.join(spatial_config.get_string("mobility")?),
            &spatial_config.get_string("popnodes")?,
            &spatial_config.get_string("nodenames")?,
        )?;
        if spatial_config.has("check_symmetry") && spatial_config.get_bool("check_symmetry")? {
            spatset.check_symmetry()?;
        }

        let dt = if config.has("dt") {
            config.get_expression("dt")?
        } else {
            DEFAULT_DT
        };
        let nbetas = if config.has("nbetas") {
            Some(config.get_usize("nbetas")?)
        } else {
            None
        };
        let options = SetupOptions {
            setup_name: name,
            nsim: match nsim {
                Some(n) => n,
                None => config.get_usize("nsim")?,
            },
            ti: parse_date(&config.get_string("start_date")?, "start_date")?,
            tf: parse_date(&config.get_string("end_date")?, "end_date")?,
            dt,
            nbetas,
        };
        let mut setup = SimulationSetup::new(Arc::new(spatset), options)?;

        if config.has("dynfilter") {
            let path = config.get_string("dynfilter")?;
            setup.load_filter(Path::new(&path))?;
            debug!("loaded dynamic filter from {path}");
        }

        let npi = if config.has("npi.file") {
            NpiSeries::from_csv(Path::new(&config.get_string("npi.file")?))?
        } else {
            NpiSeries::no_intervention(setup.ti())
        };
        if npi.start() > setup.ti() {
            info!(
                "NPI series starts on {}, after the simulation start {}; no reduction applies before it",
                npi.start(),
                setup.ti()
            );
        }

        Ok(Experiment {
            setup,
            seeding_config: config.get("seeding")?,
            parameters_config: config.get("seir.parameters")?,
            npi,
            base_seed,
        })
    }

    /// # Errors
    /// See [`Experiment::from_config`].
    pub fn from_file(path: &Path, base_seed: u64, nsim: Option<usize>) -> Result<Self, SetupError> {
        info!("loading experiment configuration from {}", path.display());
        Self::from_config(&Config::from_file(path)?, base_seed, nsim)
    }

    #[must_use]
    pub fn setup(&self) -> &SimulationSetup {
        &self.setup
    }

    #[must_use]
    pub fn npi(&self) -> &NpiSeries {
        &self.npi
    }

    /// Draws replicate `replicate_id`. Each replicate has its own generators, so the result
    /// depends only on the base seed and the index.
    ///
    /// # Errors
    /// Returns seeding or parameter draw errors.
    pub fn draw_replicate(&self, replicate_id: usize) -> Result<Replicate, SetupError> {
        let mut seeding_rng = replicate_rng(SeedingRng, self.base_seed, replicate_id);
        let seeding = seeding_draw(
            &self.setup,
            &self.seeding_config,
            replicate_id,
            &mut seeding_rng,
        )?;

        let mut parameters_rng = replicate_rng(ParametersRng, self.base_seed, replicate_id);
        let parameters = parameters_draw(
            &self.setup,
            &self.parameters_config,
            &self.npi,
            &mut parameters_rng,
        )?;

        Ok(Replicate {
            replicate_id,
            seeding,
            parameters,
        })
    }

    /// Draws replicates `0..nsim` in order.
    ///
    /// # Errors
    /// Stops at the first replicate that fails.
    pub fn draw_all(&self) -> Result<Vec<Replicate>, SetupError> {
        (0..self.setup.nsim())
            .map(|replicate_id| self.draw_replicate(replicate_id))
            .collect()
    }
}
