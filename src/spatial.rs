//! The spatial network: node metadata and the inter-node mobility matrix.
//!
//! Nodes are read from a CSV table in file order, and that order defines the index of a node in
//! every matrix the crate produces. Geoids are kept as strings so codes such as `"01001"` keep
//! their leading zeros.
//!
//! The mobility matrix is *not* required to be symmetric: commuting flows are directional and
//! `mobility(i, j) != mobility(j, i)` is an ordinary input. Callers that do want symmetric input
//! can opt in with [`SpatialSetup::check_symmetry`].

use std::fmt::Write as _;
use std::path::Path;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::error::SetupError;
use crate::matrix::{self, find_above, nonzero_entries, DenseMatrix};

// Relative tolerance used by the opt-in symmetry check.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct SpatialSetup {
    setup_name: String,
    nodenames: Vec<String>,
    popnodes: Vec<f64>,
    mobility: DenseMatrix,
    node_index: FxHashMap<String, usize>,
}

impl SpatialSetup {
    /// Loads the node table and mobility matrix and validates them against each other.
    ///
    /// `popnodes_key` and `nodenames_key` name the population and geoid columns of the node
    /// table.
    ///
    /// # Errors
    /// - `SetupError::ConfigError` if either column is missing, a population is not a
    ///   non-negative number, a geoid repeats, or the matrix has a negative entry
    /// - `SetupError::ShapeError` if the matrix is not K×K for K nodes
    /// - `SetupError::ConsistencyError` if any flow exceeds the population of its source node
    pub fn new(
        setup_name: &str,
        geodata_file: &Path,
        mobility_file: &Path,
        popnodes_key: &str,
        nodenames_key: &str,
    ) -> Result<Self, SetupError> {
        let (nodenames, popnodes) = read_geodata(geodata_file, popnodes_key, nodenames_key)?;
        debug!(
            "read {} nodes from {}",
            nodenames.len(),
            geodata_file.display()
        );
        let mobility = matrix::load_txt(mobility_file)?;
        Self::from_parts(setup_name, nodenames, popnodes, &mobility)
    }

    /// Builds a validated setup from data already in memory. Performs the same checks as
    /// [`SpatialSetup::new`] after the files have been read.
    ///
    /// # Errors
    /// See [`SpatialSetup::new`].
    pub fn from_parts(
        setup_name: &str,
        nodenames: Vec<String>,
        popnodes: Vec<f64>,
        mobility: &DenseMatrix,
    ) -> Result<Self, SetupError> {
        let nnodes = nodenames.len();
        if popnodes.len() != nnodes {
            return Err(SetupError::ConfigError(format!(
                "{} populations given for {} nodes",
                popnodes.len(),
                nnodes
            )));
        }
        if let Some((i, pop)) = popnodes
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(SetupError::ConfigError(format!(
                "population of '{}' must be a non-negative number, got {pop}",
                nodenames[i]
            )));
        }

        let mut node_index = FxHashMap::default();
        let mut duplicates = Vec::new();
        for (i, name) in nodenames.iter().enumerate() {
            if node_index.insert(name.clone(), i).is_some() && !duplicates.contains(name) {
                duplicates.push(name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(SetupError::ConfigError(format!(
                "There are duplicate nodenames in geodata: {}",
                duplicates.join(", ")
            )));
        }

        if mobility.shape() != (nnodes, nnodes) {
            return Err(SetupError::shape(
                "mobility data",
                (nnodes, nnodes),
                mobility.shape(),
            ));
        }
        if let Some(bad) = mobility.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SetupError::ConfigError(format!(
                "mobility data must be non-negative, found {bad}"
            )));
        }

        let setup = SpatialSetup {
            setup_name: setup_name.to_string(),
            nodenames,
            popnodes,
            mobility: mobility.clone(),
            node_index,
        };
        setup.check_mobility_within_population()?;

        info!(
            "spatial setup '{}': {} nodes, {} non-zero mobility entries",
            setup.setup_name,
            nnodes,
            nonzero_entries(&setup.mobility).count()
        );
        Ok(setup)
    }

    // Every violation is collected so a bad matrix can be fixed in one pass.
    fn check_mobility_within_population(&self) -> Result<(), SetupError> {
        let mut errmsg = String::new();
        for (r, c, v) in find_above(&self.mobility, |row| self.popnodes[row]) {
            let _ = write!(
                errmsg,
                "\n('{}', '{}') = {} > population of '{}' = {}",
                self.nodenames[r], self.nodenames[c], v, self.nodenames[r], self.popnodes[r]
            );
        }
        if errmsg.is_empty() {
            Ok(())
        } else {
            Err(SetupError::ConsistencyError(format!(
                "The following entries in the mobility data exceed the source node populations in geodata:{errmsg}"
            )))
        }
    }

    /// Checks that the mobility matrix is symmetric up to a small relative tolerance. Not called
    /// during construction.
    ///
    /// # Errors
    /// Returns `SetupError::ConsistencyError` listing every asymmetric pair.
    pub fn check_symmetry(&self) -> Result<(), SetupError> {
        let mut errmsg = String::new();
        for (i, j, v) in nonzero_entries(&self.mobility) {
            let transposed = self.mobility[(j, i)];
            let reported_from_other_side = i > j && transposed != 0.0;
            if !reported_from_other_side
                && !approx::relative_eq!(v, transposed, max_relative = SYMMETRY_TOLERANCE)
            {
                let _ = write!(
                    errmsg,
                    "\n('{}', '{}') = {} but ('{}', '{}') = {}",
                    self.nodenames[i],
                    self.nodenames[j],
                    v,
                    self.nodenames[j],
                    self.nodenames[i],
                    transposed
                );
            }
        }
        if errmsg.is_empty() {
            Ok(())
        } else {
            Err(SetupError::ConsistencyError(format!(
                "mobility data is not symmetric:{errmsg}"
            )))
        }
    }

    #[must_use]
    pub fn setup_name(&self) -> &str {
        &self.setup_name
    }

    #[must_use]
    pub fn nnodes(&self) -> usize {
        self.nodenames.len()
    }

    #[must_use]
    pub fn nodenames(&self) -> &[String] {
        &self.nodenames
    }

    #[must_use]
    pub fn popnodes(&self) -> &[f64] {
        &self.popnodes
    }

    #[must_use]
    pub fn mobility(&self) -> &DenseMatrix {
        &self.mobility
    }

    /// Position of the node with geoid `name`.
    #[must_use]
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).copied()
    }
}

fn read_geodata(
    geodata_file: &Path,
    popnodes_key: &str,
    nodenames_key: &str,
) -> Result<(Vec<String>, Vec<f64>), SetupError> {
    let mut reader = csv::Reader::from_path(geodata_file)?;
    let headers = reader.headers()?.clone();
    let column = |key: &str, what: &str| {
        headers.iter().position(|h| h.trim() == key).ok_or_else(|| {
            SetupError::ConfigError(format!(
                "{what}: {key} does not correspond to a column in geodata."
            ))
        })
    };
    let pop_col = column(popnodes_key, "popnodes_key")?;
    let name_col = column(nodenames_key, "nodenames_key")?;

    let mut nodenames = Vec::new();
    let mut popnodes = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let name = record.get(name_col).unwrap_or_default().trim().to_string();
        let pop_text = record.get(pop_col).unwrap_or_default().trim();
        let pop = pop_text.parse::<f64>().map_err(|_| {
            SetupError::ConfigError(format!(
                "invalid population '{pop_text}' in row {} of geodata",
                row + 1
            ))
        })?;
        nodenames.push(name);
        popnodes.push(pop);
    }
    Ok((nodenames, popnodes))
}
