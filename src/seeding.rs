//! Importation ("seeding") schedules: infections introduced from outside the network on given
//! days in given nodes.
//!
//! The schedule is a `(t_span + 1, nnodes)` matrix indexed by `[days since ti][node index]`.
//! Two methods are supported, chosen by the `method` key of the seeding configuration:
//!
//! * `PoissonDistributed` reads `lambda_file`, a CSV of `place,date,amount`, and draws a Poisson
//!   count with mean `amount` for each row. Every replicate gets a fresh draw.
//! * `FolderDraw` picks one of the `importation_<n>.csv` files in `folder_path` by replicate
//!   index and copies its amounts verbatim. Replicates `k` and `k + N` read the same file.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use rand::distr::Distribution;
use rand::Rng;
use rand_distr::Poisson;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::config::Config;
use crate::error::SetupError;
use crate::matrix::DenseMatrix;
use crate::setup::{parse_date, SimulationSetup};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeedingMethod {
    PoissonDistributed { lambda_file: PathBuf },
    FolderDraw { folder_path: PathBuf },
}

impl SeedingMethod {
    /// Reads the method and its file or folder from a seeding configuration section.
    ///
    /// # Errors
    /// Returns `SetupError::UnsupportedMethod` for an unknown method and
    /// `SetupError::ConfigError` if a required key is missing.
    pub fn from_config(seeding_config: &Config) -> Result<Self, SetupError> {
        let method = seeding_config.get_string("method")?;
        match method.as_str() {
            "PoissonDistributed" => Ok(SeedingMethod::PoissonDistributed {
                lambda_file: PathBuf::from(seeding_config.get_string("lambda_file")?),
            }),
            "FolderDraw" => Ok(SeedingMethod::FolderDraw {
                folder_path: PathBuf::from(seeding_config.get_string("folder_path")?),
            }),
            _ => Err(SetupError::UnsupportedMethod(method)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeedingRecord {
    place: String,
    date: String,
    amount: f64,
}

/// A seeding row resolved against the setup. `row` is the 1-based data row of the source file.
struct SeedingRow {
    row: usize,
    node: usize,
    day: usize,
    amount: f64,
}

fn read_records(path: &Path) -> Result<Vec<SeedingRecord>, SetupError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<SeedingRecord>, _>>()?;
    debug!("read {} seeding rows from {}", records.len(), path.display());
    Ok(records)
}

fn resolve(
    setup: &SimulationSetup,
    records: &[SeedingRecord],
    source: &str,
) -> Result<Vec<SeedingRow>, SetupError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let row = i + 1;
            let place = record.place.trim();
            let node = setup.spatset().node_index(place).ok_or_else(|| {
                SetupError::LookupError(format!(
                    "Invalid place '{place}' in row {row} of {source}. Not found in geodata."
                ))
            })?;
            let date = parse_date(&record.date, source)?;
            let day = setup.day_offset(date).ok_or_else(|| {
                SetupError::LookupError(format!(
                    "date {date} in row {row} of {source} is outside the simulation ({} to {})",
                    setup.ti(),
                    setup.tf()
                ))
            })?;
            if !(record.amount.is_finite() && record.amount >= 0.0) {
                return Err(SetupError::ConfigError(format!(
                    "amount in row {row} of {source} must be a non-negative number, got {}",
                    record.amount
                )));
            }
            Ok(SeedingRow {
                row,
                node,
                day,
                amount: record.amount,
            })
        })
        .collect()
}

// Reports every row that shares its (node, day) with another, first occurrences included.
// Rows are compared after resolution so two spellings of one date still collide.
fn check_repeated_place_dates(rows: &[SeedingRow], source: &str) -> Result<(), SetupError> {
    let mut rows_by_key: FxHashMap<(usize, usize), Vec<usize>> = FxHashMap::default();
    for row in rows {
        rows_by_key.entry((row.node, row.day)).or_default().push(row.row);
    }
    let mut repeated: Vec<usize> = rows_by_key
        .into_values()
        .filter(|rows| rows.len() > 1)
        .flatten()
        .collect();
    if repeated.is_empty() {
        return Ok(());
    }
    repeated.sort_unstable();
    Err(SetupError::ConfigError(format!(
        "Repeated place-date in rows {repeated:?} of {source}."
    )))
}

fn empty_schedule(setup: &SimulationSetup) -> DenseMatrix {
    DenseMatrix::zeros(setup.t_span() + 1, setup.nnodes())
}

fn poisson_distributed<R: Rng + ?Sized>(
    setup: &SimulationSetup,
    lambda_file: &Path,
    rng: &mut R,
) -> Result<DenseMatrix, SetupError> {
    const SOURCE: &str = "seeding::lambda_file";
    let records = read_records(lambda_file)?;
    let rows = resolve(setup, &records, SOURCE)?;
    check_repeated_place_dates(&rows, SOURCE)?;

    let mut importation = empty_schedule(setup);
    for row in rows {
        let count = if row.amount == 0.0 {
            0.0
        } else {
            Poisson::new(row.amount)
                .map_err(|e| {
                    SetupError::ConfigError(format!(
                        "invalid amount {} in row {} of {SOURCE}: {e}",
                        row.amount, row.row
                    ))
                })?
                .sample(rng)
        };
        trace!(
            "row {}: node {} day {} mean {} drew {}",
            row.row,
            row.node,
            row.day,
            row.amount,
            count
        );
        importation[(row.day, row.node)] = count;
    }
    Ok(importation)
}

/// The file a `FolderDraw` replicate reads: `importation_<(replicate_id mod N) + 1>.csv`, where
/// `N` is the number of entries in the folder.
///
/// # Errors
/// Returns an I/O error if the folder cannot be listed and `SetupError::ConfigError` if it is
/// empty.
pub fn folder_draw_file(folder_path: &Path, replicate_id: usize) -> Result<PathBuf, SetupError> {
    let nfiles = fs::read_dir(folder_path)?.count();
    if nfiles == 0 {
        return Err(SetupError::ConfigError(format!(
            "seeding folder {} is empty",
            folder_path.display()
        )));
    }
    let nfile = replicate_id % nfiles + 1;
    Ok(folder_path.join(format!("importation_{nfile}.csv")))
}

fn folder_draw(
    setup: &SimulationSetup,
    folder_path: &Path,
    replicate_id: usize,
) -> Result<DenseMatrix, SetupError> {
    let path = folder_draw_file(folder_path, replicate_id)?;
    let source = path.display().to_string();
    let records = read_records(&path)?;
    let rows = resolve(setup, &records, &source)?;

    let mut importation = empty_schedule(setup);
    for row in rows {
        importation[(row.day, row.node)] = row.amount;
    }
    Ok(importation)
}

/// Builds the importation schedule for one replicate.
///
/// # Errors
/// - `SetupError::UnsupportedMethod` for an unknown `method`
/// - `SetupError::ConfigError` for missing keys, repeated (place, date) pairs, or bad amounts
/// - `SetupError::LookupError` for a place not in the node set or a date outside the simulation
/// - I/O, CSV and parse errors from the input files
pub fn seeding_draw<R: Rng + ?Sized>(
    setup: &SimulationSetup,
    seeding_config: &Config,
    replicate_id: usize,
    rng: &mut R,
) -> Result<DenseMatrix, SetupError> {
    let importation = match SeedingMethod::from_config(seeding_config)? {
        SeedingMethod::PoissonDistributed { lambda_file } => {
            poisson_distributed(setup, &lambda_file, rng)?
        }
        SeedingMethod::FolderDraw { folder_path } => {
            folder_draw(setup, &folder_path, replicate_id)?
        }
    };
    debug!(
        "replicate {replicate_id}: {} imported infections scheduled",
        importation.sum()
    );
    Ok(importation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::rngs::SmallRng;
    use crate::rand::SeedableRng;
    use crate::setup::tests::setup_with;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn poisson_config(dir: &TempDir, lambda: &str) -> Config {
        let path = dir.path().join("lambda.csv");
        fs::write(&path, lambda).unwrap();
        Config::from_json_str(&format!(
            r#"{{ "method": "PoissonDistributed", "lambda_file": {:?} }}"#,
            path.to_str().unwrap()
        ))
        .unwrap()
    }

    fn folder_config(dir: &TempDir, files: &[&str]) -> Config {
        let folder = dir.path().join("importation");
        fs::create_dir(&folder).unwrap();
        for (i, contents) in files.iter().enumerate() {
            fs::write(folder.join(format!("importation_{}.csv", i + 1)), contents).unwrap();
        }
        Config::from_json_str(&format!(
            r#"{{ "method": "FolderDraw", "folder_path": {:?} }}"#,
            folder.to_str().unwrap()
        ))
        .unwrap()
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = Config::from_json_str(r#"{ "method": "Magic" }"#).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedMethod(ref m) if m == "Magic"));
    }

    #[test]
    fn poisson_places_draws_by_day_and_node() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(
            &dir,
            "place,date,amount\n01003,2020-01-03,50\n01005,2020-01-11,0\n01001,2020-01-01,5\n",
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let schedule = seeding_draw(&setup, &config, 0, &mut rng).unwrap();
        assert_eq!(schedule.shape(), (11, 3));
        assert!(schedule[(2, 1)] > 0.0);
        assert_eq!(schedule[(10, 2)], 0.0);
        let nonzero = schedule.iter().filter(|v| **v != 0.0).count();
        assert!(nonzero <= 2);
        assert!(schedule.iter().all(|v| *v >= 0.0 && v.fract() == 0.0));
    }

    #[test]
    fn poisson_is_reproducible_with_the_same_generator_seed() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(&dir, "place,date,amount\n01003,2020-01-03,50\n");
        let a = seeding_draw(&setup, &config, 0, &mut SmallRng::seed_from_u64(9)).unwrap();
        let b = seeding_draw(&setup, &config, 0, &mut SmallRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_place_date_names_both_rows() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(
            &dir,
            "place,date,amount\n01001,2020-01-02,1\n01003,2020-01-02,1\n01001,2020-01-02,4\n",
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        match err {
            SetupError::ConfigError(msg) => assert!(msg.contains("rows [1, 3]")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn repeated_place_date_is_found_across_date_spellings() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(
            &dir,
            "place,date,amount\n01001,2020-01-02,5\n 01001 ,2020-1-2,5\n",
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        match err {
            SetupError::ConfigError(msg) => assert!(msg.contains("rows [1, 2]")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_place_is_lookup_error() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(&dir, "place,date,amount\n01001,2020-01-02,1\n99999,2020-01-02,1\n");
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        match err {
            SetupError::LookupError(msg) => {
                assert!(msg.contains("'99999'"));
                assert!(msg.contains("row 2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn date_outside_simulation_is_lookup_error() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(&dir, "place,date,amount\n01001,2020-01-12,1\n");
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        assert!(matches!(err, SetupError::LookupError(_)));
    }

    #[test]
    fn negative_amount_is_config_error() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = poisson_config(&dir, "place,date,amount\n01001,2020-01-02,-3\n");
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        assert!(matches!(err, SetupError::ConfigError(_)));
    }

    #[test]
    fn folder_draw_copies_amounts() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = folder_config(
            &dir,
            &["place,date,amount\n01001,2020-01-02,3\n01005,2020-01-05,2.5\n"],
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let schedule = seeding_draw(&setup, &config, 0, &mut rng).unwrap();
        assert_eq!(schedule[(1, 0)], 3.0);
        assert_eq!(schedule[(4, 2)], 2.5);
        assert_eq!(schedule.sum(), 5.5);
    }

    #[test]
    fn folder_draw_cycles_through_files() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = folder_config(
            &dir,
            &[
                "place,date,amount\n01001,2020-01-02,1\n",
                "place,date,amount\n01003,2020-01-03,2\n",
                "place,date,amount\n01005,2020-01-04,3\n",
            ],
        );
        let mut rng = SmallRng::seed_from_u64(42);
        for replicate in 0..3 {
            let a = seeding_draw(&setup, &config, replicate, &mut rng).unwrap();
            let b = seeding_draw(&setup, &config, replicate + 3, &mut rng).unwrap();
            assert_eq!(a, b);
        }
        let first = seeding_draw(&setup, &config, 0, &mut rng).unwrap();
        let second = seeding_draw(&setup, &config, 1, &mut rng).unwrap();
        assert_ne!(first, second);
        assert_eq!(second[(2, 1)], 2.0);
    }

    #[test]
    fn folder_draw_file_names() {
        let dir = tempdir().unwrap();
        for i in 1..=4 {
            fs::write(dir.path().join(format!("importation_{i}.csv")), "").unwrap();
        }
        assert_eq!(
            folder_draw_file(dir.path(), 0).unwrap(),
            dir.path().join("importation_1.csv")
        );
        assert_eq!(
            folder_draw_file(dir.path(), 7).unwrap(),
            dir.path().join("importation_4.csv")
        );
        let empty = tempdir().unwrap();
        assert!(folder_draw_file(empty.path(), 0).is_err());
    }

    #[test]
    fn folder_draw_rejects_unknown_place() {
        let dir = tempdir().unwrap();
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0);
        let config = folder_config(&dir, &["place,date,amount\nnowhere,2020-01-02,1\n"]);
        let mut rng = SmallRng::seed_from_u64(42);
        let err = seeding_draw(&setup, &config, 0, &mut rng).unwrap_err();
        assert!(matches!(err, SetupError::LookupError(_)));
    }
}
