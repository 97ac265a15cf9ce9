//! Stimulus corpus loading and balanced pool construction.
//!
//! Two loaders exist: a directory scan over rendered stimulus images
//! (`<NONWORD>.png`, id taken from the file stem) and a plain CSV read
//! (`nonwords` column). Both produce [`Candidate`] lists that
//! [`build_balanced_pool`] turns into a session pool with equal counts per
//! `mid-letter x label` cell.
//!
//! The scheduler itself never touches the filesystem — this module is the
//! loading collaborator that feeds it.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::stimulus::{Label, MidLetter, StimulusItem, TrialPool};

/// Errors from corpus loading and pool construction.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("stimulus pool is empty")]
    Empty,

    #[error("duplicate stimulus id `{0}`")]
    DuplicateId(String),

    #[error("pool size {0} does not divide evenly across mid-letter x label cells")]
    UnevenSplit(usize),

    #[error("not enough mid-letter {mid} candidates: need {need}, found {found}")]
    UnderSupplied {
        mid: MidLetter,
        need: usize,
        found: usize,
    },

    #[error("corpus file `{path}` has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),
}

/// A loadable stimulus not yet assigned to a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub asset: PathBuf,
    pub mid: MidLetter,
}

/// Scan a directory of rendered stimulus images.
///
/// Accepts `.png` files whose stem classifies as a U/N nonword; everything
/// else (hidden files, other extensions, unclassifiable stems) is skipped.
/// Results are sorted by id so the scan is deterministic across platforms.
pub fn scan_dir(dir: &Path) -> Result<Vec<Candidate>, PoolError> {
    let mut candidates = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with("._") {
            continue;
        }
        if let Some(mid) = MidLetter::of(stem) {
            candidates.push(Candidate {
                id: stem.to_string(),
                asset: path.clone(),
                mid,
            });
        }
    }

    candidates.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(candidates)
}

/// Read nonword tokens from a CSV file with a `nonwords` column.
///
/// Assets are resolved as `<asset_dir>/<NONWORD>.png`; rows whose token does
/// not classify as a U/N nonword are skipped.
pub fn read_nonwords_csv(path: &Path, asset_dir: &Path) -> Result<Vec<Candidate>, PoolError> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = contents.lines();

    let header = lines.next().ok_or_else(|| PoolError::MissingColumn {
        path: path.to_path_buf(),
        column: "nonwords",
    })?;
    let column = header
        .split(',')
        .position(|field| field.trim() == "nonwords")
        .ok_or_else(|| PoolError::MissingColumn {
            path: path.to_path_buf(),
            column: "nonwords",
        })?;

    let mut candidates = Vec::new();
    for line in lines {
        let Some(token) = line.split(',').nth(column).map(str::trim) else {
            continue;
        };
        if token.is_empty() {
            continue;
        }
        if let Some(mid) = MidLetter::of(token) {
            candidates.push(Candidate {
                id: token.to_string(),
                asset: asset_dir.join(format!("{token}.png")),
                mid,
            });
        }
    }

    Ok(candidates)
}

/// Build a balanced session pool of `n_items` stimuli.
///
/// `n_items` must split evenly into the four `mid-letter x label` cells.
/// Candidates are shuffled within each mid-letter group, the first halves
/// assigned to `self` and `other`, and the resulting pool shuffled so that
/// neither load order nor cell assignment is predictable.
pub fn build_balanced_pool<R: Rng + ?Sized>(
    candidates: &[Candidate],
    n_items: usize,
    rng: &mut R,
) -> Result<TrialPool, PoolError> {
    if n_items == 0 || n_items % 4 != 0 {
        return Err(PoolError::UnevenSplit(n_items));
    }
    let per_cell = n_items / 4;

    let mut items = Vec::with_capacity(n_items);
    for mid in [MidLetter::U, MidLetter::N] {
        let mut group: Vec<&Candidate> = candidates.iter().filter(|c| c.mid == mid).collect();
        if group.len() < per_cell * 2 {
            return Err(PoolError::UnderSupplied {
                mid,
                need: per_cell * 2,
                found: group.len(),
            });
        }
        group.shuffle(rng);
        for (i, candidate) in group.iter().take(per_cell * 2).enumerate() {
            let label = if i < per_cell { Label::Self_ } else { Label::Other };
            items.push(StimulusItem::new(
                candidate.id.clone(),
                label,
                candidate.asset.clone(),
            ));
        }
    }

    items.shuffle(rng);
    TrialPool::new(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Write;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            asset: PathBuf::from(format!("{id}.png")),
            mid: MidLetter::of(id).unwrap(),
        }
    }

    fn corpus() -> Vec<Candidate> {
        // Four of each mid letter.
        ["BRUKT", "FLUSP", "GRUTZ", "KLUMB", "BANTE", "FINZO", "GONTA", "KENLO"]
            .iter()
            .map(|id| candidate(id))
            .collect()
    }

    #[test]
    fn balanced_pool_has_equal_cells() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = build_balanced_pool(&corpus(), 8, &mut rng).unwrap();
        assert_eq!(pool.len(), 8);

        for mid in [MidLetter::U, MidLetter::N] {
            for label in [Label::Self_, Label::Other] {
                let count = pool
                    .items()
                    .iter()
                    .filter(|item| item.mid_letter() == Some(mid) && item.label == label)
                    .count();
                assert_eq!(count, 2, "cell {mid}/{label} has {count} items");
            }
        }
    }

    #[test]
    fn balanced_pool_rejects_uneven_sizes() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            build_balanced_pool(&corpus(), 6, &mut rng),
            Err(PoolError::UnevenSplit(6))
        ));
        assert!(matches!(
            build_balanced_pool(&corpus(), 0, &mut rng),
            Err(PoolError::UnevenSplit(0))
        ));
    }

    #[test]
    fn balanced_pool_reports_undersupplied_cell() {
        let mut rng = StdRng::seed_from_u64(3);
        let thin: Vec<Candidate> = corpus()
            .into_iter()
            .filter(|c| c.mid == MidLetter::U)
            .collect();
        match build_balanced_pool(&thin, 8, &mut rng) {
            Err(PoolError::UnderSupplied { mid, need, found }) => {
                assert_eq!(mid, MidLetter::N);
                assert_eq!(need, 4);
                assert_eq!(found, 0);
            }
            other => panic!("expected UnderSupplied, got {other:?}"),
        }
    }

    #[test]
    fn scan_dir_finds_classifiable_pngs() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["BRUKT.png", "BANTE.png", "readme.txt", "ABCDE.png"] {
            std::fs::File::create(tmp.path().join(name)).unwrap();
        }

        let candidates = scan_dir(tmp.path()).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        // Sorted, pngs only, U/N mid letters only.
        assert_eq!(ids, vec!["BANTE", "BRUKT"]);
    }

    #[test]
    fn read_nonwords_csv_resolves_assets() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("nonwords.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "index,nonwords").unwrap();
        writeln!(f, "0,BRUKT").unwrap();
        writeln!(f, "1,BANTE").unwrap();
        writeln!(f, "2,ABCDE").unwrap();

        let candidates = read_nonwords_csv(&csv_path, Path::new("stimuli")).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "BRUKT");
        assert_eq!(candidates[0].asset, Path::new("stimuli/BRUKT.png"));
    }

    #[test]
    fn read_nonwords_csv_requires_column() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("bad.csv");
        std::fs::write(&csv_path, "index,words\n0,BRUKT\n").unwrap();

        assert!(matches!(
            read_nonwords_csv(&csv_path, Path::new(".")),
            Err(PoolError::MissingColumn { .. })
        ));
    }
}
