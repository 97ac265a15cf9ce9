//! `trialbench scan` — inspect a stimulus directory.

use std::path::Path;

use trialbench_core::stimulus::MidLetter;
use trialbench_core::{Candidate, scan_dir};

/// Run the scan command.
pub fn run(stimuli: &str, items: usize) {
    let candidates = match scan_dir(Path::new(stimuli)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to scan {stimuli}: {e}");
            std::process::exit(1);
        }
    };

    if candidates.is_empty() {
        println!("No classifiable stimuli found in {stimuli}/");
        println!("Expected .png files named after U/N nonwords, e.g. BRUKT.png");
        return;
    }

    println!("Found {} classifiable stimulus file(s):\n", candidates.len());
    for mid in [MidLetter::U, MidLetter::N] {
        let group: Vec<&Candidate> = candidates.iter().filter(|c| c.mid == mid).collect();
        println!("  mid letter {mid}: {} candidate(s)", group.len());
        for chunk in group.chunks(8) {
            let row: Vec<&str> = chunk.iter().map(|c| c.id.as_str()).collect();
            println!("    {}", row.join("  "));
        }
    }

    println!();
    report_viability(&candidates, items);
}

/// Check whether a balanced pool of `items` stimuli is constructible.
fn report_viability(candidates: &[Candidate], items: usize) {
    if items == 0 || items % 4 != 0 {
        println!("Pool size {items} is not divisible by 4; cannot balance conditions.");
        return;
    }
    let per_mid = items / 2;

    let mut viable = true;
    for mid in [MidLetter::U, MidLetter::N] {
        let found = candidates.iter().filter(|c| c.mid == mid).count();
        if found < per_mid {
            println!("Need {per_mid} mid-letter-{mid} candidates for {items} items, found {found}.");
            viable = false;
        }
    }

    if viable {
        println!("A balanced {items}-item pool ({} per condition cell) is constructible.", items / 4);
    }
}
