//! One relaxation round of the flash cascade.
//!
//! A round maps a grid `G` to a new grid `G'`.  Every interior cell
//! of `G'` is computed from `G` alone, so the order in which cells are
//! visited (or the number of threads visiting them) cannot change the
//! result.  Repeating rounds until the grid stops changing resolves a
//! whole chain reaction.

use ndarray::prelude::*;
use ndarray::Zip;

use crate::grid::PaddedGrid;

/// A cell whose energy is above this value flashes.
pub const FLASH_THRESHOLD: u8 = 9;

/// Computes a single relaxation round.
pub trait FlashEngine {
    fn relax(&self, grid: &PaddedGrid) -> PaddedGrid;
}

impl<F> FlashEngine for F
where
    F: Fn(&PaddedGrid) -> PaddedGrid,
{
    fn relax(&self, grid: &PaddedGrid) -> PaddedGrid {
        self(grid)
    }
}

/// Evaluates the round on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

/// Evaluates the round on rayon's thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct Parallel;

fn is_flashing(energy: u8) -> bool {
    energy > FLASH_THRESHOLD
}

/// New energy of the cell at the centre of `neighbourhood`.
fn next_energy(energy: u8, neighbourhood: ArrayView2<u8>) -> u8 {
    match energy {
        // Already flashed during this step.
        0 => 0,
        e if is_flashing(e) => 0,
        e => {
            // The centre is not flashing, so counting all nine cells
            // counts exactly the flashing neighbours.  Border cells
            // are zero and never count.
            let flashing = neighbourhood.iter().filter(|n| is_flashing(**n)).count();
            // At most eight neighbours, so this fits comfortably.
            e + flashing as u8
        }
    }
}

impl FlashEngine for Sequential {
    fn relax(&self, grid: &PaddedGrid) -> PaddedGrid {
        let interior = Zip::from(grid.interior())
            .and(grid.neighbourhoods())
            .map_collect(|energy, neighbourhood| next_energy(*energy, neighbourhood));
        PaddedGrid::from_interior(interior)
    }
}

impl FlashEngine for Parallel {
    fn relax(&self, grid: &PaddedGrid) -> PaddedGrid {
        let interior = Zip::from(grid.interior())
            .and(grid.neighbourhoods())
            .par_map_collect(|energy, neighbourhood| next_energy(*energy, neighbourhood));
        PaddedGrid::from_interior(interior)
    }
}

#[cfg(test)]
fn padded(lines: &[&str]) -> PaddedGrid {
    crate::grid::parse_grid(&lines.join("\n"))
        .expect("valid test data")
        .pad()
}

#[cfg(test)]
fn padded_interior(interior: Array2<u8>) -> PaddedGrid {
    PaddedGrid::from_interior(interior)
}

#[test]
fn test_next_energy() {
    let quiet = Array2::<u8>::zeros((3, 3));
    assert_eq!(next_energy(0, quiet.view()), 0);
    assert_eq!(next_energy(5, quiet.view()), 5);
    assert_eq!(next_energy(10, quiet.view()), 0);

    let mut busy = Array2::<u8>::from_elem((3, 3), 10);
    busy[(1, 1)] = 4;
    assert_eq!(next_energy(4, busy.view()), 12);
    // A flashed cell ignores its neighbours.
    busy[(1, 1)] = 0;
    assert_eq!(next_energy(0, busy.view()), 0);
}

#[test]
fn test_relax_single_flash() {
    let before = padded_interior(array![[1, 1, 1], [1, 10, 1], [1, 1, 1]]);
    let after = Sequential.relax(&before);
    assert_eq!(after.interior(), array![[2u8, 2, 2], [2, 0, 2], [2, 2, 2]]);
    // Nothing is flashing any more, so the next round changes nothing.
    assert_eq!(Sequential.relax(&after), after);
}

#[test]
fn test_relax_reads_only_the_previous_grid() {
    // The middle cell reaches 10 in this round, but it must not push
    // its own neighbours until the next round.
    let before = padded_interior(array![[10, 9, 1]]);
    let after = Sequential.relax(&before);
    assert_eq!(after.interior(), array![[0u8, 10, 1]]);
    let after = Sequential.relax(&after);
    assert_eq!(after.interior(), array![[0u8, 0, 2]]);
    assert_eq!(Sequential.relax(&after), after);
}

#[test]
fn test_relax_counts_each_neighbour_once() {
    let before = padded_interior(array![[11, 17], [10, 3]]);
    let after = Sequential.relax(&before);
    assert_eq!(after.interior(), array![[0u8, 0], [0, 6]]);
}

#[test]
fn test_relax_corners_ignore_border() {
    // Corner and edge cells have border cells as neighbours; the
    // border is zero and contributes nothing.
    let grid = padded(&["9", "9"]);
    assert_eq!(Sequential.relax(&grid), grid);
    let single = padded_interior(array![[10]]);
    let after = Sequential.relax(&single);
    assert_eq!(after.interior(), array![[0u8]]);
    assert_eq!(after.cells().sum(), 0);
}

#[test]
fn test_relax_keeps_border_zero() {
    let grid = padded_interior(Array2::from_elem((4, 5), 10));
    let after = Sequential.relax(&grid);
    assert_eq!(after.cells().iter().filter(|e| **e != 0).count(), 0);
}

#[test]
fn test_relax_converged_grid_is_fixed_point() {
    let grid = padded(&["5483143223", "2745854711", "5264556173", "6141336146"]);
    assert_eq!(Sequential.relax(&grid), grid);
    assert_eq!(Parallel.relax(&grid), grid);
}

#[test]
fn test_parallel_matches_sequential() {
    let mut grid = padded(&[
        "5483143223",
        "2745854711",
        "5264556173",
        "6141336146",
        "6357385478",
        "4167524645",
        "2176841721",
        "6882881134",
        "4846848554",
        "5283751526",
    ]);
    for _ in 0..30 {
        let mut round = grid.increment_interior();
        loop {
            let sequential = Sequential.relax(&round);
            let parallel = Parallel.relax(&round);
            assert_eq!(sequential, parallel);
            if sequential == round {
                break;
            }
            round = sequential;
        }
        grid = round;
    }
}

#[test]
fn test_closure_engine() {
    let identity = |grid: &PaddedGrid| grid.clone();
    let grid = padded(&["12", "34"]);
    assert_eq!(identity.relax(&grid), grid);
}
