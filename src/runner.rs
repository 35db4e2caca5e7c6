use tracing::{event, span, Level};

use crate::flash::{FlashEngine, FLASH_THRESHOLD};
use crate::grid::PaddedGrid;

/// Number of steps over which flashes are totalled by default.
pub const PART1_STEPS: usize = 100;

/// What happened during one external step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based index of the step.
    pub step: usize,
    pub flashes: usize,
    /// Relaxation rounds that changed the grid.
    pub rounds: usize,
    pub synchronized: bool,
}

/// Answers to the two questions asked of an initial grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    /// Flashes over the flash-count window.
    pub total_flashes: usize,
    /// `None` only when the search gave up at its step limit.
    pub first_synchronized_step: Option<usize>,
}

pub struct Simulation<E> {
    grid: PaddedGrid,
    step: usize,
    total_flashes: usize,
    engine: E,
}

impl<E: FlashEngine> Simulation<E> {
    pub fn new(grid: PaddedGrid, engine: E) -> Simulation<E> {
        Simulation {
            grid,
            step: 0,
            total_flashes: 0,
            engine,
        }
    }

    pub fn grid(&self) -> &PaddedGrid {
        &self.grid
    }

    /// Number of steps taken so far.
    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn total_flashes(&self) -> usize {
        self.total_flashes
    }

    pub fn step(&mut self) -> StepReport {
        self.step_observed(|_, _| ())
    }

    /// Takes one external step, calling `observer` with the round
    /// number and the grid after every relaxation round that changed
    /// something.
    pub fn step_observed<F: FnMut(usize, &PaddedGrid)>(&mut self, mut observer: F) -> StepReport {
        let step = self.step + 1;
        let span = span!(Level::DEBUG, "step", step);
        let _enter = span.enter();

        let mut current = self.grid.increment_interior();
        let mut rounds: usize = 0;
        loop {
            let next = self.engine.relax(&current);
            if next == current {
                break;
            }
            rounds += 1;
            // The previous round's buffer is dropped here.
            current = next;
            event!(
                Level::TRACE,
                "round {}: {} cells at rest",
                rounds,
                current.count_zero_interior()
            );
            observer(rounds, &current);
        }
        debug_assert!(current.interior().iter().all(|energy| *energy <= FLASH_THRESHOLD));

        let flashes = current.count_zero_interior();
        let synchronized = flashes == current.cell_count();
        self.grid = current;
        self.step = step;
        self.total_flashes += flashes;
        event!(
            Level::DEBUG,
            "step {}: {} flashes in {} rounds",
            step,
            flashes,
            rounds
        );
        StepReport {
            step,
            flashes,
            rounds,
            synchronized,
        }
    }

    /// Takes `steps` steps and returns the number of flashes in them.
    pub fn run(&mut self, steps: usize) -> usize {
        (0..steps).map(|_| self.step().flashes).sum()
    }

    /// Steps until every cell flashes in the same step, and returns
    /// that step's index.  Gives up (returning `None`) once the step
    /// index reaches `limit`.
    pub fn run_until_synchronized(&mut self, limit: Option<usize>) -> Option<usize> {
        loop {
            if let Some(limit) = limit {
                if self.step >= limit {
                    return None;
                }
            }
            let report = self.step();
            if report.synchronized {
                return Some(report.step);
            }
        }
    }
}

/// Totals the flashes in the first `flash_window` steps and finds the
/// first synchronized step, which may fall inside the window.
/// `on_step` sees every step's report and resulting grid.
pub fn run_queries<E, F>(
    grid: PaddedGrid,
    engine: E,
    flash_window: usize,
    limit: Option<usize>,
    mut on_step: F,
) -> Summary
where
    E: FlashEngine,
    F: FnMut(&StepReport, &PaddedGrid),
{
    let mut sim = Simulation::new(grid, engine);
    let mut total_flashes: usize = 0;
    let mut first_synchronized_step: Option<usize> = None;
    loop {
        if sim.step_index() >= flash_window {
            if first_synchronized_step.is_some() {
                break;
            }
            if let Some(limit) = limit {
                if sim.step_index() >= limit {
                    event!(
                        Level::INFO,
                        "no synchronized step within {} steps",
                        limit
                    );
                    break;
                }
            }
        }
        let report = sim.step();
        if report.step <= flash_window {
            total_flashes += report.flashes;
        }
        if report.synchronized && first_synchronized_step.is_none() {
            event!(
                Level::INFO,
                "every cell flashed at step {}",
                report.step
            );
            first_synchronized_step = Some(report.step);
        }
        on_step(&report, sim.grid());
    }
    Summary {
        total_flashes,
        first_synchronized_step,
    }
}

#[cfg(test)]
use crate::flash::{Parallel, Sequential};

#[cfg(test)]
fn padded(lines: &[&str]) -> PaddedGrid {
    crate::grid::parse_grid(&lines.join("\n"))
        .expect("valid test data")
        .pad()
}

#[cfg(test)]
const BENCHMARK: [&str; 10] = [
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
];

#[cfg(test)]
fn border_is_zero(grid: &PaddedGrid) -> bool {
    let nonzero = |view: ndarray::ArrayView2<u8>| view.iter().filter(|e| **e != 0).count();
    nonzero(grid.cells()) == nonzero(grid.interior())
}

#[cfg(test)]
fn quiet_queries<E: FlashEngine>(grid: PaddedGrid, engine: E) -> Summary {
    run_queries(grid, engine, PART1_STEPS, None, |_, _| ())
}

#[test]
fn test_small_cascade() {
    let mut sim = Simulation::new(
        padded(&["11111", "19991", "19191", "19991", "11111"]),
        Sequential,
    );
    let report = sim.step();
    assert_eq!(
        report,
        StepReport {
            step: 1,
            flashes: 9,
            rounds: 2,
            synchronized: false,
        }
    );
    assert_eq!(
        sim.grid(),
        &padded(&["34543", "40004", "50005", "40004", "34543"])
    );

    let report = sim.step();
    assert_eq!(report.flashes, 0);
    assert_eq!(report.rounds, 0);
    assert_eq!(
        sim.grid(),
        &padded(&["45654", "51115", "61116", "51115", "45654"])
    );
    assert_eq!(sim.step_index(), 2);
    assert_eq!(sim.total_flashes(), 9);
}

#[test]
fn test_benchmark_first_steps() {
    let mut sim = Simulation::new(padded(&BENCHMARK), Sequential);
    assert_eq!(sim.step().flashes, 0);
    assert_eq!(
        sim.grid(),
        &padded(&[
            "6594254334",
            "3856965822",
            "6375667284",
            "7252447257",
            "7468496589",
            "5278635756",
            "3287952832",
            "7993992245",
            "5957959665",
            "6394862637",
        ])
    );
    assert_eq!(sim.step().flashes, 35);
    assert_eq!(
        sim.grid(),
        &padded(&[
            "8807476555",
            "5089087054",
            "8597889608",
            "8485769600",
            "8700908800",
            "6600088989",
            "6800005943",
            "0000007456",
            "9000000876",
            "8700006848",
        ])
    );
    assert_eq!(sim.run(8), 204 - 35);
    assert_eq!(sim.total_flashes(), 204);
}

#[test]
fn test_benchmark_queries() {
    let expected = Summary {
        total_flashes: 1656,
        first_synchronized_step: Some(195),
    };
    assert_eq!(quiet_queries(padded(&BENCHMARK), Sequential), expected);
    assert_eq!(quiet_queries(padded(&BENCHMARK), Parallel), expected);
}

#[test]
fn test_run_until_synchronized() {
    let mut sim = Simulation::new(padded(&BENCHMARK), Sequential);
    assert_eq!(sim.run_until_synchronized(Some(100)), None);
    assert_eq!(sim.step_index(), 100);
    assert_eq!(sim.total_flashes(), 1656);
    assert_eq!(sim.run_until_synchronized(None), Some(195));
    assert!(sim.grid().all_interior_zero());
}

#[test]
fn test_synchronized_inside_window() {
    // Every cell flashes on the first step, and then again every
    // tenth step.
    let summary = quiet_queries(padded(&["999", "999", "999"]), Sequential);
    assert_eq!(
        summary,
        Summary {
            total_flashes: 10 * 9,
            first_synchronized_step: Some(1),
        }
    );

    let summary = quiet_queries(padded(&["00", "00"]), Sequential);
    assert_eq!(
        summary,
        Summary {
            total_flashes: 10 * 4,
            first_synchronized_step: Some(10),
        }
    );
}

#[test]
fn test_synchronized_with_empty_window() {
    let summary = run_queries(padded(&BENCHMARK), Sequential, 0, None, |_, _| ());
    assert_eq!(
        summary,
        Summary {
            total_flashes: 0,
            first_synchronized_step: Some(195),
        }
    );
}

#[test]
fn test_query_limit() {
    let mut steps_seen = 0;
    let summary = run_queries(padded(&BENCHMARK), Sequential, 10, Some(50), |report, _| {
        steps_seen = report.step;
    });
    assert_eq!(
        summary,
        Summary {
            total_flashes: 204,
            first_synchronized_step: None,
        }
    );
    assert_eq!(steps_seen, 50);
}

#[test]
fn test_step_invariants() {
    let mut sim = Simulation::new(padded(&BENCHMARK), Sequential);
    let cells = sim.grid().cell_count();
    for _ in 0..200 {
        // Number of times each cell went from flashing to flashed.
        let mut flashed = vec![0usize; cells];
        let mut previous = sim.grid().increment_interior();
        let report = sim.step_observed(|round, grid| {
            assert!(round <= cells);
            assert!(border_is_zero(grid));
            let (before_view, after_view) = (previous.interior(), grid.interior());
            let pairs = before_view.iter().zip(after_view.iter());
            for (i, (before, after)) in pairs.enumerate() {
                if *before == 0 {
                    assert_eq!(*after, 0, "a flashed cell changed");
                }
                if *before > 9 {
                    assert_eq!(*after, 0, "a flashing cell did not reset");
                    flashed[i] += 1;
                }
            }
            previous = grid.clone();
        });
        assert!(report.rounds <= cells);
        assert!(flashed.iter().all(|n| *n <= 1));
        assert_eq!(flashed.iter().sum::<usize>(), report.flashes);
        assert!(sim.grid().interior().iter().all(|e| *e <= 9));
        assert!(border_is_zero(sim.grid()));
    }
}

#[test]
fn test_closure_engine_drives_simulation() {
    let engine = |grid: &PaddedGrid| Sequential.relax(grid);
    assert_eq!(
        quiet_queries(padded(&BENCHMARK), engine),
        Summary {
            total_flashes: 1656,
            first_synchronized_step: Some(195),
        }
    );
}
