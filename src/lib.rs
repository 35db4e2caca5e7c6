//! Simulation of a grid of energy cells which flash, and set off
//! their neighbours, when their energy rises above 9.

pub mod error;
pub mod flash;
pub mod grid;
pub mod runner;

pub use error::{LoadError, ParseError};
pub use flash::{FlashEngine, Parallel, Sequential, FLASH_THRESHOLD};
pub use grid::{load_grid, parse_grid, Grid, PaddedGrid};
pub use runner::{run_queries, Simulation, StepReport, Summary, PART1_STEPS};
