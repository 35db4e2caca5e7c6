use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use dumbo::{
    load_grid, run_queries, FlashEngine, PaddedGrid, Parallel, Sequential, StepReport, Summary,
    PART1_STEPS,
};

/// Counts the flashes of a grid of energy cells, and finds the first
/// step at which they all flash together.
#[derive(Parser, Debug)]
struct Args {
    /// File containing the initial energies, one row of digits per
    /// line ("-" reads standard input).
    input: PathBuf,

    /// Number of steps over which flashes are counted.
    #[arg(long, default_value_t = PART1_STEPS)]
    steps: usize,

    /// Spread each relaxation round across worker threads.
    #[arg(long)]
    parallel: bool,

    /// Stop looking for a synchronized flash after this many steps.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Print the grid after every step.
    #[arg(long)]
    show_steps: bool,
}

fn init_logging() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Ok(layer) => layer,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn simulate<E, W>(grid: PaddedGrid, engine: E, args: &Args, out: &mut W) -> io::Result<Summary>
where
    E: FlashEngine,
    W: Write,
{
    let mut write_error: Option<io::Error> = None;
    let show_step = |report: &StepReport, grid: &PaddedGrid| {
        if args.show_steps && write_error.is_none() {
            if let Err(e) = write!(
                out,
                "After {} step(s):\n{}({} flashes)\n",
                report.step, grid, report.flashes
            ) {
                write_error = Some(e);
            }
        }
    };
    let summary = run_queries(grid, engine, args.steps, args.max_steps, show_step);
    match write_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// Loads the grid named by `args`, simulates it and writes the
/// results to `out`.
fn run<W: Write>(args: &Args, out: &mut W) -> anyhow::Result<()> {
    let grid = load_grid(&args.input)
        .with_context(|| format!("failed to load grid from {}", args.input.display()))?;
    event!(
        Level::INFO,
        rows = grid.rows(),
        cols = grid.cols(),
        "loaded grid"
    );
    let grid = grid.pad();
    write!(out, "Before any steps:\n{}", grid)?;

    let summary = if args.parallel {
        simulate(grid, Parallel, args, out)?
    } else {
        simulate(grid, Sequential, args, out)?
    };
    writeln!(
        out,
        "Day 11 part 1: after {} steps there were {} flashes",
        args.steps, summary.total_flashes
    )?;
    match summary.first_synchronized_step {
        Some(step) => {
            writeln!(out, "Day 11 part 2: first synchronized flash at step {}", step)?;
        }
        None => {
            writeln!(out, "Day 11 part 2: there was no synchronized flash.")?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();
    run(&args, &mut io::stdout().lock())
}

#[cfg(test)]
static NEXT_INPUT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Runs the program on `text`, with `extra` arguments before the path.
#[cfg(test)]
fn run_on(text: &str, extra: &[&str]) -> anyhow::Result<String> {
    let n = NEXT_INPUT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("dumbo-run-{}-{}.txt", std::process::id(), n));
    std::fs::write(&path, text).expect("can write temp file");
    let mut argv: Vec<String> = vec!["dumbo".to_string()];
    argv.extend(extra.iter().map(|arg| arg.to_string()));
    argv.push(path.display().to_string());
    let args = Args::try_parse_from(argv).expect("valid arguments");
    let mut out: Vec<u8> = Vec::new();
    let result = run(&args, &mut out);
    let _ = std::fs::remove_file(&path);
    result.map(|()| String::from_utf8(out).expect("output is UTF-8"))
}

#[test]
fn test_run_output() {
    let benchmark = "5483143223\n2745854711\n5264556173\n6141336146\n6357385478\n\
                     4167524645\n2176841721\n6882881134\n4846848554\n5283751526\n";
    let output = run_on(benchmark, &[]).expect("simulation succeeds");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 1 + 12 + 2);
    assert_eq!(lines[0], "Before any steps:");
    assert_eq!(lines[1], "000000000000");
    assert_eq!(lines[2], "054831432230");
    assert_eq!(lines[12], "000000000000");
    assert_eq!(lines[13], "Day 11 part 1: after 100 steps there were 1656 flashes");
    assert_eq!(lines[14], "Day 11 part 2: first synchronized flash at step 195");

    assert_eq!(
        run_on(benchmark, &["--parallel"]).expect("simulation succeeds"),
        output
    );
}

#[test]
fn test_run_show_steps() {
    let output = run_on(
        "11111\n19991\n19191\n19991\n11111\n",
        &["--show-steps", "--steps=1", "--max-steps=2"],
    )
    .expect("simulation succeeds");
    let expected = "Before any steps:\n\
                    0000000\n0111110\n0199910\n0191910\n0199910\n0111110\n0000000\n\
                    After 1 step(s):\n\
                    0000000\n0345430\n0400040\n0500050\n0400040\n0345430\n0000000\n\
                    (9 flashes)\n\
                    After 2 step(s):\n\
                    0000000\n0456540\n0511150\n0611160\n0511150\n0456540\n0000000\n\
                    (0 flashes)\n\
                    Day 11 part 1: after 1 steps there were 9 flashes\n\
                    Day 11 part 2: there was no synchronized flash.\n";
    assert_eq!(output, expected);
}

#[test]
fn test_run_reports_load_errors() {
    let args =
        Args::try_parse_from(["dumbo", "/nonexistent/dumbo/grid.txt"]).expect("valid arguments");
    let mut out: Vec<u8> = Vec::new();
    let err = run(&args, &mut out).expect_err("missing file");
    assert_eq!(
        err.to_string(),
        "failed to load grid from /nonexistent/dumbo/grid.txt"
    );
    assert!(out.is_empty());

    let err = run_on("12\n3x\n", &[]).expect_err("bad cell");
    let causes: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    assert_eq!(causes.len(), 2);
    assert!(causes[0].starts_with("failed to load grid from "));
    assert_eq!(
        causes[1],
        "line 2, column 2: invalid (non-numeric) cell 'x' in '3x'"
    );
}

#[test]
fn test_args_defaults() {
    let args = Args::try_parse_from(["dumbo", "input.txt"]).expect("valid arguments");
    assert_eq!(args.input, PathBuf::from("input.txt"));
    assert_eq!(args.steps, 100);
    assert!(!args.parallel);
    assert_eq!(args.max_steps, None);
    assert!(!args.show_steps);
}

#[test]
fn test_args_options() {
    let args = Args::try_parse_from([
        "dumbo",
        "--steps",
        "10",
        "--parallel",
        "--max-steps",
        "500",
        "--show-steps",
        "-",
    ])
    .expect("valid arguments");
    assert_eq!(args.input, PathBuf::from("-"));
    assert_eq!(args.steps, 10);
    assert!(args.parallel);
    assert_eq!(args.max_steps, Some(500));
    assert!(args.show_steps);
}

#[test]
fn test_args_require_input() {
    assert!(Args::try_parse_from(["dumbo"]).is_err());
    assert!(Args::try_parse_from(["dumbo", "--steps", "many", "input.txt"]).is_err());
}
