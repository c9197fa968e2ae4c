use clap::Parser;
use convcore::arch::conv::BankLayout;
use convcore::simulator::config::{apply_cli_overrides, load_config, validate_config, CliOverrides};
use convcore::simulator::sim::mode::SimConfig;
use convcore::simulator::utils::log::init_log;
use convcore::simulator::utils::report::{compare, print_simulation_records};
use convcore::simulator::{Job, Simulator};
use std::error::Error;
use std::path::PathBuf;

/// convcore - cycle-level model of a 2D convolution accelerator core
#[derive(Parser, Debug)]
#[command(name = "convcore")]
#[command(version = "0.1.0")]
#[command(about = "Runs convolution jobs through a cycle-level model of the conv core", long_about = None)]
struct Args {
  /// Configuration file layered over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Job file (TOML); without it a synthetic job is generated
  #[arg(short, long, value_name = "FILE")]
  job: Option<PathBuf>,

  /// Synthetic job: image side length
  #[arg(long, default_value_t = 16)]
  image_size: u16,

  /// Synthetic job: filter side length (3..=8)
  #[arg(long, default_value_t = 3)]
  filter_size: u8,

  /// Synthetic job: stride (1..=7)
  #[arg(long, default_value_t = 1)]
  stride: u8,

  /// Bank layout: column_pair or row_interleaved (overrides job and config)
  #[arg(long, value_name = "LAYOUT")]
  layout: Option<BankLayout>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path (JSON lines)
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Abort a job that has not completed after this many cycles
  #[arg(long, value_name = "CYCLES")]
  max_cycles: Option<u64>,

  /// Compare results against the software reference convolution
  #[arg(long)]
  check: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();

  let mut app = load_config(args.config.as_deref())?;
  apply_cli_overrides(
    &mut app,
    &CliOverrides {
      quiet: args.quiet,
      step: args.step,
      trace_file: args.trace_file.as_deref(),
      layout: args.layout,
      max_cycles: args.max_cycles,
    },
  );
  validate_config(&app)?;
  init_log(app.simulation.quiet);

  let job = match &args.job {
    Some(path) => Job::from_file(path)?,
    None => Job::synthetic(args.image_size, args.filter_size, args.stride),
  };
  let prepared = job.prepare()?;

  // Command line beats the job file, which beats the config.
  let layout = args.layout.or(prepared.layout).unwrap_or(app.engine.layout);
  let config = SimConfig::from_app(&app, layout);
  let quiet = config.quiet;

  let mut simulator = Simulator::new(config)?;
  let report = simulator.run_job(&prepared)?;

  println!("{}", report);
  if !quiet {
    print_simulation_records(simulator.simulation());
  }

  if args.check {
    let expected = prepared.reference()?;
    let mismatches = compare(&report.results, &expected);
    if !mismatches.is_empty() {
      for m in mismatches.iter().take(10) {
        eprintln!("mismatch at {}: got {:?}, expected {:?}", m.index, m.got, m.expected);
      }
      return Err(format!("{} of {} results differ from the reference", mismatches.len(), expected.len()).into());
    }
    println!("check passed: {} results match the reference", expected.len());
  }

  Ok(())
}
