mod demos;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use script_tracer::runtime::input_queue;
use script_tracer::{Settings, TraceRecorder};
use tracing::info;
use tracing_subscriber::EnvFilter;

use demos::DemoName;

#[derive(Parser, Debug)]
#[command(name = "script-tracer")]
#[command(version)]
#[command(about = "Records a step-by-step execution trace of a script", long_about = None)]
struct Cli {
    /// Built-in program to trace
    #[arg(value_enum)]
    demo: DemoName,

    /// TOML settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the step budget
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,

    /// Standard input lines, split shell-style (e.g. "alice 'bob smith'")
    #[arg(short, long, value_name = "INPUTS")]
    inputs: Option<String>,

    /// Pretty-print the trace
    #[arg(long)]
    pretty: bool,

    /// Log everything the tracer does to stderr
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(max_steps) = args.max_steps {
        settings.max_steps = max_steps;
        settings.validate()?;
    }

    let inputs = match &args.inputs {
        Some(raw) => match input_queue(raw) {
            Some(queue) => queue,
            None => bail!("Invalid value for --inputs: unbalanced quotes in {raw:?}"),
        },
        None => Default::default(),
    };

    let mut demo = demos::build(args.demo);
    info!(demo = ?args.demo, max_steps = settings.max_steps, "tracing demo");
    let mut recorder = TraceRecorder::new(settings);
    let trace = recorder.run(&mut demo.source, demo.script, inputs);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&trace)?
    } else {
        serde_json::to_string(&trace)?
    };
    println!("{rendered}");
    Ok(())
}
