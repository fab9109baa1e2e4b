use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use qsolve::{
    Overrides, Result, SolveOutcome, load_config, render_timeline, result_payload, write_result,
};

#[derive(Parser, Debug)]
#[command(name = "qsolve")]
#[command(about = "Search for a gate sequence that maps an initial state onto a target state")]
struct Args {
    /// JSON problem file, or `-` for stdin
    #[arg(short, long)]
    config: String,

    /// Maximum number of layers (overrides the config)
    #[arg(short = 'm', long)]
    max_layers: Option<usize>,

    /// Gate symbols to search over (overrides the config)
    #[arg(short, long, num_args = 1..)]
    allowed_gates: Option<Vec<String>>,

    /// Where to write the JSON result, `-` for stdout (overrides the config)
    #[arg(short, long)]
    output: Option<String>,

    /// Skip the layer-by-layer timeline
    #[arg(long)]
    no_timeline: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(outcome: &SolveOutcome, max_layers: usize) {
    if outcome.success {
        println!("Solved target state in {} layer(s).", outcome.layers_used());
    } else {
        println!("Failed to reach target within {max_layers} layers.");
    }
    println!("Final distance: {:.6e}", outcome.distance);

    if outcome.sequence.is_empty() {
        println!("Gate sequence: (empty)");
    } else {
        println!("Gate sequence:");
        for (i, op) in outcome.sequence.iter().enumerate() {
            println!("  {:>2}. {op}", i + 1);
        }
    }

    println!("Final state amplitudes:");
    let width = outcome.final_state.n;
    for (i, a) in outcome.final_state.v.iter().enumerate() {
        let sign = if a.im < 0.0 { '-' } else { '+' };
        println!("  |{i:0width$b}> = {:.6} {sign} {:.6}i", a.re, a.im.abs());
    }
}

fn run(args: Args) -> Result<bool> {
    let mut config = load_config(&args.config)?;
    config.apply_overrides(Overrides {
        layers: args.max_layers,
        allowed_gates: args.allowed_gates,
        output_path: args.output,
    });

    let problem = config.resolve()?;
    let outcome = problem.solve()?;

    print_summary(&outcome, config.layers);
    if !args.no_timeline {
        let states = outcome.timeline(&problem.initial)?;
        let text = render_timeline(&problem.initial, &outcome.sequence, &states, &outcome.final_state)?;
        println!();
        println!("{text}");
    }

    if let Some(dest) = &problem.output_path {
        let payload = result_payload(&outcome, &problem.initial)?;
        write_result(&payload, dest)?;
        if dest != "-" {
            println!("Persisted result to {dest}");
        }
    }
    Ok(outcome.success)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!(%err, config_error = err.is_config_error(), "run aborted");
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
