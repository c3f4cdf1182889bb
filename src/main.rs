use clap::Parser;
use std::path::PathBuf;

use question_crop::storage::{self, ProcessOutcome};
use question_crop::QuestionPipeline;

#[derive(Parser)]
#[command(name = "question-crop")]
#[command(about = "Extract the question block from photos of printed pages")]
struct Cli {
    /// Input image, or a folder searched recursively for images
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory for final images
    #[arg(short, long, value_name = "DIR", default_value = "outputs")]
    out: PathBuf,

    /// Save intermediate stages to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Keep white-on-black text instead of inverting to black-on-white
    #[arg(long)]
    keep_polarity: bool,

    /// Worker threads for folder input
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Print one JSON object per processed file
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut pipeline = QuestionPipeline::new().with_black_text(!args.keep_polarity);
    if let Some(debug_dir) = args.debug_out.clone() {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let inputs = if args.input.is_dir() {
        storage::collect_images(&args.input)?
    } else if args.input.is_file() {
        vec![args.input.clone()]
    } else {
        anyhow::bail!("Input not found: {}", args.input.display());
    };

    if inputs.is_empty() {
        println!("No images found in {}", args.input.display());
        return Ok(());
    }
    if args.verbose {
        println!("Processing {} image(s) into {:?}\n", inputs.len(), args.out);
    }

    let outcomes = storage::process_batch(&inputs, &args.out, &pipeline, args.jobs)?;

    let mut succeeded = 0;
    for outcome in &outcomes {
        if outcome.ok {
            succeeded += 1;
        }
        if args.json {
            println!("{}", serde_json::to_string(outcome)?);
        } else {
            print_outcome(outcome);
        }
    }

    if !args.json {
        println!("\n=== Summary ===");
        println!("Processed: {}", outcomes.len());
        println!("Succeeded: {}", succeeded);
        println!("Failed:    {}", outcomes.len() - succeeded);
    }

    if succeeded == 0 {
        anyhow::bail!("No question block extracted");
    }
    Ok(())
}

fn print_outcome(outcome: &ProcessOutcome) {
    match (&outcome.output, &outcome.meta) {
        (Some(path), Some(meta)) => {
            println!(
                "  {} -> {} ({}x{})",
                outcome.input.display(),
                path.display(),
                meta.width,
                meta.height
            );
        }
        _ => {
            let reason = outcome.error.map(|e| e.as_str()).unwrap_or("unknown");
            match &outcome.detail {
                Some(detail) => println!("  {} FAILED: {} ({})", outcome.input.display(), reason, detail),
                None => println!("  {} FAILED: {}", outcome.input.display(), reason),
            }
        }
    }
}
