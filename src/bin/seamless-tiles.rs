use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seamless_tiles::{
    default_output_path, BuiltinTransform, MergeStrategy, ProcessResult, TileEngine, TileOptions,
};

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Overwrite overlaps, later tiles win
    Hard,
    /// Fade tile edges into the original image
    Feathered,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransformArg {
    Identity,
    Invert,
    Brighten,
    Blur,
}

#[derive(Parser)]
#[command(
    name = "seamless-tiles",
    about = "Split images into overlapping tiles, transform each tile, and merge them back",
    version,
    after_help = "Simple usage: seamless-tiles <image> --transform blur  (writes <image>_tiled.<ext>)"
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_tiled.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Tile width in pixels
    #[arg(long, default_value = "512")]
    tile_width: u32,

    /// Tile height in pixels
    #[arg(long, default_value = "512")]
    tile_height: u32,

    /// Overlap between neighbouring tiles in pixels
    #[arg(long, default_value = "64")]
    overlap: u32,

    /// How tiles are merged back together
    #[arg(short, long, value_enum, default_value = "feathered")]
    strategy: StrategyArg,

    /// Integer upscale factor applied before splitting
    #[arg(long, default_value = "1")]
    scale: u32,

    /// Number of tiles per transform call
    #[arg(long, default_value = "1")]
    batch_size: usize,

    /// Seed passed to the per-tile transform
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Advance the seed by one on every pass instead of reusing it
    #[arg(long)]
    no_fix_seed: bool,

    /// Passes per input; pass N is written to {name}_N.{ext}
    #[arg(short = 'n', long, default_value = "1")]
    iterations: u32,

    /// Per-tile transform to apply
    #[arg(short, long, value_enum, default_value = "identity")]
    transform: TransformArg,

    /// Transform strength (brighten offset or blur sigma)
    #[arg(short, long)]
    amount: Option<f32>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("seamless_tiles={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let transform = match cli.transform {
        TransformArg::Identity => BuiltinTransform::Identity,
        TransformArg::Invert => BuiltinTransform::Invert,
        #[allow(clippy::cast_possible_truncation)]
        TransformArg::Brighten => BuiltinTransform::Brighten(cli.amount.unwrap_or(20.0) as i32),
        TransformArg::Blur => BuiltinTransform::Blur(cli.amount.unwrap_or(1.5)),
    };

    let opts = TileOptions {
        tile_width: cli.tile_width,
        tile_height: cli.tile_height,
        overlap: cli.overlap,
        strategy: match cli.strategy {
            StrategyArg::Hard => MergeStrategy::HardPaste,
            StrategyArg::Feathered => MergeStrategy::Feathered,
        },
        scale_factor: cli.scale,
        batch_size: cli.batch_size,
        seed: cli.seed,
        fix_seed: !cli.no_fix_seed,
        iterations: cli.iterations,
    };

    let engine = match TileEngine::new(opts) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: seamless-tiles <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir, &transform)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path, &transform)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.quiet);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, quiet: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        if result.placeholders > 0 {
            eprintln!(
                "[OK] {filename}: {} ({} placeholder tiles)",
                result.message, result.placeholders
            );
        } else {
            eprintln!("[OK] {filename}: {}", result.message);
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}
