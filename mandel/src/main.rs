use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use mandel_core::colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod options;

use commands::ColorChoice;
use options::WindowArgs;

#[derive(Debug, Parser)]
#[command(name = "mandel", about = "Mandelbrot set generator")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute a fractal and store it in a fractal file.
    Compute {
        /// Fractal file to write.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Worker threads; 0 uses one per core.
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
    },
    /// Color a fractal file into a bitmap.
    Color {
        /// Fractal file to read.
        #[arg(short, long)]
        input: PathBuf,

        /// Bitmap to write.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        color: ColorArgs,
    },
    /// Compute (or reuse) STEM.fract and color it into STEM.bmp.
    Render {
        /// Output path, without extension.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Worker threads; 0 uses one per core.
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,

        #[command(flatten)]
        color: ColorArgs,
    },
}

#[derive(Debug, Args)]
struct ColorArgs {
    /// Colorizer to use.
    #[arg(short, long, default_value = colorize::DEFAULT_COLORIZER, value_parser = colorizer_name)]
    colorizer: String,

    /// Colorizer arguments, as key=value pairs separated by ';'.
    #[arg(short, long, default_value = "")]
    args: String,
}

impl From<ColorArgs> for ColorChoice {
    fn from(args: ColorArgs) -> Self {
        ColorChoice {
            name: args.colorizer,
            args: args.args,
        }
    }
}

fn colorizer_name(name: &str) -> Result<String, String> {
    if colorize::names().any(|n| n == name) {
        Ok(name.to_owned())
    } else {
        Err(format!(
            "available colorizers: {}",
            colorize::names().collect::<Vec<_>>().join(", ")
        ))
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<(), mandel_core::Error> {
    match command {
        Command::Compute {
            output,
            window,
            jobs,
        } => {
            let params = window.resolve()?;
            commands::compute(&params, jobs, &output)?;
        }
        Command::Color {
            input,
            output,
            color,
        } => {
            commands::color(&input, &output, &color.into())?;
        }
        Command::Render {
            output,
            window,
            jobs,
            color,
        } => {
            let params = window.resolve()?;
            let rendered = commands::render(&params, jobs, &output, &color.into())?;
            tracing::info!(
                "rendered {} from {} ({})",
                rendered.image.display(),
                rendered.fractal.display(),
                if rendered.reused { "cached" } else { "computed" }
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
