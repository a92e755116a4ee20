use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")\nmpa ",
    env!("MPA_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting MPEG audio elementary streams",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as frame errors (discard frames with CRC or allocation problems).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Decode frame headers only, skipping audio data and CRC checks.
    #[arg(long, global = true)]
    pub headers_only: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print stream information
    Info(InfoArgs),

    /// Dump one YAML record per frame.
    Frames(FramesArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input MPEG audio streams (use "-" for stdin).
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FramesArgs {
    /// Input MPEG audio stream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file for the frame records, stdout when omitted.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Include requantized Layer I samples.
    #[arg(long)]
    pub samples: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "mpadec",
            "info",
            "a.mp3",
            "b.mp3",
            "--strict",
            "--headers-only",
            "--loglevel",
            "debug",
        ])?;

        assert!(cli.strict);
        assert!(cli.headers_only);
        assert!(!cli.progress);
        assert_eq!(cli.loglevel.to_level_filter(), log::LevelFilter::Debug);

        let Commands::Info(args) = cli.command else {
            panic!("expected info command");
        };
        assert_eq!(args.inputs.len(), 2);
        Ok(())
    }

    #[test]
    fn frames_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["mpadec", "frames", "-", "--output", "out.yaml"])?;

        let Commands::Frames(args) = cli.command else {
            panic!("expected frames command");
        };
        assert_eq!(args.input, PathBuf::from("-"));
        assert_eq!(args.output, Some(PathBuf::from("out.yaml")));
        assert!(!args.samples);
        Ok(())
    }

    #[test]
    fn info_requires_input() {
        assert!(Cli::try_parse_from(["mpadec", "info"]).is_err());
    }
}
