// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sbc_cli::commands::{self, Overrides};
use sbc_compress::CompressionAlgorithm;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sbc", version, about = "Service bus compression CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wrap a payload in a message file, compressing it when it crosses the threshold.
    Compress {
        /// Payload file, or `-` for stdin.
        payload: PathBuf,

        /// Where to write the message file (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Restore the payload of a message file.
    Decompress {
        /// Message file, or `-` for stdin.
        message: PathBuf,

        /// Where to write the payload (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Show the compression metadata of a message file.
    Inspect {
        /// Message file, or `-` for stdin.
        message: PathBuf,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Configuration file helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Commands {
    /// Configuration file named on the command line, if any.
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Compress { settings, .. }
            | Commands::Decompress { settings, .. }
            | Commands::Inspect { settings, .. } => settings.config.as_deref(),
            Commands::Config {
                action: ConfigAction::Check { path },
            } => path.as_deref(),
            Commands::Config {
                action: ConfigAction::Schema,
            } => None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Load and validate a configuration file.
    Check {
        /// Configuration file (defaults are checked when omitted).
        path: Option<PathBuf>,
    },
    /// Print the JSON schema of the configuration file.
    Schema,
}

#[derive(clap::Args, Debug)]
struct SettingsArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum body size in bytes that gets compressed.
    #[arg(long)]
    threshold: Option<usize>,

    /// Algorithm used for outgoing bodies.
    #[arg(long, value_enum)]
    algorithm: Option<AlgorithmArg>,
}

impl SettingsArgs {
    fn resolve(&self) -> Result<sbc_compress::CompressionConfiguration> {
        let overrides = Overrides {
            threshold: self.threshold,
            algorithm: self.algorithm.map(Into::into),
        };
        commands::resolve_configuration(self.config.as_deref(), &overrides)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Gzip,
    Zstd,
}

impl From<AlgorithmArg> for CompressionAlgorithm {
    fn from(v: AlgorithmArg) -> Self {
        match v {
            AlgorithmArg::Gzip => CompressionAlgorithm::Gzip,
            AlgorithmArg::Zstd => CompressionAlgorithm::Zstd,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = commands::log_directive(cli.command.config_path(), cli.debug);
    let filter = EnvFilter::new(directive);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compress {
            payload,
            output,
            settings,
        } => cmd_compress(&payload, output.as_deref(), &settings),
        Commands::Decompress {
            message,
            output,
            settings,
        } => cmd_decompress(&message, output.as_deref(), &settings),
        Commands::Inspect {
            message,
            json,
            settings,
        } => cmd_inspect(&message, json, &settings),
        Commands::Config { action } => match action {
            ConfigAction::Check { path } => cmd_config_check(path.as_deref()),
            ConfigAction::Schema => {
                println!("{}", commands::schema_json()?);
                Ok(())
            }
        },
    }
}

fn cmd_compress(payload: &Path, output: Option<&Path>, settings: &SettingsArgs) -> Result<()> {
    let config = settings.resolve()?;
    let (file, outcome) = commands::compress_payload(read_input(payload)?, &config)?;
    info!(target: "sbc.cli", ?outcome, "payload processed");
    let mut json = commands::message_file_json(&file)?;
    json.push('\n');
    write_output(output, json.as_bytes())
}

fn cmd_decompress(message: &Path, output: Option<&Path>, settings: &SettingsArgs) -> Result<()> {
    let config = settings.resolve()?;
    let file = read_message(message)?;
    let (body, outcome) = commands::decompress_message(file, &config)?;
    if let sbc_core::InboundOutcome::UnknownCodec { method } = &outcome {
        anyhow::bail!("message is compressed with unsupported method '{method}'");
    }
    info!(target: "sbc.cli", ?outcome, "message processed");
    write_output(output, &body)
}

fn cmd_inspect(message: &Path, json: bool, settings: &SettingsArgs) -> Result<()> {
    let config = settings.resolve()?;
    let report = commands::inspect_message(&read_message(message)?, &config);
    if json {
        println!("{}", report.to_json());
    } else {
        println!("{}", report.to_text());
    }
    Ok(())
}

fn cmd_config_check(path: Option<&Path>) -> Result<()> {
    let diagnostics = commands::config_check(path);
    for line in &diagnostics {
        println!("{line}");
    }
    if diagnostics.iter().any(|d| d.starts_with("error:")) {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_stdio(path) {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

fn read_message(path: &Path) -> Result<sbc_cli::format::MessageFile> {
    if is_stdio(path) {
        let raw = read_input(path)?;
        return serde_json::from_slice(&raw).context("parse message from stdin");
    }
    commands::read_message_file(path)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(p) => std::fs::write(p, bytes).with_context(|| format!("write '{}'", p.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}
