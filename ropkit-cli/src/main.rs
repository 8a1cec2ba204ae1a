//! ropkit-cli - decode packed operation buffers from the command line.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use ropkit_protocol::DEFAULT_PCB_OUT;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ropkit-cli")]
#[command(about = "Decode and inspect packed operation buffers")]
#[command(version)]
struct Cli {
    /// Emit JSON instead of pretty-printed text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a hex-encoded request buffer
    DecodeRequest {
        /// Hex bytes (or @file.hex to read from a file, - for stdin)
        input: String,
    },

    /// Decode a hex-encoded response buffer
    DecodeResponse {
        /// Hex bytes (or @file.hex to read from a file, - for stdin)
        input: String,

        /// Size limit applied while splitting the buffer
        #[arg(long, default_value_t = DEFAULT_PCB_OUT)]
        pcb_out: u32,

        /// Number of requests the buffer answers (0 = unknown)
        #[arg(long, default_value_t = 0)]
        expected: usize,
    },

    /// List known property tags
    Tags {
        /// Only names containing this substring
        filter: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::DecodeRequest { input } => commands::decode_request(&input, cli.json),
        Commands::DecodeResponse {
            input,
            pcb_out,
            expected,
        } => commands::decode_response(&input, pcb_out, expected, cli.json),
        Commands::Tags { filter } => commands::list_tags(filter.as_deref(), cli.json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
