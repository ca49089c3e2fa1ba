//! The ekraw command line
use clap::Parser;

use crate::error::Result;

/// Top-level command line arguments
#[derive(Parser, Debug)]
pub struct Args {
    /// The subcommand to run
    #[command(subcommand)]
    pub cmd: Action,
}

/// The available subcommands
#[derive(clap::Subcommand, Debug)]
pub enum Action {
    /// Count the datagrams in a raw file by type
    Count {
        /// The raw file to read
        path: std::path::PathBuf,
        /// Write the counts here instead of stdout
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Print a summary of a raw file
    Info {
        /// The raw file to read
        path: std::path::PathBuf,
    },
    /// Build the offset index of a raw file and save its side-car
    Map {
        /// The raw file to index
        path: std::path::PathBuf,
        /// Write the index here instead of the side-car path
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Read a raw file, run bottom detection and emit the survey
    /// records as JSON
    Detect {
        /// The raw file to read
        path: std::path::PathBuf,
        /// Write the records here instead of stdout
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// First byte of the read window
        #[arg(long, default_value_t = 0)]
        start_ptr: u64,
        /// Exclusive end of the read window
        #[arg(long)]
        end_ptr: Option<u64>,
        /// Minimum class signal-to-noise ratio in dB
        #[arg(long)]
        snr_threshold: Option<f64>,
    },
}

/// Dispatch a parsed command line
pub fn run(args: Args) -> Result<()> {
    match args.cmd {
        Action::Count { path, output } => {
            count::count(path, output)?;
        }
        Action::Info { path } => {
            info::info(path)?;
        }
        Action::Map { path, output } => {
            map::map(path, output)?;
        }
        Action::Detect {
            path,
            output,
            start_ptr,
            end_ptr,
            snr_threshold,
        } => {
            detect::detect(path, output, start_ptr, end_ptr, snr_threshold)?;
        }
    };
    Ok(())
}

pub mod count;
pub mod detect;
pub mod info;
pub mod map;
