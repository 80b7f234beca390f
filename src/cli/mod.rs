//! CLI Module
//!
//! Command-line interface for rendering and inspecting mixes.

pub mod commands;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::render::{EncodeQuality, OutputFormat};

/// Mixdown - place speech and music on a timeline and render one file
#[derive(Parser, Debug)]
#[command(name = "mixdown")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mix clips and speech into one file
    #[command(name = "render")]
    Render(RenderArgs),

    /// Print format details of a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Music file to import, optionally placed at a time: PATH[@SECS]
    #[arg(long = "clip", value_name = "PATH[@SECS]")]
    pub clips: Vec<Placement<PathBuf>>,

    /// Text to speak, optionally placed at a time: TEXT[@SECS]
    #[arg(long = "speech", value_name = "TEXT[@SECS]")]
    pub speech: Vec<Placement<String>>,

    /// Voice for speech requests
    #[arg(long)]
    pub voice: Option<String>,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output format (defaults to the config, then the output extension)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// MP3 bitrate in kbps
    #[arg(long)]
    pub bitrate: Option<u32>,

    #[arg(long, value_enum)]
    pub quality: Option<EncodeQuality>,

    /// Mix sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// A value with an optional start time, written `VALUE@SECS`
///
/// Without a trailing `@SECS` the clip is appended at the end of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement<T> {
    pub value: T,
    pub at_secs: Option<f64>,
}

impl<T: From<String>> FromStr for Placement<T> {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("value is empty".to_string());
        }
        if let Some((value, secs)) = s.rsplit_once('@') {
            if let Ok(at) = secs.trim().parse::<f64>() {
                if !at.is_finite() || at < 0.0 {
                    return Err(format!("start time must be a non-negative number, got '{}'", secs));
                }
                return Ok(Self {
                    value: T::from(value.to_string()),
                    at_secs: Some(at),
                });
            }
        }
        Ok(Self {
            value: T::from(s.to_string()),
            at_secs: None,
        })
    }
}
