use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wrap a message in a wire envelope.
    Encode(EncodeArgs),
    /// Unwrap and classify a wire envelope.
    Decode(DecodeArgs),
    /// Run parent and child links against an in-memory page.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON message.
    #[arg(long, conflicts_with_all = ["data", "file", "mounted"])]
    pub json: Option<String>,
    /// String message (encoded as a JSON string).
    #[arg(long, conflicts_with_all = ["json", "file", "mounted"])]
    pub data: Option<String>,
    /// Read a JSON message from file.
    #[arg(long, conflicts_with_all = ["json", "data", "mounted"])]
    pub file: Option<PathBuf>,
    /// Encode a child's handshake announcement for this frame identifier.
    #[arg(long, value_name = "ID", conflicts_with_all = ["json", "data", "file"])]
    pub mounted: Option<String>,
    /// Sender frame identifier. Defaults to the announced id with --mounted.
    #[arg(long, value_name = "ID")]
    pub from_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire string. Read from stdin when omitted.
    #[arg(conflicts_with = "file")]
    pub wire: Option<String>,
    /// Read the wire string from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Frame identifiers to embed (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "frame-1")]
    pub frames: Vec<String>,
    /// JSON message each parent link sends before its child loads.
    #[arg(long, default_value = "{\"type\":\"ping\"}")]
    pub message: String,
    /// Messages sent per link.
    #[arg(long, default_value = "1")]
    pub count: usize,
    /// Frames whose announcement is delivered before the parent listens
    /// (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub lose: Vec<String>,
    /// Include every posted packet in the output.
    #[arg(long)]
    pub transcript: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
