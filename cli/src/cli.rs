use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "vroverlay",
    version = vroverlay_core::version(),
    about = "Draws a live overlay into a VR headset from a native event loop",
)]
pub struct Args {
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Specify custom configuration file path"
    )]
    pub config_path: Option<PathBuf>,

    #[arg(
        long = "dry-run",
        help = "Validate configuration and exit without starting"
    )]
    pub dry_run: bool,

    #[arg(
        long = "defaults",
        help = "Use default configuration and ignore config files"
    )]
    pub use_defaults: bool,

    #[arg(short, long, help = "Only log info, warnings and errors")]
    pub quiet: bool,

    #[arg(short, long, conflicts_with = "quiet", help = "Log everything, including trace")]
    pub verbose: bool,

    /// Waits on a condition variable instead of the windowing system's event loop
    #[arg(long, help = "Run without a native window event loop")]
    pub headless: bool,

    /// Implied when the binary is built without the `openvr` feature
    #[arg(long, help = "Drive the in-memory mock VR runtime instead of OpenVR")]
    pub mock: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
