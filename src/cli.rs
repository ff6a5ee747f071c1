use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Decoders: image 0.25 (png, jpeg, bmp, webp), gif 0.13\n",
    "Target:   ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Folder image cycler: index a directory tree and play its images as a slideshow
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Root directory to index
    #[arg(value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Only play files directly inside the selected folder
    #[arg(long = "no-subfolders")]
    pub no_subfolders: bool,

    /// Concurrent decodes while precaching (default: 3/4 of the cores)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Skip files larger than this many megabytes
    #[arg(long = "max-file-size", value_name = "MB")]
    pub max_file_size: Option<u64>,

    /// Slideshow interval in milliseconds (20-2000)
    #[arg(short = 'i', long = "interval", value_name = "MS")]
    pub interval: Option<u64>,

    /// Select a folder (or a file inside one) below DIR before playing
    #[arg(short = 's', long = "select", value_name = "PATH")]
    pub select: Option<PathBuf>,

    /// Decode the whole playlist up front
    #[arg(short = 'p', long = "precache")]
    pub precache: bool,

    /// Replace the playlist with entries whose name contains TEXT (3+ chars)
    #[arg(long = "search", value_name = "TEXT")]
    pub search: Option<String>,

    /// Play N frames as a timed slideshow, then exit
    #[arg(short = 'n', long = "frames", value_name = "N")]
    pub frames: Option<usize>,

    /// Read playback commands from stdin (play, pause, next, seek N, ...)
    #[arg(short = 'I', long = "interactive")]
    pub interactive: bool,

    /// Play the first animated GIF of the playlist through its frames
    #[arg(short = 'a', long = "animate")]
    pub animate: bool,

    /// Animation speed multiplier for --animate (0.1-10)
    #[arg(long = "speed", value_name = "X", default_value_t = 1.0)]
    pub speed: f64,

    /// Print the indexed tree
    #[arg(short = 't', long = "tree")]
    pub tree: bool,

    /// Write the effective settings to the config file
    #[arg(long = "save-settings")]
    pub save_settings: bool,

    /// Enable debug logging to file (default: fic.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
