use clap::{Parser, Subcommand};
use std::path::PathBuf;

use resolution_change::{DisplayId, Resolution};

#[derive(Parser)]
#[command(name = "resolution-change")]
#[command(about = "Switch between HiDPI display modes and keep favorites", long_about = None)]
#[command(version)]
pub struct Cli {
    /// UI scale factor, overrides config and Xft.dpi detection
    #[arg(long, global = true)]
    pub scale: Option<u32>,

    /// X display to connect to
    #[arg(long, global = true)]
    pub display: Option<String>,

    /// Favorites file
    #[arg(long, global = true)]
    pub favorites: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List displays and their selectable modes
    List {
        #[arg(long)]
        json: bool,
    },

    /// Switch a display to a logical resolution
    Apply {
        display: DisplayId,
        resolution: Resolution,
    },

    /// Add or remove a favorite resolution
    Favorite {
        display: DisplayId,
        resolution: Resolution,
    },

    /// Show favorites that match a current mode, largest first
    Favorites { display: DisplayId },

    /// Print the mode list again whenever displays are reconfigured
    Watch,
}
