#[cfg(windows)]
mod commands;

use std::str::FromStr;

use clap::{Parser, Subcommand};

use vdd_core::driver::ParentGpu;
use vdd_core::{ModeRequest, Orientation};

#[derive(Parser)]
#[command(
    name = "vdd",
    version,
    about = "Manage virtual displays created by a virtual display driver"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Subcommand)]
enum Commands {
    /// Create the default configuration file
    Init,
    /// Start the daemon that keeps virtual displays alive
    Start,
    /// Stop the daemon
    Stop,
    /// Show whether the daemon is running and the driver status
    Status,
    /// Plug in a new virtual display
    Add,
    /// Unplug a virtual display (the last one by default)
    Remove {
        /// Driver index of the display, or "all"
        target: Option<RemoveTarget>,
    },
    /// List virtual displays
    List {
        /// Include every attached display, not only virtual ones
        #[arg(long)]
        all: bool,
    },
    /// Change the resolution and/or refresh rate of a virtual display
    Set {
        /// Driver index of the display
        index: u16,
        /// WxH, @R (or rR) or WxH@R
        mode: ModeRequest,
    },
    /// Rotate a virtual display
    Rotate {
        /// Driver index of the display
        index: u16,
        /// landscape, portrait, landscape-flipped, portrait-flipped, or degrees
        orientation: Orientation,
    },
    /// Show the driver status (the exit code is the status code)
    Driver,
    /// Show the driver version reported by the running daemon
    Version,
    /// Custom display modes and parent GPU of the driver
    Custom {
        #[command(subcommand)]
        command: CustomCommands,
    },
    /// Manage automatic startup on Windows logon
    Autostart {
        #[command(subcommand)]
        command: AutostartCommands,
    },
    /// Run the daemon (internal, not for direct use)
    #[command(hide = true)]
    Daemon,
    /// Write driver settings from an elevated process (internal, not for direct use)
    #[command(hide = true)]
    ApplyCustom {
        /// Modes in the hex transport format
        #[arg(long)]
        modes: Option<String>,
        #[arg(long)]
        gpu: Option<ParentGpu>,
    },
}

#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Subcommand)]
enum CustomCommands {
    /// Show the custom modes and parent GPU
    Show,
    /// Replace the custom modes (up to 5, each WxH@R); asks for elevation
    Set {
        modes: Vec<String>,
        /// GPU the virtual adapter renders on: auto, nvidia or amd
        #[arg(long)]
        gpu: Option<ParentGpu>,
    },
}

#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Subcommand)]
enum AutostartCommands {
    /// Register vdd to start automatically on logon
    Enable,
    /// Remove the autostart registration
    Disable,
    /// Show whether autostart is enabled
    Status,
}

/// What `vdd remove` targets.
#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoveTarget {
    All,
    Index(u16),
}

impl FromStr for RemoveTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse()
            .map(Self::Index)
            .map_err(|_| format!("expected a display index or 'all', got '{s}'"))
    }
}

#[cfg(windows)]
fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Start => commands::start::execute(),
        Commands::Stop => commands::stop::execute(),
        Commands::Status => commands::status::execute(),
        Commands::Add => commands::add::execute(),
        Commands::Remove { target } => match target {
            None => commands::remove::execute(None),
            Some(RemoveTarget::Index(index)) => commands::remove::execute(Some(index)),
            Some(RemoveTarget::All) => commands::remove::execute_all(),
        },
        Commands::List { all } => commands::list::execute(all),
        Commands::Set { index, mode } => commands::set::execute(index, mode),
        Commands::Rotate { index, orientation } => commands::rotate::execute(index, orientation),
        Commands::Driver => commands::driver::execute(),
        Commands::Version => commands::version::execute(),
        Commands::Custom { command } => match command {
            CustomCommands::Show => commands::custom::show(),
            CustomCommands::Set { modes, gpu } => commands::custom::set(&modes, gpu),
        },
        Commands::Autostart { command } => match command {
            AutostartCommands::Enable => commands::autostart::enable(),
            AutostartCommands::Disable => commands::autostart::disable(),
            AutostartCommands::Status => commands::autostart::status(),
        },
        Commands::Daemon => commands::daemon::execute(),
        Commands::ApplyCustom { modes, gpu } => commands::custom::apply(modes.as_deref(), gpu),
    }
}

#[cfg(not(windows))]
fn main() {
    // Parse anyway so --help and --version work everywhere.
    let _ = Cli::parse();
    eprintln!("vdd requires Windows.");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_target_accepts_index_and_all() {
        assert_eq!("3".parse(), Ok(RemoveTarget::Index(3)));
        assert_eq!("ALL".parse(), Ok(RemoveTarget::All));
        assert!("last".parse::<RemoveTarget>().is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }

    #[test]
    fn set_parses_partial_mode() {
        let cli = Cli::try_parse_from(["vdd", "set", "2", "@144"]).unwrap();

        match cli.command {
            Commands::Set { index, mode } => {
                assert_eq!(index, 2);
                assert_eq!(mode.hz, Some(144));
                assert_eq!(mode.width, None);
            }
            _ => panic!("expected set"),
        }
    }
}
