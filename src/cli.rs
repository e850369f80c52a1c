//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect class hierarchies in Arma-style `config.cpp` files.
///
/// Every PATH may be a file or a directory; directories are searched for
/// config files. Files load in the order given and later ones patch
/// classes defined by earlier ones.
#[derive(Parser, Debug)]
#[command(name = "cfgtree", version)]
pub struct CliArgs {
    /// Settings file (default `cfgtree.toml`, optional).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print reports as JSON.
    #[arg(long)]
    pub json: bool,

    /// Keep going past unresolved parents and cycles.
    #[arg(long)]
    pub lenient: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List top-level config groups.
    Groups {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List class paths and their parents.
    Classes {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Only classes under this top-level group.
        #[arg(long)]
        group: Option<String>,
    },
    /// Show the effective properties of a class.
    Resolve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Class name or path such as `CfgVehicles/TC_B_Mirror_1`.
        #[arg(long = "class")]
        class: String,
        /// Print only this property.
        #[arg(long)]
        property: Option<String>,
    },
    /// Report unresolved parents and inheritance cycles.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_command() {
        let args = CliArgs::try_parse_from([
            "cfgtree",
            "--json",
            "resolve",
            "mods/@tc_mirrorform",
            "--class",
            "TC_B_Mirror_1",
            "--property",
            "model",
        ])
        .unwrap();
        assert!(args.json);
        assert!(!args.lenient);
        match &args.command {
            Command::Resolve {
                paths,
                class,
                property,
            } => {
                assert_eq!(paths, &[PathBuf::from("mods/@tc_mirrorform")]);
                assert_eq!(class, "TC_B_Mirror_1");
                assert_eq!(property.as_deref(), Some("model"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_paths_are_required() {
        assert!(CliArgs::try_parse_from(["cfgtree", "check"]).is_err());
    }
}
