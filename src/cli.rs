use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and convert channel node files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: chanstore.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the node and a summary of every channel
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Also print element values of the current frame
        #[arg(short = 'e', long = "elements")]
        elements: bool,
    },

    /// Convert a node file to a JSON snapshot
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path (default: FILE with .json extension)
        #[arg(short = 'o', long = "output", value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// Build a node file from a JSON snapshot
    Import {
        #[arg(value_name = "JSON")]
        json: PathBuf,

        #[arg(short = 'o', long = "output", value_name = "OUT")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_with_verbosity() {
        let args = Args::try_parse_from(["chanstore", "-vv", "inspect", "a.chnl", "-e"]).unwrap();
        assert_eq!(args.verbosity, 2);
        assert!(args.log_file.is_none());
        assert!(matches!(args.command, Command::Inspect { elements: true, .. }));
    }

    #[test]
    fn test_log_flag_without_path() {
        let args = Args::try_parse_from(["chanstore", "export", "a.chnl", "--log"]).unwrap();
        assert_eq!(args.log_file, Some(None));
        assert!(matches!(args.command, Command::Export { output: None, .. }));
    }

    #[test]
    fn test_import_requires_output() {
        assert!(Args::try_parse_from(["chanstore", "import", "a.json"]).is_err());
    }
}
