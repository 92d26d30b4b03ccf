use std::{env, path::PathBuf};

use anyhow::{bail, Result};

/// Commands accepted on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DbInfo,
    Tables,
    /// Anything that is not a dot-command is handed to the SQL parser.
    Sql(String),
}

/// Parsed command line: `<program> <database> <command>`.
#[derive(Debug)]
pub struct Args {
    pub file: PathBuf,
    pub command: Command,
}

impl Args {
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_slice(&args)
    }

    fn from_slice(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            bail!("usage: sqlite-reader <database> <command>");
        }

        let file = PathBuf::from(&args[0]);
        let command = match args[1].as_str() {
            ".dbinfo" => Command::DbInfo,
            ".tables" => Command::Tables,
            cmd if cmd.starts_with('.') => bail!("unrecognized command {cmd:?}"),
            cmd => Command::Sql(cmd.to_string()),
        };

        Ok(Args { file, command })
    }
}
