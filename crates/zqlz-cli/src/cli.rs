//! `zqlz-fk-cache` - regenerate and inspect foreign key cache dumps
//!
//! Run `dump` after migrations so applications can warm their foreign key
//! cache from the file instead of querying the catalog at startup.

mod commands;
mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for a dump that exists but cannot be decoded
const EXIT_BAD_DUMP: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "zqlz-fk-cache")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read foreign keys from a SQLite database and write a dump
    Dump {
        /// Path to the SQLite database
        #[arg(short, long, env = "ZQLZ_DATABASE")]
        database: String,

        /// Dump file to write
        #[arg(short, long, env = "ZQLZ_FK_CACHE_PATH")]
        output: PathBuf,

        /// Only dump these tables (`table` or `schema.table`); defaults to all
        #[arg(short, long = "table")]
        tables: Vec<String>,

        /// Leave an existing dump untouched
        #[arg(long)]
        unless_exists: bool,
    },

    /// Print a dump as JSON
    Show {
        /// Dump file to read
        #[arg(env = "ZQLZ_FK_CACHE_PATH")]
        path: PathBuf,

        /// Only print this canonical key, e.g. "main"."orders"
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Check that a dump can be loaded
    Verify {
        /// Dump file to read
        #[arg(env = "ZQLZ_FK_CACHE_PATH")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: {:#}", e);
    }

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Dump {
            database,
            output,
            tables,
            unless_exists,
        } => {
            let outcome = commands::dump(&database, &output, &tables, unless_exists).await?;
            if outcome.written {
                println!(
                    "Wrote foreign keys for {} tables to {}",
                    outcome.table_count,
                    output.display()
                );
            } else {
                println!("{} already exists, left unchanged", output.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { path, key } => {
            let cache = match commands::load(&path) {
                Ok(cache) => cache,
                Err(e) if e.is_cache_decode() => return Ok(bad_dump(&path, &e)),
                Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
            };
            let rendered = commands::render(&cache, key.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&rendered)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { path } => match commands::load(&path) {
            Ok(cache) => {
                println!("{}: ok, {} tables", path.display(), cache.len());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) if e.is_cache_decode() => Ok(bad_dump(&path, &e)),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        },
    }
}

fn bad_dump(path: &std::path::Path, error: &zqlz_core::ZqlzError) -> ExitCode {
    eprintln!(
        "error: {} is not a usable foreign key cache dump ({}); regenerate it with `zqlz-fk-cache dump`",
        path.display(),
        error
    );
    ExitCode::from(EXIT_BAD_DUMP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dump_with_tables() {
        let cli = Cli::try_parse_from([
            "zqlz-fk-cache",
            "dump",
            "--database",
            "app.db",
            "--output",
            "fk.dump",
            "-t",
            "orders",
            "-t",
            "main.customers",
            "--unless-exists",
        ])
        .unwrap();

        match cli.command {
            Commands::Dump {
                database,
                output,
                tables,
                unless_exists,
            } => {
                assert_eq!(database, "app.db");
                assert_eq!(output, PathBuf::from("fk.dump"));
                assert_eq!(tables, vec!["orders", "main.customers"]);
                assert!(unless_exists);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["zqlz-fk-cache", "verify", "fk.dump", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
