use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sqlite_reader::cli::{Args, Command};
use sqlite_reader::sqlite::db::Database;
use sqlite_reader::sqlite::statement::SelectStmt;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only command output.
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    run(args)
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::DbInfo => {
            let db = Database::open(&args.file)?;
            println!("database page size:\t{}", db.page_size());
            println!("number of tables:\t{}", db.table_count());
        }
        Command::Tables => {
            let db = Database::open(&args.file)?;
            println!("{}", db.table_names().join(" "));
        }
        Command::Sql(sql) => {
            let stmt = SelectStmt::parse(&sql)?;
            info!(?stmt, "parsed statement");
            let mut db = Database::open(&args.file)?;
            for output in db.execute(&stmt)? {
                println!("{output}");
            }
        }
    }
    Ok(())
}
