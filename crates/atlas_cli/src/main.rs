//! Command line probe for the atlas core.
//!
//! # Responsibility
//! - Scan a project into a local store and print what the editor would see.
//! - Verify `atlas_core` linkage independently from the FFI runtime.

use atlas_core::{
    import_scan, init_logging, logging_status, open_db, scan_project, DocumentRepository,
    LogLevel, ScanOptions, SqliteDocumentRepository,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "atlas", version, about = "Per-directory memory documents for a project")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite store path.
    #[arg(long = "db", value_name = "PATH", global = true, default_value = "atlas.sqlite3")]
    db: PathBuf,

    /// Write rolling logs to this absolute directory.
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a project directory and import it into the store.
    Scan {
        #[arg(value_name = "PROJECT_ROOT")]
        root: PathBuf,
        /// Depth window for per-directory stats.
        #[arg(long = "max-depth", default_value_t = 3)]
        max_depth: usize,
        #[arg(long = "memory-file", default_value = atlas_core::DEFAULT_MEMORY_FILE_NAME)]
        memory_file: String,
    },
    /// List stored memory documents.
    List,
    /// Print directories suggested for a memory document.
    Recommend,
    /// Print core version and health check.
    Version,
}

fn main() {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        if let Err(error) = init_logging(LogLevel::build_default().as_str(), &log_dir.to_string_lossy()) {
            eprintln!("error: failed to initialize logging: {error}");
            std::process::exit(1);
        }
    }

    let result = match &cli.command {
        Command::Scan {
            root,
            max_depth,
            memory_file,
        } => run_scan(&cli.db, root, *max_depth, memory_file),
        Command::List => run_list(&cli.db),
        Command::Recommend => run_recommend(&cli.db),
        Command::Version => {
            println!("atlas_core ping={}", atlas_core::ping());
            println!("atlas_core version={}", atlas_core::core_version());
            match logging_status() {
                Some(config) => println!(
                    "logging level={} dir={}",
                    config.level.as_str(),
                    config.dir.display()
                ),
                None => println!("logging off"),
            }
            Ok(())
        }
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run_scan(
    db: &Path,
    root: &Path,
    max_depth: usize,
    memory_file: &str,
) -> Result<(), String> {
    let options = ScanOptions {
        memory_file_name: memory_file.to_string(),
        max_depth,
        ..ScanOptions::default()
    };
    let report = scan_project(root, &options).map_err(|err| err.to_string())?;
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let store = SqliteDocumentRepository::try_new(&conn)
        .map_err(|err| err.to_string())?
        .with_memory_file_name(memory_file);
    let summary = import_scan(&store, &report).map_err(|err| err.to_string())?;
    println!(
        "imported directories={} memory_files={} doc_files={}",
        summary.directories, summary.memory_files, summary.doc_files
    );
    Ok(())
}

fn run_list(db: &Path) -> Result<(), String> {
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let store = SqliteDocumentRepository::try_new(&conn).map_err(|err| err.to_string())?;
    for document in store.fetch_documents().map_err(|err| err.to_string())? {
        println!("{}\t{} lines", document.path, document.content.lines().count());
    }
    Ok(())
}

fn run_recommend(db: &Path) -> Result<(), String> {
    let conn = open_db(db).map_err(|err| err.to_string())?;
    let store = SqliteDocumentRepository::try_new(&conn).map_err(|err| err.to_string())?;
    for path in store.fetch_recommendations().map_err(|err| err.to_string())? {
        println!("{path}");
    }
    Ok(())
}
