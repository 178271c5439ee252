//! Scrupdate data maintenance CLI.
//!
//! Provides the `scrupdate-db` binary for inspecting and repairing the
//! program database and settings file outside the application: integrity
//! checks, listing, migration and resets.
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;

use scrupdate_core::Program;
use scrupdate_storage::{
    DataPaths, OpenOptions, ProgramDatabase, ProgramRepository, SettingsStore, StoreError,
};

/// Scrupdate data maintenance tools.
#[derive(Parser)]
#[command(name = "scrupdate-db", about = "Scrupdate data maintenance tools")]
struct Cli {
    /// Data directory (default: $SCRUPDATE_DATA_DIR, then ./Data).
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create an empty program database.
    Init,

    /// Verify the program database without creating or migrating it.
    Check,

    /// Print all programs as JSON.
    List {
        /// Include hidden programs.
        #[arg(short, long)]
        all: bool,
    },

    /// Print one program as JSON.
    Show {
        name: String,
    },

    /// Remove a program.
    Remove {
        name: String,
    },

    /// Migrate the program database to the current schema version.
    Migrate,

    /// Delete the program database and its checksum.
    Reset,

    /// Print the settings, resetting them if they are unusable.
    Settings,
}

/// Exit codes: 0 = success, 1 = not found / nothing done,
/// 2 = corrupted or incompatible data, 3 = I/O or other error.
const EXIT_OK: i32 = 0;
const EXIT_NOT_FOUND: i32 = 1;
const EXIT_UNUSABLE: i32 = 2;
const EXIT_OTHER: i32 = 3;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = match cli.data_dir {
        Some(dir) => DataPaths::new(dir),
        None => DataPaths::from_env(),
    };

    let exit_code = match cli.command {
        Commands::Init => run_init(&paths),
        Commands::Check => run_check(&paths),
        Commands::List { all } => run_list(&paths, all),
        Commands::Show { name } => run_show(&paths, &name),
        Commands::Remove { name } => run_remove(&paths, &name),
        Commands::Migrate => run_migrate(&paths),
        Commands::Reset => run_reset(&paths),
        Commands::Settings => run_settings(&paths),
    };
    process::exit(exit_code);
}

/// Maps a store error to an exit code after reporting it.
fn fail(context: &str, e: &StoreError) -> i32 {
    eprintln!("Error: {}: {}", context, e);
    match e {
        StoreError::NotFound { .. } => EXIT_NOT_FOUND,
        e if e.is_resettable() || matches!(e, StoreError::MigrationRequired { .. }) => {
            EXIT_UNUSABLE
        }
        _ => EXIT_OTHER,
    }
}

fn print_json(value: &serde_json::Value) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

fn open_existing(paths: &DataPaths, options: OpenOptions) -> Result<ProgramDatabase, i32> {
    let mut db = ProgramDatabase::new(paths);
    match db.open(options) {
        Ok(()) => Ok(db),
        Err(e) => Err(fail("failed to open program database", &e)),
    }
}

fn run_init(paths: &DataPaths) -> i32 {
    match ProgramDatabase::new(paths).create() {
        Ok(()) => {
            print_json(&serde_json::json!({
                "created": paths.program_database(),
            }));
            EXIT_OK
        }
        Err(e) => fail("failed to create program database", &e),
    }
}

fn run_check(paths: &DataPaths) -> i32 {
    let db = match open_existing(paths, OpenOptions::default()) {
        Ok(db) => db,
        Err(code) => return code,
    };
    let programs = match db.get_all_programs() {
        Ok(Some(programs)) => programs,
        Ok(None) => {
            eprintln!("Error: program rows could not be read");
            return EXIT_UNUSABLE;
        }
        Err(e) => return fail("failed to read programs", &e),
    };

    print_json(&serde_json::json!({
        "path": db.path(),
        "version": db.schema().version.to_string(),
        "programs": programs.len(),
        "hidden": programs.values().filter(|p| p.is_hidden).count(),
        "pending_updates": programs.values().filter(|p| p.has_pending_update()).count(),
    }));
    EXIT_OK
}

fn run_list(paths: &DataPaths, include_hidden: bool) -> i32 {
    let db = match open_existing(paths, OpenOptions::default()) {
        Ok(db) => db,
        Err(code) => return code,
    };
    let programs = match db.get_all_programs() {
        Ok(Some(programs)) => programs,
        Ok(None) => {
            eprintln!("Error: program rows could not be read");
            return EXIT_UNUSABLE;
        }
        Err(e) => return fail("failed to read programs", &e),
    };

    let mut listed: Vec<&Program> = programs
        .values()
        .filter(|program| include_hidden || !program.is_hidden)
        .collect();
    listed.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    match serde_json::to_value(&listed) {
        Ok(value) => {
            print_json(&value);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: failed to serialize programs: {}", e);
            EXIT_OTHER
        }
    }
}

fn run_show(paths: &DataPaths, name: &str) -> i32 {
    let db = match open_existing(paths, OpenOptions::default()) {
        Ok(db) => db,
        Err(code) => return code,
    };
    match db.get_program(name) {
        Ok(Some(program)) => match serde_json::to_value(&program) {
            Ok(value) => {
                print_json(&value);
                EXIT_OK
            }
            Err(e) => {
                eprintln!("Error: failed to serialize program: {}", e);
                EXIT_OTHER
            }
        },
        Ok(None) => {
            eprintln!("Error: no program named '{}'", name);
            EXIT_NOT_FOUND
        }
        Err(e) => fail("failed to read program", &e),
    }
}

fn run_remove(paths: &DataPaths, name: &str) -> i32 {
    let mut db = match open_existing(paths, OpenOptions::default()) {
        Ok(db) => db,
        Err(code) => return code,
    };
    match db.remove_program(name) {
        Ok(true) => {
            info!(name, "removed program");
            print_json(&serde_json::json!({ "removed": name }));
            EXIT_OK
        }
        Ok(false) => {
            eprintln!("Error: no program named '{}'", name);
            EXIT_NOT_FOUND
        }
        Err(e) => fail("failed to remove program", &e),
    }
}

fn run_migrate(paths: &DataPaths) -> i32 {
    let options = OpenOptions {
        create_if_missing: false,
        migrate_if_compatible: true,
    };
    let mut db = match open_existing(paths, options) {
        Ok(db) => db,
        Err(code) => return code,
    };
    if let Err(e) = db.close() {
        return fail("failed to close program database", &e);
    }
    print_json(&serde_json::json!({
        "version": db.schema().version.to_string(),
    }));
    EXIT_OK
}

fn run_reset(paths: &DataPaths) -> i32 {
    match ProgramDatabase::new(paths).destroy() {
        Ok(()) => {
            print_json(&serde_json::json!({
                "removed": paths.program_database(),
            }));
            EXIT_OK
        }
        Err(e) => fail("failed to remove program database", &e),
    }
}

fn run_settings(paths: &DataPaths) -> i32 {
    let mut store = match SettingsStore::open_in(paths) {
        Ok(store) => store,
        Err(e) => return fail("failed to open settings", &e),
    };
    let (settings, reset_reason) = match store.load_or_reset() {
        Ok(loaded) => loaded,
        Err(e) => return fail("failed to load settings", &e),
    };
    if let Some(reason) = reset_reason {
        eprintln!("Warning: settings were reset to defaults: {}", reason);
    }
    match serde_json::to_value(&settings) {
        Ok(value) => {
            print_json(&value);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: failed to serialize settings: {}", e);
            EXIT_OTHER
        }
    }
}
