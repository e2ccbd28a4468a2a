use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sc_core::cfg::{self, AppId};
use sc_core::reconcile::{Outcome, Session};
use sc_core::sc::ScExe;
use sc_core::{logx, parse};
use tracing::info;

const APP: AppId = AppId {
    qualifier: "com",
    organization: "local",
    application: env!("CARGO_PKG_NAME"),
};

#[derive(Parser)]
#[command(name=env!("CARGO_PKG_NAME"), version, about="Windows service recovery reconciler")]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List services known to the service control manager.
    List,
    /// Show the observed recovery configuration of one service.
    Show {
        /// Service name to query.
        service: String,
        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Parse a captured qfailure report instead of querying sc.exe.
    Parse {
        /// File holding the captured output.
        file: PathBuf,
        /// Record name (default: the capture's SERVICE_NAME, then the file stem).
        #[arg(long)]
        name: Option<String>,
        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Reconcile declared manifest records against observed state.
    Apply {
        /// TOML manifest with one [[service]] table per service.
        #[arg(long)]
        manifest: PathBuf,
        /// Report what would change without running sc.exe failure.
        #[arg(long)]
        noop: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cfg::load_or_init(&APP).context("load config")?;
    let level = match cli.verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    logx::init(level);

    let runner = ScExe;
    match cli.cmd {
        Command::List => {
            let mut session = Session::new(&runner);
            for name in session.services()? {
                println!("{name}");
            }
        }
        Command::Show { service, json } => {
            let mut session = Session::new(&runner);
            let record = session.observed(&service)?;
            if json {
                println!("{}", serde_json::to_string_pretty(record)?);
            } else {
                print!("{record}");
            }
        }
        Command::Parse { file, name, json } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let name = name
                .or_else(|| parse::service_name_of(&raw))
                .unwrap_or_else(|| file_stem(&file));
            let record = parse::parse_qfailure(&name, &raw)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{record}");
            }
        }
        Command::Apply { manifest, noop } => {
            let manifest = cfg::load_manifest(&manifest)?;
            let mut session = Session::new(&runner);
            let results = session.reconcile_all(&manifest.services, noop);
            let mut out_of_sync = 0usize;
            let mut failed = 0usize;
            for (_, result) in &results {
                match result {
                    Ok(Outcome::Unchanged) => {}
                    Ok(_) => out_of_sync += 1,
                    Err(_) => failed += 1,
                }
            }
            info!(
                "{} service(s): {out_of_sync} out of sync, {failed} failed",
                results.len()
            );
            if failed > 0 {
                bail!("{failed} of {} services failed", results.len());
            }
        }
    }
    Ok(())
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "service".to_string())
}
