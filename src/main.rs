use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use rh_eval::app::{
    CampagneCreate, CampagneUseCase, CollaborateurCreate, CollaborateurUseCase, EvaluationUseCase,
    FicheCreate, FicheUseCase, ReferentielUseCase,
};
use rh_eval::config::Config;
use rh_eval::domain::StatutCollaborateur;
use rh_eval::error::EvalError;
use rh_eval::logging;
use rh_eval::referentiel::record::CompetenceRecord;
use rh_eval::referentiel::TableReader;
use rh_eval::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "rh_eval")]
#[command(about = "Competency reference framework import and evaluation campaigns")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV/XLSX reference framework without persisting anything
    Preview {
        file: PathBuf,
        /// Write the preview JSON to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Persist records from a preview document (or a bare record array)
    Confirm {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Preview then confirm a file in one step
    Import {
        file: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// List the competences of a tenant
    Competences {
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Create a job-role sheet from a JSON description
    Fiche {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Create a collaborateur from a JSON description
    Collaborateur {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Bulk-create collaborateurs from a CSV export
    ImportCollaborateurs {
        file: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// List collaborateurs, optionally filtered
    Collaborateurs {
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Show archived collaborateurs instead of active ones
        #[arg(long)]
        archived: bool,
    },
    /// Create a campaign and generate its evaluations
    Campagne {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// List evaluations with freshly computed gaps
    Evaluations {
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        campagne: Option<Uuid>,
    },
}

/// `confirm` input: either the output of `preview` or just its records.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsInput {
    Preview { records: Vec<CompetenceRecord> },
    Records(Vec<CompetenceRecord>),
}

impl RecordsInput {
    fn into_records(self) -> Vec<CompetenceRecord> {
        match self {
            RecordsInput::Preview { records } | RecordsInput::Records(records) => records,
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands, config: &Config, storage: Arc<dyn Storage>) -> anyhow::Result<()> {
    let tenant = |t: Option<String>| t.unwrap_or_else(|| config.import.default_tenant.clone());
    let reader = TableReader::with_missing_values(config.import.missing_values.clone());

    match command {
        Commands::Preview { file, output } => {
            let referentiel = ReferentielUseCase::with_reader(storage, reader);
            let preview = referentiel.preview(&file).await?;
            match output {
                Some(path) => {
                    fs::write(&path, serde_json::to_string_pretty(&preview)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "✅ {} records previewed ({} rows skipped) -> {}",
                        preview.records.len(),
                        preview.skipped_rows,
                        path.display()
                    );
                }
                None => print_json(&preview)?,
            }
        }
        Commands::Confirm { records, tenant: t } => {
            let input: RecordsInput = read_json(&records)?;
            let referentiel = ReferentielUseCase::with_reader(storage, reader);
            let created = referentiel.confirm(&tenant(t), input.into_records()).await?;
            print_json(&created)?;
        }
        Commands::Import { file, tenant: t } => {
            let referentiel = ReferentielUseCase::with_reader(storage, reader);
            let created = referentiel.import(&tenant(t), &file).await?;
            print_json(&created)?;
        }
        Commands::Competences { tenant: t } => {
            let referentiel = ReferentielUseCase::new(storage);
            print_json(&referentiel.list_competences(&tenant(t)).await?)?;
        }
        Commands::Fiche { input, tenant: t } => {
            let data: FicheCreate = read_json(&input)?;
            let fiche = FicheUseCase::new(storage).create_fiche(&tenant(t), data).await?;
            print_json(&fiche)?;
        }
        Commands::Collaborateur { input, tenant: t } => {
            let data: CollaborateurCreate = read_json(&input)?;
            let created = CollaborateurUseCase::new(storage).create(&tenant(t), data).await?;
            print_json(&created)?;
        }
        Commands::ImportCollaborateurs { file, tenant: t } => {
            let outcome = CollaborateurUseCase::with_reader(storage, reader)
                .import(&tenant(t), &file)
                .await?;
            print_json(&outcome)?;
            eprintln!(
                "✅ {} collaborateurs created, {} rows rejected",
                outcome.created.len(),
                outcome.rejected.len()
            );
        }
        Commands::Collaborateurs {
            tenant: t,
            search,
            archived,
        } => {
            let statut = if archived {
                StatutCollaborateur::Archive
            } else {
                StatutCollaborateur::Actif
            };
            let found = CollaborateurUseCase::new(storage)
                .list(&tenant(t), search.as_deref(), Some(statut))
                .await?;
            print_json(&found)?;
        }
        Commands::Campagne { input, tenant: t } => {
            let data: CampagneCreate = read_json(&input)?;
            let launch = CampagneUseCase::new(storage).create_campagne(&tenant(t), data).await?;
            print_json(&launch)?;
        }
        Commands::Evaluations { tenant: t, campagne } => {
            let evaluations = EvaluationUseCase::new(storage)
                .list_evaluations(&tenant(t), campagne)
                .await?;
            print_json(&evaluations)?;
        }
    }
    Ok(())
}

/// Exit code for a file rejected before anything was persisted.
const EXIT_IMPORT_REJECTED: u8 = 2;

/// User-facing message and exit code for a failed command.
fn failure_report(e: &anyhow::Error) -> (String, u8) {
    match e.downcast_ref::<EvalError>() {
        Some(eval) if eval.is_import_failure() => (
            format!(
                "❌ Import rejected, nothing was saved: {}\n   Fix the file and run the command again.",
                eval
            ),
            EXIT_IMPORT_REJECTED,
        ),
        _ => (format!("❌ Command failed: {:#}", e), 1),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::load()?;
    let _guard = logging::init_logging(&config.logging);

    let cli = Cli::parse();

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database.path)?);
    info!(database = %config.database.path.display(), "Opened storage");

    match run(cli.command, &config, storage).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Command failed: {:#}", e);
            let (message, code) = failure_report(&e);
            eprintln!("{}", message);
            Ok(ExitCode::from(code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_files_get_their_own_exit_code() {
        let e = anyhow::Error::from(EvalError::MissingRequiredColumns {
            missing: vec!["axe".into()],
            found: vec!["REF".into()],
        });
        let (message, code) = failure_report(&e);
        assert_eq!(code, EXIT_IMPORT_REJECTED);
        assert!(message.contains("nothing was saved"));
        assert!(message.contains("axe"));

        let e = anyhow::Error::from(EvalError::UnsupportedFormat("notes.txt".into()))
            .context("previewing notes.txt");
        assert_eq!(failure_report(&e).1, EXIT_IMPORT_REJECTED);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let e = anyhow::Error::from(EvalError::Conflict("Email a@acme.fr already used".into()));
        let (message, code) = failure_report(&e);
        assert_eq!(code, 1);
        assert!(message.contains("already used"));
    }
}
