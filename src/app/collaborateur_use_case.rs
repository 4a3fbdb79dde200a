use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Collaborateur, StatutCollaborateur};
use crate::error::{EvalError, Result};
use crate::referentiel::columns::clean_header;
use crate::referentiel::parser::{FileFormat, RawTable};
use crate::referentiel::value::{clean_value, CellValue};
use crate::referentiel::TableReader;
use crate::storage::Storage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborateurCreate {
    pub civilite: String,
    pub prenom: String,
    pub nom: String,
    pub fonction: String,
    pub ref_ff: String,
    pub manager_id: Option<Uuid>,
    pub direction: String,
    pub departement: String,
    pub email: String,
    #[serde(default)]
    pub is_manager: bool,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborateurUpdate {
    pub civilite: Option<String>,
    pub prenom: Option<String>,
    pub nom: Option<String>,
    pub fonction: Option<String>,
    pub ref_ff: Option<String>,
    pub manager_id: Option<Uuid>,
    pub direction: Option<String>,
    pub departement: Option<String>,
    pub email: Option<String>,
    pub statut: Option<StatutCollaborateur>,
    pub is_manager: Option<bool>,
}

/// Columns of a collaborateur CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ImportColumn {
    Civilite,
    Prenom,
    Nom,
    Fonction,
    RefFf,
    ManagerEmail,
    Direction,
    Departement,
    Email,
    IsManager,
}

impl ImportColumn {
    fn key(self) -> &'static str {
        match self {
            ImportColumn::Civilite => "civilite",
            ImportColumn::Prenom => "prenom",
            ImportColumn::Nom => "nom",
            ImportColumn::Fonction => "fonction",
            ImportColumn::RefFf => "refFf",
            ImportColumn::ManagerEmail => "managerEmail",
            ImportColumn::Direction => "direction",
            ImportColumn::Departement => "departement",
            ImportColumn::Email => "email",
            ImportColumn::IsManager => "isManager",
        }
    }
}

/// Accepted spellings per column, compared after `clean_header`.
const IMPORT_ALIASES: &[(ImportColumn, &[&str])] = &[
    (ImportColumn::Civilite, &["CIVILITE", "CIVILITÉ"]),
    (ImportColumn::Prenom, &["PRENOM", "PRÉNOM"]),
    (ImportColumn::Nom, &["NOM"]),
    (ImportColumn::Fonction, &["FONCTION", "POSTE"]),
    (ImportColumn::RefFf, &["REF FF", "REFFF", "REF_FF"]),
    (
        ImportColumn::ManagerEmail,
        &["EMAIL MANAGER", "MANAGER EMAIL", "EMAIL DU MANAGER"],
    ),
    (ImportColumn::Direction, &["DIRECTION"]),
    (ImportColumn::Departement, &["DEPARTEMENT", "DÉPARTEMENT"]),
    (ImportColumn::Email, &["EMAIL", "E-MAIL", "MAIL"]),
    (ImportColumn::IsManager, &["MANAGER", "IS MANAGER", "EST MANAGER"]),
];

const IMPORT_REQUIRED: [ImportColumn; 3] =
    [ImportColumn::Prenom, ImportColumn::Nom, ImportColumn::Email];

const TRUTHY: &[&str] = &["OUI", "YES", "TRUE", "1", "X", "O"];

/// A CSV row that was not imported, with the 1-based file line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    pub row: usize,
    pub email: Option<String>,
    pub reason: String,
}

/// Outcome of a bulk collaborateur import.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborateurImport {
    pub created: Vec<Collaborateur>,
    pub rejected: Vec<RowRejection>,
    /// Rows with no cell filled in.
    pub skipped_rows: usize,
}

/// Employees, managers and the reporting line between them.
pub struct CollaborateurUseCase {
    storage: Arc<dyn Storage>,
    reader: TableReader,
}

impl CollaborateurUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_reader(storage, TableReader::new())
    }

    pub fn with_reader(storage: Arc<dyn Storage>, reader: TableReader) -> Self {
        Self { storage, reader }
    }

    async fn require(&self, tenant_id: &str, id: Uuid) -> Result<Collaborateur> {
        self.storage
            .get_collaborateur(tenant_id, id)
            .await?
            .ok_or_else(|| EvalError::NotFound(format!("Collaborateur {}", id)))
    }

    async fn check_manager(&self, tenant_id: &str, manager_id: Uuid) -> Result<()> {
        match self.storage.get_collaborateur(tenant_id, manager_id).await? {
            Some(_) => Ok(()),
            None => Err(EvalError::Validation(format!(
                "Manager {} not found",
                manager_id
            ))),
        }
    }

    async fn check_email_free(&self, tenant_id: &str, email: &str) -> Result<()> {
        if self
            .storage
            .find_collaborateur_by_email(tenant_id, email)
            .await?
            .is_some()
        {
            return Err(EvalError::Conflict(format!("Email {} already used", email)));
        }
        Ok(())
    }

    pub async fn create(&self, tenant_id: &str, data: CollaborateurCreate) -> Result<Collaborateur> {
        let email = data.email.trim().to_string();
        if email.is_empty() {
            return Err(EvalError::Validation("email must not be empty".to_string()));
        }
        if let Some(manager_id) = data.manager_id {
            self.check_manager(tenant_id, manager_id).await?;
        }
        self.check_email_free(tenant_id, &email).await?;

        let mut collaborateur = Collaborateur {
            id: None,
            tenant_id: tenant_id.to_string(),
            civilite: data.civilite,
            prenom: data.prenom,
            nom: data.nom,
            fonction: data.fonction,
            ref_ff: data.ref_ff,
            manager_id: data.manager_id,
            direction: data.direction,
            departement: data.departement,
            email,
            is_manager: data.is_manager,
            statut: StatutCollaborateur::Actif,
            created_at: Utc::now(),
        };
        self.storage.create_collaborateur(&mut collaborateur).await?;

        info!(email = %collaborateur.email, "Created collaborateur");
        Ok(collaborateur)
    }

    pub async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Collaborateur> {
        self.require(tenant_id, id).await
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: Uuid,
        data: CollaborateurUpdate,
    ) -> Result<Collaborateur> {
        let mut collaborateur = self.require(tenant_id, id).await?;

        if let Some(manager_id) = data.manager_id {
            if manager_id == id {
                return Err(EvalError::Validation(
                    "A collaborateur cannot manage themself".to_string(),
                ));
            }
            self.check_manager(tenant_id, manager_id).await?;
            collaborateur.manager_id = Some(manager_id);
        }
        if let Some(email) = data.email {
            let email = email.trim().to_string();
            if !email.eq_ignore_ascii_case(&collaborateur.email) {
                self.check_email_free(tenant_id, &email).await?;
            }
            collaborateur.email = email;
        }

        let fields = [
            (data.civilite, &mut collaborateur.civilite),
            (data.prenom, &mut collaborateur.prenom),
            (data.nom, &mut collaborateur.nom),
            (data.fonction, &mut collaborateur.fonction),
            (data.ref_ff, &mut collaborateur.ref_ff),
            (data.direction, &mut collaborateur.direction),
            (data.departement, &mut collaborateur.departement),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(statut) = data.statut {
            collaborateur.statut = statut;
        }
        if let Some(is_manager) = data.is_manager {
            collaborateur.is_manager = is_manager;
        }

        self.storage.update_collaborateur(&collaborateur).await?;
        Ok(collaborateur)
    }

    /// Flips between active and archived.
    pub async fn toggle_archive(&self, tenant_id: &str, id: Uuid) -> Result<StatutCollaborateur> {
        let mut collaborateur = self.require(tenant_id, id).await?;
        collaborateur.statut = collaborateur.statut.toggled();
        self.storage.update_collaborateur(&collaborateur).await?;
        Ok(collaborateur.statut)
    }

    /// Refused while anyone, archived or not, still reports to this person.
    pub async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<Uuid> {
        self.require(tenant_id, id).await?;
        let reports = self.reports(tenant_id, id).await?;
        if !reports.is_empty() {
            return Err(EvalError::Conflict(format!(
                "Collaborateur {} still manages {} people, reassign them first",
                id,
                reports.len()
            )));
        }
        self.storage.delete_collaborateur(tenant_id, id).await?;
        info!(%id, "Deleted collaborateur");
        Ok(id)
    }

    /// Case-insensitive substring search over first name, last name, email and `ref_ff`.
    pub async fn list(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        statut: Option<StatutCollaborateur>,
    ) -> Result<Vec<Collaborateur>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let all = self.storage.list_collaborateurs(tenant_id).await?;
        Ok(all
            .into_iter()
            .filter(|c| statut.map_or(true, |s| c.statut == s))
            .filter(|c| match &needle {
                Some(needle) => [&c.prenom, &c.nom, &c.email, &c.ref_ff]
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .collect())
    }

    pub async fn list_managers(&self, tenant_id: &str) -> Result<Vec<Collaborateur>> {
        Ok(self
            .storage
            .list_collaborateurs(tenant_id)
            .await?
            .into_iter()
            .filter(|c| c.is_manager)
            .collect())
    }

    /// Bulk-creates collaborateurs from a CSV export.
    ///
    /// Rows go through `create` in file order, so a manager referenced by
    /// email must appear before their reports. Rows failing validation are
    /// reported in `rejected`; storage failures abort the import.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn import(&self, tenant_id: &str, path: &Path) -> Result<CollaborateurImport> {
        if FileFormat::from_path(path)? != FileFormat::Csv {
            return Err(EvalError::UnsupportedFormat(path.display().to_string()));
        }
        let table = self.reader.read(path)?;
        self.import_table(tenant_id, &table).await
    }

    pub async fn import_table(
        &self,
        tenant_id: &str,
        table: &RawTable,
    ) -> Result<CollaborateurImport> {
        let columns = import_columns(&table.headers);
        let missing: Vec<String> = IMPORT_REQUIRED
            .iter()
            .filter(|column| !columns.contains_key(*column))
            .map(|column| column.key().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(EvalError::MissingRequiredColumns {
                missing,
                found: table.headers.iter().map(|h| clean_header(h)).collect(),
            });
        }

        let mut outcome = CollaborateurImport::default();
        for (index, cells) in table.rows.iter().enumerate() {
            // header is line 1
            let row = index + 2;
            let text = |column: ImportColumn| -> Option<String> {
                let cell = cells.get(*columns.get(&column)?)?;
                clean_value(cell)
                    .as_ref()
                    .and_then(CellValue::as_text)
                    .filter(|t| !t.is_empty())
            };
            if cells.iter().all(|cell| clean_value(cell).is_none()) {
                outcome.skipped_rows += 1;
                continue;
            }

            let email = text(ImportColumn::Email);
            match self.import_row(tenant_id, &text).await {
                Ok(collaborateur) => outcome.created.push(collaborateur),
                Err(
                    e @ (EvalError::Validation(_) | EvalError::Conflict(_) | EvalError::NotFound(_)),
                ) => {
                    warn!(row, email = ?email, "Collaborateur row rejected: {}", e);
                    outcome.rejected.push(RowRejection {
                        row,
                        email,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            created = outcome.created.len(),
            rejected = outcome.rejected.len(),
            skipped = outcome.skipped_rows,
            "Imported collaborateurs"
        );
        Ok(outcome)
    }

    async fn import_row(
        &self,
        tenant_id: &str,
        text: &impl Fn(ImportColumn) -> Option<String>,
    ) -> Result<Collaborateur> {
        for column in [ImportColumn::Prenom, ImportColumn::Nom] {
            if text(column).is_none() {
                return Err(EvalError::Validation(format!(
                    "{} must not be empty",
                    column.key()
                )));
            }
        }

        let manager_id = match text(ImportColumn::ManagerEmail) {
            Some(manager_email) => {
                let manager = self
                    .storage
                    .find_collaborateur_by_email(tenant_id, manager_email.trim())
                    .await?
                    .ok_or_else(|| {
                        EvalError::Validation(format!("Manager {} not found", manager_email))
                    })?;
                debug!(manager = %manager.email, "Resolved manager by email");
                manager.id
            }
            None => None,
        };

        let is_manager = text(ImportColumn::IsManager)
            .map(|v| TRUTHY.contains(&v.trim().to_uppercase().as_str()))
            .unwrap_or(false);
        let data = CollaborateurCreate {
            civilite: text(ImportColumn::Civilite).unwrap_or_default(),
            prenom: text(ImportColumn::Prenom).unwrap_or_default(),
            nom: text(ImportColumn::Nom).unwrap_or_default(),
            fonction: text(ImportColumn::Fonction).unwrap_or_default(),
            ref_ff: text(ImportColumn::RefFf).unwrap_or_default(),
            manager_id,
            direction: text(ImportColumn::Direction).unwrap_or_default(),
            departement: text(ImportColumn::Departement).unwrap_or_default(),
            email: text(ImportColumn::Email).unwrap_or_default(),
            is_manager,
        };
        self.create(tenant_id, data).await
    }

    /// Active direct reports of a manager.
    pub async fn team(&self, tenant_id: &str, manager_id: Uuid) -> Result<Vec<Collaborateur>> {
        Ok(self
            .reports(tenant_id, manager_id)
            .await?
            .into_iter()
            .filter(|c| c.statut == StatutCollaborateur::Actif)
            .collect())
    }

    async fn reports(&self, tenant_id: &str, manager_id: Uuid) -> Result<Vec<Collaborateur>> {
        Ok(self
            .storage
            .list_collaborateurs(tenant_id)
            .await?
            .into_iter()
            .filter(|c| c.manager_id == Some(manager_id))
            .collect())
    }
}

/// Last column wins when two headers name the same field.
fn import_columns(headers: &[String]) -> HashMap<ImportColumn, usize> {
    let mut columns = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let cleaned = clean_header(header);
        let found = IMPORT_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&cleaned.as_str()))
            .map(|(column, _)| *column);
        if let Some(column) = found {
            columns.insert(column, index);
        }
    }
    columns
}
