use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::Competence;
use crate::error::Result;
use crate::referentiel::columns::HeaderCollision;
use crate::referentiel::parser::RawTable;
use crate::referentiel::record::CompetenceRecord;
use crate::referentiel::{assemble_table, TableReader};
use crate::storage::Storage;

/// Output of the preview phase. Nothing has been persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub records: Vec<CompetenceRecord>,
    pub skipped_rows: usize,
    /// Records whose `nom`, `domaine`, `axe` or `categorie` came out null.
    pub incomplete_records: usize,
    pub header_collisions: Vec<HeaderCollision>,
    pub source_sha256: String,
}

/// Two-phase import of a reference framework: `preview` parses a file,
/// `confirm` persists a previewed batch for one tenant.
pub struct ReferentielUseCase {
    storage: Arc<dyn Storage>,
    reader: TableReader,
}

impl ReferentielUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_reader(storage, TableReader::new())
    }

    pub fn with_reader(storage: Arc<dyn Storage>, reader: TableReader) -> Self {
        Self { storage, reader }
    }

    /// Parse and normalize a file without persisting anything.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn preview(&self, path: &Path) -> Result<ImportPreview> {
        let table = {
            let _timing = crate::metrics::import::time_parse();
            self.reader.read(path)
        };
        let preview = table.and_then(|table| self.preview_table(&table));
        if let Err(e) = &preview {
            crate::metrics::import::failed();
            warn!("Preview failed: {}", e);
        }
        preview
    }

    /// Same as `preview` for a table already read by the caller.
    pub fn preview_table(&self, table: &RawTable) -> Result<ImportPreview> {
        let assembled = assemble_table(table)?;

        crate::metrics::import::rows_read(table.rows.len());
        crate::metrics::import::rows_skipped(assembled.skipped_rows);
        crate::metrics::import::header_collisions(assembled.header_collisions.len());

        info!(
            rows = table.rows.len(),
            records = assembled.records.len(),
            skipped = assembled.skipped_rows,
            incomplete = assembled.incomplete_records,
            sha256 = %table.source_sha256,
            "Previewed reference-framework file"
        );

        Ok(ImportPreview {
            records: assembled.records,
            skipped_rows: assembled.skipped_rows,
            incomplete_records: assembled.incomplete_records,
            header_collisions: assembled.header_collisions,
            source_sha256: table.source_sha256.clone(),
        })
    }

    /// Persist every record whose `refComp` is not yet known for the tenant.
    ///
    /// Records are handled one at a time, so a repeated `refComp` later in the
    /// same batch sees the earlier insert and is skipped. There is no batch
    /// transaction: if an insert fails, records created before it stay.
    /// Returns only the newly created competences, in input order.
    #[instrument(skip(self, records), fields(batch = records.len()))]
    pub async fn confirm(
        &self,
        tenant_id: &str,
        records: Vec<CompetenceRecord>,
    ) -> Result<Vec<Competence>> {
        let total = records.len();
        let mut created = Vec::new();

        for record in records {
            if self
                .storage
                .find_competence(tenant_id, &record.ref_comp)
                .await?
                .is_some()
            {
                debug!(ref_comp = %record.ref_comp, "Skipping duplicate competence");
                crate::metrics::import::duplicate_skipped();
                continue;
            }

            let mut competence = Competence::new(record, tenant_id, Utc::now());
            self.storage.create_competence(&mut competence).await?;
            crate::metrics::import::record_created();
            created.push(competence);
        }

        info!(
            created = created.len(),
            duplicates = total - created.len(),
            "Confirmed reference-framework import"
        );
        Ok(created)
    }

    /// Preview then confirm in one call.
    pub async fn import(&self, tenant_id: &str, path: &Path) -> Result<Vec<Competence>> {
        let preview = self.preview(path).await?;
        self.confirm(tenant_id, preview.records).await
    }

    pub async fn list_competences(&self, tenant_id: &str) -> Result<Vec<Competence>> {
        self.storage.list_competences(tenant_id).await
    }
}
