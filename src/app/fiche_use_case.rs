use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::FicheFonction;
use crate::error::{EvalError, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FicheCreate {
    pub ref_ff: String,
    pub intitule: String,
    #[serde(default)]
    pub competences: Vec<String>,
}

/// Job-role sheets and the competencies they require.
pub struct FicheUseCase {
    storage: Arc<dyn Storage>,
}

impl FicheUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Every listed competency must already exist for the tenant.
    pub async fn create_fiche(&self, tenant_id: &str, data: FicheCreate) -> Result<FicheFonction> {
        let ref_ff = data.ref_ff.trim().to_string();
        if ref_ff.is_empty() {
            return Err(EvalError::Validation("refFf must not be empty".to_string()));
        }
        if self.storage.find_fiche(tenant_id, &ref_ff).await?.is_some() {
            return Err(EvalError::Conflict(format!(
                "Fiche de fonction {} already exists",
                ref_ff
            )));
        }
        for ref_comp in &data.competences {
            if self
                .storage
                .find_competence(tenant_id, ref_comp)
                .await?
                .is_none()
            {
                return Err(EvalError::Validation(format!(
                    "Compétence {} introuvable",
                    ref_comp
                )));
            }
        }

        let mut fiche = FicheFonction {
            id: None,
            tenant_id: tenant_id.to_string(),
            ref_ff,
            intitule: data.intitule,
            competences: data.competences,
            created_at: Utc::now(),
        };
        self.storage.create_fiche(&mut fiche).await?;

        info!(
            ref_ff = %fiche.ref_ff,
            competences = fiche.competences.len(),
            "Created fiche de fonction"
        );
        Ok(fiche)
    }

    pub async fn list_fiches(&self, tenant_id: &str) -> Result<Vec<FicheFonction>> {
        self.storage.list_fiches(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Competence;
    use crate::referentiel::record::CompetenceRecord;
    use crate::storage::InMemoryStorage;

    async fn storage_with(refs: &[&str]) -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        for r in refs {
            let record = CompetenceRecord {
                ref_comp: r.to_string(),
                domaine: Some("Tech".into()),
                axe: Some("Dev".into()),
                categorie: Some("Core".into()),
                nom: Some(r.to_string()),
                definition: None,
                niveaux: Default::default(),
                niveau_attendu: Default::default(),
                norme: None,
            };
            storage
                .create_competence(&mut Competence::new(record, "acme", Utc::now()))
                .await
                .unwrap();
        }
        storage
    }

    fn fiche(ref_ff: &str, competences: &[&str]) -> FicheCreate {
        FicheCreate {
            ref_ff: ref_ff.to_string(),
            intitule: "Développeur".to_string(),
            competences: competences.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn creates_fiche_when_competences_exist() {
        let uc = FicheUseCase::new(storage_with(&["C1", "C2"]).await);
        let created = uc.create_fiche("acme", fiche("FF01", &["C1", "C2"])).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(uc.list_fiches("acme").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_competence_is_rejected() {
        let uc = FicheUseCase::new(storage_with(&["C1"]).await);
        let err = uc
            .create_fiche("acme", fiche("FF01", &["C1", "C404"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("C404"));
        assert!(uc.list_fiches("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn competences_are_checked_in_the_fiche_tenant() {
        let uc = FicheUseCase::new(storage_with(&["C1"]).await);
        let err = uc.create_fiche("beta", fiche("FF01", &["C1"])).await.unwrap_err();
        assert!(matches!(err, EvalError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_ref_ff_conflicts() {
        let uc = FicheUseCase::new(storage_with(&[]).await);
        uc.create_fiche("acme", fiche("FF01", &[])).await.unwrap();
        let err = uc.create_fiche("acme", fiche(" FF01 ", &[])).await.unwrap_err();
        assert!(matches!(err, EvalError::Conflict(_)));
    }
}
