use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{
    Campagne, Collaborateur, DetailEvaluation, Evaluation, StatutCampagne, StatutCollaborateur,
    StatutEvaluation,
};
use crate::error::{EvalError, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampagneCreate {
    pub nom: String,
    #[serde(default)]
    pub description: String,
    pub date_debut: DateTime<Utc>,
    pub date_fin: DateTime<Utc>,
    #[serde(default)]
    pub fiches_incluses: Vec<String>,
}

/// A created campaign and the evaluations generated for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampagneLaunch {
    pub campagne: Campagne,
    pub evaluations: Vec<Evaluation>,
}

pub struct CampagneUseCase {
    storage: Arc<dyn Storage>,
}

impl CampagneUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Creates the campaign and one pending evaluation per active collaborateur
    /// whose job-role sheet is included. The campaign moves to `EnCours` once
    /// at least one evaluation exists.
    #[instrument(skip(self, data), fields(nom = %data.nom))]
    pub async fn create_campagne(
        &self,
        tenant_id: &str,
        data: CampagneCreate,
    ) -> Result<CampagneLaunch> {
        if data.nom.trim().is_empty() {
            return Err(EvalError::Validation("nom must not be empty".to_string()));
        }
        if data.date_fin < data.date_debut {
            return Err(EvalError::Validation(
                "dateFin must not be before dateDebut".to_string(),
            ));
        }

        let mut campagne = Campagne {
            id: None,
            tenant_id: tenant_id.to_string(),
            nom: data.nom,
            description: data.description,
            date_debut: data.date_debut,
            date_fin: data.date_fin,
            fiches_incluses: data.fiches_incluses,
            statut: StatutCampagne::Brouillon,
            created_at: Utc::now(),
        };
        self.storage.create_campagne(&mut campagne).await?;

        let evaluations = self.generate_evaluations(&campagne).await?;
        crate::metrics::campaign::evaluations_generated(evaluations.len());

        if !evaluations.is_empty() {
            campagne.statut = StatutCampagne::EnCours;
            self.storage.update_campagne(&campagne).await?;
        }

        info!(
            evaluations = evaluations.len(),
            statut = ?campagne.statut,
            "Created campagne"
        );
        Ok(CampagneLaunch {
            campagne,
            evaluations,
        })
    }

    async fn generate_evaluations(&self, campagne: &Campagne) -> Result<Vec<Evaluation>> {
        let campagne_id = campagne
            .id
            .ok_or_else(|| EvalError::Storage("campagne has no id".to_string()))?;
        let tenant_id = campagne.tenant_id.as_str();
        let included: HashSet<&str> = campagne.fiches_incluses.iter().map(String::as_str).collect();

        let targets: Vec<Collaborateur> = self
            .storage
            .list_collaborateurs(tenant_id)
            .await?
            .into_iter()
            .filter(|c| c.statut == StatutCollaborateur::Actif)
            .filter(|c| included.contains(c.ref_ff.as_str()))
            .collect();

        let mut evaluations = Vec::with_capacity(targets.len());
        for collaborateur in targets {
            let Some(collaborateur_id) = collaborateur.id else {
                continue;
            };
            let Some(fiche) = self.storage.find_fiche(tenant_id, &collaborateur.ref_ff).await? else {
                warn!(ref_ff = %collaborateur.ref_ff, "Fiche de fonction not found, skipping");
                continue;
            };

            let mut details = Vec::with_capacity(fiche.competences.len());
            for ref_comp in &fiche.competences {
                match self.storage.find_competence(tenant_id, ref_comp).await? {
                    Some(competence) => {
                        details.push(DetailEvaluation::pending(
                            ref_comp,
                            competence.expected_level(),
                        ));
                    }
                    None => warn!(%ref_comp, ref_ff = %fiche.ref_ff, "Competence not found"),
                }
            }

            let mut evaluation = Evaluation {
                id: None,
                tenant_id: tenant_id.to_string(),
                campagne_id,
                collaborateur_id,
                manager_id: collaborateur.manager_id,
                details,
                statut: StatutEvaluation::EnAttente,
                commentaires_collaborateur: None,
                created_at: Utc::now(),
            };
            self.storage.create_evaluation(&mut evaluation).await?;
            evaluations.push(evaluation);
        }
        Ok(evaluations)
    }

    pub async fn list_campagnes(&self, tenant_id: &str) -> Result<Vec<Campagne>> {
        self.storage.list_campagnes(tenant_id).await
    }
}
