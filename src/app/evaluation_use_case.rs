use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Evaluation, Level, StatutEvaluation};
use crate::error::{EvalError, Result};
use crate::storage::Storage;

/// Observation for one competency line, matched by `refComp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailUpdate {
    pub ref_comp: String,
    pub niveau_observe: Option<Level>,
    pub commentaire: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationUpdate {
    #[serde(default)]
    pub details: Vec<DetailUpdate>,
    pub statut: Option<StatutEvaluation>,
    pub commentaires_collaborateur: Option<String>,
}

pub struct EvaluationUseCase {
    storage: Arc<dyn Storage>,
}

impl EvaluationUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Gaps are recomputed on read so stored values never go stale.
    pub async fn list_evaluations(
        &self,
        tenant_id: &str,
        campagne_id: Option<Uuid>,
    ) -> Result<Vec<Evaluation>> {
        let mut evaluations = self.storage.list_evaluations(tenant_id, campagne_id).await?;
        for evaluation in &mut evaluations {
            evaluation.refresh_ecarts();
        }
        Ok(evaluations)
    }

    pub async fn update_evaluation(
        &self,
        tenant_id: &str,
        id: Uuid,
        data: EvaluationUpdate,
    ) -> Result<Evaluation> {
        let mut evaluation = self
            .storage
            .get_evaluation(tenant_id, id)
            .await?
            .ok_or_else(|| EvalError::NotFound(format!("Evaluation {}", id)))?;

        for update in data.details {
            let Some(detail) = evaluation
                .details
                .iter_mut()
                .find(|d| d.ref_comp == update.ref_comp)
            else {
                return Err(EvalError::Validation(format!(
                    "Compétence {} is not part of evaluation {}",
                    update.ref_comp, id
                )));
            };
            detail.niveau_observe = update.niveau_observe;
            if let Some(commentaire) = update.commentaire {
                detail.commentaire = commentaire;
            }
        }
        if let Some(statut) = data.statut {
            evaluation.statut = statut;
        }
        if data.commentaires_collaborateur.is_some() {
            evaluation.commentaires_collaborateur = data.commentaires_collaborateur;
        }
        evaluation.refresh_ecarts();

        self.storage.update_evaluation(&evaluation).await?;
        debug!(%id, "Updated evaluation");
        if evaluation.statut == StatutEvaluation::Validee {
            info!(%id, collaborateur = %evaluation.collaborateur_id, "Evaluation validated");
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DetailEvaluation;
    use crate::storage::InMemoryStorage;
    use chrono::Utc;

    async fn seeded() -> (EvaluationUseCase, Uuid, Uuid) {
        let storage = Arc::new(InMemoryStorage::new());
        let campagne_id = Uuid::new_v4();
        let mut evaluation = Evaluation {
            id: None,
            tenant_id: "acme".into(),
            campagne_id,
            collaborateur_id: Uuid::new_v4(),
            manager_id: None,
            details: vec![
                DetailEvaluation::pending("C1", Some(Level::N3)),
                DetailEvaluation::pending("C2", None),
            ],
            statut: StatutEvaluation::EnAttente,
            commentaires_collaborateur: None,
            created_at: Utc::now(),
        };
        storage.create_evaluation(&mut evaluation).await.unwrap();
        let id = evaluation.id.unwrap();
        (EvaluationUseCase::new(storage), id, campagne_id)
    }

    fn observe(ref_comp: &str, level: Level) -> DetailUpdate {
        DetailUpdate {
            ref_comp: ref_comp.into(),
            niveau_observe: Some(level),
            commentaire: None,
        }
    }

    #[tokio::test]
    async fn update_recomputes_gaps() {
        let (uc, id, _) = seeded().await;
        let updated = uc
            .update_evaluation(
                "acme",
                id,
                EvaluationUpdate {
                    details: vec![observe("C1", Level::N2), observe("C2", Level::N4)],
                    statut: Some(StatutEvaluation::Soumise),
                    commentaires_collaborateur: Some("RAS".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.details[0].ecart, Some(-1));
        // no expected level, no gap
        assert_eq!(updated.details[1].ecart, None);
        assert_eq!(updated.statut, StatutEvaluation::Soumise);
        assert_eq!(updated.commentaires_collaborateur.as_deref(), Some("RAS"));
    }

    #[tokio::test]
    async fn listing_filters_by_campagne() {
        let (uc, _, campagne_id) = seeded().await;
        assert_eq!(uc.list_evaluations("acme", Some(campagne_id)).await.unwrap().len(), 1);
        assert!(uc
            .list_evaluations("acme", Some(Uuid::new_v4()))
            .await
            .unwrap()
            .is_empty());
        assert!(uc.list_evaluations("beta", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_evaluation_or_line() {
        let (uc, id, _) = seeded().await;
        let err = uc
            .update_evaluation("acme", Uuid::new_v4(), EvaluationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::NotFound(_)));

        let err = uc
            .update_evaluation(
                "acme",
                id,
                EvaluationUpdate {
                    details: vec![observe("C9", Level::N1)],
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Validation(_)));
    }
}
