use super::{lock, require_id, Storage};
use crate::domain::{Campagne, Collaborateur, Competence, Evaluation, FicheFonction};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing.
///
/// Collections keep insertion order so listings are deterministic.
#[derive(Default)]
pub struct InMemoryStorage {
    competences: Mutex<Vec<Competence>>,
    fiches: Mutex<Vec<FicheFonction>>,
    collaborateurs: Mutex<Vec<Collaborateur>>,
    campagnes: Mutex<Vec<Campagne>>,
    evaluations: Mutex<Vec<Evaluation>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T: Clone>(
    items: &mut [T],
    id: Uuid,
    entity: &str,
    item: &T,
    id_of: fn(&T) -> Option<Uuid>,
) -> Result<()> {
    let slot = items
        .iter_mut()
        .find(|existing| id_of(existing) == Some(id))
        .ok_or_else(|| EvalError::NotFound(format!("{} {}", entity, id)))?;
    *slot = item.clone();
    Ok(())
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_competence(&self, competence: &mut Competence) -> Result<()> {
        let id = Uuid::new_v4();
        competence.id = Some(id);

        lock(&self.competences)?.push(competence.clone());

        debug!("Created competence: {} with id {}", competence.ref_comp(), id);
        Ok(())
    }

    async fn find_competence(
        &self,
        tenant_id: &str,
        ref_comp: &str,
    ) -> Result<Option<Competence>> {
        let competences = lock(&self.competences)?;
        Ok(competences
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.ref_comp() == ref_comp)
            .cloned())
    }

    async fn list_competences(&self, tenant_id: &str) -> Result<Vec<Competence>> {
        let mut found: Vec<Competence> = lock(&self.competences)?
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.ref_comp().cmp(b.ref_comp()));
        Ok(found)
    }

    async fn create_fiche(&self, fiche: &mut FicheFonction) -> Result<()> {
        let id = Uuid::new_v4();
        fiche.id = Some(id);

        lock(&self.fiches)?.push(fiche.clone());

        debug!("Created fiche: {} with id {}", fiche.ref_ff, id);
        Ok(())
    }

    async fn find_fiche(&self, tenant_id: &str, ref_ff: &str) -> Result<Option<FicheFonction>> {
        Ok(lock(&self.fiches)?
            .iter()
            .find(|f| f.tenant_id == tenant_id && f.ref_ff == ref_ff)
            .cloned())
    }

    async fn list_fiches(&self, tenant_id: &str) -> Result<Vec<FicheFonction>> {
        Ok(lock(&self.fiches)?
            .iter()
            .filter(|f| f.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_collaborateur(&self, collaborateur: &mut Collaborateur) -> Result<()> {
        let id = Uuid::new_v4();
        collaborateur.id = Some(id);

        lock(&self.collaborateurs)?.push(collaborateur.clone());

        debug!("Created collaborateur: {} with id {}", collaborateur.email, id);
        Ok(())
    }

    async fn get_collaborateur(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<Option<Collaborateur>> {
        Ok(lock(&self.collaborateurs)?
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == Some(id))
            .cloned())
    }

    async fn find_collaborateur_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<Collaborateur>> {
        Ok(lock(&self.collaborateurs)?
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_collaborateurs(&self, tenant_id: &str) -> Result<Vec<Collaborateur>> {
        Ok(lock(&self.collaborateurs)?
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn update_collaborateur(&self, collaborateur: &Collaborateur) -> Result<()> {
        let id = require_id(collaborateur.id, "collaborateur")?;
        let mut collaborateurs = lock(&self.collaborateurs)?;
        replace(collaborateurs.as_mut_slice(), id, "collaborateur", collaborateur, |c| c.id)?;

        debug!("Updated collaborateur with id {}", id);
        Ok(())
    }

    async fn delete_collaborateur(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let mut collaborateurs = lock(&self.collaborateurs)?;
        let before = collaborateurs.len();
        collaborateurs.retain(|c| !(c.tenant_id == tenant_id && c.id == Some(id)));
        Ok(collaborateurs.len() != before)
    }

    async fn create_campagne(&self, campagne: &mut Campagne) -> Result<()> {
        let id = Uuid::new_v4();
        campagne.id = Some(id);

        lock(&self.campagnes)?.push(campagne.clone());

        debug!("Created campagne: {} with id {}", campagne.nom, id);
        Ok(())
    }

    async fn update_campagne(&self, campagne: &Campagne) -> Result<()> {
        let id = require_id(campagne.id, "campagne")?;
        let mut campagnes = lock(&self.campagnes)?;
        replace(campagnes.as_mut_slice(), id, "campagne", campagne, |c| c.id)
    }

    async fn list_campagnes(&self, tenant_id: &str) -> Result<Vec<Campagne>> {
        Ok(lock(&self.campagnes)?
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()> {
        let id = Uuid::new_v4();
        evaluation.id = Some(id);

        lock(&self.evaluations)?.push(evaluation.clone());

        debug!("Created evaluation with id {}", id);
        Ok(())
    }

    async fn get_evaluation(&self, tenant_id: &str, id: Uuid) -> Result<Option<Evaluation>> {
        Ok(lock(&self.evaluations)?
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.id == Some(id))
            .cloned())
    }

    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        let id = require_id(evaluation.id, "evaluation")?;
        let mut evaluations = lock(&self.evaluations)?;
        replace(evaluations.as_mut_slice(), id, "evaluation", evaluation, |e| e.id)
    }

    async fn list_evaluations(
        &self,
        tenant_id: &str,
        campagne_id: Option<Uuid>,
    ) -> Result<Vec<Evaluation>> {
        Ok(lock(&self.evaluations)?
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| campagne_id.map_or(true, |id| e.campagne_id == id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referentiel::record::CompetenceRecord;
    use chrono::Utc;

    fn competence(tenant: &str, ref_comp: &str) -> Competence {
        let record = CompetenceRecord {
            ref_comp: ref_comp.to_string(),
            domaine: Some("Tech".into()),
            axe: Some("Dev".into()),
            categorie: Some("Core".into()),
            nom: Some("Rust".into()),
            definition: None,
            niveaux: Default::default(),
            niveau_attendu: Default::default(),
            norme: None,
        };
        Competence::new(record, tenant, Utc::now())
    }

    #[tokio::test]
    async fn competence_lookup_is_tenant_scoped() {
        let storage = InMemoryStorage::new();
        let mut c = competence("acme", "C1");
        storage.create_competence(&mut c).await.unwrap();
        assert!(c.id.is_some());

        assert!(storage.find_competence("acme", "C1").await.unwrap().is_some());
        assert!(storage.find_competence("other", "C1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn competences_list_sorted_by_ref() {
        let storage = InMemoryStorage::new();
        for r in ["C3", "C1", "C2"] {
            storage
                .create_competence(&mut competence("acme", r))
                .await
                .unwrap();
        }
        let refs: Vec<String> = storage
            .list_competences("acme")
            .await
            .unwrap()
            .iter()
            .map(|c| c.ref_comp().to_string())
            .collect();
        assert_eq!(refs, vec!["C1", "C2", "C3"]);
    }

    #[tokio::test]
    async fn updating_unknown_campagne_is_not_found() {
        let storage = InMemoryStorage::new();
        let campagne = Campagne {
            id: Some(Uuid::new_v4()),
            tenant_id: "acme".into(),
            nom: "2025".into(),
            description: String::new(),
            date_debut: Utc::now(),
            date_fin: Utc::now(),
            fiches_incluses: vec![],
            statut: crate::domain::StatutCampagne::Brouillon,
            created_at: Utc::now(),
        };
        let err = storage.update_campagne(&campagne).await.unwrap_err();
        assert!(matches!(err, EvalError::NotFound(_)));
    }

    fn collaborateur(email: &str) -> Collaborateur {
        Collaborateur {
            id: None,
            tenant_id: "acme".into(),
            civilite: "Mme".into(),
            prenom: "Élodie".into(),
            nom: "Durand".into(),
            fonction: "Analyste".into(),
            ref_ff: "FF01".into(),
            manager_id: None,
            direction: "DSI".into(),
            departement: "Études".into(),
            email: email.into(),
            is_manager: false,
            statut: crate::domain::StatutCollaborateur::Actif,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn email_lookup_folds_ascii_case_only() {
        let storage = InMemoryStorage::new();
        storage
            .create_collaborateur(&mut collaborateur("Élodie.DURAND@acme.fr"))
            .await
            .unwrap();

        let found = storage
            .find_collaborateur_by_email("acme", "Élodie.durand@ACME.FR")
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.email).as_deref(), Some("Élodie.DURAND@acme.fr"));
        assert!(storage
            .find_collaborateur_by_email("acme", "élodie.durand@acme.fr")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .find_collaborateur_by_email("beta", "elodie.durand@acme.fr")
            .await
            .unwrap()
            .is_none());
    }
}
