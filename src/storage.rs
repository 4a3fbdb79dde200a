use crate::domain::{Campagne, Collaborateur, Competence, Evaluation, FicheFonction};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Document store for every persisted entity. All lookups are tenant-scoped.
///
/// `create_*` methods assign the entity's `id`.
#[async_trait]
pub trait Storage: Send + Sync {
    // Competence operations
    async fn create_competence(&self, competence: &mut Competence) -> Result<()>;
    async fn find_competence(&self, tenant_id: &str, ref_comp: &str)
        -> Result<Option<Competence>>;
    /// Sorted by `refComp`.
    async fn list_competences(&self, tenant_id: &str) -> Result<Vec<Competence>>;

    // Job-role sheet operations
    async fn create_fiche(&self, fiche: &mut FicheFonction) -> Result<()>;
    async fn find_fiche(&self, tenant_id: &str, ref_ff: &str) -> Result<Option<FicheFonction>>;
    async fn list_fiches(&self, tenant_id: &str) -> Result<Vec<FicheFonction>>;

    // Collaborateur operations
    async fn create_collaborateur(&self, collaborateur: &mut Collaborateur) -> Result<()>;
    async fn get_collaborateur(&self, tenant_id: &str, id: Uuid)
        -> Result<Option<Collaborateur>>;
    async fn find_collaborateur_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<Collaborateur>>;
    async fn list_collaborateurs(&self, tenant_id: &str) -> Result<Vec<Collaborateur>>;
    async fn update_collaborateur(&self, collaborateur: &Collaborateur) -> Result<()>;
    /// Returns false when nothing matched.
    async fn delete_collaborateur(&self, tenant_id: &str, id: Uuid) -> Result<bool>;

    // Campaign operations
    async fn create_campagne(&self, campagne: &mut Campagne) -> Result<()>;
    async fn update_campagne(&self, campagne: &Campagne) -> Result<()>;
    async fn list_campagnes(&self, tenant_id: &str) -> Result<Vec<Campagne>>;

    // Evaluation operations
    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()>;
    async fn get_evaluation(&self, tenant_id: &str, id: Uuid) -> Result<Option<Evaluation>>;
    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<()>;
    async fn list_evaluations(
        &self,
        tenant_id: &str,
        campagne_id: Option<Uuid>,
    ) -> Result<Vec<Evaluation>>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| EvalError::Storage("storage lock poisoned".to_string()))
}

pub(crate) fn require_id(id: Option<Uuid>, entity: &str) -> Result<Uuid> {
    id.ok_or_else(|| EvalError::Storage(format!("Cannot update {} without ID", entity)))
}
