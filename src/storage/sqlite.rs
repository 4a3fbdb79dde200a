use super::{lock, require_id, Storage};
use crate::domain::{Campagne, Collaborateur, Competence, Evaluation, FicheFonction};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS competences (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        id         TEXT NOT NULL UNIQUE,
        tenant_id  TEXT NOT NULL,
        ref_comp   TEXT NOT NULL,
        body       TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_competences_tenant_ref ON competences (tenant_id, ref_comp);
    CREATE TABLE IF NOT EXISTS fiches (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        id         TEXT NOT NULL UNIQUE,
        tenant_id  TEXT NOT NULL,
        ref_ff     TEXT NOT NULL,
        body       TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS collaborateurs (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        id         TEXT NOT NULL UNIQUE,
        tenant_id  TEXT NOT NULL,
        email      TEXT NOT NULL,
        body       TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS campagnes (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        id         TEXT NOT NULL UNIQUE,
        tenant_id  TEXT NOT NULL,
        body       TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS evaluations (
        seq          INTEGER PRIMARY KEY AUTOINCREMENT,
        id           TEXT NOT NULL UNIQUE,
        tenant_id    TEXT NOT NULL,
        campagne_id  TEXT NOT NULL,
        body         TEXT NOT NULL
    );
"#;

/// SQLite-backed document store. Each entity is kept as a JSON body next to
/// the columns it is looked up by.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened SQLite storage");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_docs<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> Result<Vec<T>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(sql)?;
        let bodies = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(EvalError::from))
            .collect()
    }

    fn query_doc<T: DeserializeOwned, P: Params>(&self, sql: &str, params: P) -> Result<Option<T>> {
        Ok(self.query_docs(sql, params)?.into_iter().next())
    }

    fn update_body<T: Serialize>(&self, table: &str, id: Uuid, entity: &T) -> Result<()> {
        let body = serde_json::to_string(entity)?;
        let sql = format!("UPDATE {} SET body = ?1 WHERE id = ?2", table);
        let changed = lock(&self.conn)?.execute(&sql, params![body, id.to_string()])?;
        if changed == 0 {
            return Err(EvalError::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_competence(&self, competence: &mut Competence) -> Result<()> {
        let id = Uuid::new_v4();
        competence.id = Some(id);
        let body = serde_json::to_string(competence)?;
        lock(&self.conn)?.execute(
            "INSERT INTO competences (id, tenant_id, ref_comp, body) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), competence.tenant_id, competence.ref_comp(), body],
        )?;

        debug!("Created competence: {} with id {}", competence.ref_comp(), id);
        Ok(())
    }

    async fn find_competence(
        &self,
        tenant_id: &str,
        ref_comp: &str,
    ) -> Result<Option<Competence>> {
        self.query_doc(
            "SELECT body FROM competences WHERE tenant_id = ?1 AND ref_comp = ?2 ORDER BY seq LIMIT 1",
            params![tenant_id, ref_comp],
        )
    }

    async fn list_competences(&self, tenant_id: &str) -> Result<Vec<Competence>> {
        self.query_docs(
            "SELECT body FROM competences WHERE tenant_id = ?1 ORDER BY ref_comp, seq",
            params![tenant_id],
        )
    }

    async fn create_fiche(&self, fiche: &mut FicheFonction) -> Result<()> {
        let id = Uuid::new_v4();
        fiche.id = Some(id);
        let body = serde_json::to_string(fiche)?;
        lock(&self.conn)?.execute(
            "INSERT INTO fiches (id, tenant_id, ref_ff, body) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), fiche.tenant_id, fiche.ref_ff, body],
        )?;

        debug!("Created fiche: {} with id {}", fiche.ref_ff, id);
        Ok(())
    }

    async fn find_fiche(&self, tenant_id: &str, ref_ff: &str) -> Result<Option<FicheFonction>> {
        self.query_doc(
            "SELECT body FROM fiches WHERE tenant_id = ?1 AND ref_ff = ?2 ORDER BY seq LIMIT 1",
            params![tenant_id, ref_ff],
        )
    }

    async fn list_fiches(&self, tenant_id: &str) -> Result<Vec<FicheFonction>> {
        self.query_docs(
            "SELECT body FROM fiches WHERE tenant_id = ?1 ORDER BY seq",
            params![tenant_id],
        )
    }

    async fn create_collaborateur(&self, collaborateur: &mut Collaborateur) -> Result<()> {
        let id = Uuid::new_v4();
        collaborateur.id = Some(id);
        let body = serde_json::to_string(collaborateur)?;
        lock(&self.conn)?.execute(
            "INSERT INTO collaborateurs (id, tenant_id, email, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                collaborateur.tenant_id,
                collaborateur.email.to_ascii_lowercase(),
                body
            ],
        )?;

        debug!("Created collaborateur: {} with id {}", collaborateur.email, id);
        Ok(())
    }

    async fn get_collaborateur(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<Option<Collaborateur>> {
        self.query_doc(
            "SELECT body FROM collaborateurs WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id.to_string()],
        )
    }

    async fn find_collaborateur_by_email(
        &self,
        tenant_id: &str,
        email: &str,
    ) -> Result<Option<Collaborateur>> {
        self.query_doc(
            "SELECT body FROM collaborateurs WHERE tenant_id = ?1 AND email = ?2 ORDER BY seq LIMIT 1",
            params![tenant_id, email.to_ascii_lowercase()],
        )
    }

    async fn list_collaborateurs(&self, tenant_id: &str) -> Result<Vec<Collaborateur>> {
        self.query_docs(
            "SELECT body FROM collaborateurs WHERE tenant_id = ?1 ORDER BY seq",
            params![tenant_id],
        )
    }

    async fn update_collaborateur(&self, collaborateur: &Collaborateur) -> Result<()> {
        let id = require_id(collaborateur.id, "collaborateur")?;
        let body = serde_json::to_string(collaborateur)?;
        let changed = lock(&self.conn)?.execute(
            "UPDATE collaborateurs SET body = ?1, email = ?2 WHERE id = ?3",
            params![body, collaborateur.email.to_ascii_lowercase(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(EvalError::NotFound(format!("collaborateur {}", id)));
        }

        debug!("Updated collaborateur with id {}", id);
        Ok(())
    }

    async fn delete_collaborateur(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let deleted = lock(&self.conn)?.execute(
            "DELETE FROM collaborateurs WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    async fn create_campagne(&self, campagne: &mut Campagne) -> Result<()> {
        let id = Uuid::new_v4();
        campagne.id = Some(id);
        let body = serde_json::to_string(campagne)?;
        lock(&self.conn)?.execute(
            "INSERT INTO campagnes (id, tenant_id, body) VALUES (?1, ?2, ?3)",
            params![id.to_string(), campagne.tenant_id, body],
        )?;

        debug!("Created campagne: {} with id {}", campagne.nom, id);
        Ok(())
    }

    async fn update_campagne(&self, campagne: &Campagne) -> Result<()> {
        let id = require_id(campagne.id, "campagne")?;
        self.update_body("campagnes", id, campagne)
    }

    async fn list_campagnes(&self, tenant_id: &str) -> Result<Vec<Campagne>> {
        self.query_docs(
            "SELECT body FROM campagnes WHERE tenant_id = ?1 ORDER BY seq",
            params![tenant_id],
        )
    }

    async fn create_evaluation(&self, evaluation: &mut Evaluation) -> Result<()> {
        let id = Uuid::new_v4();
        evaluation.id = Some(id);
        let body = serde_json::to_string(evaluation)?;
        lock(&self.conn)?.execute(
            "INSERT INTO evaluations (id, tenant_id, campagne_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                evaluation.tenant_id,
                evaluation.campagne_id.to_string(),
                body
            ],
        )?;

        debug!("Created evaluation with id {}", id);
        Ok(())
    }

    async fn get_evaluation(&self, tenant_id: &str, id: Uuid) -> Result<Option<Evaluation>> {
        self.query_doc(
            "SELECT body FROM evaluations WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id.to_string()],
        )
    }

    async fn update_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        let id = require_id(evaluation.id, "evaluation")?;
        self.update_body("evaluations", id, evaluation)
    }

    async fn list_evaluations(
        &self,
        tenant_id: &str,
        campagne_id: Option<Uuid>,
    ) -> Result<Vec<Evaluation>> {
        match campagne_id {
            Some(campagne_id) => self.query_docs(
                "SELECT body FROM evaluations WHERE tenant_id = ?1 AND campagne_id = ?2 ORDER BY seq",
                params![tenant_id, campagne_id.to_string()],
            ),
            None => self.query_docs(
                "SELECT body FROM evaluations WHERE tenant_id = ?1 ORDER BY seq",
                params![tenant_id],
            ),
        }
    }
}
