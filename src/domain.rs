//! Persisted entity shapes shared by the storage layer and the use cases.

use crate::referentiel::record::{CompetenceRecord, NiveauAttendu};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Proficiency tier, ranked 1 (N1) to 5 (N5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    N1,
    N2,
    N3,
    N4,
    N5,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::N1, Level::N2, Level::N3, Level::N4, Level::N5];

    pub fn rank(&self) -> u32 {
        match self {
            Level::N1 => 1,
            Level::N2 => 2,
            Level::N3 => 3,
            Level::N4 => 4,
            Level::N5 => 5,
        }
    }

    pub fn from_rank(rank: u32) -> Option<Level> {
        Level::ALL.iter().copied().find(|level| level.rank() == rank)
    }

    /// Lowercase key used for per-level description columns (`n1`..`n5`).
    pub fn key(&self) -> &'static str {
        match self {
            Level::N1 => "n1",
            Level::N2 => "n2",
            Level::N3 => "n3",
            Level::N4 => "n4",
            Level::N5 => "n5",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.rank())
    }
}

impl FromStr for Level {
    type Err = String;

    /// Accepts `N3`, `n3` or a bare `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('N')
            .or_else(|| trimmed.strip_prefix('n'))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Level::from_rank)
            .ok_or_else(|| format!("unknown level '{}'", s))
    }
}

/// A reference-framework competency persisted for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competence {
    pub id: Option<Uuid>,
    pub tenant_id: String,
    #[serde(flatten)]
    pub record: CompetenceRecord,
    pub created_at: DateTime<Utc>,
}

impl Competence {
    pub fn new(record: CompetenceRecord, tenant_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            tenant_id: tenant_id.to_string(),
            record,
            created_at,
        }
    }

    pub fn ref_comp(&self) -> &str {
        &self.record.ref_comp
    }

    /// The expected level when the catalog gave a usable `N<digit>` value.
    pub fn expected_level(&self) -> Option<Level> {
        match self.record.niveau_attendu {
            NiveauAttendu::Known(rank) => Level::from_rank(rank),
            _ => None,
        }
    }
}

/// Job-role sheet: the competencies expected for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FicheFonction {
    pub id: Option<Uuid>,
    pub tenant_id: String,
    pub ref_ff: String,
    pub intitule: String,
    /// `refComp` values of the required competencies.
    pub competences: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutCollaborateur {
    Actif,
    Archive,
}

impl StatutCollaborateur {
    pub fn toggled(self) -> Self {
        match self {
            StatutCollaborateur::Actif => StatutCollaborateur::Archive,
            StatutCollaborateur::Archive => StatutCollaborateur::Actif,
        }
    }
}

/// An employee. Managers are employees with `is_manager` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborateur {
    pub id: Option<Uuid>,
    pub tenant_id: String,
    pub civilite: String,
    pub prenom: String,
    pub nom: String,
    pub fonction: String,
    /// Reference of the job-role sheet this person is evaluated against.
    pub ref_ff: String,
    pub manager_id: Option<Uuid>,
    pub direction: String,
    pub departement: String,
    pub email: String,
    pub is_manager: bool,
    pub statut: StatutCollaborateur,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutCampagne {
    Brouillon,
    EnCours,
    Terminee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campagne {
    pub id: Option<Uuid>,
    pub tenant_id: String,
    pub nom: String,
    pub description: String,
    pub date_debut: DateTime<Utc>,
    pub date_fin: DateTime<Utc>,
    /// `ref_ff` values of the job-role sheets in scope.
    pub fiches_incluses: Vec<String>,
    pub statut: StatutCampagne,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatutEvaluation {
    EnAttente,
    Soumise,
    Validee,
}

/// One competency line inside an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEvaluation {
    pub ref_comp: String,
    pub niveau_attendu: Option<Level>,
    pub niveau_observe: Option<Level>,
    pub ecart: Option<i32>,
    #[serde(default)]
    pub commentaire: String,
}

impl DetailEvaluation {
    pub fn pending(ref_comp: &str, niveau_attendu: Option<Level>) -> Self {
        Self {
            ref_comp: ref_comp.to_string(),
            niveau_attendu,
            niveau_observe: None,
            ecart: None,
            commentaire: String::new(),
        }
    }

    /// Gap between observed and expected level; `None` unless both are known.
    pub fn compute_ecart(&self) -> Option<i32> {
        match (self.niveau_observe, self.niveau_attendu) {
            (Some(observe), Some(attendu)) => Some(observe.rank() as i32 - attendu.rank() as i32),
            _ => None,
        }
    }

    pub fn refresh_ecart(&mut self) {
        self.ecart = self.compute_ecart();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: Option<Uuid>,
    pub tenant_id: String,
    pub campagne_id: Uuid,
    pub collaborateur_id: Uuid,
    pub manager_id: Option<Uuid>,
    pub details: Vec<DetailEvaluation>,
    pub statut: StatutEvaluation,
    pub commentaires_collaborateur: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn refresh_ecarts(&mut self) {
        for detail in &mut self.details {
            detail.refresh_ecart();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_prefixed_and_bare_forms() {
        assert_eq!("N3".parse::<Level>(), Ok(Level::N3));
        assert_eq!("n5".parse::<Level>(), Ok(Level::N5));
        assert_eq!(" 2 ".parse::<Level>(), Ok(Level::N2));
        assert!("N6".parse::<Level>().is_err());
        assert!("Expert".parse::<Level>().is_err());
    }

    #[test]
    fn level_display_and_key() {
        assert_eq!(Level::N4.to_string(), "N4");
        assert_eq!(Level::N4.key(), "n4");
        assert_eq!(Level::from_rank(0), None);
    }

    #[test]
    fn ecart_is_observed_minus_expected() {
        let mut detail = DetailEvaluation::pending("C001", Some(Level::N3));
        assert_eq!(detail.compute_ecart(), None);

        detail.niveau_observe = Some(Level::N1);
        detail.refresh_ecart();
        assert_eq!(detail.ecart, Some(-2));

        detail.niveau_observe = Some(Level::N4);
        detail.refresh_ecart();
        assert_eq!(detail.ecart, Some(1));
    }

    #[test]
    fn ecart_needs_an_expected_level() {
        let mut detail = DetailEvaluation::pending("C002", None);
        detail.niveau_observe = Some(Level::N2);
        detail.refresh_ecart();
        assert_eq!(detail.ecart, None);
    }

    #[test]
    fn statuses_serialize_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&StatutCampagne::EnCours).unwrap(),
            "\"en_cours\""
        );
        assert_eq!(
            serde_json::to_string(&StatutEvaluation::EnAttente).unwrap(),
            "\"en_attente\""
        );
        assert_eq!(StatutCollaborateur::Actif.toggled(), StatutCollaborateur::Archive);
    }
}
