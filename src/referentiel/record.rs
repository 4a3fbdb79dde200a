use super::columns::CanonicalField;
use super::value::CellValue;
use crate::domain::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-level descriptions of a competency. Only populated levels are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Niveaux {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n5: Option<String>,
}

impl Niveaux {
    fn slot(&mut self, level: Level) -> &mut Option<String> {
        match level {
            Level::N1 => &mut self.n1,
            Level::N2 => &mut self.n2,
            Level::N3 => &mut self.n3,
            Level::N4 => &mut self.n4,
            Level::N5 => &mut self.n5,
        }
    }

    pub fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::N1 => self.n1.as_deref(),
            Level::N2 => self.n2.as_deref(),
            Level::N3 => self.n3.as_deref(),
            Level::N4 => self.n4.as_deref(),
            Level::N5 => self.n5.as_deref(),
        }
    }

    pub fn set(&mut self, level: Level, description: impl Into<String>) {
        *self.slot(level) = Some(description.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, &str)> + '_ {
        Level::ALL
            .into_iter()
            .filter_map(move |level| self.get(level).map(|d| (level, d)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expected proficiency as found in the catalog.
///
/// Serialized untagged: an integer for `Known`, a string for `Raw`, `null` for `Unset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NiveauAttendu {
    /// Parsed from an `N<digits>` cell.
    Known(u32),
    /// Any other value, kept verbatim.
    Raw(String),
    #[default]
    Unset,
}

impl NiveauAttendu {
    pub fn from_cell(cell: Option<&CellValue>) -> Self {
        let Some(text) = cell.and_then(CellValue::as_text) else {
            return NiveauAttendu::Unset;
        };
        match parse_prefixed_level(&text) {
            Some(rank) => NiveauAttendu::Known(rank),
            None => NiveauAttendu::Raw(text),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, NiveauAttendu::Unset)
    }
}

// `N3` / `n12` -> digits after the prefix; anything else is not a level code.
// Digits too large for a u32 are not a level code either and stay `Raw`.
fn parse_prefixed_level(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('N').or_else(|| text.strip_prefix('n'))?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Canonical competency produced by an import.
///
/// Required text fields stay `None` when their cell was empty, so the gap is
/// visible as `null` instead of being papered over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetenceRecord {
    pub ref_comp: String,
    #[serde(default)]
    pub domaine: Option<String>,
    #[serde(default)]
    pub axe: Option<String>,
    #[serde(default)]
    pub categorie: Option<String>,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub niveaux: Niveaux,
    #[serde(default)]
    pub niveau_attendu: NiveauAttendu,
    #[serde(default)]
    pub norme: Option<String>,
}

impl CompetenceRecord {
    /// Keys of required fields (besides `refComp`) whose cell was empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (CanonicalField::Nom, &self.nom),
            (CanonicalField::Domaine, &self.domaine),
            (CanonicalField::Axe, &self.axe),
            (CanonicalField::Categorie, &self.categorie),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(field, _)| field.key())
        .collect()
    }
}

/// A row after header normalization and cell cleaning.
pub type NormalizedRow = BTreeMap<CanonicalField, Option<CellValue>>;

fn text_of(row: &NormalizedRow, field: CanonicalField) -> Option<String> {
    row.get(&field)
        .and_then(|cell| cell.as_ref())
        .and_then(CellValue::as_text)
}

/// Builds a record from one cleaned row, or `None` when the row has no `refComp`.
pub fn assemble_record(row: &NormalizedRow) -> Option<CompetenceRecord> {
    let ref_comp = text_of(row, CanonicalField::RefComp).filter(|r| !r.is_empty())?;

    let mut niveaux = Niveaux::default();
    for level in Level::ALL {
        if let Some(description) = text_of(row, CanonicalField::Niveau(level)) {
            niveaux.set(level, description);
        }
    }

    let niveau_attendu = NiveauAttendu::from_cell(
        row.get(&CanonicalField::NiveauAttendu)
            .and_then(|cell| cell.as_ref()),
    );

    Some(CompetenceRecord {
        ref_comp,
        domaine: text_of(row, CanonicalField::Domaine),
        axe: text_of(row, CanonicalField::Axe),
        categorie: text_of(row, CanonicalField::Categorie),
        nom: text_of(row, CanonicalField::Nom),
        definition: text_of(row, CanonicalField::Definition),
        niveaux,
        niveau_attendu,
        norme: text_of(row, CanonicalField::Norme),
    })
}
