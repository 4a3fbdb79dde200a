//! Column header normalization for reference-framework files.
//!
//! Spreadsheet exports of competency catalogs name their columns
//! inconsistently (accents, casing, non-breaking spaces, synonyms). Every
//! header is cleaned the same way as the alias table and looked up exactly;
//! there is no fuzzy matching.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

use crate::domain::Level;

/// Canonical keys a column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CanonicalField {
    RefComp,
    Domaine,
    Axe,
    Categorie,
    Nom,
    Definition,
    Niveau(Level),
    NiveauAttendu,
    Norme,
}

impl CanonicalField {
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::RefComp => "refComp",
            CanonicalField::Domaine => "domaine",
            CanonicalField::Axe => "axe",
            CanonicalField::Categorie => "categorie",
            CanonicalField::Nom => "nom",
            CanonicalField::Definition => "definition",
            CanonicalField::Niveau(level) => level.key(),
            CanonicalField::NiveauAttendu => "niveauAttendu",
            CanonicalField::Norme => "norme",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Accepted raw headers per canonical key.
pub const COLUMN_ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::RefComp,
        &[
            "REF COMP",
            "REF",
            "REFERENCE",
            "refComp",
            "REF COMPÉTENCE",
            "REF FFREF COMP",
        ],
    ),
    (
        CanonicalField::Domaine,
        &[
            "DOMAINE",
            "domaine",
            "DOMAINE DE COMPETENCE",
            "DOMAINE DE COMPÉTENCE",
        ],
    ),
    (
        CanonicalField::Axe,
        &["AXE", "axe", "AXE DE COMPETENCE", "AXE DE COMPÉTENCE"],
    ),
    (
        CanonicalField::Categorie,
        &["CATÉGORIE", "CATEGORIE", "categorie"],
    ),
    (CanonicalField::Nom, &["COMPETENCE", "NOM", "nom"]),
    (
        CanonicalField::Definition,
        &["DEFINITION", "description", "definition"],
    ),
    (
        CanonicalField::Niveau(Level::N1),
        &[
            "N1",
            "NIVEAU 1",
            "N1 – DÉBUTANT",
            "N1 - DÉBUTANT",
            "N1 - DEBUTANT",
        ],
    ),
    (
        CanonicalField::Niveau(Level::N2),
        &[
            "N2",
            "NIVEAU 2",
            "N2 – INTERMÉDIAIRE",
            "N2 - INTERMÉDIAIRE",
            "N2 - INTERMEDIAIRE",
        ],
    ),
    (
        CanonicalField::Niveau(Level::N3),
        &["N3", "NIVEAU 3", "N3 – AVANCÉ", "N3 - AVANCÉ", "N3 - AVANCE"],
    ),
    (
        CanonicalField::Niveau(Level::N4),
        &["N4", "NIVEAU 4", "N4 – EXPERT", "N4 - EXPERT"],
    ),
    (CanonicalField::Niveau(Level::N5), &["N5", "NIVEAU 5"]),
    (
        CanonicalField::NiveauAttendu,
        &["NIVEAU ATTENDU", "NIVEAU REQUIS", "niveauAttendu"],
    ),
    (
        CanonicalField::Norme,
        &["NORME", "norme", "NORME SI APPLICABLE"],
    ),
];

/// Columns a file must provide, in the order they are reported when missing.
pub const REQUIRED_FIELDS: [CanonicalField; 5] = [
    CanonicalField::RefComp,
    CanonicalField::Nom,
    CanonicalField::Domaine,
    CanonicalField::Axe,
    CanonicalField::Categorie,
];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

// First alias wins when two canonical keys share a cleaned alias.
static ALIAS_LOOKUP: Lazy<HashMap<String, CanonicalField>> = Lazy::new(|| {
    let mut lookup = HashMap::new();
    for (field, aliases) in COLUMN_ALIASES {
        for alias in aliases.iter() {
            lookup.entry(clean_header(alias)).or_insert(*field);
        }
    }
    lookup
});

/// Collapses whitespace runs (non-breaking spaces included) to one space,
/// trims, and uppercases.
pub fn clean_header(header: &str) -> String {
    WHITESPACE_RUN
        .replace_all(header, " ")
        .trim()
        .to_uppercase()
}

/// Looks up the canonical key for a single raw header.
pub fn canonical_field(header: &str) -> Option<CanonicalField> {
    ALIAS_LOOKUP.get(&clean_header(header)).copied()
}

/// Two raw columns that normalized to the same canonical key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderCollision {
    pub field: CanonicalField,
    pub kept: String,
    pub dropped: String,
}

/// Result of normalizing a header row.
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    /// Canonical key -> index of the column that supplies it.
    columns: BTreeMap<CanonicalField, usize>,
    /// Every raw header, cleaned, in file order.
    cleaned_headers: Vec<String>,
    collisions: Vec<HeaderCollision>,
}

impl HeaderMapping {
    pub fn column_for(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(field, idx)| (*field, *idx))
    }

    pub fn cleaned_headers(&self) -> &[String] {
        &self.cleaned_headers
    }

    pub fn collisions(&self) -> &[HeaderCollision] {
        &self.collisions
    }

    /// Required canonical keys with no column in the file.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        REQUIRED_FIELDS
            .iter()
            .filter(|field| !self.contains(**field))
            .copied()
            .collect()
    }
}

/// Maps each header that matches a known alias to its canonical key.
///
/// Unmatched headers are dropped. When two headers map to the same key the
/// rightmost column wins and the collision is recorded and logged.
pub fn normalize_headers<S: AsRef<str>>(headers: &[S]) -> HeaderMapping {
    let mut mapping = HeaderMapping {
        cleaned_headers: headers.iter().map(|h| clean_header(h.as_ref())).collect(),
        ..HeaderMapping::default()
    };

    for (idx, cleaned) in mapping.cleaned_headers.iter().enumerate() {
        let Some(field) = ALIAS_LOOKUP.get(cleaned).copied() else {
            continue;
        };
        if let Some(previous) = mapping.columns.insert(field, idx) {
            let collision = HeaderCollision {
                field,
                kept: headers[idx].as_ref().to_string(),
                dropped: headers[previous].as_ref().to_string(),
            };
            warn!(
                field = %field,
                kept = %collision.kept,
                dropped = %collision.dropped,
                "Two columns map to the same field, keeping the rightmost"
            );
            mapping.collisions.push(collision);
        }
    }

    mapping
}
