//! Reference-framework (référentiel) file import: header normalization,
//! cell cleaning and competency record assembly.

pub mod columns;
pub mod parser;
pub mod record;
pub mod value;

use crate::error::{EvalError, Result};
use columns::{normalize_headers, HeaderCollision};
use parser::RawTable;
use record::{assemble_record, CompetenceRecord, NormalizedRow};
use tracing::{debug, warn};
use value::{clean_value, CellValue};

pub use columns::CanonicalField;
pub use parser::TableReader;

/// Records assembled from one file, with diagnostics about what was dropped.
#[derive(Debug, Clone, Default)]
pub struct AssembledRecords {
    pub records: Vec<CompetenceRecord>,
    /// Data rows dropped because their `refComp` was empty.
    pub skipped_rows: usize,
    /// Records kept although some required cell (`nom`, `domaine`, `axe`, `categorie`) was empty.
    pub incomplete_records: usize,
    pub header_collisions: Vec<HeaderCollision>,
}

/// Normalizes headers, checks required columns, then cleans and assembles every row.
///
/// Fails with `MissingRequiredColumns` before touching any row when a required
/// key has no column at all.
pub fn assemble_table(table: &RawTable) -> Result<AssembledRecords> {
    let mapping = normalize_headers(&table.headers);

    let missing = mapping.missing_required();
    if !missing.is_empty() {
        return Err(EvalError::MissingRequiredColumns {
            missing: missing.iter().map(|f| f.key().to_string()).collect(),
            found: mapping.cleaned_headers().to_vec(),
        });
    }

    let mut assembled = AssembledRecords {
        header_collisions: mapping.collisions().to_vec(),
        ..AssembledRecords::default()
    };

    for (index, raw_row) in table.rows.iter().enumerate() {
        let row: NormalizedRow = mapping
            .fields()
            .map(|(field, column)| {
                let cell = raw_row.get(column).unwrap_or(&CellValue::Missing);
                (field, clean_value(cell))
            })
            .collect();

        match assemble_record(&row) {
            Some(record) => {
                let missing = record.missing_required();
                if !missing.is_empty() {
                    warn!(
                        row = index + 1,
                        ref_comp = %record.ref_comp,
                        missing = ?missing,
                        "Record has empty required cells"
                    );
                    assembled.incomplete_records += 1;
                }
                assembled.records.push(record);
            }
            None => {
                debug!(row = index + 1, "Skipping row without refComp");
                assembled.skipped_rows += 1;
            }
        }
    }

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Level;
    use record::NiveauAttendu;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|c| {
                            if c.is_empty() {
                                CellValue::Missing
                            } else {
                                CellValue::text(*c)
                            }
                        })
                        .collect()
                })
                .collect(),
            source_sha256: String::new(),
        }
    }

    #[test]
    fn missing_axe_column_fails_whole_table() {
        let t = table(
            &["REF COMP", "DOMAINE", "CATÉGORIE", "COMPETENCE", "N1", "N2", "NORME"],
            &[&["C001", "Tech", "Core", "Python", "a", "b", "ISO"]],
        );
        match assemble_table(&t).unwrap_err() {
            EvalError::MissingRequiredColumns { missing, found } => {
                assert_eq!(missing, vec!["axe"]);
                assert_eq!(found[2], "CATÉGORIE");
                assert_eq!(found.len(), 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_are_cleaned_and_assembled() {
        let t = table(
            &["REF", "Domaine", "Axe", "Categorie", "Nom", "Niveau Attendu", "NIVEAU 3"],
            &[
                &[" C010 ", "Tech ", "Dev", "Core", "Rust", "N4", "  Solide  "],
                &["", "Tech", "Dev", "Core", "Orphan", "", ""],
                &["   ", "Tech", "Dev", "Core", "Blank ref", "", ""],
            ],
        );
        let assembled = assemble_table(&t).unwrap();
        assert_eq!(assembled.records.len(), 1);
        assert_eq!(assembled.skipped_rows, 2);

        let record = &assembled.records[0];
        assert_eq!(record.ref_comp, "C010");
        assert_eq!(record.domaine.as_deref(), Some("Tech"));
        assert_eq!(assembled.incomplete_records, 0);
        assert_eq!(record.niveau_attendu, NiveauAttendu::Known(4));
        assert_eq!(record.niveaux.get(Level::N3), Some("Solide"));
    }

    #[test]
    fn duplicate_level_columns_keep_rightmost_values() {
        let t = table(
            &["REF", "DOMAINE", "AXE", "CATEGORIE", "NOM", "N1", "NIVEAU 1"],
            &[&["C1", "d", "a", "c", "n", "left", "right"]],
        );
        let assembled = assemble_table(&t).unwrap();
        assert_eq!(assembled.header_collisions.len(), 1);
        assert_eq!(assembled.records[0].niveaux.get(Level::N1), Some("right"));
    }

    #[test]
    fn header_only_file_yields_no_records() {
        let t = table(&["REF", "DOMAINE", "AXE", "CATEGORIE", "NOM"], &[]);
        let assembled = assemble_table(&t).unwrap();
        assert!(assembled.records.is_empty());
        assert_eq!(assembled.skipped_rows, 0);
    }

    #[test]
    fn blank_required_cells_are_counted_not_dropped() {
        let t = table(
            &["REF", "DOMAINE", "AXE", "CATEGORIE", "NOM", "NIVEAU ATTENDU"],
            &[&["C1", "", "", "", "", "N2"], &["C2", "Tech", "Dev", "Core", "Rust", ""]],
        );
        let assembled = assemble_table(&t).unwrap();
        assert_eq!(assembled.records.len(), 2);
        assert_eq!(assembled.incomplete_records, 1);
        assert_eq!(
            assembled.records[0].missing_required(),
            vec!["nom", "domaine", "axe", "categorie"]
        );
    }
}
