//! Reads CSV and spreadsheet exports into a header row plus raw cell rows.

use super::value::CellValue;
use crate::error::{EvalError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Spreadsheet exports carry a title row; headers sit on the second physical row.
pub const SPREADSHEET_HEADER_ROW: usize = 1;

/// Cell contents treated as missing, matching common spreadsheet/NA conventions.
pub const MISSING_SENTINELS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Chooses a format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xlsm" | "xls" => Ok(FileFormat::Spreadsheet),
            _ => Err(EvalError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parsed file contents before any normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Each row has exactly `headers.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
    /// Hex SHA-256 of the source bytes.
    pub source_sha256: String,
}

/// Reads tabular files, mapping NA sentinels to missing cells.
#[derive(Debug, Clone, Default)]
pub struct TableReader {
    extra_missing: Vec<String>,
}

impl TableReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_values(extra_missing: Vec<String>) -> Self {
        Self { extra_missing }
    }

    pub fn read(&self, path: &Path) -> Result<RawTable> {
        let format = FileFormat::from_path(path)?;
        let bytes = std::fs::read(path)
            .map_err(|e| EvalError::UnreadableFile(format!("{}: {}", path.display(), e)))?;
        let mut table = match format {
            FileFormat::Csv => self.read_csv_bytes(&bytes)?,
            FileFormat::Spreadsheet => self.read_spreadsheet(path)?,
        };
        table.source_sha256 = sha256_hex(&bytes);
        debug!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = table.rows.len(),
            "Read reference-framework file"
        );
        Ok(table)
    }

    pub fn read_csv_bytes(&self, bytes: &[u8]) -> Result<RawTable> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EvalError::UnreadableFile(format!("file is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(EvalError::UnreadableFile("file is empty".to_string()));
        }
        let delimiter = sniff_delimiter(text);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| EvalError::UnreadableFile(format!("invalid CSV header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                EvalError::UnreadableFile(format!("invalid CSV row {}: {}", line + 2, e))
            })?;
            let cells = record.iter().map(|field| self.text_cell(field));
            rows.push(fit_row(cells, headers.len()));
        }

        Ok(RawTable {
            headers,
            rows,
            source_sha256: sha256_hex(bytes),
        })
    }

    fn read_spreadsheet(&self, path: &Path) -> Result<RawTable> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| EvalError::UnreadableFile(format!("{}: {}", path.display(), e)))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| EvalError::UnreadableFile("workbook has no worksheet".to_string()))?
            .map_err(|e| EvalError::UnreadableFile(e.to_string()))?;
        self.table_from_range(&range)
    }

    /// Builds a table from a worksheet whose header sits on physical row
    /// `SPREADSHEET_HEADER_ROW`. Rows above it are ignored.
    ///
    /// When that row is blank the table has no headers, so the required-column
    /// check rejects the file later instead of promoting a lower row.
    pub fn table_from_range(&self, range: &Range<Data>) -> Result<RawTable> {
        // The range starts at the first used cell, not necessarily A1.
        let Some((first_row, _)) = range.start() else {
            return Err(EvalError::UnreadableFile("worksheet is empty".to_string()));
        };
        let first_row = first_row as usize;
        if first_row > SPREADSHEET_HEADER_ROW {
            debug!(first_row, "Spreadsheet header row is blank");
            return Ok(RawTable::default());
        }

        let mut physical_rows = range.rows().skip(SPREADSHEET_HEADER_ROW - first_row);
        let headers: Vec<String> = match physical_rows.next() {
            Some(cells) => cells
                .iter()
                .map(|cell| self.spreadsheet_cell(cell).as_text().unwrap_or_default())
                .collect(),
            None => {
                return Err(EvalError::UnreadableFile(format!(
                    "worksheet has no header on row {}",
                    SPREADSHEET_HEADER_ROW + 1
                )))
            }
        };

        let rows = physical_rows
            .map(|cells| {
                fit_row(
                    cells.iter().map(|cell| self.spreadsheet_cell(cell)),
                    headers.len(),
                )
            })
            .collect();

        Ok(RawTable {
            headers,
            rows,
            source_sha256: String::new(),
        })
    }

    fn is_missing(&self, text: &str) -> bool {
        text.is_empty()
            || MISSING_SENTINELS.contains(&text)
            || self.extra_missing.iter().any(|m| m == text)
    }

    fn text_cell(&self, text: &str) -> CellValue {
        if self.is_missing(text) {
            CellValue::Missing
        } else {
            CellValue::text(text)
        }
    }

    fn spreadsheet_cell(&self, cell: &Data) -> CellValue {
        match cell {
            Data::Empty | Data::Error(_) => CellValue::Missing,
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::text(i.to_string()),
            Data::String(s) => self.text_cell(s),
            other => self.text_cell(&other.to_string()),
        }
    }
}

// Pads short rows with missing cells and drops cells past the last header.
fn fit_row(cells: impl Iterator<Item = CellValue>, width: usize) -> Vec<CellValue> {
    let mut row: Vec<CellValue> = cells.take(width).collect();
    row.resize(width, CellValue::Missing);
    row
}

/// `;` unless `,` splits the header line into strictly more fields.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if commas > semicolons {
        b','
    } else {
        b';'
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referentiel::record::NiveauAttendu;
    use std::io::Write;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("ref.CSV")).unwrap(),
            FileFormat::Csv
        );
        assert_eq!(
            FileFormat::from_path(Path::new("ref.xlsx")).unwrap(),
            FileFormat::Spreadsheet
        );
        let err = FileFormat::from_path(Path::new("ref.pdf")).unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedFormat(_)));
        assert!(FileFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn sniffs_semicolon_and_comma() {
        assert_eq!(sniff_delimiter("REF;NOM;AXE\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("REF,NOM,AXE\n1,2,3"), b',');
        assert_eq!(sniff_delimiter("\n\nREF;NOM, bis\n"), b';');
    }

    #[test]
    fn csv_cells_stay_text_and_empty_is_missing() {
        let reader = TableReader::new();
        let table = reader
            .read_csv_bytes("REF;NOM;N1\nC001;;007\nC002;Python\n".as_bytes())
            .unwrap();
        assert_eq!(table.headers, vec!["REF", "NOM", "N1"]);
        assert_eq!(
            table.rows[0],
            vec![
                CellValue::text("C001"),
                CellValue::Missing,
                CellValue::text("007")
            ]
        );
        // short row padded
        assert_eq!(table.rows[1].len(), 3);
        assert_eq!(table.rows[1][2], CellValue::Missing);
    }

    #[test]
    fn na_sentinels_and_configured_values_are_missing() {
        let reader = TableReader::with_missing_values(vec!["-".to_string()]);
        let table = reader
            .read_csv_bytes("REF;NOM;AXE\nC001;N/A;-\n".as_bytes())
            .unwrap();
        assert_eq!(table.rows[0][1], CellValue::Missing);
        assert_eq!(table.rows[0][2], CellValue::Missing);
    }

    #[test]
    fn bom_is_stripped_from_first_header() {
        let table = TableReader::new()
            .read_csv_bytes("\u{feff}REF COMP,NOM\nC1,x\n".as_bytes())
            .unwrap();
        assert_eq!(table.headers[0], "REF COMP");
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let err = TableReader::new()
            .read_csv_bytes(&[0x52, 0x45, 0x46, 0xff, 0xfe, b'\n'])
            .unwrap_err();
        assert!(matches!(err, EvalError::UnreadableFile(_)));
    }

    #[test]
    fn read_from_disk_records_checksum() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "REF;NOM\nC1;Python\n").unwrap();
        let table = TableReader::new().read(file.path()).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.source_sha256, sha256_hex(b"REF;NOM\nC1;Python\n"));
    }

    #[test]
    fn corrupt_spreadsheet_is_unreadable() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        write!(file, "definitely not a zip archive").unwrap();
        let err = TableReader::new().read(file.path()).unwrap_err();
        assert!(matches!(err, EvalError::UnreadableFile(_)));
    }

    #[test]
    fn empty_csv_is_unreadable() {
        for bytes in [&b""[..], b"\xef\xbb\xbf", b"\n  \n"] {
            let err = TableReader::new().read_csv_bytes(bytes).unwrap_err();
            assert!(matches!(err, EvalError::UnreadableFile(_)), "{:?}", bytes);
        }
    }

    fn sheet(start_row: u32, cells: &[(u32, Vec<Data>)]) -> Range<Data> {
        let end_row = cells.iter().map(|(row, _)| *row).max().unwrap_or(start_row);
        let width = cells.iter().map(|(_, r)| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((start_row, 0), (end_row, width - 1));
        for (row, values) in cells {
            for (col, value) in values.iter().enumerate() {
                range.set_value((*row, col as u32), value.clone());
            }
        }
        range
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn spreadsheet_header_comes_from_second_row() {
        let header = [
            s("REF COMP"),
            s("DOMAINE"),
            s("AXE"),
            s("CATÉGORIE"),
            s("COMPETENCE"),
            s("NIVEAU ATTENDU"),
        ];
        let range = sheet(
            0,
            &[
                (0, vec![s("Référentiel compétences 2025")]),
                (1, header.to_vec()),
                (2, vec![s("C001"), s("Tech"), s("Dev"), s("Core"), s("Python"), s("N2")]),
                (
                    3,
                    vec![
                        Data::Float(42.0),
                        s("Tech"),
                        s("Dev"),
                        s("Core"),
                        s("SQL"),
                        Data::Float(3.0),
                    ],
                ),
            ],
        );
        let table = TableReader::new().table_from_range(&range).unwrap();
        assert_eq!(table.headers[0], "REF COMP");
        assert_eq!(table.rows.len(), 2);

        let assembled = crate::referentiel::assemble_table(&table).unwrap();
        let levels: Vec<(&str, &NiveauAttendu)> = assembled
            .records
            .iter()
            .map(|r| (r.ref_comp.as_str(), &r.niveau_attendu))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("C001", &NiveauAttendu::Known(2)),
                ("42", &NiveauAttendu::Raw("3".to_string())),
            ]
        );
    }

    #[test]
    fn spreadsheet_without_title_row_still_reads_row_two() {
        // row 0 blank, header on row 1
        let range = sheet(
            1,
            &[
                (1, vec![s("REF"), s("NOM")]),
                (2, vec![s("C1"), s("Python")]),
            ],
        );
        let table = TableReader::new().table_from_range(&range).unwrap();
        assert_eq!(table.headers, vec!["REF", "NOM"]);
        assert_eq!(table.rows, vec![vec![CellValue::text("C1"), CellValue::text("Python")]]);
    }

    #[test]
    fn spreadsheet_with_blank_header_row_is_rejected() {
        // rows 0 and 1 blank, headers pushed down to row 2
        let range = sheet(
            2,
            &[
                (2, vec![s("REF"), s("DOMAINE"), s("AXE"), s("CATEGORIE"), s("NOM")]),
                (3, vec![s("C1"), s("Tech"), s("Dev"), s("Core"), s("Python")]),
            ],
        );
        let table = TableReader::new().table_from_range(&range).unwrap();
        assert!(table.headers.is_empty());

        let err = crate::referentiel::assemble_table(&table).unwrap_err();
        match err {
            EvalError::MissingRequiredColumns { missing, found } => {
                assert_eq!(missing.len(), 5);
                assert!(found.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_worksheet_is_unreadable() {
        let range: Range<Data> = Range::empty();
        let err = TableReader::new().table_from_range(&range).unwrap_err();
        assert!(matches!(err, EvalError::UnreadableFile(_)));
    }
}
