use std::fmt;

/// One raw cell as produced by the file parser.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Empty cell or one of the parser's NA sentinels.
    Missing,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Text rendering of a cell. Integral numbers print without a fractional part.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Missing => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) if n.is_nan() => None,
            CellValue::Number(n) => Some(format_number(*n)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Cleans a raw cell: missing markers and NaN become `None`, text is trimmed,
/// anything else is returned unchanged.
pub fn clean_value(value: &CellValue) -> Option<CellValue> {
    match value {
        CellValue::Missing => None,
        CellValue::Number(n) if n.is_nan() => None,
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.len() == s.len() {
                Some(value.clone())
            } else {
                Some(CellValue::Text(trimmed.to_string()))
            }
        }
        other => Some(other.clone()),
    }
}
