use crate::money::try_parse_amount;

/// A decoded cell. Only the distinctions the pipeline cares about survive
/// decoding: text, numbers and blanks.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Textual rendering. Integral numbers lose their fractional part so a
    /// plate typed as `1234` does not become `1234.0`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(value) => value.clone(),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Cell::Number(value) => value.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Reads the cell as a non-negative amount. `None` marks a value that
    /// had to be collapsed to zero.
    pub fn to_amount(&self) -> Option<f64> {
        match self {
            Cell::Empty => Some(0.0),
            Cell::Text(value) => try_parse_amount(value),
            Cell::Number(value) if value.is_finite() && *value >= 0.0 => Some(*value),
            Cell::Number(_) => None,
        }
    }
}

/// Positional grid of cells. Row `n` is physical spreadsheet row `n`, so a
/// header offset counts rows exactly as a person reading the sheet would.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Header row located `skip` rows down, plus the data rows under it.
    pub fn split_header(&self, skip: usize) -> Option<(&[Cell], &[Vec<Cell>])> {
        let header = self.rows.get(skip)?;
        Some((header.as_slice(), &self.rows[skip + 1..]))
    }
}
