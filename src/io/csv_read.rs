use tracing::debug;

use crate::error::{Result, ToolError};
use crate::io::table::{Cell, RawTable};

/// Reads a CSV export into a grid. No row is treated as a header here.
///
/// The delimiter is taken from the header line at `header_row`: `;` when it
/// holds more unquoted semicolons than commas (pt-BR spreadsheets export
/// that way since `,` is the decimal mark), `,` otherwise. Title and data
/// rows are not consulted; both may carry either character as text.
pub fn read_table(name: &str, bytes: &[u8], header_row: usize) -> Result<RawTable> {
    let delimiter = sniff_delimiter(bytes, header_row);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ToolError::malformed(name, err))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    debug!(source = name, rows = rows.len(), delimiter = %(delimiter as char), "decoded CSV");
    Ok(RawTable::new(rows))
}

fn sniff_delimiter(bytes: &[u8], header_row: usize) -> u8 {
    let header = bytes
        .split(|b| *b == b'\n')
        .nth(header_row)
        .unwrap_or(bytes);

    let mut in_quotes = false;
    let (mut semicolons, mut commas) = (0usize, 0usize);
    for byte in header {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b';' if !in_quotes => semicolons += 1,
            b',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    if semicolons > commas { b';' } else { b',' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_follows_the_header_line() {
        let comma = b"Relat\xc3\xb3rio; maio 2025,,\nPlaca,Gasolina (Lts),Gasolina (R$)\n";
        assert_eq!(sniff_delimiter(comma, 1), b',');

        let semicolon = b"Relat\xc3\xb3rio, maio;;\nPlaca;Diesel (Lts);Diesel (R$)\nAAA;10,5;50,00\n";
        assert_eq!(sniff_delimiter(semicolon, 1), b';');

        let quoted = b"\"Placa;Frota\",Ano\n";
        assert_eq!(sniff_delimiter(quoted, 0), b',');
    }
}
