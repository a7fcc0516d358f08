use std::io::Cursor;

use calamine::{DataType, Range, Reader, Xlsx};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::io::table::{Cell, RawTable};

/// Reads the first worksheet of an xlsx workbook held in memory.
///
/// calamine trims leading empty rows and columns from a range; they are
/// restored here so row offsets match the physical sheet.
pub fn read_table(name: &str, bytes: &[u8]) -> Result<RawTable> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|err| ToolError::malformed(name, err))?;

    let range = read_first_sheet(&mut workbook, name)?;
    let table = range_to_table(&range);
    debug!(source = name, rows = table.rows.len(), "decoded worksheet");
    Ok(table)
}

fn read_first_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ToolError::malformed(name, "workbook has no worksheets"))?;
    range_result.map_err(|err| ToolError::malformed(name, err))
}

fn range_to_table(range: &Range<DataType>) -> RawTable {
    let Some((row_offset, col_offset)) = range.start() else {
        return RawTable::default();
    };

    let mut rows: Vec<Vec<Cell>> = (0..row_offset).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<Cell> = (0..col_offset).map(|_| Cell::Empty).collect();
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    RawTable::new(rows)
}

fn cell_from_data(cell: &DataType) -> Cell {
    match cell {
        DataType::String(value) => Cell::Text(value.clone()),
        DataType::Float(value) => Cell::Number(*value),
        DataType::Int(value) => Cell::Number(*value as f64),
        DataType::Bool(value) => Cell::Text(value.to_string()),
        DataType::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

