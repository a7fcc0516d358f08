use std::path::Path;

use rust_xlsxwriter::{Table, TableColumn, Workbook, Worksheet};

use crate::error::Result;
use crate::report::{CellValue, SheetTable, WorkbookData};

/// Writes the provided workbook data to the given path.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = render(workbook)?;
    workbook_writer.save(path)?;
    Ok(())
}

fn render(workbook: &WorkbookData) -> Result<Workbook> {
    let mut workbook_writer = Workbook::new();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;
        write_table(worksheet, table)?;
    }

    Ok(workbook_writer)
}

fn write_table(worksheet: &mut Worksheet, table: &SheetTable) -> Result<()> {
    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            match cell {
                CellValue::Text(value) => {
                    worksheet.write_string(excel_row, col_idx as u16, value)?;
                }
                CellValue::Number(value) => {
                    worksheet.write_number(excel_row, col_idx as u16, *value)?;
                }
            }
        }
    }

    // Excel tables need at least one data row.
    if table.rows.is_empty() || table.columns.is_empty() {
        return Ok(());
    }

    let columns: Vec<TableColumn> = table
        .columns
        .iter()
        .map(|header| TableColumn::new().set_header(header))
        .collect();
    let mut excel_table = Table::new();
    excel_table.set_autofilter(true).set_columns(&columns);

    let col_end = (table.columns.len() as u16).saturating_sub(1);
    let row_end = table.rows.len() as u32;
    worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
    Ok(())
}
