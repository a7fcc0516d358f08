pub mod csv_read;
pub mod excel_read;
pub mod excel_write;
pub mod table;

use crate::error::Result;
pub use table::{Cell, RawTable};

/// Decodes a named byte source into a grid, picking the format from the
/// name: `.csv` sources go through the CSV reader, everything else is read
/// as an xlsx workbook. `header_row` is the physical row holding the
/// column headers.
pub fn decode_source(name: &str, bytes: &[u8], header_row: usize) -> Result<RawTable> {
    if name.to_lowercase().ends_with(".csv") {
        csv_read::read_table(name, bytes, header_row)
    } else {
        excel_read::read_table(name, bytes)
    }
}
