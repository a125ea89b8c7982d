use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::table::{ID_COLUMN, Table};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize a table into the bytes of a single-sheet `.xlsx` workbook.
///
/// The header row lists the data columns followed by `_id`.
pub fn workbook_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_table(worksheet, table)?;
    Ok(workbook.save_to_buffer()?)
}

/// Replace the file at `path` with `table`.
///
/// The workbook is built in memory and written to a sibling temporary file
/// which is then renamed over `path`; a failure leaves the old file intact.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    let buffer = workbook_bytes(table)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&buffer)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SheetError::Io(e.error))?;
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &Table) -> Result<()> {
    let id_col = col_index(table.columns().len())?;
    for (c, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, col_index(c)?, name)?;
    }
    worksheet.write_string(0, id_col, ID_COLUMN)?;

    for (r, row) in table.rows().iter().enumerate() {
        let r = u32::try_from(r + 1).map_err(|_| SheetError::TooManyRows)?;
        for (c, value) in row.values.iter().enumerate() {
            let c = col_index(c)?;
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
        worksheet.write_string(r, id_col, &row.id)?;
    }
    Ok(())
}

fn col_index(c: usize) -> Result<u16> {
    u16::try_from(c).map_err(|_| SheetError::TooManyColumns)
}
