use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::table::Table;
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// A table read from a workbook, plus how many rows needed a new `_id`.
///
/// A non-zero `ids_repaired` means the in-memory table differs from the file
/// and should be written back so the identifiers stay stable.
#[derive(Debug)]
pub struct Loaded {
    pub table: Table,
    pub ids_repaired: usize,
}

/// Load the first sheet of an Excel file as a table
///
/// The first row is the header; every following row is a record.
///
/// # Examples
/// ```no_run
/// use sheetdesk::loader::from_excel;
///
/// match from_excel("uploads/master_data.xlsx") {
///     Ok(loaded) => println!("{} rows", loaded.table.len()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Loaded> {
    let mut workbook: Xlsx<BufReader<File>> = open_workbook(filepath.as_ref())?;
    read_first_sheet(&mut workbook)
}

/// Load the first sheet of an in-memory workbook, e.g. an uploaded file.
pub fn from_excel_bytes(bytes: &[u8]) -> Result<Loaded> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    read_first_sheet(&mut workbook)
}

/// Names of all sheets in an Excel file, in workbook order.
pub fn sheet_names(filepath: impl AsRef<Path>) -> Result<Vec<String>> {
    let workbook: Xlsx<BufReader<File>> = open_workbook(filepath.as_ref())?;
    Ok(workbook.sheet_names())
}

fn read_first_sheet<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> Result<Loaded> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;
    Ok(range_to_table(&range))
}

fn range_to_table(range: &Range<Data>) -> Loaded {
    let mut rows = range.rows();
    let header = match rows.next() {
        Some(first) => normalise_header(first),
        None => Vec::new(),
    };

    let records = rows
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();

    let (table, ids_repaired) = Table::from_records(&header, records);
    Loaded {
        table,
        ids_repaired,
    }
}

/// Turn the header row into unique column names.
///
/// Blank headers become `Unnamed: <index>`; a repeated name gets a `.1`,
/// `.2`, ... suffix.
pub fn normalise_header(cells: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let raw = CellValue::from(cell).to_string();
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                raw
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_blanks_and_duplicates_are_renamed() {
        let header = normalise_header(&[
            Data::String("Vendor".into()),
            Data::Empty,
            Data::String("Vendor".into()),
            Data::String("Vendor".into()),
            Data::Int(2024),
        ]);
        assert_eq!(
            header,
            vec!["Vendor", "Unnamed: 1", "Vendor.1", "Vendor.2", "2024"]
        );
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(from_excel_bytes(b"definitely not a zip archive").is_err());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(from_excel(dir.path().join("absent.xlsx")).is_err());
        assert!(sheet_names(dir.path().join("absent.xlsx")).is_err());
    }
}
