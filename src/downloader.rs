use crate::error::Result;
use crate::query::parse_keywords;
use crate::saving::workbook_bytes;
use crate::store::TableStore;

/// MIME type of an `.xlsx` workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A filtered workbook ready to be sent as an attachment.
#[derive(Debug)]
pub struct Export {
    pub file_name: String,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

/// Name offered to the browser for a filtered download of `name`.
///
/// # Examples
/// ```
/// use sheetdesk::downloader::export_file_name;
///
/// assert_eq!(export_file_name("master_data.xlsx"), "filtered_master_data.xlsx");
/// ```
pub fn export_file_name(name: &str) -> String {
    format!("filtered_{name}")
}

/// Reload `name` from disk, filter it by `search` and serialize the result.
///
/// The file is always read fresh so the download reflects what is on disk
/// now. Row identifiers are kept in the exported workbook.
pub fn export(store: &TableStore, name: &str, search: &str) -> Result<Export> {
    let loaded = store.load(name)?;
    let filtered = loaded.table.filtered(&parse_keywords(search));
    Ok(Export {
        file_name: export_file_name(name),
        rows: filtered.len(),
        bytes: workbook_bytes(&filtered)?,
    })
}
