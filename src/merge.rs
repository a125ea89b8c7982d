//! Merging an uploaded workbook into the master table.

use crate::error::SheetError;
use crate::loader;
use crate::store::{TableStore, allowed_file};
use crate::table::REQUIRED_COLUMNS;
use thiserror::Error;

/// Why an upload was not merged. The master file is untouched in every case.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Select a valid .xlsx file")]
    NotXlsx,

    #[error("Error reading file: {0}")]
    Unreadable(SheetError),

    #[error("Schema mismatch! Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Existing master file has invalid schema! Please fix manually.")]
    InvalidMaster,

    #[error("Error appending to master file: {0}")]
    Master(SheetError),
}

/// What a successful merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No master existed; the upload became the master.
    Created { rows: usize },
    /// The upload's rows were appended after the existing master rows.
    Appended { added: usize, total: usize },
}

impl MergeOutcome {
    pub fn notice(&self) -> &'static str {
        match self {
            MergeOutcome::Created { .. } => "Master file created successfully!",
            MergeOutcome::Appended { .. } => "Data appended successfully to master file!",
        }
    }
}

/// Validate an uploaded workbook and merge it into the master table.
///
/// Every uploaded row gets a fresh `_id`. The combined table is built in
/// memory before anything is written, and the write itself replaces the
/// master atomically.
pub fn merge_upload(
    store: &TableStore,
    upload_name: &str,
    bytes: &[u8],
) -> Result<MergeOutcome, MergeError> {
    if !allowed_file(upload_name) {
        return Err(MergeError::NotXlsx);
    }

    let mut upload = loader::from_excel_bytes(bytes)
        .map_err(MergeError::Unreadable)?
        .table;
    let missing = upload.missing_columns(&REQUIRED_COLUMNS);
    if !missing.is_empty() {
        return Err(MergeError::MissingColumns(missing));
    }
    upload.assign_fresh_ids();

    let master = store.master_name();
    if !store.exists(master) {
        let rows = upload.len();
        store.save(master, &upload).map_err(MergeError::Master)?;
        log::info!("created master {} with {} rows from {}", master, rows, upload_name);
        return Ok(MergeOutcome::Created { rows });
    }

    // Read without the id write-back of `TableStore::load`: a master with a
    // broken schema must stay exactly as it is.
    let path = store.resolve(master).map_err(MergeError::Master)?;
    let mut combined = loader::from_excel(&path)
        .map_err(MergeError::Master)?
        .table;
    if combined.check_schema().is_err() {
        return Err(MergeError::InvalidMaster);
    }

    let added = upload.len();
    combined.append(upload);
    store.save(master, &combined).map_err(MergeError::Master)?;
    log::info!(
        "appended {} rows from {} to {} ({} total)",
        added,
        upload_name,
        master,
        combined.len()
    );
    Ok(MergeOutcome::Appended {
        added,
        total: combined.len(),
    })
}
