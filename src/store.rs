use crate::cell::CellValue;
use crate::config::AppConfig;
use crate::error::{Result, SheetError};
use crate::loader::{self, Loaded};
use crate::saving;
use crate::table::Table;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the files the application reads and writes.
pub const ALLOWED_EXTENSION: &str = "xlsx";

/// True when `name` carries the `.xlsx` extension (any case).
pub fn allowed_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ALLOWED_EXTENSION))
}

/// A spreadsheet in the upload directory and its sheet names.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub sheets: Vec<String>,
}

/// Result of scanning the upload directory.
///
/// Files that could not be read are left out of `files` and reported in
/// `warnings` instead.
#[derive(Debug, Default)]
pub struct Registry {
    pub files: Vec<FileEntry>,
    pub warnings: Vec<String>,
}

/// File-backed tables living in one directory.
///
/// Every operation goes to disk; nothing is cached between calls. Mutators
/// read the whole file, change it and write it back in full.
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
    master: String,
}

impl TableStore {
    pub fn new(dir: impl Into<PathBuf>, master: impl Into<String>) -> Self {
        TableStore {
            dir: dir.into(),
            master: master.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.master_file.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn master_name(&self) -> &str {
        &self.master
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Path of table `name`, refusing anything but a bare `.xlsx` file name.
    ///
    /// Names with quotes or control characters are refused as well; they end
    /// up in a quoted `Content-Disposition` header on download.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let bare = Path::new(name)
            .file_name()
            .is_some_and(|f| f == std::ffi::OsStr::new(name));
        let unquotable = name.chars().any(|c| c == '"' || c.is_control());
        if name.is_empty()
            || !bare
            || unquotable
            || name.contains("..")
            || !allowed_file(name)
        {
            return Err(SheetError::InvalidFileName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|p| p.is_file())
    }

    /// Load table `name`.
    ///
    /// Rows that had no usable `_id` receive one and the file is rewritten
    /// at once, so the identifiers handed out stay valid.
    pub fn load(&self, name: &str) -> Result<Loaded> {
        let path = self.resolve(name)?;
        let loaded = loader::from_excel(&path)?;
        if loaded.ids_repaired > 0 {
            log::info!(
                "assigned {} row ids in {}, writing back",
                loaded.ids_repaired,
                name
            );
            saving::save_table(&loaded.table, &path)?;
        }
        Ok(loaded)
    }

    pub fn save(&self, name: &str, table: &Table) -> Result<()> {
        saving::save_table(table, &self.resolve(name)?)
    }

    /// List every `.xlsx` file in the directory with its sheet names.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                registry
                    .warnings
                    .push(format!("Error reading {}: {e}", self.dir.display()));
                return registry;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !allowed_file(name) {
                continue;
            }
            match loader::sheet_names(&path) {
                Ok(sheets) => registry.files.push(FileEntry {
                    name: name.to_string(),
                    sheets,
                }),
                Err(e) => {
                    log::warn!("skipping unreadable {}: {}", path.display(), e);
                    registry.warnings.push(format!("Error reading {name}: {e}"));
                }
            }
        }

        registry.files.sort_by(|a, b| a.name.cmp(&b.name));
        registry
    }

    /// Set one cell of the row with identifier `id` and rewrite the file.
    pub fn update_cell(&self, name: &str, id: &str, column: &str, value: CellValue) -> Result<()> {
        let mut table = self.load(name)?.table;
        table.set_cell(id, column, value)?;
        self.save(name, &table)
    }

    /// Append one row to `name` and return its new identifier.
    pub fn add_row(&self, name: &str, fields: &HashMap<String, String>) -> Result<String> {
        let mut table = self.load(name)?.table;
        let id = table.add_row(fields);
        self.save(name, &table)?;
        Ok(id)
    }

    /// Remove the rows with the given identifiers; returns how many went.
    pub fn delete_rows(&self, name: &str, ids: &HashSet<String>) -> Result<usize> {
        let mut table = self.load(name)?.table;
        let removed = table.delete_rows(ids);
        self.save(name, &table)?;
        Ok(removed)
    }
}
