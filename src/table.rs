use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Reserved column holding the row identifier.
pub const ID_COLUMN: &str = "_id";

/// Columns every uploaded file and the master file must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "Date",
    "Vendor",
    "CountryISO",
    "CostPrice",
    "MCC",
    "MNC",
    "Operator",
];

/// Generate a fresh row identifier (32 lowercase hex characters).
pub fn new_row_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// One table row: its identifier plus one value per data column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub id: String,
    pub values: Vec<CellValue>,
}

impl Row {
    /// True when any cell, or the identifier, contains any of the keywords.
    ///
    /// Keywords are expected to be lowercase already.
    pub fn matches_any(&self, keywords: &[String]) -> bool {
        let id = self.id.to_lowercase();
        self.values
            .iter()
            .map(CellValue::search_key)
            .chain(std::iter::once(id))
            .any(|cell| keywords.iter().any(|k| cell.contains(k.as_str())))
    }
}

/// The rows and named columns of one spreadsheet file.
///
/// `columns` never contains [`ID_COLUMN`]; identifiers live on each [`Row`]
/// and are written back as the last column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns: columns.into_iter().filter(|c| c != ID_COLUMN).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from a header and raw records.
    ///
    /// When the header carries an `_id` column its values become the row
    /// identifiers. Blank or repeated identifiers are replaced; the second
    /// element of the result is how many rows received a new identifier.
    pub fn from_records(header: &[String], records: Vec<Vec<CellValue>>) -> (Self, usize) {
        let id_pos = header.iter().position(|h| h == ID_COLUMN);
        let mut table = Table::new(header.to_vec());

        for record in records {
            let mut id = String::new();
            let mut values = Vec::with_capacity(table.columns.len());
            for (idx, _) in header.iter().enumerate() {
                let value = record.get(idx).cloned().unwrap_or_default();
                if Some(idx) == id_pos {
                    id = value.to_string().trim().to_string();
                } else {
                    values.push(value);
                }
            }
            table.rows.push(Row { id, values });
        }

        let repaired = table.ensure_ids();
        (table, repaired)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Value of `column` in the row with identifier `id`.
    pub fn cell(&self, id: &str, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.row(id).and_then(|r| r.values.get(idx))
    }

    /// Give every row with a blank or already-seen identifier a fresh one.
    pub fn ensure_ids(&mut self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows.len());
        let mut repaired = 0;
        for row in &mut self.rows {
            if row.id.is_empty() || !seen.insert(row.id.clone()) {
                row.id = new_row_id();
                seen.insert(row.id.clone());
                repaired += 1;
            }
        }
        repaired
    }

    /// Replace every identifier; uploads are always treated as new rows.
    pub fn assign_fresh_ids(&mut self) {
        for row in &mut self.rows {
            row.id = new_row_id();
        }
    }

    /// Required columns absent from this table, in `required` order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    pub fn check_schema(&self) -> Result<()> {
        let missing = self.missing_columns(&REQUIRED_COLUMNS);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SheetError::MissingColumns(missing))
        }
    }

    /// Append `other`'s rows after ours.
    ///
    /// Columns only `other` has are added at the end; cells a row has no
    /// value for stay empty. Existing rows keep their order and values.
    pub fn append(&mut self, other: Table) {
        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
            }
        }
        let width = self.columns.len();
        for row in &mut self.rows {
            row.values.resize(width, CellValue::Empty);
        }

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        for row in other.rows {
            let mut values = vec![CellValue::Empty; width];
            for (src, value) in row.values.into_iter().enumerate() {
                if let Some(&dst) = mapping.get(src) {
                    values[dst] = value;
                }
            }
            self.rows.push(Row { id: row.id, values });
        }
    }

    /// Rows matching any keyword; all rows when `keywords` is empty.
    pub fn filtered(&self, keywords: &[String]) -> Table {
        if keywords.is_empty() {
            return self.clone();
        }
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.matches_any(keywords))
                .cloned()
                .collect(),
        }
    }

    /// Rows `[offset, offset + limit)`, clipped to the table.
    pub fn slice(&self, offset: usize, limit: usize) -> &[Row] {
        let start = offset.min(self.rows.len());
        let end = offset.saturating_add(limit).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn set_cell(&mut self, id: &str, column: &str, value: CellValue) -> Result<()> {
        if column == ID_COLUMN {
            return Err(SheetError::ReservedColumn(column.to_string()));
        }
        let idx = self
            .column_index(column)
            .ok_or_else(|| SheetError::ColumnNotFound(column.to_string()))?;
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SheetError::RowNotFound(id.to_string()))?;
        let previous = std::mem::take(&mut row.values[idx]);
        row.values[idx] = value.coerce_like(&previous);
        Ok(())
    }

    /// Append a row built from per-column text fields and return its id.
    ///
    /// Columns without a field get an empty string.
    pub fn add_row(&mut self, fields: &HashMap<String, String>) -> String {
        let id = new_row_id();
        let values = self
            .columns
            .iter()
            .map(|c| CellValue::Text(fields.get(c).cloned().unwrap_or_default()))
            .collect();
        self.rows.push(Row {
            id: id.clone(),
            values,
        });
        id
    }

    /// Remove every row whose id is in `ids`; unknown ids are ignored.
    pub fn delete_rows(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !ids.contains(&r.id));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> Table {
        let (table, _) = Table::from_records(
            &header(&["Vendor", "CountryISO"]),
            vec![
                vec!["Acme".into(), "NL".into()],
                vec!["Globex".into(), "GB".into()],
                vec!["Initech".into(), "nl".into()],
            ],
        );
        table
    }

    #[test]
    fn from_records_generates_missing_ids() {
        let table = sample();
        assert_eq!(table.len(), 3);
        let ids: HashSet<_> = table.rows().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.len() == 32));
    }

    #[test]
    fn from_records_keeps_existing_ids_and_repairs_duplicates() {
        let (table, repaired) = Table::from_records(
            &header(&["Vendor", "_id"]),
            vec![
                vec!["Acme".into(), "a1".into()],
                vec!["Globex".into(), "a1".into()],
                vec!["Initech".into(), CellValue::Empty],
            ],
        );
        assert_eq!(repaired, 2);
        assert_eq!(table.columns(), &["Vendor".to_string()]);
        assert_eq!(table.rows()[0].id, "a1");
        assert_ne!(table.rows()[1].id, "a1");
        assert!(!table.rows()[2].id.is_empty());
    }

    #[test]
    fn missing_columns_are_listed_in_required_order() {
        let table = Table::new(header(&["Operator", "Date", "Vendor"]));
        assert_eq!(
            table.missing_columns(&REQUIRED_COLUMNS),
            vec!["CountryISO", "CostPrice", "MCC", "MNC"]
        );
        match table.check_schema() {
            Err(SheetError::MissingColumns(m)) => assert_eq!(m.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_unions_columns() {
        let mut left = sample();
        let (right, _) = Table::from_records(
            &header(&["Notes", "Vendor"]),
            vec![vec!["late".into(), "Umbrella".into()]],
        );
        left.append(right);

        assert_eq!(left.columns(), &header(&["Vendor", "CountryISO", "Notes"]));
        assert_eq!(left.len(), 4);
        assert_eq!(left.rows()[0].values[2], CellValue::Empty);
        assert_eq!(left.rows()[3].values[0], CellValue::from("Umbrella"));
        assert_eq!(left.rows()[3].values[1], CellValue::Empty);
        assert_eq!(left.rows()[3].values[2], CellValue::from("late"));
    }

    #[test]
    fn filter_is_case_insensitive_substring_or() {
        let table = sample();
        let hits = table.filtered(&["nl".to_string()]);
        assert_eq!(hits.len(), 2);
        let hits = table.filtered(&["glob".to_string(), "init".to_string()]);
        assert_eq!(hits.len(), 2);
        assert_eq!(table.filtered(&[]).len(), 3);
        assert!(table.filtered(&["nomatch".to_string()]).is_empty());
    }

    #[test]
    fn slice_clips_out_of_range() {
        let table = sample();
        assert_eq!(table.slice(0, 2).len(), 2);
        assert_eq!(table.slice(2, 2).len(), 1);
        assert!(table.slice(10, 2).is_empty());
    }

    #[test]
    fn set_cell_reports_unknown_targets() {
        let mut table = sample();
        let id = table.rows()[1].id.clone();
        table.set_cell(&id, "Vendor", "Hooli".into()).unwrap();
        assert_eq!(table.cell(&id, "Vendor"), Some(&CellValue::from("Hooli")));

        assert!(matches!(
            table.set_cell("nope", "Vendor", "x".into()),
            Err(SheetError::RowNotFound(_))
        ));
        assert!(matches!(
            table.set_cell(&id, "Price", "x".into()),
            Err(SheetError::ColumnNotFound(_))
        ));
        assert!(matches!(
            table.set_cell(&id, ID_COLUMN, "x".into()),
            Err(SheetError::ReservedColumn(_))
        ));
    }

    #[test]
    fn add_and_delete_rows() {
        let mut table = sample();
        let mut fields = HashMap::new();
        fields.insert("Vendor".to_string(), "Hooli".to_string());
        let id = table.add_row(&fields);
        assert_eq!(table.len(), 4);
        assert_eq!(table.cell(&id, "CountryISO"), Some(&CellValue::from("")));

        let first = table.rows()[0].id.clone();
        let ids: HashSet<String> = [first, "ghost".to_string()].into_iter().collect();
        assert_eq!(table.delete_rows(&ids), 1);
        assert_eq!(table.len(), 3);
        assert!(table.row(&id).is_some());
    }
}
