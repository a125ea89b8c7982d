#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use sheetdesk::table::REQUIRED_COLUMNS;
use std::path::Path;

/// One rate sheet row in `REQUIRED_COLUMNS` order.
pub fn rate(date: &str, vendor: &str, country: &str, price: f64, mcc: f64, mnc: f64, operator: &str) -> Vec<Cell> {
    vec![
        Cell::Text(date.to_string()),
        Cell::Text(vendor.to_string()),
        Cell::Text(country.to_string()),
        Cell::Number(price),
        Cell::Number(mcc),
        Cell::Number(mnc),
        Cell::Text(operator.to_string()),
    ]
}

pub enum Cell {
    Text(String),
    Number(f64),
}

/// Build an `.xlsx` workbook in memory with `header` and `rows`.
pub fn workbook(header: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, name) in header.iter().enumerate() {
        sheet.write_string(0, c as u16, *name).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32 + 1, c as u16);
            match cell {
                Cell::Text(s) => sheet.write_string(r, c, s.as_str()).unwrap(),
                Cell::Number(n) => sheet.write_number(r, c, *n).unwrap(),
            };
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// A valid rate sheet with `n` rows; every third row is for the Netherlands.
pub fn rate_sheet(n: usize) -> Vec<u8> {
    let rows: Vec<Vec<Cell>> = (0..n)
        .map(|i| {
            let (country, operator) = if i % 3 == 0 {
                ("NL", "KPN")
            } else {
                ("GB", "Vodafone")
            };
            rate("2024-05-01", "Acme", country, 0.01 * i as f64, 204.0, i as f64, operator)
        })
        .collect();
    workbook(&REQUIRED_COLUMNS, &rows)
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).unwrap();
}
