/*!
# sheetdesk

A small multi-user web application around a merged "master" spreadsheet.

## Overview

An administrator uploads `.xlsx` files; rows that carry the required columns
are appended to a single master workbook. Logged-in users browse, search and
page through any workbook in the upload directory, edit single cells inline,
add and delete rows, and download the filtered rows as a new workbook.

## Architecture

Every request reads the workbook it needs from disk and every change rewrites
the whole file. There is no table cache and no locking between requests: the
last writer wins.

### Data Layer
- **cell**: `CellValue`, one spreadsheet cell
- **table**: `Table` and `Row`, row identifiers (`_id`), schema check, append,
  keyword filter, row mutations
- **loader**: workbook → table (calamine)
- **saving**: table → workbook, atomic file replacement (rust_xlsxwriter)
- **store**: the upload directory, file registry, read-modify-write mutators

### Application Layer
- **merge**: validating an upload and appending it to the master
- **query**: keyword parsing and pagination
- **downloader**: filtered export
- **login**: sessions, credential check, flash notices, auth middleware
- **render**: handlebars pages
- **app**: routing and request handlers

## HTTP Endpoints

- `GET /`, `POST /` - login form and submission
- `GET /dashboard` - view (`search`, `page`, `page_size`, `selected_file`)
- `POST /dashboard` - admin upload (multipart field `file`)
- `GET /download` - filtered workbook
- `POST /delete_rows`, `POST /add_row` - row mutations
- `POST /update_cell` - JSON single-cell edit
- `GET /logout` - end the session
*/

pub mod app;
pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod login;
pub mod merge;
pub mod query;
pub mod render;
pub mod saving;
pub mod store;
pub mod table;

pub use cell::CellValue;
pub use config::{AppConfig, Role};
pub use error::{Result, SheetError};
pub use store::TableStore;
pub use table::{ID_COLUMN, REQUIRED_COLUMNS, Row, Table};
