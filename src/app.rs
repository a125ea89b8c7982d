use axum::{
    Extension, Form, Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::cell::CellValue;
use crate::config::AppConfig;
use crate::downloader::{self, XLSX_MIME};
use crate::login::{self, CurrentUser, SessionStore, redirect_with_notice, take_flash};
use crate::merge::merge_upload;
use crate::query::{self, PageView, parse_positive};
use crate::render::{CellView, DashboardPage, FileOption, RowView, Templates};
use crate::store::TableStore;
use crate::table::Table;

/// Largest accepted request body; uploads are whole workbooks.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Prefix of the add-row form fields that carry column values.
const COLUMN_FIELD_PREFIX: &str = "col:";

/// Shared state handed to every handler.
///
/// Tables are not part of it: each request loads what it needs from disk.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: TableStore,
    pub sessions: SessionStore,
    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, handlebars::TemplateError> {
        Ok(AppState {
            store: TableStore::from_config(&config),
            sessions: SessionStore::new(Duration::from_secs(config.session_ttl_secs)),
            templates: Arc::new(Templates::new()?),
            config: Arc::new(config),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    search: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
    selected_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    search: Option<String>,
    selected_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CellUpdate {
    id: String,
    column: String,
    #[serde(default)]
    value: serde_json::Value,
    selected_file: Option<String>,
}

/// Build the application router.
///
/// Kept apart from [`run`] so tests can drive it without a socket.
pub fn create_router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/dashboard", get(dashboard).post(upload))
        .route("/download", get(download))
        .route("/delete_rows", post(delete_rows))
        .route("/add_row", post(add_row))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    let api = Router::new()
        .route("/update_cell", post(update_cell))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth_json,
        ));

    Router::new()
        .route("/", get(login::serve_login_page).post(login::handle_login))
        .route("/logout", get(login::handle_logout))
        .merge(pages)
        .merge(api)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Create the upload directory, bind and serve until the process stops.
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;
    state.store.ensure_dir()?;

    let listener = TcpListener::bind(&state.config.bind).await?;
    log::info!(
        "Listening on http://{} (tables in {})",
        state.config.bind,
        state.store.dir().display()
    );
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

fn dashboard_url(selected_file: &str) -> String {
    format!(
        "/dashboard?selected_file={}",
        urlencoding::encode(selected_file)
    )
}

fn page_link(selected_file: &str, search: &str, page: usize, page_size: usize) -> String {
    format!(
        "/dashboard?selected_file={}&search={}&page={}&page_size={}",
        urlencoding::encode(selected_file),
        urlencoding::encode(search),
        page,
        page_size
    )
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Query(params): Query<DashboardQuery>,
) -> Response {
    let (jar, mut notices) = take_flash(jar);

    let registry = state.store.registry();
    notices.extend(registry.warnings.iter().cloned());

    let search = params.search.unwrap_or_default();
    let page = parse_positive(params.page.as_deref(), 1);
    let page_size = parse_positive(params.page_size.as_deref(), state.config.default_page_size);
    let selected_file = params
        .selected_file
        .filter(|name| !name.is_empty())
        .or_else(|| registry.files.first().map(|f| f.name.clone()));

    let table = match &selected_file {
        Some(name) => match state.store.load(name) {
            Ok(loaded) => loaded.table,
            Err(e) => {
                log::warn!("failed to load {}: {}", name, e);
                notices.push(format!("Error loading {name}: {e}"));
                Table::default()
            }
        },
        None => Table::default(),
    };

    let view = query::view(&table, &search, page, page_size);
    let files = registry
        .files
        .iter()
        .map(|f| FileOption {
            name: f.name.clone(),
            sheets: f.sheets.join(", "),
            selected: selected_file.as_deref() == Some(f.name.as_str()),
        })
        .collect();

    let page = dashboard_page(&user, notices, files, selected_file, search, view);
    match state.templates.dashboard(&page) {
        Ok(html) => (jar, Html(html)).into_response(),
        Err(e) => {
            log::error!("failed to render dashboard: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

fn dashboard_page(
    user: &CurrentUser,
    notices: Vec<String>,
    files: Vec<FileOption>,
    selected_file: Option<String>,
    search: String,
    view: PageView,
) -> DashboardPage {
    let link = |page: usize| {
        selected_file
            .as_deref()
            .map(|name| page_link(name, &search, page, view.page_size))
    };
    let prev_link = if view.page > 1 { link(view.page - 1) } else { None };
    let next_link = if view.page < view.total_pages {
        link(view.page + 1)
    } else {
        None
    };
    let download_link = selected_file.as_deref().map(|name| {
        format!(
            "/download?selected_file={}&search={}",
            urlencoding::encode(name),
            urlencoding::encode(&search)
        )
    });

    let rows = view
        .rows
        .into_iter()
        .map(|row| RowView {
            cells: view
                .columns
                .iter()
                .zip(row.values.iter())
                .map(|(column, value)| CellView {
                    column: column.clone(),
                    value: value.to_string(),
                })
                .collect(),
            id: row.id,
        })
        .collect();

    DashboardPage {
        username: user.email.clone(),
        role: user.role.as_str().to_string(),
        is_admin: user.is_admin(),
        notices,
        files,
        selected_file,
        columns: view.columns,
        rows,
        page: view.page,
        page_size: view.page_size,
        total_pages: view.total_pages,
        filtered_count: view.filtered_count,
        total_count_all: view.total_count_all,
        search_query: search,
        prev_link,
        next_link,
        download_link,
    }
}

async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    if !user.is_admin() {
        return redirect_with_notice(jar, "Only administrators can upload files", "/dashboard");
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((name, bytes.to_vec())),
                    Err(e) => {
                        return redirect_with_notice(
                            jar,
                            format!("Error reading file: {e}"),
                            "/dashboard",
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return redirect_with_notice(jar, format!("Error reading file: {e}"), "/dashboard");
            }
        }
    }

    let Some((name, bytes)) = file.filter(|(name, _)| !name.is_empty()) else {
        return redirect_with_notice(jar, "Select a valid .xlsx file", "/dashboard");
    };

    match merge_upload(&state.store, &name, &bytes) {
        Ok(outcome) => {
            log::info!("{} uploaded {}: {:?}", user.email, name, outcome);
            redirect_with_notice(
                jar,
                outcome.notice(),
                &dashboard_url(state.store.master_name()),
            )
        }
        Err(e) => {
            log::warn!("upload of {} by {} rejected: {}", name, user.email, e);
            redirect_with_notice(jar, e.to_string(), "/dashboard")
        }
    }
}

async fn download(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<DownloadQuery>,
) -> Response {
    let Some(name) = params.selected_file.filter(|n| !n.is_empty()) else {
        return redirect_with_notice(jar, "No file selected", "/dashboard");
    };
    let search = params.search.unwrap_or_default();

    match downloader::export(&state.store, &name, search.trim()) {
        Ok(export) => {
            log::info!("exporting {} rows of {}", export.rows, name);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, XLSX_MIME)
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.file_name),
                )
                .body(Body::from(export.bytes))
                .unwrap_or_else(|e| {
                    log::error!("failed to build download response: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
        }
        Err(e) => redirect_with_notice(
            jar,
            format!("Error loading data for download: {e}"),
            "/dashboard",
        ),
    }
}

/// Split a form into its `selected_file` value and the remaining fields.
fn split_form(fields: Vec<(String, String)>) -> (Option<String>, Vec<(String, String)>) {
    let mut selected_file = None;
    let mut rest = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        if key == "selected_file" {
            selected_file = Some(value).filter(|v| !v.is_empty());
        } else {
            rest.push((key, value));
        }
    }
    (selected_file, rest)
}

async fn delete_rows(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let (selected_file, fields) = split_form(fields);
    let Some(name) = selected_file else {
        return redirect_with_notice(jar, "No file selected", "/dashboard");
    };
    let ids: HashSet<String> = fields
        .into_iter()
        .filter(|(key, _)| key == "delete_checkbox")
        .map(|(_, id)| id)
        .collect();

    let notice = match state.store.delete_rows(&name, &ids) {
        Ok(removed) => {
            log::info!("{} deleted {} rows from {}", user.email, removed, name);
            "Selected rows deleted successfully!".to_string()
        }
        Err(e) => {
            log::warn!("delete in {} failed: {}", name, e);
            format!("Error deleting rows: {e}")
        }
    };
    redirect_with_notice(jar, notice, &dashboard_url(&name))
}

async fn add_row(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let (selected_file, fields) = split_form(fields);
    let Some(name) = selected_file else {
        return redirect_with_notice(jar, "No file selected", "/dashboard");
    };
    let fields: HashMap<String, String> = fields
        .into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(COLUMN_FIELD_PREFIX)
                .map(|column| (column.to_string(), value))
        })
        .collect();

    let notice = match state.store.add_row(&name, &fields) {
        Ok(id) => {
            log::info!("{} added row {} to {}", user.email, id, name);
            "Row added successfully!".to_string()
        }
        Err(e) => {
            log::warn!("add row to {} failed: {}", name, e);
            format!("Error adding row: {e}")
        }
    };
    redirect_with_notice(jar, notice, &dashboard_url(&name))
}

fn json_message(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

async fn update_cell(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CellUpdate>, JsonRejection>,
) -> Response {
    let update = match payload {
        Ok(Json(update)) => update,
        Err(e) => return json_message(StatusCode::BAD_REQUEST, format!("Error: {e}")),
    };
    let name = update
        .selected_file
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| state.store.master_name().to_string());
    let value = CellValue::from_json(&update.value);
    let shown = value.to_string();

    match state
        .store
        .update_cell(&name, &update.id, &update.column, value)
    {
        Ok(()) => {
            log::info!(
                "{} set {}[{}].{} = {:?}",
                user.email,
                name,
                update.id,
                update.column,
                shown
            );
            json_message(
                StatusCode::OK,
                format!(
                    "Updated row {}, column {} → {}",
                    update.id, update.column, shown
                ),
            )
        }
        Err(e) => json_message(StatusCode::BAD_REQUEST, format!("Error: {e}")),
    }
}

