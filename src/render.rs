use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;
use serde_json::json;

/// A file in the selector on the dashboard.
#[derive(Debug, Serialize)]
pub struct FileOption {
    pub name: String,
    pub sheets: String,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct CellView {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct RowView {
    pub id: String,
    pub cells: Vec<CellView>,
}

/// Everything the dashboard template shows.
#[derive(Debug, Serialize)]
pub struct DashboardPage {
    pub username: String,
    pub role: String,
    pub is_admin: bool,
    pub notices: Vec<String>,
    pub files: Vec<FileOption>,
    pub selected_file: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub filtered_count: usize,
    pub total_count_all: usize,
    pub search_query: String,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
    pub download_link: Option<String>,
}

/// The compiled page templates.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_template_string("login", include_str!("./templates/login.hbs"))?;
        registry.register_template_string("dashboard", include_str!("./templates/dashboard.hbs"))?;
        Ok(Templates { registry })
    }

    pub fn login(&self, notices: &[String]) -> Result<String, RenderError> {
        self.registry.render("login", &json!({ "notices": notices }))
    }

    pub fn dashboard(&self, page: &DashboardPage) -> Result<String, RenderError> {
        self.registry.render("dashboard", page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> DashboardPage {
        DashboardPage {
            username: "admin@example.com".into(),
            role: "admin".into(),
            is_admin: true,
            notices: vec!["<b>careful</b>".into()],
            files: vec![FileOption {
                name: "master_data.xlsx".into(),
                sheets: "Sheet1".into(),
                selected: true,
            }],
            selected_file: Some("master_data.xlsx".into()),
            columns: vec!["Vendor".into()],
            rows: vec![RowView {
                id: "abc123".into(),
                cells: vec![CellView {
                    column: "Vendor".into(),
                    value: "Acme".into(),
                }],
            }],
            page: 1,
            page_size: 10,
            total_pages: 1,
            filtered_count: 1,
            total_count_all: 1,
            search_query: String::new(),
            prev_link: None,
            next_link: None,
            download_link: Some("/download?selected_file=master_data.xlsx&search=".into()),
        }
    }

    #[test]
    fn login_shows_notices() {
        let html = Templates::new()
            .unwrap()
            .login(&["Invalid email or password".to_string()])
            .unwrap();
        assert!(html.contains("Invalid email or password"));
        assert!(html.contains("name=\"password\""));
    }

    #[test]
    fn dashboard_escapes_and_lists_rows() {
        let html = Templates::new().unwrap().dashboard(&page()).unwrap();
        assert!(html.contains("data-id=\"abc123\""));
        assert!(html.contains("Acme"));
        assert!(html.contains("&lt;b&gt;careful&lt;/b&gt;"));
        assert!(html.contains("name=\"file\""));
        assert!(html.contains("name=\"col:Vendor\""));
    }

    #[test]
    fn upload_form_is_admin_only() {
        let mut page = page();
        page.is_admin = false;
        let html = Templates::new().unwrap().dashboard(&page).unwrap();
        assert!(!html.contains("name=\"file\""));
    }
}
