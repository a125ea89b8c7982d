use calamine::Data;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a table.
///
/// Workbook dates are kept as text so that they survive a rewrite unchanged
/// and take part in keyword search the way they are displayed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Lowercased display form, used by the keyword filter.
    pub fn search_key(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// Read edited text as a number when the value it replaces is one.
    pub fn coerce_like(self, previous: &CellValue) -> CellValue {
        match (&self, previous) {
            (CellValue::Text(s), CellValue::Number(_)) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or(self),
            _ => self,
        }
    }

    /// Convert a value posted by the inline editor.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) if dt.time().num_seconds_from_midnight() == 0 => {
                    CellValue::Text(dt.format("%Y-%m-%d").to_string())
                }
                Some(dt) => CellValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(format!("#ERROR: {e:?}")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // 310.0 reads back from a workbook as a float; show it as 310
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(310.0).to_string(), "310");
        assert_eq!(CellValue::Number(0.0125).to_string(), "0.0125");
        assert_eq!(CellValue::Number(-4.0).to_string(), "-4");
    }

    #[test]
    fn empty_displays_as_blank() {
        assert_eq!(CellValue::Empty.to_string(), "");
        assert!(CellValue::Text(String::new()).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
    }

    #[test]
    fn json_values_keep_their_kind() {
        assert_eq!(
            CellValue::from_json(&serde_json::json!("Vodafone")),
            CellValue::Text("Vodafone".into())
        );
        assert_eq!(
            CellValue::from_json(&serde_json::json!(0.5)),
            CellValue::Number(0.5)
        );
        assert_eq!(CellValue::from_json(&serde_json::Value::Null), CellValue::Empty);
        assert_eq!(
            CellValue::from_json(&serde_json::json!(true)),
            CellValue::Bool(true)
        );
    }

    #[test]
    fn edited_text_follows_previous_kind() {
        let price = CellValue::Number(0.5);
        assert_eq!(CellValue::from("0.75").coerce_like(&price), CellValue::Number(0.75));
        assert_eq!(CellValue::from("n/a").coerce_like(&price), CellValue::from("n/a"));
        assert_eq!(
            CellValue::from("12").coerce_like(&CellValue::from("Acme")),
            CellValue::from("12")
        );
    }

    #[test]
    fn search_key_is_lowercase() {
        assert_eq!(CellValue::from("DE-Telekom").search_key(), "de-telekom");
    }

    #[test]
    fn calamine_data_converts() {
        assert_eq!(CellValue::from(&Data::Int(262)), CellValue::Number(262.0));
        assert_eq!(
            CellValue::from(&Data::String("GB".into())),
            CellValue::Text("GB".into())
        );
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
    }
}
