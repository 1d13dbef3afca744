pub mod console;
pub mod csv;
pub mod json;

use serde::{Deserialize, Serialize};

use crate::aggregate::ResultSet;
use crate::error::Result;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Console,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Some(Self::Console),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Render ranked results in the specified format. `color` only affects
/// the console format.
pub fn render(results: &ResultSet, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render(results, color)),
        OutputFormat::Csv => csv::render(results),
        OutputFormat::Json => json::render(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_format_names() {
        assert_eq!(OutputFormat::from_str_lenient("CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_str_lenient("text"), Some(OutputFormat::Console));
        assert_eq!(OutputFormat::from_str_lenient("sarif"), None);
    }
}
