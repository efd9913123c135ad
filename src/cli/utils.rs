use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Render a success message in the appropriate format
pub fn render_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<String> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            Ok(serde_json::to_string_pretty(&response)?)
        }
        OutputFormat::Text => Ok(format!("✓ {}", message)),
    }
}

/// Render an empty collection in the appropriate format
pub fn render_empty_collection(output_format: OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<String> {
    match output_format {
        OutputFormat::Json => {
            let mut body = serde_json::Map::new();
            body.insert(collection_name.to_string(), json!([]));
            Ok(serde_json::to_string_pretty(&Value::Object(body))?)
        }
        OutputFormat::Text => Ok(message.to_string()),
    }
}

/// Truncate long free-text values for table output
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let cut: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
