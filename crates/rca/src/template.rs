//! Template rendering utilities using Tera

use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

/// Render a template string with the given context.
///
/// Top-level keys of an object context become template variables; any other
/// value is available as `data`. Autoescaping is off since the output is
/// plain text for an LLM.
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_template("template", template)
        .map_err(|e| Error::Template(format!("Failed to parse template: {}", e)))?;

    let mut tera_context = Context::new();
    match context {
        Value::Object(map) => {
            for (key, value) in map {
                tera_context.insert(key, value);
            }
        }
        _ => tera_context.insert("data", context),
    }

    tera.render("template", &tera_context)
        .map_err(|e| Error::Template(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_object_context() {
        let context = json!({"alert": "HighErrorRate", "labels": "app, job"});
        let result = render_template("{{ alert }} ({{ labels }})", &context).unwrap();
        assert_eq!(result, "HighErrorRate (app, job)");
    }

    #[test]
    fn does_not_escape_queries() {
        let context = json!({"query": "{job=\"varlogs\"} |= \"<error>\""});
        let result = render_template("{{ query }}", &context).unwrap();
        assert_eq!(result, "{job=\"varlogs\"} |= \"<error>\"");
    }

    #[test]
    fn missing_variables_fail() {
        let err = render_template("{{ missing }}", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
