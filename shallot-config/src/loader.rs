// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// JSON, with `//` line comments allowed outside of strings
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unsupported = |reason: String| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason,
        };
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| unsupported("no file extension".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| unsupported(format!("extension {}", ext)))?;

        Ok(Self::new(format))
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => self.parse_json(content),
            FileFormat::Toml => self.parse_toml(content),
            FileFormat::Env => self.parse_env(content),
        }
    }

    fn parse_json(&self, content: &str) -> Result<Value> {
        serde_json::from_str(&strip_line_comments(content))
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))
    }

    fn parse_toml(&self, content: &str) -> Result<Value> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        serde_json::to_value(toml_value)
            .map_err(|e| ConfigError::ParseError(format!("TOML to JSON conversion error: {}", e)))
    }

    fn parse_env(&self, content: &str) -> Result<Value> {
        let mut map = serde_json::Map::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                map.insert(key.to_string(), scalar(value));
            }
        }

        Ok(Value::Object(map))
    }
}

/// Interpret a raw string as a JSON scalar when it parses as one, otherwise
/// keep it as a string. `"3000"` becomes a number, `"true"` a bool.
pub(crate) fn scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Blank out `//` comments that sit outside string literals. Line structure is
/// preserved so parse errors still point at the right line.
fn strip_line_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push('\n');
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                in_comment = true;
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let json = r#"{"key": "value", "number": 42}"#;

        let result = loader.parse(json).unwrap();
        assert!(result.is_object());
    }

    #[test]
    fn test_parse_json_with_comments() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let json = r#"{
            // application name
            "APP_NAME": "demo", // trailing
            "HOME": "http://example.com//path"
        }"#;

        let result = loader.parse(json).unwrap();
        assert_eq!(result["APP_NAME"], "demo");
        assert_eq!(result["HOME"], "http://example.com//path");
    }

    #[test]
    fn test_parse_json_error_reports_parse_error() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let err = loader.parse("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let toml = r#"
            APP_NAME = "value"
            HTTP_PORT = 42
        "#;

        let result = loader.parse(toml).unwrap();
        assert_eq!(result["HTTP_PORT"], 42);
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let env = r#"
            KEY=value
            NUMBER=42
            # Comment
            QUOTED="quoted value"
        "#;

        let result = loader.parse(env).unwrap();
        assert_eq!(result["KEY"], "value");
        assert_eq!(result["NUMBER"], 42);
        assert_eq!(result["QUOTED"], "quoted value");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("env"), Some(FileFormat::Env));
        assert_eq!(FileFormat::from_extension("unknown"), None);
        assert!(ConfigLoader::auto("config.yaml").is_err());
        assert!(ConfigLoader::auto("config.json").is_ok());
    }
}
