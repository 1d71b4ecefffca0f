// Environment variable overrides

use crate::loader::scalar;
use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::env;

/// Prefix used when none is given.
pub const DEFAULT_PREFIX: &str = "SHALLOT";

/// Environment variable loader
///
/// Only variables named `<PREFIX>_<KEY>` are picked up; the prefix and the
/// joining underscore are stripped and the key is kept upper-case so it lines
/// up with the `SCREAMING_SNAKE_CASE` keys of [`crate::AppConfig`].
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Collect the prefixed variables of the current process.
    pub fn load(&self) -> Map<String, Value> {
        self.load_from(env::vars())
    }

    /// Collect the prefixed variables out of an arbitrary set of pairs.
    pub fn load_from<I>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Map::new();

        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            let Some(name) = rest.strip_prefix('_') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            map.insert(name.to_uppercase(), scalar(&value));
        }

        map
    }

    /// Overlay the prefixed variables onto a configuration object.
    pub fn apply(&self, target: &mut Value) {
        self.apply_from(target, env::vars());
    }

    pub fn apply_from<I>(&self, target: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let overrides = self.load_from(vars);
        if overrides.is_empty() {
            return;
        }
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        if let Value::Object(map) = target {
            map.extend(overrides);
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = format!("{}_{}", self.prefix, key.to_uppercase());
        env::var(&full_key).map_err(|source| ConfigError::EnvError {
            key: full_key,
            source,
        })
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
