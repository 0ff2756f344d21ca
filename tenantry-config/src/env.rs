// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Prefix shared by every tenancy variable.
pub const ENV_PREFIX: &str = "TENANTRY";

/// Snapshot of environment variables, optionally restricted to a prefix.
///
/// Values are captured once at construction so later reads never observe a
/// concurrently mutated process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
    vars: HashMap<String, String>,
}

impl EnvLoader {
    /// Snapshot the process environment.
    pub fn from_process(prefix: Option<&str>) -> Self {
        Self::from_pairs(prefix, env::vars())
    }

    /// Build from explicit key/value pairs (tests, `.env` files).
    pub fn from_pairs<I, K, V>(prefix: Option<&str>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.map(str::to_string),
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Read a `.env` file without touching the process environment.
    pub fn from_dotenv_file(prefix: Option<&str>, path: impl AsRef<Path>) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path.as_ref())
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        let mut pairs = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::ParseError(e.to_string()))?;
            pairs.push((key, value));
        }
        Ok(Self::from_pairs(prefix, pairs))
    }

    /// Fill keys missing here from `fallback`.
    pub fn or_else(mut self, fallback: EnvLoader) -> Self {
        for (key, value) in fallback.vars {
            self.vars.entry(key).or_insert(value);
        }
        self
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Prefixed lookup: `load_var("default_schema")` reads `TENANTRY_DEFAULT_SCHEMA`.
    pub fn load_var(&self, key: &str) -> Option<String> {
        self.vars.get(&self.full_key(key)).cloned()
    }

    /// Lookup ignoring the prefix (e.g. `DATABASE_URL`).
    pub fn load_raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Parse a boolean flag. Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    pub fn load_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.load_var(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: self.full_key(key),
                value: raw,
            }),
        }
    }

    /// Parse a comma separated list, dropping blank entries.
    pub fn load_list(&self, key: &str) -> Option<Vec<String>> {
        self.load_var(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(pairs: &[(&str, &str)]) -> EnvLoader {
        EnvLoader::from_pairs(Some(ENV_PREFIX), pairs.iter().copied())
    }

    #[test]
    fn test_prefixed_lookup() {
        let env = loader(&[("TENANTRY_DEFAULT_SCHEMA", "shared")]);
        assert_eq!(env.load_var("default_schema"), Some("shared".to_string()));
        assert_eq!(env.load_var("missing"), None);
    }

    #[test]
    fn test_raw_lookup_ignores_prefix() {
        let env = loader(&[("DATABASE_URL", "postgres://localhost/app")]);
        assert_eq!(
            env.load_raw("DATABASE_URL"),
            Some("postgres://localhost/app".to_string())
        );
    }

    #[test]
    fn test_bool_parsing() {
        let env = loader(&[("TENANTRY_A", "yes"), ("TENANTRY_B", "0"), ("TENANTRY_C", "maybe")]);
        assert_eq!(env.load_bool("a").unwrap(), Some(true));
        assert_eq!(env.load_bool("b").unwrap(), Some(false));
        assert_eq!(env.load_bool("d").unwrap(), None);
        assert!(matches!(
            env.load_bool("c"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_list_parsing() {
        let env = loader(&[("TENANTRY_EXCLUDED_SCHEMAS", " audit, ,shared ")]);
        assert_eq!(
            env.load_list("excluded_schemas"),
            Some(vec!["audit".to_string(), "shared".to_string()])
        );
    }

    #[test]
    fn test_or_else_keeps_primary_values() {
        let primary = loader(&[("TENANTRY_AUTO_CREATE", "1")]);
        let fallback = loader(&[("TENANTRY_AUTO_CREATE", "0"), ("TENANTRY_DEFAULT_SCHEMA", "x")]);
        let merged = primary.or_else(fallback);
        assert_eq!(merged.load_bool("auto_create").unwrap(), Some(true));
        assert_eq!(merged.load_var("default_schema"), Some("x".to_string()));
    }
}
