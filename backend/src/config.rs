//! Runtime configuration.
//!
//! Settings come from the environment (a `.env` file is loaded first when
//! present). CLI flags override them.
//!
//! | Variable | Default |
//! |---|---|
//! | `TABCLEAN_PORT` | `3000` |
//! | `TABCLEAN_PREVIEW_ROWS` | `5` |
//! | `TABCLEAN_MAX_UPLOAD_BYTES` | 50 MB |

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::transform::pipeline::DEFAULT_PREVIEW_ROWS;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum request body size for uploads (in bytes).
///
/// 50 MB limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub preview_rows: usize,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            port: read(&lookup, "TABCLEAN_PORT", defaults.port)?,
            preview_rows: read(&lookup, "TABCLEAN_PREVIEW_ROWS", defaults.preview_rows)?,
            max_upload_bytes: read(&lookup, "TABCLEAN_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

fn read<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.preview_rows, 5);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("TABCLEAN_PORT", "8080"),
            ("TABCLEAN_PREVIEW_ROWS", " 20 "),
        ]))
        .unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.preview_rows, 20);
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_invalid_value() {
        let err = Settings::from_lookup(lookup(&[("TABCLEAN_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABCLEAN_PORT"));
    }
}
