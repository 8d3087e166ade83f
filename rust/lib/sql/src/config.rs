use serde::{Deserialize, Serialize};

use pathkv_kv::KVError;

/// Table prefix used when none is configured.
pub const DEFAULT_TABLE_PREFIX: &str = "pathkv_";

/// Settings for [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConfig {
    /// Prepended to every table name, so several stores can share one
    /// database file.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
        }
    }
}

impl SqlConfig {
    /// Name of the records table.
    pub fn table(&self) -> String {
        format!("{}key_values", self.table_prefix)
    }

    /// The prefix is spliced into SQL text unquoted, so it must be a plain
    /// identifier start: `[A-Za-z_][A-Za-z0-9_]*`, or empty.
    pub fn validate(&self) -> Result<(), KVError> {
        if self.table_prefix.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(KVError::Validation(format!(
                "table prefix {:?} must start with a letter or '_'",
                self.table_prefix
            )));
        }
        let ok = self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !ok {
            return Err(KVError::Validation(format!(
                "table prefix {:?} may only contain ASCII letters, digits and '_'",
                self.table_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_name() {
        assert_eq!(SqlConfig::default().table(), "pathkv_key_values");
    }

    #[test]
    fn rejects_injection_in_prefix() {
        let config = SqlConfig {
            table_prefix: "x; DROP TABLE y; --".into(),
        };
        assert!(config.validate().unwrap_err().is_validation());

        let config = SqlConfig {
            table_prefix: String::new(),
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.table(), "key_values");
    }

    #[test]
    fn prefix_must_start_like_an_identifier() {
        for bad in ["1_", "9app_"] {
            let config = SqlConfig {
                table_prefix: bad.into(),
            };
            assert!(config.validate().unwrap_err().is_validation());
        }
        for good in ["_app_", "app1_"] {
            let config = SqlConfig {
                table_prefix: good.into(),
            };
            assert!(config.validate().is_ok());
        }
    }
}
