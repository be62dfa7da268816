//! Raw SQL statements keyed by (group, name).

mod loader;
mod source;

use std::collections::HashMap;
use std::fmt;

use crate::error::SqlDbError;
use crate::types::Dialect;

pub use loader::TemplateLoader;
pub use source::{DirBundle, StaticBundle, TemplateBundle, TemplateFile, TemplateSource};

/// Identifies one raw statement. The string form is `group/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementKey {
    pub group: String,
    pub name: String,
}

impl StatementKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StatementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// Raw SQL text resolved for one dialect.
///
/// Built once by [`TemplateLoader`] and read-only afterwards; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Registry {
    dialect: Dialect,
    stmts: HashMap<StatementKey, String>,
}

impl Registry {
    pub(crate) fn new(dialect: Dialect, stmts: HashMap<StatementKey, String>) -> Self {
        Self { dialect, stmts }
    }

    /// The dialect the statements were resolved for.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn get(&self, key: &StatementKey) -> Option<&str> {
        self.stmts.get(key).map(String::as_str)
    }

    /// Look up a statement that must exist.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` naming the key when it was never loaded; a missing
    /// statement means the template bundle and the code disagree.
    pub fn require(&self, key: &StatementKey) -> Result<&str, SqlDbError> {
        self.get(key).ok_or_else(|| {
            SqlDbError::ConfigError(format!("raw SQL statement `{key}` not found in the registry"))
        })
    }

    /// All statements of one group, keyed by statement name.
    #[must_use]
    pub fn group(&self, group: &str) -> HashMap<&str, &str> {
        self.stmts
            .iter()
            .filter(|(key, _)| key.group == group)
            .map(|(key, sql)| (key.name.as_str(), sql.as_str()))
            .collect()
    }

    /// Keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<&StatementKey> {
        let mut keys: Vec<_> = self.stmts.keys().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut stmts = HashMap::new();
        stmts.insert(StatementKey::new("users", "findall"), "SELECT 1".to_string());
        stmts.insert(StatementKey::new("posts", "findall"), "SELECT 2".to_string());
        Registry::new(Dialect::Sqlite, stmts)
    }

    #[test]
    fn key_string_form() {
        assert_eq!(StatementKey::new("users", "findall").to_string(), "users/findall");
    }

    #[test]
    fn lookups_are_per_group() {
        let reg = registry();
        assert_eq!(reg.get(&StatementKey::new("users", "findall")), Some("SELECT 1"));
        assert_eq!(reg.group("posts").get("findall"), Some(&"SELECT 2"));
        assert!(reg.get(&StatementKey::new("users", "missing")).is_none());
    }

    #[test]
    fn require_reports_the_key() {
        let err = registry()
            .require(&StatementKey::new("users", "missing"))
            .unwrap_err();
        assert!(err.to_string().contains("users/missing"));
    }
}
