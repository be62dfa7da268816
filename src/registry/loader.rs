use std::collections::HashMap;
use std::path::Path;

use crate::error::SqlDbError;
use crate::translation::convert_placeholders;
use crate::types::Dialect;

use super::source::TemplateSource;
use super::{Registry, StatementKey};

/// Extension of dialect-neutral templates written with `?` placeholders.
pub const GENERIC_EXTENSION: &str = "sql";

/// Resolves template sources into a [`Registry`] for one dialect.
///
/// For every statement name, a file tagged with the active dialect (`byid.pgsql`) is stored
/// verbatim and always wins over the generic file (`byid.sql`), whatever order the files are
/// listed in. A generic file only fills a key nothing else claimed, translated to the
/// dialect's placeholder style. Files with any other extension are ignored.
#[derive(Debug, Clone, Copy)]
pub struct TemplateLoader {
    dialect: Dialect,
}

enum Kind {
    Dialect,
    Generic,
}

impl TemplateLoader {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn classify(&self, file_name: &str) -> Option<(String, Kind)> {
        let path = Path::new(file_name);
        let ext = path.extension()?.to_str()?;
        let name = path.file_stem()?.to_str()?.to_string();
        if ext == self.dialect.tag() {
            Some((name, Kind::Dialect))
        } else if ext == GENERIC_EXTENSION {
            Some((name, Kind::Generic))
        } else {
            None
        }
    }

    /// Read every source and build the registry.
    ///
    /// # Errors
    /// Returns `SqlDbError::TemplateError` when a source or file cannot be read; nothing is
    /// returned in that case.
    pub fn load(&self, sources: Vec<TemplateSource>) -> Result<Registry, SqlDbError> {
        let style = self.dialect.placeholder_style();
        let mut stmts: HashMap<StatementKey, String> = HashMap::new();
        let mut generic: Vec<(StatementKey, String)> = Vec::new();
        let group_count = sources.len();

        for source in &sources {
            let files = source.bundle.files()?;
            tracing::debug!(
                group = %source.group,
                location = %source.bundle.location(),
                files = files.len(),
                "reading sql templates"
            );
            for file in files {
                let Some((name, kind)) = self.classify(&file.file_name) else {
                    continue;
                };
                let key = StatementKey::new(source.group.clone(), name);
                match kind {
                    Kind::Dialect => {
                        stmts.insert(key, file.contents);
                    }
                    Kind::Generic => generic.push((key, file.contents)),
                }
            }
        }

        let overrides = stmts.len();
        for (key, contents) in generic {
            if stmts.contains_key(&key) {
                continue;
            }
            let sql = if style.is_passthrough() {
                contents
            } else {
                convert_placeholders(&contents, style).into_owned()
            };
            stmts.insert(key, sql);
        }

        tracing::info!(
            dialect = %self.dialect,
            stmts = stmts.len(),
            overrides,
            groups = group_count,
            "sql raw stmts loaded"
        );
        Ok(Registry::new(self.dialect, stmts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticBundle;

    static USERS: &[(&str, &str)] = &[
        ("byid.sql", "SELECT * FROM users WHERE id = ?"),
        ("byid.pgsql", "SELECT * FROM users WHERE id = $1::int8"),
        ("count.sql", "SELECT count(*) FROM users WHERE a = ? AND b = ?"),
        ("notes.txt", "ignored"),
        ("README", "ignored"),
    ];

    static USERS_OVERRIDE_LAST: &[(&str, &str)] = &[
        ("byid.pgsql", "PG OVERRIDE ?"),
        ("byid.sql", "GENERIC ?"),
    ];

    fn load(dialect: Dialect, files: &'static [(&'static str, &'static str)]) -> Registry {
        TemplateLoader::new(dialect)
            .load(vec![TemplateSource::new("users", StaticBundle::new("users", files))])
            .unwrap()
    }

    #[test]
    fn dialect_file_wins_verbatim() {
        let reg = load(Dialect::Pgsql, USERS);
        assert_eq!(
            reg.get(&StatementKey::new("users", "byid")),
            Some("SELECT * FROM users WHERE id = $1::int8")
        );
    }

    #[test]
    fn override_is_never_translated_regardless_of_order() {
        let reg = load(Dialect::Pgsql, USERS_OVERRIDE_LAST);
        assert_eq!(reg.get(&StatementKey::new("users", "byid")), Some("PG OVERRIDE ?"));
    }

    #[test]
    fn generic_only_is_translated_for_numbered_dialects() {
        let reg = load(Dialect::Pgsql, USERS);
        assert_eq!(
            reg.get(&StatementKey::new("users", "count")),
            Some("SELECT count(*) FROM users WHERE a = $1 AND b = $2")
        );
    }

    #[test]
    fn generic_only_is_verbatim_for_passthrough_dialects() {
        for dialect in [Dialect::Sqlite, Dialect::Mysql] {
            let reg = load(dialect, USERS);
            assert_eq!(
                reg.get(&StatementKey::new("users", "byid")),
                Some("SELECT * FROM users WHERE id = ?")
            );
        }
    }

    #[test]
    fn other_extensions_are_ignored() {
        let reg = load(Dialect::Sqlite, USERS);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(&StatementKey::new("users", "notes")).is_none());
    }
}
