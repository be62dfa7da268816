use std::fs;
use std::path::PathBuf;

use sql_dialects::prelude::*;

fn fixtures(group: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("sql")
        .join(group)
}

fn load(dialect: Dialect) -> Registry {
    TemplateLoader::new(dialect)
        .load(vec![
            TemplateSource::dir("users", fixtures("users")),
            TemplateSource::dir("audit", fixtures("audit")),
        ])
        .expect("fixtures load")
}

fn sql<'a>(reg: &'a Registry, group: &str, name: &str) -> &'a str {
    reg.get(&StatementKey::new(group, name))
        .unwrap_or_else(|| panic!("{group}/{name} missing"))
        .trim_end()
}

#[test]
fn findall_is_numbered_for_postgres() {
    let reg = load(Dialect::Pgsql);
    assert_eq!(sql(&reg, "users", "findall"), "SELECT * FROM t WHERE id = $1");
}

#[test]
fn multiple_markers_are_numbered_left_to_right() {
    let reg = load(Dialect::Pgsql);
    assert_eq!(
        sql(&reg, "users", "between"),
        "SELECT id, name, email, active FROM users WHERE id >= $1 AND id <= $2 ORDER BY id"
    );
    assert_eq!(
        sql(&reg, "users", "create"),
        "INSERT INTO users (name, email, active) VALUES ($1, $2, $3)"
    );
}

#[test]
fn dialect_override_wins_and_is_kept_verbatim() {
    let pg = load(Dialect::Pgsql);
    assert_eq!(
        sql(&pg, "users", "byname"),
        "SELECT id, name, email, active FROM users WHERE name = $1::text ORDER BY id"
    );

    let lite = load(Dialect::Sqlite);
    assert_eq!(
        sql(&lite, "audit", "recent"),
        "SELECT actor, action FROM audit ORDER BY rowid DESC LIMIT ?1"
    );
    // The pgsql override of another group never leaks into the sqlite registry.
    assert_eq!(
        sql(&lite, "users", "byname"),
        "SELECT id, name, email, active FROM users WHERE name = ? ORDER BY id"
    );
}

#[test]
fn generic_templates_are_verbatim_for_passthrough_dialects() {
    for dialect in [Dialect::Sqlite, Dialect::Mysql] {
        let reg = load(dialect);
        assert_eq!(sql(&reg, "users", "findall"), "SELECT * FROM t WHERE id = ?");
        assert_eq!(reg.dialect(), dialect);
    }
}

#[test]
fn non_template_files_are_ignored() {
    let reg = load(Dialect::Pgsql);
    assert!(reg.get(&StatementKey::new("users", "README")).is_none());
    assert_eq!(reg.group("users").len(), 4);
    assert_eq!(reg.group("audit").len(), 2);
    assert_eq!(reg.len(), 6);
}

#[test]
fn keys_are_sorted_by_group_then_name() {
    let reg = load(Dialect::Sqlite);
    let keys: Vec<String> = reg.keys().iter().map(ToString::to_string).collect();
    assert_eq!(
        keys,
        [
            "audit/log",
            "audit/recent",
            "users/between",
            "users/byname",
            "users/create",
            "users/findall",
        ]
    );
}

#[test]
fn unreadable_source_aborts_the_load() {
    let err = TemplateLoader::new(Dialect::Pgsql)
        .load(vec![
            TemplateSource::dir("users", fixtures("users")),
            TemplateSource::dir("ghost", fixtures("does-not-exist")),
        ])
        .unwrap_err();
    assert!(matches!(err, SqlDbError::TemplateError { .. }));
}

#[test]
fn generic_after_override_in_listing_order_still_loses() {
    let dir = tempfile::tempdir().unwrap();
    // Created override-first so a naive listing-order loader would let the generic file win.
    fs::write(dir.path().join("get.mssql"), "SELECT TOP 1 * FROM t WHERE id = @id").unwrap();
    fs::write(dir.path().join("get.sql"), "SELECT * FROM t WHERE id = ?").unwrap();
    fs::write(dir.path().join("other.sql"), "SELECT ? + ?").unwrap();

    let reg = TemplateLoader::new(Dialect::Mssql)
        .load(vec![TemplateSource::dir("t", dir.path())])
        .unwrap();
    assert_eq!(sql(&reg, "t", "get"), "SELECT TOP 1 * FROM t WHERE id = @id");
    assert_eq!(sql(&reg, "t", "other"), "SELECT @1 + @2");
}

#[test]
fn registry_require_names_the_missing_key() {
    let reg = load(Dialect::Pgsql);
    let err = reg.require(&StatementKey::new("users", "nope")).unwrap_err();
    assert!(matches!(err, SqlDbError::ConfigError(ref m) if m.contains("users/nope")));
}
