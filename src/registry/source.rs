use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SqlDbError;

/// One template file: its file name (`<statement>.<ext>`) and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub file_name: String,
    pub contents: String,
}

/// A bundle of template files.
pub trait TemplateBundle: Send + Sync {
    /// Where the files come from, for log and error messages.
    fn location(&self) -> String;

    /// Read every file of the bundle. Subdirectories are not descended into.
    ///
    /// # Errors
    /// Returns `SqlDbError::TemplateError` when the bundle or one of its files is unreadable.
    fn files(&self) -> Result<Vec<TemplateFile>, SqlDbError>;
}

/// Templates read from a directory at load time.
#[derive(Debug, Clone)]
pub struct DirBundle {
    dir: PathBuf,
}

impl DirBundle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn template_error(path: &Path, source: std::io::Error) -> SqlDbError {
    SqlDbError::TemplateError {
        path: path.display().to_string(),
        source,
    }
}

impl TemplateBundle for DirBundle {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn files(&self) -> Result<Vec<TemplateFile>, SqlDbError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| template_error(&self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| template_error(&self.dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| template_error(&path, e))?;
            if file_type.is_dir() {
                continue;
            }
            let contents = fs::read_to_string(&path).map_err(|e| template_error(&path, e))?;
            files.push(TemplateFile {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                contents,
            });
        }
        Ok(files)
    }
}

/// Templates compiled into the binary, typically with `include_str!`.
///
/// ```rust
/// use sql_dialects::registry::StaticBundle;
///
/// static USERS: &[(&str, &str)] = &[
///     ("findall.sql", "SELECT id, name FROM users"),
///     ("byid.sql", "SELECT id, name FROM users WHERE id = ?"),
/// ];
/// let bundle = StaticBundle::new("users", USERS);
/// # let _ = bundle;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StaticBundle {
    label: &'static str,
    files: &'static [(&'static str, &'static str)],
}

impl StaticBundle {
    #[must_use]
    pub const fn new(label: &'static str, files: &'static [(&'static str, &'static str)]) -> Self {
        Self { label, files }
    }
}

impl TemplateBundle for StaticBundle {
    fn location(&self) -> String {
        format!("static:{}", self.label)
    }

    fn files(&self) -> Result<Vec<TemplateFile>, SqlDbError> {
        Ok(self
            .files
            .iter()
            .map(|(file_name, contents)| TemplateFile {
                file_name: (*file_name).to_string(),
                contents: (*contents).to_string(),
            })
            .collect())
    }
}

/// A group of statement templates registered for loading.
pub struct TemplateSource {
    pub group: String,
    pub bundle: Box<dyn TemplateBundle>,
}

impl TemplateSource {
    pub fn new(group: impl Into<String>, bundle: impl TemplateBundle + 'static) -> Self {
        Self {
            group: group.into(),
            bundle: Box::new(bundle),
        }
    }

    /// Shorthand for a directory bundle.
    pub fn dir(group: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self::new(group, DirBundle::new(dir))
    }
}

impl std::fmt::Debug for TemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSource")
            .field("group", &self.group)
            .field("bundle", &self.bundle.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_bundle_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("findall.sql"), "SELECT 1").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("inner.sql"), "SELECT 2").unwrap();

        let files = DirBundle::new(dir.path()).files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "findall.sql");
        assert_eq!(files[0].contents, "SELECT 1");
    }

    #[test]
    fn missing_dir_is_a_template_error() {
        let err = DirBundle::new("/definitely/not/here").files().unwrap_err();
        assert!(matches!(err, SqlDbError::TemplateError { .. }));
    }
}
