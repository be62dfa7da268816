use std::borrow::Cow;

/// The dialect-neutral positional placeholder used in template SQL.
pub const GENERIC_MARKER: char = '?';

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Plain `?` markers, same as the templates (MySQL).
    Generic,
    /// Marker followed by a 1-based ordinal, e.g. `$1` for PostgreSQL or `@1`.
    Numbered(char),
    /// The dialect binds every marker style (`SQLite`).
    Any,
}

impl PlaceholderStyle {
    /// True when translation would leave the text untouched.
    #[must_use]
    pub fn is_passthrough(self) -> bool {
        match self {
            PlaceholderStyle::Generic | PlaceholderStyle::Any => true,
            PlaceholderStyle::Numbered(marker) => marker == GENERIC_MARKER,
        }
    }
}

/// Rewrite every `?` into `<marker><ordinal>`, numbering from 1 left to right.
///
/// Scanning is purely literal: a `?` inside a string literal or comment is rewritten too, so
/// templates must not carry `?` anywhere but in placeholder positions.
///
/// ```rust
/// use sql_dialects::prelude::*;
///
/// let sql = convert_placeholders("SELECT * FROM t WHERE a = ? AND b = ?", PlaceholderStyle::Numbered('$'));
/// assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
/// ```
/// Returns a borrowed `Cow` when the style needs no rewriting or no marker is present.
#[must_use]
pub fn convert_placeholders(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    let marker = match style {
        PlaceholderStyle::Numbered(marker) if marker != GENERIC_MARKER => marker,
        _ => return Cow::Borrowed(sql),
    };
    if !sql.contains(GENERIC_MARKER) {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut ordinal = 1usize;
    for c in sql.chars() {
        if c == GENERIC_MARKER {
            out.push(marker);
            out.push_str(&ordinal.to_string());
            ordinal += 1;
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}
