//! PostgreSQL identifier sanitization
//!
//! Every name that ends up in generated SQL (schema, table, column) is passed
//! through [`sanitize`] first. The result is a [`SafeIdentifier`]: lower-case
//! ASCII letters, digits and underscores, never starting with a digit, never
//! empty and at most [`MAX_IDENTIFIER_LEN`] bytes long.
//!
//! The pipeline:
//!
//! 1. trim surrounding whitespace and lower-case
//! 2. collapse runs of whitespace, `-`, `.`, `(` and `)` into one `_`
//! 3. drop everything that is not `[a-z0-9_]`
//! 4. collapse repeated underscores
//! 5. trim leading/trailing underscores
//! 6. fall back to [`PLACEHOLDER`] when nothing is left
//! 7. prefix a leading digit with `_`
//! 8. truncate to 63 bytes and drop a trailing `_` exposed by the cut

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Substituted when a raw name has no usable characters.
pub const PLACEHOLDER: &str = "unnamed_identifier";

#[allow(clippy::expect_used)]
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-.()]+").expect("valid separator pattern"));

#[allow(clippy::expect_used)]
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("valid character pattern"));

#[allow(clippy::expect_used)]
static REPEATED_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid underscore pattern"));

/// A sanitized identifier, safe to embed in SQL once quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SafeIdentifier(String);

impl SafeIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use in SQL text.
    ///
    /// Sanitized names never contain `"`, but quotes are still escaped so the
    /// output stays valid if that ever changes.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }

    /// `name_<n>`, shortening the base so the result still fits in 63 bytes.
    pub fn with_suffix(&self, n: usize) -> SafeIdentifier {
        let suffix = format!("_{n}");
        let keep = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len());
        let base = if self.0.len() > keep {
            self.0[..keep].trim_end_matches('_')
        } else {
            self.0.as_str()
        };
        SafeIdentifier(format!("{base}{suffix}"))
    }

    /// Whether this is the fallback produced for an unusable name.
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER
    }
}

impl fmt::Display for SafeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Steps 1-5: everything except the fallback and final shaping.
fn normalize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let separated = SEPARATORS.replace_all(&lowered, "_");
    let filtered = DISALLOWED.replace_all(&separated, "");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&filtered, "_");
    collapsed.trim_matches('_').to_string()
}

/// Steps 7-8 on a non-empty normalized name.
fn shape(mut name: String) -> SafeIdentifier {
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    // The name is pure ASCII here, so byte truncation is char-safe.
    name.truncate(MAX_IDENTIFIER_LEN);
    let trimmed = name.trim_end_matches('_').len();
    name.truncate(trimmed);
    SafeIdentifier(name)
}

/// Sanitize `raw`, returning `None` when nothing usable remains.
///
/// Use this where a placeholder name would be wrong, e.g. a schema name the
/// user typed or a table name that needs a run-specific fallback.
pub fn try_sanitize(raw: &str) -> Option<SafeIdentifier> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        None
    } else {
        Some(shape(normalized))
    }
}

/// Sanitize `raw` into a [`SafeIdentifier`], falling back to [`PLACEHOLDER`].
pub fn sanitize(raw: &str) -> SafeIdentifier {
    try_sanitize(raw).unwrap_or_else(|| SafeIdentifier(PLACEHOLDER.to_string()))
}

/// Hands out identifiers that are unique within one scope.
///
/// A taken name gets the first free `_1`, `_2`, ... suffix. Suffixed names
/// are recorded too, so a later raw `name_1` cannot collide with a generated
/// one.
#[derive(Debug, Default, Clone)]
pub struct UniqueNames {
    seen: HashSet<SafeIdentifier>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base` or its first unused suffixed variant.
    pub fn claim(&mut self, base: SafeIdentifier) -> SafeIdentifier {
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.seen.contains(&candidate) {
            candidate = base.with_suffix(counter);
            counter += 1;
        }
        self.seen.insert(candidate.clone());
        candidate
    }
}

/// One column of a source file: the header as written and its SQL name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: Option<String>,
    pub name: SafeIdentifier,
}

/// Ordered, de-duplicated column names for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    /// Build the column set for a header row.
    ///
    /// Absent or blank headers become `col_<index>` (zero-based).
    pub fn from_headers<S: AsRef<str>>(headers: &[Option<S>]) -> Self {
        let mut names = UniqueNames::new();
        let columns = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let header = header
                    .as_ref()
                    .map(|h| h.as_ref())
                    .filter(|h| !h.trim().is_empty());
                let base = match header {
                    Some(h) => sanitize(h),
                    None => sanitize(&format!("col_{index}")),
                };
                Column {
                    header: header.map(str::to_string),
                    name: names.claim(base),
                }
            })
            .collect();
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// `"a", "b", "c"` for column lists in DDL and COPY.
    pub fn quoted_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.quoted())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
