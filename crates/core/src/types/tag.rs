//! Store tags and the tag-frequency rollup row.

use serde::{Deserialize, Serialize};

/// One row of the tag rollup: how many stores carry `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct TagCount {
    /// Tag text.
    pub tag: String,
    /// Number of stores with this tag.
    pub count: i64,
}

/// Clean up submitted tags: trim, drop blanks, drop duplicates keeping the
/// first occurrence.
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}
