//! URL slugs for stores.
//!
//! A slug is derived from the store name (`"Tim's Café & Bar"` becomes
//! `"tim-s-cafe-and-bar"`) and then disambiguated against the slugs that
//! already exist with the same base, so two stores called "Coffee" end up
//! at `/store/coffee` and `/store/coffee-2`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The name contains no letters or digits.
    #[error("name must contain at least one letter or digit")]
    Empty,
    /// A stored or requested slug contains characters outside `[a-z0-9-]`.
    #[error("invalid slug: {0}")]
    Invalid(String),
}

/// A lowercase, hyphen-separated identifier made of `[a-z0-9-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive the base slug for a store name.
    ///
    /// Letters are lower-cased and common Latin accents are folded to ASCII;
    /// `&` reads as "and"; every other run of non-alphanumerics becomes one
    /// hyphen. Leading and trailing hyphens are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if nothing alphanumeric is left.
    ///
    /// ```
    /// use delicious_core::Slug;
    ///
    /// assert_eq!(Slug::from_name("  Café Crème ").unwrap().as_str(), "cafe-creme");
    /// assert_eq!(Slug::from_name("Fish & Chips!!").unwrap().as_str(), "fish-and-chips");
    /// assert!(Slug::from_name("!!!").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars() {
            if c == '&' {
                push_word(&mut out, "and", true);
                pending_hyphen = true;
                continue;
            }

            for lc in c.to_lowercase() {
                if lc.is_ascii_alphanumeric() {
                    let mut buf = [0_u8; 4];
                    push_word(&mut out, lc.encode_utf8(&mut buf), pending_hyphen);
                    pending_hyphen = false;
                } else if let Some(folded) = fold_accent(lc) {
                    push_word(&mut out, folded, pending_hyphen);
                    pending_hyphen = false;
                } else {
                    pending_hyphen = true;
                }
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        Ok(Self(out))
    }

    /// Wrap a slug that is already in canonical form (from the database or
    /// a URL path).
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Invalid` if the value is empty or contains
    /// characters outside `[a-z0-9-]`.
    pub fn parse(value: &str) -> Result<Self, SlugError> {
        let valid = !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if valid {
            Ok(Self(value.to_owned()))
        } else {
            Err(SlugError::Invalid(value.to_owned()))
        }
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive regular expression matching this base slug and its
    /// numbered variants: `^base(-[0-9]*)?$`.
    ///
    /// Slugs only contain `[a-z0-9-]`, none of which are regex
    /// metacharacters outside a bracket expression.
    #[must_use]
    pub fn collision_pattern(&self) -> String {
        format!("^{}(-[0-9]*)?$", self.0)
    }

    /// Whether `candidate` is this slug or one of its numbered variants,
    /// using the same rule as [`Slug::collision_pattern`].
    #[must_use]
    pub fn is_variant(&self, candidate: &str) -> bool {
        let candidate = candidate.to_ascii_lowercase();
        match candidate.strip_prefix(self.0.as_str()) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix('-')
                .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit())),
            None => false,
        }
    }

    /// Pick a fresh slug given the existing slugs sharing this base.
    ///
    /// With no matches the base is returned unchanged. Otherwise the result
    /// is `base-{n}` where `n` starts at `matches + 1`; if that exact slug is
    /// already taken (a store literally named "Coffee 2", say) `n` keeps
    /// counting up until it is free.
    ///
    /// ```
    /// use delicious_core::Slug;
    ///
    /// let base = Slug::from_name("Coffee").unwrap();
    /// assert_eq!(base.clone().disambiguate(&[] as &[&str]).as_str(), "coffee");
    /// assert_eq!(base.clone().disambiguate(&["coffee"]).as_str(), "coffee-2");
    /// assert_eq!(base.disambiguate(&["coffee", "coffee-2"]).as_str(), "coffee-3");
    /// ```
    #[must_use]
    pub fn disambiguate<S: AsRef<str>>(self, existing: &[S]) -> Self {
        let taken: Vec<String> = existing
            .iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .filter(|s| self.is_variant(s))
            .collect();

        if taken.is_empty() {
            return self;
        }

        let mut n = taken.len() + 1;
        loop {
            let candidate = format!("{}-{n}", self.0);
            if !taken.iter().any(|t| *t == candidate) {
                return Self(candidate);
            }
            n += 1;
        }
    }
}

/// Append `word`, separated by a hyphen when one is pending and `out` is
/// not empty.
fn push_word(out: &mut String, word: &str, hyphen: bool) {
    if hyphen && !out.is_empty() {
        out.push('-');
    }
    out.push_str(word);
}

/// ASCII replacement for common accented Latin letters.
fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ł' => "l",
        'ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ś' | 'š' => "s",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slug(name: &str) -> Slug {
        Slug::from_name(name).unwrap()
    }

    #[test]
    fn test_from_name_basic() {
        assert_eq!(slug("Coffee Shop").as_str(), "coffee-shop");
        assert_eq!(slug("  lots   of   space  ").as_str(), "lots-of-space");
        assert_eq!(slug("Tim's").as_str(), "tim-s");
        assert_eq!(slug("Dürüm Döner").as_str(), "durum-doner");
        assert_eq!(slug("Rock&Roll").as_str(), "rock-and-roll");
        assert_eq!(slug("& Sons").as_str(), "and-sons");
    }

    #[test]
    fn test_from_name_empty() {
        assert_eq!(Slug::from_name("   "), Err(SlugError::Empty));
        assert_eq!(Slug::from_name("?!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_distinct_names_with_same_base_get_distinct_slugs() {
        let first = slug("Coffee!").disambiguate::<&str>(&[]);
        let second = slug("COFFEE").disambiguate(&[first.as_str()]);

        assert_eq!(first.as_str(), "coffee");
        assert_eq!(second.as_str(), "coffee-2");
        assert_ne!(first, second);
    }

    #[test]
    fn test_disambiguate_counts_existing_variants() {
        let existing = ["coffee", "coffee-2", "coffee-3"];
        assert_eq!(slug("coffee").disambiguate(&existing).as_str(), "coffee-4");
    }

    #[test]
    fn test_disambiguate_ignores_other_bases() {
        let existing = ["coffee-shop", "coffeehouse", "coffee-2b"];
        assert_eq!(slug("coffee").disambiguate(&existing).as_str(), "coffee");
    }

    #[test]
    fn test_disambiguate_skips_taken_number() {
        // Only "coffee-2" exists: count + 1 = 2 is taken, so move on.
        assert_eq!(slug("coffee").disambiguate(&["coffee-2"]).as_str(), "coffee-3");
    }

    #[test]
    fn test_is_variant_matches_pattern_semantics() {
        let base = slug("coffee");
        assert!(base.is_variant("coffee"));
        assert!(base.is_variant("Coffee-12"));
        assert!(base.is_variant("coffee-"));
        assert!(!base.is_variant("coffee-shop"));
        assert!(!base.is_variant("my-coffee"));
    }

    #[test]
    fn test_collision_pattern() {
        assert_eq!(slug("The Grind").collision_pattern(), "^the-grind(-[0-9]*)?$");
    }

    #[test]
    fn test_parse() {
        assert!(Slug::parse("coffee-2").is_ok());
        assert!(Slug::parse("Coffee").is_err());
        assert!(Slug::parse("").is_err());
        assert!(Slug::parse("a/b").is_err());
    }
}
