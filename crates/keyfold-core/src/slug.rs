//! URL-safe workspace slugs.

use crate::errors::{Error, Result};
use rand::distr::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 4;
const FALLBACK_STEM: &str = "workspace";

/// Normalize a display name into a lowercase hyphenated stem.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Default slug for an unnamed request: normalized name plus a random
/// four-character token to keep it unique within the organization.
pub fn randomized(name: &str) -> String {
    let stem = slugify(name);
    let stem = if stem.is_empty() {
        FALLBACK_STEM
    } else {
        stem.as_str()
    };
    format!("{stem}-{}", random_suffix())
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Validate a caller-supplied slug.
pub fn validate(slug: &str) -> Result<()> {
    if slug.trim().is_empty() {
        return Err(Error::InvalidInput {
            field: "slug",
            reason: "must not be empty".into(),
        });
    }

    if !slug
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
    {
        return Err(Error::InvalidInput {
            field: "slug",
            reason: format!("unsupported characters in {slug:?}"),
        });
    }

    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(Error::InvalidInput {
            field: "slug",
            reason: "must not start or end with a hyphen".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("Acme Payments (EU)"), "acme-payments-eu");
        assert_eq!(slugify("  --weird__name--  "), "weird-name");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn randomized_appends_four_char_token() {
        let slug = randomized("Acme");
        let (stem, suffix) = slug.split_once('-').expect("hyphenated");
        assert_eq!(stem, "acme");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn randomized_handles_empty_stem() {
        let slug = randomized("!!!");
        assert!(slug.starts_with("workspace-"));
    }

    #[test]
    fn validate_rejects_bad_slugs() {
        assert!(validate("acme-prod").is_ok());
        assert!(validate("").is_err());
        assert!(validate("Acme").is_err());
        assert!(validate("-leading").is_err());
        assert!(validate("trailing-").is_err());
        assert!(validate("under_score").is_err());
    }
}
