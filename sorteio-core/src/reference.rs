//! Image reference classification.
//!
//! A reference is whatever an API record stored for an image: a full URL,
//! a root-relative path, a bare filename, a legacy `uploads/` path, or
//! garbage. Classification decides how the resolver treats it without
//! touching the network or the cache.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::DEFAULT_LEGACY_PREFIX;

/// Name, dot, extension of two or more alphanumerics.
static FILENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.-]+\.[A-Za-z0-9]{2,}$").expect("Invalid filename regex"));

static DIRECT_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?:|data:|blob:|/)").expect("Invalid direct URL regex")
});

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Returns true when the value already is a displayable URL.
pub fn is_direct_url(value: &str) -> bool {
    DIRECT_URL_PATTERN.is_match(value)
}

/// Returns true when the value looks like a real filename (name + extension).
pub fn is_valid_filename(value: &str) -> bool {
    FILENAME_PATTERN.is_match(value)
}

/// Outcome of classifying a raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing to resolve.
    Absent,
    /// Already a URL; use verbatim.
    Direct(String),
    /// Sanitizes down to a plausible filename.
    Candidate {
        /// The trimmed original reference, used as the cache key.
        reference: String,
        /// Last path segment after sanitization.
        filename: String,
    },
    /// Not a URL and no filename can be derived from it.
    Unresolvable { reference: String },
}

/// Classifies and sanitizes references against a legacy path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceClassifier {
    legacy_prefix: String,
}

impl Default for ReferenceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_LEGACY_PREFIX)
    }
}

impl ReferenceClassifier {
    pub fn new(legacy_prefix: impl Into<String>) -> Self {
        let legacy_prefix: String = legacy_prefix.into();
        Self {
            legacy_prefix: legacy_prefix.trim().trim_matches(is_separator).to_string(),
        }
    }

    pub fn legacy_prefix(&self) -> &str {
        &self.legacy_prefix
    }

    /// Strip leading separators and the legacy prefix (case-insensitive).
    ///
    /// The prefix only matches whole path segments: `uploads/a.png` loses
    /// it, `uploadsbanner.png` does not.
    pub fn strip_legacy_prefix<'a>(&self, value: &'a str) -> &'a str {
        let trimmed = value.trim().trim_start_matches(is_separator);
        let prefix_len = self.legacy_prefix.len();
        if prefix_len == 0 {
            return trimmed;
        }
        let stripped = match (trimmed.get(..prefix_len), trimmed.get(prefix_len..)) {
            (Some(head), Some(rest))
                if head.eq_ignore_ascii_case(&self.legacy_prefix)
                    && (rest.is_empty() || rest.starts_with(is_separator)) =>
            {
                rest
            }
            _ => trimmed,
        };
        stripped.trim_start_matches(is_separator)
    }

    /// Derive the filename segment a reference points at, if any.
    ///
    /// Strips the legacy prefix, drops any query or fragment, and keeps the
    /// last `/`- or `\`-delimited segment when it matches the filename
    /// pattern.
    pub fn candidate_segment(&self, raw: &str) -> Option<String> {
        let sanitized = self.strip_legacy_prefix(raw);
        let without_query = match sanitized.find(|c: char| c == '?' || c == '#') {
            Some(idx) => &sanitized[..idx],
            None => sanitized,
        };
        let segment = without_query.rsplit(is_separator).next().unwrap_or("").trim();
        if is_valid_filename(segment) {
            Some(segment.to_string())
        } else {
            None
        }
    }

    /// Decide how a raw reference should be handled.
    pub fn classify(&self, raw: &str) -> Classification {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Classification::Absent;
        }
        if is_direct_url(trimmed) {
            return Classification::Direct(trimmed.to_string());
        }
        match self.candidate_segment(trimmed) {
            Some(filename) => Classification::Candidate {
                reference: trimmed.to_string(),
                filename,
            },
            None => Classification::Unresolvable {
                reference: trimmed.to_string(),
            },
        }
    }
}
