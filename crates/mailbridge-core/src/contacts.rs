//! Mail address to contact key mapping.

use std::collections::HashMap;

/// Returns the address part of a recipient, e.g. `a@x` for `Alice <a@x>`.
///
/// Input without a complete `<...>` pair is returned trimmed.
#[must_use]
pub fn extract_address(raw: &str) -> &str {
    if let Some(start) = raw.find('<')
        && let Some(len) = raw[start + 1..].find('>')
    {
        return raw[start + 1..start + 1 + len].trim();
    }
    raw.trim()
}

/// Normalizes a recipient for lookup: address part, trimmed, ASCII-lowercased.
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    extract_address(raw).to_ascii_lowercase()
}

/// Read-only map from normalized mail address to contact key (a mobile
/// number).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMapping {
    entries: HashMap<String, String>,
}

impl ContactMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. The address is normalized first.
    pub fn insert(&mut self, address: &str, contact_key: impl Into<String>) {
        self.entries
            .insert(normalize_address(address), contact_key.into());
    }

    /// Looks up the contact key for a raw recipient.
    #[must_use]
    pub fn contact_key(&self, address: &str) -> Option<&str> {
        self.entries
            .get(&normalize_address(address))
            .map(String::as_str)
    }

    /// Number of mapped addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: AsRef<str>, K: Into<String>> FromIterator<(A, K)> for ContactMapping {
    fn from_iter<I: IntoIterator<Item = (A, K)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (address, key) in iter {
            mapping.insert(address.as_ref(), key);
        }
        mapping
    }
}
