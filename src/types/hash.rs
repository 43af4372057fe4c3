//! Content fingerprints
//!
//! Every fingerprint in the system is lowercase hex SHA-256 over a
//! length-prefixed field encoding, so `("ab", "c")` and `("a", "bc")` never
//! collide.

use sha2::{Digest, Sha256};

/// Incremental fingerprint builder
#[derive(Clone, Default)]
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fingerprint in a named domain (e.g. "entity", "page")
    pub fn domain(name: &str) -> Self {
        let mut fp = Self::new();
        fp.push(name);
        fp
    }

    /// Append one field
    pub fn push(&mut self, field: &str) -> &mut Self {
        self.hasher.update((field.len() as u64).to_le_bytes());
        self.hasher.update(field.as_bytes());
        self
    }

    /// Append a field and return self (builder style)
    pub fn field(mut self, field: &str) -> Self {
        self.push(field);
        self
    }

    /// Append every field of an iterator, prefixed with its count
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<S> = fields.into_iter().collect();
        self.push(&items.len().to_string());
        for item in &items {
            self.push(item.as_ref());
        }
        self
    }

    pub fn finish(self) -> String {
        hex(&self.hasher.finalize())
    }
}

/// Fingerprint of a single string
pub fn sha256_hex(content: &str) -> String {
    hex(&Sha256::digest(content.as_bytes()))
}

/// Normalize rendered text before hashing so platform-side line ending and
/// trailing whitespace changes do not read as manual edits.
pub fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for line in body.replace("\r\n", "\n").lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    if out == "\n" {
        out.clear();
    }
    out
}

/// Content hash of a page as published: title plus normalized body
pub fn page_content_hash(title: &str, body: &str) -> String {
    Fingerprinter::domain("page")
        .field(title.trim())
        .field(&normalize_body(body))
        .finish()
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_boundaries_do_not_alias() {
        let a = Fingerprinter::new().field("ab").field("c").finish();
        let b = Fingerprinter::new().field("a").field("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = sha256_hex("hello");
        assert_eq!(fp.len(), 64);
        assert_eq!(
            fp,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_normalize_body() {
        assert_eq!(normalize_body("a  \r\nb\n\n\n"), "a\nb\n");
        assert_eq!(normalize_body(""), "");
        assert_eq!(normalize_body("\n\n"), "");
    }

    #[test]
    fn test_page_hash_ignores_trailing_whitespace() {
        let a = page_content_hash("Orders", "# Orders\nBody\n");
        let b = page_content_hash("Orders ", "# Orders  \r\nBody\n\n");
        assert_eq!(a, b);
        assert_ne!(a, page_content_hash("Orders", "# Orders\nOther\n"));
    }
}
