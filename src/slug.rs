//! Slug derivation for public listing URLs
//!
//! A building's public page lives at `/p/{slug}`; the slug is derived from
//! its display name and ends up inside the QR code printed for the lobby.

/// Lowercase the name, collapse every non-alphanumeric run into a single
/// dash, and trim dashes from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
