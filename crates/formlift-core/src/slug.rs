//! Deterministic slugs for field keys and option values.
//!
//! Slugs are derived purely from the input text, so re-deriving a slug from
//! the same name always yields the same result. When normalization strips a
//! name down to nothing (punctuation-only OCR noise), a short FNV-1a hash of
//! the original text keeps distinct inputs from collapsing onto one key.

/// Slugify an option name or field title into a stable identifier.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// underscore, and trims leading/trailing underscores.
///
/// # Examples
///
/// ```
/// use formlift_core::slug::slugify;
///
/// assert_eq!(slugify("Date of Birth"), "date_of_birth");
/// assert_eq!(slugify("  Hay Fever "), "hay_fever");
/// assert_eq!(slugify("SSN #:"), "ssn");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_underscore = false;
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        // Nothing survived normalization. Hash the raw text so distinct
        // noise inputs still get distinct, stable slugs.
        return format!("opt_{:08x}", fnv1a(name));
    }
    out
}

/// Build a field key from a section and title, e.g. `medical.date_of_birth`.
///
/// Fields in the default (empty) section get a bare title slug.
#[must_use]
pub fn field_key(section: &str, title: &str) -> String {
    let title_slug = slugify(title);
    let section_slug = slugify(section);
    if section_slug.is_empty() || section_slug.starts_with("opt_") {
        title_slug
    } else {
        format!("{section_slug}.{title_slug}")
    }
}

/// 32-bit FNV-1a over the UTF-8 bytes of `text`.
fn fnv1a(text: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in text.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
