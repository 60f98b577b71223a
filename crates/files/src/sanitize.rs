//! File name sanitisation
//!
//! Names supplied by uploaders are reduced to a safe character set before they are
//! resolved under a root: ASCII letters and digits plus `.`, `-` and `_`.
//!
//! Accented letters are transliterated by compatibility decomposition (`é` becomes `e`,
//! `ﬁ` becomes `fi`); every remaining character outside the safe set is replaced, one for
//! one, by the replacement character. Repeated replacements are not collapsed and case is
//! only changed on request, so the extension survives untouched.

use crate::constants::SAFE_NAME_REPLACEMENT;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Returns true for characters allowed verbatim in a stored file name
pub(crate) fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Reduces `input` to the safe character set
///
/// `replacement` is expected to be a safe character itself. A result made only of dots
/// (`.` or `..`) would address the directory or its parent, so each dot is replaced too.
pub fn safe_string(input: &str, replacement: char, lower: bool) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if is_safe_char(c) {
            out.push(if lower { c.to_ascii_lowercase() } else { c });
        } else {
            out.push(replacement);
        }
    }

    if !out.is_empty() && out.chars().all(|c| c == '.') {
        return std::iter::repeat(replacement).take(out.len()).collect();
    }

    out
}

/// Sanitises an uploaded file name for storage
///
/// Case is preserved and disallowed characters become `_`.
pub fn sanitize_file_name(raw_name: &str) -> String {
    safe_string(raw_name, SAFE_NAME_REPLACEMENT, false)
}
