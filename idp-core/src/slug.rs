//! Name normalization
//!
//! Free-form workload names become stack and repository names. The same
//! input always yields the same slug, and a slug normalizes to itself.

/// Converts a name to lowercase kebab-case.
///
/// Words are runs of ASCII letters and digits. A new word starts at any other
/// character, at a lower-to-upper case change (`myApp`), and before the last
/// capital of an acronym followed by lowercase (`HTTPServer`).
pub fn normalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() && c.is_ascii_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c.to_ascii_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    words.join("-")
}
