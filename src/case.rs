//! Name derivation for entities: model name, verbose name, URL/file slugs.

/// Lowercased type name, e.g. "KernelUnit" -> "kernelunit".
pub fn model_name(name: &str) -> String {
    name.to_lowercase()
}

/// Split a PascalCase name on case boundaries and lowercase it.
/// e.g. "KernelUnit" -> "kernel unit", "HTTPLog" -> "http log"
pub fn verbose_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Lowercase, keep alphanumerics, collapse everything else into single dashes.
/// e.g. "Kernel Unit (2024)" -> "kernel-unit-2024"
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_is_plain_lowercase() {
        assert_eq!(model_name("KernelUnit"), "kernelunit");
        assert_eq!(model_name("Unit"), "unit");
    }

    #[test]
    fn verbose_name_splits_words() {
        assert_eq!(verbose_name("KernelUnit"), "kernel unit");
        assert_eq!(verbose_name("HTTPLog"), "http log");
        assert_eq!(verbose_name("Page2Block"), "page2 block");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Kernel Unit (2024)"), "kernel-unit-2024");
        assert_eq!(slugify("  --units--  "), "units");
        assert_eq!(slugify("Единицы измерения"), "единицы-измерения");
    }
}
