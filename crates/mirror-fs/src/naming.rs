//! Entity name to file name mapping

/// Device names Windows refuses as file stems regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Convert an entity name into a single filesystem-safe path segment.
///
/// Characters that are invalid in file names on any supported platform are
/// replaced with `_`, trailing dots and spaces are trimmed, and reserved
/// device names are prefixed. The result is never empty and never contains a
/// path separator, so it is always exactly one segment.
///
/// `My Colour/Picker?` -> `My Colour_Picker_`
pub fn to_safe_file_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());

    for c in name.chars() {
        if is_invalid_char(c) {
            result.push('_');
        } else {
            result.push(c);
        }
    }

    let trimmed = result.trim_end_matches(['.', ' ']).trim_start();
    let mut safe = trimmed.to_string();

    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        return "_".to_string();
    }

    let stem = safe.split('.').next().unwrap_or_default();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        safe.insert(0, '_');
    }

    safe
}

fn is_invalid_char(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Approved Colour", "Approved Colour")]
    #[case("My Colour/Picker?", "My Colour_Picker_")]
    #[case("a:b*c", "a_b_c")]
    #[case("trailing. ", "trailing")]
    #[case("", "_")]
    #[case("..", "_")]
    #[case("con", "_con")]
    #[case("Lpt1.txt", "_Lpt1.txt")]
    #[case("Console", "Console")]
    fn safe_file_name_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_safe_file_name(input), expected);
    }
}
