//! Response normalization.

/// Trim model output into the public answer. Absent output is an empty answer.
pub fn normalize(raw: Option<&str>) -> String {
    raw.map(str::trim).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize(Some("  \n Hello there.\t\n")), "Hello there.");
    }

    #[test]
    fn absent_output_is_empty() {
        assert_eq!(normalize(None), "");
        assert_eq!(normalize(Some("   ")), "");
    }

    #[test]
    fn inner_whitespace_is_untouched() {
        assert_eq!(normalize(Some(" a\n\nb ")), "a\n\nb");
    }
}
