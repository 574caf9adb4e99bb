/// Truncates `content` to a length that fits on one log line.
pub(crate) fn shorten_content(content: &str) -> String {
    let max_length = 72;
    if content.chars().count() <= max_length {
        content.to_owned()
    } else {
        content.chars().take(max_length).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(shorten_content("Fix typo"), "Fix typo");
    }

    #[test]
    fn long_content_is_cut_on_chars() {
        let title = "é".repeat(80);
        let short = shorten_content(&title);
        assert_eq!(short.chars().count(), 73);
        assert!(short.ends_with('…'));
    }
}
