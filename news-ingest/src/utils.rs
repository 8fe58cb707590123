/// Check if a word is a common English stop word
pub fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" | "with" | "by" |
        "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" | "have" | "has" | "had" |
        "do" | "does" | "did" | "will" | "would" | "could" | "should" | "may" | "might" | "must" |
        "can" | "this" | "that" | "these" | "those" | "it" | "its" | "as" | "from" | "he" | "she" |
        "they" | "them" | "his" | "her" | "their" | "we" | "our" | "you" | "your" | "i" | "me" |
        "my" | "not" | "no" | "so" | "if" | "than" | "then" | "there" | "which" | "who" | "what" |
        "when" | "where" | "also" | "about" | "into" | "after" | "over" | "said" | "says"
    )
}

/// Text processing utilities
pub mod text {
    use scraper::Html;

    /// Collapse every run of whitespace into one space and trim.
    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Truncate to at most `max_chars` characters, on a char boundary.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => text[..idx].to_string(),
            None => text.to_string(),
        }
    }

    /// Flatten an HTML fragment (as found in feed descriptions) to plain text.
    pub fn strip_html(fragment: &str) -> String {
        if !fragment.contains('<') && !fragment.contains('&') {
            return collapse_whitespace(fragment);
        }
        let parsed = Html::parse_fragment(fragment);
        let flat: String = parsed.root_element().text().collect::<Vec<_>>().join(" ");
        collapse_whitespace(&flat)
    }

    /// Lowercase alphanumeric words.
    pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Host of a URL, lowercased.
    pub fn host_of(url_str: &str) -> Option<String> {
        Url::parse(url_str.trim())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .filter(|h| !h.is_empty())
    }

    /// Host with a leading `www.` removed, used for exact host comparison.
    pub fn bare_host(host: &str) -> &str {
        host.strip_prefix("www.").unwrap_or(host)
    }

    /// Validate feed URL format
    pub fn is_http_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(text::truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(text::truncate_chars("short", 80), "short");
    }

    #[test]
    fn strips_markup_from_fragments() {
        assert_eq!(text::strip_html("Short <b>teaser</b> &amp; more"), "Short teaser & more");
        assert_eq!(text::strip_html("  plain   text "), "plain text");
    }

    #[test]
    fn host_helpers() {
        assert_eq!(url::host_of("https://WWW.Example.com/a/b").as_deref(), Some("www.example.com"));
        assert_eq!(url::host_of("not a url"), None);
        assert_eq!(url::bare_host("www.bbc.co.uk"), "bbc.co.uk");
        assert!(url::is_http_url("https://feeds.bbci.co.uk/news/rss.xml"));
        assert!(!url::is_http_url("ftp://example.com"));
    }

    #[test]
    fn stop_words() {
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("market"));
    }
}
