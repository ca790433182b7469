#[derive(Debug, Clone, Default)]
pub struct QuoteCursor {
    index: usize,
}

impl QuoteCursor {
    /// Returns the quote under the cursor and advances it, wrapping around.
    /// The list may shrink between calls when prompts are reloaded, so the
    /// cursor is reduced modulo the current length first.
    pub fn next<'a>(&mut self, quotes: &'a [String]) -> Option<&'a str> {
        if quotes.is_empty() {
            return None;
        }
        let idx = self.index % quotes.len();
        self.index = (idx + 1) % quotes.len();
        Some(quotes[idx].as_str())
    }

    pub fn position(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotes() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn cycles_with_period_of_list_length() {
        let quotes = quotes();
        let mut cursor = QuoteCursor::default();
        let first: Vec<&str> = (0..quotes.len()).filter_map(|_| cursor.next(&quotes)).collect();
        let second: Vec<&str> = (0..quotes.len()).filter_map(|_| cursor.next(&quotes)).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn survives_shorter_list() {
        let mut cursor = QuoteCursor::default();
        let long = quotes();
        cursor.next(&long);
        cursor.next(&long);
        let short = vec!["x".to_string()];
        assert_eq!(cursor.next(&short), Some("x"));
        assert_eq!(cursor.next(&[]), None);
    }
}
