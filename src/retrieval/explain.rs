/// Short human-readable reasons attached to each result
use super::fusion::Candidate;
use crate::catalog::Product;

pub const MAX_CHIPS: usize = 4;

const TEXT_THRESHOLD: f32 = 0.7;
const VISUAL_THRESHOLD: f32 = 0.7;
const KEYWORD_THRESHOLD: f32 = 0.5;

/// Explanation chips for one result, at most [`MAX_CHIPS`]
///
/// Query words longer than two characters are matched as substrings of the
/// lowercased title, color and material. Field matches come first (all title
/// matches, then color, then material), followed by strong signal chips.
pub fn why_chips(query: &str, product: &Product, candidate: &Candidate) -> Vec<String> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();

    let fields = [
        ("Title", product.title.to_lowercase()),
        ("Color", product.color().to_lowercase()),
        ("Material", product.material().to_lowercase()),
    ];

    let mut chips = Vec::new();
    for (label, value) in &fields {
        for word in &words {
            if value.contains(word) {
                chips.push(format!("{}: {}", label, word));
            }
        }
    }

    if candidate.text > TEXT_THRESHOLD {
        chips.push("Text similarity".to_string());
    }
    if candidate.image > VISUAL_THRESHOLD {
        chips.push("Visual similarity".to_string());
    }
    if candidate.keyword > KEYWORD_THRESHOLD {
        chips.push("Keyword match".to_string());
    }

    chips.truncate(MAX_CHIPS);
    chips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: f32, image: f32, keyword: f32) -> Candidate {
        Candidate {
            row: 0,
            score: 0.0,
            text,
            image,
            keyword,
        }
    }

    fn dress() -> Product {
        let mut p = Product::new("d1", "Red Linen Dress");
        p.color = Some("Red".to_string());
        p.material = Some("linen".to_string());
        p
    }

    #[test]
    fn test_field_chips_in_field_order() {
        let chips = why_chips("linen red", &dress(), &candidate(0.0, 0.0, 0.0));
        assert_eq!(
            chips,
            vec!["Title: linen", "Title: red", "Color: red", "Material: linen"]
        );
    }

    #[test]
    fn test_short_words_ignored() {
        let chips = why_chips("a to", &dress(), &candidate(0.0, 0.0, 0.0));
        assert!(chips.is_empty());
    }

    #[test]
    fn test_signal_chips() {
        let chips = why_chips("gown", &dress(), &candidate(0.71, 0.9, 0.6));
        assert_eq!(
            chips,
            vec!["Text similarity", "Visual similarity", "Keyword match"]
        );

        let at_threshold = why_chips("gown", &dress(), &candidate(0.7, 0.7, 0.5));
        assert!(at_threshold.is_empty());
    }

    #[test]
    fn test_truncated_to_four() {
        let chips = why_chips("red linen dress", &dress(), &candidate(0.9, 0.9, 0.9));
        assert_eq!(chips.len(), MAX_CHIPS);
        assert_eq!(chips[0], "Title: red");
    }

    #[test]
    fn test_defaults_used_for_missing_fields() {
        let plain = Product::new("p", "Scarf");
        let chips = why_chips("multi mixed", &plain, &candidate(0.0, 0.0, 0.0));
        assert_eq!(chips, vec!["Color: multi", "Material: mixed"]);
    }
}
