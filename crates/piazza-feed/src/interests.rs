use std::collections::HashSet;

/// Minimum token length; shorter words are too common to signal interest.
const MIN_TOKEN_LEN: usize = 4;

/// Build the user's interest-token set from the raw text of everything they
/// authored or marked interest in: lowercase, whitespace-split, deduplicated,
/// filtered to tokens longer than 3 characters. First-seen order is kept so
/// the profile is deterministic for a fixed corpus.
pub fn interest_tokens(texts: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for text in texts {
        for word in text.to_lowercase().split_whitespace() {
            if word.chars().count() >= MIN_TOKEN_LEN && seen.insert(word.to_string()) {
                tokens.push(word.to_string());
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_lowercased_deduplicated_and_length_filtered() {
        let texts = vec![
            "Vintage BIKE for sale".to_string(),
            "bike repair tips".to_string(),
        ];
        let tokens = interest_tokens(&texts);
        assert_eq!(tokens, vec!["vintage", "bike", "sale", "repair", "tips"]);
    }

    #[test]
    fn short_words_are_dropped() {
        let tokens = interest_tokens(&["the cat sat on a mat".to_string()]);
        assert!(tokens.is_empty());
    }

    #[test]
    fn empty_corpus_yields_empty_profile() {
        assert!(interest_tokens(&[]).is_empty());
    }

    #[test]
    fn profile_is_deterministic() {
        let texts = vec!["alpha beta gamma".to_string(), "beta delta".to_string()];
        assert_eq!(interest_tokens(&texts), interest_tokens(&texts));
    }
}
