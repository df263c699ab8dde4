//! Word-count token estimator.
//!
//! A cheap, deterministic stand-in for a subword tokenizer. Every size
//! budget in the chunker is expressed in these estimated tokens.

/// Approximate words-per-token ratio.
const WORDS_PER_TOKEN: f64 = 0.75;

/// Estimate the token count of `text` as `round(words / 0.75)`.
///
/// Words are whitespace-delimited. Blank input yields `0`.
///
/// ```rust
/// use legal_lens_core::tokens::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("one two three"), 4);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_words(text.split_whitespace().count())
}

/// Token estimate for an already-counted number of words.
pub fn tokens_for_words(words: usize) -> usize {
    if words == 0 {
        return 0;
    }
    (words as f64 / WORDS_PER_TOKEN).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t  "), 0);
    }

    #[test]
    fn test_rounds_to_nearest() {
        // 1 / 0.75 = 1.33, 2 / 0.75 = 2.67, 3 / 0.75 = 4
        assert_eq!(tokens_for_words(1), 1);
        assert_eq!(tokens_for_words(2), 3);
        assert_eq!(tokens_for_words(3), 4);
        assert_eq!(tokens_for_words(750), 1000);
    }

    #[test]
    fn test_whitespace_runs_do_not_add_words() {
        assert_eq!(
            estimate_tokens("Loan   amount\n\nis  $5000."),
            estimate_tokens("Loan amount is $5000.")
        );
    }

    #[test]
    fn test_monotonic_in_length() {
        let mut text = String::new();
        let mut last = 0;
        for _ in 0..200 {
            text.push_str("word ");
            let now = estimate_tokens(&text);
            assert!(now >= last);
            last = now;
        }
    }
}
