//! Token Substitution
//!
//! Literal, order-sensitive replacement of uppercase placeholder tokens with
//! Handlebars expressions. This is the first rewrite stage and runs before any
//! macro is rewritten.
//!
//! Order matters: `_AGG` is a prefix of `_AGG_TITLE`, so `_AGG_TITLE` must be
//! replaced first or it ends up as `{{agg_lower agg}}_TITLE`.

/// Ordered list of `(token, replacement)` pairs
#[derive(Debug, Clone, Default)]
pub struct TokenSubstitutions {
    pairs: Vec<(String, String)>,
}

impl TokenSubstitutions {
    /// Create an empty substitution list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; it runs after every pair already added
    pub fn with(mut self, token: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.pairs.push((token.into(), replacement.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate pairs in application order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }

    /// Apply every pair as a global literal replacement, in order
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (token, replacement) in &self.pairs {
            if token.is_empty() {
                continue;
            }
            result = result.replace(token.as_str(), replacement);
        }
        result
    }

    /// Pairs that would corrupt a later, more specific token
    ///
    /// Returns `(earlier, later)` token pairs where the earlier token occurs
    /// inside the later one, so the later token can never match as a whole.
    pub fn shadowed_pairs(&self) -> Vec<(&str, &str)> {
        let mut shadowed = Vec::new();
        for (i, (earlier, _)) in self.pairs.iter().enumerate() {
            for (later, _) in &self.pairs[i + 1..] {
                if !earlier.is_empty() && later != earlier && later.contains(earlier.as_str()) {
                    shadowed.push((earlier.as_str(), later.as_str()));
                }
            }
        }
        shadowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg_tokens() -> TokenSubstitutions {
        TokenSubstitutions::new()
            .with("_AGG_TITLE", "{{agg_title agg}}")
            .with("_AGG", "{{agg_lower agg}}")
    }

    #[test]
    fn test_specific_token_resolved_before_prefix() {
        let text = "struct _AGG_TITLEAgg; fn _AGG() {} // _AGG_TITLE and _AGG";
        let out = agg_tokens().apply(text);

        assert_eq!(
            out,
            "struct {{agg_title agg}}Agg; fn {{agg_lower agg}}() {} // {{agg_title agg}} and {{agg_lower agg}}"
        );
        assert!(!out.contains("_TITLE"));
    }

    #[test]
    fn test_wrong_order_corrupts_specific_token() {
        let reversed = TokenSubstitutions::new()
            .with("_AGG", "{{agg_lower agg}}")
            .with("_AGG_TITLE", "{{agg_title agg}}");

        let out = reversed.apply("_AGG_TITLE");
        assert_eq!(out, "{{agg_lower agg}}_TITLE");
        assert_eq!(reversed.shadowed_pairs(), vec![("_AGG", "_AGG_TITLE")]);
    }

    #[test]
    fn test_correct_order_has_no_shadowing() {
        assert!(agg_tokens().shadowed_pairs().is_empty());
    }

    #[test]
    fn test_missing_token_is_noop() {
        let text = "fn nothing_to_replace() {}";
        assert_eq!(agg_tokens().apply(text), text);
    }

    #[test]
    fn test_original_text_untouched() {
        let text = String::from("_AGG");
        let out = agg_tokens().apply(&text);
        assert_eq!(text, "_AGG");
        assert_eq!(out, "{{agg_lower agg}}");
    }
}
