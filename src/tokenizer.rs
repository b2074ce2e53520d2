//! Folding a flat glyph token stream into logical symbols.
//!
//! The scan is greedy, leftmost and longest-match: at every cursor position the
//! longest function name spelled by the following glyphs wins, otherwise the
//! single glyph is resolved on its own. Adjacent letters that happen to spell a
//! function name therefore always become that function.

use std::ops::Range;

use crate::registry::ClassRegistry;

/// One logical symbol before box aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpan {
    pub class_id: usize,
    /// Half-open range of glyph indices the symbol was built from.
    pub span: Range<usize>,
}

pub struct Tokenizer<'r> {
    registry: &'r ClassRegistry,
}

impl<'r> Tokenizer<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self { registry }
    }

    /// Tokenize raw glyph tokens. Unrecognized glyphs are dropped; the returned
    /// spans are disjoint and strictly increasing.
    pub fn tokenize<S: AsRef<str>>(&self, glyphs: &[S]) -> Vec<SymbolSpan> {
        let mut symbols = Vec::new();
        let mut i = 0;

        while i < glyphs.len() {
            if let Some((class_id, len)) = self.match_function(glyphs, i) {
                symbols.push(SymbolSpan {
                    class_id,
                    span: i..i + len,
                });
                i += len;
                continue;
            }

            if let Some(class_id) = self.registry.classify(glyphs[i].as_ref()) {
                symbols.push(SymbolSpan {
                    class_id,
                    span: i..i + 1,
                });
            }
            i += 1;
        }

        symbols
    }

    /// Longest function name whose spelling equals the concatenation of the
    /// glyphs starting at `start`. Returns its class id and glyph count.
    fn match_function<S: AsRef<str>>(&self, glyphs: &[S], start: usize) -> Option<(usize, usize)> {
        self.registry
            .function_names()
            .iter()
            .filter(|f| f.glyph_len > 0 && start + f.glyph_len <= glyphs.len())
            .find(|f| spells(&glyphs[start..start + f.glyph_len], &f.name))
            .map(|f| (f.class_id, f.glyph_len))
    }
}

// Every glyph must contribute at least one character.
fn spells<S: AsRef<str>>(window: &[S], name: &str) -> bool {
    let mut rest = name;
    for glyph in window {
        let glyph = glyph.as_ref();
        if glyph.is_empty() {
            return false;
        }
        match rest.strip_prefix(glyph) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassSet;

    fn names(registry: &ClassRegistry, spans: &[SymbolSpan]) -> Vec<(String, Range<usize>)> {
        spans
            .iter()
            .map(|s| {
                (
                    registry.name_of(s.class_id).unwrap().to_string(),
                    s.span.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn folds_function_name_and_keeps_following_glyphs() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["s", "i", "n", "=", "3"]);
        assert_eq!(
            names(&registry, &spans),
            vec![
                ("sin".to_string(), 0..3),
                ("=".to_string(), 3..4),
                ("3".to_string(), 4..5),
            ]
        );
    }

    #[test]
    fn unrecognized_glyphs_are_skipped() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["\\to", "x", "\\infty", "+", "1"]);
        assert_eq!(
            names(&registry, &spans),
            vec![
                ("x".to_string(), 1..2),
                ("+".to_string(), 3..4),
                ("1".to_string(), 4..5),
            ]
        );
    }

    #[test]
    fn truncated_function_falls_back_to_letters() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["2", "s", "q", "r"]);
        assert_eq!(
            names(&registry, &spans),
            vec![
                ("2".to_string(), 0..1),
                ("s".to_string(), 1..2),
                ("q".to_string(), 2..3),
                ("r".to_string(), 3..4),
            ]
        );
    }

    #[test]
    fn basic_set_has_no_functions() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["s", "i", "n", "x"]);
        assert_eq!(names(&registry, &spans), vec![("x".to_string(), 3..4)]);
    }

    #[test]
    fn longest_function_wins() {
        let registry =
            ClassRegistry::from_parts(&["l", "n", "ln", "lnx"], &[], &["ln", "lnx"]).unwrap();
        let tokenizer = Tokenizer::new(&registry);
        let spans = tokenizer.tokenize(&["l", "n", "x"]);
        assert_eq!(names(&registry, &spans), vec![("lnx".to_string(), 0..3)]);
        let spans = tokenizer.tokenize(&["l", "n", "y"]);
        assert_eq!(names(&registry, &spans), vec![("ln".to_string(), 0..2)]);
    }

    #[test]
    fn single_glyph_function_token_resolves_directly() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["\\sqrt", "x"]);
        assert_eq!(
            names(&registry, &spans),
            vec![("sqrt".to_string(), 0..1), ("x".to_string(), 1..2)]
        );
    }

    #[test]
    fn match_requires_full_concatenation() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        // "si" + "n" + "x" concatenates to "sinx", not "sin".
        let spans = Tokenizer::new(&registry).tokenize(&["si", "n", "x"]);
        assert_eq!(
            names(&registry, &spans),
            vec![("n".to_string(), 1..2), ("x".to_string(), 2..3)]
        );
    }

    #[test]
    fn empty_glyph_breaks_a_function_name() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["s", "", "in", "x"]);
        assert_eq!(
            names(&registry, &spans),
            vec![("s".to_string(), 0..1), ("x".to_string(), 3..4)]
        );
    }

    #[test]
    fn adjacent_letters_spelling_a_function_are_folded() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let spans = Tokenizer::new(&registry).tokenize(&["a", "b", "s", "c", "o", "s"]);
        assert_eq!(
            names(&registry, &spans),
            vec![("abs".to_string(), 0..3), ("cos".to_string(), 3..6)]
        );
    }

    #[test]
    fn spans_are_disjoint_and_increasing() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let glyphs = [
            "\\lim_", "x", "\\to", "0", "s", "i", "n", "x", "/", "x", "+", "l", "o", "g", "(",
            "e", ")", "\\mathrm", "s", "q", "r", "t", "4",
        ];
        let spans = Tokenizer::new(&registry).tokenize(&glyphs);
        assert!(!spans.is_empty());
        assert!(spans.iter().all(|s| s.span.start < s.span.end));
        assert!(spans.windows(2).all(|w| w[0].span.end <= w[1].span.start));
        assert!(spans.iter().all(|s| s.span.end <= glyphs.len()));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let glyphs: [&str; 0] = [];
        assert!(Tokenizer::new(&registry).tokenize(&glyphs).is_empty());
    }
}
