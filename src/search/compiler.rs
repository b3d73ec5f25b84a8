//! Boolean query compiler for FTS5.
//!
//! Turns free-text search syntax into an FTS5 `MATCH` expression:
//!
//! - whitespace-separated terms are ANDed (`simon carnegie` → `"simon" AND "carnegie"`)
//! - `AND`, `OR`, `NOT` (any case) are operators
//! - `"..."` is a phrase; an unterminated quote runs to the end of input
//! - `(` / `)` group
//!
//! Compilation never fails. Malformed input (dangling operators, stray or
//! unclosed parentheses) is repaired into the closest valid expression so the
//! executor never hands FTS5 a syntax error. A leading top-level `NOT term` has
//! no FTS5 form and is returned separately as an exclusion.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Phrase(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl Token {
    fn is_operand(&self) -> bool {
        matches!(self, Token::Word(_) | Token::Phrase(_))
    }

    fn is_operator(&self) -> bool {
        matches!(self, Token::And | Token::Or | Token::Not)
    }

    /// Tokens after which a new operand needs an explicit conjunction.
    fn ends_term(&self) -> bool {
        self.is_operand() || *self == Token::Close
    }

    /// Tokens that start a new term.
    fn starts_term(&self) -> bool {
        self.is_operand() || *self == Token::Open
    }
}

/// A compiled FTS5 expression plus the terms a leading `NOT` excluded.
/// Empty means "add no full-text predicate".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineQuery {
    expr: String,
    exclude: String,
}

impl EngineQuery {
    /// The expression rows must match. May be empty when only exclusions remain.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// An expression rows must not match.
    pub fn excluded(&self) -> Option<&str> {
        (!self.exclude.is_empty()).then_some(self.exclude.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_empty() && self.exclude.is_empty()
    }

    pub fn into_string(self) -> String {
        self.expr
    }
}

impl fmt::Display for EngineQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)?;
        if !self.exclude.is_empty() {
            write!(f, " [excluding {}]", self.exclude)?;
        }
        Ok(())
    }
}

/// Compile a free-text query into an FTS5 expression.
pub fn compile(raw: &str) -> EngineQuery {
    let tokens = insert_implicit_and(tokenize(raw));
    let (repaired, negated) = repair(&tokens);
    if repaired != tokens {
        tracing::debug!(raw = raw, "repaired malformed boolean query");
    }
    let (exclude, _) = repair(&negated);
    EngineQuery {
        expr: render(&repaired),
        exclude: render(&exclude),
    }
}

/// Split raw input into words, phrases, operators and parentheses.
pub fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < raw.len() {
        let Some(c) = raw[i..].chars().next() else {
            break;
        };
        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }
        match c {
            '"' => {
                let start = i + 1;
                let end = raw[start..].find('"').map_or(raw.len(), |off| start + off);
                let phrase = raw[start..end].trim();
                if !phrase.is_empty() {
                    tokens.push(Token::Phrase(phrase.to_string()));
                }
                i = end + 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            _ => {
                let end = raw[i..]
                    .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '(' | ')'))
                    .map_or(raw.len(), |off| i + off);
                if let Some(token) = classify_word(&raw[i..end]) {
                    tokens.push(token);
                }
                i = end;
            }
        }
    }

    tokens
}

fn classify_word(word: &str) -> Option<Token> {
    if word.eq_ignore_ascii_case("AND") {
        return Some(Token::And);
    }
    if word.eq_ignore_ascii_case("OR") {
        return Some(Token::Or);
    }
    if word.eq_ignore_ascii_case("NOT") {
        return Some(Token::Not);
    }
    let clean: String = word
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    clean
        .chars()
        .any(char::is_alphanumeric)
        .then_some(Token::Word(clean))
}

/// Insert `AND` between adjacent terms that have no operator between them.
pub fn insert_implicit_and(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len() * 2);
    for token in tokens {
        if token.starts_term() && out.last().is_some_and(Token::ends_term) {
            out.push(Token::And);
        }
        out.push(token);
    }
    out
}

/// Where the term after a `NOT` with no left operand goes.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Discard {
    Off,
    NextTerm,
    Group(usize),
}

/// Drop or close whatever would make the stream invalid FTS5: operators
/// without an operand on both sides, stray `)`, unclosed `(`, empty groups.
///
/// FTS5 has no unary `NOT`. `a AND NOT b` becomes `a NOT b`. A `NOT` that
/// opens the query at the top level moves the term or group it negates into
/// the returned exclusion list (alternatives joined by `OR`). Any other `NOT`
/// without a left operand is dropped together with its term, so an exclusion
/// never turns into a requirement.
fn repair(tokens: &[Token]) -> (Vec<Token>, Vec<Token>) {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut negated: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    let mut discard = Discard::Off;
    let mut keep_negated = false;

    for token in tokens {
        match discard {
            Discard::Group(open) => {
                discard = match token {
                    Token::Open => Discard::Group(open + 1),
                    Token::Close if open == 1 => Discard::Off,
                    Token::Close => Discard::Group(open - 1),
                    _ => discard,
                };
                if keep_negated {
                    negated.push(token.clone());
                }
                continue;
            }
            Discard::NextTerm => match token {
                Token::Word(_) | Token::Phrase(_) => {
                    discard = Discard::Off;
                    if keep_negated {
                        negated.push(token.clone());
                    }
                    continue;
                }
                Token::Open => {
                    discard = Discard::Group(1);
                    if keep_negated {
                        negated.push(token.clone());
                    }
                    continue;
                }
                Token::And | Token::Or | Token::Not => continue,
                Token::Close => discard = Discard::Off,
            },
            Discard::Off => {}
        }

        match token {
            Token::Word(_) | Token::Phrase(_) | Token::Open => {
                if out.last().is_some_and(Token::ends_term) {
                    out.push(Token::And);
                }
                if *token == Token::Open {
                    depth += 1;
                }
                out.push(token.clone());
            }
            Token::Not => match out.last() {
                Some(last) if last.ends_term() => out.push(Token::Not),
                Some(Token::And) => {
                    out.pop();
                    out.push(Token::Not);
                }
                Some(Token::Not) => {}
                _ => {
                    keep_negated = out.is_empty() && depth == 0;
                    if keep_negated && !negated.is_empty() {
                        negated.push(Token::Or);
                    }
                    discard = Discard::NextTerm;
                }
            },
            Token::And | Token::Or => {
                if out.last().is_some_and(Token::ends_term) {
                    out.push(token.clone());
                }
            }
            Token::Close => {
                if depth == 0 {
                    continue;
                }
                close_group(&mut out);
                depth -= 1;
            }
        }
    }

    loop {
        strip_trailing_operators(&mut out);
        if depth == 0 {
            break;
        }
        close_group(&mut out);
        depth -= 1;
    }

    (out, negated)
}

fn close_group(out: &mut Vec<Token>) {
    strip_trailing_operators(out);
    if out.last() == Some(&Token::Open) {
        out.pop();
        strip_trailing_operators(out);
    } else {
        out.push(Token::Close);
    }
}

fn strip_trailing_operators(out: &mut Vec<Token>) {
    while out.last().is_some_and(Token::is_operator) {
        out.pop();
    }
}

/// Render tokens as FTS5 text: quoted literals, bare operators, tight parens.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut after_open = true;
    for token in tokens {
        if !after_open && *token != Token::Close {
            out.push(' ');
        }
        match token {
            Token::Word(w) | Token::Phrase(w) => {
                out.push('"');
                out.push_str(w);
                out.push('"');
            }
            Token::And => out.push_str("AND"),
            Token::Or => out.push_str("OR"),
            Token::Not => out.push_str("NOT"),
            Token::Open => out.push('('),
            Token::Close => out.push(')'),
        }
        after_open = *token == Token::Open;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(raw: &str) -> String {
        compile(raw).into_string()
    }

    #[test]
    fn implicit_and_between_words() {
        assert_eq!(c("simon carnegie"), r#""simon" AND "carnegie""#);
    }

    #[test]
    fn explicit_operators_pass_through() {
        assert_eq!(c("simon OR newell"), r#""simon" OR "newell""#);
        assert_eq!(c("simon NOT chess"), r#""simon" NOT "chess""#);
        assert_eq!(c("simon and newell"), r#""simon" AND "newell""#);
    }

    #[test]
    fn quoted_phrase_is_one_literal() {
        assert_eq!(c("\"bounded rationality\""), r#""bounded rationality""#);
        assert_eq!(
            c("simon \"bounded rationality\""),
            r#""simon" AND "bounded rationality""#
        );
    }

    #[test]
    fn groups_keep_inner_operators() {
        assert_eq!(
            c("(simon OR newell) AND AI"),
            r#"("simon" OR "newell") AND "AI""#
        );
        assert_eq!(
            c("(simon OR newell) chess"),
            r#"("simon" OR "newell") AND "chess""#
        );
        assert_eq!(
            c("chess (simon OR newell)"),
            r#""chess" AND ("simon" OR "newell")"#
        );
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        assert_eq!(
            c("simon \"unterminated"),
            r#""simon" AND "unterminated""#
        );
        assert_eq!(c("simon \"two words"), r#""simon" AND "two words""#);
    }

    #[test]
    fn words_are_sanitized() {
        assert_eq!(c("simon's"), r#""simons""#);
        assert_eq!(c("self-organizing snake_case"), r#""self-organizing" AND "snake_case""#);
        assert_eq!(c("*** simon"), r#""simon""#);
        assert_eq!(c("simon - newell"), r#""simon" AND "newell""#);
        assert_eq!(c("_ -- simon"), r#""simon""#);
    }

    #[test]
    fn empty_and_operator_only_input_compile_to_empty() {
        assert!(compile("").is_empty());
        assert!(compile("   \t ").is_empty());
        assert!(compile("AND OR not").is_empty());
        assert!(compile("\"\"").is_empty());
        assert!(compile("()").is_empty());
        assert!(compile("!!! ???").is_empty());
    }

    #[test]
    fn dangling_operators_are_dropped() {
        assert_eq!(c("simon OR"), r#""simon""#);
        assert_eq!(c("OR simon"), r#""simon""#);
        assert_eq!(c("simon AND OR newell"), r#""simon" AND "newell""#);
        assert_eq!(c("(OR simon)"), r#"("simon")"#);
    }

    #[test]
    fn leading_not_becomes_an_exclusion() {
        let alone = compile("NOT chess");
        assert_eq!(alone.as_str(), "");
        assert_eq!(alone.excluded(), Some(r#""chess""#));
        assert!(!alone.is_empty());

        let mixed = compile("NOT (chess OR go) simon");
        assert_eq!(mixed.as_str(), r#""simon""#);
        assert_eq!(mixed.excluded(), Some(r#"("chess" OR "go")"#));

        let phrase = compile("NOT \"chess program\" newell NOT memo");
        assert_eq!(phrase.as_str(), r#""newell" NOT "memo""#);
        assert_eq!(phrase.excluded(), Some(r#""chess program""#));

        let several = compile("NOT chess NOT (go");
        assert_eq!(several.as_str(), "");
        assert_eq!(several.excluded(), Some(r#""chess" OR ("go")"#));
    }

    #[test]
    fn unary_not_elsewhere_drops_the_negated_term() {
        assert_eq!(compile("newell OR NOT chess"), compile("newell"));
        assert_eq!(compile("simon AND (NOT chess)"), compile("simon"));
        assert_eq!(compile("simon (NOT chess)"), compile("simon"));
        assert_eq!(compile("(NOT) simon"), compile("simon"));
    }

    #[test]
    fn and_not_becomes_binary_not() {
        assert_eq!(c("simon AND NOT chess"), r#""simon" NOT "chess""#);
        assert_eq!(c("simon NOT NOT chess"), r#""simon" NOT "chess""#);
        assert_eq!(
            c("simon AND NOT (chess OR go)"),
            r#""simon" NOT ("chess" OR "go")"#
        );
    }

    #[test]
    fn parentheses_are_balanced() {
        assert_eq!(c("simon) newell"), r#""simon" AND "newell""#);
        assert_eq!(c("(simon OR newell"), r#"("simon" OR "newell")"#);
        assert_eq!(c("simon AND ("), r#""simon""#);
        assert_eq!(c("simon () newell"), r#""simon" AND "newell""#);
        assert_eq!(c("((simon))"), r#"(("simon"))"#);
    }

    #[test]
    fn tokenizer_handles_multibyte_text() {
        assert_eq!(
            tokenize("économie \"café au lait\""),
            vec![
                Token::Word("économie".into()),
                Token::Phrase("café au lait".into())
            ]
        );
    }

    fn assert_well_formed(out: &str) -> Result<(), TestCaseError> {
        let mut depth: i64 = 0;
        let mut in_literal = false;
        for ch in out.chars() {
            match ch {
                '"' => in_literal = !in_literal,
                '(' if !in_literal => depth += 1,
                ')' if !in_literal => depth -= 1,
                _ => {}
            }
            prop_assert!(depth >= 0);
        }
        prop_assert_eq!(depth, 0);
        prop_assert_eq!(out.matches('"').count() % 2, 0);
        for op in ["AND", "OR", "NOT"] {
            prop_assert!(!out.starts_with(op));
            let trailing = format!(" {op}");
            prop_assert!(!out.ends_with(&trailing));
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn compile_output_is_always_well_formed(raw in "[a-zA-Z \"()&|-]{0,40}") {
            let compiled = compile(&raw);
            assert_well_formed(compiled.as_str())?;
            assert_well_formed(compiled.excluded().unwrap_or(""))?;
        }

        #[test]
        fn leading_not_excludes_instead_of_requiring(term in "[a-z]{3,8}") {
            prop_assume!(term != "and" && term != "not");
            let compiled = compile(&format!("NOT {term}"));
            prop_assert_eq!(compiled.as_str(), "");
            let expected = format!("\"{term}\"");
            prop_assert_eq!(compiled.excluded(), Some(expected.as_str()));
        }
    }
}
