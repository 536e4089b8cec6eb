//! Tokenizer for formula text
//!
//! Tokenization never fails. Characters that are not operators, punctuation or
//! whitespace accumulate into word tokens, which are classified here as
//! numbers, function names or identifiers so the parser never has to re-check
//! a string.

use crate::expr::{BinaryOp, Func};
use crate::Number;

/// A lexical unit with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Kinds of tokens
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(Number),
    Ident(String),
    Operator(BinaryOp),
    Function(Func),
    LParen,
    RParen,
    Comma,
}

/// Split formula text into tokens
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut word_start = 0;
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            flush_word(&mut tokens, &mut word, word_start);
            continue;
        }

        let punct = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = punct {
            flush_word(&mut tokens, &mut word, word_start);
            tokens.push(Token { kind, offset });
            continue;
        }

        // Two-character operators win over their one-character prefixes
        if let Some(&(_, next)) = chars.peek() {
            let pair = [c, next].iter().collect::<String>();
            if let Some(op @ (BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne)) =
                BinaryOp::from_symbol(&pair)
            {
                flush_word(&mut tokens, &mut word, word_start);
                tokens.push(Token {
                    kind: TokenKind::Operator(op),
                    offset,
                });
                chars.next();
                continue;
            }
        }

        if let Some(op) = single_char_operator(c) {
            flush_word(&mut tokens, &mut word, word_start);
            tokens.push(Token {
                kind: TokenKind::Operator(op),
                offset,
            });
            continue;
        }

        if word.is_empty() {
            word_start = offset;
        }
        word.push(c);
    }
    flush_word(&mut tokens, &mut word, word_start);

    tokens
}

fn single_char_operator(c: char) -> Option<BinaryOp> {
    match c {
        '+' => Some(BinaryOp::Add),
        '-' => Some(BinaryOp::Sub),
        '*' => Some(BinaryOp::Mul),
        '/' => Some(BinaryOp::Div),
        '^' => Some(BinaryOp::Pow),
        '>' => Some(BinaryOp::Gt),
        '<' => Some(BinaryOp::Lt),
        _ => None,
    }
}

fn flush_word(tokens: &mut Vec<Token>, word: &mut String, offset: usize) {
    if word.is_empty() {
        return;
    }
    let text = std::mem::take(word);
    tokens.push(Token {
        kind: classify_word(text),
        offset,
    });
}

fn classify_word(text: String) -> TokenKind {
    if let Some(func) = Func::from_name(&text) {
        return TokenKind::Function(func);
    }
    let numeric_start = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    if numeric_start {
        if let Ok(value) = text.parse::<f64>() {
            return TokenKind::Number(Number(value));
        }
    }
    TokenKind::Ident(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_formula() {
        assert_eq!(
            kinds("2 + level*5"),
            vec![
                TokenKind::Number(Number(2.0)),
                TokenKind::Operator(BinaryOp::Add),
                TokenKind::Ident("level".into()),
                TokenKind::Operator(BinaryOp::Mul),
                TokenKind::Number(Number(5.0)),
            ]
        );
    }

    #[test]
    fn test_punctuation_without_whitespace() {
        assert_eq!(
            kinds("min(a,b)"),
            vec![
                TokenKind::Function(Func::Min),
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::Comma,
                TokenKind::Ident("b".into()),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a>=1 b<=2 c==3 d!=4 e>5"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Operator(BinaryOp::Ge),
                TokenKind::Number(Number(1.0)),
                TokenKind::Ident("b".into()),
                TokenKind::Operator(BinaryOp::Le),
                TokenKind::Number(Number(2.0)),
                TokenKind::Ident("c".into()),
                TokenKind::Operator(BinaryOp::Eq),
                TokenKind::Number(Number(3.0)),
                TokenKind::Ident("d".into()),
                TokenKind::Operator(BinaryOp::Ne),
                TokenKind::Number(Number(4.0)),
                TokenKind::Ident("e".into()),
                TokenKind::Operator(BinaryOp::Gt),
                TokenKind::Number(Number(5.0)),
            ]
        );
    }

    #[test]
    fn test_unknown_characters_fold_into_words() {
        assert_eq!(
            kinds("gold_delta % x!y ="),
            vec![
                TokenKind::Ident("gold_delta".into()),
                TokenKind::Ident("%".into()),
                TokenKind::Ident("x!y".into()),
                TokenKind::Ident("=".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5"), vec![TokenKind::Number(Number(1.5))]);
        assert_eq!(kinds(".25"), vec![TokenKind::Number(Number(0.25))]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Number(Number(1000.0))]);
        // Not numeric: starts with a letter, or fails to parse
        assert_eq!(kinds("inf"), vec![TokenKind::Ident("inf".into())]);
        assert_eq!(kinds("2x"), vec![TokenKind::Ident("2x".into())]);
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("ab + (c)");
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 3, 5, 6, 7]);
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \t\n ").is_empty());
    }

    proptest! {
        #[test]
        fn prop_tokenize_never_panics(input in "\\PC*") {
            let _ = tokenize(&input);
        }

        #[test]
        fn prop_identifiers_survive_intact(name in "[a-z_][a-z0-9_]{0,12}") {
            prop_assume!(Func::from_name(&name).is_none());
            let tokens = kinds(&format!("({name})"));
            prop_assert_eq!(
                tokens,
                vec![TokenKind::LParen, TokenKind::Ident(name.clone()), TokenKind::RParen]
            );
        }
    }
}
