use asteria::{
    lexer::{tokenize, ParserOptions, Punctuator, Token, TokenData},
    ParseErrorCode,
};

fn lex(source: &str) -> Vec<Token> {
    tokenize(source, &ParserOptions::default()).expect("source should tokenize")
}

fn lex_err(source: &str) -> ParseErrorCode {
    tokenize(source, &ParserOptions::default())
        .expect_err("source should fail to tokenize")
        .code
}

#[test]
fn token_spans_cover_source_minus_whitespace() {
    let source = "var x = [1, -2.5];\nx[0] += 0x1F;\nreturn x <=> null;";
    let tokens = lex(source);
    let lines: Vec<&str> = source.split('\n').collect();
    let mut covered: Vec<Vec<bool>> = lines.iter().map(|l| vec![false; l.len()]).collect();
    for token in &tokens {
        let line = &mut covered[token.line as usize - 1];
        for flag in &mut line[token.offset..token.offset + token.length] {
            assert!(!*flag, "token spans must not overlap");
            *flag = true;
        }
    }
    for (line, flags) in lines.iter().zip(&covered) {
        for (index, flag) in flags.iter().enumerate() {
            let byte = line.as_bytes()[index];
            if !*flag {
                assert!(
                    byte.is_ascii_whitespace(),
                    "uncovered non-whitespace byte {:?} in {line:?}",
                    byte as char
                );
            }
        }
    }
}

#[test]
fn minus_with_space_stays_a_punctuator() {
    let tokens = lex("1 - 2");
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].data, TokenData::IntegerLiteral(1));
    assert!(tokens[1].is_punctuator(Punctuator::Sub));
    assert_eq!(tokens[2].data, TokenData::IntegerLiteral(2));
}

#[test]
fn sign_merges_after_assignment() {
    let tokens = lex("a = -2");
    assert_eq!(tokens.len(), 3);
    assert!(matches!(tokens[0].data, TokenData::Identifier(_)));
    assert!(tokens[1].is_punctuator(Punctuator::Assign));
    assert_eq!(tokens[2].data, TokenData::IntegerLiteral(-2));
    // The merged token spans the sign as well.
    assert_eq!(tokens[2].offset, 4);
    assert_eq!(tokens[2].length, 2);
}

#[test]
fn longest_match_beats_sign_merge() {
    let tokens = lex("1--2");
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[0].data, TokenData::IntegerLiteral(1));
    assert!(tokens[1].is_punctuator(Punctuator::Dec));
    assert_eq!(tokens[2].data, TokenData::IntegerLiteral(2));
}

#[test]
fn sign_does_not_merge_after_a_value() {
    // `b` terminates an expression, so the minus stays an infix operator.
    let tokens = lex("b -2");
    assert_eq!(tokens.len(), 3);
    assert!(tokens[1].is_punctuator(Punctuator::Sub));
    assert_eq!(tokens[2].data, TokenData::IntegerLiteral(2));
}

#[test]
fn int64_min_literal_needs_a_contiguous_minus() {
    assert_eq!(lex_err("0x1p63"), ParseErrorCode::IntegerLiteralOverflow);

    let tokens = lex("-0x1p63");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].data, TokenData::IntegerLiteral(i64::MIN));

    // Separation by whitespace or a comment breaks adjacency.
    assert_eq!(lex_err("- 0x1p63"), ParseErrorCode::IntegerLiteralOverflow);
    assert_eq!(
        lex_err("-/*x*/0x1p63"),
        ParseErrorCode::IntegerLiteralOverflow
    );
}

#[test]
fn integer_exponents_must_be_non_negative() {
    assert_eq!(lex_err("1e-3"), ParseErrorCode::IntegerLiteralExponentNegative);
    let tokens = lex("2e3");
    assert_eq!(tokens[0].data, TokenData::IntegerLiteral(2000));
}

#[test]
fn integer_as_real_demotes_integer_literals() {
    let options = ParserOptions {
        integer_as_real: true,
        ..Default::default()
    };
    let tokens = tokenize("7", &options).unwrap();
    assert_eq!(tokens[0].data, TokenData::RealLiteral(7.0));
}

#[test]
fn real_literal_range_errors_are_distinct() {
    assert_eq!(lex_err("1.0e999999"), ParseErrorCode::RealLiteralOverflow);
    assert_eq!(lex_err("1.0e-999999"), ParseErrorCode::RealLiteralUnderflow);
    // A zero significand underflows nowhere.
    let tokens = lex("0.0e-999999");
    assert_eq!(tokens[0].data, TokenData::RealLiteral(0.0));
    assert_eq!(
        lex_err("1e99999999999"),
        ParseErrorCode::NumericLiteralExponentOverflow
    );
}

#[test]
fn string_escape_errors() {
    assert_eq!(lex_err("\"abc"), ParseErrorCode::StringLiteralUnclosed);
    assert_eq!(lex_err(r#""\q""#), ParseErrorCode::EscapeSequenceUnknown);
    assert_eq!(lex_err(r#""\xZZ""#), ParseErrorCode::EscapeSequenceInvalidHex);
    assert_eq!(lex_err(r#""\u12""#), ParseErrorCode::EscapeSequenceIncomplete);
}

#[test]
fn full_escape_set_is_translated() {
    let tokens = lex(r#""\a\b\f\n\r\t\v\0\Z\e\'\"\\\?\x41B\U000043""#);
    assert_eq!(
        tokens[0].data,
        TokenData::StringLiteral(
            "\x07\x08\x0C\n\r\t\x0B\0\x1A\x1B'\"\\?ABC".to_string()
        )
    );
}

#[test]
fn nul_bytes_are_rejected() {
    assert_eq!(lex_err("var\0x"), ParseErrorCode::NullCharacterDisallowed);
}

#[test]
fn unrecognized_characters_are_rejected() {
    assert_eq!(lex_err("var £"), ParseErrorCode::TokenCharacterUnrecognized);
}

#[test]
fn invalid_utf8_is_positioned() {
    let err = asteria::lexer::tokenize_bytes(b"var x;\n\xFF", &ParserOptions::default())
        .unwrap_err();
    assert_eq!(err.code, ParseErrorCode::Utf8SequenceInvalid);
    assert_eq!(err.line, 2);
    assert_eq!(err.offset, 0);
}
