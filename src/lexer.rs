use crate::diagnostics::{ParseErrorCode, ParserError};

/// Recognized load-time configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Suppresses promotion of identifiers to keywords.
    pub keyword_as_identifier: bool,
    /// Makes single-quoted strings honor escape sequences.
    pub escapable_single_quote_string: bool,
    /// Treats every numeric literal as a real literal.
    pub integer_as_real: bool,
    /// Recognized for compatibility; the core takes no single-step traps.
    pub verbose_single_step_traps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Assert,
    Break,
    Case,
    Catch,
    Const,
    Continue,
    Default,
    Defer,
    Do,
    Each,
    Else,
    False,
    For,
    Func,
    If,
    Infinity,
    Lengthof,
    Nan,
    Not,
    Null,
    Or,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Unset,
    Var,
    While,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    Add,
    AddEq,
    Inc,
    Sub,
    SubEq,
    Dec,
    Mul,
    MulEq,
    Div,
    DivEq,
    Mod,
    ModEq,
    Notl,
    Notb,
    Andb,
    AndbEq,
    Andl,
    AndlEq,
    Orb,
    OrbEq,
    Orl,
    OrlEq,
    Xorb,
    XorbEq,
    Sla,
    SlaEq,
    Sll,
    SllEq,
    Sra,
    SraEq,
    Srl,
    SrlEq,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLte,
    CmpGt,
    CmpGte,
    Spaceship,
    Assign,
    Quest,
    QuestEq,
    Coales,
    CoalesEq,
    Dot,
    Ellipsis,
    Comma,
    Colon,
    Semicolon,
    ParenthOp,
    ParenthCl,
    BracketOp,
    BracketCl,
    BraceOp,
    BraceCl,
}

/// The normative punctuator table, sorted so that every entry precedes the
/// entries it is a prefix of. Matching picks the longest applicable entry.
const PUNCTUATORS: &[(&str, Punctuator)] = &[
    ("!", Punctuator::Notl),
    ("!=", Punctuator::CmpNe),
    ("%", Punctuator::Mod),
    ("%=", Punctuator::ModEq),
    ("&", Punctuator::Andb),
    ("&&", Punctuator::Andl),
    ("&&=", Punctuator::AndlEq),
    ("&=", Punctuator::AndbEq),
    ("(", Punctuator::ParenthOp),
    (")", Punctuator::ParenthCl),
    ("*", Punctuator::Mul),
    ("*=", Punctuator::MulEq),
    ("+", Punctuator::Add),
    ("++", Punctuator::Inc),
    ("+=", Punctuator::AddEq),
    (",", Punctuator::Comma),
    ("-", Punctuator::Sub),
    ("--", Punctuator::Dec),
    ("-=", Punctuator::SubEq),
    (".", Punctuator::Dot),
    ("...", Punctuator::Ellipsis),
    ("/", Punctuator::Div),
    ("/=", Punctuator::DivEq),
    (":", Punctuator::Colon),
    (";", Punctuator::Semicolon),
    ("<", Punctuator::CmpLt),
    ("<<", Punctuator::Sla),
    ("<<<", Punctuator::Sll),
    ("<<<=", Punctuator::SllEq),
    ("<<=", Punctuator::SlaEq),
    ("<=", Punctuator::CmpLte),
    ("<=>", Punctuator::Spaceship),
    ("=", Punctuator::Assign),
    ("==", Punctuator::CmpEq),
    (">", Punctuator::CmpGt),
    (">=", Punctuator::CmpGte),
    (">>", Punctuator::Sra),
    (">>=", Punctuator::SraEq),
    (">>>", Punctuator::Srl),
    (">>>=", Punctuator::SrlEq),
    ("?", Punctuator::Quest),
    ("?=", Punctuator::QuestEq),
    ("??", Punctuator::Coales),
    ("??=", Punctuator::CoalesEq),
    ("[", Punctuator::BracketOp),
    ("]", Punctuator::BracketCl),
    ("^", Punctuator::Xorb),
    ("^=", Punctuator::XorbEq),
    ("{", Punctuator::BraceOp),
    ("|", Punctuator::Orb),
    ("|=", Punctuator::OrbEq),
    ("||", Punctuator::Orl),
    ("||=", Punctuator::OrlEq),
    ("}", Punctuator::BraceCl),
    ("~", Punctuator::Notb),
];

fn keyword_for(ident: &str) -> Option<Keyword> {
    let keyword = match ident {
        "and" => Keyword::And,
        "assert" => Keyword::Assert,
        "break" => Keyword::Break,
        "case" => Keyword::Case,
        "catch" => Keyword::Catch,
        "const" => Keyword::Const,
        "continue" => Keyword::Continue,
        "default" => Keyword::Default,
        "defer" => Keyword::Defer,
        "do" => Keyword::Do,
        "each" => Keyword::Each,
        "else" => Keyword::Else,
        "false" => Keyword::False,
        "for" => Keyword::For,
        "func" => Keyword::Func,
        "if" => Keyword::If,
        "infinity" => Keyword::Infinity,
        "lengthof" => Keyword::Lengthof,
        "nan" => Keyword::Nan,
        "not" => Keyword::Not,
        "null" => Keyword::Null,
        "or" => Keyword::Or,
        "return" => Keyword::Return,
        "switch" => Keyword::Switch,
        "this" => Keyword::This,
        "throw" => Keyword::Throw,
        "true" => Keyword::True,
        "try" => Keyword::Try,
        "typeof" => Keyword::Typeof,
        "unset" => Keyword::Unset,
        "var" => Keyword::Var,
        "while" => Keyword::While,
        _ => return None,
    };
    Some(keyword)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenData {
    Keyword(Keyword),
    Punctuator(Punctuator),
    Identifier(String),
    IntegerLiteral(i64),
    RealLiteral(f64),
    StringLiteral(String),
}

/// One token, tagged with its source position. `offset` is a byte offset
/// within `line`; `length` spans the token's full lexeme, including a
/// merged sign.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub line: u32,
    pub offset: usize,
    pub length: usize,
    pub data: TokenData,
}

impl Token {
    pub fn is_punctuator(&self, punct: Punctuator) -> bool {
        matches!(&self.data, TokenData::Punctuator(p) if *p == punct)
    }

    pub fn as_keyword(&self) -> Option<Keyword> {
        match &self.data {
            TokenData::Keyword(keyword) => Some(*keyword),
            _ => None,
        }
    }
}

/// Tokenizes a raw byte stream, rejecting invalid UTF-8 positionally.
pub fn tokenize_bytes(bytes: &[u8], options: &ParserOptions) -> Result<Vec<Token>, ParserError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => tokenize(text, options),
        Err(err) => {
            let valid = &bytes[..err.valid_up_to()];
            let line = valid.iter().filter(|b| **b == b'\n').count() as u32 + 1;
            let offset = valid
                .iter()
                .rposition(|b| *b == b'\n')
                .map(|idx| valid.len() - idx - 1)
                .unwrap_or(valid.len());
            Err(ParserError::new(
                line,
                offset,
                err.error_len().unwrap_or(1),
                ParseErrorCode::Utf8SequenceInvalid,
            ))
        }
    }
}

/// Tokenizes source text into a vector of tokens in source order.
pub fn tokenize(source: &str, options: &ParserOptions) -> Result<Vec<Token>, ParserError> {
    let mut lexer = Lexer {
        options,
        tokens: Vec::new(),
        block_comment: None,
    };
    for (index, line) in source.split('\n').enumerate() {
        let line_no = index as u32 + 1;
        if line_no == 1 && line.starts_with("#!") {
            continue;
        }
        lexer.scan_line(line_no, line)?;
    }
    if let Some((line, offset, length)) = lexer.block_comment {
        return Err(ParserError::new(
            line,
            offset,
            length,
            ParseErrorCode::BlockCommentUnclosed,
        ));
    }
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    options: &'a ParserOptions,
    tokens: Vec<Token>,
    // Position of the opener of an unterminated block comment.
    block_comment: Option<(u32, usize, usize)>,
}

impl Lexer<'_> {
    fn scan_line(&mut self, line_no: u32, line: &str) -> Result<(), ParserError> {
        if let Some(nul) = line.bytes().position(|b| b == 0) {
            return Err(ParserError::new(
                line_no,
                nul,
                1,
                ParseErrorCode::NullCharacterDisallowed,
            ));
        }

        let bytes = line.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            if self.block_comment.is_some() {
                match find_bytes(&bytes[pos..], b"*/") {
                    Some(rel) => {
                        self.block_comment = None;
                        pos += rel + 2;
                        continue;
                    }
                    None => return Ok(()),
                }
            }

            let head = bytes[pos];
            if matches!(head, b' ' | b'\t' | 0x0B | 0x0C | b'\r') {
                pos += 1;
                continue;
            }
            if head == b'/' && bytes.get(pos + 1) == Some(&b'/') {
                return Ok(());
            }
            if head == b'/' && bytes.get(pos + 1) == Some(&b'*') {
                self.block_comment = Some((line_no, pos, 2));
                pos += 2;
                continue;
            }

            if let Some(next) = self.accept_punctuator(line, line_no, pos) {
                pos = next;
                continue;
            }
            if head == b'"' {
                pos = self.accept_string_literal(line, line_no, pos, b'"', true)?;
                continue;
            }
            if head == b'\'' {
                pos = self.accept_string_literal(
                    line,
                    line_no,
                    pos,
                    b'\'',
                    self.options.escapable_single_quote_string,
                )?;
                continue;
            }
            if head.is_ascii_alphabetic() || head == b'_' {
                pos = self.accept_identifier_or_keyword(line, line_no, pos);
                continue;
            }
            if head.is_ascii_digit() {
                pos = self.accept_numeric_literal(line, line_no, pos)?;
                continue;
            }
            return Err(ParserError::new(
                line_no,
                pos,
                1,
                ParseErrorCode::TokenCharacterUnrecognized,
            ));
        }
        Ok(())
    }

    fn push(&mut self, line: u32, offset: usize, length: usize, data: TokenData) {
        self.tokens.push(Token {
            line,
            offset,
            length,
            data,
        });
    }

    fn accept_punctuator(&mut self, line: &str, line_no: u32, pos: usize) -> Option<usize> {
        let rest = &line[pos..];
        let (text, punct) = PUNCTUATORS
            .iter()
            .filter(|(text, _)| rest.starts_with(text))
            .max_by_key(|(text, _)| text.len())?;
        self.push(line_no, pos, text.len(), TokenData::Punctuator(*punct));
        Some(pos + text.len())
    }

    fn accept_identifier_or_keyword(&mut self, line: &str, line_no: u32, pos: usize) -> usize {
        let bytes = line.as_bytes();
        let mut end = pos + 1;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        let lexeme = &line[pos..end];
        let data = if self.options.keyword_as_identifier {
            TokenData::Identifier(lexeme.to_string())
        } else {
            match keyword_for(lexeme) {
                Some(keyword) => TokenData::Keyword(keyword),
                None => TokenData::Identifier(lexeme.to_string()),
            }
        };
        self.push(line_no, pos, end - pos, data);
        end
    }

    fn accept_string_literal(
        &mut self,
        line: &str,
        line_no: u32,
        pos: usize,
        head: u8,
        escapable: bool,
    ) -> Result<usize, ParserError> {
        let bytes = line.as_bytes();
        if !escapable {
            // Content is verbatim up to the closing quote.
            match bytes[pos + 1..].iter().position(|b| *b == head) {
                Some(rel) => {
                    let end = pos + 1 + rel + 1;
                    let value = line[pos + 1..end - 1].to_string();
                    self.push(line_no, pos, end - pos, TokenData::StringLiteral(value));
                    return Ok(end);
                }
                None => {
                    return Err(ParserError::new(
                        line_no,
                        pos,
                        bytes.len() - pos,
                        ParseErrorCode::StringLiteralUnclosed,
                    ));
                }
            }
        }

        let mut value = String::new();
        let mut cursor = pos + 1;
        loop {
            if cursor >= bytes.len() {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    bytes.len() - pos,
                    ParseErrorCode::StringLiteralUnclosed,
                ));
            }
            let next = bytes[cursor];
            cursor += 1;
            if next == head {
                break;
            }
            if next != b'\\' {
                // Copy the character as-is; multi-byte sequences arrive one
                // byte at a time but were validated as UTF-8 already.
                let ch_start = cursor - 1;
                let ch = line[ch_start..].chars().next().unwrap();
                value.push(ch);
                cursor = ch_start + ch.len_utf8();
                continue;
            }
            if cursor >= bytes.len() {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    bytes.len() - pos,
                    ParseErrorCode::EscapeSequenceIncomplete,
                ));
            }
            let escape = bytes[cursor];
            cursor += 1;
            let hex_digits = match escape {
                b'\'' | b'"' | b'\\' | b'?' => {
                    value.push(escape as char);
                    continue;
                }
                b'a' => {
                    value.push('\x07');
                    continue;
                }
                b'b' => {
                    value.push('\x08');
                    continue;
                }
                b'f' => {
                    value.push('\x0C');
                    continue;
                }
                b'n' => {
                    value.push('\n');
                    continue;
                }
                b'r' => {
                    value.push('\r');
                    continue;
                }
                b't' => {
                    value.push('\t');
                    continue;
                }
                b'v' => {
                    value.push('\x0B');
                    continue;
                }
                b'0' => {
                    value.push('\0');
                    continue;
                }
                b'Z' => {
                    value.push('\x1A');
                    continue;
                }
                b'e' => {
                    value.push('\x1B');
                    continue;
                }
                b'x' => 2,
                b'u' => 4,
                b'U' => 6,
                _ => {
                    return Err(ParserError::new(
                        line_no,
                        cursor - 1,
                        1,
                        ParseErrorCode::EscapeSequenceUnknown,
                    ));
                }
            };
            if cursor + hex_digits > bytes.len() {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    bytes.len() - pos,
                    ParseErrorCode::EscapeSequenceIncomplete,
                ));
            }
            let mut code_point: u32 = 0;
            for index in 0..hex_digits {
                let digit = (bytes[cursor + index] as char).to_digit(16).ok_or_else(|| {
                    ParserError::new(
                        line_no,
                        cursor + index,
                        1,
                        ParseErrorCode::EscapeSequenceInvalidHex,
                    )
                })?;
                code_point = code_point * 16 + digit;
            }
            match char::from_u32(code_point) {
                Some(ch) => value.push(ch),
                None => {
                    return Err(ParserError::new(
                        line_no,
                        cursor - 2,
                        hex_digits + 2,
                        ParseErrorCode::EscapeUtfCodePointInvalid,
                    ));
                }
            }
            cursor += hex_digits;
        }
        self.push(line_no, pos, cursor - pos, TokenData::StringLiteral(value));
        Ok(cursor)
    }

    /// Decides whether an immediately preceding `+`/`-` merges into the
    /// numeric literal starting at `offset`. The sign merges iff it is
    /// contiguous on the same line and the token before it would not
    /// terminate an expression.
    fn check_mergeability(&self, line_no: u32, offset: usize) -> Option<bool> {
        let sign = self.tokens.last()?;
        if sign.line != line_no || sign.offset + sign.length != offset {
            return None;
        }
        let negative = match &sign.data {
            TokenData::Punctuator(Punctuator::Add) => false,
            TokenData::Punctuator(Punctuator::Sub) => true,
            _ => return None,
        };
        if self.tokens.len() < 2 {
            return Some(negative);
        }
        let before = &self.tokens[self.tokens.len() - 2];
        let mergeable = match &before.data {
            TokenData::Keyword(keyword) => !matches!(
                keyword,
                Keyword::Null
                    | Keyword::True
                    | Keyword::False
                    | Keyword::Nan
                    | Keyword::Infinity
                    | Keyword::This
            ),
            TokenData::Punctuator(punct) => !matches!(
                punct,
                Punctuator::Inc
                    | Punctuator::Dec
                    | Punctuator::ParenthCl
                    | Punctuator::BracketCl
                    | Punctuator::BraceCl
            ),
            _ => false,
        };
        mergeable.then_some(negative)
    }

    fn accept_numeric_literal(
        &mut self,
        line: &str,
        line_no: u32,
        pos: usize,
    ) -> Result<usize, ParserError> {
        let bytes = line.as_bytes();
        let is_digit = |b: u8, radix: u32| b == b'`' || (b as char).is_digit(radix);

        let merge = self.check_mergeability(line_no, pos);
        let negative = merge == Some(true);

        // Radix prefix.
        let mut radix: u32 = 10;
        let mut cursor = pos;
        if bytes[cursor] == b'0' {
            match bytes.get(cursor + 1) {
                Some(b'b' | b'B') => {
                    radix = 2;
                    cursor += 2;
                }
                Some(b'x' | b'X') => {
                    radix = 16;
                    cursor += 2;
                }
                _ => {}
            }
        }

        // Integral part.
        let intg_start = cursor;
        while cursor < bytes.len() && is_digit(bytes[cursor], radix) {
            cursor += 1;
        }
        if cursor == intg_start {
            return Err(ParserError::new(
                line_no,
                pos,
                cursor - pos + 1,
                ParseErrorCode::NumericLiteralIncomplete,
            ));
        }
        let intg = &line[intg_start..cursor];

        // Fractional part.
        let mut frac: Option<&str> = None;
        if bytes.get(cursor) == Some(&b'.') {
            let frac_start = cursor + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && is_digit(bytes[frac_end], radix) {
                frac_end += 1;
            }
            if frac_end == frac_start {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    frac_end - pos,
                    ParseErrorCode::NumericLiteralIncomplete,
                ));
            }
            frac = Some(&line[frac_start..frac_end]);
            cursor = frac_end;
        }

        // Exponent part. `e` means a power of ten, `p` a power of two.
        let mut exp_base: u32 = 0;
        let mut exp_negative = false;
        let mut exp_digits: &str = "";
        match bytes.get(cursor) {
            Some(b'e' | b'E') if radix != 16 => exp_base = 10,
            Some(b'p' | b'P') => exp_base = 2,
            _ => {}
        }
        if exp_base != 0 {
            cursor += 1;
            match bytes.get(cursor) {
                Some(b'+') => cursor += 1,
                Some(b'-') => {
                    exp_negative = true;
                    cursor += 1;
                }
                _ => {}
            }
            let exp_start = cursor;
            while cursor < bytes.len() && is_digit(bytes[cursor], 10) {
                cursor += 1;
            }
            if cursor == exp_start {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    cursor - pos + 1,
                    ParseErrorCode::NumericLiteralIncomplete,
                ));
            }
            exp_digits = &line[exp_start..cursor];
        }

        // Alphabetic suffixes are reserved.
        if cursor < bytes.len() && (bytes[cursor].is_ascii_alphabetic() || bytes[cursor] == b'_') {
            return Err(ParserError::new(
                line_no,
                cursor,
                1,
                ParseErrorCode::NumericLiteralSuffixDisallowed,
            ));
        }

        let mut exponent: i32 = 0;
        for b in exp_digits.bytes().filter(|b| *b != b'`') {
            let digit = (b - b'0') as i32;
            if exponent > (i32::MAX - digit) / 10 {
                return Err(ParserError::new(
                    line_no,
                    pos,
                    cursor - pos,
                    ParseErrorCode::NumericLiteralExponentOverflow,
                ));
            }
            exponent = exponent * 10 + digit;
        }
        if exp_negative {
            exponent = -exponent;
        }

        let (start, length) = match merge {
            Some(_) => {
                let sign = self.tokens.pop().unwrap();
                (sign.offset, cursor - sign.offset)
            }
            None => (pos, cursor - pos),
        };

        if !self.options.integer_as_real && frac.is_none() {
            // Integer literal. The bound admits `0x1p63`, which is valid
            // only when a contiguous minus merges into the literal.
            if exponent < 0 {
                return Err(ParserError::new(
                    line_no,
                    start,
                    length,
                    ParseErrorCode::IntegerLiteralExponentNegative,
                ));
            }
            let overflow =
                || ParserError::new(line_no, start, length, ParseErrorCode::IntegerLiteralOverflow);
            let mut value: u64 = 0;
            for b in intg.bytes().filter(|b| *b != b'`') {
                let digit = (b as char).to_digit(radix).unwrap() as u64;
                if value > (0x8000_0000_0000_0000 - digit) / radix as u64 {
                    return Err(overflow());
                }
                value = value * radix as u64 + digit;
            }
            if value != 0 && exp_base >= 2 {
                for _ in 0..exponent {
                    if value > 0x8000_0000_0000_0000 / exp_base as u64 {
                        return Err(overflow());
                    }
                    value *= exp_base as u64;
                }
            }
            if value == 0x8000_0000_0000_0000 && !negative {
                return Err(overflow());
            }
            if negative {
                value = value.wrapping_neg();
            }
            self.push(
                line_no,
                start,
                length,
                TokenData::IntegerLiteral(value as i64),
            );
            return Ok(cursor);
        }

        // Real literal.
        let mut significant_zero = true;
        let mut value: f64 = 0.0;
        for b in intg.bytes().filter(|b| *b != b'`') {
            let digit = (b as char).to_digit(radix).unwrap();
            value = value * radix as f64 + digit as f64;
            significant_zero &= digit == 0;
        }
        let mut frac_value: f64 = 0.0;
        if let Some(frac) = frac {
            for b in frac.bytes().rev().filter(|b| *b != b'`') {
                let digit = (b as char).to_digit(radix).unwrap();
                frac_value = (frac_value + digit as f64) / radix as f64;
                significant_zero &= digit == 0;
            }
        }
        value += frac_value;
        match exp_base {
            2 => value *= (2.0f64).powi(exponent),
            10 => value *= (10.0f64).powi(exponent),
            _ => {}
        }
        if value.is_infinite() {
            return Err(ParserError::new(
                line_no,
                start,
                length,
                ParseErrorCode::RealLiteralOverflow,
            ));
        }
        if value == 0.0 && !significant_zero {
            return Err(ParserError::new(
                line_no,
                start,
                length,
                ParseErrorCode::RealLiteralUnderflow,
            ));
        }
        if negative {
            value = -value;
        }
        self.push(line_no, start, length, TokenData::RealLiteral(value));
        Ok(cursor)
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source, &ParserOptions::default()).expect("source should tokenize")
    }

    #[test]
    fn longest_match_wins_for_punctuators() {
        let tokens = lex("<<<=");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_punctuator(Punctuator::SllEq));
    }

    #[test]
    fn keywords_demote_to_identifiers_on_request() {
        let options = ParserOptions {
            keyword_as_identifier: true,
            ..Default::default()
        };
        let tokens = tokenize("while", &options).unwrap();
        assert_eq!(tokens[0].data, TokenData::Identifier("while".into()));
    }

    #[test]
    fn block_comment_unclosed_points_at_opener() {
        let err = tokenize("var x;\n/* comment\nmore", &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::BlockCommentUnclosed);
        assert_eq!(err.line, 2);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn hex_fraction_and_binary_exponent() {
        let tokens = lex("0x1.8p2");
        assert_eq!(tokens[0].data, TokenData::RealLiteral(6.0));
    }

    #[test]
    fn digit_separators_are_tolerated() {
        let tokens = lex("1`000`000");
        assert_eq!(tokens[0].data, TokenData::IntegerLiteral(1_000_000));
    }

    #[test]
    fn numeric_suffixes_are_reserved() {
        let err = tokenize("123abc", &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::NumericLiteralSuffixDisallowed);
    }

    #[test]
    fn single_quotes_are_verbatim_by_default() {
        let tokens = lex(r"'a\n'");
        assert_eq!(tokens[0].data, TokenData::StringLiteral("a\\n".into()));

        let options = ParserOptions {
            escapable_single_quote_string: true,
            ..Default::default()
        };
        let tokens = tokenize(r"'a\n'", &options).unwrap();
        assert_eq!(tokens[0].data, TokenData::StringLiteral("a\n".into()));
    }

    #[test]
    fn unicode_escapes_encode_utf8() {
        let tokens = lex(r#""中\U01F600""#);
        assert_eq!(
            tokens[0].data,
            TokenData::StringLiteral("\u{4E2D}\u{1F600}".into())
        );

        let err = tokenize(r#""\UD800AB""#, &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::EscapeUtfCodePointInvalid);
    }

    #[test]
    fn shebang_line_is_discarded() {
        let tokens = lex("#!/usr/bin/env asteria\nvar x;");
        assert_eq!(tokens[0].data, TokenData::Keyword(Keyword::Var));
        assert_eq!(tokens[0].line, 2);
    }
}
