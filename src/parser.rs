use crate::{
    ast::{
        BinaryOp, BreakTarget, ContinueTarget, Expr, ExprKind, Literal, ShortCircuitOp, Stmt,
        StmtKind, SwitchClause, UnaryOp,
    },
    diagnostics::{ParseErrorCode, ParserError, SourceLocation},
    lexer::{tokenize, Keyword, ParserOptions, Punctuator, Token, TokenData},
};

/// Parses source text into a statement tree.
pub fn parse_program(source: &str, options: &ParserOptions) -> Result<Vec<Stmt>, ParserError> {
    let tokens = tokenize(source, options)?;
    Parser::new(tokens).parse_program()
}

/// Parses an already-tokenized stream.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<Stmt>, ParserError> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, ParserError> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    // ---- token plumbing ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.current);
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn sloc(&self) -> SourceLocation {
        match self.peek() {
            Some(token) => SourceLocation::new(token.line, token.offset),
            None => self
                .tokens
                .last()
                .map(|token| SourceLocation::new(token.line, token.offset + token.length))
                .unwrap_or_default(),
        }
    }

    fn error(&self, code: ParseErrorCode) -> ParserError {
        match self.peek() {
            Some(token) => ParserError::new(token.line, token.offset, token.length, code),
            None => {
                let sloc = self.sloc();
                ParserError::new(sloc.line, sloc.offset, 0, code)
            }
        }
    }

    fn check_punct(&self, punct: Punctuator) -> bool {
        self.peek().is_some_and(|token| token.is_punctuator(punct))
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek()
            .is_some_and(|token| token.as_keyword() == Some(keyword))
    }

    fn match_punct(&mut self, punct: Punctuator) -> bool {
        if self.check_punct(punct) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: Punctuator, code: ParseErrorCode) -> Result<(), ParserError> {
        if self.match_punct(punct) {
            Ok(())
        } else {
            Err(self.error(code))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), ParserError> {
        self.expect_punct(Punctuator::Semicolon, ParseErrorCode::SemicolonExpected)
    }

    fn expect_identifier(&mut self) -> Result<String, ParserError> {
        match self.peek().map(|token| token.data.clone()) {
            Some(TokenData::Identifier(name)) => {
                self.current += 1;
                Ok(name)
            }
            _ => Err(self.error(ParseErrorCode::IdentifierExpected)),
        }
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        let Some(token) = self.peek() else {
            return Err(self.error(ParseErrorCode::StatementExpected));
        };
        match &token.data {
            TokenData::Keyword(Keyword::Var) => self.parse_var(false),
            TokenData::Keyword(Keyword::Const) => self.parse_var(true),
            TokenData::Keyword(Keyword::Func) => self.parse_func(),
            TokenData::Keyword(Keyword::If) => self.parse_if(),
            TokenData::Keyword(Keyword::Switch) => self.parse_switch(),
            TokenData::Keyword(Keyword::Do) => self.parse_do_while(),
            TokenData::Keyword(Keyword::While) => self.parse_while(),
            TokenData::Keyword(Keyword::For) => self.parse_for(),
            TokenData::Keyword(Keyword::Break) => {
                self.current += 1;
                let target = if self.match_keyword(Keyword::While) {
                    BreakTarget::While
                } else if self.match_keyword(Keyword::For) {
                    BreakTarget::For
                } else if self.match_keyword(Keyword::Switch) {
                    BreakTarget::Switch
                } else {
                    BreakTarget::Unspec
                };
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Break(target),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Continue) => {
                self.current += 1;
                let target = if self.match_keyword(Keyword::While) {
                    ContinueTarget::While
                } else if self.match_keyword(Keyword::For) {
                    ContinueTarget::For
                } else {
                    ContinueTarget::Unspec
                };
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Continue(target),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Throw) => {
                self.current += 1;
                let value = self.parse_expression()?;
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Throw(value),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Return) => {
                self.current += 1;
                let value = if self.check_punct(Punctuator::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Try) => self.parse_try(),
            TokenData::Keyword(Keyword::Defer) => {
                self.current += 1;
                let body = self.parse_statement()?;
                Ok(Stmt {
                    kind: StmtKind::Defer(Box::new(body)),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Assert) => {
                self.current += 1;
                let cond = self.parse_expression()?;
                let message = if self.match_punct(Punctuator::Colon) {
                    match self.advance().map(|token| token.data.clone()) {
                        Some(TokenData::StringLiteral(text)) => Some(text),
                        _ => return Err(self.error(ParseErrorCode::ExpressionExpected)),
                    }
                } else {
                    None
                };
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Assert { cond, message },
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::BraceOp) => {
                let body = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(body),
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::Semicolon) => {
                self.current += 1;
                Ok(Stmt {
                    kind: StmtKind::Block(Vec::new()),
                    sloc,
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon()?;
                Ok(Stmt {
                    kind: StmtKind::Expr(expr),
                    sloc,
                })
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParserError> {
        self.expect_punct(Punctuator::BraceOp, ParseErrorCode::StatementExpected)?;
        let mut statements = Vec::new();
        while !self.check_punct(Punctuator::BraceCl) {
            if self.peek().is_none() {
                return Err(self.error(ParseErrorCode::ClosingBraceExpected));
            }
            statements.push(self.parse_statement()?);
        }
        self.current += 1;
        Ok(statements)
    }

    fn parse_var(&mut self, immutable: bool) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let initializer = if self.match_punct(Punctuator::Assign) {
                Some(self.parse_expression()?)
            } else if immutable {
                // Constants must be initialized at declaration.
                return Err(self.error(ParseErrorCode::ExpressionExpected));
            } else {
                None
            };
            decls.push((name, initializer));
            if !self.match_punct(Punctuator::Comma) {
                break;
            }
        }
        self.expect_semicolon()?;
        Ok(Stmt {
            kind: StmtKind::Vars { immutable, decls },
            sloc,
        })
    }

    fn parse_param_list(&mut self) -> Result<Vec<String>, ParserError> {
        self.expect_punct(
            Punctuator::ParenthOp,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        let mut params = Vec::new();
        if !self.check_punct(Punctuator::ParenthCl) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.match_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(
            Punctuator::ParenthCl,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        Ok(params)
    }

    fn parse_func(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let name = self.expect_identifier()?;
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::Func { name, params, body },
            sloc,
        })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParserError> {
        self.expect_punct(
            Punctuator::ParenthOp,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        let expr = self.parse_expression()?;
        self.expect_punct(
            Punctuator::ParenthCl,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let cond = self.parse_paren_expr()?;
        let branch_true = self.parse_block()?;
        let branch_false = if self.match_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                let nested = self.parse_if()?;
                Some(vec![nested])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                branch_true,
                branch_false,
            },
            sloc,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let subject = self.parse_paren_expr()?;
        self.expect_punct(Punctuator::BraceOp, ParseErrorCode::StatementExpected)?;
        let mut clauses: Vec<SwitchClause> = Vec::new();
        let mut seen_default = false;
        while !self.check_punct(Punctuator::BraceCl) {
            let label = if self.match_keyword(Keyword::Case) {
                let expr = self.parse_expression()?;
                self.expect_punct(Punctuator::Colon, ParseErrorCode::ColonExpected)?;
                Some(expr)
            } else if self.match_keyword(Keyword::Default) {
                if seen_default {
                    return Err(self.error(ParseErrorCode::DuplicateSwitchDefault));
                }
                seen_default = true;
                self.expect_punct(Punctuator::Colon, ParseErrorCode::ColonExpected)?;
                None
            } else {
                return Err(self.error(ParseErrorCode::KeywordUnexpected));
            };
            let mut body = Vec::new();
            while !self.check_punct(Punctuator::BraceCl)
                && !self.check_keyword(Keyword::Case)
                && !self.check_keyword(Keyword::Default)
            {
                if self.peek().is_none() {
                    return Err(self.error(ParseErrorCode::ClosingBraceExpected));
                }
                body.push(self.parse_statement()?);
            }
            clauses.push(SwitchClause { label, body });
        }
        self.current += 1;
        Ok(Stmt {
            kind: StmtKind::Switch { subject, clauses },
            sloc,
        })
    }

    fn parse_do_while(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let body = self.parse_block()?;
        if !self.match_keyword(Keyword::While) {
            return Err(self.error(ParseErrorCode::KeywordUnexpected));
        }
        let cond = self.parse_paren_expr()?;
        self.expect_semicolon()?;
        Ok(Stmt {
            kind: StmtKind::DoWhile { body, cond },
            sloc,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let cond = self.parse_paren_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            sloc,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        self.expect_punct(
            Punctuator::ParenthOp,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;

        if self.match_keyword(Keyword::Each) {
            // for(each k, v : range) — with a single name, it binds values.
            let first = self.expect_identifier()?;
            let (key, value) = if self.match_punct(Punctuator::Comma) {
                let second = self.expect_identifier()?;
                (Some(first), second)
            } else {
                (None, first)
            };
            self.expect_punct(Punctuator::Colon, ParseErrorCode::ColonExpected)?;
            let range = self.parse_expression()?;
            self.expect_punct(
                Punctuator::ParenthCl,
                ParseErrorCode::ClosingParenthesisExpected,
            )?;
            let body = self.parse_block()?;
            return Ok(Stmt {
                kind: StmtKind::ForEach {
                    key,
                    value,
                    range,
                    body,
                },
                sloc,
            });
        }

        let init = if self.match_punct(Punctuator::Semicolon) {
            None
        } else if self.check_keyword(Keyword::Var) {
            Some(Box::new(self.parse_var(false)?))
        } else {
            let expr_sloc = self.sloc();
            let expr = self.parse_expression()?;
            self.expect_semicolon()?;
            Some(Box::new(Stmt {
                kind: StmtKind::Expr(expr),
                sloc: expr_sloc,
            }))
        };
        let cond = if self.check_punct(Punctuator::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;
        let step = if self.check_punct(Punctuator::ParenthCl) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(
            Punctuator::ParenthCl,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::For {
                init,
                cond,
                step,
                body,
            },
            sloc,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParserError> {
        let sloc = self.sloc();
        self.current += 1;
        let body = self.parse_block()?;
        if !self.match_keyword(Keyword::Catch) {
            return Err(self.error(ParseErrorCode::KeywordUnexpected));
        }
        self.expect_punct(
            Punctuator::ParenthOp,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        let name = self.expect_identifier()?;
        self.expect_punct(
            Punctuator::ParenthCl,
            ParseErrorCode::ClosingParenthesisExpected,
        )?;
        let handler = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::TryCatch {
                body,
                name,
                handler,
            },
            sloc,
        })
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParserError> {
        let target = self.parse_ternary()?;
        let sloc = self.sloc();
        let Some(token) = self.peek() else {
            return Ok(target);
        };
        let make = |kind: ExprKind| Expr { kind, sloc };
        let compound = |op: BinaryOp| Some(op);
        let op = match &token.data {
            TokenData::Punctuator(Punctuator::Assign) => None,
            TokenData::Punctuator(Punctuator::AddEq) => compound(BinaryOp::Add),
            TokenData::Punctuator(Punctuator::SubEq) => compound(BinaryOp::Sub),
            TokenData::Punctuator(Punctuator::MulEq) => compound(BinaryOp::Mul),
            TokenData::Punctuator(Punctuator::DivEq) => compound(BinaryOp::Div),
            TokenData::Punctuator(Punctuator::ModEq) => compound(BinaryOp::Mod),
            TokenData::Punctuator(Punctuator::SlaEq) => compound(BinaryOp::ShiftLeftArith),
            TokenData::Punctuator(Punctuator::SraEq) => compound(BinaryOp::ShiftRightArith),
            TokenData::Punctuator(Punctuator::SllEq) => compound(BinaryOp::ShiftLeftLogical),
            TokenData::Punctuator(Punctuator::SrlEq) => compound(BinaryOp::ShiftRightLogical),
            TokenData::Punctuator(Punctuator::AndbEq) => compound(BinaryOp::AndBitwise),
            TokenData::Punctuator(Punctuator::OrbEq) => compound(BinaryOp::OrBitwise),
            TokenData::Punctuator(Punctuator::XorbEq) => compound(BinaryOp::XorBitwise),
            TokenData::Punctuator(Punctuator::AndlEq) => {
                self.current += 1;
                let value = self.parse_assignment()?;
                return Ok(make(ExprKind::ShortCircuitAssign {
                    op: ShortCircuitOp::And,
                    target: Box::new(target),
                    value: Box::new(value),
                }));
            }
            TokenData::Punctuator(Punctuator::OrlEq) => {
                self.current += 1;
                let value = self.parse_assignment()?;
                return Ok(make(ExprKind::ShortCircuitAssign {
                    op: ShortCircuitOp::Or,
                    target: Box::new(target),
                    value: Box::new(value),
                }));
            }
            TokenData::Punctuator(Punctuator::CoalesEq) => {
                self.current += 1;
                let value = self.parse_assignment()?;
                return Ok(make(ExprKind::ShortCircuitAssign {
                    op: ShortCircuitOp::Coalesce,
                    target: Box::new(target),
                    value: Box::new(value),
                }));
            }
            _ => return Ok(target),
        };
        self.current += 1;
        let value = self.parse_assignment()?;
        match op {
            None => Ok(make(ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            })),
            Some(op) => Ok(make(ExprKind::CompoundAssign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            })),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParserError> {
        let cond = self.parse_coalesce()?;
        if !self.check_punct(Punctuator::Quest) {
            return Ok(cond);
        }
        let sloc = self.sloc();
        self.current += 1;
        let branch_true = self.parse_expression()?;
        self.expect_punct(Punctuator::Colon, ParseErrorCode::ColonExpected)?;
        let branch_false = self.parse_ternary()?;
        Ok(Expr {
            kind: ExprKind::Ternary {
                cond: Box::new(cond),
                branch_true: Box::new(branch_true),
                branch_false: Box::new(branch_false),
            },
            sloc,
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_logical_or()?;
        while self.check_punct(Punctuator::Coales) {
            let sloc = self.sloc();
            self.current += 1;
            let rhs = self.parse_logical_or()?;
            lhs = Expr {
                kind: ExprKind::ShortCircuit {
                    op: ShortCircuitOp::Coalesce,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                sloc,
            };
        }
        Ok(lhs)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_logical_and()?;
        while self.check_punct(Punctuator::Orl) || self.check_keyword(Keyword::Or) {
            let sloc = self.sloc();
            self.current += 1;
            let rhs = self.parse_logical_and()?;
            lhs = Expr {
                kind: ExprKind::ShortCircuit {
                    op: ShortCircuitOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                sloc,
            };
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_bitwise_or()?;
        while self.check_punct(Punctuator::Andl) || self.check_keyword(Keyword::And) {
            let sloc = self.sloc();
            self.current += 1;
            let rhs = self.parse_bitwise_or()?;
            lhs = Expr {
                kind: ExprKind::ShortCircuit {
                    op: ShortCircuitOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                sloc,
            };
        }
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ParserError>,
        classify: fn(&TokenData) -> Option<BinaryOp>,
    ) -> Result<Expr, ParserError> {
        let mut lhs = next(self)?;
        loop {
            let Some(op) = self.peek().and_then(|token| classify(&token.data)) else {
                return Ok(lhs);
            };
            let sloc = self.sloc();
            self.current += 1;
            let rhs = next(self)?;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                sloc,
            };
        }
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_bitwise_xor, |data| match data {
            TokenData::Punctuator(Punctuator::Orb) => Some(BinaryOp::OrBitwise),
            _ => None,
        })
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_bitwise_and, |data| match data {
            TokenData::Punctuator(Punctuator::Xorb) => Some(BinaryOp::XorBitwise),
            _ => None,
        })
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_equality, |data| match data {
            TokenData::Punctuator(Punctuator::Andb) => Some(BinaryOp::AndBitwise),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_relational, |data| match data {
            TokenData::Punctuator(Punctuator::CmpEq) => Some(BinaryOp::CmpEq),
            TokenData::Punctuator(Punctuator::CmpNe) => Some(BinaryOp::CmpNe),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_shift, |data| match data {
            TokenData::Punctuator(Punctuator::CmpLt) => Some(BinaryOp::CmpLt),
            TokenData::Punctuator(Punctuator::CmpLte) => Some(BinaryOp::CmpLte),
            TokenData::Punctuator(Punctuator::CmpGt) => Some(BinaryOp::CmpGt),
            TokenData::Punctuator(Punctuator::CmpGte) => Some(BinaryOp::CmpGte),
            TokenData::Punctuator(Punctuator::Spaceship) => Some(BinaryOp::Spaceship),
            _ => None,
        })
    }

    fn parse_shift(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_additive, |data| match data {
            TokenData::Punctuator(Punctuator::Sla) => Some(BinaryOp::ShiftLeftArith),
            TokenData::Punctuator(Punctuator::Sra) => Some(BinaryOp::ShiftRightArith),
            TokenData::Punctuator(Punctuator::Sll) => Some(BinaryOp::ShiftLeftLogical),
            TokenData::Punctuator(Punctuator::Srl) => Some(BinaryOp::ShiftRightLogical),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_multiplicative, |data| match data {
            TokenData::Punctuator(Punctuator::Add) => Some(BinaryOp::Add),
            TokenData::Punctuator(Punctuator::Sub) => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParserError> {
        self.binary_level(Self::parse_prefix, |data| match data {
            TokenData::Punctuator(Punctuator::Mul) => Some(BinaryOp::Mul),
            TokenData::Punctuator(Punctuator::Div) => Some(BinaryOp::Div),
            TokenData::Punctuator(Punctuator::Mod) => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParserError> {
        let sloc = self.sloc();
        let Some(token) = self.peek() else {
            return Err(self.error(ParseErrorCode::ExpressionExpected));
        };
        let unary = |parser: &mut Self, op: UnaryOp| -> Result<Expr, ParserError> {
            parser.current += 1;
            let expr = parser.parse_prefix()?;
            Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                sloc,
            })
        };
        match &token.data {
            TokenData::Punctuator(Punctuator::Add) => unary(self, UnaryOp::Pos),
            TokenData::Punctuator(Punctuator::Sub) => unary(self, UnaryOp::Neg),
            TokenData::Punctuator(Punctuator::Notl) => unary(self, UnaryOp::NotLogical),
            TokenData::Keyword(Keyword::Not) => unary(self, UnaryOp::NotLogical),
            TokenData::Punctuator(Punctuator::Notb) => unary(self, UnaryOp::NotBitwise),
            TokenData::Keyword(Keyword::Typeof) => unary(self, UnaryOp::Typeof),
            TokenData::Keyword(Keyword::Lengthof) => unary(self, UnaryOp::Lengthof),
            TokenData::Keyword(Keyword::Unset) => {
                self.current += 1;
                let target = self.parse_prefix()?;
                Ok(Expr {
                    kind: ExprKind::Unset(Box::new(target)),
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::Inc) => {
                self.current += 1;
                let target = self.parse_prefix()?;
                Ok(Expr {
                    kind: ExprKind::PrefixIncDec {
                        increment: true,
                        target: Box::new(target),
                    },
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::Dec) => {
                self.current += 1;
                let target = self.parse_prefix()?;
                Ok(Expr {
                    kind: ExprKind::PrefixIncDec {
                        increment: false,
                        target: Box::new(target),
                    },
                    sloc,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.parse_primary()?;
        loop {
            let sloc = self.sloc();
            if self.match_punct(Punctuator::ParenthOp) {
                let mut args = Vec::new();
                if !self.check_punct(Punctuator::ParenthCl) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.match_punct(Punctuator::Comma) {
                            break;
                        }
                    }
                }
                self.expect_punct(
                    Punctuator::ParenthCl,
                    ParseErrorCode::ClosingParenthesisExpected,
                )?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    sloc,
                };
            } else if self.match_punct(Punctuator::BracketOp) {
                let index = self.parse_expression()?;
                self.expect_punct(
                    Punctuator::BracketCl,
                    ParseErrorCode::ClosingBracketExpected,
                )?;
                expr = Expr {
                    kind: ExprKind::Subscript {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    sloc,
                };
            } else if self.match_punct(Punctuator::Dot) {
                let key = self.expect_identifier()?;
                expr = Expr {
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        key,
                    },
                    sloc,
                };
            } else if self.match_punct(Punctuator::Inc) {
                expr = Expr {
                    kind: ExprKind::PostfixIncDec {
                        increment: true,
                        target: Box::new(expr),
                    },
                    sloc,
                };
            } else if self.match_punct(Punctuator::Dec) {
                expr = Expr {
                    kind: ExprKind::PostfixIncDec {
                        increment: false,
                        target: Box::new(expr),
                    },
                    sloc,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let sloc = self.sloc();
        let Some(token) = self.peek().cloned() else {
            return Err(self.error(ParseErrorCode::ExpressionExpected));
        };
        let literal = |parser: &mut Self, literal: Literal| -> Result<Expr, ParserError> {
            parser.current += 1;
            Ok(Expr {
                kind: ExprKind::Literal(literal),
                sloc,
            })
        };
        match token.data {
            TokenData::Keyword(Keyword::Null) => literal(self, Literal::Null),
            TokenData::Keyword(Keyword::True) => literal(self, Literal::Boolean(true)),
            TokenData::Keyword(Keyword::False) => literal(self, Literal::Boolean(false)),
            TokenData::Keyword(Keyword::Nan) => literal(self, Literal::Real(f64::NAN)),
            TokenData::Keyword(Keyword::Infinity) => literal(self, Literal::Real(f64::INFINITY)),
            TokenData::Keyword(Keyword::This) => {
                self.current += 1;
                Ok(Expr {
                    kind: ExprKind::This,
                    sloc,
                })
            }
            TokenData::IntegerLiteral(value) => literal(self, Literal::Integer(value)),
            TokenData::RealLiteral(value) => literal(self, Literal::Real(value)),
            TokenData::StringLiteral(text) => literal(self, Literal::String(text)),
            TokenData::Identifier(name) => {
                self.current += 1;
                Ok(Expr {
                    kind: ExprKind::Named(name),
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::ParenthOp) => {
                self.current += 1;
                let inner = self.parse_expression()?;
                self.expect_punct(
                    Punctuator::ParenthCl,
                    ParseErrorCode::ClosingParenthesisExpected,
                )?;
                Ok(inner)
            }
            TokenData::Punctuator(Punctuator::BracketOp) => {
                self.current += 1;
                let mut elements = Vec::new();
                if !self.check_punct(Punctuator::BracketCl) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.match_punct(Punctuator::Comma) {
                            break;
                        }
                        // A trailing comma closes the literal.
                        if self.check_punct(Punctuator::BracketCl) {
                            break;
                        }
                    }
                }
                self.expect_punct(
                    Punctuator::BracketCl,
                    ParseErrorCode::ClosingBracketExpected,
                )?;
                Ok(Expr {
                    kind: ExprKind::ArrayLiteral(elements),
                    sloc,
                })
            }
            TokenData::Punctuator(Punctuator::BraceOp) => {
                self.current += 1;
                let mut entries: Vec<(String, Expr)> = Vec::new();
                if !self.check_punct(Punctuator::BraceCl) {
                    loop {
                        let key = match self.advance().map(|token| token.data.clone()) {
                            Some(TokenData::Identifier(name)) => name,
                            Some(TokenData::StringLiteral(text)) => text,
                            _ => return Err(self.error(ParseErrorCode::IdentifierExpected)),
                        };
                        if entries.iter().any(|(existing, _)| *existing == key) {
                            return Err(self.error(ParseErrorCode::DuplicateObjectKey));
                        }
                        self.expect_punct(Punctuator::Colon, ParseErrorCode::ColonExpected)?;
                        let value = self.parse_expression()?;
                        entries.push((key, value));
                        if !self.match_punct(Punctuator::Comma) {
                            break;
                        }
                        if self.check_punct(Punctuator::BraceCl) {
                            break;
                        }
                    }
                }
                self.expect_punct(Punctuator::BraceCl, ParseErrorCode::ClosingBraceExpected)?;
                Ok(Expr {
                    kind: ExprKind::ObjectLiteral(entries),
                    sloc,
                })
            }
            TokenData::Keyword(Keyword::Func) => {
                self.current += 1;
                let params = self.parse_param_list()?;
                let body = self.parse_block()?;
                Ok(Expr {
                    kind: ExprKind::Closure { params, body },
                    sloc,
                })
            }
            TokenData::Keyword(_) => Err(self.error(ParseErrorCode::KeywordUnexpected)),
            _ => Err(self.error(ParseErrorCode::ExpressionExpected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Stmt> {
        parse_program(source, &ParserOptions::default()).expect("source should parse")
    }

    #[test]
    fn parses_variable_declarations() {
        let program = parse("var a = 1, b; const c = 2;");
        assert_eq!(program.len(), 2);
        match &program[0].kind {
            StmtKind::Vars { immutable, decls } => {
                assert!(!immutable);
                assert_eq!(decls.len(), 2);
                assert!(decls[1].1.is_none());
            }
            other => panic!("expected Vars, found {other:?}"),
        }
    }

    #[test]
    fn const_requires_initializer() {
        let err = parse_program("const c;", &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::ExpressionExpected);
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse("a = b = 1;");
        let StmtKind::Expr(expr) = &program[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { value, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn parses_switch_with_fallthrough_clauses() {
        let program = parse(
            r#"
            switch(x) {
            case 1:
                y = 1;
            case 2:
            default:
                y = 2;
            }
            "#,
        );
        let StmtKind::Switch { clauses, .. } = &program[0].kind else {
            panic!("expected switch");
        };
        assert_eq!(clauses.len(), 3);
        assert!(clauses[2].label.is_none());
    }

    #[test]
    fn rejects_duplicate_default_clauses() {
        let err = parse_program(
            "switch(x) { default: default: }",
            &ParserOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ParseErrorCode::DuplicateSwitchDefault);
    }

    #[test]
    fn member_call_binds_tighter_than_unary() {
        let program = parse("return -a.b(1)[2];");
        let StmtKind::Return(Some(expr)) = &program[0].kind else {
            panic!("expected return statement");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }
}
