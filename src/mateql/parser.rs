//! Recursive-descent parser over the token stream.

use super::lexer::{tokenize, SpannedToken, Token};
use super::{
    AggregateModifier, AggregateModifierOp, AggregationExpr, BinaryExpr, BinaryOp, DurationExpr,
    Expr, FunctionExpr, GroupModifier, GroupModifierOp, JoinModifier, JoinModifierOp, LabelFilter,
    MetricExpr, ParseError, RollupExpr,
};

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "any",
    "avg",
    "bottomk",
    "count",
    "count_values",
    "distinct",
    "geomean",
    "group",
    "histogram",
    "limitk",
    "max",
    "median",
    "min",
    "mode",
    "quantile",
    "quantiles",
    "stddev",
    "stdvar",
    "sum",
    "sum2",
    "topk",
    "zscore",
];

fn is_aggregate_func(name: &str) -> bool {
    AGGREGATE_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

/// Parse a query into its expression tree.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr(0)?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(word)) = self.peek() {
            if word.eq_ignore_ascii_case(keyword) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some((pos, token)) => Err(ParseError::UnexpectedToken {
                found: token.describe(),
                pos: *pos,
                expected: "end of query",
            }),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((pos, token)) => ParseError::UnexpectedToken {
                found: token.describe(),
                pos: *pos,
                expected,
            },
            None => ParseError::UnexpectedEof { expected },
        }
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_postfix()?;
        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let bool_modifier = op.is_comparison() && self.eat_keyword("bool");
            let group_modifier = self.parse_group_modifier()?;
            let join_modifier = self.parse_join_modifier()?;
            let next_min = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_expr(next_min)?;
            left = Expr::Binary(BinaryExpr {
                op,
                bool_modifier,
                group_modifier,
                join_modifier,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        match self.peek()? {
            Token::Op("+") => Some(BinaryOp::Add),
            Token::Op("-") => Some(BinaryOp::Sub),
            Token::Op("*") => Some(BinaryOp::Mul),
            Token::Op("/") => Some(BinaryOp::Div),
            Token::Op("%") => Some(BinaryOp::Mod),
            Token::Op("^") => Some(BinaryOp::Pow),
            Token::Op("==") => Some(BinaryOp::Eql),
            Token::Op("!=") => Some(BinaryOp::Neq),
            Token::Op(">") => Some(BinaryOp::Gt),
            Token::Op("<") => Some(BinaryOp::Lt),
            Token::Op(">=") => Some(BinaryOp::Gte),
            Token::Op("<=") => Some(BinaryOp::Lte),
            Token::Ident(word) if word.eq_ignore_ascii_case("and") => Some(BinaryOp::And),
            Token::Ident(word) if word.eq_ignore_ascii_case("or") => Some(BinaryOp::Or),
            Token::Ident(word) if word.eq_ignore_ascii_case("unless") => Some(BinaryOp::Unless),
            _ => None,
        }
    }

    fn parse_group_modifier(&mut self) -> Result<Option<GroupModifier>, ParseError> {
        let op = if self.peek_keyword("on") {
            GroupModifierOp::On
        } else if self.peek_keyword("ignoring") {
            GroupModifierOp::Ignoring
        } else {
            return Ok(None);
        };
        self.pos += 1;
        let labels = self.parse_label_list()?;
        Ok(Some(GroupModifier { op, labels }))
    }

    fn parse_join_modifier(&mut self) -> Result<Option<JoinModifier>, ParseError> {
        let op = if self.peek_keyword("group_left") {
            JoinModifierOp::GroupLeft
        } else if self.peek_keyword("group_right") {
            JoinModifierOp::GroupRight
        } else {
            return Ok(None);
        };
        self.pos += 1;
        let labels = if self.peek() == Some(&Token::LeftParen) {
            self.parse_label_list()?
        } else {
            Vec::new()
        };
        Ok(Some(JoinModifier { op, labels }))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::LeftBracket) {
                let window = self.parse_duration()?;
                let step = if self.eat(&Token::Colon) {
                    Some(self.parse_duration()?)
                } else {
                    None
                };
                self.expect(&Token::RightBracket, "']'")?;
                expr = Expr::Rollup(RollupExpr {
                    expr: Box::new(expr),
                    window: Some(window),
                    step,
                    offset: None,
                });
            } else if self.eat_keyword("offset") {
                let offset = self.parse_duration()?;
                expr = match expr {
                    Expr::Rollup(mut rollup) => {
                        rollup.offset = Some(offset);
                        Expr::Rollup(rollup)
                    }
                    other => Expr::Rollup(RollupExpr {
                        expr: Box::new(other),
                        window: None,
                        step: None,
                        offset: Some(offset),
                    }),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_duration(&mut self) -> Result<DurationExpr, ParseError> {
        let negative = self.eat(&Token::Op("-"));
        let text = match self.peek() {
            Some(Token::Duration(text)) => text.clone(),
            Some(Token::Number(n)) => Expr::Number(*n).to_string(),
            _ => return Err(self.unexpected("a duration")),
        };
        self.pos += 1;
        Ok(DurationExpr {
            text: if negative { format!("-{text}") } else { text },
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::LeftParen) => {
                self.pos += 1;
                let list = self.parse_expr_list(Token::RightParen)?;
                Ok(Expr::Parens(list))
            }
            Some(Token::LeftBrace) => {
                self.pos += 1;
                let filters = self.parse_label_filters()?;
                Ok(Expr::Metric(MetricExpr {
                    label_filters: filters,
                }))
            }
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::StringLit(_)) => {
                if let Some(Token::StringLit(s)) = self.advance() {
                    Ok(Expr::StringLiteral(s))
                } else {
                    unreachable!()
                }
            }
            Some(Token::Duration(_)) => {
                if let Some(Token::Duration(text)) = self.advance() {
                    Ok(Expr::Duration(DurationExpr { text }))
                } else {
                    unreachable!()
                }
            }
            Some(Token::Op("+")) => {
                self.pos += 1;
                self.parse_primary()
            }
            Some(Token::Op("-")) => {
                self.pos += 1;
                match self.parse_primary()? {
                    Expr::Number(n) => Ok(Expr::Number(-n)),
                    other => Ok(Expr::Binary(BinaryExpr {
                        op: BinaryOp::Sub,
                        bool_modifier: false,
                        group_modifier: None,
                        join_modifier: None,
                        left: Box::new(Expr::Number(0.0)),
                        right: Box::new(other),
                    })),
                }
            }
            Some(Token::Ident(_)) => {
                let word = match self.advance() {
                    Some(Token::Ident(word)) => word,
                    _ => unreachable!(),
                };
                self.parse_ident_expr(word)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_ident_expr(&mut self, word: String) -> Result<Expr, ParseError> {
        let aggregate = is_aggregate_func(&word);
        if aggregate && (self.peek_keyword("by") || self.peek_keyword("without")) {
            let modifier = self.parse_aggregate_modifier()?;
            self.expect(&Token::LeftParen, "'('")?;
            let args = self.parse_expr_list(Token::RightParen)?;
            return Ok(Expr::Aggregation(AggregationExpr {
                name: word,
                args,
                modifier: Some(modifier),
            }));
        }
        if self.eat(&Token::LeftParen) {
            let args = self.parse_expr_list(Token::RightParen)?;
            if aggregate {
                let modifier = if self.peek_keyword("by") || self.peek_keyword("without") {
                    Some(self.parse_aggregate_modifier()?)
                } else {
                    None
                };
                return Ok(Expr::Aggregation(AggregationExpr {
                    name: word,
                    args,
                    modifier,
                }));
            }
            return Ok(Expr::Function(FunctionExpr { name: word, args }));
        }
        if self.eat(&Token::LeftBrace) {
            let mut filters = vec![LabelFilter::equal(super::NAME_LABEL, word)];
            filters.extend(self.parse_label_filters()?);
            return Ok(Expr::Metric(MetricExpr {
                label_filters: filters,
            }));
        }
        Ok(Expr::Metric(MetricExpr::from_name(word)))
    }

    fn parse_aggregate_modifier(&mut self) -> Result<AggregateModifier, ParseError> {
        let op = if self.eat_keyword("by") {
            AggregateModifierOp::By
        } else if self.eat_keyword("without") {
            AggregateModifierOp::Without
        } else {
            return Err(self.unexpected("'by' or 'without'"));
        };
        let args = self.parse_label_list()?;
        Ok(AggregateModifier { op, args })
    }

    fn parse_label_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut labels = Vec::new();
        if self.eat(&Token::RightParen) {
            return Ok(labels);
        }
        loop {
            match self.peek() {
                Some(Token::Ident(label)) => {
                    labels.push(label.clone());
                    self.pos += 1;
                }
                _ => return Err(self.unexpected("a label name")),
            }
            if self.eat(&Token::Comma) {
                if self.eat(&Token::RightParen) {
                    return Ok(labels);
                }
                continue;
            }
            self.expect(&Token::RightParen, "')'")?;
            return Ok(labels);
        }
    }

    fn parse_expr_list(&mut self, terminator: Token) -> Result<Vec<Expr>, ParseError> {
        let mut list = Vec::new();
        if self.eat(&terminator) {
            return Ok(list);
        }
        loop {
            list.push(self.parse_expr(0)?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&terminator, "')'")?;
            return Ok(list);
        }
    }

    fn parse_label_filters(&mut self) -> Result<Vec<LabelFilter>, ParseError> {
        let mut filters = Vec::new();
        if self.eat(&Token::RightBrace) {
            return Ok(filters);
        }
        loop {
            let label = match self.peek() {
                Some(Token::Ident(label)) => label.clone(),
                _ => return Err(self.unexpected("a label name")),
            };
            self.pos += 1;
            let (is_negative, is_regexp) = match self.peek() {
                Some(Token::Op("=")) => (false, false),
                Some(Token::Op("!=")) => (true, false),
                Some(Token::Op("=~")) => (false, true),
                Some(Token::Op("!~")) => (true, true),
                _ => return Err(self.unexpected("a label matcher")),
            };
            self.pos += 1;
            let value = match self.peek() {
                Some(Token::StringLit(value)) => value.clone(),
                _ => return Err(self.unexpected("a quoted value")),
            };
            self.pos += 1;
            filters.push(LabelFilter {
                label,
                value,
                is_regexp,
                is_negative,
            });
            if self.eat(&Token::Comma) {
                if self.eat(&Token::RightBrace) {
                    return Ok(filters);
                }
                continue;
            }
            self.expect(&Token::RightBrace, "'}'")?;
            return Ok(filters);
        }
    }
}
