//! Parser for the evaluation language.
//!
//! Recursive descent over the token stream from [`crate::lexer`].
//! Statements are separated by newlines or `;`; expressions use
//! conventional precedence climbing.

use devkit_types::{DevError, Value};

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::lexer::{tokenize, Token};

/// Parse a source block into a program.
pub fn parse(source: &str) -> Result<Program, DevError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn program(&mut self) -> Result<Program, DevError> {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.at_end() {
            stmts.push(self.statement()?);
            if !self.at_end() {
                self.expect_separator()?;
                self.skip_separators();
            }
        }
        Ok(Program { stmts })
    }

    fn statement(&mut self) -> Result<Stmt, DevError> {
        if matches!(self.peek(), Some(Token::Del)) {
            self.advance();
            let name = self.expect_ident()?;
            return Ok(Stmt::Delete { name });
        }

        // Assignment needs two tokens of lookahead: `name = ...` but not
        // `name == ...`.
        if let (Some(Token::Ident(name)), Some(Token::Assign)) =
            (self.peek(), self.peek_at(1))
        {
            let name = name.clone();
            self.advance();
            self.advance();
            let expr = self.expression()?;
            return Ok(Stmt::Assign { name, expr });
        }

        Ok(Stmt::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr, DevError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.equality()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.advance();
            let rhs = self.equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, DevError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, DevError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Bang) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, DevError> {
        let mut expr = self.primary()?;
        while matches!(self.peek(), Some(Token::LBracket)) {
            self.advance();
            let index = self.expression()?;
            self.expect(Token::RBracket)?;
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, DevError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(DevError::Syntax("unexpected end of input".into())),
        };
        match token {
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Int(v) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(v)))
            }
            Token::Float(v) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(v)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let args = self.call_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let items = self.list_items()?;
                Ok(Expr::List(items))
            }
            other => Err(DevError::Syntax(format!("unexpected {other}"))),
        }
    }

    /// Arguments after an already-consumed `(`, through the closing `)`.
    fn call_args(&mut self) -> Result<Vec<Expr>, DevError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RParen) => {
                    self.advance();
                    return Ok(args);
                }
                Some(other) => {
                    return Err(DevError::Syntax(format!("expected ',' or ')', found {other}")))
                }
                None => return Err(DevError::Syntax("unterminated call".into())),
            }
        }
    }

    /// List items after an already-consumed `[`, through the closing `]`.
    fn list_items(&mut self) -> Result<Vec<Expr>, DevError> {
        let mut items = Vec::new();
        if matches!(self.peek(), Some(Token::RBracket)) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                    // Trailing comma before the closing bracket.
                    if matches!(self.peek(), Some(Token::RBracket)) {
                        self.advance();
                        return Ok(items);
                    }
                }
                Some(Token::RBracket) => {
                    self.advance();
                    return Ok(items);
                }
                Some(other) => {
                    return Err(DevError::Syntax(format!("expected ',' or ']', found {other}")))
                }
                None => return Err(DevError::Syntax("unterminated list".into())),
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect(&mut self, expected: Token) -> Result<(), DevError> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.advance();
                Ok(())
            }
            Some(other) => Err(DevError::Syntax(format!(
                "expected {expected}, found {other}"
            ))),
            None => Err(DevError::Syntax(format!(
                "expected {expected}, found end of input"
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, DevError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(other) => Err(DevError::Syntax(format!(
                "expected identifier, found {other}"
            ))),
            None => Err(DevError::Syntax(
                "expected identifier, found end of input".into(),
            )),
        }
    }

    fn expect_separator(&mut self) -> Result<(), DevError> {
        match self.peek() {
            Some(Token::Newline) | Some(Token::Semi) => {
                self.advance();
                Ok(())
            }
            Some(other) => Err(DevError::Syntax(format!(
                "expected end of statement, found {other}"
            ))),
            None => Ok(()),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline) | Some(Token::Semi)) {
            self.advance();
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_and_expression() {
        let program = parse("x = 5\nx + 1").unwrap();
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(program.stmts[0], Stmt::Assign { ref name, .. } if name == "x"));
        assert!(matches!(program.stmts[1], Stmt::Expr(_)));
    }

    #[test]
    fn equality_is_not_assignment() {
        let program = parse("x == 5").unwrap();
        assert!(matches!(program.stmts[0], Stmt::Expr(Expr::Binary { op: BinaryOp::Eq, .. })));
    }

    #[test]
    fn precedence_mul_over_add() {
        let program = parse("1 + 2 * 3").unwrap();
        let Stmt::Expr(Expr::Binary { op, rhs, .. }) = &program.stmts[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn parses_calls_lists_and_indexing() {
        let program = parse(r#"print(len([1, 2, 3]), "x")[0]"#).unwrap();
        assert!(matches!(program.stmts[0], Stmt::Expr(Expr::Index { .. })));
    }

    #[test]
    fn parses_del() {
        let program = parse("del x").unwrap();
        assert!(matches!(program.stmts[0], Stmt::Delete { ref name } if name == "x"));
    }

    #[test]
    fn semicolons_separate_statements() {
        let program = parse("a = 1; b = 2; a + b").unwrap();
        assert_eq!(program.stmts.len(), 3);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let program = parse("\n\n1 + 1\n\n").unwrap();
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(matches!(parse("1 +"), Err(DevError::Syntax(_))));
        assert!(matches!(parse("del 5"), Err(DevError::Syntax(_))));
        assert!(matches!(parse("(1"), Err(DevError::Syntax(_))));
        assert!(matches!(parse("1 2"), Err(DevError::Syntax(_))));
    }
}
