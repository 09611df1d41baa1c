//! Pratt parser for expressions
//!
//! Binding powers, loosest to tightest: `||`, `&&`, equality, relational,
//! additive, multiplicative, prefix, postfix. Postfix forms are property
//! segments, method calls and projections, bracket subscripts, and `as`
//! casts. Consecutive plain `.name` segments fold into one dotted field
//! path per run.

use smallvec::SmallVec;

use crate::error::{FieldPathError, Result};
use crate::expr::{BinaryOperator, ExprNode, ProjectionKind, Subscript, UnaryOperator};
use crate::fieldvalue::FieldPath;

use super::lexer::{SpannedToken, Token, tokenize};

/// Parse an expression string into an AST
pub fn parse_expression(input: &str) -> Result<ExprNode> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        input_len: input.len(),
    };
    let expr = parser.parse_expr(0)?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(FieldPathError::Parse {
            position: extra.pos,
            message: format!("unexpected trailing token {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    input_len: usize,
}

const PREFIX_BP: u8 = 13;
const POSTFIX_BP: u8 = 15;

fn infix_binding_power(token: &Token) -> Option<(u8, u8, BinaryOperator)> {
    let entry = match token {
        Token::OrOr => (1, 2, BinaryOperator::Or),
        Token::AndAnd => (3, 4, BinaryOperator::And),
        Token::EqEq => (5, 6, BinaryOperator::Eq),
        Token::NotEq => (5, 6, BinaryOperator::NotEq),
        Token::Lt => (7, 8, BinaryOperator::Less),
        Token::Le => (7, 8, BinaryOperator::LessEq),
        Token::Gt => (7, 8, BinaryOperator::Greater),
        Token::Ge => (7, 8, BinaryOperator::GreaterEq),
        Token::Plus => (9, 10, BinaryOperator::Add),
        Token::Minus => (9, 10, BinaryOperator::Subtract),
        Token::Star => (11, 12, BinaryOperator::Multiply),
        Token::Slash => (11, 12, BinaryOperator::Divide),
        Token::Percent => (11, 12, BinaryOperator::Remainder),
        _ => return None,
    };
    Some(entry)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|t| &t.token)
    }

    fn peek_spanned(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.pos)
            .unwrap_or(self.input_len)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> FieldPathError {
        FieldPathError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        match self.bump() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {what}, found {token:?}"))),
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.bump() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(self.error(format!("expected {what}, found {token:?}"))),
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<ExprNode> {
        let mut lhs = self.parse_primary()?;

        loop {
            let Some(token) = self.peek() else { break };

            // postfix forms bind tightest
            if matches!(token, Token::Dot | Token::LBracket | Token::As) {
                if POSTFIX_BP < min_bp {
                    break;
                }
                lhs = self.parse_postfix(lhs)?;
                continue;
            }

            let Some((lbp, rbp, op)) = infix_binding_power(token) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr(rbp)?;
            lhs = ExprNode::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        match self.bump() {
            Some(Token::Literal(value)) => Ok(ExprNode::Constant(value)),
            Some(Token::Variable(name)) => Ok(ExprNode::variable(name)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    // a leading call applies to the current object
                    self.parse_call(None, name)
                } else {
                    ExprNode::property(None, &name)
                }
            }
            Some(Token::At) => {
                let type_name = self.expect_ident("type name after '@'")?;
                self.expect(&Token::Dot, "'.' in static field reference")?;
                let field = self.expect_ident("static field name")?;
                Ok(ExprNode::static_field(&type_name, &field))
            }
            Some(Token::Minus) => {
                let operand = self.parse_expr(PREFIX_BP)?;
                Ok(ExprNode::unary(UnaryOperator::Negate, operand))
            }
            Some(Token::Bang) => {
                let operand = self.parse_expr(PREFIX_BP)?;
                Ok(ExprNode::unary(UnaryOperator::Not, operand))
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(token) => Err(self.error(format!("unexpected token {token:?}"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_postfix(&mut self, lhs: ExprNode) -> Result<ExprNode> {
        match self.bump() {
            Some(Token::Dot) => {
                let name = self.expect_ident("name after '.'")?;
                if self.peek() == Some(&Token::LParen) {
                    return self.parse_call(Some(lhs), name);
                }
                self.fold_property_run(lhs, name)
            }
            Some(Token::LBracket) => {
                let subscript = self.parse_subscript()?;
                self.expect(&Token::RBracket, "']'")?;
                Ok(ExprNode::index(lhs, subscript))
            }
            Some(Token::As) => {
                let type_name = self.expect_ident("type name after 'as'")?;
                Ok(ExprNode::cast(lhs, &type_name))
            }
            _ => unreachable!("caller checked the postfix token"),
        }
    }

    /// Collect the remaining plain `.name` segments of this run, then
    /// build (or extend) a single property node over the dotted path.
    fn fold_property_run(&mut self, lhs: ExprNode, first: String) -> Result<ExprNode> {
        let mut segments = vec![first];
        while self.peek() == Some(&Token::Dot)
            && matches!(self.peek_at(1), Some(Token::Ident(_)))
            && self.peek_at(2) != Some(&Token::LParen)
        {
            self.bump();
            match self.bump() {
                Some(Token::Ident(name)) => segments.push(name),
                _ => unreachable!("peeked an identifier"),
            }
        }
        match lhs {
            ExprNode::Property(mut data) => {
                let joined = format!("{}.{}", data.path.to_path_string(), segments.join("."));
                data.path = FieldPath::shared(&joined)?;
                Ok(ExprNode::Property(data))
            }
            other => ExprNode::property(Some(other), &segments.join(".")),
        }
    }

    fn parse_call(&mut self, base: Option<ExprNode>, name: String) -> Result<ExprNode> {
        self.expect(&Token::LParen, "'('")?;
        let mut args: SmallVec<[ExprNode; 4]> = SmallVec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_expr(0)?);
                match self.peek() {
                    Some(Token::Comma) => {
                        self.bump();
                    }
                    _ => break,
                }
            }
        }
        self.expect(&Token::RParen, "')' after arguments")?;

        if let Some(kind) = ProjectionKind::from_name(&name) {
            if args.len() > 1 {
                return Err(self.error(format!(
                    "projection {name}() takes at most one expression, got {}",
                    args.len()
                )));
            }
            let body = args.into_iter().next();
            // a bare projection iterates the current object
            let source = base.unwrap_or_else(|| ExprNode::variable("this"));
            return Ok(ExprNode::projection(kind, source, body));
        }
        Ok(ExprNode::method_call(base, name, args))
    }

    fn parse_subscript(&mut self) -> Result<Subscript> {
        match self.peek() {
            Some(Token::Star) if self.peek_at(1) == Some(&Token::RBracket) => {
                self.bump();
                Ok(Subscript::All)
            }
            Some(Token::Caret) => {
                self.bump();
                Ok(Subscript::First)
            }
            Some(Token::Tilde) => {
                self.bump();
                Ok(Subscript::Mid)
            }
            Some(Token::Dollar) => {
                self.bump();
                Ok(Subscript::Last)
            }
            _ => Ok(Subscript::Expr(self.parse_expr(0)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_runs_fold_into_one_path() {
        let ExprNode::Property(data) = parse_expression("a.b.c").unwrap() else {
            panic!("expected property node");
        };
        assert!(data.base.is_none());
        assert_eq!(data.path.to_path_string(), "a.b.c");
    }

    #[test]
    fn calls_split_property_runs() {
        let node = parse_expression("a.b.size()").unwrap();
        let ExprNode::MethodCall(call) = node else {
            panic!("expected method call");
        };
        assert_eq!(call.method, "size");
        let Some(ExprNode::Property(data)) = &call.base else {
            panic!("expected property base");
        };
        assert_eq!(data.path.to_path_string(), "a.b");
    }

    #[test]
    fn projections_parse_with_bodies() {
        let node = parse_expression("items.findAll(price > 100).collect(name)").unwrap();
        let ExprNode::Projection(outer) = node else {
            panic!("expected projection");
        };
        assert_eq!(outer.kind, ProjectionKind::Collect);
        let ExprNode::Projection(inner) = &outer.base else {
            panic!("expected inner projection");
        };
        assert_eq!(inner.kind, ProjectionKind::FindAll);
        assert!(inner.body.is_some());
    }

    #[test]
    fn precedence_nests_arithmetic_under_comparison() {
        let node = parse_expression("1 + 2 * 3 < 10").unwrap();
        let ExprNode::Binary(cmp) = node else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.op, BinaryOperator::Less);
        let ExprNode::Binary(add) = &cmp.left else {
            panic!("expected addition on the left");
        };
        assert_eq!(add.op, BinaryOperator::Add);
    }

    #[test]
    fn subscript_sentinels_and_expressions() {
        for (text, expected) in [
            ("xs[*]", "All"),
            ("xs[^]", "First"),
            ("xs[~]", "Mid"),
            ("xs[$]", "Last"),
        ] {
            let ExprNode::Index(data) = parse_expression(text).unwrap() else {
                panic!("expected index node for {text}");
            };
            assert_eq!(format!("{:?}", data.subscript), expected);
        }
        let ExprNode::Index(data) = parse_expression("xs[1 + 1]").unwrap() else {
            panic!("expected index node");
        };
        assert!(matches!(data.subscript, Subscript::Expr(_)));
    }

    #[test]
    fn casts_bind_postfix() {
        let node = parse_expression("price as Long + 1").unwrap();
        let ExprNode::Binary(add) = node else {
            panic!("expected addition");
        };
        assert!(matches!(add.left, ExprNode::Cast(_)));
    }

    #[test]
    fn static_references_parse() {
        let node = parse_expression("@Color.RED").unwrap();
        let ExprNode::StaticField(data) = node else {
            panic!("expected static field");
        };
        assert_eq!(data.type_name, "Color");
        assert_eq!(data.field, "RED");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_expression("a.").is_err());
        assert!(parse_expression("(1").is_err());
    }
}
