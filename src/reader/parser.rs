use tracing::trace;

use crate::error::{Error, ParseError};
use crate::reader::ast::{Body, Datum, Definition, Expr, Program};
use crate::reader::lexer::{word_kind, Position, Token, TokenKind};

/// Names introduced by desugaring. They contain a space, so no identifier
/// token can ever refer to them.
const OR_VALUE: &str = "or value";
const DELAY_FORCED: &str = "delay forced";
const DELAY_VALUE: &str = "delay value";

const EXPRESSION_START: [TokenKind; 6] = [
    TokenKind::LeftParen,
    TokenKind::QuoteMark,
    TokenKind::Number,
    TokenKind::String,
    TokenKind::Boolean,
    TokenKind::Identifier,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Cache the first forced result of `delay`/`cons-stream` promises.
    pub memoize_delay: bool,
}

impl Default for ParseOptions {
    fn default() -> Self { ParseOptions { memoize_delay: true } }
}

pub fn parse(tokens: &[Token]) -> Result<Program, Error> { parse_with(tokens, &ParseOptions::default()) }

pub fn parse_with(tokens: &[Token], options: &ParseOptions) -> Result<Program, Error> {
    let program = Parser::new(tokens, options).program()?;
    trace!(
        "parsed {} definitions and {} expressions",
        program.definitions.len(),
        program.expressions.len()
    );
    Ok(program)
}

/// Reads quoted data as a program, the way `eval` sees it. Symbols become
/// identifiers, or keywords when their text is one; no text is re-tokenized.
/// Every node is attributed to `site`.
pub fn parse_datum(datum: &Datum, site: Position, options: &ParseOptions) -> Result<Program, Error> {
    let mut tokens = Vec::new();
    datum_tokens(datum, site, &mut tokens);
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line: site.line,
        position: site.column,
    });
    parse_with(&tokens, options)
}

fn datum_tokens(datum: &Datum, site: Position, tokens: &mut Vec<Token>) {
    let mut push = |kind, text: String| {
        tokens.push(Token {
            kind,
            text,
            line: site.line,
            position: site.column,
        })
    };
    match datum {
        Datum::Number(n) => push(TokenKind::Number, n.to_string()),
        Datum::String(s) => push(TokenKind::String, s.clone()),
        Datum::Boolean(b) => push(TokenKind::Boolean, b.to_string()),
        Datum::Symbol(name) => match word_kind(name) {
            kind if kind.is_keyword() => push(kind, name.clone()),
            _ => push(TokenKind::Identifier, name.clone()),
        },
        Datum::List(items) => {
            push(TokenKind::LeftParen, "(".into());
            for item in items {
                datum_tokens(item, site, tokens);
            }
            tokens.push(Token {
                kind: TokenKind::RightParen,
                text: ")".into(),
                line: site.line,
                position: site.column,
            });
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    offset: usize,
    eof: Token,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], options: &'a ParseOptions) -> Parser<'a> {
        let (line, position) = tokens.last().map_or((1, 1), |t| (t.line, t.position));
        Parser {
            tokens,
            offset: 0,
            eof: Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
                position,
            },
            options,
        }
    }

    fn peek(&self) -> &Token { self.tokens.get(self.offset).unwrap_or(&self.eof) }

    fn peek_kind_at(&self, ahead: usize) -> TokenKind { self.tokens.get(self.offset + ahead).map_or(TokenKind::Eof, |t| t.kind) }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.offset < self.tokens.len() {
            self.offset += 1;
        }
        token
    }

    fn error(&self, expected: &[TokenKind]) -> Error {
        let token = self.peek();
        ParseError {
            line: token.line,
            position: token.position,
            found: token.kind,
            expected: expected.to_vec(),
        }
        .into()
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Error> {
        match self.peek().kind == kind {
            true => Ok(self.next()),
            false => Err(self.error(&[kind])),
        }
    }

    fn number(&mut self) -> Result<f64, Error> {
        let value = self.peek().text.parse::<f64>().map_err(|_| self.error(&[TokenKind::Number]))?;
        self.next();
        Ok(value)
    }

    fn expect_identifier(&mut self) -> Result<String, Error> { Ok(self.expect(TokenKind::Identifier)?.text) }

    fn at_definition(&self) -> bool { self.peek().kind == TokenKind::LeftParen && self.peek_kind_at(1) == TokenKind::Define }

    fn program(&mut self) -> Result<Program, Error> {
        let mut program = Program::default();
        while self.peek().kind != TokenKind::Eof {
            if self.at_definition() {
                program.definitions.push(self.definition()?);
            } else {
                program.expressions.push(self.expression()?);
            }
        }
        Ok(program)
    }

    /// (define name expr) | (define (name params...) body)
    fn definition(&mut self) -> Result<Definition, Error> {
        self.expect(TokenKind::LeftParen)?;
        self.expect(TokenKind::Define)?;
        let definition = match self.peek().kind {
            TokenKind::Identifier => {
                let name = self.expect_identifier()?;
                let value = self.expression()?;
                Definition { name, value }
            }
            TokenKind::LeftParen => {
                self.next();
                let name = self.expect_identifier()?;
                let params = self.params()?;
                let body = self.body()?;
                Definition {
                    name,
                    value: Expr::lambda(params, body),
                }
            }
            _ => return Err(self.error(&[TokenKind::Identifier, TokenKind::LeftParen])),
        };
        self.expect(TokenKind::RightParen)?;
        Ok(definition)
    }

    /// Identifiers up to and including the closing parenthesis.
    fn params(&mut self) -> Result<Vec<String>, Error> {
        let mut params = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Identifier => params.push(self.next().text),
                TokenKind::RightParen => {
                    self.next();
                    return Ok(params);
                }
                _ => return Err(self.error(&[TokenKind::Identifier, TokenKind::RightParen])),
            }
        }
    }

    fn body(&mut self) -> Result<Body, Error> {
        let mut definitions = Vec::new();
        while self.at_definition() {
            definitions.push(self.definition()?);
        }
        let expression = self.expression()?;
        Ok(Body { definitions, expression })
    }

    fn expression(&mut self) -> Result<Expr, Error> {
        match self.peek().kind {
            TokenKind::Number => Ok(Expr::Number(self.number()?)),
            TokenKind::String => Ok(Expr::String(self.next().text)),
            TokenKind::Boolean => Ok(Expr::Boolean(self.next().text == "true")),
            TokenKind::Identifier => Ok(Expr::Identifier(self.next().text)),
            TokenKind::QuoteMark => {
                self.next();
                Ok(Expr::Quote(self.datum()?))
            }
            TokenKind::LeftParen => self.compound(),
            _ => Err(self.error(&EXPRESSION_START)),
        }
    }

    /// Expressions up to and including the closing parenthesis.
    fn expressions_until_close(&mut self) -> Result<Vec<Expr>, Error> {
        let mut exprs = Vec::new();
        while self.peek().kind != TokenKind::RightParen {
            exprs.push(self.expression()?);
        }
        self.next();
        Ok(exprs)
    }

    fn compound(&mut self) -> Result<Expr, Error> {
        let open = self.expect(TokenKind::LeftParen)?.location();
        let expr = match self.peek().kind {
            TokenKind::Quote => {
                self.next();
                Expr::Quote(self.datum()?)
            }
            TokenKind::Set => {
                self.next();
                let name = self.expect_identifier()?;
                let value = self.expression()?;
                Expr::Assignment {
                    name,
                    value: Box::new(value),
                }
            }
            TokenKind::Lambda => {
                self.next();
                self.expect(TokenKind::LeftParen)?;
                let params = self.params()?;
                Expr::lambda(params, self.body()?)
            }
            TokenKind::If => {
                self.next();
                let predicate = self.expression()?;
                let consequent = self.expression()?;
                let alternative = match self.peek().kind {
                    TokenKind::RightParen => None,
                    _ => Some(self.expression()?),
                };
                Expr::if_then(predicate, consequent, alternative)
            }
            TokenKind::Begin => {
                self.next();
                let first = self.expression()?;
                let mut exprs = vec![first];
                exprs.extend(self.expressions_until_close()?);
                return Ok(Expr::Begin(exprs));
            }
            TokenKind::Cond => {
                self.next();
                return self.cond();
            }
            TokenKind::Let => {
                self.next();
                self.let_form(open)?
            }
            TokenKind::And => {
                self.next();
                let operands = self.expressions_until_close()?;
                return Ok(desugar_and(operands));
            }
            TokenKind::Or => {
                self.next();
                let operands = self.expressions_until_close()?;
                return Ok(desugar_or(operands, open));
            }
            TokenKind::Delay => {
                self.next();
                let expr = self.expression()?;
                self.delay(expr, open)
            }
            TokenKind::ConsStream => {
                self.next();
                let head = self.expression()?;
                let tail = self.expression()?;
                let promise = self.delay(tail, open);
                Expr::apply(Expr::Identifier("cons".into()), vec![head, promise], open)
            }
            kind if kind.is_keyword() => return Err(self.error(&EXPRESSION_START)),
            _ => {
                let operator = self.expression()?;
                let operands = self.expressions_until_close()?;
                return Ok(Expr::apply(operator, operands, open));
            }
        };
        self.expect(TokenKind::RightParen)?;
        Ok(expr)
    }

    /// Clauses after `cond`, through the closing parenthesis, folded into nested `if`s.
    fn cond(&mut self) -> Result<Expr, Error> {
        let mut clauses = Vec::new();
        let mut otherwise = None;
        loop {
            self.expect(TokenKind::LeftParen)?;
            if self.peek().kind == TokenKind::Else {
                self.next();
                otherwise = Some(self.actions()?);
                self.expect(TokenKind::RightParen)?;
                break;
            }
            let predicate = self.expression()?;
            clauses.push((predicate, self.actions()?));
            if self.peek().kind != TokenKind::LeftParen {
                self.expect(TokenKind::RightParen)?;
                break;
            }
        }
        let folded = clauses
            .into_iter()
            .rev()
            .fold(otherwise, |alternative, (predicate, consequent)| Some(Expr::if_then(predicate, consequent, alternative)));
        // at least one clause was read, so the fold is never empty
        folded.ok_or_else(|| self.error(&[TokenKind::LeftParen]))
    }

    /// One or more expressions through the clause's closing parenthesis; several become a `begin`.
    fn actions(&mut self) -> Result<Expr, Error> {
        let first = self.expression()?;
        let mut exprs = vec![first];
        exprs.extend(self.expressions_until_close()?);
        Ok(sequence(exprs))
    }

    /// (let ((id expr)...) body) => ((lambda (id...) body) expr...)
    fn let_form(&mut self, open: Position) -> Result<Expr, Error> {
        self.expect(TokenKind::LeftParen)?;
        let mut names = Vec::new();
        let mut values = Vec::new();
        while self.peek().kind == TokenKind::LeftParen {
            self.next();
            names.push(self.expect_identifier()?);
            values.push(self.expression()?);
            self.expect(TokenKind::RightParen)?;
        }
        if self.peek().kind != TokenKind::RightParen {
            return Err(self.error(&[TokenKind::LeftParen, TokenKind::RightParen]));
        }
        self.next();
        let body = self.body()?;
        Ok(Expr::apply(Expr::lambda(names, body), values, open))
    }

    fn delay(&self, expr: Expr, open: Position) -> Expr {
        if !self.options.memoize_delay {
            return Expr::lambda(Vec::new(), Body::expression(expr));
        }
        let force = Expr::Begin(vec![
            Expr::Assignment {
                name: DELAY_VALUE.into(),
                value: Box::new(expr),
            },
            Expr::Assignment {
                name: DELAY_FORCED.into(),
                value: Box::new(Expr::Boolean(true)),
            },
            Expr::Identifier(DELAY_VALUE.into()),
        ]);
        let promise = Expr::lambda(
            Vec::new(),
            Body::expression(Expr::if_then(
                Expr::Identifier(DELAY_FORCED.into()),
                Expr::Identifier(DELAY_VALUE.into()),
                Some(force),
            )),
        );
        Expr::apply(
            Expr::lambda(vec![DELAY_FORCED.into(), DELAY_VALUE.into()], Body::expression(promise)),
            vec![Expr::Boolean(false), Expr::Boolean(false)],
            open,
        )
    }

    fn datum(&mut self) -> Result<Datum, Error> {
        match self.peek().kind {
            TokenKind::Number => Ok(Datum::Number(self.number()?)),
            TokenKind::String => Ok(Datum::String(self.next().text)),
            TokenKind::Boolean => Ok(Datum::Boolean(self.next().text == "true")),
            TokenKind::QuoteMark => {
                self.next();
                Ok(Datum::List(vec![Datum::Symbol("quote".into()), self.datum()?]))
            }
            TokenKind::LeftParen => {
                self.next();
                let mut items = Vec::new();
                while self.peek().kind != TokenKind::RightParen {
                    if self.peek().kind == TokenKind::Eof {
                        return Err(self.error(&[TokenKind::RightParen]));
                    }
                    items.push(self.datum()?);
                }
                self.next();
                Ok(Datum::List(items))
            }
            TokenKind::Identifier => Ok(Datum::Symbol(self.next().text)),
            kind if kind.is_keyword() => Ok(Datum::Symbol(self.next().text)),
            _ => Err(self.error(&EXPRESSION_START)),
        }
    }
}

fn sequence(mut exprs: Vec<Expr>) -> Expr {
    match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::Begin(exprs),
    }
}

/// (and) => true, (and e) => e, (and e rest...) => (if e (and rest...) false)
fn desugar_and(mut operands: Vec<Expr>) -> Expr {
    match operands.len() {
        0 => Expr::Boolean(true),
        1 => operands.remove(0),
        _ => {
            let first = operands.remove(0);
            Expr::if_then(first, desugar_and(operands), Some(Expr::Boolean(false)))
        }
    }
}

/// (or) => false, (or e) => e, (or e rest...) => ((lambda (v) (if v v (or rest...))) e)
fn desugar_or(mut operands: Vec<Expr>, open: Position) -> Expr {
    match operands.len() {
        0 => Expr::Boolean(false),
        1 => operands.remove(0),
        _ => {
            let first = operands.remove(0);
            let test = Expr::if_then(
                Expr::Identifier(OR_VALUE.into()),
                Expr::Identifier(OR_VALUE.into()),
                Some(desugar_or(operands, open)),
            );
            Expr::apply(Expr::lambda(vec![OR_VALUE.into()], Body::expression(test)), vec![first], open)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::lexer::tokenize;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn parse_str(src: &str) -> Program { parse(&tokenize(src).unwrap()).unwrap() }

    fn parse_err(src: &str) -> ParseError {
        match parse(&tokenize(src).unwrap()) {
            Err(Error::Parse(e)) => e,
            other => panic!("expected parse error for {:?}, got {:?}", src, other),
        }
    }

    fn single(src: &str) -> Expr {
        let mut program = parse_str(src);
        assert_eq!(program.expressions.len(), 1, "{}", src);
        program.expressions.remove(0)
    }

    fn id(name: &str) -> Expr { Expr::Identifier(name.into()) }

    /// Positions are irrelevant when comparing two desugarings.
    fn strip(expr: Expr) -> Expr {
        let origin = Position { line: 0, column: 0 };
        match expr {
            Expr::Application { operator, operands, .. } => Expr::apply(strip(*operator), operands.into_iter().map(strip).collect(), origin),
            Expr::If {
                predicate,
                consequent,
                alternative,
            } => Expr::if_then(strip(*predicate), strip(*consequent), alternative.map(|a| strip(*a))),
            Expr::Begin(exprs) => Expr::Begin(exprs.into_iter().map(strip).collect()),
            Expr::Lambda(lambda) => {
                let body = Body {
                    definitions: lambda.body.definitions.clone(),
                    expression: strip(lambda.body.expression.clone()),
                };
                Expr::lambda(lambda.params.clone(), body)
            }
            other => other,
        }
    }

    #[test]
    fn test_literals() {
        // runTest 1 "s" true x
        let program = parse_str("1 \"s\" true x");
        assert_eq!(
            program.expressions,
            vec![Expr::Number(1.0), Expr::String("s".into()), Expr::Boolean(true), id("x")]
        );
    }

    #[test]
    fn test_define_function_sugar() {
        // runTest (define (sq x) (* x x)) == (define sq (lambda (x) (* x x)))
        let sugared = parse_str("(define (sq x) (* x x))");
        let plain = parse_str("(define sq (lambda (x) (* x x)))");
        assert_eq!(sugared.definitions.len(), 1);
        assert_eq!(sugared.definitions[0].name, "sq");
        assert_eq!(strip(sugared.definitions[0].value.clone()), strip(plain.definitions[0].value.clone()));
    }

    #[test]
    fn test_program_keeps_order() {
        let program = parse_str("(define a 1) (display a) (define b 2) (display b)");
        let names: Vec<&str> = program.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(program.expressions.len(), 2);
    }

    #[test]
    fn test_cond_to_nested_if() {
        let cond = single("(cond ((> x 0) 1) ((< x 0) (display x) -1) (else 0))");
        let nested = single("(if (> x 0) 1 (if (< x 0) (begin (display x) -1) 0))");
        assert_eq!(strip(cond), strip(nested));
    }

    #[test]
    fn test_cond_without_else() {
        let cond = single("(cond (a 1) (b 2 3))");
        let nested = single("(if a 1 (if b (begin 2 3)))");
        assert_eq!(strip(cond), strip(nested));
    }

    #[test]
    fn test_cond_else_only_multiple_actions() {
        let cond = single("(cond (else 1 2))");
        assert_eq!(cond, Expr::Begin(vec![Expr::Number(1.0), Expr::Number(2.0)]));
    }

    #[test]
    fn test_let_to_application() {
        let sugared = single("(let ((a 1) (b (+ 1 1))) (+ a b))");
        let plain = single("((lambda (a b) (+ a b)) 1 (+ 1 1))");
        assert_eq!(strip(sugared), strip(plain));
    }

    #[test]
    fn test_and_desugaring() {
        assert_eq!(single("(and)"), Expr::Boolean(true));
        assert_eq!(single("(and x)"), id("x"));
        assert_eq!(strip(single("(and a b c)")), strip(single("(if a (if b c false) false)")));
    }

    #[test]
    fn test_or_desugaring() {
        assert_eq!(single("(or)"), Expr::Boolean(false));
        assert_eq!(single("(or x)"), id("x"));
        match single("(or a b)") {
            Expr::Application { operator, operands, .. } => {
                assert_eq!(operands, vec![id("a")]);
                match *operator {
                    Expr::Lambda(lambda) => assert_eq!(lambda.params, vec![OR_VALUE.to_string()]),
                    other => panic!("expected lambda operator, got {:?}", other),
                }
            }
            other => panic!("expected application, got {:?}", other),
        }
    }

    #[test]
    fn test_body_with_internal_defines() {
        match single("(lambda (x) (define y 2) (define (z) y) (+ x y))") {
            Expr::Lambda(lambda) => {
                assert_eq!(lambda.params, vec!["x".to_string()]);
                assert_eq!(lambda.body.definitions.len(), 2);
                assert_eq!(lambda.body.definitions[1].name, "z");
            }
            other => panic!("expected lambda, got {:?}", other),
        }
    }

    #[test]
    fn test_body_requires_single_expression() {
        let e = parse_err("(lambda (x) x x)");
        assert_eq!(e.found, TokenKind::Identifier);
        assert_eq!(e.expected, vec![TokenKind::RightParen]);
        assert_eq!((e.line, e.position), (1, 15));
    }

    #[test]
    fn test_quote_forms() {
        let expected = Expr::Quote(Datum::List(vec![
            Datum::Symbol("a".into()),
            Datum::Number(1.0),
            Datum::List(vec![Datum::Symbol("if".into())]),
        ]));
        assert_eq!(single("(quote (a 1 (if)))"), expected);
        assert_eq!(single("'(a 1 (if))"), expected);
        assert_eq!(single("'()"), Expr::Quote(Datum::List(vec![])));
    }

    #[test]
    fn test_if_without_alternative() {
        assert_eq!(single("(if false 1)"), Expr::if_then(Expr::Boolean(false), Expr::Number(1.0), None));
    }

    #[test]
    fn test_application_position() {
        match single("\n  (f 1)") {
            Expr::Application { position, .. } => assert_eq!(position, Position { line: 2, column: 3 }),
            other => panic!("expected application, got {:?}", other),
        }
    }

    #[test]
    fn test_cons_stream() {
        let options = ParseOptions { memoize_delay: false };
        let program = parse_with(&tokenize("(cons-stream 1 (f))").unwrap(), &options).unwrap();
        let plain = parse_str("(cons 1 (lambda () (f)))");
        assert_eq!(strip(program.expressions[0].clone()), strip(plain.expressions[0].clone()));
    }

    #[test]
    fn test_errors() {
        let e = parse_err("(");
        assert_eq!(e.found, TokenKind::Eof);
        assert_eq!(e.expected, EXPRESSION_START.to_vec());

        let e = parse_err(")");
        assert_eq!(e.found, TokenKind::RightParen);

        let e = parse_err("(if 1 2 3 4)");
        assert_eq!(e.expected, vec![TokenKind::RightParen]);
        assert_eq!(e.position, 11);

        let e = parse_err("(begin)");
        assert_eq!(e.found, TokenKind::RightParen);

        let e = parse_err("(+ 1 (define x 2))");
        assert_eq!(e.found, TokenKind::Define);

        let e = parse_err("(cond)");
        assert_eq!(e.expected, vec![TokenKind::LeftParen]);

        let e = parse_err("(let ((1 2)) 3)");
        assert_eq!(e.expected, vec![TokenKind::Identifier]);

        let e = parse_err("(set! 1 2)");
        assert_eq!(e.found, TokenKind::Number);
    }

    fn sym(name: &str) -> Datum { Datum::Symbol(name.into()) }

    #[test]
    fn test_parse_datum_matches_source() {
        let site = Position { line: 3, column: 7 };
        let form = Datum::List(vec![sym("if"), Datum::Boolean(true), Datum::Number(1.0), Datum::String("a b".into())]);
        let program = parse_datum(&form, site, &ParseOptions::default()).unwrap();
        let expected = parse_str("(if true 1 \"a b\")");
        let stripped = |exprs: Vec<Expr>| exprs.into_iter().map(strip).collect::<Vec<_>>();
        assert_eq!(stripped(program.expressions), stripped(expected.expressions));

        let call = Datum::List(vec![sym("f"), Datum::Number(1.0)]);
        match parse_datum(&call, site, &ParseOptions::default()).unwrap().expressions.pop() {
            Some(Expr::Application { position, .. }) => assert_eq!(position, site),
            other => panic!("expected application, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_datum_keeps_symbol_text_whole() {
        let site = Position { line: 1, column: 1 };
        let program = parse_datum(&sym("(display 99)"), site, &ParseOptions::default()).unwrap();
        assert_eq!(program.expressions, vec![id("(display 99)")]);

        let program = parse_datum(&Datum::Number(f64::INFINITY), site, &ParseOptions::default()).unwrap();
        assert_eq!(program.expressions, vec![Expr::Number(f64::INFINITY)]);
    }

    proptest! {
        #[test]
        fn parsing_is_deterministic(src in "[a-c1-3 ()']{0,40}") {
            if let Ok(tokens) = tokenize(&src) {
                let first = parse(&tokens);
                let second = parse(&tokenize(&src).unwrap());
                prop_assert_eq!(first, second);
            }
        }
    }
}
