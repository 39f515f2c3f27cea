//! Análisis sintáctico.
//!
//! El parser es descendente recursivo, con una regla por tipo de
//! sentencia. Las expresiones binarias se resuelven por escalado de
//! precedencia ("precedence climbing"), de menor a mayor:
//!
//! | Nivel | Operadores | Asociatividad |
//! |---|---|---|
//! | 1 | `or` | izquierda |
//! | 2 | `and` | izquierda |
//! | 3 | `not` (prefijo) | |
//! | 4 | `==` `!=` `<` `>` `<=` `>=` | sin encadenamiento |
//! | 5 | `+` `-` | izquierda |
//! | 6 | `*` `/` `//` `%` | izquierda |
//! | 7 | `-` (prefijo) | |
//! | 8 | `**` | derecha |
//!
//! Por encima de todos ellos se encuentran llamadas, indexación y átomos.
//!
//! # Errores
//! El primer error estructural aborta el análisis completo. Un árbol a
//! medio construir nunca llega a generación de código.
//!
//! La profundidad de anidamiento (paréntesis, corchetes, operadores
//! prefijos, potencias y bloques) está acotada por [`MAX_DEPTH`]; pasado
//! ese límite el programa se rechaza en vez de agotar la pila.

use std::{collections::HashSet, iter::Peekable};
use thiserror::Error;

use crate::{
    ast::{AugOp, BinOp, Block, Expr, FunctionDef, Parameter, Program, Statement, Target, UnaryOp},
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Expected {expected}, found {found} instead")]
    UnexpectedToken { expected: Token, found: Token },

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected a statement, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected an indented block, found {0} instead")]
    ExpectedBlock(Token),

    #[error("Unexpected indent")]
    UnexpectedIndent,

    #[error("Parameter `{0}` without a default value follows a parameter with one")]
    RequiredAfterDefault(Identifier),

    #[error("Duplicate parameter `{0}`")]
    DuplicateParameter(Identifier),

    #[error("Chained comparisons are not supported, use `and` instead")]
    ChainedComparison,

    #[error("Only named functions and methods can be called")]
    NotCallable,

    #[error("Only function calls can be used as statements")]
    ExpressionStatement,

    #[error("Cannot assign to this expression")]
    InvalidTarget,

    #[error("Unsupported construct: {0}")]
    Unsupported(&'static str),

    #[error("Expression or block nested too deeply")]
    TooDeeplyNested,

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

impl ParserError {
    /// Descripción de lo que se esperaba encontrar, si aplica.
    pub fn expected(&self) -> Option<String> {
        use ParserError::*;

        match self {
            UnexpectedToken { expected, .. } => Some(expected.to_string()),
            ExpectedId(_) => Some(String::from("identifier")),
            ExpectedExpr(_) => Some(String::from("expression")),
            ExpectedStatement(_) => Some(String::from("statement")),
            ExpectedBlock(_) => Some(String::from("indented block")),
            _ => None,
        }
    }

    /// Token encontrado en lugar del esperado, si aplica.
    pub fn found(&self) -> Option<&Token> {
        use ParserError::*;

        match self {
            UnexpectedToken { found, .. }
            | ExpectedId(found)
            | ExpectedExpr(found)
            | ExpectedStatement(found)
            | ExpectedBlock(found) => Some(found),
            _ => None,
        }
    }
}

/// Máximo nivel de anidamiento aceptado.
pub const MAX_DEPTH: u32 = 64;

/// Niveles de precedencia, en orden ascendente.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Not,
    Comparison,
    Additive,
    Multiplicative,
    Unary,
    Power,
}

impl Precedence {
    fn of(op: BinOp) -> Self {
        use BinOp::*;

        match op {
            Or => Precedence::Or,
            And => Precedence::And,
            Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual => {
                Precedence::Comparison
            }
            Add | Sub => Precedence::Additive,
            Mul | Div | FloorDiv | Mod => Precedence::Multiplicative,
            Pow => Precedence::Power,
        }
    }

    fn next(self) -> Self {
        use Precedence::*;

        match self {
            Or => And,
            And => Not,
            Not => Comparison,
            Comparison => Additive,
            Additive => Multiplicative,
            Multiplicative => Unary,
            Unary | Power => Power,
        }
    }
}

fn binary_op(token: &Token) -> Option<BinOp> {
    let op = match token {
        Token::Keyword(Keyword::Or) => BinOp::Or,
        Token::Keyword(Keyword::And) => BinOp::And,
        Token::Equal => BinOp::Equal,
        Token::NotEqual => BinOp::NotEqual,
        Token::Less => BinOp::Less,
        Token::LessOrEqual => BinOp::LessOrEqual,
        Token::Greater => BinOp::Greater,
        Token::GreaterOrEqual => BinOp::GreaterOrEqual,
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Times => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::DoubleSlash => BinOp::FloorDiv,
        Token::Percent => BinOp::Mod,
        Token::Power => BinOp::Pow,
        _ => return None,
    };

    Some(op)
}

/// Construye un AST a partir de una secuencia de tokens.
///
/// La secuencia normalmente proviene de [`crate::lex::tokenize`] y
/// termina en [`Token::Eof`]; si no es así, el final de la secuencia
/// se trata de la misma manera.
pub fn parse<'a, I>(tokens: I) -> Result<Program, Located<ParserError>>
where
    I: IntoIterator<Item = &'a Located<Token>>,
{
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        last_known: Location::default(),
        last_significant: Location::default(),
        depth: 0,
    };

    parser.program()
}

struct Parser<I: Iterator> {
    tokens: Peekable<I>,
    last_known: Location,
    last_significant: Location,
    depth: u32,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl<'a, I> Parser<I>
where
    I: Iterator<Item = &'a Located<Token>>,
{
    fn program(&mut self) -> Parse<Program> {
        let mut body = Vec::new();
        while !matches!(self.peek(), None | Some(Token::Eof)) {
            body.push(self.statement()?);
        }

        Ok(Program { body })
    }

    fn statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.peek_location();
        let statement = match self.peek() {
            Some(Token::Keyword(Keyword::Def)) => self.function_def()?,
            Some(Token::Keyword(Keyword::Return)) => self.return_statement()?,
            Some(Token::Keyword(Keyword::If)) => self.if_statement()?,
            Some(Token::Keyword(Keyword::While)) => self.while_statement()?,
            Some(Token::Keyword(Keyword::For)) => self.for_statement()?,

            Some(Token::Keyword(keyword @ (Keyword::Break | Keyword::Continue | Keyword::Pass))) => {
                let statement = match keyword {
                    Keyword::Break => Statement::Break,
                    Keyword::Continue => Statement::Continue,
                    _ => Statement::Pass,
                };

                self.next()?;
                self.expect(Token::Newline)?;
                statement
            }

            Some(Token::Keyword(keyword)) => {
                let error = match keyword.unsupported() {
                    Some(construct) => ParserError::Unsupported(construct),
                    None => ParserError::ExpectedStatement(Token::Keyword(*keyword)),
                };

                return self.fail_at(start, error);
            }

            Some(Token::Indent) => return self.fail_at(start, ParserError::UnexpectedIndent),

            Some(Token::Newline | Token::Dedent | Token::Eof) => {
                let found = self.next()?.into_inner();
                return self.fail(ParserError::ExpectedStatement(found));
            }

            _ => self.simple_statement()?,
        };

        Ok(self.located(statement, start))
    }

    fn function_def(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Def)?;
        let name = self.id()?;

        self.expect(Token::OpenParen)?;
        let parameters = self.comma_separated(Token::CloseParen, Parser::parameter)?;

        let mut seen = HashSet::new();
        let mut defaulted = false;
        for parameter in &parameters {
            let (location, id) = parameter.name.clone().split();
            if !seen.insert(id.clone()) {
                return self.fail_at(location, ParserError::DuplicateParameter(id));
            }

            match (&parameter.default, defaulted) {
                (Some(_), _) => defaulted = true,
                (None, true) => {
                    return self.fail_at(location, ParserError::RequiredAfterDefault(id))
                }
                (None, false) => (),
            }
        }

        let body = self.block()?;

        Ok(Statement::FunctionDef(FunctionDef {
            name,
            parameters,
            body,
        }))
    }

    fn parameter(&mut self) -> Parse<Parameter> {
        let name = self.id()?;
        let default = match self.peek() {
            Some(Token::Assign) => {
                self.next()?;
                Some(self.expr()?)
            }

            _ => None,
        };

        Ok(Parameter { name, default })
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Return)?;

        let value = match self.peek() {
            Some(Token::Newline) => None,
            _ => Some(self.expr()?),
        };

        self.expect(Token::Newline)?;
        Ok(Statement::Return(value))
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::If)?;
        let condition = self.expr()?;
        let body = self.block()?;

        let mut elifs = Vec::new();
        while let Some(Token::Keyword(Keyword::Elif)) = self.peek() {
            self.next()?;
            let condition = self.expr()?;
            elifs.push((condition, self.block()?));
        }

        let orelse = match self.peek() {
            Some(Token::Keyword(Keyword::Else)) => {
                self.next()?;
                Some(self.block()?)
            }

            _ => None,
        };

        Ok(Statement::If {
            condition,
            body,
            elifs,
            orelse,
        })
    }

    fn while_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::While)?;
        let condition = self.expr()?;
        let body = self.block()?;

        Ok(Statement::While { condition, body })
    }

    fn for_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::For)?;
        let variable = self.id()?;

        self.keyword(Keyword::In)?;
        let iterable = self.expr()?;
        let body = self.block()?;

        // `range()` directo como iterable se convierte en un ciclo de conteo;
        // aridades inválidas se dejan como llamada para que las reporte codegen
        let (location, iterable) = iterable.split();
        let statement = match iterable {
            Expr::Call { callee, args }
                if callee.val().as_str() == "range" && (1..=3).contains(&args.len()) =>
            {
                let mut args = args.into_iter();
                let (start, stop, step) = match (args.next(), args.next(), args.next()) {
                    (Some(stop), None, None) => (None, stop, None),
                    (Some(start), Some(stop), step) => (Some(start), stop, step),
                    _ => unreachable!(),
                };

                Statement::ForRange {
                    variable,
                    start,
                    stop,
                    step,
                    body,
                }
            }

            iterable => Statement::ForEach {
                variable,
                iterable: Located::at(iterable, location),
                body,
            },
        };

        Ok(statement)
    }

    /// Asignación, asignación aumentada o llamada.
    fn simple_statement(&mut self) -> Parse<Statement> {
        let expr = self.expr()?;

        let op = match self.peek() {
            Some(Token::Assign) => None,
            Some(Token::PlusAssign) => Some(AugOp::Add),
            Some(Token::MinusAssign) => Some(AugOp::Sub),

            _ if expr.val().is_call() => {
                self.expect(Token::Newline)?;
                return Ok(Statement::Expr(expr));
            }

            Some(Token::Newline) => {
                return self.fail_at(expr.location(), ParserError::ExpressionStatement)
            }

            _ => {
                let found = self.next()?.into_inner();
                return self.fail(ParserError::UnexpectedToken {
                    expected: Token::Newline,
                    found,
                });
            }
        };

        self.next()?;

        let (location, expr) = expr.split();
        let target = match expr {
            Expr::Name(id) => Target::Name(id),
            Expr::Index { target, index } => Target::Index { target, index },
            _ => return self.fail_at(location, ParserError::InvalidTarget),
        };

        let target = Located::at(target, location);
        let value = self.expr()?;
        self.expect(Token::Newline)?;

        Ok(match op {
            None => Statement::Assign { target, value },
            Some(op) => Statement::AugAssign { target, op, value },
        })
    }

    /// Un cuerpo: `:` seguido de un bloque indentado.
    fn block(&mut self) -> Parse<Block> {
        self.expect(Token::Colon)?;
        self.expect(Token::Newline)?;

        let location = match self.next()?.split() {
            (location, Token::Indent) => location,
            (location, found) => return self.fail_at(location, ParserError::ExpectedBlock(found)),
        };

        self.nested(location, |parser| {
            let mut statements = Vec::new();
            loop {
                statements.push(parser.statement()?);
                if let Some(Token::Dedent) = parser.peek() {
                    parser.next()?;
                    break Ok(statements);
                }
            }
        })
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.binary(Precedence::Or)
    }

    fn binary(&mut self, min: Precedence) -> Parse<Located<Expr>> {
        let mut lhs = self.prefix(min)?;
        let mut compared = false;

        loop {
            let op = match self.peek().and_then(binary_op) {
                Some(op) if Precedence::of(op) >= min => op,
                _ => break Ok(lhs),
            };

            let op_location = self.next()?.location();
            if op.is_comparison() {
                if compared {
                    break self.fail_at(op_location, ParserError::ChainedComparison);
                }

                compared = true;
            }

            let precedence = Precedence::of(op);
            let rhs = match op {
                BinOp::Pow => self.nested(op_location, |parser| parser.binary(precedence))?,
                _ => self.binary(precedence.next())?,
            };

            let location = Location::span(lhs.location(), rhs.location());
            lhs = Located::at(Expr::Binary(Box::new(lhs), op, Box::new(rhs)), location);
        }
    }

    fn prefix(&mut self, min: Precedence) -> Parse<Located<Expr>> {
        let (op, level) = match self.peek() {
            Some(Token::Keyword(Keyword::Not)) if min <= Precedence::Not => {
                (UnaryOp::Not, Precedence::Not)
            }

            Some(Token::Minus) => (UnaryOp::Neg, Precedence::Unary),
            _ => return self.postfix(),
        };

        let start = self.next()?.location();
        let operand = self.nested(start, |parser| parser.binary(level))?;
        let location = Location::span(start, operand.location());

        Ok(Located::at(Expr::Unary(op, Box::new(operand)), location))
    }

    fn postfix(&mut self) -> Parse<Located<Expr>> {
        let mut expr = self.atom()?;

        loop {
            expr = match self.peek() {
                Some(Token::OpenParen) => {
                    let (location, callee) = expr.split();
                    let callee = match callee {
                        Expr::Name(id) => Located::at(id, location),
                        _ => return self.fail_at(location, ParserError::NotCallable),
                    };

                    let open = self.next()?.location();
                    let args = self.nested(open, |parser| {
                        parser.comma_separated(Token::CloseParen, Parser::expr)
                    })?;

                    let location = Location::span(location, self.last_known);
                    Located::at(Expr::Call { callee, args }, location)
                }

                Some(Token::OpenSquare) => {
                    let open = self.next()?.location();
                    let index = self.nested(open, Parser::expr)?;
                    self.expect(Token::CloseSquare)?;

                    let location = Location::span(expr.location(), self.last_known);
                    let index = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };

                    Located::at(index, location)
                }

                Some(Token::Period) => {
                    self.next()?;
                    let method = self.id()?;

                    let open = match self.peek() {
                        Some(Token::OpenParen) => self.next()?.location(),
                        _ => {
                            return self.fail_at(
                                method.location(),
                                ParserError::Unsupported("attribute access"),
                            )
                        }
                    };

                    let args = self.nested(open, |parser| {
                        parser.comma_separated(Token::CloseParen, Parser::expr)
                    })?;
                    let location = Location::span(expr.location(), self.last_known);
                    let call = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                    };

                    Located::at(call, location)
                }

                _ => break Ok(expr),
            };
        }
    }

    fn atom(&mut self) -> Parse<Located<Expr>> {
        let (location, token) = self.next()?.split();
        let expr = match token {
            Token::Id(id) => Expr::Name(id),
            Token::Number(number) => Expr::Number(number),
            Token::Str(string) => Expr::Str(string),
            Token::Bool(value) => Expr::Bool(value),
            Token::None => Expr::NoneLiteral,

            Token::OpenSquare => {
                let elements = self.nested(location, |parser| {
                    parser.comma_separated(Token::CloseSquare, Parser::expr)
                })?;

                Expr::List(elements)
            }

            Token::OpenParen => {
                let inner = self.nested(location, Parser::expr)?;
                self.expect(Token::CloseParen)?;

                // Los paréntesis no generan nodo, pero sí extienden el rango
                return Ok(Located::at(
                    inner.into_inner(),
                    Location::span(location, self.last_known),
                ));
            }

            Token::OpenCurly => return self.fail_at(location, ParserError::Unsupported("dictionaries")),

            Token::Keyword(keyword) => {
                let error = match keyword.unsupported() {
                    Some(construct) => ParserError::Unsupported(construct),
                    None => ParserError::ExpectedExpr(token),
                };

                return self.fail_at(location, error);
            }

            found => return self.fail_at(location, ParserError::ExpectedExpr(found)),
        };

        Ok(Located::at(expr, location))
    }

    /// Lista separada por comas que termina en `close`, la cual se consume.
    ///
    /// Se admite una coma final. La lista puede estar vacía.
    fn comma_separated<T, F>(&mut self, close: Token, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.next()?;
                break Ok(items);
            }

            items.push(rule(self)?);

            match self.next()?.split() {
                (_, Token::Comma) => (),
                (_, found) if found == close => break Ok(items),
                (location, found) => {
                    break self.fail_at(
                        location,
                        ParserError::UnexpectedToken {
                            expected: close,
                            found,
                        },
                    )
                }
            }
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next()?.into_inner() {
            found if found == token => Ok(()),
            found => self.fail(ParserError::UnexpectedToken {
                expected: token,
                found,
            }),
        }
    }

    fn peek(&mut self) -> Option<&'a Token> {
        self.tokens.peek().copied().map(Located::val)
    }

    fn peek_location(&mut self) -> Location {
        match self.tokens.peek() {
            Some(token) => token.location(),
            None => self.last_known,
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location();
                if !matches!(
                    token.as_ref(),
                    Token::Newline | Token::Indent | Token::Dedent | Token::Eof
                ) {
                    self.last_significant = token.location();
                }

                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    /// Aplica `rule` un nivel de anidamiento más adentro.
    fn nested<T, F>(&mut self, location: Location, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        if self.depth >= MAX_DEPTH {
            return self.fail_at(location, ParserError::TooDeeplyNested);
        }

        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;

        result
    }

    /// Ubica un nodo desde `start` hasta el último token significativo.
    fn located<T>(&self, value: T, start: Location) -> Located<T> {
        Located::at(value, Location::span(start, self.last_significant))
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        self.fail_at(self.last_known, error)
    }

    fn fail_at<T>(&self, location: Location, error: ParserError) -> Parse<T> {
        Err(Located::at(error, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::tokenize, source::Position};

    fn program(source: &str) -> Program {
        let tokens = tokenize(source).unwrap();
        parse(&tokens).unwrap()
    }

    fn error(source: &str) -> Located<ParserError> {
        let tokens = tokenize(source).unwrap();
        parse(&tokens).unwrap_err()
    }

    fn expr(source: &str) -> Expr {
        match program(source).body.remove(0).into_inner() {
            Statement::Assign { value, .. } => value.into_inner(),
            other => panic!("not an assignment: {:?}", other),
        }
    }

    fn binary(expr: Expr) -> (Expr, BinOp, Expr) {
        match expr {
            Expr::Binary(lhs, op, rhs) => (lhs.into_inner(), op, rhs.into_inner()),
            other => panic!("not a binary expression: {:?}", other),
        }
    }

    fn name(id: &str) -> Expr {
        Expr::Name(Identifier::new(id))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let (lhs, op, rhs) = binary(expr("x = a + b * c"));
        assert_eq!(lhs, name("a"));
        assert_eq!(op, BinOp::Add);
        assert_eq!(binary(rhs).1, BinOp::Mul);
    }

    #[test]
    fn subtraction_is_left_associative() {
        let (lhs, op, rhs) = binary(expr("x = a - b - c"));
        assert_eq!(op, BinOp::Sub);
        assert_eq!(rhs, name("c"));
        assert_eq!(binary(lhs).1, BinOp::Sub);
    }

    #[test]
    fn power_is_right_associative_and_binds_over_negation() {
        let (lhs, op, rhs) = binary(expr("x = a ** b ** c"));
        assert_eq!((lhs, op), (name("a"), BinOp::Pow));
        assert_eq!(binary(rhs).1, BinOp::Pow);

        match expr("x = -a ** 2") {
            Expr::Unary(UnaryOp::Neg, operand) => {
                assert_eq!(binary(operand.into_inner()).1, BinOp::Pow)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn not_sits_between_and_and_comparisons() {
        let (lhs, op, rhs) = binary(expr("x = not a == b and c"));
        assert_eq!(op, BinOp::And);
        assert_eq!(rhs, name("c"));

        match lhs {
            Expr::Unary(UnaryOp::Not, operand) => {
                assert_eq!(binary(operand.into_inner()).1, BinOp::Equal)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let depth = MAX_DEPTH as usize;
        let source = format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(expr(&source), Expr::Number(String::from("1")));

        let source = format!("x = {}1{}\n", "(".repeat(200), ")".repeat(200));
        let error = error(&source);
        assert_eq!(*error.val(), ParserError::TooDeeplyNested);
        assert_eq!(error.location().start(), Position::new(1, 5 + MAX_DEPTH));
    }

    #[test]
    fn nesting_bound_covers_every_form() {
        let deep = 2 * MAX_DEPTH as usize;
        for source in [
            format!("x = {}1\n", "-".repeat(deep)),
            format!("x = {}1{}\n", "[".repeat(deep), "]".repeat(deep)),
            format!("x = {}1\n", "f(".repeat(deep)),
            format!("x = 2{}\n", " ** 2".repeat(deep)),
        ] {
            assert_eq!(*error(&source).val(), ParserError::TooDeeplyNested, "{}", source);
        }

        let mut source = String::new();
        for level in 0..deep {
            source.push_str(&"    ".repeat(level));
            source.push_str("if x:\n");
        }
        source.push_str(&"    ".repeat(deep));
        source.push_str("pass\n");
        assert_eq!(*error(&source).val(), ParserError::TooDeeplyNested);
    }

    #[test]
    fn chained_comparison_is_rejected() {
        let error = error("x = a < b < c\n");
        assert_eq!(*error.val(), ParserError::ChainedComparison);
        assert_eq!(error.location().start(), Position::new(1, 11));
    }

    #[test]
    fn parenthesized_comparison_may_be_compared() {
        let (lhs, op, _) = binary(expr("x = (a < b) == c"));
        assert_eq!(op, BinOp::Equal);
        assert_eq!(binary(lhs).1, BinOp::Less);
    }

    #[test]
    fn range_loops_are_resolved_at_parse_time() {
        let body = program("for i in range(1, 10, 2):\n    print(i)\n").body;
        match body[0].as_ref() {
            Statement::ForRange {
                start, stop, step, ..
            } => {
                assert_eq!(start.as_ref().map(Located::val), Some(&Expr::Number("1".into())));
                assert_eq!(*stop.val(), Expr::Number("10".into()));
                assert_eq!(step.as_ref().map(Located::val), Some(&Expr::Number("2".into())));
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = program("for x in xs:\n    print(x)\n").body;
        assert!(matches!(body[0].as_ref(), Statement::ForEach { .. }));
    }

    #[test]
    fn if_elif_else_chain() {
        let source = "if a:\n    f()\nelif b:\n    g()\nelif c:\n    pass\nelse:\n    h()\n";
        match program(source).body.remove(0).into_inner() {
            Statement::If { elifs, orelse, .. } => {
                assert_eq!(elifs.len(), 2);
                assert_eq!(*elifs[0].0.val(), name("b"));
                assert_eq!(orelse.map(|body| body.len()), Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn default_parameters() {
        let source = "def f(a, b=1, c=\"x\"):\n    return a\n";
        match program(source).body.remove(0).into_inner() {
            Statement::FunctionDef(def) => {
                assert_eq!(def.name.val().as_str(), "f");
                let defaults: Vec<_> = def.parameters.iter().map(|p| p.default.is_some()).collect();
                assert_eq!(defaults, vec![false, true, true]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn required_parameter_after_default() {
        let error = error("def f(a=1, b):\n    return b\n");
        assert_eq!(
            *error.val(),
            ParserError::RequiredAfterDefault(Identifier::new("b"))
        );
        assert_eq!(error.location().start(), Position::new(1, 12));
    }

    #[test]
    fn missing_colon() {
        let error = error("while x\n    f()\n");
        assert_eq!(
            *error.val(),
            ParserError::UnexpectedToken {
                expected: Token::Colon,
                found: Token::Newline
            }
        );
        assert_eq!(error.val().expected().as_deref(), Some("`:`"));
    }

    #[test]
    fn body_must_be_indented() {
        let error = error("if x:\nf()\n");
        assert!(matches!(error.val(), ParserError::ExpectedBlock(_)));
        assert_eq!(error.location().start().line(), 2);
    }

    #[test]
    fn over_indented_statement() {
        let error = error("if x:\n    f()\n        g()\n");
        assert_eq!(*error.val(), ParserError::UnexpectedIndent);
        assert_eq!(error.location().start().line(), 3);
    }

    #[test]
    fn only_calls_are_statements() {
        let error = error("x + 1\n");
        assert_eq!(*error.val(), ParserError::ExpressionStatement);

        let body = program("xs.append(1)\n").body;
        assert!(matches!(body[0].as_ref(), Statement::Expr(_)));
    }

    #[test]
    fn index_targets() {
        match program("xs[0] += 2\n").body.remove(0).into_inner() {
            Statement::AugAssign { target, op, .. } => {
                assert_eq!(op, AugOp::Add);
                assert!(matches!(target.val(), Target::Index { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(*error("f() = 1\n").val(), ParserError::InvalidTarget);
    }

    #[test]
    fn unsupported_constructs() {
        assert_eq!(
            *error("d = {}\n").val(),
            ParserError::Unsupported("dictionaries")
        );
        assert_eq!(
            *error("class A:\n    pass\n").val(),
            ParserError::Unsupported("classes")
        );
        assert_eq!(
            *error("import os\n").val(),
            ParserError::Unsupported("imports and modules")
        );
        assert_eq!(
            *error("x = y.z\n").val(),
            ParserError::Unsupported("attribute access")
        );
    }

    #[test]
    fn node_ranges_nest() {
        let body = program("def f(a):\n    if a:\n        return a + 1\n").body;
        let outer = body[0].location();

        let def = match body[0].as_ref() {
            Statement::FunctionDef(def) => def,
            other => panic!("unexpected {:?}", other),
        };

        let inner = def.body[0].location();
        assert!(inner.within(outer));
        assert_eq!(outer.end(), Position::new(3, 21));
    }
}
