//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del transpilador. Descompone el texto fuente
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido esta asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Indentación significativa
//! Los bloques del lenguaje fuente se delimitan por indentación. El lexer
//! mantiene una pila de niveles de indentación (inicialmente vacía, es
//! decir, columna cero) y traduce cambios de nivel al inicio de cada línea
//! lógica en tokens sintéticos [`Token::Indent`] y [`Token::Dedent`]. Las
//! fases posteriores nunca razonan sobre columnas para determinar bloques.
//!
//! Un nivel de indentación se representa por la secuencia exacta de
//! espacios y tabuladores que lo conforman. Un nivel más profundo debe
//! extender textualmente al anterior; cualquier otra combinación de
//! tabuladores y espacios es inconsistente.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores y las constantes
//! numéricas incluyen su lexema original; las cadenas se resuelven a su
//! valor, con secuencias de escape ya aplicadas.
//!
//! # Errores
//! El lexer se detiene ante el primer error. Ninguna fase posterior
//! llega a ejecutarse si el análisis léxico falla.

use crate::source::{Chars, Located, Location, Position};
use std::{
    collections::VecDeque,
    fmt::{self, Display},
    iter::Peekable,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Una cadena no se cerró antes del fin de línea.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Un nivel de indentación menor no coincide con ningún nivel externo.
    #[error("Unindent does not match any outer indentation level")]
    MismatchedDedent,

    /// Tabuladores y espacios mezclados de forma ambigua.
    #[error("Inconsistent use of tabs and spaces in indentation")]
    InconsistentTabs,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Construye un identificador a partir de su lexema.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Identifier(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal numérico, entero o decimal, con su lexema original.
    Number(String),

    /// Literal de cadena, con escapes ya resueltos.
    Str(String),

    /// `True` o `False`.
    Bool(bool),

    /// `None`
    None,

    /// Fin de una línea lógica.
    Newline,

    /// Aumento de nivel de indentación.
    Indent,

    /// Disminución de nivel de indentación.
    Dedent,

    /// Fin de la entrada.
    Eof,

    /// `=`
    Assign,

    /// `+=`
    PlusAssign,

    /// `-=`
    MinusAssign,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `//`
    DoubleSlash,

    /// `%`
    Percent,

    /// `**`
    Power,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `.`
    Period,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Number(number) => write!(fmt, "literal `{}`", number),
            Str(string) => write!(fmt, "string {:?}", string),
            Bool(true) => fmt.write_str("`True`"),
            Bool(false) => fmt.write_str("`False`"),
            None => fmt.write_str("`None`"),
            Newline => fmt.write_str("end of line"),
            Indent => fmt.write_str("indent"),
            Dedent => fmt.write_str("dedent"),
            Eof => fmt.write_str("end of input"),
            Assign => fmt.write_str("`=`"),
            PlusAssign => fmt.write_str("`+=`"),
            MinusAssign => fmt.write_str("`-=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            DoubleSlash => fmt.write_str("`//`"),
            Percent => fmt.write_str("`%`"),
            Power => fmt.write_str("`**`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Comma => fmt.write_str("`,`"),
            Colon => fmt.write_str("`:`"),
            Period => fmt.write_str("`.`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
        }
    }
}

/// Una palabra clave.
///
/// Algunas palabras clave del lenguaje fuente no tienen equivalente
/// soportado. Se reconocen de todas formas para que el parser pueda
/// rechazarlas con un mensaje preciso en vez de tratarlas como nombres.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    And,
    Or,
    Not,
    Break,
    Continue,
    Pass,
    Class,
    Try,
    Except,
    Finally,
    Import,
    From,
    Lambda,
    With,
    Raise,
    Global,
    Nonlocal,
    Del,
    Yield,
    Assert,
    Async,
    Await,
    Is,
    As,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("def",      Keyword::Def),
    ("return",   Keyword::Return),
    ("if",       Keyword::If),
    ("elif",     Keyword::Elif),
    ("else",     Keyword::Else),
    ("while",    Keyword::While),
    ("for",      Keyword::For),
    ("in",       Keyword::In),
    ("and",      Keyword::And),
    ("or",       Keyword::Or),
    ("not",      Keyword::Not),
    ("break",    Keyword::Break),
    ("continue", Keyword::Continue),
    ("pass",     Keyword::Pass),
    ("class",    Keyword::Class),
    ("try",      Keyword::Try),
    ("except",   Keyword::Except),
    ("finally",  Keyword::Finally),
    ("import",   Keyword::Import),
    ("from",     Keyword::From),
    ("lambda",   Keyword::Lambda),
    ("with",     Keyword::With),
    ("raise",    Keyword::Raise),
    ("global",   Keyword::Global),
    ("nonlocal", Keyword::Nonlocal),
    ("del",      Keyword::Del),
    ("yield",    Keyword::Yield),
    ("assert",   Keyword::Assert),
    ("async",    Keyword::Async),
    ("await",    Keyword::Await),
    ("is",       Keyword::Is),
    ("as",       Keyword::As),
];

impl Keyword {
    /// Nombre del constructo no soportado que esta palabra clave introduce.
    pub fn unsupported(self) -> Option<&'static str> {
        use Keyword::*;

        let construct = match self {
            Class => "classes",
            Try | Except | Finally | Raise => "exception handling",
            Import | From => "imports and modules",
            Lambda => "lambda expressions",
            With => "context managers",
            Global | Nonlocal => "scope declarations",
            Del => "`del` statements",
            Yield => "generators",
            Assert => "assertions",
            Async | Await => "asynchronous code",
            Is => "identity comparisons",
            As => "aliases",
            _ => return Option::None,
        };

        Some(construct)
    }
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap_or("?");

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Operadores de dos caracteres. Se prueban antes que los de uno.
const DOUBLE_OPERATORS: &[(char, char, Token)] = &[
    ('=', '=', Token::Equal),
    ('!', '=', Token::NotEqual),
    ('<', '=', Token::LessOrEqual),
    ('>', '=', Token::GreaterOrEqual),
    ('/', '/', Token::DoubleSlash),
    ('*', '*', Token::Power),
    ('+', '=', Token::PlusAssign),
    ('-', '=', Token::MinusAssign),
];

type Lex<T> = Result<T, Located<LexerError>>;

/// Analizador léxico.
///
/// El lexer produce tokens bajo demanda a través de [`Iterator`]. Algunos
/// caracteres producen más de un token (por ejemplo, un cambio de
/// indentación que cierra varios bloques), por lo cual existe una cola
/// de tokens pendientes.
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    end: Position,
    indents: Vec<String>,
    depth: u32,
    line_start: bool,
    line_has_tokens: bool,
    pending: VecDeque<Located<Token>>,
    done: bool,
}

/// Descompone un texto completo en tokens, o falla con el primer error.
///
/// La secuencia resultante siempre termina en [`Token::Eof`], precedido
/// por un [`Token::Dedent`] por cada bloque que permaneciera abierto.
pub fn tokenize(source: &str) -> Lex<Vec<Located<Token>>> {
    Lexer::new(source).collect()
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial a partir de un texto.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: Chars::new(source).peekable(),
            end: Position::default(),
            indents: vec![String::new()],
            depth: 0,
            line_start: true,
            line_has_tokens: false,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Avanza por lo menos un carácter o encola por lo menos un token.
    fn lex(&mut self) -> Lex<()> {
        if self.line_start && self.depth == 0 {
            return self.indentation();
        }

        let (c, start) = match self.source.peek() {
            Some(&next) => next,
            None => return Ok(self.finish()),
        };

        match c {
            '\n' => {
                self.bump();
                if self.depth == 0 {
                    if self.line_has_tokens {
                        self.push(Token::Newline, Location::point(start));
                    }

                    self.line_start = true;
                    self.line_has_tokens = false;
                }
            }

            // Espacios en blanco dentro de una línea
            ' ' | '\t' | '\r' | '\x0c' => {
                self.bump();
            }

            // Los comentarios descartan el resto de la línea
            '#' => {
                while let Some(&(c, _)) = self.source.peek() {
                    if c == '\n' {
                        break;
                    }

                    self.bump();
                }
            }

            '"' | '\'' => self.string(c, start)?,

            c if c.is_ascii_digit() => self.number(start),
            '.' if self.peek_second().map_or(false, |c| c.is_ascii_digit()) => self.number(start),

            c if c.is_alphabetic() || c == '_' => self.word(start),

            _ => self.operator(c, start)?,
        }

        Ok(())
    }

    /// Resuelve la indentación al inicio de una línea lógica.
    fn indentation(&mut self) -> Lex<()> {
        self.line_start = false;

        let start = self.end;
        let mut indent = String::new();
        while let Some(&(c @ (' ' | '\t'), _)) = self.source.peek() {
            indent.push(c);
            self.bump();
        }

        // Líneas en blanco o que solo contienen comentarios no afectan bloques
        match self.source.peek() {
            None | Some(('\n', _)) | Some(('\r', _)) | Some(('#', _)) => return Ok(()),
            Some(_) => (),
        }

        let location = Location::new(start, self.end);
        let here = Location::point(self.end);

        let top = self.indents.last().map(String::as_str).unwrap_or("");
        if indent == top {
            return Ok(());
        }

        if indent.starts_with(top) {
            self.indents.push(indent);
            self.pending.push_back(Located::at(Token::Indent, here));
            return Ok(());
        }

        if let Some(level) = self.indents.iter().position(|level| *level == indent) {
            for _ in level + 1..self.indents.len() {
                self.pending.push_back(Located::at(Token::Dedent, here));
            }

            self.indents.truncate(level + 1);
            return Ok(());
        }

        // Mismo ancho o aparente extensión, pero con otros caracteres
        let ambiguous = indent.len() > top.len()
            || self.indents.iter().any(|level| level.len() == indent.len());

        let error = if ambiguous {
            LexerError::InconsistentTabs
        } else {
            LexerError::MismatchedDedent
        };

        Err(Located::at(error, location))
    }

    /// Cierra la línea actual, todos los bloques abiertos y la entrada.
    fn finish(&mut self) {
        let here = Location::point(self.end);
        if self.line_has_tokens {
            self.push(Token::Newline, here);
        }

        for _ in 1..self.indents.len() {
            self.pending.push_back(Located::at(Token::Dedent, here));
        }

        self.indents.truncate(1);
        self.pending.push_back(Located::at(Token::Eof, here));
        self.done = true;
    }

    fn string(&mut self, quote: char, start: Position) -> Lex<()> {
        self.bump();

        let unterminated = || Located::at(LexerError::UnterminatedString, Location::point(start));

        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some(('\n', _)) => return Err(unterminated()),
                Some((c, _)) if c == quote => break,

                Some(('\\', _)) => match self.bump() {
                    None | Some(('\n', _)) => return Err(unterminated()),
                    Some(('n', _)) => value.push('\n'),
                    Some(('t', _)) => value.push('\t'),
                    Some(('\\', _)) => value.push('\\'),
                    Some(('"', _)) => value.push('"'),
                    Some(('\'', _)) => value.push('\''),

                    // Secuencias desconocidas se preservan tal cual
                    Some((other, _)) => {
                        value.push('\\');
                        value.push(other);
                    }
                },

                Some((c, _)) => value.push(c),
            }
        }

        self.push(Token::Str(value), Location::new(start, self.end));
        Ok(())
    }

    fn number(&mut self, start: Position) {
        let mut lexeme = String::new();
        let mut seen_point = false;

        while let Some(&(c, _)) = self.source.peek() {
            match c {
                '0'..='9' => (),
                '.' if !seen_point => seen_point = true,
                _ => break,
            }

            lexeme.push(c);
            self.bump();
        }

        self.push(Token::Number(lexeme), Location::new(start, self.end));
    }

    fn word(&mut self, start: Position) {
        let mut word = String::new();
        while let Some(&(c, _)) = self.source.peek() {
            if !is_word_char(c) {
                break;
            }

            word.push(c);
            self.bump();
        }

        let token = match word.as_str() {
            "True" => Token::Bool(true),
            "False" => Token::Bool(false),
            "None" => Token::None,
            _ => match Keyword::from_str(&word) {
                Ok(keyword) => Token::Keyword(keyword),
                Err(()) => Token::Id(Identifier(word)),
            },
        };

        self.push(token, Location::new(start, self.end));
    }

    fn operator(&mut self, c: char, start: Position) -> Lex<()> {
        self.bump();

        // Coincidencia más larga primero
        if let Some(second) = self.source.peek().map(|&(c, _)| c) {
            let double = DOUBLE_OPERATORS
                .iter()
                .find(|&&(first, next, _)| first == c && next == second);

            if let Some((_, _, token)) = double {
                self.bump();
                self.push(token.clone(), Location::new(start, self.end));
                return Ok(());
            }
        }

        use Token::*;
        let token = match c {
            '=' => Assign,
            '+' => Plus,
            '-' => Minus,
            '*' => Times,
            '/' => Slash,
            '%' => Percent,
            '<' => Less,
            '>' => Greater,
            ',' => Comma,
            ':' => Colon,
            '.' => Period,

            '(' | '[' | '{' => {
                self.depth += 1;
                match c {
                    '(' => OpenParen,
                    '[' => OpenSquare,
                    _ => OpenCurly,
                }
            }

            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                match c {
                    ')' => CloseParen,
                    ']' => CloseSquare,
                    _ => CloseCurly,
                }
            }

            _ => {
                return Err(Located::at(
                    LexerError::BadChar(c),
                    Location::point(start),
                ))
            }
        };

        self.push(token, Location::new(start, self.end));
        Ok(())
    }

    fn push(&mut self, token: Token, location: Location) {
        self.line_has_tokens = true;
        self.pending.push_back(Located::at(token, location));
    }

    fn bump(&mut self) -> Option<(char, Position)> {
        let next = self.source.next()?;
        self.end = match next.0 {
            '\n' => next.1.newline(),
            _ => next.1.advance(),
        };

        Some(next)
    }

    fn peek_second(&self) -> Option<char> {
        let mut fork = self.source.clone();
        fork.next();
        fork.next().map(|(c, _)| c)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Lex<Located<Token>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            } else if self.done {
                return None;
            }

            if let Err(error) = self.lex() {
                self.done = true;
                self.pending.clear();
                return Some(Err(error));
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un identificador.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use Token::{
        Assign, Bool, CloseParen, CloseSquare, Colon, Comma, Dedent, DoubleSlash, Eof, Indent,
        LessOrEqual, Newline, NotEqual, Number, OpenParen, OpenSquare, PlusAssign, Power, Str,
    };

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn error(source: &str) -> Located<LexerError> {
        tokenize(source).unwrap_err()
    }

    fn id(name: &str) -> Token {
        Token::Id(Identifier::new(name))
    }

    #[test]
    fn operators_match_longest_first() {
        assert_eq!(
            kinds("a // b ** c"),
            vec![id("a"), DoubleSlash, id("b"), Power, id("c"), Newline, Eof]
        );

        assert_eq!(
            kinds("x += 1 <= 2 != 3"),
            vec![
                id("x"),
                PlusAssign,
                Number("1".into()),
                LessOrEqual,
                Number("2".into()),
                NotEqual,
                Number("3".into()),
                Newline,
                Eof
            ]
        );
    }

    #[test]
    fn blocks_become_indent_and_dedent() {
        let source = "if x:\n    y = 1\n    if z:\n        w()\nv()\n";
        assert_eq!(
            kinds(source),
            vec![
                Token::Keyword(Keyword::If),
                id("x"),
                Colon,
                Newline,
                Indent,
                id("y"),
                Assign,
                Number("1".into()),
                Newline,
                Token::Keyword(Keyword::If),
                id("z"),
                Colon,
                Newline,
                Indent,
                id("w"),
                OpenParen,
                CloseParen,
                Newline,
                Dedent,
                Dedent,
                id("v"),
                OpenParen,
                CloseParen,
                Newline,
                Eof
            ]
        );
    }

    #[test]
    fn open_blocks_close_at_end_of_input() {
        let tokens = kinds("while x:\n    f()");
        assert_eq!(&tokens[tokens.len() - 3..], &[Newline, Dedent, Eof]);
    }

    #[test]
    fn blank_and_comment_lines_are_invisible() {
        let source = "# header\n\nx = 1  # trailing\n\n    # indented comment\ny = 2\n";
        assert_eq!(
            kinds(source),
            vec![
                id("x"),
                Assign,
                Number("1".into()),
                Newline,
                id("y"),
                Assign,
                Number("2".into()),
                Newline,
                Eof
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_joined() {
        let source = "xs = [\n  1,\n  2,\n]\n";
        assert_eq!(
            kinds(source),
            vec![
                id("xs"),
                Assign,
                OpenSquare,
                Number("1".into()),
                Comma,
                Number("2".into()),
                Comma,
                CloseSquare,
                Newline,
                Eof
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds(r#"f(3.25, "a\n\"b\"", 'c', True, False, None)"#),
            vec![
                id("f"),
                OpenParen,
                Number("3.25".into()),
                Comma,
                Str("a\n\"b\"".into()),
                Comma,
                Str("c".into()),
                Comma,
                Bool(true),
                Comma,
                Bool(false),
                Comma,
                Token::None,
                CloseParen,
                Newline,
                Eof
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("Def")[0], id("Def"));
        assert_eq!(kinds("def")[0], Token::Keyword(Keyword::Def));
    }

    #[test]
    fn unterminated_string_points_at_opening_quote() {
        let error = error("x = \"abc");
        assert_eq!(*error.val(), LexerError::UnterminatedString);
        assert_eq!(error.location().start(), Position::new(1, 5));
    }

    #[test]
    fn bad_character() {
        let error = error("x = 1 $ 2");
        assert_eq!(*error.val(), LexerError::BadChar('$'));
        assert_eq!(error.location().start(), Position::new(1, 7));
    }

    #[test]
    fn mismatched_dedent() {
        let error = error("if x:\n    y()\n  z()\n");
        assert_eq!(*error.val(), LexerError::MismatchedDedent);
        assert_eq!(error.location().start().line(), 3);
    }

    #[test]
    fn tabs_and_spaces_must_agree() {
        let error = error("if x:\n\ty()\n        z()\n");
        assert_eq!(*error.val(), LexerError::InconsistentTabs);
        assert_eq!(error.location().start().line(), 3);
    }

    #[test]
    fn token_positions_are_one_based() {
        let tokens = tokenize("a = 10\n  \nbb").unwrap();
        assert_eq!(tokens[2].location().start(), Position::new(1, 5));
        assert_eq!(tokens[2].location().end(), Position::new(1, 7));
        assert_eq!(tokens[4].location().start(), Position::new(3, 1));
    }
}
