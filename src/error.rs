//! Errores del transpilador y su presentación.
//!
//! Cada fase define su propio tipo de error, siempre acompañado de una
//! ubicación. [`TranspilerError`] los reúne para que quien invoca pueda
//! distinguir la fase que falló sin inspeccionar mensajes.

use crate::{
    codegen::CodeGenError,
    lex::{LexerError, Token},
    parse::ParserError,
    source::{Located, Location, Source},
};

use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error de cualquiera de las tres fases.
#[derive(Debug, Clone, PartialEq)]
pub enum TranspilerError {
    Lex(Located<LexerError>),
    Parse(Located<ParserError>),
    CodeGen(Located<CodeGenError>),
}

impl TranspilerError {
    /// Nombre de la clase de error.
    pub fn kind(&self) -> &'static str {
        match self {
            TranspilerError::Lex(_) => "LexError",
            TranspilerError::Parse(_) => "ParseError",
            TranspilerError::CodeGen(_) => "CodeGenError",
        }
    }

    /// Mensaje legible, sin ubicación.
    pub fn message(&self) -> String {
        self.cause().to_string()
    }

    /// Línea de inicio del error, a partir de 1.
    pub fn line(&self) -> u32 {
        self.location().start().line()
    }

    /// Columna de inicio del error, a partir de 1.
    pub fn column(&self) -> u32 {
        self.location().start().column()
    }

    pub fn location(&self) -> Location {
        match self {
            TranspilerError::Lex(error) => error.location(),
            TranspilerError::Parse(error) => error.location(),
            TranspilerError::CodeGen(error) => error.location(),
        }
    }

    /// Token esperado, si el error es un token inesperado.
    pub fn expected(&self) -> Option<String> {
        match self {
            TranspilerError::Parse(error) => error.val().expected(),
            _ => None,
        }
    }

    /// Token encontrado, si el error es de sintaxis.
    pub fn found(&self) -> Option<&Token> {
        match self {
            TranspilerError::Parse(error) => error.val().found(),
            _ => None,
        }
    }

    /// Tipo de nodo que originó un error de generación de código.
    pub fn node_kind(&self) -> Option<&'static str> {
        match self {
            TranspilerError::CodeGen(error) => Some(error.val().node_kind()),
            _ => None,
        }
    }

    fn cause(&self) -> &(dyn Error + 'static) {
        match self {
            TranspilerError::Lex(error) => error.val(),
            TranspilerError::Parse(error) => error.val(),
            TranspilerError::CodeGen(error) => error.val(),
        }
    }
}

impl Display for TranspilerError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{} at {}:{}: {}",
            self.kind(),
            self.line(),
            self.column(),
            self.cause()
        )
    }
}

impl Error for TranspilerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause())
    }
}

impl From<Located<LexerError>> for TranspilerError {
    fn from(error: Located<LexerError>) -> Self {
        TranspilerError::Lex(error)
    }
}

impl From<Located<ParserError>> for TranspilerError {
    fn from(error: Located<ParserError>) -> Self {
        TranspilerError::Parse(error)
    }
}

impl From<Located<CodeGenError>> for TranspilerError {
    fn from(error: Located<CodeGenError>) -> Self {
        TranspilerError::CodeGen(error)
    }
}

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> Location;
}

/// Presentación de errores sobre el texto fuente que los originó.
pub struct Diagnostics<'a> {
    source: Source<'a>,
    errors: Vec<Box<dyn 'a + LocatedError>>,
}

impl<'a> Diagnostics<'a> {
    pub fn new(source: Source<'a>) -> Self {
        Diagnostics {
            source,
            errors: Vec::new(),
        }
    }

    pub fn error<E: 'a + LocatedError>(mut self, error: E) -> Self {
        self.errors.push(Box::new(error));
        self
    }
}

impl Display for Diagnostics<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { source, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "error: {}", error.source())?;

            let location = error.location();
            let (start, end) = (location.start(), location.end());
            writeln!(fmt, " --> {}:{}", source.name(), location)?;

            let digits = start.line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            // Errores al final de la entrada pueden no tener línea
            let line = match source.line(start.line()) {
                Some(line) => line,
                None => {
                    writeln!(fmt)?;
                    continue;
                }
            };

            writeln!(fmt, "{:>digits$} | {}", start.line(), line, digits = digits)?;

            let skip = (start.column() - 1) as usize;
            let highlight = if end.line() == start.line() && end.column() > start.column() {
                (end.column() - start.column()) as usize
            } else {
                line.chars().count().saturating_sub(skip).max(1)
            };

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        writeln!(fmt, "Transpilation failed")
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.val()
    }

    fn location(&self) -> Location {
        Located::location(self)
    }
}

impl sealed::Sealed for TranspilerError {}

impl LocatedError for TranspilerError {
    fn source(&self) -> &dyn Error {
        self.cause()
    }

    fn location(&self) -> Location {
        TranspilerError::location(self)
    }
}
