//! Transpilador de un subconjunto de Python hacia JavaScript.
//!
//! # Front end
//! Cada programa deriva de un único texto fuente. Este texto se somete
//! primero a análisis léxico en [`lex`], de lo cual se obtiene un flujo
//! de tokens en el que la indentación significativa ya fue resuelta en
//! marcadores explícitos de inicio y fin de bloque. El flujo de tokens se
//! dispone en un AST, descrito en [`ast`], por medio de análisis
//! sintáctico en [`parse`].
//!
//! # Back end
//! El AST se recorre una única vez en [`codegen`], donde cada constructo
//! se traduce según un conjunto fijo de reglas. La salida es determinista.
//!
//! Todo el proceso es una función pura de su entrada: no hay estado
//! global, archivos ni E/S. Cualquier error de cualquier fase aborta las
//! fases restantes y se reporta como un único [`TranspilerError`].

#[macro_use]
mod macros;

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod source;

pub use codegen::Options;
pub use error::TranspilerError;

/// Traduce un programa con las opciones por defecto.
pub fn transpile(source: &str) -> Result<String, TranspilerError> {
    transpile_with(source, Options::empty())
}

/// Traduce un programa con las opciones indicadas.
pub fn transpile_with(source: &str, options: Options) -> Result<String, TranspilerError> {
    let tokens = lex::tokenize(source)?;
    let program = parse::parse(&tokens)?;
    let output = codegen::generate(&program, options)?;

    Ok(output)
}
