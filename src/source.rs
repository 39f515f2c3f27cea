//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el transpilador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite determinar un punto
//! exacto o aproximado en donde ocurre un error.
//!
//! A diferencia de otras fases, aquí no existe noción de archivo:
//! la entrada completa es un único texto en memoria. Las ubicaciones
//! son por tanto simples rangos de posiciones, `Copy` y sin referencias
//! al texto original, lo cual permite que los errores crucen hilos.

use std::fmt::{self, Debug, Display, Formatter};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación es un rango semiabierto de posiciones.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Location {
    start: Position,
    end: Position,
}

impl Location {
    /// Ubicación de un único carácter.
    pub fn point(start: Position) -> Self {
        Location {
            start,
            end: start.advance(),
        }
    }

    /// Ubicación de `start` hasta justo antes de `end`.
    pub fn new(start: Position, end: Position) -> Self {
        Location { start, end }
    }

    /// Unifica un rango de ubicaciones.
    pub fn span(from: Location, to: Location) -> Self {
        Location {
            start: from.start,
            end: to.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.end
    }

    /// Determina si este rango está contenido en otro.
    pub fn within(&self, outer: Location) -> bool {
        outer.start() <= self.start() && self.end() <= outer.end()
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::point(Position::default())
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let Location { start, end } = *self;
        if end.line() != start.line() || end == start.advance() || end == start {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "{}-{}", start, end.back().column())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna, ambas a partir de 1.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Construye una posición arbitraria.
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

impl Debug for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Texto fuente con nombre, utilizado únicamente para reportar errores.
pub struct Source<'a> {
    name: &'a str,
    text: &'a str,
}

impl<'a> Source<'a> {
    /// Asocia un nombre a un texto de entrada.
    pub fn new(name: &'a str, text: &'a str) -> Self {
        Source { name, text }
    }

    /// Obtiene el nombre del origen.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Obtiene una línea a partir de su número, si existe.
    pub fn line(&self, line_number: u32) -> Option<&'a str> {
        let index = (line_number as usize).checked_sub(1)?;
        self.text.lines().nth(index)
    }
}

/// Un iterador de caracteres que lleva cuenta de la posición de cada uno.
///
/// Cada carácter emitido incluye su propia posición. Los tabuladores
/// ocupan una sola columna, de manera que las columnas reportadas
/// corresponden a caracteres y no a ancho visual.
#[derive(Clone)]
pub struct Chars<'a> {
    chars: std::str::Chars<'a>,
    next: Position,
}

impl<'a> Chars<'a> {
    /// Comienza a recorrer un texto desde la posición `1:1`.
    pub fn new(text: &'a str) -> Self {
        Chars {
            chars: text.chars(),
            next: Position::default(),
        }
    }
}

impl Iterator for Chars<'_> {
    type Item = (char, Position);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.chars.next()?;
        let here = self.next;

        self.next = match c {
            '\n' => here.newline(),
            _ => here.advance(),
        };

        Some((c, here))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_track_lines_and_columns() {
        let positions: Vec<_> = Chars::new("ab\nc").collect();
        assert_eq!(positions[0], ('a', Position::new(1, 1)));
        assert_eq!(positions[1], ('b', Position::new(1, 2)));
        assert_eq!(positions[2], ('\n', Position::new(1, 3)));
        assert_eq!(positions[3], ('c', Position::new(2, 1)));
    }

    #[test]
    fn span_covers_both_ends() {
        let from = Location::point(Position::new(1, 3));
        let to = Location::point(Position::new(2, 5));
        let span = Location::span(from, to);

        assert_eq!(span.start(), Position::new(1, 3));
        assert_eq!(span.end(), Position::new(2, 6));
        assert!(from.within(span));
        assert!(to.within(span));
    }

    #[test]
    fn source_lines_are_one_based() {
        let source = Source::new("<test>", "first\nsecond");
        assert_eq!(source.line(1), Some("first"));
        assert_eq!(source.line(2), Some("second"));
        assert_eq!(source.line(0), None);
        assert_eq!(source.line(3), None);
    }
}
