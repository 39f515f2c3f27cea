//! Funciones y métodos integrados.
//!
//! Cada función integrada del lenguaje fuente tiene una traducción fija
//! hacia primitivas del lenguaje objetivo. Lo mismo ocurre con el
//! pequeño conjunto de métodos de listas y cadenas que se soportan.

use std::ops::RangeInclusive;

/// Una función integrada.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Int,
    Float,
    Str,
    Range,
}

impl Builtin {
    /// Busca una función integrada por nombre.
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "print" => Builtin::Print,
            "len" => Builtin::Len,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "range" => Builtin::Range,
            _ => return None,
        };

        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Range => "range",
        }
    }

    /// Cantidades de argumentos aceptadas.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Builtin::Print => 0..=usize::MAX,
            Builtin::Range => 1..=3,
            Builtin::Len | Builtin::Int | Builtin::Float | Builtin::Str => 1..=1,
        }
    }
}

/// Un método soportado sobre listas o cadenas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Append,
    Pop,
    Upper,
    Lower,
    Strip,
}

impl Method {
    pub fn lookup(name: &str) -> Option<Self> {
        let method = match name {
            "append" => Method::Append,
            "pop" => Method::Pop,
            "upper" => Method::Upper,
            "lower" => Method::Lower,
            "strip" => Method::Strip,
            _ => return None,
        };

        Some(method)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Append => "append",
            Method::Pop => "pop",
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::Strip => "strip",
        }
    }

    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Method::Append => 1..=1,
            Method::Pop => 0..=1,
            Method::Upper | Method::Lower | Method::Strip => 0..=0,
        }
    }

    /// Nombre del método equivalente en el lenguaje objetivo.
    ///
    /// `pop` con índice explícito no tiene equivalente directo y se
    /// resuelve aparte.
    pub fn target(self) -> &'static str {
        match self {
            Method::Append => "push",
            Method::Pop => "pop",
            Method::Upper => "toUpperCase",
            Method::Lower => "toLowerCase",
            Method::Strip => "trim",
        }
    }
}

/// Describe una aridad para mensajes de error.
pub fn describe_arity(arity: &RangeInclusive<usize>) -> String {
    let (min, max) = (*arity.start(), *arity.end());
    let plural = |n: usize| if n == 1 { "" } else { "s" };

    if min == max {
        format!("exactly {} argument{}", min, plural(min))
    } else if max == usize::MAX {
        format!("at least {} argument{}", min, plural(min))
    } else {
        format!("from {} to {} arguments", min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        assert_eq!(Builtin::lookup("len"), Some(Builtin::Len));
        assert_eq!(Builtin::lookup("Len"), None);
        assert_eq!(Method::lookup("append").map(Method::target), Some("push"));
        assert_eq!(Method::lookup("sort"), None);
    }

    #[test]
    fn arity_descriptions() {
        assert_eq!(describe_arity(&Builtin::Len.arity()), "exactly 1 argument");
        assert_eq!(describe_arity(&Builtin::Range.arity()), "from 1 to 3 arguments");
        assert_eq!(describe_arity(&Method::Upper.arity()), "exactly 0 arguments");
    }
}
