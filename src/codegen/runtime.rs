//! Soporte de ejecución para el código generado.
//!
//! Algunos constructos no tienen equivalente directo en el lenguaje
//! objetivo y requieren funciones auxiliares. Estas se emiten al inicio
//! de la salida, una sola vez y solo si el programa las utiliza.

/// Nombre de la función que materializa `range()` como arreglo.
pub const RANGE_HELPER: &str = "__range";

/// Definición de [`RANGE_HELPER`].
///
/// Acepta las mismas tres formas que `range()`: solo el final, inicio y
/// final, o inicio, final y paso.
pub const RANGE_SOURCE: &str = "\
function __range(start, stop, step = 1) {
    if (stop === undefined) {
        stop = start;
        start = 0;
    }
    if (step === 0) {
        throw new RangeError(\"range() arg 3 must not be zero\");
    }
    const result = [];
    if (step > 0) {
        for (let i = start; i < stop; i += step) {
            result.push(i);
        }
    } else {
        for (let i = start; i > stop; i += step) {
            result.push(i);
        }
    }
    return result;
}
";

/// Nombres que el código generado no puede utilizar como identificadores.
///
/// Incluye palabras reservadas del lenguaje objetivo y los globales de
/// los que dependen las traducciones de funciones integradas.
pub const RESERVED: &[&str] = &[
    "arguments", "await", "case", "catch", "class", "const", "console", "debugger",
    "default", "delete", "do", "enum", "eval", "export", "extends", "false", "finally",
    "function", "implements", "import", "instanceof", "interface", "let", "Math", "NaN",
    "new", "null", "Number", "package", "private", "protected", "public", "static",
    "String", "super", "switch", "this", "throw", "true", "try", "typeof", "undefined",
    "Infinity", "var", "void", "with", "yield", RANGE_HELPER,
];

/// Traduce un identificador fuente a uno válido en el lenguaje objetivo.
///
/// Los identificadores fuente nunca contienen `$`, por lo cual el sufijo
/// no puede colisionar con otro nombre del programa.
pub fn mangle(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}$", name)
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_get_a_suffix() {
        assert_eq!(mangle("new"), "new$");
        assert_eq!(mangle("console"), "console$");
        assert_eq!(mangle("__range"), "__range$");
        assert_eq!(mangle("total"), "total");
    }
}
