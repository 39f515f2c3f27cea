/// Emite una línea completa de salida, con la indentación actual.
macro_rules! emit {
    ($emitter:expr, $($format:tt)*) => {
        $emitter.line(format_args!($($format)*))
    };
}
