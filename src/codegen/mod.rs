//! Generación de código.
//!
//! El generador recorre el AST una sola vez y emite texto en el lenguaje
//! objetivo a partir de un conjunto fijo de reglas de traducción. La
//! salida es determinista: indentación de ancho fijo, una sentencia por
//! línea y llaves de apertura en la misma línea que su encabezado.
//!
//! # Variables
//! El lenguaje fuente no declara variables; toda variable asignada dentro
//! de una función es local a la función completa. Para preservar esta
//! semántica, cada función (y el programa, en su nivel superior) declara
//! al inicio todas las variables que asigna, en orden de aparición.

use std::{
    collections::HashSet,
    fmt,
};

use bitflags::bitflags;
use thiserror::Error;

use crate::{
    ast::{AugOp, BinOp, Block, Expr, FunctionDef, Program, Statement, Target, UnaryOp},
    lex::Identifier,
    source::{Located, Location},
};

mod builtins;
mod runtime;

use builtins::{describe_arity, Builtin, Method};
use runtime::{mangle, RANGE_HELPER, RANGE_SOURCE};

/// Unidad de indentación de la salida.
const INDENT: &str = "    ";

bitflags! {
    /// Opciones de emisión.
    #[derive(Default)]
    pub struct Options: u32 {
        /// Anteponer un comentario que identifica la salida como generada.
        const HEADER = 0x01;

        /// Anteponer la directiva de modo estricto.
        const STRICT = 0x02;
    }
}

/// Error de generación de código.
///
/// Ningún tipo de nodo es inherentemente inválido en esta fase; estos
/// errores describen combinaciones de constructos soportados que no
/// tienen traducción fiel.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodeGenError {
    #[error("Default value of parameter `{parameter}` refers to parameter `{referenced}`")]
    DefaultReferencesParameter {
        parameter: Identifier,
        referenced: Identifier,
    },

    #[error("`{0}` outside of a loop")]
    OutsideLoop(&'static str),

    #[error("`{callee}` takes {expected} ({found} given)")]
    Arity {
        callee: String,
        expected: String,
        found: usize,
        node: &'static str,
    },

    #[error("`range()` step must not be zero")]
    ZeroStep { node: &'static str },

    #[error("Method `.{0}()` is not supported")]
    UnsupportedMethod(Identifier),

    #[error("Assignment to a negative index is not supported")]
    NegativeIndexAssignment,

    #[error("Operator `{operator}` cannot be applied to a list or string here")]
    SequenceOperator {
        operator: &'static str,
        node: &'static str,
    },
}

impl CodeGenError {
    /// Tipo de nodo del AST que originó el error.
    pub fn node_kind(&self) -> &'static str {
        use CodeGenError::*;

        match self {
            DefaultReferencesParameter { .. } => "FunctionDef",
            OutsideLoop("break") => "Break",
            OutsideLoop(_) => "Continue",
            Arity { node, .. } | ZeroStep { node } | SequenceOperator { node, .. } => node,
            UnsupportedMethod(_) => "MethodCall",
            NegativeIndexAssignment => "Index",
        }
    }
}

type Generate<T> = Result<T, Located<CodeGenError>>;

/// Niveles de precedencia del lenguaje objetivo.
mod precedence {
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const EQUALITY: u8 = 8;
    pub const RELATIONAL: u8 = 9;
    pub const ADDITIVE: u8 = 11;
    pub const MULTIPLICATIVE: u8 = 12;
    pub const UNARY: u8 = 14;
    pub const MEMBER: u8 = 17;
    pub const ATOM: u8 = 20;
}

use precedence::*;

/// Traduce un programa completo.
pub fn generate(program: &Program, options: Options) -> Generate<String> {
    let mut functions = HashSet::new();
    collect_functions(&program.body, &mut functions);

    let mut emitter = Emitter {
        output: String::new(),
        depth: 0,
        functions,
        loops: 0,
        temporaries: 0,
        uses_range: false,
    };

    emitter.scope(&program.body, &[])?;

    let mut output = String::new();
    if options.contains(Options::HEADER) {
        output.push_str("// Generated JavaScript\n\n");
    }

    if options.contains(Options::STRICT) {
        output.push_str("\"use strict\";\n\n");
    }

    if emitter.uses_range {
        output.push_str(RANGE_SOURCE);
        if !emitter.output.is_empty() {
            output.push('\n');
        }
    }

    output.push_str(&emitter.output);
    Ok(output)
}

/// Estado de un único recorrido del AST.
struct Emitter<'a> {
    output: String,
    depth: usize,
    functions: HashSet<&'a str>,
    loops: u32,
    temporaries: u32,
    uses_range: bool,
}

impl<'a> Emitter<'a> {
    /// Emite un cuerpo de función o el programa, con sus declaraciones.
    fn scope(&mut self, body: &Block, parameters: &[&str]) -> Generate<()> {
        let mut assigned = Vec::new();
        let mut functions = HashSet::new();
        collect_declarations(body, &mut assigned, &mut functions);

        let declared: Vec<_> = assigned
            .into_iter()
            .filter(|name| !parameters.contains(name) && !functions.contains(name))
            .map(mangle)
            .collect();

        if !declared.is_empty() {
            emit!(self, "let {};", declared.join(", "));
        }

        self.statements(body)
    }

    fn statements(&mut self, body: &Block) -> Generate<()> {
        let mut after_function = false;
        for statement in body {
            let is_function = matches!(statement.val(), Statement::FunctionDef(_));

            // Las funciones de nivel superior se separan con líneas en blanco
            if self.depth == 0 && !self.output.is_empty() && (is_function || after_function) {
                self.output.push('\n');
            }

            self.statement(statement)?;
            after_function = is_function;
        }

        Ok(())
    }

    fn block(&mut self, body: &Block) -> Generate<()> {
        self.depth += 1;
        self.statements(body)?;
        self.depth -= 1;

        Ok(())
    }

    fn loop_body(&mut self, body: &Block) -> Generate<()> {
        self.loops += 1;
        self.block(body)?;
        self.loops -= 1;

        Ok(())
    }

    fn statement(&mut self, statement: &Located<Statement>) -> Generate<()> {
        let location = statement.location();
        match statement.val() {
            Statement::FunctionDef(def) => self.function(def)?,

            // Un `return` de nivel superior se emite tal cual; el anfitrión
            // puede evaluar la salida como cuerpo de función
            Statement::Return(value) => {
                match value {
                    Some(value) => {
                        let value = self.expr(value)?;
                        emit!(self, "return {};", value);
                    }

                    None => emit!(self, "return;"),
                }
            }

            Statement::If {
                condition,
                body,
                elifs,
                orelse,
            } => {
                let condition = self.expr(condition)?;
                emit!(self, "if ({}) {{", condition);
                self.block(body)?;

                for (condition, body) in elifs {
                    let condition = self.expr(condition)?;
                    emit!(self, "}} else if ({}) {{", condition);
                    self.block(body)?;
                }

                if let Some(body) = orelse {
                    emit!(self, "}} else {{");
                    self.block(body)?;
                }

                emit!(self, "}}");
            }

            Statement::While { condition, body } => {
                let condition = self.expr(condition)?;
                emit!(self, "while ({}) {{", condition);
                self.loop_body(body)?;
                emit!(self, "}}");
            }

            Statement::ForRange {
                variable,
                start,
                stop,
                step,
                body,
            } => {
                // Una definición del usuario oculta a `range()`
                if self.functions.contains("range") {
                    let args = start
                        .iter()
                        .chain(Some(stop))
                        .chain(step.iter())
                        .map(|arg| self.expr(arg))
                        .collect::<Result<Vec<_>, _>>()?;

                    let variable = mangle(variable.val().as_str());
                    emit!(self, "for ({} of range({})) {{", variable, args.join(", "));
                    self.loop_body(body)?;
                    emit!(self, "}}");
                } else {
                    self.counting_loop(variable, start.as_ref(), stop, step.as_ref(), body)?;
                }
            }

            Statement::ForEach {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.expr(iterable)?;
                emit!(self, "for ({} of {}) {{", mangle(variable.val().as_str()), iterable);
                self.loop_body(body)?;
                emit!(self, "}}");
            }

            Statement::Assign { target, value } => {
                let target = self.target(target)?;
                let value = self.expr(value)?;
                emit!(self, "{} = {};", target, value);
            }

            Statement::AugAssign { target, op, value } => {
                let target = self.target(target)?;
                match (op, sequence(value)) {
                    // La lista se extiende en su lugar
                    (AugOp::Add, Some(Sequence::List)) => {
                        let items = match value.val() {
                            Expr::List(elements) => self.list(elements)?,
                            _ => format!("...{}", self.expr(value)?),
                        };

                        emit!(self, "{}.push({});", target, items);
                    }

                    (AugOp::Sub, Some(_)) => {
                        let error = CodeGenError::SequenceOperator {
                            operator: "-=",
                            node: "AugAssign",
                        };

                        return Err(Located::at(error, value.location()));
                    }

                    (op, _) => {
                        let symbol = match op {
                            AugOp::Add => "+=",
                            AugOp::Sub => "-=",
                        };

                        let value = self.expr(value)?;
                        emit!(self, "{} {} {};", target, symbol, value);
                    }
                }
            }

            Statement::Expr(expr) => {
                let expr = self.expr(expr)?;
                emit!(self, "{};", expr);
            }

            Statement::Break => {
                self.loop_control("break", location)?;
                emit!(self, "break;");
            }

            Statement::Continue => {
                self.loop_control("continue", location)?;
                emit!(self, "continue;");
            }

            Statement::Pass => (),
        }

        Ok(())
    }

    fn function(&mut self, def: &FunctionDef) -> Generate<()> {
        let names: Vec<&str> = def
            .parameters
            .iter()
            .map(|parameter| parameter.name.val().as_str())
            .collect();

        let mut parameters = Vec::with_capacity(def.parameters.len());
        for parameter in &def.parameters {
            let name = mangle(parameter.name.val().as_str());
            let default = match &parameter.default {
                Some(default) => default,
                None => {
                    parameters.push(name);
                    continue;
                }
            };

            // Los valores por defecto se evalúan en el ámbito externo en el
            // lenguaje fuente, pero en el ámbito de parámetros en el objetivo
            if let Some(referenced) = find_name(default, &names) {
                let error = CodeGenError::DefaultReferencesParameter {
                    parameter: parameter.name.val().clone(),
                    referenced: referenced.val().clone(),
                };

                return Err(Located::at(error, referenced.location()));
            }

            let default = self.expr(default)?;
            parameters.push(format!("{} = {}", name, default));
        }

        emit!(
            self,
            "function {}({}) {{",
            mangle(def.name.val().as_str()),
            parameters.join(", ")
        );

        let loops = self.loops;
        self.loops = 0;

        self.depth += 1;
        self.scope(&def.body, &names)?;
        self.depth -= 1;

        self.loops = loops;

        emit!(self, "}}");
        Ok(())
    }

    /// Ciclo de conteo sobre `range()`.
    ///
    /// Los argumentos de `range()` se evalúan una sola vez y el cuerpo no
    /// puede alterar la iteración. Los límites que podrían cambiar entre
    /// iteraciones se fijan en constantes antes del ciclo; si el cuerpo
    /// reasigna la variable, el ciclo avanza sobre un contador oculto.
    fn counting_loop(
        &mut self,
        variable: &Located<Identifier>,
        start: Option<&Located<Expr>>,
        stop: &Located<Expr>,
        step: Option<&Located<Expr>>,
        body: &Block,
    ) -> Generate<()> {
        if let Some(step) = step {
            if literal_value(step) == Some(0.0) {
                let error = CodeGenError::ZeroStep { node: "ForRange" };
                return Err(Located::at(error, step.location()));
            }
        }

        let fix_stop = !is_stable(stop, body);
        let fix_step = step.map_or(false, |step| !is_stable(step, body));

        // Se preserva el orden de evaluación de los argumentos
        let start = match start {
            Some(start) if (fix_stop || fix_step) && !is_stable(start, &[]) => {
                self.bind("start", start)?
            }

            Some(start) => self.expr(start)?,
            None => String::from("0"),
        };

        let stop = if fix_stop {
            self.bind("stop", stop)?
        } else {
            self.operand(stop, RELATIONAL + 1)?
        };

        let name = variable.val().as_str();
        let hidden = assigns(body, name);
        let counter = if hidden {
            self.temporaries += 1;
            format!("${}{}", name, self.temporaries)
        } else {
            mangle(name)
        };

        let (test, update) = match step.map(|step| (step, literal_value(step))) {
            None => (format!("{} < {}", counter, stop), format!("{}++", counter)),

            Some((_, Some(value))) if value == 1.0 => {
                (format!("{} < {}", counter, stop), format!("{}++", counter))
            }

            Some((_, Some(value))) if value == -1.0 => {
                (format!("{} > {}", counter, stop), format!("{}--", counter))
            }

            Some((step, Some(value))) if value > 0.0 => {
                let step = self.expr(step)?;
                (format!("{} < {}", counter, stop), format!("{} += {}", counter, step))
            }

            Some((step, Some(_))) => {
                let update = match negated_number(step) {
                    Some(magnitude) => format!("{} -= {}", counter, magnitude),
                    None => format!("{} += {}", counter, self.expr(step)?),
                };

                (format!("{} > {}", counter, stop), update)
            }

            // El sentido del ciclo solo se conoce en tiempo de ejecución
            Some((step, None)) => {
                let step = if fix_step {
                    self.bind("step", step)?
                } else {
                    self.operand(step, RELATIONAL + 1)?
                };

                emit!(self, "if ({} === 0) {{", step);
                self.depth += 1;
                emit!(self, "throw new RangeError(\"range() arg 3 must not be zero\");");
                self.depth -= 1;
                emit!(self, "}}");

                let test = format!("({0} > 0 ? {1} < {2} : {1} > {2})", step, counter, stop);
                (test, format!("{} += {}", counter, step))
            }
        };

        let init = if hidden {
            format!("let {}", counter)
        } else {
            counter.clone()
        };

        emit!(self, "for ({} = {}; {}; {}) {{", init, start, test, update);

        self.loops += 1;
        self.depth += 1;
        if hidden {
            emit!(self, "{} = {};", mangle(name), counter);
        }

        self.statements(body)?;
        self.depth -= 1;
        self.loops -= 1;

        emit!(self, "}}");
        Ok(())
    }

    /// Fija el valor de una expresión en una constante nueva.
    fn bind(&mut self, role: &str, expr: &Located<Expr>) -> Generate<String> {
        let value = self.expr(expr)?;

        self.temporaries += 1;
        let name = format!("${}{}", role, self.temporaries);
        emit!(self, "const {} = {};", name, value);

        Ok(name)
    }

    fn loop_control(&self, keyword: &'static str, location: Location) -> Generate<()> {
        if self.loops == 0 {
            Err(Located::at(CodeGenError::OutsideLoop(keyword), location))
        } else {
            Ok(())
        }
    }

    fn target(&mut self, target: &Located<Target>) -> Generate<String> {
        match target.val() {
            Target::Name(id) => Ok(mangle(id.as_str())),

            Target::Index { target, index } => {
                if negated_number(index).is_some() {
                    let error = CodeGenError::NegativeIndexAssignment;
                    return Err(Located::at(error, index.location()));
                }

                let receiver = self.receiver(target)?;
                let index = self.expr(index)?;
                Ok(format!("{}[{}]", receiver, index))
            }
        }
    }

    fn expr(&mut self, expr: &Located<Expr>) -> Generate<String> {
        self.expr_with_precedence(expr).map(|(text, _)| text)
    }

    /// Emite una expresión, con paréntesis si su precedencia es menor a `min`.
    fn operand(&mut self, expr: &Located<Expr>, min: u8) -> Generate<String> {
        let (text, precedence) = self.expr_with_precedence(expr)?;
        if precedence < min {
            Ok(format!("({})", text))
        } else {
            Ok(text)
        }
    }

    /// Emite una expresión sobre la que se accede a un miembro o índice.
    fn receiver(&mut self, expr: &Located<Expr>) -> Generate<String> {
        match expr.val() {
            // `5.length` no es válido
            Expr::Number(_) => Ok(format!("({})", self.expr(expr)?)),
            _ => self.operand(expr, MEMBER),
        }
    }

    fn list(&mut self, exprs: &[Located<Expr>]) -> Generate<String> {
        let items = exprs
            .iter()
            .map(|expr| self.expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items.join(", "))
    }

    fn expr_with_precedence(&mut self, expr: &Located<Expr>) -> Generate<(String, u8)> {
        let emitted = match expr.val() {
            Expr::Binary(lhs, op, rhs) => return self.binary(lhs, *op, rhs),

            Expr::Unary(UnaryOp::Neg, operand) if sequence(operand).is_some() => {
                let error = CodeGenError::SequenceOperator {
                    operator: "-",
                    node: "UnaryOp",
                };

                return Err(Located::at(error, expr.location()));
            }

            Expr::Unary(op, operand) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };

                let operand = self.operand(operand, UNARY + 1)?;
                (format!("{}{}", symbol, operand), UNARY)
            }

            Expr::Call { callee, args } => self.call(expr.location(), callee, args)?,

            Expr::MethodCall {
                receiver,
                method,
                args,
            } => self.method_call(expr.location(), receiver, method, args)?,

            Expr::Name(id) => (mangle(id.as_str()), ATOM),
            Expr::Number(number) => (normalize_number(number), ATOM),
            Expr::Str(string) => (quote(string), ATOM),
            Expr::Bool(value) => (value.to_string(), ATOM),
            Expr::NoneLiteral => (String::from("null"), ATOM),
            Expr::List(elements) => (format!("[{}]", self.list(elements)?), ATOM),

            Expr::Index { target, index } => {
                let receiver = self.receiver(target)?;
                match negated_number(index) {
                    Some(magnitude) => (format!("{}.at(-{})", receiver, magnitude), MEMBER),
                    None => {
                        let index = self.expr(index)?;
                        (format!("{}[{}]", receiver, index), MEMBER)
                    }
                }
            }
        };

        Ok(emitted)
    }

    fn binary(
        &mut self,
        lhs: &Located<Expr>,
        op: BinOp,
        rhs: &Located<Expr>,
    ) -> Generate<(String, u8)> {
        use BinOp::*;

        match (op, sequence(lhs), sequence(rhs)) {
            (Or | And, _, _) | (_, None, None) => (),

            (Add, Some(Sequence::List), Some(Sequence::List) | None)
            | (Add, None, Some(Sequence::List)) => {
                let receiver = self.receiver(lhs)?;
                let rhs = self.expr(rhs)?;
                return Ok((format!("{}.concat({})", receiver, rhs), MEMBER));
            }

            (Add, Some(Sequence::Str), Some(Sequence::Str) | None)
            | (Add, None, Some(Sequence::Str)) => (),

            (Mul, Some(sequence), None) => return self.repeat(sequence, lhs, rhs),
            (Mul, None, Some(sequence)) => return self.repeat(sequence, rhs, lhs),

            (op, Some(Sequence::Str) | None, Some(Sequence::Str) | None) if op.is_comparison() => (),

            (op, _, _) => {
                let error = CodeGenError::SequenceOperator {
                    operator: op.symbol(),
                    node: "BinaryOp",
                };

                let location = Location::span(lhs.location(), rhs.location());
                return Err(Located::at(error, location));
            }
        }

        let (symbol, precedence) = match op {
            Or => ("||", OR),
            And => ("&&", AND),
            Equal => ("===", EQUALITY),
            NotEqual => ("!==", EQUALITY),
            Less => ("<", RELATIONAL),
            LessOrEqual => ("<=", RELATIONAL),
            Greater => (">", RELATIONAL),
            GreaterOrEqual => (">=", RELATIONAL),
            Add => ("+", ADDITIVE),
            Sub => ("-", ADDITIVE),
            Mul => ("*", MULTIPLICATIVE),
            Div => ("/", MULTIPLICATIVE),
            Mod => ("%", MULTIPLICATIVE),

            FloorDiv => {
                let lhs = self.operand(lhs, MULTIPLICATIVE)?;
                let rhs = self.operand(rhs, MULTIPLICATIVE + 1)?;
                return Ok((format!("Math.floor({} / {})", lhs, rhs), MEMBER));
            }

            Pow => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                return Ok((format!("Math.pow({}, {})", lhs, rhs), MEMBER));
            }
        };

        let lhs = self.operand(lhs, precedence)?;
        let rhs = self.operand(rhs, precedence + 1)?;
        Ok((format!("{} {} {}", lhs, symbol, rhs), precedence))
    }

    /// Repetición de una lista o cadena.
    fn repeat(
        &mut self,
        sequence: Sequence,
        items: &Located<Expr>,
        count: &Located<Expr>,
    ) -> Generate<(String, u8)> {
        // Una cantidad negativa produce una secuencia vacía
        let count = match count.val() {
            Expr::Number(number) if !number.contains('.') => normalize_number(number),
            _ => format!("Math.max({}, 0)", self.expr(count)?),
        };

        let text = match sequence {
            Sequence::Str => format!("{}.repeat({})", self.receiver(items)?, count),
            Sequence::List => format!("Array({}).fill({}).flat()", count, self.expr(items)?),
        };

        Ok((text, MEMBER))
    }

    fn call(
        &mut self,
        location: Location,
        callee: &Located<Identifier>,
        args: &[Located<Expr>],
    ) -> Generate<(String, u8)> {
        let name = callee.val().as_str();

        // Una definición del usuario oculta a la función integrada
        let builtin = match Builtin::lookup(name) {
            Some(builtin) if !self.functions.contains(name) => builtin,
            _ => {
                let args = self.list(args)?;
                return Ok((format!("{}({})", mangle(name), args), MEMBER));
            }
        };

        let arity = builtin.arity();
        if !arity.contains(&args.len()) {
            let error = CodeGenError::Arity {
                callee: format!("{}()", builtin.name()),
                expected: describe_arity(&arity),
                found: args.len(),
                node: "Call",
            };

            return Err(Located::at(error, location));
        }

        let text = match (builtin, args) {
            (Builtin::Print, args) => format!("console.log({})", self.list(args)?),
            (Builtin::Len, [arg]) => format!("{}.length", self.receiver(arg)?),
            (Builtin::Int, [arg]) => format!("Math.trunc(Number({}))", self.expr(arg)?),
            (Builtin::Float, [arg]) => format!("Number({})", self.expr(arg)?),
            (Builtin::Str, [arg]) => format!("String({})", self.expr(arg)?),

            (Builtin::Range, args) => {
                if let Some(step) = args.get(2) {
                    if literal_value(step) == Some(0.0) {
                        let error = CodeGenError::ZeroStep { node: "Call" };
                        return Err(Located::at(error, step.location()));
                    }
                }

                self.uses_range = true;
                format!("{}({})", RANGE_HELPER, self.list(args)?)
            }

            // La aridad ya fue verificada
            (_, args) => format!("{}({})", mangle(name), self.list(args)?),
        };

        Ok((text, MEMBER))
    }

    fn method_call(
        &mut self,
        location: Location,
        receiver: &Located<Expr>,
        method: &Located<Identifier>,
        args: &[Located<Expr>],
    ) -> Generate<(String, u8)> {
        let known = match Method::lookup(method.val().as_str()) {
            Some(known) => known,
            None => {
                let error = CodeGenError::UnsupportedMethod(method.val().clone());
                return Err(Located::at(error, method.location()));
            }
        };

        let arity = known.arity();
        if !arity.contains(&args.len()) {
            let error = CodeGenError::Arity {
                callee: format!(".{}()", known.name()),
                expected: describe_arity(&arity),
                found: args.len(),
                node: "MethodCall",
            };

            return Err(Located::at(error, location));
        }

        let receiver = self.receiver(receiver)?;
        let text = match (known, args) {
            (Method::Pop, [index]) => format!("{}.splice({}, 1)[0]", receiver, self.expr(index)?),
            (known, args) => format!("{}.{}({})", receiver, known.target(), self.list(args)?),
        };

        Ok((text, MEMBER))
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        for _ in 0..self.depth {
            self.output.push_str(INDENT);
        }

        self.output.push_str(&fmt::format(args));
        self.output.push('\n');
    }
}

/// Nombres de todas las funciones definidas, a cualquier profundidad.
fn collect_functions<'a>(body: &'a Block, functions: &mut HashSet<&'a str>) {
    for statement in body {
        match statement.val() {
            Statement::FunctionDef(def) => {
                functions.insert(def.name.val().as_str());
                collect_functions(&def.body, functions);
            }

            Statement::If {
                body, elifs, orelse, ..
            } => {
                collect_functions(body, functions);
                for (_, body) in elifs {
                    collect_functions(body, functions);
                }

                if let Some(body) = orelse {
                    collect_functions(body, functions);
                }
            }

            Statement::While { body, .. }
            | Statement::ForRange { body, .. }
            | Statement::ForEach { body, .. } => collect_functions(body, functions),

            _ => (),
        }
    }
}

/// Variables asignadas y funciones definidas en un ámbito, sin entrar
/// a funciones anidadas.
fn collect_declarations<'a>(
    body: &'a Block,
    assigned: &mut Vec<&'a str>,
    functions: &mut HashSet<&'a str>,
) {
    let assign = |name: &'a str, assigned: &mut Vec<&'a str>| {
        if !assigned.contains(&name) {
            assigned.push(name);
        }
    };

    for statement in body {
        match statement.val() {
            Statement::FunctionDef(def) => {
                functions.insert(def.name.val().as_str());
            }

            Statement::Assign { target, .. } | Statement::AugAssign { target, .. } => {
                if let Target::Name(id) = target.val() {
                    assign(id.as_str(), assigned);
                }
            }

            Statement::If {
                body, elifs, orelse, ..
            } => {
                collect_declarations(body, assigned, functions);
                for (_, body) in elifs {
                    collect_declarations(body, assigned, functions);
                }

                if let Some(body) = orelse {
                    collect_declarations(body, assigned, functions);
                }
            }

            Statement::While { body, .. } => collect_declarations(body, assigned, functions),

            Statement::ForRange { variable, body, .. } | Statement::ForEach { variable, body, .. } => {
                assign(variable.val().as_str(), assigned);
                collect_declarations(body, assigned, functions);
            }

            _ => (),
        }
    }
}

/// Determina si `body` reasigna `name`, sin entrar a funciones anidadas.
fn assigns(body: &[Located<Statement>], name: &str) -> bool {
    body.iter().any(|statement| match statement.val() {
        Statement::FunctionDef(def) => def.name.val().as_str() == name,

        Statement::Assign { target, .. } | Statement::AugAssign { target, .. } => {
            matches!(target.val(), Target::Name(id) if id.as_str() == name)
        }

        Statement::If {
            body, elifs, orelse, ..
        } => {
            assigns(body, name)
                || elifs.iter().any(|(_, body)| assigns(body, name))
                || orelse.as_ref().map_or(false, |body| assigns(body, name))
        }

        Statement::While { body, .. } => assigns(body, name),

        Statement::ForRange { variable, body, .. } | Statement::ForEach { variable, body, .. } => {
            variable.val().as_str() == name || assigns(body, name)
        }

        _ => false,
    })
}

/// Determina si una expresión produce el mismo valor en cada iteración de
/// `body`: sin llamadas, índices ni nombres que `body` reasigne.
fn is_stable(expr: &Located<Expr>, body: &[Located<Statement>]) -> bool {
    match expr.val() {
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::NoneLiteral => true,
        Expr::Name(id) => !assigns(body, id.as_str()),
        Expr::Unary(_, operand) => is_stable(operand, body),
        Expr::Binary(lhs, _, rhs) => is_stable(lhs, body) && is_stable(rhs, body),
        _ => false,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Sequence {
    List,
    Str,
}

/// Tipo de secuencia de una expresión, si se conoce sin ejecutarla.
fn sequence(expr: &Located<Expr>) -> Option<Sequence> {
    match expr.val() {
        Expr::List(_) => Some(Sequence::List),
        Expr::Str(_) => Some(Sequence::Str),
        Expr::Binary(lhs, BinOp::Add | BinOp::Mul, rhs) => sequence(lhs).or_else(|| sequence(rhs)),
        _ => None,
    }
}

/// Busca la primera referencia a alguno de los nombres dados.
fn find_name(expr: &Located<Expr>, names: &[&str]) -> Option<Located<Identifier>> {
    let find_all = |exprs: &[Located<Expr>]| exprs.iter().find_map(|expr| find_name(expr, names));

    match expr.val() {
        Expr::Name(id) if names.contains(&id.as_str()) => Some(Located::at(id.clone(), expr.location())),

        Expr::Call { callee, args } => {
            if names.contains(&callee.val().as_str()) {
                Some(callee.clone())
            } else {
                find_all(args)
            }
        }

        Expr::MethodCall { receiver, args, .. } => {
            find_name(receiver, names).or_else(|| find_all(args))
        }

        Expr::Binary(lhs, _, rhs) => find_name(lhs, names).or_else(|| find_name(rhs, names)),
        Expr::Unary(_, operand) => find_name(operand, names),
        Expr::List(elements) => find_all(elements),
        Expr::Index { target, index } => {
            find_name(target, names).or_else(|| find_name(index, names))
        }

        _ => None,
    }
}

/// Valor de una constante numérica, posiblemente negada.
fn literal_value(expr: &Located<Expr>) -> Option<f64> {
    match expr.val() {
        Expr::Number(number) => number.parse().ok(),
        Expr::Unary(UnaryOp::Neg, operand) => literal_value(operand).map(|value| -value),
        _ => None,
    }
}

/// Magnitud de una constante de la forma `-n`, ya normalizada.
fn negated_number(expr: &Located<Expr>) -> Option<String> {
    match expr.val() {
        Expr::Unary(UnaryOp::Neg, operand) => match operand.val() {
            Expr::Number(number) => Some(normalize_number(number)),
            _ => None,
        },

        _ => None,
    }
}

/// Elimina ceros a la izquierda de la parte entera de una constante.
///
/// El lenguaje objetivo interpreta `010` como octal o lo rechaza, y
/// `00.5` no es una constante válida.
fn normalize_number(lexeme: &str) -> String {
    let (integer, fraction) = match lexeme.find('.') {
        Some(point) => lexeme.split_at(point),
        None => (lexeme, ""),
    };

    let integer = match integer.trim_start_matches('0') {
        "" if !integer.is_empty() => "0",
        trimmed => trimmed,
    };

    format!("{}{}", integer, fraction)
}

/// Construye un literal de cadena con comillas dobles.
fn quote(string: &str) -> String {
    let mut quoted = String::with_capacity(string.len() + 2);
    quoted.push('"');

    for c in string.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }

    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::tokenize, parse::parse};

    fn js(source: &str) -> String {
        let tokens = tokenize(source).unwrap();
        let program = parse(&tokens).unwrap();
        generate(&program, Options::empty()).unwrap()
    }

    fn error(source: &str) -> Located<CodeGenError> {
        let tokens = tokenize(source).unwrap();
        let program = parse(&tokens).unwrap();
        generate(&program, Options::empty()).unwrap_err()
    }

    #[test]
    fn parentheses_follow_target_precedence() {
        assert_eq!(js("x = (a + b) * c"), "let x;\nx = (a + b) * c;\n");
        assert_eq!(js("x = a - (b - c)"), "let x;\nx = a - (b - c);\n");
        assert_eq!(js("x = a - b - c"), "let x;\nx = a - b - c;\n");
        assert_eq!(js("x = not a == b"), "let x;\nx = !(a === b);\n");
        assert_eq!(js("x = -(-a)"), "let x;\nx = -(-a);\n");
        assert_eq!(js("x = a or b and c"), "let x;\nx = a || b && c;\n");
        assert_eq!(js("x = (a or b) and c"), "let x;\nx = (a || b) && c;\n");
    }

    #[test]
    fn arithmetic_primitives() {
        assert_eq!(js("x = a // b"), "let x;\nx = Math.floor(a / b);\n");
        assert_eq!(js("x = (a + 1) // (b * 2)"), "let x;\nx = Math.floor((a + 1) / (b * 2));\n");
        assert_eq!(js("x = a ** b ** c"), "let x;\nx = Math.pow(a, Math.pow(b, c));\n");
        assert_eq!(js("x = -a ** 2"), "let x;\nx = -Math.pow(a, 2);\n");
    }

    #[test]
    fn strings_are_reescaped() {
        assert_eq!(
            js(r#"print("a\tb\n\"c\"\\")"#),
            "console.log(\"a\\tb\\n\\\"c\\\"\\\\\");\n"
        );
        assert_eq!(js("print('it\\'s')"), "console.log(\"it's\");\n");
    }

    #[test]
    fn numbers() {
        assert_eq!(js("x = [007, 0, 3.50, .5]"), "let x;\nx = [7, 0, 3.50, .5];\n");
        assert_eq!(js("x = [00.5, 010.25, 000]"), "let x;\nx = [0.5, 10.25, 0];\n");
        assert_eq!(js("print(len(5))"), "console.log((5).length);\n");
    }

    #[test]
    fn counting_loop_steps() {
        assert!(js("for i in range(10, 0, -1):\n    pass\n").contains("for (i = 10; i > 0; i--) {"));
        assert!(js("for i in range(10, 0, -2):\n    pass\n").contains("for (i = 10; i > 0; i -= 2) {"));
        assert!(js("for i in range(0, 10, 3):\n    pass\n").contains("for (i = 0; i < 10; i += 3) {"));
        assert!(js("for i in range(a, b, s):\n    pass\n")
            .contains("for (i = a; (s > 0 ? i < b : i > b); i += s) {"));
    }

    #[test]
    fn dynamic_steps_reject_zero() {
        assert_eq!(
            js("for i in range(a, b, s):\n    pass\n"),
            "let i;\nif (s === 0) {\n    throw new RangeError(\"range() arg 3 must not be zero\");\n}\n\
             for (i = a; (s > 0 ? i < b : i > b); i += s) {\n}\n"
        );
        assert!(RANGE_SOURCE.contains("if (step === 0) {"));
    }

    #[test]
    fn range_arguments_are_evaluated_once() {
        assert_eq!(
            js("xs = [1]\nfor i in range(len(xs)):\n    xs.append(i)\n"),
            "let xs, i;\nxs = [1];\nconst $stop1 = xs.length;\n\
             for (i = 0; i < $stop1; i++) {\n    xs.push(i);\n}\n"
        );

        // Un límite reasignado en el cuerpo también se fija
        assert!(js("for i in range(n):\n    n = 0\n").contains("const $stop1 = n;\nfor (i = 0; i < $stop1; i++) {"));

        let output = js("for i in range(f(), g(), h()):\n    pass\n");
        assert!(output.contains(
            "const $start1 = f();\nconst $stop2 = g();\nconst $step3 = h();\nif ($step3 === 0) {"
        ));
        assert!(output.contains("for (i = $start1; ($step3 > 0 ? i < $stop2 : i > $stop2); i += $step3) {"));

        assert!(js("for i in range(2, n + 1):\n    pass\n").contains("for (i = 2; i < n + 1; i++) {"));
    }

    #[test]
    fn loop_variable_reassignment_does_not_alter_iteration() {
        assert_eq!(
            js("for i in range(3):\n    print(i)\n    i = 10\n"),
            "let i;\nfor (let $i1 = 0; $i1 < 3; $i1++) {\n    i = $i1;\n    console.log(i);\n    i = 10;\n}\n"
        );

        let output = js("for i in range(3):\n    if i:\n        i += 1\n");
        assert!(output.contains("for (let $i1 = 0; $i1 < 3; $i1++) {\n    i = $i1;\n"));
    }

    #[test]
    fn user_range_is_iterated() {
        let output = js("def range(n):\n    return [n]\nfor i in range(1, 2):\n    print(i)\n");
        assert!(output.contains("for (i of range(1, 2)) {\n    console.log(i);\n}\n"));
        assert!(!output.contains(RANGE_HELPER));
    }

    #[test]
    fn sequence_operators() {
        assert_eq!(js("x = [1] + [2]\n"), "let x;\nx = [1].concat([2]);\n");
        assert_eq!(js("x = xs + [2]\n"), "let x;\nx = xs.concat([2]);\n");
        assert_eq!(js("x = \"-\" * 3\n"), "let x;\nx = \"-\".repeat(3);\n");
        assert_eq!(js("x = n * \"ab\"\n"), "let x;\nx = \"ab\".repeat(Math.max(n, 0));\n");
        assert_eq!(js("x = [0] * 3\n"), "let x;\nx = Array(3).fill([0]).flat();\n");
        assert_eq!(js("x = \"a\" + s\n"), "let x;\nx = \"a\" + s;\n");
        assert_eq!(js("xs += [1, 2]\n"), "let xs;\nxs.push(1, 2);\n");
        assert_eq!(js("xs += ys + [1]\n"), "let xs;\nxs.push(...ys.concat([1]));\n");

        let error = self::error("x = [1] - [2]\n");
        assert_eq!(
            *error.val(),
            CodeGenError::SequenceOperator {
                operator: "-",
                node: "BinaryOp"
            }
        );
        assert_eq!(
            error.val().to_string(),
            "Operator `-` cannot be applied to a list or string here"
        );

        let error = self::error("x = [1] + \"a\"\n");
        assert_eq!(error.val().node_kind(), "BinaryOp");

        let error = self::error("x = [1] < [2]\n");
        assert_eq!(error.val().node_kind(), "BinaryOp");

        let error = self::error("x = -[1]\n");
        assert_eq!(error.val().node_kind(), "UnaryOp");

        let error = self::error("s -= \"a\"\n");
        assert_eq!(error.val().node_kind(), "AugAssign");
    }

    #[test]
    fn range_as_value_uses_helper() {
        let output = js("xs = range(5)\n");
        assert!(output.starts_with(RANGE_SOURCE));
        assert!(output.ends_with("let xs;\nxs = __range(5);\n"));

        assert!(!js("for i in range(5):\n    pass\n").contains(RANGE_HELPER));
    }

    #[test]
    fn variables_are_declared_once_per_function() {
        let source = "def f(a):\n    if a:\n        b = 1\n    else:\n        b = 2\n    b += a\n    for i in [1]:\n        c = i\n    return b\n";
        let output = js(source);
        assert!(output.starts_with("function f(a) {\n    let b, i, c;\n"));
        assert_eq!(output.matches("let").count(), 1);
    }

    #[test]
    fn user_functions_shadow_builtins() {
        let output = js("def len(x):\n    return 0\nprint(len(xs))\n");
        assert!(output.contains("console.log(len(xs));"));
    }

    #[test]
    fn reserved_words_are_mangled() {
        assert_eq!(js("new = this + 1\n"), "let new$;\nnew$ = this$ + 1;\n");
    }

    #[test]
    fn methods() {
        assert_eq!(js("xs.append(1)\n"), "xs.push(1);\n");
        assert_eq!(js("x = xs.pop(0)\n"), "let x;\nx = xs.splice(0, 1)[0];\n");
        assert_eq!(js("x = s.strip().upper()\n"), "let x;\nx = s.trim().toUpperCase();\n");
    }

    #[test]
    fn negative_indices() {
        assert_eq!(js("x = xs[-1]\n"), "let x;\nx = xs.at(-1);\n");
        assert_eq!(*error("xs[-1] = 0\n").val(), CodeGenError::NegativeIndexAssignment);
    }

    #[test]
    fn unsupported_combinations() {
        let error = error("def f(a, b=a):\n    return b\n");
        assert_eq!(
            *error.val(),
            CodeGenError::DefaultReferencesParameter {
                parameter: Identifier::new("b"),
                referenced: Identifier::new("a")
            }
        );
        assert_eq!(error.val().node_kind(), "FunctionDef");

        let error = self::error("if x:\n    break\n");
        assert_eq!(*error.val(), CodeGenError::OutsideLoop("break"));
        assert_eq!(error.val().node_kind(), "Break");

        let error = self::error("def f():\n    while x:\n        def g():\n            continue\n");
        assert_eq!(*error.val(), CodeGenError::OutsideLoop("continue"));

        let error = self::error("print(len(a, b))\n");
        assert_eq!(error.val().to_string(), "`len()` takes exactly 1 argument (2 given)");
        assert_eq!(error.val().node_kind(), "Call");

        let error = self::error("for i in range(0, 5, 0):\n    pass\n");
        assert_eq!(*error.val(), CodeGenError::ZeroStep { node: "ForRange" });

        let error = self::error("xs.sort()\n");
        assert_eq!(
            *error.val(),
            CodeGenError::UnsupportedMethod(Identifier::new("sort"))
        );
    }

    #[test]
    fn options() {
        let tokens = tokenize("print(1)").unwrap();
        let program = parse(&tokens).unwrap();

        let output = generate(&program, Options::HEADER | Options::STRICT).unwrap();
        assert_eq!(
            output,
            "// Generated JavaScript\n\n\"use strict\";\n\nconsole.log(1);\n"
        );
    }
}
