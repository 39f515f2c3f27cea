//! Árbol sintáctico abstracto.
//!
//! El árbol es el producto de [`crate::parse`] y el único insumo de
//! [`crate::codegen`]. Todo nodo se envuelve en [`Located`], por lo cual
//! cada uno lleva su rango de ubicación original. El rango de un nodo
//! siempre está contenido en el de su padre.
//!
//! Los bloques son secuencias explícitas de sentencias; una vez que el
//! parser termina no queda ningún rastro de la indentación original.

use crate::{lex::Identifier, source::Located};

/// Secuencia ordenada de sentencias.
pub type Block = Vec<Located<Statement>>;

/// Un programa completo.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Block,
}

/// Definición de función.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Located<Identifier>,
    pub parameters: Vec<Parameter>,
    pub body: Block,
}

/// Parámetro formal, con valor por defecto opcional.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Located<Identifier>,
    pub default: Option<Located<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    FunctionDef(FunctionDef),

    Return(Option<Located<Expr>>),

    If {
        condition: Located<Expr>,
        body: Block,
        elifs: Vec<(Located<Expr>, Block)>,
        orelse: Option<Block>,
    },

    While {
        condition: Located<Expr>,
        body: Block,
    },

    /// `for variable in range(...)`, resuelto durante el parsing.
    ///
    /// `start` toma el valor `0` y `step` el valor `1` cuando se omiten.
    ForRange {
        variable: Located<Identifier>,
        start: Option<Located<Expr>>,
        stop: Located<Expr>,
        step: Option<Located<Expr>>,
        body: Block,
    },

    ForEach {
        variable: Located<Identifier>,
        iterable: Located<Expr>,
        body: Block,
    },

    Assign {
        target: Located<Target>,
        value: Located<Expr>,
    },

    AugAssign {
        target: Located<Target>,
        op: AugOp,
        value: Located<Expr>,
    },

    /// Expresión con efectos secundarios; siempre es una llamada.
    Expr(Located<Expr>),

    Break,
    Continue,
    Pass,
}

impl Statement {
    /// Nombre del tipo de nodo, para mensajes de error.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::FunctionDef(_) => "FunctionDef",
            Statement::Return(_) => "Return",
            Statement::If { .. } => "If",
            Statement::While { .. } => "While",
            Statement::ForRange { .. } => "ForRange",
            Statement::ForEach { .. } => "ForEach",
            Statement::Assign { .. } => "Assign",
            Statement::AugAssign { .. } => "AugAssign",
            Statement::Expr(_) => "ExprStatement",
            Statement::Break => "Break",
            Statement::Continue => "Continue",
            Statement::Pass => "Pass",
        }
    }
}

/// Lado izquierdo de una asignación.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(Identifier),
    Index {
        target: Box<Located<Expr>>,
        index: Box<Located<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Unary(UnaryOp, Box<Located<Expr>>),

    Call {
        callee: Located<Identifier>,
        args: Vec<Located<Expr>>,
    },

    MethodCall {
        receiver: Box<Located<Expr>>,
        method: Located<Identifier>,
        args: Vec<Located<Expr>>,
    },

    Name(Identifier),

    /// Lexema numérico original.
    Number(String),

    Str(String),
    Bool(bool),
    NoneLiteral,
    List(Vec<Located<Expr>>),

    Index {
        target: Box<Located<Expr>>,
        index: Box<Located<Expr>>,
    },
}

impl Expr {
    /// Nombre del tipo de nodo, para mensajes de error.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Binary(..) => "BinaryOp",
            Expr::Unary(..) => "UnaryOp",
            Expr::Call { .. } => "Call",
            Expr::MethodCall { .. } => "MethodCall",
            Expr::Name(_) => "Name",
            Expr::Number(_) => "NumberLiteral",
            Expr::Str(_) => "StringLiteral",
            Expr::Bool(_) => "BoolLiteral",
            Expr::NoneLiteral => "NoneLiteral",
            Expr::List(_) => "ListLiteral",
            Expr::Index { .. } => "Index",
        }
    }

    /// Determina si la expresión es una llamada, a función o a método.
    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::MethodCall { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    /// Símbolo del operador en el lenguaje fuente.
    pub fn symbol(self) -> &'static str {
        use BinOp::*;

        match self {
            Or => "or",
            And => "and",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            FloorDiv => "//",
            Mod => "%",
            Pow => "**",
        }
    }

    pub fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(
            self,
            Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AugOp {
    Add,
    Sub,
}
