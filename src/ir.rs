//! Three-address instruction model of a procedure body.
//!
//! Operands of arithmetic and comparisons are always constants or locals,
//! never nested expressions. Every local carries its declared type, so an
//! instruction can be interpreted without a separate symbol table.

use std::fmt;

/// Declared type of a local or field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// `int` and its narrower relatives (`short`, `byte`, `char`, `boolean`).
    Int,
    Long,
    Float,
    Double,
    Array(Box<Type>),
    /// Any class type, including the bounded resource collection.
    Object(String),
}

impl Type {
    /// Parses a type name such as `int`, `long[]` or `PrinterArray`.
    pub fn parse(name: &str) -> Type {
        if let Some(element) = name.strip_suffix("[]") {
            return Type::Array(Box::new(Type::parse(element)));
        }
        match name {
            "int" | "short" | "byte" | "char" | "boolean" => Type::Int,
            "long" => Type::Long,
            "float" => Type::Float,
            "double" => Type::Double,
            other => Type::Object(other.to_string()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_object(&self, class: &str) -> bool {
        matches!(self, Type::Object(name) if name == class)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Array(element) => write!(f, "{}[]", element),
            Type::Object(name) => write!(f, "{}", name),
        }
    }
}

/// A typed local variable (parameters included).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Local {
    pub name: String,
    pub ty: Type,
}

impl Local {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Type::Int)
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Constant or local: the only operand shapes of three-address code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Const(i64),
    Var(Local),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(c) => write!(f, "{}", c),
            Operand::Var(local) => write!(f, "{}", local),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    /// Division-like operators raise on a zero right operand.
    pub fn is_division(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Rem)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `new T(args)`: allocates and initializes the receiver.
    Constructor,
    /// `r.m(args)`
    Virtual,
    /// `m(args)`
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub kind: CallKind,
    /// Receiver object; for constructors, the local being initialized.
    pub receiver: Option<Local>,
    /// Declaring class, known for constructors.
    pub class: Option<String>,
    pub method: String,
    pub args: Vec<Operand>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
        match (self.kind, &self.receiver, &self.class) {
            (CallKind::Constructor, _, Some(class)) => write!(f, "new {}({})", class, args),
            (_, Some(receiver), _) => write!(f, "{}.{}({})", receiver, self.method, args),
            _ => write!(f, "{}({})", self.method, args),
        }
    }
}

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Constant(i64),
    VariableRef(Local),
    BinaryOp { op: BinOp, left: Operand, right: Operand },
    /// Result of a call.
    Invoke(Call),
    /// Any other shape (field or array read, negation, cast, ...).
    Opaque(String),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::VariableRef(local) => write!(f, "{}", local),
            Expression::BinaryOp { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expression::Invoke(call) => write!(f, "{}", call),
            Expression::Opaque(text) => write!(f, "{}", text),
        }
    }
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Place {
    Local(Local),
    /// `base.field`; `None` base denotes a static field.
    Field { base: Option<Local>, field: String },
    ArrayElement { base: Local, index: Operand },
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Local(local) => write!(f, "{}", local),
            Place::Field { base: Some(base), field } => write!(f, "{}.{}", base, field),
            Place::Field { base: None, field } => write!(f, "{}", field),
            Place::ArrayElement { base, index } => write!(f, "{}[{}]", base, index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn parse(s: &str) -> Option<Comparator> {
        match s {
            "==" => Some(Comparator::Eq),
            "!=" => Some(Comparator::Ne),
            "<" => Some(Comparator::Lt),
            "<=" => Some(Comparator::Le),
            ">" => Some(Comparator::Gt),
            ">=" => Some(Comparator::Ge),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtherKind {
    Nop,
    Goto,
    Return,
}

/// Effect of one CFG node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    Assignment { target: Place, expression: Expression },
    /// Control takes the branch edge when `left comparator right` holds.
    ConditionalBranch { comparator: Comparator, left: Operand, right: Operand },
    Call(Call),
    Other(OtherKind),
}

impl Instruction {
    /// The call performed by this instruction, as a statement or as the
    /// right-hand side of an assignment.
    pub fn call(&self) -> Option<&Call> {
        match self {
            Instruction::Call(call) => Some(call),
            Instruction::Assignment {
                expression: Expression::Invoke(call),
                ..
            } => Some(call),
            _ => None,
        }
    }

    /// Divisor operands of divisions and remainders in this instruction.
    pub fn divisors(&self) -> Vec<&Operand> {
        match self {
            Instruction::Assignment {
                expression: Expression::BinaryOp { op, right, .. },
                ..
            } if op.is_division() => vec![right],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assignment { target, expression } => write!(f, "{} = {}", target, expression),
            Instruction::ConditionalBranch { comparator, left, right } => {
                write!(f, "if {} {} {}", left, comparator.symbol(), right)
            }
            Instruction::Call(call) => write!(f, "{}", call),
            Instruction::Other(OtherKind::Nop) => write!(f, "nop"),
            Instruction::Other(OtherKind::Goto) => write!(f, "goto"),
            Instruction::Other(OtherKind::Return) => write!(f, "return"),
        }
    }
}
