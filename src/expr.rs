//! Numeric expressions and linear constraints understood by abstract domains.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigInt;

/// Numeric expression tree (right-hand side of assignments, subject of
/// constraints).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumExpr {
    /// Variable reference
    Var(String),
    /// Constant value
    Const(BigInt),
    /// Addition: e1 + e2
    Add(Box<NumExpr>, Box<NumExpr>),
    /// Subtraction: e1 - e2
    Sub(Box<NumExpr>, Box<NumExpr>),
    /// Multiplication: e1 * e2
    Mul(Box<NumExpr>, Box<NumExpr>),
    /// Truncating division: e1 / e2
    Div(Box<NumExpr>, Box<NumExpr>),
    /// Remainder: e1 % e2
    Rem(Box<NumExpr>, Box<NumExpr>),
    /// Negation: -e
    Neg(Box<NumExpr>),
}

impl NumExpr {
    pub fn var(name: impl Into<String>) -> Self {
        NumExpr::Var(name.into())
    }

    pub fn constant(value: impl Into<BigInt>) -> Self {
        NumExpr::Const(value.into())
    }

    pub fn add(self, other: Self) -> Self {
        NumExpr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Self) -> Self {
        NumExpr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Self) -> Self {
        NumExpr::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: Self) -> Self {
        NumExpr::Div(Box::new(self), Box::new(other))
    }

    pub fn rem(self, other: Self) -> Self {
        NumExpr::Rem(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        NumExpr::Neg(Box::new(self))
    }

    /// Names of all variables occurring in the expression.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables<'a>(&'a self, vars: &mut Vec<&'a str>) {
        match self {
            NumExpr::Var(v) => {
                if !vars.contains(&v.as_str()) {
                    vars.push(v);
                }
            }
            NumExpr::Const(_) => {}
            NumExpr::Neg(e) => e.collect_variables(vars),
            NumExpr::Add(a, b)
            | NumExpr::Sub(a, b)
            | NumExpr::Mul(a, b)
            | NumExpr::Div(a, b)
            | NumExpr::Rem(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
        }
    }

    /// Normalizes the expression to `Σ cᵢ·xᵢ + k` if it is linear.
    pub fn to_linear(&self) -> Option<LinearForm> {
        match self {
            NumExpr::Var(v) => Some(LinearForm::variable(v)),
            NumExpr::Const(c) => Some(LinearForm::constant(c.clone())),
            NumExpr::Add(a, b) => Some(a.to_linear()?.plus(&b.to_linear()?)),
            NumExpr::Sub(a, b) => Some(a.to_linear()?.plus(&b.to_linear()?.scaled(&BigInt::from(-1)))),
            NumExpr::Neg(e) => Some(e.to_linear()?.scaled(&BigInt::from(-1))),
            NumExpr::Mul(a, b) => {
                let (a, b) = (a.to_linear()?, b.to_linear()?);
                if a.is_constant() {
                    Some(b.scaled(&a.constant))
                } else if b.is_constant() {
                    Some(a.scaled(&b.constant))
                } else {
                    None
                }
            }
            NumExpr::Div(..) | NumExpr::Rem(..) => None,
        }
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumExpr::Var(v) => write!(f, "{}", v),
            NumExpr::Const(c) => write!(f, "{}", c),
            NumExpr::Add(a, b) => write!(f, "({} + {})", a, b),
            NumExpr::Sub(a, b) => write!(f, "({} - {})", a, b),
            NumExpr::Mul(a, b) => write!(f, "({} * {})", a, b),
            NumExpr::Div(a, b) => write!(f, "({} / {})", a, b),
            NumExpr::Rem(a, b) => write!(f, "({} % {})", a, b),
            NumExpr::Neg(e) => write!(f, "-{}", e),
        }
    }
}

/// Linear form `Σ cᵢ·xᵢ + k` with non-zero coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearForm {
    pub coefficients: BTreeMap<String, BigInt>,
    pub constant: BigInt,
}

impl LinearForm {
    pub fn constant(value: BigInt) -> Self {
        Self {
            coefficients: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn variable(name: &str) -> Self {
        let mut coefficients = BTreeMap::new();
        coefficients.insert(name.to_string(), BigInt::from(1));
        Self {
            coefficients,
            constant: BigInt::from(0),
        }
    }

    pub fn is_constant(&self) -> bool {
        self.coefficients.is_empty()
    }

    fn plus(mut self, other: &LinearForm) -> LinearForm {
        for (var, c) in &other.coefficients {
            let sum = self.coefficients.remove(var).unwrap_or_default() + c;
            if sum != BigInt::from(0) {
                self.coefficients.insert(var.clone(), sum);
            }
        }
        self.constant += &other.constant;
        self
    }

    fn scaled(self, factor: &BigInt) -> LinearForm {
        if *factor == BigInt::from(0) {
            return LinearForm::constant(BigInt::from(0));
        }
        LinearForm {
            coefficients: self.coefficients.into_iter().map(|(v, c)| (v, c * factor)).collect(),
            constant: self.constant * factor,
        }
    }
}

/// Relation between a constraint expression and zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `e = 0`
    Eq,
    /// `e ≠ 0`
    Diseq,
    /// `e ≥ 0`
    SupEq,
    /// `e > 0`
    Sup,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintKind::Eq => "=",
            ConstraintKind::Diseq => "≠",
            ConstraintKind::SupEq => "≥",
            ConstraintKind::Sup => ">",
        };
        write!(f, "{}", s)
    }
}

/// A constraint `expr ⋈ 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub expr: NumExpr,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(expr: NumExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    pub fn eq(expr: NumExpr) -> Self {
        Self::new(expr, ConstraintKind::Eq)
    }

    pub fn diseq(expr: NumExpr) -> Self {
        Self::new(expr, ConstraintKind::Diseq)
    }

    pub fn sup_eq(expr: NumExpr) -> Self {
        Self::new(expr, ConstraintKind::SupEq)
    }

    pub fn sup(expr: NumExpr) -> Self {
        Self::new(expr, ConstraintKind::Sup)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 0", self.expr, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_difference() {
        // (x - y) + 2 * x - 3
        let e = NumExpr::var("x")
            .sub(NumExpr::var("y"))
            .add(NumExpr::constant(2).mul(NumExpr::var("x")))
            .sub(NumExpr::constant(3));
        let lin = e.to_linear().unwrap();
        assert_eq!(lin.coefficients.get("x"), Some(&BigInt::from(3)));
        assert_eq!(lin.coefficients.get("y"), Some(&BigInt::from(-1)));
        assert_eq!(lin.constant, BigInt::from(-3));
    }

    #[test]
    fn test_cancelling_terms_are_dropped() {
        let e = NumExpr::var("x").sub(NumExpr::var("x"));
        let lin = e.to_linear().unwrap();
        assert!(lin.is_constant());
        assert_eq!(lin.constant, BigInt::from(0));
    }

    #[test]
    fn test_non_linear() {
        assert!(NumExpr::var("x").mul(NumExpr::var("y")).to_linear().is_none());
        assert!(NumExpr::var("x").div(NumExpr::constant(2)).to_linear().is_none());
    }

    #[test]
    fn test_variables_and_display() {
        let e = NumExpr::var("a").add(NumExpr::var("b")).mul(NumExpr::var("a"));
        assert_eq!(e.variables(), vec!["a", "b"]);
        let c = Constraint::sup_eq(NumExpr::var("i").sub(NumExpr::constant(5)));
        assert_eq!(c.to_string(), "(i - 5) ≥ 0");
    }
}
