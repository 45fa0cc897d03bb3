//! Abstract domain interfaces consumed by the fixpoint engine.
//!
//! The engine never looks inside abstract elements: everything it needs is
//! expressed through [`AbstractDomain`] and [`NumericDomain`]. Operations
//! that can fail report a [`DomainError`]; the engine decides how to
//! recover (see [`crate::fixpoint`]).

use std::fmt::{self, Debug};

use crate::environment::Environment;
use crate::expr::{Constraint, NumExpr};
use crate::interval::Interval;

/// Internal failure of an abstract-domain operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An expression or constraint mentions a variable outside the environment.
    UnknownVariable(String),
    /// Two elements (or an element and the environment) disagree on dimension.
    DimensionMismatch { expected: usize, found: usize },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::UnknownVariable(v) => write!(f, "unknown variable '{}'", v),
            DomainError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Abstract domain interface.
///
/// An abstract domain represents a lattice structure used for
/// approximating program states in static analysis.
///
/// # Lattice Properties
///
/// An abstract domain must satisfy:
/// - Reflexivity: `∀a. a ⊑ a`
/// - Transitivity: `∀a,b,c. a ⊑ b ∧ b ⊑ c ⇒ a ⊑ c`
/// - Antisymmetry: `∀a,b. a ⊑ b ∧ b ⊑ a ⇒ a = b`
/// - Join is an upper bound, meet a lower bound, widening an upper bound
pub trait AbstractDomain: Clone + Debug {
    /// The type representing abstract elements.
    ///
    /// Elements are values: operations return fresh elements and never
    /// mutate their inputs.
    type Element: Clone + Debug + PartialEq;

    /// Create the bottom element (⊥): represents the empty set.
    fn bottom(&self) -> Self::Element;

    /// Create the top element (⊤): represents all possible states.
    fn top(&self) -> Self::Element;

    /// Check if an element is bottom.
    fn is_bottom(&self, elem: &Self::Element) -> bool;

    /// Check if an element is top.
    fn is_top(&self, elem: &Self::Element) -> bool;

    /// Partial order: `elem1 ⊑ elem2` (elem1 is more precise than elem2).
    fn le(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<bool, DomainError>;

    /// Join (`⊔`): least upper bound, over-approximation.
    fn join(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError>;

    /// Meet (`⊓`): greatest lower bound, refinement.
    fn meet(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError>;

    /// Widening (`∇`): accelerates convergence in fixpoint computation.
    ///
    /// Must satisfy `elem1 ⊑ elem1 ∇ elem2` and `elem2 ⊑ elem1 ∇ elem2`, and
    /// every sequence `x₀, x₁ = x₀ ∇ y₀, x₂ = x₁ ∇ y₁, …` must stabilize.
    fn widen(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError>;

    /// Check equality of abstract elements.
    fn eq(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<bool, DomainError> {
        Ok(self.le(elem1, elem2)? && self.le(elem2, elem1)?)
    }
}

/// Numeric abstract domain over a fixed [`Environment`] of integer variables.
pub trait NumericDomain: AbstractDomain {
    /// Variables tracked by every element of this domain.
    fn environment(&self) -> &Environment;

    /// Intersect an element with the constraint `c`.
    fn meet_constraint(&self, elem: &Self::Element, c: &Constraint) -> Result<Self::Element, DomainError>;

    /// Apply assignment: `var := expr`.
    fn assign(&self, elem: &Self::Element, var: &str, expr: &NumExpr) -> Result<Self::Element, DomainError>;

    /// Remove all information about `var` (existential quantification).
    fn forget(&self, elem: &Self::Element, var: &str) -> Result<Self::Element, DomainError>;

    /// Interval of values `expr` may take in `elem`.
    fn bound(&self, elem: &Self::Element, expr: &NumExpr) -> Result<Interval, DomainError>;

    /// Check whether every state of `elem` satisfies `c`.
    fn satisfies(&self, elem: &Self::Element, c: &Constraint) -> Result<bool, DomainError>;

    /// Interval of values of a single variable.
    fn bound_of_var(&self, elem: &Self::Element, var: &str) -> Result<Interval, DomainError> {
        self.bound(elem, &NumExpr::var(var))
    }

    /// Human-readable rendering of an element, used in logs and DOT labels.
    fn render(&self, elem: &Self::Element) -> String {
        format!("{:?}", elem)
    }
}
