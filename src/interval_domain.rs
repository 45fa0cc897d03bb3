//! Interval (box) domain over an [`Environment`].
//!
//! The interval domain tracks lower and upper bounds for every variable of
//! the environment independently. It is simple and efficient, but loses
//! relational information between variables: after `x := y` the domain
//! knows the range of `x`, not that `x = y`. Facts that hold only through
//! such a relation are lost: if `j := i` is kept in step with a loop
//! counter `i < n`, the bound on `i` is not transferred to `j`, and an
//! index `j` that a relational (octagon or polyhedra) domain proves in
//! bounds is reported as unproven here.
//!
//! Constraints are applied by bound propagation on their linear form, so
//! a branch on `i < n` refines both `i` and `n`.

use std::fmt;

use num_bigint::BigInt;

use crate::domain::{AbstractDomain, DomainError, NumericDomain};
use crate::environment::Environment;
use crate::expr::{Constraint, ConstraintKind, LinearForm, NumExpr};
use crate::interval::{Bound, Interval};

/// Number of propagation rounds when refining by a linear constraint.
const PROPAGATION_ROUNDS: usize = 2;

/// Abstract element: one interval per environment variable, or ⊥.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalState {
    Bottom,
    Reachable(Vec<Interval>),
}

impl IntervalState {
    /// Builds a state, collapsing to ⊥ if any component is empty.
    pub fn from_components(components: Vec<Interval>) -> Self {
        if components.iter().any(Interval::is_empty) {
            IntervalState::Bottom
        } else {
            IntervalState::Reachable(components)
        }
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, IntervalState::Bottom)
    }
}

/// Interval domain: maps environment variables to intervals.
#[derive(Debug, Clone)]
pub struct IntervalDomain {
    env: Environment,
}

impl IntervalDomain {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Builds a reachable state from `(variable, interval)` pairs; every
    /// other variable is unconstrained.
    pub fn state_from<'a, I>(&self, bounds: I) -> Result<IntervalState, DomainError>
    where
        I: IntoIterator<Item = (&'a str, Interval)>,
    {
        let mut components = vec![Interval::top(); self.env.len()];
        for (var, interval) in bounds {
            components[self.position(var)?] = interval;
        }
        Ok(IntervalState::from_components(components))
    }

    fn position(&self, var: &str) -> Result<usize, DomainError> {
        self.env
            .position(var)
            .ok_or_else(|| DomainError::UnknownVariable(var.to_string()))
    }

    fn components<'e>(&self, elem: &'e IntervalState) -> Result<Option<&'e [Interval]>, DomainError> {
        match elem {
            IntervalState::Bottom => Ok(None),
            IntervalState::Reachable(components) => {
                if components.len() != self.env.len() {
                    return Err(DomainError::DimensionMismatch {
                        expected: self.env.len(),
                        found: components.len(),
                    });
                }
                Ok(Some(components.as_slice()))
            }
        }
    }

    fn pointwise<F>(&self, elem1: &IntervalState, elem2: &IntervalState, f: F) -> Result<IntervalState, DomainError>
    where
        F: Fn(&Interval, &Interval) -> Interval,
    {
        match (self.components(elem1)?, self.components(elem2)?) {
            (Some(c1), Some(c2)) => Ok(IntervalState::from_components(
                c1.iter().zip(c2).map(|(i1, i2)| f(i1, i2)).collect(),
            )),
            (None, _) => Ok(elem2.clone()),
            (_, None) => Ok(elem1.clone()),
        }
    }

    fn eval(&self, components: &[Interval], expr: &NumExpr) -> Result<Interval, DomainError> {
        Ok(match expr {
            NumExpr::Const(c) => Interval::constant(c.clone()),
            NumExpr::Var(v) => components[self.position(v)?].clone(),
            NumExpr::Add(e1, e2) => self.eval(components, e1)?.add(&self.eval(components, e2)?),
            NumExpr::Sub(e1, e2) => self.eval(components, e1)?.sub(&self.eval(components, e2)?),
            NumExpr::Mul(e1, e2) => self.eval(components, e1)?.mul(&self.eval(components, e2)?),
            NumExpr::Div(e1, e2) => self.eval(components, e1)?.div(&self.eval(components, e2)?),
            NumExpr::Rem(e1, e2) => self.eval(components, e1)?.rem(&self.eval(components, e2)?),
            NumExpr::Neg(e) => self.eval(components, e)?.neg(),
        })
    }

    fn check_variables(&self, expr: &NumExpr) -> Result<(), DomainError> {
        for var in expr.variables() {
            self.position(var)?;
        }
        Ok(())
    }

    /// Tightens every variable of `form` so that `form ∈ region` can hold.
    fn propagate(&self, components: &mut [Interval], form: &LinearForm, region: &Interval) -> Result<(), DomainError> {
        for _ in 0..PROPAGATION_ROUNDS {
            for (var, coeff) in &form.coefficients {
                let pos = self.position(var)?;
                let rest = self.rest_of(components, form, var)?;
                // coeff * var ∈ region - rest
                let target = region.sub(&rest);
                let refined = components[pos].meet(&divide_exact(&target, coeff));
                components[pos] = refined;
            }
        }
        Ok(())
    }

    /// Excludes the single value a variable would need for `form = 0`.
    fn exclude(&self, components: &mut [Interval], form: &LinearForm) -> Result<(), DomainError> {
        for (var, coeff) in &form.coefficients {
            let pos = self.position(var)?;
            let rest = self.rest_of(components, form, var)?;
            let Some(r) = rest.as_constant() else {
                continue;
            };
            let numerator = -r;
            if &numerator % coeff != BigInt::from(0) {
                continue;
            }
            let excluded = Bound::Finite(numerator / coeff);
            let current = &components[pos];
            let refined = if current.low == excluded {
                Interval::new(excluded.add(&Bound::finite(1)), current.high.clone())
            } else if current.high == excluded {
                Interval::new(current.low.clone(), excluded.sub(&Bound::finite(1)))
            } else {
                continue;
            };
            components[pos] = refined;
        }
        Ok(())
    }

    /// Interval of `form` without the term of `skip`.
    fn rest_of(&self, components: &[Interval], form: &LinearForm, skip: &str) -> Result<Interval, DomainError> {
        let mut rest = Interval::constant(form.constant.clone());
        for (var, coeff) in &form.coefficients {
            if var != skip {
                let term = Interval::constant(coeff.clone()).mul(&components[self.position(var)?]);
                rest = rest.add(&term);
            }
        }
        Ok(rest)
    }
}

/// Region of values `e` may take so that `e ⋈ 0` holds (convex kinds only).
fn region(kind: ConstraintKind) -> Option<Interval> {
    match kind {
        ConstraintKind::Eq => Some(Interval::constant(0)),
        ConstraintKind::SupEq => Some(Interval::new(Bound::finite(0), Bound::PosInf)),
        // Over the integers, e > 0 is e ≥ 1.
        ConstraintKind::Sup => Some(Interval::new(Bound::finite(1), Bound::PosInf)),
        ConstraintKind::Diseq => None,
    }
}

/// Integers `x` such that `coeff * x ∈ target`.
fn divide_exact(target: &Interval, coeff: &BigInt) -> Interval {
    if target.is_empty() {
        return Interval::bottom();
    }
    if *coeff > BigInt::from(0) {
        Interval::new(ceil_bound(&target.low, coeff), floor_bound(&target.high, coeff))
    } else {
        Interval::new(ceil_bound(&target.high, coeff), floor_bound(&target.low, coeff))
    }
}

fn floor_bound(b: &Bound, d: &BigInt) -> Bound {
    match b {
        Bound::Finite(n) => {
            let (q, r) = (n / d, n % d);
            let zero = BigInt::from(0);
            if r != zero && ((r < zero) != (*d < zero)) {
                Bound::Finite(q - 1)
            } else {
                Bound::Finite(q)
            }
        }
        infinite => scale_infinity(infinite, d),
    }
}

fn ceil_bound(b: &Bound, d: &BigInt) -> Bound {
    match b {
        Bound::Finite(n) => {
            let (q, r) = (n / d, n % d);
            let zero = BigInt::from(0);
            if r != zero && ((r < zero) == (*d < zero)) {
                Bound::Finite(q + 1)
            } else {
                Bound::Finite(q)
            }
        }
        infinite => scale_infinity(infinite, d),
    }
}

fn scale_infinity(b: &Bound, d: &BigInt) -> Bound {
    if *d < BigInt::from(0) {
        b.neg()
    } else {
        b.clone()
    }
}

impl AbstractDomain for IntervalDomain {
    type Element = IntervalState;

    fn bottom(&self) -> Self::Element {
        IntervalState::Bottom
    }

    fn top(&self) -> Self::Element {
        IntervalState::Reachable(vec![Interval::top(); self.env.len()])
    }

    fn is_bottom(&self, elem: &Self::Element) -> bool {
        elem.is_bottom()
    }

    fn is_top(&self, elem: &Self::Element) -> bool {
        match elem {
            IntervalState::Bottom => false,
            IntervalState::Reachable(components) => components.iter().all(Interval::is_top),
        }
    }

    fn le(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<bool, DomainError> {
        match (self.components(elem1)?, self.components(elem2)?) {
            (None, _) => Ok(true),
            (Some(_), None) => Ok(false),
            (Some(c1), Some(c2)) => Ok(c1.iter().zip(c2).all(|(i1, i2)| i1.le(i2))),
        }
    }

    fn join(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError> {
        self.pointwise(elem1, elem2, Interval::join)
    }

    fn meet(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError> {
        match (self.components(elem1)?, self.components(elem2)?) {
            (Some(c1), Some(c2)) => Ok(IntervalState::from_components(
                c1.iter().zip(c2).map(|(i1, i2)| i1.meet(i2)).collect(),
            )),
            _ => Ok(IntervalState::Bottom),
        }
    }

    fn widen(&self, elem1: &Self::Element, elem2: &Self::Element) -> Result<Self::Element, DomainError> {
        self.pointwise(elem1, elem2, Interval::widen)
    }
}

impl NumericDomain for IntervalDomain {
    fn environment(&self) -> &Environment {
        &self.env
    }

    fn meet_constraint(&self, elem: &Self::Element, c: &Constraint) -> Result<Self::Element, DomainError> {
        self.check_variables(&c.expr)?;
        let Some(components) = self.components(elem)? else {
            return Ok(IntervalState::Bottom);
        };
        let value = self.eval(components, &c.expr)?;
        let mut refined = components.to_vec();

        match region(c.kind) {
            Some(region) => {
                if value.meet(&region).is_empty() {
                    return Ok(IntervalState::Bottom);
                }
                if let Some(form) = c.expr.to_linear() {
                    self.propagate(&mut refined, &form, &region)?;
                }
            }
            None => {
                if value == Interval::constant(0) {
                    return Ok(IntervalState::Bottom);
                }
                if let Some(form) = c.expr.to_linear() {
                    self.exclude(&mut refined, &form)?;
                }
            }
        }

        Ok(IntervalState::from_components(refined))
    }

    fn assign(&self, elem: &Self::Element, var: &str, expr: &NumExpr) -> Result<Self::Element, DomainError> {
        let pos = self.position(var)?;
        self.check_variables(expr)?;
        let Some(components) = self.components(elem)? else {
            return Ok(IntervalState::Bottom);
        };
        let value = self.eval(components, expr)?;
        let mut result = components.to_vec();
        result[pos] = value;
        Ok(IntervalState::from_components(result))
    }

    fn forget(&self, elem: &Self::Element, var: &str) -> Result<Self::Element, DomainError> {
        let pos = self.position(var)?;
        let Some(components) = self.components(elem)? else {
            return Ok(IntervalState::Bottom);
        };
        let mut result = components.to_vec();
        result[pos] = Interval::top();
        Ok(IntervalState::Reachable(result))
    }

    fn bound(&self, elem: &Self::Element, expr: &NumExpr) -> Result<Interval, DomainError> {
        self.check_variables(expr)?;
        match self.components(elem)? {
            None => Ok(Interval::bottom()),
            Some(components) => self.eval(components, expr),
        }
    }

    fn satisfies(&self, elem: &Self::Element, c: &Constraint) -> Result<bool, DomainError> {
        let value = self.bound(elem, &c.expr)?;
        if value.is_empty() {
            return Ok(true);
        }
        Ok(match region(c.kind) {
            Some(region) => value.le(&region),
            None => !value.contains(&BigInt::from(0)),
        })
    }

    fn render(&self, elem: &Self::Element) -> String {
        self.display(elem).to_string()
    }
}

/// Displays a state as `{x ∈ [0, 10], y ∈ [1, +∞]}` using the domain's
/// variable names. Unconstrained variables are omitted.
pub struct DisplayState<'a> {
    domain: &'a IntervalDomain,
    state: &'a IntervalState,
}

impl IntervalDomain {
    pub fn display<'a>(&'a self, state: &'a IntervalState) -> DisplayState<'a> {
        DisplayState { domain: self, state }
    }
}

impl fmt::Display for DisplayState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            IntervalState::Bottom => write!(f, "⊥"),
            IntervalState::Reachable(components) => {
                write!(f, "{{")?;
                let mut first = true;
                for (name, interval) in self.domain.env.names().zip(components) {
                    if interval.is_top() {
                        continue;
                    }
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{} ∈ {}", name, interval)?;
                }
                write!(f, "}}")
            }
        }
    }
}
