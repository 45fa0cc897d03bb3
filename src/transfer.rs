//! Abstract transfer functions for instructions.
//!
//! An instruction maps the state flowing into its node to the states
//! leaving it. A conditional branch produces one state per edge; every
//! other instruction sends the same state along all of its edges.
//!
//! Instruction shapes the domain does not model never fail: the affected
//! variable is forgotten, or the state passes through unchanged. Only
//! failures of the domain itself surface as [`DomainError`], and
//! [`Transfer::fallback`] gives the conservative replacement for them.

use crate::config::CollectionModel;
use crate::domain::{DomainError, NumericDomain};
use crate::expr::{Constraint, NumExpr};
use crate::ir::{BinOp, Comparator, Expression, Instruction, Local, Operand, Place};

/// States leaving a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Successors<E> {
    /// Same state on every outgoing edge.
    Uniform(E),
    /// Conditional branch: `taken` flows along the branch edge, `not_taken`
    /// along the fall-through edge.
    Branch { taken: E, not_taken: E },
}

/// Transfer functions of one analysis run.
#[derive(Debug)]
pub struct Transfer<'a, D: NumericDomain> {
    domain: &'a D,
    collection: &'a CollectionModel,
}

impl<'a, D: NumericDomain> Transfer<'a, D> {
    pub fn new(domain: &'a D, collection: &'a CollectionModel) -> Self {
        Self { domain, collection }
    }

    /// ⟦instr⟧♯(state)
    pub fn apply(&self, state: &D::Element, instr: &Instruction) -> Result<Successors<D::Element>, DomainError> {
        if self.domain.is_bottom(state) {
            return Ok(Successors::Uniform(state.clone()));
        }
        match instr {
            Instruction::Assignment { target, expression } => {
                self.assignment(state, target, expression).map(Successors::Uniform)
            }
            Instruction::ConditionalBranch { comparator, left, right } => {
                let (taken, not_taken) = self.condition(state, *comparator, left, right)?;
                Ok(Successors::Branch { taken, not_taken })
            }
            Instruction::Call(_) | Instruction::Other(_) => Ok(Successors::Uniform(state.clone())),
        }
    }

    /// Conservative successors used when [`Transfer::apply`] failed.
    ///
    /// An assignment forgets its target (top if even that fails); a
    /// condition refines neither edge.
    pub fn fallback(&self, state: &D::Element, instr: &Instruction) -> Successors<D::Element> {
        match instr {
            Instruction::Assignment {
                target: Place::Local(local),
                ..
            } if self.is_tracked(local) => {
                Successors::Uniform(self.domain.forget(state, &local.name).unwrap_or_else(|_| self.domain.top()))
            }
            Instruction::ConditionalBranch { .. } => Successors::Branch {
                taken: state.clone(),
                not_taken: state.clone(),
            },
            _ => Successors::Uniform(state.clone()),
        }
    }

    /// Transfer of `target = expression`.
    pub fn assignment(
        &self,
        state: &D::Element,
        target: &Place,
        expression: &Expression,
    ) -> Result<D::Element, DomainError> {
        let target = match target {
            Place::Local(local) if self.is_tracked(local) => &local.name,
            _ => {
                log::trace!("Untracked assignment target {}", target);
                return Ok(state.clone());
            }
        };

        match expression {
            Expression::Constant(c) => self.domain.assign(state, target, &NumExpr::constant(*c)),
            Expression::VariableRef(source) if self.is_tracked(source) => {
                self.domain.assign(state, target, &NumExpr::var(&source.name))
            }
            Expression::BinaryOp { op, right: Operand::Const(0), .. } if op.is_division() => {
                log::debug!("{} by literal zero: no successor state", op.symbol());
                Ok(self.domain.bottom())
            }
            Expression::BinaryOp { op, left, right } => match (self.operand(left), self.operand(right)) {
                (Some(l), Some(r)) => {
                    let expr = match op {
                        BinOp::Add => l.add(r),
                        BinOp::Sub => l.sub(r),
                        BinOp::Mul => l.mul(r),
                        BinOp::Div => l.div(r),
                        BinOp::Rem => l.rem(r),
                    };
                    self.domain.assign(state, target, &expr)
                }
                _ => {
                    log::debug!("Forgetting {}: operand of {} is not tracked", target, expression);
                    self.domain.forget(state, target)
                }
            },
            _ => {
                log::debug!("Forgetting {}: unsupported right-hand side {}", target, expression);
                self.domain.forget(state, target)
            }
        }
    }

    /// Transfer of `if left comparator right`: `(taken, not_taken)`.
    pub fn condition(
        &self,
        state: &D::Element,
        comparator: Comparator,
        left: &Operand,
        right: &Operand,
    ) -> Result<(D::Element, D::Element), DomainError> {
        let (Some(l), Some(r)) = (self.operand(left), self.operand(right)) else {
            if self.is_collection_operand(left) || self.is_collection_operand(right) {
                log::trace!("Comparison of {} values is not refined", self.collection.type_name);
            } else {
                log::debug!("Comparison {} {} {} is not refined", left, comparator.symbol(), right);
            }
            return Ok((state.clone(), state.clone()));
        };

        let lr = l.clone().sub(r.clone());
        let rl = r.sub(l);
        let (taken, not_taken) = match comparator {
            Comparator::Eq => (Constraint::eq(lr.clone()), Constraint::diseq(lr)),
            Comparator::Ne => (Constraint::diseq(lr.clone()), Constraint::eq(lr)),
            Comparator::Lt => (Constraint::sup(rl), Constraint::sup_eq(lr)),
            Comparator::Le => (Constraint::sup_eq(rl), Constraint::sup(lr)),
            Comparator::Gt => (Constraint::sup(lr), Constraint::sup_eq(rl)),
            Comparator::Ge => (Constraint::sup_eq(lr), Constraint::sup(rl)),
        };

        Ok((
            self.domain.meet_constraint(state, &taken)?,
            self.domain.meet_constraint(state, &not_taken)?,
        ))
    }

    /// Domain expression for an operand, if the domain can model it.
    pub fn operand(&self, operand: &Operand) -> Option<NumExpr> {
        match operand {
            Operand::Const(c) => Some(NumExpr::constant(*c)),
            Operand::Var(local) if self.is_tracked(local) => Some(NumExpr::var(&local.name)),
            Operand::Var(_) => None,
        }
    }

    /// Integer-typed local present in the environment.
    pub fn is_tracked(&self, local: &Local) -> bool {
        local.ty.is_integer() && self.domain.environment().contains(&local.name)
    }

    fn is_collection_operand(&self, operand: &Operand) -> bool {
        matches!(operand, Operand::Var(local) if self.collection.is_collection(&local.ty))
    }
}
