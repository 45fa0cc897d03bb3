//! Safety checks over computed invariants.
//!
//! Both checks read the flow-before state of the nodes they inspect and
//! skip unreachable (bottom) nodes. Anything the checks cannot prove is
//! reported as a possible violation.

pub mod bounds;
pub mod division;

pub use bounds::{check_bounds, AccessFinding, AccessOutcome, BoundsReport};
pub use division::{check_division, DivisionFinding, DivisionReport};

use crate::domain::NumericDomain;
use crate::expr::NumExpr;
use crate::interval::Interval;
use crate::ir::Operand;

/// Values `operand` may take in `state`.
///
/// Constants give a point interval, tracked integer locals their bound in
/// the domain, anything else (or a failing domain) the unbounded interval.
pub(crate) fn operand_bound<D: NumericDomain>(domain: &D, state: &D::Element, operand: &Operand) -> Interval {
    match operand {
        Operand::Const(c) => Interval::constant(*c),
        Operand::Var(local) if local.ty.is_integer() && domain.environment().contains(&local.name) => {
            match domain.bound(state, &NumExpr::var(&local.name)) {
                Ok(bound) => bound,
                Err(e) => {
                    log::warn!("Cannot bound {}: {}", local, e);
                    Interval::top()
                }
            }
        }
        Operand::Var(local) => {
            log::debug!("{} is not tracked, assuming any value", local);
            Interval::top()
        }
    }
}
