//! Divide-by-zero check.

use crate::cfg::Cfg;
use crate::domain::NumericDomain;
use crate::fixpoint::Invariants;
use crate::interval::{Inclusion, Interval};
use crate::ir::Operand;
use crate::types::NodeId;

use super::operand_bound;

/// One divisor of a reachable division or remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionFinding {
    pub node: NodeId,
    pub divisor: Operand,
    pub bound: Interval,
    pub safe: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivisionReport {
    pub findings: Vec<DivisionFinding>,
}

impl DivisionReport {
    /// Every reachable divisor provably excludes zero.
    pub fn is_safe(&self) -> bool {
        self.findings.iter().all(|f| f.safe)
    }

    pub fn violations(&self) -> impl Iterator<Item = &DivisionFinding> {
        self.findings.iter().filter(|f| !f.safe)
    }
}

/// A divisor is safe only if its bound and `[0, 0]` are incomparable,
/// i.e. the bound does not contain zero.
pub fn excludes_zero(bound: &Interval) -> bool {
    !matches!(
        bound.inclusion(&Interval::constant(0)),
        Inclusion::Equal | Inclusion::Superset | Inclusion::Subset
    )
}

/// Checks every division and remainder in reachable nodes of `cfg`.
pub fn check_division<D: NumericDomain>(domain: &D, cfg: &Cfg, invariants: &Invariants<D::Element>) -> DivisionReport {
    let mut report = DivisionReport::default();

    for node in cfg.nodes() {
        let divisors = node.instruction.divisors();
        if divisors.is_empty() {
            continue;
        }
        let state = invariants.get(node.id);
        if domain.is_bottom(state) {
            log::trace!("Skipping unreachable division at {}", node.id);
            continue;
        }

        for divisor in divisors {
            let bound = operand_bound(domain, state, divisor);
            let safe = excludes_zero(&bound);
            if safe {
                log::debug!("{}: divisor {} ∈ {} excludes zero", node.id, divisor, bound);
            } else {
                log::info!("{}: divisor {} ∈ {} may be zero", node.id, divisor, bound);
            }
            report.findings.push(DivisionFinding {
                node: node.id,
                divisor: divisor.clone(),
                bound,
                safe,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cfg::Statement;
    use crate::config::AnalysisConfig;
    use crate::environment::Environment;
    use crate::fixpoint::FixpointEngine;
    use crate::interval::Bound;
    use crate::interval_domain::IntervalDomain;
    use crate::ir::{BinOp, Comparator, Expression, Instruction, Local, OtherKind, Place, Type};

    #[test]
    fn test_zero_exclusion() {
        assert!(!excludes_zero(&Interval::from_range(0, 0)));
        assert!(excludes_zero(&Interval::from_range(1, 10)));
        assert!(!excludes_zero(&Interval::from_range(-2, 3)));
        assert!(excludes_zero(&Interval::from_range(-7, -1)));
        assert!(!excludes_zero(&Interval::top()));
        assert!(!excludes_zero(&Interval::new(Bound::finite(0), Bound::PosInf)));
    }

    fn divide(target: &str, divisor: Operand) -> Statement {
        Statement::new(Instruction::Assignment {
            target: Place::Local(Local::int(target)),
            expression: Expression::BinaryOp {
                op: BinOp::Div,
                left: Operand::Const(100),
                right: divisor,
            },
        })
    }

    fn analyze(statements: Vec<Statement>, vars: &[&str]) -> DivisionReport {
        let domain = IntervalDomain::new(Environment::with_ints(vars.iter().copied()));
        let config = AnalysisConfig::default();
        let cfg = Cfg::build(statements).unwrap();
        let analysis = FixpointEngine::new(&domain, &config).run(&cfg);
        check_division(&domain, &cfg, &analysis.invariants)
    }

    #[test]
    fn test_literal_zero_divisor() {
        let report = analyze(vec![divide("q", Operand::Const(0))], &["q"]);
        assert!(!report.is_safe());
        assert_eq!(report.violations().count(), 1);
    }

    #[test]
    fn test_guarded_and_constant_divisors() {
        // 0: if d == 0 goto 2
        // 1: q = 100 / d
        // 2: return
        let d = Local::int("d");
        let report = analyze(
            vec![
                Statement::jumping(
                    Instruction::ConditionalBranch {
                        comparator: Comparator::Eq,
                        left: Operand::Var(d.clone()),
                        right: Operand::Const(0),
                    },
                    NodeId::new(2),
                ),
                divide("q", Operand::Var(d.clone())),
                Statement::new(Instruction::Other(OtherKind::Return)),
            ],
            &["d", "q"],
        );
        // d ≠ 0 alone cannot be expressed as an interval over an
        // unconstrained d, so the division stays unproven.
        assert!(!report.is_safe());

        // 0: d = 5
        // 1: q = 100 / d
        let report = analyze(
            vec![
                Statement::new(Instruction::Assignment {
                    target: Place::Local(d.clone()),
                    expression: Expression::Constant(5),
                }),
                divide("q", Operand::Var(d)),
            ],
            &["d", "q"],
        );
        assert!(report.is_safe());
        assert_eq!(report.findings[0].bound, Interval::constant(5));
    }

    #[test]
    fn test_untracked_divisor_is_unsafe() {
        let l = Local::new("l", Type::Long);
        let report = analyze(vec![divide("q", Operand::Var(l))], &["q"]);
        assert!(!report.is_safe());
        assert!(report.findings[0].bound.is_top());
    }

    #[test]
    fn test_unreachable_division_is_skipped() {
        // 0: goto 2
        // 1: q = 100 / 0
        // 2: return
        let report = analyze(
            vec![
                Statement::jumping(Instruction::Other(OtherKind::Goto), NodeId::new(2)),
                divide("q", Operand::Const(0)),
                Statement::new(Instruction::Other(OtherKind::Return)),
            ],
            &["q"],
        );
        assert!(report.is_safe());
        assert!(report.findings.is_empty());
    }
}
