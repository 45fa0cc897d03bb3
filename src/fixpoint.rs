//! Branch-sensitive forward fixpoint engine.
//!
//! Computes, for every CFG node, its *flow-before* state: an
//! over-approximation of all concrete states reachable right before the
//! node executes. The entry node starts from top, every other node from
//! bottom. Each edge stores the state its source sends along it, so the
//! two edges of a conditional branch carry different states.
//!
//! Merging into an ordinary node joins the values of its incoming edges.
//! Every merge into a loop header bumps its counter; while the counter is
//! below `widening_threshold` the new value is joined with the previous
//! one, and from the merge that reaches it on, widened. The per-header
//! counters live in the run, never in the engine, so independent runs do
//! not interfere.

use std::collections::{HashMap, VecDeque};

use crate::cfg::{Cfg, EdgeKind};
use crate::config::AnalysisConfig;
use crate::domain::{DomainError, NumericDomain};
use crate::transfer::{Successors, Transfer};
use crate::types::NodeId;

/// Flow-before state of every node.
#[derive(Debug, Clone)]
pub struct Invariants<E> {
    states: Vec<E>,
}

impl<E> Invariants<E> {
    pub fn get(&self, node: NodeId) -> &E {
        &self.states[node.index()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &E)> {
        self.states.iter().enumerate().map(|(i, s)| (NodeId::new(i), s))
    }
}

/// Which engine step a domain failure interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Merge,
    Widening,
    Transfer,
    Comparison,
}

/// A domain operation that failed and was replaced by a conservative value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFailure {
    pub node: NodeId,
    pub step: Step,
    pub error: DomainError,
}

/// Outcome of one engine run over one CFG.
#[derive(Debug, Clone)]
pub struct Analysis<E> {
    pub invariants: Invariants<E>,
    pub failures: Vec<DomainFailure>,
    /// `false` if the run stopped at `max_node_visits` before stabilizing.
    pub converged: bool,
    /// Number of node visits performed.
    pub visits: usize,
}

/// Fixpoint engine over a numeric domain.
#[derive(Debug, Clone)]
pub struct FixpointEngine<'a, D: NumericDomain> {
    domain: &'a D,
    config: &'a AnalysisConfig,
}

/// Mutable state of one run.
struct Run<'a, D: NumericDomain> {
    before: Vec<D::Element>,
    visited: Vec<bool>,
    edge_values: Vec<Option<D::Element>>,
    header_merges: HashMap<NodeId, usize>,
    failures: Vec<DomainFailure>,
    worklist: VecDeque<NodeId>,
    queued: Vec<bool>,
    cfg: &'a Cfg,
}

impl<D: NumericDomain> Run<'_, D> {
    fn enqueue(&mut self, node: NodeId) {
        if !self.queued[node.index()] {
            self.queued[node.index()] = true;
            self.worklist.push_back(node);
        }
    }

    fn dequeue(&mut self) -> Option<NodeId> {
        let node = self.worklist.pop_front()?;
        self.queued[node.index()] = false;
        Some(node)
    }

    fn record(&mut self, node: NodeId, step: Step, error: DomainError) {
        log::warn!("Domain failure at {} during {:?}: {}; using a conservative value", node, step, error);
        self.failures.push(DomainFailure { node, step, error });
    }
}

impl<'a, D: NumericDomain> FixpointEngine<'a, D> {
    pub fn new(domain: &'a D, config: &'a AnalysisConfig) -> Self {
        Self { domain, config }
    }

    /// Runs the engine to a fixed point over `cfg`.
    pub fn run(&self, cfg: &Cfg) -> Analysis<D::Element> {
        let transfer = Transfer::new(self.domain, &self.config.collection);
        let n = cfg.len();
        let mut run: Run<'_, D> = Run {
            before: vec![self.domain.bottom(); n],
            visited: vec![false; n],
            edge_values: vec![None; cfg.edges().len()],
            header_merges: HashMap::new(),
            failures: Vec::new(),
            worklist: VecDeque::new(),
            queued: vec![false; n],
            cfg,
        };

        let mut visits = 0;
        let mut converged = true;

        if n > 0 {
            run.enqueue(cfg.entry());
        }

        while let Some(node) = run.dequeue() {
            if visits >= self.config.max_node_visits {
                log::warn!(
                    "Fixpoint computation did not converge after {} node visits",
                    self.config.max_node_visits
                );
                converged = false;
                break;
            }
            visits += 1;

            let merged = self.merge(&mut run, node);
            let changed = match self.domain.eq(&merged, &run.before[node.index()]) {
                Ok(same) => !same,
                Err(e) => {
                    run.record(node, Step::Comparison, e);
                    true
                }
            };
            if run.visited[node.index()] && !changed {
                continue;
            }
            run.visited[node.index()] = true;
            log::trace!("{}: {}", node, self.domain.render(&merged));

            let successors = match transfer.apply(&merged, cfg.instruction(node)) {
                Ok(s) => s,
                Err(e) => {
                    run.record(node, Step::Transfer, e);
                    transfer.fallback(&merged, cfg.instruction(node))
                }
            };
            run.before[node.index()] = merged;

            for &e in cfg.outgoing(node) {
                let edge = cfg.edges()[e];
                let value = match (&successors, edge.kind) {
                    (Successors::Uniform(s), _) => s,
                    (Successors::Branch { taken, .. }, EdgeKind::Branch) => taken,
                    (Successors::Branch { not_taken, .. }, EdgeKind::FallThrough) => not_taken,
                };
                let unchanged = match &run.edge_values[e] {
                    Some(old) => self.domain.eq(old, value).unwrap_or(false),
                    None => false,
                };
                if !unchanged {
                    run.edge_values[e] = Some(value.clone());
                    run.enqueue(edge.target);
                }
            }
        }

        if converged {
            log::debug!("Fixpoint converged after {} node visits", visits);
        }

        Analysis {
            invariants: Invariants { states: run.before },
            failures: run.failures,
            converged,
            visits,
        }
    }

    /// New flow-before value of `node` from its incoming edges.
    fn merge(&self, run: &mut Run<'_, D>, node: NodeId) -> D::Element {
        let mut incoming = if node == run.cfg.entry() {
            self.domain.top()
        } else {
            self.domain.bottom()
        };
        let mut failure = None;
        for &e in run.cfg.incoming(node) {
            let Some(value) = &run.edge_values[e] else {
                continue;
            };
            match self.domain.join(&incoming, value) {
                Ok(joined) => incoming = joined,
                Err(err) => {
                    failure = Some(err);
                    incoming = self.domain.top();
                    break;
                }
            }
        }
        if let Some(err) = failure {
            run.record(node, Step::Merge, err);
        }

        if !run.cfg.is_loop_header(node) {
            return incoming;
        }

        let merges = run.header_merges.entry(node).or_insert(0);
        *merges += 1;
        let widening = *merges >= self.config.widening_threshold;
        let previous = &run.before[node.index()];
        let result = if widening {
            log::trace!("Widening at loop header {}", node);
            self.domain.widen(previous, &incoming)
        } else {
            self.domain.join(previous, &incoming)
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                let step = if widening { Step::Widening } else { Step::Merge };
                run.record(node, step, err);
                self.domain.top()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cfg::Statement;
    use crate::domain::AbstractDomain;
    use crate::environment::Environment;
    use crate::interval::{Bound, Interval};
    use crate::interval_domain::{IntervalDomain, IntervalState};
    use crate::ir::{BinOp, Comparator, Expression, Instruction, Local, Operand, OtherKind, Place};

    fn assign(name: &str, expression: Expression) -> Statement {
        Statement::new(Instruction::Assignment {
            target: Place::Local(Local::int(name)),
            expression,
        })
    }

    fn inc(name: &str, by: i64) -> Statement {
        assign(
            name,
            Expression::BinaryOp {
                op: BinOp::Add,
                left: Operand::Var(Local::int(name)),
                right: Operand::Const(by),
            },
        )
    }

    fn branch(comparator: Comparator, name: &str, bound: i64, target: usize) -> Statement {
        Statement::jumping(
            Instruction::ConditionalBranch {
                comparator,
                left: Operand::Var(Local::int(name)),
                right: Operand::Const(bound),
            },
            NodeId::new(target),
        )
    }

    fn goto(target: usize) -> Statement {
        Statement::jumping(Instruction::Other(OtherKind::Goto), NodeId::new(target))
    }

    fn ret() -> Statement {
        Statement::new(Instruction::Other(OtherKind::Return))
    }

    /// ```text
    /// 0: i = 0
    /// 1: if i >= 10 goto 4
    /// 2: i = i + 1
    /// 3: goto 1
    /// 4: return
    /// ```
    fn counted_loop() -> Cfg {
        Cfg::build(vec![
            assign("i", Expression::Constant(0)),
            branch(Comparator::Ge, "i", 10, 4),
            inc("i", 1),
            goto(1),
            ret(),
        ])
        .unwrap()
    }

    #[test]
    fn test_counted_loop_invariants() {
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&counted_loop());
        assert!(analysis.converged);
        assert!(analysis.failures.is_empty());

        let at = |n: usize| domain.bound_of_var(analysis.invariants.get(NodeId::new(n)), "i").unwrap();
        // Widening at the header loses the upper bound, but the branch
        // refinement restores it inside the loop body and at the exit.
        assert_eq!(at(1), Interval::new(Bound::finite(0), Bound::PosInf));
        assert_eq!(at(2), Interval::from_range(0, 9));
        assert_eq!(at(4), Interval::new(Bound::finite(10), Bound::PosInf));
    }

    /// ```text
    /// 0: i = 0
    /// 1: if i >= 3 goto 4
    /// 2: i = i + 1
    /// 3: goto 1
    /// 4: return
    /// ```
    fn short_loop() -> Cfg {
        Cfg::build(vec![
            assign("i", Expression::Constant(0)),
            branch(Comparator::Ge, "i", 3, 4),
            inc("i", 1),
            goto(1),
            ret(),
        ])
        .unwrap()
    }

    #[test]
    fn test_short_loop_stays_precise_below_threshold() {
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&short_loop());

        let at = |n: usize| domain.bound_of_var(analysis.invariants.get(NodeId::new(n)), "i").unwrap();
        assert_eq!(at(1), Interval::from_range(0, 3));
        assert_eq!(at(4), Interval::from_range(3, 3));
    }

    #[test]
    fn test_widening_starts_on_threshold_merge() {
        // The header sees [0, 0], [0, 1], [0, 2], [0, 3] on merges 1 to 4.
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let header = |threshold: usize| {
            let config = AnalysisConfig::default().with_widening_threshold(threshold);
            let analysis = FixpointEngine::new(&domain, &config).run(&short_loop());
            domain.bound_of_var(analysis.invariants.get(NodeId::new(1)), "i").unwrap()
        };

        assert_eq!(header(4), Interval::new(Bound::finite(0), Bound::PosInf));
        assert_eq!(header(5), Interval::from_range(0, 3));
        assert_eq!(header(3), Interval::new(Bound::finite(0), Bound::PosInf));
    }

    #[test]
    fn test_unbounded_loop_terminates() {
        // 0: i = 0
        // 1: i = i + 1
        // 2: goto 1
        let cfg = Cfg::build(vec![assign("i", Expression::Constant(0)), inc("i", 1), goto(1)]).unwrap();
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&cfg);

        assert!(analysis.converged);
        assert!(analysis.visits < 50, "took {} visits", analysis.visits);
        let header = domain.bound_of_var(analysis.invariants.get(NodeId::new(1)), "i").unwrap();
        assert_eq!(header, Interval::new(Bound::finite(0), Bound::PosInf));
    }

    #[test]
    fn test_header_values_are_monotone() {
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let cfg = counted_loop();
        let header = NodeId::new(1);

        for threshold in 0..8 {
            let config = AnalysisConfig::default().with_widening_threshold(threshold);
            let full = FixpointEngine::new(&domain, &config).run(&cfg);
            assert!(full.converged, "threshold {}", threshold);

            // The worklist order is deterministic, so a run cut off after
            // `limit` visits is a prefix of the full run.
            let history: Vec<IntervalState> = (1..=full.visits)
                .map(|limit| {
                    let config = config.clone().with_max_node_visits(limit);
                    let run = FixpointEngine::new(&domain, &config).run(&cfg);
                    run.invariants.get(header).clone()
                })
                .collect();

            for pair in history.windows(2) {
                assert!(
                    domain.le(&pair[0], &pair[1]).unwrap(),
                    "threshold {}: {} then {}",
                    threshold,
                    domain.display(&pair[0]),
                    domain.display(&pair[1])
                );
            }
            assert_eq!(history.last(), Some(full.invariants.get(header)));

            // One change per joined merge, then one for the widening.
            let changes = history.windows(2).filter(|pair| pair[0] != pair[1]).count();
            assert!(changes <= threshold.max(2), "threshold {}: {} changes", threshold, changes);
            let covers = domain.state_from([("i", Interval::from_range(0, 10))]).unwrap();
            assert!(domain.le(&covers, full.invariants.get(header)).unwrap());
        }
    }

    #[test]
    fn test_unreachable_code_stays_bottom() {
        // 0: x = 1
        // 1: if x >= 5 goto 3
        // 2: return
        // 3: x = 2
        // 4: return
        let cfg = Cfg::build(vec![
            assign("x", Expression::Constant(1)),
            branch(Comparator::Ge, "x", 5, 3),
            ret(),
            assign("x", Expression::Constant(2)),
            ret(),
        ])
        .unwrap();
        let domain = IntervalDomain::new(Environment::with_ints(["x"]));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&cfg);

        assert!(domain.is_bottom(analysis.invariants.get(NodeId::new(3))));
        assert!(domain.is_bottom(analysis.invariants.get(NodeId::new(4))));
        assert!(!domain.is_bottom(analysis.invariants.get(NodeId::new(2))));
    }

    #[test]
    fn test_join_at_ordinary_merge() {
        // 0: if x >= 0 goto 3
        // 1: y = -1
        // 2: goto 4
        // 3: y = 1
        // 4: return
        let cfg = Cfg::build(vec![
            branch(Comparator::Ge, "x", 0, 3),
            assign("y", Expression::Constant(-1)),
            goto(4),
            assign("y", Expression::Constant(1)),
            ret(),
        ])
        .unwrap();
        let domain = IntervalDomain::new(Environment::with_ints(["x", "y"]));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&cfg);

        let exit = analysis.invariants.get(NodeId::new(4));
        assert_eq!(domain.bound_of_var(exit, "y").unwrap(), Interval::from_range(-1, 1));
        assert!(domain.bound_of_var(exit, "x").unwrap().is_top());
    }

    #[test]
    fn test_visit_limit_marks_run_unconverged() {
        let domain = IntervalDomain::new(Environment::with_ints(["i"]));
        let config = AnalysisConfig::default().with_max_node_visits(3);
        let analysis = FixpointEngine::new(&domain, &config).run(&counted_loop());
        assert!(!analysis.converged);
        assert_eq!(analysis.visits, 3);
    }

    /// Domain whose joins always fail, to exercise the recovery paths.
    #[derive(Debug, Clone)]
    struct FailingJoin(IntervalDomain);

    impl AbstractDomain for FailingJoin {
        type Element = IntervalState;

        fn bottom(&self) -> IntervalState {
            self.0.bottom()
        }
        fn top(&self) -> IntervalState {
            self.0.top()
        }
        fn is_bottom(&self, elem: &IntervalState) -> bool {
            self.0.is_bottom(elem)
        }
        fn is_top(&self, elem: &IntervalState) -> bool {
            self.0.is_top(elem)
        }
        fn le(&self, a: &IntervalState, b: &IntervalState) -> Result<bool, DomainError> {
            self.0.le(a, b)
        }
        fn join(&self, _: &IntervalState, _: &IntervalState) -> Result<IntervalState, DomainError> {
            Err(DomainError::UnknownVariable("join".to_string()))
        }
        fn meet(&self, a: &IntervalState, b: &IntervalState) -> Result<IntervalState, DomainError> {
            self.0.meet(a, b)
        }
        fn widen(&self, a: &IntervalState, b: &IntervalState) -> Result<IntervalState, DomainError> {
            self.0.widen(a, b)
        }
    }

    impl NumericDomain for FailingJoin {
        fn environment(&self) -> &Environment {
            self.0.environment()
        }
        fn meet_constraint(
            &self,
            elem: &IntervalState,
            c: &crate::expr::Constraint,
        ) -> Result<IntervalState, DomainError> {
            self.0.meet_constraint(elem, c)
        }
        fn assign(
            &self,
            elem: &IntervalState,
            var: &str,
            expr: &crate::expr::NumExpr,
        ) -> Result<IntervalState, DomainError> {
            self.0.assign(elem, var, expr)
        }
        fn forget(&self, elem: &IntervalState, var: &str) -> Result<IntervalState, DomainError> {
            self.0.forget(elem, var)
        }
        fn bound(&self, elem: &IntervalState, expr: &crate::expr::NumExpr) -> Result<Interval, DomainError> {
            self.0.bound(elem, expr)
        }
        fn satisfies(&self, elem: &IntervalState, c: &crate::expr::Constraint) -> Result<bool, DomainError> {
            self.0.satisfies(elem, c)
        }
    }

    #[test]
    fn test_failed_merge_falls_back_to_top() {
        let domain = FailingJoin(IntervalDomain::new(Environment::with_ints(["i"])));
        let config = AnalysisConfig::default();
        let analysis = FixpointEngine::new(&domain, &config).run(&counted_loop());

        assert!(analysis.converged);
        assert!(!analysis.failures.is_empty());
        assert!(analysis.failures.iter().all(|f| f.step == Step::Merge));
        // Every reached state is sound: the header state covers all of i's values.
        let header = analysis.invariants.get(NodeId::new(1));
        assert!(domain.is_top(header));
    }
}
