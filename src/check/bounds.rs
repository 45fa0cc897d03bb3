//! Out-of-bounds check for the bounded resource collection.
//!
//! Every reachable call of the indexing method on a collection-typed
//! receiver must use an index inside the valid interval of *every*
//! allocation site the receiver may refer to.

use std::collections::BTreeMap;
use std::fmt;

use crate::cfg::Cfg;
use crate::config::CollectionModel;
use crate::domain::NumericDomain;
use crate::fixpoint::Invariants;
use crate::interval::{Inclusion, Interval};
use crate::ir::{Call, CallKind, Local};
use crate::pointsto::{AliasOracle, AllocationSite};
use crate::types::{NodeId, SiteId};

use super::operand_bound;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Safe,
    /// The receiver could not be resolved to allocation sites.
    Unresolved,
    /// The receiver may refer to no allocation site at all.
    NoTargets,
    /// The call has no index argument.
    MissingIndex,
    /// The site's size is not a constant.
    UnknownSize(SiteId),
    /// The index may fall outside the site's valid interval.
    OutOfBounds { site: SiteId, valid: Interval },
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Safe => write!(f, "safe"),
            AccessOutcome::Unresolved => write!(f, "receiver cannot be resolved"),
            AccessOutcome::NoTargets => write!(f, "receiver refers to no allocation"),
            AccessOutcome::MissingIndex => write!(f, "no index argument"),
            AccessOutcome::UnknownSize(site) => write!(f, "size of {} is unknown", site),
            AccessOutcome::OutOfBounds { site, valid } => write!(f, "may exceed {} of {}", valid, site),
        }
    }
}

/// One reachable indexing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFinding {
    pub node: NodeId,
    pub receiver: Local,
    pub index: Interval,
    pub outcome: AccessOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundsReport {
    pub findings: Vec<AccessFinding>,
}

impl BoundsReport {
    pub fn is_safe(&self) -> bool {
        self.findings.iter().all(|f| f.outcome == AccessOutcome::Safe)
    }

    pub fn violations(&self) -> impl Iterator<Item = &AccessFinding> {
        self.findings.iter().filter(|f| f.outcome != AccessOutcome::Safe)
    }
}

/// `index` is within `valid` when `valid` equals or strictly contains it.
pub fn within(valid: &Interval, index: &Interval) -> bool {
    matches!(valid.inclusion(index), Inclusion::Equal | Inclusion::Superset)
}

/// Checks every reachable indexing call in `cfg`.
pub fn check_bounds<D, O>(
    domain: &D,
    cfg: &Cfg,
    invariants: &Invariants<D::Element>,
    sites: &BTreeMap<SiteId, AllocationSite>,
    oracle: &O,
    collection: &CollectionModel,
) -> BoundsReport
where
    D: NumericDomain,
    O: AliasOracle,
{
    let mut report = BoundsReport::default();

    for node in cfg.nodes() {
        let Some((call, receiver)) = node.instruction.call().and_then(|c| indexing(c, collection)) else {
            continue;
        };
        let state = invariants.get(node.id);
        if domain.is_bottom(state) {
            log::trace!("Skipping unreachable {} at {}", call, node.id);
            continue;
        }

        let (index, outcome) = match call.args.first() {
            None => (Interval::top(), AccessOutcome::MissingIndex),
            Some(arg) => {
                let index = operand_bound(domain, state, arg);
                let outcome = access_outcome(&index, receiver, sites, oracle);
                (index, outcome)
            }
        };

        match &outcome {
            AccessOutcome::Safe => log::debug!("{}: {} with index {} is in bounds", node.id, call, index),
            other => log::info!("{}: {} with index {}: {}", node.id, call, index, other),
        }
        report.findings.push(AccessFinding {
            node: node.id,
            receiver: receiver.clone(),
            index,
            outcome,
        });
    }

    report
}

/// The call and its receiver, if `call` indexes into the collection.
fn indexing<'c>(call: &'c Call, collection: &CollectionModel) -> Option<(&'c Call, &'c Local)> {
    if call.kind != CallKind::Virtual || call.method != collection.index_method {
        return None;
    }
    let receiver = call.receiver.as_ref()?;
    collection.is_collection(&receiver.ty).then_some((call, receiver))
}

fn access_outcome<O: AliasOracle>(
    index: &Interval,
    receiver: &Local,
    sites: &BTreeMap<SiteId, AllocationSite>,
    oracle: &O,
) -> AccessOutcome {
    let Some(targets) = oracle.possible_targets(receiver) else {
        return AccessOutcome::Unresolved;
    };
    if targets.is_empty() {
        return AccessOutcome::NoTargets;
    }
    for site in targets {
        let Some(valid) = sites.get(&site).and_then(|s| s.valid.as_ref()) else {
            return AccessOutcome::UnknownSize(site);
        };
        if !within(valid, index) {
            return AccessOutcome::OutOfBounds {
                site,
                valid: valid.clone(),
            };
        }
    }
    AccessOutcome::Safe
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::interval::Bound;

    /// Oracle with a fixed answer for every receiver.
    struct Fixed(Option<BTreeSet<SiteId>>);

    impl AliasOracle for Fixed {
        fn possible_targets(&self, _: &Local) -> Option<BTreeSet<SiteId>> {
            self.0.clone()
        }
    }

    fn site(n: usize, valid: Option<Interval>) -> (SiteId, AllocationSite) {
        let id = SiteId::new(NodeId::new(n));
        (id, AllocationSite { id, valid })
    }

    fn receiver() -> Local {
        Local::new("p", crate::ir::Type::Object("PrinterArray".to_string()))
    }

    #[test]
    fn test_within() {
        let valid = Interval::from_range(0, 4);
        assert!(within(&valid, &Interval::constant(4)));
        assert!(!within(&valid, &Interval::constant(5)));
        assert!(within(&valid, &Interval::from_range(0, 4)));
        assert!(!within(&valid, &Interval::from_range(0, 5)));
        assert!(!within(&valid, &Interval::from_range(-1, 2)));
        assert!(!within(&valid, &Interval::new(Bound::finite(0), Bound::PosInf)));
        assert!(!within(&Interval::bottom(), &Interval::constant(0)));
    }

    #[test]
    fn test_every_alias_must_contain_the_index() {
        let sites: BTreeMap<_, _> = [
            site(0, Some(Interval::from_range(0, 4))),
            site(1, Some(Interval::from_range(0, 1))),
        ]
        .into_iter()
        .collect();
        let both = Fixed(Some(sites.keys().copied().collect()));
        let first = Fixed(Some(BTreeSet::from([SiteId::new(NodeId::new(0))])));

        let index = Interval::from_range(0, 3);
        assert_eq!(access_outcome(&index, &receiver(), &sites, &first), AccessOutcome::Safe);
        assert_eq!(
            access_outcome(&index, &receiver(), &sites, &both),
            AccessOutcome::OutOfBounds {
                site: SiteId::new(NodeId::new(1)),
                valid: Interval::from_range(0, 1)
            }
        );
    }

    #[test]
    fn test_unresolved_receivers_are_unsafe() {
        let sites: BTreeMap<_, _> = [site(0, None)].into_iter().collect();
        let index = Interval::constant(0);
        assert_eq!(
            access_outcome(&index, &receiver(), &sites, &Fixed(None)),
            AccessOutcome::Unresolved
        );
        assert_eq!(
            access_outcome(&index, &receiver(), &sites, &Fixed(Some(BTreeSet::new()))),
            AccessOutcome::NoTargets
        );
        let id = SiteId::new(NodeId::new(0));
        assert_eq!(
            access_outcome(&index, &receiver(), &sites, &Fixed(Some(BTreeSet::from([id])))),
            AccessOutcome::UnknownSize(id)
        );
    }
}
