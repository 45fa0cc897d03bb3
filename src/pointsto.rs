//! Allocation sites of the bounded collection and the alias oracle.
//!
//! An allocation site is a constructor call of the collection type. Its
//! identifier is the node holding the call, and its valid index interval
//! is `[0, size - 1]` when the size argument is a constant.
//!
//! [`LocalPointsTo`] resolves collection-typed locals of one procedure to
//! the sites they may refer to. It is flow-insensitive and inclusion-based:
//! every constructor call seeds its receiver with the site, every local
//! copy `a = b` adds `pts(b) ⊆ pts(a)`, and the constraints are solved to a
//! fixed point. A local that may also receive a value from anywhere else
//! (a parameter, a call result, a field or array read) cannot be resolved.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::cfg::Cfg;
use crate::config::CollectionModel;
use crate::interval::Interval;
use crate::ir::{CallKind, Expression, Instruction, Local, Operand, Place};
use crate::program::Procedure;
use crate::types::{NodeId, SiteId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSite {
    pub id: SiteId,
    /// Valid index interval, `None` if the size is not a constant.
    pub valid: Option<Interval>,
}

/// Allocation sites of the collection in `cfg`, by identifier.
pub fn collect_allocation_sites(cfg: &Cfg, collection: &CollectionModel) -> BTreeMap<SiteId, AllocationSite> {
    let mut sites = BTreeMap::new();
    for node in cfg.nodes() {
        let Instruction::Call(call) = &node.instruction else {
            continue;
        };
        if call.kind != CallKind::Constructor || call.class.as_deref() != Some(collection.type_name.as_str()) {
            continue;
        }
        let id = SiteId::new(node.id);
        let valid = match call.args.first() {
            // An empty interval when size <= 0: no index is valid.
            Some(Operand::Const(size)) => Some(Interval::from_range(0, size.saturating_sub(1))),
            _ => {
                log::info!("Size of {} at {} is not a constant", collection.type_name, id);
                None
            }
        };
        log::debug!(
            "Allocation {} of {}: valid indices {}",
            id,
            collection.type_name,
            valid.as_ref().map_or("unknown".to_string(), |v| v.to_string())
        );
        sites.insert(id, AllocationSite { id, valid });
    }
    sites
}

/// Resolves the receiver of an indexing call to allocation sites.
pub trait AliasOracle {
    /// Sites `receiver` may refer to, or `None` if it cannot be resolved.
    fn possible_targets(&self, receiver: &Local) -> Option<BTreeSet<SiteId>>;
}

/// Intraprocedural inclusion-based points-to sets of collection locals.
#[derive(Debug, Clone, Default)]
pub struct LocalPointsTo {
    points_to: BTreeMap<String, BTreeSet<SiteId>>,
    unresolved: HashSet<String>,
}

impl LocalPointsTo {
    pub fn analyze(procedure: &Procedure, collection: &CollectionModel) -> Self {
        let mut result = LocalPointsTo::default();
        // dst ⊇ src
        let mut copies: Vec<(String, String)> = Vec::new();

        for param in &procedure.params {
            if collection.is_collection(&param.ty) {
                result.unresolved.insert(param.name.clone());
            }
        }

        for node in procedure.cfg.nodes() {
            result.constrain(node.id, &node.instruction, collection, &mut copies);
        }

        // Solve: propagate along copies until nothing changes.
        let mut changed = true;
        while changed {
            changed = false;
            for (dst, src) in &copies {
                if result.unresolved.contains(src) && result.unresolved.insert(dst.clone()) {
                    changed = true;
                }
                let from = result.points_to.get(src).cloned().unwrap_or_default();
                let into = result.points_to.entry(dst.clone()).or_default();
                let before = into.len();
                into.extend(from);
                changed |= into.len() != before;
            }
        }

        for (local, sites) in &result.points_to {
            log::trace!("pts({}) = {:?}", local, sites);
        }
        result
    }

    fn constrain(
        &mut self,
        node: NodeId,
        instruction: &Instruction,
        collection: &CollectionModel,
        copies: &mut Vec<(String, String)>,
    ) {
        match instruction {
            Instruction::Call(call) if call.kind == CallKind::Constructor => {
                if let Some(receiver) = &call.receiver {
                    if collection.is_collection(&receiver.ty) {
                        if call.class.as_deref() == Some(collection.type_name.as_str()) {
                            self.points_to.entry(receiver.name.clone()).or_default().insert(SiteId::new(node));
                        } else {
                            self.unresolved.insert(receiver.name.clone());
                        }
                    }
                }
            }
            Instruction::Assignment {
                target: Place::Local(target),
                expression,
            } if collection.is_collection(&target.ty) => match expression {
                Expression::VariableRef(source) => copies.push((target.name.clone(), source.name.clone())),
                other => {
                    log::info!("{} = {} cannot be resolved to an allocation site", target, other);
                    self.unresolved.insert(target.name.clone());
                }
            },
            _ => {}
        }
    }
}

impl AliasOracle for LocalPointsTo {
    fn possible_targets(&self, receiver: &Local) -> Option<BTreeSet<SiteId>> {
        if self.unresolved.contains(&receiver.name) {
            return None;
        }
        Some(self.points_to.get(&receiver.name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Statement;
    use crate::ir::{Call, OtherKind, Type};

    fn printer(name: &str) -> Local {
        Local::new(name, Type::Object("PrinterArray".to_string()))
    }

    fn alloc(receiver: &str, size: Operand) -> Statement {
        Statement::new(Instruction::Call(Call {
            kind: CallKind::Constructor,
            receiver: Some(printer(receiver)),
            class: Some("PrinterArray".to_string()),
            method: "<init>".to_string(),
            args: vec![size],
        }))
    }

    fn copy(dst: &str, src: &str) -> Statement {
        Statement::new(Instruction::Assignment {
            target: Place::Local(printer(dst)),
            expression: Expression::VariableRef(printer(src)),
        })
    }

    fn procedure(params: Vec<Local>, body: Vec<Statement>) -> Procedure {
        let mut locals = params.clone();
        locals.extend(["a", "b", "c"].map(printer));
        Procedure {
            name: "run".to_string(),
            params,
            locals,
            cfg: Cfg::build(body).unwrap(),
        }
    }

    #[test]
    fn test_sites_have_valid_intervals() {
        let collection = CollectionModel::default();
        let cfg = Cfg::build(vec![
            alloc("a", Operand::Const(5)),
            alloc("b", Operand::Var(Local::int("n"))),
            alloc("c", Operand::Const(0)),
            Statement::new(Instruction::Other(OtherKind::Return)),
        ])
        .unwrap();
        let sites = collect_allocation_sites(&cfg, &collection);
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[&SiteId::new(NodeId::new(0))].valid, Some(Interval::from_range(0, 4)));
        assert_eq!(sites[&SiteId::new(NodeId::new(1))].valid, None);
        assert!(sites[&SiteId::new(NodeId::new(2))].valid.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_copies_propagate_sites() {
        let collection = CollectionModel::default();
        let proc = procedure(
            vec![],
            vec![alloc("a", Operand::Const(5)), alloc("b", Operand::Const(2)), copy("c", "a"), copy("c", "b")],
        );
        let pts = LocalPointsTo::analyze(&proc, &collection);
        let s0 = SiteId::new(NodeId::new(0));
        let s1 = SiteId::new(NodeId::new(1));
        assert_eq!(pts.possible_targets(&printer("a")), Some(BTreeSet::from([s0])));
        assert_eq!(pts.possible_targets(&printer("c")), Some(BTreeSet::from([s0, s1])));
    }

    #[test]
    fn test_copy_order_does_not_matter() {
        let collection = CollectionModel::default();
        // c = b textually precedes b = a and the allocation of a.
        let proc = procedure(vec![], vec![copy("c", "b"), copy("b", "a"), alloc("a", Operand::Const(3))]);
        let pts = LocalPointsTo::analyze(&proc, &collection);
        let site = SiteId::new(NodeId::new(2));
        assert_eq!(pts.possible_targets(&printer("c")), Some(BTreeSet::from([site])));
    }

    #[test]
    fn test_unresolvable_sources() {
        let collection = CollectionModel::default();
        let proc = procedure(
            vec![printer("p")],
            vec![
                copy("a", "p"),
                Statement::new(Instruction::Assignment {
                    target: Place::Local(printer("b")),
                    expression: Expression::Opaque("this.printers".to_string()),
                }),
            ],
        );
        let pts = LocalPointsTo::analyze(&proc, &collection);
        assert_eq!(pts.possible_targets(&printer("p")), None);
        assert_eq!(pts.possible_targets(&printer("a")), None);
        assert_eq!(pts.possible_targets(&printer("b")), None);
        // Never assigned: resolves to no site at all.
        assert_eq!(pts.possible_targets(&printer("c")), Some(BTreeSet::new()));
    }
}
