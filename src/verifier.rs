//! Per-procedure and per-class verdicts.

use std::fmt;

use crate::check::{check_bounds, check_division, BoundsReport, DivisionReport};
use crate::config::AnalysisConfig;
use crate::domain::NumericDomain;
use crate::environment::Environment;
use crate::fixpoint::{Analysis, FixpointEngine};
use crate::interval_domain::{IntervalDomain, IntervalState};
use crate::pointsto::{collect_allocation_sites, LocalPointsTo};
use crate::program::{Class, Procedure};

/// Result of verifying one procedure.
#[derive(Debug, Clone)]
pub struct ProcedureVerdict {
    pub name: String,
    pub division_safe: bool,
    pub bounds_safe: bool,
    pub division: DivisionReport,
    pub bounds: BoundsReport,
    pub converged: bool,
    pub domain_failures: usize,
}

/// Runs the engine and both checks on one procedure with a fresh interval
/// domain over its environment.
pub fn verify_procedure(class: &Class, procedure: &Procedure, config: &AnalysisConfig) -> ProcedureVerdict {
    let (domain, analysis) = analyze_procedure(class, procedure, config);
    verdict_from(&domain, procedure, &analysis, config)
}

/// Checks `analysis` of `procedure` and folds the outcome into a verdict.
pub fn verdict_from<D: NumericDomain>(
    domain: &D,
    procedure: &Procedure,
    analysis: &Analysis<D::Element>,
    config: &AnalysisConfig,
) -> ProcedureVerdict {
    let cfg = &procedure.cfg;
    let sites = collect_allocation_sites(cfg, &config.collection);
    let oracle = LocalPointsTo::analyze(procedure, &config.collection);

    let division = check_division(domain, cfg, &analysis.invariants);
    let bounds = check_bounds(domain, cfg, &analysis.invariants, &sites, &oracle, &config.collection);

    // Invariants of an unfinished run are not sound.
    let mut trusted = analysis.converged;
    if config.strict_domain_errors && !analysis.failures.is_empty() {
        log::info!(
            "{}: {} domain failures, reporting unsafe",
            procedure.name,
            analysis.failures.len()
        );
        trusted = false;
    }

    let verdict = ProcedureVerdict {
        name: procedure.name.clone(),
        division_safe: trusted && division.is_safe(),
        bounds_safe: trusted && bounds.is_safe(),
        division,
        bounds,
        converged: analysis.converged,
        domain_failures: analysis.failures.len(),
    };
    log::info!(
        "{}: division {}, bounds {}",
        verdict.name,
        if verdict.division_safe { "safe" } else { "unproven" },
        if verdict.bounds_safe { "safe" } else { "unproven" }
    );
    verdict
}

/// Result of verifying every procedure of a class.
#[derive(Debug, Clone)]
pub struct ClassVerdict {
    pub class: String,
    pub procedures: Vec<ProcedureVerdict>,
}

impl ClassVerdict {
    pub fn division_safe(&self) -> bool {
        self.procedures.iter().all(|p| p.division_safe)
    }

    pub fn bounds_safe(&self) -> bool {
        self.procedures.iter().all(|p| p.bounds_safe)
    }

    /// `<class> NO_DIV_ZERO` or `<class> MAY_DIV_ZERO`
    pub fn division_line(&self) -> String {
        let verdict = if self.division_safe() { "NO_DIV_ZERO" } else { "MAY_DIV_ZERO" };
        format!("{} {}", self.class, verdict)
    }

    /// `<class> NO_OUT_OF_BOUNDS` or `<class> MAY_OUT_OF_BOUNDS`
    pub fn bounds_line(&self) -> String {
        let verdict = if self.bounds_safe() {
            "NO_OUT_OF_BOUNDS"
        } else {
            "MAY_OUT_OF_BOUNDS"
        };
        format!("{} {}", self.class, verdict)
    }
}

impl fmt::Display for ClassVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.division_line())?;
        writeln!(f, "{}", self.bounds_line())
    }
}

/// Verifies every procedure of `class` independently.
pub fn verify_class(class: &Class, config: &AnalysisConfig) -> ClassVerdict {
    log::info!("Verifying {} ({} procedures)", class.name, class.procedures.len());
    let procedures = class
        .procedures
        .iter()
        .map(|procedure| verify_procedure(class, procedure, config))
        .collect();
    ClassVerdict {
        class: class.name.clone(),
        procedures,
    }
}

/// Fixpoint of one procedure over the interval domain.
pub fn analyze_procedure(
    class: &Class,
    procedure: &Procedure,
    config: &AnalysisConfig,
) -> (IntervalDomain, Analysis<IntervalState>) {
    let domain = IntervalDomain::new(Environment::for_procedure(class, procedure));
    let analysis = FixpointEngine::new(&domain, config).run(&procedure.cfg);
    (domain, analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(name: &str, division_safe: bool, bounds_safe: bool) -> ProcedureVerdict {
        ProcedureVerdict {
            name: name.to_string(),
            division_safe,
            bounds_safe,
            division: DivisionReport::default(),
            bounds: BoundsReport::default(),
            converged: true,
            domain_failures: 0,
        }
    }

    #[test]
    fn test_class_lines_fold_with_and() {
        let safe = ClassVerdict {
            class: "demo.Printer".to_string(),
            procedures: vec![verdict("a", true, true), verdict("b", true, true)],
        };
        assert_eq!(safe.to_string(), "demo.Printer NO_DIV_ZERO\ndemo.Printer NO_OUT_OF_BOUNDS\n");

        let mixed = ClassVerdict {
            class: "demo.Printer".to_string(),
            procedures: vec![verdict("a", true, false), verdict("b", false, true)],
        };
        assert_eq!(mixed.division_line(), "demo.Printer MAY_DIV_ZERO");
        assert_eq!(mixed.bounds_line(), "demo.Printer MAY_OUT_OF_BOUNDS");

        let empty = ClassVerdict {
            class: "demo.Empty".to_string(),
            procedures: vec![],
        };
        assert!(empty.division_safe() && empty.bounds_safe());
    }
}
