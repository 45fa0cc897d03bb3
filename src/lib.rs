//! # abstract-verifier: interval-based abstract interpretation
//!
//! **`abstract-verifier`** proves two safety properties of the procedures of a class
//! written in a small three-address intermediate representation:
//!
//! - no integer division or remainder by zero;
//! - no out-of-bounds index passed to the indexing method of a bounded
//!   resource collection (by default `PrinterArray.sendJob`).
//!
//! The verdict for a property is *safe* only if it holds on every
//! reachable execution of every procedure. Anything the analysis cannot
//! prove is reported as *may fail*.
//!
//! ## How it works
//!
//! 1. The [`parser`] turns a `.jir` file into a [`program::Class`], building a
//!    [`cfg::Cfg`] per procedure and detecting loop headers.
//! 2. The [`fixpoint`] engine propagates abstract states over the CFG:
//!    joins at merges, widening at loop headers once the
//!    [`widening threshold`][config::AnalysisConfig::widening_threshold] is reached.
//!    [`transfer`] functions model assignments and refine both edges of a branch.
//! 3. The [`check`]ers read the invariants at each division and indexing call,
//!    with [`pointsto`] resolving which allocations a receiver may refer to.
//! 4. The [`verifier`] folds per-procedure results into two class verdict lines.
//!
//! The abstract domain sits behind the [`domain::NumericDomain`] trait;
//! [`interval_domain::IntervalDomain`] is the non-relational box domain over
//! unbounded integers used by default.
//!
//! ## Basic Usage
//!
//! ```rust
//! use abstract_verifier::config::AnalysisConfig;
//! use abstract_verifier::parser::parse_class;
//! use abstract_verifier::verifier::verify_class;
//!
//! let source = "
//! class demo.Printer
//! method run
//!   local int i
//!   local PrinterArray p
//!   p = new PrinterArray(5)
//!   i = 0
//! head:
//!   if i >= 5 goto done
//!   p.sendJob(i)
//!   i = i + 1
//!   goto head
//! done:
//! end
//! ";
//! let class = parse_class(source).unwrap();
//! let verdict = verify_class(&class, &AnalysisConfig::default());
//!
//! assert_eq!(verdict.division_line(), "demo.Printer NO_DIV_ZERO");
//! assert_eq!(verdict.bounds_line(), "demo.Printer NO_OUT_OF_BOUNDS");
//! ```

pub mod cfg;
pub mod check;
pub mod config;
pub mod domain;
pub mod dot;
pub mod environment;
pub mod expr;
pub mod fixpoint;
pub mod interval;
pub mod interval_domain;
pub mod ir;
pub mod loader;
pub mod parser;
pub mod pointsto;
pub mod program;
pub mod transfer;
pub mod types;
pub mod verifier;
