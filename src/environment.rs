//! The set of integer variables tracked by the numeric domain.

use std::collections::HashMap;
use std::fmt;

use crate::ir::Type;
use crate::program::{Class, Procedure};

/// Ordered set of distinct integer variables.
///
/// Positions are stable: the domain stores one component per variable,
/// indexed by [`Environment::position`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<String>,
    index: HashMap<String, usize>,
}

impl Environment {
    /// Builds an environment from integer variable names.
    ///
    /// Duplicates are ignored; the first occurrence fixes the position.
    pub fn with_ints<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut env = Self::default();
        for name in names {
            env.add(name);
        }
        env
    }

    /// Integer-typed locals of the procedure followed by integer-typed
    /// fields of its declaring class.
    pub fn for_procedure(class: &Class, procedure: &Procedure) -> Self {
        let locals = procedure.locals.iter().filter(|l| l.ty == Type::Int).map(|l| l.name.clone());
        let fields = class.fields.iter().filter(|f| f.ty == Type::Int).map(|f| f.name.clone());
        let env = Self::with_ints(locals.chain(fields));
        log::debug!("Environment of {}.{}: {}", class.name, procedure.name, env);
        env
    }

    /// Adds a variable; returns `false` if it is already present.
    fn add(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }
        self.index.insert(name.clone(), self.vars.len());
        self.vars.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(String::as_str)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, "}}")
    }
}
