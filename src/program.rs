//! Classes and procedures as handed to the verifier.

use crate::cfg::Cfg;
use crate::ir::{Local, Type};

/// Field declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
}

/// A method body in CFG form.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    /// Parameters, in declaration order. Also listed in `locals`.
    pub params: Vec<Local>,
    /// Every local of the body, parameters first.
    pub locals: Vec<Local>,
    pub cfg: Cfg,
}

impl Procedure {
    pub fn local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().find(|l| l.name == name)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    /// Fully qualified name, e.g. `demo.Printer`.
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub procedures: Vec<Procedure>,
}

impl Class {
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}
