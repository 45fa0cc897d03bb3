//! Parser for the textual three-address class format (`.jir`).
//!
//! Format:
//! - `class <qualified.Name>` - first directive of the file
//! - `field <type> <name>` - a field of the class
//! - `method <name>` ... `end` - a method body
//! - `param <type> <name>` / `local <type> <name>` - declarations, before use
//! - `<label>:` - names the next statement
//! - statements, one per line:
//!   `x = a`, `x = a <op> b` (`+ - * / %`), `x = -a`, `x = new T(args)`,
//!   `x = r.m(args)`, `x = m(args)`, `x = r.f`, `x = a[i]`, `r.f = a`,
//!   `a[i] = b`, `if a <cmp> b goto L`, `goto L`, `r.m(args)`, `m(args)`,
//!   `return [a]`, `nop`
//! - Lines starting with '#' are comments; `#` also starts a trailing comment
//!
//! Operands are integer literals, `true`/`false`, `null`, or declared
//! locals. Every method implicitly declares `this`.

use std::collections::HashMap;
use std::fmt;

use crate::cfg::{Cfg, CfgError, Statement};
use crate::ir::{BinOp, Call, CallKind, Comparator, Expression, Instruction, Local, Operand, OtherKind, Place, Type};
use crate::program::{Class, FieldDecl, Procedure};
use crate::types::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    Syntax(String),
    UndeclaredVariable(String),
    UndefinedLabel(String),
    Duplicate(String),
    UnterminatedMethod(String),
    MissingClass,
    Cfg(CfgError),
}

/// Parse failure at a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }

    fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(line, ParseErrorKind::Syntax(message.into()))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ParseErrorKind::Syntax(msg) => write!(f, "{}", msg),
            ParseErrorKind::UndeclaredVariable(name) => write!(f, "undeclared variable '{}'", name),
            ParseErrorKind::UndefinedLabel(name) => write!(f, "undefined label '{}'", name),
            ParseErrorKind::Duplicate(name) => write!(f, "duplicate declaration of '{}'", name),
            ParseErrorKind::UnterminatedMethod(name) => write!(f, "method '{}' has no 'end'", name),
            ParseErrorKind::MissingClass => write!(f, "expected 'class <name>'"),
            ParseErrorKind::Cfg(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {}

/// Method being parsed.
struct MethodBuilder {
    name: String,
    start_line: usize,
    params: Vec<Local>,
    locals: Vec<Local>,
    statements: Vec<Statement>,
    labels: HashMap<String, usize>,
    // (statement index, label, line)
    jumps: Vec<(usize, String, usize)>,
}

impl MethodBuilder {
    fn new(name: &str, class: &str, start_line: usize) -> Self {
        Self {
            name: name.to_string(),
            start_line,
            params: Vec::new(),
            locals: vec![Local::new("this", Type::Object(class.to_string()))],
            statements: Vec::new(),
            labels: HashMap::new(),
            jumps: Vec::new(),
        }
    }

    fn declare(&mut self, line: usize, ty: &str, name: &str, is_param: bool) -> Result<(), ParseError> {
        let ty = parse_type(line, ty)?;
        let name = identifier(line, name)?;
        if self.lookup(name).is_some() {
            return Err(ParseError::new(line, ParseErrorKind::Duplicate(name.to_string())));
        }
        let local = Local::new(name, ty);
        if is_param {
            self.params.push(local.clone());
        }
        self.locals.push(local);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Local> {
        self.locals.iter().find(|l| l.name == name)
    }

    fn local(&self, line: usize, name: &str) -> Result<Local, ParseError> {
        self.lookup(name)
            .cloned()
            .ok_or_else(|| ParseError::new(line, ParseErrorKind::UndeclaredVariable(name.to_string())))
    }

    fn operand(&self, line: usize, token: &str) -> Result<Operand, ParseError> {
        match token {
            "true" => return Ok(Operand::Const(1)),
            "false" | "null" => return Ok(Operand::Const(0)),
            _ => {}
        }
        if let Ok(value) = token.parse::<i64>() {
            return Ok(Operand::Const(value));
        }
        let name = identifier(line, token)?;
        Ok(Operand::Var(self.local(line, name)?))
    }

    fn arguments(&self, line: usize, inner: &str) -> Result<Vec<Operand>, ParseError> {
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }
        inner.split(',').map(|arg| self.operand(line, arg.trim())).collect()
    }

    /// `r.m(args)` or `m(args)`.
    fn call(&self, line: usize, text: &str) -> Result<Call, ParseError> {
        let (callee, inner) = split_call(line, text)?;
        let args = self.arguments(line, inner)?;
        match callee.split_once('.') {
            Some((receiver, method)) => Ok(Call {
                kind: CallKind::Virtual,
                receiver: Some(self.local(line, identifier(line, receiver)?)?),
                class: None,
                method: identifier(line, method)?.to_string(),
                args,
            }),
            None => Ok(Call {
                kind: CallKind::Static,
                receiver: None,
                class: None,
                method: identifier(line, callee)?.to_string(),
                args,
            }),
        }
    }

    fn place(&self, line: usize, text: &str) -> Result<Place, ParseError> {
        if let Some((base, index)) = text.strip_suffix(']').and_then(|t| t.split_once('[')) {
            return Ok(Place::ArrayElement {
                base: self.local(line, identifier(line, base.trim())?)?,
                index: self.operand(line, index.trim())?,
            });
        }
        if let Some((base, field)) = text.split_once('.') {
            return Ok(Place::Field {
                base: Some(self.local(line, identifier(line, base)?)?),
                field: identifier(line, field)?.to_string(),
            });
        }
        Ok(Place::Local(self.local(line, identifier(line, text)?)?))
    }

    fn expression(&self, line: usize, text: &str) -> Result<Expression, ParseError> {
        if text.ends_with(')') {
            return Ok(Expression::Invoke(self.call(line, text)?));
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [left, op, right] => {
                let op = match *op {
                    "+" => BinOp::Add,
                    "-" => BinOp::Sub,
                    "*" => BinOp::Mul,
                    "/" => BinOp::Div,
                    "%" => BinOp::Rem,
                    other => return Err(ParseError::syntax(line, format!("unknown operator '{}'", other))),
                };
                Ok(Expression::BinaryOp {
                    op,
                    left: self.operand(line, left)?,
                    right: self.operand(line, right)?,
                })
            }
            [single] => self.simple_expression(line, single),
            _ => Err(ParseError::syntax(line, format!("cannot parse expression '{}'", text))),
        }
    }

    fn simple_expression(&self, line: usize, token: &str) -> Result<Expression, ParseError> {
        if token == "null" {
            return Ok(Expression::Opaque("null".to_string()));
        }
        if let Some(negated) = token.strip_prefix('-').filter(|t| t.parse::<i64>().is_err()) {
            // -y is 0 - y
            return Ok(Expression::BinaryOp {
                op: BinOp::Sub,
                left: Operand::Const(0),
                right: self.operand(line, negated)?,
            });
        }
        if let Some((base, _)) = token.split_once('.').or_else(|| token.split_once('[')) {
            // Field and array reads are not modeled beyond their base.
            self.local(line, identifier(line, base)?)?;
            return Ok(Expression::Opaque(token.to_string()));
        }
        Ok(match self.operand(line, token)? {
            Operand::Const(c) => Expression::Constant(c),
            Operand::Var(local) => Expression::VariableRef(local),
        })
    }

    fn statement(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let index = self.statements.len();

        let stmt = match tokens.as_slice() {
            ["if", left, cmp, right, "goto", label] => {
                let comparator = Comparator::parse(cmp)
                    .ok_or_else(|| ParseError::syntax(line, format!("unknown comparator '{}'", cmp)))?;
                let instruction = Instruction::ConditionalBranch {
                    comparator,
                    left: self.operand(line, left)?,
                    right: self.operand(line, right)?,
                };
                self.jumps.push((index, label.to_string(), line));
                Statement::new(instruction)
            }
            ["if", ..] => return Err(ParseError::syntax(line, "expected 'if <a> <cmp> <b> goto <label>'")),
            ["goto", label] => {
                self.jumps.push((index, label.to_string(), line));
                Statement::new(Instruction::Other(OtherKind::Goto))
            }
            ["return"] => Statement::new(Instruction::Other(OtherKind::Return)),
            ["return", value] => {
                self.operand(line, value)?;
                Statement::new(Instruction::Other(OtherKind::Return))
            }
            ["nop"] => Statement::new(Instruction::Other(OtherKind::Nop)),
            _ => match text.split_once('=') {
                Some((lhs, rhs)) => self.assignment(line, lhs.trim(), rhs.trim())?,
                None if text.ends_with(')') => Statement::new(Instruction::Call(self.call(line, text)?)),
                None => return Err(ParseError::syntax(line, format!("cannot parse statement '{}'", text))),
            },
        };

        self.statements.push(stmt);
        Ok(())
    }

    fn assignment(&self, line: usize, lhs: &str, rhs: &str) -> Result<Statement, ParseError> {
        let target = self.place(line, lhs)?;

        if let Some(constructor) = rhs.strip_prefix("new ") {
            let Place::Local(receiver) = target else {
                return Err(ParseError::syntax(line, "'new' must be assigned to a local"));
            };
            let (class, inner) = split_call(line, constructor.trim())?;
            let call = Call {
                kind: CallKind::Constructor,
                receiver: Some(receiver),
                class: Some(type_name(line, class)?.to_string()),
                method: "<init>".to_string(),
                args: self.arguments(line, inner)?,
            };
            return Ok(Statement::new(Instruction::Call(call)));
        }

        Ok(Statement::new(Instruction::Assignment {
            target,
            expression: self.expression(line, rhs)?,
        }))
    }

    fn finish(mut self) -> Result<Procedure, ParseError> {
        let end = self.statements.len();
        if end == 0 || self.labels.values().any(|&target| target == end) {
            self.statements.push(Statement::new(Instruction::Other(OtherKind::Return)));
        }
        for (index, label, line) in &self.jumps {
            let target = self
                .labels
                .get(label)
                .ok_or_else(|| ParseError::new(*line, ParseErrorKind::UndefinedLabel(label.clone())))?;
            self.statements[*index].jump = Some(NodeId::new(*target));
        }
        let cfg = Cfg::build(self.statements).map_err(|e| ParseError::new(self.start_line, ParseErrorKind::Cfg(e)))?;
        Ok(Procedure {
            name: self.name,
            params: self.params,
            locals: self.locals,
            cfg,
        })
    }
}

/// Parses one class from the textual format.
pub fn parse_class(source: &str) -> Result<Class, ParseError> {
    let mut class: Option<Class> = None;
    let mut method: Option<MethodBuilder> = None;

    for (line_num, raw) in source.lines().enumerate() {
        let line = line_num + 1;
        let text = raw.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let parts: Vec<&str> = text.split_whitespace().collect();

        let Some(current) = class.as_mut() else {
            match parts.as_slice() {
                ["class", name] => {
                    class = Some(Class {
                        name: type_name(line, name)?.to_string(),
                        fields: Vec::new(),
                        procedures: Vec::new(),
                    });
                    continue;
                }
                _ => return Err(ParseError::new(line, ParseErrorKind::MissingClass)),
            }
        };

        if let Some(builder) = method.as_mut() {
            match parts.as_slice() {
                ["end"] => {
                    if let Some(builder) = method.take() {
                        let procedure = builder.finish()?;
                        log::debug!(
                            "Parsed {}.{}: {} statements",
                            current.name,
                            procedure.name,
                            procedure.cfg.len()
                        );
                        current.procedures.push(procedure);
                    }
                }
                ["param", ty, name] => builder.declare(line, ty, name, true)?,
                ["local", ty, name] => builder.declare(line, ty, name, false)?,
                [label] if label.ends_with(':') => {
                    let label = identifier(line, label.trim_end_matches(':'))?;
                    let target = builder.statements.len();
                    if builder.labels.insert(label.to_string(), target).is_some() {
                        return Err(ParseError::new(line, ParseErrorKind::Duplicate(label.to_string())));
                    }
                }
                _ => builder.statement(line, text)?,
            }
            continue;
        }

        match parts.as_slice() {
            ["field", ty, name] => {
                let name = identifier(line, name)?;
                if current.fields.iter().any(|f| f.name == name) {
                    return Err(ParseError::new(line, ParseErrorKind::Duplicate(name.to_string())));
                }
                current.fields.push(FieldDecl {
                    name: name.to_string(),
                    ty: parse_type(line, ty)?,
                });
            }
            ["method", name] => {
                let name = identifier(line, name)?;
                if current.procedure(name).is_some() {
                    return Err(ParseError::new(line, ParseErrorKind::Duplicate(name.to_string())));
                }
                method = Some(MethodBuilder::new(name, &current.name, line));
            }
            _ => return Err(ParseError::syntax(line, format!("unexpected '{}' outside a method", text))),
        }
    }

    if let Some(builder) = method {
        return Err(ParseError::new(
            builder.start_line,
            ParseErrorKind::UnterminatedMethod(builder.name),
        ));
    }
    class.ok_or_else(|| ParseError::new(1, ParseErrorKind::MissingClass))
}

/// Splits `callee(args)` into `callee` and `args`.
fn split_call(line: usize, text: &str) -> Result<(&str, &str), ParseError> {
    text.strip_suffix(')')
        .and_then(|t| t.split_once('('))
        .map(|(callee, inner)| (callee.trim(), inner))
        .ok_or_else(|| ParseError::syntax(line, format!("expected a call, found '{}'", text)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn identifier(line: usize, s: &str) -> Result<&str, ParseError> {
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(ParseError::syntax(line, format!("invalid identifier '{}'", s)))
    }
}

/// Qualified name such as `demo.Printer`.
fn type_name(line: usize, s: &str) -> Result<&str, ParseError> {
    if s.split('.').all(is_identifier) {
        Ok(s)
    } else {
        Err(ParseError::syntax(line, format!("invalid type name '{}'", s)))
    }
}

fn parse_type(line: usize, s: &str) -> Result<Type, ParseError> {
    type_name(line, s.trim_end_matches("[]"))?;
    Ok(Type::parse(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINTER: &str = "
# A simple printer loop
class demo.Printer
field int jobs

method run
  param int n
  local int i
  local PrinterArray p
  p = new PrinterArray(5)
  i = 0
head:
  if i >= 5 goto done
  p.sendJob(i)   # in bounds
  i = i + 1
  goto head
done:
end
";

    #[test]
    fn test_parse_printer() {
        let class = parse_class(PRINTER).unwrap();
        assert_eq!(class.name, "demo.Printer");
        assert_eq!(class.fields, vec![FieldDecl { name: "jobs".to_string(), ty: Type::Int }]);

        let run = class.procedure("run").unwrap();
        assert_eq!(run.params, vec![Local::int("n")]);
        assert!(run.local("this").is_some());
        assert!(run.is_param("n"));
        // 6 statements plus the implicit return at `done`
        assert_eq!(run.cfg.len(), 7);
        assert_eq!(run.cfg.instruction(NodeId::new(0)).to_string(), "new PrinterArray(5)");
        assert_eq!(run.cfg.instruction(NodeId::new(3)).to_string(), "p.sendJob(i)");
        assert_eq!(run.cfg.loop_headers().len(), 1);
        assert_eq!(run.cfg.loop_headers()[0].header, NodeId::new(2));
        assert_eq!(run.cfg.loop_headers()[0].back_edge_source, NodeId::new(5));
    }

    #[test]
    fn test_statement_shapes() {
        let source = "
class A
method m
  local int x
  local int y
  local int[] a
  local A r
  x = -y
  x = y % 3
  x = r.count
  x = a[y]
  x = r.size(y, 2)
  x = helper()
  r.count = x
  a[0] = x
  helper(x)
  x = true
  nop
  return x
end
";
        let class = parse_class(source).unwrap();
        let cfg = &class.procedures[0].cfg;
        let rendered: Vec<String> = cfg.nodes().iter().map(|n| n.instruction.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "x = 0 - y",
                "x = y % 3",
                "x = r.count",
                "x = a[y]",
                "x = r.size(y, 2)",
                "x = helper()",
                "r.count = x",
                "a[0] = x",
                "helper(x)",
                "x = 1",
                "nop",
                "return",
            ]
        );
        assert_eq!(cfg.instruction(NodeId::new(1)).divisors().len(), 1);
        assert!(cfg.instruction(NodeId::new(4)).call().is_some());
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_class("method m\nend\n").unwrap_err();
        assert_eq!(err, ParseError::new(1, ParseErrorKind::MissingClass));

        let err = parse_class("class A\nmethod m\n  x = 1\nend\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ParseErrorKind::UndeclaredVariable("x".to_string()));

        let err = parse_class("class A\nmethod m\n  goto nowhere\nend\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UndefinedLabel("nowhere".to_string()));
        assert_eq!(err.to_string(), "line 3: undefined label 'nowhere'");

        let err = parse_class("class A\nmethod m\n  local int x\n  local long x\nend\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Duplicate("x".to_string()));

        let err = parse_class("class A\nmethod m\n  local int x\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedMethod("m".to_string()));

        let err = parse_class("class A\nmethod m\n  local int x\n  if x => 0 goto l\nl:\nend\n").unwrap_err();
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_empty_method_gets_return() {
        let class = parse_class("class A\nmethod m\nend\n").unwrap();
        assert_eq!(class.procedures[0].cfg.len(), 1);
    }
}
