//! Executable intermediate form
//!
//! Plain data produced by emission and consumed by the sandbox interpreter.
//! Locals are slot-addressed and every statement keeps its source line for
//! stack traces.

use serde::{Deserialize, Serialize};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub assembly_name: String,
    pub entry_point: usize,
    pub functions: Vec<Function>,
}

impl Artifact {
    /// Every host member the program references, for link-time checks.
    pub fn host_references(&self) -> Vec<HostMemberRef> {
        let mut references = Vec::new();
        for function in &self.functions {
            for statement in &function.body {
                statement.collect_host_references(&mut references);
            }
        }
        references.sort_by(|a, b| a.qualified_name().cmp(&b.qualified_name()));
        references.dedup();
        references
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub parameter_count: usize,
    pub local_count: usize,
    pub line: usize,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Let {
        slot: usize,
        value: Expr,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        line: usize,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    For {
        slot: usize,
        iterable: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
    Throw {
        value: Expr,
        line: usize,
    },
    Try {
        body: Vec<Stmt>,
        catch_slot: Option<usize>,
        handler: Vec<Stmt>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Let { line, .. }
            | Stmt::Expr { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Throw { line, .. }
            | Stmt::Try { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line } => *line,
        }
    }

    fn collect_host_references(&self, out: &mut Vec<HostMemberRef>) {
        fn visit_body(body: &[Stmt], out: &mut Vec<HostMemberRef>) {
            for statement in body {
                statement.collect_host_references(out);
            }
        }
        match self {
            Stmt::Let { value, .. } | Stmt::Throw { value, .. } => value.collect_host_references(out),
            Stmt::Expr { expr, .. } => expr.collect_host_references(out),
            Stmt::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                condition.collect_host_references(out);
                visit_body(then_body, out);
                visit_body(else_body, out);
            }
            Stmt::While { condition, body, .. } => {
                condition.collect_host_references(out);
                visit_body(body, out);
            }
            Stmt::For { iterable, body, .. } => {
                iterable.collect_host_references(out);
                visit_body(body, out);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    value.collect_host_references(out);
                }
            }
            Stmt::Try { body, handler, .. } => {
                visit_body(body, out);
                visit_body(handler, out);
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Constant {
        value: Constant,
    },
    Local {
        slot: usize,
    },
    Assign {
        slot: usize,
        value: Box<Expr>,
    },
    /// Statically bound call
    Call {
        target: CallTarget,
        arguments: Vec<Expr>,
    },
    /// Call through a value (method group stored in a local, writer objects)
    CallValue {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    /// Method group used as a value
    FunctionRef {
        target: CallTarget,
    },
    HostProperty {
        member: HostMemberRef,
    },
    /// Instance member resolved at run time
    Member {
        object: Box<Expr>,
        name: String,
    },
    InvokeMember {
        object: Box<Expr>,
        name: String,
        arguments: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    List {
        elements: Vec<Expr>,
    },
    New {
        type_name: String,
        arguments: Vec<Expr>,
    },
}

impl Expr {
    fn collect_host_references(&self, out: &mut Vec<HostMemberRef>) {
        match self {
            Expr::Constant { .. } | Expr::Local { .. } => {}
            Expr::Assign { value, .. } => value.collect_host_references(out),
            Expr::Call { target, arguments } => {
                if let CallTarget::Host { member } = target {
                    out.push(member.clone());
                }
                for argument in arguments {
                    argument.collect_host_references(out);
                }
            }
            Expr::CallValue { callee, arguments } => {
                callee.collect_host_references(out);
                for argument in arguments {
                    argument.collect_host_references(out);
                }
            }
            Expr::FunctionRef { target } => {
                if let CallTarget::Host { member } = target {
                    out.push(member.clone());
                }
            }
            Expr::HostProperty { member } => out.push(member.clone()),
            Expr::Member { object, .. } => object.collect_host_references(out),
            Expr::InvokeMember {
                object, arguments, ..
            } => {
                object.collect_host_references(out);
                for argument in arguments {
                    argument.collect_host_references(out);
                }
            }
            Expr::Index { object, index } => {
                object.collect_host_references(out);
                index.collect_host_references(out);
            }
            Expr::Unary { operand, .. } => operand.collect_host_references(out),
            Expr::Binary { left, right, .. } => {
                left.collect_host_references(out);
                right.collect_host_references(out);
            }
            Expr::List { elements } => {
                for element in elements {
                    element.collect_host_references(out);
                }
            }
            Expr::New { arguments, .. } => {
                for argument in arguments {
                    argument.collect_host_references(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Constant {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallTarget {
    User { index: usize },
    Host { member: HostMemberRef },
}

/// A host member named by its declaring type's full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostMemberRef {
    pub type_name: String,
    pub member: String,
}

impl HostMemberRef {
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.type_name, self.member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}
