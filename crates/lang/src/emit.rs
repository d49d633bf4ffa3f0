//! Lowering of bound trees into artifacts, and the artifact file format
//!
//! An artifact on disk is a JSON envelope holding the serialized program body
//! and a SHA-256 digest of that body.

use crate::ast::*;
use crate::binder::{FunctionInfo, MethodSymbol, MethodTarget, SemanticModel, Symbol};
use crate::error::EmitError;
use crate::ir::{self, Artifact, CallTarget, Constant, Expr, HostMemberRef, Stmt};
use crate::library::qualify;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

type EmitResult<T> = std::result::Result<T, EmitError>;

/// Lowers a fully bound program.
pub struct Emitter<'a> {
    model: &'a SemanticModel,
}

impl<'a> Emitter<'a> {
    pub fn new(model: &'a SemanticModel) -> Self {
        Self { model }
    }

    pub fn emit(&self, program: &Program, assembly_name: &str) -> EmitResult<Artifact> {
        let entry_point = self.model.entry_point().ok_or(EmitError::MissingEntryPoint)?;
        let infos = self.model.functions();

        let mut functions = Vec::with_capacity(infos.len());
        for item in &program.items {
            match item {
                Item::Function(function) => {
                    let info = self.function_info(functions.len())?;
                    functions.push(self.lower_function(function, info)?);
                }
                Item::Class(class) => {
                    for method in &class.methods {
                        let info = self.function_info(functions.len())?;
                        functions.push(self.lower_function(method, info)?);
                    }
                }
            }
        }

        Ok(Artifact {
            assembly_name: assembly_name.to_string(),
            entry_point,
            functions,
        })
    }

    fn function_info(&self, index: usize) -> EmitResult<&FunctionInfo> {
        self.model
            .functions()
            .get(index)
            .ok_or(EmitError::Unbound { line: 0 })
    }

    fn lower_function(
        &self,
        function: &FunctionDefinition,
        info: &FunctionInfo,
    ) -> EmitResult<ir::Function> {
        Ok(ir::Function {
            name: info.name.clone(),
            parameter_count: info.parameter_count,
            local_count: info.local_count,
            line: function.span.start.line,
            body: self.lower_block(&function.body)?,
        })
    }

    fn lower_block(&self, block: &Block) -> EmitResult<Vec<Stmt>> {
        block
            .statements
            .iter()
            .map(|statement| self.lower_statement(statement))
            .collect()
    }

    fn lower_statement(&self, statement: &Statement) -> EmitResult<Stmt> {
        let line = statement.span().start.line;
        Ok(match statement {
            Statement::Let(s) => Stmt::Let {
                slot: self.slot_of(s.id, line)?,
                value: self.lower_expression(&s.value)?,
                line,
            },
            Statement::If(s) => {
                let mut else_body = match &s.else_block {
                    Some(block) => self.lower_block(block)?,
                    None => Vec::new(),
                };
                for else_if in s.else_ifs.iter().rev() {
                    else_body = vec![Stmt::If {
                        condition: self.lower_expression(&else_if.condition)?,
                        then_body: self.lower_block(&else_if.block)?,
                        else_body,
                        line: else_if.span.start.line,
                    }];
                }
                Stmt::If {
                    condition: self.lower_expression(&s.condition)?,
                    then_body: self.lower_block(&s.then_block)?,
                    else_body,
                    line,
                }
            }
            Statement::While(s) => Stmt::While {
                condition: self.lower_expression(&s.condition)?,
                body: self.lower_block(&s.body)?,
                line,
            },
            Statement::For(s) => Stmt::For {
                slot: self.slot_of(s.id, line)?,
                iterable: self.lower_expression(&s.iterable)?,
                body: self.lower_block(&s.body)?,
                line,
            },
            Statement::Return(s) => Stmt::Return {
                value: s
                    .value
                    .as_ref()
                    .map(|value| self.lower_expression(value))
                    .transpose()?,
                line,
            },
            Statement::Throw(s) => Stmt::Throw {
                value: self.lower_expression(&s.value)?,
                line,
            },
            Statement::Try(s) => Stmt::Try {
                body: self.lower_block(&s.try_block)?,
                catch_slot: s
                    .catch_variable
                    .as_ref()
                    .map(|variable| self.slot_of(variable.id, line))
                    .transpose()?,
                handler: self.lower_block(&s.catch_block)?,
                line,
            },
            Statement::Break(_) => Stmt::Break { line },
            Statement::Continue(_) => Stmt::Continue { line },
            Statement::Expression(s) => Stmt::Expr {
                expr: self.lower_expression(&s.expression)?,
                line,
            },
        })
    }

    fn lower_expression(&self, expression: &Expression) -> EmitResult<Expr> {
        let line = expression.span().start.line;
        Ok(match expression {
            Expression::Literal(literal) => Expr::Constant {
                value: match &literal.value {
                    Literal::String(value) => Constant::String(value.clone()),
                    Literal::Float(value) => Constant::Float(*value),
                    Literal::Integer(value) => Constant::Integer(*value),
                    Literal::Boolean(value) => Constant::Boolean(*value),
                    Literal::Null => Constant::Null,
                },
            },
            Expression::Identifier(identifier) => match self.model.symbol_info(identifier.id) {
                Some(Symbol::Local(local)) => Expr::Local { slot: local.slot },
                Some(Symbol::Method(method)) => Expr::FunctionRef {
                    target: call_target(method),
                },
                Some(Symbol::Property(property)) => Expr::HostProperty {
                    member: HostMemberRef::new(
                        qualify(&property.namespace, &property.containing_type),
                        property.name.clone(),
                    ),
                },
                _ => return Err(EmitError::Unbound { line }),
            },
            Expression::MemberAccess(access) => match self.model.symbol_info(access.id) {
                Some(Symbol::Method(method)) => Expr::FunctionRef {
                    target: call_target(method),
                },
                Some(Symbol::Property(property)) => Expr::HostProperty {
                    member: HostMemberRef::new(
                        qualify(&property.namespace, &property.containing_type),
                        property.name.clone(),
                    ),
                },
                None => Expr::Member {
                    object: Box::new(self.lower_expression(&access.object)?),
                    name: access.member.clone(),
                },
                Some(_) => return Err(EmitError::Unbound { line }),
            },
            Expression::Call(call) => self.lower_call(call)?,
            Expression::Index(index) => Expr::Index {
                object: Box::new(self.lower_expression(&index.object)?),
                index: Box::new(self.lower_expression(&index.index)?),
            },
            Expression::Unary(unary) => Expr::Unary {
                operator: match unary.operator {
                    UnaryOperator::Not => ir::UnaryOp::Not,
                    UnaryOperator::Negate => ir::UnaryOp::Negate,
                },
                operand: Box::new(self.lower_expression(&unary.operand)?),
            },
            Expression::Binary(binary) => Expr::Binary {
                operator: lower_binary_operator(binary.operator),
                left: Box::new(self.lower_expression(&binary.left)?),
                right: Box::new(self.lower_expression(&binary.right)?),
            },
            Expression::Assignment(assignment) => {
                let Expression::Identifier(target) = assignment.target.as_ref() else {
                    return Err(EmitError::Unbound { line });
                };
                Expr::Assign {
                    slot: self.slot_of(target.id, line)?,
                    value: Box::new(self.lower_expression(&assignment.value)?),
                }
            }
            Expression::List(list) => Expr::List {
                elements: self.lower_all(&list.elements)?,
            },
            Expression::New(new) => {
                let type_id = match new.type_name.as_ref() {
                    Expression::Identifier(identifier) => identifier.id,
                    Expression::MemberAccess(access) => access.id,
                    _ => return Err(EmitError::Unbound { line }),
                };
                let Some(Symbol::Type(ty)) = self.model.symbol_info(type_id) else {
                    return Err(EmitError::Unbound { line });
                };
                Expr::New {
                    type_name: ty.full_name(),
                    arguments: self.lower_all(&new.arguments)?,
                }
            }
        })
    }

    fn lower_call(&self, call: &Call) -> EmitResult<Expr> {
        let arguments = self.lower_all(&call.arguments)?;

        let bound_id = match call.callee.as_ref() {
            Expression::Identifier(identifier) => Some(identifier.id),
            Expression::MemberAccess(access) => Some(access.id),
            _ => None,
        };
        if let Some(Symbol::Method(method)) = bound_id.and_then(|id| self.model.symbol_info(id)) {
            return Ok(Expr::Call {
                target: call_target(method),
                arguments,
            });
        }

        if let Expression::MemberAccess(access) = call.callee.as_ref() {
            if self.model.symbol_info(access.id).is_none() {
                return Ok(Expr::InvokeMember {
                    object: Box::new(self.lower_expression(&access.object)?),
                    name: access.member.clone(),
                    arguments,
                });
            }
        }

        Ok(Expr::CallValue {
            callee: Box::new(self.lower_expression(&call.callee)?),
            arguments,
        })
    }

    fn lower_all(&self, expressions: &[Expression]) -> EmitResult<Vec<Expr>> {
        expressions
            .iter()
            .map(|expression| self.lower_expression(expression))
            .collect()
    }

    fn slot_of(&self, id: NodeId, line: usize) -> EmitResult<usize> {
        match self.model.symbol_info(id) {
            Some(Symbol::Local(local)) => Ok(local.slot),
            _ => Err(EmitError::Unbound { line }),
        }
    }
}

fn call_target(method: &MethodSymbol) -> CallTarget {
    match method.target {
        MethodTarget::User(index) => CallTarget::User { index },
        MethodTarget::Host => CallTarget::Host {
            member: HostMemberRef::new(
                qualify(&method.namespace, method.containing_type.as_deref().unwrap_or_default()),
                method.name.clone(),
            ),
        },
    }
}

fn lower_binary_operator(operator: BinaryOperator) -> ir::BinaryOp {
    match operator {
        BinaryOperator::Add => ir::BinaryOp::Add,
        BinaryOperator::Subtract => ir::BinaryOp::Subtract,
        BinaryOperator::Multiply => ir::BinaryOp::Multiply,
        BinaryOperator::Divide => ir::BinaryOp::Divide,
        BinaryOperator::Modulo => ir::BinaryOp::Modulo,
        BinaryOperator::Equal => ir::BinaryOp::Equal,
        BinaryOperator::NotEqual => ir::BinaryOp::NotEqual,
        BinaryOperator::LessThan => ir::BinaryOp::LessThan,
        BinaryOperator::LessThanOrEqual => ir::BinaryOp::LessThanOrEqual,
        BinaryOperator::GreaterThan => ir::BinaryOp::GreaterThan,
        BinaryOperator::GreaterThanOrEqual => ir::BinaryOp::GreaterThanOrEqual,
        BinaryOperator::And => ir::BinaryOp::And,
        BinaryOperator::Or => ir::BinaryOp::Or,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    assembly_name: String,
    digest: String,
    body: String,
}

/// Serialize an artifact into its envelope bytes.
pub fn encode_artifact(artifact: &Artifact) -> EmitResult<Vec<u8>> {
    let body = serde_json::to_string(artifact)?;
    let envelope = ArtifactEnvelope {
        format_version: ir::ARTIFACT_FORMAT_VERSION,
        assembly_name: artifact.assembly_name.clone(),
        digest: sha256_hex(&body),
        body,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Parse envelope bytes, verifying the format version and body digest.
pub fn decode_artifact(bytes: &[u8]) -> EmitResult<Artifact> {
    let envelope: ArtifactEnvelope = serde_json::from_slice(bytes)?;
    if envelope.format_version != ir::ARTIFACT_FORMAT_VERSION {
        return Err(EmitError::UnsupportedVersion(envelope.format_version));
    }
    let actual = sha256_hex(&envelope.body);
    if actual != envelope.digest {
        return Err(EmitError::Integrity {
            expected: envelope.digest,
            actual,
        });
    }
    Ok(serde_json::from_str(&envelope.body)?)
}

/// Write an artifact to `path`, returning the number of bytes written.
pub fn write_artifact(path: &Path, artifact: &Artifact) -> EmitResult<usize> {
    let bytes = encode_artifact(artifact)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

pub fn read_artifact(path: &Path) -> EmitResult<Artifact> {
    let bytes = std::fs::read(path)?;
    decode_artifact(&bytes)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Artifact {
        Artifact {
            assembly_name: "ConsoleApp_test".to_string(),
            entry_point: 0,
            functions: vec![ir::Function {
                name: "main".to_string(),
                parameter_count: 0,
                local_count: 0,
                line: 1,
                body: vec![Stmt::Expr {
                    expr: Expr::Call {
                        target: CallTarget::Host {
                            member: HostMemberRef::new("Sandbox.Capture.Console", "Write"),
                        },
                        arguments: vec![Expr::Constant {
                            value: Constant::String("Hi".to_string()),
                        }],
                    },
                    line: 1,
                }],
            }],
        }
    }

    #[test]
    fn test_envelope_round_trip() {
        let artifact = sample();
        let bytes = encode_artifact(&artifact).unwrap();
        assert_eq!(decode_artifact(&bytes).unwrap(), artifact);
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let bytes = encode_artifact(&sample()).unwrap();
        let tampered = String::from_utf8(bytes).unwrap().replace("Hi", "Ho");
        let error = decode_artifact(tampered.as_bytes()).unwrap_err();
        assert!(matches!(error, EmitError::Integrity { .. }));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ConsoleApp_x.cbx");
        let written = write_artifact(&path, &sample()).unwrap();
        assert!(written > 0);
        assert_eq!(read_artifact(&path).unwrap(), sample());
    }

    #[test]
    fn test_host_references_are_collected() {
        let references = sample().host_references();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].qualified_name(), "Sandbox.Capture.Console.Write");
    }
}
