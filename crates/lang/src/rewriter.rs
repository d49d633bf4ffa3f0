//! Console call retargeting
//!
//! Every reference that binds to a console member of the real `System.Console`
//! is replaced with a member access on the capture surface. Matching is by
//! bound symbol, never by spelling, so user declarations with the same names
//! are left alone.

use crate::ast::*;
use crate::binder::SemanticModel;
use crate::library::{CAPTURED_CONSOLE_MEMBERS, CAPTURE_NAMESPACE, CONSOLE_TYPE, SYSTEM_NAMESPACE};

pub struct ConsoleRewriter<'a> {
    model: &'a SemanticModel,
    next_id: NodeId,
    rewritten: usize,
}

impl<'a> ConsoleRewriter<'a> {
    pub fn new(model: &'a SemanticModel) -> Self {
        Self {
            model,
            next_id: 0,
            rewritten: 0,
        }
    }

    /// Rewrite `program`, returning the new tree and the number of replaced nodes.
    pub fn rewrite(mut self, mut program: Program) -> (Program, usize) {
        self.next_id = program.next_node_id;
        self.visit_program_mut(&mut program);
        program.next_node_id = self.next_id;
        (program, self.rewritten)
    }

    fn is_console_member(&self, id: NodeId, name: &str) -> bool {
        if !CAPTURED_CONSOLE_MEMBERS.contains(&name) {
            return false;
        }
        matches!(
            self.model.symbol_info(id).and_then(|symbol| symbol.containing_type()),
            Some((SYSTEM_NAMESPACE, CONSOLE_TYPE))
        )
    }

    /// Rooted `Sandbox.Capture.Console.<member>`, carrying the original location.
    fn capture_access(&mut self, member: &str, member_span: Span, span: Span) -> Expression {
        let mut segments = CAPTURE_NAMESPACE.split('.').chain(std::iter::once(CONSOLE_TYPE));
        let first = segments.next().unwrap_or(CONSOLE_TYPE);

        let mut expression = Expression::Identifier(Identifier {
            id: self.fresh_id(),
            name: first.to_string(),
            span,
            rooted: true,
        });
        for segment in segments {
            expression = Expression::MemberAccess(MemberAccess {
                id: self.fresh_id(),
                object: Box::new(expression),
                member: segment.to_string(),
                member_span: span,
                span,
            });
        }

        Expression::MemberAccess(MemberAccess {
            id: self.fresh_id(),
            object: Box::new(expression),
            member: member.to_string(),
            member_span,
            span,
        })
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl AstVisitorMut for ConsoleRewriter<'_> {
    fn visit_expression_mut(&mut self, expression: &mut Expression) {
        let replacement = match expression {
            Expression::MemberAccess(access) if self.is_console_member(access.id, &access.member) => {
                let (member, member_span, span) =
                    (access.member.clone(), access.member_span, access.span);
                Some(self.capture_access(&member, member_span, span))
            }
            Expression::Identifier(identifier)
                if self.is_console_member(identifier.id, &identifier.name) =>
            {
                let (name, span) = (identifier.name.clone(), identifier.span);
                Some(self.capture_access(&name, span, span))
            }
            _ => None,
        };

        match replacement {
            Some(replacement) => {
                *expression = replacement;
                self.rewritten += 1;
            }
            None => walk_expression_mut(self, expression),
        }
    }
}
