//! Abstract Syntax Tree definitions for ConsoleBox programs

use serde::{Deserialize, Serialize};

/// Identity of a bindable node within one parsed program.
pub type NodeId = u32;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Span of source code; `end` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl Span {
    /// Span from the start of `self` to the end of `other`.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start.offset <= offset && offset <= self.end.offset
    }
}

/// Root AST node representing a complete compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub usings: Vec<UsingDirective>,
    pub items: Vec<Item>,
    pub span: Span,
    /// First node id not used by this tree.
    pub next_node_id: NodeId,
}

/// `using A.B;` or `using static A.B.Type;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsingDirective {
    pub is_static: bool,
    pub path: Vec<String>,
    pub span: Span,
}

impl UsingDirective {
    pub fn qualified_name(&self) -> String {
        self.path.join(".")
    }
}

/// Top-level declarations, all in the global namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDefinition),
    Class(ClassDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub name_span: Span,
    pub parameters: Vec<Parameter>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

/// A class holding only static functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub name_span: Span,
    pub methods: Vec<FunctionDefinition>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Let(LetStatement),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Return(ReturnStatement),
    Throw(ThrowStatement),
    Try(TryStatement),
    Break(Span),
    Continue(Span),
    Expression(ExpressionStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Let(s) => s.span,
            Statement::If(s) => s.span,
            Statement::While(s) => s.span,
            Statement::For(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
            Statement::Expression(s) => s.span,
        }
    }

    /// Control never flows past this statement.
    pub fn always_exits(&self) -> bool {
        matches!(
            self,
            Statement::Return(_) | Statement::Throw(_) | Statement::Break(_) | Statement::Continue(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStatement {
    pub id: NodeId,
    pub name: String,
    pub name_span: Span,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Block,
    pub else_ifs: Vec<ElseIf>,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub condition: Expression,
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Block,
    pub span: Span,
}

/// `for (item in items) { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub id: NodeId,
    pub variable: String,
    pub variable_span: Span,
    pub iterable: Expression,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    pub try_block: Block,
    pub catch_variable: Option<CatchVariable>,
    pub catch_block: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchVariable {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Span,
}

/// Expression types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(LiteralExpression),
    Identifier(Identifier),
    MemberAccess(MemberAccess),
    Call(Call),
    Index(IndexAccess),
    Unary(UnaryOperation),
    Binary(BinaryOperation),
    Assignment(Assignment),
    List(ListExpression),
    New(NewExpression),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(e) => e.span,
            Expression::Identifier(e) => e.span,
            Expression::MemberAccess(e) => e.span,
            Expression::Call(e) => e.span,
            Expression::Index(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Assignment(e) => e.span,
            Expression::List(e) => e.span,
            Expression::New(e) => e.span,
        }
    }

    /// Dotted name for `A.B.C` chains made only of identifiers.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expression::Identifier(identifier) => Some(identifier.name.clone()),
            Expression::MemberAccess(access) => access
                .object
                .dotted_name()
                .map(|prefix| format!("{}.{}", prefix, access.member)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralExpression {
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
    /// Resolved against the reference set only, ignoring user declarations.
    #[serde(default)]
    pub rooted: bool,
}

/// `object.member`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub id: NodeId,
    pub object: Box<Expression>,
    pub member: String,
    pub member_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAccess {
    pub object: Box<Expression>,
    pub index: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperation {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOperation {
    pub left: Box<Expression>,
    pub operator: BinaryOperator,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Box<Expression>,
    pub value: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListExpression {
    pub elements: Vec<Expression>,
    pub span: Span,
}

/// `new Type(args)`; only exception types are constructible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpression {
    pub type_name: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

/// Mutable visitor for transforming the AST.
///
/// Every method defaults to walking the children, so implementors only
/// override the node kinds they rewrite.
pub trait AstVisitorMut {
    fn visit_program_mut(&mut self, program: &mut Program) {
        for item in &mut program.items {
            self.visit_item_mut(item);
        }
    }

    fn visit_item_mut(&mut self, item: &mut Item) {
        match item {
            Item::Function(function) => self.visit_block_mut(&mut function.body),
            Item::Class(class) => {
                for method in &mut class.methods {
                    self.visit_block_mut(&mut method.body);
                }
            }
        }
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        for statement in &mut block.statements {
            self.visit_statement_mut(statement);
        }
    }

    fn visit_statement_mut(&mut self, statement: &mut Statement) {
        walk_statement_mut(self, statement);
    }

    fn visit_expression_mut(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);
    }
}

pub fn walk_statement_mut<V: AstVisitorMut + ?Sized>(visitor: &mut V, statement: &mut Statement) {
    match statement {
        Statement::Let(s) => visitor.visit_expression_mut(&mut s.value),
        Statement::If(s) => {
            visitor.visit_expression_mut(&mut s.condition);
            visitor.visit_block_mut(&mut s.then_block);
            for else_if in &mut s.else_ifs {
                visitor.visit_expression_mut(&mut else_if.condition);
                visitor.visit_block_mut(&mut else_if.block);
            }
            if let Some(block) = &mut s.else_block {
                visitor.visit_block_mut(block);
            }
        }
        Statement::While(s) => {
            visitor.visit_expression_mut(&mut s.condition);
            visitor.visit_block_mut(&mut s.body);
        }
        Statement::For(s) => {
            visitor.visit_expression_mut(&mut s.iterable);
            visitor.visit_block_mut(&mut s.body);
        }
        Statement::Return(s) => {
            if let Some(value) = &mut s.value {
                visitor.visit_expression_mut(value);
            }
        }
        Statement::Throw(s) => visitor.visit_expression_mut(&mut s.value),
        Statement::Try(s) => {
            visitor.visit_block_mut(&mut s.try_block);
            visitor.visit_block_mut(&mut s.catch_block);
        }
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::Expression(s) => visitor.visit_expression_mut(&mut s.expression),
    }
}

pub fn walk_expression_mut<V: AstVisitorMut + ?Sized>(visitor: &mut V, expression: &mut Expression) {
    match expression {
        Expression::Literal(_) | Expression::Identifier(_) => {}
        Expression::MemberAccess(e) => visitor.visit_expression_mut(&mut e.object),
        Expression::Call(e) => {
            visitor.visit_expression_mut(&mut e.callee);
            for argument in &mut e.arguments {
                visitor.visit_expression_mut(argument);
            }
        }
        Expression::Index(e) => {
            visitor.visit_expression_mut(&mut e.object);
            visitor.visit_expression_mut(&mut e.index);
        }
        Expression::Unary(e) => visitor.visit_expression_mut(&mut e.operand),
        Expression::Binary(e) => {
            visitor.visit_expression_mut(&mut e.left);
            visitor.visit_expression_mut(&mut e.right);
        }
        Expression::Assignment(e) => {
            visitor.visit_expression_mut(&mut e.target);
            visitor.visit_expression_mut(&mut e.value);
        }
        Expression::List(e) => {
            for element in &mut e.elements {
                visitor.visit_expression_mut(element);
            }
        }
        Expression::New(e) => {
            visitor.visit_expression_mut(&mut e.type_name);
            for argument in &mut e.arguments {
                visitor.visit_expression_mut(argument);
            }
        }
    }
}
