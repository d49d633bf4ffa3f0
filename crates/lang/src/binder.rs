//! Name binding and semantic checks
//!
//! The binder resolves every identifier and member access against the user's
//! declarations and a [`ReferenceSet`], producing a [`SemanticModel`] keyed by
//! node id plus the diagnostics found along the way.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::library::{qualify, MemberInfo, MemberKind, ReferenceSet, TypeInfo, TypeKind};
use std::collections::HashMap;
use tracing::debug;

/// Where a declaration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOrigin {
    Host,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSymbol {
    pub namespace: String,
    pub name: String,
    pub origin: SymbolOrigin,
    pub kind: TypeKind,
}

impl TypeSymbol {
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTarget {
    Host,
    /// Index into [`SemanticModel::functions`]
    User(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSymbol {
    pub namespace: String,
    /// `None` for top-level functions
    pub containing_type: Option<String>,
    pub name: String,
    pub target: MethodTarget,
    pub min_arity: usize,
    pub max_arity: Option<usize>,
}

impl MethodSymbol {
    pub fn qualified_name(&self) -> String {
        match &self.containing_type {
            Some(ty) => qualify(&qualify(&self.namespace, ty), &self.name),
            None => qualify(&self.namespace, &self.name),
        }
    }

    fn accepts(&self, arguments: usize) -> bool {
        arguments >= self.min_arity && self.max_arity.map_or(true, |max| arguments <= max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySymbol {
    pub namespace: String,
    pub containing_type: String,
    pub name: String,
}

impl PropertySymbol {
    pub fn qualified_name(&self) -> String {
        qualify(&qualify(&self.namespace, &self.containing_type), &self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Local,
    Parameter,
    Iteration,
    Catch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSymbol {
    pub name: String,
    pub slot: usize,
    pub kind: LocalKind,
}

/// What a node refers to
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Namespace(String),
    Type(TypeSymbol),
    Method(MethodSymbol),
    Property(PropertySymbol),
    Local(LocalSymbol),
}

impl Symbol {
    /// `(namespace, type)` containing this member, if it is a type member.
    pub fn containing_type(&self) -> Option<(&str, &str)> {
        match self {
            Symbol::Method(method) => method
                .containing_type
                .as_deref()
                .map(|ty| (method.namespace.as_str(), ty)),
            Symbol::Property(property) => Some((
                property.namespace.as_str(),
                property.containing_type.as_str(),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// `main` or `Class.method`
    pub name: String,
    pub parameter_count: usize,
    pub local_count: usize,
}

/// Binding results for one program
#[derive(Debug, Clone, Default)]
pub struct SemanticModel {
    symbols: HashMap<NodeId, Symbol>,
    functions: Vec<FunctionInfo>,
    entry_point: Option<usize>,
}

impl SemanticModel {
    pub fn symbol_info(&self, id: NodeId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Functions in declaration order; class methods follow their class position.
    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    pub fn entry_point(&self) -> Option<usize> {
        self.entry_point
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

#[derive(Debug)]
pub struct Binding {
    pub model: SemanticModel,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bind `program` against `references`.
pub fn bind(program: &Program, references: &ReferenceSet) -> Binding {
    let mut binder = Binder::new(references);
    binder.bind_program(program);
    debug!(
        symbols = binder.model.symbols.len(),
        diagnostics = binder.diagnostics.len(),
        "bound program"
    );
    Binding {
        model: binder.model,
        diagnostics: binder.diagnostics,
    }
}

/// Result of binding an expression
#[derive(Debug, Clone)]
enum Bound {
    Value,
    Error,
    Namespace(String),
    Type(TypeSymbol),
    Method(MethodSymbol),
    Property(PropertySymbol),
}

enum StaticImport {
    Host(String),
    User(String),
}

struct LocalEntry {
    name: String,
    slot: usize,
    kind: LocalKind,
    span: Span,
    used: bool,
}

#[derive(Default)]
struct Scope {
    locals: Vec<LocalEntry>,
}

struct Binder<'a> {
    references: &'a ReferenceSet,
    model: SemanticModel,
    diagnostics: Vec<Diagnostic>,
    functions: HashMap<String, usize>,
    classes: HashMap<String, HashMap<String, usize>>,
    imported_namespaces: Vec<String>,
    static_imports: Vec<StaticImport>,
    scopes: Vec<Scope>,
    next_slot: usize,
    loop_depth: usize,
    current_class: Option<String>,
}

impl<'a> Binder<'a> {
    fn new(references: &'a ReferenceSet) -> Self {
        Self {
            references,
            model: SemanticModel::default(),
            diagnostics: Vec::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            imported_namespaces: Vec::new(),
            static_imports: Vec::new(),
            scopes: Vec::new(),
            next_slot: 0,
            loop_depth: 0,
            current_class: None,
        }
    }

    fn bind_program(&mut self, program: &Program) {
        self.collect_declarations(program);
        for using in &program.usings {
            self.bind_using(using);
        }

        let mut index = 0;
        for item in &program.items {
            match item {
                Item::Function(function) => {
                    self.current_class = None;
                    self.bind_function(function, index);
                    index += 1;
                }
                Item::Class(class) => {
                    self.current_class = Some(class.name.clone());
                    for method in &class.methods {
                        self.bind_function(method, index);
                        index += 1;
                    }
                    self.current_class = None;
                }
            }
        }

        match self.functions.get("main").copied() {
            Some(main) if self.model.functions[main].parameter_count == 0 => {
                self.model.entry_point = Some(main);
            }
            _ => {
                let start = program.span.start;
                self.error(
                    "CB5001",
                    "Program does not contain a static 'main' method suitable for an entry point",
                    Span { start, end: start },
                );
            }
        }
    }

    fn collect_declarations(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::Function(function) => {
                    let index = self.push_function(function.name.clone(), function);
                    if self.functions.contains_key(&function.name) {
                        self.error(
                            "CB0111",
                            format!(
                                "Type '<global>' already defines a member called '{}'",
                                function.name
                            ),
                            function.name_span,
                        );
                    } else {
                        self.functions.insert(function.name.clone(), index);
                    }
                }
                Item::Class(class) => {
                    if self.classes.contains_key(&class.name)
                        || self.functions.contains_key(&class.name)
                    {
                        self.error(
                            "CB0101",
                            format!(
                                "The global namespace already contains a definition for '{}'",
                                class.name
                            ),
                            class.name_span,
                        );
                    }
                    let mut methods = HashMap::new();
                    for method in &class.methods {
                        let index =
                            self.push_function(format!("{}.{}", class.name, method.name), method);
                        if methods.contains_key(&method.name) {
                            self.error(
                                "CB0111",
                                format!(
                                    "Type '{}' already defines a member called '{}'",
                                    class.name, method.name
                                ),
                                method.name_span,
                            );
                        } else {
                            methods.insert(method.name.clone(), index);
                        }
                    }
                    self.classes.entry(class.name.clone()).or_insert(methods);
                }
            }
        }
    }

    fn push_function(&mut self, name: String, function: &FunctionDefinition) -> usize {
        self.model.functions.push(FunctionInfo {
            name,
            parameter_count: function.parameters.len(),
            local_count: function.parameters.len(),
        });
        self.model.functions.len() - 1
    }

    fn bind_using(&mut self, using: &UsingDirective) {
        let name = using.qualified_name();

        if using.is_static {
            let import = if self.references.lookup_full_name(&name).is_some() {
                Some(StaticImport::Host(name.clone()))
            } else if using.path.len() == 1 && self.classes.contains_key(&name) {
                Some(StaticImport::User(name.clone()))
            } else {
                None
            };
            match import {
                Some(import) => {
                    let duplicate = self.static_imports.iter().any(|existing| match (existing, &import) {
                        (StaticImport::Host(a), StaticImport::Host(b))
                        | (StaticImport::User(a), StaticImport::User(b)) => a == b,
                        _ => false,
                    });
                    if duplicate {
                        self.duplicate_using(&name, using.span);
                    } else {
                        self.static_imports.push(import);
                    }
                }
                None => self.error(
                    "CB0246",
                    format!("The type or namespace name '{}' could not be found", name),
                    using.span,
                ),
            }
            return;
        }

        if self.references.is_namespace(&name) {
            if self.imported_namespaces.contains(&name) {
                self.duplicate_using(&name, using.span);
            } else {
                self.imported_namespaces.push(name);
            }
        } else if self.references.lookup_full_name(&name).is_some() {
            self.error(
                "CB0138",
                format!(
                    "A 'using namespace' directive can only be applied to namespaces; '{}' is a type not a namespace. Consider a 'using static' directive instead",
                    name
                ),
                using.span,
            );
        } else {
            self.error(
                "CB0246",
                format!("The type or namespace name '{}' could not be found", name),
                using.span,
            );
        }
    }

    fn duplicate_using(&mut self, name: &str, span: Span) {
        self.diagnostics.push(Diagnostic::warning(
            "CB0105",
            format!("The using directive for '{}' appeared previously", name),
            span,
        ));
    }

    fn bind_function(&mut self, function: &FunctionDefinition, index: usize) {
        self.scopes.clear();
        self.next_slot = 0;
        self.loop_depth = 0;

        self.scopes.push(Scope::default());
        for parameter in &function.parameters {
            if self.declared_in_innermost(&parameter.name) {
                self.error(
                    "CB0100",
                    format!(
                        "The parameter name '{}' is a duplicate",
                        parameter.name
                    ),
                    parameter.span,
                );
            }
            self.declare(parameter.id, &parameter.name, LocalKind::Parameter, parameter.span);
        }
        self.bind_block(&function.body);
        self.pop_scope();

        self.model.functions[index].local_count = self.next_slot;
    }

    fn bind_block(&mut self, block: &Block) {
        self.scopes.push(Scope::default());
        self.bind_statements(&block.statements);
        self.pop_scope();
    }

    fn bind_statements(&mut self, statements: &[Statement]) {
        let mut exited = false;
        let mut warned = false;
        for statement in statements {
            if exited && !warned {
                self.diagnostics.push(Diagnostic::warning(
                    "CB0162",
                    "Unreachable code detected",
                    statement.span(),
                ));
                warned = true;
            }
            self.bind_statement(statement);
            if statement.always_exits() {
                exited = true;
            }
        }
    }

    fn bind_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Let(s) => {
                self.bind_value(&s.value);
                if self.declared_in_innermost(&s.name) {
                    self.error(
                        "CB0128",
                        format!(
                            "A local variable named '{}' is already defined in this scope",
                            s.name
                        ),
                        s.name_span,
                    );
                }
                self.declare(s.id, &s.name, LocalKind::Local, s.name_span);
            }
            Statement::If(s) => {
                self.bind_value(&s.condition);
                self.bind_block(&s.then_block);
                for else_if in &s.else_ifs {
                    self.bind_value(&else_if.condition);
                    self.bind_block(&else_if.block);
                }
                if let Some(block) = &s.else_block {
                    self.bind_block(block);
                }
            }
            Statement::While(s) => {
                self.bind_value(&s.condition);
                self.loop_depth += 1;
                self.bind_block(&s.body);
                self.loop_depth -= 1;
            }
            Statement::For(s) => {
                self.bind_value(&s.iterable);
                self.scopes.push(Scope::default());
                self.declare(s.id, &s.variable, LocalKind::Iteration, s.variable_span);
                self.loop_depth += 1;
                self.bind_block(&s.body);
                self.loop_depth -= 1;
                self.pop_scope();
            }
            Statement::Return(s) => {
                if let Some(value) = &s.value {
                    self.bind_value(value);
                }
            }
            Statement::Throw(s) => {
                self.bind_value(&s.value);
            }
            Statement::Try(s) => {
                self.bind_block(&s.try_block);
                self.scopes.push(Scope::default());
                if let Some(variable) = &s.catch_variable {
                    self.declare(variable.id, &variable.name, LocalKind::Catch, variable.span);
                }
                self.bind_block(&s.catch_block);
                self.pop_scope();
            }
            Statement::Break(span) | Statement::Continue(span) => {
                if self.loop_depth == 0 {
                    self.error(
                        "CB0139",
                        "No enclosing loop out of which to break or continue",
                        *span,
                    );
                }
            }
            Statement::Expression(s) => {
                if !matches!(
                    s.expression,
                    Expression::Call(_) | Expression::Assignment(_) | Expression::New(_)
                ) {
                    self.error(
                        "CB0201",
                        "Only assignment, call, and new object expressions can be used as a statement",
                        s.expression.span(),
                    );
                }
                self.bind_value(&s.expression);
            }
        }
    }

    /// Bind an expression that must produce a value.
    fn bind_value(&mut self, expression: &Expression) -> Bound {
        match self.bind_expression(expression) {
            Bound::Namespace(name) => {
                self.error(
                    "CB0118",
                    format!("'{}' is a namespace but is used like a variable", name),
                    expression.span(),
                );
                Bound::Error
            }
            Bound::Type(ty) => {
                self.error(
                    "CB0119",
                    format!("'{}' is a type, which is not valid in the given context", ty.full_name()),
                    expression.span(),
                );
                Bound::Error
            }
            other => other,
        }
    }

    fn bind_expression(&mut self, expression: &Expression) -> Bound {
        match expression {
            Expression::Literal(_) => Bound::Value,
            Expression::Identifier(identifier) => self.bind_identifier(identifier),
            Expression::MemberAccess(access) => self.bind_member_access(access),
            Expression::Call(call) => self.bind_call(call),
            Expression::Index(index) => {
                self.bind_value(&index.object);
                self.bind_value(&index.index);
                Bound::Value
            }
            Expression::Unary(unary) => {
                self.bind_value(&unary.operand);
                Bound::Value
            }
            Expression::Binary(binary) => {
                self.bind_value(&binary.left);
                self.bind_value(&binary.right);
                Bound::Value
            }
            Expression::Assignment(assignment) => {
                self.bind_assignment_target(&assignment.target);
                self.bind_value(&assignment.value);
                Bound::Value
            }
            Expression::List(list) => {
                for element in &list.elements {
                    self.bind_value(element);
                }
                Bound::Value
            }
            Expression::New(new) => self.bind_new(new),
        }
    }

    fn bind_identifier(&mut self, identifier: &Identifier) -> Bound {
        let name = identifier.name.as_str();
        if identifier.rooted {
            return self.bind_rooted(identifier);
        }

        if let Some(local) = self.lookup_local(name, true) {
            self.record(identifier.id, Symbol::Local(local));
            return Bound::Value;
        }

        if let Some(class) = self.current_class.clone() {
            if let Some(method) = self.user_method(&class, name) {
                return self.record_bound(identifier.id, Bound::Method(method));
            }
        }

        if let Some(&index) = self.functions.get(name) {
            let method = self.user_function(None, name, index);
            return self.record_bound(identifier.id, Bound::Method(method));
        }

        if self.classes.contains_key(name) {
            let ty = user_type(name);
            return self.record_bound(identifier.id, Bound::Type(ty));
        }

        let mut member_matches = Vec::new();
        for import in &self.static_imports {
            let found = match import {
                StaticImport::Host(full_name) => self
                    .references
                    .lookup_full_name(full_name)
                    .and_then(|ty| ty.member(name).map(|member| host_member(ty, member))),
                StaticImport::User(class) => self.user_method(class, name).map(Bound::Method),
            };
            if let Some(bound) = found {
                member_matches.push(bound);
            }
        }
        match member_matches.len() {
            0 => {}
            1 => {
                let bound = member_matches.remove(0);
                return self.record_bound(identifier.id, bound);
            }
            _ => {
                let candidates: Vec<String> = member_matches.iter().map(describe_bound).collect();
                self.error(
                    "CB0121",
                    format!(
                        "The call is ambiguous between the following methods or properties: '{}'",
                        candidates.join("' and '")
                    ),
                    identifier.span,
                );
                return Bound::Error;
            }
        }

        let type_matches: Vec<TypeSymbol> = self
            .imported_namespaces
            .iter()
            .filter_map(|namespace| self.references.lookup_type(namespace, name))
            .map(host_type)
            .collect();
        match type_matches.len() {
            0 => {}
            1 => {
                let ty = type_matches.into_iter().next().map(Bound::Type).unwrap_or(Bound::Error);
                return self.record_bound(identifier.id, ty);
            }
            _ => {
                let names: Vec<String> = type_matches.iter().map(TypeSymbol::full_name).collect();
                self.error(
                    "CB0104",
                    format!(
                        "'{}' is an ambiguous reference between '{}'",
                        name,
                        names.join("' and '")
                    ),
                    identifier.span,
                );
                return Bound::Error;
            }
        }

        if self.references.is_namespace(name) {
            return self.record_bound(identifier.id, Bound::Namespace(name.to_string()));
        }

        self.error(
            "CB0103",
            format!("The name '{}' does not exist in the current context", name),
            identifier.span,
        );
        Bound::Error
    }

    /// Rooted names only see root namespaces of the reference set.
    fn bind_rooted(&mut self, identifier: &Identifier) -> Bound {
        if self.references.is_namespace(&identifier.name) {
            return self.record_bound(identifier.id, Bound::Namespace(identifier.name.clone()));
        }
        self.error(
            "CB0400",
            format!(
                "The type or namespace name '{}' could not be found in the global namespace",
                identifier.name
            ),
            identifier.span,
        );
        Bound::Error
    }

    fn bind_member_access(&mut self, access: &MemberAccess) -> Bound {
        let member = access.member.as_str();
        let bound = match self.bind_expression(&access.object) {
            Bound::Namespace(namespace) => {
                let child = qualify(&namespace, member);
                if self.references.is_namespace(&child) {
                    Bound::Namespace(child)
                } else if let Some(ty) = self.references.lookup_type(&namespace, member) {
                    Bound::Type(host_type(ty))
                } else {
                    self.error(
                        "CB0234",
                        format!(
                            "The type or namespace name '{}' does not exist in the namespace '{}'",
                            member, namespace
                        ),
                        access.member_span,
                    );
                    return Bound::Error;
                }
            }
            Bound::Type(ty) => {
                let found = match ty.origin {
                    SymbolOrigin::User => self.user_method(&ty.name, member).map(Bound::Method),
                    SymbolOrigin::Host => self
                        .references
                        .lookup_type(&ty.namespace, &ty.name)
                        .and_then(|info| info.member(member).map(|m| host_member(info, m))),
                };
                match found {
                    Some(bound) => bound,
                    None => {
                        self.error(
                            "CB0117",
                            format!(
                                "'{}' does not contain a definition for '{}'",
                                ty.full_name(),
                                member
                            ),
                            access.member_span,
                        );
                        return Bound::Error;
                    }
                }
            }
            Bound::Method(method) => {
                self.error(
                    "CB0119",
                    format!(
                        "'{}' is a method, which is not valid in the given context",
                        method.qualified_name()
                    ),
                    access.object.span(),
                );
                return Bound::Error;
            }
            // Instance members are resolved at run time.
            Bound::Value | Bound::Property(_) => return Bound::Value,
            Bound::Error => return Bound::Error,
        };
        self.record_bound(access.id, bound)
    }

    fn bind_call(&mut self, call: &Call) -> Bound {
        let callee = self.bind_expression(&call.callee);
        for argument in &call.arguments {
            self.bind_value(argument);
        }

        match callee {
            Bound::Method(method) => {
                if !method.accepts(call.arguments.len()) {
                    self.error(
                        "CB1501",
                        format!(
                            "No overload for method '{}' takes {} arguments",
                            method.name,
                            call.arguments.len()
                        ),
                        call.span,
                    );
                }
                Bound::Value
            }
            Bound::Property(property) => {
                self.error(
                    "CB1955",
                    format!(
                        "Non-invocable member '{}' cannot be used like a method",
                        property.qualified_name()
                    ),
                    call.callee.span(),
                );
                Bound::Error
            }
            Bound::Namespace(name) => {
                self.error(
                    "CB0118",
                    format!("'{}' is a namespace but is used like a method", name),
                    call.callee.span(),
                );
                Bound::Error
            }
            Bound::Type(ty) => {
                self.error(
                    "CB0119",
                    format!("'{}' is a type but is used like a method", ty.full_name()),
                    call.callee.span(),
                );
                Bound::Error
            }
            Bound::Value => Bound::Value,
            Bound::Error => Bound::Error,
        }
    }

    fn bind_new(&mut self, new: &NewExpression) -> Bound {
        let ty = self.bind_expression(&new.type_name);
        for argument in &new.arguments {
            self.bind_value(argument);
        }

        match ty {
            Bound::Type(ty) if ty.kind == TypeKind::Exception => {
                if new.arguments.len() > 2 {
                    self.error(
                        "CB1729",
                        format!(
                            "'{}' does not contain a constructor that takes {} arguments",
                            ty.full_name(),
                            new.arguments.len()
                        ),
                        new.span,
                    );
                }
            }
            Bound::Type(ty) => {
                self.error(
                    "CB0712",
                    format!("Cannot create an instance of the static class '{}'", ty.full_name()),
                    new.type_name.span(),
                );
            }
            Bound::Namespace(name) => {
                self.error(
                    "CB0118",
                    format!("'{}' is a namespace but is used like a type", name),
                    new.type_name.span(),
                );
            }
            Bound::Error => {}
            _ => {
                let name = new.type_name.dotted_name().unwrap_or_default();
                self.error(
                    "CB0246",
                    format!("The type or namespace name '{}' could not be found", name),
                    new.type_name.span(),
                );
            }
        }
        Bound::Value
    }

    fn bind_assignment_target(&mut self, target: &Expression) {
        if let Expression::Identifier(identifier) = target {
            if let Some(local) = self.lookup_local(&identifier.name, false) {
                self.record(identifier.id, Symbol::Local(local));
                return;
            }
        }
        if !matches!(self.bind_expression(target), Bound::Error) {
            self.error(
                "CB0131",
                "The left-hand side of an assignment must be a variable",
                target.span(),
            );
        }
    }

    // Scope helpers

    fn declare(&mut self, id: NodeId, name: &str, kind: LocalKind, span: Span) {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.push(LocalEntry {
                name: name.to_string(),
                slot,
                kind,
                span,
                used: false,
            });
        }
        self.record(
            id,
            Symbol::Local(LocalSymbol {
                name: name.to_string(),
                slot,
                kind,
            }),
        );
    }

    fn declared_in_innermost(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.locals.iter().any(|local| local.name == name))
    }

    fn lookup_local(&mut self, name: &str, mark_used: bool) -> Option<LocalSymbol> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(local) = scope.locals.iter_mut().rev().find(|l| l.name == name) {
                if mark_used {
                    local.used = true;
                }
                return Some(LocalSymbol {
                    name: local.name.clone(),
                    slot: local.slot,
                    kind: local.kind,
                });
            }
        }
        None
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for local in scope.locals {
            if local.kind == LocalKind::Local && !local.used {
                self.diagnostics.push(Diagnostic::warning(
                    "CB0168",
                    format!("The variable '{}' is declared but never used", local.name),
                    local.span,
                ));
            }
        }
    }

    fn user_method(&self, class: &str, name: &str) -> Option<MethodSymbol> {
        let index = *self.classes.get(class)?.get(name)?;
        Some(self.user_function(Some(class), name, index))
    }

    fn user_function(&self, class: Option<&str>, name: &str, index: usize) -> MethodSymbol {
        let arity = self.model.functions[index].parameter_count;
        MethodSymbol {
            namespace: String::new(),
            containing_type: class.map(str::to_string),
            name: name.to_string(),
            target: MethodTarget::User(index),
            min_arity: arity,
            max_arity: Some(arity),
        }
    }

    fn record(&mut self, id: NodeId, symbol: Symbol) {
        self.model.symbols.insert(id, symbol);
    }

    fn record_bound(&mut self, id: NodeId, bound: Bound) -> Bound {
        let symbol = match &bound {
            Bound::Namespace(name) => Some(Symbol::Namespace(name.clone())),
            Bound::Type(ty) => Some(Symbol::Type(ty.clone())),
            Bound::Method(method) => Some(Symbol::Method(method.clone())),
            Bound::Property(property) => Some(Symbol::Property(property.clone())),
            Bound::Value | Bound::Error => None,
        };
        if let Some(symbol) = symbol {
            self.record(id, symbol);
        }
        bound
    }

    fn error(&mut self, id: &str, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(id, message, span));
    }
}

fn user_type(name: &str) -> TypeSymbol {
    TypeSymbol {
        namespace: String::new(),
        name: name.to_string(),
        origin: SymbolOrigin::User,
        kind: TypeKind::Static,
    }
}

fn host_type(info: &TypeInfo) -> TypeSymbol {
    TypeSymbol {
        namespace: info.namespace.clone(),
        name: info.name.clone(),
        origin: SymbolOrigin::Host,
        kind: info.kind,
    }
}

fn host_member(ty: &TypeInfo, member: &MemberInfo) -> Bound {
    match member.kind {
        MemberKind::Method => Bound::Method(MethodSymbol {
            namespace: ty.namespace.clone(),
            containing_type: Some(ty.name.clone()),
            name: member.name.to_string(),
            target: MethodTarget::Host,
            min_arity: member.min_arity,
            max_arity: member.max_arity,
        }),
        MemberKind::Property => Bound::Property(PropertySymbol {
            namespace: ty.namespace.clone(),
            containing_type: ty.name.clone(),
            name: member.name.to_string(),
        }),
    }
}

fn describe_bound(bound: &Bound) -> String {
    match bound {
        Bound::Method(method) => method.qualified_name(),
        Bound::Property(property) => property.qualified_name(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn bind_source(source: &str) -> (Program, Binding) {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let binding = bind(&program, &ReferenceSet::analysis());
        (program, binding)
    }

    fn ids(binding: &Binding) -> Vec<&str> {
        binding.diagnostics.iter().map(|d| d.id()).collect()
    }

    #[test]
    fn test_clean_program_has_no_diagnostics() {
        let (_, binding) = bind_source(
            r#"
            using System;
            using static System.Console;
            class Printer { function Shout(text) { Console.WriteLine(text + "!"); } }
            function main() {
                let greeting = "Hi";
                Console.Write(greeting);
                WriteLine();
                let f = Console.WriteLine;
                f("{0}", 1);
                Printer.Shout("done");
            }
            "#,
        );
        assert!(binding.diagnostics.is_empty(), "{:?}", binding.diagnostics);
        assert_eq!(binding.model.entry_point(), Some(1));
        assert_eq!(binding.model.functions()[0].name, "Printer.Shout");
    }

    #[test]
    fn test_static_import_binds_to_console() {
        let (program, binding) =
            bind_source("using static System.Console;\nfunction main() { WriteLine(\"Hi\"); }");
        let Item::Function(main) = &program.items[0] else {
            panic!("expected function");
        };
        let Statement::Expression(stmt) = &main.body.statements[0] else {
            panic!("expected expression");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        let Expression::Identifier(callee) = call.callee.as_ref() else {
            panic!("expected identifier");
        };
        let symbol = binding.model.symbol_info(callee.id).unwrap();
        assert_eq!(symbol.containing_type(), Some(("System", "Console")));
    }

    #[test]
    fn test_user_function_shadows_static_import() {
        let (program, binding) = bind_source(
            "using static System.Console;\nfunction WriteLine(x) { }\nfunction main() { WriteLine(1); }",
        );
        assert!(binding.diagnostics.is_empty());
        let Item::Function(main) = &program.items[1] else {
            panic!("expected function");
        };
        let Statement::Expression(stmt) = &main.body.statements[0] else {
            panic!("expected expression");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        let Expression::Identifier(callee) = call.callee.as_ref() else {
            panic!("expected identifier");
        };
        let symbol = binding.model.symbol_info(callee.id).unwrap();
        assert_eq!(symbol.containing_type(), None);
    }

    #[test]
    fn test_unknown_name() {
        let (_, binding) = bind_source("function main() { foo(); }");
        assert_eq!(ids(&binding), vec!["CB0103"]);
        assert_eq!(binding.diagnostics[0].span().start_column, 19);
    }

    #[test]
    fn test_unknown_member_and_arity() {
        let (_, binding) =
            bind_source("function main() { System.Console.Shout(); System.Math.Max(1); }");
        assert_eq!(ids(&binding), vec!["CB0117", "CB1501"]);
    }

    #[test]
    fn test_missing_entry_point() {
        let (_, binding) = bind_source("function helper() { }");
        assert_eq!(ids(&binding), vec!["CB5001"]);
    }

    #[test]
    fn test_warnings() {
        let (_, binding) =
            bind_source("function main() { let unused = 1; return; System.Console.WriteLine(); }");
        let severities: Vec<_> = binding.diagnostics.iter().map(|d| d.severity()).collect();
        assert!(severities.iter().all(|s| *s == Severity::Warning));
        let mut found = ids(&binding);
        found.sort();
        assert_eq!(found, vec!["CB0162", "CB0168"]);
    }

    #[test]
    fn test_namespace_as_value() {
        let (_, binding) = bind_source("function main() { let x = System; x(); }");
        assert_eq!(ids(&binding), vec!["CB0118"]);
    }

    #[test]
    fn test_break_outside_loop() {
        let (_, binding) = bind_source("function main() { break; }");
        assert_eq!(ids(&binding), vec!["CB0139"]);
    }

    #[test]
    fn test_duplicate_declarations() {
        let (_, binding) =
            bind_source("function main() { let a = 1; let a = 2; a(); }\nfunction main() { }");
        let found = ids(&binding);
        assert!(found.contains(&"CB0128"));
        assert!(found.contains(&"CB0111"));
    }

    #[test]
    fn test_locals_get_distinct_slots() {
        let (_, binding) = bind_source(
            "function f(a, b) { let c = a; for (d in [b]) { let e = d; e(); } try { } catch (x) { } c(); }\nfunction main() { f(1, 2); }",
        );
        assert!(binding.diagnostics.is_empty(), "{:?}", binding.diagnostics);
        assert_eq!(binding.model.functions()[0].local_count, 6);
    }

    #[test]
    fn test_new_requires_exception_type() {
        let (_, binding) = bind_source(
            "function main() { throw new System.InvalidOperationException(\"x\"); }",
        );
        assert!(binding.diagnostics.is_empty());

        let (_, binding) = bind_source("function main() { throw new System.Math(); }");
        assert_eq!(ids(&binding), vec!["CB0712"]);
    }
}
