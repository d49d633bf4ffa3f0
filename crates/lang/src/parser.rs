//! Parser for ConsoleBox source
//!
//! Recursive descent over the token stream. Statement-level errors are
//! recorded and parsing resumes at the next statement boundary, so one
//! pass can report several syntax errors.

use crate::ast::*;
use crate::error::{LangError, Result};
use crate::lexer::{Keyword, Token, TokenType};

/// Parser for ConsoleBox programs
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: NodeId,
    errors: Vec<LangError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|token| !matches!(token.token_type, TokenType::Comment(_)))
            .collect();

        if !matches!(tokens.last().map(|t| &t.token_type), Some(TokenType::Eof)) {
            let (line, column, offset) = tokens
                .last()
                .map(|t| (t.line, t.column + t.length, t.end_offset()))
                .unwrap_or((1, 1, 0));
            tokens.push(Token {
                token_type: TokenType::Eof,
                line,
                column,
                offset,
                length: 0,
            });
        }

        Self {
            tokens,
            current: 0,
            next_id: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the token stream, failing with the first syntax error.
    pub fn parse(&mut self) -> Result<Program> {
        let (program, errors) = self.parse_with_recovery();
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(program),
        }
    }

    /// Parse the token stream, returning the (possibly partial) tree and every syntax error.
    pub fn parse_with_recovery(&mut self) -> (Program, Vec<LangError>) {
        let start = self.peek().span();
        let mut usings = Vec::new();
        let mut items = Vec::new();

        while self.check_keyword(Keyword::Using) {
            match self.parse_using() {
                Ok(using) => usings.push(using),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize_top_level();
                }
            }
        }

        while !self.is_at_end() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize_top_level();
                }
            }
        }

        let end = self.peek().span();
        let program = Program {
            usings,
            items,
            span: start.to(&end),
            next_node_id: self.next_id,
        };
        (program, std::mem::take(&mut self.errors))
    }

    fn parse_using(&mut self) -> Result<UsingDirective> {
        let start = self.advance().span();
        let is_static = self.match_keyword(Keyword::Static);

        let mut path = Vec::new();
        let (first, _) = self.consume_identifier("Identifier")?;
        path.push(first);
        while self.match_token(&TokenType::Dot) {
            let (segment, _) = self.consume_identifier("Identifier")?;
            path.push(segment);
        }
        let end = self.consume_token(TokenType::Semicolon, ";")?.span();

        Ok(UsingDirective {
            is_static,
            path,
            span: start.to(&end),
        })
    }

    fn parse_item(&mut self) -> Result<Item> {
        match &self.peek().token_type {
            TokenType::Keyword(Keyword::Function) => {
                Ok(Item::Function(self.parse_function_definition()?))
            }
            TokenType::Keyword(Keyword::Class) => Ok(Item::Class(self.parse_class_definition()?)),
            TokenType::Keyword(Keyword::Using) => Err(LangError::parsing(
                "A using clause must precede all other elements defined in the file",
                self.peek().span(),
            )),
            _ => Err(LangError::parsing(
                format!(
                    "Expected 'function' or 'class' declaration, found '{}'",
                    describe(&self.peek().token_type)
                ),
                self.peek().span(),
            )),
        }
    }

    fn parse_function_definition(&mut self) -> Result<FunctionDefinition> {
        let start = self.advance().span(); // function
        let (name, name_span) = self.consume_identifier("Identifier")?;

        self.consume_token(TokenType::LeftParen, "(")?;
        let mut parameters = Vec::new();
        if !self.check_token(&TokenType::RightParen) {
            loop {
                let (param_name, span) = self.consume_identifier("Identifier")?;
                parameters.push(Parameter {
                    id: self.next_node_id(),
                    name: param_name,
                    span,
                });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume_token(TokenType::RightParen, ")")?;

        let body = self.parse_block()?;
        let span = start.to(&body.span);

        Ok(FunctionDefinition {
            name,
            name_span,
            parameters,
            body,
            span,
        })
    }

    fn parse_class_definition(&mut self) -> Result<ClassDefinition> {
        let start = self.advance().span(); // class
        let (name, name_span) = self.consume_identifier("Identifier")?;
        self.consume_token(TokenType::LeftBrace, "{")?;

        let mut methods = Vec::new();
        while !self.check_token(&TokenType::RightBrace) && !self.is_at_end() {
            if self.check_keyword(Keyword::Function) {
                match self.parse_function_definition() {
                    Ok(method) => methods.push(method),
                    Err(error) => {
                        self.errors.push(error);
                        self.synchronize_class_member();
                    }
                }
            } else {
                self.errors.push(LangError::parsing(
                    format!(
                        "Expected 'function' declaration, found '{}'",
                        describe(&self.peek().token_type)
                    ),
                    self.peek().span(),
                ));
                self.advance();
                self.synchronize_class_member();
            }
        }

        let end = self.consume_token(TokenType::RightBrace, "}")?.span();
        Ok(ClassDefinition {
            name,
            name_span,
            methods,
            span: start.to(&end),
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.consume_token(TokenType::LeftBrace, "{")?.span();
        let mut statements = Vec::new();

        while !self.check_token(&TokenType::RightBrace) && !self.is_at_end() {
            let before = self.current;
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                    if self.current == before && !self.check_token(&TokenType::RightBrace) {
                        self.advance();
                    }
                }
            }
        }

        let end = self.consume_token(TokenType::RightBrace, "}")?.span();
        Ok(Block {
            statements,
            span: start.to(&end),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match &self.peek().token_type {
            TokenType::Keyword(Keyword::Let) => Ok(Statement::Let(self.parse_let_statement()?)),
            TokenType::Keyword(Keyword::If) => Ok(Statement::If(self.parse_if_statement()?)),
            TokenType::Keyword(Keyword::While) => {
                Ok(Statement::While(self.parse_while_statement()?))
            }
            TokenType::Keyword(Keyword::For) => Ok(Statement::For(self.parse_for_statement()?)),
            TokenType::Keyword(Keyword::Return) => {
                Ok(Statement::Return(self.parse_return_statement()?))
            }
            TokenType::Keyword(Keyword::Throw) => {
                let start = self.advance().span();
                let value = self.parse_expression()?;
                let end = self.consume_token(TokenType::Semicolon, ";")?.span();
                Ok(Statement::Throw(ThrowStatement {
                    value,
                    span: start.to(&end),
                }))
            }
            TokenType::Keyword(Keyword::Try) => Ok(Statement::Try(self.parse_try_statement()?)),
            TokenType::Keyword(Keyword::Break) => {
                let start = self.advance().span();
                let end = self.consume_token(TokenType::Semicolon, ";")?.span();
                Ok(Statement::Break(start.to(&end)))
            }
            TokenType::Keyword(Keyword::Continue) => {
                let start = self.advance().span();
                let end = self.consume_token(TokenType::Semicolon, ";")?.span();
                Ok(Statement::Continue(start.to(&end)))
            }
            _ => {
                let expression = self.parse_expression()?;
                let end = self.consume_token(TokenType::Semicolon, ";")?.span();
                let span = expression.span().to(&end);
                Ok(Statement::Expression(ExpressionStatement { expression, span }))
            }
        }
    }

    fn parse_let_statement(&mut self) -> Result<LetStatement> {
        let start = self.advance().span(); // let
        let (name, name_span) = self.consume_identifier("Identifier")?;
        self.consume_token(TokenType::Assign, "=")?;
        let value = self.parse_expression()?;
        let end = self.consume_token(TokenType::Semicolon, ";")?.span();

        Ok(LetStatement {
            id: self.next_node_id(),
            name,
            name_span,
            value,
            span: start.to(&end),
        })
    }

    fn parse_if_statement(&mut self) -> Result<IfStatement> {
        let start = self.advance().span(); // if
        let condition = self.parse_parenthesized_condition()?;
        let then_block = self.parse_block()?;
        let mut end = then_block.span;

        let mut else_ifs = Vec::new();
        let mut else_block = None;
        while self.match_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                let else_if_start = self.advance().span();
                let condition = self.parse_parenthesized_condition()?;
                let block = self.parse_block()?;
                end = block.span;
                else_ifs.push(ElseIf {
                    condition,
                    span: else_if_start.to(&block.span),
                    block,
                });
            } else {
                let block = self.parse_block()?;
                end = block.span;
                else_block = Some(block);
                break;
            }
        }

        Ok(IfStatement {
            condition,
            then_block,
            else_ifs,
            else_block,
            span: start.to(&end),
        })
    }

    fn parse_while_statement(&mut self) -> Result<WhileStatement> {
        let start = self.advance().span(); // while
        let condition = self.parse_parenthesized_condition()?;
        let body = self.parse_block()?;
        Ok(WhileStatement {
            condition,
            span: start.to(&body.span),
            body,
        })
    }

    fn parse_for_statement(&mut self) -> Result<ForStatement> {
        let start = self.advance().span(); // for
        self.consume_token(TokenType::LeftParen, "(")?;
        let (variable, variable_span) = self.consume_identifier("Identifier")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        self.consume_token(TokenType::RightParen, ")")?;
        let body = self.parse_block()?;

        Ok(ForStatement {
            id: self.next_node_id(),
            variable,
            variable_span,
            iterable,
            span: start.to(&body.span),
            body,
        })
    }

    fn parse_return_statement(&mut self) -> Result<ReturnStatement> {
        let start = self.advance().span(); // return
        let value = if self.check_token(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = self.consume_token(TokenType::Semicolon, ";")?.span();
        Ok(ReturnStatement {
            value,
            span: start.to(&end),
        })
    }

    fn parse_try_statement(&mut self) -> Result<TryStatement> {
        let start = self.advance().span(); // try
        let try_block = self.parse_block()?;
        self.consume_keyword(Keyword::Catch)?;

        let catch_variable = if self.match_token(&TokenType::LeftParen) {
            let (name, span) = self.consume_identifier("Identifier")?;
            self.consume_token(TokenType::RightParen, ")")?;
            Some(CatchVariable {
                id: self.next_node_id(),
                name,
                span,
            })
        } else {
            None
        };

        let catch_block = self.parse_block()?;
        Ok(TryStatement {
            try_block,
            catch_variable,
            span: start.to(&catch_block.span),
            catch_block,
        })
    }

    fn parse_parenthesized_condition(&mut self) -> Result<Expression> {
        self.consume_token(TokenType::LeftParen, "(")?;
        let condition = self.parse_expression()?;
        self.consume_token(TokenType::RightParen, ")")?;
        Ok(condition)
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        let expr = self.parse_logical_or()?;

        if self.match_token(&TokenType::Assign) {
            let value = self.parse_assignment()?;
            let span = expr.span().to(&value.span());
            return Ok(Expression::Assignment(Assignment {
                target: Box::new(expr),
                value: Box::new(value),
                span,
            }));
        }

        Ok(expr)
    }

    fn parse_logical_or(&mut self) -> Result<Expression> {
        let mut expr = self.parse_logical_and()?;
        while self.match_token(&TokenType::Or) {
            let right = self.parse_logical_and()?;
            expr = binary(expr, BinaryOperator::Or, right);
        }
        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> Result<Expression> {
        let mut expr = self.parse_equality()?;
        while self.match_token(&TokenType::And) {
            let right = self.parse_equality()?;
            expr = binary(expr, BinaryOperator::And, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expression> {
        let mut expr = self.parse_comparison()?;
        while let Some(operator) =
            self.match_binary_operator(&[TokenType::Equal, TokenType::NotEqual])
        {
            let right = self.parse_comparison()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut expr = self.parse_addition()?;
        while let Some(operator) = self.match_binary_operator(&[
            TokenType::LessThan,
            TokenType::LessThanOrEqual,
            TokenType::GreaterThan,
            TokenType::GreaterThanOrEqual,
        ]) {
            let right = self.parse_addition()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_addition(&mut self) -> Result<Expression> {
        let mut expr = self.parse_multiplication()?;
        while let Some(operator) = self.match_binary_operator(&[TokenType::Plus, TokenType::Minus])
        {
            let right = self.parse_multiplication()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_multiplication(&mut self) -> Result<Expression> {
        let mut expr = self.parse_unary()?;
        while let Some(operator) = self.match_binary_operator(&[
            TokenType::Multiply,
            TokenType::Divide,
            TokenType::Modulo,
        ]) {
            let right = self.parse_unary()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let operator = match self.peek().token_type {
            TokenType::Not => Some(UnaryOperator::Not),
            TokenType::Minus => Some(UnaryOperator::Negate),
            _ => None,
        };

        if let Some(operator) = operator {
            let start = self.advance().span();
            let operand = self.parse_unary()?;
            let span = start.to(&operand.span());
            return Ok(Expression::Unary(UnaryOperation {
                operator,
                operand: Box::new(operand),
                span,
            }));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&TokenType::Dot) {
                let (member, member_span) = self.consume_identifier("Identifier")?;
                let span = expr.span().to(&member_span);
                expr = Expression::MemberAccess(MemberAccess {
                    id: self.next_node_id(),
                    object: Box::new(expr),
                    member,
                    member_span,
                    span,
                });
            } else if self.match_token(&TokenType::LeftParen) {
                let arguments = self.parse_arguments()?;
                let end = self.previous().span();
                let span = expr.span().to(&end);
                expr = Expression::Call(Call {
                    callee: Box::new(expr),
                    arguments,
                    span,
                });
            } else if self.match_token(&TokenType::LeftBracket) {
                let index = self.parse_expression()?;
                let end = self.consume_token(TokenType::RightBracket, "]")?.span();
                let span = expr.span().to(&end);
                expr = Expression::Index(IndexAccess {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        let span = token.span();

        let literal = match &token.token_type {
            TokenType::Integer(value) => Some(Literal::Integer(*value)),
            TokenType::Float(value) => Some(Literal::Float(*value)),
            TokenType::String(value) => Some(Literal::String(value.clone())),
            TokenType::Keyword(Keyword::True) => Some(Literal::Boolean(true)),
            TokenType::Keyword(Keyword::False) => Some(Literal::Boolean(false)),
            TokenType::Keyword(Keyword::Null) => Some(Literal::Null),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(Expression::Literal(LiteralExpression { value, span }));
        }

        match &token.token_type {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(Expression::Identifier(Identifier {
                    id: self.next_node_id(),
                    name: name.clone(),
                    span,
                    rooted: false,
                }))
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume_token(TokenType::RightParen, ")")?;
                Ok(expr)
            }
            TokenType::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check_token(&TokenType::RightBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.match_token(&TokenType::Comma) {
                            break;
                        }
                    }
                }
                let end = self.consume_token(TokenType::RightBracket, "]")?.span();
                Ok(Expression::List(ListExpression {
                    elements,
                    span: span.to(&end),
                }))
            }
            TokenType::Keyword(Keyword::New) => {
                self.advance();
                let type_name = self.parse_type_name()?;
                self.consume_token(TokenType::LeftParen, "(")?;
                let arguments = self.parse_arguments()?;
                let end = self.previous().span();
                Ok(Expression::New(NewExpression {
                    type_name: Box::new(type_name),
                    arguments,
                    span: span.to(&end),
                }))
            }
            other => Err(LangError::parsing(
                format!("Invalid expression term '{}'", describe(other)),
                span,
            )),
        }
    }

    /// `A.B.C` as an identifier/member-access chain.
    fn parse_type_name(&mut self) -> Result<Expression> {
        let (name, span) = self.consume_identifier("Type")?;
        let mut expr = Expression::Identifier(Identifier {
            id: self.next_node_id(),
            name,
            span,
            rooted: false,
        });
        while self.match_token(&TokenType::Dot) {
            let (member, member_span) = self.consume_identifier("Identifier")?;
            let span = expr.span().to(&member_span);
            expr = Expression::MemberAccess(MemberAccess {
                id: self.next_node_id(),
                object: Box::new(expr),
                member,
                member_span,
                span,
            });
        }
        Ok(expr)
    }

    /// Arguments after an already consumed `(`, including the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();
        if !self.check_token(&TokenType::RightParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume_token(TokenType::RightParen, ")")?;
        Ok(arguments)
    }

    // Helper methods

    fn next_node_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check_token(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_binary_operator(&mut self, operators: &[TokenType]) -> Option<BinaryOperator> {
        let token_type = self.peek().token_type.clone();
        if !operators.contains(&token_type) {
            return None;
        }
        self.advance();
        Some(match token_type {
            TokenType::Plus => BinaryOperator::Add,
            TokenType::Minus => BinaryOperator::Subtract,
            TokenType::Multiply => BinaryOperator::Multiply,
            TokenType::Divide => BinaryOperator::Divide,
            TokenType::Modulo => BinaryOperator::Modulo,
            TokenType::Equal => BinaryOperator::Equal,
            TokenType::NotEqual => BinaryOperator::NotEqual,
            TokenType::LessThan => BinaryOperator::LessThan,
            TokenType::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
            TokenType::GreaterThan => BinaryOperator::GreaterThan,
            TokenType::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
            TokenType::And => BinaryOperator::And,
            _ => BinaryOperator::Or,
        })
    }

    fn consume_token(&mut self, expected: TokenType, what: &str) -> Result<Token> {
        if self.check_token(&expected) {
            Ok(self.advance())
        } else {
            Err(LangError::parsing(
                format!("{} expected", what),
                self.expected_span(),
            ))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(LangError::parsing(
                format!("'{}' expected", keyword.as_str()),
                self.expected_span(),
            ))
        }
    }

    fn consume_identifier(&mut self, what: &str) -> Result<(String, Span)> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                let span = self.advance().span();
                Ok((name, span))
            }
            TokenType::Keyword(keyword) => Err(LangError::parsing(
                format!(
                    "{} expected; '{}' is a keyword",
                    what,
                    keyword.as_str()
                ),
                self.peek().span(),
            )),
            _ => Err(LangError::parsing(
                format!("{} expected", what),
                self.expected_span(),
            )),
        }
    }

    fn check_token(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(token_type)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        let index = self.current.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Zero-width span just after the previous token, where a missing token belongs.
    fn expected_span(&self) -> Span {
        if self.current == 0 {
            return self.peek().span();
        }
        let end = self.previous().span().end;
        Span { start: end, end }
    }

    /// Skip to the next statement boundary.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match &self.peek().token_type {
                TokenType::Semicolon => {
                    self.advance();
                    return;
                }
                TokenType::RightBrace
                | TokenType::Keyword(Keyword::Let)
                | TokenType::Keyword(Keyword::If)
                | TokenType::Keyword(Keyword::While)
                | TokenType::Keyword(Keyword::For)
                | TokenType::Keyword(Keyword::Return)
                | TokenType::Keyword(Keyword::Throw)
                | TokenType::Keyword(Keyword::Try)
                | TokenType::Keyword(Keyword::Break)
                | TokenType::Keyword(Keyword::Continue)
                | TokenType::Keyword(Keyword::Function)
                | TokenType::Keyword(Keyword::Class) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn synchronize_class_member(&mut self) {
        while !self.is_at_end()
            && !self.check_keyword(Keyword::Function)
            && !self.check_token(&TokenType::RightBrace)
        {
            self.advance();
        }
    }

    fn synchronize_top_level(&mut self) {
        self.advance();
        while !self.is_at_end() {
            match &self.peek().token_type {
                TokenType::Keyword(Keyword::Function)
                | TokenType::Keyword(Keyword::Class)
                | TokenType::Keyword(Keyword::Using) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
    let span = left.span().to(&right.span());
    Expression::Binary(BinaryOperation {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        span,
    })
}

/// Short text for a token in error messages.
fn describe(token_type: &TokenType) -> String {
    match token_type {
        TokenType::String(_) => "string literal".to_string(),
        TokenType::Float(value) => value.to_string(),
        TokenType::Integer(value) => value.to_string(),
        TokenType::Identifier(name) => name.clone(),
        TokenType::Keyword(keyword) => keyword.as_str().to_string(),
        TokenType::Plus => "+".to_string(),
        TokenType::Minus => "-".to_string(),
        TokenType::Multiply => "*".to_string(),
        TokenType::Divide => "/".to_string(),
        TokenType::Modulo => "%".to_string(),
        TokenType::Equal => "==".to_string(),
        TokenType::NotEqual => "!=".to_string(),
        TokenType::LessThan => "<".to_string(),
        TokenType::LessThanOrEqual => "<=".to_string(),
        TokenType::GreaterThan => ">".to_string(),
        TokenType::GreaterThanOrEqual => ">=".to_string(),
        TokenType::And => "&&".to_string(),
        TokenType::Or => "||".to_string(),
        TokenType::Not => "!".to_string(),
        TokenType::Assign => "=".to_string(),
        TokenType::LeftParen => "(".to_string(),
        TokenType::RightParen => ")".to_string(),
        TokenType::LeftBrace => "{".to_string(),
        TokenType::RightBrace => "}".to_string(),
        TokenType::LeftBracket => "[".to_string(),
        TokenType::RightBracket => "]".to_string(),
        TokenType::Comma => ",".to_string(),
        TokenType::Semicolon => ";".to_string(),
        TokenType::Dot => ".".to_string(),
        TokenType::Eof => "end of file".to_string(),
        TokenType::Comment(_) => "comment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(input: &str) -> Program {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    fn parse_errors(input: &str) -> Vec<LangError> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(tokens).parse_with_recovery().1
    }

    #[test]
    fn test_parse_usings_and_function() {
        let program = parse(
            "using System;\nusing static System.Console;\nfunction main() { WriteLine(\"Hi\"); }",
        );
        assert_eq!(program.usings.len(), 2);
        assert!(!program.usings[0].is_static);
        assert!(program.usings[1].is_static);
        assert_eq!(program.usings[1].qualified_name(), "System.Console");
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn test_parse_member_call() {
        let program = parse("function main() { System.Console.WriteLine(\"Hi\"); }");
        let Item::Function(main) = &program.items[0] else {
            panic!("expected function");
        };
        let Statement::Expression(stmt) = &main.body.statements[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        assert_eq!(
            call.callee.dotted_name().as_deref(),
            Some("System.Console.WriteLine")
        );
        assert_eq!(call.arguments.len(), 1);
    }

    #[test]
    fn test_parse_class_and_control_flow() {
        let program = parse(
            r#"
            class Greeter {
                function greet(name) {
                    if (name == null) { return "nobody"; }
                    else if (name == "") { return "empty"; }
                    else { return "Hello " + name; }
                }
            }
            function main() {
                let total = 0;
                for (n in [1, 2, 3]) { total = total + n; }
                while (total > 0) { total = total - 1; if (total == 2) { break; } }
                try { throw new System.Exception("x"); } catch (e) { }
            }
            "#,
        );
        assert_eq!(program.items.len(), 2);
        let Item::Class(class) = &program.items[0] else {
            panic!("expected class");
        };
        assert_eq!(class.methods[0].parameters.len(), 1);
        let Statement::If(if_stmt) = &class.methods[0].body.statements[0] else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.else_ifs.len(), 1);
        assert!(if_stmt.else_block.is_some());
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse("function main() { let x = 1 + 2 * 3; }");
        let Item::Function(main) = &program.items[0] else {
            panic!("expected function");
        };
        let Statement::Let(let_stmt) = &main.body.statements[0] else {
            panic!("expected let");
        };
        let Expression::Binary(add) = &let_stmt.value else {
            panic!("expected binary");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        assert!(matches!(*add.right, Expression::Binary(_)));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let program = parse("function main() { a.b.c(d, e); let f = g; }");
        assert_eq!(program.next_node_id, 7);
    }

    #[test]
    fn test_missing_semicolon_reports_position() {
        let errors = parse_errors("function main() {\n  let x = 1\n}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "; expected");
        let span = errors[0].span();
        assert_eq!(span.start.line, 2);
        assert_eq!(span.start, span.end);
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let errors = parse_errors(
            "function main() {\n  let = 1;\n  foo(;\n  bar();\n}\nfunction other() { }",
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_top_level_statement_is_error() {
        let errors = parse_errors("let x = 1;\nfunction main() { }");
        assert!(!errors.is_empty());
        assert!(errors[0].message().contains("Expected 'function' or 'class'"));
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let errors = parse_errors("function main() {");
        assert_eq!(errors.len(), 1);
    }
}
