use super::host::{self, HostContext, NativeTable};
use super::value::{self, cast_error, Callable, ExceptionValue, Value};
use super::{Fault, INDEX_OUT_OF_RANGE, INVALID_CAST, MISSING_MEMBER, MISSING_METHOD};
use lang::ir::{Artifact, BinaryOp, CallTarget, Expr, Stmt};
use std::rc::Rc;
use std::sync::atomic::Ordering;

/// How a program unwinds out of the interpreter.
#[derive(Debug)]
pub(crate) enum Unwind {
    Throw {
        exception: Rc<ExceptionValue>,
        stack_trace: String,
    },
    /// The domain was torn down mid-run.
    Abort,
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    function: usize,
    line: usize,
    locals: Vec<Value>,
}

type Exec<T> = Result<T, Unwind>;

pub(crate) struct Interpreter<'a> {
    artifact: &'a Artifact,
    natives: &'a NativeTable,
    host: HostContext<'a>,
    max_call_depth: usize,
    frames: Vec<Frame>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        artifact: &'a Artifact,
        natives: &'a NativeTable,
        host: HostContext<'a>,
        max_call_depth: usize,
    ) -> Self {
        Self {
            artifact,
            natives,
            host,
            max_call_depth,
            frames: Vec::new(),
        }
    }

    /// Invoke the entry point with no arguments.
    pub fn run(&mut self) -> Exec<()> {
        self.call_user(self.artifact.entry_point, Vec::new())
            .map(|_| ())
    }

    fn call_user(&mut self, index: usize, mut arguments: Vec<Value>) -> Exec<Value> {
        let artifact = self.artifact;
        let Some(function) = artifact.functions.get(index) else {
            return Err(self.raise(Fault::new(
                MISSING_METHOD,
                format!("Function #{} not found.", index),
            )));
        };
        if arguments.len() != function.parameter_count {
            return Err(self.raise(Fault::new(
                "System.Reflection.TargetParameterCountException",
                format!(
                    "'{}' expects {} argument(s) but was given {}.",
                    function.name,
                    function.parameter_count,
                    arguments.len()
                ),
            )));
        }
        if self.frames.len() >= self.max_call_depth {
            return Err(self.raise(Fault::new(
                "System.InsufficientExecutionStackException",
                "Insufficient stack to continue executing the program safely.",
            )));
        }

        arguments.resize(function.local_count.max(function.parameter_count), Value::Null);
        self.frames.push(Frame {
            function: index,
            line: function.line,
            locals: arguments,
        });
        let result = self.execute_block(&function.body);
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn execute_block(&mut self, statements: &'a [Stmt]) -> Exec<Flow> {
        for statement in statements {
            match self.execute_statement(statement)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_statement(&mut self, statement: &'a Stmt) -> Exec<Flow> {
        self.check_cancelled()?;
        self.set_line(statement.line());

        match statement {
            Stmt::Let { slot, value, .. } => {
                let value = self.evaluate(value)?;
                self.store(*slot, value);
                Ok(Flow::Normal)
            }
            Stmt::Expr { expr, .. } => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                if self.condition(condition)? {
                    self.execute_block(then_body)
                } else {
                    self.execute_block(else_body)
                }
            }
            Stmt::While {
                condition,
                body,
                line,
            } => {
                loop {
                    self.check_cancelled()?;
                    self.set_line(*line);
                    if !self.condition(condition)? {
                        break;
                    }
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                slot,
                iterable,
                body,
                ..
            } => {
                let items = self.evaluate(iterable)?;
                let items = self.iterate(items)?;
                for item in items {
                    self.check_cancelled()?;
                    self.store(*slot, item);
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw { value, .. } => {
                let value = self.evaluate(value)?;
                Err(self.throw(value))
            }
            Stmt::Try {
                body,
                catch_slot,
                handler,
                ..
            } => match self.execute_block(body) {
                Err(Unwind::Throw { exception, .. }) => {
                    if let Some(slot) = catch_slot {
                        self.store(*slot, Value::Exception(exception));
                    }
                    self.execute_block(handler)
                }
                other => other,
            },
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    fn evaluate(&mut self, expression: &'a Expr) -> Exec<Value> {
        match expression {
            Expr::Constant { value } => Ok(Value::from(value)),
            Expr::Local { slot } => Ok(self.load(*slot)),
            Expr::Assign { slot, value } => {
                let value = self.evaluate(value)?;
                self.store(*slot, value.clone());
                Ok(value)
            }
            Expr::Call { target, arguments } => {
                let arguments = self.evaluate_all(arguments)?;
                self.invoke(callable(target), arguments)
            }
            Expr::CallValue { callee, arguments } => {
                let callee = self.evaluate(callee)?;
                let arguments = self.evaluate_all(arguments)?;
                match callee {
                    Value::Function(callable) => self.invoke(callable, arguments),
                    Value::Null => Err(self.raise(Fault::null_reference())),
                    other => Err(self.raise(Fault::new(
                        INVALID_CAST,
                        format!("Object of type '{}' cannot be invoked.", other.type_name()),
                    ))),
                }
            }
            Expr::FunctionRef { target } => Ok(Value::Function(callable(target))),
            Expr::HostProperty { member } => {
                self.invoke(Callable::Host(member.clone()), Vec::new())
            }
            Expr::Member { object, name } => {
                let object = self.evaluate(object)?;
                self.member(object, name).map_err(|fault| self.raise(fault))
            }
            Expr::InvokeMember {
                object,
                name,
                arguments,
            } => {
                let object = self.evaluate(object)?;
                let arguments = self.evaluate_all(arguments)?;
                self.invoke_member(object, name, arguments)
            }
            Expr::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                index_value(object, index).map_err(|fault| self.raise(fault))
            }
            Expr::Unary { operator, operand } => {
                let operand = self.evaluate(operand)?;
                value::unary(*operator, operand).map_err(|fault| self.raise(fault))
            }
            Expr::Binary {
                operator: operator @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let left = left.as_bool().map_err(|fault| self.raise(fault))?;
                if left == (*operator == BinaryOp::Or) {
                    return Ok(Value::Boolean(left));
                }
                let right = self.evaluate(right)?;
                right
                    .as_bool()
                    .map(Value::Boolean)
                    .map_err(|fault| self.raise(fault))
            }
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                value::binary(*operator, left, right).map_err(|fault| self.raise(fault))
            }
            Expr::List { elements } => Ok(Value::list(self.evaluate_all(elements)?)),
            Expr::New {
                type_name,
                arguments,
            } => {
                let arguments = self.evaluate_all(arguments)?;
                let message = match arguments.first() {
                    Some(message) => message.render(),
                    None => format!("Exception of type '{}' was thrown.", type_name),
                };
                Ok(Value::Exception(Rc::new(ExceptionValue {
                    type_name: type_name.clone(),
                    message,
                })))
            }
        }
    }

    fn evaluate_all(&mut self, expressions: &'a [Expr]) -> Exec<Vec<Value>> {
        expressions
            .iter()
            .map(|expression| self.evaluate(expression))
            .collect()
    }

    fn invoke(&mut self, callable: Callable, arguments: Vec<Value>) -> Exec<Value> {
        match callable {
            Callable::User(index) => self.call_user(index, arguments),
            Callable::Host(member) => {
                let name = member.qualified_name();
                let result = match self.natives.get(&name) {
                    Some(native) => native(&self.host, arguments),
                    None => Err(Fault::new(
                        MISSING_METHOD,
                        format!("Method not found: '{}'.", name),
                    )),
                };
                result.map_err(|fault| self.raise(fault))
            }
            Callable::Writer { line } => {
                host::write(&self.host, &arguments, line).map_err(|fault| self.raise(fault))
            }
        }
    }

    /// Instance members resolved at run time.
    fn member(&self, object: Value, name: &str) -> Result<Value, Fault> {
        match (&object, name) {
            (Value::Null, _) => Err(Fault::null_reference()),
            (Value::String(text), "Length") => Ok(Value::Integer(text.chars().count() as i64)),
            (Value::List(items), "Count") => Ok(Value::Integer(items.borrow().len() as i64)),
            (Value::Exception(exception), "Message") => {
                Ok(Value::String(exception.message.clone()))
            }
            (Value::Writer, "Write") => Ok(Value::Function(Callable::Writer { line: false })),
            (Value::Writer, "WriteLine") => Ok(Value::Function(Callable::Writer { line: true })),
            _ => Err(Fault::new(
                MISSING_MEMBER,
                format!("'{}' does not contain a member '{}'.", object.type_name(), name),
            )),
        }
    }

    fn invoke_member(&mut self, object: Value, name: &str, arguments: Vec<Value>) -> Exec<Value> {
        if let (Value::Writer, "Write" | "WriteLine") = (&object, name) {
            return self.invoke(Callable::Writer { line: name == "WriteLine" }, arguments);
        }

        let result = match (&object, name, arguments.as_slice()) {
            (Value::Null, _, _) => Err(Fault::null_reference()),
            (_, "ToString", []) => Ok(Value::String(object.render())),
            (Value::String(text), "ToUpper", []) => Ok(Value::String(text.to_uppercase())),
            (Value::String(text), "ToLower", []) => Ok(Value::String(text.to_lowercase())),
            (Value::String(text), "Trim", []) => Ok(Value::String(text.trim().to_string())),
            (Value::String(text), "Contains", [needle]) => match needle {
                Value::String(needle) => Ok(Value::Boolean(text.contains(needle.as_str()))),
                other => Err(cast_error(other, "System.String")),
            },
            (Value::List(items), "Add", [item]) => {
                items.borrow_mut().push(item.clone());
                Ok(Value::Null)
            }
            (Value::List(items), "Contains", [item]) => Ok(Value::Boolean(
                items.borrow().iter().any(|candidate| value::values_equal(candidate, item)),
            )),
            _ => Err(Fault::new(
                MISSING_METHOD,
                format!(
                    "Method '{}.{}' with {} argument(s) not found.",
                    object.type_name(),
                    name,
                    arguments.len()
                ),
            )),
        };
        result.map_err(|fault| self.raise(fault))
    }

    fn iterate(&self, items: Value) -> Exec<Vec<Value>> {
        match items {
            Value::List(items) => {
                let snapshot = items.borrow().clone();
                Ok(snapshot)
            }
            Value::String(text) => Ok(text.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Null => Err(self.raise(Fault::null_reference())),
            other => Err(self.raise(Fault::new(
                INVALID_CAST,
                format!(
                    "for statement cannot operate on values of type '{}'",
                    other.type_name()
                ),
            ))),
        }
    }

    fn condition(&mut self, condition: &'a Expr) -> Exec<bool> {
        let value = self.evaluate(condition)?;
        value.as_bool().map_err(|fault| self.raise(fault))
    }

    fn throw(&self, value: Value) -> Unwind {
        match value {
            Value::Exception(exception) => Unwind::Throw {
                exception,
                stack_trace: self.stack_trace(),
            },
            Value::Null => self.raise(Fault::null_reference()),
            other => self.raise(cast_error(&other, "System.Exception")),
        }
    }

    /// Turn a fault into an unwind, capturing the current call stack.
    fn raise(&self, fault: Fault) -> Unwind {
        match fault {
            Fault::Abort => Unwind::Abort,
            Fault::Raise { type_name, message } => Unwind::Throw {
                exception: Rc::new(ExceptionValue { type_name, message }),
                stack_trace: self.stack_trace(),
            },
        }
    }

    fn stack_trace(&self) -> String {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let name = self
                    .artifact
                    .functions
                    .get(frame.function)
                    .map_or("<unknown>", |function| function.name.as_str());
                format!("   at {}() in line {}", name, frame.line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn check_cancelled(&self) -> Exec<()> {
        if self.host.cancel.load(Ordering::SeqCst) {
            Err(Unwind::Abort)
        } else {
            Ok(())
        }
    }

    fn set_line(&mut self, line: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    fn load(&self, slot: usize) -> Value {
        self.frames
            .last()
            .and_then(|frame| frame.locals.get(slot))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn store(&mut self, slot: usize, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            if slot >= frame.locals.len() {
                frame.locals.resize(slot + 1, Value::Null);
            }
            frame.locals[slot] = value;
        }
    }
}

fn callable(target: &CallTarget) -> Callable {
    match target {
        CallTarget::User { index } => Callable::User(*index),
        CallTarget::Host { member } => Callable::Host(member.clone()),
    }
}

fn index_value(object: Value, index: Value) -> Result<Value, Fault> {
    let out_of_range = || Fault::new(INDEX_OUT_OF_RANGE, "Index was outside the bounds of the array.");
    match (&object, &index) {
        (Value::Null, _) => Err(Fault::null_reference()),
        (Value::List(items), Value::Integer(position)) => usize::try_from(*position)
            .ok()
            .and_then(|position| items.borrow().get(position).cloned())
            .ok_or_else(out_of_range),
        (Value::String(text), Value::Integer(position)) => usize::try_from(*position)
            .ok()
            .and_then(|position| text.chars().nth(position))
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(out_of_range),
        (Value::List(_) | Value::String(_), other) => Err(cast_error(other, "System.Int32")),
        _ => Err(Fault::new(
            INVALID_CAST,
            format!(
                "Cannot apply indexing to a value of type '{}'",
                object.type_name()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::OutputCapture;
    use crate::permissions::PermissionSet;
    use lang::{Compiler, CompilerOptions};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn compile(source: &str) -> Artifact {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ConsoleApp_test.cbx");
        let outcome = Compiler::new(CompilerOptions::default()).compile(source, &path);
        assert!(outcome.is_ready(), "{:?}", outcome.diagnostics());
        lang::read_artifact(&path).unwrap()
    }

    /// Run `main` and return the captured output or the failure type and message.
    fn run(source: &str) -> Result<String, (String, String, String)> {
        let artifact = compile(source);
        let natives = NativeTable::standard();
        let cancel = Arc::new(AtomicBool::new(false));
        let capture = OutputCapture::new(Arc::clone(&cancel));
        let permissions = PermissionSet::none();
        let host = HostContext {
            capture: &capture,
            permissions: &permissions,
            cancel: &cancel,
        };
        let mut interpreter = Interpreter::new(&artifact, &natives, host, 64);
        match interpreter.run() {
            Ok(()) => Ok(capture.read_to_end()),
            Err(Unwind::Throw {
                exception,
                stack_trace,
            }) => Err((
                exception.type_name.clone(),
                exception.message.clone(),
                stack_trace,
            )),
            Err(Unwind::Abort) => panic!("aborted"),
        }
    }

    #[test]
    fn test_control_flow_output() {
        let output = run(r#"
            function main() {
                let total = 0;
                for (n in [1, 2, 3, 4]) {
                    if (n == 2) { continue; }
                    total = total + n;
                }
                let i = 0;
                while (true) {
                    i = i + 1;
                    if (i >= 3) { break; }
                }
                System.Console.Write(total + " " + i);
            }
        "#)
        .unwrap();
        assert_eq!(output, "8 3");
    }

    #[test]
    fn test_recursion_and_return_values() {
        let output = run(r#"
            function fib(n) {
                if (n < 2) { return n; }
                return fib(n - 1) + fib(n - 2);
            }
            function main() { System.Console.WriteLine(fib(10)); }
        "#)
        .unwrap();
        assert_eq!(output, "55\n");
    }

    #[test]
    fn test_try_catch_binds_exception() {
        let output = run(r#"
            function main() {
                try {
                    let x = 1 / 0;
                    System.Console.Write(x);
                } catch (e) {
                    System.Console.Write(e.Message);
                }
            }
        "#)
        .unwrap();
        assert_eq!(output, "Attempted to divide by zero.");
    }

    #[test]
    fn test_uncaught_exception_carries_stack_trace() {
        let (type_name, message, trace) = run(
            "function fail() {\n throw new System.InvalidOperationException(\"boom\");\n}\nfunction main() {\n fail();\n}",
        )
        .unwrap_err();
        assert_eq!(type_name, "System.InvalidOperationException");
        assert_eq!(message, "boom");
        assert_eq!(trace, "   at fail() in line 2\n   at main() in line 5");
    }

    #[test]
    fn test_call_depth_limit() {
        let (type_name, _, _) = run(
            "function down(n) { return down(n + 1); } function main() { down(0); }",
        )
        .unwrap_err();
        assert_eq!(type_name, "System.InsufficientExecutionStackException");
    }

    #[test]
    fn test_dynamic_members() {
        let output = run(r#"
            function main() {
                let items = [];
                items.Add("a");
                items.Add("b");
                System.Console.Write(items.Count + ":" + "abc".Length + ":" + items[1].ToUpper());
                System.Console.Out.WriteLine("!");
            }
        "#)
        .unwrap();
        assert_eq!(output, "2:3:B!\n");
    }

    #[test]
    fn test_index_out_of_range() {
        let (type_name, _, _) = run("function main() { let xs = [1]; System.Console.Write(xs[3]); }")
            .unwrap_err();
        assert_eq!(type_name, INDEX_OUT_OF_RANGE);
    }

    #[test]
    fn test_abort_when_cancelled() {
        let artifact = compile("function main() { while (true) { } }");
        let natives = NativeTable::standard();
        let cancel = Arc::new(AtomicBool::new(true));
        let capture = OutputCapture::new(Arc::clone(&cancel));
        let permissions = PermissionSet::none();
        let host = HostContext {
            capture: &capture,
            permissions: &permissions,
            cancel: &cancel,
        };
        let result = Interpreter::new(&artifact, &natives, host, 64).run();
        assert!(matches!(result, Err(Unwind::Abort)));
    }
}
