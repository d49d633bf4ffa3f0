//! Runtime values and operators

use super::{Fault, DIVIDE_BY_ZERO, INVALID_CAST, INVALID_OPERATION, OVERFLOW};
use lang::ir::{BinaryOp, Constant, HostMemberRef, UnaryOp};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Something that can be invoked through a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Callable {
    User(usize),
    Host(HostMemberRef),
    /// `Write`/`WriteLine` of the console output writer
    Writer { line: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExceptionValue {
    pub type_name: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Callable),
    Exception(Rc<ExceptionValue>),
    /// The capture's output writer (`Console.Out`)
    Writer,
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Null => Value::Null,
            Constant::Boolean(value) => Value::Boolean(*value),
            Constant::Integer(value) => Value::Integer(*value),
            Constant::Float(value) => Value::Float(*value),
            Constant::String(value) => Value::String(value.clone()),
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(_) => "System.Boolean".to_string(),
            Value::Integer(_) => "System.Int64".to_string(),
            Value::Float(_) => "System.Double".to_string(),
            Value::String(_) => "System.String".to_string(),
            Value::List(_) => "System.Collections.Generic.List".to_string(),
            Value::Function(_) => "System.Delegate".to_string(),
            Value::Exception(exception) => exception.type_name.clone(),
            Value::Writer => "System.IO.TextWriter".to_string(),
        }
    }

    /// Console text for the value.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(true) => "True".to_string(),
            Value::Boolean(false) => "False".to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => render_float(*value),
            Value::String(value) => value.clone(),
            Value::List(items) => {
                let items: Vec<String> = items.borrow().iter().map(Value::render).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Function(Callable::User(index)) => format!("Function#{}", index),
            Value::Function(Callable::Host(member)) => member.qualified_name(),
            Value::Function(Callable::Writer { line: true }) => "TextWriter.WriteLine".to_string(),
            Value::Function(Callable::Writer { line: false }) => "TextWriter.Write".to_string(),
            Value::Exception(exception) => {
                format!("{}: {}", exception.type_name, exception.message)
            }
            Value::Writer => "System.IO.TextWriter".to_string(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Fault> {
        match self {
            Value::Boolean(value) => Ok(*value),
            other => Err(cast_error(other, "System.Boolean")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, Fault> {
        match self {
            Value::Integer(value) => Ok(*value as f64),
            Value::Float(value) => Ok(*value),
            other => Err(cast_error(other, "System.Double")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, Fault> {
        match self {
            Value::Integer(value) => Ok(*value),
            Value::Float(value) if value.fract() == 0.0 => Ok(*value as i64),
            other => Err(cast_error(other, "System.Int64")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "∞" } else { "-∞" }.to_string()
    } else {
        value.to_string()
    }
}

pub(crate) fn cast_error(value: &Value, target: &str) -> Fault {
    Fault::new(
        INVALID_CAST,
        format!(
            "Unable to cast object of type '{}' to type '{}'.",
            value.type_name(),
            target
        ),
    )
}

pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            matches!((left.as_f64(), right.as_f64()), (Ok(l), Ok(r)) if l == r)
        }
        (Value::String(l), Value::String(r)) => l == r,
        (Value::List(l), Value::List(r)) => Rc::ptr_eq(l, r),
        (Value::Exception(l), Value::Exception(r)) => Rc::ptr_eq(l, r),
        (Value::Function(l), Value::Function(r)) => l == r,
        (Value::Writer, Value::Writer) => true,
        _ => false,
    }
}

fn operator_symbol(operator: BinaryOp) -> &'static str {
    match operator {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::LessThan => "<",
        BinaryOp::LessThanOrEqual => "<=",
        BinaryOp::GreaterThan => ">",
        BinaryOp::GreaterThanOrEqual => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

fn operand_error(operator: BinaryOp, left: &Value, right: &Value) -> Fault {
    Fault::new(
        INVALID_OPERATION,
        format!(
            "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
            operator_symbol(operator),
            left.type_name(),
            right.type_name()
        ),
    )
}

fn overflow() -> Fault {
    Fault::new(OVERFLOW, "Arithmetic operation resulted in an overflow.")
}

fn divide_by_zero() -> Fault {
    Fault::new(DIVIDE_BY_ZERO, "Attempted to divide by zero.")
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::Float(_))
}

/// Apply a non short-circuiting binary operator.
pub(crate) fn binary(operator: BinaryOp, left: Value, right: Value) -> Result<Value, Fault> {
    use Value::{Float, Integer};

    let checked = |result: Option<i64>| result.map(Integer).ok_or_else(overflow);
    let floats = |f: fn(f64, f64) -> f64| -> Result<Value, Fault> {
        if is_number(&left) && is_number(&right) {
            Ok(Float(f(left.as_f64()?, right.as_f64()?)))
        } else {
            Err(operand_error(operator, &left, &right))
        }
    };

    match operator {
        BinaryOp::Add => match (&left, &right) {
            (Integer(l), Integer(r)) => checked(l.checked_add(*r)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left.render(), right.render())))
            }
            _ => floats(|l, r| l + r),
        },
        BinaryOp::Subtract => match (&left, &right) {
            (Integer(l), Integer(r)) => checked(l.checked_sub(*r)),
            _ => floats(|l, r| l - r),
        },
        BinaryOp::Multiply => match (&left, &right) {
            (Integer(l), Integer(r)) => checked(l.checked_mul(*r)),
            _ => floats(|l, r| l * r),
        },
        BinaryOp::Divide => match (&left, &right) {
            (Integer(_), Integer(0)) => Err(divide_by_zero()),
            (Integer(l), Integer(r)) => checked(l.checked_div(*r)),
            _ => floats(|l, r| l / r),
        },
        BinaryOp::Modulo => match (&left, &right) {
            (Integer(_), Integer(0)) => Err(divide_by_zero()),
            (Integer(l), Integer(r)) => checked(l.checked_rem(*r)),
            _ => floats(|l, r| l % r),
        },
        BinaryOp::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
        BinaryOp::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let ordering = compare(operator, &left, &right)?;
            let result = match (operator, ordering) {
                (_, None) => false,
                (BinaryOp::LessThan, Some(ordering)) => ordering == Ordering::Less,
                (BinaryOp::LessThanOrEqual, Some(ordering)) => ordering != Ordering::Greater,
                (BinaryOp::GreaterThan, Some(ordering)) => ordering == Ordering::Greater,
                (_, Some(ordering)) => ordering != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        BinaryOp::And | BinaryOp::Or => match (&left, &right) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(if operator == BinaryOp::And {
                *l && *r
            } else {
                *l || *r
            })),
            _ => Err(operand_error(operator, &left, &right)),
        },
    }
}

/// `None` when the operands are unordered (NaN).
fn compare(operator: BinaryOp, left: &Value, right: &Value) -> Result<Option<Ordering>, Fault> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Ok(Some(l.cmp(r))),
        (Value::String(l), Value::String(r)) => Ok(Some(l.cmp(r))),
        _ if is_number(left) && is_number(right) => {
            Ok(left.as_f64()?.partial_cmp(&right.as_f64()?))
        }
        _ => Err(operand_error(operator, left, right)),
    }
}

pub(crate) fn unary(operator: UnaryOp, operand: Value) -> Result<Value, Fault> {
    match (operator, &operand) {
        (UnaryOp::Not, Value::Boolean(value)) => Ok(Value::Boolean(!value)),
        (UnaryOp::Negate, Value::Integer(value)) => {
            value.checked_neg().map(Value::Integer).ok_or_else(overflow)
        }
        (UnaryOp::Negate, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOp::Not, _) => Err(Fault::new(
            INVALID_OPERATION,
            format!("Operator '!' cannot be applied to operand of type '{}'", operand.type_name()),
        )),
        (UnaryOp::Negate, _) => Err(Fault::new(
            INVALID_OPERATION,
            format!("Operator '-' cannot be applied to operand of type '{}'", operand.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raised_type(fault: Fault) -> String {
        match fault {
            Fault::Raise { type_name, .. } => type_name,
            Fault::Abort => panic!("unexpected abort"),
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(Value::Boolean(true).render(), "True");
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::Float(2.0).render(), "2");
        assert_eq!(Value::Float(1.5).render(), "1.5");
        assert_eq!(
            Value::list(vec![Value::Integer(1), Value::String("a".into())]).render(),
            "[1, a]"
        );
    }

    #[test]
    fn test_string_concatenation_renders_operands() {
        let result = binary(BinaryOp::Add, Value::String("n=".into()), Value::Integer(3)).unwrap();
        assert_eq!(result.render(), "n=3");
        let result = binary(BinaryOp::Add, Value::Boolean(false), Value::String("!".into())).unwrap();
        assert_eq!(result.render(), "False!");
    }

    #[test]
    fn test_integer_faults() {
        let fault = binary(BinaryOp::Divide, Value::Integer(1), Value::Integer(0)).unwrap_err();
        assert_eq!(raised_type(fault), DIVIDE_BY_ZERO);
        let fault = binary(BinaryOp::Add, Value::Integer(i64::MAX), Value::Integer(1)).unwrap_err();
        assert_eq!(raised_type(fault), OVERFLOW);
        let fault = unary(UnaryOp::Negate, Value::Integer(i64::MIN)).unwrap_err();
        assert_eq!(raised_type(fault), OVERFLOW);
    }

    #[test]
    fn test_mixed_numeric_arithmetic_and_comparison() {
        let result = binary(BinaryOp::Multiply, Value::Integer(2), Value::Float(1.25)).unwrap();
        assert!(values_equal(&result, &Value::Float(2.5)));
        let result = binary(BinaryOp::LessThan, Value::Integer(2), Value::Float(2.5)).unwrap();
        assert!(result.as_bool().unwrap());
        let result = binary(BinaryOp::Equal, Value::Integer(2), Value::Float(2.0)).unwrap();
        assert!(result.as_bool().unwrap());
    }

    #[test]
    fn test_invalid_operands() {
        let fault = binary(BinaryOp::Subtract, Value::String("a".into()), Value::Integer(1)).unwrap_err();
        assert_eq!(raised_type(fault), INVALID_OPERATION);
        let fault = Value::Integer(1).as_bool().unwrap_err();
        assert_eq!(raised_type(fault), INVALID_CAST);
    }
}
