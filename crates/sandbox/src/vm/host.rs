//! Native host members
//!
//! Every member the sandbox reference set exposes has a native here under the
//! same qualified name. Members that touch host resources demand a permission
//! first; the real console surface is never implemented.

use super::value::{cast_error, Value};
use super::{Fault, ARGUMENT_NULL, ARGUMENT_OUT_OF_RANGE, FORMAT, OVERFLOW};
use crate::capture::{OutputCapture, PARK_SLICE};
use crate::permissions::{Permission, PermissionSet};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub(crate) type NativeFn = fn(&HostContext<'_>, Vec<Value>) -> Result<Value, Fault>;

/// What a native may touch: the domain's capture, permissions and
/// cancellation flag.
pub(crate) struct HostContext<'a> {
    pub capture: &'a OutputCapture,
    pub permissions: &'a PermissionSet,
    pub cancel: &'a AtomicBool,
}

pub(crate) struct NativeTable {
    natives: HashMap<String, NativeFn>,
}

const CAPTURE_CONSOLE: &str = "Sandbox.Capture.Console";

impl NativeTable {
    pub fn standard() -> Self {
        let mut natives: HashMap<String, NativeFn> = HashMap::new();
        let mut register = |type_name: &str, member: &str, native: NativeFn| {
            natives.insert(format!("{}.{}", type_name, member), native);
        };

        register(CAPTURE_CONSOLE, "Write", console_write as NativeFn);
        register(CAPTURE_CONSOLE, "WriteLine", console_write_line as NativeFn);
        register(CAPTURE_CONSOLE, "Read", console_read as NativeFn);
        register(CAPTURE_CONSOLE, "ReadKey", console_read_key as NativeFn);
        register(CAPTURE_CONSOLE, "ReadLine", console_read_line as NativeFn);
        register(CAPTURE_CONSOLE, "Out", console_out as NativeFn);
        register(CAPTURE_CONSOLE, "In", console_in as NativeFn);
        register(CAPTURE_CONSOLE, "Clear", console_clear as NativeFn);

        for member in ["SetOut", "SetIn", "SetError", "Beep", "ResetColor"] {
            register("System.Console", member, real_console as NativeFn);
        }

        register("System.Math", "Abs", math_abs as NativeFn);
        register("System.Math", "Max", math_max as NativeFn);
        register("System.Math", "Min", math_min as NativeFn);
        register("System.Math", "Pow", math_pow as NativeFn);
        register("System.Math", "Sqrt", math_sqrt as NativeFn);
        register("System.Math", "Floor", math_floor as NativeFn);
        register("System.Math", "PI", math_pi as NativeFn);

        register("System.String", "Format", string_format as NativeFn);
        register("System.String", "Join", string_join as NativeFn);
        register("System.String", "Concat", string_concat as NativeFn);
        register("System.String", "IsNullOrEmpty", string_is_null_or_empty as NativeFn);

        register("System.Threading.Thread", "Sleep", thread_sleep as NativeFn);

        register("System.IO.File", "ReadAllText", file_read_all_text as NativeFn);
        register("System.IO.File", "WriteAllText", file_write_all_text as NativeFn);
        register("System.IO.File", "Exists", file_exists as NativeFn);

        register("System.Net.Dns", "GetHostAddresses", dns_get_host_addresses as NativeFn);

        register("System.Environment", "NewLine", environment_new_line as NativeFn);
        register("System.Environment", "MachineName", environment_machine_name as NativeFn);
        register(
            "System.Environment",
            "GetEnvironmentVariable",
            environment_get_variable as NativeFn,
        );

        Self { natives }
    }

    pub fn get(&self, qualified_name: &str) -> Option<NativeFn> {
        self.natives.get(qualified_name).copied()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.natives.contains_key(qualified_name)
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn string_arg(args: &[Value], index: usize, parameter: &str) -> Result<String, Fault> {
    match arg(args, index) {
        Value::String(value) => Ok(value.clone()),
        Value::Null => Err(Fault::new(
            ARGUMENT_NULL,
            format!("Value cannot be null. (Parameter '{}')", parameter),
        )),
        other => Err(cast_error(other, "System.String")),
    }
}

/// Composite formatting: `{n}` items, `{{` and `}}` escapes.
pub(crate) fn format(template: &str, args: &[Value]) -> Result<String, Fault> {
    let invalid = || Fault::new(FORMAT, "Input string was not in a correct format.");
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '{' => {
                let mut item = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    item.push(c);
                }
                if !closed {
                    return Err(invalid());
                }
                let index: usize = item.parse().map_err(|_| invalid())?;
                let value = args.get(index).ok_or_else(|| {
                    Fault::new(
                        FORMAT,
                        "Index (zero based) must be greater than or equal to zero and less than the size of the argument list.",
                    )
                })?;
                output.push_str(&value.render());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '}' => return Err(invalid()),
            other => output.push(other),
        }
    }
    Ok(output)
}

/// Text of a `Write`-style call: a lone value is rendered, more than one
/// argument formats the first with the rest.
fn compose(args: &[Value]) -> Result<String, Fault> {
    match args {
        [] => Ok(String::new()),
        [value] => Ok(value.render()),
        [template, rest @ ..] => format(&template.render(), rest),
    }
}

/// Shared by the console natives and the `Console.Out` writer.
pub(crate) fn write(host: &HostContext<'_>, args: &[Value], line: bool) -> Result<Value, Fault> {
    let mut text = compose(args)?;
    if line {
        text.push('\n');
    }
    host.capture.write(&text);
    Ok(Value::Null)
}

fn console_write(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    write(host, &args, false)
}

fn console_write_line(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    write(host, &args, true)
}

fn console_read(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Integer(host.capture.block_read()?))
}

fn console_read_key(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    match args.first() {
        None => {
            host.capture.block_read()?;
            Ok(Value::Null)
        }
        Some(intercept) => {
            host.capture.request_key(intercept.as_bool()?)?;
            Ok(Value::Null)
        }
    }
}

fn console_read_line(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::String(host.capture.block_read_line()?))
}

fn console_out(_host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Writer)
}

fn console_in(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    host.capture.request_input()?;
    Ok(Value::Null)
}

fn console_clear(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    host.capture.clear();
    Ok(Value::Null)
}

fn real_console(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    host.permissions.demand(Permission::Console)?;
    Ok(Value::Null)
}

fn math_abs(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    match arg(&args, 0) {
        Value::Integer(value) => value.checked_abs().map(Value::Integer).ok_or_else(|| {
            Fault::new(
                OVERFLOW,
                "Negating the minimum value of a twos complement number is invalid.",
            )
        }),
        other => Ok(Value::Float(other.as_f64()?.abs())),
    }
}

fn math_max(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    match (arg(&args, 0), arg(&args, 1)) {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(*l.max(r))),
        (l, r) => Ok(Value::Float(l.as_f64()?.max(r.as_f64()?))),
    }
}

fn math_min(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    match (arg(&args, 0), arg(&args, 1)) {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(*l.min(r))),
        (l, r) => Ok(Value::Float(l.as_f64()?.min(r.as_f64()?))),
    }
}

fn math_pow(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Float(arg(&args, 0).as_f64()?.powf(arg(&args, 1).as_f64()?)))
}

fn math_sqrt(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Float(arg(&args, 0).as_f64()?.sqrt()))
}

fn math_floor(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Float(arg(&args, 0).as_f64()?.floor()))
}

fn math_pi(_host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Float(std::f64::consts::PI))
}

fn string_format(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let template = string_arg(&args, 0, "format")?;
    Ok(Value::String(format(&template, &args[1..])?))
}

fn string_join(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let separator = match arg(&args, 0) {
        Value::Null => String::new(),
        other => other.render(),
    };
    match arg(&args, 1) {
        Value::List(items) => {
            let parts: Vec<String> = items.borrow().iter().map(Value::render).collect();
            Ok(Value::String(parts.join(&separator)))
        }
        Value::Null => Err(Fault::new(
            ARGUMENT_NULL,
            "Value cannot be null. (Parameter 'values')",
        )),
        other => Err(cast_error(other, "System.Collections.IEnumerable")),
    }
}

fn string_concat(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::String(args.iter().map(Value::render).collect()))
}

fn string_is_null_or_empty(_host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::Boolean(match arg(&args, 0) {
        Value::Null => true,
        Value::String(value) => value.is_empty(),
        _ => false,
    }))
}

/// Sleeps in short slices so a torn-down domain ends the wait.
fn thread_sleep(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let milliseconds = arg(&args, 0).as_i64()?;
    let mut remaining = match milliseconds {
        -1 => None,
        ms if ms < 0 => {
            return Err(Fault::new(
                ARGUMENT_OUT_OF_RANGE,
                "Number must be either non-negative and less than or equal to Int32.MaxValue or -1. (Parameter 'millisecondsTimeout')",
            ))
        }
        ms => Some(Duration::from_millis(ms as u64)),
    };

    loop {
        if host.cancel.load(Ordering::SeqCst) {
            return Err(Fault::Abort);
        }
        let slice = match remaining {
            Some(left) if left.is_zero() => return Ok(Value::Null),
            Some(left) => left.min(PARK_SLICE),
            None => PARK_SLICE,
        };
        std::thread::sleep(slice);
        remaining = remaining.map(|left| left.saturating_sub(slice));
    }
}

fn file_read_all_text(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let path = string_arg(&args, 0, "path")?;
    host.permissions.demand(Permission::FileRead(Path::new(&path)))?;
    std::fs::read_to_string(&path)
        .map(Value::String)
        .map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => Fault::new(
                "System.IO.FileNotFoundException",
                format!("Could not find file '{}'.", path),
            ),
            _ => Fault::new("System.IO.IOException", error.to_string()),
        })
}

fn file_write_all_text(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let path = string_arg(&args, 0, "path")?;
    host.permissions.demand(Permission::FileWrite(Path::new(&path)))?;
    let contents = arg(&args, 1).render();
    std::fs::write(&path, contents)
        .map(|_| Value::Null)
        .map_err(|error| Fault::new("System.IO.IOException", error.to_string()))
}

/// Like the host library, reports `false` rather than failing when the
/// caller may not read the path.
fn file_exists(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let Value::String(path) = arg(&args, 0) else {
        return Ok(Value::Boolean(false));
    };
    let path = Path::new(path);
    Ok(Value::Boolean(
        host.permissions.allows(Permission::FileRead(path)) && path.exists(),
    ))
}

fn dns_get_host_addresses(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let name = string_arg(&args, 0, "hostNameOrAddress")?;
    host.permissions.demand(Permission::Network(&name))?;
    // Not reachable with the permission sets domains are given.
    Ok(Value::list(Vec::new()))
}

fn environment_new_line(_host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    Ok(Value::String("\n".to_string()))
}

fn environment_machine_name(host: &HostContext<'_>, _args: Vec<Value>) -> Result<Value, Fault> {
    host.permissions.demand(Permission::Environment("COMPUTERNAME"))?;
    Ok(Value::Null)
}

fn environment_get_variable(host: &HostContext<'_>, args: Vec<Value>) -> Result<Value, Fault> {
    let name = string_arg(&args, 0, "variable")?;
    host.permissions.demand(Permission::Environment(&name))?;
    Ok(std::env::var(&name).map(Value::String).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::SECURITY_EXCEPTION;
    use lang::library::ReferenceSet;
    use std::sync::Arc;

    struct Harness {
        capture: OutputCapture,
        permissions: PermissionSet,
        cancel: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            let cancel = Arc::new(AtomicBool::new(false));
            Self {
                capture: OutputCapture::new(Arc::clone(&cancel)),
                permissions: PermissionSet::sandbox([std::env::temp_dir()]),
                cancel,
            }
        }

        fn context(&self) -> HostContext<'_> {
            HostContext {
                capture: &self.capture,
                permissions: &self.permissions,
                cancel: &self.cancel,
            }
        }

        fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
            let native = NativeTable::standard().get(name).unwrap();
            native(&self.context(), args)
        }
    }

    fn raised_type(result: Result<Value, Fault>) -> String {
        match result {
            Err(Fault::Raise { type_name, .. }) => type_name,
            other => panic!("expected a raised fault, got {:?}", other),
        }
    }

    #[test]
    fn test_every_sandbox_member_has_a_native() {
        let table = NativeTable::standard();
        let set = ReferenceSet::sandbox();
        for namespace in ["System", "System.IO", "System.Net", "System.Threading", "Sandbox.Capture"] {
            for ty in set.types_in(namespace) {
                for member in &ty.members {
                    let name = format!("{}.{}", ty.full_name(), member.name);
                    assert!(table.contains(&name), "no native for {}", name);
                }
            }
        }
    }

    #[test]
    fn test_real_console_members_are_absent_for_captured_names() {
        let table = NativeTable::standard();
        assert!(!table.contains("System.Console.WriteLine"));
        assert!(!table.contains("System.Console.ReadKey"));
    }

    #[test]
    fn test_format() {
        let args = [Value::Integer(1), Value::String("x".into())];
        assert_eq!(format("{0} and {1} {{0}}", &args).unwrap(), "1 and x {0}");
        assert!(format("{2}", &args).is_err());
        assert!(format("{0", &args).is_err());
        assert!(format("}", &args).is_err());
        assert!(format("{a}", &args).is_err());
    }

    #[test]
    fn test_write_line_formats_into_capture() {
        let harness = Harness::new();
        harness
            .call(
                "Sandbox.Capture.Console.WriteLine",
                vec![Value::String("{0}+{1}".into()), Value::Integer(1), Value::Integer(2)],
            )
            .unwrap();
        harness
            .call("Sandbox.Capture.Console.Write", vec![Value::Boolean(true)])
            .unwrap();
        assert_eq!(harness.capture.read_to_end(), "1+2\nTrue");
    }

    #[test]
    fn test_denials_raise_security_exception() {
        let harness = Harness::new();
        assert_eq!(
            raised_type(harness.call("System.Console.SetOut", vec![Value::Null])),
            SECURITY_EXCEPTION
        );
        assert_eq!(
            raised_type(harness.call("Sandbox.Capture.Console.ReadKey", vec![Value::Boolean(true)])),
            SECURITY_EXCEPTION
        );
        assert_eq!(
            raised_type(harness.call("Sandbox.Capture.Console.In", vec![])),
            SECURITY_EXCEPTION
        );
        assert_eq!(
            raised_type(harness.call("System.Net.Dns.GetHostAddresses", vec![Value::String("example.com".into())])),
            SECURITY_EXCEPTION
        );
        assert_eq!(
            raised_type(harness.call("System.IO.File.ReadAllText", vec![Value::String("/etc/hostname".into())])),
            SECURITY_EXCEPTION
        );
        assert_eq!(
            raised_type(harness.call("System.Environment.GetEnvironmentVariable", vec![Value::String("PATH".into())])),
            SECURITY_EXCEPTION
        );
    }

    #[test]
    fn test_file_read_inside_allow_list() {
        let harness = Harness::new();
        let file = tempfile::NamedTempFile::new_in(std::env::temp_dir()).unwrap();
        std::fs::write(file.path(), "data").unwrap();
        let path = Value::String(file.path().to_string_lossy().into_owned());

        let contents = harness
            .call("System.IO.File.ReadAllText", vec![path.clone()])
            .unwrap();
        assert_eq!(contents.render(), "data");
        let exists = harness.call("System.IO.File.Exists", vec![path.clone()]).unwrap();
        assert!(exists.as_bool().unwrap());
        assert_eq!(
            raised_type(harness.call("System.IO.File.WriteAllText", vec![path, Value::Null])),
            SECURITY_EXCEPTION
        );
    }

    #[test]
    fn test_sleep_stops_when_cancelled() {
        let harness = Harness::new();
        harness.cancel.store(true, Ordering::SeqCst);
        let result = harness.call("System.Threading.Thread.Sleep", vec![Value::Integer(10_000)]);
        assert_eq!(result.unwrap_err(), Fault::Abort);
    }

    #[test]
    fn test_math() {
        let harness = Harness::new();
        let max = harness
            .call("System.Math.Max", vec![Value::Integer(3), Value::Integer(7)])
            .unwrap();
        assert_eq!(max.render(), "7");
        let sqrt = harness.call("System.Math.Sqrt", vec![Value::Integer(16)]).unwrap();
        assert_eq!(sqrt.render(), "4");
    }
}
