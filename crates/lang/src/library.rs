//! Host library metadata
//!
//! A [`ReferenceSet`] is the compile-time view of the host library: a tree of
//! namespaces holding types with static methods and properties. The runtime
//! provides the matching native implementations under the same qualified names.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const SYSTEM_NAMESPACE: &str = "System";
pub const CONSOLE_TYPE: &str = "Console";
pub const CAPTURE_NAMESPACE: &str = "Sandbox.Capture";

/// Console members that are retargeted onto the capture surface.
pub const CAPTURED_CONSOLE_MEMBERS: [&str; 8] = [
    "WriteLine", "Write", "Read", "ReadKey", "ReadLine", "Out", "In", "Clear",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Method,
    Property,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: &'static str,
    pub kind: MemberKind,
    pub min_arity: usize,
    /// `None` for `params` style members.
    pub max_arity: Option<usize>,
    pub signature: &'static str,
    pub documentation: &'static str,
}

impl MemberInfo {
    const fn method(
        name: &'static str,
        min_arity: usize,
        max_arity: Option<usize>,
        signature: &'static str,
        documentation: &'static str,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Method,
            min_arity,
            max_arity,
            signature,
            documentation,
        }
    }

    const fn property(name: &'static str, signature: &'static str, documentation: &'static str) -> Self {
        Self {
            name,
            kind: MemberKind::Property,
            min_arity: 0,
            max_arity: Some(0),
            signature,
            documentation,
        }
    }

    pub fn accepts(&self, arguments: usize) -> bool {
        arguments >= self.min_arity && self.max_arity.map_or(true, |max| arguments <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Static-only type exposing members
    Static,
    /// Exception type constructible with `new`
    Exception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub members: Vec<MemberInfo>,
    pub documentation: &'static str,
}

impl TypeInfo {
    fn new(namespace: &str, name: &str, documentation: &'static str, members: &[MemberInfo]) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: TypeKind::Static,
            members: members.to_vec(),
            documentation,
        }
    }

    fn exception(namespace: &str, name: &str, documentation: &'static str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: TypeKind::Exception,
            members: Vec::new(),
            documentation,
        }
    }

    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Arity range accepted by `new` for exception types.
    pub fn constructor_accepts(&self, arguments: usize) -> bool {
        self.kind == TypeKind::Exception && arguments <= 2
    }
}

/// `namespace.name`, or just `name` in the global namespace.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Namespaces and types visible to the binder.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    types: BTreeMap<String, TypeInfo>,
    namespaces: BTreeSet<String>,
}

impl ReferenceSet {
    fn from_types(types: Vec<TypeInfo>) -> Self {
        let mut set = Self::default();
        for ty in types {
            set.insert(ty);
        }
        set
    }

    fn insert(&mut self, ty: TypeInfo) {
        let mut prefix = String::new();
        for segment in ty.namespace.split('.').filter(|s| !s.is_empty()) {
            prefix = qualify(&prefix, segment);
            self.namespaces.insert(prefix.clone());
        }
        self.types.insert(ty.full_name(), ty);
    }

    /// Everything user code may see before rewriting, with the full console surface.
    pub fn analysis() -> Self {
        let mut types = host_library();
        types.push(TypeInfo::new(
            SYSTEM_NAMESPACE,
            CONSOLE_TYPE,
            "Represents the standard input, output, and error streams for console applications.",
            CONSOLE_MEMBERS,
        ));
        types.push(capture_console());
        Self::from_types(types)
    }

    /// The set used after rewriting: `System.Console` keeps only members
    /// that are never retargeted.
    pub fn sandbox() -> Self {
        let mut types = host_library();
        let remaining: Vec<MemberInfo> = CONSOLE_MEMBERS
            .iter()
            .filter(|member| !CAPTURED_CONSOLE_MEMBERS.contains(&member.name))
            .copied()
            .collect();
        types.push(TypeInfo::new(
            SYSTEM_NAMESPACE,
            CONSOLE_TYPE,
            "Represents the standard input, output, and error streams for console applications.",
            &remaining,
        ));
        types.push(capture_console());
        Self::from_types(types)
    }

    /// Analysis set without the capture namespace, for editor completion.
    pub fn completion() -> Self {
        let types = Self::analysis()
            .types
            .into_values()
            .filter(|ty| !ty.namespace.starts_with(CAPTURE_NAMESPACE))
            .collect();
        Self::from_types(types)
    }

    pub fn is_namespace(&self, path: &str) -> bool {
        self.namespaces.contains(path)
    }

    pub fn lookup_type(&self, namespace: &str, name: &str) -> Option<&TypeInfo> {
        self.types.get(&qualify(namespace, name))
    }

    pub fn lookup_full_name(&self, full_name: &str) -> Option<&TypeInfo> {
        self.types.get(full_name)
    }

    pub fn types_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a TypeInfo> + 'a {
        self.types.values().filter(move |ty| ty.namespace == namespace)
    }

    /// Simple names of the namespaces directly below `namespace` ("" for the root).
    pub fn child_namespaces(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .iter()
            .filter_map(|candidate| {
                let rest = if namespace.is_empty() {
                    candidate.as_str()
                } else {
                    candidate.strip_prefix(namespace)?.strip_prefix('.')?
                };
                (!rest.contains('.')).then(|| rest.to_string())
            })
            .collect()
    }
}

const CONSOLE_MEMBERS: &[MemberInfo] = &[
    MemberInfo::method(
        "Write",
        1,
        None,
        "void Console.Write(string format, params object[] arg)",
        "Writes the text representation of the specified value to the standard output stream.",
    ),
    MemberInfo::method(
        "WriteLine",
        0,
        None,
        "void Console.WriteLine(string format, params object[] arg)",
        "Writes the specified data, followed by the current line terminator, to the standard output stream.",
    ),
    MemberInfo::method(
        "Read",
        0,
        Some(0),
        "int Console.Read()",
        "Reads the next character from the standard input stream.",
    ),
    MemberInfo::method(
        "ReadKey",
        0,
        Some(1),
        "ConsoleKeyInfo Console.ReadKey(bool intercept)",
        "Obtains the next character or function key pressed by the user.",
    ),
    MemberInfo::method(
        "ReadLine",
        0,
        Some(0),
        "string Console.ReadLine()",
        "Reads the next line of characters from the standard input stream.",
    ),
    MemberInfo::property(
        "Out",
        "TextWriter Console.Out",
        "Gets the standard output stream.",
    ),
    MemberInfo::property(
        "In",
        "TextReader Console.In",
        "Gets the standard input stream.",
    ),
    MemberInfo::method(
        "Clear",
        0,
        Some(0),
        "void Console.Clear()",
        "Clears the console buffer and corresponding console window of display information.",
    ),
    MemberInfo::method(
        "SetOut",
        1,
        Some(1),
        "void Console.SetOut(TextWriter newOut)",
        "Sets the Out property to target the TextWriter object.",
    ),
    MemberInfo::method(
        "SetIn",
        1,
        Some(1),
        "void Console.SetIn(TextReader newIn)",
        "Sets the In property to the specified TextReader object.",
    ),
    MemberInfo::method(
        "SetError",
        1,
        Some(1),
        "void Console.SetError(TextWriter newError)",
        "Sets the Error property to the specified TextWriter object.",
    ),
    MemberInfo::method(
        "Beep",
        0,
        Some(2),
        "void Console.Beep(int frequency, int duration)",
        "Plays the sound of a beep through the console speaker.",
    ),
    MemberInfo::method(
        "ResetColor",
        0,
        Some(0),
        "void Console.ResetColor()",
        "Sets the foreground and background console colors to their defaults.",
    ),
];

fn capture_console() -> TypeInfo {
    let members: Vec<MemberInfo> = CONSOLE_MEMBERS
        .iter()
        .filter(|member| CAPTURED_CONSOLE_MEMBERS.contains(&member.name))
        .copied()
        .collect();
    TypeInfo::new(
        CAPTURE_NAMESPACE,
        CONSOLE_TYPE,
        "Console surface backed by the isolation domain's output capture.",
        &members,
    )
}

fn host_library() -> Vec<TypeInfo> {
    let mut types = vec![
        TypeInfo::new(
            "System",
            "Math",
            "Provides constants and static methods for common mathematical functions.",
            &[
                MemberInfo::method("Abs", 1, Some(1), "double Math.Abs(double value)", "Returns the absolute value of a number."),
                MemberInfo::method("Max", 2, Some(2), "double Math.Max(double val1, double val2)", "Returns the larger of two numbers."),
                MemberInfo::method("Min", 2, Some(2), "double Math.Min(double val1, double val2)", "Returns the smaller of two numbers."),
                MemberInfo::method("Pow", 2, Some(2), "double Math.Pow(double x, double y)", "Returns a specified number raised to the specified power."),
                MemberInfo::method("Sqrt", 1, Some(1), "double Math.Sqrt(double d)", "Returns the square root of a specified number."),
                MemberInfo::method("Floor", 1, Some(1), "double Math.Floor(double d)", "Returns the largest integral value less than or equal to the specified number."),
                MemberInfo::property("PI", "double Math.PI", "Represents the ratio of the circumference of a circle to its diameter."),
            ],
        ),
        TypeInfo::new(
            "System",
            "String",
            "Represents text as a sequence of characters.",
            &[
                MemberInfo::method("Format", 1, None, "string String.Format(string format, params object[] args)", "Replaces the format items in a string with the string representation of the arguments."),
                MemberInfo::method("Join", 2, Some(2), "string String.Join(string separator, IEnumerable values)", "Concatenates the elements of a collection, using the specified separator between each element."),
                MemberInfo::method("Concat", 0, None, "string String.Concat(params object[] args)", "Concatenates the string representations of the arguments."),
                MemberInfo::method("IsNullOrEmpty", 1, Some(1), "bool String.IsNullOrEmpty(string value)", "Indicates whether the specified string is null or an empty string."),
            ],
        ),
        TypeInfo::new(
            "System.Threading",
            "Thread",
            "Creates and controls a thread.",
            &[MemberInfo::method("Sleep", 1, Some(1), "void Thread.Sleep(int millisecondsTimeout)", "Suspends the current thread for the specified number of milliseconds.")],
        ),
        TypeInfo::new(
            "System.IO",
            "File",
            "Provides static methods for reading and writing files.",
            &[
                MemberInfo::method("ReadAllText", 1, Some(1), "string File.ReadAllText(string path)", "Opens a text file, reads all the text in the file, and then closes the file."),
                MemberInfo::method("WriteAllText", 2, Some(2), "void File.WriteAllText(string path, string contents)", "Creates a new file, writes the specified string to the file, and then closes the file."),
                MemberInfo::method("Exists", 1, Some(1), "bool File.Exists(string path)", "Determines whether the specified file exists."),
            ],
        ),
        TypeInfo::new(
            "System.Net",
            "Dns",
            "Provides simple domain name resolution functionality.",
            &[MemberInfo::method("GetHostAddresses", 1, Some(1), "IPAddress[] Dns.GetHostAddresses(string hostNameOrAddress)", "Returns the Internet Protocol addresses for the specified host.")],
        ),
        TypeInfo::new(
            "System",
            "Environment",
            "Provides information about the current environment and platform.",
            &[
                MemberInfo::property("NewLine", "string Environment.NewLine", "Gets the newline string defined for this environment."),
                MemberInfo::property("MachineName", "string Environment.MachineName", "Gets the NetBIOS name of this local computer."),
                MemberInfo::method("GetEnvironmentVariable", 1, Some(1), "string Environment.GetEnvironmentVariable(string variable)", "Retrieves the value of an environment variable from the current process."),
            ],
        ),
    ];

    for (namespace, name, documentation) in EXCEPTION_TYPES {
        types.push(TypeInfo::exception(namespace, name, documentation));
    }
    types
}

/// Exception types known to both the binder and the runtime.
pub const EXCEPTION_TYPES: &[(&str, &str, &str)] = &[
    ("System", "Exception", "Represents errors that occur during application execution."),
    ("System", "InvalidOperationException", "The exception that is thrown when a method call is invalid for the object's current state."),
    ("System", "ArgumentException", "The exception that is thrown when one of the arguments provided to a method is not valid."),
    ("System", "ArgumentNullException", "The exception that is thrown when a null reference is passed to a method that does not accept it."),
    ("System", "ArgumentOutOfRangeException", "The exception that is thrown when an argument is outside the allowable range of values."),
    ("System", "NotImplementedException", "The exception that is thrown when a requested method or operation is not implemented."),
    ("System", "NotSupportedException", "The exception that is thrown when an invoked method is not supported."),
    ("System", "FormatException", "The exception that is thrown when the format of an argument is invalid."),
    ("System", "DivideByZeroException", "The exception that is thrown when there is an attempt to divide an integral value by zero."),
    ("System", "OverflowException", "The exception that is thrown when an arithmetic operation results in an overflow."),
    ("System", "IndexOutOfRangeException", "The exception that is thrown when an attempt is made to access an element outside the bounds of a list."),
    ("System", "NullReferenceException", "The exception that is thrown when there is an attempt to use a null value."),
    ("System", "InvalidCastException", "The exception that is thrown for an invalid conversion."),
    ("System", "MissingMemberException", "The exception that is thrown when there is an attempt to access a member that does not exist."),
    ("System", "MissingMethodException", "The exception that is thrown when there is an attempt to access a method that does not exist."),
    ("System", "BadImageFormatException", "The exception that is thrown when an executable artifact is invalid."),
    ("System", "ExecutionEngineException", "The exception that is thrown when there is an internal error in the execution engine."),
    ("System", "InsufficientExecutionStackException", "The exception that is thrown when there is insufficient execution stack available."),
    ("System.IO", "IOException", "The exception that is thrown when an I/O error occurs."),
    ("System.IO", "FileNotFoundException", "The exception that is thrown when an attempt to access a file that does not exist fails."),
    ("System.Security", "SecurityException", "The exception that is thrown when a security error is detected."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_set_has_full_console() {
        let set = ReferenceSet::analysis();
        let console = set.lookup_type("System", "Console").unwrap();
        for member in CAPTURED_CONSOLE_MEMBERS {
            assert!(console.member(member).is_some(), "missing {}", member);
        }
        assert!(console.member("SetOut").is_some());
    }

    #[test]
    fn sandbox_console_keeps_only_untargeted_members() {
        let set = ReferenceSet::sandbox();
        let console = set.lookup_type("System", "Console").unwrap();
        assert!(console.member("WriteLine").is_none());
        assert!(console.member("In").is_none());
        assert!(console.member("SetOut").is_some());

        let capture = set.lookup_type(CAPTURE_NAMESPACE, "Console").unwrap();
        assert!(capture.member("WriteLine").is_some());
        assert!(capture.member("SetOut").is_none());
    }

    #[test]
    fn completion_set_hides_capture_namespace() {
        let set = ReferenceSet::completion();
        assert!(!set.is_namespace("Sandbox"));
        assert!(!set.child_namespaces("").contains(&"Sandbox".to_string()));
        assert!(set.lookup_type("System", "Console").is_some());
    }

    #[test]
    fn namespace_tree() {
        let set = ReferenceSet::analysis();
        assert!(set.is_namespace("System"));
        assert!(set.is_namespace("System.IO"));
        assert!(set.is_namespace("Sandbox.Capture"));
        let children = set.child_namespaces("System");
        assert!(children.contains(&"IO".to_string()));
        assert!(children.contains(&"Threading".to_string()));
        assert!(!children.contains(&"System".to_string()));
    }

    #[test]
    fn arity_ranges() {
        let set = ReferenceSet::analysis();
        let console = set.lookup_type("System", "Console").unwrap();
        let write_line = console.member("WriteLine").unwrap();
        assert!(write_line.accepts(0));
        assert!(write_line.accepts(5));
        let read_key = console.member("ReadKey").unwrap();
        assert!(read_key.accepts(1));
        assert!(!read_key.accepts(2));
    }
}
