use crate::models::error::SError;
use camino::Utf8Path;

/// Engine-neutral value passed between host functions and scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Str(String),
}

impl ScriptValue {
    /// String coercion in the spirit of the scripting engine: numbers and booleans print.
    pub fn as_string(&self) -> Option<String> {
        match self {
            ScriptValue::Nil => None,
            ScriptValue::Bool(b) => Some(b.to_string()),
            ScriptValue::Integer(i) => Some(i.to_string()),
            ScriptValue::Number(n) => Some(n.to_string()),
            ScriptValue::Str(s) => Some(s.clone()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(i) => Some(*i),
            ScriptValue::Number(n) if n.is_finite() => Some(*n as i64),
            ScriptValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }
}

impl From<()> for ScriptValue {
    fn from(_: ()) -> Self {
        ScriptValue::Nil
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::Str(s)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ScriptValue::Nil)
    }
}

/// How many arguments a host function takes. Fixed arities pad with nil and drop extras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    pub fn normalize(self, mut args: Vec<ScriptValue>) -> Vec<ScriptValue> {
        if let Arity::Fixed(n) = self {
            args.resize(n, ScriptValue::Nil);
        }
        args
    }
}

/// A host function. Errors surface inside the script as catchable errors.
pub type HostFn = Box<dyn Fn(Vec<ScriptValue>) -> Result<ScriptValue, SError>>;

/// The boundary between the launcher and whatever engine runs automation scripts.
pub trait ScriptHost {
    /// Registers `f` under `name`. A dotted name (`fs.read`) lands in a global table.
    fn register_function(&mut self, name: &str, arity: Arity, f: HostFn) -> Result<(), SError>;

    /// Runs a script file to completion.
    fn eval_file(&mut self, path: &Utf8Path) -> Result<(), SError>;
}
