use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    air::FnPrototype,
    diagnostics::Exception,
    reference::{RefRoot, Reference},
    variable::VarHandle,
};

/// A runtime value. Values are self-contained: cloning one never shares
/// mutable state. Shared mutation goes through a Variable reached by a
/// Reference; arrays and objects hold plain Values, so the value graph
/// itself stays acyclic and cycles concentrate at Variable boundaries.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Opaque(Rc<dyn OpaqueObject>),
    Function(FunctionValue),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// Result of a three-way comparison. `Unordered` covers NaN operands and
/// values of incomparable types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Unordered,
    Less,
    Equal,
    Greater,
}

impl Value {
    /// The name reported by `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Opaque(_) => "opaque",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Real(r) => *r != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(values) => !values.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Opaque(_) | Value::Function(_) => true,
        }
    }

    /// Three-way comparison used by the relational and spaceship operators.
    pub fn compare(&self, other: &Value) -> Compare {
        fn real_compare(a: f64, b: f64) -> Compare {
            match a.partial_cmp(&b) {
                Some(std::cmp::Ordering::Less) => Compare::Less,
                Some(std::cmp::Ordering::Equal) => Compare::Equal,
                Some(std::cmp::Ordering::Greater) => Compare::Greater,
                None => Compare::Unordered,
            }
        }
        match (self, other) {
            (Value::Null, Value::Null) => Compare::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Value::Integer(a), Value::Integer(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Value::Integer(a), Value::Real(b)) => real_compare(*a as f64, *b),
            (Value::Real(a), Value::Integer(b)) => real_compare(*a, *b as f64),
            (Value::Real(a), Value::Real(b)) => real_compare(*a, *b),
            (Value::String(a), Value::String(b)) => match a.as_bytes().cmp(b.as_bytes()) {
                std::cmp::Ordering::Less => Compare::Less,
                std::cmp::Ordering::Equal => Compare::Equal,
                std::cmp::Ordering::Greater => Compare::Greater,
            },
            (Value::Array(a), Value::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.compare(right) {
                        Compare::Equal => continue,
                        other => return other,
                    }
                }
                match a.len().cmp(&b.len()) {
                    std::cmp::Ordering::Less => Compare::Less,
                    std::cmp::Ordering::Equal => Compare::Equal,
                    std::cmp::Ordering::Greater => Compare::Greater,
                }
            }
            _ => Compare::Unordered,
        }
    }

    /// The GC's entry point into the value graph: yields every Variable
    /// handle stored within this value, each storage slot exactly once.
    /// Closure capture tables are shared via `Rc`, so `seen` dedupes them
    /// across the whole traversal.
    pub fn enumerate_variables(&self, seen: &mut HashSet<usize>, out: &mut Vec<VarHandle>) {
        match self {
            Value::Array(values) => {
                for value in values {
                    value.enumerate_variables(seen, out);
                }
            }
            Value::Object(map) => {
                for value in map.values() {
                    value.enumerate_variables(seen, out);
                }
            }
            Value::Function(FunctionValue::Air(closure)) => {
                if seen.insert(Rc::as_ptr(closure) as *const () as usize) {
                    for reference in closure.captured.borrow().values() {
                        if let RefRoot::Variable(handle) = reference.root() {
                            out.push(handle.clone());
                        }
                    }
                    closure.prototype.body.enumerate_variables(seen, out);
                }
            }
            Value::Opaque(opaque) => {
                opaque.enumerate_variables(&mut |handle| out.push(handle.clone()));
            }
            _ => {}
        }
    }

    /// Serializes to JSON text. Functions, opaques, and non-finite reals
    /// become `null`, as in the upstream `std.json` binding.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::Number((*n).into()),
            Value::Real(r) => serde_json::Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json_value).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json_value()))
                    .collect(),
            ),
            Value::Opaque(_) | Value::Function(_) => serde_json::Value::Null,
        }
    }

    pub fn from_json(text: &str) -> std::result::Result<Value, Exception> {
        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| Exception::from_native(format!("invalid JSON: {err}")))?;
        Ok(Self::from_json_value(parsed))
    }

    fn from_json_value(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Real(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(values) => {
                Value::Array(values.into_iter().map(Value::from_json_value).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json_value(value)))
                    .collect(),
            ),
        }
    }
}

/// Host-level structural equality, used by tests and embedders. The
/// language's `==` goes through `compare` instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{r:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Opaque(opaque) => write!(f, "<opaque {}>", opaque.type_label()),
            Value::Function(fun) => write!(f, "<function {}>", fun.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(values) => {
                write!(f, "[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Opaque(opaque) => write!(f, "<opaque {}>", opaque.type_label()),
            Value::Function(fun) => write!(f, "<function {}>", fun.name()),
        }
    }
}

/// A host-supplied value treated as an atomic black box by the engine,
/// except for its enumerate-variables hook.
pub trait OpaqueObject {
    fn type_label(&self) -> &str;

    /// Yields every Variable handle this object keeps alive.
    fn enumerate_variables(&self, _callback: &mut dyn FnMut(&VarHandle)) {}
}

/// A callable value, either AIR-backed (a script closure) or native.
#[derive(Clone)]
pub enum FunctionValue {
    Air(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

impl FunctionValue {
    pub fn name(&self) -> String {
        match self {
            FunctionValue::Air(closure) => closure.prototype.name.clone(),
            FunctionValue::Native(native) => native.name.clone(),
        }
    }

    pub fn ptr_eq(&self, other: &FunctionValue) -> bool {
        match (self, other) {
            (FunctionValue::Air(a), FunctionValue::Air(b)) => Rc::ptr_eq(a, b),
            (FunctionValue::Native(a), FunctionValue::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// An instantiated script function: the shared prototype plus the
/// references captured from the enclosing scope when the closure was made.
pub struct Closure {
    pub prototype: Rc<FnPrototype>,
    pub captured: RefCell<IndexMap<String, Reference>>,
}

impl Closure {
    pub fn new(prototype: Rc<FnPrototype>, captured: IndexMap<String, Reference>) -> Self {
        Self {
            prototype,
            captured: RefCell::new(captured),
        }
    }
}

/// A host function installed through the embedding hooks. `arity` of
/// `None` accepts any number of arguments.
pub struct NativeFunction {
    pub name: String,
    pub arity: Option<usize>,
    pub call: Box<dyn Fn(&[Value]) -> std::result::Result<Value, Exception>>,
}

impl NativeFunction {
    pub fn invoke(&self, args: &[Value]) -> std::result::Result<Value, Exception> {
        if let Some(expected) = self.arity {
            if args.len() != expected {
                return Err(Exception::arity_error(
                    "<native code>",
                    0,
                    format!(
                        "`{}` expects {} arguments but received {}",
                        self.name,
                        expected,
                        args.len()
                    ),
                ));
            }
        }
        (self.call)(args)
    }
}
