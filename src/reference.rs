use std::rc::Rc;

use crate::{
    diagnostics::Exception,
    value::{FunctionValue, Value},
    variable::VarHandle,
};

/// A captured tail call: everything needed to repeat the invocation once
/// the caller's frame has been popped.
pub struct PtcDescriptor {
    pub target: FunctionValue,
    pub this_ref: Reference,
    pub args: Vec<Value>,
    pub file: String,
    pub line: u32,
}

/// The root of a reference path.
#[derive(Clone, Default)]
pub enum RefRoot {
    #[default]
    Uninitialized,
    /// The result of a statement; reads as null.
    Void,
    /// An rvalue; cannot be stored into.
    Temporary(Value),
    /// A direct lvalue.
    Variable(VarHandle),
    /// A pending tail call, materialized by the execution engine before
    /// any read.
    PendingTailCall(Rc<PtcDescriptor>),
}

/// One step of a reference path.
#[derive(Clone, Debug, PartialEq)]
pub enum Modifier {
    ArrayIndex(i64),
    ObjectKey(String),
    /// The slot before the first element; opening it prepends.
    ArrayHead,
    /// The slot past the last element; opening it appends.
    ArrayTail,
    /// A pseudo-random existing element, chosen by `seed % len`.
    ArrayRandom(u32),
}

/// A path into the value graph: a root plus a short modifier chain.
/// References identify lvalues; writing respects the root Variable's
/// immutable flag and never goes through a temporary.
#[derive(Clone, Default)]
pub struct Reference {
    root: RefRoot,
    modifiers: Vec<Modifier>,
}

fn walk_error(message: &str) -> Exception {
    Exception::type_error("<runtime>", 0, message)
}

impl Reference {
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn void() -> Self {
        Self {
            root: RefRoot::Void,
            modifiers: Vec::new(),
        }
    }

    pub fn temporary(value: Value) -> Self {
        Self {
            root: RefRoot::Temporary(value),
            modifiers: Vec::new(),
        }
    }

    pub fn variable(handle: VarHandle) -> Self {
        Self {
            root: RefRoot::Variable(handle),
            modifiers: Vec::new(),
        }
    }

    pub fn pending_tail_call(descriptor: PtcDescriptor) -> Self {
        Self {
            root: RefRoot::PendingTailCall(Rc::new(descriptor)),
            modifiers: Vec::new(),
        }
    }

    pub fn root(&self) -> &RefRoot {
        &self.root
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn is_void(&self) -> bool {
        matches!(self.root, RefRoot::Void) && self.modifiers.is_empty()
    }

    pub fn is_pending_tail_call(&self) -> bool {
        matches!(self.root, RefRoot::PendingTailCall(_))
    }

    pub fn take_pending_tail_call(&mut self) -> Option<Rc<PtcDescriptor>> {
        if let RefRoot::PendingTailCall(descriptor) = &self.root {
            let descriptor = descriptor.clone();
            self.root = RefRoot::Uninitialized;
            Some(descriptor)
        } else {
            None
        }
    }

    pub fn push_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
    }

    /// Splits off the last modifier; the remainder identifies the object a
    /// method was looked up on, which becomes `this` at the call site.
    pub fn split_last_modifier(&self) -> Option<(Reference, Modifier)> {
        let (last, parents) = self.modifiers.split_last()?;
        Some((
            Reference {
                root: self.root.clone(),
                modifiers: parents.to_vec(),
            },
            last.clone(),
        ))
    }

    /// Reads the value this reference designates. Missing elements and
    /// wrapped-out-of-range subscripts read as null.
    pub fn read(&self) -> Result<Value, Exception> {
        match &self.root {
            RefRoot::Uninitialized => Err(walk_error("use of an uninitialized reference")),
            RefRoot::Void => Ok(Value::Null),
            RefRoot::PendingTailCall(_) => Err(walk_error(
                "attempt to read a pending tail call before materialization",
            )),
            RefRoot::Temporary(value) => read_path(value, &self.modifiers),
            RefRoot::Variable(handle) => {
                if !handle.is_initialized() {
                    return Err(walk_error("use of an uninitialized variable"));
                }
                let guard = handle.value();
                read_path(&guard, &self.modifiers)
            }
        }
    }

    /// Stores `value` at the designated location, creating missing
    /// intermediate containers along the path.
    pub fn write(&self, value: Value) -> Result<(), Exception> {
        self.with_open_leaf(|leaf| {
            *leaf = value;
            Ok(Value::Null)
        })
        .map(|_| ())
    }

    /// Opens the designated location and applies `op` to it in place. The
    /// path is walked exactly once; compound assignment and the increment
    /// operators build on this.
    pub fn modify(
        &self,
        op: impl FnOnce(&mut Value) -> Result<Value, Exception>,
    ) -> Result<Value, Exception> {
        self.with_open_leaf(op)
    }

    fn with_open_leaf(
        &self,
        op: impl FnOnce(&mut Value) -> Result<Value, Exception>,
    ) -> Result<Value, Exception> {
        let handle = self.writable_root()?;
        let mut guard = handle.value_mut();
        let mut leaf: &mut Value = &mut guard;
        for modifier in &self.modifiers {
            leaf = open_step(leaf, modifier)?;
        }
        op(leaf)
    }

    /// Removes the designated element, yielding the removed value (null if
    /// nothing was there). The path is walked without creating anything.
    pub fn unset(&self) -> Result<Value, Exception> {
        let handle = self.writable_root()?;
        let Some((last, parents)) = self.modifiers.split_last() else {
            return Err(walk_error("only array elements and object members can be unset"));
        };
        let mut guard = handle.value_mut();
        let mut parent: &mut Value = &mut guard;
        for modifier in parents {
            match peek_step(parent, modifier)? {
                Some(next) => parent = next,
                None => return Ok(Value::Null),
            }
        }
        remove_leaf(parent, last)
    }

    /// Collapses the path into a plain rvalue.
    pub fn convert_to_temporary(&self) -> Result<Reference, Exception> {
        Ok(Reference::temporary(self.read()?))
    }

    fn writable_root(&self) -> Result<&VarHandle, Exception> {
        match &self.root {
            RefRoot::Variable(handle) => {
                if handle.is_immutable() {
                    Err(walk_error("attempt to modify a constant"))
                } else {
                    Ok(handle)
                }
            }
            RefRoot::Temporary(_) => Err(walk_error("attempt to modify a temporary value")),
            RefRoot::Void => Err(walk_error("attempt to modify the result of a statement")),
            RefRoot::Uninitialized => Err(walk_error("use of an uninitialized reference")),
            RefRoot::PendingTailCall(_) => Err(walk_error(
                "attempt to modify a pending tail call before materialization",
            )),
        }
    }
}

fn read_path(value: &Value, modifiers: &[Modifier]) -> Result<Value, Exception> {
    let mut current = value;
    for modifier in modifiers {
        match modifier {
            Modifier::ArrayIndex(index) => match current {
                Value::Null => return Ok(Value::Null),
                Value::Array(elements) => {
                    let mut index = *index;
                    if index < 0 {
                        index += elements.len() as i64;
                    }
                    if index < 0 || index >= elements.len() as i64 {
                        return Ok(Value::Null);
                    }
                    current = &elements[index as usize];
                }
                other => {
                    return Err(walk_error(&format!(
                        "integer subscript applied to {}",
                        other.type_name()
                    )));
                }
            },
            Modifier::ObjectKey(key) => match current {
                Value::Null => return Ok(Value::Null),
                Value::Object(map) => match map.get(key) {
                    Some(next) => current = next,
                    None => return Ok(Value::Null),
                },
                other => {
                    return Err(walk_error(&format!(
                        "member access applied to {}",
                        other.type_name()
                    )));
                }
            },
            Modifier::ArrayHead | Modifier::ArrayTail => match current {
                Value::Null | Value::Array(_) => return Ok(Value::Null),
                other => {
                    return Err(walk_error(&format!(
                        "array subscript applied to {}",
                        other.type_name()
                    )));
                }
            },
            Modifier::ArrayRandom(seed) => match current {
                Value::Null => return Ok(Value::Null),
                Value::Array(elements) => {
                    if elements.is_empty() {
                        return Ok(Value::Null);
                    }
                    current = &elements[*seed as usize % elements.len()];
                }
                other => {
                    return Err(walk_error(&format!(
                        "array subscript applied to {}",
                        other.type_name()
                    )));
                }
            },
        }
    }
    Ok(current.clone())
}

/// One step of an opening walk: missing intermediates are created, array
/// indices wrap, and a still-negative index prepends null fillers so the
/// write lands at index zero.
fn open_step<'a>(current: &'a mut Value, modifier: &Modifier) -> Result<&'a mut Value, Exception> {
    match modifier {
        Modifier::ArrayIndex(index) => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(elements) = current else {
                return Err(walk_error(&format!(
                    "integer subscript applied to {}",
                    current.type_name()
                )));
            };
            let len = elements.len() as i64;
            let mut index = *index;
            if index < 0 {
                index += len;
            }
            if index < 0 {
                let fill = (-index) as usize;
                elements.splice(0..0, std::iter::repeat(Value::Null).take(fill));
                index = 0;
            } else if index >= len {
                elements.resize(index as usize + 1, Value::Null);
            }
            Ok(&mut elements[index as usize])
        }
        Modifier::ObjectKey(key) => {
            if current.is_null() {
                *current = Value::Object(indexmap::IndexMap::new());
            }
            let Value::Object(map) = current else {
                return Err(walk_error(&format!(
                    "member access applied to {}",
                    current.type_name()
                )));
            };
            Ok(map.entry(key.clone()).or_insert(Value::Null))
        }
        Modifier::ArrayHead => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(elements) = current else {
                return Err(walk_error(&format!(
                    "array subscript applied to {}",
                    current.type_name()
                )));
            };
            elements.insert(0, Value::Null);
            Ok(&mut elements[0])
        }
        Modifier::ArrayTail => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(elements) = current else {
                return Err(walk_error(&format!(
                    "array subscript applied to {}",
                    current.type_name()
                )));
            };
            elements.push(Value::Null);
            let last = elements.len() - 1;
            Ok(&mut elements[last])
        }
        Modifier::ArrayRandom(seed) => {
            let Value::Array(elements) = current else {
                return Err(walk_error(&format!(
                    "array subscript applied to {}",
                    current.type_name()
                )));
            };
            if elements.is_empty() {
                return Err(Exception::index_error(
                    "<runtime>",
                    0,
                    "random subscript into an empty array",
                ));
            }
            let index = *seed as usize % elements.len();
            Ok(&mut elements[index])
        }
    }
}

/// One step of a non-creating mutable walk, used by `unset`.
fn peek_step<'a>(
    current: &'a mut Value,
    modifier: &Modifier,
) -> Result<Option<&'a mut Value>, Exception> {
    match modifier {
        Modifier::ArrayIndex(index) => match current {
            Value::Null => Ok(None),
            Value::Array(elements) => {
                let mut index = *index;
                if index < 0 {
                    index += elements.len() as i64;
                }
                if index < 0 || index >= elements.len() as i64 {
                    return Ok(None);
                }
                Ok(Some(&mut elements[index as usize]))
            }
            other => Err(walk_error(&format!(
                "integer subscript applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ObjectKey(key) => match current {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(map.get_mut(key)),
            other => Err(walk_error(&format!(
                "member access applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ArrayHead | Modifier::ArrayTail | Modifier::ArrayRandom(_) => Ok(None),
    }
}

fn remove_leaf(parent: &mut Value, modifier: &Modifier) -> Result<Value, Exception> {
    match modifier {
        Modifier::ArrayIndex(index) => match parent {
            Value::Null => Ok(Value::Null),
            Value::Array(elements) => {
                let mut index = *index;
                if index < 0 {
                    index += elements.len() as i64;
                }
                if index < 0 || index >= elements.len() as i64 {
                    return Ok(Value::Null);
                }
                Ok(elements.remove(index as usize))
            }
            other => Err(walk_error(&format!(
                "integer subscript applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ObjectKey(key) => match parent {
            Value::Null => Ok(Value::Null),
            Value::Object(map) => Ok(map.shift_remove(key).unwrap_or(Value::Null)),
            other => Err(walk_error(&format!(
                "member access applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ArrayHead => match parent {
            Value::Null => Ok(Value::Null),
            Value::Array(elements) => {
                if elements.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(elements.remove(0))
                }
            }
            other => Err(walk_error(&format!(
                "array subscript applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ArrayTail => match parent {
            Value::Null => Ok(Value::Null),
            Value::Array(elements) => Ok(elements.pop().unwrap_or(Value::Null)),
            other => Err(walk_error(&format!(
                "array subscript applied to {}",
                other.type_name()
            ))),
        },
        Modifier::ArrayRandom(seed) => match parent {
            Value::Null => Ok(Value::Null),
            Value::Array(elements) => {
                if elements.is_empty() {
                    Ok(Value::Null)
                } else {
                    let index = *seed as usize % elements.len();
                    Ok(elements.remove(index))
                }
            }
            other => Err(walk_error(&format!(
                "array subscript applied to {}",
                other.type_name()
            ))),
        },
    }
}
