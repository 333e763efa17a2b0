use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    rc::Rc,
};

use crate::value::Value;

/// Shared handle to a Variable. The GC holds one per tracked cell; all
/// other handles (scope bindings, captured references, host references)
/// contribute to the use count the collector reasons about.
pub type VarHandle = Rc<Variable>;

/// A heap cell owning one Value. Variables are the only cycle-capable
/// nodes in the runtime: arrays and objects contain plain Values, so a
/// cycle must pass through a Variable whose Value reaches (via a closure's
/// captured references) back to itself.
pub struct Variable {
    value: RefCell<Value>,
    immutable: Cell<bool>,
    initialized: Cell<bool>,
    // Scratch counter owned by the collector; meaningful only during a
    // collection cycle.
    gc_ref: Cell<usize>,
}

impl Variable {
    pub(crate) fn new_handle() -> VarHandle {
        Rc::new(Self {
            value: RefCell::new(Value::Null),
            immutable: Cell::new(false),
            initialized: Cell::new(false),
            gc_ref: Cell::new(0),
        })
    }

    pub fn initialize(&self, value: Value, immutable: bool) {
        *self.value.borrow_mut() = value;
        self.immutable.set(immutable);
        self.initialized.set(true);
    }

    /// Drops the owned value, breaking any cycle through this cell, and
    /// returns the cell to its pre-initialization state.
    pub fn uninitialize(&self) {
        *self.value.borrow_mut() = Value::Null;
        self.immutable.set(false);
        self.initialized.set(false);
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.get()
    }

    pub fn set_immutable(&self, immutable: bool) {
        self.immutable.set(immutable);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn value(&self) -> Ref<'_, Value> {
        self.value.borrow()
    }

    pub fn value_mut(&self) -> RefMut<'_, Value> {
        self.value.borrow_mut()
    }

    pub(crate) fn gc_ref(&self) -> usize {
        self.gc_ref.get()
    }

    pub(crate) fn set_gc_ref(&self, count: usize) {
        self.gc_ref.set(count);
    }
}
