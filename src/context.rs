use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::reference::Reference;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A lexical scope: an insertion-ordered mapping from identifier to
/// Reference, with an optional parent. The global scope roots `std` and
/// everything installed through the embedding hooks; function scopes hold
/// parameters, `this`, and the closure's captured bindings; block scopes
/// nest inside whichever frame they execute in.
#[derive(Default)]
pub struct Scope {
    parent: Option<ScopeRef>,
    bindings: IndexMap<String, Reference>,
}

impl Scope {
    pub fn new() -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            bindings: IndexMap::new(),
        }))
    }

    pub fn with_parent(parent: ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn from_bindings(parent: Option<ScopeRef>, bindings: IndexMap<String, Reference>) -> ScopeRef {
        Rc::new(RefCell::new(Self { parent, bindings }))
    }

    /// Declares `name` in this scope, shadowing any binding upward.
    pub fn define(&mut self, name: impl Into<String>, reference: Reference) {
        self.bindings.insert(name.into(), reference);
    }

    pub fn contains_here(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn get_here(&self, name: &str) -> Option<Reference> {
        self.bindings.get(name).cloned()
    }

    /// Resolves `name` by walking the parent chain outward.
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Reference> {
        if let Some(reference) = scope.borrow().bindings.get(name) {
            return Some(reference.clone());
        }
        let parent = scope.borrow().parent.clone();
        parent.and_then(|parent| Scope::lookup(&parent, name))
    }
}
