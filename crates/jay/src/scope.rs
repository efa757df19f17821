//! Lexical scope frames and name resolution.
//!
//! A [`Scope`] is a named frame with a parent link and a binding table.
//! The table is an ordinary object: at the root it IS the caller-visible
//! global object, so assignments to undeclared names become global
//! properties the host can observe after execution.
//!
//! Resolution walks parent links; a name found nowhere is homed on the
//! root. Activation frames for function calls and the `with` overlay are
//! both plain child scopes.

use std::{fmt, rc::Rc};

use crate::value::{JsObject, ObjRef, Property, Value};

/// One frame of the scope chain.
pub(crate) struct Scope {
    /// Frame name, for diagnostics only.
    pub name: Rc<str>,
    pub parent: Option<Rc<Self>>,
    /// The binding table. Bindings are plain data properties.
    pub data: ObjRef,
}

impl fmt::Debug for Scope {
    /// Prints the frame-name chain, innermost first: `with < f < global`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let mut current = self.parent.clone();
        while let Some(frame) = current {
            write!(f, " < {}", frame.name)?;
            current = frame.parent.clone();
        }
        Ok(())
    }
}

impl Scope {
    /// The root frame, whose binding table is the supplied global object.
    pub fn root(global: ObjRef) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from("global"),
            parent: None,
            data: global,
        })
    }

    /// A child frame with a fresh binding table.
    pub fn child(parent: &Rc<Self>, name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            parent: Some(Rc::clone(parent)),
            data: JsObject::plain().into_ref(),
        })
    }

    /// Whether this frame's own table binds `key`.
    pub fn has_own(&self, key: &str) -> bool {
        self.data.borrow().properties.contains_key(key)
    }

    /// Reads a binding by walking parent links. `None` when the name is
    /// bound nowhere (identifier expressions then read as `undefined`).
    pub fn lookup(self: &Rc<Self>, key: &str) -> Option<Value> {
        let mut current = Rc::clone(self);
        loop {
            if let Some(prop) = current.data.borrow().properties.get(key) {
                return Some(prop.value.clone());
            }
            match &current.parent {
                Some(parent) => {
                    let parent = Rc::clone(parent);
                    current = parent;
                }
                None => return None,
            }
        }
    }

    /// The frame owning `key`: the nearest frame binding it, else the
    /// root. Assignments to undeclared names land on the root this way.
    pub fn owner_of(self: &Rc<Self>, key: &str) -> Rc<Self> {
        let mut current = Rc::clone(self);
        loop {
            if current.has_own(key) {
                return current;
            }
            match &current.parent {
                Some(parent) => {
                    let parent = Rc::clone(parent);
                    current = parent;
                }
                None => return current,
            }
        }
    }

    /// Binds `key` in this frame, replacing any existing binding.
    pub fn declare(&self, key: impl Into<Rc<str>>, value: Value) {
        self.data.borrow_mut().set(key, value);
    }

    /// Hoists a `var`: binds `key` to `undefined` unless already bound.
    pub fn declare_if_absent(&self, key: &str) {
        let mut data = self.data.borrow_mut();
        if !data.properties.contains_key(key) {
            data.set(key, Value::Undefined);
        }
    }

    /// Hoists a function declaration: installs `value`, but an existing
    /// binding is only overwritten while it is still `undefined`.
    pub fn declare_function(&self, key: &str, value: Value) {
        let mut data = self.data.borrow_mut();
        match data.properties.get_mut(key) {
            Some(prop) if !matches!(prop.value, Value::Undefined) => {}
            Some(prop) => prop.value = value,
            None => data.set(key, value),
        }
    }

    /// Writes a binding into its owning frame.
    pub fn assign(self: &Rc<Self>, key: &str, value: Value) {
        self.owner_of(key).data.borrow_mut().set(key, value);
    }

    /// `delete` on a bare identifier: removes the binding from its owning
    /// frame's table (the root table for undeclared names).
    pub fn delete(self: &Rc<Self>, key: &str) -> bool {
        let owner = self.owner_of(key);
        let mut data = owner.data.borrow_mut();
        data.properties.shift_remove(key);
        true
    }

    /// Takes a snapshot of a binding for transactional rebinding (the
    /// `catch` parameter): the old property if present.
    pub fn save_binding(&self, key: &str) -> Option<Property> {
        self.data.borrow().properties.get(key).cloned()
    }

    /// Restores a snapshot taken by [`Scope::save_binding`]: puts the old
    /// property back, or removes the name if it was absent before.
    pub fn restore_binding(&self, key: &str, saved: Option<Property>) {
        let mut data = self.data.borrow_mut();
        match saved {
            Some(prop) => {
                data.properties.insert(Rc::from(key), prop);
            }
            None => {
                data.properties.shift_remove(key);
            }
        }
    }
}
