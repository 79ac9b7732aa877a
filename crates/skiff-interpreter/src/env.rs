use crate::object::Object;

use gc::{Finalize, Gc, GcCell, Trace};
use rustc_hash::FxHashMap;

/// A frame in the environment chain. Slots hold `None` for variables that
/// were declared without an initializer; assignment fills them in.
///
/// Frames are garbage-collected rather than reference-counted: a closure
/// stored in a field of an instance that the closure's own environment
/// captures forms a cycle.
#[derive(Clone, Debug, Finalize, Trace)]
pub struct Env(Gc<GcCell<EnvNode>>);

impl Default for Env {
    fn default() -> Self {
        Self(Gc::new(GcCell::new(EnvNode::default())))
    }
}

impl Env {
    pub fn with_parent(parent: &Env) -> Self {
        let node = EnvNode::with_parent(parent.0.clone());
        Self(Gc::new(GcCell::new(node)))
    }

    /// Creates a binding in this frame. Fails if the name is already bound
    /// here; shadowing lives in child frames, not in-place.
    pub fn define(&mut self, name: &str, value: Option<Object>) -> Result<(), ()> {
        self.0.borrow_mut().define(name, value)
    }

    pub fn get(&self, name: &str) -> Option<Option<Object>> {
        self.0.borrow().get(name)
    }

    pub fn get_at(&self, name: &str, depth: usize) -> Option<Option<Object>> {
        self.0.borrow().get_at(name, depth)
    }

    pub fn set(&mut self, name: &str, value: Object) -> Result<(), ()> {
        self.0.borrow_mut().set(name, value)
    }

    pub fn set_at(&mut self, name: &str, value: Object, depth: usize) -> Result<(), ()> {
        self.0.borrow_mut().set_at(name, value, depth)
    }
}

#[derive(Debug, Default, Finalize, Trace)]
struct EnvNode {
    map: FxHashMap<String, Option<Object>>,
    parent: Option<Gc<GcCell<EnvNode>>>,
}

impl EnvNode {
    fn with_parent(parent: Gc<GcCell<EnvNode>>) -> Self {
        Self { map: FxHashMap::default(), parent: Some(parent) }
    }

    fn define(&mut self, name: &str, value: Option<Object>) -> Result<(), ()> {
        if self.map.contains_key(name) {
            return Err(());
        }
        self.map.insert(name.to_string(), value);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<Option<Object>> {
        self.map.get(name).cloned()
    }

    fn get_at(&self, name: &str, depth: usize) -> Option<Option<Object>> {
        if depth == 0 {
            self.get(name)
        } else {
            self.parent
                .as_ref()
                .unwrap_or_else(|| unreachable!("variable pointed to invalid scope: {:?}", name))
                .borrow()
                .get_at(name, depth - 1)
        }
    }

    fn set(&mut self, name: &str, value: Object) -> Result<(), ()> {
        match self.map.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(()),
        }
    }

    fn set_at(&mut self, name: &str, value: Object, depth: usize) -> Result<(), ()> {
        if depth == 0 {
            self.set(name, value)
        } else {
            self.parent
                .as_ref()
                .unwrap_or_else(|| unreachable!("variable pointed to invalid scope: {:?}", name))
                .borrow_mut()
                .set_at(name, value, depth - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn define_rejects_redeclaration() {
        let mut env = Env::default();
        assert_eq!(env.define("a", Some(Object::Number(1.0))), Ok(()));
        assert_eq!(env.define("a", Some(Object::Number(2.0))), Err(()));
        assert_eq!(env.get("a"), Some(Some(Object::Number(1.0))));
    }

    #[test]
    fn uninitialized_slot_reads_as_none() {
        let mut env = Env::default();
        env.define("a", None).unwrap();
        assert_eq!(env.get("a"), Some(None));
        env.set("a", Object::Bool(true)).unwrap();
        assert_eq!(env.get("a"), Some(Some(Object::Bool(true))));
    }

    #[test]
    fn depth_walks_enclosing_frames() {
        let mut global = Env::default();
        global.define("a", Some(Object::Number(1.0))).unwrap();
        let middle = Env::with_parent(&global);
        let mut inner = Env::with_parent(&middle);

        assert_eq!(inner.get_at("a", 2), Some(Some(Object::Number(1.0))));
        assert_eq!(inner.get_at("a", 0), None);

        inner.set_at("a", Object::Number(7.0), 2).unwrap();
        assert_eq!(global.get("a"), Some(Some(Object::Number(7.0))));
    }

    #[test]
    fn frames_share_structure() {
        let mut parent = Env::default();
        parent.define("a", Some(Object::Number(1.0))).unwrap();
        let child = parent.clone();
        parent.set("a", Object::Number(2.0)).unwrap();
        assert_eq!(child.get("a"), Some(Some(Object::Number(2.0))));
    }
}
