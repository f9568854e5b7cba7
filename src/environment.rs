//! Environment model: a persistent chain of frames, each binding one name to a
//! shared, mutable cell.
//!
//! Extending an environment returns a new handle whose head frame points at the
//! old chain; the old handle is untouched. Cells, on the other hand, are shared
//! by every handle and closure that reaches them, so patching a cell through
//! [`Environment::modify`] is visible everywhere. `define`, `letrec` and
//! internal defines rely on that: they create an empty cell first, evaluate the
//! initializer with the cell already in scope, then fill it in.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Value;

/// A binding cell. `None` marks a placeholder that has not been patched yet.
pub type Binding = Rc<RefCell<Option<Value>>>;

struct Frame {
    name: String,
    cell: Binding,
    next: Option<Rc<Frame>>,
}

/// Handle on a chain of frames. Cloning is cheap and shares the chain.
#[derive(Clone, Default)]
pub struct Environment {
    head: Option<Rc<Frame>>,
}

impl Environment {
    /// An environment with no bindings
    pub fn empty() -> Self {
        Environment { head: None }
    }

    /// A new environment with `name` bound to `value` in front of `self`
    pub fn extend(&self, name: impl Into<String>, value: Value) -> Self {
        self.push(name.into(), Some(value))
    }

    /// A new environment with `name` bound to an empty placeholder cell
    pub fn extend_placeholder(&self, name: impl Into<String>) -> Self {
        self.push(name.into(), None)
    }

    fn push(&self, name: String, value: Option<Value>) -> Self {
        Environment {
            head: Some(Rc::new(Frame {
                name,
                cell: Rc::new(RefCell::new(value)),
                next: self.head.clone(),
            })),
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.next.as_deref())
    }

    /// The nearest binding cell for `name`, searching innermost first
    pub fn find(&self, name: &str) -> Option<Binding> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| Rc::clone(&frame.cell))
    }

    /// Whether any frame binds `name`, placeholder or not
    pub fn contains(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.name == name)
    }

    /// The current value bound to `name`, if bound and initialized
    pub fn get(&self, name: &str) -> Option<Value> {
        self.find(name).and_then(|cell| cell.borrow().clone())
    }

    /// Overwrite the nearest binding of `name` in place
    pub fn modify(&self, name: &str, value: Value) -> Result<(), Error> {
        let cell = self
            .find(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))?;
        *cell.borrow_mut() = Some(value);
        Ok(())
    }

    /// Visible bindings, innermost shadowing outer ones, sorted by name.
    /// Placeholders are skipped.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut seen: Vec<(String, Value)> = Vec::new();
        let mut shadowed: Vec<&str> = Vec::new();
        for frame in self.frames() {
            if shadowed.contains(&frame.name.as_str()) {
                continue;
            }
            shadowed.push(&frame.name);
            if let Some(value) = frame.cell.borrow().clone() {
                seen.push((frame.name.clone(), value));
            }
        }
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        seen
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames().map(|frame| frame.name.as_str()))
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;

    #[test]
    fn test_extend_and_find() {
        let empty = Environment::empty();
        assert!(empty.find("x").is_none());

        let outer = empty.extend("x", val(1));
        let inner = outer.extend("x", val(2)).extend("y", val(3));
        assert_eq!(inner.get("x"), Some(val(2)));
        assert_eq!(inner.get("y"), Some(val(3)));
        // extending never mutates the original handle
        assert_eq!(outer.get("x"), Some(val(1)));
        assert!(outer.get("y").is_none());
        assert!(empty.find("x").is_none());
    }

    #[test]
    fn test_modify_patches_shared_cell() {
        let env = Environment::empty().extend("x", val(1));
        let alias = env.clone();
        let child = env.extend("y", val(2));

        child.modify("x", val(10)).unwrap();
        assert_eq!(env.get("x"), Some(val(10)));
        assert_eq!(alias.get("x"), Some(val(10)));
        assert_eq!(child.get("x"), Some(val(10)));
    }

    #[test]
    fn test_modify_nearest_only() {
        let outer = Environment::empty().extend("x", val(1));
        let inner = outer.extend("x", val(2));
        inner.modify("x", val(3)).unwrap();
        assert_eq!(inner.get("x"), Some(val(3)));
        assert_eq!(outer.get("x"), Some(val(1)));
    }

    #[test]
    fn test_modify_unbound_fails() {
        let env = Environment::empty();
        assert_eq!(
            env.modify("nope", val(1)),
            Err(Error::UnboundVariable("nope".to_owned()))
        );
    }

    #[test]
    fn test_placeholder_then_patch() {
        let env = Environment::empty().extend("x", val(1)).extend_placeholder("x");
        assert!(env.contains("x"));
        // the placeholder hides the outer binding
        assert!(env.get("x").is_none());
        assert!(env.find("x").unwrap().borrow().is_none());

        env.modify("x", val(5)).unwrap();
        assert_eq!(env.get("x"), Some(val(5)));
    }

    #[test]
    fn test_get_all_bindings_shadowing() {
        let env = Environment::empty()
            .extend("b", val(1))
            .extend("a", val(2))
            .extend("b", val(3))
            .extend_placeholder("c");
        assert_eq!(
            env.get_all_bindings(),
            vec![("a".to_owned(), val(2)), ("b".to_owned(), val(3))]
        );
    }
}
