use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    symbols::{MethodRef, SymbolTable},
    Method,
};

/// A whole program: the read-only symbol table plus every method body.
#[derive(Debug, Default)]
pub struct Program {
    pub symbols: SymbolTable,
    pub bodies: BodyStore,
}

impl Program {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            bodies: BodyStore::default(),
        }
    }
}

/// Concurrent storage of method bodies keyed by their declaration.
///
/// Each body is owned by exactly one entry, so a worker that obtained
/// mutable access through [`BodyStore::modify`] or
/// [`BodyStore::par_for_each`] owns the method exclusively.
#[derive(Debug, Default)]
pub struct BodyStore {
    bodies: DashMap<MethodRef, Method>,
}

impl BodyStore {
    /// Inserts a body, returning the one it replaces.
    pub fn insert(&self, method: Method) -> Option<Method> {
        self.bodies.insert(method.method_ref, method)
    }

    pub fn remove(&self, method: MethodRef) -> Option<Method> {
        self.bodies.remove(&method).map(|(_, body)| body)
    }

    pub fn contains(&self, method: MethodRef) -> bool {
        self.bodies.contains_key(&method)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Returns all stored declarations in ascending order.
    pub fn keys(&self) -> Vec<MethodRef> {
        let mut keys: Vec<_> = self.bodies.iter().map(|entry| *entry.key()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn view<R>(&self, method: MethodRef, f: impl FnOnce(&Method) -> R) -> Option<R> {
        self.bodies.get(&method).map(|body| f(&body))
    }

    pub fn modify<R>(&self, method: MethodRef, f: impl FnOnce(&mut Method) -> R) -> Option<R> {
        self.bodies.get_mut(&method).map(|mut body| f(&mut body))
    }

    /// Applies `f` to every body in parallel.
    pub fn par_for_each<F>(&self, f: F)
    where
        F: Fn(MethodRef, &mut Method) + Send + Sync,
    {
        self.bodies.par_iter_mut().for_each(|mut entry| {
            let key = *entry.key();
            f(key, entry.value_mut())
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ValueKind;

    #[test]
    fn par_for_each_visits_every_body() {
        let mut symbols = SymbolTable::new();
        let class = symbols.make_type("LFoo;");
        let methods: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| symbols.make_method(class, name, &[ValueKind::Narrow], None, true))
            .collect();

        let program = Program::new(symbols);
        for &m in &methods {
            assert!(program.bodies.insert(Method::new(m, 1, 1)).is_none());
        }
        assert_eq!(program.bodies.keys(), methods);

        let visited = AtomicUsize::new(0);
        program.bodies.par_for_each(|_, body| {
            body.registers_size += 1;
            visited.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visited.into_inner(), 3);
        assert_eq!(program.bodies.view(methods[1], |body| body.registers_size), Some(2));

        program.bodies.modify(methods[0], |body| body.ins_size = 0);
        assert_eq!(program.bodies.view(methods[0], |body| body.locals_size()), Some(2));
        assert!(program.bodies.remove(methods[2]).is_some());
        assert_eq!(program.bodies.len(), 2);
    }
}
