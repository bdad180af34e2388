//! Method invocation with late binding.
//!
//! Every call resolves the receiver by name at call time and walks the
//! live superclass chain for the method. Nothing is linked ahead of
//! time: redefine a class and the very next call through the same
//! lookup sees the new body.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::bytecode::MethodBody;
use crate::core::ClassName;

use super::table::{ClassTable, DefinedClass};

/// Calls deeper than this abort. Method bodies are tiny, so anything
/// near the limit is a call cycle.
pub const MAX_CALL_DEPTH: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("class `{0}` could not be resolved")]
    UnresolvedClass(ClassName),

    #[error("method `{method}` not found on `{class}` or its superclasses")]
    UnresolvedMethod { class: ClassName, method: String },

    #[error("call depth limit ({0}) exceeded")]
    DepthExceeded(usize),

    #[error("superclass cycle through `{0}`")]
    SuperclassCycle(ClassName),
}

/// Name-based class resolution, the seam invocation binds through.
pub trait ClassLookup {
    fn lookup(&self, name: &ClassName) -> Option<Arc<DefinedClass>>;
}

impl ClassLookup for ClassTable {
    fn lookup(&self, name: &ClassName) -> Option<Arc<DefinedClass>> {
        self.get(name)
    }
}

/// Invoke `method` on `class`, resolving both late.
pub fn invoke(
    lookup: &dyn ClassLookup,
    class: &ClassName,
    method: &str,
) -> Result<String, InvokeError> {
    invoke_at(lookup, class, method, 0)
}

fn invoke_at(
    lookup: &dyn ClassLookup,
    receiver: &ClassName,
    method: &str,
    depth: usize,
) -> Result<String, InvokeError> {
    if depth >= MAX_CALL_DEPTH {
        return Err(InvokeError::DepthExceeded(MAX_CALL_DEPTH));
    }

    let body = find_method(lookup, receiver, method)?.ok_or_else(|| {
        InvokeError::UnresolvedMethod {
            class: receiver.clone(),
            method: method.to_string(),
        }
    })?;

    match body {
        MethodBody::Literal(value) => Ok(value),
        MethodBody::CallStatic { class, method } => invoke_at(lookup, &class, &method, depth + 1),
        // Re-dispatch from the receiver, not the defining class, so
        // subclass overrides win in inherited bodies
        MethodBody::CallSelf { method } => invoke_at(lookup, receiver, &method, depth + 1),
    }
}

/// Find `method` on `start` or its superclass chain.
fn find_method(
    lookup: &dyn ClassLookup,
    start: &ClassName,
    method: &str,
) -> Result<Option<MethodBody>, InvokeError> {
    let mut visited: FxHashSet<ClassName> = FxHashSet::default();
    let mut current = start.clone();
    loop {
        let Some(class) = lookup.lookup(&current) else {
            return Err(InvokeError::UnresolvedClass(current));
        };
        if !visited.insert(current.clone()) {
            return Err(InvokeError::SuperclassCycle(current));
        }
        let image = class.image();
        if let Some(found) = image.method(method) {
            return Ok(Some(found.body.clone()));
        }
        match image.superclass {
            Some(superclass) => current = superclass,
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ClassImage, MethodDecl};
    use crate::core::Generation;

    fn class(table: &ClassTable, name: &str, superclass: Option<&str>, methods: &[(&str, MethodBody)]) {
        let mut image = ClassImage::new(
            ClassName::new(name),
            superclass.map(ClassName::new),
        );
        for (method, body) in methods {
            image.methods.push(MethodDecl {
                name: (*method).to_string(),
                body: body.clone(),
            });
        }
        table.define(image, Generation::new(1));
    }

    fn lit(s: &str) -> MethodBody {
        MethodBody::Literal(s.into())
    }

    #[test]
    fn test_literal_and_static_call() {
        let table = ClassTable::new();
        class(&table, "demo.Greeter", None, &[("text", lit("hello"))]);
        class(
            &table,
            "demo.Home",
            None,
            &[(
                "index",
                MethodBody::CallStatic {
                    class: ClassName::new("demo.Greeter"),
                    method: "text".into(),
                },
            )],
        );

        assert_eq!(
            invoke(&table, &ClassName::new("demo.Home"), "index").unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_inherited_method() {
        let table = ClassTable::new();
        class(&table, "demo.Base", None, &[("shared", lit("base"))]);
        class(&table, "demo.Child", Some("demo.Base"), &[]);

        assert_eq!(
            invoke(&table, &ClassName::new("demo.Child"), "shared").unwrap(),
            "base"
        );
    }

    #[test]
    fn test_self_call_dispatches_from_receiver() {
        let table = ClassTable::new();
        // Base.describe calls this.kind(); Child overrides kind
        class(
            &table,
            "demo.Base",
            None,
            &[
                (
                    "describe",
                    MethodBody::CallSelf {
                        method: "kind".into(),
                    },
                ),
                ("kind", lit("base")),
            ],
        );
        class(&table, "demo.Child", Some("demo.Base"), &[("kind", lit("child"))]);

        assert_eq!(
            invoke(&table, &ClassName::new("demo.Child"), "describe").unwrap(),
            "child"
        );
        assert_eq!(
            invoke(&table, &ClassName::new("demo.Base"), "describe").unwrap(),
            "base"
        );
    }

    #[test]
    fn test_calls_bind_late_after_redefinition() {
        let table = ClassTable::new();
        class(&table, "demo.B", None, &[("text", lit("v1"))]);
        class(
            &table,
            "demo.A",
            None,
            &[(
                "go",
                MethodBody::CallStatic {
                    class: ClassName::new("demo.B"),
                    method: "text".into(),
                },
            )],
        );

        let a_before = table.get(&ClassName::new("demo.A")).unwrap();
        assert_eq!(invoke(&table, &ClassName::new("demo.A"), "go").unwrap(), "v1");

        // Swap B's body; A is untouched
        class(&table, "demo.B", None, &[("text", lit("v2"))]);

        assert_eq!(invoke(&table, &ClassName::new("demo.A"), "go").unwrap(), "v2");
        let a_after = table.get(&ClassName::new("demo.A")).unwrap();
        assert!(Arc::ptr_eq(&a_before, &a_after));
        assert_eq!(a_after.version(), 1);
    }

    #[test]
    fn test_unresolved_method() {
        let table = ClassTable::new();
        class(&table, "demo.A", None, &[]);
        let err = invoke(&table, &ClassName::new("demo.A"), "nope").unwrap_err();
        assert!(matches!(err, InvokeError::UnresolvedMethod { .. }));
    }

    #[test]
    fn test_unresolved_class() {
        let table = ClassTable::new();
        let err = invoke(&table, &ClassName::new("demo.Ghost"), "m").unwrap_err();
        assert!(matches!(err, InvokeError::UnresolvedClass(_)));
    }

    #[test]
    fn test_call_cycle_hits_depth_limit() {
        let table = ClassTable::new();
        class(
            &table,
            "demo.Loop",
            None,
            &[(
                "spin",
                MethodBody::CallSelf {
                    method: "spin".into(),
                },
            )],
        );
        let err = invoke(&table, &ClassName::new("demo.Loop"), "spin").unwrap_err();
        assert!(matches!(err, InvokeError::DepthExceeded(_)));
    }

    #[test]
    fn test_superclass_cycle_detected() {
        let table = ClassTable::new();
        class(&table, "demo.A", Some("demo.B"), &[]);
        class(&table, "demo.B", Some("demo.A"), &[]);
        let err = invoke(&table, &ClassName::new("demo.A"), "m").unwrap_err();
        assert!(matches!(err, InvokeError::SuperclassCycle(_)));
    }
}
