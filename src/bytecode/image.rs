//! Compiled class structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::ClassName;

/// A field declaration: `field title: string`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
}

impl FieldDecl {
    /// Signature string used for shape comparison (`title:string`).
    pub fn signature(&self) -> String {
        format!("{}:{}", self.name, self.ty)
    }
}

/// A method body expression.
///
/// The language keeps bodies deliberately small: a constant, a call to
/// a static method on another class, or a call on the receiver. That is
/// enough to observe late binding across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodBody {
    /// `method greet() = "hello"`
    Literal(String),
    /// `method greet() = demo.Greeter.text()`
    CallStatic { class: ClassName, method: String },
    /// `method greet() = this.text()`
    CallSelf { method: String },
}

/// A method declaration: `method greet() = EXPR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub body: MethodBody,
}

/// One compiled class.
///
/// `attributes` is a free-form side table written by the enhancement
/// pipeline (markers, synthesized metadata). It never participates in
/// the [`Shape`], so enhancement alone can not turn a body edit into a
/// structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassImage {
    pub name: ClassName,
    pub superclass: Option<ClassName>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ClassImage {
    pub fn new(name: ClassName, superclass: Option<ClassName>) -> Self {
        Self {
            name,
            superclass,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Find a declared method by name (no inherited lookup).
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Find a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[inline]
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Classes this image references: superclass, class-typed fields
    /// and static call targets. Drives dependency fan-out when the
    /// class is redefined.
    pub fn references(&self) -> Vec<ClassName> {
        let mut refs = Vec::new();
        if let Some(superclass) = &self.superclass {
            refs.push(superclass.clone());
        }
        for field in &self.fields {
            if field.ty.contains('.') {
                refs.push(ClassName::new(field.ty.clone()));
            }
        }
        for method in &self.methods {
            if let MethodBody::CallStatic { class, .. } = &method.body {
                refs.push(class.clone());
            }
        }
        refs.sort();
        refs.dedup();
        refs
    }

    /// Compute the swap-compatibility shape of this image.
    ///
    /// Member order in source is not structural: signatures are sorted
    /// so reordering declarations stays a body-level change.
    pub fn shape(&self) -> Shape {
        let mut fields: Vec<String> = self.fields.iter().map(FieldDecl::signature).collect();
        fields.sort();
        let mut methods: Vec<String> = self.methods.iter().map(|m| m.name.clone()).collect();
        methods.sort();
        Shape {
            superclass: self.superclass.clone(),
            fields,
            methods,
        }
    }
}

/// Structural identity of a class: everything except method bodies.
///
/// Equal shapes mean a live redefinition is allowed; unequal shapes
/// force a full restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub superclass: Option<ClassName>,
    pub fields: Vec<String>,
    pub methods: Vec<String>,
}

impl Shape {
    /// Human-readable description of what differs between two shapes.
    ///
    /// Used in restart diagnostics. Returns `None` when shapes match.
    pub fn diff(&self, other: &Shape) -> Option<String> {
        if self == other {
            return None;
        }
        if self.superclass != other.superclass {
            return Some(format!(
                "superclass changed ({} -> {})",
                display_super(&self.superclass),
                display_super(&other.superclass)
            ));
        }
        if self.fields != other.fields {
            return Some("field set changed".to_string());
        }
        Some("method set changed".to_string())
    }
}

fn display_super(superclass: &Option<ClassName>) -> String {
    superclass
        .as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}
