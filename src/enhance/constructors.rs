//! Default constructor synthesis.
//!
//! Classes without a `new()` method get one returning a canonical
//! instance marker (`<demo.Post>`). Controllers and jobs are looked up
//! and instantiated by name, so every application class must be
//! constructible.

use crate::bytecode::{ClassImage, MethodBody, MethodDecl};

use super::{EnhanceContext, Transform, TransformError};

/// Attribute set when the constructor was synthesized rather than
/// declared.
pub const CTOR_ATTR: &str = "kiln.ctor";

pub struct ConstructorsTransform;

impl Transform for ConstructorsTransform {
    fn id(&self) -> &'static str {
        "constructors"
    }

    fn apply(&self, image: &mut ClassImage, _ctx: &EnhanceContext) -> Result<(), TransformError> {
        if image.method("new").is_none() {
            let marker = format!("<{}>", image.name);
            image.methods.push(MethodDecl {
                name: "new".into(),
                body: MethodBody::Literal(marker),
            });
            image.set_attribute(CTOR_ATTR, "default");
        }
        Ok(())
    }
}
