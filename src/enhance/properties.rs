//! Field accessor synthesis.
//!
//! Every declared field gets an accessor method of the same name
//! unless the class already declares one, so templates can call
//! `post.title()` whether or not the author wrote the accessor.

use crate::bytecode::{ClassImage, MethodBody, MethodDecl};

use super::{EnhanceContext, Transform, TransformError};

pub struct PropertiesTransform;

impl Transform for PropertiesTransform {
    fn id(&self) -> &'static str {
        "properties"
    }

    fn apply(&self, image: &mut ClassImage, _ctx: &EnhanceContext) -> Result<(), TransformError> {
        let missing: Vec<String> = image
            .fields
            .iter()
            .filter(|f| image.method(&f.name).is_none())
            .map(|f| f.name.clone())
            .collect();
        for name in missing {
            let body = MethodBody::Literal(format!("field:{name}"));
            image.methods.push(MethodDecl { name, body });
        }
        Ok(())
    }
}
