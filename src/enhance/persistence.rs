//! Finder synthesis for persistent models.
//!
//! Classes descending from `kiln.Model` (anywhere in the chain) are
//! entities: they get `find_all()` and `count()` finders and a
//! `kiln.entity` attribute the runtime uses to list persistent types.

use crate::bytecode::{ClassImage, MethodBody, MethodDecl};
use crate::core::{ClassName, platform};

use super::{EnhanceContext, Transform, TransformError, descends_from};

pub const ENTITY_ATTR: &str = "kiln.entity";

const FINDERS: &[(&str, &str)] = &[("find_all", "[]"), ("count", "0")];

pub struct PersistenceTransform;

impl Transform for PersistenceTransform {
    fn id(&self) -> &'static str {
        "persistence"
    }

    fn apply(&self, image: &mut ClassImage, ctx: &EnhanceContext) -> Result<(), TransformError> {
        let model = ClassName::new(platform::MODEL);
        let is_entity = descends_from(image, &model, ctx).map_err(|detail| TransformError {
            transform: self.id(),
            class: image.name.clone(),
            detail,
        })?;
        if !is_entity {
            return Ok(());
        }

        image.set_attribute(ENTITY_ATTR, "true");
        for (name, body) in FINDERS {
            if image.method(name).is_none() {
                image.methods.push(MethodDecl {
                    name: (*name).to_string(),
                    body: MethodBody::Literal((*body).to_string()),
                });
            }
        }
        Ok(())
    }
}
