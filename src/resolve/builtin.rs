//! Images for the built-in platform classes.

use crate::bytecode::{ClassImage, MethodBody, MethodDecl};
use crate::core::{ClassName, platform};

fn method(name: &str, literal: &str) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        body: MethodBody::Literal(literal.to_string()),
    }
}

/// Build the image for a platform class, or `None` for any other name.
///
/// Every platform class except `kiln.Object` extends `kiln.Object`, so
/// hierarchy walks over application classes terminate there.
pub fn platform_image(name: &ClassName) -> Option<ClassImage> {
    let kind = match name.as_str() {
        platform::OBJECT => "object",
        platform::MODEL => "model",
        platform::CONTROLLER => "controller",
        platform::JOB => "job",
        platform::PLUGIN => "plugin",
        _ => return None,
    };
    let superclass = if name.as_str() == platform::OBJECT {
        None
    } else {
        Some(ClassName::from(platform::OBJECT))
    };

    let mut image = ClassImage::new(name.clone(), superclass);
    image.methods.push(method("kind", kind));
    if name.as_str() == platform::MODEL {
        image.methods.push(method("save", "saved"));
    }
    image.set_attribute("kiln.platform", "true");
    Some(image)
}
