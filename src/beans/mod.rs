pub mod class_def;
pub mod metadata;
pub mod property;
pub mod registry;

pub use class_def::{ClassDef, CtorDef, FieldDef, MethodBody, MethodDef, NativeFn, invoke_method};
pub use metadata::BeanMetadata;
pub use property::PropertyAccessor;
pub use registry::{ClassDefBuilder, TypeRegistry};
