pub mod descriptor;
pub mod resolve;
pub mod validate;

pub use descriptor::{Descriptor, DynamicTypeDescriptor, Field, Kind, ObjectShape, ScalarKind, describe};
pub use resolve::{resolve, resolve_refs};
pub use validate::{Violation, validate};
