pub mod attachments;
pub mod flatten;

pub use attachments::{AttachmentFile, MaterializedPrompt, materialize};
pub use flatten::{AttachmentSpec, FlattenedPrompt, flatten};
