pub mod filesystem;

pub use filesystem::{FileStorage, StagedFile};
