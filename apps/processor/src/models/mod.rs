pub mod resume;
pub mod upload;

pub use resume::{AccumulatedResult, OptimizeRequest};
pub use upload::{EntryPoint, ResumeUpload};
