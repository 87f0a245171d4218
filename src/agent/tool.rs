pub mod descriptor;
pub mod registry;

pub use descriptor::describe;
pub use registry::{RegisteredTool, ToolCandidate, ToolRegistry};
