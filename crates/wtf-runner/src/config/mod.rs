pub mod page;
pub mod params;
pub mod schema;
pub mod steps;

pub use page::{build_page, ChangeSpec, ElementSpec, PatchSpec};
pub use params::{ParamDef, Params};
pub use schema::{Config, WaitSettings};
pub use steps::{Expect, Step, Target, WaitOverride};
