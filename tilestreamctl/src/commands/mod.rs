mod plan;
mod render;
mod slice;

pub use plan::{PlanArgs, plan};
pub use render::{RenderArgs, render};
pub use slice::{SliceArgs, slice};
