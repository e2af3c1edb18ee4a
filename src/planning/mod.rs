pub mod resolver;

pub use resolver::{resolve_plan, TestPlan};
