pub mod compiler;
pub mod executor;
pub mod plan;

pub use compiler::compile;
pub use executor::execute;
pub use plan::{CompiledQuery, Derivation, FetchedColumn, PlanStep};
