/// Executor module - operator validation and execution
///
/// Structure:
/// - registry: stage allow-lists and the name -> handler dispatch table
/// - conditions: filter condition parsing and evaluation
/// - query: query-stage operators (projection, filtering, pivot, sort, append)
/// - calculate: calculate-stage column arithmetic
/// - aggregate: closed registry of aggregation functions
pub mod aggregate;
pub mod calculate;
pub mod conditions;
pub mod query;
pub mod registry;

pub use aggregate::AggFn;
pub use calculate::CalcOps;
pub use conditions::{parse_condition, Predicate};
pub use query::{CrosstabSpec, QueryOps, TabularEngine, TextMatch};
pub use registry::{Dispatcher, Stage};
