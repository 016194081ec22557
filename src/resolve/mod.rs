/// Two-phase configuration resolution.
///
/// Order matters: the expression pass runs first (deferred expressions become
/// markers or nulls), then the template pass substitutes run-time keywords
/// into string leaves. Resolved text is never re-classified.
pub mod expr;
pub mod keywords;
pub mod template;
pub mod walker;

pub use expr::{classify, DeferredExpr};
pub use keywords::parse_keywords;
pub use template::{required_keywords, substitute_templates};
pub use walker::{resolve_expressions, PathStep};
