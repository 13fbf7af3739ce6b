/// Identifier resolution.
///
/// Turns a URL, raw ID, or free-text name into a canonical object ID by
/// cascading through the identifier parser, the workspace cache, an
/// on-demand sync, and finally a remote search.
mod resolver;

pub use resolver::{entry_score, ResolveOptions, Resolver, SUGGESTION_FLOOR};
