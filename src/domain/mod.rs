// ============================================================================
// Domain Layer - Reference Consumers of the Engine
// ============================================================================
//
// One subdirectory per aggregate: value objects, events, commands, business
// errors, the aggregate, its command handler, and the read model it feeds
// together with the queries served from it.
//
// Domain code depends on the engine; the engine never depends on it.
//
// ============================================================================

pub mod user;
