//! The tabular model (`DataModelSchema`, TMSL) as a folder tree.

pub mod data_sources;
pub mod expressions;
mod queries_lookup;
mod serializer;

pub use queries_lookup::{DataSourceIdCache, QueriesLookup};
pub use serializer::{MODEL_FOLDER, TabularModelSerializer};

/// Properties that change on every save without a model change. Removed at
/// any depth before the model is written.
pub const TIMESTAMP_PROPERTIES: &[&str] = &[
    "createdTimestamp",
    "lastUpdate",
    "lastSchemaUpdate",
    "lastProcessed",
    "modifiedTime",
    "structureModifiedTime",
    "refreshedTime",
];
