//! Docroot scoping: where a caller may read and write inside a repository, and what documents
//! live there.

pub mod cache;
pub mod catalog;
pub mod path_validator;
pub mod repo_config;
pub mod resolver;

pub use catalog::{CatalogError, CatalogRequest, DocumentCatalogService};
pub use path_validator::{OperationKind, RejectReason, ValidateOptions};
pub use resolver::{DocrootResolver, PathCheck, ResolveOptions};
