pub mod client;
pub mod config_store;
pub mod error;
pub mod field_rule;
pub mod models;
pub mod oauth;
pub mod pagination;
pub mod projection;
pub mod row;
pub mod sink;

pub use client::{Auth, JiraClient, JiraConfig};
pub use error::{Error, ErrorKind};
pub use models::*;

// Field rule re-exports
pub use field_rule::{Encoding, FieldRule, FieldRuleSet, Projection, Shape};

// Projection re-exports
pub use projection::{ProjectionError, project};

// Row re-exports
pub use row::{ExportRow, FieldWarning, build_row, header_row};

// Pagination re-exports
pub use pagination::{
    ExportSummary, IssueSource, PaginationCursor, Paginator, SearchPage, SearchRequest, export,
};

// Config store re-exports
pub use config_store::{
    CredentialSource, CredentialsFile, ExportConfig, ExportOptions, FileConfigStore,
    ProjectionPolicy,
};

// OAuth re-exports
pub use oauth::{OAuthCredentials, OAuthSigner};

// Sink re-exports
pub use sink::{DelimitedWriter, RowSink, TeeSink};
