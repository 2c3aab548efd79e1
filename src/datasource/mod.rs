//! # Datasource contract
//!
//! The relation compiler never talks to a storage engine directly. Everything it
//! needs from one is expressed by three traits:
//!
//! - [`Datasource`]: identifier quoting, dataset existence/creation and query creation
//! - [`QueryBuilder`]: joined sets, filters, projection, sort and limit
//! - [`ExecutableQuery`]: a builder that can run itself and yield a [`ResultCursor`]
//!
//! Every string handed to a builder is an already-rendered fragment (quoted
//! identifiers, `?` placeholders). Parameters travel alongside each fragment in the
//! order their placeholders appear.
//!
//! [`SqlQueryBuilder`] is a reference builder that renders plain SQL text; it is
//! what the command-line tool prints and what connection adapters can wrap.

pub mod dialect;
pub mod errors;
pub mod sql;

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity::schema_types::EntitySchema;
use crate::entity::PropertyValues;

pub use dialect::SqlDialect;
pub use errors::DatasourceError;
pub use sql::SqlQueryBuilder;

/// One result row, keyed by projected column alias in projection order
pub type Row = PropertyValues;

/// Accumulates the parts of a query. Fragments are appended in call order.
pub trait QueryBuilder: Send {
    fn add_joined_set(&mut self, set_expression: &str, condition: &str, params: &[Value]);

    fn add_filter(&mut self, condition: &str, params: &[Value]);

    fn add_projected_property(&mut self, qualified_name: &str, alias: Option<&str>);

    fn add_sort(&mut self, qualified_name: &str, ascending: bool);

    fn limit(&mut self, count: u64, offset: u64);
}

/// A query builder bound to a live datasource
#[async_trait]
pub trait ExecutableQuery: QueryBuilder {
    async fn execute(&mut self) -> Result<ResultCursor, DatasourceError>;
}

/// Connection to a relational datasource.
///
/// `identity` must be stable for the lifetime of the connection; the schema
/// registry keys its memoization on it.
#[async_trait]
pub trait Datasource: Send + Sync {
    fn identity(&self) -> String;

    fn quote_identifier(&self, name: &str) -> String;

    /// Start a query whose FROM clause is `set_expression`
    fn create_query(&self, set_expression: &str) -> Box<dyn ExecutableQuery>;

    async fn dataset_exists(&self, name: &str) -> Result<bool, DatasourceError>;

    /// Create the dataset. Returns `false` when the datasource reports it already existed.
    async fn create_dataset(
        &self,
        name: &str,
        schema: &EntitySchema,
        id_properties: &[String],
    ) -> Result<bool, DatasourceError>;
}

/// Rows returned by an executed query, consumed front to back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCursor {
    rows: VecDeque<Row>,
}

impl ResultCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        ResultCursor { rows: rows.into() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Peek at the remaining rows without consuming them
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl From<Vec<Row>> for ResultCursor {
    fn from(rows: Vec<Row>) -> Self {
        ResultCursor::new(rows)
    }
}

impl Iterator for ResultCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.pop_front()
    }
}

/// Render `<set> AS <alias>` with the given quoting function
pub fn set_expression(quote: &dyn Fn(&str) -> String, set_name: &str, alias: &str) -> String {
    format!("{} AS {}", quote(set_name), quote(alias))
}

/// Create `name` unless the datasource already has it.
///
/// Returns whether a dataset was created by this call.
pub async fn create_if_absent(
    datasource: &dyn Datasource,
    name: &str,
    schema: &EntitySchema,
    id_properties: &[String],
) -> Result<bool, DatasourceError> {
    if datasource.dataset_exists(name).await? {
        log::debug!("Dataset `{}` already present on {}", name, datasource.identity());
        return Ok(false);
    }
    log::info!(
        "Creating dataset `{}` on {} ({} properties)",
        name,
        datasource.identity(),
        schema.len()
    );
    datasource.create_dataset(name, schema, id_properties).await
}
