//! In-memory datasource for exercising relations end to end.
//!
//! Queries are rendered with the reference SQL builder and recorded; every
//! query returns the same canned rows.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use relgraph::datasource::{
    Datasource, DatasourceError, ExecutableQuery, QueryBuilder, ResultCursor, Row, SqlDialect,
    SqlQueryBuilder,
};
use relgraph::entity::EntitySchema;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct State {
    existing: HashSet<String>,
    created: Vec<String>,
    executed: Vec<ExecutedQuery>,
}

pub struct FakeDatasource {
    identity: String,
    dialect: SqlDialect,
    rows: Vec<Row>,
    fail_execution: bool,
    state: Arc<Mutex<State>>,
}

impl FakeDatasource {
    pub fn new(identity: &str, rows: Vec<Row>) -> Self {
        FakeDatasource {
            identity: identity.to_string(),
            dialect: SqlDialect::Ansi,
            rows,
            fail_execution: false,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn failing(identity: &str) -> Self {
        FakeDatasource {
            fail_execution: true,
            ..FakeDatasource::new(identity, Vec::new())
        }
    }

    pub fn with_existing(self, set_name: &str) -> Self {
        self.state.lock().unwrap().existing.insert(set_name.to_string());
        self
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.state.lock().unwrap().executed.clone()
    }
}

pub struct FakeQuery {
    builder: SqlQueryBuilder,
    rows: Vec<Row>,
    fail: bool,
    state: Arc<Mutex<State>>,
}

impl QueryBuilder for FakeQuery {
    fn add_joined_set(&mut self, set_expression: &str, condition: &str, params: &[Value]) {
        self.builder.add_joined_set(set_expression, condition, params);
    }

    fn add_filter(&mut self, condition: &str, params: &[Value]) {
        self.builder.add_filter(condition, params);
    }

    fn add_projected_property(&mut self, qualified_name: &str, alias: Option<&str>) {
        self.builder.add_projected_property(qualified_name, alias);
    }

    fn add_sort(&mut self, qualified_name: &str, ascending: bool) {
        self.builder.add_sort(qualified_name, ascending);
    }

    fn limit(&mut self, count: u64, offset: u64) {
        self.builder.limit(count, offset);
    }
}

#[async_trait]
impl ExecutableQuery for FakeQuery {
    async fn execute(&mut self) -> Result<ResultCursor, DatasourceError> {
        self.state.lock().unwrap().executed.push(ExecutedQuery {
            sql: self.builder.to_sql(),
            params: self.builder.params(),
        });
        if self.fail {
            return Err(DatasourceError::Execution("connection reset".to_string()));
        }
        Ok(ResultCursor::new(self.rows.clone()))
    }
}

#[async_trait]
impl Datasource for FakeDatasource {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn create_query(&self, set_expression: &str) -> Box<dyn ExecutableQuery> {
        Box::new(FakeQuery {
            builder: SqlQueryBuilder::new(self.dialect, set_expression),
            rows: self.rows.clone(),
            fail: self.fail_execution,
            state: self.state.clone(),
        })
    }

    async fn dataset_exists(&self, name: &str) -> Result<bool, DatasourceError> {
        Ok(self.state.lock().unwrap().existing.contains(name))
    }

    async fn create_dataset(
        &self,
        name: &str,
        _schema: &EntitySchema,
        _id_properties: &[String],
    ) -> Result<bool, DatasourceError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(name.to_string());
        Ok(state.existing.insert(name.to_string()))
    }
}
