//! SQL text to result batches, one explicit stage at a time.
//!
//! 1. parse exactly one statement in the configured dialect
//! 2. resolve every table reference against the context
//! 3. build and verify a read-only logical plan
//! 4. optimize, plan physically and collect
//! 5. wrap the batches in a [`QueryResult`]

use std::sync::Arc;

use datafusion::execution::context::{SQLOptions, SessionState};
use datafusion::logical_expr::LogicalPlan;
use datafusion::physical_plan::{ExecutionPlan, collect, displayable};
use datafusion::sql::parser::{DFParser, Statement};
use datafusion::sql::sqlparser::dialect::dialect_from_str;
use tracing::{debug, info};

use crate::context::QueryContext;
use crate::error::{SqlError, SqlResult};
use crate::result::QueryResult;

impl QueryContext {
    /// Run `sql` and collect its result.
    pub async fn execute(&self, sql: &str) -> SqlResult<QueryResult> {
        let state = self.session_context().state();
        let plan = self.plan(&state, sql).await?;

        let physical = state
            .create_physical_plan(&plan)
            .await
            .map_err(SqlError::planning)?;
        let schema = physical.schema();
        debug!("Physical plan:\n{}", displayable(physical.as_ref()).indent(true));

        let batches = collect(physical, self.session_context().task_ctx())
            .await
            .map_err(SqlError::execution)?;

        let result = QueryResult::try_new(schema, batches, self.config().batch_size)?;
        info!(
            "Query returned {} rows in {} batches",
            result.num_rows(),
            result.batch_count()
        );
        Ok(result)
    }

    /// The optimized logical plan of `sql`, without running it.
    pub async fn logical_plan(&self, sql: &str) -> SqlResult<LogicalPlan> {
        let state = self.session_context().state();
        let plan = self.plan(&state, sql).await?;
        state.optimize(&plan).map_err(SqlError::planning)
    }

    /// Indented rendering of the optimized logical and physical plans.
    pub async fn explain(&self, sql: &str) -> SqlResult<String> {
        let state = self.session_context().state();
        let plan = self.plan(&state, sql).await?;
        let optimized = state.optimize(&plan).map_err(SqlError::planning)?;
        let physical: Arc<dyn ExecutionPlan> = state
            .create_physical_plan(&plan)
            .await
            .map_err(SqlError::planning)?;

        Ok(format!(
            "logical_plan\n{}\n\nphysical_plan\n{}",
            optimized.display_indent(),
            displayable(physical.as_ref()).indent(false)
        ))
    }

    /// Stages 1 to 3.
    async fn plan(&self, state: &SessionState, sql: &str) -> SqlResult<LogicalPlan> {
        let statement = self.parse(sql)?;
        self.resolve(state, &statement)?;

        let plan = state
            .statement_to_plan(statement)
            .await
            .map_err(SqlError::planning)?;
        SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false)
            .verify_plan(&plan)
            .map_err(SqlError::planning)?;

        debug!("Logical plan:\n{}", plan.display_indent());
        Ok(plan)
    }

    fn parse(&self, sql: &str) -> SqlResult<Statement> {
        let dialect = dialect_from_str(&self.config().dialect).ok_or_else(|| {
            SqlError::Configuration(format!("Unsupported SQL dialect '{}'", self.config().dialect))
        })?;

        let mut statements = DFParser::parse_sql_with_dialect(sql, dialect.as_ref())
            .map_err(|e| SqlError::Parse(e.to_string()))?;
        match statements.len() {
            1 => statements
                .pop_front()
                .ok_or_else(|| SqlError::Parse("Missing statement".to_string())),
            0 => Err(SqlError::Parse("No SQL statement found".to_string())),
            n => Err(SqlError::Parse(format!(
                "Expected exactly one SQL statement, found {}",
                n
            ))),
        }
    }

    /// Fail with every unknown table name at once.
    fn resolve(&self, state: &SessionState, statement: &Statement) -> SqlResult<()> {
        let references = state
            .resolve_table_references(statement)
            .map_err(SqlError::planning)?;

        let mut missing = Vec::new();
        for reference in references {
            let name = reference.to_string();
            let exists = self
                .session_context()
                .table_exist(reference)
                .map_err(SqlError::planning)?;
            if !exists && !missing.contains(&name) {
                missing.push(name);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SqlError::UnresolvedTables(missing))
        }
    }
}
