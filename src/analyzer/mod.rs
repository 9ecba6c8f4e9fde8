//! SQLite `EXPLAIN` bytecode analyzer.
//!
//! Reconstructs, from the opcode trace of a statement, which columns of each
//! scanned table or index are used for filtering and ordering, which indexes
//! were chosen, and whether an index exists that covers both.
//!
//! # Submodules
//! - `opcode` : typed trace rows, opcode classification, bounded scans
//! - `unit` : `AnalysisUnit` and the arena that owns them
//! - `registry` : cursor to unit resolution, including index to table linkage
//! - `predicate` : WHERE columns and reconstructed comparison expressions
//! - `literal` : constant recovery and quoting for those expressions
//! - `sort_key` : ORDER BY columns from sort idioms and ordered walks
//! - `lexical` : best-effort token patterns over the SQL text
//! - `covering` : covering-index verdicts
//! - `subquery` : sub-select recursion and merge
//!
//! The trace extraction itself is synchronous and infallible. Only the
//! EXPLAIN of the top-level statement can fail an analysis.

pub mod covering;
pub mod lexical;
pub(crate) mod linkage;
pub mod literal;
pub mod opcode;
pub mod predicate;
pub mod registry;
pub mod sort_key;
pub mod subquery;
pub mod unit;


use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::query::explain::ExplainProvider;
use crate::schema::Catalog;
use opcode::{OpcodeRow, Trace};
use registry::{CursorRegistry, TraceScope};
pub use unit::{AnalysisUnit, IndexColumn, IndexRef};
use unit::UnitArena;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("EXPLAIN failed for `{sql}`: {source:#}")]
    Explain {
        sql: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("schema catalog unavailable: {0:#}")]
    Catalog(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    /// Explain and merge parenthesized sub-selects.
    pub analyze_subqueries: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            analyze_subqueries: true,
        }
    }
}

/// Public entry point. Borrows the catalog and the EXPLAIN provider for the
/// duration of one or more analyses; holds no state between calls.
pub struct Analyzer<'a, P> {
    pub(crate) catalog: &'a dyn Catalog,
    pub(crate) provider: &'a P,
    options: AnalyzeOptions,
}

impl<'a, P: ExplainProvider> Analyzer<'a, P> {
    pub fn new(catalog: &'a dyn Catalog, provider: &'a P) -> Self {
        Self {
            catalog,
            provider,
            options: AnalyzeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalyzeOptions) -> Self {
        self.options = options;
        self
    }

    /// Explain `sql` and analyze its trace.
    pub async fn analyze(&self, sql: &str) -> Result<Vec<AnalysisUnit>, AnalyzeError> {
        let rows = self
            .provider
            .explain(sql)
            .await
            .map_err(|source| AnalyzeError::Explain {
                sql: sql.to_string(),
                source,
            })?;
        Ok(self.analyze_trace(sql, rows).await)
    }

    /// Analyze a trace already in hand. Sub-selects are still explained
    /// through the provider.
    pub async fn analyze_trace(&self, sql: &str, rows: Vec<OpcodeRow>) -> Vec<AnalysisUnit> {
        let mut arena = self.units_for(sql, rows).await;
        covering::apply(&mut arena, self.catalog);
        arena.into_units()
    }

    /// Extraction plus sub-select recursion, without covering verdicts.
    pub(crate) fn units_for<'f>(
        &'f self,
        sql: &'f str,
        rows: Vec<OpcodeRow>,
    ) -> Pin<Box<dyn Future<Output = UnitArena> + Send + 'f>> {
        Box::pin(async move {
            let mut arena = extract_units(self.catalog, sql, rows);
            if self.options.analyze_subqueries {
                subquery::merge_subqueries(&mut arena, self, sql).await;
            }
            arena
        })
    }
}

/// Cursor resolution, WHERE and ORDER BY extraction over one trace.
pub fn extract_units(catalog: &dyn Catalog, sql: &str, rows: Vec<OpcodeRow>) -> UnitArena {
    let trace = Trace::from_rows(rows);
    let tokens = lexical::tokenize(sql);
    let mut arena = UnitArena::new();
    let registry = CursorRegistry::scan(&mut arena, catalog, &trace);
    let scope = TraceScope {
        trace: &trace,
        catalog,
        registry: &registry,
        tokens: &tokens,
    };
    predicate::extract_where(&mut arena, &scope);
    sort_key::extract_order(&mut arena, &scope);
    tracing::debug!(units = arena.len(), rows = trace.len(), "Extracted trace");
    arena
}

/// Synchronous analysis of one trace with no sub-select recursion.
pub fn analyze_single_trace(catalog: &dyn Catalog, sql: &str, rows: Vec<OpcodeRow>) -> Vec<AnalysisUnit> {
    let mut arena = extract_units(catalog, sql, rows);
    covering::apply(&mut arena, catalog);
    arena.into_units()
}
