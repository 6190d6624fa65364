//! Foreign-key constraint resolution across the drop/recreate cycle.
//!
//! Other tables may reference the archive target; their constraints must
//! be dropped just before `DROP TABLE` and recreated after restore. The
//! resolver turns catalog edges into both statement sets.

use permafrost_core::sql::{full_table_name, quote_ident};
use permafrost_core::{CatalogReader, ConstraintEdge, Error, Result, TableRef};

/// The two statement sets derived from a table's inbound foreign keys.
#[derive(Debug, Clone, Default)]
pub struct ConstraintPlan {
    /// `ALTER TABLE … DROP CONSTRAINT` per edge; executed in the drop
    /// transaction, before `DROP TABLE`.
    pub drop_statements: Vec<String>,
    /// `ALTER TABLE … ADD CONSTRAINT … FOREIGN KEY` per edge; appended to
    /// the DDL artifact so restore can re-link.
    pub add_statements: Vec<String>,
}

impl ConstraintPlan {
    pub fn is_empty(&self) -> bool {
        self.drop_statements.is_empty() && self.add_statements.is_empty()
    }
}

/// Builds a [`ConstraintPlan`] from catalog foreign-key edges.
pub struct ConstraintResolver;

impl ConstraintResolver {
    /// Fetch the edges referencing `target` and build the plan.
    pub async fn resolve(catalog: &dyn CatalogReader, target: &TableRef) -> Result<ConstraintPlan> {
        let edges = catalog
            .foreign_key_edges(target)
            .await
            .map_err(|e| Error::ConstraintResolution(e.to_string()))?;
        Self::plan(target, &edges)
    }

    /// Build the plan from already-fetched edges.
    ///
    /// The catalog is assumed complete: an edge missing any field is a
    /// fatal consistency error.
    pub fn plan(target: &TableRef, edges: &[ConstraintEdge]) -> Result<ConstraintPlan> {
        let mut plan = ConstraintPlan::default();

        for edge in edges {
            if edge.schema_name.is_empty()
                || edge.table_name.is_empty()
                || edge.constraint_name.is_empty()
                || edge.column_name.is_empty()
                || edge.ref_column_name.is_empty()
            {
                return Err(Error::Consistency("Missing constraint info".to_string()));
            }

            let referencing = TableRef::new(&edge.schema_name, &edge.table_name);
            plan.drop_statements.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                full_table_name(&referencing),
                quote_ident(&edge.constraint_name)
            ));
            plan.add_statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
                full_table_name(&referencing),
                quote_ident(&edge.constraint_name),
                quote_ident(&edge.column_name),
                full_table_name(target),
                quote_ident(&edge.ref_column_name)
            ));
        }

        Ok(plan)
    }
}
