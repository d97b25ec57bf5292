use std::time::Duration;

use futures::future;
use tracing::{info, warn};

use crate::error::{SplitDiffError, SplitDiffResult};
use crate::schema::definition::{SchemaDefinition, diff_schemas};
use crate::schema::filter::TableFilter;
use crate::topology::TabletManagerClient;
use crate::topology::remote::remote_call;
use crate::types::TabletInfo;

/// Schemas of both worker tablets, ready to be diffed table by table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledSchemas {
    pub destination: SchemaDefinition,
    /// Source schema restricted to the tables moved by the split.
    pub source: SchemaDefinition,
    /// Differences between the two schemas, empty if they agree.
    pub mismatches: Vec<String>,
}

impl ReconciledSchemas {
    pub fn schemas_match(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Fetches and compares the schemas of the destination and source worker tablets.
#[derive(Debug, Clone)]
pub struct SchemaReconciler<M> {
    tablet_manager: M,
    timeout: Duration,
    exclude_tables: Vec<String>,
    anchor_table_filters: bool,
}

impl<M> SchemaReconciler<M>
where
    M: TabletManagerClient,
{
    pub fn new(
        tablet_manager: M,
        timeout: Duration,
        exclude_tables: Vec<String>,
        anchor_table_filters: bool,
    ) -> Self {
        Self {
            tablet_manager,
            timeout,
            exclude_tables,
            anchor_table_filters,
        }
    }

    /// Fetches both schemas concurrently and keeps the source tables matching `table_filters`.
    ///
    /// Failing to fetch either schema fails the reconciliation. Schema differences do not:
    /// they are logged and returned in [`ReconciledSchemas::mismatches`].
    pub async fn reconcile(
        &self,
        destination: &TabletInfo,
        source: &TabletInfo,
        table_filters: &[String],
    ) -> SplitDiffResult<ReconciledSchemas> {
        let filter = TableFilter::new(table_filters, self.anchor_table_filters)?;

        info!(
            "fetching schemas of destination {} and source {}",
            destination.alias, source.alias
        );
        let (destination_result, source_result) = future::join(
            self.get_schema(destination),
            self.get_schema(source),
        )
        .await;

        let (destination_schema, source_schema) = match (destination_result, source_result) {
            (Ok(destination_schema), Ok(source_schema)) => (destination_schema, source_schema),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => return Err(err),
            (Err(destination_err), Err(source_err)) => {
                return Err(SplitDiffError::many(vec![destination_err, source_err]));
            }
        };

        let source_schema = filter.filter_schema(source_schema);

        info!("diffing the schema");
        let mismatches = diff_schemas(
            "destination",
            &destination_schema,
            "source",
            &source_schema,
        );
        if mismatches.is_empty() {
            info!("schema match, good");
        } else {
            warn!(
                "different schemas, diffing every destination table anyway: {}",
                mismatches.join("\n")
            );
        }

        Ok(ReconciledSchemas {
            destination: destination_schema,
            source: source_schema,
            mismatches,
        })
    }

    async fn get_schema(&self, tablet: &TabletInfo) -> SplitDiffResult<SchemaDefinition> {
        remote_call(
            self.timeout,
            "GetSchema",
            &tablet.alias,
            self.tablet_manager
                .get_schema(tablet, &[], &self.exclude_tables, false),
        )
        .await
    }
}
