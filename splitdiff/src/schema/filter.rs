use regex::Regex;
use tracing::info;

use crate::error::{SplitDiffError, SplitDiffResult};
use crate::schema::definition::SchemaDefinition;

/// Selects the tables of a source shard that belong to a vertical split.
///
/// A table is selected as soon as one pattern matches its name; patterns are not
/// exclusive. Unanchored patterns match anywhere in the name.
#[derive(Debug, Clone)]
pub struct TableFilter {
    patterns: Vec<Regex>,
}

impl TableFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S], anchored: bool) -> SplitDiffResult<TableFilter> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                let result = if anchored {
                    Regex::new(&format!("^(?:{pattern})$"))
                } else {
                    Regex::new(pattern)
                };

                result.map_err(|err| {
                    SplitDiffError::from(err).context("compiling table filter")
                })
            })
            .collect::<SplitDiffResult<Vec<_>>>()?;

        Ok(TableFilter { patterns })
    }

    pub fn matches(&self, table_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.is_match(table_name))
    }

    /// Returns `schema` restricted to the tables this filter selects.
    pub fn filter_schema(&self, schema: SchemaDefinition) -> SchemaDefinition {
        let SchemaDefinition {
            database_schema,
            table_definitions,
        } = schema;

        let table_definitions = table_definitions
            .into_iter()
            .filter(|table| {
                let keep = self.matches(&table.name);
                if !keep {
                    info!(table = %table.name, "removing table from source schema");
                }

                keep
            })
            .collect();

        SchemaDefinition {
            database_schema,
            table_definitions,
        }
    }
}
