//! Graph format v3 → v4: `documentation` on the internal schema nodes.

use async_trait::async_trait;

use crate::migrations::schema::NodeAttributeAddQuery;
use crate::migrations::{execute_queries, MigrationResult};
use crate::model::{Branch, Timestamp};
use crate::query::{ops, BranchFilter, Query};
use crate::schema::AttributeSchema;
use crate::storage::GraphStore;
use crate::tx::TxMode;

use super::schema_nodes::SCHEMA_NODE_KIND;
use super::GraphMigration;

/// Add a `documentation` attribute to every internal schema node.
///
/// Depends on [`super::CoreSchemaNodeMigration`]: the internal schema
/// nodes must already exist with their anchors before an attribute can be
/// materialized on them. Reuses the ordinary attribute-add machinery, run
/// on the default branch.
pub struct SchemaDocumentationMigration;

impl SchemaDocumentationMigration {
    fn attribute() -> AttributeSchema {
        AttributeSchema::new("documentation", "Text")
    }
}

#[async_trait]
impl<S: GraphStore> GraphMigration<S> for SchemaDocumentationMigration {
    fn name(&self) -> &'static str {
        "schema_documentation"
    }

    fn minimum_version(&self) -> i64 {
        3
    }

    async fn execute(&self, store: &S) -> MigrationResult {
        let at = Timestamp::now();
        let branch = Branch::main(at);
        let filter = match BranchFilter::isolated(&branch, Some(at)) {
            Ok(filter) => filter,
            Err(e) => return MigrationResult::from_error(e),
        };
        let mut queries: Vec<Box<dyn Query<S>>> = vec![Box::new(NodeAttributeAddQuery::new(
            SCHEMA_NODE_KIND.to_string(),
            Self::attribute(),
            branch,
            filter,
            at,
        ))];
        execute_queries(store, &mut queries).await
    }

    async fn validate_migration(&self, store: &S) -> MigrationResult {
        let mut result = MigrationResult::default();
        let check = async {
            let tx = store.begin_tx(TxMode::ReadOnly).await?;
            let filter = BranchFilter::isolated(&Branch::main(Timestamp::now()), None)?;
            let alive = ops::active_nodes_of_kind(store, &tx, &filter, SCHEMA_NODE_KIND).await?;
            let mut errors = Vec::new();
            for node in &alive {
                let attribute =
                    ops::active_attribute(store, &tx, &filter, node.id, "documentation").await?;
                if attribute.is_none() {
                    errors.push(format!(
                        "schema node {} has no documentation attribute",
                        node.name().unwrap_or("?")
                    ));
                }
            }
            Ok::<_, crate::Error>(errors)
        };
        match check.await {
            Ok(errors) => result.errors = errors,
            Err(e) => result.errors.push(e.to_string()),
        }
        result
    }
}
