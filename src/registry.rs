//! Registry context: the branch table and the migration lookup table.
//!
//! Explicitly constructed at startup and threaded through every call — no
//! ambient global state. Branch metadata is resolved synchronously from
//! here (never fetched mid-query), and schema-change operations map to
//! their concrete migrations through a table resolved once, never via
//! runtime reflection.

use std::collections::HashMap;

use crate::migrations::SchemaMigration;
use crate::model::{Branch, Timestamp, DEFAULT_BRANCH};
use crate::schema::{NodeSchema, SchemaPath};
use crate::{Error, Result};

/// Builds the concrete migration for one schema-change operation.
/// Arguments: schema path, new node schema, previous node schema.
pub type MigrationConstructor =
    fn(SchemaPath, Option<NodeSchema>, Option<NodeSchema>) -> Result<SchemaMigration>;

/// Branch table + migration table, built once at startup.
pub struct RegistryContext {
    branches: HashMap<String, Branch>,
    migration_map: HashMap<&'static str, Option<MigrationConstructor>>,
}

impl RegistryContext {
    /// Fresh context: default branch rooted now, full migration map.
    pub fn init() -> Self {
        Self::with_default_branch(Timestamp::now())
    }

    /// Fresh context with the default branch rooted at `branched_from`.
    pub fn with_default_branch(branched_from: Timestamp) -> Self {
        let main = Branch::main(branched_from);
        let mut branches = HashMap::new();
        branches.insert(main.name.clone(), main);
        Self {
            branches,
            migration_map: migration_map(),
        }
    }

    // ========================================================================
    // Branch table
    // ========================================================================

    /// Resolve a branch by exact, case-sensitive name.
    pub fn get_branch(&self, name: &str) -> Result<&Branch> {
        self.branches
            .get(name)
            .ok_or_else(|| Error::Branch(format!("branch {name} is not registered")))
    }

    pub fn default_branch(&self) -> &Branch {
        // The default branch is inserted at construction and never removed.
        &self.branches[DEFAULT_BRANCH]
    }

    /// Register an externally built branch. Duplicate names are rejected.
    pub fn add_branch(&mut self, branch: Branch) -> Result<()> {
        if self.branches.contains_key(&branch.name) {
            return Err(Error::Branch(format!("branch {} already exists", branch.name)));
        }
        self.branches.insert(branch.name.clone(), branch);
        Ok(())
    }

    /// Fork `origin` at `at` and register the result.
    pub fn create_branch(
        &mut self,
        name: impl Into<String>,
        origin: &str,
        at: Timestamp,
    ) -> Result<&Branch> {
        let name = name.into();
        let forked = self.get_branch(origin)?.fork(name.clone(), at);
        self.add_branch(forked)?;
        Ok(&self.branches[&name])
    }

    /// Drop a branch from the active registry. The default branch cannot
    /// be deleted.
    pub fn delete_branch(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_BRANCH {
            return Err(Error::Branch("the default branch cannot be deleted".into()));
        }
        self.branches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::Branch(format!("branch {name} is not registered")))
    }

    pub fn branch_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.branches.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // Migration table
    // ========================================================================

    /// The constructor for a schema-change operation. `Ok(None)` means the
    /// operation needs no graph rewrite; an unknown operation is an error.
    pub fn migration_for(&self, operation: &str) -> Result<Option<MigrationConstructor>> {
        self.migration_map
            .get(operation)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("schema operation {operation}")))
    }
}

// ============================================================================
// MIGRATION_MAP
// ============================================================================

fn require_schema(
    schema: Option<NodeSchema>,
    which: &str,
    operation: &str,
) -> Result<NodeSchema> {
    schema.ok_or_else(|| Error::SchemaPath(format!("{operation} requires {which}")))
}

fn attribute_add(
    path: SchemaPath,
    new: Option<NodeSchema>,
    _prev: Option<NodeSchema>,
) -> Result<SchemaMigration> {
    SchemaMigration::node_attribute_add(path, require_schema(new, "new_node_schema", "node.attribute.add")?)
}

fn attribute_remove(
    path: SchemaPath,
    _new: Option<NodeSchema>,
    prev: Option<NodeSchema>,
) -> Result<SchemaMigration> {
    SchemaMigration::node_attribute_remove(
        path,
        require_schema(prev, "previous_node_schema", "node.attribute.remove")?,
    )
}

fn attribute_name_update(
    path: SchemaPath,
    new: Option<NodeSchema>,
    prev: Option<NodeSchema>,
) -> Result<SchemaMigration> {
    SchemaMigration::attribute_name_update(
        path,
        require_schema(new, "new_node_schema", "attribute.name.update")?,
        require_schema(prev, "previous_node_schema", "attribute.name.update")?,
    )
}

fn node_kind_update(
    path: SchemaPath,
    new: Option<NodeSchema>,
    prev: Option<NodeSchema>,
) -> Result<SchemaMigration> {
    SchemaMigration::node_kind_update(
        path,
        require_schema(new, "new_node_schema", "node.name.update")?,
        require_schema(prev, "previous_node_schema", "node.name.update")?,
    )
}

fn node_remove(
    path: SchemaPath,
    _new: Option<NodeSchema>,
    prev: Option<NodeSchema>,
) -> Result<SchemaMigration> {
    SchemaMigration::node_remove(path, require_schema(prev, "previous_node_schema", "node.remove")?)
}

/// Operation name → concrete migration constructor. `None` entries are
/// metadata-only changes that rewrite nothing in the graph.
fn migration_map() -> HashMap<&'static str, Option<MigrationConstructor>> {
    HashMap::from([
        ("node.attribute.add", Some(attribute_add as MigrationConstructor)),
        ("node.attribute.remove", Some(attribute_remove as MigrationConstructor)),
        ("attribute.name.update", Some(attribute_name_update as MigrationConstructor)),
        ("node.name.update", Some(node_kind_update as MigrationConstructor)),
        ("node.namespace.update", Some(node_kind_update as MigrationConstructor)),
        ("node.remove", Some(node_remove as MigrationConstructor)),
        ("attribute.branch.update", None),
        ("attribute.description.update", None),
        ("attribute.label.update", None),
        ("node.description.update", None),
    ])
}
