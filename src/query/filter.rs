//! Branch/time visibility filter.
//!
//! Pure function of (branch ancestry, timestamp): no I/O, no storage
//! dependency. The same clause list drives both in-process evaluation
//! (`matches`) and the textual predicate handed to statement-based drivers
//! (`predicate`), so the two paths cannot drift apart.

use std::collections::BTreeMap;

use crate::model::{Branch, EdgeRecord, Timestamp};
use crate::registry::RegistryContext;
use crate::Result;

/// One disjunct of the visibility predicate: records on `branch` count if
/// visible at `time_limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub branch: String,
    pub time_limit: Timestamp,
}

impl FilterClause {
    fn matches(&self, record: &EdgeRecord) -> bool {
        record.branch == self.branch
            && record.from <= self.time_limit
            && record.to.is_none_or(|to| to > self.time_limit)
    }
}

/// The visibility predicate for one branch at one instant.
///
/// The first clause is the branch itself at `at`; each ancestor follows
/// with its time capped at the fork point crossed to reach it — a branch's
/// own edits shadow the parent's at-or-after the fork, while the parent's
/// earlier history stays visible.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFilter {
    clauses: Vec<FilterClause>,
}

impl BranchFilter {
    /// Build the filter for `branch` at `at` (defaults to now).
    ///
    /// Branch names compare case-sensitively and exactly; an origin branch
    /// missing from the registry is an error.
    pub fn build(
        branch: &Branch,
        registry: &RegistryContext,
        at: Option<Timestamp>,
    ) -> Result<Self> {
        let at = Timestamp::resolve(at);
        let mut clauses = vec![FilterClause { branch: branch.name.clone(), time_limit: at }];

        let mut cap = at;
        let mut current = branch.clone();
        while let Some(origin_name) = current.origin_branch.clone() {
            cap = cap.min(current.branched_from);
            let origin = registry.get_branch(&origin_name)?;
            clauses.push(FilterClause { branch: origin.name.clone(), time_limit: cap });
            current = origin.clone();
        }

        Ok(Self { clauses })
    }

    /// Filter for a branch with no origin (the default branch), needing no
    /// registry. Errors if the branch actually has an origin.
    pub fn isolated(branch: &Branch, at: Option<Timestamp>) -> Result<Self> {
        if let Some(origin) = &branch.origin_branch {
            return Err(crate::Error::Branch(format!(
                "branch {} has origin {origin}; build its filter through the registry",
                branch.name
            )));
        }
        let at = Timestamp::resolve(at);
        Ok(Self {
            clauses: vec![FilterClause { branch: branch.name.clone(), time_limit: at }],
        })
    }

    /// In-process evaluation: is `record` visible under this filter?
    pub fn matches(&self, record: &EdgeRecord) -> bool {
        self.clauses.iter().any(|c| c.matches(record))
    }

    /// Render the equivalent textual predicate for a statement-based
    /// driver, binding `var` as the edge variable. Returns the fragment
    /// and its named parameters.
    pub fn predicate(&self, var: &str) -> (String, BTreeMap<String, String>) {
        let mut params = BTreeMap::new();
        let mut parts = Vec::with_capacity(self.clauses.len());
        for (i, clause) in self.clauses.iter().enumerate() {
            let branch_param = format!("branch{i}");
            let time_param = format!("time{i}");
            parts.push(format!(
                "({var}.branch = ${branch_param} AND {var}.from <= ${time_param} \
                 AND ({var}.to IS NULL OR {var}.to > ${time_param}))"
            ));
            params.insert(branch_param, clause.branch.clone());
            params.insert(time_param, clause.time_limit.to_string_canonical());
        }
        (format!("({})", parts.join(" OR ")), params)
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }
}
