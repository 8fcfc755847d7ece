//! Core types for synchronization reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity kinds reconciled by a synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Student,
    StudyCycle,
    Employee,
    OrganizationalUnit,
    Organization,
    Authority,
}

impl EntityKind {
    /// Pass order. Later passes read relationships earlier passes rebuilt.
    pub const SYNC_ORDER: [EntityKind; 6] = [
        EntityKind::Student,
        EntityKind::StudyCycle,
        EntityKind::Employee,
        EntityKind::OrganizationalUnit,
        EntityKind::Organization,
        EntityKind::Authority,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::StudyCycle => "study cycles",
            Self::Employee => "employees",
            Self::OrganizationalUnit => "organizational units",
            Self::Organization => "organizations",
            Self::Authority => "authorities",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A directory reference that could not be resolved to a local record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipWarning {
    /// Record holding the reference (e.g. study cycle key)
    pub source: String,
    /// Unresolved directory identifier
    pub target: String,
    /// Relationship name (e.g. "member", "head")
    pub relation: String,
}

impl RelationshipWarning {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }
}

impl fmt::Display for RelationshipWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} '{}' not found locally",
            self.source, self.relation, self.target
        )
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub kind: EntityKind,
    /// New entity rows
    pub created: usize,
    /// Existing entity rows matched and refreshed
    pub updated: usize,
    /// Rows whose freshness flag stayed false; for authorities, roles
    /// absent from the directory
    pub left_unsynced: usize,
    /// Rows removed (authority rows with unknown roles)
    pub deleted: usize,
    /// Login accounts created for new people
    pub accounts_created: usize,
    pub relationship_warnings: Vec<RelationshipWarning>,
    pub anomalies: Vec<String>,
}

impl PassReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            created: 0,
            updated: 0,
            left_unsynced: 0,
            deleted: 0,
            accounts_created: 0,
            relationship_warnings: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.relationship_warnings.is_empty() || !self.anomalies.is_empty()
    }

    pub(crate) fn warn(&mut self, warning: RelationshipWarning) {
        log::warn!("{}: {}", self.kind, warning);
        self.relationship_warnings.push(warning);
    }

    pub(crate) fn anomaly(&mut self, message: String) {
        log::warn!("{}: {}", self.kind, message);
        self.anomalies.push(message);
    }
}

/// Aggregate counts across passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTotals {
    pub created: usize,
    pub updated: usize,
    pub left_unsynced: usize,
    pub deleted: usize,
    pub accounts_created: usize,
    pub relationship_warnings: usize,
    pub anomalies: usize,
}

impl SyncTotals {
    /// Merge a pass into the totals
    pub fn add(&mut self, pass: &PassReport) {
        self.created += pass.created;
        self.updated += pass.updated;
        self.left_unsynced += pass.left_unsynced;
        self.deleted += pass.deleted;
        self.accounts_created += pass.accounts_created;
        self.relationship_warnings += pass.relationship_warnings.len();
        self.anomalies += pass.anomalies.len();
    }
}

/// Report of a synchronization run, complete or aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passes: Vec<PassReport>,
}

impl SyncReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            passes: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn pass(&self, kind: EntityKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    pub fn totals(&self) -> SyncTotals {
        let mut totals = SyncTotals::default();
        for pass in &self.passes {
            totals.add(pass);
        }
        totals
    }

    /// All unresolved references across passes
    pub fn relationship_warnings(&self) -> impl Iterator<Item = &RelationshipWarning> {
        self.passes.iter().flat_map(|p| p.relationship_warnings.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
