//! Capability groups and their derivation from reconciled entities
//!
//! The rule table is plain data handed to [`PermissionRegistrar::new`]. Group
//! membership is never diffed: [`PermissionRegistrar::prepare`] drops every
//! table-defined group and permission and creates them again, so a run
//! starts from empty groups and only the passes put people back in.

use crate::error::{Error, Result};
use faculty::{AccountId, Employee, Organization, Store, Student};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role a group grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Student,
    ThesisTopicAuthor,
    Supervisor,
    Reviewer,
    DepartmentHead,
    FacultyHead,
}

/// A permission definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub scope: String,
    pub codename: String,
    pub description: String,
}

/// Reference to a permission by scope and codename
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRef {
    pub scope: String,
    pub codename: String,
}

/// A group definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub capability: Capability,
    pub name: String,
    pub permissions: Vec<PermissionRef>,
}

/// Immutable set of permission and group definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    pub permissions: Vec<PermissionSpec>,
    pub groups: Vec<GroupSpec>,
}

pub const THESIS_TOPIC: &str = "thesis_topic";
pub const SUBMISSION_CRITERION: &str = "submission_criterion";
pub const SUBMISSION_CRITERION_VALUE: &str = "submission_criterion_value";
pub const AUTHORSHIP: &str = "authorship";
pub const REVIEW: &str = "review";
pub const THESIS: &str = "thesis";

const STANDARD_PERMISSIONS: &[(&str, &str, &str)] = &[
    (THESIS_TOPIC, "canCreate", "can create thesis subject"),
    (THESIS_TOPIC, "canModify", "can modify thesis subject"),
    (THESIS_TOPIC, "canCancel", "can cancel thesis subject"),
    (THESIS_TOPIC, "canPublish", "can publish thesis subject"),
    (THESIS_TOPIC, "canAccept", "can accept thesis subject"),
    (THESIS_TOPIC, "canReject", "can reject thesis subject"),
    (
        SUBMISSION_CRITERION,
        "canDefine",
        "can define criterion of submission for thesis subject",
    ),
    (
        SUBMISSION_CRITERION_VALUE,
        "canFill",
        "can fill value of criterion of submission for thesis subject",
    ),
    (AUTHORSHIP, "canAccept", "can accept submission for thesis subject"),
    (AUTHORSHIP, "canReject", "can reject submission for thesis subject"),
    (AUTHORSHIP, "canPropose", "can propose submission for thesis subject"),
    (AUTHORSHIP, "canCancel", "can cancel submission for thesis subject"),
    (REVIEW, "canPropose", "can propose reviewer"),
    (REVIEW, "canAssign", "can assign reviewer"),
    (REVIEW, "canWrite", "can write review"),
    (THESIS, "canAccept", "can accept thesis"),
    (THESIS, "canCancel", "can cancel thesis"),
];

const HEAD_PERMISSIONS: &[(&str, &str)] = &[
    (THESIS_TOPIC, "canAccept"),
    (THESIS_TOPIC, "canReject"),
    (REVIEW, "canAssign"),
];

const STANDARD_GROUPS: &[(Capability, &str, &[(&str, &str)])] = &[
    (
        Capability::Student,
        "students",
        &[
            (SUBMISSION_CRITERION_VALUE, "canFill"),
            (AUTHORSHIP, "canPropose"),
            (AUTHORSHIP, "canCancel"),
        ],
    ),
    (
        Capability::Supervisor,
        "supervisors",
        &[
            (REVIEW, "canPropose"),
            (THESIS, "canAccept"),
            (THESIS, "canCancel"),
        ],
    ),
    (Capability::Reviewer, "reviewers", &[(REVIEW, "canWrite")]),
    (
        Capability::ThesisTopicAuthor,
        "thesis-topic-authors",
        &[
            (THESIS_TOPIC, "canCreate"),
            (THESIS_TOPIC, "canModify"),
            (THESIS_TOPIC, "canCancel"),
            (THESIS_TOPIC, "canPublish"),
            (SUBMISSION_CRITERION, "canDefine"),
            (AUTHORSHIP, "canAccept"),
            (AUTHORSHIP, "canReject"),
        ],
    ),
    (Capability::FacultyHead, "heads-of-faculty", HEAD_PERMISSIONS),
    (
        Capability::DepartmentHead,
        "heads-of-departments",
        HEAD_PERMISSIONS,
    ),
];

impl PermissionTable {
    /// The faculty's fixed rule table: 17 permissions in 6 groups
    pub fn standard() -> Self {
        let permissions = STANDARD_PERMISSIONS
            .iter()
            .map(|(scope, codename, description)| PermissionSpec {
                scope: (*scope).to_string(),
                codename: (*codename).to_string(),
                description: (*description).to_string(),
            })
            .collect();
        let groups = STANDARD_GROUPS
            .iter()
            .map(|(capability, name, grants)| GroupSpec {
                capability: *capability,
                name: (*name).to_string(),
                permissions: grants
                    .iter()
                    .map(|(scope, codename)| PermissionRef {
                        scope: (*scope).to_string(),
                        codename: (*codename).to_string(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            permissions,
            groups,
        }
    }

    /// Name of the group granting `capability`
    pub fn group_name(&self, capability: Capability) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.capability == capability)
            .map(|g| g.name.as_str())
    }

    /// Check that permissions and groups are unique and every grant resolves
    pub fn validate(&self) -> Result<()> {
        let mut defined = HashSet::new();
        for p in &self.permissions {
            if !defined.insert((p.scope.as_str(), p.codename.as_str())) {
                return Err(Error::PermissionTable(format!(
                    "permission {}.{} defined twice",
                    p.scope, p.codename
                )));
            }
        }

        let mut names = HashSet::new();
        let mut capabilities = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(Error::PermissionTable(format!(
                    "group '{}' defined twice",
                    group.name
                )));
            }
            if !capabilities.insert(group.capability) {
                return Err(Error::PermissionTable(format!(
                    "capability {:?} granted by more than one group",
                    group.capability
                )));
            }
            if let Some(missing) = group
                .permissions
                .iter()
                .find(|r| !defined.contains(&(r.scope.as_str(), r.codename.as_str())))
            {
                return Err(Error::PermissionTable(format!(
                    "group '{}' grants undefined permission {}.{}",
                    group.name, missing.scope, missing.codename
                )));
            }
        }
        Ok(())
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Counts from [`PermissionRegistrar::prepare`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub groups_removed: usize,
    pub permissions_removed: usize,
    pub groups_created: usize,
    pub permissions_created: usize,
}

/// Puts people into capability groups according to a [`PermissionTable`]
#[derive(Debug, Clone)]
pub struct PermissionRegistrar {
    table: PermissionTable,
}

impl PermissionRegistrar {
    pub fn new(table: PermissionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    /// Drop and recreate every table-defined group and permission
    ///
    /// All memberships of those groups are lost.
    pub fn prepare(&self, store: &Store) -> Result<PrepareSummary> {
        self.table.validate()?;
        let mut summary = PrepareSummary::default();

        for spec in &self.table.groups {
            if let Some(group) = store.find_group(&spec.name)? {
                store.delete_group(group.id)?;
                summary.groups_removed += 1;
            }
        }
        for spec in &self.table.permissions {
            if let Some(permission) = store.find_permission(&spec.scope, &spec.codename)? {
                store.delete_permission(permission.id)?;
                summary.permissions_removed += 1;
            }
        }

        for spec in &self.table.permissions {
            store.create_permission(&spec.scope, &spec.codename, &spec.description)?;
            summary.permissions_created += 1;
        }
        for spec in &self.table.groups {
            let group = store.create_group(&spec.name)?;
            for grant in &spec.permissions {
                let permission = store
                    .find_permission(&grant.scope, &grant.codename)?
                    .ok_or_else(|| {
                        Error::PermissionTable(format!(
                            "permission {}.{} vanished while preparing '{}'",
                            grant.scope, grant.codename, spec.name
                        ))
                    })?;
                store.grant_group_permission(group.id, permission.id)?;
            }
            summary.groups_created += 1;
        }

        log::info!(
            "prepared {} permissions in {} groups ({} groups replaced)",
            summary.permissions_created,
            summary.groups_created,
            summary.groups_removed
        );
        Ok(summary)
    }

    fn grant(&self, store: &Store, account_id: AccountId, capability: Capability) -> Result<()> {
        let name = self.table.group_name(capability).ok_or_else(|| {
            Error::PermissionTable(format!("no group grants {capability:?}"))
        })?;
        store.add_account_to_named_group(account_id, name)?;
        Ok(())
    }

    pub fn register_student(&self, store: &Store, student: &Student) -> Result<()> {
        self.grant(store, student.account_id, Capability::Student)
    }

    /// Doctors and above author topics, supervise and review
    pub fn register_employee(&self, store: &Store, employee: &Employee) -> Result<()> {
        if employee.is_doctor_or_above() {
            self.grant(store, employee.account_id, Capability::ThesisTopicAuthor)?;
            self.grant(store, employee.account_id, Capability::Supervisor)?;
            self.grant(store, employee.account_id, Capability::Reviewer)?;
        }
        Ok(())
    }

    pub fn register_organization(&self, store: &Store, organization: &Organization) -> Result<()> {
        self.grant(store, organization.account_id, Capability::ThesisTopicAuthor)
    }

    pub fn register_department_head(&self, store: &Store, employee: &Employee) -> Result<()> {
        self.grant(store, employee.account_id, Capability::DepartmentHead)
    }

    pub fn register_faculty_head(&self, store: &Store, employee: &Employee) -> Result<()> {
        self.grant(store, employee.account_id, Capability::FacultyHead)
    }
}

impl Default for PermissionRegistrar {
    fn default() -> Self {
        Self::new(PermissionTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = PermissionTable::standard();
        assert_eq!(table.permissions.len(), 17);
        assert_eq!(table.groups.len(), 6);
        table.validate().unwrap();
        assert_eq!(
            table.group_name(Capability::ThesisTopicAuthor),
            Some("thesis-topic-authors")
        );
    }

    #[test]
    fn test_validate_rejects_dangling_grant() {
        let mut table = PermissionTable::standard();
        table.groups[0].permissions.push(PermissionRef {
            scope: "thesis".into(),
            codename: "canBurn".into(),
        });
        assert!(matches!(table.validate(), Err(Error::PermissionTable(_))));
    }

    #[test]
    fn test_prepare_recreates_objects() {
        let store = Store::open_in_memory().unwrap();
        let registrar = PermissionRegistrar::default();

        let first = registrar.prepare(&store).unwrap();
        assert_eq!(first.groups_removed, 0);
        assert_eq!(first.permissions_created, 17);

        let second = registrar.prepare(&store).unwrap();
        assert_eq!(second.groups_removed, 6);
        assert_eq!(second.permissions_removed, 17);
        assert_eq!(store.count_permissions().unwrap(), 17);

        let heads = store.find_group("heads-of-faculty").unwrap().unwrap();
        let codenames: Vec<_> = store
            .group_permissions(heads.id)
            .unwrap()
            .into_iter()
            .map(|p| format!("{}.{}", p.scope, p.codename))
            .collect();
        assert_eq!(
            codenames,
            vec![
                "review.canAssign",
                "thesis_topic.canAccept",
                "thesis_topic.canReject"
            ]
        );
    }

    #[test]
    fn test_prepare_wipes_memberships() {
        let store = Store::open_in_memory().unwrap();
        let registrar = PermissionRegistrar::default();
        registrar.prepare(&store).unwrap();

        let account = store.create_account("u1").unwrap();
        let student = store.create_student(account.id).unwrap();
        registrar.register_student(&store, &student).unwrap();
        assert_eq!(store.account_groups(account.id).unwrap(), vec!["students"]);

        registrar.prepare(&store).unwrap();
        assert!(store.account_groups(account.id).unwrap().is_empty());
    }

    #[test]
    fn test_employee_rules() {
        let store = Store::open_in_memory().unwrap();
        let registrar = PermissionRegistrar::default();
        registrar.prepare(&store).unwrap();

        let doctor = store.create_account("e1").unwrap();
        let mut employee = store.create_employee(doctor.id).unwrap();
        employee.title = "dr inż.".into();
        registrar.register_employee(&store, &employee).unwrap();
        registrar.register_employee(&store, &employee).unwrap();
        assert_eq!(
            store.account_groups(doctor.id).unwrap(),
            vec!["reviewers", "supervisors", "thesis-topic-authors"]
        );

        let master = store.create_account("e2").unwrap();
        let mut employee = store.create_employee(master.id).unwrap();
        employee.title = "mgr".into();
        registrar.register_employee(&store, &employee).unwrap();
        assert!(store.account_groups(master.id).unwrap().is_empty());
    }

    #[test]
    fn test_register_without_prepare_fails() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("u1").unwrap();
        let student = store.create_student(account.id).unwrap();
        let err = PermissionRegistrar::default()
            .register_student(&store, &student)
            .unwrap_err();
        assert!(matches!(err, Error::Store(faculty::Error::NotFound { .. })));
    }
}
