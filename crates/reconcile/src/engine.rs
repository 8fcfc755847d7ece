//! Sync orchestration - prepares permissions and runs passes in order

use crate::error::{Error, Result};
use crate::permissions::PermissionRegistrar;
use crate::progress::SyncProgress;
use crate::reconciler::Reconciler;
use crate::types::{EntityKind, SyncReport};
use directory::DirectoryReader;
use faculty::Store;

/// Runs full synchronizations of a store against a directory
pub struct SyncEngine<'a> {
    directory: &'a dyn DirectoryReader,
    store: &'a Store,
    registrar: PermissionRegistrar,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        directory: &'a dyn DirectoryReader,
        store: &'a Store,
        registrar: PermissionRegistrar,
    ) -> Self {
        Self {
            directory,
            store,
            registrar,
        }
    }

    /// Run a full synchronization
    ///
    /// Recreates the permission objects, then runs every pass in
    /// [`EntityKind::SYNC_ORDER`]. The first failing pass stops the run with
    /// [`Error::Aborted`], which carries the reports of the passes that
    /// finished; their writes are kept.
    pub fn run<P: SyncProgress>(&self, progress: &mut P) -> Result<SyncReport> {
        log::info!("synchronizing with {}", self.directory.describe());
        let mut report = SyncReport::start();

        self.registrar.prepare(self.store)?;

        let reconciler = Reconciler::new(self.directory, self.store, &self.registrar);
        for kind in EntityKind::SYNC_ORDER {
            progress.on_pass_start(kind);
            match reconciler.run_pass(kind) {
                Ok(pass) => {
                    progress.on_pass_complete(&pass);
                    report.passes.push(pass);
                }
                Err(cause) => {
                    log::error!("{kind} pass failed: {cause}");
                    progress.on_abort(kind, &cause);
                    return Err(Error::Aborted {
                        pass: kind,
                        completed: Box::new(report),
                        cause: Box::new(cause),
                    });
                }
            }
        }

        report.finish();
        let totals = report.totals();
        log::info!(
            "synchronization completed: {} created, {} updated, {} unsynced, {} deleted",
            totals.created,
            totals.updated,
            totals.left_unsynced,
            totals.deleted
        );
        progress.on_complete(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::types::PassReport;
    use directory::{
        AuthorityRole, DirectoryEmployee, DirectoryOrganization, DirectoryOrganizationalUnit,
        DirectoryStudent, DirectoryStudyCycle, Snapshot, SnapshotDirectory,
    };
    use faculty::SyncedEntity;
    use std::path::Path;

    const FIXTURE: &str = r#"
        [[students]]
        id = "u1"
        first_name = "Anna"
        last_name = "Nowak"
        email = "u1@example.edu"

        [[students]]
        id = "u4"
        first_name = "Piotr"
        last_name = "Lis"

        [[employees]]
        id = "u2"
        first_name = "Jan"
        last_name = "Kowalski"
        title = "dr inż."
        position = "adiunkt"

        [[employees]]
        id = "e2"
        first_name = "Ewa"
        last_name = "Mazur"
        title = "mgr"
        position = "asystent"

        [[employees]]
        id = "e3"
        first_name = "Adam"
        last_name = "Wolny"
        title = "prof. dr hab."
        position = "profesor"

        [[organizations]]
        id = "acme"
        name = "Acme"
        representative_first_name = "Olga"
        representative_last_name = "Rep"

        [[study_cycles]]
        key = "cs-2020"
        name = "Computer Science 2020"
        member_ids = ["u1", "u3"]

        [[organizational_units]]
        key = "ai"
        name = "Department of AI"
        head_id = "e3"
        member_ids = ["u2", "e2", "e9"]

        [[authorities]]
        role = "dean"
        occupant = "e3"

        [[authorities]]
        role = "vice-dean-promotion"

        [[authorities]]
        role = "vice-dean-students"
        occupant = "u2"
    "#;

    fn fixture() -> SnapshotDirectory {
        SnapshotDirectory::from_snapshot(
            Snapshot::parse(FIXTURE, Path::new("fixture.toml")).unwrap(),
        )
    }

    fn sync(directory: &dyn DirectoryReader, store: &Store) -> Result<SyncReport> {
        SyncEngine::new(directory, store, PermissionRegistrar::default()).run(&mut NoProgress)
    }

    fn groups_of(store: &Store, username: &str) -> Vec<String> {
        let account = store.find_account(username).unwrap().unwrap();
        store.account_groups(account.id).unwrap()
    }

    fn pass(report: &SyncReport, kind: EntityKind) -> &PassReport {
        report.pass(kind).unwrap()
    }

    /// Fails every call for one entity kind with a connection error
    struct FailingDirectory {
        inner: SnapshotDirectory,
        fail_on: EntityKind,
    }

    impl FailingDirectory {
        fn check(&self, kind: EntityKind) -> directory::Result<()> {
            if kind == self.fail_on {
                Err(directory::Error::Connection("server went away".into()))
            } else {
                Ok(())
            }
        }
    }

    impl DirectoryReader for FailingDirectory {
        fn list_students(&self) -> directory::Result<Vec<DirectoryStudent>> {
            self.check(EntityKind::Student)?;
            self.inner.list_students()
        }
        fn list_employees(&self) -> directory::Result<Vec<DirectoryEmployee>> {
            self.check(EntityKind::Employee)?;
            self.inner.list_employees()
        }
        fn list_organizations(&self) -> directory::Result<Vec<DirectoryOrganization>> {
            self.check(EntityKind::Organization)?;
            self.inner.list_organizations()
        }
        fn list_study_cycles(&self) -> directory::Result<Vec<DirectoryStudyCycle>> {
            self.check(EntityKind::StudyCycle)?;
            self.inner.list_study_cycles()
        }
        fn list_organizational_units(
            &self,
        ) -> directory::Result<Vec<DirectoryOrganizationalUnit>> {
            self.check(EntityKind::OrganizationalUnit)?;
            self.inner.list_organizational_units()
        }
        fn authority_occupant(&self, role: AuthorityRole) -> directory::Result<Option<String>> {
            self.check(EntityKind::Authority)?;
            self.inner.authority_occupant(role)
        }
        fn describe(&self) -> String {
            "failing directory".to_string()
        }
    }

    #[test]
    fn test_full_run_counts() {
        let store = Store::open_in_memory().unwrap();
        let report = sync(&fixture(), &store).unwrap();

        assert!(report.finished_at.is_some());
        let kinds: Vec<_> = report.passes.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, EntityKind::SYNC_ORDER);

        let students = pass(&report, EntityKind::Student);
        assert_eq!((students.created, students.updated), (2, 0));
        assert_eq!(students.accounts_created, 2);
        assert_eq!(pass(&report, EntityKind::Employee).created, 3);
        assert_eq!(pass(&report, EntityKind::Organization).created, 1);
        assert_eq!(store.count_accounts().unwrap(), 6);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let directory = fixture();
        sync(&directory, &store).unwrap();
        let groups_before = groups_of(&store, "e3");
        let keys_before = store
            .student_study_cycle_keys(store.find_student_by_username("u1").unwrap().unwrap().id)
            .unwrap();

        let report = sync(&directory, &store).unwrap();
        let totals = report.totals();
        assert_eq!(totals.created, 0);
        assert_eq!(totals.deleted, 0);
        assert_eq!(totals.accounts_created, 0);
        assert_eq!(pass(&report, EntityKind::Student).updated, 2);
        assert_eq!(pass(&report, EntityKind::Employee).updated, 3);
        assert_eq!(pass(&report, EntityKind::StudyCycle).updated, 1);
        assert_eq!(pass(&report, EntityKind::OrganizationalUnit).updated, 1);
        assert_eq!(pass(&report, EntityKind::Organization).updated, 1);
        assert_eq!(pass(&report, EntityKind::Authority).updated, 3);

        assert_eq!(groups_of(&store, "e3"), groups_before);
        let u1 = store.find_student_by_username("u1").unwrap().unwrap();
        assert_eq!(store.student_study_cycle_keys(u1.id).unwrap(), keys_before);
        assert_eq!(store.count_accounts().unwrap(), 6);
    }

    #[test]
    fn test_orphans_are_flagged_not_deleted() {
        let store = Store::open_in_memory().unwrap();
        let old = store.create_account("old").unwrap();
        let orphan = store.create_student(old.id).unwrap();
        store.set_student_synced(orphan.id, true).unwrap();
        let cycle = store.create_study_cycle("math-2010", "Math 2010").unwrap();
        store.add_student_to_study_cycle(orphan.id, cycle.id).unwrap();
        store.set_study_cycle_synced(cycle.id, true).unwrap();
        let unit = store.create_organizational_unit("closed", "Closed Dept").unwrap();
        store.set_organizational_unit_synced(unit.id, true).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        let orphan = store.find_student_by_username("old").unwrap().unwrap();
        assert!(!orphan.sync.is_directory_synced);
        assert!(store.student_study_cycle_keys(orphan.id).unwrap().is_empty());
        assert!(!store.find_study_cycle("math-2010").unwrap().unwrap().sync.is_directory_synced);
        assert!(
            !store
                .find_organizational_unit("closed")
                .unwrap()
                .unwrap()
                .sync
                .is_directory_synced
        );

        assert_eq!(pass(&report, EntityKind::Student).left_unsynced, 1);
        assert_eq!(pass(&report, EntityKind::StudyCycle).left_unsynced, 1);
        assert_eq!(pass(&report, EntityKind::OrganizationalUnit).left_unsynced, 1);
        assert_eq!(store.count_unsynced(SyncedEntity::Employee).unwrap(), 0);
    }

    #[test]
    fn test_existing_student_is_reused() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("u1").unwrap();
        let existing = store.create_student(account.id).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        let u1 = store.find_student_by_username("u1").unwrap().unwrap();
        assert_eq!(u1.id, existing.id);
        assert!(u1.sync.is_directory_synced);
        let students = pass(&report, EntityKind::Student);
        assert_eq!((students.created, students.updated), (1, 1));
        assert_eq!(store.list_students().unwrap().len(), 2);

        let account = store.find_account("u1").unwrap().unwrap();
        assert_eq!(account.full_name(), "Anna Nowak");
        assert_eq!(account.email, "u1@example.edu");
    }

    #[test]
    fn test_bare_account_is_reused_for_employee() {
        let store = Store::open_in_memory().unwrap();
        let bare = store.create_account("u2").unwrap();

        let report = sync(&fixture(), &store).unwrap();

        let employee = store.find_employee_by_username("u2").unwrap().unwrap();
        assert_eq!(employee.account_id, bare.id);
        let employees = pass(&report, EntityKind::Employee);
        assert_eq!(employees.created, 3);
        assert_eq!(employees.accounts_created, 2);
        assert_eq!(store.count_accounts().unwrap(), 6);
    }

    #[test]
    fn test_account_of_another_kind_is_not_shared() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("e2").unwrap();
        store.create_student(account.id).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        assert!(store.find_employee_by_username("e2").unwrap().is_none());
        let employees = pass(&report, EntityKind::Employee);
        assert_eq!(employees.created, 2);
        assert_eq!(employees.anomalies.len(), 1);
        assert!(employees.anomalies[0].contains("e2"));
    }

    #[test]
    fn test_unresolved_cycle_member_is_reported() {
        let store = Store::open_in_memory().unwrap();
        let report = sync(&fixture(), &store).unwrap();

        let u1 = store.find_student_by_username("u1").unwrap().unwrap();
        assert_eq!(store.student_study_cycle_keys(u1.id).unwrap(), vec!["cs-2020"]);
        assert!(store.find_student_by_username("u3").unwrap().is_none());

        let warnings = &pass(&report, EntityKind::StudyCycle).relationship_warnings;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "cs-2020");
        assert_eq!(warnings[0].target, "u3");
        assert_eq!(warnings[0].relation, "member");
    }

    #[test]
    fn test_unit_head_and_members() {
        let store = Store::open_in_memory().unwrap();
        let report = sync(&fixture(), &store).unwrap();

        let unit = store.find_organizational_unit("ai").unwrap().unwrap();
        let head = store.find_employee_by_username("e3").unwrap().unwrap();
        assert_eq!(unit.head_id, Some(head.id));
        let member = store.find_employee_by_username("e2").unwrap().unwrap();
        assert_eq!(member.organizational_unit_id, Some(unit.id));
        assert_eq!(head.organizational_unit_id, None);

        let warnings = &pass(&report, EntityKind::OrganizationalUnit).relationship_warnings;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].target, "e9");
    }

    #[test]
    fn test_capability_groups() {
        let store = Store::open_in_memory().unwrap();
        let directory = fixture();
        sync(&directory, &store).unwrap();
        sync(&directory, &store).unwrap();

        assert_eq!(groups_of(&store, "u1"), vec!["students"]);
        assert_eq!(groups_of(&store, "acme"), vec!["thesis-topic-authors"]);
        assert!(groups_of(&store, "e2").is_empty());
        assert_eq!(
            groups_of(&store, "u2"),
            vec![
                "heads-of-faculty",
                "reviewers",
                "supervisors",
                "thesis-topic-authors"
            ]
        );
        assert_eq!(
            groups_of(&store, "e3"),
            vec![
                "heads-of-departments",
                "heads-of-faculty",
                "reviewers",
                "supervisors",
                "thesis-topic-authors"
            ]
        );
    }

    #[test]
    fn test_doctor_without_roles_gets_exactly_three_groups() {
        let store = Store::open_in_memory().unwrap();
        let snapshot = Snapshot::parse(
            r#"
            [[employees]]
            id = "u2"
            first_name = "Jan"
            last_name = "Kowalski"
            title = "dr inż."
            "#,
            Path::new("doctor.toml"),
        )
        .unwrap();
        let directory = SnapshotDirectory::from_snapshot(snapshot);

        sync(&directory, &store).unwrap();
        sync(&directory, &store).unwrap();
        assert_eq!(
            groups_of(&store, "u2"),
            vec!["reviewers", "supervisors", "thesis-topic-authors"]
        );
    }

    #[test]
    fn test_unknown_authority_role_is_purged() {
        let store = Store::open_in_memory().unwrap();
        store.create_authority("campus-security", None).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        assert!(store.find_authority("campus-security").unwrap().is_none());
        assert_eq!(pass(&report, EntityKind::Authority).deleted, 1);
        let roles: Vec<_> = store
            .list_authorities()
            .unwrap()
            .into_iter()
            .map(|a| a.role)
            .collect();
        assert_eq!(roles.len(), 4);
        assert!(roles.iter().all(|r| AuthorityRole::from_code(r).is_some()));
    }

    #[test]
    fn test_missing_role_keeps_row_and_clears_occupant() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("e3").unwrap();
        let e3 = store.create_employee(account.id).unwrap();
        store.create_authority("sc", Some(e3.id)).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        let research = store.find_authority("sc").unwrap().unwrap();
        assert_eq!(research.occupant_id, None);
        let authorities = pass(&report, EntityKind::Authority);
        assert_eq!(authorities.left_unsynced, 1);
        assert_eq!(authorities.anomalies.len(), 1);
        assert!(authorities.anomalies[0].contains("vice-dean-science"));

        let dean = store.find_authority("d").unwrap().unwrap();
        assert_eq!(dean.occupant_id, Some(e3.id));
        assert_eq!(store.find_authority("pr").unwrap().unwrap().occupant_id, None);
    }

    #[test]
    fn test_missing_role_without_local_row_creates_vacant_row() {
        let store = Store::open_in_memory().unwrap();
        let report = sync(&fixture(), &store).unwrap();

        assert_eq!(store.find_authority("sc").unwrap().unwrap().occupant_id, None);
        assert_eq!(pass(&report, EntityKind::Authority).created, 4);
    }

    #[test]
    fn test_duplicate_role_rows_are_collapsed() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("e1").unwrap();
        let stale = store.create_employee(account.id).unwrap();
        let first = store.create_authority("d", Some(stale.id)).unwrap();
        store.create_authority("d", Some(stale.id)).unwrap();

        let report = sync(&fixture(), &store).unwrap();

        let deans: Vec<_> = store
            .list_authorities()
            .unwrap()
            .into_iter()
            .filter(|a| a.role == "d")
            .collect();
        let e3 = store.find_employee_by_username("e3").unwrap().unwrap();
        assert_eq!(deans.len(), 1);
        assert_eq!(deans[0].id, first.id);
        assert_eq!(deans[0].occupant_id, Some(e3.id));

        let authorities = pass(&report, EntityKind::Authority);
        assert_eq!(authorities.deleted, 1);
        assert_eq!(authorities.updated, 1);
        assert!(
            authorities
                .anomalies
                .iter()
                .any(|a| a.contains("'dean'") && a.contains("duplicate"))
        );

        let again = sync(&fixture(), &store).unwrap();
        let authorities = pass(&again, EntityKind::Authority);
        assert_eq!(authorities.deleted, 0);
        assert!(!authorities.anomalies.iter().any(|a| a.contains("duplicate")));
    }

    #[test]
    fn test_unknown_head_and_occupant_are_reported_and_cleared() {
        let store = Store::open_in_memory().unwrap();
        sync(&fixture(), &store).unwrap();
        let unit = store.find_organizational_unit("ai").unwrap().unwrap();
        assert!(unit.head_id.is_some());

        let snapshot = Snapshot::parse(
            r#"
            [[employees]]
            id = "e3"
            first_name = "Adam"
            last_name = "Wolny"
            title = "prof. dr hab."

            [[organizational_units]]
            key = "ai"
            name = "Department of AI"
            head_id = "ghost-head"

            [[authorities]]
            role = "dean"
            occupant = "ghost-dean"
            "#,
            Path::new("unresolved.toml"),
        )
        .unwrap();
        let report = sync(&SnapshotDirectory::from_snapshot(snapshot), &store).unwrap();

        let unit = store.find_organizational_unit("ai").unwrap().unwrap();
        assert_eq!(unit.head_id, None);
        let warnings = &pass(&report, EntityKind::OrganizationalUnit).relationship_warnings;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "ai");
        assert_eq!(warnings[0].target, "ghost-head");
        assert_eq!(warnings[0].relation, "head");

        assert_eq!(store.find_authority("d").unwrap().unwrap().occupant_id, None);
        let warnings = &pass(&report, EntityKind::Authority).relationship_warnings;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "dean");
        assert_eq!(warnings[0].target, "ghost-dean");
        assert_eq!(warnings[0].relation, "occupant");
    }

    #[test]
    fn test_directory_failure_aborts_remaining_passes() {
        let store = Store::open_in_memory().unwrap();
        sync(&fixture(), &store).unwrap();

        let failing = FailingDirectory {
            inner: fixture(),
            fail_on: EntityKind::Employee,
        };
        let err = sync(&failing, &store).unwrap_err();

        let Error::Aborted {
            pass, completed, ..
        } = &err
        else {
            panic!("expected abort, got {err:?}");
        };
        assert_eq!(*pass, EntityKind::Employee);
        assert!(err.is_directory_failure());
        let kinds: Vec<_> = completed.passes.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Student, EntityKind::StudyCycle]);
        assert!(completed.finished_at.is_none());

        // employees were not reset
        assert_eq!(store.count_unsynced(SyncedEntity::Employee).unwrap(), 0);

        // a clean rerun heals the groups wiped by prepare
        sync(&fixture(), &store).unwrap();
        assert_eq!(groups_of(&store, "acme"), vec!["thesis-topic-authors"]);
    }

    #[test]
    fn test_progress_sees_every_pass() {
        struct Recorder(Vec<EntityKind>, usize);
        impl SyncProgress for Recorder {
            fn on_pass_start(&mut self, kind: EntityKind) {
                self.0.push(kind);
            }
            fn on_pass_complete(&mut self, _pass: &PassReport) {
                self.1 += 1;
            }
        }

        let store = Store::open_in_memory().unwrap();
        let directory = fixture();
        let mut recorder = Recorder(Vec::new(), 0);
        SyncEngine::new(&directory, &store, PermissionRegistrar::default())
            .run(&mut recorder)
            .unwrap();

        assert_eq!(recorder.0, EntityKind::SYNC_ORDER);
        assert_eq!(recorder.1, 6);
    }
}
