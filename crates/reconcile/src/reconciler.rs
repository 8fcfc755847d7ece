//! Reconciliation passes, one per entity kind
//!
//! Every pass reads its directory records first, then resets the local rows
//! it owns (freshness flag and owned relationships), then matches each
//! directory record to a local row by natural key. A failed directory read
//! therefore leaves the pass's local rows untouched.

use crate::error::Result;
use crate::permissions::PermissionRegistrar;
use crate::types::{EntityKind, PassReport, RelationshipWarning};
use directory::{AuthorityRole, DirectoryReader};
use faculty::{Account, Employee, PersonKind, Store, SyncedEntity};

/// Runs reconciliation passes against one directory and one store
pub struct Reconciler<'a> {
    directory: &'a dyn DirectoryReader,
    store: &'a Store,
    registrar: &'a PermissionRegistrar,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        directory: &'a dyn DirectoryReader,
        store: &'a Store,
        registrar: &'a PermissionRegistrar,
    ) -> Self {
        Self {
            directory,
            store,
            registrar,
        }
    }

    /// Run the pass for `kind`
    pub fn run_pass(&self, kind: EntityKind) -> Result<PassReport> {
        match kind {
            EntityKind::Student => self.students(),
            EntityKind::StudyCycle => self.study_cycles(),
            EntityKind::Employee => self.employees(),
            EntityKind::OrganizationalUnit => self.organizational_units(),
            EntityKind::Organization => self.organizations(),
            EntityKind::Authority => self.authorities(),
        }
    }

    // ========================================================================
    // People
    // ========================================================================

    pub fn students(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::Student);
        let records = self.directory.list_students()?;

        for student in self.store.list_students()? {
            self.store.clear_student_study_cycles(student.id)?;
            self.store.set_student_synced(student.id, false)?;
        }

        for record in records {
            let student = match self.store.find_student_by_username(&record.id)? {
                Some(student) => {
                    report.updated += 1;
                    student
                }
                None => {
                    let Some(account) =
                        self.claim_account(&record.id, PersonKind::Student, &mut report)?
                    else {
                        continue;
                    };
                    report.created += 1;
                    self.store.create_student(account.id)?
                }
            };

            self.store.update_account_profile(
                student.account_id,
                &record.first_name,
                &record.last_name,
                &record.email,
            )?;
            self.store.set_student_synced(student.id, true)?;
            self.registrar.register_student(self.store, &student)?;
            log::debug!("synced student {}", record.id);
        }

        self.finish(report, SyncedEntity::Student)
    }

    pub fn employees(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::Employee);
        let records = self.directory.list_employees()?;

        for employee in self.store.list_employees()? {
            self.store.set_employee_unit(employee.id, None)?;
            self.store.set_employee_synced(employee.id, false)?;
        }

        for record in records {
            let mut employee = match self.store.find_employee_by_username(&record.id)? {
                Some(employee) => {
                    report.updated += 1;
                    employee
                }
                None => {
                    let Some(account) =
                        self.claim_account(&record.id, PersonKind::Employee, &mut report)?
                    else {
                        continue;
                    };
                    report.created += 1;
                    self.store.create_employee(account.id)?
                }
            };

            self.store.update_account_profile(
                employee.account_id,
                &record.first_name,
                &record.last_name,
                &record.email,
            )?;
            self.store
                .update_employee(employee.id, &record.title, &record.position)?;
            self.store.set_employee_synced(employee.id, true)?;
            employee.title = record.title;
            employee.position = record.position;
            self.registrar.register_employee(self.store, &employee)?;
            log::debug!("synced employee {} ({})", record.id, employee.title);
        }

        self.finish(report, SyncedEntity::Employee)
    }

    pub fn organizations(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::Organization);
        let records = self.directory.list_organizations()?;

        for organization in self.store.list_organizations()? {
            self.store.set_organization_synced(organization.id, false)?;
        }

        for record in records {
            let organization = match self.store.find_organization_by_username(&record.id)? {
                Some(organization) => {
                    report.updated += 1;
                    self.store
                        .update_organization_name(organization.id, &record.name)?;
                    organization
                }
                None => {
                    let Some(account) =
                        self.claim_account(&record.id, PersonKind::Organization, &mut report)?
                    else {
                        continue;
                    };
                    report.created += 1;
                    self.store.create_organization(account.id, &record.name)?
                }
            };

            self.store.update_account_profile(
                organization.account_id,
                &record.representative_first_name,
                &record.representative_last_name,
                &record.representative_email,
            )?;
            self.store.set_organization_synced(organization.id, true)?;
            self.registrar
                .register_organization(self.store, &organization)?;
            log::debug!("synced organization {} ({})", record.id, record.name);
        }

        self.finish(report, SyncedEntity::Organization)
    }

    /// Account for a person not yet bound to `kind`
    ///
    /// Reuses a bare account with the same username, else creates one. An
    /// account already bound to another person kind is reported and skipped,
    /// since a username names at most one person.
    fn claim_account(
        &self,
        username: &str,
        kind: PersonKind,
        report: &mut PassReport,
    ) -> Result<Option<Account>> {
        match self.store.find_account(username)? {
            Some(account) => match self.store.person_kind(account.id)? {
                Some(existing) => {
                    report.anomaly(format!(
                        "account '{username}' is already registered as {existing}, not as {kind}; skipped"
                    ));
                    Ok(None)
                }
                None => {
                    log::debug!("reusing account {username} for new {kind}");
                    Ok(Some(account))
                }
            },
            None => {
                report.accounts_created += 1;
                Ok(Some(self.store.create_account(username)?))
            }
        }
    }

    // ========================================================================
    // Organizational structure
    // ========================================================================

    pub fn study_cycles(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::StudyCycle);
        let records = self.directory.list_study_cycles()?;

        for cycle in self.store.list_study_cycles()? {
            self.store.set_study_cycle_synced(cycle.id, false)?;
        }

        for record in records {
            let cycle = match self.store.find_study_cycle(&record.key)? {
                Some(cycle) => {
                    report.updated += 1;
                    if cycle.name != record.name {
                        self.store.rename_study_cycle(cycle.id, &record.name)?;
                    }
                    cycle
                }
                None => {
                    report.created += 1;
                    self.store.create_study_cycle(&record.key, &record.name)?
                }
            };

            for member in &record.member_ids {
                match self.store.find_student_by_username(member)? {
                    Some(student) => {
                        self.store.add_student_to_study_cycle(student.id, cycle.id)?;
                    }
                    None => report.warn(RelationshipWarning::new(&record.key, member, "member")),
                }
            }

            self.store.set_study_cycle_synced(cycle.id, true)?;
            log::debug!(
                "synced study cycle {} ({} members)",
                record.key,
                record.member_ids.len()
            );
        }

        self.finish(report, SyncedEntity::StudyCycle)
    }

    pub fn organizational_units(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::OrganizationalUnit);
        let records = self.directory.list_organizational_units()?;

        for unit in self.store.list_organizational_units()? {
            self.store.set_organizational_unit_head(unit.id, None)?;
            self.store.set_organizational_unit_synced(unit.id, false)?;
        }

        for record in records {
            let unit = match self.store.find_organizational_unit(&record.key)? {
                Some(unit) => {
                    report.updated += 1;
                    unit
                }
                None => {
                    report.created += 1;
                    self.store
                        .create_organizational_unit(&record.key, &record.name)?
                }
            };

            let head = match &record.head_id {
                Some(id) => self.resolve_employee(&record.key, id, "head", &mut report)?,
                None => None,
            };
            self.store.update_organizational_unit(
                unit.id,
                &record.name,
                head.as_ref().map(|e| e.id),
            )?;
            if let Some(head) = &head {
                self.registrar.register_department_head(self.store, head)?;
            }

            for member in &record.member_ids {
                if let Some(employee) =
                    self.resolve_employee(&record.key, member, "member", &mut report)?
                {
                    self.store.set_employee_unit(employee.id, Some(unit.id))?;
                }
            }

            self.store.set_organizational_unit_synced(unit.id, true)?;
            log::debug!("synced organizational unit {}", record.key);
        }

        self.finish(report, SyncedEntity::OrganizationalUnit)
    }

    /// Role-keyed pass over the fixed authority roles
    ///
    /// Rows with unknown roles are deleted, as are all but the oldest row of
    /// each known role. A role missing from the directory keeps its local row
    /// with the occupant cleared.
    pub fn authorities(&self) -> Result<PassReport> {
        let mut report = PassReport::new(EntityKind::Authority);

        let known: Vec<&str> = AuthorityRole::ALL.iter().map(AuthorityRole::code).collect();
        report.deleted = self.store.delete_authorities_except(&known)?;
        if report.deleted > 0 {
            log::info!("deleted {} authorities with unknown roles", report.deleted);
        }

        for role in AuthorityRole::ALL {
            let duplicates = self.store.delete_duplicate_authorities(role.code())?;
            if duplicates > 0 {
                report.deleted += duplicates;
                report.anomaly(format!(
                    "role '{role}' had {duplicates} duplicate local rows; kept the oldest"
                ));
            }
        }

        for role in AuthorityRole::ALL {
            let occupant_id = match self.directory.authority_occupant(role) {
                Ok(occupant) => occupant,
                Err(err) if err.is_not_found() => {
                    report.left_unsynced += 1;
                    report.anomaly(format!(
                        "role '{role}' is missing from the directory ({err}); occupant cleared"
                    ));
                    self.clear_authority(role, &mut report)?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let occupant = match &occupant_id {
                Some(id) => self.resolve_employee(role.directory_name(), id, "occupant", &mut report)?,
                None => None,
            };
            let occupant_key = occupant.as_ref().map(|e| e.id);

            match self.store.find_authority(role.code())? {
                Some(authority) => {
                    self.store.set_authority_occupant(authority.id, occupant_key)?;
                    report.updated += 1;
                }
                None => {
                    self.store.create_authority(role.code(), occupant_key)?;
                    report.created += 1;
                }
            }

            if let Some(employee) = &occupant
                && role.is_faculty_head()
            {
                self.registrar.register_faculty_head(self.store, employee)?;
            }
            log::debug!(
                "authority {role}: {}",
                occupant.as_ref().map_or("vacant", |e| e.username.as_str())
            );
        }

        log::info!(
            "{}: {} created, {} updated, {} missing from directory, {} deleted",
            report.kind,
            report.created,
            report.updated,
            report.left_unsynced,
            report.deleted
        );
        Ok(report)
    }

    fn clear_authority(&self, role: AuthorityRole, report: &mut PassReport) -> Result<()> {
        match self.store.find_authority(role.code())? {
            Some(authority) => self.store.set_authority_occupant(authority.id, None)?,
            None => {
                self.store.create_authority(role.code(), None)?;
                report.created += 1;
            }
        }
        Ok(())
    }

    /// Look up an employee referenced from `source`, warning if absent
    fn resolve_employee(
        &self,
        source: &str,
        username: &str,
        relation: &str,
        report: &mut PassReport,
    ) -> Result<Option<Employee>> {
        let employee = self.store.find_employee_by_username(username)?;
        if employee.is_none() {
            report.warn(RelationshipWarning::new(source, username, relation));
        }
        Ok(employee)
    }

    fn finish(&self, mut report: PassReport, entity: SyncedEntity) -> Result<PassReport> {
        report.left_unsynced = self.store.count_unsynced(entity)? as usize;
        log::info!(
            "{}: {} created, {} updated, {} left unsynced",
            report.kind,
            report.created,
            report.updated,
            report.left_unsynced
        );
        if !report.relationship_warnings.is_empty() {
            log::warn!(
                "{}: {} unresolved references",
                report.kind,
                report.relationship_warnings.len()
            );
        }
        Ok(report)
    }
}
