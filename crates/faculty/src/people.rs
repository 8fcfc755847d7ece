//! Students, employees and organization representatives

use crate::types::{
    AccountId, Employee, EmployeeId, Organization, OrganizationId, OrganizationalUnitId,
    PersonKind, Student, StudentId, StudyCycleId, SyncFlag, SyncedEntity,
};
use crate::{Error, Result, Store, expect_row};
use rusqlite::{OptionalExtension, Row, params};

const STUDENT_SELECT: &str = "SELECT s.id, s.account_id, a.username, s.is_directory_synced
     FROM students s JOIN accounts a ON a.id = s.account_id";

const EMPLOYEE_SELECT: &str = "SELECT e.id, e.account_id, a.username, e.title, e.position,
            e.organizational_unit_id, e.is_directory_synced
     FROM employees e JOIN accounts a ON a.id = e.account_id";

const ORGANIZATION_SELECT: &str = "SELECT o.id, o.account_id, a.username, o.name, o.is_directory_synced
     FROM organizations o JOIN accounts a ON a.id = o.account_id";

impl Store {
    /// Which person variant, if any, is bound to an account
    pub fn person_kind(&self, account_id: AccountId) -> Result<Option<PersonKind>> {
        let kind: Option<String> = self
            .conn()
            .query_row(
                "SELECT 'student' FROM students WHERE account_id = ?1
                 UNION ALL SELECT 'employee' FROM employees WHERE account_id = ?1
                 UNION ALL SELECT 'organization' FROM organizations WHERE account_id = ?1
                 LIMIT 1",
                [account_id],
                |row| row.get(0),
            )
            .optional()?;
        match kind.as_deref() {
            None => Ok(None),
            Some("student") => Ok(Some(PersonKind::Student)),
            Some("employee") => Ok(Some(PersonKind::Employee)),
            Some("organization") => Ok(Some(PersonKind::Organization)),
            Some(other) => Err(Error::InvalidData(format!("unknown person kind '{other}'"))),
        }
    }

    // ========================================================================
    // Students
    // ========================================================================

    pub fn list_students(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{STUDENT_SELECT} ORDER BY s.id"))?;
        let rows = stmt.query_map([], student_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn find_student_by_username(&self, username: &str) -> Result<Option<Student>> {
        let student = self
            .conn()
            .query_row(
                &format!("{STUDENT_SELECT} WHERE a.username = ?1"),
                [username],
                student_from_row,
            )
            .optional()?;
        Ok(student)
    }

    pub fn student(&self, id: StudentId) -> Result<Student> {
        self.conn()
            .query_row(
                &format!("{STUDENT_SELECT} WHERE s.id = ?1"),
                [id],
                student_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("student", id))
    }

    /// Bind a new, unsynced student row to an account
    pub fn create_student(&self, account_id: AccountId) -> Result<Student> {
        self.conn()
            .execute("INSERT INTO students (account_id) VALUES (?1)", [account_id])?;
        self.student(self.conn().last_insert_rowid())
    }

    pub fn set_student_synced(&self, id: StudentId, synced: bool) -> Result<()> {
        self.set_synced(SyncedEntity::Student, id, synced)
    }

    /// Remove every study-cycle membership of a student
    pub fn clear_student_study_cycles(&self, id: StudentId) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM student_study_cycles WHERE student_id = ?1",
            [id],
        )?;
        Ok(removed)
    }

    /// Add a membership edge; returns false if it already existed
    pub fn add_student_to_study_cycle(
        &self,
        student_id: StudentId,
        study_cycle_id: StudyCycleId,
    ) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO student_study_cycles (student_id, study_cycle_id)
             VALUES (?1, ?2)",
            params![student_id, study_cycle_id],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a membership edge; returns false if it did not exist
    pub fn remove_student_from_study_cycle(
        &self,
        student_id: StudentId,
        study_cycle_id: StudyCycleId,
    ) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM student_study_cycles WHERE student_id = ?1 AND study_cycle_id = ?2",
            params![student_id, study_cycle_id],
        )?;
        Ok(removed > 0)
    }

    /// Directory keys of the study cycles a student belongs to, sorted
    pub fn student_study_cycle_keys(&self, id: StudentId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.directory_key FROM student_study_cycles m
             JOIN study_cycles c ON c.id = m.study_cycle_id
             WHERE m.student_id = ?1
             ORDER BY c.directory_key",
        )?;
        let rows = stmt.query_map([id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    // ========================================================================
    // Employees
    // ========================================================================

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{EMPLOYEE_SELECT} ORDER BY e.id"))?;
        let rows = stmt.query_map([], employee_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn find_employee_by_username(&self, username: &str) -> Result<Option<Employee>> {
        let employee = self
            .conn()
            .query_row(
                &format!("{EMPLOYEE_SELECT} WHERE a.username = ?1"),
                [username],
                employee_from_row,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn employee(&self, id: EmployeeId) -> Result<Employee> {
        self.conn()
            .query_row(
                &format!("{EMPLOYEE_SELECT} WHERE e.id = ?1"),
                [id],
                employee_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("employee", id))
    }

    /// Bind a new, unsynced employee row to an account
    pub fn create_employee(&self, account_id: AccountId) -> Result<Employee> {
        self.conn().execute(
            "INSERT INTO employees (account_id) VALUES (?1)",
            [account_id],
        )?;
        self.employee(self.conn().last_insert_rowid())
    }

    pub fn update_employee(&self, id: EmployeeId, title: &str, position: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE employees SET title = ?2, position = ?3 WHERE id = ?1",
            params![id, title, position],
        )?;
        expect_row(changed, "employee", id)
    }

    pub fn set_employee_synced(&self, id: EmployeeId, synced: bool) -> Result<()> {
        self.set_synced(SyncedEntity::Employee, id, synced)
    }

    pub fn set_employee_unit(
        &self,
        id: EmployeeId,
        unit: Option<OrganizationalUnitId>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE employees SET organizational_unit_id = ?2 WHERE id = ?1",
            params![id, unit],
        )?;
        expect_row(changed, "employee", id)
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    pub fn list_organizations(&self) -> Result<Vec<Organization>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{ORGANIZATION_SELECT} ORDER BY o.id"))?;
        let rows = stmt.query_map([], organization_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn find_organization_by_username(&self, username: &str) -> Result<Option<Organization>> {
        let organization = self
            .conn()
            .query_row(
                &format!("{ORGANIZATION_SELECT} WHERE a.username = ?1"),
                [username],
                organization_from_row,
            )
            .optional()?;
        Ok(organization)
    }

    pub fn organization(&self, id: OrganizationId) -> Result<Organization> {
        self.conn()
            .query_row(
                &format!("{ORGANIZATION_SELECT} WHERE o.id = ?1"),
                [id],
                organization_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("organization", id))
    }

    /// Bind a new, unsynced organization row to its representative's account
    pub fn create_organization(&self, account_id: AccountId, name: &str) -> Result<Organization> {
        self.conn().execute(
            "INSERT INTO organizations (account_id, name) VALUES (?1, ?2)",
            params![account_id, name],
        )?;
        self.organization(self.conn().last_insert_rowid())
    }

    pub fn update_organization_name(&self, id: OrganizationId, name: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE organizations SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        expect_row(changed, "organization", id)
    }

    pub fn set_organization_synced(&self, id: OrganizationId, synced: bool) -> Result<()> {
        self.set_synced(SyncedEntity::Organization, id, synced)
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        account_id: row.get(1)?,
        username: row.get(2)?,
        sync: SyncFlag::new(row.get(3)?),
    })
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        account_id: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        position: row.get(4)?,
        organizational_unit_id: row.get(5)?,
        sync: SyncFlag::new(row.get(6)?),
    })
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        account_id: row.get(1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        sync: SyncFlag::new(row.get(4)?),
    })
}
