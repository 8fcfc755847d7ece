//! Study cycles, organizational units and faculty authorities

use crate::types::{
    Authority, AuthorityId, EmployeeId, OrganizationalUnit, OrganizationalUnitId, StudyCycle,
    StudyCycleId, SyncFlag, SyncedEntity,
};
use crate::{Error, Result, Store, expect_row};
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

const STUDY_CYCLE_SELECT: &str = "SELECT id, directory_key, name, submissions_open_at,
            submissions_close_at, is_directory_synced
     FROM study_cycles";

const UNIT_SELECT: &str =
    "SELECT id, directory_key, name, head_id, is_directory_synced FROM organizational_units";

impl Store {
    // ========================================================================
    // Study cycles
    // ========================================================================

    pub fn list_study_cycles(&self) -> Result<Vec<StudyCycle>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{STUDY_CYCLE_SELECT} ORDER BY id"))?;
        let rows = stmt.query_map([], study_cycle_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Find a study cycle by its directory key
    pub fn find_study_cycle(&self, key: &str) -> Result<Option<StudyCycle>> {
        let cycle = self
            .conn()
            .query_row(
                &format!("{STUDY_CYCLE_SELECT} WHERE directory_key = ?1"),
                [key],
                study_cycle_from_row,
            )
            .optional()?;
        Ok(cycle)
    }

    pub fn study_cycle(&self, id: StudyCycleId) -> Result<StudyCycle> {
        self.conn()
            .query_row(
                &format!("{STUDY_CYCLE_SELECT} WHERE id = ?1"),
                [id],
                study_cycle_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("study cycle", id))
    }

    pub fn create_study_cycle(&self, key: &str, name: &str) -> Result<StudyCycle> {
        self.conn().execute(
            "INSERT INTO study_cycles (directory_key, name) VALUES (?1, ?2)",
            params![key, name],
        )?;
        self.study_cycle(self.conn().last_insert_rowid())
    }

    pub fn rename_study_cycle(&self, id: StudyCycleId, name: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE study_cycles SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        expect_row(changed, "study cycle", id)
    }

    pub fn set_study_cycle_synced(&self, id: StudyCycleId, synced: bool) -> Result<()> {
        self.set_synced(SyncedEntity::StudyCycle, id, synced)
    }

    /// Set the locally managed thesis submission window
    pub fn set_study_cycle_submission_window(
        &self,
        id: StudyCycleId,
        open: Option<NaiveDate>,
        close: Option<NaiveDate>,
    ) -> Result<()> {
        if let (Some(open), Some(close)) = (open, close)
            && close < open
        {
            return Err(Error::InvalidData(format!(
                "submission window closes ({close}) before it opens ({open})"
            )));
        }
        let changed = self.conn().execute(
            "UPDATE study_cycles SET submissions_open_at = ?2, submissions_close_at = ?3
             WHERE id = ?1",
            params![id, open, close],
        )?;
        expect_row(changed, "study cycle", id)
    }

    // ========================================================================
    // Organizational units
    // ========================================================================

    pub fn list_organizational_units(&self) -> Result<Vec<OrganizationalUnit>> {
        let mut stmt = self.conn().prepare(&format!("{UNIT_SELECT} ORDER BY id"))?;
        let rows = stmt.query_map([], unit_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Find an organizational unit by its directory key
    pub fn find_organizational_unit(&self, key: &str) -> Result<Option<OrganizationalUnit>> {
        let unit = self
            .conn()
            .query_row(
                &format!("{UNIT_SELECT} WHERE directory_key = ?1"),
                [key],
                unit_from_row,
            )
            .optional()?;
        Ok(unit)
    }

    pub fn organizational_unit(&self, id: OrganizationalUnitId) -> Result<OrganizationalUnit> {
        self.conn()
            .query_row(
                &format!("{UNIT_SELECT} WHERE id = ?1"),
                [id],
                unit_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("organizational unit", id))
    }

    pub fn create_organizational_unit(&self, key: &str, name: &str) -> Result<OrganizationalUnit> {
        self.conn().execute(
            "INSERT INTO organizational_units (directory_key, name) VALUES (?1, ?2)",
            params![key, name],
        )?;
        self.organizational_unit(self.conn().last_insert_rowid())
    }

    pub fn update_organizational_unit(
        &self,
        id: OrganizationalUnitId,
        name: &str,
        head: Option<EmployeeId>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE organizational_units SET name = ?2, head_id = ?3 WHERE id = ?1",
            params![id, name, head],
        )?;
        expect_row(changed, "organizational unit", id)
    }

    pub fn set_organizational_unit_head(
        &self,
        id: OrganizationalUnitId,
        head: Option<EmployeeId>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE organizational_units SET head_id = ?2 WHERE id = ?1",
            params![id, head],
        )?;
        expect_row(changed, "organizational unit", id)
    }

    pub fn set_organizational_unit_synced(
        &self,
        id: OrganizationalUnitId,
        synced: bool,
    ) -> Result<()> {
        self.set_synced(SyncedEntity::OrganizationalUnit, id, synced)
    }

    // ========================================================================
    // Authorities
    // ========================================================================

    pub fn list_authorities(&self) -> Result<Vec<Authority>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, role, occupant_id FROM authorities ORDER BY id")?;
        let rows = stmt.query_map([], authority_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// First authority row holding `role`
    pub fn find_authority(&self, role: &str) -> Result<Option<Authority>> {
        let authority = self
            .conn()
            .query_row(
                "SELECT id, role, occupant_id FROM authorities WHERE role = ?1
                 ORDER BY id LIMIT 1",
                [role],
                authority_from_row,
            )
            .optional()?;
        Ok(authority)
    }

    pub fn create_authority(&self, role: &str, occupant: Option<EmployeeId>) -> Result<Authority> {
        self.conn().execute(
            "INSERT INTO authorities (role, occupant_id) VALUES (?1, ?2)",
            params![role, occupant],
        )?;
        Ok(Authority {
            id: self.conn().last_insert_rowid(),
            role: role.to_string(),
            occupant_id: occupant,
        })
    }

    pub fn set_authority_occupant(
        &self,
        id: AuthorityId,
        occupant: Option<EmployeeId>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE authorities SET occupant_id = ?2 WHERE id = ?1",
            params![id, occupant],
        )?;
        expect_row(changed, "authority", id)
    }

    /// Delete every authority row whose role is not in `roles`
    pub fn delete_authorities_except(&self, roles: &[&str]) -> Result<usize> {
        if roles.is_empty() {
            return Ok(self.conn().execute("DELETE FROM authorities", [])?);
        }
        let placeholders = vec!["?"; roles.len()].join(", ");
        let sql = format!("DELETE FROM authorities WHERE role NOT IN ({placeholders})");
        let deleted = self.conn().execute(&sql, params_from_iter(roles.iter()))?;
        Ok(deleted)
    }

    /// Delete every row holding `role` except the one [`Self::find_authority`] returns
    pub fn delete_duplicate_authorities(&self, role: &str) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM authorities WHERE role = ?1
             AND id > (SELECT MIN(id) FROM authorities WHERE role = ?1)",
            [role],
        )?;
        Ok(deleted)
    }
}

fn study_cycle_from_row(row: &Row<'_>) -> rusqlite::Result<StudyCycle> {
    Ok(StudyCycle {
        id: row.get(0)?,
        directory_key: row.get(1)?,
        name: row.get(2)?,
        submissions_open_at: row.get(3)?,
        submissions_close_at: row.get(4)?,
        sync: SyncFlag::new(row.get(5)?),
    })
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<OrganizationalUnit> {
    Ok(OrganizationalUnit {
        id: row.get(0)?,
        directory_key: row.get(1)?,
        name: row.get(2)?,
        head_id: row.get(3)?,
        sync: SyncFlag::new(row.get(4)?),
    })
}

fn authority_from_row(row: &Row<'_>) -> rusqlite::Result<Authority> {
    Ok(Authority {
        id: row.get(0)?,
        role: row.get(1)?,
        occupant_id: row.get(2)?,
    })
}
