//! Permissions, capability groups and group membership

use crate::types::{AccountId, Group, GroupId, Permission, PermissionId};
use crate::{Error, Result, Store};
use rusqlite::{OptionalExtension, Row, params};

impl Store {
    // ========================================================================
    // Permissions
    // ========================================================================

    pub fn find_permission(&self, scope: &str, codename: &str) -> Result<Option<Permission>> {
        let permission = self
            .conn()
            .query_row(
                "SELECT id, scope, codename, description FROM permissions
                 WHERE scope = ?1 AND codename = ?2",
                [scope, codename],
                permission_from_row,
            )
            .optional()?;
        Ok(permission)
    }

    pub fn create_permission(
        &self,
        scope: &str,
        codename: &str,
        description: &str,
    ) -> Result<Permission> {
        self.conn().execute(
            "INSERT INTO permissions (scope, codename, description) VALUES (?1, ?2, ?3)",
            [scope, codename, description],
        )?;
        Ok(Permission {
            id: self.conn().last_insert_rowid(),
            scope: scope.to_string(),
            codename: codename.to_string(),
            description: description.to_string(),
        })
    }

    /// Delete a permission and every grant of it
    pub fn delete_permission(&self, id: PermissionId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM permissions WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    pub fn count_permissions(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM permissions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ========================================================================
    // Groups
    // ========================================================================

    pub fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let group = self
            .conn()
            .query_row(
                "SELECT id, name FROM capability_groups WHERE name = ?1",
                [name],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    pub fn create_group(&self, name: &str) -> Result<Group> {
        self.conn()
            .execute("INSERT INTO capability_groups (name) VALUES (?1)", [name])?;
        Ok(Group {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Delete a group together with its grants and memberships
    pub fn delete_group(&self, id: GroupId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM capability_groups WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    pub fn grant_group_permission(&self, group_id: GroupId, permission_id: PermissionId) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO group_permissions (group_id, permission_id) VALUES (?1, ?2)",
            params![group_id, permission_id],
        )?;
        Ok(())
    }

    /// Permissions granted to a group, ordered by scope and codename
    pub fn group_permissions(&self, group_id: GroupId) -> Result<Vec<Permission>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.scope, p.codename, p.description
             FROM group_permissions g JOIN permissions p ON p.id = g.permission_id
             WHERE g.group_id = ?1
             ORDER BY p.scope, p.codename",
        )?;
        let rows = stmt.query_map([group_id], permission_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Put an account in a group; returns false if it was already a member
    pub fn add_account_to_group(&self, account_id: AccountId, group_id: GroupId) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO account_groups (account_id, group_id) VALUES (?1, ?2)",
            params![account_id, group_id],
        )?;
        Ok(inserted > 0)
    }

    /// Put an account in the group called `name`
    pub fn add_account_to_named_group(&self, account_id: AccountId, name: &str) -> Result<bool> {
        let group = self
            .find_group(name)?
            .ok_or_else(|| Error::not_found("group", name))?;
        self.add_account_to_group(account_id, group.id)
    }

    pub fn remove_account_from_group(
        &self,
        account_id: AccountId,
        group_id: GroupId,
    ) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM account_groups WHERE account_id = ?1 AND group_id = ?2",
            params![account_id, group_id],
        )?;
        Ok(removed > 0)
    }

    /// Names of the groups an account belongs to, sorted
    pub fn account_groups(&self, account_id: AccountId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.name FROM account_groups m
             JOIN capability_groups g ON g.id = m.group_id
             WHERE m.account_id = ?1
             ORDER BY g.name",
        )?;
        let rows = stmt.query_map([account_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Usernames of a group's members, sorted
    pub fn group_members(&self, group_id: GroupId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT a.username FROM account_groups m
             JOIN accounts a ON a.id = m.account_id
             WHERE m.group_id = ?1
             ORDER BY a.username",
        )?;
        let rows = stmt.query_map([group_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get(0)?,
        scope: row.get(1)?,
        codename: row.get(2)?,
        description: row.get(3)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}
