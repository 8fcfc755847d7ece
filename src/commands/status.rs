use anyhow::Result;
use colored::Colorize;
use directory::AuthorityRole;
use faculty::{Store, SyncFlagSummary};
use reconcile::PermissionTable;

use crate::Context;
use crate::commands::open_store;
use crate::schema::FacsyncConfig;
use crate::ui;

/// Occupancy of one authority role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOccupancy {
    pub role: AuthorityRole,
    /// `None` when the store has no row for the role
    pub occupant: Option<Option<String>>,
}

#[derive(Debug)]
pub struct StoreStatus {
    pub accounts: u64,
    pub flags: Vec<SyncFlagSummary>,
    pub roles: Vec<RoleOccupancy>,
    pub groups: Vec<(String, usize)>,
}

pub fn run(_ctx: &Context, config: &FacsyncConfig) -> Result<()> {
    let path = config.database_path()?;
    let store = open_store(config)?;
    let status = collect(&store)?;

    ui::header("facsync Status");
    ui::kv("Database", &path.display().to_string());
    ui::kv("Directory", &format!("{:?}", config.directory.source).to_lowercase());
    ui::kv("Accounts", &status.accounts.to_string());

    ui::section("Directory flags");
    for summary in &status.flags {
        let unsynced = if summary.unsynced > 0 {
            summary.unsynced.to_string().yellow()
        } else {
            summary.unsynced.to_string().dimmed()
        };
        ui::kv(
            summary.entity.label(),
            &format!(
                "{} total, {} {} synced, {} unsynced",
                summary.total().to_string().bold(),
                summary.synced.to_string().green(),
                "✓".green(),
                unsynced
            ),
        );
    }

    ui::section("Authorities");
    for role in &status.roles {
        let shown = match &role.occupant {
            None => "not recorded".dimmed().to_string(),
            Some(None) => "vacant".yellow().to_string(),
            Some(Some(username)) => username.clone(),
        };
        ui::kv(role.role.title(), &shown);
    }

    ui::section("Capability groups");
    for (name, members) in &status.groups {
        ui::kv(name, &format!("{members} members"));
    }

    println!();
    Ok(())
}

/// Gather flag counts, authority occupancy and group sizes from the store
pub fn collect(store: &Store) -> Result<StoreStatus> {
    let accounts = store.count_accounts()?;
    let flags = store.sync_summary()?;

    let mut roles = Vec::with_capacity(AuthorityRole::ALL.len());
    for role in AuthorityRole::ALL {
        let occupant = match store.find_authority(role.code())? {
            None => None,
            Some(authority) => Some(match authority.occupant_id {
                Some(id) => Some(store.employee(id)?.username),
                None => None,
            }),
        };
        roles.push(RoleOccupancy { role, occupant });
    }

    let mut groups = Vec::new();
    for spec in &PermissionTable::standard().groups {
        if let Some(group) = store.find_group(&spec.name)? {
            groups.push((spec.name.clone(), store.group_members(group.id)?.len()));
        }
    }

    Ok(StoreStatus {
        accounts,
        flags,
        roles,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_empty_store() {
        let store = Store::open_in_memory().unwrap();
        let status = collect(&store).unwrap();

        assert_eq!(status.accounts, 0);
        assert_eq!(status.flags.len(), 5);
        assert!(status.flags.iter().all(|f| f.total() == 0));
        assert_eq!(status.roles.len(), AuthorityRole::ALL.len());
        assert!(status.roles.iter().all(|r| r.occupant.is_none()));
        assert!(status.groups.is_empty());
    }

    #[test]
    fn test_collect_reports_occupancy() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("e1").unwrap();
        let employee = store.create_employee(account.id).unwrap();
        store
            .create_authority(AuthorityRole::Dean.code(), Some(employee.id))
            .unwrap();
        store
            .create_authority(AuthorityRole::ViceDeanForResearch.code(), None)
            .unwrap();

        let status = collect(&store).unwrap();
        let dean = status
            .roles
            .iter()
            .find(|r| r.role == AuthorityRole::Dean)
            .unwrap();
        assert_eq!(dean.occupant, Some(Some("e1".to_string())));

        let science = status
            .roles
            .iter()
            .find(|r| r.role == AuthorityRole::ViceDeanForResearch)
            .unwrap();
        assert_eq!(science.occupant, Some(None));
    }
}
