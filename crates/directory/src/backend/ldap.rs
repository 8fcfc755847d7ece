//! LDAP backend.
//!
//! Reads the faculty directory through a blocking `ldap3::LdapConn`.
//! Expected layout under the base DN:
//!
//! - `ou=students,ou=people` - students (`inetOrgPerson`)
//! - `ou=employees,ou=people` - employees (`inetOrgPerson`)
//! - `ou=organizations,ou=people` - external organizations (`organizationalPerson`)
//! - `ou=studycycles` - study cycles, students listed in `member`
//! - `ou=units` - organizational units; each has a head role node and a
//!   members group node beneath it
//! - `ou=authorities` - one `organizationalRole` per faculty role
//!
//! Relationship attributes hold DNs. Identifiers are taken from the `uid`
//! RDN of each referenced DN.

use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{
    AuthorityRole, DirectoryEmployee, DirectoryOrganization, DirectoryOrganizationalUnit,
    DirectoryStudent, DirectoryStudyCycle,
};

use super::DirectoryReader;

/// LDAP result code for a missing search base
const NO_SUCH_OBJECT: u32 = 32;

const STUDENTS_CONTAINER: &str = "ou=students,ou=people";
const EMPLOYEES_CONTAINER: &str = "ou=employees,ou=people";
const ORGANIZATIONS_CONTAINER: &str = "ou=organizations,ou=people";
const STUDY_CYCLES_CONTAINER: &str = "ou=studycycles";
const UNITS_CONTAINER: &str = "ou=units";
const AUTHORITIES_CONTAINER: &str = "ou=authorities";

/// Connection settings for the LDAP backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapSettings {
    /// Server URL (`ldap://host:389` or `ldaps://host:636`)
    pub url: String,

    /// Base DN of the faculty subtree (e.g. `ou=FCS,o=BUT,c=pl`)
    pub base_dn: String,

    /// DN used for the simple bind; anonymous bind when empty
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Environment variable holding the bind password (preferred over `bind_password`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password_env: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// RDN of the role node naming a unit's head, relative to the unit
    #[serde(default = "default_unit_head_node")]
    pub unit_head_node: String,

    /// RDN of the group node listing a unit's members, relative to the unit
    #[serde(default = "default_unit_members_node")]
    pub unit_members_node: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_unit_head_node() -> String {
    "cn=kierownik".to_string()
}

fn default_unit_members_node() -> String {
    "cn=pracownicy".to_string()
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: "ou=FCS,o=BUT,c=pl".to_string(),
            bind_dn: String::new(),
            bind_password: None,
            bind_password_env: None,
            timeout_secs: default_timeout_secs(),
            unit_head_node: default_unit_head_node(),
            unit_members_node: default_unit_members_node(),
        }
    }
}

impl std::fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSettings")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("bind_password_env", &self.bind_password_env)
            .field("timeout_secs", &self.timeout_secs)
            .field("unit_head_node", &self.unit_head_node)
            .field("unit_members_node", &self.unit_members_node)
            .finish()
    }
}

impl LdapSettings {
    /// Check the settings for obvious mistakes before connecting
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ldap://") || self.url.starts_with("ldaps://")) {
            return Err(Error::Connection(format!(
                "url must start with ldap:// or ldaps:// (got '{}')",
                self.url
            )));
        }
        if self.base_dn.trim().is_empty() {
            return Err(Error::Connection("base_dn must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Connection("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolve the bind password, reading the environment variable if configured
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(var) = &self.bind_password_env {
            return std::env::var(var).map_err(|_| {
                Error::Connection(format!("bind password variable {var} is not set"))
            });
        }
        Ok(self.bind_password.clone().unwrap_or_default())
    }

    fn container(&self, rdn: &str) -> String {
        format!("{rdn},{}", self.base_dn)
    }
}

/// Directory backed by a live LDAP server.
pub struct LdapDirectory {
    settings: LdapSettings,
    conn: Mutex<LdapConn>,
}

impl LdapDirectory {
    /// Connect and bind.
    pub fn connect(settings: LdapSettings) -> Result<Self> {
        settings.validate()?;

        log::debug!("Connecting to LDAP server at {}", settings.url);
        let conn_settings =
            LdapConnSettings::new().set_conn_timeout(Duration::from_secs(settings.timeout_secs));
        let mut conn = LdapConn::with_settings(conn_settings, &settings.url)
            .map_err(|e| Error::Connection(format!("{}: {e}", settings.url)))?;

        if !settings.bind_dn.is_empty() {
            let password = settings.resolve_password()?;
            log::debug!("Binding as {}", settings.bind_dn);
            conn.simple_bind(&settings.bind_dn, &password)
                .and_then(|r| r.success())
                .map_err(|e| {
                    Error::Connection(format!("bind as {} failed: {e}", settings.bind_dn))
                })?;
        }

        Ok(Self {
            settings,
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, LdapConn>> {
        self.conn
            .lock()
            .map_err(|_| Error::Connection("LDAP connection lock poisoned".to_string()))
    }

    /// Run a search. Returns `None` when the search base does not exist.
    fn search(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Option<Vec<SearchEntry>>> {
        log::trace!("LDAP search base={base} filter={filter}");
        let mut conn = self.lock()?;
        match conn
            .search(base, scope, filter, attrs.to_vec())
            .and_then(|r| r.success())
        {
            Ok((entries, _)) => Ok(Some(entries.into_iter().map(SearchEntry::construct).collect())),
            Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => Ok(None),
            Err(e) => Err(Error::search(base, e)),
        }
    }

    /// Search a container that must exist
    fn search_container(
        &self,
        container: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        let base = self.settings.container(container);
        self.search(&base, Scope::OneLevel, filter, attrs)?
            .ok_or_else(|| Error::search(base.clone(), "search base does not exist"))
    }

    /// `uid` values of the DNs listed in `attr` of the entry at `dn`
    fn referenced_ids(&self, dn: &str, attr: &str) -> Result<Vec<String>> {
        let entries = match self.search(dn, Scope::Base, "(objectClass=*)", &[attr])? {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };
        let member_dns: Vec<String> = entries.iter().flat_map(|entry| all(entry, attr)).collect();
        Ok(uid_references(dn, &member_dns))
    }
}

impl DirectoryReader for LdapDirectory {
    fn list_students(&self) -> Result<Vec<DirectoryStudent>> {
        self.search_container(
            STUDENTS_CONTAINER,
            "(objectClass=inetOrgPerson)",
            &["uid", "givenName", "sn", "mail"],
        )?
        .iter()
        .map(|entry| -> Result<DirectoryStudent> {
            Ok(DirectoryStudent {
                id: required(entry, "uid")?,
                first_name: first(entry, "givenName").unwrap_or_default(),
                last_name: first(entry, "sn").unwrap_or_default(),
                email: first(entry, "mail").unwrap_or_default(),
            })
        })
        .collect()
    }

    fn list_employees(&self) -> Result<Vec<DirectoryEmployee>> {
        self.search_container(
            EMPLOYEES_CONTAINER,
            "(objectClass=inetOrgPerson)",
            &["uid", "givenName", "sn", "mail", "title", "employeeType"],
        )?
        .iter()
        .map(|entry| -> Result<DirectoryEmployee> {
            Ok(DirectoryEmployee {
                id: required(entry, "uid")?,
                first_name: first(entry, "givenName").unwrap_or_default(),
                last_name: first(entry, "sn").unwrap_or_default(),
                email: first(entry, "mail").unwrap_or_default(),
                title: first(entry, "title").unwrap_or_default(),
                position: first(entry, "employeeType").unwrap_or_default(),
            })
        })
        .collect()
    }

    fn list_organizations(&self) -> Result<Vec<DirectoryOrganization>> {
        self.search_container(
            ORGANIZATIONS_CONTAINER,
            "(objectClass=organizationalPerson)",
            &["uid", "cn", "givenName", "sn", "mail"],
        )?
        .iter()
        .map(|entry| -> Result<DirectoryOrganization> {
            Ok(DirectoryOrganization {
                id: required(entry, "uid")?,
                name: required(entry, "cn")?,
                representative_first_name: first(entry, "givenName").unwrap_or_default(),
                representative_last_name: first(entry, "sn").unwrap_or_default(),
                representative_email: first(entry, "mail").unwrap_or_default(),
            })
        })
        .collect()
    }

    fn list_study_cycles(&self) -> Result<Vec<DirectoryStudyCycle>> {
        self.search_container(STUDY_CYCLES_CONTAINER, "(objectClass=*)", &["cn", "member"])?
            .iter()
            .map(|entry| -> Result<DirectoryStudyCycle> {
                let key = required(entry, "cn")?;
                let member_ids = uid_references(&entry.dn, &all(entry, "member"));
                Ok(DirectoryStudyCycle {
                    name: key.clone(),
                    key,
                    member_ids,
                })
            })
            .collect()
    }

    fn list_organizational_units(&self) -> Result<Vec<DirectoryOrganizationalUnit>> {
        let entries = self.search_container(
            UNITS_CONTAINER,
            "(objectClass=organizationalUnit)",
            &["ou", "description"],
        )?;

        let mut units = Vec::with_capacity(entries.len());
        for entry in &entries {
            let key = required(entry, "ou")?;
            let head_dn = format!("{},{}", self.settings.unit_head_node, entry.dn);
            let members_dn = format!("{},{}", self.settings.unit_members_node, entry.dn);

            units.push(DirectoryOrganizationalUnit {
                name: first(entry, "description").unwrap_or_else(|| key.clone()),
                key,
                head_id: self.referenced_ids(&head_dn, "roleOccupant")?.into_iter().next(),
                member_ids: self.referenced_ids(&members_dn, "member")?,
            });
        }
        Ok(units)
    }

    fn authority_occupant(&self, role: AuthorityRole) -> Result<Option<String>> {
        let dn = format!(
            "cn={},{}",
            ldap3::dn_escape(role.directory_name()),
            self.settings.container(AUTHORITIES_CONTAINER)
        );
        let entries = self
            .search(&dn, Scope::Base, "(objectClass=organizationalRole)", &["roleOccupant"])?
            .ok_or_else(|| Error::NotFound(dn.clone()))?;
        let entry = entries.first().ok_or_else(|| Error::NotFound(dn.clone()))?;

        Ok(first(entry, "roleOccupant").and_then(|occupant| rdn_value(&occupant, "uid")))
    }

    fn describe(&self) -> String {
        format!("LDAP {} ({})", self.settings.url, self.settings.base_dn)
    }
}

fn first(entry: &SearchEntry, attr: &str) -> Option<String> {
    entry.attrs.get(attr).and_then(|values| values.first()).cloned()
}

fn all(entry: &SearchEntry, attr: &str) -> Vec<String> {
    entry.attrs.get(attr).cloned().unwrap_or_default()
}

fn required(entry: &SearchEntry, attr: &str) -> Result<String> {
    first(entry, attr).ok_or_else(|| Error::InvalidEntry {
        dn: entry.dn.clone(),
        message: format!("missing attribute '{attr}'"),
    })
}

/// Value of the leading RDN of `dn` if its attribute is `attr`
///
/// `rdn_value("uid=u1,ou=students", "uid") == Some("u1")`
/// `uid` values of `member_dns`, warning about DNs that carry none
fn uid_references(source_dn: &str, member_dns: &[String]) -> Vec<String> {
    member_dns
        .iter()
        .filter_map(|member_dn| {
            let id = rdn_value(member_dn, "uid");
            if id.is_none() {
                log::warn!("Ignoring reference without uid RDN in {source_dn}: {member_dn}");
            }
            id
        })
        .collect()
}

pub(crate) fn rdn_value(dn: &str, attr: &str) -> Option<String> {
    let (name, value) = dn.split(',').next()?.split_once('=')?;
    if name.trim().eq_ignore_ascii_case(attr) && !value.trim().is_empty() {
        Some(value.trim().to_string())
    } else {
        None
    }
}
