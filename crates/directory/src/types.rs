use serde::{Deserialize, Serialize};
use std::fmt;

/// A student entry (`ou=students,ou=people`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStudent {
    /// Account identifier (`uid`)
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// An employee entry (`ou=employees,ou=people`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEmployee {
    /// Account identifier (`uid`)
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    /// Academic title, e.g. "dr inż."
    #[serde(default)]
    pub title: String,
    /// Position held (assistant, professor, ...)
    #[serde(default)]
    pub position: String,
}

/// An external organization, represented by a single person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryOrganization {
    /// Account identifier (`uid`) of the representative
    pub id: String,
    /// Organization name
    pub name: String,
    pub representative_first_name: String,
    pub representative_last_name: String,
    #[serde(default)]
    pub representative_email: String,
}

/// A study cycle with the identifiers of its students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStudyCycle {
    /// Directory key (`cn`)
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// An organizational unit (department, dean's office, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryOrganizationalUnit {
    /// Directory key (`ou`)
    pub key: String,
    pub name: String,
    /// Employee identifier of the unit head
    #[serde(default)]
    pub head_id: Option<String>,
    /// Employee identifiers of unit members
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Faculty authority roles known to the system.
///
/// The set is closed: local authority rows with any other role are
/// configuration drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorityRole {
    #[serde(rename = "dean")]
    Dean,
    #[serde(rename = "vice-dean-promotion")]
    ViceDeanForPromotion,
    #[serde(rename = "vice-dean-science")]
    ViceDeanForResearch,
    #[serde(rename = "vice-dean-students")]
    ViceDeanForStudents,
}

impl AuthorityRole {
    /// Every known role, in reconciliation order
    pub const ALL: [AuthorityRole; 4] = [
        AuthorityRole::Dean,
        AuthorityRole::ViceDeanForPromotion,
        AuthorityRole::ViceDeanForResearch,
        AuthorityRole::ViceDeanForStudents,
    ];

    /// Role name used in the directory (`cn=<name>,ou=authorities`)
    pub fn directory_name(&self) -> &'static str {
        match self {
            Self::Dean => "dean",
            Self::ViceDeanForPromotion => "vice-dean-promotion",
            Self::ViceDeanForResearch => "vice-dean-science",
            Self::ViceDeanForStudents => "vice-dean-students",
        }
    }

    /// Role code stored in the local database
    pub fn code(&self) -> &'static str {
        match self {
            Self::Dean => "d",
            Self::ViceDeanForPromotion => "pr",
            Self::ViceDeanForResearch => "sc",
            Self::ViceDeanForStudents => "st",
        }
    }

    /// Human-readable role title
    pub fn title(&self) -> &'static str {
        match self {
            Self::Dean => "Dean",
            Self::ViceDeanForPromotion => "Vice-Dean for Promotion and Cooperation",
            Self::ViceDeanForResearch => "Vice-Dean for Research",
            Self::ViceDeanForStudents => "Vice-Dean for Teaching and Students",
        }
    }

    /// Look up a role by its local code
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    /// Look up a role by its directory name
    pub fn from_directory_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.directory_name() == name)
    }

    /// Occupants of these roles head the faculty
    pub fn is_faculty_head(&self) -> bool {
        matches!(self, Self::Dean | Self::ViceDeanForStudents)
    }
}

impl fmt::Display for AuthorityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in AuthorityRole::ALL {
            assert_eq!(AuthorityRole::from_code(role.code()), Some(role));
            assert_eq!(
                AuthorityRole::from_directory_name(role.directory_name()),
                Some(role)
            );
        }
        assert_eq!(AuthorityRole::from_code("campus-security"), None);
    }

    #[test]
    fn test_faculty_heads() {
        assert!(AuthorityRole::Dean.is_faculty_head());
        assert!(AuthorityRole::ViceDeanForStudents.is_faculty_head());
        assert!(!AuthorityRole::ViceDeanForResearch.is_faculty_head());
        assert!(!AuthorityRole::ViceDeanForPromotion.is_faculty_head());
    }
}
