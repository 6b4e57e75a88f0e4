//! POSIX-style access control entries as reported by the Data Lake
//! `x-ms-acl` header, e.g. `user::rwx,user:5f1c...:r-x,group::r-x,other::---`.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AclKind {
    User,
    Group,
    Mask,
    Other,
}

impl AclKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            "mask" => Some(Self::Mask),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for AclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Mask => "mask",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessControlEntry {
    /// `true` for `default:` entries inherited by new children.
    pub default_scope: bool,
    pub kind: AclKind,
    /// Object id of the principal. Empty for the owning user/group.
    pub principal_id: String,
    pub permissions: String,
}

impl AccessControlEntry {
    pub fn is_user(&self) -> bool {
        self.kind == AclKind::User
    }
}

/// Parse a comma separated ACL. Entries that do not match
/// `[default:]kind:id:perms` are skipped.
pub fn parse_acl(header: &str) -> Vec<AccessControlEntry> {
    header
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<AccessControlEntry> {
    let (default_scope, rest) = match entry.strip_prefix("default:") {
        Some(rest) => (true, rest),
        None => (false, entry),
    };

    let mut parts = rest.splitn(3, ':');
    let kind = AclKind::parse(parts.next()?)?;
    let principal_id = parts.next()?.to_string();
    let permissions = parts.next()?.to_string();

    Some(AccessControlEntry {
        default_scope,
        kind,
        principal_id,
        permissions,
    })
}
