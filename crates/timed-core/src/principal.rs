//! The authenticated actor behind a request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A role tag held by a principal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
  Regular,
  ProjectAdmin,
  SystemAdmin,
}

/// An authenticated user together with their roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub identity: Uuid,
  pub roles:    BTreeSet<Role>,
}

impl Principal {
  /// Every principal implicitly holds [`Role::Regular`].
  pub fn new(identity: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
    let mut roles: BTreeSet<Role> = roles.into_iter().collect();
    roles.insert(Role::Regular);
    Self { identity, roles }
  }

  pub fn has_role(&self, role: Role) -> bool { self.roles.contains(&role) }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn regular_role_is_implicit() {
    let p = Principal::new(Uuid::new_v4(), [Role::SystemAdmin]);
    assert!(p.has_role(Role::Regular));
    assert!(p.has_role(Role::SystemAdmin));
    assert!(!p.has_role(Role::ProjectAdmin));
  }

  #[test]
  fn role_string_forms_agree() {
    assert_eq!(Role::ProjectAdmin.to_string(), "project-admin");
    assert_eq!(Role::from_str("system-admin").unwrap(), Role::SystemAdmin);
    assert_eq!(
      serde_json::to_string(&Role::SystemAdmin).unwrap(),
      "\"system-admin\""
    );
  }
}
