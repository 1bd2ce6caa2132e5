//! Request-scoped data access.
//!
//! An [`AccessPolicy`] maps every entity type to a read rule and to the roles
//! allowed to write it. Reads are filtered: a principal simply does not see
//! what it may not read. Writes are checked: a principal lacking the required
//! role gets [`Error::PermissionDenied`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::Assignment,
  principal::{Principal, Role},
};

// ─── Entity types and actions ────────────────────────────────────────────────

/// Every collection the service exposes.
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
  EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EntityType {
  Employment,
  Location,
  PublicHoliday,
  AbsenceType,
  AbsenceCredit,
  OvertimeCredit,
  Absence,
  Attendance,
  Activity,
  ActivityBlock,
  Report,
  TaskTemplate,
}

impl EntityType {
  /// Whether records of this type belong to a single user.
  pub fn is_owned(self) -> bool {
    !matches!(
      self,
      Self::Location | Self::PublicHoliday | Self::AbsenceType | Self::TaskTemplate
    )
  }
}

/// A mutating operation.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
  Create,
  Update,
  Delete,
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// An entity that may carry an owner reference.
pub trait Owned {
  /// The owning user, or `None` for shared records.
  fn owner(&self) -> Option<Uuid>;
}

impl<T: Owned + ?Sized> Owned for &T {
  fn owner(&self) -> Option<Uuid> { (**self).owner() }
}

impl Owned for Assignment {
  fn owner(&self) -> Option<Uuid> { Some(self.subject_id) }
}

// ─── Scope ───────────────────────────────────────────────────────────────────

/// The filter predicate a principal's reads are subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Every record of the collection.
  All,
  /// Only records owned by this user.
  Owner(Uuid),
  /// Nothing at all.
  Empty,
}

impl Scope {
  pub fn admits(&self, owner: Option<Uuid>) -> bool {
    match self {
      Self::All => true,
      Self::Owner(id) => owner == Some(*id),
      Self::Empty => false,
    }
  }

  /// Intersect with an explicit request for one user's records.
  pub fn narrow_to(self, user: Option<Uuid>) -> Self {
    match (self, user) {
      (scope, None) => scope,
      (Self::All, Some(u)) => Self::Owner(u),
      (Self::Owner(id), Some(u)) if id == u => Self::Owner(id),
      _ => Self::Empty,
    }
  }

  /// Lazily drop every item outside the scope.
  pub fn filter<T, I>(self, items: I) -> impl Iterator<Item = T>
  where
    T: Owned,
    I: IntoIterator<Item = T>,
  {
    items.into_iter().filter(move |item| self.admits(item.owner()))
  }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How much of a collection a principal may read.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  Own,
  All,
}

/// Access rule for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRule {
  /// Visibility for principals without a matching override.
  pub read:           Visibility,
  /// Broader visibility granted to specific roles.
  #[serde(default)]
  pub read_overrides: BTreeMap<Role, Visibility>,
  /// Roles allowed to perform each action. A missing action is denied to
  /// everyone.
  #[serde(default)]
  pub writers:        BTreeMap<Action, BTreeSet<Role>>,
}

impl EntityRule {
  fn new(read: Visibility) -> Self {
    Self { read, read_overrides: BTreeMap::new(), writers: BTreeMap::new() }
  }

  fn read_override(mut self, role: Role, visibility: Visibility) -> Self {
    self.read_overrides.insert(role, visibility);
    self
  }

  fn writable_by(mut self, roles: &[Role]) -> Self {
    let roles: BTreeSet<Role> = roles.iter().copied().collect();
    for action in [Action::Create, Action::Update, Action::Delete] {
      self.writers.insert(action, roles.clone());
    }
    self
  }
}

/// Entity type → access rule. Entity types without a rule are readable by
/// their owner only and writable by nobody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy {
  rules: BTreeMap<EntityType, EntityRule>,
}

impl AccessPolicy {
  pub fn new(rules: BTreeMap<EntityType, EntityRule>) -> Self { Self { rules } }

  pub fn rule(&self, entity_type: EntityType) -> Option<&EntityRule> {
    self.rules.get(&entity_type)
  }

  /// The broadest visibility any of the principal's roles grants.
  pub fn visibility(&self, principal: &Principal, entity_type: EntityType) -> Visibility {
    let Some(rule) = self.rule(entity_type) else {
      return Visibility::Own;
    };
    principal
      .roles
      .iter()
      .filter_map(|role| rule.read_overrides.get(role).copied())
      .fold(rule.read, Visibility::max)
  }

  /// The read scope for `principal` over `entity_type`.
  pub fn scope(&self, principal: &Principal, entity_type: EntityType) -> Scope {
    match self.visibility(principal, entity_type) {
      Visibility::All => Scope::All,
      Visibility::Own => Scope::Owner(principal.identity),
    }
  }

  /// Check that `principal` holds a role allowed to perform `action`.
  pub fn authorize(
    &self,
    principal: &Principal,
    action: Action,
    entity_type: EntityType,
  ) -> Result<()> {
    let allowed = self
      .rule(entity_type)
      .and_then(|rule| rule.writers.get(&action))
      .is_some_and(|roles| roles.iter().any(|r| principal.has_role(*r)));

    if allowed {
      return Ok(());
    }
    tracing::warn!(
      principal = %principal.identity,
      %action,
      %entity_type,
      "write denied"
    );
    Err(Error::PermissionDenied {
      principal: principal.identity,
      action,
      entity_type,
    })
  }

  /// Like [`authorize`](Self::authorize), and additionally require that the
  /// principal may read records of `owner`. Writing on behalf of a user whose
  /// records are invisible to the principal is denied.
  pub fn authorize_for(
    &self,
    principal: &Principal,
    action: Action,
    entity_type: EntityType,
    owner: Option<Uuid>,
  ) -> Result<()> {
    self.authorize(principal, action, entity_type)?;
    if owner.is_some() && !self.scope(principal, entity_type).admits(owner) {
      tracing::warn!(
        principal = %principal.identity,
        %action,
        %entity_type,
        "write on behalf of another user denied"
      );
      return Err(Error::PermissionDenied {
        principal: principal.identity,
        action,
        entity_type,
      });
    }
    Ok(())
  }
}

impl Default for AccessPolicy {
  /// Contracts and credits are managed by system administrators; catalogue
  /// data is public; time tracking belongs to each user.
  fn default() -> Self {
    use EntityType as E;
    use Role::{Regular, SystemAdmin};
    use Visibility::{All, Own};

    let rules = E::iter()
      .map(|entity_type| {
        let rule = match entity_type {
          E::Employment | E::AbsenceCredit | E::OvertimeCredit => EntityRule::new(Own)
            .read_override(SystemAdmin, All)
            .writable_by(&[SystemAdmin]),
          E::Location | E::PublicHoliday | E::AbsenceType | E::TaskTemplate => {
            EntityRule::new(All).writable_by(&[SystemAdmin])
          }
          E::Absence | E::Attendance | E::Activity | E::ActivityBlock | E::Report => {
            EntityRule::new(Own).writable_by(&[Regular])
          }
        };
        (entity_type, rule)
      })
      .collect();
    Self { rules }
  }
}
