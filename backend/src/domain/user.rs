//! User identity types shared across the engine.
//!
//! Account management is an external collaborator; the engine only needs
//! stable identifiers, display names for notification fan-out, and the
//! system-wide role that constrains project membership.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Strongly-typed user identifier.
///
/// # Examples
/// ```
/// use backend::domain::UserId;
///
/// let id = UserId::random();
/// assert_eq!(id, UserId::from_uuid(*id.as_uuid()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// System-wide role constraining which project roles a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalRole {
    /// May act on any project and bypass project-role restrictions.
    Admin,
    /// May hold the leader role in at most one project.
    Leader,
    /// Regular account.
    Member,
}

impl GlobalRole {
    /// Stable string form stored in the datastore and session.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Leader => "LEADER",
            Self::Member => "MEMBER",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self, super::Error> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "LEADER" => Ok(Self::Leader),
            "MEMBER" => Ok(Self::Member),
            other => Err(super::Error::internal(format!(
                "unknown global role '{other}'"
            ))),
        }
    }
}

/// A user account as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Name rendered in notifications and board views.
    pub display_name: String,
    /// System-wide role.
    pub global_role: GlobalRole,
}

/// The authenticated caller of an operation.
///
/// Built once per request by the inbound adapter from session state and
/// threaded through authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// The caller's identity.
    pub user_id: UserId,
    /// The caller's system-wide role.
    pub global_role: GlobalRole,
}

impl Actor {
    /// Whether the caller holds the system-wide admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.global_role, GlobalRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GlobalRole::Admin, "ADMIN")]
    #[case(GlobalRole::Leader, "LEADER")]
    #[case(GlobalRole::Member, "MEMBER")]
    fn global_role_round_trips(#[case] role: GlobalRole, #[case] text: &str) {
        assert_eq!(role.as_str(), text);
        assert_eq!(GlobalRole::parse(text).expect("parses role"), role);
    }

    #[rstest]
    fn unknown_global_role_is_rejected() {
        let err = GlobalRole::parse("OWNER").expect_err("unknown role fails");
        assert!(err.to_string().contains("OWNER"));
    }

    #[rstest]
    fn only_admin_actor_is_admin() {
        let admin = Actor {
            user_id: UserId::random(),
            global_role: GlobalRole::Admin,
        };
        let member = Actor {
            user_id: UserId::random(),
            global_role: GlobalRole::Member,
        };
        assert!(admin.is_admin());
        assert!(!member.is_admin());
    }
}
