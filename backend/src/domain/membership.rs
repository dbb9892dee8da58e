//! Project membership, roles, and per-request capabilities.
//!
//! Authorization is evaluated once per request: the inbound adapter loads
//! the project context and the caller's membership, computes a
//! [`Capabilities`] value, and passes it to the services. Individual
//! operations never re-derive role comparisons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;
use super::user::{Actor, UserId};

/// Role a user holds within one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectRole {
    /// Runs the project; at most one per project, and a user may hold it in
    /// at most one project system-wide.
    Leader,
    /// Builds things.
    Developer,
    /// Designs things.
    Designer,
    /// Read-only participant; may not be assigned work.
    Observer,
}

impl ProjectRole {
    /// Stable string form stored in the datastore.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Developer => "DEVELOPER",
            Self::Designer => "DESIGNER",
            Self::Observer => "OBSERVER",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "LEADER" => Ok(Self::Leader),
            "DEVELOPER" => Ok(Self::Developer),
            "DESIGNER" => Ok(Self::Designer),
            "OBSERVER" => Ok(Self::Observer),
            other => Err(Error::internal(format!("unknown project role '{other}'"))),
        }
    }
}

/// Join record giving a user a role within one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    /// Stable identifier of the membership row.
    pub id: Uuid,
    /// Project the membership belongs to.
    pub project_id: Uuid,
    /// The member.
    pub user_id: UserId,
    /// Role held within the project.
    pub role: ProjectRole,
    /// When the membership was granted.
    pub joined_at: DateTime<Utc>,
}

/// The slice of project state authorization and exclusivity checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    /// Stable identifier.
    pub project_id: Uuid,
    /// Who created the project; creators keep leader-grade capabilities.
    pub creator_id: UserId,
    /// Completed projects relax the one-task-per-user rule.
    pub completed: bool,
}

/// What the acting user may do within one project, computed once per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// May assign and unassign workers.
    pub can_assign: bool,
    /// May edit card fields, dates, and priority.
    pub can_edit_card: bool,
    /// May delete cards.
    pub can_delete_card: bool,
    /// May resolve overtime approvals.
    pub can_manage_approvals: bool,
    /// Holds any membership in the project at all.
    pub is_member: bool,
}

impl Capabilities {
    /// Evaluate the capability set for `actor` against a project.
    ///
    /// Leader-grade rights go to the project leader, the project creator,
    /// and system-wide admins. Plain members only gain `is_member`.
    #[must_use]
    pub fn evaluate(
        actor: &Actor,
        project: &ProjectContext,
        membership: Option<&ProjectMember>,
    ) -> Self {
        let is_member = membership.is_some();
        let is_leader = membership.is_some_and(|m| matches!(m.role, ProjectRole::Leader));
        let leader_grade = is_leader || project.creator_id == actor.user_id || actor.is_admin();

        Self {
            can_assign: leader_grade,
            can_edit_card: leader_grade,
            can_delete_card: leader_grade,
            can_manage_approvals: leader_grade,
            is_member,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::GlobalRole;
    use rstest::{fixture, rstest};

    #[fixture]
    fn project() -> ProjectContext {
        ProjectContext {
            project_id: Uuid::new_v4(),
            creator_id: UserId::random(),
            completed: false,
        }
    }

    fn membership(project_id: Uuid, user_id: UserId, role: ProjectRole) -> ProjectMember {
        ProjectMember {
            id: Uuid::new_v4(),
            project_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(ProjectRole::Leader, "LEADER")]
    #[case(ProjectRole::Developer, "DEVELOPER")]
    #[case(ProjectRole::Designer, "DESIGNER")]
    #[case(ProjectRole::Observer, "OBSERVER")]
    fn project_role_round_trips(#[case] role: ProjectRole, #[case] text: &str) {
        assert_eq!(role.as_str(), text);
        assert_eq!(ProjectRole::parse(text).expect("parses role"), role);
    }

    #[rstest]
    fn leader_membership_grants_leader_grade_rights(project: ProjectContext) {
        let user_id = UserId::random();
        let actor = Actor {
            user_id,
            global_role: GlobalRole::Leader,
        };
        let member = membership(project.project_id, user_id, ProjectRole::Leader);

        let caps = Capabilities::evaluate(&actor, &project, Some(&member));
        assert!(caps.can_assign);
        assert!(caps.can_edit_card);
        assert!(caps.can_delete_card);
        assert!(caps.can_manage_approvals);
        assert!(caps.is_member);
    }

    #[rstest]
    fn developer_membership_grants_membership_only(project: ProjectContext) {
        let user_id = UserId::random();
        let actor = Actor {
            user_id,
            global_role: GlobalRole::Member,
        };
        let member = membership(project.project_id, user_id, ProjectRole::Developer);

        let caps = Capabilities::evaluate(&actor, &project, Some(&member));
        assert!(!caps.can_assign);
        assert!(caps.is_member);
    }

    #[rstest]
    fn project_creator_keeps_rights_without_membership(mut project: ProjectContext) {
        let user_id = UserId::random();
        project.creator_id = user_id;
        let actor = Actor {
            user_id,
            global_role: GlobalRole::Member,
        };

        let caps = Capabilities::evaluate(&actor, &project, None);
        assert!(caps.can_assign);
        assert!(!caps.is_member);
    }

    #[rstest]
    fn admin_bypasses_membership(project: ProjectContext) {
        let actor = Actor {
            user_id: UserId::random(),
            global_role: GlobalRole::Admin,
        };

        let caps = Capabilities::evaluate(&actor, &project, None);
        assert!(caps.can_assign);
        assert!(caps.can_manage_approvals);
        assert!(!caps.is_member);
    }

    #[rstest]
    fn outsider_gets_nothing(project: ProjectContext) {
        let actor = Actor {
            user_id: UserId::random(),
            global_role: GlobalRole::Member,
        };

        let caps = Capabilities::evaluate(&actor, &project, None);
        assert_eq!(caps, Capabilities::default());
    }
}
