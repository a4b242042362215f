use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Hr,
    HiringManager,
    Recruiter,
    Interviewer,
    FinanceApprover,
    Employee,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Hr,
        Role::HiringManager,
        Role::Recruiter,
        Role::Interviewer,
        Role::FinanceApprover,
        Role::Employee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::HiringManager => "hiring_manager",
            Role::Recruiter => "recruiter",
            Role::Interviewer => "interviewer",
            Role::FinanceApprover => "finance_approver",
            Role::Employee => "employee",
        }
    }

    /// Roles that pass every role check regardless of the allowed list.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn permissions(&self) -> &'static [Permission] {
        permissions_for(*self)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    // Tokens from the auth service are not consistent about case or separators.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let canonical = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == canonical)
            .ok_or_else(|| UnknownRole(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ListUsers,
    DeleteUsers,
    ManageUserRoles,
    ManageUserStatus,
    ManageOffices,
    ManageDepartments,
    CreateJobs,
    ManageAllJobs,
    ViewAllJobs,
    CreateCandidates,
    ViewAllCandidates,
    UploadCv,
    ManageCandidateStatus,
    ManagePipelineStatus,
    ManageFeedbackTemplates,
    ViewFeedbackTemplates,
    AttachFeedback,
    RemoveFeedback,
    ManageTenants,
}

const SUPER_ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ListUsers,
    Permission::DeleteUsers,
    Permission::ManageUserRoles,
    Permission::ManageUserStatus,
    Permission::ManageOffices,
    Permission::ManageDepartments,
    Permission::CreateJobs,
    Permission::ManageAllJobs,
    Permission::ViewAllJobs,
    Permission::CreateCandidates,
    Permission::ViewAllCandidates,
    Permission::UploadCv,
    Permission::ManageCandidateStatus,
    Permission::ManagePipelineStatus,
    Permission::ManageFeedbackTemplates,
    Permission::ViewFeedbackTemplates,
    Permission::AttachFeedback,
    Permission::RemoveFeedback,
    Permission::ManageTenants,
];

// Tenant administration stays with the platform operator.
const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ListUsers,
    Permission::DeleteUsers,
    Permission::ManageUserRoles,
    Permission::ManageUserStatus,
    Permission::ManageOffices,
    Permission::ManageDepartments,
    Permission::CreateJobs,
    Permission::ManageAllJobs,
    Permission::ViewAllJobs,
    Permission::CreateCandidates,
    Permission::ViewAllCandidates,
    Permission::UploadCv,
    Permission::ManageCandidateStatus,
    Permission::ManagePipelineStatus,
    Permission::ManageFeedbackTemplates,
    Permission::ViewFeedbackTemplates,
    Permission::AttachFeedback,
    Permission::RemoveFeedback,
];

const HR_PERMISSIONS: &[Permission] = &[
    Permission::ListUsers,
    Permission::ManageOffices,
    Permission::ManageDepartments,
    Permission::CreateJobs,
    Permission::ViewAllJobs,
    Permission::CreateCandidates,
    Permission::ViewAllCandidates,
    Permission::UploadCv,
    Permission::ManageCandidateStatus,
    Permission::ManageFeedbackTemplates,
    Permission::ViewFeedbackTemplates,
    Permission::AttachFeedback,
    Permission::RemoveFeedback,
];

const HIRING_MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::CreateJobs,
    Permission::CreateCandidates,
    Permission::ViewFeedbackTemplates,
    Permission::AttachFeedback,
    Permission::RemoveFeedback,
];

const RECRUITER_PERMISSIONS: &[Permission] = &[
    Permission::CreateCandidates,
    Permission::UploadCv,
    Permission::AttachFeedback,
    Permission::RemoveFeedback,
    Permission::ViewAllCandidates,
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::SuperAdmin => SUPER_ADMIN_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
        Role::Hr => HR_PERMISSIONS,
        Role::HiringManager => HIRING_MANAGER_PERMISSIONS,
        Role::Recruiter => RECRUITER_PERMISSIONS,
        Role::Interviewer | Role::FinanceApprover | Role::Employee => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_canonicalized_once() {
        assert_eq!("HR".parse::<Role>(), Ok(Role::Hr));
        assert_eq!(" Hiring-Manager ".parse::<Role>(), Ok(Role::HiringManager));
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn only_super_admin_manages_tenants() {
        for role in Role::ALL {
            assert_eq!(
                role.has_permission(Permission::ManageTenants),
                role == Role::SuperAdmin,
                "{role}"
            );
        }
    }

    #[test]
    fn recruiter_sees_all_candidates_but_cannot_manage_jobs() {
        assert!(Role::Recruiter.has_permission(Permission::ViewAllCandidates));
        assert!(!Role::Recruiter.has_permission(Permission::ManageAllJobs));
        assert!(Role::Interviewer.permissions().is_empty());
    }
}
