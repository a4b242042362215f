//! Access guards.
//!
//! Each guard is a plain predicate over the authenticated actor and, for the
//! job guards, the store. The `*_layer` functions adapt them to axum route
//! layers; when a guard denies, the request stops there and the handler is
//! never called.

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::{Error, Result};
use crate::models::job::Job;
use crate::models::user::{Permission, Role};
use crate::store::Store;
use crate::AppState;

/// Layer state for [`role_layer`].
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

/// Layer state for [`permission_layer`].
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission(pub Permission);

/// What a `job_not_closed` check resolves the job from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTarget {
    Job(Uuid),
    Candidate(Uuid),
}

const JOB_ID: &str = "job_id";
const CANDIDATE_ID: &str = "candidate_id";

fn actor(user: Option<&AuthUser>) -> Result<&AuthUser> {
    user.ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))
}

/// Admins pass every role check.
pub fn require_role(user: Option<&AuthUser>, allowed: &[Role]) -> Result<()> {
    let user = actor(user)?;
    if user.role.is_admin() || allowed.contains(&user.role) {
        return Ok(());
    }
    Err(Error::Forbidden("Insufficient role".to_string()))
}

pub fn require_permission(user: Option<&AuthUser>, permission: Permission) -> Result<()> {
    let user = actor(user)?;
    if user.role.has_permission(permission) {
        return Ok(());
    }
    Err(Error::Forbidden("Insufficient permissions".to_string()))
}

async fn load_job(store: &dyn Store, tenant_id: Uuid, job_id: Option<Uuid>) -> Result<Job> {
    let job_id = job_id.ok_or_else(|| Error::BadRequest("Job ID is required".to_string()))?;
    store
        .find_job(tenant_id, job_id)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".to_string()))
}

pub async fn job_ownership(store: &dyn Store, user: Option<&AuthUser>, job_id: Option<Uuid>) -> Result<()> {
    let user = actor(user)?;
    if user.role.has_permission(Permission::ManageAllJobs) {
        return Ok(());
    }
    let job = load_job(store, user.tenant_id, job_id).await?;
    if job.created_by != user.user_id {
        return Err(Error::Forbidden("Only the job owner can perform this action".to_string()));
    }
    Ok(())
}

pub async fn job_assignment(store: &dyn Store, user: Option<&AuthUser>, job_id: Option<Uuid>) -> Result<()> {
    let user = actor(user)?;
    let privileged = [
        Permission::ViewAllCandidates,
        Permission::ManageAllJobs,
        Permission::ViewAllJobs,
    ];
    if privileged.into_iter().any(|p| user.role.has_permission(p)) {
        return Ok(());
    }
    let job = load_job(store, user.tenant_id, job_id).await?;
    if job.created_by == user.user_id {
        return Ok(());
    }
    let assignees = store.job_assignees(user.tenant_id, job.id).await?;
    if assignees.iter().any(|a| a.id == user.user_id) {
        return Ok(());
    }
    Err(Error::Forbidden("You are not assigned to this job".to_string()))
}

pub async fn job_not_closed(store: &dyn Store, user: Option<&AuthUser>, target: Option<JobTarget>) -> Result<()> {
    let user = actor(user)?;
    let job_id = match target {
        Some(JobTarget::Job(id)) => id,
        Some(JobTarget::Candidate(id)) => {
            store
                .find_candidate(user.tenant_id, id)
                .await?
                .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?
                .job_id
        }
        None => return Err(Error::NotFound("Job not found".to_string())),
    };
    let job = load_job(store, user.tenant_id, Some(job_id)).await?;
    if job.is_closed() {
        return Err(Error::BadRequest("This job is closed".to_string()));
    }
    Ok(())
}

type PathParams = Option<Path<HashMap<String, String>>>;

fn path_id(params: &PathParams, key: &str) -> Result<Option<Uuid>> {
    let Some(Path(params)) = params else {
        return Ok(None);
    };
    match params.get(key) {
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| Error::BadRequest(format!("Invalid {}", key))),
        None => Ok(None),
    }
}

pub async fn role_layer(State(allowed): State<AllowedRoles>, req: Request, next: Next) -> Result<Response> {
    require_role(req.extensions().get::<AuthUser>(), allowed.0)?;
    Ok(next.run(req).await)
}

pub async fn permission_layer(
    State(required): State<RequiredPermission>,
    req: Request,
    next: Next,
) -> Result<Response> {
    require_permission(req.extensions().get::<AuthUser>(), required.0)?;
    Ok(next.run(req).await)
}

pub async fn job_ownership_layer(
    State(state): State<AppState>,
    params: PathParams,
    req: Request,
    next: Next,
) -> Result<Response> {
    let job_id = path_id(&params, JOB_ID)?;
    job_ownership(state.store.as_ref(), req.extensions().get::<AuthUser>(), job_id).await?;
    Ok(next.run(req).await)
}

pub async fn job_assignment_layer(
    State(state): State<AppState>,
    params: PathParams,
    req: Request,
    next: Next,
) -> Result<Response> {
    let job_id = path_id(&params, JOB_ID)?;
    job_assignment(state.store.as_ref(), req.extensions().get::<AuthUser>(), job_id).await?;
    Ok(next.run(req).await)
}

pub async fn job_not_closed_layer(
    State(state): State<AppState>,
    params: PathParams,
    req: Request,
    next: Next,
) -> Result<Response> {
    let target = match path_id(&params, JOB_ID)? {
        Some(id) => Some(JobTarget::Job(id)),
        None => path_id(&params, CANDIDATE_ID)?.map(JobTarget::Candidate),
    };
    job_not_closed(state.store.as_ref(), req.extensions().get::<AuthUser>(), target).await?;
    Ok(next.run(req).await)
}
