pub mod candidate_routes;
pub mod comment;
pub mod feedback;
pub mod feedback_template;
pub mod health;
pub mod job;
pub mod notification;
pub mod pipeline_status;
pub mod tenant;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::docs;
use crate::middleware::{
    auth::require_bearer_auth,
    guards::{self, AllowedRoles, RequiredPermission},
    rate_limit::{new_rps_state, rps_middleware},
    tenant::require_tenant,
};
use crate::models::user::{Permission, Role};
use crate::AppState;

/// The full HTTP surface. Everything under `/api` except the tenant check and
/// the OpenAPI document requires a tenant header and a bearer token.
///
/// Route layers run last-added first, so each guard chain below is written in
/// reverse of the order it executes in.
pub fn api_router(state: AppState, rps: u32) -> Router {
    let jobs = Router::new()
        .route(
            "/jobs",
            get(job::list_jobs).merge(post(job::create_job).route_layer(from_fn_with_state(
                AllowedRoles(&[Role::Hr, Role::HiringManager]),
                guards::role_layer,
            ))),
        )
        .route(
            "/jobs/:job_id",
            get(job::get_job).route_layer(from_fn_with_state(state.clone(), guards::job_assignment_layer)),
        )
        .route(
            "/jobs/:job_id/close",
            post(job::close_job).route_layer(from_fn_with_state(state.clone(), guards::job_ownership_layer)),
        )
        .route(
            "/jobs/:job_id/assign",
            post(job::assign_users).route_layer(from_fn_with_state(state.clone(), guards::job_ownership_layer)),
        )
        .route(
            "/jobs/:job_id/feedback-templates",
            get(job::job_feedback_templates)
                .route_layer(from_fn_with_state(state.clone(), guards::job_assignment_layer)),
        )
        .route(
            "/jobs/:job_id/candidates",
            get(candidate_routes::list_job_candidates)
                .route_layer(from_fn_with_state(state.clone(), guards::job_assignment_layer))
                .merge(
                    post(candidate_routes::create_candidate)
                        .route_layer(from_fn_with_state(state.clone(), guards::job_not_closed_layer))
                        .route_layer(from_fn_with_state(state.clone(), guards::job_assignment_layer))
                        .route_layer(from_fn_with_state(
                            AllowedRoles(&[Role::Recruiter, Role::Hr, Role::HiringManager]),
                            guards::role_layer,
                        )),
                ),
        );

    let candidates = Router::new()
        .route("/candidates", get(candidate_routes::list_candidates))
        .route(
            "/candidates/bulk-action",
            post(candidate_routes::bulk_action).route_layer(from_fn_with_state(
                RequiredPermission(Permission::ManageCandidateStatus),
                guards::permission_layer,
            )),
        )
        .route(
            "/candidates/:candidate_id",
            get(candidate_routes::get_candidate).merge(
                delete(candidate_routes::delete_candidate)
                    .route_layer(from_fn_with_state(AllowedRoles(&[Role::Hr]), guards::role_layer)),
            ),
        )
        .route(
            "/candidates/:candidate_id/status",
            patch(candidate_routes::update_candidate_status)
                .route_layer(from_fn_with_state(state.clone(), guards::job_not_closed_layer)),
        )
        .route(
            "/candidates/:candidate_id/reject",
            post(candidate_routes::reject_candidate)
                .route_layer(from_fn_with_state(state.clone(), guards::job_not_closed_layer)),
        )
        .route("/candidates/:candidate_id/notes", patch(candidate_routes::update_notes))
        .route(
            "/candidates/:candidate_id/cv",
            get(candidate_routes::get_candidate_cv).merge(
                patch(candidate_routes::update_candidate_cv).route_layer(from_fn_with_state(
                    AllowedRoles(&[Role::Recruiter, Role::Hr]),
                    guards::role_layer,
                )),
            ),
        )
        .route(
            "/candidates/:candidate_id/pipeline-history",
            get(candidate_routes::get_pipeline_history),
        )
        .route(
            "/candidates/:candidate_id/comments",
            get(comment::list_comments).post(comment::create_comment),
        )
        .route(
            "/comments/:comment_id/attachment",
            get(comment::get_attachment).delete(comment::delete_attachment),
        )
        .route(
            "/candidates/:candidate_id/feedback",
            get(feedback::list_candidate_feedback),
        )
        .route(
            "/candidates/:candidate_id/feedback/attach",
            post(feedback::attach_template).route_layer(from_fn_with_state(
                RequiredPermission(Permission::AttachFeedback),
                guards::permission_layer,
            )),
        )
        .route(
            "/candidates/:candidate_id/feedback/auto-attach",
            post(feedback::auto_attach).route_layer(from_fn_with_state(
                RequiredPermission(Permission::AttachFeedback),
                guards::permission_layer,
            )),
        );

    let feedback = Router::new()
        .route("/feedback/stats", get(feedback::feedback_stats))
        .route(
            "/feedback/:feedback_id",
            get(feedback::get_feedback).merge(delete(feedback::remove_feedback).route_layer(
                from_fn_with_state(RequiredPermission(Permission::RemoveFeedback), guards::permission_layer),
            )),
        )
        .route("/feedback/:feedback_id/responses", post(feedback::save_response))
        .route("/feedback/:feedback_id/complete", patch(feedback::complete_feedback))
        .route(
            "/feedback-templates",
            get(feedback_template::list_templates)
                .route_layer(from_fn_with_state(
                    RequiredPermission(Permission::ViewFeedbackTemplates),
                    guards::permission_layer,
                ))
                .merge(post(feedback_template::create_template).route_layer(from_fn_with_state(
                    RequiredPermission(Permission::ManageFeedbackTemplates),
                    guards::permission_layer,
                ))),
        )
        .route(
            "/feedback-templates/:template_id",
            get(feedback_template::get_template)
                .route_layer(from_fn_with_state(
                    RequiredPermission(Permission::ViewFeedbackTemplates),
                    guards::permission_layer,
                ))
                .merge(
                    put(feedback_template::update_template)
                        .delete(feedback_template::delete_template)
                        .route_layer(from_fn_with_state(
                            RequiredPermission(Permission::ManageFeedbackTemplates),
                            guards::permission_layer,
                        )),
                ),
        );

    let settings = Router::new()
        .route(
            "/pipeline-statuses",
            get(pipeline_status::list_statuses).merge(post(pipeline_status::create_status).route_layer(
                from_fn_with_state(RequiredPermission(Permission::ManagePipelineStatus), guards::permission_layer),
            )),
        )
        .route(
            "/pipeline-statuses/order",
            put(pipeline_status::reorder_statuses).route_layer(from_fn_with_state(
                RequiredPermission(Permission::ManagePipelineStatus),
                guards::permission_layer,
            )),
        )
        .route(
            "/pipeline-statuses/:status_id",
            patch(pipeline_status::update_status)
                .delete(pipeline_status::delete_status)
                .route_layer(from_fn_with_state(
                    RequiredPermission(Permission::ManagePipelineStatus),
                    guards::permission_layer,
                )),
        )
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/read", patch(notification::mark_read));

    let admin = Router::new()
        .route("/admin/tenants/:name/status", patch(tenant::set_tenant_status))
        .route(
            "/admin/tenant-cache",
            get(tenant::cache_stats).delete(tenant::clear_cache),
        )
        .route_layer(from_fn_with_state(
            RequiredPermission(Permission::ManageTenants),
            guards::permission_layer,
        ));

    let protected = jobs
        .merge(candidates)
        .merge(feedback)
        .merge(settings)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), require_bearer_auth))
        .layer(from_fn_with_state(state.clone(), require_tenant));

    let public = Router::new()
        .route("/tenants/:name/check", get(tenant::check_tenant))
        .route("/openapi.json", get(docs::openapi_json));

    let api = public
        .merge(protected)
        .layer(from_fn_with_state(new_rps_state(rps), rps_middleware));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .with_state(state)
}
