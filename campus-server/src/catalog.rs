use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};
use campus_registry::{NewAssignment, Role};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{AssignTeacherSchema, NewClassSchema, ValidatedJson},
    serialized::{Assignment, Class, ClassSummary, RosterEntry, ToSerialized},
    Router,
};

/// Catalog mutations belong to the admin pages
fn require_admin(session: &Session) -> ServerResult<()> {
    if session.identity().role != Role::Admin {
        return Err(ServerError::Forbidden(
            "Only admins manage the catalog".to_string(),
        ));
    }

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/classes",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Class>)
    )
)]
pub(crate) async fn list_classes(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Class>>> {
    let classes = context.registry.catalog.list_classes().await?;

    Ok(Json(classes.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/classes",
    tag = "catalog",
    request_body = NewClassSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Class),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub(crate) async fn create_class(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewClassSchema>,
) -> ServerResult<Json<Class>> {
    require_admin(&session)?;

    let class = context
        .registry
        .catalog
        .create_class(&body.name, body.description)
        .await?;

    Ok(Json(class.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/classes/{id}/summary",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ClassSummary)
    )
)]
pub(crate) async fn class_summary(
    _session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
) -> ServerResult<Json<ClassSummary>> {
    let summary = context.registry.roster.class_summary(class_id).await?;

    Ok(Json(summary.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/classes/{id}/roster",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<RosterEntry>),
        (status = 403, description = "Caller does not teach this class")
    )
)]
pub(crate) async fn class_roster(
    session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
) -> ServerResult<Json<Vec<RosterEntry>>> {
    let identity = session.identity();

    let allowed = match identity.role {
        Role::Admin => true,
        Role::Teacher => context
            .registry
            .catalog
            .assignments_for_teacher(identity.user_id)
            .await?
            .iter()
            .any(|a| a.class_id == class_id),
        Role::Student => false,
    };

    if !allowed {
        return Err(ServerError::Forbidden(
            "Only the assigned teacher sees the roster".to_string(),
        ));
    }

    let roster = context
        .registry
        .roster
        .enrollments_for_class(class_id)
        .await?;

    Ok(Json(roster.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/classes/assignments",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Assignment>, description = "Classes the calling teacher teaches")
    )
)]
pub(crate) async fn own_assignments(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Assignment>>> {
    let assignments = context
        .registry
        .catalog
        .assignments_for_teacher(session.identity().user_id)
        .await?;

    Ok(Json(assignments.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/classes/{id}/assignments",
    tag = "catalog",
    request_body = AssignTeacherSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Assignment),
        (status = 403, description = "Caller is not an admin, or the user is not a teacher"),
        (status = 404, description = "Teacher or class does not exist")
    )
)]
pub(crate) async fn assign_teacher(
    session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<AssignTeacherSchema>,
) -> ServerResult<Json<Assignment>> {
    require_admin(&session)?;

    let assignment = context
        .registry
        .catalog
        .assign_teacher(NewAssignment {
            teacher_id: body.teacher_id,
            class_id,
            day: body.day,
            time_slot: body.time_slot,
            max_seats: body.max_seats,
        })
        .await?;

    Ok(Json(assignment.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/classes/{id}/assignments/{teacher_id}",
    tag = "catalog",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Assignment was removed"),
        (status = 404, description = "No such assignment")
    )
)]
pub(crate) async fn withdraw_teacher(
    session: Session,
    State(context): State<ServerContext>,
    Path((class_id, teacher_id)): Path<(i64, i64)>,
) -> ServerResult<()> {
    require_admin(&session)?;

    context
        .registry
        .catalog
        .withdraw_teacher(teacher_id, class_id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_classes))
        .route("/", post(create_class))
        .route("/assignments", get(own_assignments))
        .route("/:id/summary", get(class_summary))
        .route("/:id/roster", get(class_roster))
        .route("/:id/assignments", put(assign_teacher))
        .route("/:id/assignments/:teacher_id", delete(withdraw_teacher))
}
