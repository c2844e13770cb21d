use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{GradeSchema, ValidatedJson},
    serialized::{Course, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/enrollments",
    tag = "enrollments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Course>, description = "Classes the calling student is enrolled in")
    )
)]
pub(crate) async fn own_courses(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Course>>> {
    let courses = context
        .registry
        .roster
        .enrollments_for_student(session.identity().user_id)
        .await?;

    Ok(Json(courses.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/enrollments/{class_id}",
    tag = "enrollments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Student is enrolled. Enrolling twice is a no-op."),
        (status = 404, description = "Class does not exist"),
        (status = 409, description = "Every seat of the class is taken")
    )
)]
pub(crate) async fn enroll(
    session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
) -> ServerResult<()> {
    context
        .registry
        .roster
        .enroll(session.identity().user_id, class_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/v1/enrollments/{class_id}",
    tag = "enrollments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Enrollment was removed, or never existed")
    )
)]
pub(crate) async fn unenroll(
    session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
) -> ServerResult<()> {
    context
        .registry
        .roster
        .unenroll(session.identity().user_id, class_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/enrollments/{class_id}/grade",
    tag = "enrollments",
    request_body = GradeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Grade was recorded"),
        (status = 403, description = "Caller does not teach this class"),
        (status = 404, description = "No such enrollment"),
        (status = 422, description = "Grade is not a number in range")
    )
)]
pub(crate) async fn set_grade(
    session: Session,
    State(context): State<ServerContext>,
    Path(class_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<GradeSchema>,
) -> ServerResult<()> {
    // The original stored the raw form value. Parse it up front so a
    // malformed grade never reaches the store.
    let grade: f64 = body
        .grade
        .trim()
        .parse()
        .map_err(|_| ServerError::Validation(format!("Grade {:?} is not a number", body.grade)))?;

    context
        .registry
        .roster
        .set_grade(session.identity(), body.student_id, class_id, grade)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(own_courses))
        .route("/:class_id", post(enroll))
        .route("/:class_id", delete(unenroll))
        .route("/:class_id/grade", put(set_grade))
}
