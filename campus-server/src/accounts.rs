use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use campus_registry::Role;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        BeginRecoverySchema, LoginSchema, RegisterSchema, ResetSecretSchema, ValidatedJson,
    },
    serialized::{LoginResult, RecoveryBegun, ToSerialized, User},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/accounts/register",
    tag = "accounts",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User),
        (status = 409, description = "The external id is already taken")
    )
)]
pub(crate) async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .registry
        .directory
        .register(&body.external_id, &body.secret, body.role.into())
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/login",
    tag = "accounts",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 400, description = "The secret does not match"),
        (status = 403, description = "The account has a different role"),
        (status = 404, description = "No account with that external id")
    )
)]
pub(crate) async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let directory = &context.registry.directory;

    let identity = match body.role {
        Some(role) => {
            directory
                .authenticate_as(&body.external_id, &body.secret, role.into())
                .await?
        }
        None => directory.authenticate(&body.external_id, &body.secret).await?,
    };

    let user = directory.user_by_id(identity.user_id).await?;
    let session = context.sessions.create(user);

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/logout",
    tag = "accounts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was removed")
    )
)]
pub(crate) async fn logout(State(context): State<ServerContext>, session: Session) -> impl IntoResponse {
    context.sessions.remove(session.token());
}

#[utoipa::path(
    get,
    path = "/v1/accounts/session",
    tag = "accounts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
pub(crate) async fn current_user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

#[utoipa::path(
    post,
    path = "/v1/accounts/recovery",
    tag = "accounts",
    request_body = BeginRecoverySchema,
    responses(
        (status = 200, body = RecoveryBegun),
        (status = 404, description = "No account matches the external id and role")
    )
)]
pub(crate) async fn begin_recovery(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<BeginRecoverySchema>,
) -> ServerResult<Json<RecoveryBegun>> {
    let role: Role = body.role.into();

    let token = context
        .registry
        .directory
        .begin_recovery(&body.external_id, role)
        .await?;

    Ok(Json(RecoveryBegun::new(token)))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/recovery/reset",
    tag = "accounts",
    request_body = ResetSecretSchema,
    responses(
        (status = 200, description = "The secret was replaced"),
        (status = 422, description = "The token is invalid or expired")
    )
)]
pub(crate) async fn reset_secret(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<ResetSecretSchema>,
) -> ServerResult<()> {
    context
        .registry
        .directory
        .reset_secret(&body.token, &body.secret)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(current_user))
        .route("/recovery", post(begin_recovery))
        .route("/recovery/reset", post(reset_secret))
}
