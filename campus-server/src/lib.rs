use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
};

use axum::{routing::get, Extension, Json};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

mod accounts;
mod auth;
mod catalog;
mod enrollments;
mod errors;
mod schemas;
mod serialized;

pub mod context;
pub mod logging;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9105;

pub type Router = axum::Router<ServerContext>;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "campus API",
        description = "Exposes endpoints to interact with a campus server"
    ),
    paths(
        accounts::register,
        accounts::login,
        accounts::logout,
        accounts::current_user,
        accounts::begin_recovery,
        accounts::reset_secret,
        catalog::list_classes,
        catalog::create_class,
        catalog::class_summary,
        catalog::class_roster,
        catalog::own_assignments,
        catalog::assign_teacher,
        catalog::withdraw_teacher,
        enrollments::own_courses,
        enrollments::enroll,
        enrollments::unenroll,
        enrollments::set_grade,
    ),
    components(schemas(
        schemas::RoleSchema,
        schemas::RegisterSchema,
        schemas::LoginSchema,
        schemas::BeginRecoverySchema,
        schemas::ResetSecretSchema,
        schemas::NewClassSchema,
        schemas::AssignTeacherSchema,
        schemas::GradeSchema,
        serialized::User,
        serialized::LoginResult,
        serialized::RecoveryBegun,
        serialized::Class,
        serialized::Assignment,
        serialized::RosterEntry,
        serialized::Course,
        serialized::ClassSummary,
    ))
)]
struct ApiDoc;

/// Starts the campus server
pub async fn run_server(context: ServerContext) {
    let port = env::var("CAMPUS_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/accounts", accounts::router())
        .nest("/classes", catalog::router())
        .nest("/enrollments", enrollments::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(serve_api))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(
        listener,
        root_router
            .layer(Extension(ApiDoc::openapi()))
            .into_make_service(),
    )
    .await
    .expect("server runs");
}

async fn serve_api(Extension(api): Extension<utoipa::openapi::OpenApi>) -> Json<utoipa::openapi::OpenApi> {
    Json(api)
}
