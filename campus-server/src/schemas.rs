use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use campus_registry::Role;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

/// The role names the original registration pages used
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleSchema {
    Student,
    Teacher,
    Admin,
}

impl From<RoleSchema> for Role {
    fn from(value: RoleSchema) -> Self {
        match value {
            RoleSchema::Student => Role::Student,
            RoleSchema::Teacher => Role::Teacher,
            RoleSchema::Admin => Role::Admin,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 1, max = 80))]
    pub external_id: String,
    #[validate(length(min = 1, max = 64))]
    pub secret: String,
    pub role: RoleSchema,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 80))]
    pub external_id: String,
    #[validate(length(max = 64))]
    pub secret: String,
    /// Set by the role-specific login pages, absent for the plain one
    pub role: Option<RoleSchema>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BeginRecoverySchema {
    #[validate(length(min = 1, max = 80))]
    pub external_id: String,
    pub role: RoleSchema,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetSecretSchema {
    #[validate(length(min = 1, max = 64))]
    pub token: String,
    #[validate(length(min = 1, max = 64))]
    pub secret: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewClassSchema {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignTeacherSchema {
    pub teacher_id: i64,
    #[validate(length(min = 1, max = 16))]
    pub day: String,
    #[validate(length(min = 1, max = 32))]
    pub time_slot: String,
    #[validate(range(min = 1))]
    pub max_seats: i64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GradeSchema {
    pub student_id: i64,
    /// Arrives as the raw form value, parsed and range-checked before
    /// anything is stored
    #[validate(length(min = 1, max = 16))]
    pub grade: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::UNPROCESSABLE_ENTITY, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
