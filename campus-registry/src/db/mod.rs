use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch and mutate campus data in a database.
///
/// Every operation re-reads current state and commits before returning.
/// Nothing is cached between calls.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_external_id(&self, external_id: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user_secret(&self, user_id: PrimaryKey, secret_hash: &str) -> Result<()>;

    async fn class_by_id(&self, class_id: PrimaryKey) -> Result<ClassData>;
    async fn list_classes(&self) -> Result<Vec<ClassData>>;
    async fn create_class(&self, new_class: NewClass) -> Result<ClassData>;

    async fn assignment_by_pair(
        &self,
        teacher_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<AssignmentData>;
    /// Assignments of a class, ordered by teacher id so callers can pick
    /// the lead assignment deterministically
    async fn assignments_for_class(&self, class_id: PrimaryKey) -> Result<Vec<AssignmentData>>;
    async fn assignments_for_teacher(&self, teacher_id: PrimaryKey)
        -> Result<Vec<AssignmentData>>;
    async fn upsert_assignment(&self, assignment: NewAssignment) -> Result<AssignmentData>;
    async fn delete_assignment(&self, teacher_id: PrimaryKey, class_id: PrimaryKey) -> Result<()>;

    async fn enrollment_by_pair(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<EnrollmentData>;
    /// Inserts an enrollment only while the class holds fewer rows than
    /// `capacity` and the pair does not exist yet, as a single atomic
    /// statement. Returns whether a row was inserted.
    async fn insert_enrollment_within_capacity(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
        capacity: i64,
    ) -> Result<bool>;
    async fn delete_enrollment(&self, student_id: PrimaryKey, class_id: PrimaryKey) -> Result<()>;
    async fn set_enrollment_grade(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
        grade: f64,
    ) -> Result<()>;
    async fn count_enrollments(&self, class_id: PrimaryKey) -> Result<i64>;
    async fn enrollments_for_class(&self, class_id: PrimaryKey) -> Result<Vec<ClassEnrollment>>;
    async fn enrollments_for_student(
        &self,
        student_id: PrimaryKey,
    ) -> Result<Vec<StudentEnrollment>>;
}
