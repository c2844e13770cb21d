use sqlx::FromRow;

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated user, as passed around by the presentation layer.
/// Services take this explicitly and never read ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: PrimaryKey,
    pub role: Role,
}

/// A campus account
#[derive(Debug, Clone, FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    /// The university-issued identifier the user logs in with
    pub external_id: String,
    /// Argon2 PHC string, never the plain secret
    pub secret_hash: String,
    pub role: Role,
}

/// A class in the catalog
#[derive(Debug, Clone, FromRow)]
pub struct ClassData {
    pub id: PrimaryKey,
    pub name: String,
    pub description: Option<String>,
}

/// A teaching assignment.
/// Note: `teacher_id` and `class_id` are unique together.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentData {
    pub teacher_id: PrimaryKey,
    pub class_id: PrimaryKey,
    /// Day of the week the class is held on
    pub day: String,
    /// Display label for the slot, such as "10:00-11:30"
    pub time_slot: String,
    pub max_seats: i64,
}

/// A student's enrollment in a class.
/// Note: `student_id` and `class_id` are unique together.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentData {
    pub student_id: PrimaryKey,
    pub class_id: PrimaryKey,
    /// Zero means the enrollment has not been graded yet
    pub grade: f64,
}

/// An enrollment joined with the student it belongs to, for class rosters
#[derive(Debug, Clone)]
pub struct ClassEnrollment {
    pub enrollment: EnrollmentData,
    pub student: UserData,
}

/// An enrollment joined with its class, for a student's course list
#[derive(Debug, Clone)]
pub struct StudentEnrollment {
    pub enrollment: EnrollmentData,
    pub class: ClassData,
}

#[derive(Debug)]
pub struct NewUser {
    pub external_id: String,
    pub secret_hash: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct NewClass {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct NewAssignment {
    pub teacher_id: PrimaryKey,
    pub class_id: PrimaryKey,
    pub day: String,
    pub time_slot: String,
    pub max_seats: i64,
}
