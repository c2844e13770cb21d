//! All schemas that are exposed from endpoints are defined here
//! along with the conversions from registry data

use campus_registry::{
    AssignmentData, ClassData, ClassEnrollment, RosterSummary, StudentEnrollment, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::SessionData;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i64,
    external_id: String,
    role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryBegun {
    /// Opaque reset token. A real deployment hands this to the user out
    /// of band, never the stored secret.
    token: String,
}

impl RecoveryBegun {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Class {
    id: i64,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Assignment {
    teacher_id: i64,
    class_id: i64,
    day: String,
    time_slot: String,
    max_seats: i64,
}

/// A row of a class roster: the student and the grade they hold
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterEntry {
    student: User,
    grade: f64,
}

/// A row of a student's course list
#[derive(Debug, Serialize, ToSchema)]
pub struct Course {
    class: Class,
    grade: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassSummary {
    class: Class,
    /// "TBA" in the original pages when absent
    lead_teacher: Option<String>,
    /// "TBD" in the original pages when absent
    time_slot: Option<String>,
    enrolled: i64,
    capacity: i64,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            external_id: self.external_id.clone(),
            role: self.role.as_str().to_string(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Class> for ClassData {
    fn to_serialized(&self) -> Class {
        Class {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl ToSerialized<Assignment> for AssignmentData {
    fn to_serialized(&self) -> Assignment {
        Assignment {
            teacher_id: self.teacher_id,
            class_id: self.class_id,
            day: self.day.clone(),
            time_slot: self.time_slot.clone(),
            max_seats: self.max_seats,
        }
    }
}

impl ToSerialized<RosterEntry> for ClassEnrollment {
    fn to_serialized(&self) -> RosterEntry {
        RosterEntry {
            student: self.student.to_serialized(),
            grade: self.enrollment.grade,
        }
    }
}

impl ToSerialized<Course> for StudentEnrollment {
    fn to_serialized(&self) -> Course {
        Course {
            class: self.class.to_serialized(),
            grade: self.enrollment.grade,
        }
    }
}

impl ToSerialized<ClassSummary> for RosterSummary {
    fn to_serialized(&self) -> ClassSummary {
        ClassSummary {
            class: self.class.to_serialized(),
            lead_teacher: self.lead_teacher.clone(),
            time_slot: self.time_slot.clone(),
            enrolled: self.enrolled,
            capacity: self.capacity,
        }
    }
}
