use std::sync::Arc;

use thiserror::Error;

use crate::{
    AssignmentData, ClassData, Database, DatabaseError, NewAssignment, NewClass, PrimaryKey, Role,
};

/// Seats a class offers when no teaching assignment sets a capacity.
/// Earlier revisions of the school used 10, this is the value it settled on.
pub const DEFAULT_CAPACITY: i64 = 30;

/// The curated catalog of classes and teaching assignments
pub struct Catalog<Db> {
    db: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The user a teaching assignment points at is not a teacher
    #[error("User {user_id} is a {role}, only teachers can be assigned to classes")]
    NotATeacher { user_id: PrimaryKey, role: Role },
    #[error("A class must have at least one seat")]
    InvalidCapacity,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl<Db> Catalog<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    pub async fn list_classes(&self) -> Result<Vec<ClassData>, DatabaseError> {
        self.db.list_classes().await
    }

    pub async fn class_by_id(&self, class_id: PrimaryKey) -> Result<ClassData, DatabaseError> {
        self.db.class_by_id(class_id).await
    }

    /// Creates a class. Duplicate names are tolerated on purpose, two
    /// sections of "Calculus" are two separate classes.
    pub async fn create_class(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<ClassData, CatalogError> {
        if name.trim().is_empty() {
            return Err(CatalogError::MissingField("class name"));
        }

        let class = self
            .db
            .create_class(NewClass {
                name: name.to_string(),
                description,
            })
            .await?;

        Ok(class)
    }

    /// Creates or updates the teaching assignment for a (teacher, class)
    /// pair, fixing its day, time slot, and seat capacity
    pub async fn assign_teacher(&self, assignment: NewAssignment) -> Result<AssignmentData, CatalogError> {
        if assignment.max_seats < 1 {
            return Err(CatalogError::InvalidCapacity);
        }

        let teacher = self.db.user_by_id(assignment.teacher_id).await?;

        if teacher.role != Role::Teacher {
            return Err(CatalogError::NotATeacher {
                user_id: teacher.id,
                role: teacher.role,
            });
        }

        // Ensure class exists
        let _ = self.db.class_by_id(assignment.class_id).await?;

        let assignment = self.db.upsert_assignment(assignment).await?;

        Ok(assignment)
    }

    /// Removes a teaching assignment
    pub async fn withdraw_teacher(
        &self,
        teacher_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.db.delete_assignment(teacher_id, class_id).await
    }

    pub async fn assignments_for_teacher(
        &self,
        teacher_id: PrimaryKey,
    ) -> Result<Vec<AssignmentData>, DatabaseError> {
        self.db.assignments_for_teacher(teacher_id).await
    }

    pub async fn assignments_for_class(
        &self,
        class_id: PrimaryKey,
    ) -> Result<Vec<AssignmentData>, DatabaseError> {
        self.db.assignments_for_class(class_id).await
    }

    /// The lead teaching assignment of a class, if any.
    /// The schema allows several assignments per class, so the one with
    /// the lowest teacher id wins to keep capacity and display stable.
    pub async fn lead_assignment(
        &self,
        class_id: PrimaryKey,
    ) -> Result<Option<AssignmentData>, DatabaseError> {
        lead_assignment(self.db.as_ref(), class_id).await
    }

    /// How many students a class may hold, derived from its lead
    /// assignment, or [DEFAULT_CAPACITY] when the class has none
    pub async fn effective_capacity(&self, class_id: PrimaryKey) -> Result<i64, DatabaseError> {
        effective_capacity(self.db.as_ref(), class_id).await
    }
}

pub(crate) async fn lead_assignment<Db>(
    db: &Db,
    class_id: PrimaryKey,
) -> Result<Option<AssignmentData>, DatabaseError>
where
    Db: Database,
{
    let assignments = db.assignments_for_class(class_id).await?;

    Ok(assignments.into_iter().next())
}

pub(crate) async fn effective_capacity<Db>(
    db: &Db,
    class_id: PrimaryKey,
) -> Result<i64, DatabaseError>
where
    Db: Database,
{
    let capacity = lead_assignment(db, class_id)
        .await?
        .map(|a| a.max_seats)
        .unwrap_or(DEFAULT_CAPACITY);

    Ok(capacity)
}
