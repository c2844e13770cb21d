use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, Row, SqlitePool,
};

use super::{
    AssignmentData, ClassData, ClassEnrollment, Database, DatabaseError, DatabaseResult,
    EnrollmentData, IntoDatabaseError, NewAssignment, NewClass, NewUser, PrimaryKey, Result,
    StudentEnrollment, UserData,
};

/// The four tables making up the persisted contract.
/// Applied on connect, so a fresh database file works out of the box.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL UNIQUE,
        secret_hash TEXT NOT NULL,
        role TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS teacher_classes (
        teacher_id INTEGER NOT NULL REFERENCES users (id),
        class_id INTEGER NOT NULL REFERENCES classes (id),
        day TEXT NOT NULL,
        time_slot TEXT NOT NULL,
        max_seats INTEGER NOT NULL,
        PRIMARY KEY (teacher_id, class_id)
    )",
    "CREATE TABLE IF NOT EXISTS enrollments (
        student_id INTEGER NOT NULL REFERENCES users (id),
        class_id INTEGER NOT NULL REFERENCES classes (id),
        grade REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (student_id, class_id)
    )",
];

/// A SQLite database implementation for campus
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        let db = Self { pool };
        db.apply_schema().await?;

        Ok(db)
    }

    /// An isolated in-memory database, used by tests and local experiments.
    /// A single connection, because every pooled connection of an in-memory
    /// SQLite url would otherwise get its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| e.any())?;

        let db = Self { pool };
        db.apply_schema().await?;

        Ok(db)
    }

    async fn apply_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_external_id(&self, external_id: &str) -> Result<UserData> {
        sqlx::query_as("SELECT * FROM users WHERE external_id = ?1")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "external_id"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_external_id(&new_user.external_id)
            .await
            .conflict_or_ok("user", "external_id", &new_user.external_id)?;

        sqlx::query_as(
            "INSERT INTO users (external_id, secret_hash, role)
             VALUES (?1, ?2, ?3)
             RETURNING *",
        )
        .bind(new_user.external_id)
        .bind(new_user.secret_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_user_secret(&self, user_id: PrimaryKey, secret_hash: &str) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        sqlx::query("UPDATE users SET secret_hash = ?1 WHERE id = ?2")
            .bind(secret_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn class_by_id(&self, class_id: PrimaryKey) -> Result<ClassData> {
        sqlx::query_as("SELECT * FROM classes WHERE id = ?1")
            .bind(class_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("class", "id"))
    }

    async fn list_classes(&self) -> Result<Vec<ClassData>> {
        sqlx::query_as("SELECT * FROM classes ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_class(&self, new_class: NewClass) -> Result<ClassData> {
        sqlx::query_as(
            "INSERT INTO classes (name, description)
             VALUES (?1, ?2)
             RETURNING *",
        )
        .bind(new_class.name)
        .bind(new_class.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn assignment_by_pair(
        &self,
        teacher_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<AssignmentData> {
        sqlx::query_as("SELECT * FROM teacher_classes WHERE teacher_id = ?1 AND class_id = ?2")
            .bind(teacher_id)
            .bind(class_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("assignment", "teacher_id:class_id"))
    }

    async fn assignments_for_class(&self, class_id: PrimaryKey) -> Result<Vec<AssignmentData>> {
        sqlx::query_as(
            "SELECT * FROM teacher_classes WHERE class_id = ?1 ORDER BY teacher_id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn assignments_for_teacher(
        &self,
        teacher_id: PrimaryKey,
    ) -> Result<Vec<AssignmentData>> {
        sqlx::query_as(
            "SELECT * FROM teacher_classes WHERE teacher_id = ?1 ORDER BY class_id",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn upsert_assignment(&self, assignment: NewAssignment) -> Result<AssignmentData> {
        sqlx::query_as(
            "INSERT INTO teacher_classes (teacher_id, class_id, day, time_slot, max_seats)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (teacher_id, class_id) DO UPDATE SET
                day = excluded.day,
                time_slot = excluded.time_slot,
                max_seats = excluded.max_seats
             RETURNING *",
        )
        .bind(assignment.teacher_id)
        .bind(assignment.class_id)
        .bind(assignment.day)
        .bind(assignment.time_slot)
        .bind(assignment.max_seats)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn delete_assignment(&self, teacher_id: PrimaryKey, class_id: PrimaryKey) -> Result<()> {
        // Ensure assignment exists
        let _ = self.assignment_by_pair(teacher_id, class_id).await?;

        sqlx::query("DELETE FROM teacher_classes WHERE teacher_id = ?1 AND class_id = ?2")
            .bind(teacher_id)
            .bind(class_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn enrollment_by_pair(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<EnrollmentData> {
        sqlx::query_as("SELECT * FROM enrollments WHERE student_id = ?1 AND class_id = ?2")
            .bind(student_id)
            .bind(class_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("enrollment", "student_id:class_id"))
    }

    async fn insert_enrollment_within_capacity(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
        capacity: i64,
    ) -> Result<bool> {
        // The seat count check and the insert are one statement, so two
        // concurrent enrollments cannot both observe a free seat and
        // jointly overshoot the capacity.
        let result = sqlx::query(
            "INSERT INTO enrollments (student_id, class_id, grade)
             SELECT ?1, ?2, 0
             WHERE (SELECT COUNT(*) FROM enrollments WHERE class_id = ?2) < ?3
               AND NOT EXISTS (
                   SELECT 1 FROM enrollments WHERE student_id = ?1 AND class_id = ?2
               )",
        )
        .bind(student_id)
        .bind(class_id)
        .bind(capacity)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_enrollment(&self, student_id: PrimaryKey, class_id: PrimaryKey) -> Result<()> {
        // Deleting a missing enrollment is a no-op on purpose
        sqlx::query("DELETE FROM enrollments WHERE student_id = ?1 AND class_id = ?2")
            .bind(student_id)
            .bind(class_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn set_enrollment_grade(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
        grade: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE enrollments SET grade = ?1 WHERE student_id = ?2 AND class_id = ?3",
        )
        .bind(grade)
        .bind(student_id)
        .bind(class_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "enrollment",
                identifier: "student_id:class_id",
            });
        }

        Ok(())
    }

    async fn count_enrollments(&self, class_id: PrimaryKey) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE class_id = ?1")
            .bind(class_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn enrollments_for_class(&self, class_id: PrimaryKey) -> Result<Vec<ClassEnrollment>> {
        let rows = sqlx::query(
            "SELECT
                enrollments.student_id,
                enrollments.class_id,
                enrollments.grade,
                users.id,
                users.external_id,
                users.secret_hash,
                users.role
            FROM enrollments
                INNER JOIN users ON enrollments.student_id = users.id
            WHERE class_id = ?1
            ORDER BY users.external_id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let enrollments = rows
            .into_iter()
            .map(|r| ClassEnrollment {
                enrollment: EnrollmentData {
                    student_id: r.get("student_id"),
                    class_id: r.get("class_id"),
                    grade: r.get("grade"),
                },
                student: UserData {
                    id: r.get("id"),
                    external_id: r.get("external_id"),
                    secret_hash: r.get("secret_hash"),
                    role: r.get("role"),
                },
            })
            .collect();

        Ok(enrollments)
    }

    async fn enrollments_for_student(
        &self,
        student_id: PrimaryKey,
    ) -> Result<Vec<StudentEnrollment>> {
        let rows = sqlx::query(
            "SELECT
                enrollments.student_id,
                enrollments.class_id,
                enrollments.grade,
                classes.id,
                classes.name,
                classes.description
            FROM enrollments
                INNER JOIN classes ON enrollments.class_id = classes.id
            WHERE student_id = ?1
            ORDER BY classes.id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let enrollments = rows
            .into_iter()
            .map(|r| StudentEnrollment {
                enrollment: EnrollmentData {
                    student_id: r.get("student_id"),
                    class_id: r.get("class_id"),
                    grade: r.get("grade"),
                },
                class: ClassData {
                    id: r.get("id"),
                    name: r.get("name"),
                    description: r.get("description"),
                },
            })
            .collect();

        Ok(enrollments)
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
