use std::sync::Arc;

use thiserror::Error;

use crate::{
    catalog::{effective_capacity, lead_assignment},
    ClassData, ClassEnrollment, Database, DatabaseError, Identity, PrimaryKey, Role,
    StudentEnrollment,
};

/// The grade range the school records. Zero doubles as "not graded yet",
/// matching how the store initializes the column.
pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 100.0;

/// Enrollment of students into classes, and the grades they earn there.
///
/// This is the one place that carries a real invariant: a class never
/// holds more enrollments than its effective capacity, and a student
/// holds at most one enrollment per class.
pub struct Roster<Db> {
    db: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum RosterError {
    /// Every seat of the class is taken
    #[error("Class {class_id} is full, all {capacity} seats are taken")]
    CapacityExceeded {
        class_id: PrimaryKey,
        capacity: i64,
    },
    /// The grade is not a number the school records
    #[error("Grade {grade} is not a number between {GRADE_MIN} and {GRADE_MAX}")]
    InvalidGrade { grade: f64 },
    /// The caller is not allowed to perform this action
    #[error("Only a teacher assigned to the class may do this")]
    Forbidden,
    /// Enrollment is reserved for student accounts
    #[error("User {user_id} is a {role}, only students enroll in classes")]
    NotAStudent { user_id: PrimaryKey, role: Role },
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The course table the school renders for a class: who leads it, when it
/// runs, and how full it is
#[derive(Debug, Clone)]
pub struct RosterSummary {
    pub class: ClassData,
    /// External id of the lead teacher, or None when it is still "TBA"
    pub lead_teacher: Option<String>,
    /// Time slot of the lead assignment, or None when it is still "TBD"
    pub time_slot: Option<String>,
    pub enrolled: i64,
    pub capacity: i64,
}

impl<Db> Roster<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// Enrolls a student into a class, as long as a seat is free.
    ///
    /// Enrolling twice is a no-op success. The capacity check and the
    /// insert run as one atomic statement against the store, so two
    /// concurrent calls against the last free seat cannot both win.
    pub async fn enroll(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<(), RosterError> {
        let student = self.db.user_by_id(student_id).await?;

        if student.role != Role::Student {
            return Err(RosterError::NotAStudent {
                user_id: student.id,
                role: student.role,
            });
        }

        // Ensure class exists
        let _ = self.db.class_by_id(class_id).await?;

        if self.is_enrolled(student_id, class_id).await? {
            return Ok(());
        }

        let capacity = effective_capacity(self.db.as_ref(), class_id).await?;

        let inserted = self
            .db
            .insert_enrollment_within_capacity(student_id, class_id, capacity)
            .await?;

        if inserted {
            return Ok(());
        }

        // The insert can lose to a concurrent duplicate enroll of the same
        // student, which still counts as the idempotent no-op success.
        if self.is_enrolled(student_id, class_id).await? {
            return Ok(());
        }

        Err(RosterError::CapacityExceeded { class_id, capacity })
    }

    /// Removes a student's enrollment. Removing a missing enrollment is
    /// a no-op, never an error.
    pub async fn unenroll(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.db.delete_enrollment(student_id, class_id).await
    }

    /// Records a grade on an existing enrollment.
    ///
    /// The presentation layer already gates this behind the teacher pages,
    /// the caller identity check here is defense in depth. Concurrent
    /// writes to the same grade are last-writer-wins.
    pub async fn set_grade(
        &self,
        caller: Identity,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
        grade: f64,
    ) -> Result<(), RosterError> {
        if !grade.is_finite() || !(GRADE_MIN..=GRADE_MAX).contains(&grade) {
            return Err(RosterError::InvalidGrade { grade });
        }

        self.authorize_grading(caller, class_id).await?;

        // Ensure enrollment exists
        let _ = self.db.enrollment_by_pair(student_id, class_id).await?;

        self.db
            .set_enrollment_grade(student_id, class_id, grade)
            .await?;

        Ok(())
    }

    pub async fn enrollments_for_class(
        &self,
        class_id: PrimaryKey,
    ) -> Result<Vec<ClassEnrollment>, DatabaseError> {
        self.db.enrollments_for_class(class_id).await
    }

    pub async fn enrollments_for_student(
        &self,
        student_id: PrimaryKey,
    ) -> Result<Vec<StudentEnrollment>, DatabaseError> {
        self.db.enrollments_for_student(student_id).await
    }

    /// Builds the course row the original pages rendered: name, lead
    /// teacher, time slot, and seats taken out of seats available
    pub async fn class_summary(
        &self,
        class_id: PrimaryKey,
    ) -> Result<RosterSummary, DatabaseError> {
        let class = self.db.class_by_id(class_id).await?;
        let lead = lead_assignment(self.db.as_ref(), class_id).await?;
        let enrolled = self.db.count_enrollments(class_id).await?;

        let capacity = lead
            .as_ref()
            .map(|a| a.max_seats)
            .unwrap_or(crate::DEFAULT_CAPACITY);

        let lead_teacher = match &lead {
            Some(assignment) => Some(
                self.db
                    .user_by_id(assignment.teacher_id)
                    .await?
                    .external_id,
            ),
            None => None,
        };

        Ok(RosterSummary {
            class,
            lead_teacher,
            time_slot: lead.map(|a| a.time_slot),
            enrolled,
            capacity,
        })
    }

    async fn is_enrolled(
        &self,
        student_id: PrimaryKey,
        class_id: PrimaryKey,
    ) -> Result<bool, DatabaseError> {
        match self.db.enrollment_by_pair(student_id, class_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Admins may always grade, teachers only in classes they teach
    async fn authorize_grading(
        &self,
        caller: Identity,
        class_id: PrimaryKey,
    ) -> Result<(), RosterError> {
        match caller.role {
            Role::Admin => Ok(()),
            Role::Teacher => match self.db.assignment_by_pair(caller.user_id, class_id).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Err(RosterError::Forbidden),
                Err(e) => Err(e.into()),
            },
            Role::Student => Err(RosterError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Catalog, Directory, NewAssignment, SqliteDatabase, UserData, DEFAULT_CAPACITY};

    struct Fixture {
        directory: Directory<SqliteDatabase>,
        catalog: Catalog<SqliteDatabase>,
        roster: Roster<SqliteDatabase>,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(SqliteDatabase::in_memory().await.expect("database opens"));

        Fixture {
            directory: Directory::new(&db),
            catalog: Catalog::new(&db),
            roster: Roster::new(&db),
        }
    }

    impl Fixture {
        async fn student(&self, external_id: &str) -> UserData {
            self.directory
                .register(external_id, "secret", Role::Student)
                .await
                .expect("student registers")
        }

        async fn teacher(&self, external_id: &str) -> UserData {
            self.directory
                .register(external_id, "secret", Role::Teacher)
                .await
                .expect("teacher registers")
        }

        async fn class_with_seats(&self, teacher_id: PrimaryKey, seats: i64) -> ClassData {
            let class = self
                .catalog
                .create_class("History", None)
                .await
                .expect("class creates");

            self.catalog
                .assign_teacher(NewAssignment {
                    teacher_id,
                    class_id: class.id,
                    day: "Monday".to_string(),
                    time_slot: "10:00-11:30".to_string(),
                    max_seats: seats,
                })
                .await
                .expect("teacher assigns");

            class
        }
    }

    #[tokio::test]
    async fn enrollment_round_trip() {
        let f = fixture().await;

        let student = f.student("s1").await;
        let class = f.catalog.create_class("History", None).await.expect("creates");

        f.roster.enroll(student.id, class.id).await.expect("enrolls");

        let courses = f
            .roster
            .enrollments_for_student(student.id)
            .await
            .expect("lists");

        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].class.id, class.id);
        assert_eq!(courses[0].enrollment.grade, 0.0);

        f.roster
            .unenroll(student.id, class.id)
            .await
            .expect("unenrolls");

        let courses = f
            .roster
            .enrollments_for_student(student.id)
            .await
            .expect("lists");

        assert!(courses.is_empty());
    }

    #[tokio::test]
    async fn enroll_is_idempotent() {
        let f = fixture().await;

        let student = f.student("s1").await;
        let class = f.catalog.create_class("History", None).await.expect("creates");

        f.roster.enroll(student.id, class.id).await.expect("enrolls");
        f.roster
            .enroll(student.id, class.id)
            .await
            .expect("second enroll is a no-op success");

        let roster = f
            .roster
            .enrollments_for_class(class.id)
            .await
            .expect("lists");

        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn unenroll_is_idempotent() {
        let f = fixture().await;

        let student = f.student("s1").await;
        let class = f.catalog.create_class("History", None).await.expect("creates");

        f.roster
            .unenroll(student.id, class.id)
            .await
            .expect("missing enrollment is a no-op");

        let roster = f
            .roster
            .enrollments_for_class(class.id)
            .await
            .expect("lists");

        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn enroll_requires_existing_student_and_class() {
        let f = fixture().await;

        let student = f.student("s1").await;
        let class = f.catalog.create_class("History", None).await.expect("creates");

        let err = f.roster.enroll(999, class.id).await.expect_err("no student");
        assert!(matches!(err, RosterError::Db(DatabaseError::NotFound { .. })));

        let err = f.roster.enroll(student.id, 999).await.expect_err("no class");
        assert!(matches!(err, RosterError::Db(DatabaseError::NotFound { .. })));

        let teacher = f.teacher("t1").await;
        let err = f
            .roster
            .enroll(teacher.id, class.id)
            .await
            .expect_err("teachers do not enroll");
        assert!(matches!(err, RosterError::NotAStudent { .. }));
    }

    #[tokio::test]
    async fn capacity_is_never_exceeded() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 2).await;

        let s1 = f.student("s1").await;
        let s2 = f.student("s2").await;
        let s3 = f.student("s3").await;

        f.roster.enroll(s1.id, class.id).await.expect("first seat");
        f.roster.enroll(s2.id, class.id).await.expect("second seat");

        let err = f
            .roster
            .enroll(s3.id, class.id)
            .await
            .expect_err("class is full");

        assert!(matches!(
            err,
            RosterError::CapacityExceeded { capacity: 2, .. }
        ));

        let roster = f
            .roster
            .enrollments_for_class(class.id)
            .await
            .expect("lists");

        assert_eq!(roster.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_enrolls_cannot_overshoot_the_last_seat() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 1).await;

        let s1 = f.student("s1").await;
        let s2 = f.student("s2").await;

        let (first, second) = tokio::join!(
            f.roster.enroll(s1.id, class.id),
            f.roster.enroll(s2.id, class.id),
        );

        let results = [first, second];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(RosterError::CapacityExceeded { capacity: 1, .. })
                )
            })
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, 1);

        let roster = f
            .roster
            .enrollments_for_class(class.id)
            .await
            .expect("lists");

        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn a_freed_seat_can_be_taken_again() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 1).await;

        let s1 = f.student("s1").await;
        let s2 = f.student("s2").await;

        f.roster.enroll(s1.id, class.id).await.expect("enrolls");

        f.roster
            .enroll(s2.id, class.id)
            .await
            .expect_err("class is full");

        f.roster.unenroll(s1.id, class.id).await.expect("unenrolls");
        f.roster
            .enroll(s2.id, class.id)
            .await
            .expect("freed seat is taken");
    }

    #[tokio::test]
    async fn grades_are_recorded_by_the_assigned_teacher() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 10).await;
        let student = f.student("s1").await;

        f.roster.enroll(student.id, class.id).await.expect("enrolls");

        let caller = Identity {
            user_id: teacher.id,
            role: Role::Teacher,
        };

        f.roster
            .set_grade(caller, student.id, class.id, 85.5)
            .await
            .expect("grades");

        let roster = f
            .roster
            .enrollments_for_class(class.id)
            .await
            .expect("lists");

        assert_eq!(roster[0].enrollment.grade, 85.5);
        assert_eq!(roster[0].student.external_id, "s1");
    }

    #[tokio::test]
    async fn grading_a_missing_enrollment_fails() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 10).await;
        let student = f.student("s1").await;

        let caller = Identity {
            user_id: teacher.id,
            role: Role::Teacher,
        };

        let err = f
            .roster
            .set_grade(caller, student.id, class.id, 85.5)
            .await
            .expect_err("no enrollment");

        assert!(matches!(err, RosterError::Db(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn grading_is_limited_to_assigned_teachers_and_admins() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let other_teacher = f.teacher("t2").await;
        let class = f.class_with_seats(teacher.id, 10).await;
        let student = f.student("s1").await;

        f.roster.enroll(student.id, class.id).await.expect("enrolls");

        let unassigned = Identity {
            user_id: other_teacher.id,
            role: Role::Teacher,
        };

        let err = f
            .roster
            .set_grade(unassigned, student.id, class.id, 50.0)
            .await
            .expect_err("not their class");
        assert!(matches!(err, RosterError::Forbidden));

        let as_student = Identity {
            user_id: student.id,
            role: Role::Student,
        };

        let err = f
            .roster
            .set_grade(as_student, student.id, class.id, 100.0)
            .await
            .expect_err("students do not grade");
        assert!(matches!(err, RosterError::Forbidden));

        let admin = Identity {
            user_id: 0,
            role: Role::Admin,
        };

        f.roster
            .set_grade(admin, student.id, class.id, 72.0)
            .await
            .expect("admins may always grade");
    }

    #[tokio::test]
    async fn malformed_grades_are_rejected() {
        let f = fixture().await;

        let teacher = f.teacher("t1").await;
        let class = f.class_with_seats(teacher.id, 10).await;
        let student = f.student("s1").await;

        f.roster.enroll(student.id, class.id).await.expect("enrolls");

        let caller = Identity {
            user_id: teacher.id,
            role: Role::Teacher,
        };

        for grade in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
            let err = f
                .roster
                .set_grade(caller, student.id, class.id, grade)
                .await
                .expect_err("grade is out of range");

            assert!(matches!(err, RosterError::InvalidGrade { .. }));
        }
    }

    #[tokio::test]
    async fn class_summary_reflects_the_lead_assignment() {
        let f = fixture().await;

        let class = f.catalog.create_class("History", None).await.expect("creates");

        // Without an assignment the class is "TBA" at the default capacity
        let summary = f.roster.class_summary(class.id).await.expect("summarizes");
        assert_eq!(summary.lead_teacher, None);
        assert_eq!(summary.time_slot, None);
        assert_eq!(summary.capacity, DEFAULT_CAPACITY);
        assert_eq!(summary.enrolled, 0);

        let teacher = f.teacher("t1").await;
        f.catalog
            .assign_teacher(NewAssignment {
                teacher_id: teacher.id,
                class_id: class.id,
                day: "Monday".to_string(),
                time_slot: "10:00-11:30".to_string(),
                max_seats: 15,
            })
            .await
            .expect("assigns");

        let student = f.student("s1").await;
        f.roster.enroll(student.id, class.id).await.expect("enrolls");

        let summary = f.roster.class_summary(class.id).await.expect("summarizes");
        assert_eq!(summary.lead_teacher.as_deref(), Some("t1"));
        assert_eq!(summary.time_slot.as_deref(), Some("10:00-11:30"));
        assert_eq!(summary.capacity, 15);
        assert_eq!(summary.enrolled, 1);
    }
}
