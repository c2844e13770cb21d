//! Demo data for local development.
//!
//! The original app scattered seeding endpoints through its routes. Here
//! seeding is a plain library utility the server binary may call on
//! startup, it is never part of the HTTP surface.

use log::info;
use thiserror::Error;

use crate::{
    CatalogError, Database, DatabaseError, DirectoryError, NewAssignment, Registry, Role,
    RosterError, UserData,
};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Seeds a handful of accounts, classes, and enrollments. Safe to run
/// against a database that was seeded before.
pub async fn seed_demo_data<Db>(registry: &Registry<Db>) -> Result<(), FixtureError>
where
    Db: Database,
{
    let admin = ensure_account(registry, "admin", "admin", Role::Admin).await?;
    let teacher = ensure_account(registry, "teststaff", "123", Role::Teacher).await?;
    let student = ensure_account(registry, "teststudent", "123", Role::Student).await?;

    info!(
        "Seeded demo accounts: {}, {}, {}",
        admin.external_id, teacher.external_id, student.external_id
    );

    if !registry.catalog.list_classes().await?.is_empty() {
        return Ok(());
    }

    let history = registry
        .catalog
        .create_class("History", Some("From clay tablets to yesterday".to_string()))
        .await?;

    let calculus = registry
        .catalog
        .create_class("Calculus", Some("Limits and derivatives".to_string()))
        .await?;

    registry
        .catalog
        .assign_teacher(NewAssignment {
            teacher_id: teacher.id,
            class_id: history.id,
            day: "Monday".to_string(),
            time_slot: "10:00-11:30".to_string(),
            max_seats: 25,
        })
        .await?;

    registry
        .catalog
        .assign_teacher(NewAssignment {
            teacher_id: teacher.id,
            class_id: calculus.id,
            day: "Thursday".to_string(),
            time_slot: "14:00-15:30".to_string(),
            max_seats: 40,
        })
        .await?;

    registry.roster.enroll(student.id, history.id).await?;

    info!("Seeded demo classes and enrollments");

    Ok(())
}

/// Registers the account, or looks it up if an earlier run created it
async fn ensure_account<Db>(
    registry: &Registry<Db>,
    external_id: &str,
    secret: &str,
    role: Role,
) -> Result<UserData, FixtureError>
where
    Db: Database,
{
    match registry.directory.register(external_id, secret, role).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::Db(DatabaseError::Conflict { .. })) => {
            let user = registry.directory.user_by_external_id(external_id).await?;
            Ok(user)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteDatabase;

    #[tokio::test]
    async fn seeding_twice_is_safe() {
        let db = SqliteDatabase::in_memory().await.expect("database opens");
        let registry = Registry::new(db);

        seed_demo_data(&registry).await.expect("first run");
        seed_demo_data(&registry).await.expect("second run");

        let classes = registry.catalog.list_classes().await.expect("lists");
        assert_eq!(classes.len(), 2);

        registry
            .directory
            .authenticate_as("teststudent", "123", Role::Student)
            .await
            .expect("seeded student logs in");
    }
}
