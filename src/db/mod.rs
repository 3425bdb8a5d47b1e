//! Storage seam for the clinic entities.
//!
//! Handlers only see the traits below. `PgStore` is the production backend,
//! `MemoryStore` backs local runs without `DATABASE_URL` and the tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::models::*;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} with this email already exists")]
    DuplicateEmail(&'static str),
    /// Another appointment already holds this (doctor, time) pair.
    #[error("doctor is not available at the requested time")]
    SlotTaken,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError>;
    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError>;
    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError>;
    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError>;
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;
    async fn list_doctors_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>, StoreError>;
    /// Case-sensitive substring match on first or last name.
    async fn search_doctors_by_name(&self, name: &str) -> Result<Vec<Doctor>, StoreError>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError>;
    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError>;
    async fn find_patient(&self, id: i64) -> Result<Option<Patient>, StoreError>;
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;
    async fn find_patient_by_email_or_phone(
        &self,
        email_or_phone: &str,
    ) -> Result<Option<Patient>, StoreError>;
    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `SlotTaken` when the doctor already has an appointment at that exact time.
    async fn save_appointment(&self, draft: AppointmentDraft) -> Result<Appointment, StoreError>;
    async fn delete_appointment(&self, id: i64) -> Result<bool, StoreError>;
    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError>;
    async fn find_appointments_by_doctor_at(
        &self,
        doctor_id: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;
    async fn list_appointments_by_doctor(&self, doctor_id: i64)
    -> Result<Vec<Appointment>, StoreError>;
    async fn list_appointments_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StoreError>;
    async fn list_appointments_by_doctor_on_date(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;
    /// Inclusive on both ends.
    async fn list_appointments_by_doctor_between(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;
    async fn list_appointments_by_patient_from(
        &self,
        patient_id: i64,
        from: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;
}

#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    async fn save_prescription(&self, draft: PrescriptionDraft)
    -> Result<Prescription, StoreError>;
    async fn delete_prescription(&self, id: i64) -> Result<bool, StoreError>;
    async fn find_prescription(&self, id: i64) -> Result<Option<Prescription>, StoreError>;
    async fn list_prescriptions_by_doctor(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<Prescription>, StoreError>;
    async fn list_prescriptions_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError>;
    async fn list_prescriptions_by_doctor_and_patient(
        &self,
        doctor_id: i64,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError>;
    async fn list_prescriptions_by_patient_since(
        &self,
        patient_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<Prescription>, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: NewSession) -> Result<(), StoreError>;
    /// Only sessions that are neither revoked nor expired at `now`.
    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;
    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError>;
}

pub trait ClinicStore:
    DoctorStore + PatientStore + AppointmentStore + PrescriptionStore + SessionStore
{
}

impl<T> ClinicStore for T where
    T: DoctorStore + PatientStore + AppointmentStore + PrescriptionStore + SessionStore
{
}

pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}
