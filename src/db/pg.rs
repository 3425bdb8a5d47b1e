// src/db/pg.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AppointmentStore, DoctorStore, PatientStore, PrescriptionStore, SessionStore, StoreError,
};
use crate::models::*;

#[derive(Clone)]
pub struct PgStore {
    pub db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Unique violations on the `email` columns.
fn map_identity_err(entity: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateEmail(entity)
        } else {
            StoreError::Database(e)
        }
    }
}

/// Unique violation on `appointment_doctor_time_key`.
fn map_appointment_err(e: sqlx::Error) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::SlotTaken
    } else {
        StoreError::Database(e)
    }
}

/* ============================================================
   Doctors
   ============================================================ */

#[async_trait]
impl DoctorStore for PgStore {
    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        sqlx::query_as::<_, Doctor>(
            r#"
            INSERT INTO doctor (first_name, last_name, email, password, specialty, phone_number,
                                available_start_time, available_end_time, available_times)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            RETURNING id, first_name, last_name, email, password, specialty, phone_number,
                      available_start_time, available_end_time, available_times
            "#,
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.password)
        .bind(&new.specialty)
        .bind(&new.phone_number)
        .bind(new.available_start_time)
        .bind(new.available_end_time)
        .bind(new.available_times)
        .fetch_one(&self.db)
        .await
        .map_err(map_identity_err("Doctor"))
    }

    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError> {
        sqlx::query_as::<_, Doctor>(
            r#"
            UPDATE doctor
            SET first_name = $1,
                last_name = $2,
                email = $3,
                password = $4,
                specialty = $5,
                phone_number = $6,
                available_start_time = $7,
                available_end_time = $8,
                available_times = $9
            WHERE id = $10
            RETURNING id, first_name, last_name, email, password, specialty, phone_number,
                      available_start_time, available_end_time, available_times
            "#,
        )
        .bind(&doctor.first_name)
        .bind(&doctor.last_name)
        .bind(&doctor.email)
        .bind(&doctor.password)
        .bind(&doctor.specialty)
        .bind(&doctor.phone_number)
        .bind(doctor.available_start_time)
        .bind(doctor.available_end_time)
        .bind(doctor.available_times.clone())
        .bind(doctor.id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_identity_err("Doctor"))?
        .ok_or(StoreError::NotFound("Doctor"))
    }

    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        let row = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, first_name, last_name, email, password, specialty, phone_number,
                   available_start_time, available_end_time, available_times
            FROM doctor
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let row = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, first_name, last_name, email, password, specialty, phone_number,
                   available_start_time, available_end_time, available_times
            FROM doctor
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let rows = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, first_name, last_name, email, password, specialty, phone_number,
                   available_start_time, available_end_time, available_times
            FROM doctor
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_doctors_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>, StoreError> {
        let rows = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, first_name, last_name, email, password, specialty, phone_number,
                   available_start_time, available_end_time, available_times
            FROM doctor
            WHERE specialty = $1
            ORDER BY id ASC
            "#,
        )
        .bind(specialty)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn search_doctors_by_name(&self, name: &str) -> Result<Vec<Doctor>, StoreError> {
        // strpos keeps the match literal and case-sensitive (no LIKE wildcards)
        let rows = sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, first_name, last_name, email, password, specialty, phone_number,
                   available_start_time, available_end_time, available_times
            FROM doctor
            WHERE strpos(first_name, $1) > 0
               OR strpos(last_name, $1) > 0
            ORDER BY id ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/* ============================================================
   Patients
   ============================================================ */

#[async_trait]
impl PatientStore for PgStore {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patient (first_name, last_name, email, password, phone_number, date_of_birth, address)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING id, first_name, last_name, email, password, phone_number, date_of_birth, address
            "#,
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.password)
        .bind(&new.phone_number)
        .bind(new.date_of_birth)
        .bind(&new.address)
        .fetch_one(&self.db)
        .await
        .map_err(map_identity_err("Patient"))
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        sqlx::query_as::<_, Patient>(
            r#"
            UPDATE patient
            SET first_name = $1,
                last_name = $2,
                email = $3,
                password = $4,
                phone_number = $5,
                date_of_birth = $6,
                address = $7
            WHERE id = $8
            RETURNING id, first_name, last_name, email, password, phone_number, date_of_birth, address
            "#,
        )
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(&patient.email)
        .bind(&patient.password)
        .bind(&patient.phone_number)
        .bind(patient.date_of_birth)
        .bind(&patient.address)
        .bind(patient.id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_identity_err("Patient"))?
        .ok_or(StoreError::NotFound("Patient"))
    }

    async fn find_patient(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        let row = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, password, phone_number, date_of_birth, address
            FROM patient
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let row = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, password, phone_number, date_of_birth, address
            FROM patient
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_patient_by_email_or_phone(
        &self,
        email_or_phone: &str,
    ) -> Result<Option<Patient>, StoreError> {
        // phone numbers are not unique; the oldest registration wins
        let row = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, password, phone_number, date_of_birth, address
            FROM patient
            WHERE email = $1 OR phone_number = $1
            ORDER BY (email = $1) DESC, id ASC
            LIMIT 1
            "#,
        )
        .bind(email_or_phone)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        let rows = sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, password, phone_number, date_of_birth, address
            FROM patient
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/* ============================================================
   Appointments
   ============================================================ */

#[async_trait]
impl AppointmentStore for PgStore {
    async fn save_appointment(&self, draft: AppointmentDraft) -> Result<Appointment, StoreError> {
        match draft.id {
            None => sqlx::query_as::<_, Appointment>(
                r#"
                INSERT INTO appointment (doctor_id, patient_id, appointment_time, status, notes)
                VALUES ($1,$2,$3,$4,$5)
                RETURNING id, doctor_id, patient_id, appointment_time, status, notes
                "#,
            )
            .bind(draft.doctor_id)
            .bind(draft.patient_id)
            .bind(draft.appointment_time)
            .bind(&draft.status)
            .bind(draft.notes.as_deref())
            .fetch_one(&self.db)
            .await
            .map_err(map_appointment_err),
            Some(id) => sqlx::query_as::<_, Appointment>(
                r#"
                UPDATE appointment
                SET doctor_id = $1,
                    patient_id = $2,
                    appointment_time = $3,
                    status = $4,
                    notes = $5
                WHERE id = $6
                RETURNING id, doctor_id, patient_id, appointment_time, status, notes
                "#,
            )
            .bind(draft.doctor_id)
            .bind(draft.patient_id)
            .bind(draft.appointment_time)
            .bind(&draft.status)
            .bind(draft.notes.as_deref())
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(map_appointment_err)?
            .ok_or(StoreError::NotFound("Appointment")),
        }
    }

    async fn delete_appointment(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            DELETE FROM appointment
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_appointments_by_doctor_at(
        &self,
        doctor_id: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE doctor_id = $1
              AND appointment_time = $2
            ORDER BY id ASC
            "#,
        )
        .bind(doctor_id)
        .bind(at)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_appointments_by_doctor(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE doctor_id = $1
            ORDER BY appointment_time ASC, id ASC
            "#,
        )
        .bind(doctor_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_appointments_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE patient_id = $1
            ORDER BY appointment_time ASC, id ASC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_appointments_by_doctor_on_date(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE doctor_id = $1
              AND appointment_time::date = $2
            ORDER BY appointment_time ASC, id ASC
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_appointments_by_doctor_between(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE doctor_id = $1
              AND appointment_time BETWEEN $2 AND $3
            ORDER BY appointment_time ASC, id ASC
            "#,
        )
        .bind(doctor_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_appointments_by_patient_from(
        &self,
        patient_id: i64,
        from: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, doctor_id, patient_id, appointment_time, status, notes
            FROM appointment
            WHERE patient_id = $1
              AND appointment_time >= $2
            ORDER BY appointment_time ASC, id ASC
            "#,
        )
        .bind(patient_id)
        .bind(from)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/* ============================================================
   Prescriptions
   ============================================================ */

#[async_trait]
impl PrescriptionStore for PgStore {
    async fn save_prescription(
        &self,
        draft: PrescriptionDraft,
    ) -> Result<Prescription, StoreError> {
        match draft.id {
            None => {
                let row = sqlx::query_as::<_, Prescription>(
                    r#"
                    INSERT INTO prescription (doctor_id, patient_id, medication_name, dosage, instructions, prescription_date)
                    VALUES ($1,$2,$3,$4,$5,$6)
                    RETURNING id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
                    "#,
                )
                .bind(draft.doctor_id)
                .bind(draft.patient_id)
                .bind(&draft.medication_name)
                .bind(&draft.dosage)
                .bind(&draft.instructions)
                .bind(draft.prescription_date)
                .fetch_one(&self.db)
                .await?;
                Ok(row)
            }
            Some(id) => sqlx::query_as::<_, Prescription>(
                r#"
                UPDATE prescription
                SET doctor_id = $1,
                    patient_id = $2,
                    medication_name = $3,
                    dosage = $4,
                    instructions = $5,
                    prescription_date = $6
                WHERE id = $7
                RETURNING id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
                "#,
            )
            .bind(draft.doctor_id)
            .bind(draft.patient_id)
            .bind(&draft.medication_name)
            .bind(&draft.dosage)
            .bind(&draft.instructions)
            .bind(draft.prescription_date)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound("Prescription")),
        }
    }

    async fn delete_prescription(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            DELETE FROM prescription
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_prescription(&self, id: i64) -> Result<Option<Prescription>, StoreError> {
        let row = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
            FROM prescription
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_prescriptions_by_doctor(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
            FROM prescription
            WHERE doctor_id = $1
            ORDER BY prescription_date ASC, id ASC
            "#,
        )
        .bind(doctor_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_prescriptions_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
            FROM prescription
            WHERE patient_id = $1
            ORDER BY prescription_date ASC, id ASC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_prescriptions_by_doctor_and_patient(
        &self,
        doctor_id: i64,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
            FROM prescription
            WHERE doctor_id = $1
              AND patient_id = $2
            ORDER BY prescription_date ASC, id ASC
            "#,
        )
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_prescriptions_by_patient_since(
        &self,
        patient_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, doctor_id, patient_id, medication_name, dosage, instructions, prescription_date
            FROM prescription
            WHERE patient_id = $1
              AND prescription_date >= $2
            ORDER BY prescription_date ASC, id ASC
            "#,
        )
        .bind(patient_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/* ============================================================
   Sessions
   ============================================================ */

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, session: NewSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_token
                (session_token_id, identity_email, role, session_token_hash, expires_at)
            VALUES
                ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.session_token_id)
        .bind(&session.identity_email)
        .bind(session.role)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_token_id, identity_email, role, expires_at
            FROM session_token
            WHERE session_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        if let Some(session) = &row {
            // Touch last_seen_at (best-effort)
            let _ = sqlx::query(
                r#"
                UPDATE session_token
                SET last_seen_at = now()
                WHERE session_token_id = $1
                "#,
            )
            .bind(session.session_token_id)
            .execute(&self.db)
            .await;
        }

        Ok(row)
    }

    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_token_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
