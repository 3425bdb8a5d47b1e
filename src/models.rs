use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::{AdminCredential, TokenIssuer};
use crate::db::ClinicStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClinicStore>,
    pub tokens: TokenIssuer,
    pub admin: AdminCredential,
}

/* -------------------------
   Entities
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub specialty: String,
    pub phone_number: String,
    pub available_start_time: NaiveTime,
    pub available_end_time: NaiveTime,
    pub available_times: Vec<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_time: NaiveDateTime,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub medication_name: String,
    pub dosage: String,
    pub instructions: String,
    pub prescription_date: NaiveDateTime,
}

/// Session roles, stored as smallint on `session_token.role`.
pub const ROLE_ADMIN: i16 = 0;
pub const ROLE_DOCTOR: i16 = 1;
pub const ROLE_PATIENT: i16 = 2;

pub fn role_name(role: i16) -> &'static str {
    match role {
        ROLE_ADMIN => "admin",
        ROLE_DOCTOR => "doctor",
        ROLE_PATIENT => "patient",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub session_token_id: Uuid,
    pub identity_email: String,
    /// Fixed by the login endpoint that issued the token.
    pub role: i16,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Store inputs
--------------------------*/

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub specialty: String,
    pub phone_number: String,
    pub available_start_time: NaiveTime,
    pub available_end_time: NaiveTime,
    pub available_times: Vec<NaiveTime>,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
}

/// `id: None` inserts, `Some(id)` replaces the mutable fields of that row.
#[derive(Debug, Clone)]
pub struct AppointmentDraft {
    pub id: Option<i64>,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_time: NaiveDateTime,
    pub status: String,
    pub notes: Option<String>,
}

impl From<Appointment> for AppointmentDraft {
    fn from(a: Appointment) -> Self {
        Self {
            id: Some(a.id),
            doctor_id: a.doctor_id,
            patient_id: a.patient_id,
            appointment_time: a.appointment_time,
            status: a.status,
            notes: a.notes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrescriptionDraft {
    pub id: Option<i64>,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub medication_name: String,
    pub dosage: String,
    pub instructions: String,
    pub prescription_date: NaiveDateTime,
}

impl From<Prescription> for PrescriptionDraft {
    fn from(p: Prescription) -> Self {
        Self {
            id: Some(p.id),
            doctor_id: p.doctor_id,
            patient_id: p.patient_id,
            medication_name: p.medication_name,
            dosage: p.dosage,
            instructions: p.instructions,
            prescription_date: p.prescription_date,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_token_id: Uuid,
    pub identity_email: String,
    pub role: i16,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

/// Success half of the envelope; `data` is flattened next to `success`/`message`.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorLoginData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub doctor: Doctor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientLoginData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub patient: Patient,
}

#[derive(Debug, Serialize)]
pub struct DoctorData {
    pub doctor: Doctor,
}

#[derive(Debug, Serialize)]
pub struct DoctorsData {
    pub doctors: Vec<Doctor>,
}

#[derive(Debug, Serialize)]
pub struct PatientData {
    pub patient: Patient,
}

#[derive(Debug, Serialize)]
pub struct PatientsData {
    pub patients: Vec<Patient>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentData {
    pub appointment: Appointment,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsData {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionData {
    pub prescription: Prescription,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionsData {
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

/* -------------------------
   Helpers
--------------------------*/

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM or HH:MM:SS"))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]`, with `T` or a space as separator.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("invalid date-time '{s}', expected YYYY-MM-DDTHH:MM:SS"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_flattens_payload_and_hides_password() {
        let patient = Patient {
            id: 7,
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: "a@x.com".into(),
            password: "p".into(),
            phone_number: "555".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            address: "1 Main St".into(),
        };
        let body = ApiOk::new("Patient retrieved successfully", PatientData { patient });
        let v = serde_json::to_value(&body).unwrap();

        assert_eq!(v["success"], true);
        assert_eq!(v["message"], "Patient retrieved successfully");
        assert_eq!(v["patient"]["id"], 7);
        assert_eq!(v["patient"]["firstName"], "Ana");
        assert_eq!(v["patient"]["dateOfBirth"], "1990-04-02");
        assert!(v["patient"].get("password").is_none());
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time(" 17:00:15 ").unwrap(), NaiveTime::from_hms_opt(17, 0, 15).unwrap());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("nine").is_err());
    }

    #[test]
    fn test_parse_date_and_datetime() {
        assert_eq!(parse_date("2025-02-28").unwrap(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("28/02/2025").is_err());

        let expected = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_datetime("2025-03-01T10:00:00").unwrap(), expected);
        assert_eq!(parse_datetime("2025-03-01T10:00").unwrap(), expected);
        assert_eq!(parse_datetime("2025-03-01 10:00:00").unwrap(), expected);
        assert!(parse_datetime("2025-03-01").is_err());
    }
}
