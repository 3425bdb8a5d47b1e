//! Doctor and patient identities: registration, partial updates and login checks.
//!
//! Passwords are compared as stored; nothing here hashes them.

use serde::Deserialize;

use crate::auth::AdminCredential;
use crate::db::{DoctorStore, PatientStore, StoreError};
use crate::error::ApiError;
use crate::models::{parse_date, parse_time, Doctor, NewDoctor, NewPatient, Patient};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub specialty: String,
    pub phone_number: String,
    pub available_start_time: String,
    pub available_end_time: String,
    #[serde(default)]
    pub available_times: Vec<String>,
}

/// Absent fields keep their stored value. Email and password are not patchable.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    pub phone_number: Option<String>,
    pub available_start_time: Option<String>,
    pub available_end_time: Option<String>,
    pub available_times: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let e = required("email", email)?;
    let well_formed = e
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !e.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(ApiError::validation("email should be valid"));
    }
    Ok(e)
}

fn validate_password(pw: &str) -> Result<String, ApiError> {
    if pw.trim().is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    // stored exactly as given
    Ok(pw.to_string())
}

fn time_field(field: &str, value: &str) -> Result<chrono::NaiveTime, ApiError> {
    parse_time(value).map_err(|e| ApiError::validation(format!("{field}: {e}")))
}

fn time_list(field: &str, values: &[String]) -> Result<Vec<chrono::NaiveTime>, ApiError> {
    values.iter().map(|v| time_field(field, v)).collect()
}

/// The admin email belongs to the configured credential and never to a stored identity.
fn ensure_not_reserved(admin: &AdminCredential, email: &str) -> Result<(), ApiError> {
    if admin.is_admin(email) {
        return Err(ApiError::validation("This email is reserved"));
    }
    Ok(())
}

/// `Some(non-blank)` replaces, anything else keeps the stored value.
fn patch_text(target: &mut String, value: Option<String>) {
    if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *target = v.to_string();
    }
}

pub fn validate_new_doctor(req: CreateDoctorRequest) -> Result<NewDoctor, ApiError> {
    Ok(NewDoctor {
        first_name: required("firstName", &req.first_name)?,
        last_name: required("lastName", &req.last_name)?,
        email: validate_email(&req.email)?,
        password: validate_password(&req.password)?,
        specialty: required("specialty", &req.specialty)?,
        phone_number: required("phoneNumber", &req.phone_number)?,
        available_start_time: time_field("availableStartTime", &req.available_start_time)?,
        available_end_time: time_field("availableEndTime", &req.available_end_time)?,
        available_times: time_list("availableTimes", &req.available_times)?,
    })
}

pub fn validate_new_patient(req: RegisterPatientRequest) -> Result<NewPatient, ApiError> {
    Ok(NewPatient {
        first_name: required("firstName", &req.first_name)?,
        last_name: required("lastName", &req.last_name)?,
        email: validate_email(&req.email)?,
        password: validate_password(&req.password)?,
        phone_number: required("phoneNumber", &req.phone_number)?,
        date_of_birth: parse_date(&req.date_of_birth)
            .map_err(|e| ApiError::validation(format!("dateOfBirth: {e}")))?,
        address: required("address", &req.address)?,
    })
}

/// Applies `patch` in place. Nothing is written to `doctor` unless every supplied field parses.
pub fn apply_doctor_patch(doctor: &mut Doctor, patch: DoctorPatch) -> Result<(), ApiError> {
    let start = patch
        .available_start_time
        .as_deref()
        .map(|v| time_field("availableStartTime", v))
        .transpose()?;
    let end = patch
        .available_end_time
        .as_deref()
        .map(|v| time_field("availableEndTime", v))
        .transpose()?;
    let times = patch
        .available_times
        .as_deref()
        .map(|v| time_list("availableTimes", v))
        .transpose()?;

    patch_text(&mut doctor.first_name, patch.first_name);
    patch_text(&mut doctor.last_name, patch.last_name);
    patch_text(&mut doctor.specialty, patch.specialty);
    patch_text(&mut doctor.phone_number, patch.phone_number);
    if let Some(start) = start {
        doctor.available_start_time = start;
    }
    if let Some(end) = end {
        doctor.available_end_time = end;
    }
    if let Some(times) = times {
        doctor.available_times = times;
    }
    Ok(())
}

pub fn apply_patient_patch(patient: &mut Patient, patch: PatientPatch) -> Result<(), ApiError> {
    let date_of_birth = patch
        .date_of_birth
        .as_deref()
        .map(|v| parse_date(v).map_err(|e| ApiError::validation(format!("dateOfBirth: {e}"))))
        .transpose()?;

    patch_text(&mut patient.first_name, patch.first_name);
    patch_text(&mut patient.last_name, patch.last_name);
    patch_text(&mut patient.phone_number, patch.phone_number);
    patch_text(&mut patient.address, patch.address);
    if let Some(dob) = date_of_birth {
        patient.date_of_birth = dob;
    }
    Ok(())
}

pub async fn create_doctor<S>(
    store: &S,
    admin: &AdminCredential,
    req: CreateDoctorRequest,
) -> Result<Doctor, ApiError>
where
    S: DoctorStore + ?Sized,
{
    let new = validate_new_doctor(req)?;
    ensure_not_reserved(admin, &new.email)?;
    if store.find_doctor_by_email(&new.email).await?.is_some() {
        return Err(StoreError::DuplicateEmail("Doctor").into());
    }
    // the store's unique constraint still catches a concurrent insert
    Ok(store.create_doctor(new).await?)
}

pub async fn register_patient<S>(
    store: &S,
    admin: &AdminCredential,
    req: RegisterPatientRequest,
) -> Result<Patient, ApiError>
where
    S: PatientStore + ?Sized,
{
    let new = validate_new_patient(req)?;
    ensure_not_reserved(admin, &new.email)?;
    if store.find_patient_by_email(&new.email).await?.is_some() {
        return Err(StoreError::DuplicateEmail("Patient").into());
    }
    Ok(store.create_patient(new).await?)
}

pub async fn update_doctor<S>(store: &S, doctor_id: i64, patch: DoctorPatch) -> Result<Doctor, ApiError>
where
    S: DoctorStore + ?Sized,
{
    let mut doctor = store
        .find_doctor(doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor not found"))?;
    apply_doctor_patch(&mut doctor, patch)?;
    Ok(store.update_doctor(&doctor).await?)
}

pub async fn update_patient<S>(
    store: &S,
    patient_id: i64,
    patch: PatientPatch,
) -> Result<Patient, ApiError>
where
    S: PatientStore + ?Sized,
{
    let mut patient = store
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    apply_patient_patch(&mut patient, patch)?;
    Ok(store.update_patient(&patient).await?)
}

/// `None` for an unknown email or a wrong password; callers cannot tell which.
pub async fn validate_doctor_login<S>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<Option<Doctor>, StoreError>
where
    S: DoctorStore + ?Sized,
{
    Ok(store
        .find_doctor_by_email(email.trim())
        .await?
        .filter(|d| d.password == password))
}

pub async fn validate_patient_login<S>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<Option<Patient>, StoreError>
where
    S: PatientStore + ?Sized,
{
    Ok(store
        .find_patient_by_email(email.trim())
        .await?
        .filter(|p| p.password == password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{NaiveDate, NaiveTime};

    fn doctor_req(email: &str) -> CreateDoctorRequest {
        CreateDoctorRequest {
            first_name: "Meredith".into(),
            last_name: "Grey".into(),
            email: email.into(),
            password: "pw".into(),
            specialty: "Surgery".into(),
            phone_number: "555-0101".into(),
            available_start_time: "09:00".into(),
            available_end_time: "17:00".into(),
            available_times: vec!["09:00".into(), "10:00:00".into()],
        }
    }

    fn admin() -> AdminCredential {
        AdminCredential::new(
            "admin@smartclinic.com",
            crate::config::AdminPassword::Plain("admin123".into()),
        )
    }

    fn patient_req(email: &str) -> RegisterPatientRequest {
        RegisterPatientRequest {
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: email.into(),
            password: "p".into(),
            phone_number: "555-0100".into(),
            date_of_birth: "1990-04-02".into(),
            address: "1 Main St".into(),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("  a@x.com ").is_ok());
        assert!(validate_email("ax.com").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("a b@x.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_new_doctor_rejects_blank_and_bad_times() {
        let mut req = doctor_req("d@x.com");
        req.specialty = "  ".into();
        assert!(validate_new_doctor(req).is_err());

        let mut req = doctor_req("d@x.com");
        req.available_end_time = "5pm".into();
        assert!(validate_new_doctor(req).is_err());

        let ok = validate_new_doctor(doctor_req("d@x.com")).unwrap();
        assert_eq!(ok.available_times.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_doctor_email_rejected_without_mutation() {
        let store = MemoryStore::new();
        create_doctor(&store, &admin(), doctor_req("d@x.com")).await.unwrap();

        let err = create_doctor(&store, &admin(), doctor_req("d@x.com")).await.unwrap_err();
        match err {
            ApiError::BadRequest(code, msg) => {
                assert_eq!(code, "DUPLICATE_EMAIL");
                assert_eq!(msg, "Doctor with this email already exists");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.list_doctors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_patient_email_rejected_without_mutation() {
        let store = MemoryStore::new();
        let first = register_patient(&store, &admin(), patient_req("a@x.com")).await.unwrap();

        let mut again = patient_req("a@x.com");
        again.first_name = "Other".into();
        assert!(register_patient(&store, &admin(), again).await.is_err());

        let patients = store.list_patients().await.unwrap();
        assert_eq!(patients, vec![first]);
    }

    #[tokio::test]
    async fn test_admin_email_is_reserved() {
        let store = MemoryStore::new();

        let err = register_patient(&store, &admin(), patient_req("Admin@SmartClinic.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
        let err = create_doctor(&store, &admin(), doctor_req("admin@smartclinic.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        assert!(store.list_patients().await.unwrap().is_empty());
        assert!(store.list_doctors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_update_only_specialty() {
        let store = MemoryStore::new();
        let before = create_doctor(&store, &admin(), doctor_req("d@x.com")).await.unwrap();

        let patch = DoctorPatch {
            specialty: Some("Cardiology".into()),
            ..Default::default()
        };
        let after = update_doctor(&store, before.id, patch).await.unwrap();

        let expected = Doctor {
            specialty: "Cardiology".into(),
            ..before.clone()
        };
        assert_eq!(after, expected);
        assert_eq!(store.find_doctor(before.id).await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_partial_update_rejects_bad_time_without_writing() {
        let store = MemoryStore::new();
        let before = create_doctor(&store, &admin(), doctor_req("d@x.com")).await.unwrap();

        let patch = DoctorPatch {
            first_name: Some("Changed".into()),
            available_end_time: Some("later".into()),
            ..Default::default()
        };
        assert!(update_doctor(&store, before.id, patch).await.is_err());
        assert_eq!(store.find_doctor(before.id).await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn test_update_unknown_doctor_is_not_found() {
        let store = MemoryStore::new();
        let err = update_doctor(&store, 99, DoctorPatch::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }

    #[test]
    fn test_patient_patch_keeps_unspecified_fields() {
        let mut patient = Patient {
            id: 1,
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: "a@x.com".into(),
            password: "p".into(),
            phone_number: "555".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            address: "1 Main St".into(),
        };
        let patch = PatientPatch {
            address: Some("2 Side St".into()),
            first_name: Some("   ".into()),
            ..Default::default()
        };
        apply_patient_patch(&mut patient, patch).unwrap();
        assert_eq!(patient.address, "2 Side St");
        assert_eq!(patient.first_name, "Ana");
        assert_eq!(patient.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 2).unwrap());
    }

    #[tokio::test]
    async fn test_login_validation_is_exact_password_match() {
        let store = MemoryStore::new();
        let doctor = create_doctor(&store, &admin(), doctor_req("d@x.com")).await.unwrap();
        register_patient(&store, &admin(), patient_req("a@x.com")).await.unwrap();

        let found = validate_doctor_login(&store, "d@x.com", "pw").await.unwrap();
        assert_eq!(found.map(|d| d.id), Some(doctor.id));
        assert!(validate_doctor_login(&store, "d@x.com", "PW").await.unwrap().is_none());
        assert!(validate_doctor_login(&store, "nobody@x.com", "pw").await.unwrap().is_none());

        assert!(validate_patient_login(&store, "a@x.com", "p").await.unwrap().is_some());
        assert!(validate_patient_login(&store, "a@x.com", "p ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_search_is_case_sensitive_substring() {
        let store = MemoryStore::new();
        create_doctor(&store, &admin(), doctor_req("d1@x.com")).await.unwrap();
        let mut other = doctor_req("d2@x.com");
        other.first_name = "Derek".into();
        other.last_name = "Shepherd".into();
        create_doctor(&store, &admin(), other).await.unwrap();

        assert_eq!(store.search_doctors_by_name("rey").await.unwrap().len(), 1);
        assert_eq!(store.search_doctors_by_name("Der").await.unwrap().len(), 1);
        assert!(store.search_doctors_by_name("grey").await.unwrap().is_empty());
        assert_eq!(store.list_doctors_by_specialty("Surgery").await.unwrap().len(), 2);
        assert!(store.list_doctors_by_specialty("surgery").await.unwrap().is_empty());

        let d = store.find_doctor_by_email("d1@x.com").await.unwrap().unwrap();
        assert_eq!(d.available_start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }
}
