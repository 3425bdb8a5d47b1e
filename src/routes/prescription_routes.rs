// src/routes/prescription_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    db::{PatientStore, PrescriptionStore},
    error::ApiError,
    middleware::{
        auth_context::{DoctorAuth, Identity},
        extract::{ApiJson, ApiPath, ApiQuery},
    },
    models::{
        parse_datetime, AppState, Empty, Prescription, PrescriptionData, PrescriptionDraft,
        PrescriptionsData,
    },
    routes::{ok, ApiResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrescriptionRequest {
    pub patient_id: i64,
    pub medication_name: String,
    pub dosage: String,
    #[serde(default)]
    pub instructions: String,
    /// Defaults to now.
    #[serde(default)]
    pub prescription_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionPatch {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    pub since: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_prescription))
        .route("/patient/{patient_id}", get(patient_prescriptions))
        .route("/patient/{patient_id}/recent", get(recent_patient_prescriptions))
        .route("/doctor", get(doctor_prescriptions))
        .route("/doctor/patient/{patient_id}", get(doctor_prescriptions_for_patient))
        .route(
            "/{prescription_id}",
            get(get_prescription)
                .put(update_prescription)
                .delete(delete_prescription),
        )
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

fn ensure_can_read(who: &Identity, patient_id: i64) -> Result<(), ApiError> {
    if who.can_read_patient(patient_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Patients may only access their own prescriptions"))
    }
}

async fn ensure_patient_exists(state: &AppState, patient_id: i64) -> Result<(), ApiError> {
    state
        .store
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    Ok(())
}

async fn load_prescription(state: &AppState, prescription_id: i64) -> Result<Prescription, ApiError> {
    state
        .store
        .find_prescription(prescription_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription not found"))
}

/* =========================
   POST /api/prescriptions
   ========================= */

pub async fn create_prescription(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
    ApiJson(req): ApiJson<CreatePrescriptionRequest>,
) -> ApiResult<PrescriptionData> {
    let medication_name = required("medicationName", &req.medication_name)?;
    let dosage = required("dosage", &req.dosage)?;
    let prescription_date = match req.prescription_date.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => parse_datetime(s).map_err(ApiError::validation)?,
        _ => chrono::Local::now().naive_local(),
    };

    let patient = state
        .store
        .find_patient(req.patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let prescription = state
        .store
        .save_prescription(PrescriptionDraft {
            id: None,
            doctor_id: doctor.id,
            patient_id: patient.id,
            medication_name,
            dosage,
            instructions: req.instructions.trim().to_string(),
            prescription_date,
        })
        .await?;

    tracing::info!(
        prescription_id = prescription.id,
        doctor_id = doctor.id,
        patient_id = patient.id,
        "prescription created"
    );
    ok("Prescription created successfully", PrescriptionData { prescription })
}

/* =========================
   Patient views
   ========================= */

pub async fn patient_prescriptions(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(patient_id): ApiPath<i64>,
) -> ApiResult<PrescriptionsData> {
    ensure_can_read(&who, patient_id)?;
    ensure_patient_exists(&state, patient_id).await?;
    let prescriptions = state.store.list_prescriptions_by_patient(patient_id).await?;
    ok("Prescriptions retrieved successfully", PrescriptionsData { prescriptions })
}

pub async fn recent_patient_prescriptions(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(patient_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<SinceQuery>,
) -> ApiResult<PrescriptionsData> {
    ensure_can_read(&who, patient_id)?;
    let since = parse_datetime(&q.since).map_err(ApiError::validation)?;
    ensure_patient_exists(&state, patient_id).await?;
    let prescriptions = state
        .store
        .list_prescriptions_by_patient_since(patient_id, since)
        .await?;
    ok("Prescriptions retrieved successfully", PrescriptionsData { prescriptions })
}

/* =========================
   Doctor views
   ========================= */

pub async fn doctor_prescriptions(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
) -> ApiResult<PrescriptionsData> {
    let prescriptions = state.store.list_prescriptions_by_doctor(doctor.id).await?;
    ok("Prescriptions retrieved successfully", PrescriptionsData { prescriptions })
}

pub async fn doctor_prescriptions_for_patient(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
    ApiPath(patient_id): ApiPath<i64>,
) -> ApiResult<PrescriptionsData> {
    ensure_patient_exists(&state, patient_id).await?;
    let prescriptions = state
        .store
        .list_prescriptions_by_doctor_and_patient(doctor.id, patient_id)
        .await?;
    ok("Prescriptions retrieved successfully", PrescriptionsData { prescriptions })
}

/* =========================
   /api/prescriptions/{prescription_id}
   ========================= */

pub async fn get_prescription(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(prescription_id): ApiPath<i64>,
) -> ApiResult<PrescriptionData> {
    let prescription = load_prescription(&state, prescription_id).await?;
    if !who.is_party_to(prescription.doctor_id, prescription.patient_id) {
        return Err(ApiError::forbidden("Not allowed to view this prescription"));
    }
    ok("Prescription retrieved successfully", PrescriptionData { prescription })
}

pub async fn update_prescription(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
    ApiPath(prescription_id): ApiPath<i64>,
    ApiJson(patch): ApiJson<PrescriptionPatch>,
) -> ApiResult<PrescriptionData> {
    let current = load_prescription(&state, prescription_id).await?;
    if current.doctor_id != doctor.id {
        return Err(ApiError::forbidden("Only the prescribing doctor can update this prescription"));
    }

    let mut draft = PrescriptionDraft::from(current);
    if let Some(name) = patch.medication_name {
        draft.medication_name = required("medicationName", &name)?;
    }
    if let Some(dosage) = patch.dosage {
        draft.dosage = required("dosage", &dosage)?;
    }
    if let Some(instructions) = patch.instructions {
        draft.instructions = instructions.trim().to_string();
    }

    let prescription = state.store.save_prescription(draft).await?;
    ok("Prescription updated successfully", PrescriptionData { prescription })
}

pub async fn delete_prescription(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(prescription_id): ApiPath<i64>,
) -> ApiResult<Empty> {
    let prescription = load_prescription(&state, prescription_id).await?;
    if !(who.is_admin() || who.doctor_id() == Some(prescription.doctor_id)) {
        return Err(ApiError::forbidden("Not allowed to delete this prescription"));
    }
    if !state.store.delete_prescription(prescription_id).await? {
        return Err(ApiError::not_found("Prescription not found"));
    }
    tracing::info!(prescription_id, by = who.role(), "prescription deleted");
    ok("Prescription deleted successfully", Empty {})
}
