// src/routes/appointment_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    availability::{self, STATUS_SCHEDULED},
    db::{AppointmentStore, DoctorStore},
    error::ApiError,
    middleware::{
        auth_context::{DoctorAuth, Identity, PatientAuth},
        extract::{ApiJson, ApiPath, ApiQuery},
    },
    models::{
        parse_date, parse_datetime, Appointment, AppointmentData, AppointmentDraft,
        AppointmentsData, AppState, Empty,
    },
    routes::{ok, ApiResult},
};

const STATUS_COMPLETED: &str = "COMPLETED";
const STATUS_CANCELLED: &str = "CANCELLED";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor_id: i64,
    /// `YYYY-MM-DDTHH:MM[:SS]`
    pub appointment_time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(book))
        .route("/patient", get(patient_appointments))
        .route("/patient/upcoming", get(upcoming_patient_appointments))
        .route("/doctor", get(doctor_appointments))
        .route("/doctor/date/{date}", get(doctor_appointments_on_date))
        .route("/doctor/range", get(doctor_appointments_in_range))
        .route(
            "/{appointment_id}",
            get(get_appointment).put(update_appointment).delete(delete_appointment),
        )
}

fn validate_status(status: &str) -> Result<String, ApiError> {
    let s = status.trim().to_ascii_uppercase();
    match s.as_str() {
        STATUS_SCHEDULED | STATUS_COMPLETED | STATUS_CANCELLED => Ok(s),
        _ => Err(ApiError::validation(format!(
            "status must be one of {STATUS_SCHEDULED}, {STATUS_COMPLETED}, {STATUS_CANCELLED}"
        ))),
    }
}

async fn load_appointment(state: &AppState, appointment_id: i64) -> Result<Appointment, ApiError> {
    state
        .store
        .find_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))
}

/* =========================
   POST /api/appointments
   ========================= */

pub async fn book(
    State(state): State<AppState>,
    PatientAuth { patient, .. }: PatientAuth,
    ApiJson(req): ApiJson<BookAppointmentRequest>,
) -> ApiResult<AppointmentData> {
    let doctor = state
        .store
        .find_doctor(req.doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor not found"))?;
    let at = parse_datetime(&req.appointment_time).map_err(ApiError::validation)?;
    let notes = req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let appointment =
        availability::book_appointment(state.store.as_ref(), &patient, &doctor, at, notes).await?;
    ok("Appointment booked successfully", AppointmentData { appointment })
}

/* =========================
   Patient views
   ========================= */

pub async fn patient_appointments(
    State(state): State<AppState>,
    PatientAuth { patient, .. }: PatientAuth,
) -> ApiResult<AppointmentsData> {
    let appointments = state.store.list_appointments_by_patient(patient.id).await?;
    ok("Appointments retrieved successfully", AppointmentsData { appointments })
}

pub async fn upcoming_patient_appointments(
    State(state): State<AppState>,
    PatientAuth { patient, .. }: PatientAuth,
) -> ApiResult<AppointmentsData> {
    let now = chrono::Local::now().naive_local();
    let appointments = state
        .store
        .list_appointments_by_patient_from(patient.id, now)
        .await?;
    ok("Appointments retrieved successfully", AppointmentsData { appointments })
}

/* =========================
   Doctor views
   ========================= */

pub async fn doctor_appointments(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
) -> ApiResult<AppointmentsData> {
    let appointments = state.store.list_appointments_by_doctor(doctor.id).await?;
    ok("Appointments retrieved successfully", AppointmentsData { appointments })
}

pub async fn doctor_appointments_on_date(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
    ApiPath(date): ApiPath<String>,
) -> ApiResult<AppointmentsData> {
    let date = parse_date(&date).map_err(ApiError::validation)?;
    let appointments = state
        .store
        .list_appointments_by_doctor_on_date(doctor.id, date)
        .await?;
    ok("Appointments retrieved successfully", AppointmentsData { appointments })
}

pub async fn doctor_appointments_in_range(
    State(state): State<AppState>,
    DoctorAuth { doctor, .. }: DoctorAuth,
    ApiQuery(q): ApiQuery<RangeQuery>,
) -> ApiResult<AppointmentsData> {
    let start = parse_datetime(&q.start).map_err(ApiError::validation)?;
    let end = parse_datetime(&q.end).map_err(ApiError::validation)?;
    if end < start {
        return Err(ApiError::validation("end must not be before start"));
    }
    let appointments = state
        .store
        .list_appointments_by_doctor_between(doctor.id, start, end)
        .await?;
    ok("Appointments retrieved successfully", AppointmentsData { appointments })
}

/* =========================
   /api/appointments/{appointment_id}
   ========================= */

pub async fn get_appointment(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(appointment_id): ApiPath<i64>,
) -> ApiResult<AppointmentData> {
    let appointment = load_appointment(&state, appointment_id).await?;
    if !who.is_party_to(appointment.doctor_id, appointment.patient_id) {
        return Err(ApiError::forbidden("Not allowed to view this appointment"));
    }
    ok("Appointment retrieved successfully", AppointmentData { appointment })
}

pub async fn update_appointment(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(appointment_id): ApiPath<i64>,
    ApiJson(patch): ApiJson<AppointmentPatch>,
) -> ApiResult<AppointmentData> {
    let current = load_appointment(&state, appointment_id).await?;
    if !(who.is_admin() || who.doctor_id() == Some(current.doctor_id)) {
        return Err(ApiError::forbidden("Not allowed to update this appointment"));
    }

    let status = patch.status.as_deref().map(validate_status).transpose()?;
    let mut draft = AppointmentDraft::from(current);
    if let Some(status) = status {
        draft.status = status;
    }
    if let Some(notes) = patch.notes {
        let notes = notes.trim().to_string();
        draft.notes = (!notes.is_empty()).then_some(notes);
    }

    let appointment = state.store.save_appointment(draft).await?;
    tracing::info!(
        appointment_id,
        status = %appointment.status,
        by = who.role(),
        "appointment updated"
    );
    ok("Appointment updated successfully", AppointmentData { appointment })
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(appointment_id): ApiPath<i64>,
) -> ApiResult<Empty> {
    let appointment = load_appointment(&state, appointment_id).await?;
    if !who.is_party_to(appointment.doctor_id, appointment.patient_id) {
        return Err(ApiError::forbidden("Not allowed to cancel this appointment"));
    }
    if !state.store.delete_appointment(appointment_id).await? {
        return Err(ApiError::not_found("Appointment not found"));
    }
    tracing::info!(appointment_id, by = who.role(), "appointment deleted");
    ok("Appointment deleted successfully", Empty {})
}
