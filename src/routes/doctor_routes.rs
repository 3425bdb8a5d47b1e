// src/routes/doctor_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    availability,
    db::DoctorStore,
    error::ApiError,
    identity,
    middleware::{
        auth_context::Identity,
        extract::{ApiJson, ApiPath, ApiQuery},
    },
    models::{parse_date, AppState, DoctorData, DoctorLoginData, DoctorsData, LoginRequest, ROLE_DOCTOR},
    routes::{ok, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityData {
    pub doctor_id: i64,
    pub date: NaiveDate,
    /// `HH:MM:SS`
    pub available_slots: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors))
        .route("/login", post(login))
        .route("/specialty/{specialty}", get(doctors_by_specialty))
        .route("/search", get(search_doctors))
        .route("/{doctor_id}", get(get_doctor))
        .route("/{doctor_id}/availability", get(get_availability))
}

/* =========================
   POST /api/doctors/login
   ========================= */

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<DoctorLoginData> {
    let Some(doctor) =
        identity::validate_doctor_login(state.store.as_ref(), &req.email, &req.password).await?
    else {
        tracing::warn!(email = %req.email.trim(), "doctor login failed");
        return Err(ApiError::invalid_credentials());
    };

    let issued = state.tokens.issue(state.store.as_ref(), &doctor.email, ROLE_DOCTOR).await?;
    tracing::info!(doctor_id = doctor.id, "doctor logged in");
    ok(
        "Login successful",
        DoctorLoginData {
            token: issued.token,
            expires_at: issued.expires_at,
            doctor,
        },
    )
}

/* =========================
   Directory
   ========================= */

pub async fn list_doctors(State(state): State<AppState>, _who: Identity) -> ApiResult<DoctorsData> {
    let doctors = state.store.list_doctors().await?;
    ok("Doctors retrieved successfully", DoctorsData { doctors })
}

pub async fn doctors_by_specialty(
    State(state): State<AppState>,
    _who: Identity,
    ApiPath(specialty): ApiPath<String>,
) -> ApiResult<DoctorsData> {
    let doctors = state.store.list_doctors_by_specialty(&specialty).await?;
    ok("Doctors retrieved successfully", DoctorsData { doctors })
}

pub async fn search_doctors(
    State(state): State<AppState>,
    _who: Identity,
    ApiQuery(q): ApiQuery<NameQuery>,
) -> ApiResult<DoctorsData> {
    let name = q.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let doctors = state.store.search_doctors_by_name(name).await?;
    ok("Doctors retrieved successfully", DoctorsData { doctors })
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _who: Identity,
    ApiPath(doctor_id): ApiPath<i64>,
) -> ApiResult<DoctorData> {
    let doctor = state
        .store
        .find_doctor(doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor not found"))?;
    ok("Doctor retrieved successfully", DoctorData { doctor })
}

/* =========================
   GET /api/doctors/{doctor_id}/availability?date=YYYY-MM-DD
   ========================= */

pub async fn get_availability(
    State(state): State<AppState>,
    _who: Identity,
    ApiPath(doctor_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> ApiResult<AvailabilityData> {
    let date = parse_date(&q.date).map_err(ApiError::validation)?;
    let slots = availability::compute_available_slots(state.store.as_ref(), doctor_id, date).await?;

    ok(
        "Available slots retrieved successfully",
        AvailabilityData {
            doctor_id,
            date,
            available_slots: slots.iter().map(|t| t.format("%H:%M:%S").to_string()).collect(),
        },
    )
}
