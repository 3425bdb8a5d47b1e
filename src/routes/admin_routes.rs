// src/routes/admin_routes.rs

use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

use crate::{
    db::{DoctorStore, PatientStore},
    error::ApiError,
    identity::{self, CreateDoctorRequest, DoctorPatch},
    middleware::{
        auth_context::AdminAuth,
        extract::{ApiJson, ApiPath},
    },
    models::{AppState, DoctorData, DoctorsData, LoginRequest, PatientsData, TokenData, ROLE_ADMIN},
    routes::{ok, ApiResult},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/doctors", post(create_doctor).get(list_doctors))
        .route("/doctors/{doctor_id}", put(update_doctor))
        .route("/patients", get(list_patients))
}

/* =========================
   POST /api/admin/login
   ========================= */

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<TokenData> {
    let email = req.email.trim();
    if !state.admin.verify(email, &req.password) {
        tracing::warn!(email, "admin login failed");
        return Err(ApiError::invalid_credentials());
    }

    let issued = state.tokens.issue(state.store.as_ref(), &state.admin.email, ROLE_ADMIN).await?;
    tracing::info!(email, "admin logged in");
    ok(
        "Login successful",
        TokenData {
            token: issued.token,
            expires_at: issued.expires_at,
        },
    )
}

/* =========================
   Doctors
   ========================= */

pub async fn create_doctor(
    State(state): State<AppState>,
    _admin: AdminAuth,
    ApiJson(req): ApiJson<CreateDoctorRequest>,
) -> ApiResult<DoctorData> {
    let doctor = identity::create_doctor(state.store.as_ref(), &state.admin, req).await?;
    tracing::info!(doctor_id = doctor.id, email = %doctor.email, "doctor created");
    ok("Doctor created successfully", DoctorData { doctor })
}

pub async fn list_doctors(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> ApiResult<DoctorsData> {
    let doctors = state.store.list_doctors().await?;
    ok("Doctors retrieved successfully", DoctorsData { doctors })
}

pub async fn update_doctor(
    State(state): State<AppState>,
    _admin: AdminAuth,
    ApiPath(doctor_id): ApiPath<i64>,
    ApiJson(patch): ApiJson<DoctorPatch>,
) -> ApiResult<DoctorData> {
    let doctor = identity::update_doctor(state.store.as_ref(), doctor_id, patch).await?;
    ok("Doctor updated successfully", DoctorData { doctor })
}

/* =========================
   Patients
   ========================= */

pub async fn list_patients(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> ApiResult<PatientsData> {
    let patients = state.store.list_patients().await?;
    ok("Patients retrieved successfully", PatientsData { patients })
}
