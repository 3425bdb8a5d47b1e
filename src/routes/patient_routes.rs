// src/routes/patient_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    db::PatientStore,
    error::ApiError,
    identity::{self, PatientPatch, RegisterPatientRequest},
    middleware::{
        auth_context::Identity,
        extract::{ApiJson, ApiPath, ApiQuery},
    },
    models::{AppState, LoginRequest, PatientData, PatientLoginData, PatientsData, ROLE_PATIENT},
    routes::{ok, ApiResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQuery {
    pub email_or_phone: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/lookup", get(lookup_patient))
        .route("/{patient_id}", get(get_patient).put(update_patient))
}

fn ensure_can_read(who: &Identity, patient_id: i64) -> Result<(), ApiError> {
    if who.can_read_patient(patient_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Patients may only access their own record"))
    }
}

/* =========================
   Registration / login
   ========================= */

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterPatientRequest>,
) -> ApiResult<PatientData> {
    let patient = identity::register_patient(state.store.as_ref(), &state.admin, req).await?;
    tracing::info!(patient_id = patient.id, "patient registered");
    ok("Patient registered successfully", PatientData { patient })
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<PatientLoginData> {
    let Some(patient) =
        identity::validate_patient_login(state.store.as_ref(), &req.email, &req.password).await?
    else {
        tracing::warn!(email = %req.email.trim(), "patient login failed");
        return Err(ApiError::invalid_credentials());
    };

    let issued = state.tokens.issue(state.store.as_ref(), &patient.email, ROLE_PATIENT).await?;
    tracing::info!(patient_id = patient.id, "patient logged in");
    ok(
        "Login successful",
        PatientLoginData {
            token: issued.token,
            expires_at: issued.expires_at,
            patient,
        },
    )
}

/* =========================
   Reads
   ========================= */

pub async fn list_patients(State(state): State<AppState>, who: Identity) -> ApiResult<PatientsData> {
    if who.is_patient() {
        return Err(ApiError::forbidden("Only staff can list patients"));
    }
    let patients = state.store.list_patients().await?;
    ok("Patients retrieved successfully", PatientsData { patients })
}

pub async fn lookup_patient(
    State(state): State<AppState>,
    who: Identity,
    ApiQuery(q): ApiQuery<LookupQuery>,
) -> ApiResult<PatientData> {
    if matches!(who, Identity::Patient(..)) {
        return Err(ApiError::forbidden("Only staff can look up patients"));
    }
    let key = q.email_or_phone.trim();
    if key.is_empty() {
        return Err(ApiError::validation("emailOrPhone is required"));
    }

    let patient = state
        .store
        .find_patient_by_email_or_phone(key)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    ok("Patient retrieved successfully", PatientData { patient })
}

pub async fn get_patient(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(patient_id): ApiPath<i64>,
) -> ApiResult<PatientData> {
    ensure_can_read(&who, patient_id)?;
    let patient = state
        .store
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    ok("Patient retrieved successfully", PatientData { patient })
}

/* =========================
   PUT /api/patients/{patient_id}
   ========================= */

pub async fn update_patient(
    State(state): State<AppState>,
    who: Identity,
    ApiPath(patient_id): ApiPath<i64>,
    ApiJson(patch): ApiJson<PatientPatch>,
) -> ApiResult<PatientData> {
    // doctors read patients but do not edit them
    if !(who.is_admin() || who.patient_id() == Some(patient_id)) {
        return Err(ApiError::forbidden("Not allowed to update this patient"));
    }
    let patient = identity::update_patient(state.store.as_ref(), patient_id, patch).await?;
    ok("Patient updated successfully", PatientData { patient })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth_context::AdminAuth;
    use crate::models::ROLE_DOCTOR;
    use crate::routes::test_support;
    use axum::Json;

    fn registration(email: &str) -> RegisterPatientRequest {
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

    #[tokio::test]
    async fn test_register_login_then_fetch_own_record() {
        let state = test_support::state();

        let Json(registered) = register(State(state.clone()), ApiJson(registration("a@x.com")))
            .await
            .unwrap();
        assert!(registered.success);
        let id = registered.data.patient.id;

        let Json(logged_in) = login(
            State(state.clone()),
            ApiJson(LoginRequest {
                email: "a@x.com".into(),
                password: "p".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(logged_in.message, "Login successful");
        assert!(!logged_in.data.token.is_empty());

        let who = test_support::identity_for_token(&state, &logged_in.data.token).await;
        let Json(fetched) = get_patient(State(state.clone()), who, ApiPath(id)).await.unwrap();

        let patient = fetched.data.patient;
        assert_eq!(patient.id, id);
        assert_eq!(patient.email, "a@x.com");
        assert_eq!(patient.first_name, "Ana");
        assert_eq!(patient.last_name, "Lee");
        assert_eq!(patient, registered.data.patient);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let state = test_support::state();
        register(State(state.clone()), ApiJson(registration("a@x.com")))
            .await
            .unwrap();

        let err = register(State(state.clone()), ApiJson(registration("a@x.com")))
            .await
            .unwrap_err();
        match err {
            ApiError::BadRequest(_, msg) => assert_eq!(msg, "Patient with this email already exists"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(state.store.list_patients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let state = test_support::state();
        register(State(state.clone()), ApiJson(registration("a@x.com")))
            .await
            .unwrap();

        for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "p")] {
            let err = login(
                State(state.clone()),
                ApiJson(LoginRequest {
                    email: email.into(),
                    password: password.into(),
                }),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized("INVALID_CREDENTIALS", _)));
        }
    }

    #[tokio::test]
    async fn test_patient_cannot_read_or_update_another_patient() {
        let state = test_support::state();
        let ana = test_support::seed_patient(&state, "a@x.com").await;
        let bob = test_support::seed_patient(&state, "b@x.com").await;
        let as_ana = test_support::identity_for(&state, "a@x.com", ROLE_PATIENT).await;

        let err = get_patient(State(state.clone()), as_ana.clone(), ApiPath(bob.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(..)));

        let err = update_patient(
            State(state.clone()),
            as_ana.clone(),
            ApiPath(bob.id),
            ApiJson(PatientPatch::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(..)));

        let patch = PatientPatch {
            address: Some("2 Side St".into()),
            ..Default::default()
        };
        let Json(updated) = update_patient(State(state.clone()), as_ana, ApiPath(ana.id), ApiJson(patch))
            .await
            .unwrap();
        assert_eq!(updated.data.patient.address, "2 Side St");
        assert_eq!(updated.data.patient.phone_number, ana.phone_number);
    }

    #[tokio::test]
    async fn test_lookup_by_email_or_phone_is_staff_only() {
        let state = test_support::state();
        let ana = test_support::seed_patient(&state, "a@x.com").await;
        test_support::seed_doctor(&state, "house@x.com").await;
        let as_doctor = test_support::identity_for(&state, "house@x.com", ROLE_DOCTOR).await;
        let as_ana = test_support::identity_for(&state, "a@x.com", ROLE_PATIENT).await;

        let Json(by_phone) = lookup_patient(
            State(state.clone()),
            as_doctor.clone(),
            ApiQuery(LookupQuery {
                email_or_phone: ana.phone_number.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_phone.data.patient.id, ana.id);

        let Json(by_email) = lookup_patient(
            State(state.clone()),
            as_doctor,
            ApiQuery(LookupQuery {
                email_or_phone: "a@x.com".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_email.data.patient.id, ana.id);

        let err = lookup_patient(
            State(state),
            as_ana,
            ApiQuery(LookupQuery {
                email_or_phone: "a@x.com".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(..)));
    }

    #[tokio::test]
    async fn test_patient_list_is_staff_only() {
        let state = test_support::state();
        let ana = test_support::seed_patient(&state, "a@x.com").await;
        test_support::seed_patient(&state, "b@x.com").await;
        test_support::seed_doctor(&state, "house@x.com").await;
        let as_ana = test_support::identity_for(&state, "a@x.com", ROLE_PATIENT).await;
        let as_doctor = test_support::identity_for(&state, "house@x.com", ROLE_DOCTOR).await;

        let err = list_patients(State(state.clone()), as_ana).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(..)));

        let Json(listed) = list_patients(State(state), as_doctor).await.unwrap();
        assert_eq!(listed.data.patients.len(), 2);
        assert!(listed.data.patients.iter().any(|p| p.id == ana.id));
    }

    #[tokio::test]
    async fn test_admin_email_cannot_be_registered_as_patient() {
        let state = test_support::state();
        let admin_email = state.admin.email.clone();

        let err = register(State(state.clone()), ApiJson(registration(&admin_email)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(..)));
        assert!(state.store.list_patients().await.unwrap().is_empty());

        // a patient token never carries admin rights, even for the admin address
        let bearer = state
            .tokens
            .issue(state.store.as_ref(), &admin_email, ROLE_PATIENT)
            .await
            .unwrap()
            .token;
        let (mut parts, _) = axum::http::Request::builder()
            .header("authorization", format!("Bearer {bearer}"))
            .body(())
            .unwrap()
            .into_parts();
        let rejected =
            <AdminAuth as axum::extract::FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
                .await;
        assert!(rejected.is_err());
    }
}
