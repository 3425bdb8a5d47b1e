use crate::models::{ApiOk, AppState};
use axum::{Json, Router};

use crate::error::ApiError;

pub mod admin_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod patient_routes;
pub mod prescription_routes;

pub type ApiResult<T> = Result<Json<ApiOk<T>>, ApiError>;

pub fn ok<T>(message: &str, data: T) -> ApiResult<T> {
    Ok(Json(ApiOk::new(message, data)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/admin", admin_routes::router())
        .nest("/api/doctors", doctor_routes::router())
        .nest("/api/patients", patient_routes::router())
        .nest("/api/appointments", appointment_routes::router())
        .nest("/api/prescriptions", prescription_routes::router())
        .nest("/api/auth", auth_routes::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::extract::FromRequestParts;
    use axum::http::{Request, header};
    use chrono::{NaiveDate, NaiveTime};

    use crate::auth::{AdminCredential, TokenIssuer};
    use crate::config::{AdminPassword, DEFAULT_ADMIN_EMAIL};
    use crate::db::{DoctorStore, MemoryStore, PatientStore};
    use crate::middleware::auth_context::Identity;
    use crate::models::{AppState, Doctor, NewDoctor, NewPatient, Patient};

    pub fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
            tokens: TokenIssuer::new(24),
            admin: AdminCredential::new(DEFAULT_ADMIN_EMAIL, AdminPassword::Plain("admin123".into())),
        }
    }

    /// Resolves `token` the same way a request carrying it as a bearer header would.
    pub async fn identity_for_token(state: &AppState, token: &str) -> Identity {
        let (mut parts, _) = Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        Identity::from_request_parts(&mut parts, state).await.unwrap()
    }

    pub async fn identity_for(state: &AppState, email: &str, role: i16) -> Identity {
        let issued = state.tokens.issue(state.store.as_ref(), email, role).await.unwrap();
        identity_for_token(state, &issued.token).await
    }

    pub async fn seed_doctor(state: &AppState, email: &str) -> Doctor {
        state
            .store
            .create_doctor(NewDoctor {
                first_name: "Greg".into(),
                last_name: "House".into(),
                email: email.into(),
                password: "pw".into(),
                specialty: "Diagnostics".into(),
                phone_number: "555-0001".into(),
                available_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                available_end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                available_times: vec![],
            })
            .await
            .unwrap()
    }

    pub async fn seed_patient(state: &AppState, email: &str) -> Patient {
        state
            .store
            .create_patient(NewPatient {
                first_name: "Ana".into(),
                last_name: "Lee".into(),
                email: email.into(),
                password: "p".into(),
                phone_number: format!("555-{email}"),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                address: "1 Main St".into(),
            })
            .await
            .unwrap()
    }
}
