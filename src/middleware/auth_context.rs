use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::db::{DoctorStore, PatientStore};
use crate::error::ApiError;
use crate::models::{AppState, Doctor, Patient, ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT};

/// A request carrying a live bearer token.
///
/// `role` comes from the session row, i.e. from the login endpoint that issued
/// the token. The email alone never grants a role.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub email: String,
    pub role: i16,
    pub session_token_id: Uuid,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::missing_token())?;

            let session = state
                .tokens
                .validate(state.store.as_ref(), authz.token())
                .await?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext {
                email: session.identity_email,
                role: session.role,
                session_token_id: session.session_token_id,
            })
        }
    }
}

/// Admin session for the configured admin email.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AuthContext);

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let auth = AuthContext::from_request_parts(parts, state).await?;
            if auth.role != ROLE_ADMIN || !state.admin.is_admin(&auth.email) {
                return Err(ApiError::Unauthorized(
                    "ADMIN_REQUIRED",
                    "Invalid or expired admin token".into(),
                ));
            }
            Ok(AdminAuth(auth))
        }
    }
}

/// Doctor session whose email resolves to a stored doctor.
#[derive(Debug, Clone)]
pub struct DoctorAuth {
    pub auth: AuthContext,
    pub doctor: Doctor,
}

impl FromRequestParts<AppState> for DoctorAuth {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let auth = AuthContext::from_request_parts(parts, state).await?;
            if auth.role != ROLE_DOCTOR {
                return Err(ApiError::Forbidden(
                    "DOCTOR_REQUIRED",
                    "Doctor access required".into(),
                ));
            }
            let doctor = state
                .store
                .find_doctor_by_email(&auth.email)
                .await?
                .ok_or_else(|| ApiError::not_found("Doctor not found"))?;
            Ok(DoctorAuth { auth, doctor })
        }
    }
}

/// Patient session whose email resolves to a stored patient.
#[derive(Debug, Clone)]
pub struct PatientAuth {
    pub auth: AuthContext,
    pub patient: Patient,
}

impl FromRequestParts<AppState> for PatientAuth {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let auth = AuthContext::from_request_parts(parts, state).await?;
            if auth.role != ROLE_PATIENT {
                return Err(ApiError::Forbidden(
                    "PATIENT_REQUIRED",
                    "Patient access required".into(),
                ));
            }
            let patient = state
                .store
                .find_patient_by_email(&auth.email)
                .await?
                .ok_or_else(|| ApiError::not_found("Patient not found"))?;
            Ok(PatientAuth { auth, patient })
        }
    }
}

/// Whoever is behind the token, as decided by the session role.
#[derive(Debug, Clone)]
pub enum Identity {
    Admin(AuthContext),
    Doctor(AuthContext, Doctor),
    Patient(AuthContext, Patient),
}

impl Identity {
    pub fn auth(&self) -> &AuthContext {
        match self {
            Identity::Admin(a) | Identity::Doctor(a, _) | Identity::Patient(a, _) => a,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Identity::Admin(_) => "admin",
            Identity::Doctor(..) => "doctor",
            Identity::Patient(..) => "patient",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }

    pub fn is_patient(&self) -> bool {
        matches!(self, Identity::Patient(..))
    }

    pub fn doctor_id(&self) -> Option<i64> {
        match self {
            Identity::Doctor(_, d) => Some(d.id),
            _ => None,
        }
    }

    pub fn patient_id(&self) -> Option<i64> {
        match self {
            Identity::Patient(_, p) => Some(p.id),
            _ => None,
        }
    }

    /// Admins and doctors may read any patient; patients only themselves.
    pub fn can_read_patient(&self, patient_id: i64) -> bool {
        match self {
            Identity::Admin(_) | Identity::Doctor(..) => true,
            Identity::Patient(_, p) => p.id == patient_id,
        }
    }

    /// Admin, or the doctor or patient named on the record.
    pub fn is_party_to(&self, doctor_id: i64, patient_id: i64) -> bool {
        self.is_admin()
            || self.doctor_id() == Some(doctor_id)
            || self.patient_id() == Some(patient_id)
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let auth = AuthContext::from_request_parts(parts, state).await?;
            let role = auth.role;
            let identity = match role {
                ROLE_ADMIN if state.admin.is_admin(&auth.email) => Some(Identity::Admin(auth)),
                ROLE_DOCTOR => state
                    .store
                    .find_doctor_by_email(&auth.email)
                    .await?
                    .map(|doctor| Identity::Doctor(auth, doctor)),
                ROLE_PATIENT => state
                    .store
                    .find_patient_by_email(&auth.email)
                    .await?
                    .map(|patient| Identity::Patient(auth, patient)),
                _ => None,
            };
            identity.ok_or_else(|| ApiError::not_found("Identity not found"))
        }
    }
}
