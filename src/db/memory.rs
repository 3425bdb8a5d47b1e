// src/db/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use super::{
    AppointmentStore, DoctorStore, PatientStore, PrescriptionStore, SessionStore, StoreError,
};
use crate::models::*;

#[derive(Debug)]
struct StoredSession {
    record: SessionRecord,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    doctors: BTreeMap<i64, Doctor>,
    patients: BTreeMap<i64, Patient>,
    appointments: BTreeMap<i64, Appointment>,
    prescriptions: BTreeMap<i64, Prescription>,
    // keyed by sha256(token)
    sessions: HashMap<String, StoredSession>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn slot_taken(&self, doctor_id: i64, at: NaiveDateTime, except: Option<i64>) -> bool {
        self.appointments.values().any(|a| {
            a.doctor_id == doctor_id && a.appointment_time == at && Some(a.id) != except
        })
    }
}

/// Process-local store. Every check-then-write runs under one lock, so the
/// (doctor, time) and email uniqueness rules hold under concurrent requests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sorted_appointments<'a>(it: impl Iterator<Item = &'a Appointment>) -> Vec<Appointment> {
    let mut out: Vec<Appointment> = it.cloned().collect();
    out.sort_by_key(|a| (a.appointment_time, a.id));
    out
}

fn sorted_prescriptions<'a>(it: impl Iterator<Item = &'a Prescription>) -> Vec<Prescription> {
    let mut out: Vec<Prescription> = it.cloned().collect();
    out.sort_by_key(|p| (p.prescription_date, p.id));
    out
}

#[async_trait]
impl DoctorStore for MemoryStore {
    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        let mut t = self.tables();
        if t.doctors.values().any(|d| d.email == new.email) {
            return Err(StoreError::DuplicateEmail("Doctor"));
        }
        let doctor = Doctor {
            id: t.next_id(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password: new.password,
            specialty: new.specialty,
            phone_number: new.phone_number,
            available_start_time: new.available_start_time,
            available_end_time: new.available_end_time,
            available_times: new.available_times,
        };
        t.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError> {
        let mut t = self.tables();
        if !t.doctors.contains_key(&doctor.id) {
            return Err(StoreError::NotFound("Doctor"));
        }
        if t.doctors.values().any(|d| d.id != doctor.id && d.email == doctor.email) {
            return Err(StoreError::DuplicateEmail("Doctor"));
        }
        t.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor.clone())
    }

    async fn find_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        Ok(self.tables().doctors.get(&id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        Ok(self.tables().doctors.values().find(|d| d.email == email).cloned())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        Ok(self.tables().doctors.values().cloned().collect())
    }

    async fn list_doctors_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>, StoreError> {
        Ok(self
            .tables()
            .doctors
            .values()
            .filter(|d| d.specialty == specialty)
            .cloned()
            .collect())
    }

    async fn search_doctors_by_name(&self, name: &str) -> Result<Vec<Doctor>, StoreError> {
        Ok(self
            .tables()
            .doctors
            .values()
            .filter(|d| d.first_name.contains(name) || d.last_name.contains(name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        let mut t = self.tables();
        if t.patients.values().any(|p| p.email == new.email) {
            return Err(StoreError::DuplicateEmail("Patient"));
        }
        let patient = Patient {
            id: t.next_id(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password: new.password,
            phone_number: new.phone_number,
            date_of_birth: new.date_of_birth,
            address: new.address,
        };
        t.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let mut t = self.tables();
        if !t.patients.contains_key(&patient.id) {
            return Err(StoreError::NotFound("Patient"));
        }
        if t.patients.values().any(|p| p.id != patient.id && p.email == patient.email) {
            return Err(StoreError::DuplicateEmail("Patient"));
        }
        t.patients.insert(patient.id, patient.clone());
        Ok(patient.clone())
    }

    async fn find_patient(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        Ok(self.tables().patients.get(&id).cloned())
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self.tables().patients.values().find(|p| p.email == email).cloned())
    }

    async fn find_patient_by_email_or_phone(
        &self,
        email_or_phone: &str,
    ) -> Result<Option<Patient>, StoreError> {
        let t = self.tables();
        let by_email = t.patients.values().find(|p| p.email == email_or_phone);
        Ok(by_email
            .or_else(|| t.patients.values().find(|p| p.phone_number == email_or_phone))
            .cloned())
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
        Ok(self.tables().patients.values().cloned().collect())
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn save_appointment(&self, draft: AppointmentDraft) -> Result<Appointment, StoreError> {
        let mut t = self.tables();
        if let Some(id) = draft.id {
            if !t.appointments.contains_key(&id) {
                return Err(StoreError::NotFound("Appointment"));
            }
        }
        if t.slot_taken(draft.doctor_id, draft.appointment_time, draft.id) {
            return Err(StoreError::SlotTaken);
        }
        let id = match draft.id {
            Some(id) => id,
            None => t.next_id(),
        };
        let appointment = Appointment {
            id,
            doctor_id: draft.doctor_id,
            patient_id: draft.patient_id,
            appointment_time: draft.appointment_time,
            status: draft.status,
            notes: draft.notes,
        };
        t.appointments.insert(id, appointment.clone());
        Ok(appointment)
    }

    async fn delete_appointment(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables().appointments.remove(&id).is_some())
    }

    async fn find_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables().appointments.get(&id).cloned())
    }

    async fn find_appointments_by_doctor_at(
        &self,
        doctor_id: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(
            t.appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id && a.appointment_time == at),
        ))
    }

    async fn list_appointments_by_doctor(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(
            t.appointments.values().filter(|a| a.doctor_id == doctor_id),
        ))
    }

    async fn list_appointments_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(
            t.appointments.values().filter(|a| a.patient_id == patient_id),
        ))
    }

    async fn list_appointments_by_doctor_on_date(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(t.appointments.values().filter(|a| {
            a.doctor_id == doctor_id && a.appointment_time.date() == date
        })))
    }

    async fn list_appointments_by_doctor_between(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(t.appointments.values().filter(|a| {
            a.doctor_id == doctor_id && a.appointment_time >= start && a.appointment_time <= end
        })))
    }

    async fn list_appointments_by_patient_from(
        &self,
        patient_id: i64,
        from: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables();
        Ok(sorted_appointments(t.appointments.values().filter(|a| {
            a.patient_id == patient_id && a.appointment_time >= from
        })))
    }
}

#[async_trait]
impl PrescriptionStore for MemoryStore {
    async fn save_prescription(
        &self,
        draft: PrescriptionDraft,
    ) -> Result<Prescription, StoreError> {
        let mut t = self.tables();
        let id = match draft.id {
            Some(id) if t.prescriptions.contains_key(&id) => id,
            Some(_) => return Err(StoreError::NotFound("Prescription")),
            None => t.next_id(),
        };
        let prescription = Prescription {
            id,
            doctor_id: draft.doctor_id,
            patient_id: draft.patient_id,
            medication_name: draft.medication_name,
            dosage: draft.dosage,
            instructions: draft.instructions,
            prescription_date: draft.prescription_date,
        };
        t.prescriptions.insert(id, prescription.clone());
        Ok(prescription)
    }

    async fn delete_prescription(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables().prescriptions.remove(&id).is_some())
    }

    async fn find_prescription(&self, id: i64) -> Result<Option<Prescription>, StoreError> {
        Ok(self.tables().prescriptions.get(&id).cloned())
    }

    async fn list_prescriptions_by_doctor(
        &self,
        doctor_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables();
        Ok(sorted_prescriptions(
            t.prescriptions.values().filter(|p| p.doctor_id == doctor_id),
        ))
    }

    async fn list_prescriptions_by_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables();
        Ok(sorted_prescriptions(
            t.prescriptions.values().filter(|p| p.patient_id == patient_id),
        ))
    }

    async fn list_prescriptions_by_doctor_and_patient(
        &self,
        doctor_id: i64,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables();
        Ok(sorted_prescriptions(t.prescriptions.values().filter(|p| {
            p.doctor_id == doctor_id && p.patient_id == patient_id
        })))
    }

    async fn list_prescriptions_by_patient_since(
        &self,
        patient_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables();
        Ok(sorted_prescriptions(t.prescriptions.values().filter(|p| {
            p.patient_id == patient_id && p.prescription_date >= since
        })))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: NewSession) -> Result<(), StoreError> {
        let record = SessionRecord {
            session_token_id: session.session_token_id,
            identity_email: session.identity_email,
            role: session.role,
            expires_at: session.expires_at,
        };
        let mut t = self.tables();
        // dead sessions can never validate again
        let now = Utc::now();
        t.sessions
            .retain(|_, s| s.revoked_at.is_none() && s.record.expires_at > now);
        t.sessions.insert(
            session.token_hash,
            StoredSession {
                record,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .tables()
            .sessions
            .get(token_hash)
            .filter(|s| s.revoked_at.is_none() && s.record.expires_at > now)
            .map(|s| s.record.clone()))
    }

    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables();
        let session = t
            .sessions
            .values_mut()
            .find(|s| s.record.session_token_id == session_token_id && s.revoked_at.is_none());
        match session {
            Some(s) => {
                s.revoked_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn new_patient(email: &str) -> NewPatient {
        NewPatient {
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: email.into(),
            password: "p".into(),
            phone_number: "555-0100".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            address: "1 Main St".into(),
        }
    }

    fn new_doctor(email: &str) -> NewDoctor {
        NewDoctor {
            first_name: "Greg".into(),
            last_name: "House".into(),
            email: email.into(),
            password: "secret".into(),
            specialty: "Diagnostics".into(),
            phone_number: "555-0199".into(),
            available_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            available_end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            available_times: vec![],
        }
    }

    fn draft(doctor_id: i64, patient_id: i64, when: NaiveDateTime) -> AppointmentDraft {
        AppointmentDraft {
            id: None,
            doctor_id,
            patient_id,
            appointment_time: when,
            status: "SCHEDULED".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_patient_email_leaves_store_unchanged() {
        let store = MemoryStore::new();
        store.create_patient(new_patient("a@x.com")).await.unwrap();

        let err = store.create_patient(new_patient("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail("Patient")));
        assert_eq!(store.list_patients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_email_allowed_across_doctor_and_patient() {
        let store = MemoryStore::new();
        store.create_patient(new_patient("both@x.com")).await.unwrap();
        assert!(store.create_doctor(new_doctor("both@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_slot_uniqueness_enforced_on_insert_and_update() {
        let store = MemoryStore::new();
        let first = store.save_appointment(draft(1, 2, at(9, 0))).await.unwrap();
        let other = store.save_appointment(draft(1, 3, at(10, 0))).await.unwrap();

        assert!(matches!(
            store.save_appointment(draft(1, 3, at(9, 0))).await,
            Err(StoreError::SlotTaken)
        ));

        // moving another appointment onto a taken slot is rejected too
        let mut moved = AppointmentDraft::from(other);
        moved.appointment_time = first.appointment_time;
        assert!(matches!(store.save_appointment(moved).await, Err(StoreError::SlotTaken)));

        // re-saving an appointment at its own slot is fine
        let mut same = AppointmentDraft::from(first.clone());
        same.status = "COMPLETED".into();
        assert_eq!(store.save_appointment(same).await.unwrap().status, "COMPLETED");

        // a different doctor may use the same instant
        assert!(store.save_appointment(draft(9, 2, at(9, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_with_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let mut d = draft(1, 2, at(9, 0));
        d.id = Some(404);
        assert!(matches!(
            store.save_appointment(d).await,
            Err(StoreError::NotFound("Appointment"))
        ));
    }

    #[tokio::test]
    async fn test_appointment_queries_by_date_and_range() {
        let store = MemoryStore::new();
        store.save_appointment(draft(1, 2, at(11, 0))).await.unwrap();
        store.save_appointment(draft(1, 2, at(9, 0))).await.unwrap();
        let next_day = at(9, 0) + chrono::Duration::days(1);
        store.save_appointment(draft(1, 2, next_day)).await.unwrap();

        let on_date = store
            .list_appointments_by_doctor_on_date(1, at(0, 0).date())
            .await
            .unwrap();
        assert_eq!(on_date.len(), 2);
        assert!(on_date[0].appointment_time < on_date[1].appointment_time);

        let between = store
            .list_appointments_by_doctor_between(1, at(9, 0), at(11, 0))
            .await
            .unwrap();
        assert_eq!(between.len(), 2, "range is inclusive on both ends");

        let upcoming = store
            .list_appointments_by_patient_from(2, at(10, 0))
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_appointment() {
        let store = MemoryStore::new();
        let a = store.save_appointment(draft(1, 2, at(9, 0))).await.unwrap();
        assert!(store.delete_appointment(a.id).await.unwrap());
        assert!(!store.delete_appointment(a.id).await.unwrap());
        assert!(store.find_appointment(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_or_phone_lookup_prefers_email() {
        let store = MemoryStore::new();
        let a = store.create_patient(new_patient("a@x.com")).await.unwrap();
        let mut b = new_patient("b@x.com");
        b.phone_number = "a@x.com".into();
        store.create_patient(b).await.unwrap();

        let found = store.find_patient_by_email_or_phone("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, a.id);
        let by_phone = store.find_patient_by_email_or_phone("555-0100").await.unwrap().unwrap();
        assert_eq!(by_phone.id, a.id);
    }

    #[tokio::test]
    async fn test_revoked_session_is_inactive() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert_session(NewSession {
                session_token_id: id,
                identity_email: "a@x.com".into(),
                role: ROLE_PATIENT,
                token_hash: "h".into(),
                expires_at: now + chrono::Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.find_active_session("h", now).await.unwrap().is_some());
        assert!(store.revoke_session(id).await.unwrap());
        assert!(store.find_active_session("h", now).await.unwrap().is_none());
        assert!(!store.revoke_session(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_prunes_expired_and_revoked_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let session = |hash: &str, expires_at| NewSession {
            session_token_id: Uuid::new_v4(),
            identity_email: "a@x.com".into(),
            role: ROLE_PATIENT,
            token_hash: hash.into(),
            expires_at,
        };

        store
            .insert_session(session("expired", now - chrono::Duration::hours(1)))
            .await
            .unwrap();
        let revoked = session("revoked", now + chrono::Duration::hours(1));
        let revoked_id = revoked.session_token_id;
        store.insert_session(revoked).await.unwrap();
        assert!(store.revoke_session(revoked_id).await.unwrap());

        store
            .insert_session(session("live", now + chrono::Duration::hours(1)))
            .await
            .unwrap();

        let t = store.tables();
        assert_eq!(t.sessions.len(), 1);
        assert!(t.sessions.contains_key("live"));
    }
}
