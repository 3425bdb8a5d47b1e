// src/availability.rs

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::db::{AppointmentStore, DoctorStore, StoreError};
use crate::models::{Appointment, AppointmentDraft, Doctor, Patient};

pub const SLOT_INTERVAL_MINUTES: i64 = 60;
pub const STATUS_SCHEDULED: &str = "SCHEDULED";

/// Candidate slots `start, start+1h, ...` strictly before `end`.
///
/// An inverted or empty window yields nothing. Generation stops at midnight
/// instead of wrapping around the clock.
pub fn hourly_slots(start: NaiveTime, end: NaiveTime) -> Vec<NaiveTime> {
    let step = Duration::minutes(SLOT_INTERVAL_MINUTES);
    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    slots
}

/// Slots for `doctor_id` on `date`. Unknown doctors get an empty list.
///
/// Existing bookings are not subtracted; only `book_appointment` checks them.
pub async fn compute_available_slots<S>(
    store: &S,
    doctor_id: i64,
    date: NaiveDate,
) -> Result<Vec<NaiveTime>, StoreError>
where
    S: DoctorStore + ?Sized,
{
    let Some(doctor) = store.find_doctor(doctor_id).await? else {
        tracing::debug!(doctor_id, %date, "availability requested for unknown doctor");
        return Ok(Vec::new());
    };
    Ok(hourly_slots(doctor.available_start_time, doctor.available_end_time))
}

/// Exact-instant match only; there is no duration or overlap window.
pub async fn has_conflict<S>(store: &S, doctor_id: i64, at: NaiveDateTime) -> Result<bool, StoreError>
where
    S: AppointmentStore + ?Sized,
{
    Ok(!store.find_appointments_by_doctor_at(doctor_id, at).await?.is_empty())
}

pub async fn book_appointment<S>(
    store: &S,
    patient: &Patient,
    doctor: &Doctor,
    at: NaiveDateTime,
    notes: Option<String>,
) -> Result<Appointment, StoreError>
where
    S: AppointmentStore + ?Sized,
{
    if has_conflict(store, doctor.id, at).await? {
        return Err(StoreError::SlotTaken);
    }

    // the store rejects a concurrent booking of the same slot with SlotTaken as well
    let appointment = store
        .save_appointment(AppointmentDraft {
            id: None,
            doctor_id: doctor.id,
            patient_id: patient.id,
            appointment_time: at,
            status: STATUS_SCHEDULED.to_string(),
            notes,
        })
        .await?;

    tracing::info!(
        appointment_id = appointment.id,
        doctor_id = doctor.id,
        patient_id = patient.id,
        at = %at,
        "appointment booked"
    );
    Ok(appointment)
}
