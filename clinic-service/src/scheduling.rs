use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Half-width of the protection window around an appointment. Two bookings
/// for the same doctor collide when the second lands inside the inclusive
/// ±29 minute interval around the first.
pub const CONFLICT_WINDOW_MINUTES: i64 = 29;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown appointment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(AppointmentStatus::Scheduled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "RESCHEDULED" => Ok(AppointmentStatus::Rescheduled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A doctor's existing booking, as much of it as the conflict check needs.
#[derive(Debug, Clone)]
pub struct BookedSlot {
    pub id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
}

/// Returns the id of an existing non-cancelled booking inside the protection
/// window around `desired`, skipping `exclude` (the appointment being
/// updated) so a record never collides with itself.
pub fn find_conflict(
    slots: &[BookedSlot],
    desired: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Option<Uuid> {
    let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
    slots
        .iter()
        .filter(|slot| slot.status != AppointmentStatus::Cancelled)
        .filter(|slot| Some(slot.id) != exclude)
        .find(|slot| {
            let delta = slot.appointment_time - desired;
            delta >= -window && delta <= window
        })
        .map(|slot| slot.id)
}

/// Fetches the doctor's non-cancelled bookings inside the protection window.
pub async fn booked_slots_around(
    db: &PgPool,
    doctor_id: Uuid,
    desired: DateTime<Utc>,
) -> Result<Vec<BookedSlot>, sqlx::Error> {
    let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
    let rows: Vec<(Uuid, DateTime<Utc>, String)> = sqlx::query_as(
        "SELECT id, appointment_time, status FROM appointments
         WHERE doctor_id = $1
           AND appointment_time BETWEEN $2 AND $3
           AND status <> 'CANCELLED'",
    )
    .bind(doctor_id)
    .bind(desired - window)
    .bind(desired + window)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, appointment_time, status)| BookedSlot {
            id,
            appointment_time,
            // Unparseable statuses cannot pass the SQL filter above, but a
            // row edited out-of-band should still count as booked.
            status: status.parse().unwrap_or(AppointmentStatus::Scheduled),
        })
        .collect())
}

/// Per-doctor serialization of the conflict-check-then-write sequence.
/// Without it two concurrent requests for the same doctor can both pass the
/// check before either persists, producing a double booking.
#[derive(Default)]
pub struct DoctorLocks {
    inner: StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl DoctorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().expect("lock poisoned");
            map.entry(doctor_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn slot(hour: u32, minute: u32, status: AppointmentStatus) -> BookedSlot {
        BookedSlot {
            id: Uuid::new_v4(),
            appointment_time: at(hour, minute),
            status,
        }
    }

    #[test]
    fn booking_twenty_minutes_apart_conflicts() {
        let slots = vec![slot(10, 0, AppointmentStatus::Scheduled)];
        assert!(find_conflict(&slots, at(10, 20), None).is_some());
    }

    #[test]
    fn window_edge_is_inclusive() {
        let slots = vec![slot(10, 0, AppointmentStatus::Scheduled)];
        assert!(find_conflict(&slots, at(10, 29), None).is_some());
        assert!(find_conflict(&slots, at(9, 31), None).is_some());
        assert!(find_conflict(&slots, at(10, 30), None).is_none());
        assert!(find_conflict(&slots, at(9, 30), None).is_none());
    }

    #[test]
    fn one_hour_apart_does_not_conflict() {
        let slots = vec![slot(10, 0, AppointmentStatus::Scheduled)];
        assert!(find_conflict(&slots, at(11, 0), None).is_none());
    }

    #[test]
    fn cancelled_booking_never_conflicts() {
        let slots = vec![slot(10, 0, AppointmentStatus::Cancelled)];
        assert!(find_conflict(&slots, at(10, 5), None).is_none());
    }

    #[test]
    fn completed_and_rescheduled_still_occupy_the_slot() {
        for status in [AppointmentStatus::Completed, AppointmentStatus::Rescheduled] {
            let slots = vec![slot(10, 0, status)];
            assert!(find_conflict(&slots, at(10, 10), None).is_some(), "{status:?}");
        }
    }

    #[test]
    fn update_never_conflicts_with_itself() {
        let existing = slot(10, 0, AppointmentStatus::Scheduled);
        let id = existing.id;
        let slots = vec![existing];
        // Re-saving at the unchanged time must not collide.
        assert!(find_conflict(&slots, at(10, 0), Some(id)).is_none());
        // A different appointment in the window still does.
        assert!(find_conflict(&slots, at(10, 0), Some(Uuid::new_v4())).is_some());
    }

    #[test]
    fn conflict_reports_the_colliding_booking() {
        let first = slot(10, 0, AppointmentStatus::Scheduled);
        let id = first.id;
        let slots = vec![slot(8, 0, AppointmentStatus::Scheduled), first];
        assert_eq!(find_conflict(&slots, at(10, 20), None), Some(id));
    }

    #[tokio::test]
    async fn doctor_locks_are_exclusive_per_doctor() {
        let locks = Arc::new(DoctorLocks::new());
        let doctor = Uuid::new_v4();
        let other = Uuid::new_v4();

        let guard = locks.acquire(doctor).await;
        // A different doctor's lock is independent.
        let _other_guard = locks.acquire(other).await;

        let contended = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(doctor).await })
        };
        // The spawned task cannot finish while the guard is held.
        tokio::task::yield_now().await;
        assert!(!contended.is_finished());

        drop(guard);
        contended.await.expect("task");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
        ] {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
        }
    }
}
