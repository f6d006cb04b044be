//! Authoritative record of what is taken: permanent bookings and short-lived holds.
//!
//! Every mutation runs inside a `BEGIN IMMEDIATE` transaction, which takes
//! SQLite's write lock before the first read. The overlap check and the insert
//! therefore cannot interleave with another writer, in this process or any other
//! process sharing the database file.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveDateTime, SubsecRound};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::Rejection;
use crate::models::{Booking, BookingStatus, Interval, Occupancy, SlotHold};

const MAX_BUSY_ATTEMPTS: u32 = 3;
const BUSY_BACKOFF: StdDuration = StdDuration::from_millis(50);

/// Outcome of a ledger operation: the outer error is infrastructure failure only.
pub type LedgerResult<T> = anyhow::Result<Result<T, Rejection>>;

#[derive(Debug, Clone)]
pub struct HoldRequest<'a> {
    pub date: NaiveDate,
    pub interval: Interval,
    pub owner_token: &'a str,
    pub lease: Duration,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    /// How long an expired hold row survives before sweeping deletes it.
    expired_hold_retention: Duration,
}

impl Ledger {
    pub fn new(expired_hold_retention: Duration) -> Self {
        Self {
            expired_hold_retention: expired_hold_retention.max(Duration::zero()),
        }
    }

    /// Places a hold on `req.interval`, or returns `Conflict` if any
    /// non-cancelled booking or live hold overlaps it.
    ///
    /// An owner holds at most one slot: a successful hold replaces any earlier
    /// hold by the same owner token.
    pub fn try_hold(
        &self,
        conn: &mut Connection,
        req: &HoldRequest<'_>,
        now: NaiveDateTime,
    ) -> LedgerResult<SlotHold> {
        if req.interval.start >= req.interval.end
            || req.lease <= Duration::zero()
            || req.owner_token.is_empty()
        {
            tracing::warn!(
                date = %req.date,
                start = %req.interval.start.format("%H:%M"),
                end = %req.interval.end.format("%H:%M"),
                "malformed hold request"
            );
            return Ok(Err(Rejection::Invalid));
        }

        let now = whole_seconds(now);
        let cutoff = now - self.expired_hold_retention;

        let outcome = write_txn(conn, "try_hold", |tx| {
            let evicted = queries::delete_expired_holds(tx, cutoff)?;
            if evicted > 0 {
                tracing::debug!(evicted, "evicted expired holds");
            }

            // The owner's own hold never blocks them; it is replaced below.
            if queries::overlapping_booking_exists(tx, req.date, &req.interval)?
                || queries::overlapping_live_hold_exists(
                    tx,
                    req.date,
                    &req.interval,
                    now,
                    Some(req.owner_token),
                )?
            {
                return Ok(Err(Rejection::Conflict));
            }

            let replaced = queries::delete_holds_for_owner(tx, req.owner_token)?;

            let hold = SlotHold {
                id: Uuid::new_v4().to_string(),
                date: req.date,
                start_time: req.interval.start,
                end_time: req.interval.end,
                owner_token: req.owner_token.to_string(),
                created_at: now,
                expires_at: now + req.lease,
            };
            queries::insert_hold(tx, &hold)?;

            if replaced > 0 {
                tracing::debug!(hold_id = %hold.id, replaced, "replaced earlier hold for owner");
            }
            Ok(Ok(hold))
        })?;

        match &outcome {
            Ok(hold) => tracing::info!(
                hold_id = %hold.id,
                date = %hold.date,
                start = %hold.start_time.format("%H:%M"),
                end = %hold.end_time.format("%H:%M"),
                expires_at = %hold.expires_at,
                "slot held"
            ),
            Err(_) => tracing::debug!(
                date = %req.date,
                start = %req.interval.start.format("%H:%M"),
                end = %req.interval.end.format("%H:%M"),
                "hold rejected, slot taken"
            ),
        }
        Ok(outcome)
    }

    /// Early release by the owning token. Releasing a lapsed hold is still `Ok`.
    pub fn release_hold(
        &self,
        conn: &mut Connection,
        hold_id: &str,
        owner_token: &str,
    ) -> LedgerResult<()> {
        let outcome = write_txn(conn, "release_hold", |tx| {
            let Some(hold) = queries::get_hold(tx, hold_id)? else {
                return Ok(Err(Rejection::NotFound));
            };
            if !hold.is_owned_by(owner_token) {
                return Ok(Err(Rejection::NotOwner));
            }
            queries::delete_hold(tx, hold_id)?;
            Ok(Ok(()))
        })?;

        match outcome {
            Ok(()) => tracing::info!(hold_id, "hold released"),
            Err(rejection) => log_stale(hold_id, "release_hold", rejection),
        }
        Ok(outcome)
    }

    /// Pushes a live hold's expiry to `now + lease`. Never shortens it.
    pub fn extend_hold(
        &self,
        conn: &mut Connection,
        hold_id: &str,
        owner_token: &str,
        lease: Duration,
        now: NaiveDateTime,
    ) -> LedgerResult<SlotHold> {
        if lease <= Duration::zero() {
            log_stale(hold_id, "extend_hold", Rejection::Invalid);
            return Ok(Err(Rejection::Invalid));
        }

        let now = whole_seconds(now);
        let outcome = write_txn(conn, "extend_hold", |tx| {
            let Some(mut hold) = queries::get_hold(tx, hold_id)? else {
                return Ok(Err(Rejection::NotFound));
            };
            if !hold.is_owned_by(owner_token) {
                return Ok(Err(Rejection::NotOwner));
            }
            if !hold.is_live(now) {
                return Ok(Err(Rejection::Expired));
            }
            hold.expires_at = hold.expires_at.max(now + lease);
            queries::update_hold_expiry(tx, hold_id, hold.expires_at)?;
            Ok(Ok(hold))
        })?;

        match &outcome {
            Ok(hold) => tracing::info!(hold_id, expires_at = %hold.expires_at, "hold extended"),
            Err(rejection) => log_stale(hold_id, "extend_hold", *rejection),
        }
        Ok(outcome)
    }

    /// Converts a live hold into a pending booking for the same interval.
    ///
    /// The hold delete and the booking insert commit together; a concurrent
    /// sweep sees either the hold or the booking, never neither.
    pub fn confirm(
        &self,
        conn: &mut Connection,
        hold_id: &str,
        owner_token: &str,
        now: NaiveDateTime,
    ) -> LedgerResult<Booking> {
        let now = whole_seconds(now);
        let outcome = write_txn(conn, "confirm", |tx| {
            let Some(hold) = queries::get_hold(tx, hold_id)? else {
                return Ok(Err(Rejection::NotFound));
            };
            if !hold.is_owned_by(owner_token) {
                return Ok(Err(Rejection::NotOwner));
            }
            if !hold.is_live(now) {
                return Ok(Err(Rejection::Expired));
            }

            // Another owner may have held the slot after this hold lapsed from
            // their point of view, while this confirm was waiting for the lock.
            let interval = Interval::new(hold.start_time, hold.end_time);
            if queries::overlapping_booking_exists(tx, hold.date, &interval)?
                || queries::overlapping_live_hold_exists(
                    tx,
                    hold.date,
                    &interval,
                    now,
                    Some(owner_token),
                )?
            {
                queries::delete_hold(tx, hold_id)?;
                return Ok(Err(Rejection::Conflict));
            }

            queries::delete_hold(tx, hold_id)?;
            let booking = Booking {
                id: Uuid::new_v4().to_string(),
                date: hold.date,
                start_time: hold.start_time,
                end_time: hold.end_time,
                status: BookingStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            queries::insert_booking(tx, &booking)?;
            Ok(Ok(booking))
        })?;

        match &outcome {
            Ok(booking) => tracing::info!(
                hold_id,
                booking_id = %booking.id,
                date = %booking.date,
                start = %booking.start_time.format("%H:%M"),
                "hold confirmed as booking"
            ),
            Err(Rejection::Conflict) => {
                tracing::debug!(hold_id, "confirm lost to a competing booking or hold")
            }
            Err(rejection) => log_stale(hold_id, "confirm", *rejection),
        }
        Ok(outcome)
    }

    /// Admin status change. Reviving a cancelled booking re-checks its
    /// interval, since the slot may have been taken in the meantime.
    pub fn set_booking_status(
        &self,
        conn: &mut Connection,
        booking_id: &str,
        status: BookingStatus,
        now: NaiveDateTime,
    ) -> LedgerResult<Booking> {
        let now = whole_seconds(now);
        let outcome = write_txn(conn, "set_booking_status", |tx| {
            let Some(mut booking) = queries::get_booking_by_id(tx, booking_id)? else {
                return Ok(Err(Rejection::NotFound));
            };

            if !booking.status.occupies() && status.occupies() {
                let interval = Interval::new(booking.start_time, booking.end_time);
                if queries::overlapping_booking_exists(tx, booking.date, &interval)?
                    || queries::overlapping_live_hold_exists(tx, booking.date, &interval, now, None)?
                {
                    return Ok(Err(Rejection::Conflict));
                }
            }

            queries::update_booking_status(tx, booking_id, status, now)?;
            booking.status = status;
            booking.updated_at = now;
            Ok(Ok(booking))
        })?;

        match &outcome {
            Ok(booking) => tracing::info!(
                booking_id,
                status = booking.status.as_str(),
                "booking status changed"
            ),
            Err(rejection) => tracing::info!(
                booking_id,
                code = rejection.code(),
                "booking status change rejected"
            ),
        }
        Ok(outcome)
    }

    /// True if `interval` overlaps a non-cancelled booking or a live hold on `date`.
    pub fn is_occupied(
        &self,
        conn: &Connection,
        date: NaiveDate,
        interval: &Interval,
        now: NaiveDateTime,
    ) -> anyhow::Result<bool> {
        Ok(self.occupancy(conn, date, now)?.overlaps(interval))
    }

    pub fn occupancy(
        &self,
        conn: &Connection,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> anyhow::Result<Occupancy> {
        Ok(Occupancy {
            intervals: queries::occupied_intervals(conn, date, whole_seconds(now))?,
        })
    }

    /// Deletes holds that expired more than the retention period ago.
    pub fn sweep(&self, conn: &mut Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
        let cutoff = whole_seconds(now) - self.expired_hold_retention;
        let removed = write_txn(conn, "sweep", |tx| queries::delete_expired_holds(tx, cutoff))?;
        if removed > 0 {
            tracing::debug!(removed, "swept expired holds");
        }
        Ok(removed)
    }
}

/// Timestamps are stored at whole-second precision; every decision and every
/// returned hold or booking uses the same precision as the stored row.
fn whole_seconds(now: NaiveDateTime) -> NaiveDateTime {
    now.trunc_subsecs(0)
}

fn log_stale(hold_id: &str, op: &'static str, rejection: Rejection) {
    match rejection {
        Rejection::Expired => tracing::info!(hold_id, op, "hold lease lapsed"),
        Rejection::NotOwner | Rejection::NotFound | Rejection::Invalid => tracing::warn!(
            hold_id,
            op,
            code = rejection.code(),
            "stale or foreign hold reference from client"
        ),
        Rejection::Conflict => tracing::debug!(hold_id, op, "slot taken"),
    }
}

/// Runs `f` in an IMMEDIATE transaction, committing whatever it returns `Ok`.
/// Retries a bounded number of times when the database stays busy past the busy timeout.
fn write_txn<T>(
    conn: &mut Connection,
    op: &'static str,
    f: impl Fn(&Transaction<'_>) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let mut attempt = 1;
    loop {
        match run_immediate(conn, &f) {
            Err(e) if is_busy(&e) && attempt < MAX_BUSY_ATTEMPTS => {
                tracing::debug!(op, attempt, "database busy, retrying");
                std::thread::sleep(BUSY_BACKOFF * attempt);
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn run_immediate<T>(
    conn: &mut Connection,
    f: &impl Fn(&Transaction<'_>) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

fn is_busy(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::DatabaseBusy || err.code == ErrorCode::DatabaseLocked
    )
}
