use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};
use crate::models::{Booking, BookingStatus, Interval, SlotHold};

fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn fmt_time(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("bad stored date: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT).with_context(|| format!("bad stored time: {s}"))
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad stored timestamp: {s}"))
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, date, start_time, end_time, status, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, date, start_time, end_time, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking.id,
            fmt_date(&booking.date),
            fmt_time(&booking.start_time),
            fmt_time(&booking.end_time),
            booking.status.as_str(),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let row = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            booking_row,
        )
        .optional()?;

    row.map(parse_booking_row).transpose()
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    date: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let status = status.map(|s| s.as_str());
    let date = date.as_ref().map(fmt_date);

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR date = ?2)
         ORDER BY date DESC, start_time ASC LIMIT ?3"
    ))?;

    let rows = stmt.query_map(params![status, date, limit], booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(parse_booking_row(row?)?);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(&now), id],
    )?;
    Ok(count > 0)
}

pub fn overlapping_booking_exists(
    conn: &Connection,
    date: NaiveDate,
    interval: &Interval,
) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM bookings
            WHERE date = ?1 AND status != 'cancelled' AND start_time < ?3 AND ?2 < end_time
         )",
        params![fmt_date(&date), fmt_time(&interval.start), fmt_time(&interval.end)],
        |row| row.get(0),
    )?;
    Ok(exists)
}

type BookingRow = (String, String, String, String, String, String, String);

fn booking_row(row: &rusqlite::Row) -> rusqlite::Result<BookingRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn parse_booking_row(row: BookingRow) -> anyhow::Result<Booking> {
    let (id, date, start_time, end_time, status, created_at, updated_at) = row;
    let status = BookingStatus::parse(&status)
        .with_context(|| format!("unknown booking status {status:?} on {id}"))?;

    Ok(Booking {
        date: parse_date(&date)?,
        start_time: parse_time(&start_time)?,
        end_time: parse_time(&end_time)?,
        status,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        id,
    })
}

// ── Slot Holds ──

pub fn insert_hold(conn: &Connection, hold: &SlotHold) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO time_slot_locks (id, date, start_time, end_time, owner_token, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            hold.id,
            fmt_date(&hold.date),
            fmt_time(&hold.start_time),
            fmt_time(&hold.end_time),
            hold.owner_token,
            fmt_ts(&hold.created_at),
            fmt_ts(&hold.expires_at),
        ],
    )?;
    Ok(())
}

/// Returns the row whether or not it has expired; callers decide liveness.
pub fn get_hold(conn: &Connection, id: &str) -> anyhow::Result<Option<SlotHold>> {
    let row = conn
        .query_row(
            "SELECT id, date, start_time, end_time, owner_token, created_at, expires_at
             FROM time_slot_locks WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    row.map(
        |(id, date, start_time, end_time, owner_token, created_at, expires_at)| -> anyhow::Result<SlotHold> {
            Ok(SlotHold {
                id,
                date: parse_date(&date)?,
                start_time: parse_time(&start_time)?,
                end_time: parse_time(&end_time)?,
                owner_token,
                created_at: parse_ts(&created_at)?,
                expires_at: parse_ts(&expires_at)?,
            })
        },
    )
    .transpose()
}

pub fn delete_hold(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM time_slot_locks WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn update_hold_expiry(
    conn: &Connection,
    id: &str,
    expires_at: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slot_locks SET expires_at = ?1 WHERE id = ?2",
        params![fmt_ts(&expires_at), id],
    )?;
    Ok(count > 0)
}

pub fn overlapping_live_hold_exists(
    conn: &Connection,
    date: NaiveDate,
    interval: &Interval,
    now: NaiveDateTime,
    exclude_owner: Option<&str>,
) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM time_slot_locks
            WHERE date = ?1 AND expires_at > ?4 AND start_time < ?3 AND ?2 < end_time
              AND (?5 IS NULL OR owner_token != ?5)
         )",
        params![
            fmt_date(&date),
            fmt_time(&interval.start),
            fmt_time(&interval.end),
            fmt_ts(&now),
            exclude_owner,
        ],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn delete_holds_for_owner(conn: &Connection, owner_token: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM time_slot_locks WHERE owner_token = ?1",
        params![owner_token],
    )?;
    Ok(count)
}

/// Deletes holds whose `expires_at` is at or before `cutoff`.
pub fn delete_expired_holds(conn: &Connection, cutoff: NaiveDateTime) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM time_slot_locks WHERE expires_at <= ?1",
        params![fmt_ts(&cutoff)],
    )?;
    Ok(count)
}

// ── Occupancy ──

/// Intervals of non-cancelled bookings and live holds on `date`, ordered by start.
pub fn occupied_intervals(
    conn: &Connection,
    date: NaiveDate,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<Interval>> {
    let mut stmt = conn.prepare(
        "SELECT start_time, end_time FROM bookings WHERE date = ?1 AND status != 'cancelled'
         UNION ALL
         SELECT start_time, end_time FROM time_slot_locks WHERE date = ?1 AND expires_at > ?2
         ORDER BY start_time",
    )?;

    let rows = stmt.query_map(params![fmt_date(&date), fmt_ts(&now)], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut intervals = vec![];
    for row in rows {
        let (start, end) = row?;
        intervals.push(Interval::new(parse_time(&start)?, parse_time(&end)?));
    }
    Ok(intervals)
}

// ── Company Settings ──

pub fn get_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM company_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn put_setting(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO company_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}
