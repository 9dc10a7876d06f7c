// Entry <-> hash object codec

use crate::domain::{EntryId, EntryStatus, QueueEntry};
use crate::error::{AppError, Result};
use crate::port::Record;
use std::str::FromStr;

const ID: &str = "id";
const COURSE: &str = "cid";
const REQUESTER: &str = "uid";
const STATUS: &str = "status";
const HELPER: &str = "helper";
const JOINED_AT: &str = "joinedAt";
const UPDATED_AT: &str = "updatedAt";

/// Field the transition guards compare against
pub const STATUS_FIELD: &str = STATUS;

/// Helper sentinel for "unset"
const NO_HELPER: i64 = 0;

pub fn encode(entry: &QueueEntry) -> Record {
    let mut record = Record::new();
    record.insert(ID.to_string(), entry.id.to_string());
    record.insert(COURSE.to_string(), entry.course_id.to_string());
    record.insert(REQUESTER.to_string(), entry.requester_id.to_string());
    record.insert(STATUS.to_string(), entry.status.as_str().to_string());
    record.insert(
        HELPER.to_string(),
        entry.helper_id.unwrap_or(NO_HELPER).to_string(),
    );
    record.insert(JOINED_AT.to_string(), entry.joined_at.to_string());
    record.insert(UPDATED_AT.to_string(), entry.updated_at.to_string());
    record
}

pub fn decode(record: &Record) -> Result<QueueEntry> {
    let status_raw = field::<String>(record, STATUS)?;
    let status = EntryStatus::parse(&status_raw)
        .ok_or_else(|| AppError::Corrupt(format!("unknown entry status '{}'", status_raw)))?;
    let helper: i64 = field(record, HELPER)?;

    Ok(QueueEntry {
        id: field(record, ID)?,
        course_id: field(record, COURSE)?,
        requester_id: field(record, REQUESTER)?,
        status,
        helper_id: (helper != NO_HELPER).then_some(helper),
        joined_at: field(record, JOINED_AT)?,
        updated_at: field(record, UPDATED_AT)?,
    })
}

/// Parse a sorted-set member back into an entry id
pub fn parse_member(member: &str) -> Result<EntryId> {
    member
        .parse()
        .map_err(|_| AppError::Corrupt(format!("index member '{}' is not an entry id", member)))
}

fn field<T: FromStr>(record: &Record, name: &str) -> Result<T> {
    let raw = record
        .get(name)
        .ok_or_else(|| AppError::Corrupt(format!("entry record is missing '{}'", name)))?;
    raw.parse()
        .map_err(|_| AppError::Corrupt(format!("entry field '{}' has bad value '{}'", name, raw)))
}
