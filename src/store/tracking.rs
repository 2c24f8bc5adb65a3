//! TrackingStore — the campaign's record of sent emails and their replies.
//!
//! Single source of truth for "what have we sent" and "what needs human
//! attention". Two tables, both owned exclusively by this store: sent
//! emails are append-only, replies are append-only except for the
//! `processed` flag flip.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use super::db::Database;
use crate::error::StoreError;

/// One outbound campaign message, recorded after a successful send.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Store-assigned row id, present after persist.
    pub id: Option<i64>,
    /// Provider conversation id. Assumed 1:1 with sent rows, not enforced.
    pub thread_id: String,
    /// Provider message id, globally unique. The dedup key.
    pub message_id: String,
    pub prospect_email: String,
    pub prospect_name: String,
    pub company: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// Label applied at send time.
    pub label: String,
}

/// One inbound reply matched to a sent email.
#[derive(Debug, Clone)]
pub struct EmailReply {
    pub id: Option<i64>,
    /// Owning sent email. Many replies may reference the same row.
    pub sent_email_id: i64,
    /// Provider message id, unique. Duplicate inserts are silent no-ops.
    pub message_id: String,
    pub from_email: String,
    /// Extracted, de-quoted reply text.
    pub reply_content: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

/// A reply row joined with its owning sent email, for display.
#[derive(Debug, Clone)]
pub struct NewReply {
    pub id: i64,
    pub message_id: String,
    pub from_email: String,
    pub reply_content: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub company: String,
    pub prospect_name: String,
    pub subject: String,
}

/// Campaign-level counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CampaignStats {
    pub total_sent: i64,
    pub total_replies: i64,
    pub new_replies: i64,
    /// Replies per hundred sent, rounded to two decimals. 0 when nothing
    /// has been sent yet.
    pub response_rate: f64,
}

/// Persistent campaign tracking backed by SQLite.
pub struct TrackingStore {
    db: Arc<Database>,
}

impl TrackingStore {
    /// Create a new TrackingStore wrapping the given database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a sent-email record. Returns the new row id.
    ///
    /// A `message_id` collision is a hard failure: the provider assigns
    /// globally unique ids, so a duplicate means the same send was recorded
    /// twice and must surface rather than be swallowed.
    pub fn save_sent_email(&self, email: &SentEmail) -> Result<i64, StoreError> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO sent_emails (thread_id, message_id, prospect_email, prospect_name,
                company, subject, body, sent_at, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                email.thread_id,
                email.message_id,
                email.prospect_email,
                email.prospect_name,
                email.company,
                email.subject,
                email.body,
                email.sent_at.to_rfc3339(),
                email.label,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::DuplicateSentMessage {
                    message_id: email.message_id.clone(),
                }
            }
            other => StoreError::Sqlite(other),
        })?;
        let id = conn.last_insert_rowid();
        debug!(id, message_id = %email.message_id, "Sent email recorded");
        Ok(id)
    }

    /// Sent emails, newest first. `None` returns every row.
    pub fn get_sent_emails(&self, limit: Option<usize>) -> Result<Vec<SentEmail>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, message_id, prospect_email, prospect_name,
                    company, subject, body, sent_at, label
             FROM sent_emails
             ORDER BY sent_at DESC LIMIT ?1",
        )?;
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |n| n as i64);
        let rows = stmt.query_map(rusqlite::params![limit], row_to_sent_email)?;
        rows.collect::<Result<_, _>>().map_err(StoreError::Sqlite)
    }

    /// Look up the sent email owning a thread.
    ///
    /// The data model assumes one sent email per thread; if that ever does
    /// not hold this returns an arbitrary single matching row.
    pub fn get_sent_email_by_thread_id(
        &self,
        thread_id: &str,
    ) -> Result<Option<SentEmail>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, message_id, prospect_email, prospect_name,
                    company, subject, body, sent_at, label
             FROM sent_emails WHERE thread_id = ?1 LIMIT 1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![thread_id], row_to_sent_email)?;
        match rows.next() {
            Some(Ok(email)) => Ok(Some(email)),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// Insert a reply, ignoring duplicates on `message_id`.
    ///
    /// Idempotent: saving the same reply twice stores exactly one row and
    /// returns the same row id both times.
    pub fn save_reply(&self, reply: &EmailReply) -> Result<i64, StoreError> {
        let conn = self.db.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO replies (sent_email_id, message_id, from_email,
                reply_content, received_at, processed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                reply.sent_email_id,
                reply.message_id,
                reply.from_email,
                reply.reply_content,
                reply.received_at.to_rfc3339(),
                reply.processed,
            ],
        )?;
        if inserted == 0 {
            // Already tracked. Hand back the existing row's id.
            let id = conn.query_row(
                "SELECT id FROM replies WHERE message_id = ?1",
                rusqlite::params![reply.message_id],
                |row| row.get(0),
            )?;
            debug!(id, message_id = %reply.message_id, "Reply already tracked");
            Ok(id)
        } else {
            let id = conn.last_insert_rowid();
            debug!(id, message_id = %reply.message_id, "Reply recorded");
            Ok(id)
        }
    }

    /// Unprocessed replies joined with their owning sent email, newest
    /// received first.
    pub fn get_new_replies(&self) -> Result<Vec<NewReply>, StoreError> {
        self.query_replies(true)
    }

    /// Every reply, processed or not, same join and ordering as
    /// [`get_new_replies`](Self::get_new_replies).
    pub fn get_all_replies(&self) -> Result<Vec<NewReply>, StoreError> {
        self.query_replies(false)
    }

    fn query_replies(&self, unprocessed_only: bool) -> Result<Vec<NewReply>, StoreError> {
        let conn = self.db.conn();
        let filter = if unprocessed_only {
            "WHERE r.processed = 0"
        } else {
            ""
        };
        let sql = format!(
            "SELECT r.id, r.message_id, r.from_email, r.reply_content, r.received_at,
                    r.processed, s.company, s.prospect_name, s.subject
             FROM replies r
             JOIN sent_emails s ON r.sent_email_id = s.id
             {filter}
             ORDER BY r.received_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_new_reply)?;
        rows.collect::<Result<_, _>>().map_err(StoreError::Sqlite)
    }

    /// Flip a reply's `processed` flag to true.
    ///
    /// Idempotent, and a no-op (not an error) when the id does not exist.
    pub fn mark_reply_processed(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.conn();
        let updated = conn.execute(
            "UPDATE replies SET processed = 1 WHERE id = ?1",
            rusqlite::params![id],
        )?;
        debug!(id, updated, "Reply marked processed");
        Ok(())
    }

    /// Campaign counters and response rate.
    pub fn get_stats(&self) -> Result<CampaignStats, StoreError> {
        let conn = self.db.conn();
        let total_sent: i64 =
            conn.query_row("SELECT COUNT(*) FROM sent_emails", [], |row| row.get(0))?;
        let total_replies: i64 =
            conn.query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))?;
        let new_replies: i64 = conn.query_row(
            "SELECT COUNT(*) FROM replies WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;

        let response_rate = if total_sent > 0 {
            let rate = total_replies as f64 / total_sent as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(CampaignStats {
            total_sent,
            total_replies,
            new_replies,
            response_rate,
        })
    }

    /// Distinct thread ids across all sent emails. The universe of
    /// conversations the reply sweep will poll.
    pub fn thread_ids_for_monitoring(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT thread_id FROM sent_emails")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(StoreError::Sqlite)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse a stored timestamp. Accepts RFC 3339 (what we write) and the
/// `CURRENT_TIMESTAMP` format SQLite uses for column defaults.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn row_to_sent_email(row: &rusqlite::Row<'_>) -> Result<SentEmail, rusqlite::Error> {
    let sent_at_str: String = row.get(8)?;
    Ok(SentEmail {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        message_id: row.get(2)?,
        prospect_email: row.get(3)?,
        prospect_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        company: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        subject: row.get(6)?,
        body: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        sent_at: parse_timestamp(&sent_at_str),
        label: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
    })
}

fn row_to_new_reply(row: &rusqlite::Row<'_>) -> Result<NewReply, rusqlite::Error> {
    let received_at_str: String = row.get(4)?;
    Ok(NewReply {
        id: row.get(0)?,
        message_id: row.get(1)?,
        from_email: row.get(2)?,
        reply_content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        received_at: parse_timestamp(&received_at_str),
        processed: row.get(5)?,
        company: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        prospect_name: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        subject: row.get(8)?,
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> TrackingStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        TrackingStore::new(db)
    }

    fn sent_email(message_id: &str, thread_id: &str) -> SentEmail {
        SentEmail {
            id: None,
            thread_id: thread_id.to_string(),
            message_id: message_id.to_string(),
            prospect_email: "jane@co.com".to_string(),
            prospect_name: "Jane Doe".to_string(),
            company: "Co".to_string(),
            subject: "Co x Automation?".to_string(),
            body: "Hi Jane".to_string(),
            sent_at: Utc::now(),
            label: "cold-outreach".to_string(),
        }
    }

    fn reply(sent_email_id: i64, message_id: &str) -> EmailReply {
        EmailReply {
            id: None,
            sent_email_id,
            message_id: message_id.to_string(),
            from_email: "jane@co.com".to_string(),
            reply_content: "Sounds good".to_string(),
            received_at: Utc::now(),
            processed: false,
        }
    }

    #[test]
    fn save_and_list_sent_emails() {
        let store = test_store();
        let mut first = sent_email("m1", "t1");
        first.sent_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut second = sent_email("m2", "t2");
        second.sent_at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        store.save_sent_email(&first).unwrap();
        store.save_sent_email(&second).unwrap();

        let all = store.get_sent_emails(None).unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].message_id, "m2");
        assert_eq!(all[1].message_id, "m1");

        let limited = store.get_sent_emails(Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].message_id, "m2");
    }

    #[test]
    fn duplicate_sent_message_id_is_a_hard_failure() {
        let store = test_store();
        store.save_sent_email(&sent_email("dup", "t1")).unwrap();

        let err = store.save_sent_email(&sent_email("dup", "t2")).unwrap_err();
        assert!(
            matches!(err, StoreError::DuplicateSentMessage { message_id } if message_id == "dup")
        );
    }

    #[test]
    fn get_by_thread_id() {
        let store = test_store();
        store.save_sent_email(&sent_email("m1", "thread-a")).unwrap();

        let found = store.get_sent_email_by_thread_id("thread-a").unwrap();
        assert_eq!(found.unwrap().message_id, "m1");

        let absent = store.get_sent_email_by_thread_id("thread-z").unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn save_reply_is_idempotent() {
        let store = test_store();
        let sent_id = store.save_sent_email(&sent_email("m1", "t1")).unwrap();

        let first = store.save_reply(&reply(sent_id, "r1")).unwrap();
        let second = store.save_reply(&reply(sent_id, "r1")).unwrap();
        assert_eq!(first, second);

        let count: i64 = store
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn new_replies_joined_and_newest_first() {
        let store = test_store();
        let sent_id = store.save_sent_email(&sent_email("m1", "t1")).unwrap();

        let mut older = reply(sent_id, "r1");
        older.received_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut newer = reply(sent_id, "r2");
        newer.received_at = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        store.save_reply(&older).unwrap();
        store.save_reply(&newer).unwrap();

        let rows = store.get_new_replies().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message_id, "r2");
        assert_eq!(rows[1].message_id, "r1");
        assert_eq!(rows[0].company, "Co");
        assert_eq!(rows[0].prospect_name, "Jane Doe");
        assert_eq!(rows[0].subject, "Co x Automation?");
    }

    #[test]
    fn new_replies_never_include_processed() {
        let store = test_store();
        let sent_id = store.save_sent_email(&sent_email("m1", "t1")).unwrap();
        let reply_id = store.save_reply(&reply(sent_id, "r1")).unwrap();
        store.save_reply(&reply(sent_id, "r2")).unwrap();

        store.mark_reply_processed(reply_id).unwrap();

        let rows = store.get_new_replies().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.iter().all(|r| !r.processed));
    }

    #[test]
    fn all_replies_include_processed() {
        let store = test_store();
        let sent_id = store.save_sent_email(&sent_email("m1", "t1")).unwrap();
        let reply_id = store.save_reply(&reply(sent_id, "r1")).unwrap();
        store.mark_reply_processed(reply_id).unwrap();

        let rows = store.get_all_replies().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].processed);
    }

    #[test]
    fn mark_processed_is_idempotent() {
        let store = test_store();
        let sent_id = store.save_sent_email(&sent_email("m1", "t1")).unwrap();
        let reply_id = store.save_reply(&reply(sent_id, "r1")).unwrap();

        store.mark_reply_processed(reply_id).unwrap();
        store.mark_reply_processed(reply_id).unwrap();

        let rows = store.get_all_replies().unwrap();
        assert!(rows[0].processed);
    }

    #[test]
    fn mark_processed_missing_id_is_a_noop() {
        let store = test_store();
        store.mark_reply_processed(9999).unwrap();
    }

    #[test]
    fn stats_with_nothing_sent() {
        let store = test_store();
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_sent, 0);
        assert_eq!(stats.total_replies, 0);
        assert_eq!(stats.new_replies, 0);
        assert_eq!(stats.response_rate, 0.0);
    }

    #[test]
    fn stats_response_rate() {
        let store = test_store();
        for i in 0..10 {
            store
                .save_sent_email(&sent_email(&format!("m{i}"), &format!("t{i}")))
                .unwrap();
        }
        for i in 0..3 {
            store.save_reply(&reply(i + 1, &format!("r{i}"))).unwrap();
        }

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_sent, 10);
        assert_eq!(stats.total_replies, 3);
        assert_eq!(stats.new_replies, 3);
        assert_eq!(stats.response_rate, 30.0);
    }

    #[test]
    fn stats_rate_rounds_to_two_decimals() {
        let store = test_store();
        for i in 0..3 {
            store
                .save_sent_email(&sent_email(&format!("m{i}"), &format!("t{i}")))
                .unwrap();
        }
        store.save_reply(&reply(1, "r0")).unwrap();

        // 1/3 * 100 = 33.333... -> 33.33
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.response_rate, 33.33);
    }

    #[test]
    fn thread_ids_are_distinct() {
        let store = test_store();
        store.save_sent_email(&sent_email("m1", "t1")).unwrap();
        store.save_sent_email(&sent_email("m2", "t1")).unwrap();
        store.save_sent_email(&sent_email("m3", "t2")).unwrap();

        let mut ids = store.thread_ids_for_monitoring().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn timestamps_round_trip() {
        let store = test_store();
        let mut email = sent_email("m1", "t1");
        email.sent_at = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap();
        store.save_sent_email(&email).unwrap();

        let loaded = store.get_sent_emails(None).unwrap();
        assert_eq!(loaded[0].sent_at, email.sent_at);
    }

    #[test]
    fn parses_sqlite_default_timestamps() {
        let parsed = parse_timestamp("2024-06-15 12:30:45");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap());
    }
}
