use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::SessionBackend;
use crate::error::BackendError;
use crate::model::{
    CompletionRequest, PhonicsSegment, PlanId, PlanWordId, PracticeSession, ResultSummary,
    ScheduleId, SessionStatus, StepResult, WordInfo, WordPracticeState,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        meaning TEXT NOT NULL,
        ipa TEXT,
        syllables TEXT NOT NULL DEFAULT '[]',
        phonics TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS plan_words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id INTEGER NOT NULL,
        word_id INTEGER NOT NULL REFERENCES words(id),
        position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS practice_sessions (
        id TEXT PRIMARY KEY,
        plan_id INTEGER NOT NULL,
        schedule_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        total_time_ms INTEGER,
        active_time_ms INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        completed_at TEXT
    );

    CREATE TABLE IF NOT EXISTS session_words (
        session_id TEXT NOT NULL REFERENCES practice_sessions(id),
        position INTEGER NOT NULL,
        plan_word_id INTEGER NOT NULL REFERENCES plan_words(id),
        PRIMARY KEY (session_id, position)
    );

    CREATE TABLE IF NOT EXISTS step_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES practice_sessions(id),
        word_id INTEGER NOT NULL,
        plan_word_id INTEGER NOT NULL,
        step INTEGER NOT NULL,
        user_input TEXT NOT NULL,
        is_correct BOOLEAN NOT NULL,
        time_spent_ms INTEGER NOT NULL,
        attempts INTEGER NOT NULL,
        recorded_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_plan_words_plan ON plan_words(plan_id, position);
    CREATE INDEX IF NOT EXISTS idx_sessions_plan ON practice_sessions(plan_id);
    CREATE INDEX IF NOT EXISTS idx_step_results_session ON step_results(session_id, plan_word_id);
"#;

/// One row of [`SqliteSessionBackend::list_sessions`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionListing {
    pub session_id: String,
    pub schedule_id: ScheduleId,
    pub status: SessionStatus,
    pub created_at: DateTime<Local>,
    pub steps_submitted: usize,
    pub total_steps: usize,
}

/// Session backend over the local SQLite database.
#[derive(Debug)]
pub struct SqliteSessionBackend {
    conn: Connection,
}

impl SqliteSessionBackend {
    /// Opens (and if needed creates) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackendError::Unavailable(format!("Failed to create directory: {e}"))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, BackendError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Appends a word to the end of a plan's word list.
    pub fn add_plan_word(
        &mut self,
        plan_id: PlanId,
        word: &WordInfo,
    ) -> Result<PlanWordId, BackendError> {
        let ids = self.add_plan_words(plan_id, std::slice::from_ref(word))?;
        ids.first()
            .copied()
            .ok_or_else(|| BackendError::Corrupt("word was not stored".to_string()))
    }

    /// Appends `words` in order, all or nothing.
    pub fn add_plan_words(
        &mut self,
        plan_id: PlanId,
        words: &[WordInfo],
    ) -> Result<Vec<PlanWordId>, BackendError> {
        let tx = self.conn.transaction()?;
        let mut position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM plan_words WHERE plan_id = ?1",
            [plan_id],
            |row| row.get(0),
        )?;

        let mut ids = Vec::with_capacity(words.len());
        for word in words {
            let syllables = serde_json::to_string(&word.syllables)
                .map_err(|e| BackendError::Corrupt(e.to_string()))?;
            let phonics = serde_json::to_string(&word.phonics)
                .map_err(|e| BackendError::Corrupt(e.to_string()))?;
            tx.execute(
                "INSERT INTO words (text, meaning, ipa, syllables, phonics)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![word.text, word.meaning, word.ipa, syllables, phonics],
            )?;
            let word_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO plan_words (plan_id, word_id, position) VALUES (?1, ?2, ?3)",
                params![plan_id, word_id, position],
            )?;
            ids.push(tx.last_insert_rowid());
            position += 1;
        }
        // dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(ids)
    }

    pub fn plan_word_count(&self, plan_id: PlanId) -> Result<usize, BackendError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM plan_words WHERE plan_id = ?1",
            [plan_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Sessions of a plan, newest first.
    pub fn list_sessions(&self, plan_id: PlanId) -> Result<Vec<SessionListing>, BackendError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                s.id,
                s.schedule_id,
                s.status,
                s.created_at,
                (SELECT COUNT(*) FROM step_results r WHERE r.session_id = s.id),
                (SELECT COUNT(*) * 3 FROM session_words w WHERE w.session_id = s.id)
            FROM practice_sessions s
            WHERE s.plan_id = ?1
            ORDER BY s.created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([plan_id], |row| {
            let status: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            let steps_submitted: i64 = row.get(4)?;
            let total_steps: i64 = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, ScheduleId>(1)?,
                status,
                created_at,
                steps_submitted as usize,
                total_steps as usize,
            ))
        })?;

        let mut listings = Vec::new();
        for row in rows {
            let (session_id, schedule_id, status, created_at, steps_submitted, total_steps) = row?;
            listings.push(SessionListing {
                session_id,
                schedule_id,
                status: parse_status(&status)?,
                created_at: parse_timestamp(&created_at)?,
                steps_submitted,
                total_steps,
            });
        }
        Ok(listings)
    }

    fn status_of(&self, session_id: &str) -> Result<SessionStatus, BackendError> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM practice_sessions WHERE id = ?1",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;
        match status {
            Some(s) => parse_status(&s),
            None => Err(BackendError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Moves a session to `to` if it currently is in one of `from`.
    /// Already being in `to` is accepted.
    fn transition(
        &self,
        session_id: &str,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<(), BackendError> {
        let current = self.status_of(session_id)?;
        if current == to {
            return Ok(());
        }
        if !from.contains(&current) {
            return Err(BackendError::SessionClosed {
                id: session_id.to_string(),
                status: current,
            });
        }
        self.conn.execute(
            "UPDATE practice_sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![to.to_string(), Local::now().to_rfc3339(), session_id],
        )?;
        Ok(())
    }

    fn load_session(&self, session_id: &str) -> Result<PracticeSession, BackendError> {
        let header = self
            .conn
            .query_row(
                "SELECT plan_id, schedule_id, status FROM practice_sessions WHERE id = ?1",
                [session_id],
                |row| {
                    Ok((
                        row.get::<_, PlanId>(0)?,
                        row.get::<_, ScheduleId>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((plan_id, schedule_id, status)) = header else {
            return Err(BackendError::SessionNotFound(session_id.to_string()));
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                pw.id, w.id, w.text, w.meaning, w.ipa, w.syllables, w.phonics,
                (SELECT COALESCE(MAX(r.step) + 1, 0) FROM step_results r
                    WHERE r.session_id = sw.session_id AND r.plan_word_id = sw.plan_word_id)
            FROM session_words sw
            JOIN plan_words pw ON pw.id = sw.plan_word_id
            JOIN words w ON w.id = pw.word_id
            WHERE sw.session_id = ?1
            ORDER BY sw.position
            "#,
        )?;
        let word_states = stmt
            .query_map([session_id], word_state_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PracticeSession {
            session_id: session_id.to_string(),
            plan_id,
            schedule_id,
            status: parse_status(&status)?,
            word_states,
        })
    }
}

fn word_state_from_row(row: &Row<'_>) -> rusqlite::Result<WordPracticeState> {
    let syllables: String = row.get(5)?;
    let phonics: String = row.get(6)?;
    let steps_submitted: i64 = row.get(7)?;
    Ok(WordPracticeState {
        plan_word_id: row.get(0)?,
        word_id: row.get(1)?,
        word: WordInfo {
            text: row.get(2)?,
            meaning: row.get(3)?,
            ipa: row.get(4)?,
            syllables: json_column::<Vec<String>>(5, &syllables)?,
            phonics: json_column::<Vec<PhonicsSegment>>(6, &phonics)?,
        },
        steps_submitted: steps_submitted.clamp(0, u8::MAX as i64) as u8,
    })
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_status(raw: &str) -> Result<SessionStatus, BackendError> {
    SessionStatus::parse(raw)
        .ok_or_else(|| BackendError::Corrupt(format!("unknown session status {raw:?}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, BackendError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local))
        .map_err(|e| BackendError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

impl SessionBackend for SqliteSessionBackend {
    fn create_session(
        &mut self,
        plan_id: PlanId,
        schedule_id: ScheduleId,
    ) -> Result<PracticeSession, BackendError> {
        let session_id = new_session_id();
        let now = Local::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO practice_sessions (id, plan_id, schedule_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![session_id, plan_id, schedule_id, SessionStatus::Active.to_string(), now],
        )?;
        tx.execute(
            r#"
            INSERT INTO session_words (session_id, position, plan_word_id)
            SELECT ?1, ROW_NUMBER() OVER (ORDER BY position, id) - 1, id
            FROM plan_words WHERE plan_id = ?2
            "#,
            params![session_id, plan_id],
        )?;
        tx.commit()?;

        tracing::info!(%session_id, plan_id, schedule_id, "Created practice session");
        self.load_session(&session_id)
    }

    fn get_session_detail(&mut self, session_id: &str) -> Result<PracticeSession, BackendError> {
        let session = self.load_session(session_id)?;
        if session.status.is_terminal() {
            return Err(BackendError::SessionClosed {
                id: session.session_id,
                status: session.status,
            });
        }
        Ok(session)
    }

    fn submit_step_result(&mut self, result: &StepResult) -> Result<(), BackendError> {
        let status = self.status_of(&result.session_id)?;
        if status.is_terminal() {
            return Err(BackendError::SessionClosed {
                id: result.session_id.clone(),
                status,
            });
        }
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO step_results
            (session_id, word_id, plan_word_id, step, user_input, is_correct, time_spent_ms, attempts, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                result.session_id,
                result.word_id,
                result.plan_word_id,
                result.step.ordinal(),
                result.user_input,
                result.is_correct,
                result.time_spent_ms as i64,
                result.attempts,
                now,
            ],
        )?;
        self.conn.execute(
            "UPDATE practice_sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, result.session_id],
        )?;
        Ok(())
    }

    fn pause_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.transition(session_id, &[SessionStatus::Active], SessionStatus::Paused)
    }

    fn resume_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.transition(session_id, &[SessionStatus::Paused], SessionStatus::Active)
    }

    fn complete_session(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<ResultSummary, BackendError> {
        let status = self.status_of(request.session_id)?;
        if status.is_terminal() {
            return Err(BackendError::SessionClosed {
                id: request.session_id.to_string(),
                status,
            });
        }

        let (submitted, correct, words): (i64, i64, i64) = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_correct THEN 1 ELSE 0 END), 0),
                COUNT(DISTINCT plan_word_id)
            FROM step_results
            WHERE session_id = ?1
            "#,
            [request.session_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let completed_at = Local::now();
        self.conn.execute(
            r#"
            UPDATE practice_sessions
            SET status = ?1, total_time_ms = ?2, active_time_ms = ?3, completed_at = ?4, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                SessionStatus::Completed.to_string(),
                request.total_time_ms as i64,
                request.active_time_ms as i64,
                completed_at.to_rfc3339(),
                request.session_id,
            ],
        )?;

        let accuracy = if submitted == 0 {
            0.0
        } else {
            ((correct as f64 / submitted as f64) * 100.0).round()
        };

        Ok(ResultSummary {
            session_id: request.session_id.to_string(),
            words_practiced: words as usize,
            steps_submitted: submitted as usize,
            steps_correct: correct as usize,
            accuracy,
            total_time_ms: request.total_time_ms,
            active_time_ms: request.active_time_ms,
            completed_at,
        })
    }

    fn cancel_session(&mut self, session_id: &str) -> Result<(), BackendError> {
        self.transition(
            session_id,
            &[SessionStatus::Active, SessionStatus::Paused],
            SessionStatus::Cancelled,
        )
    }
}
