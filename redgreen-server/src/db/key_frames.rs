//! `key_frames` table queries

use redgreen_common::db::{KeyFrameSample, TrialKind};
use redgreen_common::Result;
use sqlx::{Executor, Sqlite, SqliteConnection};

/// Insert every sample of one submission
///
/// Takes a connection so the caller can run it inside its transaction.
pub async fn insert_samples(
    conn: &mut SqliteConnection,
    trial_id: i64,
    session_id: i64,
    samples: &[KeyFrameSample],
) -> Result<()> {
    for sample in samples {
        sqlx::query(
            "INSERT INTO key_frames (trial_id, session_id, frame, f_pressed, j_pressed) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(trial_id)
        .bind(session_id)
        .bind(sample.frame)
        .bind(sample.f_pressed)
        .bind(sample.j_pressed)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Samples from the experimental trials of a session, in insertion order
pub async fn experimental_samples<'e, E>(executor: E, session_id: i64) -> Result<Vec<KeyFrameSample>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT k.frame, k.f_pressed, k.j_pressed
        FROM key_frames k
        JOIN trials t ON k.trial_id = t.id
        WHERE t.session_id = ? AND t.trial_kind = ?
        ORDER BY k.id
        "#,
    )
    .bind(session_id)
    .bind(TrialKind::Trial.as_str())
    .fetch_all(executor)
    .await?;

    rows.iter().map(KeyFrameSample::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sessions::{insert_session, NewSession};
    use crate::db::trials::insert_trial;
    use chrono::Utc;
    use redgreen_common::db::init_memory_database;

    #[tokio::test]
    async fn test_only_experimental_samples_are_returned() {
        let pool = init_memory_database().await.unwrap();
        let session_id = insert_session(
            &pool,
            &NewSession {
                experiment_name: "redgreen",
                profile_slot: 0,
                trial_order: &[],
                prolific_pid: "pid",
                study_id: "study",
                prolific_session_id: "psess",
                start_time: Utc::now(),
                order_constraint_met: true,
            },
        )
        .await
        .unwrap();

        let ftrial = insert_trial(&pool, session_id, TrialKind::Ftrial, 0, Some("F1"), false, Utc::now())
            .await
            .unwrap();
        let trial = insert_trial(&pool, session_id, TrialKind::Trial, 0, Some("E1"), false, Utc::now())
            .await
            .unwrap();

        let sample = |frame, f, j| KeyFrameSample {
            frame,
            f_pressed: f,
            j_pressed: j,
        };

        let mut conn = pool.acquire().await.unwrap();
        insert_samples(&mut *conn, ftrial, session_id, &[sample(0, true, false)])
            .await
            .unwrap();
        insert_samples(&mut *conn, trial, session_id, &[sample(0, false, true), sample(1, false, false)])
            .await
            .unwrap();
        drop(conn);

        let samples = experimental_samples(&pool, session_id).await.unwrap();
        assert_eq!(samples, vec![sample(0, false, true), sample(1, false, false)]);
    }
}
