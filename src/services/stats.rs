//! Rolling statistics for quizzes and users, updated whenever an attempt
//! is finalized. Runs inside the caller's transaction: the stats row is
//! locked first, so concurrent submissions never lose an increment.

use sqlx::PgConnection;
use time::PrimitiveDateTime;

use crate::repositories;
use crate::services::errors::EngineError;

/// Incremental average update. `count_after_sample` already includes the
/// new sample, so a count of 1 yields exactly `new_value`.
pub(crate) fn rolling_average(current_avg: f64, count_after_sample: i64, new_value: f64) -> f64 {
    if count_after_sample <= 1 {
        return new_value;
    }

    (current_avg * (count_after_sample - 1) as f64 + new_value) / count_after_sample as f64
}

pub(crate) async fn record_quiz_attempt(
    conn: &mut PgConnection,
    quiz_id: &str,
    percentage: f64,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    let (attempts, average) = repositories::quizzes::stats_for_update(&mut *conn, quiz_id).await?;
    let count_after = attempts + 1;
    let new_average = rolling_average(average, count_after, percentage);
    repositories::quizzes::update_stats(&mut *conn, quiz_id, count_after, new_average, now).await?;
    Ok(())
}

pub(crate) async fn record_user_attempt(
    conn: &mut PgConnection,
    user_id: &str,
    percentage: f64,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    let (taken, average) = repositories::users::stats_for_update(&mut *conn, user_id).await?;
    let count_after = taken + 1;
    let new_average = rolling_average(average, count_after, percentage);
    repositories::users::update_stats(&mut *conn, user_id, count_after, new_average, now).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::rolling_average;

    #[test]
    fn first_sample_yields_exactly_the_value() {
        assert_eq!(rolling_average(0.0, 1, 87.5), 87.5);
        assert_eq!(rolling_average(42.0, 1, 87.5), 87.5);
    }

    #[test]
    fn rolling_average_matches_arithmetic_mean() {
        let samples = [80.0, 60.0, 100.0, 45.0, 72.5];
        let mut avg = 0.0;
        for (index, sample) in samples.iter().enumerate() {
            avg = rolling_average(avg, index as i64 + 1, *sample);
        }

        let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((avg - mean).abs() < 1e-9);
    }

    #[test]
    fn two_samples_average_correctly() {
        let avg = rolling_average(80.0, 2, 60.0);
        assert_eq!(avg, 70.0);
    }
}
