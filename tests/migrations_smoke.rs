use sqlx::Row;

fn database_url() -> Option<String> {
    // Integration tests read the environment directly, not the app config.
    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return Some(url);
        }
    }

    // Build from POSTGRES_* only when a server is actually configured.
    let server = std::env::var("POSTGRES_SERVER").ok()?;
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "quizdeck".into());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "quizdeck_db".into());

    Some(format!("postgresql://{user}:{password}@{server}:{port}/{db}"))
}

#[tokio::test]
async fn migrations_apply_and_schema_exists() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        eprintln!("skipping: neither DATABASE_URL nor POSTGRES_SERVER is set");
        return Ok(());
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("migrations")).await?;
    migrator.run(&pool).await?;

    let relations = [
        "users",
        "quizzes",
        "questions",
        "quiz_assignments",
        "submissions",
        "competitions",
        "competition_participants",
        "leaderboard_entries",
        // Partial unique index guarding one in-progress attempt per student.
        "uq_submissions_in_progress",
    ];

    for relation in relations {
        let row =
            sqlx::query("SELECT to_regclass($1)::text").bind(relation).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected relation {relation} to exist after migrations");
    }

    Ok(())
}
