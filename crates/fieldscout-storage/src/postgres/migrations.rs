use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS realms (
        id              BIGSERIAL PRIMARY KEY,
        name            TEXT NOT NULL UNIQUE,
        share_reports   BOOLEAN NOT NULL DEFAULT false
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              BIGSERIAL PRIMARY KEY,
        username        TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        realm_id        BIGINT NOT NULL REFERENCES realms(id),
        first_name      TEXT NOT NULL,
        last_name       TEXT NOT NULL,
        is_verified     BOOLEAN NOT NULL DEFAULT false,
        is_admin        BOOLEAN NOT NULL DEFAULT false,
        is_super_admin  BOOLEAN NOT NULL DEFAULT false,
        stars           TEXT[] NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        key         TEXT PRIMARY KEY,
        event_key   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_matches_event ON matches (event_key)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alliances (
        match_key   TEXT NOT NULL REFERENCES matches(key) ON DELETE CASCADE,
        is_blue     BOOLEAN NOT NULL,
        team_keys   TEXT[] NOT NULL,
        PRIMARY KEY (match_key, is_blue)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id          BIGSERIAL PRIMARY KEY,
        match_key   TEXT NOT NULL REFERENCES matches(key) ON DELETE CASCADE,
        team_key    TEXT NOT NULL,
        reporter_id BIGINT,
        realm_id    BIGINT REFERENCES realms(id),
        comment     TEXT NOT NULL,
        UNIQUE NULLS NOT DISTINCT (match_key, team_key, reporter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id          BIGSERIAL PRIMARY KEY,
        match_key   TEXT NOT NULL REFERENCES matches(key) ON DELETE CASCADE,
        team_key    TEXT NOT NULL,
        reporter_id BIGINT,
        realm_id    BIGINT REFERENCES realms(id),
        auto_name   TEXT NOT NULL DEFAULT '',
        data        JSONB NOT NULL,
        UNIQUE NULLS NOT DISTINCT (match_key, team_key, reporter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schemas (
        id          BIGSERIAL PRIMARY KEY,
        year        INTEGER,
        realm_id    BIGINT REFERENCES realms(id),
        auto        JSONB NOT NULL,
        teleop      JSONB NOT NULL,
        CHECK (year IS NOT NULL OR realm_id IS NOT NULL)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_schemas_standard_year
    ON schemas (year) WHERE realm_id IS NULL
    "#,
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "database migrations applied");
    Ok(())
}
