use sqlx::SqlitePool;

use shopbot_core::Result;

use crate::db_err;

/// Create tables and indexes if missing. Timestamps are unix milliseconds
/// (`*_ms` columns); booleans are 0/1 integers.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tg_id INTEGER NOT NULL UNIQUE,
            username TEXT,
            full_name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS lots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price INTEGER NOT NULL,
            photo TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            message_id INTEGER,
            created_by INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'digital',
            description TEXT,
            price INTEGER NOT NULL,
            photo TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            target_type TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            prepayment_amount INTEGER NOT NULL DEFAULT 0,
            total_amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'done')),
            details TEXT,
            taken_by_admin_id INTEGER,
            taken_at_ms INTEGER,
            closed_at_ms INTEGER,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_requests_status_created ON requests(status, created_at_ms)",
        r#"
        CREATE TABLE IF NOT EXISTS admin_notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            admin_user_id INTEGER NOT NULL,
            request_id INTEGER NOT NULL,
            chat_id INTEGER,
            tg_message_id INTEGER,
            is_hidden INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_notifications_request ON admin_notifications(request_id, admin_user_id)",
        r#"
        CREATE TABLE IF NOT EXISTS admin_ui_state (
            admin_user_id INTEGER PRIMARY KEY,
            last_menu_message_id INTEGER,
            last_requests_message_id INTEGER,
            updated_at_ms INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS raffles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            start_at_ms INTEGER NOT NULL,
            end_at_ms INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER,
            updated_at_ms INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS raffle_participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raffle_id INTEGER NOT NULL,
            user_tg_id INTEGER NOT NULL,
            created_at_ms INTEGER NOT NULL,
            UNIQUE(raffle_id, user_tg_id)
        )
        "#,
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await.map_err(db_err)?;
    }
    Ok(())
}
