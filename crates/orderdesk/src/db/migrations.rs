//! Versioned schema migrations, tracked in a `_migrations` table.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    Standard,
    /// Skipped when the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_batch_tables",
        sql: "CREATE TABLE IF NOT EXISTS batch_jobs (
                id TEXT PRIMARY KEY,
                total_files INTEGER NOT NULL,
                options TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                processed_files INTEGER NOT NULL DEFAULT 0,
                failed_files INTEGER NOT NULL DEFAULT 0,
                cancelled_files INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS file_tasks (
                batch_id TEXT NOT NULL REFERENCES batch_jobs(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                status TEXT NOT NULL,
                company_id TEXT,
                work_order_id TEXT,
                detection_result TEXT,
                started_at TEXT,
                completed_at TEXT,
                processing_time_ms INTEGER,
                error_message TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (batch_id, file_name)
            );
            CREATE INDEX IF NOT EXISTS idx_file_tasks_status ON file_tasks(status);",
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_work_orders_table",
        sql: "CREATE TABLE IF NOT EXISTS work_orders (
                id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                company_id TEXT NOT NULL,
                status TEXT NOT NULL,
                content TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_work_orders_file_name ON work_orders(file_name);",
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "create_detection_tables",
        sql: "CREATE TABLE IF NOT EXISTS detection_rules (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                rule_type TEXT NOT NULL,
                rule_value TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS detection_history (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                detected_company_id TEXT,
                confidence REAL NOT NULL,
                method TEXT NOT NULL,
                details TEXT NOT NULL,
                corrected_company_id TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_detection_history_document ON detection_history(document_id);",
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 4,
        description: "add_attempts_to_file_tasks",
        sql: "ALTER TABLE file_tasks ADD COLUMN attempts INTEGER NOT NULL DEFAULT 1;",
        kind: MigrationKind::AddColumn {
            table: "file_tasks",
            column: "attempts",
        },
    },
    Migration {
        version: 5,
        description: "add_paused_on_error_to_batch_jobs",
        sql: "ALTER TABLE batch_jobs ADD COLUMN paused_on_error INTEGER NOT NULL DEFAULT 0;",
        kind: MigrationKind::AddColumn {
            table: "batch_jobs",
            column: "paused_on_error",
        },
    },
];

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!("Skipping migration v{} (column exists)", migration.version);
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}
