//! `detection_rules` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub id: String,
    pub company_id: String,
    pub rule_type: String,
    pub rule_value: String,
    pub priority: i64,
    pub is_active: bool,
}

impl RuleRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            rule_type: row.get("rule_type")?,
            rule_value: row.get("rule_value")?,
            priority: row.get("priority")?,
            is_active: row.get("is_active")?,
        })
    }
}

/// Active rules, highest priority first.
pub fn list_active(db: &Database) -> Result<Vec<RuleRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM detection_rules WHERE is_active = 1 ORDER BY priority DESC, id",
        )?;
        let rows = stmt
            .query_map([], RuleRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM detection_rules", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Inserts a rule or replaces the one with the same id.
pub fn upsert(db: &Database, rule: &RuleRow, now: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO detection_rules (id, company_id, rule_type, rule_value, priority,
             is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET company_id=excluded.company_id,
                rule_type=excluded.rule_type, rule_value=excluded.rule_value,
                priority=excluded.priority, is_active=excluded.is_active,
                updated_at=excluded.updated_at",
            params![
                rule.id,
                rule.company_id,
                rule.rule_type,
                rule.rule_value,
                rule.priority,
                rule.is_active,
                now,
            ],
        )?;
        Ok(())
    })
}

pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM detection_rules WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
