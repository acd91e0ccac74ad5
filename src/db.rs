use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SnapshotError;
use crate::models::{ActiveAlert, AlertSeverity, FactorBreakdown, RiskLevel, RiskSnapshot};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Factor columns become a breakdown only when all four are present.
fn breakdown_from_columns(
    academic: Option<f64>,
    emotional: Option<f64>,
    attendance: Option<f64>,
    engagement: Option<f64>,
) -> Result<Option<FactorBreakdown>, SnapshotError> {
    match (academic, emotional, attendance, engagement) {
        (Some(academic), Some(emotional), Some(attendance), Some(engagement)) => {
            FactorBreakdown::new(academic, emotional, attendance, engagement).map(Some)
        }
        _ => Ok(None),
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    student_id: String,
    full_name: String,
    risk_score: f64,
    risk_level: Option<String>,
    academic: Option<f64>,
    emotional: Option<f64>,
    attendance: Option<f64>,
    engagement: Option<f64>,
}

impl CsvRow {
    fn into_snapshot(self) -> Result<RiskSnapshot, SnapshotError> {
        let level = match self.risk_level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => level.parse()?,
            _ => RiskLevel::from_score(self.risk_score),
        };
        let snapshot = RiskSnapshot::new(self.student_id, self.full_name, self.risk_score, level)?;
        let breakdown = breakdown_from_columns(
            self.academic,
            self.emotional,
            self.attendance,
            self.engagement,
        )?;
        match breakdown {
            Some(breakdown) => snapshot.with_factors(breakdown),
            None => Ok(snapshot),
        }
    }
}

async fn upsert_student<'e, E>(executor: E, snapshot: &RiskSnapshot) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    let factors = snapshot.factor_breakdown;
    sqlx::query(
        r#"
        INSERT INTO risk_trajectory.students
        (id, full_name, risk_score, risk_level, academic, emotional, attendance, engagement)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            risk_score = EXCLUDED.risk_score,
            risk_level = EXCLUDED.risk_level,
            academic = EXCLUDED.academic,
            emotional = EXCLUDED.emotional,
            attendance = EXCLUDED.attendance,
            engagement = EXCLUDED.engagement,
            updated_at = now()
        "#,
    )
    .bind(&snapshot.student_id)
    .bind(&snapshot.student_name)
    .bind(snapshot.score())
    .bind(snapshot.risk_level.as_str())
    .bind(factors.map(|f| f.academic))
    .bind(factors.map(|f| f.emotional))
    .bind(factors.map(|f| f.attendance))
    .bind(factors.map(|f| f.engagement))
    .execute(executor)
    .await
    .with_context(|| format!("failed to upsert student {}", snapshot.student_id))?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("u20210341", "Lucía Ramos Quispe", 86.0, Some((78.0, 64.0, 55.0, 40.0))),
        ("u20210587", "Mateo Díaz Huamán", 72.0, Some((45.0, 68.0, 30.0, 52.0))),
        ("u20211102", "Valeria Torres León", 58.0, Some((61.0, 35.0, 20.0, 25.0))),
        ("u20211436", "Sebastián Castro Ríos", 38.0, None),
        ("u20211890", "Camila Flores Vega", 12.0, Some((10.0, 8.0, 5.0, 15.0))),
    ];

    for (id, name, score, factors) in students {
        let mut snapshot = RiskSnapshot::new(id, name, score, RiskLevel::from_score(score))?;
        if let Some((academic, emotional, attendance, engagement)) = factors {
            snapshot = snapshot.with_factors(FactorBreakdown::new(
                academic, emotional, attendance, engagement,
            )?)?;
        }
        upsert_student(pool, &snapshot).await?;
    }

    let alerts = vec![
        (
            "seed-001",
            "u20210341",
            AlertSeverity::Critical,
            "Tres evaluaciones desaprobadas consecutivas",
            false,
            NaiveDate::from_ymd_opt(2026, 3, 2).context("invalid date")?,
        ),
        (
            "seed-002",
            "u20210341",
            AlertSeverity::High,
            "Inasistencia a cuatro sesiones",
            false,
            NaiveDate::from_ymd_opt(2026, 2, 27).context("invalid date")?,
        ),
        (
            "seed-003",
            "u20210587",
            AlertSeverity::Medium,
            "Emociones negativas reportadas durante una semana",
            true,
            NaiveDate::from_ymd_opt(2026, 2, 25).context("invalid date")?,
        ),
        (
            "seed-004",
            "u20211102",
            AlertSeverity::Low,
            "Entrega tardía de laboratorio",
            false,
            NaiveDate::from_ymd_opt(2026, 2, 20).context("invalid date")?,
        ),
    ];

    for (source_key, student_id, severity, message, acknowledged, raised_on) in alerts {
        sqlx::query(
            r#"
            INSERT INTO risk_trajectory.alerts
            (id, student_id, severity, message, acknowledged, raised_on, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(severity.as_str())
        .bind(message)
        .bind(acknowledged)
        .bind(raised_on)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn fetch_alerts(
    pool: &PgPool,
    student_id: Option<&str>,
) -> anyhow::Result<HashMap<String, Vec<ActiveAlert>>> {
    let mut query = String::from(
        "SELECT student_id, severity, acknowledged \
         FROM risk_trajectory.alerts",
    );
    if student_id.is_some() {
        query.push_str(" WHERE student_id = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let mut alerts: HashMap<String, Vec<ActiveAlert>> = HashMap::new();
    for row in rows.fetch_all(pool).await? {
        let severity: String = row.get("severity");
        alerts
            .entry(row.get("student_id"))
            .or_default()
            .push(ActiveAlert {
                severity: severity.parse()?,
                acknowledged: row.get("acknowledged"),
            });
    }
    Ok(alerts)
}

/// Loads snapshots ordered by id. Every student gets an alert list, empty
/// when none are recorded.
pub async fn fetch_snapshots(
    pool: &PgPool,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<RiskSnapshot>> {
    let mut query = String::from(
        "SELECT id, full_name, risk_score, risk_level, \
         academic, emotional, attendance, engagement \
         FROM risk_trajectory.students",
    );
    if student_id.is_some() {
        query.push_str(" WHERE id = $1");
    }
    query.push_str(" ORDER BY id");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut alerts = fetch_alerts(pool, student_id).await?;
    let mut snapshots = Vec::with_capacity(records.len());

    for row in records {
        let id: String = row.get("id");
        let level: String = row.get("risk_level");
        let name: String = row.get("full_name");
        let snapshot = level
            .parse::<RiskLevel>()
            .and_then(|level| RiskSnapshot::new(id.clone(), name, row.get("risk_score"), level))
            .with_context(|| format!("student {id} has invalid risk data"))?;
        let breakdown = breakdown_from_columns(
            row.get("academic"),
            row.get("emotional"),
            row.get("attendance"),
            row.get("engagement"),
        )
        .with_context(|| format!("student {id} has invalid factor data"))?;

        let mut snapshot = match breakdown {
            Some(breakdown) => snapshot.with_factors(breakdown)?,
            None => snapshot,
        };
        snapshot.active_alerts = Some(alerts.remove(&id).unwrap_or_default());
        snapshots.push(snapshot);
    }

    Ok(snapshots)
}

/// Parses CSV rows into snapshots. Rows that cannot be read or fail
/// validation are skipped with a warning.
pub fn read_csv_snapshots<R: Read>(reader: R) -> Vec<RiskSnapshot> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut snapshots = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(row = line + 1, error = %err, "skipping unreadable row");
                continue;
            }
        };
        let student_id = row.student_id.clone();
        match row.into_snapshot() {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(err) => {
                warn!(
                    row = line + 1,
                    student_id = %student_id,
                    error = %err,
                    "skipping invalid row"
                );
            }
        }
    }

    snapshots
}

/// Upserts students from a CSV file in a single transaction.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let snapshots = read_csv_snapshots(file);

    let mut tx = pool.begin().await?;
    for snapshot in &snapshots {
        upsert_student(&mut *tx, snapshot).await?;
    }
    tx.commit().await?;

    info!(imported = snapshots.len(), path = %csv_path.display(), "csv import finished");
    Ok(snapshots.len())
}
