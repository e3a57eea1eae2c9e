//! Post-processor: idempotent schema evolution and null-only backfill
//!
//! Adds the derived spatial columns if absent, then populates each one with a
//! single set-oriented update scoped by a null-guard predicate. A row already
//! enriched is never touched again; a row appended since the last run is
//! picked up automatically because its derived columns start null.

use crate::error::Result;
use crate::sql::SqlSurface;
use adp_common::TableRef;
use tracing::{debug, info};

/// H3 resolutions the pipeline indexes at.
pub const H3_RESOLUTIONS: &[u8] = &[9, 10, 11];

/// Run every enrichment step in order. Each step is independently safe to
/// repeat, so a rerun after partial failure simply resumes.
pub async fn run<S: SqlSurface>(surface: &S, table: &TableRef) -> Result<()> {
    ensure_column(surface, table, "point_geom", "geometry").await?;
    ensure_column(surface, table, "is_valid_geom", "boolean").await?;
    for res in H3_RESOLUTIONS {
        ensure_column(surface, table, &format!("h3_res{res}"), "bigint").await?;
    }

    let rows = surface.execute(&point_geom_backfill(table)).await?;
    info!(rows, "Backfilled point_geom");

    let rows = surface.execute(&validity_backfill(table)).await?;
    info!(rows, "Backfilled is_valid_geom");

    for res in H3_RESOLUTIONS {
        let rows = surface.execute(&h3_backfill(table, *res)).await?;
        info!(rows, resolution = res, "Backfilled h3 index");
    }

    Ok(())
}

/// Add a column if it does not exist. Adding an already-present column is a
/// no-op, never an error; returns whether the column was added.
pub async fn ensure_column<S: SqlSurface>(
    surface: &S,
    table: &TableRef,
    column: &str,
    sql_type: &str,
) -> Result<bool> {
    if surface.column_exists(table, column).await? {
        debug!(table = %table, column, "Column already present");
        return Ok(false);
    }

    surface
        .execute(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table.qualified(),
            column,
            sql_type
        ))
        .await?;
    info!(table = %table, column, "Added column");
    Ok(true)
}

fn point_geom_backfill(table: &TableRef) -> String {
    format!(
        "UPDATE {t} \
         SET point_geom = ST_SetSRID(ST_MakePoint(longitude, latitude), 4326) \
         WHERE point_geom IS NULL \
           AND longitude IS NOT NULL AND latitude IS NOT NULL",
        t = table.qualified()
    )
}

fn validity_backfill(table: &TableRef) -> String {
    format!(
        "UPDATE {t} \
         SET is_valid_geom = ST_IsValid(point_geom) \
         WHERE is_valid_geom IS NULL AND point_geom IS NOT NULL",
        t = table.qualified()
    )
}

fn h3_backfill(table: &TableRef, resolution: u8) -> String {
    format!(
        "UPDATE {t} \
         SET h3_res{r} = h3_lat_lng_to_cell(point_geom::point, {r}) \
         WHERE h3_res{r} IS NULL AND point_geom IS NOT NULL",
        t = table.qualified(),
        r = resolution
    )
}
