//! Aggregate stock repository
//!
//! The only module that writes the four aggregate tables. Mutations are
//! relative (`SET x = x + delta`) so row-level locks serialize concurrent
//! events, and seeding materializes every missing key with a zero value so
//! the deltas can rely on plain UPDATEs instead of upserts.
//!
//! Every function takes a `&mut PgConnection` and composes into the
//! caller's transaction: if the surrounding event fails, the deltas roll
//! back with it.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// ============================================================================
// Seeding
// ============================================================================

/// Seed zero-valued aggregate rows for a newly inserted party: one import
/// stock row per existing weight bucket and the party's in-process row.
pub async fn seed_party(conn: &mut PgConnection, party_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO import_stocks (party_id, weight_id, quantity)
        SELECT $1, w.id, 0
        FROM weights w
        WHERE NOT EXISTS (
            SELECT 1 FROM import_stocks s
            WHERE s.party_id = $1 AND s.weight_id = w.id
        )
        "#,
    )
    .bind(party_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO in_process_stocks (party_id, weight)
        SELECT $1, 0
        WHERE NOT EXISTS (
            SELECT 1 FROM in_process_stocks s WHERE s.party_id = $1
        )
        "#,
    )
    .bind(party_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Seed aggregate rows for a newly inserted weight bucket: one import stock
/// row per existing party and one export stock row per existing item.
pub async fn seed_weight(conn: &mut PgConnection, weight_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO import_stocks (party_id, weight_id, quantity)
        SELECT p.id, $1, 0
        FROM parties p
        WHERE NOT EXISTS (
            SELECT 1 FROM import_stocks s
            WHERE s.party_id = p.id AND s.weight_id = $1
        )
        "#,
    )
    .bind(weight_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO export_stocks (item_id, weight_id, quantity)
        SELECT i.id, $1, 0
        FROM items i
        WHERE NOT EXISTS (
            SELECT 1 FROM export_stocks s
            WHERE s.item_id = i.id AND s.weight_id = $1
        )
        "#,
    )
    .bind(weight_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Seed graded stock rows for a newly inserted section, one per existing
/// grade.
pub async fn seed_section(conn: &mut PgConnection, section_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO graded_stocks (section_id, grade_id, weight, pair)
        SELECT $1, g.id, 0, 0
        FROM grades g
        WHERE NOT EXISTS (
            SELECT 1 FROM graded_stocks s
            WHERE s.section_id = $1 AND s.grade_id = g.id
        )
        "#,
    )
    .bind(section_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Seed aggregate rows for a newly inserted item: one export stock row per
/// existing weight bucket, and graded stock rows for the item's section in
/// case any (section, grade) pairing is still missing.
pub async fn seed_item(conn: &mut PgConnection, item_id: Uuid, section_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO export_stocks (item_id, weight_id, quantity)
        SELECT $1, w.id, 0
        FROM weights w
        WHERE NOT EXISTS (
            SELECT 1 FROM export_stocks s
            WHERE s.item_id = $1 AND s.weight_id = w.id
        )
        "#,
    )
    .bind(item_id)
    .execute(&mut *conn)
    .await?;

    seed_section(conn, section_id).await
}

/// Seed graded stock rows for a newly inserted grade, one per existing
/// section.
pub async fn seed_grade(conn: &mut PgConnection, grade_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO graded_stocks (section_id, grade_id, weight, pair)
        SELECT s.id, $1, 0, 0
        FROM sections s
        WHERE NOT EXISTS (
            SELECT 1 FROM graded_stocks g
            WHERE g.section_id = s.id AND g.grade_id = $1
        )
        "#,
    )
    .bind(grade_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// ============================================================================
// Guarded deltas
// ============================================================================

/// Apply a signed delta to the unopened-bag count for (party, weight).
pub async fn import_stock_delta(
    conn: &mut PgConnection,
    party_id: Uuid,
    weight_id: Uuid,
    delta: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE import_stocks
        SET quantity = quantity + $3
        WHERE party_id = $1 AND weight_id = $2 AND quantity + $3 >= 0
        "#,
    )
    .bind(party_id)
    .bind(weight_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM import_stocks WHERE party_id = $1 AND weight_id = $2)",
        )
        .bind(party_id)
        .bind(weight_id)
        .fetch_one(&mut *conn)
        .await?;

        return Err(if exists {
            AppError::StockConflict(format!(
                "import stock for party {party_id} / weight {weight_id} would go negative"
            ))
        } else {
            AppError::IntegrityViolation(format!(
                "import stock row missing for party {party_id} / weight {weight_id}"
            ))
        });
    }

    Ok(())
}

/// Apply a signed delta to the party's opened in-process weight.
pub async fn in_process_delta(
    conn: &mut PgConnection,
    party_id: Uuid,
    delta: Decimal,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE in_process_stocks
        SET weight = weight + $2
        WHERE party_id = $1 AND weight + $2 >= 0
        "#,
    )
    .bind(party_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM in_process_stocks WHERE party_id = $1)",
        )
        .bind(party_id)
        .fetch_one(&mut *conn)
        .await?;

        return Err(if exists {
            AppError::StockConflict(format!(
                "in-process stock for party {party_id} would go negative"
            ))
        } else {
            AppError::IntegrityViolation(format!(
                "in-process stock row missing for party {party_id}"
            ))
        });
    }

    Ok(())
}

/// Apply signed weight/pair deltas to the (section, grade) graded stock.
pub async fn graded_stock_delta(
    conn: &mut PgConnection,
    section_id: Uuid,
    grade_id: Uuid,
    weight_delta: Decimal,
    pair_delta: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE graded_stocks
        SET weight = weight + $3, pair = pair + $4
        WHERE section_id = $1 AND grade_id = $2
          AND weight + $3 >= 0 AND pair + $4 >= 0
        "#,
    )
    .bind(section_id)
    .bind(grade_id)
    .bind(weight_delta)
    .bind(pair_delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM graded_stocks WHERE section_id = $1 AND grade_id = $2)",
        )
        .bind(section_id)
        .bind(grade_id)
        .fetch_one(&mut *conn)
        .await?;

        return Err(if exists {
            AppError::StockConflict(format!(
                "graded stock for section {section_id} / grade {grade_id} would go negative"
            ))
        } else {
            AppError::IntegrityViolation(format!(
                "graded stock row missing for section {section_id} / grade {grade_id}"
            ))
        });
    }

    Ok(())
}

/// Apply a signed delta to the export-ready bag count for (item, weight).
pub async fn export_stock_delta(
    conn: &mut PgConnection,
    item_id: Uuid,
    weight_id: Uuid,
    delta: i64,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE export_stocks
        SET quantity = quantity + $3
        WHERE item_id = $1 AND weight_id = $2 AND quantity + $3 >= 0
        "#,
    )
    .bind(item_id)
    .bind(weight_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM export_stocks WHERE item_id = $1 AND weight_id = $2)",
        )
        .bind(item_id)
        .bind(weight_id)
        .fetch_one(&mut *conn)
        .await?;

        return Err(if exists {
            AppError::StockConflict(format!(
                "export stock for item {item_id} / weight {weight_id} would go negative"
            ))
        } else {
            AppError::IntegrityViolation(format!(
                "export stock row missing for item {item_id} / weight {weight_id}"
            ))
        });
    }

    Ok(())
}

// ============================================================================
// Locked reads for in-transaction availability checks
// ============================================================================

/// Read and lock the party's in-process weight for the rest of the
/// transaction. The row must exist once the party is seeded.
pub async fn lock_in_process_weight(conn: &mut PgConnection, party_id: Uuid) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT weight FROM in_process_stocks WHERE party_id = $1 FOR UPDATE",
    )
    .bind(party_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::IntegrityViolation(format!("in-process stock row missing for party {party_id}"))
    })
}

/// Read and lock the (section, grade) graded stock for the rest of the
/// transaction.
pub async fn lock_graded_stock(
    conn: &mut PgConnection,
    section_id: Uuid,
    grade_id: Uuid,
) -> AppResult<(Decimal, i64)> {
    sqlx::query_as::<_, (Decimal, i64)>(
        r#"
        SELECT weight, pair FROM graded_stocks
        WHERE section_id = $1 AND grade_id = $2
        FOR UPDATE
        "#,
    )
    .bind(section_id)
    .bind(grade_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::IntegrityViolation(format!(
            "graded stock row missing for section {section_id} / grade {grade_id}"
        ))
    })
}
