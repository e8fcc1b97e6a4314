use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, Money, PaymentId, RoomId, StayDates, UserId};
use outbox::NewOutboxEvent;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    Booking, BookingRepository, BookingStatus, CheckoutStore, InventoryRestorer, Payment,
    PaymentRepository, PaymentStatus, PaymentUpdate, Result, StoreError,
};

const IDEMPOTENCY_CONSTRAINT: &str = "payments_idempotency_key_unique";

const BOOKING_COLUMNS: &str =
    "id, user_id, room_id, check_in, check_out, total_price_cents, status, created_at";

const PAYMENT_COLUMNS: &str = "id, booking_id, amount_cents, currency, status, idempotency_key, \
     gateway_ref, failure_reason, created_at, updated_at";

/// PostgreSQL-backed booking, payment and inventory store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a booking row.
    pub async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, room_id, check_in, check_out, total_price_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.user_id.as_str())
        .bind(booking.room_id.as_uuid())
        .bind(booking.stay.check_in)
        .bind(booking.stay.check_out)
        .bind(booking.total_price.cents())
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets the available units for every night of `stay`.
    pub async fn set_available(&self, room_id: RoomId, stay: StayDates, units: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO room_inventory (room_id, night, available)
            SELECT $1, d::date, $4
            FROM generate_series($2::date, $3::date - 1, interval '1 day') AS d
            ON CONFLICT (room_id, night) DO UPDATE SET available = EXCLUDED.available
            "#,
        )
        .bind(room_id.as_uuid())
        .bind(stay.check_in)
        .bind(stay.check_out)
        .bind(units)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns the available units for one night, zero if never stocked.
    pub async fn available(&self, room_id: RoomId, night: NaiveDate) -> Result<i32> {
        let units = sqlx::query_scalar::<_, i32>(
            "SELECT available FROM room_inventory WHERE room_id = $1 AND night = $2",
        )
        .bind(room_id.as_uuid())
        .bind(night)
        .fetch_optional(&self.pool)
        .await?;
        Ok(units.unwrap_or(0))
    }
}

fn parse_status<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(StoreError::Corrupt)
}

fn row_to_booking(row: PgRow) -> Result<Booking> {
    let check_in: NaiveDate = row.try_get("check_in")?;
    let check_out: NaiveDate = row.try_get("check_out")?;
    let stay = StayDates::new(check_in, check_out)
        .ok_or_else(|| StoreError::Corrupt(format!("stay {check_in}..{check_out}")))?;
    let status: String = row.try_get("status")?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        room_id: RoomId::from_uuid(row.try_get::<Uuid, _>("room_id")?),
        stay,
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    let status: String = row.try_get("status")?;

    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        currency: row.try_get("currency")?,
        status: parse_status(&status)?,
        idempotency_key: row.try_get("idempotency_key")?,
        gateway_ref: row.try_get("gateway_ref")?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Maps a unique violation on the idempotency key to its own error.
fn map_insert_error(err: sqlx::Error, key: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db.constraint() == Some(IDEMPOTENCY_CONSTRAINT)
    {
        return StoreError::DuplicateIdempotencyKey(key.to_string());
    }
    StoreError::Database(err)
}

async fn insert_payment<'c, E>(executor: E, payment: &Payment) -> Result<Payment>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO payments (id, booking_id, amount_cents, currency, status, idempotency_key,
                              gateway_ref, failure_reason, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment.id.as_uuid())
    .bind(payment.booking_id.as_uuid())
    .bind(payment.amount.cents())
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.idempotency_key)
    .bind(&payment.gateway_ref)
    .bind(&payment.failure_reason)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .fetch_one(executor)
    .await
    .map_err(|e| map_insert_error(e, &payment.idempotency_key))?;

    row_to_payment(row)
}

/// Returns false if no row matched: the payment is missing, or terminal with
/// a different status.
async fn apply_payment_update<'c, E>(
    executor: E,
    id: PaymentId,
    update: &PaymentUpdate,
) -> Result<bool>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = $2,
            gateway_ref = COALESCE($3, gateway_ref),
            failure_reason = COALESCE($4, failure_reason),
            updated_at = NOW()
        WHERE id = $1
          AND (status NOT IN ('succeeded', 'failed', 'timed_out', 'refunded') OR status = $2)
        "#,
    )
    .bind(id.as_uuid())
    .bind(update.status.as_str())
    .bind(&update.gateway_ref)
    .bind(&update.failure_reason)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn restore_nights<'c, E>(executor: E, room_id: RoomId, stay: StayDates) -> Result<()>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO room_inventory (room_id, night, available)
        SELECT $1, d::date, 1
        FROM generate_series($2::date, $3::date - 1, interval '1 day') AS d
        ON CONFLICT (room_id, night) DO UPDATE SET available = room_inventory.available + 1
        "#,
    )
    .bind(room_id.as_uuid())
    .bind(stay.check_in)
    .bind(stay.check_out)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl BookingRepository for PostgresStore {
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_booking).transpose()
    }

    async fn update_booking_status(&self, id: BookingId, status: BookingStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = $2
            WHERE id = $1
              AND (status NOT IN ('confirmed', 'failed', 'cancelled') OR status = $2)
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_booking(id).await? {
                Some(current) => Err(StoreError::status_conflict("Booking", id, current.status)),
                None => Err(StoreError::not_found("Booking", id)),
            };
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn create_payment(&self, payment: Payment) -> Result<Payment> {
        insert_payment(&self.pool, &payment).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_payment).transpose()
    }

    async fn update_payment_status(&self, id: PaymentId, update: PaymentUpdate) -> Result<()> {
        if apply_payment_update(&self.pool, id, &update).await? {
            return Ok(());
        }
        match self.get_payment(id).await? {
            Some(current) => Err(StoreError::status_conflict("Payment", id, current.status)),
            None => Err(StoreError::not_found("Payment", id)),
        }
    }
}

#[async_trait]
impl CheckoutStore for PostgresStore {
    #[instrument(skip(self, payment, event), fields(payment_id = %payment.id))]
    async fn begin_checkout(
        &self,
        booking_id: BookingId,
        payment: Payment,
        event: NewOutboxEvent,
    ) -> Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let current: BookingStatus = match current {
            Some(raw) => parse_status(&raw)?,
            None => return Err(StoreError::not_found("Booking", booking_id)),
        };
        if !current.can_start_checkout() {
            return Err(StoreError::status_conflict("Booking", booking_id, current));
        }

        let created = insert_payment(&mut *tx, &payment).await?;
        outbox::postgres::insert_event(&mut *tx, &event).await?;

        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(booking_id.as_uuid())
            .bind(BookingStatus::AwaitingPayment.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self, update, event), fields(status = %update.status))]
    async fn record_payment_outcome(
        &self,
        payment_id: PaymentId,
        update: PaymentUpdate,
        event: NewOutboxEvent,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let current: PaymentStatus = match current {
            Some(raw) => parse_status(&raw)?,
            None => return Err(StoreError::not_found("Payment", payment_id)),
        };
        if current.is_terminal() {
            return Err(StoreError::status_conflict("Payment", payment_id, current));
        }

        apply_payment_update(&mut *tx, payment_id, &update).await?;
        outbox::postgres::insert_event(&mut *tx, &event).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryRestorer for PostgresStore {
    async fn restore(&self, room_id: RoomId, stay: StayDates) -> Result<()> {
        restore_nights(&self.pool, room_id, stay).await
    }

    async fn restore_booking(&self, booking: &Booking) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "INSERT INTO inventory_releases (booking_id) VALUES ($1) ON CONFLICT (booking_id) DO NOTHING",
        )
        .bind(booking.id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;
        if !claimed {
            return Ok(false);
        }

        restore_nights(&mut *tx, booking.room_id, booking.stay).await?;

        tx.commit().await?;
        Ok(true)
    }
}
