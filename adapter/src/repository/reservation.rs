use crate::database::{model::reservation::ReservationRow, ConnectionPool};
use async_trait::async_trait;
use chrono::NaiveDate;
use derive_new::new;
use kernel::model::{
    id::{PaymentIntentId, ReservationId, RoomId},
    reservation::{
        event::{CreateReservation, UpdatePendingReservation},
        PaymentStatus, Reservation,
    },
};
use kernel::repository::reservation::ReservationRepository;
use shared::error::{AppError, AppResult};

#[derive(new)]
pub struct ReservationRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl ReservationRepository for ReservationRepositoryImpl {
    // 予約操作を行う
    async fn create(&self, event: CreateReservation) -> AppResult<Reservation> {
        let mut tx = self.db.begin().await?;

        // トランザクション分離レベルを SERIALIZABLE に設定する
        self.set_transaction_serializable(&mut tx).await?;

        // 事前のチェックとして、同じ payment intent に紐づく予約が
        // すでに存在しないかを調べる。チェックアウトのリトライが
        // 二重にレコードを作るのを防ぐためのガードである。
        {
            let existing = sqlx::query_scalar::<_, ReservationId>(
                r#"
                SELECT reservation_id
                FROM reservations
                WHERE payment_intent_id = $1
                "#,
            )
            .bind(event.payment_intent_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            if existing.is_some() {
                return Err(AppError::DuplicateIntent(format!(
                    "payment intent（{}）に紐づく予約がすでに存在します。",
                    event.payment_intent_id
                )));
            }
        }

        // 予約処理を行う、すなわち reservations テーブルにレコードを追加する。
        // この時点では Pending（日程の仮押さえ）である。
        let reservation_id = ReservationId::new();
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
                INSERT INTO reservations
                (reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING
                reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status, created_at
                ;
            "#,
        )
        .bind(reservation_id.raw())
        .bind(event.room_id.as_str())
        .bind(event.guest_user_id.as_str())
        .bind(event.hotel_owner_user_id.as_str())
        .bind(event.date_range.check_in())
        .bind(event.date_range.check_out())
        .bind(event.total_price)
        .bind(event.payment_intent_id.as_str())
        .bind(PaymentStatus::Pending.as_ref())
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;

        row.try_into()
    }

    // intent を使い回したチェックアウト再開時のドラフト差し替え
    async fn update_pending(&self, event: UpdatePendingReservation) -> AppResult<Reservation> {
        let mut tx = self.db.begin().await?;

        self.set_transaction_serializable(&mut tx).await?;

        // 対象レコードの存在と、まだ Pending であることを確認する
        {
            let status = sqlx::query_scalar::<_, String>(
                r#"
                SELECT payment_status
                FROM reservations
                WHERE payment_intent_id = $1
                FOR UPDATE
                "#,
            )
            .bind(event.payment_intent_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            match status.as_deref() {
                None => {
                    return Err(AppError::EntityNotFound(format!(
                        "payment intent（{}）に対応する予約が見つかりませんでした。",
                        event.payment_intent_id
                    )))
                }
                Some("pending") => {}
                Some(_) => {
                    return Err(AppError::UnprocessableEntity(
                        "支払い済みの予約は変更できません。".into(),
                    ))
                }
            }
        }

        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
                UPDATE reservations
                SET
                    check_in_date = $2,
                    check_out_date = $3,
                    total_price = $4
                WHERE payment_intent_id = $1
                RETURNING
                reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status, created_at
                ;
            "#,
        )
        .bind(event.payment_intent_id.as_str())
        .bind(event.date_range.check_in())
        .bind(event.date_range.check_out())
        .bind(event.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;

        row.try_into()
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &PaymentIntentId,
    ) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT
                reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status, created_at
                FROM reservations
                WHERE payment_intent_id = $1
                ;
            "#,
        )
        .bind(payment_intent_id.as_str())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.map(Reservation::try_from).transpose()
    }

    // チェックアウト日が after 以降の予約一覧を取得する
    async fn list_by_room(&self, room_id: &RoomId, after: NaiveDate) -> AppResult<Vec<Reservation>> {
        sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT
                reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status, created_at
                FROM reservations
                WHERE room_id = $1
                  AND check_out_date >= $2
                ORDER BY check_in_date ASC
                ;
            "#,
        )
        .bind(room_id.as_str())
        .bind(after)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    // Pending → Paid の確定処理を行う
    async fn mark_paid(&self, payment_intent_id: &PaymentIntentId) -> AppResult<Reservation> {
        let mut tx = self.db.begin().await?;

        // 重なり確認とステータス更新を 1 つのトランザクションで行い、
        // 同一ルームに対する確定処理を直列化する
        self.set_transaction_serializable(&mut tx).await?;

        // 事前のチェックとして、以下を調べる。
        // - 指定の payment intent に対応する予約が存在するか
        // - 存在した場合、すでに確定済みではないか
        // - 同じルームの他の確定済み予約と日程が重なっていないか
        let reservation = {
            let row = sqlx::query_as::<_, ReservationRow>(
                r#"
                SELECT
                reservation_id, room_id, guest_user_id, hotel_owner_user_id,
                check_in_date, check_out_date, total_price,
                payment_intent_id, payment_status, created_at
                FROM reservations
                WHERE payment_intent_id = $1
                FOR UPDATE
                "#,
            )
            .bind(payment_intent_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            let Some(row) = row else {
                return Err(AppError::EntityNotFound(format!(
                    "payment intent（{payment_intent_id}）に対応する予約が見つかりませんでした。"
                )));
            };
            let reservation: Reservation = row.try_into()?;

            // プロセッサが確認コールバックを再送してきた場合。
            // すでに確定済みなので何もせずそのまま返す。
            if reservation.is_paid() {
                return Ok(reservation);
            }

            // 希望日程が確定済みの予約と重なっていないか確認する。
            // 重複条件（両端を含む日単位の判定）：
            //     existing.check_in <= new.check_out AND existing.check_out >= new.check_in
            let conflict = sqlx::query_scalar::<_, ReservationId>(
                r#"
                SELECT reservation_id
                FROM reservations
                WHERE room_id = $1
                  AND reservation_id <> $2
                  AND payment_status = 'paid'
                  AND check_in_date <= $4
                  AND check_out_date >= $3
                LIMIT 1;
                "#,
            )
            .bind(reservation.room_id.as_str())
            .bind(reservation.reservation_id.raw())
            .bind(reservation.date_range.check_in())
            .bind(reservation.date_range.check_out())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            if conflict.is_some() {
                return Err(AppError::SlotNoLongerAvailable(format!(
                    "ルーム（{}）の指定日程はすでに予約が確定しています。",
                    reservation.room_id
                )));
            }

            reservation
        };

        let res = sqlx::query(
            r#"
                UPDATE reservations
                SET payment_status = 'paid'
                WHERE payment_intent_id = $1
                  AND payment_status = 'pending'
                ;
            "#,
        )
        .bind(payment_intent_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No reservation record has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(Reservation {
            payment_status: PaymentStatus::Paid,
            ..reservation
        })
    }
}

impl ReservationRepositoryImpl {
    // create, update_pending, mark_paid メソッドでのトランザクションを
    // 利用するにあたり、トランザクション分離レベルを SERIALIZABLE にするために
    // 内部的に使うメソッド
    async fn set_transaction_serializable(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> AppResult<()> {
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(())
    }
}
