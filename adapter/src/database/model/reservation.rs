use chrono::{DateTime, NaiveDate, Utc};
use kernel::model::{
    date_range::DateRange,
    id::{PaymentIntentId, ReservationId, RoomId, UserId},
    reservation::{PaymentStatus, Reservation},
};
use shared::error::{AppError, AppResult};
use std::str::FromStr;

// reservations テーブルの 1 行をそのまま写した型
#[derive(sqlx::FromRow)]
pub struct ReservationRow {
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub guest_user_id: UserId,
    pub hotel_owner_user_id: UserId,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_price: i64,
    pub payment_intent_id: PaymentIntentId,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = AppError;

    fn try_from(value: ReservationRow) -> AppResult<Reservation> {
        let ReservationRow {
            reservation_id,
            room_id,
            guest_user_id,
            hotel_owner_user_id,
            check_in_date,
            check_out_date,
            total_price,
            payment_intent_id,
            payment_status,
            created_at,
        } = value;

        // CHECK 制約があるため通常は通るが、値の破損は変換エラーとして扱う
        let date_range = DateRange::new(check_in_date, check_out_date).map_err(|e| {
            AppError::ConversionEntityError(format!(
                "予約（{reservation_id}）の日付範囲が不正です: {e}"
            ))
        })?;
        let payment_status = PaymentStatus::from_str(&payment_status).map_err(|_| {
            AppError::ConversionEntityError(format!(
                "未知の支払いステータスです: {payment_status}"
            ))
        })?;

        Ok(Reservation {
            reservation_id,
            room_id,
            guest_user_id,
            hotel_owner_user_id,
            date_range,
            total_price,
            payment_intent_id,
            payment_status,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ReservationRow {
        ReservationRow {
            reservation_id: ReservationId::new(),
            room_id: RoomId::from("room-1"),
            guest_user_id: UserId::from("guest-1"),
            hotel_owner_user_id: UserId::from("owner-1"),
            check_in_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            check_out_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            total_price: 200_000,
            payment_intent_id: PaymentIntentId::from("pi_1"),
            payment_status: status.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn known_statuses_convert() {
        let pending = Reservation::try_from(row("pending")).unwrap();
        assert_eq!(pending.payment_status, PaymentStatus::Pending);

        let paid = Reservation::try_from(row("paid")).unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn unknown_status_is_a_conversion_error() {
        let res = Reservation::try_from(row("refunded"));
        assert!(matches!(res, Err(AppError::ConversionEntityError(_))));
    }
}
