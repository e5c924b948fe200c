use crate::model::{
    date_range::{has_overlap, DateRange},
    id::{PaymentIntentId, RoomId},
    payment::CheckoutSession,
    reservation::{
        event::{CreateReservation, InitiateBooking, UpdatePendingReservation},
        Reservation,
    },
};
use crate::repository::reservation::ReservationRepository;
use crate::service::payment::PaymentIntentCoordinator;
use chrono::NaiveDate;
use derive_new::new;
use shared::error::{AppError, AppResult};
use std::sync::Arc;

// プロセッサへはマイナー通貨単位（セントなど）で金額を渡す
const MINOR_UNIT_FACTOR: i64 = 100;

// 予約フロー全体を組み立てる唯一のコンポーネント。
// 空き判定・台帳・決済 intent の各コンポーネントを順に呼び出す。
#[derive(new)]
pub struct BookingOrchestrator {
    reservations: Arc<dyn ReservationRepository>,
    payments: PaymentIntentCoordinator,
    currency: String,
}

impl BookingOrchestrator {
    // チェックアウト開始。Pending な予約レコードで日程を仮押さえし、
    // 決済用の client_secret を呼び出し側に返す。実際の請求は
    // プロセッサのホスト型 UI 上で行われる。
    pub async fn initiate_booking(&self, event: InitiateBooking) -> AppResult<CheckoutSession> {
        let total_price = event.date_range.nights() * event.nightly_price;
        let amount = total_price * MINOR_UNIT_FACTOR;

        // 渡された intent ID が自分の Pending ドラフトを指しているか確認する。
        // 他のゲストのドラフトを引き継ぐことはできない。
        let draft = match &event.payment_intent_id {
            Some(intent_id) => self
                .reservations
                .find_by_payment_intent_id(intent_id)
                .await?
                .filter(|r| r.guest_user_id == event.guest_user_id && !r.is_paid()),
            None => None,
        };

        let intent = self
            .payments
            .get_or_create_intent(
                draft.as_ref().map(|r| &r.payment_intent_id),
                amount,
                &self.currency,
            )
            .await?;

        if let Some(draft) = draft {
            if intent.id == draft.payment_intent_id {
                // intent を使い回せたので、台帳側のドラフトも日程と料金を差し替える
                self.reservations
                    .update_pending(UpdatePendingReservation::new(
                        intent.id.clone(),
                        event.date_range,
                        total_price,
                    ))
                    .await?;
                tracing::info!(
                    payment_intent_id = %intent.id,
                    room_id = %event.room_id,
                    "checkout resumed with existing intent"
                );
                return Ok(CheckoutSession::new(intent.id, intent.client_secret));
            }
        }

        let create = CreateReservation::new(
            event.room_id,
            event.guest_user_id,
            event.hotel_owner_user_id,
            event.date_range,
            total_price,
            intent.id.clone(),
        );
        match self.reservations.create(create).await {
            Ok(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.reservation_id,
                    payment_intent_id = %intent.id,
                    "checkout initiated"
                );
            }
            // 同時リクエストが先に同じ intent でレコードを作っていた場合は
            // エラーにせず、既存のチェックアウト文脈をそのまま返す
            Err(AppError::DuplicateIntent(_)) => {}
            Err(e) => return Err(e),
        }

        Ok(CheckoutSession::new(intent.id, intent.client_secret))
    }

    // プロセッサから支払い完了の通知を受けたあとの確定処理。
    // Pending で仮押さえしてから支払い完了までの間に、別のゲストが
    // 同じ日程を確定している可能性があるため、ここで再チェックする。
    pub async fn confirm_booking(
        &self,
        payment_intent_id: &PaymentIntentId,
    ) -> AppResult<Reservation> {
        let reservation = self
            .reservations
            .find_by_payment_intent_id(payment_intent_id)
            .await?
            .ok_or_else(|| {
                AppError::EntityNotFound(format!(
                    "payment intent（{payment_intent_id}）に対応する予約が見つかりませんでした。"
                ))
            })?;

        // プロセッサは完了通知を再送することがある。確定済みならそのまま返す。
        if reservation.is_paid() {
            return Ok(reservation);
        }

        // Paid 集合に対する事前チェック。競合の最終判定は mark_paid の
        // トランザクション内の再チェックが行う。
        let paid_ranges: Vec<DateRange> = self
            .reservations
            .list_by_room(&reservation.room_id, reservation.date_range.check_in())
            .await?
            .into_iter()
            .filter(Reservation::is_paid)
            .map(|r| r.date_range)
            .collect();
        if has_overlap(&reservation.date_range, &paid_ranges) {
            return Err(AppError::SlotNoLongerAvailable(format!(
                "ルーム（{}）の指定日程はすでに予約が確定しています。",
                reservation.room_id
            )));
        }

        let paid = self.reservations.mark_paid(payment_intent_id).await?;
        tracing::info!(
            reservation_id = %paid.reservation_id,
            room_id = %paid.room_id,
            "reservation confirmed"
        );
        Ok(paid)
    }

    // カレンダーの予約済み日を無効化する表示用の一覧。
    // Pending の仮押さえは表示をブロックしない。
    pub async fn paid_reservations(
        &self,
        room_id: &RoomId,
        after: NaiveDate,
    ) -> AppResult<Vec<Reservation>> {
        let reservations = self.reservations.list_by_room(room_id, after).await?;
        Ok(reservations
            .into_iter()
            .filter(Reservation::is_paid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::payment::PaymentGateway;
    use crate::model::id::{ReservationId, UserId};
    use crate::model::payment::{PaymentIntent, PaymentIntentStatus};
    use crate::model::reservation::PaymentStatus;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // Postgres 実装と同じ「チェックしてから書く」契約を 1 つのロックの
    // 下で満たすインメモリ台帳
    #[derive(Default)]
    struct InMemoryReservationRepository {
        rows: Mutex<Vec<Reservation>>,
    }

    impl InMemoryReservationRepository {
        fn all(&self) -> Vec<Reservation> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReservationRepository for InMemoryReservationRepository {
        async fn create(&self, event: CreateReservation) -> AppResult<Reservation> {
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|r| r.payment_intent_id == event.payment_intent_id)
            {
                return Err(AppError::DuplicateIntent(format!(
                    "payment intent（{}）に紐づく予約がすでに存在します。",
                    event.payment_intent_id
                )));
            }
            let reservation = Reservation {
                reservation_id: ReservationId::new(),
                room_id: event.room_id,
                guest_user_id: event.guest_user_id,
                hotel_owner_user_id: event.hotel_owner_user_id,
                date_range: event.date_range,
                total_price: event.total_price,
                payment_intent_id: event.payment_intent_id,
                payment_status: PaymentStatus::Pending,
                created_at: Utc::now(),
            };
            rows.push(reservation.clone());
            Ok(reservation)
        }

        async fn update_pending(
            &self,
            event: UpdatePendingReservation,
        ) -> AppResult<Reservation> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.payment_intent_id == event.payment_intent_id)
                .ok_or_else(|| {
                    AppError::EntityNotFound("specified reservation not found".into())
                })?;
            if row.is_paid() {
                return Err(AppError::UnprocessableEntity(
                    "支払い済みの予約は変更できません。".into(),
                ));
            }
            row.date_range = event.date_range;
            row.total_price = event.total_price;
            Ok(row.clone())
        }

        async fn find_by_payment_intent_id(
            &self,
            payment_intent_id: &PaymentIntentId,
        ) -> AppResult<Option<Reservation>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|r| &r.payment_intent_id == payment_intent_id)
                .cloned())
        }

        async fn list_by_room(
            &self,
            room_id: &RoomId,
            after: NaiveDate,
        ) -> AppResult<Vec<Reservation>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| &r.room_id == room_id && r.date_range.check_out() >= after)
                .cloned()
                .collect())
        }

        async fn mark_paid(&self, payment_intent_id: &PaymentIntentId) -> AppResult<Reservation> {
            let mut rows = self.rows.lock().unwrap();
            let idx = rows
                .iter()
                .position(|r| &r.payment_intent_id == payment_intent_id)
                .ok_or_else(|| {
                    AppError::EntityNotFound("specified reservation not found".into())
                })?;
            if rows[idx].is_paid() {
                return Ok(rows[idx].clone());
            }
            let (room_id, range, id) = (
                rows[idx].room_id.clone(),
                rows[idx].date_range,
                rows[idx].reservation_id,
            );
            let conflict = rows.iter().any(|r| {
                r.room_id == room_id
                    && r.reservation_id != id
                    && r.is_paid()
                    && r.date_range.overlaps(&range)
            });
            if conflict {
                return Err(AppError::SlotNoLongerAvailable(format!(
                    "ルーム（{room_id}）の指定日程はすでに予約が確定しています。"
                )));
            }
            rows[idx].payment_status = PaymentStatus::Paid;
            Ok(rows[idx].clone())
        }
    }

    #[derive(Default)]
    struct StubGateway {
        counter: AtomicUsize,
        intents: Mutex<Vec<PaymentIntent>>,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_intent(&self, amount: i64, _currency: &str) -> AppResult<PaymentIntent> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let intent = PaymentIntent::new(
                PaymentIntentId::from(format!("pi_stub_{n}")),
                format!("pi_stub_{n}_secret"),
                PaymentIntentStatus::RequiresPaymentMethod,
                amount,
            );
            self.intents.lock().unwrap().push(intent.clone());
            Ok(intent)
        }

        async fn update_intent(
            &self,
            intent_id: &PaymentIntentId,
            amount: i64,
        ) -> AppResult<PaymentIntent> {
            let mut intents = self.intents.lock().unwrap();
            let intent = intents
                .iter_mut()
                .find(|i| &i.id == intent_id)
                .expect("unknown intent");
            intent.amount = amount;
            Ok(intent.clone())
        }

        async fn retrieve_intent(
            &self,
            intent_id: &PaymentIntentId,
        ) -> AppResult<Option<PaymentIntent>> {
            let intents = self.intents.lock().unwrap();
            Ok(intents.iter().find(|i| &i.id == intent_id).cloned())
        }
    }

    struct Fixture {
        repo: Arc<InMemoryReservationRepository>,
        gateway: Arc<StubGateway>,
        orchestrator: Arc<BookingOrchestrator>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryReservationRepository::default());
        let gateway = Arc::new(StubGateway::default());
        let orchestrator = Arc::new(BookingOrchestrator::new(
            repo.clone(),
            PaymentIntentCoordinator::new(gateway.clone()),
            "usd".into(),
        ));
        Fixture {
            repo,
            gateway,
            orchestrator,
        }
    }

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    fn initiate_event(
        room: &str,
        guest: &str,
        date_range: DateRange,
        nightly_price: i64,
        intent: Option<&str>,
    ) -> InitiateBooking {
        InitiateBooking::new(
            RoomId::from(room),
            UserId::from(guest),
            UserId::from("owner-1"),
            date_range,
            nightly_price,
            intent.map(PaymentIntentId::from),
        )
    }

    // 1泊 100,000 のルームを 1/10〜1/12（2泊）で予約し、支払い完了まで通す
    #[tokio::test]
    async fn booking_end_to_end() {
        let f = fixture();

        let session = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let pending = f
            .repo
            .find_by_payment_intent_id(&session.payment_intent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.payment_status, PaymentStatus::Pending);
        assert_eq!(pending.total_price, 200_000);

        // プロセッサにはマイナー通貨単位で請求額が渡っている
        let intent = f
            .gateway
            .retrieve_intent(&session.payment_intent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(intent.amount, 20_000_000);

        let paid = f
            .orchestrator
            .confirm_booking(&session.payment_intent_id)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.total_price, 200_000);
    }

    // 支払い済み 1/10〜1/15 がある状態での 1/12〜1/14 は、
    // 仮押さえまでは通るが確定は拒否される
    #[tokio::test]
    async fn conflicting_confirm_is_rejected() {
        let f = fixture();

        let first = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 15)),
                100_000,
                None,
            ))
            .await
            .unwrap();
        f.orchestrator
            .confirm_booking(&first.payment_intent_id)
            .await
            .unwrap();

        // 仮押さえ自体はブロックされない
        let second = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-2",
                range((2024, 1, 12), (2024, 1, 14)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let res = f
            .orchestrator
            .confirm_booking(&second.payment_intent_id)
            .await;
        assert!(matches!(res, Err(AppError::SlotNoLongerAvailable(_))));

        // 確定に失敗した予約は Pending のまま残る
        let still_pending = f
            .repo
            .find_by_payment_intent_id(&second.payment_intent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_pending.payment_status, PaymentStatus::Pending);
    }

    // 日程を変えてチェックアウトをやり直しても intent は使い回され、
    // その intent に紐づく Pending レコードはちょうど 1 件のまま
    #[tokio::test]
    async fn resumed_checkout_reuses_intent() {
        let f = fixture();

        let first = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let second = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 20), (2024, 1, 23)),
                100_000,
                Some(first.payment_intent_id.as_str()),
            ))
            .await
            .unwrap();

        assert_eq!(first.payment_intent_id, second.payment_intent_id);

        let rows = f.repo.all();
        assert_eq!(rows.len(), 1);
        // ドラフトは新しい日程と料金に差し替わっている
        assert_eq!(rows[0].date_range, range((2024, 1, 20), (2024, 1, 23)));
        assert_eq!(rows[0].total_price, 300_000);

        // プロセッサ側の請求額も追従している
        let intent = f
            .gateway
            .retrieve_intent(&second.payment_intent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(intent.amount, 30_000_000);
    }

    // 未知の intent に対する確定要求は NotFound で、状態は一切変わらない
    #[tokio::test]
    async fn confirm_unknown_intent_is_not_found() {
        let f = fixture();

        let res = f
            .orchestrator
            .confirm_booking(&PaymentIntentId::from("pi_unknown"))
            .await;
        assert!(matches!(res, Err(AppError::EntityNotFound(_))));
        assert!(f.repo.all().is_empty());
    }

    // プロセッサは完了通知を再送することがある。2 回目の確定も
    // 同じ Paid レコードを返し、副作用は発生しない。
    #[tokio::test]
    async fn confirm_is_idempotent() {
        let f = fixture();

        let session = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let first = f
            .orchestrator
            .confirm_booking(&session.payment_intent_id)
            .await
            .unwrap();
        let second = f
            .orchestrator
            .confirm_booking(&session.payment_intent_id)
            .await
            .unwrap();

        assert_eq!(first.reservation_id, second.reservation_id);
        assert_eq!(second.payment_status, PaymentStatus::Paid);
        assert_eq!(f.repo.all().len(), 1);
    }

    // 同じルームの重なる日程をもつ 2 つの Pending 予約を同時に確定すると、
    // どちらか一方だけが Paid になる
    #[tokio::test]
    async fn concurrent_confirms_allow_exactly_one_winner() {
        let f = fixture();

        let first = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 14)),
                100_000,
                None,
            ))
            .await
            .unwrap();
        let second = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-2",
                range((2024, 1, 12), (2024, 1, 16)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let o1 = f.orchestrator.clone();
        let o2 = f.orchestrator.clone();
        let id1 = first.payment_intent_id.clone();
        let id2 = second.payment_intent_id.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { o1.confirm_booking(&id1).await }),
            tokio::spawn(async move { o2.confirm_booking(&id2).await }),
        );
        let results = [r1.unwrap(), r2.unwrap()];

        let paid = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::SlotNoLongerAvailable(_))))
            .count();
        assert_eq!(paid, 1);
        assert_eq!(rejected, 1);

        // 台帳側も Paid はちょうど 1 件
        let paid_rows = f
            .repo
            .all()
            .into_iter()
            .filter(Reservation::is_paid)
            .count();
        assert_eq!(paid_rows, 1);
    }

    // 予約確定後にルームの料金が変わっても、確定済みの total_price は動かない
    #[tokio::test]
    async fn total_price_is_captured_at_booking_time() {
        let f = fixture();

        let session = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();
        f.orchestrator
            .confirm_booking(&session.payment_intent_id)
            .await
            .unwrap();

        // 値上げ後の別ゲストの予約
        f.orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-2",
                range((2024, 2, 1), (2024, 2, 3)),
                150_000,
                None,
            ))
            .await
            .unwrap();

        let first = f
            .repo
            .find_by_payment_intent_id(&session.payment_intent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.total_price, 200_000);
    }

    // 同じ intent でレコードが先に作られていた場合（同時リクエストの競合）、
    // initiate はエラーにせず既存のチェックアウト文脈を返す
    #[tokio::test]
    async fn duplicate_intent_race_is_absorbed() {
        let f = fixture();

        // スタブの採番は pi_stub_1 から始まるため、同じ ID で先にレコードを作っておく
        f.repo
            .create(CreateReservation::new(
                RoomId::from("room-1"),
                UserId::from("guest-2"),
                UserId::from("owner-1"),
                range((2024, 1, 10), (2024, 1, 12)),
                200_000,
                PaymentIntentId::from("pi_stub_1"),
            ))
            .await
            .unwrap();

        let session = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(session.payment_intent_id.as_str(), "pi_stub_1");
        assert_eq!(f.repo.all().len(), 1);
    }

    // 表示用の一覧は Paid のみを返し、Pending の仮押さえは含めない
    #[tokio::test]
    async fn paid_listing_excludes_pending_holds() {
        let f = fixture();

        let confirmed = f
            .orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-1",
                range((2024, 1, 10), (2024, 1, 12)),
                100_000,
                None,
            ))
            .await
            .unwrap();
        f.orchestrator
            .confirm_booking(&confirmed.payment_intent_id)
            .await
            .unwrap();

        f.orchestrator
            .initiate_booking(initiate_event(
                "room-1",
                "guest-2",
                range((2024, 1, 20), (2024, 1, 22)),
                100_000,
                None,
            ))
            .await
            .unwrap();

        let listed = f
            .orchestrator
            .paid_reservations(
                &RoomId::from("room-1"),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_paid());

        // 過去の予約はアクティブな範囲から外れる
        let listed = f
            .orchestrator
            .paid_reservations(
                &RoomId::from("room-1"),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            )
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
