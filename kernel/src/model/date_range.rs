use chrono::{DateTime, NaiveDate, Utc};
use shared::error::{AppError, AppResult};

// 宿泊期間を表す型。日単位で比較するため、時刻情報は持たない。
// check_in 当日から check_out 当日までをまるごと占有する（両端を含む）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<Self> {
        if check_in >= check_out {
            return Err(AppError::InvalidDateRange(format!(
                "チェックイン日（{check_in}）はチェックアウト日（{check_out}）より前である必要があります。"
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    // タイムスタンプ付きの入力は日付に正規化してから範囲をつくる。
    // チェックアウト当日の何時に退室しても、同日のチェックインとは
    // 時刻の差では衝突しない（日単位の判定のみ行う）。
    pub fn from_timestamps(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> AppResult<Self> {
        Self::new(check_in.date_naive(), check_out.date_naive())
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    // 宿泊数はカレンダー上の日数差
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    // 両端を含む重なり判定。チェックアウト日とチェックインが同日でも
    // その日を共有するため重なりとみなす。
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in <= other.check_out && self.check_out >= other.check_in
    }
}

pub fn has_overlap(candidate: &DateRange, existing: &[DateRange]) -> bool {
    existing.iter().any(|range| candidate.overlaps(range))
}
