//! Rolling cash-balance projection.
//!
//! For each period `i` in `1..=horizon`:
//!
//! ```text
//! inflow[i]  = run_rate_revenue * w_rev(i)  + collected(i)
//! outflow[i] = run_rate_cost    * w_cost(i) + paid(i)
//! closing[i] = closing[i-1] + inflow[i] - outflow[i],  closing[0] = current balance
//! ```
//!
//! Collections and payments drain the aged receivable/payable pools; a pool
//! never grows back. The weights ramp from a start value up to 1 so that early
//! periods lean on aging releases and later ones on the run-rate. This is a
//! heuristic, not an invoice-level simulation.

use crate::domain::records::OpenItem;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

pub const DUE_1W_DAYS: u64 = 7;
pub const DUE_4W_DAYS: u64 = 28;
pub const DEFAULT_HORIZON: usize = 12;
pub const DEFAULT_PERIOD_DAYS: u32 = 7;

/// Open amounts by due-date horizon, as positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AgingBuckets {
    /// Overdue or due within a week.
    pub due_1w: Decimal,
    pub due_4w: Decimal,
    /// Due later, or no due date.
    pub beyond: Decimal,
}

impl AgingBuckets {
    pub fn new(due_1w: Decimal, due_4w: Decimal, beyond: Decimal) -> Self {
        Self {
            due_1w,
            due_4w,
            beyond,
        }
    }

    /// Receivables are debit-positive.
    pub fn receivables(items: &[OpenItem], as_of: NaiveDate) -> Self {
        Self::from_items(items, as_of, Decimal::ONE)
    }

    /// Payables are credit-negative; the sign is flipped.
    pub fn payables(items: &[OpenItem], as_of: NaiveDate) -> Self {
        Self::from_items(items, as_of, Decimal::NEGATIVE_ONE)
    }

    fn from_items(items: &[OpenItem], as_of: NaiveDate, sign: Decimal) -> Self {
        let week = as_of.checked_add_days(Days::new(DUE_1W_DAYS));
        let month = as_of.checked_add_days(Days::new(DUE_4W_DAYS));
        let mut buckets = AgingBuckets::default();
        for item in items {
            let amount = item.residual_amount * sign;
            match item.due_date {
                Some(due) if week.is_some_and(|w| due <= w) => buckets.due_1w += amount,
                Some(due) if month.is_some_and(|m| due <= m) => buckets.due_4w += amount,
                _ => buckets.beyond += amount,
            }
        }
        // credit notes can outweigh a bucket; an empty pool cannot release anything
        AgingBuckets {
            due_1w: buckets.due_1w.max(Decimal::ZERO),
            due_4w: buckets.due_4w.max(Decimal::ZERO),
            beyond: buckets.beyond.max(Decimal::ZERO),
        }
    }

    pub fn total(&self) -> Decimal {
        self.due_1w + self.due_4w + self.beyond
    }

    fn as_array(&self) -> [Decimal; 3] {
        [self.due_1w, self.due_4w, self.beyond]
    }
}

/// How aged pools are released into cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// `due_1w` in period 1, `due_4w` spread over periods 2–4, `beyond` over 5–8.
    AgingSchedule,
    /// A fixed fraction of the remaining pool each period.
    ConstantRate {
        collection_rate: Decimal,
        payment_rate: Decimal,
    },
}

/// Release windows `(first_period, last_period)` per bucket for the aging schedule.
const SCHEDULE: [(usize, usize); 3] = [(1, 1), (2, 4), (5, 8)];

/// Linear ramp from `start` to 1 over `ramp_periods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightCurve {
    pub start: Decimal,
    pub ramp_periods: u32,
}

impl WeightCurve {
    pub fn new(start: Decimal, ramp_periods: u32) -> Self {
        Self {
            start,
            ramp_periods,
        }
    }

    pub fn at(&self, period: usize) -> Decimal {
        if self.ramp_periods == 0 {
            return Decimal::ONE;
        }
        let step = Decimal::from(period.saturating_sub(1) as u64);
        let w = self.start + (Decimal::ONE - self.start) * step / Decimal::from(self.ramp_periods);
        w.min(Decimal::ONE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastConfig {
    pub horizon: usize,
    pub period_days: u32,
    pub release: ReleaseMode,
    pub revenue_weight: WeightCurve,
    pub cost_weight: WeightCurve,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            period_days: DEFAULT_PERIOD_DAYS,
            release: ReleaseMode::AgingSchedule,
            revenue_weight: WeightCurve::new(dec!(0.25), 6),
            cost_weight: WeightCurve::new(dec!(0.5), 6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastPoint {
    pub period_index: usize,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub closing_balance: Decimal,
    pub receivables_remaining: Decimal,
    pub payables_remaining: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NegativeBalanceWarning {
    pub period_index: usize,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub opening_balance: Decimal,
    pub points: Vec<ForecastPoint>,
    /// `(period_index, closing_balance)` of the earliest lowest point.
    pub minimum: Option<(usize, Decimal)>,
    pub warning: Option<NegativeBalanceWarning>,
}

fn lowest_point(points: &[ForecastPoint]) -> Option<(usize, Decimal)> {
    points
        .iter()
        .fold(None, |best: Option<(usize, Decimal)>, p| match best {
            Some((_, balance)) if balance <= p.closing_balance => best,
            _ => Some((p.period_index, p.closing_balance)),
        })
}

/// Per-period revenue and cost rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunRate {
    pub revenue: Decimal,
    pub cost: Decimal,
}

impl RunRate {
    /// Scales a year-to-date total to one period.
    pub fn from_total(total: Decimal, elapsed_days: u32, period_days: u32) -> Decimal {
        if elapsed_days == 0 {
            return Decimal::ZERO;
        }
        (total * Decimal::from(period_days) / Decimal::from(elapsed_days)).round_dp(2)
    }

    pub fn from_totals(
        revenue_total: Decimal,
        cost_total: Decimal,
        elapsed_days: u32,
        period_days: u32,
    ) -> Self {
        Self {
            revenue: Self::from_total(revenue_total, elapsed_days, period_days),
            cost: Self::from_total(cost_total, elapsed_days, period_days),
        }
    }
}

struct Pool {
    initial: [Decimal; 3],
    remaining: [Decimal; 3],
}

impl Pool {
    fn new(buckets: AgingBuckets) -> Self {
        Self {
            initial: buckets.as_array(),
            remaining: buckets.as_array(),
        }
    }

    fn total(&self) -> Decimal {
        self.remaining.iter().copied().sum()
    }

    fn release_scheduled(&mut self, period: usize) -> Decimal {
        let mut released = Decimal::ZERO;
        for (bucket, (first, last)) in SCHEDULE.iter().enumerate() {
            if period < *first || period > *last {
                continue;
            }
            let amount = if period == *last {
                self.remaining[bucket]
            } else {
                let share = self.initial[bucket] / Decimal::from((last - first + 1) as u64);
                share.round_dp(2).min(self.remaining[bucket])
            };
            self.remaining[bucket] -= amount;
            released += amount;
        }
        released
    }

    fn release_rate(&mut self, rate: Decimal) -> Decimal {
        let mut wanted = (self.total() * rate).round_dp(2).min(self.total());
        let mut released = Decimal::ZERO;
        for slot in self.remaining.iter_mut() {
            let take = wanted.min(*slot);
            *slot -= take;
            wanted -= take;
            released += take;
        }
        released
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastEngine {
    pub config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn project(
        &self,
        current_balance: Decimal,
        receivables: AgingBuckets,
        payables: AgingBuckets,
        run_rate_revenue: Decimal,
        run_rate_cost: Decimal,
        horizon_count: usize,
    ) -> Projection {
        let mut receivable_pool = Pool::new(receivables);
        let mut payable_pool = Pool::new(payables);
        let mut balance = current_balance;
        let mut points = Vec::with_capacity(horizon_count);

        for period in 1..=horizon_count {
            let (collected, paid) = match self.config.release {
                ReleaseMode::AgingSchedule => (
                    receivable_pool.release_scheduled(period),
                    payable_pool.release_scheduled(period),
                ),
                ReleaseMode::ConstantRate {
                    collection_rate,
                    payment_rate,
                } => (
                    receivable_pool.release_rate(collection_rate),
                    payable_pool.release_rate(payment_rate),
                ),
            };

            let inflow = (run_rate_revenue * self.config.revenue_weight.at(period)).round_dp(2)
                + collected;
            let outflow =
                (run_rate_cost * self.config.cost_weight.at(period)).round_dp(2) + paid;
            balance = balance + inflow - outflow;

            points.push(ForecastPoint {
                period_index: period,
                inflow,
                outflow,
                closing_balance: balance,
                receivables_remaining: receivable_pool.total(),
                payables_remaining: payable_pool.total(),
            });
        }

        let minimum = lowest_point(&points);
        let warning = match minimum {
            Some((period_index, balance)) if balance < Decimal::ZERO => {
                tracing::warn!(
                    period = period_index,
                    balance = %balance,
                    "projected cash balance goes negative"
                );
                Some(NegativeBalanceWarning {
                    period_index,
                    balance,
                })
            }
            _ => None,
        };
        Projection {
            opening_balance: current_balance,
            points,
            minimum,
            warning,
        }
    }
}
