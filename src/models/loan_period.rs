//! Loan period parsing (`"7 days"`, `"1 week 2 days"`, `"3h"`)
//!
//! Understands the interval words PostgreSQL accepts for the common units.
//! Months and years are calendar months; everything else is a fixed span.

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{AppError, AppResult};

/// Period used when the borrower does not ask for one.
pub const DEFAULT_LOAN_PERIOD: &str = "1 day";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPeriod {
    months: u32,
    span: Duration,
}

impl LoanPeriod {
    /// Parse a period; an empty string means [`DEFAULT_LOAN_PERIOD`].
    pub fn parse(input: &str) -> AppResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Self::parse(DEFAULT_LOAN_PERIOD);
        }

        let invalid = || AppError::InvalidInput(format!("invalid loan period: {}", input));

        let tokens = split_tokens(input);
        if tokens.is_empty() || tokens.len() % 2 != 0 {
            return Err(invalid());
        }

        let mut period = LoanPeriod {
            months: 0,
            span: Duration::zero(),
        };
        for pair in tokens.chunks(2) {
            let amount: u32 = pair[0].parse().map_err(|_| invalid())?;
            let amount_i64 = i64::from(amount);
            let span = match pair[1].as_str() {
                "s" | "sec" | "secs" | "second" | "seconds" => Duration::seconds(amount_i64),
                "m" | "min" | "mins" | "minute" | "minutes" => Duration::minutes(amount_i64),
                "h" | "hr" | "hrs" | "hour" | "hours" => Duration::hours(amount_i64),
                "d" | "day" | "days" => Duration::days(amount_i64),
                "w" | "week" | "weeks" => Duration::weeks(amount_i64),
                "mon" | "mons" | "month" | "months" => {
                    period.months = period.months.checked_add(amount).ok_or_else(invalid)?;
                    continue;
                }
                "y" | "yr" | "yrs" | "year" | "years" => {
                    let months = amount.checked_mul(12).ok_or_else(invalid)?;
                    period.months = period.months.checked_add(months).ok_or_else(invalid)?;
                    continue;
                }
                _ => return Err(invalid()),
            };
            period.span = period.span.checked_add(&span).ok_or_else(invalid)?;
        }

        if period.months == 0 && period.span == Duration::zero() {
            return Err(invalid());
        }
        Ok(period)
    }

    /// Due date for a loan issued at `issued_at`.
    pub fn due_from(&self, issued_at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        issued_at
            .checked_add_months(Months::new(self.months))
            .and_then(|at| at.checked_add_signed(self.span))
            .ok_or_else(|| AppError::InvalidInput("loan period too long".to_string()))
    }
}

/// Split "1 week2days" / "7d" into alternating number and unit tokens.
fn split_tokens(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for c in input.chars() {
        if c.is_whitespace() || c == ',' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let digit = c.is_ascii_digit();
        if !current.is_empty() && digit != in_digits {
            tokens.push(std::mem::take(&mut current));
        }
        in_digits = digit;
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
