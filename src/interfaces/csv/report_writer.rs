use crate::domain::account::SellerAccount;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow {
    user: u64,
    available: Decimal,
    reserved: Decimal,
    withdrawn: Decimal,
}

#[derive(Debug, Serialize)]
struct RequestRow<'a> {
    id: u64,
    user: u64,
    wallet: &'a str,
    wallet_phone: &'a str,
    amount: Decimal,
    fee: Decimal,
    actual_amount: Decimal,
    status: &'a str,
    transaction_id: &'a str,
    remarks: &'a str,
}

/// Renders money with at most two decimals and no trailing zeros.
fn money(value: Decimal) -> Decimal {
    value.round_dp(2).normalize()
}

/// Writes the final ledger or request state as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per seller, ordered by user id.
    pub fn write_accounts(&mut self, mut accounts: Vec<SellerAccount>) -> Result<()> {
        accounts.sort_by_key(|a| a.user_id);
        for account in accounts {
            self.writer.serialize(AccountRow {
                user: account.user_id.0,
                available: money(account.available.value()),
                reserved: money(account.reserved.value()),
                withdrawn: money(account.withdrawn.value()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per request, ordered by id.
    pub fn write_requests(&mut self, mut requests: Vec<WithdrawalRequest>) -> Result<()> {
        requests.sort_by_key(|r| r.withdraw_id);
        for request in &requests {
            self.writer.serialize(RequestRow {
                id: request.withdraw_id.0,
                user: request.user_id.0,
                wallet: request.wallet_name.as_str(),
                wallet_phone: request.wallet_phone_no.as_str(),
                amount: money(request.amount.value()),
                fee: money(request.transaction_fee),
                actual_amount: money(request.actual_amount),
                status: request.status.as_str(),
                transaction_id: request.transaction_id.as_deref().unwrap_or_default(),
                remarks: request.remarks.as_deref().unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
