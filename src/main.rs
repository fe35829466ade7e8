use chrono::{Duration, Utc};
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use reseller_payouts::application::withdrawal::WithdrawalDraft;
use reseller_payouts::config::Config;
use reseller_payouts::domain::query::RequestQuery;
use reseller_payouts::domain::session::{Session, UserId};
use reseller_payouts::error::PayoutError;
use reseller_payouts::infrastructure::system::FixedOtpGenerator;
use reseller_payouts::interfaces::api::{
    ApiResponse, ApproveWithdrawRequest, Gateways, MarketplaceApi, RejectWithdrawRequest, Stores,
};
use reseller_payouts::interfaces::csv::operation_reader::{Operation, OperationReader};
use reseller_payouts::interfaces::csv::report_writer::ReportWriter;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Report {
    Requests,
    Accounts,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operations CSV file to replay
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON config file overriding the default limits and fee schedule
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send this verification code instead of a random one
    #[arg(long)]
    otp_code: Option<String>,

    /// Final state printed to stdout
    #[arg(long, value_enum, default_value_t = Report::Requests)]
    report: Report,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use reseller_payouts::infrastructure::rocksdb::RocksDBStore;

    let mut stores = Stores::in_memory();
    if let Some(db_path) = db_path {
        let store = Arc::new(RocksDBStore::open(db_path).into_diagnostic()?);
        stores.accounts = store.clone();
        stores.wallets = store.clone();
        stores.withdrawals = store;
    }
    Ok(stores)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if let Some(db_path) = db_path {
        warn!(
            path = %db_path.display(),
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Stores::in_memory())
}

/// Outcome of one replayed row, stripped of its payload.
struct Outcome {
    success: bool,
    status_code: u16,
    message: Option<String>,
}

impl<T> From<ApiResponse<T>> for Outcome {
    fn from(response: ApiResponse<T>) -> Self {
        Self {
            success: response.success,
            status_code: response.status_code,
            message: response.message,
        }
    }
}

/// Replays operations against the facade with one session per user.
struct Replay {
    api: MarketplaceApi,
    phones: HashMap<UserId, String>,
    otp_code: Option<String>,
}

impl Replay {
    fn seller(&self, user: UserId) -> Session {
        let phone = self.phones.get(&user).cloned().unwrap_or_default();
        Session::seller(user, format!("seller-{user}"), phone, Utc::now() + Duration::hours(1))
    }

    fn admin(&self, user: UserId) -> Session {
        Session::admin(user, format!("admin-{user}"), Utc::now() + Duration::hours(1))
    }

    async fn apply(&mut self, operation: Operation) -> Outcome {
        match operation {
            Operation::Credit { user, amount, phone } => {
                if let Some(phone) = phone {
                    self.phones.insert(user, phone);
                }
                self.api.credit_profit(user, amount).await.into()
            }
            Operation::SendOtp { user, phone } => {
                let session = self.seller(user);
                self.api.send_wallet_otp(Some(&session), &phone).await.into()
            }
            Operation::VerifyOtp { user, phone, code } => {
                let session = self.seller(user);
                match code.or_else(|| self.otp_code.clone()) {
                    Some(code) => self
                        .api
                        .verify_wallet_otp(Some(&session), &phone, &code)
                        .await
                        .into(),
                    None => ApiResponse::<()>::failure(&PayoutError::ValidationError(
                        "verification code is required".to_string(),
                    ))
                    .into(),
                }
            }
            Operation::AddWallet { user, wallet, phone } => {
                let session = self.seller(user);
                self.api.add_wallet(Some(&session), &phone, &wallet).await.into()
            }
            Operation::Withdraw {
                user,
                amount,
                wallet,
                phone,
                idempotency_key,
            } => {
                let session = self.seller(user);
                let draft = WithdrawalDraft {
                    amount,
                    wallet_name: wallet,
                    wallet_phone_no: phone,
                    idempotency_key,
                };
                self.api.request_withdraw(Some(&session), draft).await.into()
            }
            Operation::Approve {
                admin,
                request,
                transaction_id,
                transaction_phone_no,
                remarks,
            } => {
                let session = self.admin(admin);
                let request = ApproveWithdrawRequest {
                    id: request,
                    transaction_id,
                    transaction_phone_no,
                    remarks,
                };
                self.api.approve_withdraw(Some(&session), request).await.into()
            }
            Operation::Reject {
                admin,
                request,
                remarks,
            } => {
                let session = self.admin(admin);
                let request = RejectWithdrawRequest { id: request, remarks };
                self.api.reject_withdraw(Some(&session), request).await.into()
            }
            Operation::Cancel { user, request } => {
                let session = self.seller(user);
                self.api.cancel_withdraw(Some(&session), request).await.into()
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).into_diagnostic()?,
        None => Config::default(),
    };
    let stores = open_stores(cli.db_path)?;

    let mut gateways = Gateways::default();
    if let Some(code) = &cli.otp_code {
        gateways.otp_generator = Arc::new(FixedOtpGenerator::new(code.clone()));
    }

    let mut replay = Replay {
        api: MarketplaceApi::new(stores.clone(), gateways, &config),
        phones: HashMap::new(),
        otp_code: cli.otp_code,
    };

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut failed = 0usize;
    for (index, row) in reader.operations().enumerate() {
        let row_no = index + 1;
        match row {
            Ok(operation) => {
                let user = operation.user();
                let outcome = replay.apply(operation).await;
                if !outcome.success {
                    failed += 1;
                    warn!(
                        row = row_no,
                        user_id = %user,
                        status_code = outcome.status_code,
                        reason = outcome.message.as_deref().unwrap_or_default(),
                        "operation failed"
                    );
                }
            }
            Err(e) => {
                failed += 1;
                warn!(row = row_no, error = %e, "invalid operation row");
            }
        }
    }
    info!(failed, "replay finished");

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Accounts => {
            let accounts = stores.accounts.get_all().await.into_diagnostic()?;
            writer.write_accounts(accounts).into_diagnostic()?;
        }
        Report::Requests => {
            let page = stores
                .withdrawals
                .query(&RequestQuery::new(u32::MAX))
                .await
                .into_diagnostic()?;
            writer.write_requests(page.requests).into_diagnostic()?;
        }
    }

    Ok(())
}
