//! Billing Domain - Patient Account Ledger
//!
//! This crate keeps the financial record of a patient's episode of care,
//! from admission to discharge.
//!
//! # Account lifecycle
//!
//! - **Open**: services, products and advances are appended to an
//!   append-only ledger; partial payments are accepted; totals are derived
//!   live from the rows.
//! - **Closed**: terminal. Closing freezes a snapshot of the totals and, when
//!   a debt remains, an elevated actor may carry it into a receivable (CPC).
//!   A closed account's figures come solely from its snapshot.
//!
//! # Balance
//!
//! ```text
//! pending = (advance + partial payments) - (services + products)
//! ```
//!
//! Positive means credit in favour of the patient, negative means debt.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{AccountService, CloseRequest, EntryKind, NewEntry};
//!
//! let service = AccountService::new(store);
//! let account = service.open_account("PAT-001", Currency::MXN, &receptionist).await?;
//!
//! service.append_entry(account.id, NewEntry::advance(dec!(10000)), &cashier).await?;
//! service.append_entry(account.id, NewEntry::new(EntryKind::Service, dec!(2), dec!(1500)), &nurse).await?;
//!
//! let outcome = service.close(account.id, CloseRequest::settled(), &cashier).await?;
//! assert_eq!(outcome.totals.pending_balance.amount(), dec!(7000));
//! ```

pub mod account;
pub mod ledger;
pub mod payment;
pub mod balance;
pub mod closure;
pub mod receivable;
pub mod ports;
pub mod service;
pub mod error;

pub use account::{AccountState, AccountStatus, PatientAccount, TotalsSnapshot};
pub use ledger::{EntryKind, LedgerEntry, NewEntry};
pub use payment::{Payment, PaymentKind, PaymentMethod};
pub use balance::{AccountTotals, BalanceOptions, TotalsSource};
pub use closure::{CloseRequest, ClosurePlan};
pub use receivable::{ReceivablePayment, ReceivableQuery, ReceivableRecord, ReceivableState};
pub use ports::{LedgerStore, LedgerTx};
pub use service::{AccountService, AccountStatement, ClosureOutcome};
pub use error::BillingError;
