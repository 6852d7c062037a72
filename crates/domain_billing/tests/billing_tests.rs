//! Tests for domain_billing's pure rules

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Actor, Currency, ErrorKind, PatientAccountId, PortError};

use domain_billing::balance::{compute_totals, live_totals, snapshot_totals};
use domain_billing::closure::plan_closure;
use domain_billing::{
    AccountState, AccountStatus, BalanceOptions, BillingError, CloseRequest, EntryKind, LedgerEntry,
    NewEntry, PatientAccount, Payment, PaymentMethod, ReceivableRecord, ReceivableState, TotalsSource,
};
use test_utils::{
    assert_balance_identity, assert_billing_error, assert_money_eq, assert_money_negative, assert_money_zero,
    new_entry_strategy, positive_amount_strategy, ActorFixtures, LedgerFixtures, LedgerScenario,
    LedgerScenarioBuilder, MoneyFixtures,
};

/// Advance 10000, services 3000, products 2000
fn reference_scenario() -> LedgerScenario {
    LedgerScenarioBuilder::new()
        .advance(dec!(10000))
        .service(dec!(2), dec!(1500))
        .product(dec!(4), dec!(500))
        .build()
        .unwrap()
}

fn close_settled(account: &mut PatientAccount) {
    let totals = live_totals(account, &[], &[], BalanceOptions::default()).unwrap();
    let plan = plan_closure(account, &totals, &CloseRequest::settled(), &ActorFixtures::cashier(), Utc::now()).unwrap();
    account.close(plan.snapshot, plan.closed_at).unwrap();
}

// ============================================================================
// Balance Tests
// ============================================================================

mod balance_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_scenario() {
        let scenario = reference_scenario();
        let totals = compute_totals(&scenario.account, &scenario.entries, &[], BalanceOptions::default()).unwrap();

        assert_money_eq(&totals.total_account, dec!(5000));
        assert_money_eq(&totals.pending_balance, dec!(5000));
        assert_balance_identity(&totals);
    }

    #[test]
    fn test_closed_account_ignores_rows() {
        let scenario = reference_scenario();
        let cashier = ActorFixtures::cashier();
        let totals = live_totals(&scenario.account, &scenario.entries, &[], BalanceOptions::default()).unwrap();
        let plan = plan_closure(&scenario.account, &totals, &CloseRequest::settled(), &cashier, Utc::now()).unwrap();

        let mut closed = scenario.account.clone();
        closed.close(plan.snapshot.clone(), plan.closed_at).unwrap();

        let mut later = scenario.entries.clone();
        later.push(LedgerEntry::record(&scenario.account, NewEntry::new(EntryKind::Service, dec!(1), dec!(2500)), &cashier).unwrap());
        let late_payment = Payment::partial(&scenario.account, dec!(75), PaymentMethod::Cash, &cashier).unwrap();

        let frozen = compute_totals(&closed, &later, &[late_payment], BalanceOptions::default()).unwrap();
        assert_eq!(frozen.source, TotalsSource::Snapshot);
        assert_money_eq(&frozen.total_account, dec!(5000));
        assert_money_eq(&frozen.pending_balance, dec!(5000));
        assert_eq!(frozen, snapshot_totals(Currency::MXN, &plan.snapshot).unwrap());
    }

    #[test]
    fn test_partial_payments_reduce_debt() {
        let scenario = LedgerScenarioBuilder::new()
            .advance(dec!(500))
            .service(dec!(1), dec!(1200))
            .partial_payment(dec!(200))
            .build()
            .unwrap();
        let totals =
            compute_totals(&scenario.account, &scenario.entries, &scenario.payments, BalanceOptions::default()).unwrap();

        assert_money_eq(&totals.total_partial_payments, dec!(200));
        assert_money_eq(&totals.pending_balance, dec!(-500));
        assert_money_negative(&totals.pending_balance);
        assert!(totals.has_debt());
    }

    #[test]
    fn test_legacy_advance_used_only_without_advance_rows() {
        let legacy_only = LedgerScenarioBuilder::new()
            .with_legacy_advance(dec!(2000))
            .service(dec!(1), dec!(500))
            .build()
            .unwrap();
        let totals = compute_totals(&legacy_only.account, &legacy_only.entries, &[], BalanceOptions::default()).unwrap();
        assert_money_eq(&totals.advance, dec!(2000));
        assert_money_eq(&totals.pending_balance, dec!(1500));

        let without_fallback = BalanceOptions { legacy_advance_fallback: false };
        let totals = compute_totals(&legacy_only.account, &legacy_only.entries, &[], without_fallback).unwrap();
        assert_money_zero(&totals.advance);

        let with_rows = LedgerScenarioBuilder::new()
            .with_legacy_advance(dec!(2000))
            .advance(dec!(300))
            .service(dec!(1), dec!(300))
            .build()
            .unwrap();
        let totals = compute_totals(&with_rows.account, &with_rows.entries, &[], BalanceOptions::default()).unwrap();
        assert_money_eq(&totals.advance, dec!(300));
        assert_money_zero(&totals.pending_balance);
    }

    #[test]
    fn test_totals_serialize_with_source_tag() {
        let account = PatientAccount::open(LedgerFixtures::patient_ref(), Currency::MXN, &ActorFixtures::cashier());
        let totals = live_totals(&account, &[], &[], BalanceOptions::default()).unwrap();
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json["source"], "transactions");
    }

    proptest! {
        #[test]
        fn open_totals_satisfy_balance_identity(
            requests in proptest::collection::vec(new_entry_strategy(), 0..12),
            partials in proptest::collection::vec(positive_amount_strategy(), 0..4),
        ) {
            let cashier = ActorFixtures::cashier();
            let account = PatientAccount::open("PAT-PROP", Currency::MXN, &cashier);
            let entries: Vec<LedgerEntry> = requests
                .into_iter()
                .map(|request| LedgerEntry::record(&account, request, &cashier).unwrap())
                .collect();
            let payments: Vec<Payment> = partials
                .into_iter()
                .map(|amount| Payment::partial(&account, amount, PaymentMethod::Card, &cashier).unwrap())
                .collect();

            let totals = compute_totals(&account, &entries, &payments, BalanceOptions::default()).unwrap();
            prop_assert_eq!(totals.source, TotalsSource::Transactions);
            assert_balance_identity(&totals);
            for entry in &entries {
                prop_assert!(entry.is_consistent());
            }
        }
    }
}

// ============================================================================
// Account State Tests
// ============================================================================

mod account_state_tests {
    use super::*;

    #[test]
    fn test_state_is_tagged_by_status() {
        let account = PatientAccount::open(LedgerFixtures::patient_ref(), Currency::MXN, &ActorFixtures::cashier());
        let json = serde_json::to_value(&account.state).unwrap();
        assert_eq!(json["status"], "open");

        let restored: AccountState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, AccountState::Open);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("closed".parse::<AccountStatus>().unwrap(), AccountStatus::Closed);
        let err: PortError = "archived".parse::<AccountStatus>().unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_entry_on_closed_account() {
        let cashier = ActorFixtures::cashier();
        let mut account = PatientAccount::open(LedgerFixtures::patient_ref(), Currency::MXN, &cashier);
        close_settled(&mut account);

        assert_billing_error(LedgerEntry::record(&account, NewEntry::advance(dec!(10)), &cashier), ErrorKind::AccountClosed);
        assert_billing_error(
            Payment::partial(&account, dec!(10), PaymentMethod::Cash, &cashier),
            ErrorKind::AccountClosed,
        );

        let totals = compute_totals(&account, &[], &[], BalanceOptions::default()).unwrap();
        assert_billing_error(
            plan_closure(&account, &totals, &CloseRequest::settled(), &cashier, Utc::now()),
            ErrorKind::AccountAlreadyClosed,
        );
    }

    #[test]
    fn test_receivable_gates_in_order() {
        let scenario = LedgerScenarioBuilder::new()
            .advance(dec!(1000))
            .service(dec!(3), dec!(2000))
            .build()
            .unwrap();
        let totals = live_totals(&scenario.account, &scenario.entries, &[], BalanceOptions::default()).unwrap();
        let plan = |request: CloseRequest, actor: Actor| plan_closure(&scenario.account, &totals, &request, &actor, Utc::now());

        assert_billing_error(plan(CloseRequest::settled(), ActorFixtures::admin()), ErrorKind::UnsettledBalance);
        assert_billing_error(
            plan(CloseRequest::settled().with_receivable("payment plan"), ActorFixtures::cashier()),
            ErrorKind::InsufficientAuthority,
        );
        assert_billing_error(
            plan(CloseRequest::settled().with_receivable("   "), ActorFixtures::finance_manager()),
            ErrorKind::MissingReason,
        );

        let approved = plan(CloseRequest::settled().with_receivable("payment plan"), ActorFixtures::finance_manager()).unwrap();
        let receivable = approved.receivable.unwrap();
        assert_money_eq(&receivable.remaining_amount, dec!(5000));
        assert_money_eq(&approved.snapshot.pending_balance, dec!(-5000));
    }
}

// ============================================================================
// Error Tests
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_store_errors_classified() {
        let outage: BillingError = PortError::connection("pool exhausted").into();
        assert!(outage.is_transient());
        assert_eq!(outage.kind(), ErrorKind::Transient);

        let missing: BillingError = PortError::not_found("PatientAccount", "x").into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let conflict: BillingError = PortError::conflict("duplicate").into();
        assert_eq!(conflict.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages_are_readable() {
        let err = BillingError::UnsettledBalance { outstanding: MoneyFixtures::mxn(dec!(800)) };
        assert!(err.to_string().contains("800.00"));

        let err = BillingError::not_found("PatientAccount", PatientAccountId::new());
        assert!(err.to_string().starts_with("PatientAccount not found"));
    }
}

// ============================================================================
// Receivable Tests
// ============================================================================

mod receivable_tests {
    use super::*;
    use proptest::prelude::*;

    fn receivable(debt: Decimal) -> ReceivableRecord {
        ReceivableRecord::authorize(
            PatientAccountId::new(),
            MoneyFixtures::mxn(debt),
            &ActorFixtures::admin(),
            "payment plan",
            Utc::now(),
        )
    }

    #[test]
    fn test_authorized_receivable_starts_pending() {
        let cpc = receivable(dec!(1200));
        assert_eq!(cpc.state, ReceivableState::Pending);
        assert_eq!(cpc.remaining_amount, cpc.original_amount);
        assert_eq!(cpc.authorized_by, ActorFixtures::admin().reference());
    }

    #[test]
    fn test_excess_payment_leaves_balance() {
        let mut cpc = receivable(dec!(5000));
        assert_billing_error(
            cpc.apply_payment(dec!(6000), PaymentMethod::Cash, &ActorFixtures::cashier()),
            ErrorKind::ExcessPayment,
        );
        assert_money_eq(&cpc.remaining_amount, dec!(5000));

        cpc.apply_payment(dec!(5000), PaymentMethod::Transfer, &ActorFixtures::cashier()).unwrap();
        assert_money_zero(&cpc.remaining_amount);
        assert_eq!(cpc.state, ReceivableState::FullyPaid);
    }

    proptest! {
        #[test]
        fn remaining_only_decreases_and_never_goes_negative(
            debt in positive_amount_strategy(),
            payments in proptest::collection::vec(positive_amount_strategy(), 1..20),
        ) {
            let mut cpc = receivable(debt);

            for amount in payments {
                let before = cpc.remaining_amount.amount();
                match cpc.apply_payment(amount, PaymentMethod::Cash, &ActorFixtures::cashier()) {
                    Ok(row) => {
                        prop_assert_eq!(cpc.remaining_amount.amount(), before - amount);
                        prop_assert_eq!(row.remaining_after, cpc.remaining_amount);
                    }
                    Err(BillingError::ExcessPayment { .. }) => {
                        prop_assert!(amount > before);
                        prop_assert_eq!(cpc.remaining_amount.amount(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
                prop_assert!(cpc.remaining_amount.amount() >= Decimal::ZERO);
                prop_assert_eq!(
                    cpc.state == ReceivableState::FullyPaid,
                    cpc.remaining_amount.is_zero()
                );
            }
        }
    }
}
