//! End-to-end tests for the instant-transfer protocol over the full stack:
//! service facade, orchestrator, pricing engine, and accounting engine.

use corebank_common::AccountIdentifier;
use corebank_ledger::posting::PostingStatus;
use corebank_ledger::DirectoryConfig;
use corebank_pricing::PricingConfig;
use corebank_transfer::{BankService, TransferRequest};
use rust_decimal_macros::dec;

fn directory_config() -> DirectoryConfig {
    serde_json::from_value(serde_json::json!({
        "customers": [
            {
                "name": "Alice Chandler",
                "address": {
                    "house": "12",
                    "street": "Main St",
                    "city": "Dublin",
                    "post_code": "D01",
                    "country": "IE"
                },
                "bic": "IRONBANK44",
                "number": "1000001",
                "currency": "EUR",
                "balance": "1000.00"
            },
            {
                "name": "Bob Osei",
                "bic": "IRONBANK44",
                "number": "1000002",
                "currency": "USD",
                "balance": "250.00"
            },
            {
                "name": "Carol Novak",
                "bic": "IRONBANK44",
                "number": "1000003",
                "currency": "EUR",
                "balance": "500.00"
            }
        ],
        "hold": { "bic": "IRONBANK44", "number_format": "hold-{currency}" },
        "settlement": { "bic": "IRONBANK44", "number_format": "settle-{currency}" },
        "fx": { "bic": "IRONBANK44", "number_format": "fx-{currency}" },
        "reject": { "bic": "IRONBANK44", "number_format": "reject-{currency}" }
    }))
    .unwrap()
}

fn pricing_config() -> PricingConfig {
    serde_json::from_value(serde_json::json!({
        "rates": [
            { "base": "EUR", "quote": "USD", "rate": "1.15" },
            { "base": "USD", "quote": "EUR", "rate": "0.87" }
        ],
        "transaction_fee": "0.25"
    }))
    .unwrap()
}

fn service() -> BankService {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
    BankService::from_config(directory_config(), pricing_config()).unwrap()
}

fn alice() -> AccountIdentifier {
    AccountIdentifier::swift("IRONBANK44", "1000001")
}

fn bob() -> AccountIdentifier {
    AccountIdentifier::swift("IRONBANK44", "1000002")
}

fn carol() -> AccountIdentifier {
    AccountIdentifier::swift("IRONBANK44", "1000003")
}

fn settlement(currency: &str) -> AccountIdentifier {
    AccountIdentifier::swift("IRONBANK44", format!("settle-{}", currency))
}

fn debit_request(transfer_id: &str, amount: &str) -> TransferRequest {
    TransferRequest {
        transfer_id: transfer_id.to_string(),
        account: alice(),
        amount: amount.to_string(),
        currency: "EUR".to_string(),
        settlement_amount: None,
        settlement_currency: None,
        quote: None,
        description: Some("rent".to_string()),
    }
}

#[tokio::test]
async fn debit_leg_commit_settles() {
    let service = service();

    let handle = service
        .begin_debit_transaction(debit_request("tt-1", "100.00"))
        .await
        .unwrap();

    // The hold reduces available immediately, current only on commit.
    let balance = service.get_balance(&alice()).await.unwrap();
    assert_eq!(balance.available, dec!(900.00));
    assert_eq!(balance.current, dec!(1000.00));

    service
        .commit_debit_transaction("tt-1", handle.transaction_id.as_str(), &alice(), "100.00", "EUR")
        .await
        .unwrap();

    let balance = service.get_balance(&alice()).await.unwrap();
    assert_eq!(balance.available, dec!(900.00));
    assert_eq!(balance.current, dec!(900.00));

    let posting = service
        .get_transaction(&alice(), handle.transaction_id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(posting.status, PostingStatus::Success);

    let settlement_balance = service.get_balance(&settlement("EUR")).await.unwrap();
    assert_eq!(settlement_balance.current, dec!(100.00));
}

#[tokio::test]
async fn debit_leg_rollback_restores_available() {
    let service = service();

    let handle = service
        .begin_debit_transaction(debit_request("tt-2", "100.00"))
        .await
        .unwrap();
    assert_eq!(
        service.get_balance(&alice()).await.unwrap().available,
        dec!(900.00)
    );

    service
        .rollback_debit_transaction("tt-2", handle.transaction_id.as_str(), &alice(), "100.00", "EUR")
        .await
        .unwrap();

    let balance = service.get_balance(&alice()).await.unwrap();
    assert_eq!(balance.available, dec!(1000.00));
    assert_eq!(balance.current, dec!(1000.00));

    let posting = service
        .get_transaction(&alice(), handle.transaction_id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(posting.status, PostingStatus::FailureCanceled);
}

#[tokio::test]
async fn fx_debit_leg_settles_in_destination_currency() {
    let service = service();

    // Remitter-side FX: quote from the account currency to the
    // beneficiary's currency.
    let quote = service
        .prepare_debit("tok-fx", "100.00", "EUR", &alice(), Some("USD"), None)
        .await
        .unwrap();
    assert_eq!(quote.base_currency.code(), "EUR");
    assert_eq!(quote.quote_currency.code(), "USD");
    assert!(quote.total_fees > dec!(0));

    let request = TransferRequest {
        settlement_amount: Some("115.00".to_string()),
        settlement_currency: Some("USD".to_string()),
        quote: Some(quote.clone()),
        ..debit_request("tt-fx", "100.00")
    };
    let handle = service.begin_debit_transaction(request).await.unwrap();
    assert_eq!(
        handle.settlement_account,
        settlement("USD").as_swift().unwrap()
    );

    service
        .commit_debit_transaction("tt-fx", handle.transaction_id.as_str(), &alice(), "100.00", "EUR")
        .await
        .unwrap();

    assert_eq!(
        service.get_balance(&alice()).await.unwrap().current,
        dec!(900.00)
    );
    assert_eq!(
        service.get_balance(&settlement("USD")).await.unwrap().current,
        dec!(115.00)
    );

    // The redeemed quote cannot be redeemed a second time.
    let retry = TransferRequest {
        settlement_amount: Some("115.00".to_string()),
        settlement_currency: Some("USD".to_string()),
        quote: Some(quote),
        ..debit_request("tt-fx2", "100.00")
    };
    let err = service.begin_debit_transaction(retry).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_QUOTE");
}

#[tokio::test]
async fn prepare_debit_is_idempotent_by_token_ref() {
    let service = service();

    let first = service
        .prepare_debit("tok-1", "100.00", "EUR", &alice(), Some("USD"), None)
        .await
        .unwrap();
    let second = service
        .prepare_debit("tok-1", "100.00", "EUR", &alice(), Some("USD"), None)
        .await
        .unwrap();
    assert_eq!(first, second);

    let third = service
        .prepare_debit("tok-2", "100.00", "EUR", &alice(), Some("USD"), None)
        .await
        .unwrap();
    assert_ne!(first.id, third.id);

    // An existing quote id short-circuits to lookup.
    let looked_up = service
        .prepare_debit("tok-3", "100.00", "EUR", &alice(), Some("USD"), Some(&first.id))
        .await
        .unwrap();
    assert_eq!(looked_up, first);
}

#[tokio::test]
async fn prepare_debit_checks_account_and_funds() {
    let service = service();

    let unknown = AccountIdentifier::swift("IRONBANK44", "9999999");
    let err = service
        .prepare_debit("tok-a", "10.00", "EUR", &unknown, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");

    let err = service
        .prepare_debit("tok-b", "5000.00", "EUR", &alice(), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");

    let err = service
        .prepare_debit("tok-c", "10.00", "EUR", &alice(), Some("CHF"), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURRENCY");
}

#[tokio::test]
async fn prepare_credit_validates_currency() {
    let service = service();

    let quote = service
        .prepare_credit("tok-cr", "115.00", "USD", &bob(), None)
        .await
        .unwrap();
    assert!(quote.fees.is_empty());
    assert_eq!(quote.total_fees, dec!(0));

    // Beneficiary-side FX is not supported.
    let err = service
        .prepare_credit("tok-cr2", "115.00", "EUR", &bob(), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURRENCY");
}

#[tokio::test]
async fn reject_account_simulation_cancels_without_hold() {
    let service = service();
    let reject = AccountIdentifier::swift("IRONBANK44", "reject-EUR");

    let request = TransferRequest {
        account: reject.clone(),
        ..debit_request("tt-rej", "100.00")
    };
    let handle = service.begin_debit_transaction(request).await.unwrap();

    // The posting exists, already canceled, and no hold was placed.
    let posting = service
        .get_transaction(&reject, handle.transaction_id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(posting.status, PostingStatus::FailureCanceled);

    let hold = AccountIdentifier::swift("IRONBANK44", "hold-EUR");
    assert!(service
        .get_transactions(&hold, 0, 10)
        .await
        .unwrap()
        .is_empty());

    // The canceled leg can never be committed.
    let err = service
        .commit_debit_transaction("tt-rej", handle.transaction_id.as_str(), &reject, "100.00", "EUR")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
}

#[tokio::test]
async fn credit_leg_pays_out_on_commit_only() {
    let service = service();

    // Fund the settlement account through a committed debit leg first.
    let handle = service
        .begin_debit_transaction(debit_request("tt-d", "115.00"))
        .await
        .unwrap();
    service
        .commit_debit_transaction("tt-d", handle.transaction_id.as_str(), &alice(), "115.00", "EUR")
        .await
        .unwrap();

    let request = TransferRequest {
        transfer_id: "tt-d".to_string(),
        account: carol(),
        amount: "115.00".to_string(),
        currency: "EUR".to_string(),
        settlement_amount: None,
        settlement_currency: None,
        quote: None,
        description: None,
    };
    let credit_handle = service.begin_credit_transaction(request).await.unwrap();

    // Begin moves no money.
    assert_eq!(
        service.get_balance(&carol()).await.unwrap().current,
        dec!(500.00)
    );

    service
        .commit_credit_transaction(
            "tt-d",
            credit_handle.transaction_id.as_str(),
            &carol(),
            "115.00",
            "EUR",
        )
        .await
        .unwrap();

    let balance = service.get_balance(&carol()).await.unwrap();
    assert_eq!(balance.available, dec!(615.00));
    assert_eq!(balance.current, dec!(615.00));

    // Settlement nets back out to zero.
    assert_eq!(
        service.get_balance(&settlement("EUR")).await.unwrap().current,
        dec!(0.00)
    );
}

#[tokio::test]
async fn credit_leg_validation_failures() {
    let service = service();

    let unknown = TransferRequest {
        account: AccountIdentifier::swift("IRONBANK44", "9999999"),
        ..debit_request("tt-c1", "10.00")
    };
    let err = service.begin_credit_transaction(unknown).await.unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");

    // Bob's account is in USD; an EUR credit is beneficiary-side FX.
    let mismatched = TransferRequest {
        account: bob(),
        ..debit_request("tt-c2", "10.00")
    };
    let err = service
        .begin_credit_transaction(mismatched)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURRENCY");

    let rejected = TransferRequest {
        transfer_id: "tt-c3".to_string(),
        account: AccountIdentifier::swift("IRONBANK44", "reject-EUR"),
        amount: "10.00".to_string(),
        currency: "EUR".to_string(),
        settlement_amount: None,
        settlement_currency: None,
        quote: None,
        description: None,
    };
    let err = service.begin_credit_transaction(rejected).await.unwrap_err();
    assert_eq!(err.error_code(), "REJECTED_BY_SIMULATION");
}

#[tokio::test]
async fn rollback_credit_is_a_no_op() {
    let service = service();

    // Unknown transaction ids are tolerated: begin never moved funds.
    service
        .rollback_credit_transaction("tt-x", "tt-x:3:credit", &carol(), "10.00", "EUR")
        .await
        .unwrap();
}

#[tokio::test]
async fn commit_debit_verifies_the_hold_tuple() {
    let service = service();

    let handle = service
        .begin_debit_transaction(debit_request("tt-v", "100.00"))
        .await
        .unwrap();

    let err = service
        .commit_debit_transaction("tt-v", handle.transaction_id.as_str(), &alice(), "99.00", "EUR")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "HOLD_MISMATCH");

    let err = service
        .commit_debit_transaction("tt-v", handle.transaction_id.as_str(), &carol(), "100.00", "EUR")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "HOLD_MISMATCH");

    // Unknown transaction id is a hard not-found.
    let err = service
        .commit_debit_transaction("tt-v", "missing:0:debit", &alice(), "100.00", "EUR")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TRANSACTION_NOT_FOUND");

    // The leg is still committable after the failed attempts.
    service
        .commit_debit_transaction("tt-v", handle.transaction_id.as_str(), &alice(), "100.00", "EUR")
        .await
        .unwrap();
}

#[tokio::test]
async fn single_shot_transfer_posts_and_settles() {
    let service = service();

    let pair = service
        .transfer("tt-s", &alice(), &carol(), "40.00", "EUR", Some("gift"))
        .await
        .unwrap();
    assert_eq!(pair.debit.status, PostingStatus::Success);
    assert!(pair.is_balanced());

    assert_eq!(
        service.get_balance(&alice()).await.unwrap().current,
        dec!(960.00)
    );
    assert_eq!(
        service.get_balance(&carol()).await.unwrap().current,
        dec!(540.00)
    );

    let err = service
        .transfer("tt-s2", &alice(), &carol(), "5000.00", "EUR", None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
}

#[tokio::test]
async fn unsupported_account_scheme_is_rejected() {
    let service = service();

    let iban = AccountIdentifier::Iban {
        iban: "DE89370400440532013000".to_string(),
    };
    let err = service.get_balance(&iban).await.unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_ACCOUNT_TYPE");
}

#[tokio::test]
async fn begin_debit_resubmission_returns_original_handle() {
    let service = service();

    let first = service
        .begin_debit_transaction(debit_request("tt-i", "100.00"))
        .await
        .unwrap();
    let second = service
        .begin_debit_transaction(debit_request("tt-i", "100.00"))
        .await
        .unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    // Not double-held.
    assert_eq!(
        service.get_balance(&alice()).await.unwrap().available,
        dec!(900.00)
    );
}
