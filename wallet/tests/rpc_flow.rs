mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aura_wallet_lib::blockchain_client::{ConfirmOptions, SendOptions};
use aura_wallet_lib::crypto::write_keypair_file;
use aura_wallet_lib::{
    BlockchainClient, Commitment, Hash, Keypair, Pubkey, Signature, Transaction, WalletContext,
    WalletError,
};
use base64::Engine;
use secrecy::SecretString;
use serde_json::{json, Value};
use support::{contextual, test_context, unreachable_url, MockRequest, MockResponse, MockServer};
use tempfile::TempDir;

const BLOCKHASH_BYTES: [u8; 32] = [9u8; 32];
const LAST_VALID_BLOCK_HEIGHT: u64 = 200;

fn blockhash() -> String {
    Hash::new_from_array(BLOCKHASH_BYTES).to_string()
}

/// Connect a fresh keypair file and shorten confirmation polling.
fn connected_context(dir: &TempDir, url: &str) -> (WalletContext, Keypair) {
    let mut ctx = test_context(dir);
    let keypair = Keypair::generate().unwrap();
    let path = dir.path().join("id.json");
    write_keypair_file(&keypair, &path).unwrap();
    ctx.connect_wallet(&path).unwrap();
    ctx.update_config(|config| {
        config.transfer.poll_interval_ms = 50;
        config.transfer.confirm_timeout_secs = 5;
        Ok(())
    })
    .unwrap();
    ctx.set_rpc_override(Some(url.to_string())).unwrap();
    (ctx, keypair)
}

/// Signature and message bytes of a base64 transaction with one signer
fn split_transaction(encoded: &str) -> (Signature, Vec<u8>) {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(raw[0], 1, "one signature expected");
    let mut signature = [0u8; 64];
    signature.copy_from_slice(&raw[1..65]);
    (Signature::new_from_array(signature), raw[65..].to_vec())
}

fn transfer_node(balances: Vec<u64>, status_polls_before_confirmed: usize) -> impl Fn(&MockRequest) -> MockResponse {
    let balance_calls = Arc::new(AtomicUsize::new(0));
    let status_calls = Arc::new(AtomicUsize::new(0));

    move |req: &MockRequest| match req.method() {
        "getBalance" => {
            let n = balance_calls.fetch_add(1, Ordering::SeqCst);
            let lamports = balances[n.min(balances.len() - 1)];
            MockResponse::rpc_result(req, contextual(json!(lamports)))
        }
        "getLatestBlockhash" => MockResponse::rpc_result(
            req,
            contextual(json!({
                "blockhash": blockhash(),
                "lastValidBlockHeight": LAST_VALID_BLOCK_HEIGHT,
            })),
        ),
        "getFeeForMessage" => MockResponse::rpc_result(req, contextual(json!(5000))),
        "sendTransaction" => {
            let (signature, _) = split_transaction(req.params()[0].as_str().unwrap());
            MockResponse::rpc_result(req, json!(signature.to_string()))
        }
        "getSignatureStatuses" => {
            let n = status_calls.fetch_add(1, Ordering::SeqCst);
            let status = if n < status_polls_before_confirmed {
                Value::Null
            } else {
                json!({ "slot": 42, "confirmations": 1, "err": null, "confirmationStatus": "confirmed" })
            };
            MockResponse::rpc_result(req, contextual(json!([status])))
        }
        "getBlockHeight" => MockResponse::rpc_result(req, json!(150)),
        other => MockResponse::rpc_error(req, -32601, &format!("Method not found: {}", other)),
    }
}

#[tokio::test]
async fn balance_is_fetched_and_kept_in_session() {
    let server = MockServer::start(|req| {
        MockResponse::rpc_result(req, contextual(json!(1_500_000_000u64)))
    })
    .await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, keypair) = connected_context(&dir, &server.url);

    let balance = ctx.check_balance(None).await.unwrap();
    assert_eq!(balance.address, keypair.pubkey().to_string());
    assert_eq!(balance.lamports, 1_500_000_000);
    assert_eq!(balance.sol, "1.5");
    assert_eq!(ctx.session().balance.map(|b| b.lamports()), Some(1_500_000_000));

    let request = &server.requests()[0];
    assert_eq!(request.method(), "getBalance");
    assert_eq!(request.body["jsonrpc"], "2.0");
    assert_eq!(request.params()[0], keypair.pubkey().to_string());
    assert_eq!(request.params()[1]["commitment"], "confirmed");
}

#[tokio::test]
async fn send_signs_submits_confirms_and_refreshes() {
    let server = MockServer::start(transfer_node(vec![2_000_000_000, 1_499_995_000], 1)).await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, keypair) = connected_context(&dir, &server.url);
    let recipient = Keypair::generate().unwrap().pubkey();

    ctx.session_mut().set_transfer(recipient.to_string(), "0.5");
    let response = ctx.send_sol(None).await.unwrap();

    assert_eq!(response.lamports, 500_000_000);
    assert_eq!(response.fee_lamports, 5000);
    assert_eq!(response.from_address, keypair.pubkey().to_string());
    assert_eq!(response.to_address, recipient.to_string());
    assert_eq!(response.endpoint, server.url);
    assert_eq!(
        response.balance.as_ref().map(|b| b.lamports),
        Some(1_499_995_000)
    );
    assert_eq!(ctx.session().balance.map(|b| b.lamports()), Some(1_499_995_000));

    let methods = server.methods();
    assert_eq!(methods.iter().filter(|m| *m == "sendTransaction").count(), 1);
    assert!(methods.contains(&"getBlockHeight".to_string()));

    let submitted = server
        .requests()
        .into_iter()
        .find(|r| r.method() == "sendTransaction")
        .unwrap();
    assert_eq!(submitted.params()[1]["encoding"], "base64");
    let (signature, message) = split_transaction(submitted.params()[0].as_str().unwrap());
    assert_eq!(signature.to_string(), response.signature);
    assert!(signature.verify(&keypair.pubkey(), &message));
}

#[tokio::test]
async fn send_from_created_wallet_signs_with_vault_key() {
    let server = MockServer::start(transfer_node(vec![2_000_000_000, 1_499_995_000], 0)).await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, connected) = connected_context(&dir, &server.url);
    let password = SecretString::from("Created wallet 1".to_string());
    let created = ctx.create_wallet("Main", &password, Some(12)).unwrap();
    let created_key = Pubkey::from_string(&created.public_key).unwrap();
    assert_ne!(created_key, connected.pubkey());

    let recipient = Keypair::generate().unwrap().pubkey();
    ctx.session_mut().set_transfer(recipient.to_string(), "0.5");
    assert!(matches!(
        ctx.send_sol(None).await,
        Err(WalletError::ValidationError(_))
    ));

    let response = ctx.send_sol(Some(&password)).await.unwrap();
    assert_eq!(response.from_address, created.public_key);

    let balance_request = server
        .requests()
        .into_iter()
        .find(|r| r.method() == "getBalance")
        .unwrap();
    assert_eq!(balance_request.params()[0], created.public_key);

    let submitted = server
        .requests()
        .into_iter()
        .find(|r| r.method() == "sendTransaction")
        .unwrap();
    let (signature, message) = split_transaction(submitted.params()[0].as_str().unwrap());
    assert_eq!(signature.to_string(), response.signature);
    assert!(signature.verify(&created_key, &message));
    assert!(!signature.verify(&connected.pubkey(), &message));
    // The fee payer is the first account key, after the three header bytes and its length
    assert_eq!(&message[4..36], created_key.as_bytes());
}

#[tokio::test]
async fn balance_covering_exactly_amount_and_fee_is_sent() {
    let server = MockServer::start(transfer_node(vec![500_005_000, 0], 0)).await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, _) = connected_context(&dir, &server.url);

    ctx.session_mut()
        .set_transfer(Pubkey::new_from_array([3u8; 32]).to_string(), "0.5");
    let response = ctx.send_sol(None).await.unwrap();
    assert_eq!(response.lamports, 500_000_000);
    assert_eq!(response.fee_lamports, 5000);
    assert_eq!(response.balance.as_ref().map(|b| b.lamports), Some(0));
    assert_eq!(
        server
            .methods()
            .iter()
            .filter(|m| *m == "sendTransaction")
            .count(),
        1
    );
}

#[tokio::test]
async fn insufficient_funds_stop_before_submission() {
    let server = MockServer::start(transfer_node(vec![1_000], 0)).await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, _) = connected_context(&dir, &server.url);

    ctx.session_mut()
        .set_transfer(Pubkey::new_from_array([3u8; 32]).to_string(), "1");
    let err = ctx.send_sol(None).await.unwrap_err();
    assert_eq!(
        err,
        WalletError::InsufficientFunds {
            required: 1_000_005_000,
            available: 1_000
        }
    );
    assert!(!server.methods().contains(&"sendTransaction".to_string()));
}

#[tokio::test]
async fn unreachable_primary_fails_over() {
    let server = MockServer::start(|req| MockResponse::rpc_result(req, contextual(json!(7u64)))).await;
    let dead = unreachable_url().await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, _) = connected_context(&dir, &server.url);
    ctx.set_rpc_override(None).unwrap();
    ctx.update_config(|config| {
        config.network.set_endpoint(&dead)?;
        config.network.add_failover(&server.url)
    })
    .unwrap();

    let balance = ctx.check_balance(None).await.unwrap();
    assert_eq!(balance.lamports, 7);
    assert_eq!(server.methods(), vec!["getBalance"]);
}

#[tokio::test]
async fn rpc_errors_do_not_fail_over() {
    let primary =
        MockServer::start(|req| MockResponse::rpc_error(req, -32602, "Invalid param")).await;
    let backup = MockServer::start(|req| MockResponse::rpc_result(req, contextual(json!(7u64)))).await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, _) = connected_context(&dir, &primary.url);
    ctx.set_rpc_override(None).unwrap();
    ctx.update_config(|config| {
        config.network.set_endpoint(&primary.url)?;
        config.network.add_failover(&backup.url)
    })
    .unwrap();

    let err = ctx.check_balance(None).await.unwrap_err();
    assert_eq!(
        err,
        WalletError::RpcError {
            code: -32602,
            message: "Invalid param".to_string()
        }
    );
    assert!(backup.requests().is_empty());
}

fn fast_confirm() -> ConfirmOptions {
    ConfirmOptions {
        commitment: Commitment::Confirmed,
        poll_interval: Duration::from_millis(20),
        timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn send_and_confirm_polls_until_confirmed() {
    let server = MockServer::start(transfer_node(vec![0], 2)).await;
    let client = BlockchainClient::new(server.url.clone(), Duration::from_secs(5)).unwrap();
    let payer = Keypair::generate().unwrap();
    let tx = Transaction::new_transfer(
        &payer,
        &Pubkey::new_from_array([4u8; 32]),
        10,
        Hash::new_from_array(BLOCKHASH_BYTES),
    )
    .unwrap();

    let signature = client
        .send_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, &SendOptions::default(), &fast_confirm())
        .await
        .unwrap();
    assert_eq!(Some(&signature), tx.signature());
    assert_eq!(
        server.methods(),
        vec![
            "sendTransaction",
            "getSignatureStatuses",
            "getBlockHeight",
            "getSignatureStatuses",
            "getBlockHeight",
            "getSignatureStatuses",
        ]
    );
}

#[tokio::test]
async fn unknown_signature_past_last_valid_height_expires() {
    let server = MockServer::start(|req| match req.method() {
        "getSignatureStatuses" => MockResponse::rpc_result(req, contextual(json!([null]))),
        "getBlockHeight" => MockResponse::rpc_result(req, json!(LAST_VALID_BLOCK_HEIGHT + 1)),
        _ => MockResponse::rpc_error(req, -32601, "Method not found"),
    })
    .await;
    let client = BlockchainClient::new(server.url.clone(), Duration::from_secs(5)).unwrap();

    let err = client
        .confirm_signature(&Signature::default(), LAST_VALID_BLOCK_HEIGHT, &fast_confirm())
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::BlockhashExpired);
}

#[tokio::test]
async fn failed_status_is_reported() {
    let server = MockServer::start(|req| {
        MockResponse::rpc_result(
            req,
            contextual(json!([{
                "slot": 10,
                "confirmations": null,
                "err": { "InstructionError": [0, { "Custom": 1 }] },
                "confirmationStatus": "processed",
            }])),
        )
    })
    .await;
    let client = BlockchainClient::new(server.url.clone(), Duration::from_secs(5)).unwrap();

    let err = client
        .confirm_signature(&Signature::default(), LAST_VALID_BLOCK_HEIGHT, &fast_confirm())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::TransactionFailed(ref msg) if msg.contains("InstructionError")));
}

#[tokio::test]
async fn pending_signature_times_out() {
    let server = MockServer::start(|req| match req.method() {
        "getSignatureStatuses" => MockResponse::rpc_result(
            req,
            contextual(json!([{ "slot": 10, "confirmations": 0, "err": null, "confirmationStatus": "processed" }])),
        ),
        _ => MockResponse::rpc_error(req, -32601, "Method not found"),
    })
    .await;
    let client = BlockchainClient::new(server.url.clone(), Duration::from_secs(5)).unwrap();
    let confirm = ConfirmOptions {
        timeout: Duration::from_millis(100),
        ..fast_confirm()
    };

    let err = client
        .confirm_signature(&Signature::default(), LAST_VALID_BLOCK_HEIGHT, &confirm)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::ConnectionTimeout);
}

#[tokio::test]
async fn history_marks_failed_transactions() {
    let ok_sig = Signature::new_from_array([1u8; 64]).to_string();
    let failed_sig = Signature::new_from_array([2u8; 64]).to_string();
    let entries = json!([
        { "signature": ok_sig, "slot": 20, "err": null, "memo": null, "blockTime": 1_700_000_000, "confirmationStatus": "finalized" },
        { "signature": failed_sig, "slot": 19, "err": { "InstructionError": [0, "InvalidArgument"] }, "memo": "rent", "blockTime": null, "confirmationStatus": "finalized" },
    ]);
    let server = MockServer::start(move |req| MockResponse::rpc_result(req, entries.clone())).await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = connected_context(&dir, &server.url);

    let history = ctx.transaction_history(None, 5).await.unwrap();
    assert_eq!(history.transactions.len(), 2);
    assert_eq!(history.transactions[0].status, "finalized");
    assert_eq!(history.transactions[0].block_time, Some(1_700_000_000));
    assert_eq!(history.transactions[1].status, "failed");
    assert_eq!(history.transactions[1].memo.as_deref(), Some("rent"));
    assert_eq!(server.requests()[0].params()[1]["limit"], 5);
}

#[tokio::test]
async fn airdrop_waits_for_confirmation() {
    let airdrop_sig = Signature::new_from_array([5u8; 64]).to_string();
    let expected = airdrop_sig.clone();
    let server = MockServer::start(move |req| match req.method() {
        "getLatestBlockhash" => MockResponse::rpc_result(
            req,
            contextual(json!({ "blockhash": blockhash(), "lastValidBlockHeight": LAST_VALID_BLOCK_HEIGHT })),
        ),
        "requestAirdrop" => MockResponse::rpc_result(req, json!(airdrop_sig)),
        "getSignatureStatuses" => MockResponse::rpc_result(
            req,
            contextual(json!([{ "slot": 3, "confirmations": null, "err": null, "confirmationStatus": "finalized" }])),
        ),
        _ => MockResponse::rpc_error(req, -32601, "Method not found"),
    })
    .await;
    let dir = TempDir::new().unwrap();
    let (mut ctx, keypair) = connected_context(&dir, &server.url);

    let response = ctx.airdrop("2").await.unwrap();
    assert_eq!(response.signature, expected);
    assert_eq!(response.lamports, 2_000_000_000);

    let request = server
        .requests()
        .into_iter()
        .find(|r| r.method() == "requestAirdrop")
        .unwrap();
    assert_eq!(request.params()[0], keypair.pubkey().to_string());
    assert_eq!(request.params()[1], 2_000_000_000u64);
}
