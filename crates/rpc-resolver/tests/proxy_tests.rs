// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of `SelectionEngine` over HTTP
//!
//! Each upstream node is a wiremock server; the engine runs with its real `HttpProbeClient`.

use rpc_resolver::{ResolverConfig, ResolverError, SelectOptions, SelectionEngine};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method},
};

use fixtures::*;

fn create_test_engine(nodes: &[&MockServer]) -> SelectionEngine {
    let engine = SelectionEngine::new(ResolverConfig::for_testing()).unwrap();
    engine
        .catalogs()
        .set_general_chain(mainnet(), nodes.iter().map(|node| mock_endpoint(node)).collect());
    engine
}

#[tokio::test]
async fn proxy_returns_upstream_answer_verbatim() {
    let node = MockServer::start().await;
    let upstream = json!({"jsonrpc": "2.0", "id": 5, "result": "0x89"});
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_chainId"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream.clone()))
        .expect(1)
        .mount(&node)
        .await;
    let engine = create_test_engine(&[&node]);

    let response = engine
        .proxy("eth", &json!({"jsonrpc": "2.0", "id": 5, "method": "eth_chainId", "params": []}))
        .await
        .unwrap();

    assert_eq!(response.endpoint, mock_endpoint(&node));
    assert_eq!(response.status, 200);
    assert_eq!(response.body, upstream);
}

#[tokio::test]
async fn proxy_fails_over_from_broken_node() {
    let broken = broken_node().await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x1"))))
        .mount(&healthy)
        .await;
    let engine = create_test_engine(&[&broken, &healthy]);

    let response = engine
        .proxy("1", &json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId", "params": []}))
        .await
        .unwrap();

    assert_eq!(response.endpoint, mock_endpoint(&healthy));
    let records = engine.health_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, mock_endpoint(&broken));
    assert!(records[0].reason.contains("503"));
}

#[tokio::test]
async fn proxy_fails_over_on_client_error_status() {
    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(rpc_error(-32600, "invalid request")))
        .expect(1)
        .mount(&rejecting)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_error(-32600, "invalid request")))
        .mount(&healthy)
        .await;
    let engine = create_test_engine(&[&rejecting, &healthy]);

    let response = engine.proxy("1", &json!({"id": 1})).await.unwrap();

    assert_eq!(response.endpoint, mock_endpoint(&healthy));
    assert_eq!(response.body, rpc_error(-32600, "invalid request"));
    assert!(!engine.health_cache().is_eligible(&mock_endpoint(&rejecting)));
    assert!(engine.health_records()[0].reason.contains("400"));
}

#[tokio::test]
async fn proxy_exhausts_every_node() {
    let first = broken_node().await;
    let second = broken_node().await;
    let engine = create_test_engine(&[&first, &second]);

    let error = engine.proxy("1", &json!({})).await.unwrap_err();

    assert!(error.is_service_unavailable());
    let ResolverError::AllEndpointsUnavailable { attempts, .. } = error else {
        panic!("Expected AllEndpointsUnavailable");
    };
    assert_eq!(attempts.len(), 2);
}

#[tokio::test]
async fn select_skips_node_without_transaction_support() {
    let restricted = MockServer::start().await;
    mount_rpc(
        &restricted,
        "eth_blockNumber",
        ResponseTemplate::new(200).set_body_json(rpc_result(json!("0x100"))),
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(rpc_error(-32601, "method not found")),
        )
        .expect(1)
        .mount(&restricted)
        .await;
    let full = healthy_node().await;
    let engine = create_test_engine(&[&restricted, &full]);
    let tx = SelectOptions::default().with_tx_support();

    assert_eq!(engine.select("1", tx).await.unwrap(), mock_endpoint(&full));
    assert_eq!(engine.select("1", tx).await.unwrap(), mock_endpoint(&full));

    assert!(engine.health_records().is_empty());
    assert_eq!(
        engine.select("1", SelectOptions::default()).await.unwrap(),
        mock_endpoint(&restricted)
    );
}

#[tokio::test]
async fn select_excludes_unreachable_node() {
    let down = broken_node().await;
    let up = healthy_node().await;
    let engine = create_test_engine(&[&down, &up]);

    assert_eq!(
        engine.select("mainnet", SelectOptions::default()).await.unwrap(),
        mock_endpoint(&up)
    );
    assert!(!engine.health_cache().is_eligible(&mock_endpoint(&down)));
}

#[tokio::test]
async fn gas_price_over_http() {
    let node = healthy_node().await;
    let engine = create_test_engine(&[&node]);

    let quote = engine.gas_price("ethereum").await.unwrap();

    assert_eq!(quote.endpoint, mock_endpoint(&node));
    assert_eq!(quote.gas_price, GAS_PRICE);
    assert!(!quote.cached);
    assert!(engine.gas_price("ethereum").await.unwrap().cached);
}
