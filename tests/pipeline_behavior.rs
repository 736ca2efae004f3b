//! Behavior-driven tests for the end-to-end pipeline.
//!
//! These tests verify HOW validation and fallback compose: repair of bad
//! rows, idempotence on clean data, and the unconditional stuck-feed block.

use std::sync::Arc;

use tickvet_tests::{
    row, FallbackResolver, ProviderId, RowValidator, StubProvider, TradingPipeline,
};

fn pipeline_with(providers: Vec<Arc<StubProvider>>) -> TradingPipeline {
    let providers = providers
        .into_iter()
        .map(|provider| provider as Arc<dyn tickvet_tests::FallbackProvider>)
        .collect();
    TradingPipeline::new(
        RowValidator::default(),
        FallbackResolver::new(providers),
        ProviderId::Coingecko,
    )
}

#[tokio::test]
async fn bad_rows_are_repaired_from_the_fallback_chain() {
    // Given: a clean BTC row and a DOGE row with a negative price
    let rows = vec![
        row("BTC")
            .with_price("$50,000")
            .with_timestamp("2024-03-01T12:00:00Z"),
        row("DOGE")
            .with_price(-1.0)
            .with_timestamp("2024-03-01T12:00:00Z"),
    ];
    let pipeline = pipeline_with(vec![Arc::new(
        StubProvider::simple(ProviderId::Coingecko).with_price("DOGE", 0.08),
    )]);

    // When: the batch is processed
    let report = pipeline.process(&rows).await;

    // Then: the BTC row survives with its parsed price
    let btc = report
        .cleaned
        .iter()
        .find(|observation| observation.symbol == "BTC")
        .expect("BTC row present");
    assert_eq!(btc.price, Some(50_000.0));

    // And: DOGE is replaced by a provider-tagged fallback row
    let doge = report
        .cleaned
        .iter()
        .find(|observation| observation.symbol == "DOGE")
        .expect("DOGE fallback row present");
    assert_eq!(doge.price, Some(0.08));
    assert_eq!(doge.source.as_deref(), Some("coingecko_fallback"));
    assert_eq!(doge.currency, "USD");

    // And: nothing ends up blocked
    assert!(report.blocked.is_empty());
    assert!(report.reasons.is_empty());
}

#[tokio::test]
async fn symbols_no_provider_can_price_stay_blocked() {
    // Given: an out-of-bounds row and providers with no data for it
    let rows = vec![row("BTC").with_price(2.0)];
    let pipeline = pipeline_with(vec![Arc::new(StubProvider::simple(
        ProviderId::Coingecko,
    ))]);

    // When: the batch is processed
    let report = pipeline.process(&rows).await;

    // Then: the symbol lands in the blocked set, as data rather than error
    assert!(report.cleaned.is_empty());
    assert!(report.blocked.contains("BTC"));

    // And: the sentinel shape matches the downstream data-quality policy
    let sentinels = report.blocked_sentinels();
    assert_eq!(sentinels.len(), 1);
    assert_eq!(sentinels[0].coin, "BTC");
    assert!(sentinels[0].blocked);
    assert_eq!(sentinels[0].reason, "data_quality_blocked");
}

#[tokio::test]
async fn reprocessing_cleaned_output_is_idempotent() {
    // Given: a successful run over well-formed rows
    let rows = vec![
        row("BTC")
            .with_price("$50,000")
            .with_timestamp("2024-03-01T12:00:00Z"),
        row("ETH")
            .with_price(3_200.0)
            .with_timestamp("2024-03-01T12:01:00Z"),
    ];
    let pipeline = pipeline_with(vec![Arc::new(StubProvider::simple(
        ProviderId::Coingecko,
    ))]);
    let first = pipeline.process(&rows).await;
    assert_eq!(first.cleaned.len(), 2);
    assert!(first.blocked.is_empty());

    // When: the cleaned output is fed back through the pipeline
    let replay: Vec<_> = first
        .cleaned
        .iter()
        .map(|observation| observation.to_raw())
        .collect();
    let second = pipeline.process(&replay).await;

    // Then: the rows come back unchanged and nothing is blocked
    assert_eq!(second.cleaned, first.cleaned);
    assert!(second.blocked.is_empty());
}

#[tokio::test]
async fn a_stuck_feed_stays_blocked_even_after_a_good_fallback_price() {
    // Given: five frozen SOL samples and a provider offering a fresh,
    // in-bounds, differing price
    let rows = (0..5)
        .map(|minute| {
            row("SOL")
                .with_price(150.0)
                .with_timestamp(format!("2024-03-01T12:0{minute}:00Z"))
        })
        .collect::<Vec<_>>();
    let pipeline = pipeline_with(vec![Arc::new(
        StubProvider::simple(ProviderId::Coingecko).with_price("SOL", 151.5),
    )]);

    // When: the batch is processed
    let report = pipeline.process(&rows).await;

    // Then: the replacement row is present in the cleaned set
    assert!(report
        .cleaned
        .iter()
        .any(|observation| observation.source.as_deref() == Some("coingecko_fallback")));

    // And: the symbol is nevertheless blocked, with the stuck-feed flag
    // visible in the reasons map
    assert!(report.blocked.contains("SOL"));
    assert!(report
        .reasons
        .get("SOL")
        .is_some_and(|reason| reason.is_stuck_feed()));
}

#[tokio::test]
async fn reports_serialize_with_snake_case_reason_codes() {
    // Given: a batch that trips both a per-row reason and the stuck flag
    let mut rows = (0..5)
        .map(|minute| {
            row("SOL")
                .with_price(150.0)
                .with_timestamp(format!("2024-03-01T12:0{minute}:00Z"))
        })
        .collect::<Vec<_>>();
    rows.push(row("BTC").with_price(2.0));
    let pipeline = pipeline_with(vec![Arc::new(StubProvider::simple(
        ProviderId::Coingecko,
    ))]);

    // When: the report is serialized for downstream consumers
    let report = pipeline.process(&rows).await;
    let encoded = serde_json::to_value(&report).expect("report serializes");

    // Then: the stuck-feed flag uses its canonical wire code
    assert_eq!(
        encoded["reasons"]["SOL"],
        serde_json::json!("constant_price_last_5")
    );
    assert!(encoded["blocked"]
        .as_array()
        .expect("blocked is an array")
        .contains(&serde_json::json!("BTC")));
}

#[tokio::test]
async fn empty_input_produces_an_empty_report() {
    let pipeline = pipeline_with(vec![Arc::new(StubProvider::simple(
        ProviderId::Coingecko,
    ))]);

    let report = pipeline.process(&[]).await;

    assert!(report.cleaned.is_empty());
    assert!(report.blocked.is_empty());
    assert!(report.reasons.is_empty());
}
