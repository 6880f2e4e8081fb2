mod support;

use std::sync::Arc;
use std::time::Duration;

use pricefeed_application::{
    EventConsumer, EventConsumerImpl, MovingAverageProcessor, MovingAverageProcessorImpl,
    ProcessError, ProcessOutcome,
};
use pricefeed_domain::{Observation, PriceEvent, DEFAULT_WINDOW_SIZE};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use support::{delivery, observation, MemoryPriceStore, MemorySource};
use tokio_util::sync::CancellationToken;

fn five_observations() -> Vec<Observation> {
    vec![
        observation("obs-1", "AAPL", dec!(100), 0),
        observation("obs-2", "AAPL", dec!(101), 1),
        observation("obs-3", "AAPL", dec!(102), 2),
        observation("obs-4", "AAPL", dec!(103), 3),
        observation("obs-5", "AAPL", dec!(104), 4),
    ]
}

fn processor(store: &Arc<MemoryPriceStore>) -> MovingAverageProcessorImpl {
    MovingAverageProcessorImpl::new(store.clone(), store.clone(), DEFAULT_WINDOW_SIZE)
}

fn event_for(observation: &Observation) -> PriceEvent {
    PriceEvent::from_observation(observation)
}

#[tokio::test]
async fn stores_the_five_point_average_for_the_triggering_observation() {
    let observations = five_observations();
    let trigger = event_for(&observations[4]);
    let store = Arc::new(MemoryPriceStore::with_observations(observations));

    let outcome = processor(&store).process_event(&trigger).await.unwrap();

    let ProcessOutcome::Stored(average) = outcome else {
        panic!("expected a stored average, got {:?}", outcome);
    };
    assert_eq!(average.value(), dec!(102));
    assert_eq!(average.symbol(), "AAPL");
    assert_eq!(average.window_size(), 5);
    assert_eq!(average.observation_count(), 5);
    assert_eq!(average.trigger_observation_id(), "obs-5");
    assert_eq!(store.average("AAPL").unwrap().value(), dec!(102));
}

#[tokio::test]
async fn reprocessing_the_same_event_is_idempotent() {
    let observations = five_observations();
    let trigger = event_for(&observations[4]);
    let store = Arc::new(MemoryPriceStore::with_observations(observations));
    let processor = processor(&store);

    processor.process_event(&trigger).await.unwrap();
    processor.process_event(&trigger).await.unwrap();

    assert_eq!(store.upserts(), 2);
    assert_eq!(store.average_rows(), 1);
    assert_eq!(store.average("AAPL").unwrap().value(), dec!(102));
}

#[tokio::test]
async fn a_newer_event_replaces_the_symbols_average() {
    let observations = five_observations();
    let first = event_for(&observations[4]);
    let store = Arc::new(MemoryPriceStore::with_observations(observations));
    let processor = processor(&store);

    processor.process_event(&first).await.unwrap();

    let sixth = observation("obs-6", "AAPL", dec!(110), 5);
    store.add(sixth.clone());
    processor.process_event(&event_for(&sixth)).await.unwrap();

    let latest = store.average("AAPL").unwrap();
    assert_eq!(store.average_rows(), 1);
    assert_eq!(latest.value(), dec!(104));
    assert_eq!(latest.trigger_observation_id(), "obs-6");
}

#[tokio::test]
async fn fewer_than_five_observations_stores_nothing() {
    let mut observations = five_observations();
    observations.truncate(4);
    let trigger = event_for(&observations[3]);
    let store = Arc::new(MemoryPriceStore::with_observations(observations));

    let outcome = processor(&store).process_event(&trigger).await.unwrap();

    assert_eq!(
        outcome,
        ProcessOutcome::InsufficientData {
            symbol: "AAPL".to_string(),
            available: 4,
        }
    );
    assert_eq!(store.average_rows(), 0);
}

#[tokio::test]
async fn overflowing_window_keeps_the_previous_average() {
    let observations = five_observations();
    let first = event_for(&observations[4]);
    let store = Arc::new(MemoryPriceStore::with_observations(observations));
    let processor = processor(&store);
    processor.process_event(&first).await.unwrap();

    let huge = Decimal::MAX / dec!(2);
    for minute in 5..10 {
        store.add(observation(&format!("obs-{}", minute + 1), "AAPL", huge, minute));
    }
    let trigger = store.stored_observations().last().cloned().unwrap();

    let outcome = processor.process_event(&event_for(&trigger)).await.unwrap();

    assert_eq!(
        outcome,
        ProcessOutcome::Overflow {
            symbol: "AAPL".to_string(),
        }
    );
    assert_eq!(store.average("AAPL").unwrap().value(), dec!(102));
}

#[tokio::test]
async fn event_without_its_observation_stores_nothing() {
    let orphan = observation("obs-404", "AAPL", dec!(99), 9);
    let store = Arc::new(MemoryPriceStore::with_observations(five_observations()));

    let outcome = processor(&store)
        .process_event(&event_for(&orphan))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ProcessOutcome::ObservationMissing {
            raw_response_id: "obs-404".to_string(),
        }
    );
    assert_eq!(store.average_rows(), 0);
}

#[tokio::test]
async fn malformed_payload_is_reported_as_such() {
    let store = Arc::new(MemoryPriceStore::default());

    let err = processor(&store)
        .process_payload(b"{not json")
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::Malformed(_)));
}

#[tokio::test]
async fn consumer_skips_malformed_messages_and_keeps_going() {
    let observations = five_observations();
    let valid = event_for(&observations[4]).to_json().unwrap();
    let store = Arc::new(MemoryPriceStore::with_observations(observations));
    let done = CancellationToken::new();
    let source = Arc::new(MemorySource::new(
        vec![
            delivery(0, b"{\"symbol\": \"AAPL\"}".to_vec()),
            delivery(1, valid),
        ],
        done.clone(),
    ));
    let consumer = EventConsumerImpl::new(
        source.clone(),
        Arc::new(processor(&store)),
        Duration::from_millis(10),
        Duration::from_millis(1),
    );

    let report = consumer.run(done).await;

    assert_eq!(report.received, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(source.commits(), vec![1]);
    assert_eq!(source.close_count(), 1);
    assert_eq!(store.average("AAPL").unwrap().value(), dec!(102));
}

#[tokio::test]
async fn consumer_commits_skipped_events() {
    let orphan = observation("obs-404", "AAPL", dec!(99), 9);
    let store = Arc::new(MemoryPriceStore::default());
    let done = CancellationToken::new();
    let source = Arc::new(MemorySource::new(
        vec![delivery(7, event_for(&orphan).to_json().unwrap())],
        done.clone(),
    ));
    let consumer = EventConsumerImpl::new(
        source.clone(),
        Arc::new(processor(&store)),
        Duration::from_millis(10),
        Duration::from_millis(1),
    );

    let report = consumer.run(done).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(source.commits(), vec![7]);
    assert!(source.rewinds().is_empty());
}

#[tokio::test]
async fn persistence_failure_redelivers_without_committing() {
    let observations = five_observations();
    let valid = event_for(&observations[4]).to_json().unwrap();
    let store = Arc::new(MemoryPriceStore::with_observations(observations));
    store.fail_next_upserts(1);
    let done = CancellationToken::new();
    let source = Arc::new(MemorySource::new(vec![delivery(3, valid)], done.clone()));
    let consumer = EventConsumerImpl::new(
        source.clone(),
        Arc::new(processor(&store)),
        Duration::from_millis(10),
        Duration::from_millis(1),
    );

    let report = consumer.run(done).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(report.received, 2);
    assert_eq!(source.rewinds(), vec![3]);
    assert_eq!(source.commits(), vec![3]);
    assert_eq!(store.average_rows(), 1);
}
