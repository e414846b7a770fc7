//! Integration tests driving commands through intake, executors and the
//! output lanes.

mod common;

use std::time::Duration;

use accounts_core::message::{Document, Event};
use accounts_test_support::ChannelCommandSource;
use serde_json::json;

use common::{EVENTS_TOPIC, RESPONSE_TOPIC};

const WAIT: Duration = Duration::from_secs(5);

fn decode_ack(payload: &[u8]) -> Document {
    serde_json::from_slice(payload).unwrap()
}

#[tokio::test]
async fn test_register_publishes_event_and_ack() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let command = service.command("RegisterUser", &common::registration("ada"));

    // Act
    intake
        .deliveries
        .send(common::delivery(1, &command))
        .await
        .unwrap();
    let sent = service.producer.wait_for(2, WAIT).await;

    // Assert
    let event_record = sent.iter().find(|r| r.topic == EVENTS_TOPIC).unwrap();
    let event: Event = serde_json::from_slice(&event_record.payload).unwrap();
    assert_eq!(event.action, "RegisterUser");
    assert_eq!(event.correlation_id, command.uuid);
    assert_eq!(event.source, common::SERVICE_NAME);
    assert_eq!(event_record.key, event.uuid.to_string());

    let ack_record = sent.iter().find(|r| r.topic == RESPONSE_TOPIC).unwrap();
    let ack = decode_ack(&ack_record.payload);
    assert_eq!(ack.correlation_id, command.uuid);
    assert_eq!(ack.error_code, 0);
    assert_eq!(ack.data, event.data);

    let accounts = service.store.accounts();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].user_name, "ada");
    assert_ne!(accounts[0].password, "analytical-engine");
    assert_eq!(*intake.acknowledged.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected_after_replay() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let first = service.command("RegisterUser", &common::registration("ada"));
    intake
        .deliveries
        .send(common::delivery(1, &first))
        .await
        .unwrap();
    let sent = service.producer.wait_for(2, WAIT).await;
    let event_record = sent.iter().find(|r| r.topic == EVENTS_TOPIC).unwrap();
    service
        .replay
        .push(serde_json::from_slice(&event_record.payload).unwrap());

    // Act
    let second = service.command("RegisterUser", &common::registration("ada"));
    intake
        .deliveries
        .send(common::delivery(2, &second))
        .await
        .unwrap();
    let sent = service.producer.wait_for(3, WAIT).await;

    // Assert
    let ack = sent
        .iter()
        .filter(|r| r.topic == RESPONSE_TOPIC)
        .map(|r| decode_ack(&r.payload))
        .find(|doc| doc.correlation_id == second.uuid)
        .unwrap();
    assert_eq!(ack.error, "user already exists");
    assert_eq!(ack.error_code, 2);
    assert_eq!(sent.iter().filter(|r| r.topic == EVENTS_TOPIC).count(), 1);
    assert_eq!(service.rebuild.snapshot().applied, 1);
    assert_eq!(service.store.accounts().len(), 1);
}

#[tokio::test]
async fn test_delete_after_register_reports_matched_count() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let register = service.command("RegisterUser", &common::registration("grace"));
    intake
        .deliveries
        .send(common::delivery(1, &register))
        .await
        .unwrap();
    service.producer.wait_for(2, WAIT).await;

    // Act
    let delete = service.command("DeleteUser", &json!({"userName": "grace"}));
    intake
        .deliveries
        .send(common::delivery(2, &delete))
        .await
        .unwrap();
    let sent = service.producer.wait_for(4, WAIT).await;

    // Assert
    let ack = sent
        .iter()
        .filter(|r| r.topic == RESPONSE_TOPIC)
        .map(|r| decode_ack(&r.payload))
        .find(|doc| doc.correlation_id == delete.uuid)
        .unwrap();
    assert_eq!(ack.error_code, 0);
    let result: serde_json::Value = serde_json::from_slice(&ack.data).unwrap();
    assert_eq!(result["matchedCount"], 1);

    let deleted = sent
        .iter()
        .filter(|r| r.topic == EVENTS_TOPIC)
        .map(|r| serde_json::from_slice::<Event>(&r.payload).unwrap())
        .find(|event| event.correlation_id == delete.uuid)
        .unwrap();
    assert_eq!(deleted.action, "UserDeleted");
}

#[tokio::test]
async fn test_expired_command_is_acknowledged_but_not_executed() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let mut command = service.command("RegisterUser", &common::registration("ada"));
    command.timestamp -= 60;
    command.ttl_sec = 10;

    // Act
    intake
        .deliveries
        .send(common::delivery(5, &command))
        .await
        .unwrap();
    let snapshot = service.wait_until(WAIT, |s| s.commands_expired == 1).await;

    // Assert
    assert_eq!(snapshot.commands_expired, 1);
    assert_eq!(snapshot.commands_accepted, 0);
    assert!(service.producer.sent().is_empty());
    assert!(service.store.accounts().is_empty());
    assert_eq!(*intake.acknowledged.lock().unwrap(), vec![5]);
}

#[tokio::test]
async fn test_invalid_envelopes_are_dropped_without_reply() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let mut no_topic = service.command("RegisterUser", &common::registration("ada"));
    no_topic.response_topic = String::new();
    let no_action = service.command("", &common::registration("ada"));

    // Act
    for delivery in [
        ChannelCommandSource::delivery(1, b"not json".to_vec()),
        common::delivery(2, &no_topic),
        common::delivery(3, &no_action),
    ] {
        intake.deliveries.send(delivery).await.unwrap();
    }
    let snapshot = service.wait_until(WAIT, |s| s.commands_dropped == 3).await;

    // Assert
    assert_eq!(snapshot.commands_received, 3);
    assert_eq!(snapshot.commands_dropped, 3);
    assert!(service.producer.sent().is_empty());
    assert_eq!(*intake.acknowledged.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_intake_stops_when_source_closes() {
    let service = common::build_service();
    let intake = service.start();

    drop(intake.deliveries);
    let result = tokio::time::timeout(WAIT, intake.task).await.unwrap();

    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_metrics_endpoint_reflects_processed_commands() {
    // Arrange
    let service = common::build_service();
    let intake = service.start();
    let command = service.command("DeleteUser", &json!({"userName": "nobody"}));

    // Act
    intake
        .deliveries
        .send(common::delivery(1, &command))
        .await
        .unwrap();
    service.wait_until(WAIT, |s| s.acks_published == 1).await;
    let (_, json) = common::get_json(service.router(), "/metrics").await;

    // Assert
    assert_eq!(json["commands_received"], 1);
    assert_eq!(json["commands_accepted"], 1);
    assert_eq!(json["acks_published"], 1);
    assert_eq!(json["events_published"], 0);
    assert_eq!(json["rebuild"]["runs"], 1);
}
