//! End-to-end channel manager scenarios against the in-memory control plane.

use std::sync::Arc;

use chrono::Utc;
use polycast::Error;
use polycast::channel::{ChannelEvent, ChannelManager, NO_ENABLED_OUTPUTS};
use polycast::domain::{ChannelStatus, EncodingSettings, StreamOrientation, StreamingService};
use restreamer_api::{FailPoint, InMemoryRestreamer};

fn manager() -> (ChannelManager, Arc<InMemoryRestreamer>) {
    let api = Arc::new(InMemoryRestreamer::new());
    (ChannelManager::new(Some(api.clone())), api)
}

async fn channel_with(manager: &mut ChannelManager, keys: &[&str]) -> String {
    let id = manager.create_channel("Main").unwrap().id.clone();
    for key in keys {
        manager
            .add_output(&id, StreamingService::Twitch, key, StreamOrientation::Auto, None)
            .await
            .unwrap();
    }
    id
}

fn keys(manager: &ChannelManager, id: &str) -> Vec<String> {
    manager
        .get(id)
        .unwrap()
        .outputs
        .iter()
        .map(|o| o.stream_key.clone())
        .collect()
}

#[tokio::test]
async fn start_with_no_enabled_outputs_errors() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["a"]).await;
    manager.set_output_enabled(&id, 0, false).await.unwrap();

    let err = manager.start_channel(&id).await.unwrap_err();
    assert!(matches!(err, Error::StartFailed(_)));

    let channel = manager.get(&id).unwrap();
    assert_eq!(channel.status, ChannelStatus::Error);
    assert_eq!(channel.last_error.as_deref(), Some(NO_ENABLED_OUTPUTS));
    assert!(channel.process_reference.is_none());
    assert!(api.calls_starting_with("create:").is_empty());
}

#[tokio::test]
async fn start_without_api_errors() {
    let mut manager = ChannelManager::new(None);
    let id = channel_with(&mut manager, &["a"]).await;

    assert!(manager.start_channel(&id).await.is_err());
    assert_eq!(manager.get(&id).unwrap().status, ChannelStatus::Error);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["a"]).await;

    manager.stop_channel(&id).await.unwrap();
    manager.start_channel(&id).await.unwrap();
    manager.stop_channel(&id).await.unwrap();
    manager.stop_channel(&id).await.unwrap();

    let channel = manager.get(&id).unwrap();
    assert_eq!(channel.status, ChannelStatus::Inactive);
    assert!(channel.process_reference.is_none());
    assert_eq!(api.calls_starting_with("stop:").len(), 1);
}

#[tokio::test]
async fn bulk_delete_keeps_survivor_order() {
    let (mut manager, _) = manager();
    let id = channel_with(&mut manager, &["k0", "k1", "k2", "k3", "k4"]).await;

    let report = manager.bulk_delete(&id, &[1, 3]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded, vec![3, 1]);
    assert_eq!(keys(&manager, &id), vec!["k0", "k2", "k4"]);
}

#[tokio::test]
async fn bulk_encoding_reports_each_item() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["a", "b"]).await;
    manager.start_channel(&id).await.unwrap();

    let encoding = EncodingSettings::video(4500, 1280, 720, 160);
    let report = manager
        .bulk_update_encoding(&id, &[0, 1, 5], encoding)
        .await
        .unwrap();
    assert_eq!(report.succeeded, vec![0, 1]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item, 5);
    assert_eq!(api.calls_starting_with("encoding:").len(), 2);
    assert_eq!(manager.get(&id).unwrap().outputs[1].encoding, encoding);
}

#[tokio::test]
async fn backup_links_stay_consistent() {
    let (mut manager, _) = manager();
    let id = channel_with(&mut manager, &["main", "backup", "other"]).await;

    manager.set_output_backup(&id, 0, 1).unwrap();
    {
        let channel = manager.get(&id).unwrap();
        assert_eq!(channel.backup_index(0), Some(1));
        assert_eq!(channel.primary_index(1), Some(0));
        assert!(!channel.outputs[1].enabled);
    }

    // a backup cannot take a backup of its own
    assert!(manager.set_output_backup(&id, 1, 2).is_err());

    // removing the backup clears the primary side too
    manager.remove_output(&id, 1).await.unwrap();
    let channel = manager.get(&id).unwrap();
    assert!(channel.outputs[0].failover.backup.is_none());
    assert!(channel.outputs.iter().all(|o| !o.failover.is_backup));
}

#[tokio::test]
async fn failover_and_restore_through_manager() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["primary", "backup"]).await;
    manager.set_output_backup(&id, 0, 1).unwrap();
    manager.start_channel(&id).await.unwrap();
    let mut events = manager.events().subscribe();

    manager.trigger_failover(&id, 0).await.unwrap();
    manager.trigger_failover(&id, 0).await.unwrap();
    assert_eq!(api.calls_starting_with("add_output:"), vec!["add_output:Twitch_1"]);
    assert!(matches!(
        events.try_recv().unwrap(),
        ChannelEvent::FailoverTriggered { .. }
    ));
    assert!(events.try_recv().is_err());

    manager.restore_primary(&id, 0).await.unwrap();
    let channel = manager.get(&id).unwrap();
    assert!(channel.outputs[0].enabled);
    assert!(!channel.outputs[1].enabled);
    assert!(matches!(
        events.try_recv().unwrap(),
        ChannelEvent::PrimaryRestored { index: 0, .. }
    ));
}

#[tokio::test]
async fn health_check_fails_over_dropped_primary() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["primary", "backup"]).await;
    manager.set_output_backup(&id, 0, 1).unwrap();
    manager.set_health_monitoring(&id, true).unwrap();
    {
        let channel = manager.get_mut(&id).unwrap();
        channel.health.failure_threshold = 1;
        channel.outputs[0].health.auto_reconnect_enabled = false;
    }
    manager.start_channel(&id).await.unwrap();

    api.drop_output(&id, "Twitch_0");
    let report = manager.check_health(&id, Utc::now()).await.unwrap();

    assert_eq!(report.unhealthy, vec![0]);
    assert!(report.failover_triggered);
    let channel = manager.get(&id).unwrap();
    assert!(channel.outputs[0].failover.active);
    assert!(channel.outputs[1].enabled);
}

#[tokio::test]
async fn live_add_output_rolls_back_on_remote_failure() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["a"]).await;
    manager.start_channel(&id).await.unwrap();
    api.fail(FailPoint::AddOutput);

    let result = manager
        .add_output(&id, StreamingService::YouTube, "yt", StreamOrientation::Auto, None)
        .await;
    assert!(result.is_err());
    assert_eq!(manager.get(&id).unwrap().outputs.len(), 1);
}

#[tokio::test]
async fn start_all_only_starts_auto_start_channels() {
    let (mut manager, _) = manager();
    let auto = channel_with(&mut manager, &["a"]).await;
    let manual = channel_with(&mut manager, &["b"]).await;
    manager.get_mut(&auto).unwrap().policy.auto_start = true;

    let report = manager.start_all().await;
    assert_eq!(report.succeeded, vec![auto.clone()]);
    assert_eq!(manager.get(&manual).unwrap().status, ChannelStatus::Inactive);

    manager.start_channel(&manual).await.unwrap();
    let report = manager.stop_all().await;
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn builtin_templates_cannot_be_deleted() {
    let (mut manager, _) = manager();
    let builtin = manager.templates().iter().next().unwrap().id.clone();

    let err = manager.delete_template(&builtin).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(manager.templates().get(&builtin).is_some());
}

#[tokio::test]
async fn live_removal_keeps_survivors_healthy() {
    let (mut manager, api) = manager();
    let id = manager.create_channel("Main").unwrap().id.clone();
    manager
        .add_output(&id, StreamingService::Twitch, "a", StreamOrientation::Auto, None)
        .await
        .unwrap();
    manager
        .add_output(&id, StreamingService::YouTube, "b", StreamOrientation::Auto, None)
        .await
        .unwrap();
    manager.set_health_monitoring(&id, true).unwrap();
    {
        let channel = manager.get_mut(&id).unwrap();
        channel.health.failure_threshold = 1;
        channel.policy.reconnect_delay_sec = 0;
    }
    manager.start_channel(&id).await.unwrap();

    manager.remove_output(&id, 0).await.unwrap();
    let report = manager.check_health(&id, Utc::now()).await.unwrap();

    assert!(report.all_healthy());
    assert!(report.reconnects.is_empty());
    let live: Vec<_> = api.outputs(&id).into_iter().map(|o| o.id).collect();
    assert_eq!(live, vec!["YouTube_0"]);
}

#[tokio::test]
async fn restarted_channel_is_checked_against_new_process() {
    let (mut manager, api) = manager();
    let id = channel_with(&mut manager, &["a", "b"]).await;
    manager.set_health_monitoring(&id, true).unwrap();

    manager.start_channel(&id).await.unwrap();
    manager.stop_channel(&id).await.unwrap();
    manager.start_channel(&id).await.unwrap();
    assert_eq!(api.process_count(&id), 1);

    let report = manager.check_health(&id, Utc::now()).await.unwrap();
    assert!(report.all_healthy());
    assert!(report.reconnects.is_empty());
}
