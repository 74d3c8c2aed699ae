use polycast::channel::ChannelManager;
use polycast::domain::{ChannelStatus, EncodingSettings, StreamOrientation, StreamingService};
use polycast::persistence::{JsonFileSettingsStore, SettingsStore};

#[tokio::test]
async fn save_and_reload_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileSettingsStore::new(dir.path().join("polycast.json"));

    let mut original = ChannelManager::new(None);
    let id = {
        let channel = original.create_channel("Studio").unwrap();
        channel.input_url = "rtmp://localhost/live/studio".to_string();
        channel.policy.auto_start = true;
        channel.id.clone()
    };
    original
        .add_output(
            &id,
            StreamingService::Twitch,
            "tw-key",
            StreamOrientation::Horizontal,
            Some(EncodingSettings::video(6000, 1920, 1080, 160)),
        )
        .await
        .unwrap();
    original
        .add_output(&id, StreamingService::YouTube, "yt-key", StreamOrientation::Auto, None)
        .await
        .unwrap();
    original
        .add_custom_output(
            &id,
            "rtmp://ingest.example.com/app",
            "custom-key",
            StreamOrientation::Vertical,
            None,
        )
        .await
        .unwrap();
    original.set_output_backup(&id, 0, 1).unwrap();
    original
        .create_template(
            "Low bandwidth",
            StreamingService::Kick,
            StreamOrientation::Horizontal,
            EncodingSettings::video(2500, 1280, 720, 128),
        )
        .unwrap();

    store.save(&original.save_to_settings()).await.unwrap();

    let document = store.load().await.unwrap().unwrap();
    let mut restored = ChannelManager::new(None);
    assert_eq!(restored.load_from_settings(&document), 1);

    let before = original.get(&id).unwrap();
    let after = restored.get(&id).unwrap();
    assert_eq!(after.name, "Studio");
    assert_eq!(after.input_url, before.input_url);
    assert!(after.policy.auto_start);
    assert_eq!(after.status, ChannelStatus::Inactive);
    assert_eq!(after.outputs.len(), 3);

    for (a, b) in before.outputs.iter().zip(&after.outputs) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.service, b.service);
        assert_eq!(a.stream_key, b.stream_key);
        assert_eq!(a.rtmp_url, b.rtmp_url);
        assert_eq!(a.target_orientation, b.target_orientation);
        assert_eq!(a.encoding, b.encoding);
        assert_eq!(a.enabled, b.enabled);
    }
    assert_eq!(after.backup_index(0), Some(1));
    assert_eq!(after.primary_index(1), Some(0));

    assert_eq!(
        restored.templates().customs().count(),
        original.templates().customs().count()
    );
    assert_eq!(restored.templates().len(), original.templates().len());
}

#[tokio::test]
async fn reloading_does_not_duplicate_channels() {
    let mut manager = ChannelManager::new(None);
    manager.create_channel("Only").unwrap();
    let document = manager.save_to_settings();

    assert_eq!(manager.load_from_settings(&document), 0);
    assert_eq!(manager.count(), 1);
}
