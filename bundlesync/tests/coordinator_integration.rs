//! End-to-end initialization tests.
//!
//! Run with: `cargo test --test coordinator_integration`

mod common;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bundlesync::catalog::{
    BoxFuture, ColdStartPolicy, DirectoryCatalog, FlagStore, JsonFlagStore, KeySource,
    MemoryFlagStore, ResourceLocator,
};
use bundlesync::config::SyncConfig;
use bundlesync::connectivity::{
    EnvironmentProbe, EnvironmentSample, SharedEnvironment, SharedProbe,
};
use bundlesync::coordinator::{ContentCoordinator, InitOutcome, SyncContext};
use bundlesync::events::RecordingObserver;
use bundlesync::manifest::{ManifestAsset, ProfileSelection};
use bundlesync::validation::ValidationOutcome;
use bundlesync::{SyncError, SyncObserver, SyncSignal};
use tokio_util::sync::CancellationToken;

use common::{keys, MirrorFixture, ScriptedCatalog};

fn mirror_config(fixture: &MirrorFixture) -> SyncConfig {
    SyncConfig::new(&fixture.data_dir).with_retry(1, Duration::from_millis(10))
}

fn mirror_coordinator(
    fixture: &MirrorFixture,
    config: SyncConfig,
    observer: Arc<RecordingObserver>,
) -> ContentCoordinator {
    let catalog =
        DirectoryCatalog::open(&fixture.mirror, fixture.cache_dir(), fixture.catalog_dir())
            .unwrap();
    let flags = JsonFlagStore::new(&config.flags_path);
    ContentCoordinator::new(
        SyncContext::new(config, Arc::new(catalog), Arc::new(flags)).with_observer(observer),
    )
}

fn deployment_config(temp: &tempfile::TempDir) -> SyncConfig {
    SyncConfig::new(temp.path()).with_profile_override(ProfileSelection::new("Deployment", "d"))
}

/// Reports a different reachability on every sample.
#[derive(Default)]
struct FlappingProbe {
    reachable: AtomicBool,
}

impl EnvironmentProbe for FlappingProbe {
    fn sample(&self) -> BoxFuture<'_, EnvironmentSample> {
        let reachable = !self.reachable.fetch_xor(true, Ordering::SeqCst);
        Box::pin(async move {
            EnvironmentSample {
                reachable,
                foreground: true,
            }
        })
    }
}

/// Requests shutdown as soon as a catalog update has been applied.
struct ShutdownOnUpdate {
    shutdown: CancellationToken,
}

impl SyncObserver for ShutdownOnUpdate {
    fn notify(&self, signal: SyncSignal) {
        if signal == SyncSignal::UpdateAvailable {
            self.shutdown.cancel();
        }
    }
}

fn report(outcome: InitOutcome) -> bundlesync::coordinator::InitReport {
    match outcome {
        InitOutcome::Initialized(report) => report,
        other => panic!("expected initialization, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fresh_install_downloads_and_validates() {
    let fixture = MirrorFixture::new("Deployment");
    let observer = Arc::new(RecordingObserver::new());
    let config = mirror_config(&fixture);
    let flags_path = config.flags_path.clone();

    let outcome = mirror_coordinator(&fixture, config, observer.clone())
        .initialize(&CancellationToken::new())
        .await
        .unwrap();

    let report = report(outcome);
    assert_eq!(report.source, KeySource::Update);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.full_redownloads, 0);
    assert_eq!(report.validation, ValidationOutcome::Valid);
    assert_eq!(fixture.cached_payloads().len(), 3);

    let signals = observer.signals();
    assert_eq!(signals.first(), Some(&SyncSignal::UpdateAvailable));
    assert!(signals.contains(&SyncSignal::DownloadStarted { total_keys: 2 }));
    assert_eq!(signals.last(), Some(&SyncSignal::Initialized));
    assert_eq!(observer.percentages(), vec![50.0, 100.0]);

    assert!(JsonFlagStore::new(flags_path)
        .initial_download_completed("Deployment")
        .unwrap());
}

#[tokio::test]
async fn test_second_run_does_no_download_work() {
    let fixture = MirrorFixture::new("Deployment");
    mirror_coordinator(&fixture, mirror_config(&fixture), Arc::new(RecordingObserver::new()))
        .initialize(&CancellationToken::new())
        .await
        .unwrap();

    let observer = Arc::new(RecordingObserver::new());
    let outcome = mirror_coordinator(&fixture, mirror_config(&fixture), observer.clone())
        .initialize(&CancellationToken::new())
        .await
        .unwrap();

    let report = report(outcome);
    assert_eq!(report.source, KeySource::AlreadyComplete);
    assert_eq!(report.downloaded, 0);
    assert_eq!(observer.signals(), vec![SyncSignal::Initialized]);
}

#[tokio::test]
async fn test_flag_set_and_no_update_makes_no_network_calls() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a", "b"]),
    )]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"));

    let coordinator = ContentCoordinator::new(SyncContext::new(
        config,
        catalog.clone(),
        Arc::new(MemoryFlagStore::completed("Deployment")),
    ));
    let outcome = coordinator.initialize(&CancellationToken::new()).await.unwrap();

    assert_eq!(report(outcome).source, KeySource::AlreadyComplete);
    assert_eq!(catalog.network_calls(), 0);
    assert!(catalog.released.lock().is_empty());
}

#[tokio::test]
async fn test_cold_start_downloads_loaded_locators() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![
        ResourceLocator::new("main", keys(&["a", "b"])),
        ResourceLocator::new("dlc", keys(&["b", "c"])),
    ]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"));
    let flags = Arc::new(MemoryFlagStore::new());

    let coordinator =
        ContentCoordinator::new(SyncContext::new(config, catalog.clone(), flags.clone()));
    let report = report(coordinator.initialize(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.source, KeySource::ColdStart);
    assert_eq!(catalog.downloads(), vec!["a", "b", "c"]);
    assert!(flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_cold_start_skip_policy() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a"]),
    )]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"))
        .with_cold_start_policy(ColdStartPolicy::Skip);
    let flags = Arc::new(MemoryFlagStore::new());

    let coordinator =
        ContentCoordinator::new(SyncContext::new(config, catalog.clone(), flags.clone()));
    let report = report(coordinator.initialize(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.source, KeySource::Skipped);
    assert_eq!(catalog.network_calls(), 0);
    assert!(!flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_editor_hosted_profile_initializes_immediately() {
    let fixture = MirrorFixture::new("EditorHosted");
    let observer = Arc::new(RecordingObserver::new());

    let outcome = mirror_coordinator(&fixture, mirror_config(&fixture), observer.clone())
        .initialize(&CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, InitOutcome::EditorHosted(_)));
    assert_eq!(observer.signals(), vec![SyncSignal::Initialized]);
    assert!(fixture.cached_payloads().is_empty());
}

#[tokio::test]
async fn test_manifest_without_profile_aborts() {
    let fixture = MirrorFixture::new("Deployment");
    let manifest_path = fixture.data_dir.join("content_manifest.json");
    let mut asset = ManifestAsset::read(&manifest_path).unwrap();
    asset.profile = None;
    asset.write(&manifest_path).unwrap();
    let observer = Arc::new(RecordingObserver::new());

    let result = mirror_coordinator(&fixture, mirror_config(&fixture), observer.clone())
        .initialize(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::ProfileMissing)));
    assert!(observer.signals().is_empty());
    assert!(fixture.cached_payloads().is_empty());
}

#[tokio::test]
async fn test_corrupted_cache_triggers_full_redownload() {
    let fixture = MirrorFixture::new("Deployment");
    mirror_coordinator(&fixture, mirror_config(&fixture), Arc::new(RecordingObserver::new()))
        .initialize(&CancellationToken::new())
        .await
        .unwrap();

    let victim = fixture.cached_payloads()[0].clone();
    fs::write(&victim, b"corrupted").unwrap();

    let observer = Arc::new(RecordingObserver::new());
    let report = report(
        mirror_coordinator(&fixture, mirror_config(&fixture), observer.clone())
            .initialize(&CancellationToken::new())
            .await
            .unwrap(),
    );

    assert_eq!(report.full_redownloads, 1);
    assert_eq!(report.validation, ValidationOutcome::Valid);
    assert_eq!(
        observer.count(|s| matches!(s, SyncSignal::ValidationFailed(_))),
        1
    );
    assert!(observer
        .signals()
        .contains(&SyncSignal::DownloadStarted { total_keys: 2 }));
    assert_ne!(fs::read(&victim).ok(), Some(b"corrupted".to_vec()));
}

#[tokio::test]
async fn test_persistent_mismatch_exhausts_redownloads() {
    let fixture = MirrorFixture::new("Deployment");
    // The mirror serves different bytes than the build recorded
    fs::write(fixture.mirror.join("group_def456.bundle"), b"tampered").unwrap();
    let observer = Arc::new(RecordingObserver::new());
    let config = mirror_config(&fixture).with_max_full_redownloads(1);
    let flags_path = config.flags_path.clone();

    let result = mirror_coordinator(&fixture, config, observer.clone())
        .initialize(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::ValidationExhausted { attempts: 1 })));
    assert_eq!(
        observer.count(|s| matches!(s, SyncSignal::ValidationFailed(_))),
        2
    );
    assert!(!JsonFlagStore::new(flags_path)
        .initial_download_completed("Deployment")
        .unwrap());
}

#[tokio::test]
async fn test_failed_keys_retried_after_delay() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["k1", "k2", "k3"]),
    )]));
    catalog.fail_times("k2", 2);
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"))
        .with_retry(3, Duration::from_millis(5));

    let coordinator = ContentCoordinator::new(SyncContext::new(
        config,
        catalog.clone(),
        Arc::new(MemoryFlagStore::new()),
    ));
    let report = report(coordinator.initialize(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.downloaded, 3);
    assert_eq!(catalog.downloads(), vec!["k1", "k3", "k2"]);
}

#[tokio::test]
async fn test_failed_keys_exhaust_retries() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["k1", "k2"]),
    )]));
    catalog.fail_times("k2", 100);
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"))
        .with_retry(2, Duration::from_millis(1));
    let flags = Arc::new(MemoryFlagStore::new());

    let coordinator =
        ContentCoordinator::new(SyncContext::new(config, catalog.clone(), flags.clone()));
    let result = coordinator.initialize(&CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(SyncError::PassFailed {
            attempts: 3,
            failed: 1
        })
    ));
    assert_eq!(catalog.downloads(), vec!["k1"]);
    assert!(!flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_waits_for_environment_then_resumes() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a", "b"]),
    )]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"))
        .with_retry(1, Duration::from_millis(5));
    let environment = SharedEnvironment::new();
    environment.set_disconnected(true);

    let coordinator = ContentCoordinator::new(
        SyncContext::new(config, catalog.clone(), Arc::new(MemoryFlagStore::new()))
            .with_environment(environment.clone()),
    );

    let reconnect = {
        let environment = environment.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            environment.set_disconnected(false);
        })
    };

    let report = report(coordinator.initialize(&CancellationToken::new()).await.unwrap());
    reconnect.await.unwrap();

    assert_eq!(report.downloaded, 2);
    assert_eq!(catalog.downloads(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_shutdown_while_disconnected_cancels() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a"]),
    )]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = SyncConfig::new(temp.path())
        .with_profile_override(ProfileSelection::new("Deployment", "d"))
        .with_retry(1, Duration::from_millis(5));
    let environment = SharedEnvironment::new();
    environment.set_disconnected(true);
    let flags = Arc::new(MemoryFlagStore::new());

    let coordinator = ContentCoordinator::new(
        SyncContext::new(config, catalog.clone(), flags.clone())
            .with_environment(environment),
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let outcome = coordinator.initialize(&shutdown).await.unwrap();
    assert_eq!(outcome, InitOutcome::Cancelled);
    assert!(catalog.downloads().is_empty());
    assert!(!flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_custom_catalog_signal() {
    let catalog = Arc::new(ScriptedCatalog::default());
    let temp = tempfile::TempDir::new().unwrap();
    let observer = Arc::new(RecordingObserver::new());
    let coordinator = ContentCoordinator::new(
        SyncContext::new(
            SyncConfig::new(temp.path()),
            catalog.clone(),
            Arc::new(MemoryFlagStore::new()),
        )
        .with_observer(observer.clone()),
    );

    let locator = coordinator.load_custom_catalog("dlc_catalog").await.unwrap();

    assert_eq!(locator.keys, keys(&["extra/a"]));
    assert_eq!(catalog.loaded.lock().len(), 1);
    assert_eq!(
        observer.signals(),
        vec![SyncSignal::CustomCatalogLoaded {
            locator_id: "dlc_catalog".to_string()
        }]
    );
}

#[tokio::test]
async fn test_monitor_stops_when_events_go_unread() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a"]),
    )]));
    *catalog.check_delay.lock() = Some(Duration::from_millis(200));
    let temp = tempfile::TempDir::new().unwrap();
    let config = deployment_config(&temp).with_monitor_interval(Duration::from_millis(1));

    let coordinator = ContentCoordinator::new(
        SyncContext::new(
            config,
            catalog.clone(),
            Arc::new(MemoryFlagStore::completed("Deployment")),
        )
        .with_probe(Arc::new(FlappingProbe::default())),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.initialize(&CancellationToken::new()),
    )
    .await
    .expect("initialization did not finish");

    assert_eq!(report(outcome.unwrap()).source, KeySource::AlreadyComplete);
    assert_eq!(catalog.network_calls(), 0);
}

#[tokio::test]
async fn test_corrupt_flag_file_falls_back_to_cold_start() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a", "b"]),
    )]));
    let temp = tempfile::TempDir::new().unwrap();
    let config = deployment_config(&temp);
    fs::write(&config.flags_path, "{ truncated").unwrap();
    let flags = Arc::new(JsonFlagStore::new(&config.flags_path));

    let coordinator =
        ContentCoordinator::new(SyncContext::new(config, catalog.clone(), flags.clone()));
    let report = report(coordinator.initialize(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.source, KeySource::ColdStart);
    assert_eq!(catalog.downloads(), vec!["a", "b"]);
    assert!(flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_interrupted_update_resumes_on_next_run() {
    let locator = ResourceLocator::new("main", keys(&["a", "b"]));
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![locator.clone()]));
    catalog.updates.lock().push("catalog_v2".to_string());
    *catalog.updated.lock() = vec![locator];
    let temp = tempfile::TempDir::new().unwrap();
    let flags = Arc::new(MemoryFlagStore::completed("Deployment"));

    let shutdown = CancellationToken::new();
    let first = ContentCoordinator::new(
        SyncContext::new(deployment_config(&temp), catalog.clone(), flags.clone())
            .with_observer(Arc::new(ShutdownOnUpdate {
                shutdown: shutdown.clone(),
            })),
    );
    assert_eq!(first.initialize(&shutdown).await.unwrap(), InitOutcome::Cancelled);
    assert!(catalog.downloads().is_empty());
    assert!(!flags.initial_download_completed("Deployment").unwrap());

    // The catalog now matches the mirror, so no update is reported again
    let second = ContentCoordinator::new(SyncContext::new(
        deployment_config(&temp),
        catalog.clone(),
        flags.clone(),
    ));
    let report = report(second.initialize(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.source, KeySource::ColdStart);
    assert_eq!(catalog.downloads(), vec!["a", "b"]);
    assert!(flags.initial_download_completed("Deployment").unwrap());
}

#[tokio::test]
async fn test_monitor_disconnect_cancels_and_resumes_pass() {
    let catalog = Arc::new(ScriptedCatalog::with_loaded(vec![ResourceLocator::new(
        "main",
        keys(&["a", "b", "c"]),
    )]));
    catalog.stall_once("b");
    let temp = tempfile::TempDir::new().unwrap();
    let config = deployment_config(&temp)
        .with_monitor_interval(Duration::from_millis(5))
        .with_retry(1, Duration::from_millis(10));
    let probe = SharedProbe::new();

    let coordinator = ContentCoordinator::new(
        SyncContext::new(config, catalog.clone(), Arc::new(MemoryFlagStore::new()))
            .with_probe(Arc::new(probe.clone())),
    );

    let network = {
        let catalog = catalog.clone();
        let probe = probe.clone();
        tokio::spawn(async move {
            // Wait for "b" to be in flight
            while catalog.download_calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            probe.set_reachable(false);
            tokio::time::sleep(Duration::from_millis(50)).await;
            probe.set_reachable(true);
        })
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.initialize(&CancellationToken::new()),
    )
    .await
    .expect("initialization did not finish");
    network.await.unwrap();

    let report = report(outcome.unwrap());
    assert_eq!(report.downloaded, 3);
    assert_eq!(catalog.downloads(), vec!["a", "b", "c"]);
    // "a" once, "b" stalled then retried, "c" once
    assert_eq!(catalog.download_calls.load(Ordering::SeqCst), 4);
}
