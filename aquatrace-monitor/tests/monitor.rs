use std::fmt;
use std::sync::{Arc, Mutex};

use aquatrace_core::*;
use aquatrace_monitor::alert::{AlertDispatcher, Notifier, NotifyError, Receipt};
use aquatrace_monitor::monitor::{Monitor, MonitorError};
use aquatrace_monitor::source::ReadingSource;
use aquatrace_monitor::storage::{FarmRegistry, MemoryStorage, ReadingRegistry};
use async_trait::async_trait;

struct FixedSource(Option<Reading>);

#[async_trait]
impl ReadingSource for FixedSource {
    async fn acquire(&self) -> Option<Reading> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, to: &str, body: &str) -> Result<Receipt, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(Receipt { id: "SM1".into() })
    }
}

fn reading(temperature: f64, oxygen: f64, ammonia: f64, turbidity: f64) -> Reading {
    Reading {
        temperature,
        oxygen,
        ph: 7.2,
        ammonia,
        turbidity,
        timestamp: jiff::Timestamp::now(),
        error: None,
    }
}

fn farm(owner_phone: Option<&str>, species: Option<&str>) -> Farm {
    Farm {
        id: FarmId::new(),
        name: "Pond A".into(),
        owner_phone: owner_phone.map(Into::into),
        species: species.map(Into::into),
        location: None,
        pond_size_m3: None,
        thresholds: ThresholdSet::default(),
        created_at: jiff::Timestamp::now(),
    }
}

async fn setup(
    source: Option<Reading>,
    farm: Farm,
) -> (
    Monitor<MemoryStorage, MemoryStorage>,
    Arc<RecordingNotifier>,
    MemoryStorage,
) {
    let storage = MemoryStorage::new();
    storage.register(farm).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = Arc::new(AlertDispatcher::new(notifier.clone()));
    let monitor = Monitor::new(
        Arc::new(FixedSource(source)),
        storage.clone(),
        storage.clone(),
        alerts,
    );

    (monitor, notifier, storage)
}

#[tokio::test]
async fn safe_poll_records_without_alert() {
    let farm = farm(Some("+15551234567"), Some("Tilapia"));
    let farm_id = farm.id;
    let (monitor, notifier, storage) = setup(Some(reading(27.0, 6.0, 0.02, 500.0)), farm).await;

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.risk.level, RiskLevel::Safe);
    assert!(!report.risk.alert);
    assert_eq!(report.thresholds, ThresholdSet::default());

    let recent = storage.list_recent(farm_id, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].risk, RiskLevel::Safe);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn high_risk_poll_alerts_owner_once() {
    let farm = farm(Some(" +15551234567 "), None);
    let farm_id = farm.id;
    let (monitor, notifier, _) = setup(Some(reading(33.0, 6.0, 0.02, 1300.0)), farm).await;

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.risk.level, RiskLevel::High);
    assert!(report.risk.alert);

    // Second poll lands inside the cooldown window.
    monitor.poll(farm_id).await.unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+15551234567");
    assert!(sent[0].1.contains("Farm: Pond A"));
    assert!(sent[0].1.contains("Alert: High Risk Detected"));
    assert!(sent[0].1.contains("Current: Temp: 33.0°C, Turbidity: 1300.0 NTU"));
    assert!(sent[0].1.contains("Threshold: Check thresholds"));
}

#[tokio::test]
async fn high_risk_without_phone_skips_alert() {
    let farm = farm(Some("   "), None);
    let farm_id = farm.id;
    let (monitor, notifier, _) = setup(Some(reading(33.0, 6.0, 0.02, 1300.0)), farm).await;

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.risk.level, RiskLevel::High);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn moderate_risk_does_not_alert() {
    let farm = farm(Some("+15551234567"), None);
    let farm_id = farm.id;
    let (monitor, notifier, _) = setup(Some(reading(31.0, 6.0, 0.02, 1000.0)), farm).await;

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.risk.level, RiskLevel::Moderate);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn empty_source_yields_no_data() {
    let farm = farm(None, None);
    let farm_id = farm.id;
    let (monitor, _, storage) = setup(None, farm).await;

    assert!(matches!(monitor.poll(farm_id).await, Err(MonitorError::NoData)));
    assert!(storage.latest(farm_id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_farm_is_rejected() {
    let (monitor, _, _) = setup(Some(reading(27.0, 6.0, 0.02, 500.0)), farm(None, None)).await;

    let missing = FarmId::new();
    assert!(matches!(
        monitor.poll(missing).await,
        Err(MonitorError::FarmNotFound(id)) if id == missing
    ));
    assert!(matches!(
        monitor.predict(missing).await,
        Err(MonitorError::FarmNotFound(_))
    ));
}

#[tokio::test]
async fn degraded_reading_is_reported_not_failed() {
    let farm = farm(None, None);
    let farm_id = farm.id;
    let (monitor, _, _) = setup(
        Some(Reading::unavailable("Sensor channel not available")),
        farm,
    )
    .await;

    let report = monitor.poll(farm_id).await.unwrap();
    assert!(report.reading.is_degraded());
    assert_eq!(report.risk.level, RiskLevel::Safe);
}

#[tokio::test]
async fn predict_uses_latest_reading_and_species() {
    let farm = farm(None, Some("Trout"));
    let farm_id = farm.id;
    let (monitor, _, _) = setup(Some(reading(12.0, 7.0, 0.01, 100.0)), farm).await;

    assert!(matches!(
        monitor.predict(farm_id).await,
        Err(MonitorError::NoReadings(_))
    ));

    monitor.poll(farm_id).await.unwrap();
    let prediction = monitor.predict(farm_id).await.unwrap();
    assert_eq!(prediction.fish_type, "Trout");
    assert_eq!(prediction.health_score, 100.0);
    assert_eq!(prediction.predicted_monthly_growth_kg, 4.0);
}

#[tokio::test]
async fn report_serializes_flat() {
    let farm = farm(None, None);
    let farm_id = farm.id;
    let (monitor, _, _) = setup(Some(reading(33.0, 6.0, 0.02, 100.0)), farm).await;

    let report = monitor.poll(farm_id).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["temperature"], 33.0);
    assert_eq!(json["risk_level"], "HIGH");
    assert_eq!(json["risk"], "HIGH RISK ⚠️");
    assert_eq!(json["alert"], true);
    assert_eq!(json["thresholds"]["temp_max"], 32.0);
    assert!(json.get("error").is_none());
}

#[derive(Debug)]
struct DiskFull;

impl fmt::Display for DiskFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("disk full")
    }
}

impl std::error::Error for DiskFull {}

/// Reading history that rejects every write.
#[derive(Clone)]
struct ReadOnlyHistory;

#[async_trait]
impl ReadingRegistry for ReadOnlyHistory {
    type Error = DiskFull;

    async fn store(&self, _reading: HistoricalReading) -> Result<(), Self::Error> {
        Err(DiskFull)
    }

    async fn latest(&self, _farm_id: FarmId) -> Result<Option<HistoricalReading>, Self::Error> {
        Ok(None)
    }

    async fn list_recent(
        &self,
        _farm_id: FarmId,
        _limit: usize,
    ) -> Result<Vec<HistoricalReading>, Self::Error> {
        Ok(Vec::new())
    }
}

struct DownGateway;

#[async_trait]
impl Notifier for DownGateway {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, _to: &str, _body: &str) -> Result<Receipt, NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            message: "gateway down".into(),
        })
    }
}

#[tokio::test]
async fn failed_save_still_reports_and_alerts() {
    let farm = farm(Some("+15551234567"), None);
    let farm_id = farm.id;
    let farms = MemoryStorage::new();
    farms.register(farm).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Monitor::new(
        Arc::new(FixedSource(Some(reading(33.0, 6.0, 0.02, 1300.0)))),
        farms,
        ReadOnlyHistory,
        Arc::new(AlertDispatcher::new(notifier.clone())),
    );

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.risk.level, RiskLevel::High);
    assert_eq!(report.reading.temperature, 33.0);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_delivery_leaves_report_unchanged() {
    let farm = farm(Some("+15551234567"), None);
    let farm_id = farm.id;
    let storage = MemoryStorage::new();
    storage.register(farm).await.unwrap();

    let sample = reading(33.0, 6.0, 0.02, 1300.0);
    let monitor = Monitor::new(
        Arc::new(FixedSource(Some(sample.clone()))),
        storage.clone(),
        storage.clone(),
        Arc::new(AlertDispatcher::new(Arc::new(DownGateway))),
    );

    let report = monitor.poll(farm_id).await.unwrap();
    assert_eq!(report.reading, sample);
    assert_eq!(report.risk, classify(33.0, 1300.0));
    assert!(report.risk.alert);
    assert_eq!(storage.list_recent(farm_id, 10).await.unwrap().len(), 1);
}
