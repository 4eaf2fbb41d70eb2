//! Rate-limited SMS alerts.
//!
//! At most one message is delivered per (recipient, farm) pair per cooldown
//! window. Only a confirmed delivery starts the window.

pub mod clock;
pub mod twilio;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use twilio::TwilioNotifier;

pub const DEFAULT_COOLDOWN: SignedDuration = SignedDuration::from_secs(300);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("sms backend not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected message with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Backend acknowledgement of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub id: String,
}

/// A message transport, e.g. an SMS gateway.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether credentials are present. Unconfigured notifiers are never
    /// asked to send.
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, body: &str) -> Result<Receipt, NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    recipient: String,
    farm: String,
}

impl CooldownKey {
    fn new(recipient: &str, farm: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            farm: farm.to_string(),
        }
    }
}

type CooldownSlot = Arc<Mutex<Option<Timestamp>>>;

pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cooldown: SignedDuration,
    /// Last successful send per key. A key's slot stays locked for the whole
    /// check-send-update sequence.
    last_sent: DashMap<CooldownKey, CooldownSlot>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            clock: Arc::new(SystemClock),
            cooldown: DEFAULT_COOLDOWN,
            last_sent: DashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cooldown(mut self, cooldown: SignedDuration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> SignedDuration {
        self.cooldown
    }

    /// Formats and sends a water-quality alert.
    ///
    /// Returns `true` only if the message was delivered. Suppression by
    /// cooldown, a missing backend configuration and transport failures all
    /// return `false`.
    pub async fn notify(
        &self,
        recipient: &str,
        farm_name: &str,
        alert_type: &str,
        current: &str,
        threshold: &str,
    ) -> bool {
        let message = format_alert(farm_name, alert_type, current, threshold);
        self.send(recipient, farm_name, &message).await
    }

    /// Sends a preformatted message under the cooldown rules.
    pub async fn send(&self, recipient: &str, farm_name: &str, message: &str) -> bool {
        if !self.notifier.is_configured() {
            warn!(%recipient, farm = %farm_name, %message, "SMS not configured, alert not sent");
            return false;
        }

        let slot = self
            .last_sent
            .entry(CooldownKey::new(recipient, farm_name))
            .or_default()
            .clone();
        let mut last_sent = slot.lock().await;

        let now = self.clock.now();
        if let Some(previous) = *last_sent
            && now.duration_since(previous) < self.cooldown
        {
            info!(farm = %farm_name, "Alert cooldown active");
            return false;
        }

        match self.notifier.send(recipient, message).await {
            Ok(receipt) => {
                *last_sent = Some(now);
                info!(%recipient, farm = %farm_name, receipt = %receipt.id, "SMS alert sent");
                true
            }
            Err(e) => {
                error!(%recipient, farm = %farm_name, error = %e, "SMS alert failed");
                false
            }
        }
    }

    /// Time of the last delivered alert for this pair, if any.
    pub async fn last_sent(&self, recipient: &str, farm_name: &str) -> Option<Timestamp> {
        let slot = self
            .last_sent
            .get(&CooldownKey::new(recipient, farm_name))
            .map(|entry| entry.value().clone())?;
        let last_sent = *slot.lock().await;
        last_sent
    }
}

pub fn format_alert(farm_name: &str, alert_type: &str, current: &str, threshold: &str) -> String {
    format!(
        "🚨 AquaTrace Alert\n\
         Farm: {farm_name}\n\
         Alert: {alert_type}\n\
         Current: {current}\n\
         Threshold: {threshold}\n\
         Action: Check water quality immediately"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        unconfigured: bool,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn is_configured(&self) -> bool {
            !self.unconfigured
        }

        async fn send(&self, _to: &str, _body: &str) -> Result<Receipt, NotifyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotifyError::Rejected {
                    status: 500,
                    message: "gateway down".into(),
                });
            }
            Ok(Receipt {
                id: format!("SM{n}"),
            })
        }
    }

    fn start() -> Timestamp {
        Timestamp::from_second(1_700_000_000).unwrap()
    }

    fn dispatcher(notifier: Arc<RecordingNotifier>, clock: Arc<ManualClock>) -> AlertDispatcher {
        AlertDispatcher::new(notifier).with_clock(clock)
    }

    async fn high_risk(dispatcher: &AlertDispatcher, farm: &str) -> bool {
        dispatcher
            .notify(
                "+15550001111",
                farm,
                "High Risk Detected",
                "Temp: 33.1°C, Turbidity: 1300 NTU",
                "Check thresholds",
            )
            .await
    }

    #[test]
    fn message_template() {
        let message = format_alert("Pond A", "High Risk Detected", "Temp: 33°C", "Check thresholds");
        assert_eq!(
            message,
            "🚨 AquaTrace Alert\nFarm: Pond A\nAlert: High Risk Detected\nCurrent: Temp: 33°C\nThreshold: Check thresholds\nAction: Check water quality immediately"
        );
    }

    #[tokio::test]
    async fn cooldown_suppresses_then_expires() {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = dispatcher(notifier.clone(), clock.clone());

        assert!(high_risk(&dispatcher, "Pond A").await);
        assert!(!high_risk(&dispatcher, "Pond A").await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        clock.advance(SignedDuration::from_secs(299));
        assert!(!high_risk(&dispatcher, "Pond A").await);

        clock.advance(SignedDuration::from_secs(1));
        assert!(high_risk(&dispatcher, "Pond A").await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn keys_cool_down_independently() {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = dispatcher(notifier.clone(), clock);

        assert!(high_risk(&dispatcher, "Pond A").await);
        assert!(high_risk(&dispatcher, "Pond B").await);
        assert!(
            dispatcher
                .notify("+15559999999", "Pond A", "High Risk Detected", "-", "-")
                .await
        );
    }

    #[tokio::test]
    async fn unconfigured_never_touches_cooldown() {
        let notifier = Arc::new(RecordingNotifier {
            unconfigured: true,
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = dispatcher(notifier.clone(), clock);

        assert!(!high_risk(&dispatcher, "Pond A").await);
        assert!(!high_risk(&dispatcher, "Pond A").await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
        assert!(dispatcher.last_sent.is_empty());
        assert_eq!(dispatcher.last_sent("+15550001111", "Pond A").await, None);
    }

    #[tokio::test]
    async fn transport_failure_does_not_start_cooldown() {
        let notifier = Arc::new(RecordingNotifier::default());
        notifier.failing.store(true, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = dispatcher(notifier.clone(), clock);

        assert!(!high_risk(&dispatcher, "Pond A").await);
        assert_eq!(dispatcher.last_sent("+15550001111", "Pond A").await, None);

        notifier.failing.store(false, Ordering::SeqCst);
        assert!(high_risk(&dispatcher, "Pond A").await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            dispatcher.last_sent("+15550001111", "Pond A").await,
            Some(start())
        );
    }

    #[tokio::test]
    async fn custom_cooldown_window() {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher =
            dispatcher(notifier, clock.clone()).with_cooldown(SignedDuration::from_secs(10));

        assert!(high_risk(&dispatcher, "Pond A").await);
        clock.advance(SignedDuration::from_secs(10));
        assert!(high_risk(&dispatcher, "Pond A").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_send_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = Arc::new(dispatcher(notifier.clone(), clock));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                high_risk(&dispatcher, "Pond A").await
            }));
        }

        let mut sent = 0;
        for handle in handles {
            if handle.await.unwrap() {
                sent += 1;
            }
        }

        assert_eq!(sent, 1);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }
}
