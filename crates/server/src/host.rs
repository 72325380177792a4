//! Host-side collaborators: where notifications and update prompts land.
//!
//! Over stdio there is no screen, so both are logged and buffered until the
//! next tool call picks them up.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Serialize;
use wikioffline_core::{LifecycleSignal, Notification, NotificationSink, UpdatePrompt};

/// Oldest entries are dropped past this many.
const BUFFER_CAP: usize = 64;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ShownNotification {
    #[serde(flatten)]
    pub notification: Notification,
    /// RFC 3339 timestamp.
    pub shown_at: String,
}

#[derive(Default)]
pub struct HostNotifier {
    buffer: Mutex<VecDeque<ShownNotification>>,
}

impl HostNotifier {
    /// Take every buffered notification.
    pub fn drain(&self) -> Vec<ShownNotification> {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl NotificationSink for HostNotifier {
    fn show(&self, notification: Notification) {
        tracing::info!(title = %notification.title, data = %notification.data, "notification shown");
        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.len() == BUFFER_CAP {
                buffer.pop_front();
            }
            buffer.push_back(ShownNotification { notification, shown_at: Utc::now().to_rfc3339() });
        }
    }
}

/// Answers update prompts from configuration and records every signal.
pub struct HostPrompt {
    auto_accept: bool,
    signals: Mutex<Vec<LifecycleSignal>>,
}

impl HostPrompt {
    pub fn new(auto_accept: bool) -> Self {
        Self { auto_accept, signals: Mutex::new(Vec::new()) }
    }

    fn record(&self, signal: LifecycleSignal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
    }

    pub fn signals(&self) -> Vec<LifecycleSignal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UpdatePrompt for HostPrompt {
    async fn confirm_update(&self) -> bool {
        self.record(LifecycleSignal::UpdateAvailable);
        tracing::info!(accept = self.auto_accept, "update available");
        self.auto_accept
    }

    fn offline_ready(&self) {
        self.record(LifecycleSignal::OfflineReady);
        tracing::info!("ready to work offline");
    }

    fn reload(&self) {
        self.record(LifecycleSignal::Reload);
        tracing::info!("controller changed, client should reload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(title: &str) -> Notification {
        Notification { title: title.into(), icon: "/i.png".into(), body: "View the article".into(), data: title.into() }
    }

    #[test]
    fn test_notifier_buffers_until_drained() {
        let notifier = HostNotifier::default();
        notifier.show(notification("Cat ready!"));
        notifier.show(notification("Dog ready!"));

        let shown = notifier.drain();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].notification.title, "Cat ready!");
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn test_notifier_caps_buffer() {
        let notifier = HostNotifier::default();
        for i in 0..BUFFER_CAP + 3 {
            notifier.show(notification(&format!("{i}")));
        }
        let shown = notifier.drain();
        assert_eq!(shown.len(), BUFFER_CAP);
        assert_eq!(shown[0].notification.title, "3");
    }

    #[tokio::test]
    async fn test_prompt_answers_from_config() {
        assert!(HostPrompt::new(true).confirm_update().await);

        let prompt = HostPrompt::new(false);
        assert!(!prompt.confirm_update().await);
        prompt.reload();
        assert_eq!(prompt.signals(), vec![LifecycleSignal::UpdateAvailable, LifecycleSignal::Reload]);
    }
}
