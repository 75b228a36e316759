//! Mock tracing layer for testing.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::Layer;

/// Mock layer that captures events for testing.
#[derive(Clone, Default)]
pub struct MockCaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Captured event information.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Every field except `message`, rendered as text
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of the field `name`, if the event carried it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl MockCaptureLayer {
    /// Create a new mock capture layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn get_captured(&self) -> Vec<CapturedEvent> {
        self.captured.lock().clone()
    }

    /// Get the captured events whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.captured
            .lock()
            .iter()
            .filter(|event| event.message == message)
            .cloned()
            .collect()
    }

    /// Get the count of captured events.
    pub fn count(&self) -> usize {
        self.captured.lock().len()
    }

    /// Clear all captured events.
    ///
    /// # Examples
    ///
    /// ```
    /// use stats_throttle::infrastructure::mocks::MockCaptureLayer;
    /// use tracing::info;
    /// use tracing_subscriber::layer::SubscriberExt;
    ///
    /// let capture = MockCaptureLayer::new();
    /// let subscriber = tracing_subscriber::registry().with(capture.clone());
    ///
    /// tracing::subscriber::with_default(subscriber, || {
    ///     info!("test message");
    ///     assert_eq!(capture.count(), 1);
    ///
    ///     capture.clear();
    ///     assert_eq!(capture.count(), 0);
    /// });
    /// ```
    pub fn clear(&self) {
        self.captured.lock().clear();
    }
}

impl<S> Layer<S> for MockCaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        self.captured.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}
