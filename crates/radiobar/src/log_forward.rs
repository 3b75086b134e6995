use tokio::sync::broadcast;

use crate::widgets::status_bar::LogLine;

/// Tracing layer that forwards WARN and ERROR events to the TUI status line.
pub struct LogForwardLayer {
    sender: broadcast::Sender<LogLine>,
}

impl LogForwardLayer {
    pub fn new(sender: broadcast::Sender<LogLine>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogForwardLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        // Only WARN and ERROR; the rest goes to the log file
        let level = *event.metadata().level();
        if !matches!(level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut text = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut text);
        event.record(&mut visitor);

        // No receivers is fine (TUI not up yet, or already gone)
        let _ = self.sender.send(LogLine {
            text,
            is_error: level == tracing::Level::ERROR,
        });
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}
