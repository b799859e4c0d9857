use crate::types::EventRecord;
use tokio::sync::broadcast;

/// Committed audit records per slow subscriber before the channel starts
/// lagging them out.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out for committed [`EventRecord`]s. Publishing never blocks; with no
/// live subscribers the record comes back as an error, which callers that
/// only persist to the database ignore.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event: EventRecord,
    ) -> Result<(), broadcast::error::SendError<EventRecord>> {
        self.sender.send(event).map(|_| ())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
