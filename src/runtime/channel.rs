use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::{
    AutoflowError, Result, ShareLock,
    common::BroadcastQueue,
    events::{Event, GraphEvent, Message},
};

const DEFAULT_EVENT_QUEUE_SIZE: usize = 2048;

/// Receives workflow events.
///
/// Listeners are called synchronously, in registration order, on the task
/// that runs the workflow. Returning an error (or panicking) only gets logged:
/// it never aborts the workflow or the remaining listeners.
pub trait EventListener: Send + Sync {
    fn on_event(
        &self,
        event: &Event<Message>,
    ) -> Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&Event<Message>) -> Result<()> + Send + Sync,
{
    fn on_event(
        &self,
        event: &Event<Message>,
    ) -> Result<()> {
        (self)(event)
    }
}

pub type EventHandle = Arc<dyn EventListener>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the workflow id
    /// eg. login*
    pub workflow_id: String,

    /// use the glob pattern to match the action id, workflow events carry an empty action id
    /// eg. step_*
    pub action_id: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            workflow_id: "*".to_string(),
            action_id: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        workflow_id: String,
        action_id: String,
    ) -> Self {
        Self {
            workflow_id,
            action_id,
        }
    }

    pub fn with_workflow_id(workflow_id: String) -> Self {
        Self {
            workflow_id,
            action_id: "*".to_string(),
        }
    }

    pub fn with_action_id(action_id: String) -> Self {
        Self {
            workflow_id: "*".to_string(),
            action_id,
        }
    }
}

#[derive(Clone)]
struct Filter {
    workflow_id: globset::GlobMatcher,
    action_id: globset::GlobMatcher,
}

impl Filter {
    fn new(options: &ChannelOptions) -> Result<Self> {
        let compile = |pattern: &str| {
            globset::Glob::new(pattern)
                .map(|g| g.compile_matcher())
                .map_err(|e| AutoflowError::Config(format!("invalid listener pattern '{}': {}", pattern, e)))
        };
        Ok(Self {
            workflow_id: compile(&options.workflow_id)?,
            action_id: compile(&options.action_id)?,
        })
    }

    fn is_match(
        &self,
        msg: &Message,
    ) -> bool {
        // Workflow events carry an empty action id, so they only pass action filters that match "".
        self.workflow_id.is_match(&msg.workflow_id) && self.action_id.is_match(&msg.action_id)
    }
}

#[derive(Clone)]
struct Registration {
    listener: EventHandle,
    filter: Filter,
}

/// Event bus of an engine.
///
/// Events are delivered to registered listeners synchronously and, in
/// addition, broadcast to async subscribers obtained from
/// [`Channel::subscribe`].
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    listeners: ShareLock<Vec<Registration>>,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_SIZE)
    }
}

impl Channel {
    pub fn new(queue_size: usize) -> Self {
        Self {
            event_queue: BroadcastQueue::new(queue_size),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a listener.
    ///
    /// Returns `false` when the same listener (same `Arc`) is already
    /// registered, in which case nothing changes.
    pub fn add_listener(
        &self,
        listener: EventHandle,
        options: ChannelOptions,
    ) -> Result<bool> {
        let filter = Filter::new(&options)?;
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|r| same_listener(&r.listener, &listener)) {
            return Ok(false);
        }
        listeners.push(Registration {
            listener,
            filter,
        });
        Ok(true)
    }

    pub fn remove_listener(
        &self,
        listener: &EventHandle,
    ) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|r| !same_listener(&r.listener, listener));
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// subscribe to every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Event<Message>> {
        self.event_queue.subscribe()
    }

    pub(crate) fn publish(
        &self,
        msg: Message,
    ) {
        let event = Event::new(&msg);

        // Snapshot so a listener may register further listeners without deadlocking.
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for registration in listeners.iter().filter(|r| r.filter.is_match(&msg)) {
            match catch_unwind(AssertUnwindSafe(|| registration.listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(event = msg.event.name(), workflow_id = %msg.workflow_id, "event listener failed: {}", err),
                Err(_) => error!(event = msg.event.name(), workflow_id = %msg.workflow_id, "event listener panicked"),
            }
        }

        if self.event_queue.receiver_count() > 0 {
            let _ = self.event_queue.send(event);
        }
    }
}

fn same_listener(
    a: &EventHandle,
    b: &EventHandle,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Convenience registration of closures, filtered by [`ChannelOptions`].
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,
    options: ChannelOptions,
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            channel,
            options,
        }
    }

    /// Called with the workflow id when a workflow completes.
    pub fn on_complete(
        &self,
        f: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(move |e: &Event<Message>| {
            if e.event.is_complete() {
                f(e.workflow_id.clone());
            }
            Ok(())
        })
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(move |e: &Event<Message>| {
            if e.event.is_error() {
                f(e);
            }
            Ok(())
        })
    }

    pub fn on_action(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(move |e: &Event<Message>| {
            if matches!(e.event, GraphEvent::Action(_)) {
                f(e);
            }
            Ok(())
        })
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) -> Result<()> {
        self.register(move |e: &Event<Message>| {
            f(e);
            Ok(())
        })
    }

    fn register(
        &self,
        f: impl Fn(&Event<Message>) -> Result<()> + Send + Sync + 'static,
    ) -> Result<()> {
        self.channel.add_listener(Arc::new(f), self.options.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::events::{WorkflowEvent, WorkflowFailedEvent, WorkflowStartedEvent};

    fn message(
        workflow_id: &str,
        event: GraphEvent,
    ) -> Message {
        Message {
            workflow_id: workflow_id.to_string(),
            execution_id: "exec".to_string(),
            action_id: String::new(),
            timestamp: 0,
            event,
        }
    }

    fn started() -> GraphEvent {
        GraphEvent::Workflow(WorkflowEvent::Started(WorkflowStartedEvent {
            name: "wf".to_string(),
            node_ids: vec![],
        }))
    }

    #[test]
    fn test_listener_registration_is_idempotent() {
        let channel = Channel::default();
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let listener: EventHandle = Arc::new(move |_: &Event<Message>| -> Result<()> {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert!(channel.add_listener(listener.clone(), ChannelOptions::default()).unwrap());
        assert!(!channel.add_listener(listener.clone(), ChannelOptions::default()).unwrap());
        assert_eq!(channel.listener_count(), 1);

        channel.publish(message("wf", started()));
        assert_eq!(*seen.lock().unwrap(), 1);

        assert!(channel.remove_listener(&listener));
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let channel = Channel::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        channel.add_listener(Arc::new(|_: &Event<Message>| -> Result<()> { Err(AutoflowError::Engine("boom".to_string())) }), ChannelOptions::default()).unwrap();
        channel
            .add_listener(
                Arc::new(|_: &Event<Message>| -> Result<()> { panic!("listener bug") }),
                ChannelOptions::default(),
            )
            .unwrap();
        let sink = seen.clone();
        channel
            .add_listener(
                Arc::new(move |e: &Event<Message>| -> Result<()> {
                    sink.lock().unwrap().push(e.event.name());
                    Ok(())
                }),
                ChannelOptions::default(),
            )
            .unwrap();

        channel.publish(message("wf", started()));
        assert_eq!(*seen.lock().unwrap(), vec!["workflow.started"]);
    }

    #[test]
    fn test_workflow_filter() {
        let channel = Arc::new(Channel::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_workflow_id("login*".to_string()))
            .on_error(move |e| sink.lock().unwrap().push(e.workflow_id.clone()))
            .unwrap();

        let failed = || {
            GraphEvent::Workflow(WorkflowEvent::Failed(WorkflowFailedEvent {
                error: "x".to_string(),
                duration_ms: 0,
            }))
        };
        channel.publish(message("login_flow", failed()));
        channel.publish(message("checkout", failed()));
        channel.publish(message("login_flow", started()));

        assert_eq!(*seen.lock().unwrap(), vec!["login_flow".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let channel = Channel::default();
        let err = channel.add_listener(Arc::new(|_: &Event<Message>| -> Result<()> { Ok(()) }), ChannelOptions::with_workflow_id("[".to_string()));
        assert!(matches!(err, Err(AutoflowError::Config(_))));
    }

    #[tokio::test]
    async fn test_async_subscriber_receives_events() {
        let channel = Channel::default();
        let mut rx = channel.subscribe();
        channel.publish(message("wf", started()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.name(), "workflow.started");
    }
}
