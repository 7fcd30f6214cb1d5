//! In-memory broker implementing both transport traits.
//!
//! `InMemoryBroker` stores topics as partitioned, append-only logs. Producers and
//! consumers created from the same broker share that state, so a test can publish
//! through an [`InMemoryProducer`] and read the result back through an
//! [`InMemoryConsumer`] or directly via [`InMemoryBroker::messages`].
//!
//! Failures are injected per handle:
//!
//! - [`InMemoryProducer::failing_connect`] / [`InMemoryProducer::failing_send`]
//! - [`InMemoryConsumer::failing_connect`] / [`InMemoryConsumer::failing_subscribes`]
//!
//! # Example
//!
//! ```
//! use loginapp_core::event_bus::{ProducerTransport, SubscribeRequest, ConsumerTransport};
//! use loginapp_testing::InMemoryBroker;
//!
//! # tokio_test::block_on(async {
//! let broker = InMemoryBroker::new();
//! let producer = broker.producer();
//! producer.connect().await.unwrap();
//! producer.send("Login", b"a@x.com", b"{}").await.unwrap();
//!
//! assert_eq!(broker.messages("Login").len(), 1);
//! # });
//! ```

use loginapp_core::event_bus::{
    ConsumerTransport, Delivery, EventBusError, InboundMessage, MessageStream, ProducerTransport,
    SubscribeRequest, TransportFuture,
};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

type Subscriber = mpsc::UnboundedSender<Result<InboundMessage, EventBusError>>;

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

struct TopicLog {
    next_offsets: Vec<i64>,
    records: Vec<InboundMessage>,
    subscribers: Vec<(u64, Subscriber)>,
}

impl TopicLog {
    fn new(partitions: i32) -> Self {
        let count = usize::try_from(partitions.max(1)).unwrap_or(1);
        Self {
            next_offsets: vec![0; count],
            records: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    fn partition_for(&self, key: Option<&[u8]>) -> i32 {
        let Some(key) = key else { return 0 };
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let count = self.next_offsets.len() as u64;
        i32::try_from(hasher.finish() % count).unwrap_or(0)
    }
}

struct BrokerState {
    topics: HashMap<String, TopicLog>,
    auto_create_topics: bool,
    partitions: i32,
}

/// Shared in-memory broker.
///
/// Cloning yields another handle onto the same topics.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Broker that creates topics on first send, with three partitions each.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                topics: HashMap::new(),
                auto_create_topics: true,
                partitions: 3,
            })),
        }
    }

    /// Broker where sends to unknown topics fail until [`create_topic`](Self::create_topic).
    #[must_use]
    pub fn without_auto_create() -> Self {
        let broker = Self::new();
        broker.lock().auto_create_topics = false;
        broker
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `topic` if it does not exist.
    pub fn create_topic(&self, topic: &str) {
        let mut state = self.lock();
        let partitions = state.partitions;
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(partitions));
    }

    /// Whether `topic` exists.
    #[must_use]
    pub fn topic_exists(&self, topic: &str) -> bool {
        self.lock().topics.contains_key(topic)
    }

    /// Append a raw message, bypassing producer handles.
    ///
    /// Useful for injecting malformed payloads.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidTopic`] if the topic does not exist and
    /// auto-creation is disabled.
    pub fn append(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Result<Delivery, EventBusError> {
        let mut state = self.lock();
        let partitions = state.partitions;
        if !state.topics.contains_key(topic) {
            if !state.auto_create_topics {
                return Err(EventBusError::InvalidTopic(topic.to_string()));
            }
            state.topics.insert(topic.to_string(), TopicLog::new(partitions));
        }
        let Some(log) = state.topics.get_mut(topic) else {
            return Err(EventBusError::InvalidTopic(topic.to_string()));
        };

        let partition = log.partition_for(key);
        let slot = usize::try_from(partition).unwrap_or(0);
        let offset = log.next_offsets[slot];
        log.next_offsets[slot] += 1;

        let message = InboundMessage {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.map(<[u8]>::to_vec),
            payload: payload.map(<[u8]>::to_vec),
        };
        log.records.push(message.clone());
        log.subscribers
            .retain(|(_, tx)| tx.send(Ok(message.clone())).is_ok());

        Ok(Delivery { partition, offset })
    }

    /// Every message on `topic`, in append order.
    #[must_use]
    pub fn messages(&self, topic: &str) -> Vec<InboundMessage> {
        self.lock()
            .topics
            .get(topic)
            .map(|log| log.records.clone())
            .unwrap_or_default()
    }

    /// Keys of every message on `topic`, in append order, as UTF-8 strings.
    #[must_use]
    pub fn keys(&self, topic: &str) -> Vec<String> {
        self.messages(topic)
            .into_iter()
            .filter_map(|m| m.key)
            .map(|k| String::from_utf8_lossy(&k).into_owned())
            .collect()
    }

    /// Number of live message streams attached to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map_or(0, |log| log.subscribers.len())
    }

    /// New producer handle on this broker.
    #[must_use]
    pub fn producer(&self) -> InMemoryProducer {
        InMemoryProducer::new(self.clone())
    }

    /// New consumer handle on this broker.
    #[must_use]
    pub fn consumer(&self) -> InMemoryConsumer {
        InMemoryConsumer::new(self.clone())
    }

    fn attach(&self, consumer_id: u64, request: &SubscribeRequest) -> Result<MessageStream, EventBusError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let Some(log) = state.topics.get_mut(&request.topic) else {
            return Err(EventBusError::InvalidTopic(request.topic.clone()));
        };
        if request.from_beginning {
            for record in &log.records {
                // The receiver is still held locally, so this cannot fail.
                let _ = tx.send(Ok(record.clone()));
            }
        }
        log.subscribers.push((consumer_id, tx));
        drop(state);

        let stream = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }

    fn detach(&self, consumer_id: u64) {
        let mut state = self.lock();
        for log in state.topics.values_mut() {
            log.subscribers.retain(|(id, _)| *id != consumer_id);
        }
    }
}

/// Producer handle with injectable failures and call counters.
pub struct InMemoryProducer {
    broker: InMemoryBroker,
    connected: AtomicBool,
    fail_connect: bool,
    fail_send: bool,
    connect_delay: Option<Duration>,
    connect_calls: AtomicUsize,
    send_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl InMemoryProducer {
    fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            connected: AtomicBool::new(false),
            fail_connect: false,
            fail_send: false,
            connect_delay: None,
            connect_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    /// Every `connect` fails.
    #[must_use]
    pub const fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Every `send` fails.
    #[must_use]
    pub const fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    /// `connect` sleeps for `delay` before completing.
    #[must_use]
    pub const fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `send` calls.
    #[must_use]
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Whether the last `connect` succeeded and no `disconnect` followed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ProducerTransport for InMemoryProducer {
    fn connect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_connect {
                return Err(EventBusError::ConnectionFailed("broker unreachable".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn send<'a>(&'a self, topic: &'a str, key: &'a [u8], payload: &'a [u8]) -> TransportFuture<'a, Delivery> {
        Box::pin(async move {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if !self.is_connected() {
                return Err(EventBusError::NotConnected);
            }
            if self.fail_send {
                return Err(EventBusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: "injected send failure".to_string(),
                });
            }
            self.broker.append(topic, Some(key), Some(payload))
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Consumer handle with injectable failures and call counters.
pub struct InMemoryConsumer {
    id: u64,
    broker: InMemoryBroker,
    connected: AtomicBool,
    subscription: Mutex<Option<SubscribeRequest>>,
    fail_connect: bool,
    remaining_subscribe_failures: AtomicUsize,
    subscribe_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl InMemoryConsumer {
    fn new(broker: InMemoryBroker) -> Self {
        Self {
            id: NEXT_CONSUMER_ID.fetch_add(1, Ordering::SeqCst),
            broker,
            connected: AtomicBool::new(false),
            subscription: Mutex::new(None),
            fail_connect: false,
            remaining_subscribe_failures: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    /// Every `connect` fails.
    #[must_use]
    pub const fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// The first `count` subscribe calls fail as if the topic did not exist.
    #[must_use]
    pub fn failing_subscribes(self, count: usize) -> Self {
        self.remaining_subscribe_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Number of `subscribe` calls.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Whether the consumer is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscription(&self) -> Option<SubscribeRequest> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConsumerTransport for InMemoryConsumer {
    fn connect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_connect {
                return Err(EventBusError::ConnectionFailed("broker unreachable".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, request: &'a SubscribeRequest) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if !self.is_connected() {
                return Err(EventBusError::NotConnected);
            }
            let injected = self
                .remaining_subscribe_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected || !self.broker.topic_exists(&request.topic) {
                return Err(EventBusError::InvalidTopic(request.topic.clone()));
            }
            *self.subscription.lock().unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
            Ok(())
        })
    }

    fn messages(&self) -> TransportFuture<'_, MessageStream> {
        Box::pin(async move {
            let request = self.subscription().ok_or(EventBusError::NotConnected)?;
            self.broker.attach(self.id, &request)
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            *self.subscription.lock().unwrap_or_else(PoisonError::into_inner) = None;
            self.broker.detach(self.id);
            Ok(())
        })
    }
}
