//! Listener bus for rotor managers.
//!
//! Events may be raised on any thread (API callers, load threads) but are only
//! ever delivered by the [`EventLoop`] that owns the receiving end of the
//! channel, so observers never run concurrently with each other. Interceptors
//! are the exception: they are asked synchronously, on the requesting thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::frequency::FrequencyStrategy;

#[derive(Clone, Debug, PartialEq)]
pub enum RotorEvent {
    CountChanged {
        old: usize,
        new: usize,
    },
    LoadingChanged {
        loading: bool,
    },
    LoadFinished {
        count: usize,
        cancelled: bool,
    },
    LoadIntercepted {
        count: usize,
    },
    FrequencyStrategyChanged {
        old: FrequencyStrategy,
        new: FrequencyStrategy,
    },
    FrequencyStrategyChangeIntercepted {
        requested: FrequencyStrategy,
    },
}

/// Observer for manager events; called on the event loop's thread only.
pub trait RotorStateListener: Send + Sync {
    fn on_event(&self, event: &RotorEvent);
}

impl<F> RotorStateListener for F
where
    F: Fn(&RotorEvent) + Send + Sync,
{
    fn on_event(&self, event: &RotorEvent) {
        self(event)
    }
}

/// Veto hooks consulted before a transition starts. Returning `true` blocks it.
pub trait LoadInterceptor: Send + Sync {
    fn intercept_rotors_load(&self, count: usize) -> bool;

    fn intercept_frequency_strategy(
        &self,
        current: &FrequencyStrategy,
        requested: &FrequencyStrategy,
    ) -> bool;
}

#[derive(Default)]
struct Registry {
    listeners: Vec<(u64, Arc<dyn RotorStateListener>)>,
    interceptors: Vec<(u64, Arc<dyn LoadInterceptor>)>,
}

#[derive(Default)]
struct ListenerRegistry {
    entries: Mutex<Registry>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listeners(&self) -> Vec<Arc<dyn RotorStateListener>> {
        self.lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    fn interceptors(&self) -> Vec<Arc<dyn LoadInterceptor>> {
        self.lock()
            .interceptors
            .iter()
            .map(|(_, i)| Arc::clone(i))
            .collect()
    }
}

/// An event bound to the registry whose listeners should receive it.
pub struct Envelope {
    registry: Arc<ListenerRegistry>,
    event: RotorEvent,
}

impl Envelope {
    pub fn event(&self) -> &RotorEvent {
        &self.event
    }

    fn deliver(&self) {
        for listener in self.registry.listeners() {
            listener.on_event(&self.event);
        }
    }
}

/// Per-manager listener registry plus the channel into the event loop.
#[derive(Clone)]
pub struct ListenerBus {
    registry: Arc<ListenerRegistry>,
    tx: Sender<Envelope>,
}

impl ListenerBus {
    pub fn new(tx: Sender<Envelope>) -> Self {
        Self {
            registry: Arc::new(ListenerRegistry::default()),
            tx,
        }
    }

    #[must_use = "the listener is removed when the subscription is dropped"]
    pub fn subscribe(&self, listener: Arc<dyn RotorStateListener>) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().listeners.push((id, listener));
        Subscription {
            registry: Some(Arc::clone(&self.registry)),
            id,
        }
    }

    #[must_use = "the interceptor is removed when the subscription is dropped"]
    pub fn add_interceptor(&self, interceptor: Arc<dyn LoadInterceptor>) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().interceptors.push((id, interceptor));
        Subscription {
            registry: Some(Arc::clone(&self.registry)),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        let registry = self.registry.lock();
        registry.listeners.len() + registry.interceptors.len()
    }

    /// Queues `event` for delivery on the event loop thread.
    pub fn post(&self, event: RotorEvent) {
        let _ = self.tx.send(Envelope {
            registry: Arc::clone(&self.registry),
            event,
        });
    }

    /// Asks interceptors in registration order; the first veto wins.
    pub fn intercepts_rotors_load(&self, count: usize) -> bool {
        self.registry
            .interceptors()
            .iter()
            .any(|i| i.intercept_rotors_load(count))
    }

    pub fn intercepts_frequency_strategy(
        &self,
        current: &FrequencyStrategy,
        requested: &FrequencyStrategy,
    ) -> bool {
        self.registry
            .interceptors()
            .iter()
            .any(|i| i.intercept_frequency_strategy(current, requested))
    }
}

/// Keeps a listener or interceptor registered until dropped.
pub struct Subscription {
    registry: Option<Arc<ListenerRegistry>>,
    id: u64,
}

impl Subscription {
    /// A subscription to nothing, handed out by managers with no function.
    pub fn detached() -> Self {
        Self {
            registry: None,
            id: 0,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take() {
            let mut entries = registry.lock();
            entries.listeners.retain(|(id, _)| *id != self.id);
            entries.interceptors.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Receiving end of the bus. Whichever thread drives it is the designated
/// delivery thread.
pub struct EventLoop {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Envelope> {
        self.tx.clone()
    }

    pub fn bus(&self) -> ListenerBus {
        ListenerBus::new(self.sender())
    }

    /// Delivers everything queued so far without blocking.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            envelope.deliver();
            delivered += 1;
        }
        delivered
    }

    /// Waits up to `timeout` for the first event, then drains the backlog.
    pub fn dispatch_timeout(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                envelope.deliver();
                1 + self.dispatch_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Dispatches until `done` returns true or `timeout` elapses. Returns
    /// whether `done` was satisfied.
    pub fn dispatch_until<F>(&mut self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.dispatch_timeout((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Moves delivery onto a dedicated thread that runs until every bus
    /// sender is gone.
    pub fn spawn_delivery_thread(self) -> std::io::Result<thread::JoinHandle<()>> {
        let Self { tx, rx } = self;
        drop(tx);
        thread::Builder::new()
            .name("rotor-events".into())
            .spawn(move || {
                while let Ok(envelope) = rx.recv() {
                    envelope.deliver();
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Veto {
        above: usize,
    }

    impl LoadInterceptor for Veto {
        fn intercept_rotors_load(&self, count: usize) -> bool {
            count > self.above
        }

        fn intercept_frequency_strategy(
            &self,
            _current: &FrequencyStrategy,
            requested: &FrequencyStrategy,
        ) -> bool {
            matches!(requested, FrequencyStrategy::Range { .. })
        }
    }

    #[test]
    fn events_wait_for_the_loop() {
        let mut events = EventLoop::new();
        let bus = events.bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(Arc::new(move |e: &RotorEvent| {
            sink.lock().unwrap().push(e.clone());
        }));

        bus.post(RotorEvent::LoadingChanged { loading: true });
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(events.dispatch_pending(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RotorEvent::LoadingChanged { loading: true }]
        );
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let mut events = EventLoop::new();
        let bus = events.bus();
        let seen = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(Arc::new(move |_: &RotorEvent| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(bus.listener_count(), 1);
        drop(sub);
        assert_eq!(bus.listener_count(), 0);

        bus.post(RotorEvent::LoadIntercepted { count: 3 });
        events.dispatch_pending();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn first_veto_wins() {
        let events = EventLoop::new();
        let bus = events.bus();
        let _a = bus.add_interceptor(Arc::new(Veto { above: 100 }));
        let _b = bus.add_interceptor(Arc::new(Veto { above: 10 }));
        assert!(bus.intercepts_rotors_load(50));
        assert!(!bus.intercepts_rotors_load(5));
        assert!(bus.intercepts_frequency_strategy(
            &FrequencyStrategy::default(),
            &FrequencyStrategy::Range { min: 0.0, max: 1.0 },
        ));
    }

    #[test]
    fn delivery_thread_drains_until_senders_drop() {
        let events = EventLoop::new();
        let bus = events.bus();
        let (tx, rx) = unbounded();
        let _sub = bus.subscribe(Arc::new(move |e: &RotorEvent| {
            let _ = tx.send((thread::current().name().map(str::to_owned), e.clone()));
        }));
        let handle = events.spawn_delivery_thread().expect("spawn delivery");

        bus.post(RotorEvent::LoadFinished {
            count: 4,
            cancelled: false,
        });
        let (name, event) = rx.recv_timeout(Duration::from_secs(1)).expect("event");
        assert_eq!(name.as_deref(), Some("rotor-events"));
        assert_eq!(
            event,
            RotorEvent::LoadFinished {
                count: 4,
                cancelled: false
            }
        );
        drop(_sub);
        drop(bus);
        handle.join().expect("join delivery thread");
    }
}
