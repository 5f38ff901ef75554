// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 进程内消息总线 (In-process message bus)
///
/// 按 topic 路由的类型化发布/订阅:
/// - 每个订阅拥有一个投递线程 + 有界队列,队列满时丢弃最旧消息 (latest wins)
/// - `Subscription::close()` 同步返回: 返回后该订阅的回调不会再被调用
use crate::error::{PublishError, SubscriptionError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// 消息总线句柄 (clone 共享同一条总线)
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    topics: Mutex<HashMap<String, Topic>>,
    closed: AtomicBool,
    next_id: AtomicU64,
}

struct Topic {
    type_id: TypeId,
    type_name: &'static str,
    publishers: usize,
    subscribers: Vec<(u64, Box<dyn Any + Send>)>, // Mailbox<T>
}

impl Topic {
    fn new<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            publishers: 0,
            subscribers: Vec::new(),
        }
    }

    fn carries<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl BusInner {
    fn lock_topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn remove_subscriber(&self, topic: &str, id: u64) {
        let mut topics = self.lock_topics();
        if let Some(entry) = topics.get_mut(topic) {
            entry.subscribers.retain(|(sub_id, _)| *sub_id != id);
            if entry.publishers == 0 && entry.subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.inner.lock_topics();
        f.debug_struct("Bus")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明一个发布者; 同一 topic 只能承载一种消息类型
    pub fn advertise<T>(&self, topic: &str) -> Result<Publisher<T>, PublishError>
    where
        T: Send + Sync + 'static,
    {
        if self.inner.is_closed() {
            return Err(PublishError::Closed);
        }

        let mut topics = self.inner.lock_topics();
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(Topic::new::<T>);
        if !entry.carries::<T>() {
            return Err(PublishError::TypeMismatch {
                topic: topic.to_string(),
                expected: type_name::<T>(),
                actual: entry.type_name,
            });
        }
        entry.publishers += 1;

        Ok(Publisher {
            topic: topic.to_string(),
            inner: self.inner.clone(),
            _marker: PhantomData,
        })
    }

    /// 订阅 topic; 回调在独立的投递线程上执行
    pub fn subscribe<T, F>(
        &self,
        topic: &str,
        queue_size: usize,
        callback: F,
    ) -> Result<Subscription, SubscriptionError>
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) + Send + 'static,
    {
        if self.inner.is_closed() {
            return Err(SubscriptionError::TransportClosed);
        }

        let (tx, rx) = bounded::<Arc<T>>(queue_size.max(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut topics = self.inner.lock_topics();
            let entry = topics
                .get_mut(topic)
                .filter(|entry| entry.publishers > 0)
                .ok_or_else(|| SubscriptionError::TopicUnavailable(topic.to_string()))?;
            if !entry.carries::<T>() {
                return Err(SubscriptionError::TypeMismatch {
                    topic: topic.to_string(),
                    expected: type_name::<T>(),
                    actual: entry.type_name,
                });
            }
            let mailbox = Mailbox {
                tx,
                evict: rx.clone(),
            };
            entry.subscribers.push((id, Box::new(mailbox)));
        }

        let gate = Arc::new(Gate::new());
        let worker_gate = gate.clone();
        let worker_topic = topic.to_string();
        let spawned = thread::Builder::new()
            .name(format!("bus:{}", topic))
            .spawn(move || deliver(worker_topic, rx, worker_gate, callback));

        match spawned {
            Ok(worker) => Ok(Subscription {
                topic: topic.to_string(),
                id,
                bus: self.inner.clone(),
                gate,
                worker: Some(worker),
            }),
            Err(e) => {
                self.inner.remove_subscriber(topic, id);
                Err(SubscriptionError::Spawn {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock_topics()
            .get(topic)
            .map_or(0, |entry| entry.subscribers.len())
    }

    pub fn is_advertised(&self, topic: &str) -> bool {
        self.inner
            .lock_topics()
            .get(topic)
            .is_some_and(|entry| entry.publishers > 0)
    }

    /// 关闭总线: 拒绝新的发布/订阅,排空后投递线程自行退出
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.lock_topics().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// 单个订阅的收件箱
struct Mailbox<T> {
    tx: Sender<Arc<T>>,
    evict: Receiver<Arc<T>>,
}

impl<T> Mailbox<T> {
    fn offer(&self, mut msg: Arc<T>) {
        loop {
            match self.tx.try_send(msg) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // 队列满: 丢弃最旧的一条再重试
                    let _ = self.evict.try_recv();
                    msg = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// 投递闸门: 回调在 in_flight 锁内执行, close 拿到锁即表示没有回调在运行
struct Gate {
    open: AtomicBool,
    in_flight: Mutex<()>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            in_flight: Mutex::new(()),
        }
    }

    fn enter(&self) -> MutexGuard<'_, ()> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

fn deliver<T, F>(topic: String, rx: Receiver<Arc<T>>, gate: Arc<Gate>, mut callback: F)
where
    F: FnMut(Arc<T>),
{
    let _watch = PanicWatch {
        topic: &topic,
        gate: &gate,
    };
    while let Ok(msg) = rx.recv() {
        let _in_flight = gate.enter();
        if !gate.is_open() {
            break;
        }
        callback(msg);
    }
}

/// 回调 panic 时关闭闸门, 让订阅显示为失效
struct PanicWatch<'a> {
    topic: &'a str,
    gate: &'a Gate,
}

impl Drop for PanicWatch<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.gate.open.store(false, Ordering::Release);
            log::error!("❌ 订阅回调 panic, 投递线程退出: {}", self.topic);
        }
    }
}

/// 订阅凭证: 关闭或 drop 时注销
pub struct Subscription {
    topic: String,
    id: u64,
    bus: Arc<BusInner>,
    gate: Arc<Gate>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 已关闭或回调 panic 后为 false
    pub fn is_active(&self) -> bool {
        self.worker.is_some() && self.gate.is_open()
    }

    /// 同步注销: 返回后该订阅不会再触发回调 (幂等)
    pub fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // 先从总线摘除,不再有新消息入队
        self.bus.remove_subscriber(&self.topic, self.id);
        self.gate.open.store(false, Ordering::Release);

        // 在自己的回调里注销: 闸门已关,不能等自己
        if worker.thread().id() == thread::current().id() {
            return;
        }

        // 等待正在执行的回调结束
        drop(self.gate.enter());
        if worker.join().is_err() {
            log::warn!("⚠️  投递线程异常退出: {}", self.topic);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// 发布者: drop 时撤销声明
pub struct Publisher<T> {
    topic: String,
    inner: Arc<BusInner>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Publisher<T>
where
    T: Send + Sync + 'static,
{
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 投递给当前所有订阅者,返回送达的订阅数
    pub fn publish(&self, msg: T) -> Result<usize, PublishError> {
        self.publish_shared(Arc::new(msg))
    }

    pub fn publish_shared(&self, msg: Arc<T>) -> Result<usize, PublishError> {
        if self.inner.is_closed() {
            return Err(PublishError::Closed);
        }

        let topics = self.inner.lock_topics();
        let Some(entry) = topics.get(&self.topic) else {
            return Ok(0);
        };

        let mut delivered = 0;
        for (_, mailbox) in &entry.subscribers {
            if let Some(mailbox) = mailbox.downcast_ref::<Mailbox<T>>() {
                mailbox.offer(msg.clone());
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock_topics()
            .get(&self.topic)
            .map_or(0, |entry| entry.subscribers.len())
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        let mut topics = self.inner.lock_topics();
        if let Some(entry) = topics.get_mut(&self.topic) {
            entry.publishers = entry.publishers.saturating_sub(1);
            if entry.publishers == 0 && entry.subscribers.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .finish()
    }
}
