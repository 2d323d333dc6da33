//! Named, bounded message queues
//!
//! A [`Namespace`] is a registry of queue objects addressed by name, in the
//! manner of POSIX message queues: any party that knows a name can open the
//! queue, unlinking a name does not invalidate descriptors that are already
//! open, and every queue has a fixed capacity and message size chosen at
//! creation.
//!
//! Each queue carries two priority classes. A receive always serves
//! [`Priority::Urgent`] records before [`Priority::Normal`] ones, and within a
//! class records come out in the order they were sent.

use crate::error::{IpcError, IpcResult, ResourceError};
use crossbeam_channel::{bounded, Receiver, Select, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

/// Longest accepted queue name, including the leading slash
pub const NAME_MAX: usize = 255;

static GLOBAL: LazyLock<Namespace> = LazyLock::new(Namespace::new);

/// Fixed attributes of a queue object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Records each priority class can hold
    pub capacity: usize,

    /// Largest record accepted, in bytes
    pub message_size: usize,
}

impl QueueAttributes {
    pub const fn new(capacity: usize, message_size: usize) -> Self {
        Self {
            capacity,
            message_size,
        }
    }
}

/// Delivery class of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Normal,
    Urgent,
}

/// Outcome of a non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Record is queued
    Accepted,

    /// Class is full; the record was not queued
    WouldBlock,
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted)
    }
}

/// A record taken off a queue, with the class it was sent on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub record: Vec<u8>,
    pub priority: Priority,
}

/// One priority class of a queue
///
/// The object keeps both channel ends alive, so a lane never disconnects
/// while any descriptor to it exists.
struct Lane {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl Lane {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }
}

/// The queue object behind a name
struct QueueObject {
    name: String,
    attrs: QueueAttributes,
    normal: Lane,
    urgent: Lane,
}

impl QueueObject {
    fn lane(&self, priority: Priority) -> &Lane {
        match priority {
            Priority::Normal => &self.normal,
            Priority::Urgent => &self.urgent,
        }
    }
}

struct Registry {
    queues: HashMap<String, Arc<QueueObject>>,
    limit: Option<usize>,
}

/// Registry of named queue objects
///
/// Cloning a `Namespace` yields another handle to the same registry.
#[derive(Clone)]
pub struct Namespace {
    registry: Arc<Mutex<Registry>>,
}

impl Namespace {
    /// Create an empty, isolated namespace
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                queues: HashMap::new(),
                limit: None,
            })),
        }
    }

    /// Create an empty namespace that holds at most `limit` linked queues
    pub fn with_limit(limit: usize) -> Self {
        let namespace = Self::new();
        namespace.registry.lock().limit = Some(limit);
        namespace
    }

    /// The process-wide namespace
    pub fn global() -> &'static Namespace {
        &GLOBAL
    }

    /// Create a queue, failing if the name is already linked
    pub fn create(&self, name: &str, attrs: QueueAttributes) -> Result<MessageQueue, ResourceError> {
        validate_name(name)?;
        validate_attributes(name, &attrs)?;

        let mut registry = self.registry.lock();
        if registry.queues.contains_key(name) {
            return Err(ResourceError::AlreadyExists {
                name: name.to_string(),
            });
        }

        Ok(MessageQueue {
            object: insert(&mut registry, name, attrs)?,
        })
    }

    /// Open a queue, creating it with `attrs` if the name is not linked
    ///
    /// When the queue already exists its original attributes are kept.
    pub fn open_or_create(
        &self,
        name: &str,
        attrs: QueueAttributes,
    ) -> Result<MessageQueue, ResourceError> {
        validate_name(name)?;
        validate_attributes(name, &attrs)?;

        let mut registry = self.registry.lock();
        if let Some(object) = registry.queues.get(name) {
            return Ok(MessageQueue {
                object: Arc::clone(object),
            });
        }

        Ok(MessageQueue {
            object: insert(&mut registry, name, attrs)?,
        })
    }

    /// Open an existing queue
    pub fn open(&self, name: &str) -> Result<MessageQueue, ResourceError> {
        validate_name(name)?;

        self.registry
            .lock()
            .queues
            .get(name)
            .map(|object| MessageQueue {
                object: Arc::clone(object),
            })
            .ok_or_else(|| ResourceError::NotFound {
                name: name.to_string(),
            })
    }

    /// Remove a name
    ///
    /// Descriptors that are already open keep working; the object is
    /// reclaimed when the last one is dropped.
    pub fn unlink(&self, name: &str) -> Result<(), ResourceError> {
        validate_name(name)?;

        match self.registry.lock().queues.remove(name) {
            Some(_) => {
                debug!(queue = name, "Queue unlinked");
                Ok(())
            }
            None => Err(ResourceError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Check whether a name is linked
    pub fn contains(&self, name: &str) -> bool {
        self.registry.lock().queues.contains_key(name)
    }

    /// Linked names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of linked queues
    pub fn len(&self) -> usize {
        self.registry.lock().queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("queues", &self.names())
            .finish()
    }
}

fn insert(
    registry: &mut Registry,
    name: &str,
    attrs: QueueAttributes,
) -> Result<Arc<QueueObject>, ResourceError> {
    if let Some(limit) = registry.limit {
        if registry.queues.len() >= limit {
            return Err(ResourceError::LimitReached {
                name: name.to_string(),
                limit,
            });
        }
    }

    let object = Arc::new(QueueObject {
        name: name.to_string(),
        attrs,
        normal: Lane::new(attrs.capacity),
        urgent: Lane::new(attrs.capacity),
    });
    registry
        .queues
        .insert(name.to_string(), Arc::clone(&object));

    debug!(
        queue = name,
        capacity = attrs.capacity,
        message_size = attrs.message_size,
        "Queue created"
    );
    Ok(object)
}

fn validate_name(name: &str) -> Result<(), ResourceError> {
    let reason = if !name.starts_with('/') {
        "must start with '/'"
    } else if name.len() < 2 {
        "must not be empty after '/'"
    } else if name.len() > NAME_MAX {
        "longer than NAME_MAX"
    } else if name[1..].contains('/') {
        "must not contain '/' after the first character"
    } else {
        return Ok(());
    };

    Err(ResourceError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn validate_attributes(name: &str, attrs: &QueueAttributes) -> Result<(), ResourceError> {
    if attrs.capacity == 0 || attrs.message_size == 0 {
        return Err(ResourceError::InvalidAttributes {
            name: name.to_string(),
            reason: format!(
                "capacity ({}) and message size ({}) must be at least 1",
                attrs.capacity, attrs.message_size
            ),
        });
    }
    Ok(())
}

/// An open descriptor to a named queue
#[derive(Clone)]
pub struct MessageQueue {
    object: Arc<QueueObject>,
}

impl MessageQueue {
    /// Name the queue was created under
    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn attributes(&self) -> QueueAttributes {
        self.object.attrs
    }

    /// Records currently pending, both classes
    pub fn len(&self) -> usize {
        self.object.normal.rx.len() + self.object.urgent.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object.normal.rx.is_empty() && self.object.urgent.rx.is_empty()
    }

    /// Queue a record without blocking
    ///
    /// A full class yields [`SendOutcome::WouldBlock`] and leaves the queue
    /// untouched.
    pub fn try_send(&self, record: &[u8], priority: Priority) -> IpcResult<SendOutcome> {
        self.check_size(record)?;

        match self.object.lane(priority).tx.try_send(record.to_vec()) {
            Ok(()) => {
                trace!(queue = %self.object.name, ?priority, "Record queued");
                Ok(SendOutcome::Accepted)
            }
            Err(TrySendError::Full(_)) => Ok(SendOutcome::WouldBlock),
            Err(TrySendError::Disconnected(_)) => Err(self.closed()),
        }
    }

    /// Queue a record, blocking while its class is full
    pub fn send(&self, record: &[u8], priority: Priority) -> IpcResult<()> {
        self.check_size(record)?;

        self.object
            .lane(priority)
            .tx
            .send(record.to_vec())
            .map_err(|_| self.closed())?;
        trace!(queue = %self.object.name, ?priority, "Record queued");
        Ok(())
    }

    /// Take the next record without blocking, `None` if the queue is empty
    pub fn try_receive(&self) -> IpcResult<Option<Delivery>> {
        for priority in [Priority::Urgent, Priority::Normal] {
            match self.object.lane(priority).rx.try_recv() {
                Ok(record) => return Ok(Some(Delivery { record, priority })),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Err(self.closed()),
            }
        }
        Ok(None)
    }

    /// Take the next record, blocking until one is available
    pub fn receive(&self) -> IpcResult<Delivery> {
        loop {
            if let Some(delivery) = self.try_receive()? {
                return Ok(delivery);
            }

            // Readiness only; the record is taken by try_receive so that an
            // urgent record always wins over a normal one.
            let mut sel = Select::new();
            sel.recv(&self.object.urgent.rx);
            sel.recv(&self.object.normal.rx);
            sel.ready();
        }
    }

    /// Block until the queue holds a record or `cancel` fires
    ///
    /// Returns `false` when woken by `cancel` (a message or disconnection).
    /// Nothing is consumed from the queue.
    pub fn wait_readable(&self, cancel: &Receiver<()>) -> bool {
        if !self.is_empty() {
            return true;
        }

        let mut sel = Select::new();
        sel.recv(&self.object.urgent.rx);
        sel.recv(&self.object.normal.rx);
        let cancel_index = sel.recv(cancel);
        sel.ready() != cancel_index
    }

    fn check_size(&self, record: &[u8]) -> IpcResult<()> {
        let max = self.object.attrs.message_size;
        if record.len() > max {
            return Err(IpcError::MessageTooLarge {
                queue: self.object.name.clone(),
                size: record.len(),
                max,
            });
        }
        Ok(())
    }

    fn closed(&self) -> IpcError {
        IpcError::Closed {
            queue: self.object.name.clone(),
        }
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.object.name)
            .field("attrs", &self.object.attrs)
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn attrs() -> QueueAttributes {
        QueueAttributes::new(2, 4)
    }

    #[test]
    fn test_create_open_unlink() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();
        assert_eq!(q.name(), "/orders");
        assert!(ns.contains("/orders"));

        let err = ns.create("/orders", attrs()).unwrap_err();
        assert!(matches!(err, ResourceError::AlreadyExists { .. }));

        let opened = ns.open("/orders").unwrap();
        opened.try_send(b"ab", Priority::Normal).unwrap();
        assert_eq!(q.len(), 1);

        ns.unlink("/orders").unwrap();
        assert!(ns.unlink("/orders").unwrap_err().is_not_found());
        assert!(ns.open("/orders").unwrap_err().is_not_found());
        assert!(ns.is_empty());
    }

    #[test]
    fn test_unlinked_queue_stays_usable() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();
        ns.unlink("/orders").unwrap();

        q.send(b"x", Priority::Normal).unwrap();
        let delivery = q.receive().unwrap();
        assert_eq!(delivery.record, b"x");
    }

    #[test]
    fn test_open_or_create_keeps_existing_attributes() {
        let ns = Namespace::new();
        let first = ns.open_or_create("/results", attrs()).unwrap();
        let second = ns
            .open_or_create("/results", QueueAttributes::new(50, 50))
            .unwrap();

        assert_eq!(second.attributes(), first.attributes());
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_invalid_names_and_attributes() {
        let ns = Namespace::new();
        for name in ["orders", "/", "/a/b"] {
            let err = ns.create(name, attrs()).unwrap_err();
            assert!(matches!(err, ResourceError::InvalidName { .. }), "{name}");
        }

        let long = format!("/{}", "q".repeat(NAME_MAX));
        assert!(ns.create(&long, attrs()).is_err());

        let err = ns.create("/zero", QueueAttributes::new(0, 4)).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidAttributes { .. }));
    }

    #[test]
    fn test_limit_reached() {
        let ns = Namespace::with_limit(1);
        ns.create("/one", attrs()).unwrap();

        let err = ns.create("/two", attrs()).unwrap_err();
        assert!(matches!(err, ResourceError::LimitReached { limit: 1, .. }));

        ns.unlink("/one").unwrap();
        ns.create("/two", attrs()).unwrap();
    }

    #[test]
    fn test_try_send_would_block_when_full() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();

        assert!(q.try_send(b"1", Priority::Normal).unwrap().is_accepted());
        assert!(q.try_send(b"2", Priority::Normal).unwrap().is_accepted());
        assert_eq!(
            q.try_send(b"3", Priority::Normal).unwrap(),
            SendOutcome::WouldBlock
        );

        // The urgent class has its own room
        assert!(q.try_send(b"u", Priority::Urgent).unwrap().is_accepted());

        assert_eq!(q.try_receive().unwrap().unwrap().record, b"u");
        assert_eq!(q.try_receive().unwrap().unwrap().record, b"1");
        assert_eq!(q.try_receive().unwrap().unwrap().record, b"2");
        assert!(q.try_receive().unwrap().is_none());
    }

    #[test]
    fn test_message_too_large() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();

        let err = q.try_send(b"12345", Priority::Normal).unwrap_err();
        assert_eq!(
            err,
            IpcError::MessageTooLarge {
                queue: "/orders".into(),
                size: 5,
                max: 4
            }
        );
    }

    #[test]
    fn test_urgent_served_first() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();

        q.send(b"n1", Priority::Normal).unwrap();
        q.send(b"n2", Priority::Normal).unwrap();
        q.send(b"u1", Priority::Urgent).unwrap();

        let first = q.receive().unwrap();
        assert_eq!(first.priority, Priority::Urgent);
        assert_eq!(first.record, b"u1");
        assert_eq!(q.receive().unwrap().record, b"n1");
        assert_eq!(q.receive().unwrap().record, b"n2");
    }

    #[test]
    fn test_blocking_receive_wakes_on_send() {
        let ns = Namespace::new();
        let q = ns.create("/orders", attrs()).unwrap();
        let reader = ns.open("/orders").unwrap();

        let handle = thread::spawn(move || reader.receive().unwrap());
        thread::sleep(Duration::from_millis(20));
        q.send(b"go", Priority::Normal).unwrap();

        assert_eq!(handle.join().unwrap().record, b"go");
    }

    #[test]
    fn test_wait_readable_cancel() {
        let ns = Namespace::new();
        let q = ns.create("/results", attrs()).unwrap();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        q.send(b"r", Priority::Normal).unwrap();
        assert!(q.wait_readable(&cancel_rx));
        q.try_receive().unwrap();

        drop(cancel_tx);
        assert!(!q.wait_readable(&cancel_rx));
    }
}
