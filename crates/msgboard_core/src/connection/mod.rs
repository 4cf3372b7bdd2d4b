//! Message connection: CRUD over the messages endpoint with identity caching.
//!
//! # Responsibility
//! - Bind resource URL, schema, algebra and name into one client object.
//! - Parse responses into `Message`/`MessageList`.
//! - Keep instance and list caches consistent after every write.
//!
//! # Invariants
//! - The cache lock is never held across a transport call.
//! - A fetch that raced a write is not cached over that write.
//! - Records without an identity key are returned but never cached.
//! - Writes merge the server response into the caller's instance.

mod cache;
pub mod error;
pub mod http;
pub mod parse;
pub mod transport;

use crate::algebra::{IdentityAlgebra, IdentityKey, ListQuery};
use crate::config::ServiceConfig;
use crate::model::message::{Message, MessageId};
use crate::model::message_list::{MessageList, SharedMessageList};
use cache::{ConnectionCache, ListSync};
use error::{ConnectionError, ConnectionResult};
use http::HttpTransport;
use log::{debug, error, info, warn};
use parse::{parse_instance, parse_list, parse_optional_instance};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use transport::MessageTransport;

/// Connection name used in diagnostics.
pub const CONNECTION_NAME: &str = "message";

/// Fetches per `get_list` call before a write race gives up on caching.
const MAX_LIST_FETCH_ATTEMPTS: u32 = 2;

/// Connection talking HTTP to the configured service.
pub type MessageClient = MessageConnection<HttpTransport>;

/// CRUD connection for messages over a pluggable transport.
pub struct MessageConnection<T: MessageTransport> {
    name: String,
    url: String,
    algebra: IdentityAlgebra,
    transport: T,
    cache: Mutex<ConnectionCache>,
}

impl MessageConnection<HttpTransport> {
    /// Builds the HTTP client for `{service_base_url}/api/messages`.
    pub fn connect(config: &ServiceConfig) -> ConnectionResult<Self> {
        config.validate()?;
        let url = config.messages_url();
        let transport =
            HttpTransport::new(&url, Duration::from_millis(config.request_timeout_ms))?;
        info!(
            "event=connection_init module=connection status=ok name={CONNECTION_NAME} url={url} timeout_ms={}",
            config.request_timeout_ms
        );
        Ok(Self::new(url, IdentityAlgebra::default(), transport))
    }
}

impl<T: MessageTransport> MessageConnection<T> {
    pub fn new(url: impl Into<String>, algebra: IdentityAlgebra, transport: T) -> Self {
        Self {
            name: CONNECTION_NAME.to_string(),
            url: url.into(),
            algebra,
            transport,
            cache: Mutex::new(ConnectionCache::default()),
        }
    }

    /// Overrides the diagnostic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn algebra(&self) -> &IdentityAlgebra {
        &self.algebra
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets one message, answering from the instance cache when possible.
    pub fn get(&self, id: &MessageId) -> ConnectionResult<Message> {
        let key = self.require_key(id, "get")?;
        let hit = self.lock().instance(&key);
        if let Some(message) = hit {
            debug!(
                "event=message_get module=connection status=ok name={} cache=hit id={key}",
                self.name
            );
            return Ok(message);
        }
        self.fetch_instance(&key)
    }

    /// Gets one message from the server, bypassing the instance cache.
    pub fn reload(&self, id: &MessageId) -> ConnectionResult<Message> {
        let key = self.require_key(id, "reload")?;
        self.fetch_instance(&key)
    }

    /// Gets the live list of messages named by `query`.
    ///
    /// A cached list for the same query or a superset answers without a
    /// request. Fetched lists are deduplicated by identity before caching.
    /// The returned handle is the cached list itself: later writes through
    /// this connection update it and fire its listeners. Listeners run while
    /// the connection holds the list and must not call back into it.
    pub fn get_list(&self, query: &ListQuery) -> ConnectionResult<SharedMessageList> {
        let hit = self.lock().lookup_list(&self.algebra, query);
        if let Some(list) = hit {
            debug!(
                "event=message_list module=connection status=ok name={} cache=hit params={} count={}",
                self.name,
                query.len(),
                list.len()
            );
            return Ok(list);
        }

        let started_at = Instant::now();
        let mut attempt = 1;
        loop {
            let generation = self.lock().generation();
            let items = match self.fetch_list(query) {
                Ok(items) => items,
                Err(err) => return Err(self.log_failure("message_list", started_at, err)),
            };
            let count = items.len();

            let mut cache = self.lock();
            if cache.generation() == generation {
                let list = cache.store_list(&self.algebra, query.clone(), items);
                drop(cache);
                info!(
                    "event=message_list module=connection status=ok name={} cache=miss params={} count={count} duration_ms={}",
                    self.name,
                    query.len(),
                    started_at.elapsed().as_millis()
                );
                return Ok(list);
            }
            drop(cache);

            if attempt >= MAX_LIST_FETCH_ATTEMPTS {
                warn!(
                    "event=message_list module=connection status=degraded name={} params={} count={count} attempts={attempt} reason=concurrent_write",
                    self.name,
                    query.len()
                );
                return Ok(SharedMessageList::new(MessageList::from(items)));
            }
            debug!(
                "event=message_list module=connection status=retry name={} attempt={attempt} reason=concurrent_write",
                self.name
            );
            attempt += 1;
        }
    }

    /// Creates `message` on the server and merges the response into it.
    pub fn create(&self, message: &mut Message) -> ConnectionResult<()> {
        let started_at = Instant::now();
        let saved = self
            .transport
            .create_data(&message.to_value())
            .and_then(parse_optional_instance);
        match saved {
            Ok(saved) => {
                if let Some(saved) = saved {
                    message.merge_from(&saved);
                }
                self.remember_write("message_create", started_at, message);
                Ok(())
            }
            Err(err) => Err(self.log_failure("message_create", started_at, err)),
        }
    }

    /// Updates an existing message and merges the response into it.
    pub fn update(&self, message: &mut Message) -> ConnectionResult<()> {
        let key = self
            .algebra
            .key(message)
            .ok_or(ConnectionError::MissingId("update"))?;
        let started_at = Instant::now();
        let saved = self
            .transport
            .update_data(&key, &message.to_value())
            .and_then(parse_optional_instance);
        match saved {
            Ok(saved) => {
                if let Some(saved) = saved {
                    message.merge_from(&saved);
                }
                self.remember_write("message_update", started_at, message);
                Ok(())
            }
            Err(err) => Err(self.log_failure("message_update", started_at, err)),
        }
    }

    /// Creates new messages and updates persisted ones.
    pub fn save(&self, message: &mut Message) -> ConnectionResult<()> {
        if self.algebra.key(message).is_none() {
            self.create(message)
        } else {
            self.update(message)
        }
    }

    /// Deletes `message` on the server and evicts it from every cache.
    pub fn destroy(&self, message: &Message) -> ConnectionResult<()> {
        let key = self
            .algebra
            .key(message)
            .ok_or(ConnectionError::MissingId("destroy"))?;
        let started_at = Instant::now();
        match self
            .transport
            .destroy_data(&key)
            .and_then(parse_optional_instance)
        {
            Ok(_) => {
                self.lock().evict(&self.algebra, &key);
                info!(
                    "event=message_destroy module=connection status=ok name={} id={key} duration_ms={}",
                    self.name,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => Err(self.log_failure("message_destroy", started_at, err)),
        }
    }

    /// Returns the cached instance for `id` without touching the server.
    pub fn cached(&self, id: &MessageId) -> Option<Message> {
        let key = self.algebra.key_of(id)?;
        self.lock().instance(&key)
    }

    /// Number of cached instances and cached lists.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.lock();
        (cache.instance_count(), cache.list_count())
    }

    pub fn clear_cache(&self) {
        self.lock().clear();
        debug!(
            "event=cache_clear module=connection status=ok name={}",
            self.name
        );
    }

    fn fetch_instance(&self, key: &IdentityKey) -> ConnectionResult<Message> {
        let started_at = Instant::now();
        let generation = self.lock().generation();
        match self.transport.get_data(key).and_then(parse_instance) {
            Ok(message) => {
                let mut cache = self.lock();
                if cache.generation() != generation {
                    drop(cache);
                    debug!(
                        "event=message_get module=connection status=ok name={} id={key} cache=skipped reason=concurrent_write",
                        self.name
                    );
                } else if !cache.store_instance(&self.algebra, &message, ListSync::ReplaceOnly) {
                    drop(cache);
                    warn!(
                        "event=message_get module=connection status=degraded name={} id={key} reason=response_without_id",
                        self.name
                    );
                }
                info!(
                    "event=message_get module=connection status=ok name={} cache=miss id={key} duration_ms={}",
                    self.name,
                    started_at.elapsed().as_millis()
                );
                Ok(message)
            }
            Err(err) => Err(self.log_failure("message_get", started_at, err)),
        }
    }

    fn fetch_list(&self, query: &ListQuery) -> ConnectionResult<Vec<Message>> {
        let values = self.transport.get_list_data(query).and_then(parse_list)?;
        Ok(self
            .algebra
            .dedup(values.into_iter().map(Message::from_value)))
    }

    fn remember_write(&self, event: &str, started_at: Instant, message: &Message) {
        let cached = self
            .lock()
            .store_instance(&self.algebra, message, ListSync::Reevaluate);
        if !cached {
            warn!(
                "event={event} module=connection status=degraded name={} reason=saved_without_id",
                self.name
            );
        }
        info!(
            "event={event} module=connection status=ok name={} id={} duration_ms={}",
            self.name,
            self.algebra
                .key(message)
                .map_or_else(|| "none".to_string(), |key| key.to_string()),
            started_at.elapsed().as_millis()
        );
    }

    fn log_failure(
        &self,
        event: &str,
        started_at: Instant,
        err: ConnectionError,
    ) -> ConnectionError {
        error!(
            "event={event} module=connection status=error name={} duration_ms={} error={err}",
            self.name,
            started_at.elapsed().as_millis()
        );
        err
    }

    fn require_key(
        &self,
        id: &MessageId,
        operation: &'static str,
    ) -> ConnectionResult<IdentityKey> {
        self.algebra
            .key_of(id)
            .ok_or(ConnectionError::MissingId(operation))
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
