use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use crate::service::{ConnectionEvent, ConnectionEvents, DisconnectReason};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

type HandlerFn = dyn Fn(&Message) -> Result<()> + Send + Sync + 'static;
type DisconnectFn = dyn Fn(&DisconnectReason) + Send + Sync + 'static;

/// Routes inbound messages to handlers keyed by message type.
///
/// Handlers run on whichever task drains the connection's events, never on the
/// read loop itself.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>>,
    fallback: RwLock<Option<Box<HandlerFn>>>,
    on_disconnect: RwLock<Option<Box<DisconnectFn>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            fallback: RwLock::new(None),
            on_disconnect: RwLock::new(None),
        }
    }

    pub fn register<F>(&self, message_type: &str, handler: F) -> Result<()>
    where
        F: Fn(&Message) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        handlers.insert(Cow::Owned(message_type.to_string()), Box::new(handler));
        Ok(())
    }

    /// Handler for message types nobody registered for.
    pub fn set_fallback<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Message) -> Result<()> + Send + Sync + 'static,
    {
        let mut fallback = self.fallback.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;
        *fallback = Some(Box::new(handler));
        Ok(())
    }

    pub fn on_disconnect<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&DisconnectReason) + Send + Sync + 'static,
    {
        let mut slot = self.on_disconnect.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;
        *slot = Some(Box::new(hook));
        Ok(())
    }

    pub fn dispatch(&self, msg: &Message) -> Result<()> {
        let handlers = self.handlers.read().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string())
        })?;

        if let Some(handler) = handlers.get(msg.message_type()) {
            return handler(msg);
        }

        let fallback = self.fallback.read().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string())
        })?;
        match fallback.as_ref() {
            Some(handler) => handler(msg),
            None => Err(ProtocolError::UnexpectedMessage(
                msg.message_type().to_string(),
            )),
        }
    }

    /// Drain a connection's events until it disconnects.
    ///
    /// Handler errors are logged and do not stop the loop. Returns the
    /// disconnect reason, or `None` if the event stream ended without one.
    pub async fn run(&self, mut events: ConnectionEvents) -> Option<DisconnectReason> {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Message(msg) => {
                    if let Err(e) = self.dispatch(&msg) {
                        warn!(message_type = msg.message_type(), error = %e, "Handler failed");
                    }
                }
                ConnectionEvent::Disconnected(reason) => {
                    debug!(%reason, "Dispatcher observed disconnect");
                    if let Ok(hook) = self.on_disconnect.read() {
                        if let Some(hook) = hook.as_ref() {
                            hook(&reason);
                        }
                    }
                    return Some(reason);
                }
            }
        }
        None
    }
}
