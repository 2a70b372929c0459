//! Scripted daemon used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::bridge::CommandBridge;
use crate::client::{Args, Backend, InvokeError};
use crate::notify::Notifier;

/// Replies are keyed by command name, or `name:ip` when an `ip` argument is present.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    replies: HashMap<String, Result<Value, Value>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Args)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, key: &str, data: Value) -> Self {
        self.replies.insert(key.to_string(), Ok(data));
        self
    }

    pub(crate) fn fail(mut self, key: &str, error: Value) -> Self {
        self.replies.insert(key.to_string(), Err(error));
        self
    }

    pub(crate) fn delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Args)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, cmd: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == cmd)
            .count()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

fn reply_key(cmd: &str, args: &Args) -> String {
    match args.get("ip").and_then(Value::as_str) {
        Some(ip) => format!("{}:{}", cmd, ip),
        None => cmd.to_string(),
    }
}

impl Backend for ScriptedBackend {
    async fn invoke(&self, cmd: &str, args: Args) -> Result<Value, InvokeError> {
        let key = reply_key(cmd, &args);
        self.calls.lock().unwrap().push((cmd.to_string(), args));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .delays
            .get(&key)
            .copied()
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.replies.get(&key) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(error)) => Err(InvokeError::Raised(error.clone())),
            None => Err(InvokeError::Raised(Value::String(format!(
                "unknown command {}",
                key
            )))),
        }
    }
}

pub(crate) fn recording_notifier() -> (Arc<dyn Notifier>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let notifier: Arc<dyn Notifier> =
        Arc::new(move |message: &str| sink.lock().unwrap().push(message.to_string()));
    (notifier, seen)
}

pub(crate) fn shared_bridge(
    backend: ScriptedBackend,
) -> (Arc<CommandBridge<ScriptedBackend>>, Arc<Mutex<Vec<String>>>) {
    let (notifier, seen) = recording_notifier();
    (Arc::new(CommandBridge::new(backend, notifier)), seen)
}
