//! Unit-of-work hooks and the scope guard

use super::LoggerBridge;
use crate::sync::write;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Caller-supplied values attached to every record logged during a unit of work
pub type Context = BTreeMap<String, Value>;

impl LoggerBridge {
    /// Store `context` and attach. Always returns `true`.
    pub fn before_unit_of_work(self: &Arc<Self>, context: Context) -> bool {
        *write(&self.context) = Some(context);
        self.attach();
        true
    }

    /// Detach and clear the context. Always returns `true`.
    pub fn after_unit_of_work(&self) -> bool {
        self.detach();
        *write(&self.context) = None;
        true
    }

    /// Attach for as long as the returned guard lives
    pub fn scope(self: &Arc<Self>, context: Context) -> UnitOfWork {
        self.before_unit_of_work(context);
        UnitOfWork {
            bridge: Arc::clone(self),
        }
    }

    /// Run `work` inside a unit of work; the bridge detaches however `work` exits
    pub fn run_unit_of_work<F, T>(self: &Arc<Self>, context: Context, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _unit = self.scope(context);
        work()
    }
}

/// Detaches the bridge when dropped, including during unwinding
#[must_use = "the bridge detaches as soon as the unit of work is dropped"]
pub struct UnitOfWork {
    bridge: Arc<LoggerBridge>,
}

impl UnitOfWork {
    pub fn bridge(&self) -> &Arc<LoggerBridge> {
        &self.bridge
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.bridge.after_unit_of_work();
    }
}
