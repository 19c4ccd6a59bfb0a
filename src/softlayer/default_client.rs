use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::debug;

use super::client::Client;

/// Holds an optional client that call sites can fall back to.
///
/// Reads and writes are atomic pointer swaps. The holder never validates,
/// tears down or replaces what it is given.
#[derive(Debug, Default)]
pub struct DefaultClientHolder {
    client: ArcSwapOption<Client>,
}

static GLOBAL: DefaultClientHolder = DefaultClientHolder::new();

impl DefaultClientHolder {
    pub const fn new() -> Self {
        Self {
            client: ArcSwapOption::const_empty(),
        }
    }

    /// The process-wide holder behind [`default_client`] and
    /// [`set_default_client`].
    pub fn global() -> &'static DefaultClientHolder {
        &GLOBAL
    }

    pub fn get(&self) -> Option<Arc<Client>> {
        self.client.load_full()
    }

    pub fn set(&self, client: Option<Arc<Client>>) {
        debug!(present = client.is_some(), "Replacing default client");
        self.client.store(client);
    }

    /// `explicit` if given, otherwise the held client.
    pub fn resolve(&self, explicit: Option<&Arc<Client>>) -> Option<Arc<Client>> {
        explicit.cloned().or_else(|| self.get())
    }
}

pub fn default_client() -> Option<Arc<Client>> {
    GLOBAL.get()
}

pub fn set_default_client(client: Option<Arc<Client>>) {
    GLOBAL.set(client)
}
