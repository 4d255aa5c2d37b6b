//! Portmap protocol (RFC 1833) client side.
//!
//! Only PMAPPROC_GETPORT is called: [PortmapResolver] asks the portmapper on
//! port 111 where a program listens over TCP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::protocol::rpc::{
    accept_any, AddressDiscovery, AuthNone, Credential, DnsDiscovery, RpcDispatcher, RpcRequest,
    Transport,
};
use crate::protocol::xdr::portmap::{self, mapping, PortmapProgram, IPPROTO_TCP, PMAP_PORT};
use crate::protocol::xdr::Void;

procedure!(
    /// PMAPPROC_NULL: does nothing; checks that the portmapper answers.
    PortmapNull = "PMAP NULL", portmap::PROGRAM, portmap::VERSION, PortmapProgram::PMAPPROC_NULL,
    Void => Void
);

procedure!(
    /// PMAPPROC_GETPORT: port of a registered program, 0 when unregistered.
    GetPort = "GETPORT", portmap::PROGRAM, portmap::VERSION, PortmapProgram::PMAPPROC_GETPORT,
    mapping => u32
);

/// Maps an RPC program and version to the port it listens on at `server`.
#[async_trait]
pub trait PortResolver: Send + Sync {
    async fn resolve_port(&self, program: u32, version: u32, server: &str) -> Result<u16>;
}

/// [PortResolver] backed by the server's portmapper.
///
/// One dispatcher is kept per server, so a switch to a reserved port made
/// for one lookup holds for the next.
pub struct PortmapResolver {
    transport: Arc<dyn Transport>,
    discovery: Arc<dyn AddressDiscovery>,
    retry: RetryPolicy,
    timeout: Duration,
    use_privileged_port: bool,
    dispatchers: Mutex<HashMap<String, Arc<RpcDispatcher>>>,
}

impl PortmapResolver {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            discovery: Arc::new(DnsDiscovery),
            retry,
            timeout,
            use_privileged_port: false,
            dispatchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn AddressDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    /// Sends every portmapper call from a reserved port.
    pub fn with_privileged_port(mut self, use_privileged_port: bool) -> Self {
        self.use_privileged_port = use_privileged_port;
        self
    }

    fn cached(&self, server: &str) -> Option<Arc<RpcDispatcher>> {
        match self.dispatchers.lock() {
            Ok(dispatchers) => dispatchers.get(server).cloned(),
            Err(poisoned) => poisoned.into_inner().get(server).cloned(),
        }
    }

    async fn dispatcher(&self, server: &str) -> Arc<RpcDispatcher> {
        if let Some(dispatcher) = self.cached(server) {
            return dispatcher;
        }
        let dispatcher = Arc::new(RpcDispatcher::new(
            server,
            Arc::clone(&self.transport),
            Arc::clone(&self.discovery),
            self.retry,
            self.timeout,
        ));
        dispatcher.set_privileged(self.use_privileged_port);
        dispatcher.set_port(PMAP_PORT).await;

        let mut dispatchers = match self.dispatchers.lock() {
            Ok(dispatchers) => dispatchers,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(dispatchers.entry(server.to_string()).or_insert(dispatcher))
    }

    /// PMAPPROC_NULL against the portmapper of `server`.
    pub async fn null(&self, server: &str) -> Result<()> {
        let dispatcher = self.dispatcher(server).await;
        let request = RpcRequest::<PortmapNull>::new(&Void, Arc::new(AuthNone));
        dispatcher.call_with_retry(&request, accept_any).await?;
        Ok(())
    }
}

#[async_trait]
impl PortResolver for PortmapResolver {
    async fn resolve_port(&self, program: u32, version: u32, server: &str) -> Result<u16> {
        let dispatcher = self.dispatcher(server).await;

        let args = mapping { prog: program, vers: version, prot: IPPROTO_TCP, port: 0 };
        let credential: Arc<dyn Credential> = Arc::new(AuthNone);
        let request = RpcRequest::<GetPort>::new(&args, credential);
        let port = dispatcher.call_with_retry(&request, accept_any).await?;
        debug!("{server}: program {program} v{version} is on port {port}");

        match u16::try_from(port) {
            Ok(0) => Err(Error::PortUnavailable { server: server.to_string(), program, version }),
            Ok(port) => Ok(port),
            Err(_) => Err(Error::MalformedMessage(format!(
                "portmapper returned port {port} for program {program}"
            ))),
        }
    }
}
