//! Retrying call dispatcher.
//!
//! One [RpcDispatcher] talks to one RPC program on one server. A call goes
//! through marshal, transmit, unmarshal and validate; the dispatcher decides
//! after every attempt whether to retry:
//!
//! - network failures and replies to another xid are retried up to the
//!   configured number of attempts, sleeping `base_backoff * attempt` in
//!   between;
//! - an authentication rejection switches the procedure to a reserved source
//!   port for the rest of the session and retries at once without using up an
//!   attempt; a rejection on a reserved port is final;
//! - every other RPC failure, decode failure or validation failure is final.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::message::{marshal_call, unmarshal_reply, CallHeader};
use super::procedure::{Marshal, Procedure, RpcRequest};
use super::routing::{AddressDiscovery, AddressPool};
use super::transport::Transport;
use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::protocol::xdr::XdrBuffer;

pub struct RpcDispatcher {
    server: String,
    transport: Arc<dyn Transport>,
    discovery: Arc<dyn AddressDiscovery>,
    retry: RetryPolicy,
    timeout: Duration,
    port: AtomicU16,
    pool: RwLock<Arc<AddressPool>>,
    /// Every call of this dispatcher uses a reserved port.
    privileged: AtomicBool,
    /// Procedures that were switched to a reserved port after a rejection.
    privileged_procedures: Mutex<HashSet<u32>>,
}

impl RpcDispatcher {
    pub fn new(
        server: impl Into<String>,
        transport: Arc<dyn Transport>,
        discovery: Arc<dyn AddressDiscovery>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            server: server.into(),
            transport,
            discovery,
            retry,
            timeout,
            port: AtomicU16::new(0),
            pool: RwLock::new(Arc::new(AddressPool::default())),
            privileged: AtomicBool::new(false),
            privileged_procedures: Mutex::new(HashSet::new()),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Acquire)
    }

    /// Sends every later call from a reserved source port.
    pub fn set_privileged(&self, privileged: bool) {
        self.privileged.store(privileged, Ordering::Release);
    }

    /// Whether calls of `procedure` currently leave from a reserved port.
    pub fn uses_privileged_port(&self, procedure: u32) -> bool {
        if self.privileged.load(Ordering::Acquire) {
            return true;
        }
        match self.privileged_procedures.lock() {
            Ok(procedures) => procedures.contains(&procedure),
            Err(poisoned) => poisoned.into_inner().contains(&procedure),
        }
    }

    fn escalate(&self, procedure: u32) {
        match self.privileged_procedures.lock() {
            Ok(mut procedures) => procedures.insert(procedure),
            Err(poisoned) => poisoned.into_inner().insert(procedure),
        };
    }

    fn address_pool(&self) -> Arc<AddressPool> {
        match self.pool.read() {
            Ok(pool) => Arc::clone(&pool),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Switches the dispatcher to `port` and rediscovers the server
    /// addresses. The new pool replaces the old one as a whole; a failed
    /// discovery leaves an empty pool, so calls go to the server name.
    pub async fn set_port(&self, port: u16) {
        let pool = match self.discovery.discover(&self.server, port).await {
            Ok(addrs) => AddressPool::new(addrs),
            Err(err) => {
                warn!("address discovery for {} failed: {err}", self.server);
                AddressPool::default()
            }
        };
        debug!("{}: port {port}, {} address(es)", self.server, pool.len());

        let pool = Arc::new(pool);
        match self.pool.write() {
            Ok(mut current) => *current = pool,
            Err(poisoned) => *poisoned.into_inner() = pool,
        }
        self.port.store(port, Ordering::Release);
    }

    /// Address to send the call with `key` to. Falls back to the server name
    /// when no address is known.
    pub fn choose_ip(&self, key: u64) -> Result<String> {
        if let Some(ip) = self.address_pool().pick(key) {
            return Ok(ip.to_string());
        }
        if self.server.is_empty() {
            return Err(Error::NoRouteAvailable { server: self.server.clone() });
        }
        Ok(self.server.clone())
    }

    /// One attempt: marshal, send to `ip`, decode the reply.
    pub async fn call<P: Procedure>(
        &self,
        request: &RpcRequest<'_, P>,
        ip: &str,
        privileged: bool,
    ) -> Result<P::Reply> {
        let header = CallHeader {
            xid: request.xid,
            program: P::PROGRAM,
            version: P::VERSION,
            procedure: P::PROCEDURE,
        };
        let capacity =
            CallHeader::encoded_len(request.credential.as_ref()) + request.args.size_hint();
        let mut buf = XdrBuffer::with_capacity(capacity);
        marshal_call(&header, request.credential.as_ref(), &mut buf)?;
        request.args.marshal(&mut buf)?;
        buf.finalize_payloads();

        trace!(xid = request.xid, procedure = P::NAME, ip, bytes = buf.total_len(), "sending call");
        let reply = self
            .transport
            .send_and_wait(ip, self.port(), privileged, &buf.segments(), self.timeout)
            .await
            .map_err(|source| Error::Network {
                server: self.server.clone(),
                procedure: P::NAME,
                source,
            })?;

        let mut reply = XdrBuffer::from_bytes(reply);
        unmarshal_reply(&mut reply, request.xid)?.into_result(&self.server, P::NAME)?;
        reply.get::<P::Reply>()
    }

    /// Runs `request` under the retry policy. `validate` sees the arguments
    /// and every successfully decoded reply; an error from it ends the call.
    pub async fn call_with_retry<P, V>(&self, request: &RpcRequest<'_, P>, validate: V) -> Result<P::Reply>
    where
        P: Procedure,
        V: Fn(&P::Args, &P::Reply) -> Result<()>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let ip = self.choose_ip(request.routing_key)?;
            let privileged = self.uses_privileged_port(P::PROCEDURE);

            match self.call(request, &ip, privileged).await {
                Ok(reply) => {
                    validate(request.args, &reply)?;
                    return Ok(reply);
                }
                Err(Error::AuthRejected { stat, .. }) if !privileged => {
                    info!(
                        "{} rejected {} credentials ({stat:?}), retrying from a privileged port",
                        self.server,
                        P::NAME
                    );
                    self.escalate(P::PROCEDURE);
                }
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!("{} failed after {attempt} attempt(s): {err}", P::NAME);
                        return Err(err);
                    }
                    let backoff = self.retry.backoff(attempt);
                    debug!("{} attempt {attempt} failed: {err}, retrying in {backoff:?}", P::NAME);
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Validation hook that accepts every reply.
pub fn accept_any<A, R>(_args: &A, _reply: &R) -> Result<()> {
    Ok(())
}
