//! Mount session: the client entry point.
//!
//! [Nfs3Client] walks the MOUNT handshake
//!
//! ```text
//! Unresolved --GETPORT(MOUNT)--> PortResolved --MNT, UMNT, GETPORT(NFS)--> Mounted
//! ```
//!
//! and then issues NFS version 3 calls against the root handle it obtained.
//! The handle alone is enough for NFS, so the mount entry is released with
//! UMNT right after MNT.
//!
//! A STALE or BADHANDLE status on a call that carries the root handle sends the
//! session back to `Unresolved` and runs the handshake again. The call that
//! noticed it still fails with [Error::StaleHandle]; retrying is up to the
//! caller.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_attributes::instrument;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::nfs::mount::{Mnt, MountNull, Umnt};
use crate::protocol::nfs::portmap::{PortResolver, PortmapResolver};
use crate::protocol::nfs::v3::{self, HandleArgs};
use crate::protocol::rpc::{
    accept_any, AddressDiscovery, AuthNone, Credential, DnsDiscovery, Procedure, RpcDispatcher,
    RpcRequest, Transport,
};
use crate::protocol::xdr::mount::{self, mountres3};
use crate::protocol::xdr::nfs3::dir::*;
use crate::protocol::xdr::nfs3::file::*;
use crate::protocol::xdr::nfs3::fs::*;
use crate::protocol::xdr::nfs3::{self, *};
use crate::protocol::xdr::{Deserialize, Void};
use crate::tcp::TcpTransport;
use crate::write_verifier::check_verifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPhase {
    Unresolved,
    PortResolved,
    Mounted,
}

/// Snapshot of the mount state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountState {
    pub phase: MountPhase,
    /// Root handle of the export; set once mounted.
    pub root: Option<nfs_fh3>,
    /// Authentication flavors the server advertised with the root handle.
    pub auth_flavors: Vec<u32>,
    /// Number of completed handshakes.
    pub generation: u64,
}

impl Default for MountState {
    fn default() -> Self {
        Self { phase: MountPhase::Unresolved, root: None, auth_flavors: Vec::new(), generation: 0 }
    }
}

pub struct Nfs3Client {
    config: ClientConfig,
    resolver: Arc<dyn PortResolver>,
    mount_rpc: RpcDispatcher,
    nfs_rpc: RpcDispatcher,
    credential: RwLock<Arc<dyn Credential>>,
    state: RwLock<MountState>,
    /// Held for the whole handshake.
    refresh: Mutex<()>,
}

impl Nfs3Client {
    /// Client using `transport` for every call and the server's portmapper
    /// for port lookups.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let resolver =
            PortmapResolver::new(Arc::clone(&transport), config.retry, config.call_timeout)
                .with_privileged_port(config.use_privileged_port);
        Self::with_collaborators(config, transport, Arc::new(resolver), Arc::new(DnsDiscovery))
    }

    pub fn with_collaborators(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn PortResolver>,
        discovery: Arc<dyn AddressDiscovery>,
    ) -> Self {
        let dispatcher = |transport: Arc<dyn Transport>, discovery: Arc<dyn AddressDiscovery>| {
            let dispatcher = RpcDispatcher::new(
                config.server.clone(),
                transport,
                discovery,
                config.retry,
                config.call_timeout,
            );
            dispatcher.set_privileged(config.use_privileged_port);
            dispatcher
        };
        let mount_rpc = dispatcher(Arc::clone(&transport), Arc::clone(&discovery));
        let nfs_rpc = dispatcher(transport, discovery);

        Self {
            config,
            resolver,
            mount_rpc,
            nfs_rpc,
            credential: RwLock::new(Arc::new(AuthNone)),
            state: RwLock::new(MountState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Mounts `config.export` over TCP with the given credential.
    pub async fn connect(config: ClientConfig, credential: Arc<dyn Credential>) -> Result<Self> {
        let client = Self::new(config, Arc::new(TcpTransport::new()));
        client.set_credential(credential);
        client.mount().await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credential sent with every later call. Calls already in flight keep
    /// the credential they started with.
    pub fn set_credential(&self, credential: Arc<dyn Credential>) {
        match self.credential.write() {
            Ok(mut current) => *current = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    pub fn credential(&self) -> Arc<dyn Credential> {
        match self.credential.read() {
            Ok(credential) => Arc::clone(&credential),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn state(&self) -> MountState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update_state(&self, update: impl FnOnce(&mut MountState)) {
        match self.state.write() {
            Ok(mut state) => update(&mut state),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    fn mounted_root(&self) -> Option<nfs_fh3> {
        let state = self.state();
        match state.phase {
            MountPhase::Mounted => state.root,
            _ => None,
        }
    }

    /// Ports the MOUNT and NFS dispatchers currently use.
    pub fn ports(&self) -> (u16, u16) {
        (self.mount_rpc.port(), self.nfs_rpc.port())
    }

    /// Root handle of the export, mounting first if needed.
    pub async fn root_handle(&self) -> Result<nfs_fh3> {
        match self.mounted_root() {
            Some(root) => Ok(root),
            None => self.mount().await,
        }
    }

    /// Runs the handshake unless the session is already mounted.
    pub async fn mount(&self) -> Result<nfs_fh3> {
        let generation = self.state().generation;
        if let Some(root) = self.mounted_root() {
            return Ok(root);
        }
        self.refresh(generation).await
    }

    /// Runs the handshake again, even if the session is mounted.
    pub async fn remount(&self) -> Result<nfs_fh3> {
        let generation = self.state().generation;
        self.refresh(generation).await
    }

    /// Handshake for a caller that last saw `generation`. A caller that
    /// waited for another caller's handshake returns its result instead of
    /// running a second one.
    async fn refresh(&self, generation: u64) -> Result<nfs_fh3> {
        let _refresh = self.refresh.lock().await;
        let state = self.state();
        if state.generation != generation && state.phase == MountPhase::Mounted {
            if let Some(root) = state.root {
                debug!("handshake completed by a concurrent caller");
                return Ok(root);
            }
        }
        self.handshake().await
    }

    async fn resolve_port(&self, configured: Option<u16>, program: u32, version: u32) -> Result<u16> {
        match configured {
            Some(port) => Ok(port),
            None => self.resolver.resolve_port(program, version, &self.config.server).await,
        }
    }

    #[instrument(skip(self), fields(server = %self.config.server, export = %self.config.export))]
    async fn handshake(&self) -> Result<nfs_fh3> {
        self.update_state(|state| state.phase = MountPhase::Unresolved);

        let port = self.resolve_port(self.config.mount_port, mount::PROGRAM, mount::VERSION).await?;
        self.mount_rpc.set_port(port).await;
        self.update_state(|state| state.phase = MountPhase::PortResolved);
        debug!("MOUNT service on port {port}");

        let export = self.config.export.clone();
        let credential = self.credential();
        let request = RpcRequest::<Mnt>::new(&export, Arc::clone(&credential));
        let mounted = match self.mount_rpc.call_with_retry(&request, accept_any).await? {
            mountres3::Ok(mounted) => mounted,
            mountres3::Err(status) => {
                warn!("MNT failed: {status:?}");
                return Err(Error::MountFailed {
                    server: self.config.server.clone(),
                    export,
                    status,
                });
            }
        };

        let request = RpcRequest::<Umnt>::new(&export, credential);
        if let Err(err) = self.mount_rpc.call_with_retry(&request, accept_any).await {
            warn!("UMNT failed, the server keeps a stale mount entry: {err}");
        }

        let port = self.resolve_port(self.config.nfs_port, nfs3::PROGRAM, nfs3::VERSION).await?;
        self.nfs_rpc.set_port(port).await;

        let root = nfs_fh3 { data: mounted.fhandle };
        self.update_state(|state| {
            state.phase = MountPhase::Mounted;
            state.root = Some(root.clone());
            state.auth_flavors = mounted.auth_flavors;
            state.generation += 1;
        });
        info!("mounted, NFS service on port {port}");
        Ok(root)
    }

    /// NULL: round trip to the NFS service.
    pub async fn null(&self) -> Result<()> {
        self.mount().await?;
        let request = RpcRequest::<v3::Null>::new(&Void, self.credential());
        self.nfs_rpc.call_with_retry(&request, accept_any).await?;
        Ok(())
    }

    /// MOUNT NULL: round trip to the MOUNT service.
    pub async fn mount_null(&self) -> Result<()> {
        self.mount().await?;
        let request = RpcRequest::<MountNull>::new(&Void, self.credential());
        self.mount_rpc.call_with_retry(&request, accept_any).await?;
        Ok(())
    }

    async fn call_nfs<P, T, F>(&self, args: &P::Args) -> Result<T>
    where
        P: Procedure<Reply = Nfs3Result<T, F>>,
        P::Args: HandleArgs,
        T: Deserialize + Default + Send,
        F: Deserialize + Default + Send,
    {
        self.call_nfs_validated::<P, T, F, _>(args, accept_any).await
    }

    /// Calls `P` and turns the reply status into a result. `validate` runs on
    /// every decoded reply inside the dispatcher.
    async fn call_nfs_validated<P, T, F, V>(&self, args: &P::Args, validate: V) -> Result<T>
    where
        P: Procedure<Reply = Nfs3Result<T, F>>,
        P::Args: HandleArgs,
        T: Deserialize + Default + Send,
        F: Deserialize + Default + Send,
        V: Fn(&P::Args, &P::Reply) -> Result<()>,
    {
        self.mount().await?;
        let generation = self.state().generation;
        let handle = args.file_handle();
        let request =
            RpcRequest::<P>::new(args, self.credential()).with_routing_key(routing_key(handle));
        let reply = self.nfs_rpc.call_with_retry(&request, validate).await?;

        match reply.status() {
            status @ (nfsstat3::NFS3ERR_STALE | nfsstat3::NFS3ERR_BADHANDLE) => {
                let root = self.state().root;
                if args.file_handles().into_iter().any(|handle| root.as_ref() == Some(handle)) {
                    warn!("{} reported the root handle as {status:?}, remounting", P::NAME);
                    if let Err(err) = self.refresh(generation).await {
                        warn!("remount after {status:?} failed: {err}");
                    }
                }
                Err(Error::StaleHandle {
                    server: self.config.server.clone(),
                    procedure: P::NAME,
                    status,
                })
            }
            _ => reply.into_result(&self.config.server, P::NAME),
        }
    }

    pub async fn getattr(&self, args: &GETATTR3args) -> Result<GETATTR3resok> {
        self.call_nfs::<v3::GetAttr, _, _>(args).await
    }

    pub async fn setattr(&self, args: &SETATTR3args) -> Result<SETATTR3resok> {
        self.call_nfs::<v3::SetAttr, _, _>(args).await
    }

    pub async fn lookup(&self, args: &LOOKUP3args) -> Result<LOOKUP3resok> {
        self.call_nfs::<v3::Lookup, _, _>(args).await
    }

    pub async fn access(&self, args: &ACCESS3args) -> Result<ACCESS3resok> {
        self.call_nfs::<v3::Access, _, _>(args).await
    }

    pub async fn readlink(&self, args: &READLINK3args) -> Result<READLINK3resok> {
        self.call_nfs::<v3::ReadLink, _, _>(args).await
    }

    pub async fn read(&self, args: &READ3args) -> Result<READ3resok> {
        self.call_nfs::<v3::Read, _, _>(args).await
    }

    /// WRITE. With `expected_verifier` set, a reply carrying another
    /// verifier fails with [Error::ServerRestarted].
    pub async fn write(
        &self,
        args: &WRITE3args,
        expected_verifier: Option<writeverf3>,
    ) -> Result<WRITE3resok> {
        let server = self.config.server.as_str();
        let validate = move |_: &WRITE3args, reply: &WRITE3res| match reply {
            Nfs3Result::Ok(resok) => {
                check_verifier(server, v3::Write::NAME, expected_verifier, resok.verf)
            }
            Nfs3Result::Fail(..) => Ok(()),
        };
        self.call_nfs_validated::<v3::Write, _, _, _>(args, validate).await
    }

    pub async fn create(&self, args: &CREATE3args) -> Result<CREATE3resok> {
        self.call_nfs::<v3::Create, _, _>(args).await
    }

    pub async fn mkdir(&self, args: &MKDIR3args) -> Result<MKDIR3resok> {
        self.call_nfs::<v3::MkDir, _, _>(args).await
    }

    pub async fn symlink(&self, args: &SYMLINK3args) -> Result<SYMLINK3resok> {
        self.call_nfs::<v3::SymLink, _, _>(args).await
    }

    pub async fn mknod(&self, args: &MKNOD3args) -> Result<MKNOD3resok> {
        self.call_nfs::<v3::MkNod, _, _>(args).await
    }

    pub async fn remove(&self, args: &REMOVE3args) -> Result<REMOVE3resok> {
        self.call_nfs::<v3::Remove, _, _>(args).await
    }

    pub async fn rmdir(&self, args: &RMDIR3args) -> Result<RMDIR3resok> {
        self.call_nfs::<v3::RmDir, _, _>(args).await
    }

    pub async fn rename(&self, args: &RENAME3args) -> Result<RENAME3resok> {
        self.call_nfs::<v3::Rename, _, _>(args).await
    }

    pub async fn link(&self, args: &LINK3args) -> Result<LINK3resok> {
        self.call_nfs::<v3::Link, _, _>(args).await
    }

    pub async fn readdir(&self, args: &READDIR3args) -> Result<READDIR3resok> {
        self.call_nfs::<v3::ReadDir, _, _>(args).await
    }

    pub async fn readdirplus(&self, args: &READDIRPLUS3args) -> Result<READDIRPLUS3resok> {
        self.call_nfs::<v3::ReadDirPlus, _, _>(args).await
    }

    pub async fn fsstat(&self, args: &FSSTAT3args) -> Result<FSSTAT3resok> {
        self.call_nfs::<v3::FsStat, _, _>(args).await
    }

    pub async fn fsinfo(&self, args: &FSINFO3args) -> Result<FSINFO3resok> {
        self.call_nfs::<v3::FsInfo, _, _>(args).await
    }

    pub async fn pathconf(&self, args: &PATHCONF3args) -> Result<PATHCONF3resok> {
        self.call_nfs::<v3::PathConf, _, _>(args).await
    }

    /// COMMIT. With `expected_verifier` set, a reply carrying another
    /// verifier fails with [Error::ServerRestarted].
    pub async fn commit(
        &self,
        args: &COMMIT3args,
        expected_verifier: Option<writeverf3>,
    ) -> Result<COMMIT3resok> {
        let server = self.config.server.as_str();
        let validate = move |_: &COMMIT3args, reply: &COMMIT3res| match reply {
            Nfs3Result::Ok(resok) => {
                check_verifier(server, v3::Commit::NAME, expected_verifier, resok.verf)
            }
            Nfs3Result::Fail(..) => Ok(()),
        };
        self.call_nfs_validated::<v3::Commit, _, _, _>(args, validate).await
    }
}

/// Calls on the same handle go to the same server address.
fn routing_key(handle: &nfs_fh3) -> u64 {
    let mut hasher = DefaultHasher::new();
    handle.data.hash(&mut hasher);
    hasher.finish()
}
