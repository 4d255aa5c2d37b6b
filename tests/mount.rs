use std::sync::Arc;

mod support;

use nfs_mamont_client::protocol::rpc::AuthUnix;
use nfs_mamont_client::xdr::mount::{mountres3, mountstat3, MountProgram};
use nfs_mamont_client::xdr::nfs3::dir::{LOOKUP3args, LOOKUP3res, RENAME3args, RENAME3res};
use nfs_mamont_client::xdr::nfs3::{
    self, diropargs3, fattr3, nfs_fh3, nfsstat3, GETATTR3args, GETATTR3res, GETATTR3resok,
    NFSProgram, Nfs3Result,
};
use nfs_mamont_client::xdr::rpc::auth_flavor;
use nfs_mamont_client::xdr::{mount, Void};
use nfs_mamont_client::{ClientConfig, Error, MountPhase, Nfs3Client};

use support::{
    client, encode, is_mount, is_nfs, server, success_reply, MockTransport, NoDiscovery,
    StaticPorts, MOUNT_PORT, NFS_PORT, ROOT,
};

fn root() -> nfs_fh3 {
    nfs_fh3 { data: ROOT.to_vec() }
}

fn getattr_ok(size: u64) -> Vec<u8> {
    let attrs = fattr3 { size, ..fattr3::default() };
    encode(&GETATTR3res::Ok(GETATTR3resok { obj_attributes: attrs }))
}

fn mnt_count(transport: &MockTransport) -> usize {
    transport.count(mount::PROGRAM, MountProgram::MOUNTPROC3_MNT as u32)
}

#[tokio::test]
async fn mount_captures_the_root_handle_and_releases_the_mount() {
    let transport = server(|call| panic!("unexpected NFS call {}", call.procedure));
    let ports = StaticPorts::new(MOUNT_PORT, NFS_PORT);
    let client = client(transport.clone(), ports.clone());
    assert_eq!(client.state().phase, MountPhase::Unresolved);

    let handle = client.mount().await.unwrap();

    assert_eq!(handle, root());
    let state = client.state();
    assert_eq!(state.phase, MountPhase::Mounted);
    assert_eq!(state.root, Some(root()));
    assert_eq!(state.auth_flavors, vec![1]);
    assert_eq!(state.generation, 1);
    assert_eq!(client.ports(), (MOUNT_PORT, NFS_PORT));
    assert_eq!(ports.lookups(), vec![mount::PROGRAM, nfs3::PROGRAM]);

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(is_mount(&calls[0], MountProgram::MOUNTPROC3_MNT));
    assert!(is_mount(&calls[1], MountProgram::MOUNTPROC3_UMNT));
    for call in &calls {
        assert_eq!(call.port, MOUNT_PORT);
        assert_eq!(call.version, 3);
        assert_eq!(call.decode_args::<String>(), "/export");
    }

    // mounted sessions do not go back to the server
    assert_eq!(client.root_handle().await.unwrap(), root());
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn mount_error_status_is_fatal_and_skips_umnt() {
    let transport = MockTransport::new(|call| {
        assert!(is_mount(call, MountProgram::MOUNTPROC3_MNT), "only MNT expected");
        Ok(success_reply(call.xid, &encode(&mountres3::Err(mountstat3::MNT3ERR_NOENT))))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    let err = client.mount().await.unwrap_err();

    match err {
        Error::MountFailed { server, export, status } => {
            assert_eq!(server, "filer");
            assert_eq!(export, "/export");
            assert_eq!(status, mountstat3::MNT3ERR_NOENT);
            assert_eq!(status as u32, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(client.state().phase, MountPhase::PortResolved);
    assert_eq!(client.state().root, None);
}

#[tokio::test(start_paused = true)]
async fn umnt_failures_do_not_fail_the_mount() {
    let transport = MockTransport::new(|call| {
        if is_mount(call, MountProgram::MOUNTPROC3_MNT) {
            Ok(success_reply(call.xid, &support::mnt_ok(&ROOT, vec![])))
        } else {
            Err(support::network_error())
        }
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    assert_eq!(client.mount().await.unwrap(), root());
    assert_eq!(transport.count(mount::PROGRAM, MountProgram::MOUNTPROC3_UMNT as u32), 3);
    assert_eq!(client.state().auth_flavors, Vec::<u32>::new());
}

#[tokio::test]
async fn unregistered_mount_service_fails_before_any_call() {
    let transport = server(|_| panic!("no NFS call expected"));
    let client = client(transport.clone(), StaticPorts::new(0, NFS_PORT));

    let err = client.mount().await.unwrap_err();

    assert!(matches!(err, Error::PortUnavailable { program: 100005, .. }), "{err:?}");
    assert!(transport.calls().is_empty());
    assert_eq!(client.state().phase, MountPhase::Unresolved);
}

#[tokio::test]
async fn configured_ports_skip_the_port_lookup() {
    let transport = server(|call| Ok(success_reply(call.xid, &getattr_ok(10))));
    let ports = StaticPorts::new(0, 0);
    let config = ClientConfig::new("filer", "/export/").with_mount_port(20048).with_nfs_port(2050);
    let client =
        Nfs3Client::with_collaborators(config, transport.clone(), ports.clone(), Arc::new(NoDiscovery));

    let attrs = client.getattr(&GETATTR3args { object: root() }).await.unwrap();

    assert_eq!(attrs.obj_attributes.size, 10);
    assert!(ports.lookups().is_empty());
    let ports_used: Vec<u16> = transport.calls().iter().map(|call| call.port).collect();
    assert_eq!(ports_used, vec![20048, 20048, 2050]);
}

#[tokio::test]
async fn first_nfs_call_mounts_the_session() {
    let transport = server(|call| {
        assert!(is_nfs(call, NFSProgram::NFSPROC3_GETATTR));
        assert_eq!(call.port, NFS_PORT);
        assert_eq!(call.decode_args::<GETATTR3args>().object, root());
        Ok(success_reply(call.xid, &getattr_ok(4096)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    let root = client.root_handle().await.unwrap();
    let attrs = client.getattr(&GETATTR3args { object: root }).await.unwrap();

    assert_eq!(attrs.obj_attributes.size, 4096);
    assert_eq!(mnt_count(&transport), 1);
}

#[tokio::test]
async fn stale_root_handle_remounts_and_reports_stale() {
    let transport = server(|call| {
        let reply = GETATTR3res::Fail(nfsstat3::NFS3ERR_STALE, Void);
        Ok(success_reply(call.xid, &encode(&reply)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));
    client.mount().await.unwrap();

    let err = client.getattr(&GETATTR3args { object: root() }).await.unwrap_err();

    assert!(
        matches!(
            err,
            Error::StaleHandle { procedure: "GETATTR", status: nfsstat3::NFS3ERR_STALE, .. }
        ),
        "{err:?}"
    );
    assert_eq!(mnt_count(&transport), 2);
    assert_eq!(client.state().generation, 2);
    assert_eq!(client.state().phase, MountPhase::Mounted);
}

#[tokio::test]
async fn stale_handle_below_the_root_does_not_remount() {
    let transport = server(|call| {
        let reply = GETATTR3res::Fail(nfsstat3::NFS3ERR_BADHANDLE, Void);
        Ok(success_reply(call.xid, &encode(&reply)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    let file = nfs_fh3 { data: vec![9; 16] };
    let err = client.getattr(&GETATTR3args { object: file }).await.unwrap_err();

    assert!(matches!(err, Error::StaleHandle { status: nfsstat3::NFS3ERR_BADHANDLE, .. }));
    assert_eq!(mnt_count(&transport), 1);
    assert_eq!(client.state().generation, 1);
}

#[tokio::test]
async fn other_statuses_are_nfs_errors() {
    let transport = server(|call| {
        assert!(is_nfs(call, NFSProgram::NFSPROC3_LOOKUP));
        let args: LOOKUP3args = call.decode_args();
        assert_eq!(args.what.name.0, b"missing");
        let reply = LOOKUP3res::Fail(nfsstat3::NFS3ERR_NOENT, Default::default());
        Ok(success_reply(call.xid, &encode(&reply)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    let args = LOOKUP3args { what: diropargs3 { dir: root(), name: "missing".into() } };
    let err = client.lookup(&args).await.unwrap_err();

    assert!(
        matches!(
            err,
            Error::Nfs { ref server, procedure: "LOOKUP", status: nfsstat3::NFS3ERR_NOENT }
                if server == "filer"
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn concurrent_mounts_share_one_handshake() {
    let transport = server(|_| panic!("no NFS call expected"));
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    let (first, second) = futures::join!(client.mount(), client.mount());

    assert_eq!(first.unwrap(), root());
    assert_eq!(second.unwrap(), root());
    assert_eq!(mnt_count(&transport), 1);
    assert_eq!(client.state().generation, 1);
}

#[tokio::test]
async fn concurrent_stale_root_replies_remount_once() {
    let transport = server(|call| {
        assert!(is_nfs(call, NFSProgram::NFSPROC3_GETATTR));
        let reply = GETATTR3res::Fail(nfsstat3::NFS3ERR_STALE, Void);
        Ok(success_reply(call.xid, &encode(&reply)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));
    client.mount().await.unwrap();

    let args = GETATTR3args { object: root() };
    let (first, second) = futures::join!(client.getattr(&args), client.getattr(&args));

    assert!(matches!(first, Err(Error::StaleHandle { .. })), "{first:?}");
    assert!(matches!(second, Err(Error::StaleHandle { .. })), "{second:?}");
    assert_eq!(transport.count(nfs3::PROGRAM, NFSProgram::NFSPROC3_GETATTR as u32), 2);
    assert_eq!(mnt_count(&transport), 2);
    assert_eq!(client.state().generation, 2);
}

#[tokio::test]
async fn stale_root_as_rename_target_remounts() {
    let transport = server(|call| {
        assert!(is_nfs(call, NFSProgram::NFSPROC3_RENAME));
        let reply = RENAME3res::Fail(nfsstat3::NFS3ERR_STALE, Default::default());
        Ok(success_reply(call.xid, &encode(&reply)))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));
    client.mount().await.unwrap();

    let args = RENAME3args {
        from: diropargs3 { dir: nfs_fh3 { data: vec![9; 16] }, name: "a".into() },
        to: diropargs3 { dir: root(), name: "b".into() },
    };
    let err = client.rename(&args).await.unwrap_err();

    assert!(matches!(err, Error::StaleHandle { procedure: "RENAME", .. }), "{err:?}");
    assert_eq!(mnt_count(&transport), 2);
    assert_eq!(client.state().generation, 2);
}

#[tokio::test]
async fn remount_runs_the_handshake_again() {
    let transport = server(|_| panic!("no NFS call expected"));
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    client.mount().await.unwrap();
    client.remount().await.unwrap();

    assert_eq!(mnt_count(&transport), 2);
    assert_eq!(client.state().generation, 2);
}

#[tokio::test]
async fn credential_swap_applies_to_later_calls() {
    let transport = server(|call| Ok(success_reply(call.xid, &getattr_ok(0))));
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));
    client.mount().await.unwrap();

    client.set_credential(Arc::new(AuthUnix::with_machine_name(
        1000,
        100,
        vec![10, 20],
        "client".to_string(),
    )));
    client.getattr(&GETATTR3args { object: root() }).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].cred_flavor, auth_flavor::AUTH_NULL);
    let last = calls.last().unwrap();
    assert_eq!(last.cred_flavor, auth_flavor::AUTH_UNIX);
    // stamp, "client", uid, gid, 2 gids
    assert_eq!(last.cred_body.len(), 4 + 4 + 8 + 4 + 4 + 4 + 8);
    assert_eq!(&last.cred_body[16..20], &1000_u32.to_be_bytes());
}

#[tokio::test]
async fn null_pings_the_nfs_service() {
    let transport = server(|call| {
        assert!(is_nfs(call, NFSProgram::NFSPROC3_NULL));
        assert!(call.args.is_empty());
        Ok(success_reply(call.xid, &[]))
    });
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    client.null().await.unwrap();

    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test]
async fn mount_null_pings_the_mount_service() {
    let transport = server(|_| panic!("no NFS call expected"));
    let client = client(transport.clone(), StaticPorts::new(MOUNT_PORT, NFS_PORT));

    client.mount_null().await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert!(is_mount(&calls[2], MountProgram::MOUNTPROC3_NULL));
    assert_eq!(calls[2].port, MOUNT_PORT);
    assert!(calls[2].args.is_empty());
}

#[test]
fn failed_results_keep_their_status() {
    let reply: GETATTR3res = Nfs3Result::Fail(nfsstat3::NFS3ERR_ACCES, Void);
    assert_eq!(reply.status(), nfsstat3::NFS3ERR_ACCES);
}
