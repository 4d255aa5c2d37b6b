use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

mod support;

use tokio::time::Instant;

use nfs_mamont_client::protocol::nfs::portmap::GetPort;
use nfs_mamont_client::protocol::rpc::{
    accept_any, AuthNone, AuthUnix, Procedure, RpcDispatcher, RpcRequest,
};
use nfs_mamont_client::xdr::portmap::mapping;
use nfs_mamont_client::xdr::rpc::{accept_body, auth_flavor};
use nfs_mamont_client::{Error, RetryPolicy};

use support::{auth_error, MockTransport, NoDiscovery, Scripted, StaticDiscovery};

const ARGS: mapping = mapping { prog: 100003, vers: 3, prot: 6, port: 0 };

async fn dispatcher(transport: Arc<MockTransport>) -> RpcDispatcher {
    let dispatcher = RpcDispatcher::new(
        "filer",
        transport,
        Arc::new(NoDiscovery),
        RetryPolicy::default(),
        Duration::from_secs(5),
    );
    dispatcher.set_port(111).await;
    dispatcher
}

#[tokio::test(start_paused = true)]
async fn network_failures_stop_after_three_attempts() {
    let transport = MockTransport::new(|_| Err(support::network_error()));
    let dispatcher = dispatcher(transport.clone()).await;

    let started = Instant::now();
    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let err = dispatcher.call_with_retry(&request, accept_any).await.unwrap_err();

    assert!(matches!(err, Error::Network { procedure: "GETPORT", .. }), "{err:?}");
    assert_eq!(transport.calls().len(), 3);
    // base * 1 after the first failure, base * 2 after the second
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_third_attempt_after_two_backoffs() {
    let transport = MockTransport::scripted(vec![
        Scripted::NetworkError,
        Scripted::NetworkError,
        Scripted::success(&2049_u32),
    ]);
    let dispatcher = dispatcher(transport.clone()).await;

    let started = Instant::now();
    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let port = dispatcher.call_with_retry(&request, accept_any).await.unwrap();

    assert_eq!(port, 2049);
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|call| call.xid == request.xid), "retries reuse the xid");
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn reply_to_another_xid_is_retried() {
    let transport = MockTransport::scripted(vec![
        Scripted::WrongXid(support::encode(&1_u32)),
        Scripted::success(&2049_u32),
    ]);
    let dispatcher = dispatcher(transport.clone()).await;

    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let port = dispatcher.call_with_retry(&request, accept_any).await.unwrap();

    assert_eq!(port, 2049);
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn auth_rejection_escalates_to_a_privileged_port_once() {
    let transport = MockTransport::scripted(vec![
        auth_error(),
        Scripted::success(&2049_u32),
        Scripted::success(&2049_u32),
    ]);
    let dispatcher = dispatcher(transport.clone()).await;
    let credential = Arc::new(AuthUnix::with_machine_name(0, 0, vec![], "client".to_string()));

    let request = RpcRequest::<GetPort>::new(&ARGS, credential.clone());
    assert_eq!(dispatcher.call_with_retry(&request, accept_any).await.unwrap(), 2049);
    assert!(dispatcher.uses_privileged_port(GetPort::PROCEDURE));

    // the escalation sticks for later calls of the same procedure
    let request = RpcRequest::<GetPort>::new(&ARGS, credential);
    dispatcher.call_with_retry(&request, accept_any).await.unwrap();

    let privileged: Vec<bool> = transport.calls().iter().map(|call| call.privileged).collect();
    assert_eq!(privileged, vec![false, true, true]);
    assert!(transport.calls().iter().all(|call| call.cred_flavor == auth_flavor::AUTH_UNIX));
}

#[tokio::test]
async fn auth_rejection_on_a_privileged_port_is_final() {
    let transport = MockTransport::scripted(vec![auth_error(), auth_error()]);
    let dispatcher = dispatcher(transport.clone()).await;

    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let err = dispatcher.call_with_retry(&request, accept_any).await.unwrap_err();

    assert!(matches!(err, Error::AuthRejected { .. }), "{err:?}");
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn accepted_failures_are_not_retried() {
    let transport = MockTransport::scripted(vec![Scripted::Accepted(accept_body::PROC_UNAVAIL)]);
    let dispatcher = dispatcher(transport.clone()).await;

    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let err = dispatcher.call_with_retry(&request, accept_any).await.unwrap_err();

    assert!(
        matches!(err, Error::RpcAcceptedFailure { status: accept_body::PROC_UNAVAIL, .. }),
        "{err:?}"
    );
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn validation_failure_ends_the_call() {
    let transport = MockTransport::scripted(vec![Scripted::success(&0_u32)]);
    let dispatcher = dispatcher(transport.clone()).await;

    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    let err = dispatcher
        .call_with_retry(&request, |args: &mapping, port: &u32| {
            assert_eq!(args.prog, 100003);
            if *port == 0 {
                return Err(Error::MalformedMessage("no port".to_string()));
            }
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedMessage(_)), "{err:?}");
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn calls_go_to_the_server_name_without_addresses() {
    let transport = MockTransport::scripted(vec![Scripted::success(&2049_u32)]);
    let dispatcher = dispatcher(transport.clone()).await;

    let request = RpcRequest::<GetPort>::new(&ARGS, Arc::new(AuthNone));
    dispatcher.call_with_retry(&request, accept_any).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].host, "filer");
    assert_eq!(calls[0].port, 111);
    assert_eq!(calls[0].program, 100000);
    assert_eq!(calls[0].decode_args::<mapping>(), ARGS);
}

#[tokio::test]
async fn address_choice_depends_only_on_the_key() {
    let addrs: Vec<IpAddr> = (1..=3).map(|last| IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))).collect();
    let dispatcher = RpcDispatcher::new(
        "filer",
        MockTransport::new(|_| Err(support::network_error())),
        Arc::new(StaticDiscovery(addrs.clone())),
        RetryPolicy::default(),
        Duration::from_secs(5),
    );
    dispatcher.set_port(2049).await;

    for key in [0_u64, 7, 42, u64::MAX] {
        let first = dispatcher.choose_ip(key).unwrap();
        assert_eq!(first, dispatcher.choose_ip(key).unwrap());
        assert!(addrs.iter().any(|addr| addr.to_string() == first));
    }
}

#[tokio::test]
async fn no_server_and_no_addresses_is_no_route() {
    let dispatcher = RpcDispatcher::new(
        "",
        MockTransport::new(|_| Err(support::network_error())),
        Arc::new(NoDiscovery),
        RetryPolicy::default(),
        Duration::from_secs(5),
    );
    dispatcher.set_port(2049).await;

    assert!(matches!(dispatcher.choose_ip(1), Err(Error::NoRouteAvailable { .. })));
}
