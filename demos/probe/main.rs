use std::sync::Arc;

use anyhow::{bail, Context};

use nfs_mamont_client::protocol::rpc::AuthUnix;
use nfs_mamont_client::xdr::nfs3::GETATTR3args;
use nfs_mamont_client::{ClientConfig, Nfs3Client};

/// Mounts `server:/export`, then prints the root attributes and FSINFO.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let mut use_privileged_port = false;
    let mut uid = 0;
    let mut gid = 0;
    let mut target: Option<String> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--privileged-port" => use_privileged_port = true,
            "--uid" => uid = args.next().context("--uid needs a value")?.parse()?,
            "--gid" => gid = args.next().context("--gid needs a value")?.parse()?,
            "--help" | "-h" => {
                eprintln!(
                    "Usage: probe [--privileged-port] [--uid UID] [--gid GID] <SERVER>:<EXPORT>\n\
                     \n\
                     Options:\n\
                       --privileged-port  Send every call from a source port below 1024\n\
                       --uid, --gid       AUTH_UNIX identity (default: 0)\n\
                       -h, --help         Show this help and exit"
                );
                return Ok(());
            }
            _ if target.is_none() => target = Some(arg),
            _ => bail!("unexpected argument {arg:?}"),
        }
    }

    let target = target.context("missing <SERVER>:<EXPORT>")?;
    let Some((server, export)) = target.split_once(':') else {
        bail!("expected <SERVER>:<EXPORT>, got {target:?}");
    };

    let config = ClientConfig::new(server, export).with_privileged_port(use_privileged_port);
    let credential = Arc::new(AuthUnix::new(uid, gid, vec![gid]));
    let client = Nfs3Client::connect(config, credential)
        .await
        .with_context(|| format!("mounting {target}"))?;

    let root = client.root_handle().await?;
    println!("root handle: {:02x?}", root.data);
    println!("auth flavors: {:?}", client.state().auth_flavors);

    let attrs = client.getattr(&GETATTR3args { object: root.clone() }).await?;
    println!("root attributes: {:#?}", attrs.obj_attributes);

    let info = client.fsinfo(&GETATTR3args { object: root }).await?;
    println!(
        "read max {} pref {}, write max {} pref {}, max file size {}",
        info.rtmax, info.rtpref, info.wtmax, info.wtpref, info.maxfilesize
    );
    Ok(())
}
