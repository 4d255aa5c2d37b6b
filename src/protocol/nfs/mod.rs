//! Procedure tables of the programs the client calls.
//!
//! - `v3`: the NFS version 3 protocol as specified in RFC 1813, all 22
//!   procedures from NULL to COMMIT.
//!
//! - `mount`: the MOUNT protocol, which hands out the file handle of an
//!   exported directory. It is a prerequisite for using NFS as it provides
//!   the initial file handle for the mount point.
//!
//! - `portmap`: the PORTMAP protocol (also known as RPCBIND), used to find the
//!   ports the MOUNT and NFS programs listen on.

/// Declares a zero-sized marker type implementing
/// [crate::protocol::rpc::Procedure].
macro_rules! procedure {
    (
        $(#[$meta:meta])*
        $marker:ident = $name:literal, $program:path, $version:path, $procedure:expr,
        $args:ty => $reply:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $marker;

        impl $crate::protocol::rpc::Procedure for $marker {
            const PROGRAM: u32 = $program;
            const VERSION: u32 = $version;
            const PROCEDURE: u32 = $procedure as u32;
            const NAME: &'static str = $name;
            type Args = $args;
            type Reply = $reply;
        }
    };
}

pub mod mount;
pub mod portmap;
pub mod v3;
