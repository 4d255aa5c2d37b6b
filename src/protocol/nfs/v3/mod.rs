//! NFS version 3 procedures as specified in RFC 1813 section 3.3.
//! https://datatracker.ietf.org/doc/html/rfc1813#section-3.3
//!
//! Every procedure is a marker type for [crate::protocol::rpc::Procedure].
//! The reply of every procedure except NULL is an [Nfs3Result]; its status
//! is checked by the session after the call.

use smallvec::{smallvec, SmallVec};

use crate::protocol::xdr::nfs3::dir::*;
use crate::protocol::xdr::nfs3::file::*;
use crate::protocol::xdr::nfs3::fs::*;
use crate::protocol::xdr::nfs3::{self, *};
use crate::protocol::xdr::Void;

macro_rules! nfs3_procedure {
    ($(#[$meta:meta])* $marker:ident = $name:literal, $procedure:ident, $args:ty => $reply:ty) => {
        procedure!(
            $(#[$meta])*
            $marker = $name, nfs3::PROGRAM, nfs3::VERSION, NFSProgram::$procedure,
            $args => $reply
        );
    };
}

nfs3_procedure!(
    /// Does nothing; checks that the NFS service answers.
    Null = "NULL", NFSPROC3_NULL, Void => Void
);
nfs3_procedure!(GetAttr = "GETATTR", NFSPROC3_GETATTR, GETATTR3args => GETATTR3res);
nfs3_procedure!(SetAttr = "SETATTR", NFSPROC3_SETATTR, SETATTR3args => SETATTR3res);
nfs3_procedure!(Lookup = "LOOKUP", NFSPROC3_LOOKUP, LOOKUP3args => LOOKUP3res);
nfs3_procedure!(Access = "ACCESS", NFSPROC3_ACCESS, ACCESS3args => ACCESS3res);
nfs3_procedure!(ReadLink = "READLINK", NFSPROC3_READLINK, READLINK3args => READLINK3res);
nfs3_procedure!(Read = "READ", NFSPROC3_READ, READ3args => READ3res);
nfs3_procedure!(
    /// The data travels as a zero-copy payload, see `Marshal for WRITE3args`.
    Write = "WRITE", NFSPROC3_WRITE, WRITE3args => WRITE3res
);
nfs3_procedure!(Create = "CREATE", NFSPROC3_CREATE, CREATE3args => CREATE3res);
nfs3_procedure!(MkDir = "MKDIR", NFSPROC3_MKDIR, MKDIR3args => MKDIR3res);
nfs3_procedure!(SymLink = "SYMLINK", NFSPROC3_SYMLINK, SYMLINK3args => SYMLINK3res);
nfs3_procedure!(MkNod = "MKNOD", NFSPROC3_MKNOD, MKNOD3args => MKNOD3res);
nfs3_procedure!(Remove = "REMOVE", NFSPROC3_REMOVE, REMOVE3args => REMOVE3res);
nfs3_procedure!(RmDir = "RMDIR", NFSPROC3_RMDIR, RMDIR3args => RMDIR3res);
nfs3_procedure!(Rename = "RENAME", NFSPROC3_RENAME, RENAME3args => RENAME3res);
nfs3_procedure!(Link = "LINK", NFSPROC3_LINK, LINK3args => LINK3res);
nfs3_procedure!(ReadDir = "READDIR", NFSPROC3_READDIR, READDIR3args => READDIR3res);
nfs3_procedure!(
    ReadDirPlus = "READDIRPLUS", NFSPROC3_READDIRPLUS, READDIRPLUS3args => READDIRPLUS3res
);
nfs3_procedure!(FsStat = "FSSTAT", NFSPROC3_FSSTAT, FSSTAT3args => FSSTAT3res);
nfs3_procedure!(FsInfo = "FSINFO", NFSPROC3_FSINFO, FSINFO3args => FSINFO3res);
nfs3_procedure!(PathConf = "PATHCONF", NFSPROC3_PATHCONF, PATHCONF3args => PATHCONF3res);
nfs3_procedure!(Commit = "COMMIT", NFSPROC3_COMMIT, COMMIT3args => COMMIT3res);

/// Arguments that name the objects a procedure operates on.
///
/// A STALE or BADHANDLE status may refer to any of these handles; the session
/// compares them with the root handle to decide whether the mount has gone
/// stale.
pub trait HandleArgs {
    /// Handle the call is routed by.
    fn file_handle(&self) -> &nfs_fh3;

    /// Every handle in the arguments, [HandleArgs::file_handle] first.
    fn file_handles(&self) -> SmallVec<[&nfs_fh3; 2]> {
        smallvec![self.file_handle()]
    }
}

macro_rules! handle_args {
    ($($args:ty => $($field:ident).+;)+) => {
        $(
            impl HandleArgs for $args {
                fn file_handle(&self) -> &nfs_fh3 {
                    &self.$($field).+
                }
            }
        )+
    };
}

handle_args! {
    GETATTR3args => object;
    SETATTR3args => object;
    LOOKUP3args => what.dir;
    ACCESS3args => object;
    READLINK3args => symlink;
    READ3args => file;
    WRITE3args => file;
    CREATE3args => dirops.dir;
    MKDIR3args => dirops.dir;
    SYMLINK3args => dirops.dir;
    MKNOD3args => where_dir.dir;
    REMOVE3args => object.dir;
    READDIR3args => dir;
    READDIRPLUS3args => dir;
    COMMIT3args => file;
}

impl HandleArgs for RENAME3args {
    fn file_handle(&self) -> &nfs_fh3 {
        &self.from.dir
    }

    fn file_handles(&self) -> SmallVec<[&nfs_fh3; 2]> {
        smallvec![&self.from.dir, &self.to.dir]
    }
}

impl HandleArgs for LINK3args {
    fn file_handle(&self) -> &nfs_fh3 {
        &self.file
    }

    fn file_handles(&self) -> SmallVec<[&nfs_fh3; 2]> {
        smallvec![&self.file, &self.link.dir]
    }
}
