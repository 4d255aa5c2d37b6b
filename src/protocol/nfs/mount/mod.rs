//! MOUNT protocol procedures for NFS version 3 as specified in RFC 1813 section 5.0.
//! https://datatracker.ietf.org/doc/html/rfc1813#section-5.0
//!
//! Only the procedures a client needs to obtain a root file handle are
//! declared: MNT hands it out, UMNT releases the server's mount entry.

use crate::protocol::xdr::mount::{self, dirpath, mountres3, MountProgram};
use crate::protocol::xdr::Void;

procedure!(
    /// MOUNTPROC3_NULL: does nothing; checks that the service answers.
    MountNull = "MOUNT NULL", mount::PROGRAM, mount::VERSION, MountProgram::MOUNTPROC3_NULL,
    Void => Void
);

procedure!(
    /// MOUNTPROC3_MNT: maps an export path to its root file handle.
    Mnt = "MNT", mount::PROGRAM, mount::VERSION, MountProgram::MOUNTPROC3_MNT,
    dirpath => mountres3
);

procedure!(
    /// MOUNTPROC3_UMNT: removes the mount entry of an export path.
    Umnt = "UMNT", mount::PROGRAM, mount::VERSION, MountProgram::MOUNTPROC3_UMNT,
    dirpath => Void
);
