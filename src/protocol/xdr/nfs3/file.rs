//! Module contains XDR data structures related to file operations for NFS version 3 protocol
//! as defined in RFC 1813.
//!
//! This module includes data structures for the following operations:
//! - ACCESS: Check access permission (procedure 4)
//! - READLINK: Read from a symbolic link (procedure 5)
//! - READ: Read data from a file (procedure 6)
//! - WRITE: Write data to a file (procedure 7)
//! - LINK: Create a hard link (procedure 15)
//! - COMMIT: Commit asynchronously written data to stable storage (procedure 21)

// Type names follow RFC 1813 (e.g. READ3args, COMMIT3resok)
#![allow(non_camel_case_types)]

use bytes::Bytes;
use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// Arguments for the ACCESS procedure (procedure 4) as defined in RFC 1813 section 3.3.4
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ACCESS3args {
    /// File handle for the object to check
    pub object: nfs_fh3,
    /// Bit mask of ACCESS3_* permissions to check
    pub access: u32,
}
DeserializeStruct!(ACCESS3args, object, access);
SerializeStruct!(ACCESS3args, object, access);

/// Successful response for the ACCESS procedure
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ACCESS3resok {
    pub obj_attributes: post_op_attr,
    /// Subset of the requested permissions that the server grants
    pub access: u32,
}
DeserializeStruct!(ACCESS3resok, obj_attributes, access);
SerializeStruct!(ACCESS3resok, obj_attributes, access);

pub type ACCESS3res = Nfs3Result<ACCESS3resok, post_op_attr>;

/// Arguments for the READLINK procedure (procedure 5)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READLINK3args {
    pub symlink: nfs_fh3,
}
DeserializeStruct!(READLINK3args, symlink);
SerializeStruct!(READLINK3args, symlink);

/// Successful response for the READLINK procedure
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READLINK3resok {
    pub symlink_attributes: post_op_attr,
    /// Contents of the symbolic link
    pub data: nfspath3,
}
DeserializeStruct!(READLINK3resok, symlink_attributes, data);
SerializeStruct!(READLINK3resok, symlink_attributes, data);

pub type READLINK3res = Nfs3Result<READLINK3resok, post_op_attr>;

/// Arguments for the READ procedure (procedure 6) as defined in RFC 1813 section 3.3.6
/// Used to read data from a regular file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READ3args {
    /// File handle for the file to be read
    pub file: nfs_fh3,
    /// Position within the file to begin reading
    pub offset: offset3,
    /// Number of bytes of data to read
    pub count: count3,
}
DeserializeStruct!(READ3args, file, offset, count);
SerializeStruct!(READ3args, file, offset, count);

/// Successful response for the READ procedure as defined in RFC 1813 section 3.3.6
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READ3resok {
    /// File attributes after the operation
    pub file_attributes: post_op_attr,
    /// Number of bytes actually read
    pub count: count3,
    /// True if the end of file was reached
    pub eof: bool,
    /// The data read from the file
    pub data: Vec<u8>,
}
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);
SerializeStruct!(READ3resok, file_attributes, count, eof, data);

pub type READ3res = Nfs3Result<READ3resok, post_op_attr>;

/// Arguments for the COMMIT procedure (procedure 21) as defined in RFC 1813 section 3.3.21
/// Used to commit pending writes to stable storage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct COMMIT3args {
    /// File handle for the file to commit
    pub file: nfs_fh3,
    /// Position within the file to start committing
    pub offset: offset3,
    /// Number of bytes to commit; 0 commits to the end of the file
    pub count: count3,
}
DeserializeStruct!(COMMIT3args, file, offset, count);
SerializeStruct!(COMMIT3args, file, offset, count);

/// Successful response for the COMMIT procedure as defined in RFC 1813 section 3.3.21
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct COMMIT3resok {
    /// File attributes before and after the operation
    pub file_wcc: wcc_data,
    /// Write verifier to detect server restarts
    pub verf: writeverf3,
}
DeserializeStruct!(COMMIT3resok, file_wcc, verf);
SerializeStruct!(COMMIT3resok, file_wcc, verf);

pub type COMMIT3res = Nfs3Result<COMMIT3resok, wcc_data>;

/// Arguments for the LINK procedure (procedure 15) as defined in RFC 1813 section 3.3.15
/// Used to create a hard link to a file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LINK3args {
    /// File handle for the target file
    pub file: nfs_fh3,
    /// Directory and name for the new link
    pub link: diropargs3,
}
DeserializeStruct!(LINK3args, file, link);
SerializeStruct!(LINK3args, file, link);

/// Response body of the LINK procedure, identical on success and failure
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LINK3resok {
    pub file_attributes: post_op_attr,
    pub linkdir_wcc: wcc_data,
}
DeserializeStruct!(LINK3resok, file_attributes, linkdir_wcc);
SerializeStruct!(LINK3resok, file_attributes, linkdir_wcc);

pub type LINK3res = Nfs3Result<LINK3resok, LINK3resok>;

/// Enumeration specifying how data should be written to storage
/// as defined in RFC 1813 section 3.3.7
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    /// Data may be buffered before writing to stable storage
    /// The server may return before the data is committed to stable storage
    #[default]
    UNSTABLE = 0,
    /// Data must be committed to stable storage before returning
    /// Only the data for this request is guaranteed to be committed
    DATA_SYNC = 1,
    /// All file system data must be committed to stable storage before returning
    /// This includes the data and all metadata for this request
    FILE_SYNC = 2,
}
impl SerializeEnum for stable_how {}
impl DeserializeEnum for stable_how {}

/// Arguments for the WRITE procedure (procedure 7) as defined in RFC 1813 section 3.3.7
///
/// `data` is reference counted and travels as a zero-copy payload segment
/// after the fixed part of the call. The encoding is therefore provided by the
/// procedure layer rather than by [Serialize].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WRITE3args {
    /// File handle for the file to write
    pub file: nfs_fh3,
    /// Position within the file to begin writing
    pub offset: offset3,
    /// Number of bytes of data to write
    pub count: count3,
    /// How to commit the data to storage
    pub stable: stable_how,
    /// The data to be written
    pub data: Bytes,
}

impl WRITE3args {
    /// Builds arguments whose `count` matches the length of `data`.
    pub fn new(file: nfs_fh3, offset: offset3, stable: stable_how, data: Bytes) -> Self {
        let count = data.len() as count3;
        WRITE3args { file, offset, count, stable, data }
    }
}

/// Successful response for the WRITE procedure as defined in RFC 1813 section 3.3.7
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WRITE3resok {
    /// File attributes before and after the operation
    pub file_wcc: wcc_data,
    /// Number of bytes actually written
    pub count: count3,
    /// How the data was committed to stable storage
    pub committed: stable_how,
    /// Write verifier to detect server restarts
    pub verf: writeverf3,
}
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

pub type WRITE3res = Nfs3Result<WRITE3resok, wcc_data>;
