//! Module contains XDR data structures related to directories for NFS version 3 protocol
//! as defined in RFC 1813.
//!
//! This module includes data structures for the following directory operations:
//! - LOOKUP: Look up a file name (procedure 3)
//! - CREATE: Create a regular file (procedure 8)
//! - MKDIR: Create a directory (procedure 9)
//! - SYMLINK: Create a symbolic link (procedure 10)
//! - MKNOD: Create a special device (procedure 11)
//! - REMOVE / RMDIR: Remove a file or a directory (procedures 12 and 13)
//! - RENAME: Rename a file or directory (procedure 14)
//! - READDIR: Read from a directory (procedure 16)
//! - READDIRPLUS: Extended read from a directory (procedure 17)

// Type names follow RFC 1813 (e.g. READDIR3args, MKDIR3resok)
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;
use crate::protocol::xdr::{deserialize_list, serialize_list};

/// Arguments for the LOOKUP procedure (procedure 3)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LOOKUP3args {
    /// Directory to search and the name to look up
    pub what: diropargs3,
}
DeserializeStruct!(LOOKUP3args, what);
SerializeStruct!(LOOKUP3args, what);

/// Successful response for the LOOKUP procedure
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LOOKUP3resok {
    /// File handle of the object found
    pub object: nfs_fh3,
    pub obj_attributes: post_op_attr,
    pub dir_attributes: post_op_attr,
}
DeserializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);
SerializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);

pub type LOOKUP3res = Nfs3Result<LOOKUP3resok, post_op_attr>;

/// How CREATE should treat an existing file of the same name.
///
/// ```text
/// union createhow3 switch (createmode3 mode) {
///     case UNCHECKED:
///     case GUARDED:   sattr3 obj_attributes;
///     case EXCLUSIVE: createverf3 verf;
/// };
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum createhow3 {
    UNCHECKED(sattr3),
    GUARDED(sattr3),
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> Self {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow3::UNCHECKED(attr) => {
                createmode3::UNCHECKED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::GUARDED(attr) => {
                createmode3::GUARDED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::EXCLUSIVE(verf) => {
                createmode3::EXCLUSIVE.serialize(dest)?;
                verf.serialize(dest)
            }
        }
    }
}

impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<createmode3>(src)? {
            createmode3::UNCHECKED => createhow3::UNCHECKED(deserialize(src)?),
            createmode3::GUARDED => createhow3::GUARDED(deserialize(src)?),
            createmode3::EXCLUSIVE => createhow3::EXCLUSIVE(deserialize(src)?),
        };
        Ok(())
    }
}

/// Arguments for the CREATE procedure (procedure 8)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CREATE3args {
    /// Directory where the file should be created and its name
    pub dirops: diropargs3,
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, dirops, how);
SerializeStruct!(CREATE3args, dirops, how);

/// Successful response shared by CREATE, MKDIR, SYMLINK and MKNOD
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DIROP3resok {
    /// Handle of the new object; servers may omit it
    pub obj: post_op_fh3,
    pub obj_attributes: post_op_attr,
    /// Attributes of the parent directory before and after the operation
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(DIROP3resok, obj, obj_attributes, dir_wcc);
SerializeStruct!(DIROP3resok, obj, obj_attributes, dir_wcc);

pub type CREATE3resok = DIROP3resok;
pub type CREATE3res = Nfs3Result<DIROP3resok, wcc_data>;

/// Arguments for the MKDIR procedure (procedure 9)
/// as defined in RFC 1813 section 3.3.9
/// Used to create a new directory
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MKDIR3args {
    /// Directory where new directory should be created and its name
    pub dirops: diropargs3,
    /// Initial attributes for the new directory
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

pub type MKDIR3resok = DIROP3resok;
pub type MKDIR3res = Nfs3Result<DIROP3resok, wcc_data>;

/// Arguments for the SYMLINK procedure (procedure 10)
/// as defined in RFC 1813 section 3.3.10
/// Used to create a symbolic link
#[derive(Clone, Debug, Default)]
pub struct SYMLINK3args {
    /// Directory where symbolic link should be created and its name
    pub dirops: diropargs3,
    /// Target path and attributes for the symbolic link
    pub symlink: symlinkdata3,
}
DeserializeStruct!(SYMLINK3args, dirops, symlink);
SerializeStruct!(SYMLINK3args, dirops, symlink);

pub type SYMLINK3resok = DIROP3resok;
pub type SYMLINK3res = Nfs3Result<DIROP3resok, wcc_data>;

/// Device data for character and block special files
/// as defined in RFC 1813 section 3.3.11
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct devicedata3 {
    pub dev_attributes: sattr3,
    /// Major and minor device numbers
    pub spec: specdata3,
}
DeserializeStruct!(devicedata3, dev_attributes, spec);
SerializeStruct!(devicedata3, dev_attributes, spec);

/// Type-dependent data for MKNOD:
///
/// ```text
/// union mknoddata3 switch (ftype3 type) {
///     case NF3CHR:
///     case NF3BLK:  devicedata3 device;
///     case NF3SOCK:
///     case NF3FIFO: sattr3 pipe_attributes;
///     default:      void;
/// };
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum mknoddata3 {
    Chr(devicedata3),
    Blk(devicedata3),
    Sock(sattr3),
    Fifo(sattr3),
    /// Any other file type; servers reject it with NFS3ERR_BADTYPE
    Other(ftype3),
}

impl Default for mknoddata3 {
    fn default() -> Self {
        mknoddata3::Fifo(sattr3::default())
    }
}

impl Serialize for mknoddata3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            mknoddata3::Chr(device) => {
                ftype3::NF3CHR.serialize(dest)?;
                device.serialize(dest)
            }
            mknoddata3::Blk(device) => {
                ftype3::NF3BLK.serialize(dest)?;
                device.serialize(dest)
            }
            mknoddata3::Sock(attr) => {
                ftype3::NF3SOCK.serialize(dest)?;
                attr.serialize(dest)
            }
            mknoddata3::Fifo(attr) => {
                ftype3::NF3FIFO.serialize(dest)?;
                attr.serialize(dest)
            }
            mknoddata3::Other(ftype) => ftype.serialize(dest),
        }
    }
}

impl Deserialize for mknoddata3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<ftype3>(src)? {
            ftype3::NF3CHR => mknoddata3::Chr(deserialize(src)?),
            ftype3::NF3BLK => mknoddata3::Blk(deserialize(src)?),
            ftype3::NF3SOCK => mknoddata3::Sock(deserialize(src)?),
            ftype3::NF3FIFO => mknoddata3::Fifo(deserialize(src)?),
            other => mknoddata3::Other(other),
        };
        Ok(())
    }
}

/// Arguments for the MKNOD procedure (procedure 11)
/// as defined in RFC 1813 section 3.3.11
/// Used to create a special device file, FIFO, or socket
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MKNOD3args {
    /// Directory where the special file should be created and its name
    pub where_dir: diropargs3,
    /// Type and device information for the special file
    pub what: mknoddata3,
}
DeserializeStruct!(MKNOD3args, where_dir, what);
SerializeStruct!(MKNOD3args, where_dir, what);

pub type MKNOD3resok = DIROP3resok;
pub type MKNOD3res = Nfs3Result<DIROP3resok, wcc_data>;

/// Arguments for the REMOVE and RMDIR procedures (procedures 12 and 13)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct REMOVE3args {
    pub object: diropargs3,
}
DeserializeStruct!(REMOVE3args, object);
SerializeStruct!(REMOVE3args, object);

pub type RMDIR3args = REMOVE3args;

/// Response body of REMOVE and RMDIR, identical on success and failure
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct REMOVE3resok {
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(REMOVE3resok, dir_wcc);
SerializeStruct!(REMOVE3resok, dir_wcc);

pub type REMOVE3res = Nfs3Result<REMOVE3resok, wcc_data>;
pub type RMDIR3resok = REMOVE3resok;
pub type RMDIR3res = Nfs3Result<REMOVE3resok, wcc_data>;

/// Arguments for the RENAME procedure (procedure 14)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RENAME3args {
    pub from: diropargs3,
    pub to: diropargs3,
}
DeserializeStruct!(RENAME3args, from, to);
SerializeStruct!(RENAME3args, from, to);

/// Response body of RENAME, identical on success and failure
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RENAME3resok {
    pub fromdir_wcc: wcc_data,
    pub todir_wcc: wcc_data,
}
DeserializeStruct!(RENAME3resok, fromdir_wcc, todir_wcc);
SerializeStruct!(RENAME3resok, fromdir_wcc, todir_wcc);

pub type RENAME3res = Nfs3Result<RENAME3resok, RENAME3resok>;

/// Directory entry returned by READDIR operation
/// as defined in RFC 1813 section 3.3.16
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct entry3 {
    /// File identifier (inode number)
    pub fileid: fileid3,
    /// Name of the directory entry
    pub name: filename3,
    /// Cookie for the next READDIR operation
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

/// Arguments for the READDIR procedure (procedure 16)
/// as defined in RFC 1813 section 3.3.16
/// Used to read entries from a directory. The server returns a variable number of directory entries,
/// up to the specified count limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIR3args {
    /// File handle for the directory to be read
    pub dir: nfs_fh3,
    /// Cookie indicating where to start reading directory entries
    /// A cookie value of 0 means start at beginning of directory
    pub cookie: cookie3,
    /// Cookie verifier to detect whether directory has changed
    pub cookieverf: cookieverf3,
    /// Maximum number of bytes of directory information to return
    pub count: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, count);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, count);

/// One batch of directory entries. On the wire the entries form an XDR
/// linked list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct dirlist3 {
    pub entries: Vec<entry3>,
    /// True if the last entry of the directory is in this batch
    pub eof: bool,
}

impl Serialize for dirlist3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        serialize_list(&self.entries, dest)?;
        self.eof.serialize(dest)
    }
}

impl Deserialize for dirlist3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.entries = deserialize_list(src)?;
        self.eof = deserialize(src)?;
        Ok(())
    }
}

/// Successful response for the READDIR procedure
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIR3resok {
    pub dir_attributes: post_op_attr,
    /// Verifier to pass with the next READDIR of this directory
    pub cookieverf: cookieverf3,
    pub reply: dirlist3,
}
DeserializeStruct!(READDIR3resok, dir_attributes, cookieverf, reply);
SerializeStruct!(READDIR3resok, dir_attributes, cookieverf, reply);

pub type READDIR3res = Nfs3Result<READDIR3resok, post_op_attr>;

/// Directory entry with additional attributes for READDIRPLUS operation
/// as defined in RFC 1813 section 3.3.17
/// This structure represents a single directory entry with extended information
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct entryplus3 {
    /// File identifier (inode number) uniquely identifying the file within the filesystem
    pub fileid: fileid3,
    /// Name of the directory entry (filename)
    pub name: filename3,
    /// Cookie value that can be used in subsequent READDIRPLUS calls to resume listing
    pub cookie: cookie3,
    /// File attributes for this directory entry
    pub name_attributes: post_op_attr,
    /// File handle for this directory entry
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// Arguments for the READDIRPLUS procedure (procedure 17)
/// as defined in RFC 1813 section 3.3.17
/// READDIRPLUS returns directory entries along with their attributes and file handles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIRPLUS3args {
    /// Directory file handle
    pub dir: nfs_fh3,
    /// Cookie from previous READDIRPLUS - where to start reading
    pub cookie: cookie3,
    /// Cookie verifier to detect changed directories
    pub cookieverf: cookieverf3,
    /// Maximum number of bytes of directory information to return
    pub dircount: count3,
    /// Maximum number of bytes of attribute information to return
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);

/// One batch of READDIRPLUS entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct dirlistplus3 {
    pub entries: Vec<entryplus3>,
    pub eof: bool,
}

impl Serialize for dirlistplus3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        serialize_list(&self.entries, dest)?;
        self.eof.serialize(dest)
    }
}

impl Deserialize for dirlistplus3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.entries = deserialize_list(src)?;
        self.eof = deserialize(src)?;
        Ok(())
    }
}

/// Successful response for the READDIRPLUS procedure
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIRPLUS3resok {
    pub dir_attributes: post_op_attr,
    pub cookieverf: cookieverf3,
    pub reply: dirlistplus3,
}
DeserializeStruct!(READDIRPLUS3resok, dir_attributes, cookieverf, reply);
SerializeStruct!(READDIRPLUS3resok, dir_attributes, cookieverf, reply);

pub type READDIRPLUS3res = Nfs3Result<READDIRPLUS3resok, post_op_attr>;
