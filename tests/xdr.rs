use std::fmt::Debug;

use bytes::Bytes;

use nfs_mamont_client::xdr::mount::{mountres3, mountres3_ok, mountstat3};
use nfs_mamont_client::xdr::nfs3::{nfs_fh3, post_op_attr, sattr3, set_mode3};
use nfs_mamont_client::xdr::{deserialize, Deserialize, Serialize, XdrBuffer};
use nfs_mamont_client::Error;

trait TestValue: Deserialize + Serialize + PartialEq + Default + Debug {}
impl<T: Deserialize + Serialize + PartialEq + Default + Debug> TestValue for T {}

/// Encodes `value` after aligned prefixes of several lengths and decodes it
/// back, both through the io traits and through [XdrBuffer].
fn check<T: TestValue>(value: &T) {
    for prefix in (0..32).step_by(4) {
        let mut buf = XdrBuffer::default();
        for _ in 0..prefix / 4 {
            buf.put_u32(0xdead_beef).unwrap();
        }
        buf.put(value).unwrap();
        assert_eq!(buf.position() % 4, 0, "{value:?} left the cursor unaligned");

        buf.set_position(prefix).unwrap();
        assert_eq!(&buf.get::<T>().unwrap(), value);
        assert_eq!(buf.remaining(), 0);

        let decoded: T = deserialize(&mut &buf.as_slice()[prefix..]).unwrap();
        assert_eq!(&decoded, value);
    }
}

#[test]
fn scalars_round_trip() {
    for value in [true, false] {
        check(&value);
    }
    for value in [i32::MIN, -1, 0, 1, i32::MAX] {
        check(&value);
    }
    for value in [i64::MIN, -1, 0, 1, i64::MAX] {
        check(&value);
    }
    for value in [0_u32, 1, u32::MAX] {
        check(&value);
    }
    for value in [0_u64, 1, u64::MAX] {
        check(&value);
    }
}

#[test]
fn floats_use_ieee_big_endian() {
    let mut buf = XdrBuffer::default();
    buf.put_f32(1.5).unwrap();
    buf.put_f64(-2.25).unwrap();
    assert_eq!(&buf.as_slice()[..4], &1.5_f32.to_be_bytes());
    assert_eq!(&buf.as_slice()[4..], &(-2.25_f64).to_be_bytes());

    buf.reset();
    assert_eq!(buf.get_f32().unwrap(), 1.5);
    assert_eq!(buf.get_f64().unwrap(), -2.25);
}

#[test]
fn opaque_of_every_length_round_trips_aligned() {
    for len in 0..=33_usize {
        let data: Vec<u8> = (0..len).map(|byte| byte as u8 ^ 0x5a).collect();
        let mut buf = XdrBuffer::default();
        buf.put_opaque(&data).unwrap();
        assert_eq!(buf.position(), 4 + len.div_ceil(4) * 4);

        buf.reset();
        assert_eq!(buf.get_opaque().unwrap(), data);
        assert_eq!(buf.position() % 4, 0);
        assert_eq!(buf.remaining(), 0);
    }
}

#[test]
fn strings_round_trip_including_empty() {
    for value in ["", "a", "abc", "abcd", "export/dir", "\u{43f}\u{440}\u{438}\u{432}\u{435}\u{442}"] {
        let mut buf = XdrBuffer::default();
        buf.put_string(value).unwrap();
        buf.reset();
        assert_eq!(buf.get_string().unwrap(), value);
        assert_eq!(buf.position() % 4, 0);
    }

    let mut empty = XdrBuffer::default();
    empty.put_string("").unwrap();
    assert_eq!(empty.as_slice(), &[0, 0, 0, 0]);
}

#[test]
fn invalid_utf8_is_malformed() {
    let mut buf = XdrBuffer::default();
    buf.put_opaque(&[0xff, 0xfe]).unwrap();
    buf.reset();
    assert!(matches!(buf.get_string(), Err(Error::MalformedMessage(_))));
}

#[test]
fn truncated_opaque_is_malformed() {
    let mut buf = XdrBuffer::from_bytes(vec![0, 0, 0, 8, 1, 2, 3, 4]);
    assert!(matches!(buf.get_opaque(), Err(Error::MalformedMessage(_))));
}

#[test]
fn skip_pads_from_the_new_position() {
    for (start, n, expected) in [(0, 0, 0), (0, 1, 4), (0, 4, 4), (4, 5, 12), (8, 3, 12)] {
        let mut buf = XdrBuffer::from_bytes(vec![0; 16]);
        buf.set_position(start).unwrap();
        buf.skip(n).unwrap();
        assert_eq!(buf.position(), expected, "skip({n}) from {start}");
    }
}

#[test]
fn payload_padding_law() {
    for (payload, padding) in [(&b"x"[..], 3), (&b"abcd"[..], 0), (&b"abcdef"[..], 2)] {
        let mut buf = XdrBuffer::default();
        buf.put_u32(payload.len() as u32).unwrap();
        buf.append_payload([Bytes::copy_from_slice(payload)]);
        assert_eq!(buf.pending_padding(), padding);
        assert_eq!(buf.finalize_payloads(), padding);
        assert_eq!(buf.total_len(), 4 + payload.len() + padding);
        assert_eq!(buf.total_len() % 4, 0);
    }
}

#[test]
fn payload_is_split_across_segments() {
    let mut buf = XdrBuffer::default();
    buf.put_u32(2).unwrap();
    buf.append_payload([Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    buf.finalize_payloads();

    let wire: Vec<u8> = buf.segments().iter().flat_map(|segment| segment.to_vec()).collect();
    assert_eq!(wire, vec![0, 0, 0, 2, b'a', b'b', 0, 0]);
    assert!(buf.put_u32(1).is_err(), "primary buffer is sealed after a payload");
}

#[test]
fn structures_round_trip() {
    check(&nfs_fh3 { data: vec![1, 2, 3, 4, 5] });
    check(&post_op_attr::Void);
    check(&sattr3 { mode: set_mode3::mode(0o644), ..Default::default() });
    check(&mountres3::Ok(mountres3_ok { fhandle: vec![1, 2, 3, 4], auth_flavors: vec![0, 1] }));
    check(&mountres3::Err(mountstat3::MNT3ERR_ACCES));
    check(&String::from("/export"));
}

#[test]
fn mount_reply_layout() {
    let mut buf = XdrBuffer::default();
    buf.put(&mountres3::Ok(mountres3_ok { fhandle: vec![1, 2, 3, 4], auth_flavors: vec![] }))
        .unwrap();
    assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 4, 1, 2, 3, 4, 0, 0, 0, 0]);
}
