#![allow(dead_code)]

use exhume_mft::VolumeParameters;

pub const ENTRY_SIZE: usize = 1024;
pub const CLUSTER_SIZE: usize = 4096;
pub const MFT_CLUSTER: u64 = 4;
pub const USA_OFFSET: usize = 0x30;
pub const FIRST_ATTR: usize = 0x38;
pub const USN: [u8; 2] = [0x05, 0x00];
/// FILETIME of 2020-01-01T00:00:00Z.
pub const FT_2020: u64 = 132_223_104_000_000_000;
pub const UNIX_2020: i64 = 1_577_836_800;

pub fn params() -> VolumeParameters {
    VolumeParameters::new(512, 8, ENTRY_SIZE as u32, MFT_CLUSTER).unwrap()
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

pub fn resident_attr(type_id: u32, id: u16, value: &[u8]) -> Vec<u8> {
    let len = align8(24 + value.len());
    let mut a = vec![0u8; len];
    a[0..4].copy_from_slice(&type_id.to_le_bytes());
    a[4..8].copy_from_slice(&(len as u32).to_le_bytes());
    a[14..16].copy_from_slice(&id.to_le_bytes());
    a[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    a[20..22].copy_from_slice(&24u16.to_le_bytes());
    a[24..24 + value.len()].copy_from_slice(value);
    a
}

/// Resident attribute carrying a UTF-16 name placed after the header.
pub fn named_resident_attr(type_id: u32, id: u16, name: &str, value: &[u8]) -> Vec<u8> {
    let name = utf16(name);
    let value_offset = align8(24 + name.len());
    let len = align8(value_offset + value.len());
    let mut a = vec![0u8; len];
    a[0..4].copy_from_slice(&type_id.to_le_bytes());
    a[4..8].copy_from_slice(&(len as u32).to_le_bytes());
    a[9] = (name.len() / 2) as u8;
    a[10..12].copy_from_slice(&24u16.to_le_bytes());
    a[14..16].copy_from_slice(&id.to_le_bytes());
    a[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    a[20..22].copy_from_slice(&(value_offset as u16).to_le_bytes());
    a[24..24 + name.len()].copy_from_slice(&name);
    a[value_offset..value_offset + value.len()].copy_from_slice(value);
    a
}

pub fn non_resident_attr(type_id: u32, id: u16, runlist: &[u8], allocated: u64) -> Vec<u8> {
    let len = align8(64 + runlist.len());
    let clusters = allocated / CLUSTER_SIZE as u64;
    let mut a = vec![0u8; len];
    a[0..4].copy_from_slice(&type_id.to_le_bytes());
    a[4..8].copy_from_slice(&(len as u32).to_le_bytes());
    a[8] = 1;
    a[14..16].copy_from_slice(&id.to_le_bytes());
    a[24..32].copy_from_slice(&clusters.saturating_sub(1).to_le_bytes());
    a[32..34].copy_from_slice(&64u16.to_le_bytes());
    a[40..48].copy_from_slice(&allocated.to_le_bytes());
    a[48..56].copy_from_slice(&allocated.to_le_bytes());
    a[56..64].copy_from_slice(&allocated.to_le_bytes());
    a[64..64 + runlist.len()].copy_from_slice(runlist);
    a
}

pub fn standard_information(ft: u64, flags: u32) -> Vec<u8> {
    let mut v = vec![0u8; 0x48];
    for i in 0..4 {
        v[i * 8..i * 8 + 8].copy_from_slice(&ft.to_le_bytes());
    }
    v[0x20..0x24].copy_from_slice(&flags.to_le_bytes());
    v[0x34..0x38].copy_from_slice(&0x100u32.to_le_bytes()); // security id
    v
}

pub fn file_name(parent: u64, parent_seq: u16, name: &str, ft: u64, size: u64) -> Vec<u8> {
    let encoded = utf16(name);
    let mut v = vec![0u8; 66];
    v[0..8].copy_from_slice(&(((parent_seq as u64) << 48) | parent).to_le_bytes());
    for i in 0..4 {
        v[8 + i * 8..16 + i * 8].copy_from_slice(&ft.to_le_bytes());
    }
    v[40..48].copy_from_slice(&size.next_multiple_of(8).to_le_bytes());
    v[48..56].copy_from_slice(&size.to_le_bytes());
    v[56..60].copy_from_slice(&0x20u32.to_le_bytes());
    v[64] = (encoded.len() / 2) as u8;
    v[65] = 1;
    v.extend_from_slice(&encoded);
    v
}

/// Lay out a FILE record: header, attributes from 0x38, end marker, then the
/// update sequence stamped over both sector ends.
pub fn build_record(attrs: &[Vec<u8>], next_attr_id: u16, flags: u16) -> Vec<u8> {
    let mut r = vec![0u8; ENTRY_SIZE];
    r[0..4].copy_from_slice(b"FILE");
    r[4..6].copy_from_slice(&(USA_OFFSET as u16).to_le_bytes());
    r[6..8].copy_from_slice(&3u16.to_le_bytes());
    r[8..16].copy_from_slice(&0x1234u64.to_le_bytes());
    r[16..18].copy_from_slice(&7u16.to_le_bytes());
    r[18..20].copy_from_slice(&1u16.to_le_bytes());
    r[20..22].copy_from_slice(&(FIRST_ATTR as u16).to_le_bytes());
    r[22..24].copy_from_slice(&flags.to_le_bytes());

    let mut off = FIRST_ATTR;
    for a in attrs {
        r[off..off + a.len()].copy_from_slice(a);
        off += a.len();
    }
    r[off..off + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    let used = (off + 8) as u32;

    r[24..28].copy_from_slice(&used.to_le_bytes());
    r[28..32].copy_from_slice(&(ENTRY_SIZE as u32).to_le_bytes());
    r[40..42].copy_from_slice(&next_attr_id.to_le_bytes());

    r[USA_OFFSET..USA_OFFSET + 2].copy_from_slice(&USN);
    let (s1, s2) = ([r[510], r[511]], [r[1022], r[1023]]);
    r[USA_OFFSET + 2..USA_OFFSET + 4].copy_from_slice(&s1);
    r[USA_OFFSET + 4..USA_OFFSET + 6].copy_from_slice(&s2);
    r[510..512].copy_from_slice(&USN);
    r[1022..1024].copy_from_slice(&USN);
    r
}

/// A regular file record: $STANDARD_INFORMATION, $FILE_NAME, non-resident $DATA.
pub fn file_record(name: &str, runlist: &[u8], allocated: u64) -> Vec<u8> {
    build_record(
        &[
            resident_attr(0x10, 0, &standard_information(FT_2020, 0x20)),
            resident_attr(0x30, 1, &file_name(5, 5, name, FT_2020, allocated)),
            non_resident_attr(0x80, 2, runlist, allocated),
        ],
        3,
        0x0001,
    )
}

pub fn ntfs_vbr() -> Vec<u8> {
    let mut vbr = vec![0u8; 512];
    vbr[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    vbr[3..11].copy_from_slice(b"NTFS    ");
    vbr[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
    vbr[0x0D] = 8;
    vbr[0x28..0x30].copy_from_slice(&64u64.to_le_bytes());
    vbr[0x30..0x38].copy_from_slice(&MFT_CLUSTER.to_le_bytes());
    vbr[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
    vbr[0x40] = (-10i8) as u8;
    vbr[0x44] = 1;
    vbr[0x1FE..0x200].copy_from_slice(&0xAA55u16.to_le_bytes());
    vbr
}

/// Volume image with the boot sector at 0 and `records` laid out from the
/// $MFT cluster.
pub fn volume_image(records: &[Vec<u8>]) -> Vec<u8> {
    let mft_start = MFT_CLUSTER as usize * CLUSTER_SIZE;
    let mut img = vec![0u8; mft_start + CLUSTER_SIZE];
    img[0..512].copy_from_slice(&ntfs_vbr());
    for (i, r) in records.iter().enumerate() {
        let off = mft_start + i * ENTRY_SIZE;
        img[off..off + r.len()].copy_from_slice(r);
    }
    img
}
