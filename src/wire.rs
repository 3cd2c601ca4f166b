//! Fixed, versioned, little-endian persisted form of a selection.
//!
//! Every encoding starts with a 16-byte [`WireSelHdr`]: kind, version,
//! reserved (zero) and the length of what follows. The body depends on the
//! kind:
//!
//! - `NONE` / `ALL`: empty.
//! - `POINTS`: `rank`, `npoints`, then `rank` coordinates per point.
//! - `HYPERSLABS`: `rank`, `nblocks`, then per block `rank` start and `rank`
//!   inclusive end coordinates.
//!
//! All fields are `u32`. This crate always encodes `NONE` or `HYPERSLABS`
//! and decodes all four kinds into a [`Selection`].

use crate::extent::Extent;
use crate::hyperslab_error::HyperslabError;
use crate::selection::{SelectOp, Selection};
use bytemuck::{Pod, Zeroable};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u32 = 1;

/// Kind tag stored in [`WireSelHdr`].
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireKind {
    /// Nothing selected.
    None = 0,
    /// Point list.
    Points = 1,
    /// Hyperslab blocks.
    Hyperslabs = 2,
    /// Whole extent.
    All = 3,
}

impl TryFrom<u32> for WireKind {
    type Error = HyperslabError;

    fn try_from(v: u32) -> Result<Self, HyperslabError> {
        match v {
            0 => Ok(WireKind::None),
            1 => Ok(WireKind::Points),
            2 => Ok(WireKind::Hyperslabs),
            3 => Ok(WireKind::All),
            other => Err(HyperslabError::corrupt(format!(
                "unknown selection kind {other}"
            ))),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireSelHdr {
    pub kind_le: u32,
    pub version_le: u32,
    pub reserved_le: u32, // keep zero
    pub length_le: u32,   // bytes after this header
}

assert_eq_size!(WireSelHdr, [u8; 16]);

impl WireSelHdr {
    pub fn new(kind: WireKind, length: u32) -> Self {
        Self {
            kind_le: (kind as u32).to_le(),
            version_le: WIRE_VERSION.to_le(),
            reserved_le: 0,
            length_le: length.to_le(),
        }
    }
    pub fn kind(&self) -> u32 {
        u32::from_le(self.kind_le)
    }
    pub fn version(&self) -> u32 {
        u32::from_le(self.version_le)
    }
    pub fn reserved(&self) -> u32 {
        u32::from_le(self.reserved_le)
    }
    pub fn length(&self) -> u32 {
        u32::from_le(self.length_le)
    }
}

const HDR_LEN: usize = size_of::<WireSelHdr>();

fn body_len(rank: usize, nblocks: u64) -> u64 {
    (8 * rank as u64).saturating_mul(nblocks).saturating_add(8)
}

/// Number of bytes [`encode_selection`] produces for `sel`, saturating at
/// `u64::MAX`.
pub fn serial_size(sel: &Selection) -> u64 {
    match sel.num_blocks() {
        0 => HDR_LEN as u64,
        n => body_len(sel.rank(), n).saturating_add(HDR_LEN as u64),
    }
}

fn to_u32(x: u64, what: &str) -> Result<u32, HyperslabError> {
    u32::try_from(x).map_err(|_| {
        HyperslabError::invalid(format!("{what} {x} does not fit the 32-bit encoding"))
    })
}

/// Encode `sel` (stored coordinates, offset not included).
///
/// # Errors
/// `InvalidArgument` if a coordinate, the block count or the body length
/// exceeds `u32::MAX`.
pub fn encode_selection(sel: &Selection) -> Result<Bytes, HyperslabError> {
    let nblocks = sel.num_blocks();
    if nblocks == 0 {
        let mut buf = BytesMut::with_capacity(HDR_LEN);
        buf.put_slice(bytemuck::bytes_of(&WireSelHdr::new(WireKind::None, 0)));
        return Ok(buf.freeze());
    }
    let rank = sel.rank();
    // both limits are checked before any block is listed
    let nblocks = to_u32(nblocks, "block count")?;
    let length = to_u32(body_len(rank, u64::from(nblocks)), "encoded length")?;
    let blocks = sel.blocks();

    let mut buf = BytesMut::with_capacity(HDR_LEN + length as usize);
    buf.put_slice(bytemuck::bytes_of(&WireSelHdr::new(WireKind::Hyperslabs, length)));
    buf.put_u32_le(rank as u32);
    buf.put_u32_le(nblocks);
    for (start, end) in &blocks {
        for &x in start.iter().chain(end) {
            buf.put_u32_le(to_u32(x, "coordinate")?);
        }
    }
    log::trace!("encoded {nblocks} blocks of rank {rank} in {} bytes", buf.len());
    Ok(buf.freeze())
}

/// Decode a selection encoded for a dataset of shape `extent`.
///
/// # Errors
/// `CorruptEncoding` for a truncated buffer, an unknown kind or version, a
/// rank that does not match `extent`, a length field that disagrees with the
/// body, or a block with `start > end`. Decoded points outside the extent
/// are reported as `OutOfBounds`.
pub fn decode_selection(extent: &Extent, buf: &[u8]) -> Result<Selection, HyperslabError> {
    if buf.len() < HDR_LEN {
        return Err(HyperslabError::corrupt(format!(
            "truncated header: {} of {HDR_LEN} bytes",
            buf.len()
        )));
    }
    let hdr: WireSelHdr = bytemuck::pod_read_unaligned(&buf[..HDR_LEN]);
    if hdr.version() != WIRE_VERSION {
        return Err(HyperslabError::corrupt(format!(
            "unsupported version {}",
            hdr.version()
        )));
    }
    if hdr.reserved() != 0 {
        log::warn!("selection header reserved field is {:#x}", hdr.reserved());
    }
    let kind = WireKind::try_from(hdr.kind())?;
    let length = hdr.length() as usize;
    let rest = &buf[HDR_LEN..];
    if rest.len() < length {
        return Err(HyperslabError::corrupt(format!(
            "truncated body: {} of {length} bytes",
            rest.len()
        )));
    }
    if rest.len() > length {
        log::warn!("ignoring {} trailing bytes after selection", rest.len() - length);
    }
    let mut body = &rest[..length];

    match kind {
        WireKind::None => Ok(Selection::none(extent.clone())),
        WireKind::All => Ok(Selection::all(extent.clone())),
        WireKind::Points => {
            let (rank, n) = read_counts(&mut body, extent)?;
            expect_body(length, 8 + 4 * rank as u64 * n)?;
            let points: Vec<Vec<u64>> = (0..n)
                .map(|_| (0..rank).map(|_| u64::from(body.get_u32_le())).collect())
                .collect();
            Selection::from_points(extent.clone(), &points)
        }
        WireKind::Hyperslabs => {
            let (rank, n) = read_counts(&mut body, extent)?;
            expect_body(length, body_len(rank, n))?;
            let ones = vec![1u64; rank];
            let mut sel = Selection::none(extent.clone());
            for _ in 0..n {
                let start: Vec<u64> = (0..rank).map(|_| u64::from(body.get_u32_le())).collect();
                let end: Vec<u64> = (0..rank).map(|_| u64::from(body.get_u32_le())).collect();
                let size: Vec<u64> = start
                    .iter()
                    .zip(&end)
                    .map(|(&s, &e)| {
                        e.checked_sub(s)
                            .map(|d| d + 1)
                            .ok_or_else(|| HyperslabError::corrupt(format!("block start {s} > end {e}")))
                    })
                    .collect::<Result<_, _>>()?;
                sel.select_hyperslab(SelectOp::Or, &start, None, &ones, Some(&size))?;
            }
            Ok(sel)
        }
    }
}

fn read_counts(body: &mut &[u8], extent: &Extent) -> Result<(usize, u64), HyperslabError> {
    if body.remaining() < 8 {
        return Err(HyperslabError::corrupt("body too short for rank and count"));
    }
    let rank = body.get_u32_le() as usize;
    if rank != extent.rank() {
        return Err(HyperslabError::corrupt(format!(
            "rank {rank} does not match dataset rank {}",
            extent.rank()
        )));
    }
    Ok((rank, u64::from(body.get_u32_le())))
}

fn expect_body(actual: usize, expected: u64) -> Result<(), HyperslabError> {
    if actual as u64 == expected {
        Ok(())
    } else {
        Err(HyperslabError::corrupt(format!(
            "length field {actual} does not match expected {expected}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext() -> Extent {
        Extent::new(&[10, 10]).unwrap()
    }

    fn two_squares() -> Selection {
        let mut sel = Selection::hyperslab(ext(), &[0, 0], None, &[1, 1], Some(&[4, 4])).unwrap();
        sel.select_hyperslab(SelectOp::Or, &[2, 2], None, &[1, 1], Some(&[4, 4]))
            .unwrap();
        sel
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = encode_selection(&Selection::none(ext())).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let sel = Selection::hyperslab(ext(), &[1, 2], None, &[1, 1], Some(&[3, 4])).unwrap();
        let bytes = encode_selection(&sel).unwrap();
        assert_eq!(bytes.len() as u64, serial_size(&sel));
        assert_eq!(&bytes[..4], &[2, 0, 0, 0]);
        // length = 8 + 8 * rank * nblocks
        assert_eq!(&bytes[12..16], &[24, 0, 0, 0]);
        assert_eq!(&bytes[24..], &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 5, 0, 0, 0]);
    }

    #[test]
    fn general_selection_survives_encoding() {
        let sel = two_squares();
        let bytes = encode_selection(&sel).unwrap();
        assert_eq!(bytes.len() as u64, serial_size(&sel));
        let back = decode_selection(&ext(), &bytes).unwrap();
        assert_eq!(back.num_elements(), 28);
        assert_eq!(back.blocks(), sel.blocks());
    }

    #[test]
    fn decode_rejects_corruption() {
        let bytes = encode_selection(&two_squares()).unwrap();
        let other = Extent::new(&[10, 10, 10]).unwrap();
        assert!(matches!(
            decode_selection(&other, &bytes),
            Err(HyperslabError::CorruptEncoding(_))
        ));
        assert!(decode_selection(&ext(), &bytes[..bytes.len() - 4]).is_err());
        assert!(decode_selection(&ext(), &bytes[..10]).is_err());
        let mut bad = bytes.to_vec();
        bad[4] = 9;
        assert!(decode_selection(&ext(), &bad).is_err());
        let mut bad = bytes.to_vec();
        bad[0] = 7;
        assert!(decode_selection(&ext(), &bad).is_err());
    }

    #[test]
    fn decode_points_and_all() {
        let mut buf = BytesMut::new();
        buf.put_slice(bytemuck::bytes_of(&WireSelHdr::new(WireKind::Points, 8 + 4 * 2 * 2)));
        for v in [2u32, 2, 1, 1, 7, 3] {
            buf.put_u32_le(v);
        }
        let sel = decode_selection(&ext(), &buf).unwrap();
        assert_eq!(sel.num_elements(), 2);
        assert!(sel.contains(&[7, 3]));

        let all = bytemuck::bytes_of(&WireSelHdr::new(WireKind::All, 0)).to_vec();
        assert_eq!(decode_selection(&ext(), &all).unwrap().num_elements(), 100);
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut bytes = encode_selection(&two_squares()).unwrap().to_vec();
        bytes.extend_from_slice(&[0xff; 3]);
        assert_eq!(decode_selection(&ext(), &bytes).unwrap().num_elements(), 28);
    }

    #[test]
    fn oversized_block_lists_are_rejected_up_front() {
        // 2^33 blocks: more than the block count field holds
        let e = Extent::new(&[1 << 18, 1 << 18]).unwrap();
        let sel = Selection::hyperslab(e.clone(), &[0, 0], Some(&[2, 2]), &[1 << 17, 1 << 16], None)
            .unwrap();
        assert_eq!(sel.num_blocks(), 1 << 33);
        assert_eq!(serial_size(&sel), 16 + 8 + 16 * (1 << 33));
        assert!(matches!(
            encode_selection(&sel),
            Err(HyperslabError::InvalidArgument(_))
        ));

        // 2^28 blocks fit the count but not the 32-bit length
        let sel = Selection::hyperslab(e, &[0, 0], Some(&[2, 2]), &[1 << 14, 1 << 14], None).unwrap();
        assert_eq!(sel.num_blocks(), 1 << 28);
        assert!(matches!(
            encode_selection(&sel),
            Err(HyperslabError::InvalidArgument(_))
        ));
    }

    #[test]
    fn coordinates_beyond_u32_are_rejected() {
        let big = Extent::new(&[1 << 40]).unwrap();
        let sel = Selection::hyperslab(big, &[1 << 33], None, &[1], None).unwrap();
        assert!(matches!(
            encode_selection(&sel),
            Err(HyperslabError::InvalidArgument(_))
        ));
    }
}
