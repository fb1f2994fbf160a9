use h264_reader::{
    annexb::AnnexBReader,
    nal::{Nal as _, RefNal},
    push::NalInterest,
};
use std::io::Read;

pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

/// One NAL unit without its start code, header byte included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nal {
    pub data: Vec<u8>,
}

impl Nal {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn nal_type(&self) -> u8 {
        self.data.first().map(|b| b & 0x1F).unwrap_or(0)
    }

    pub fn is_vcl(&self) -> bool {
        (NAL_SLICE..=NAL_IDR).contains(&self.nal_type())
    }

    pub fn is_idr(&self) -> bool {
        self.nal_type() == NAL_IDR
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self.nal_type(), NAL_SPS | NAL_PPS)
    }

    // first_mb_in_slice is the first ue(v) of the slice header; a value of 0
    // is coded as a single `1` bit.
    fn starts_picture(&self) -> bool {
        self.is_vcl() && self.data.get(1).is_some_and(|b| b & 0x80 != 0)
    }

    // NAL types that may only appear before the first VCL NAL of an
    // access unit.
    fn opens_access_unit(&self) -> bool {
        matches!(self.nal_type(), NAL_SEI | NAL_SPS | NAL_PPS | NAL_AUD | 14..=18)
    }
}

pub fn split_annexb(data: &[u8]) -> Vec<Nal> {
    let mut nals = Vec::new();

    let mut reader = AnnexBReader::accumulate(|nal: RefNal<'_>| {
        if !nal.is_complete() {
            return NalInterest::Buffer;
        }

        if nal.header().is_err() {
            log::debug!("skip NAL unit with invalid header");
            return NalInterest::Ignore;
        }

        let mut bytes = Vec::new();
        match nal.reader().read_to_end(&mut bytes) {
            Ok(_) if !bytes.is_empty() => nals.push(Nal::new(bytes)),
            Ok(_) => (),
            Err(e) => log::warn!("read NAL unit failed: {e}"),
        }

        NalInterest::Ignore
    });

    reader.push(data);
    reader.reset();
    drop(reader);

    nals
}

/// Groups a NAL unit sequence into access units (one coded picture each).
#[derive(Debug, Default)]
pub struct AccessUnitBuilder {
    current: Vec<Nal>,
    has_vcl: bool,
}

impl AccessUnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a NAL unit. Returns the previous access unit when this NAL
    /// unit starts a new one.
    pub fn push(&mut self, nal: Nal) -> Option<Vec<Nal>> {
        let boundary = self.has_vcl && (nal.opens_access_unit() || nal.starts_picture());

        let completed = if boundary {
            self.has_vcl = false;
            Some(std::mem::take(&mut self.current))
        } else {
            None
        };

        self.has_vcl |= nal.is_vcl();
        self.current.push(nal);
        completed
    }

    /// Returns the trailing access unit, if it holds a picture.
    pub fn finish(&mut self) -> Option<Vec<Nal>> {
        let current = std::mem::take(&mut self.current);
        let has_vcl = std::mem::replace(&mut self.has_vcl, false);
        has_vcl.then_some(current)
    }
}

pub fn is_keyframe(access_unit: &[Nal]) -> bool {
    access_unit.iter().any(Nal::is_idr)
}

/// Converts an access unit into an MP4 sample: 4-byte big-endian length
/// prefixes, parameter sets and delimiters left out.
pub fn to_avcc(access_unit: &[Nal]) -> Vec<u8> {
    let size = access_unit.iter().map(|n| n.data.len() + 4).sum();
    let mut out = Vec::with_capacity(size);

    for nal in access_unit
        .iter()
        .filter(|n| !n.is_parameter_set() && n.nal_type() != NAL_AUD)
    {
        out.extend_from_slice(&(nal.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&nal.data);
    }

    out
}

/// Writes an access unit back out as Annex B, parameter sets included.
pub fn to_annexb(access_unit: &[Nal]) -> Vec<u8> {
    let size = access_unit.iter().map(|n| n.data.len() + 4).sum();
    let mut out = Vec::with_capacity(size);

    for nal in access_unit {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(&nal.data);
    }

    out
}

/// Incremental splitter for Annex B data that arrives in arbitrary chunks,
/// e.g. from a socket. A NAL unit is emitted once the start code of the
/// following one has been seen.
#[derive(Debug, Default)]
pub struct NalStream {
    pending: Vec<u8>,
}

impl NalStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Nal> {
        self.pending.extend_from_slice(chunk);

        let Some(mut last) = last_start_code(&self.pending) else {
            return vec![];
        };

        // leading zero of a 4-byte start code
        while last > 0 && self.pending[last - 1] == 0 {
            last -= 1;
        }

        if last == 0 {
            return vec![];
        }

        let rest = self.pending.split_off(last);
        let complete = std::mem::replace(&mut self.pending, rest);
        split_annexb(&complete)
    }

    /// Flushes whatever is buffered, e.g. at end of stream.
    pub fn finish(&mut self) -> Vec<Nal> {
        let pending = std::mem::take(&mut self.pending);
        split_annexb(&pending)
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

fn last_start_code(data: &[u8]) -> Option<usize> {
    data.windows(3).rposition(|w| w == [0, 0, 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(bytes: &[u8]) -> Nal {
        Nal::new(bytes.to_vec())
    }

    fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![];
        for n in nals {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(n);
        }
        out
    }

    #[test]
    fn test_split_annexb() {
        let data = annexb(&[&[0x67, 0x42, 0x1e], &[0x68, 0xce], &[0x65, 0x88, 0x84]]);
        let nals = split_annexb(&data);

        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0].nal_type(), NAL_SPS);
        assert_eq!(nals[1].nal_type(), NAL_PPS);
        assert_eq!(nals[2].nal_type(), NAL_IDR);
        assert_eq!(nals[2].data, vec![0x65, 0x88, 0x84]);
    }

    #[test]
    fn test_split_three_byte_start_codes() {
        let data = [0, 0, 1, 0x41, 0x9a, 0x10, 0, 0, 1, 0x41, 0x9a, 0x20];
        let nals = split_annexb(&data);
        assert_eq!(nals.len(), 2);
        assert!(nals.iter().all(|n| n.nal_type() == NAL_SLICE));
    }

    #[test]
    fn test_access_units_split_on_new_picture() {
        let mut builder = AccessUnitBuilder::new();
        let mut units = vec![];

        for n in [
            nal(&[0x67, 0x42]),
            nal(&[0x68, 0xce]),
            nal(&[0x65, 0x88]),
            nal(&[0x41, 0x9a]),
            nal(&[0x41, 0x9b]),
        ] {
            if let Some(au) = builder.push(n) {
                units.push(au);
            }
        }
        units.extend(builder.finish());

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].len(), 3);
        assert!(is_keyframe(&units[0]));
        assert!(!is_keyframe(&units[1]));
    }

    #[test]
    fn test_multi_slice_picture_stays_together() {
        let mut builder = AccessUnitBuilder::new();

        assert!(builder.push(nal(&[0x65, 0x88])).is_none());
        // first_mb_in_slice != 0: second slice of the same picture
        assert!(builder.push(nal(&[0x65, 0x40])).is_none());

        let au = builder.push(nal(&[0x09, 0xf0])).unwrap();
        assert_eq!(au.len(), 2);
        assert!(builder.finish().is_none());
    }

    #[test]
    fn test_to_avcc_drops_parameter_sets() {
        let au = vec![nal(&[0x67, 1]), nal(&[0x68, 2]), nal(&[0x65, 3, 4])];
        assert_eq!(to_avcc(&au), vec![0, 0, 0, 3, 0x65, 3, 4]);
    }

    #[test]
    fn test_nal_stream_across_chunks() {
        let data = annexb(&[&[0x67, 0x42, 0x1e], &[0x68, 0xce], &[0x65, 0x88, 0x84]]);
        let mut stream = NalStream::new();
        let mut nals = vec![];

        for chunk in data.chunks(2) {
            nals.extend(stream.push(chunk));
        }

        assert_eq!(nals.len(), 2);
        assert!(stream.buffered() > 0);

        nals.extend(stream.finish());
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[2].data, vec![0x65, 0x88, 0x84]);
        assert_eq!(stream.buffered(), 0);
    }

    #[test]
    fn test_to_annexb_keeps_every_nal() {
        let au = vec![nal(&[0x67, 1]), nal(&[0x65, 3])];
        assert_eq!(to_annexb(&au), vec![0, 0, 0, 1, 0x67, 1, 0, 0, 0, 1, 0x65, 3]);
    }
}
