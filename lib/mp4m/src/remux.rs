use crate::{
    Mp4mError, Result,
    annexb::{AccessUnitBuilder, split_annexb},
    muxer::{Mp4Muxer, MuxStats, VideoTrack},
};
use std::{fs, path::Path};

/// Writes an Annex B stream into `output` as an MP4 whose frame rate is
/// `track.fps`, whatever rate the stream was encoded at.
pub fn remux_annexb(data: &[u8], output: impl AsRef<Path>, track: VideoTrack) -> Result<MuxStats> {
    let output = output.as_ref();
    let result = remux_inner(data, output, track);

    if result.is_err() && output.exists() {
        if let Err(e) = fs::remove_file(output) {
            log::warn!("remove unfinished `{}` failed: {e}", output.display());
        }
    }

    result
}

fn remux_inner(data: &[u8], output: &Path, track: VideoTrack) -> Result<MuxStats> {
    let nals = split_annexb(data);
    if !nals.iter().any(|n| n.is_vcl()) {
        return Err(Mp4mError::EmptyStream(output.display().to_string()));
    }

    let mut muxer = Mp4Muxer::new(output, track)?;
    let mut builder = AccessUnitBuilder::new();

    for nal in nals {
        if let Some(access_unit) = builder.push(nal) {
            muxer.write_access_unit(&access_unit)?;
        }
    }

    if let Some(access_unit) = builder.finish() {
        muxer.write_access_unit(&access_unit)?;
    }

    muxer.finish()
}

pub fn remux_h264_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    track: VideoTrack,
) -> Result<MuxStats> {
    let input = input.as_ref();
    let data = fs::read(input).map_err(|e| {
        Mp4mError::Io(std::io::Error::new(
            e.kind(),
            format!("read `{}` failed: {e}", input.display()),
        ))
    })?;

    log::info!(
        "Remux `{}` ({} bytes) -> `{}` @ {:.2}fps",
        input.display(),
        data.len(),
        output.as_ref().display(),
        track.fps
    );

    remux_annexb(&data, output, track)
}
