//! Media decodability probe
//!
//! Cache verification opens each downloaded file with symphonia and demands
//! a decodable default track with a computable duration. A file that passes
//! the size check but fails here is treated as corrupt and re-downloaded.

use crate::{Error, Result};
use std::path::Path;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Probe a media file and return its duration in seconds.
///
/// The probe is content-based; the file extension is only a hint. Cached
/// media carries a `.mp4` suffix by naming convention regardless of the
/// actual container.
pub fn probe_duration_secs(path: &Path) -> Result<f64> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Probe(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension() {
        if let Some(ext_str) = extension.to_str() {
            hint.with_extension(ext_str);
        }
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| Error::Probe(format!("Failed to probe format: {}", e)))?;

    let format = probed.format;

    // Get the default decodable track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Probe("No decodable track found".to_string()))?;

    let params = &track.codec_params;

    let duration = if let (Some(time_base), Some(n_frames)) = (params.time_base, params.n_frames) {
        let time = time_base.calc_time(n_frames);
        time.seconds as f64 + time.frac
    } else if let (Some(sample_rate), Some(n_frames)) = (params.sample_rate, params.n_frames) {
        n_frames as f64 / sample_rate as f64
    } else {
        return Err(Error::Probe("Track duration unavailable".to_string()));
    };

    debug!("Probed {}: {:.3}s", path.display(), duration);
    Ok(duration)
}

/// Whether a cached file decodes to playable media (duration > 0).
///
/// Never errors; any probe failure means "not decodable".
pub fn is_decodable(path: &Path) -> bool {
    matches!(probe_duration_secs(path), Ok(duration) if duration > 0.0)
}
