//! Band Summing with Solo/Mute Routing
//!
//! If any band is soloed, only soloed bands reach the output and mute flags
//! are ignored. Otherwise every non-muted band is summed. Bypass never
//! affects routing.

use crate::band::{BandFlags, NUM_BANDS};
use crate::buffer::AudioBuffer;

/// Which bands contribute to the output this block
pub fn active_bands(flags: &[BandFlags; NUM_BANDS]) -> [bool; NUM_BANDS] {
    let any_solo = flags.iter().any(|f| f.solo);
    flags.map(|f| if any_solo { f.solo } else { !f.mute })
}

/// Sum the contributing bands into `output`
///
/// `output` takes the length of the first band; with no contributing band
/// it is left silent.
///
/// # Real-time Safety
/// No allocations; only writes within `output`'s existing capacity.
pub fn mix(bands: &[AudioBuffer; NUM_BANDS], flags: &[BandFlags; NUM_BANDS], output: &mut AudioBuffer) {
    output.set_len(bands[0].len());
    output.clear();

    for (band, active) in bands.iter().zip(active_bands(flags)) {
        if active {
            output.add_from(band);
        }
    }
}
