//! Signal-processing primitives.
//!
//! - [`SignalProcessor`]: the port to the external numeric library (FIR and
//!   elliptic filter design, ICA, Maxwell filtering, montages).
//! - [`reference`]: EEG re-referencing, computed natively.
//! - [`channels`]: channel-name matching and flat-channel detection.

pub mod channels;
mod processor;
pub mod reference;

pub use channels::{flat_channels, normalize_channel_names};
pub use processor::{BandType, EllipticDesign, SignalProcessor, SosFilter};
pub use reference::{apply_reference, Reference};
