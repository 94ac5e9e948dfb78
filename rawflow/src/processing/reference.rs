//! EEG re-referencing.
//!
//! The reference signal (mean of the reference channels at each time point)
//! is subtracted from every EEG channel:
//!
//! `data[c, t] -= mean(data[ref, t])`
use crate::core::{ChannelKind, RawSignal};
use crate::errors::{InvalidParameter, Result};
use ndarray::Axis;

/// Which channels form the new reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Average of all good EEG channels (`"average"`).
    Average,
    /// Average of the named channels.
    Channels(Vec<String>),
}

impl Reference {
    /// Parses a definition value: `"average"` or a list of channel names.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`] for any other string, a non-string list
    /// item or an empty list.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) if s == "average" => Ok(Self::Average),
            serde_json::Value::Array(items) => {
                let channels = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            InvalidParameter::new(
                                "reference",
                                format!("{value}: must be list of str"),
                            )
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                if channels.is_empty() {
                    return Err(InvalidParameter::new("reference", "empty channel list").into());
                }
                Ok(Self::Channels(channels))
            }
            other => Err(InvalidParameter::new(
                "reference",
                format!("{other}: must be 'average' or a list of channel names"),
            )
            .into()),
        }
    }

    /// The definition value this reference was parsed from.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Average => serde_json::Value::String("average".to_string()),
            Self::Channels(channels) => serde_json::json!(channels),
        }
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self::Average
    }
}

/// Re-references the EEG channels of `raw` in place.
///
/// # Errors
///
/// Returns [`InvalidParameter`] if a named reference channel does not exist
/// or no reference channel is available.
pub fn apply_reference(raw: &mut RawSignal, reference: &Reference) -> Result<()> {
    let eeg = raw.picks(|kind| kind == ChannelKind::Eeg, false);
    let ref_picks = match reference {
        Reference::Average => raw.picks(|kind| kind == ChannelKind::Eeg, true),
        Reference::Channels(names) => names
            .iter()
            .map(|name| {
                raw.info.ch_names.iter().position(|ch| ch == name).ok_or_else(|| {
                    InvalidParameter::new(
                        "reference",
                        format!("reference channel {name:?} does not exist"),
                    )
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    if ref_picks.is_empty() {
        return Err(InvalidParameter::new("reference", "no good EEG channels to reference to").into());
    }

    let Some(ref_signal) = raw.data.select(Axis(0), &ref_picks).mean_axis(Axis(0)) else {
        return Err(InvalidParameter::new("reference", "recording has no samples").into());
    };
    for idx in eeg {
        let mut row = raw.data.row_mut(idx);
        row -= &ref_signal;
    }
    Ok(())
}
