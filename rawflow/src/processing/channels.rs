//! Channel-name matching and flat-channel detection.

use crate::core::{ChannelKind, RawSignal};
use crate::errors::{InvalidParameter, Result};
use regex::Regex;
use std::sync::OnceLock;

fn trailing_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)0*(\d+)$").expect("trailing number pattern is valid"))
}

/// Comparison key: lowercase, separators dropped, leading zeros of the
/// trailing number dropped (`"MEG 001"` and `"meg1"` share a key).
fn channel_key(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    match trailing_number().captures(&compact) {
        Some(caps) => format!("{}{}", &caps[1], &caps[2]),
        None => compact,
    }
}

fn trailing_int(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// Resolves user-supplied channel names against the channels of a recording.
///
/// Names are matched exactly first, then by a case- and
/// separator-insensitive key; a bare number matches the single channel
/// whose name ends in that number. The result keeps request order without
/// duplicates.
///
/// # Errors
///
/// Returns [`InvalidParameter`] listing every name that matches no channel
/// or more than one.
pub fn normalize_channel_names(requested: &[String], available: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(requested.len());
    let mut unmatched = Vec::new();

    for name in requested {
        let resolved = if available.contains(name) {
            Some(name.clone())
        } else if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
            let number: Option<u64> = name.parse().ok();
            let candidates: Vec<&String> = available
                .iter()
                .filter(|ch| number.is_some() && trailing_int(ch) == number)
                .collect();
            match candidates.as_slice() {
                [single] => Some((*single).clone()),
                _ => None,
            }
        } else {
            let key = channel_key(name);
            let candidates: Vec<&String> =
                available.iter().filter(|ch| channel_key(ch) == key).collect();
            match candidates.as_slice() {
                [single] => Some((*single).clone()),
                _ => None,
            }
        };

        match resolved {
            Some(ch) if !out.contains(&ch) => out.push(ch),
            Some(_) => {}
            None => unmatched.push(name.clone()),
        }
    }

    if unmatched.is_empty() {
        Ok(out)
    } else {
        Err(InvalidParameter::new(
            "bad channels",
            format!("no unique sensor matches {}", unmatched.join(", ")),
        )
        .into())
    }
}

/// MEG/EEG channels whose standard deviation over time is below `flat`.
#[must_use]
pub fn flat_channels(raw: &RawSignal, flat: f64) -> Vec<String> {
    raw.picks(ChannelKind::is_data, false)
        .into_iter()
        .filter(|&i| raw.data.row(i).std(0.0) < flat)
        .map(|i| raw.info.ch_names[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RawflowError;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_exact_and_fuzzy_matches() {
        let available = names(&["MEG 001", "MEG 002", "Fp1", "EOG 061"]);
        let out = normalize_channel_names(&names(&["MEG 002", "meg1", "fp 1"]), &available).unwrap();
        assert_eq!(out, names(&["MEG 002", "MEG 001", "Fp1"]));
    }

    #[test]
    fn test_numeric_names() {
        let available = names(&["MEG 001", "MEG 002", "MEG 010"]);
        let out = normalize_channel_names(&names(&["10", "2"]), &available).unwrap();
        assert_eq!(out, names(&["MEG 010", "MEG 002"]));
    }

    #[test]
    fn test_duplicates_collapse() {
        let available = names(&["MEG 001"]);
        let out = normalize_channel_names(&names(&["MEG 001", "1"]), &available).unwrap();
        assert_eq!(out, names(&["MEG 001"]));
    }

    #[test]
    fn test_unmatched_names_rejected() {
        let available = names(&["MEG 001"]);
        let err = normalize_channel_names(&names(&["Cz", "MEG 001"]), &available).unwrap_err();
        match err {
            RawflowError::InvalidParameter(e) => assert!(e.message.contains("Cz")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_flat_channels() {
        let raw = RawSignal::new(
            names(&["C1", "C2", "STI"]),
            vec![ChannelKind::Eeg, ChannelKind::Eeg, ChannelKind::Stim],
            100.0,
            array![[1.0, -1.0, 1.0], [2.0, 2.0, 2.0], [0.0, 0.0, 0.0]],
        )
        .unwrap();
        assert_eq!(flat_channels(&raw, 1e-14), names(&["C2"]));
    }
}
