use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Least conservative spectral range for a recording: 0 Hz up to Nyquist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalBounds {
    pub min: f64,
    pub max: f64,
}

impl GlobalBounds {
    pub fn from_sample_rate(fs: f64) -> Self {
        Self {
            min: 0.0,
            max: fs / 2.0,
        }
    }
}

/// Admissible frequency range for a recording or a single epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBounds {
    pub min_freq: f64,
    pub max_freq: f64,
}

/// Low-pass / high-pass cutoffs found in a free-text prefilter description.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrefilterSpec {
    pub low_pass: Option<f64>,
    pub high_pass: Option<f64>,
}

fn low_pass_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"LP:([\d.]+)").expect("static pattern"))
}

fn high_pass_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"HP:([\d.]+)").expect("static pattern"))
}

fn capture_f64(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

impl PrefilterSpec {
    /// Parse `LP:<number>` and `HP:<number>` tokens. Anything else is ignored.
    pub fn parse(text: &str) -> Self {
        Self {
            low_pass: capture_f64(low_pass_pattern(), text),
            high_pass: capture_f64(high_pass_pattern(), text),
        }
    }

    pub fn apply(&self, global: GlobalBounds) -> FrequencyBounds {
        let max_freq = self
            .low_pass
            .map(|lp| lp.min(global.max))
            .unwrap_or(global.max);
        let mut min_freq = self
            .high_pass
            .map(|hp| hp.max(global.min))
            .unwrap_or(global.min);
        if min_freq > max_freq {
            warn!(
                "prefilter HP {} Hz lies above usable maximum {} Hz; clamping",
                min_freq, max_freq
            );
            min_freq = max_freq;
        }
        FrequencyBounds { min_freq, max_freq }
    }
}

/// Derive the admissible spectral range of a recording from its prefilter text.
pub fn extract_bounds(prefilter: &str, global: GlobalBounds) -> FrequencyBounds {
    PrefilterSpec::parse(prefilter).apply(global)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLOBAL: GlobalBounds = GlobalBounds {
        min: 0.0,
        max: 50.0,
    };

    #[test]
    fn parses_hp_and_lp_tokens() {
        let bounds = extract_bounds("HP:0.5Hz LP:35Hz", GLOBAL);
        assert_eq!(
            bounds,
            FrequencyBounds {
                min_freq: 0.5,
                max_freq: 35.0
            }
        );
    }

    #[test]
    fn missing_tokens_fall_back_to_global() {
        let bounds = extract_bounds("none", GLOBAL);
        assert_eq!(bounds.min_freq, 0.0);
        assert_eq!(bounds.max_freq, 50.0);
        assert_eq!(extract_bounds("", GLOBAL).max_freq, 50.0);
    }

    #[test]
    fn low_pass_above_nyquist_is_capped() {
        let bounds = extract_bounds("HP:0.16Hz LP:100Hz [enhanced cassette BW]", GLOBAL);
        assert_eq!(bounds.min_freq, 0.16);
        assert_eq!(bounds.max_freq, 50.0);
    }

    #[test]
    fn sample_rate_gives_nyquist() {
        assert_eq!(GlobalBounds::from_sample_rate(100.0).max, 50.0);
    }

    #[test]
    fn malformed_number_is_treated_as_absent() {
        let spec = PrefilterSpec::parse("LP:.. HP:1.2.3");
        assert_eq!(spec, PrefilterSpec::default());
    }

    #[test]
    fn bounds_never_invert() {
        let bounds = extract_bounds("HP:60 LP:40", GLOBAL);
        assert!(bounds.min_freq <= bounds.max_freq);
        assert_eq!(bounds.max_freq, 40.0);
    }
}
