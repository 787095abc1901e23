//! Frequency selection strategies: `(index, total) -> frequency`.
//!
//! Every variant is a pure function of its parameters and `(index, total)`, so
//! identical inputs always produce bit-identical frequencies. The rotor cache
//! keys on those bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FrequencyStrategy {
    /// `index * multiplier`.
    IndexProportional { multiplier: f64 },
    /// A window centred on zero: `(index - total / 2) * multiplier`.
    Centered { multiplier: f64 },
    /// `start + index * step`.
    FixedStep { start: f64, step: f64 },
    /// `total` evenly spaced values spanning `[min, max]`.
    Range { min: f64, max: f64 },
    /// Frequencies taken from a list; past its end the sequence continues in
    /// unit steps from the last entry.
    Explicit { frequencies: Vec<f64> },
    /// Alternating harmonics of a fundamental: `0, +f, -f, +2f, -2f, ...`.
    FundamentalMultiple { fundamental: f64 },
}

impl Default for FrequencyStrategy {
    fn default() -> Self {
        Self::FundamentalMultiple { fundamental: 1.0 }
    }
}

impl FrequencyStrategy {
    pub fn frequency(&self, index: usize, total: usize) -> f64 {
        let i = index as f64;
        match self {
            Self::IndexProportional { multiplier } => i * multiplier,
            Self::Centered { multiplier } => (i - (total / 2) as f64) * multiplier,
            Self::FixedStep { start, step } => start + i * step,
            Self::Range { min, max } => {
                if total <= 1 {
                    *min
                } else {
                    min + (max - min) * (i / (total - 1) as f64)
                }
            }
            Self::Explicit { frequencies } => match frequencies.get(index) {
                Some(f) => *f,
                None => match frequencies.last() {
                    Some(last) => last + (index + 1 - frequencies.len()) as f64,
                    None => i,
                },
            },
            Self::FundamentalMultiple { fundamental } => {
                let harmonic = index.div_ceil(2) as f64;
                if index == 0 {
                    0.0
                } else if index % 2 == 1 {
                    harmonic * fundamental
                } else {
                    -harmonic * fundamental
                }
            }
        }
    }

    /// Frequencies for every index in `[0, total)`.
    pub fn frequencies(&self, total: usize) -> Vec<f64> {
        (0..total).map(|i| self.frequency(i, total)).collect()
    }

    /// True when a change of `total` moves previously returned frequencies.
    pub fn depends_on_total(&self) -> bool {
        matches!(self, Self::Centered { .. } | Self::Range { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::IndexProportional { .. } => "proportional",
            Self::Centered { .. } => "centered",
            Self::FixedStep { .. } => "step",
            Self::Range { .. } => "range",
            Self::Explicit { .. } => "list",
            Self::FundamentalMultiple { .. } => "fundamental",
        }
    }
}

impl fmt::Display for FrequencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexProportional { multiplier } => write!(f, "proportional:{multiplier}"),
            Self::Centered { multiplier } => write!(f, "centered:{multiplier}"),
            Self::FixedStep { start, step } => write!(f, "step:{start}:{step}"),
            Self::Range { min, max } => write!(f, "range:{min}:{max}"),
            Self::Explicit { frequencies } => {
                let list: Vec<String> = frequencies.iter().map(|x| x.to_string()).collect();
                write!(f, "list:{}", list.join(","))
            }
            Self::FundamentalMultiple { fundamental } => write!(f, "fundamental:{fundamental}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStrategyError(String);

impl fmt::Display for ParseStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid frequency strategy: {}", self.0)
    }
}

impl std::error::Error for ParseStrategyError {}

fn parse_f64(raw: &str, whole: &str) -> Result<f64, ParseStrategyError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseStrategyError(format!("'{raw}' is not a number in '{whole}'")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParseStrategyError(format!("'{raw}' is not finite in '{whole}'")))
    }
}

impl FromStr for FrequencyStrategy {
    type Err = ParseStrategyError;

    /// Accepts `proportional[:m]`, `centered[:m]`, `step:start:step`,
    /// `range:min:max`, `list:f1,f2,...` and `fundamental[:f]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (kind, rest) = match trimmed.split_once(':') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (trimmed, None),
        };
        let args: Vec<&str> = rest.map(|r| r.split(':').collect()).unwrap_or_default();
        let scalar = |default: f64| -> Result<f64, ParseStrategyError> {
            match args.as_slice() {
                [] => Ok(default),
                [x] => parse_f64(x, trimmed),
                _ => Err(ParseStrategyError(format!("too many arguments in '{trimmed}'"))),
            }
        };
        let pair = || -> Result<(f64, f64), ParseStrategyError> {
            match args.as_slice() {
                [a, b] => Ok((parse_f64(a, trimmed)?, parse_f64(b, trimmed)?)),
                _ => Err(ParseStrategyError(format!("expected two arguments in '{trimmed}'"))),
            }
        };

        match kind.to_ascii_lowercase().as_str() {
            "proportional" | "index-proportional" => Ok(Self::IndexProportional {
                multiplier: scalar(1.0)?,
            }),
            "centered" => Ok(Self::Centered {
                multiplier: scalar(1.0)?,
            }),
            "step" | "fixed-step" => {
                let (start, step) = pair()?;
                Ok(Self::FixedStep { start, step })
            }
            "range" => {
                let (min, max) = pair()?;
                Ok(Self::Range { min, max })
            }
            "list" | "explicit" => {
                let frequencies = rest
                    .unwrap_or_default()
                    .split(',')
                    .filter(|x| !x.trim().is_empty())
                    .map(|x| parse_f64(x, trimmed))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Explicit { frequencies })
            }
            "fundamental" | "fundamental-multiple" => Ok(Self::FundamentalMultiple {
                fundamental: scalar(1.0)?,
            }),
            other => Err(ParseStrategyError(format!("unknown kind '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_is_index_times_multiplier() {
        let s = FrequencyStrategy::IndexProportional { multiplier: 1.0 };
        assert_eq!(s.frequencies(5), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(!s.depends_on_total());
    }

    #[test]
    fn centered_window_moves_with_total() {
        let s = FrequencyStrategy::Centered { multiplier: 2.0 };
        assert_eq!(s.frequencies(5), vec![-4.0, -2.0, 0.0, 2.0, 4.0]);
        assert_eq!(s.frequencies(4), vec![-4.0, -2.0, 0.0, 2.0]);
        assert_ne!(s.frequency(0, 5), s.frequency(0, 7));
        assert!(s.depends_on_total());
    }

    #[test]
    fn range_spans_endpoints() {
        let s = FrequencyStrategy::Range {
            min: -1.0,
            max: 1.0,
        };
        assert_eq!(s.frequencies(3), vec![-1.0, 0.0, 1.0]);
        assert_eq!(s.frequencies(1), vec![-1.0]);
    }

    #[test]
    fn explicit_list_continues_past_end() {
        let s = FrequencyStrategy::Explicit {
            frequencies: vec![0.5, 3.0],
        };
        assert_eq!(s.frequencies(4), vec![0.5, 3.0, 4.0, 5.0]);
        let empty = FrequencyStrategy::Explicit {
            frequencies: Vec::new(),
        };
        assert_eq!(empty.frequency(3, 10), 3.0);
    }

    #[test]
    fn fundamental_alternates_sign() {
        let s = FrequencyStrategy::FundamentalMultiple { fundamental: 0.5 };
        assert_eq!(s.frequencies(5), vec![0.0, 0.5, -0.5, 1.0, -1.0]);
    }

    #[test]
    fn frequencies_are_unique_within_total() {
        let strategies = [
            FrequencyStrategy::default(),
            FrequencyStrategy::Centered { multiplier: 1.0 },
            FrequencyStrategy::FixedStep {
                start: 0.25,
                step: 0.5,
            },
            FrequencyStrategy::Range {
                min: 0.0,
                max: 10.0,
            },
        ];
        for s in &strategies {
            let mut freqs = s.frequencies(64);
            freqs.sort_by(f64::total_cmp);
            freqs.dedup();
            assert_eq!(freqs.len(), 64, "{s} aliased frequencies");
        }
    }

    #[test]
    fn parse_accepts_every_kind() {
        let cases = [
            "proportional",
            "proportional:2",
            "centered:0.5",
            "step:1:0.25",
            "range:-3:3",
            "list:1,2,5",
            "fundamental:2",
        ];
        for raw in cases {
            let parsed: FrequencyStrategy = raw.parse().expect(raw);
            let reparsed: FrequencyStrategy = parsed.to_string().parse().expect(raw);
            assert_eq!(parsed, reparsed, "{raw}");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("wobble".parse::<FrequencyStrategy>().is_err());
        assert!("range:1".parse::<FrequencyStrategy>().is_err());
        assert!("proportional:x".parse::<FrequencyStrategy>().is_err());
        assert!("centered:inf".parse::<FrequencyStrategy>().is_err());
    }

    #[test]
    fn toml_round_trip_uses_kind_tag() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            strategy: FrequencyStrategy,
        }
        let text = "[strategy]\nkind = \"fixed-step\"\nstart = 1.0\nstep = 0.5\n";
        let parsed: Holder = toml::from_str(text).expect("parse strategy");
        assert_eq!(
            parsed.strategy,
            FrequencyStrategy::FixedStep {
                start: 1.0,
                step: 0.5
            }
        );
    }
}
