//! Output verbosity.

use std::fmt;
use std::str::FromStr;

/// How much the tool says on stderr.
///
/// There is deliberately no `clap::ValueEnum` implementation: the
/// command line sets the verbosity with `-v` and `-q`, and the
/// configuration file with `ui.verbosity`.
#[derive(Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Verbosity {
    /// Also report the hash algorithm, the signature counts, and
    /// who signed.
    Verbose,

    /// Report warnings and the outcome.
    #[default]
    Default,

    /// Report only errors.
    Quiet,
}

const VERBOSITY_MAP: &[(&str, Verbosity)] = &[
    // Sorted for binary_search.
    ("default", Verbosity::Default),
    ("quiet", Verbosity::Quiet),
    ("verbose", Verbosity::Verbose),
];

impl Verbosity {
    /// Returns an iterator over the variants.
    pub fn variants() -> impl Iterator<Item = Self> {
        VERBOSITY_MAP.iter().map(|(_, v)| v.clone())
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = VERBOSITY_MAP.iter()
            .find_map(|(name, v)| (v == self).then_some(*name))
            .unwrap_or("default");
        f.write_str(name)
    }
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl FromStr for Verbosity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug_assert!(
            VERBOSITY_MAP.windows(2).all(|w| w[0].0 < w[1].0),
            "VERBOSITY_MAP not sorted");

        VERBOSITY_MAP.binary_search_by(|&(probe, _)| probe.cmp(s))
            .map(|i| VERBOSITY_MAP[i].1.clone())
            .map_err(|_| anyhow::anyhow!(
                "{:?} is not a valid verbosity, expected \"default\", \
                 \"verbose\", or \"quiet\"", s))
    }
}
