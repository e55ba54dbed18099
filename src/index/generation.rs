use std::fmt;
use log::warn;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::store::codec_util::CODEC_MAGIC;

/// Codec name carried by versioned commit headers
pub const SEGMENTS_CODEC: &str = "segments";

/// On-disk format epoch of an index, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Generation {
    /// Legacy numeric header, markers -1..=-9
    V2,
    /// Legacy numeric header, markers -10..=-11
    V3,
    /// Versioned header, actual versions 0..=3
    V4,
    /// Versioned header, actual versions 4..=6; the terminal generation
    V5,
}

/// First bytes of a commit file, decoded but not yet classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatMarker {
    Legacy(i32),
    Versioned { codec: String, version: i32 },
    /// Positive first int that is not the versioned magic
    Unknown(i32),
}

impl Generation {
    pub const ALL: [Generation; 4] = [Generation::V2, Generation::V3, Generation::V4, Generation::V5];
    pub const TERMINAL: Generation = Generation::V5;

    pub fn next(self) -> Option<Generation> {
        match self {
            Generation::V2 => Some(Generation::V3),
            Generation::V3 => Some(Generation::V4),
            Generation::V4 => Some(Generation::V5),
            Generation::V5 => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }

    pub fn has_versioned_header(self) -> bool {
        matches!(self, Generation::V4 | Generation::V5)
    }

    pub fn has_footer(self) -> bool {
        self == Generation::V5
    }

    /// Marker this crate writes at the start of a commit of this generation
    pub fn commit_marker(self) -> FormatMarker {
        match self {
            Generation::V2 => FormatMarker::Legacy(-9),
            Generation::V3 => FormatMarker::Legacy(-11),
            Generation::V4 => FormatMarker::Versioned { codec: SEGMENTS_CODEC.to_string(), version: 3 },
            Generation::V5 => FormatMarker::Versioned { codec: SEGMENTS_CODEC.to_string(), version: 6 },
        }
    }

    /// Classify a decoded commit marker. Total over every input: anything
    /// outside the known ranges is `UnrecognizedFormat`.
    pub fn classify(marker: &FormatMarker) -> Result<Generation> {
        match *marker {
            FormatMarker::Versioned { ref codec, version } => {
                // only the version decides; the codec name is informational
                if codec != SEGMENTS_CODEC {
                    warn!("commit header carries codec {:?} (version {})", codec, version);
                }
                match version {
                    0..=3 => Ok(Generation::V4),
                    4..=6 => Ok(Generation::V5),
                    _ => Err(Error::unrecognized(format!("unsupported commit version {}", version))),
                }
            }
            // -1..=-9 includes the 3.0 layout, which was documented as version 2
            FormatMarker::Legacy(m) if (-9..0).contains(&m) => Ok(Generation::V2),
            FormatMarker::Legacy(m) if (-11..=-10).contains(&m) => Ok(Generation::V3),
            FormatMarker::Legacy(m) => Err(Error::unrecognized(format!("unsupported legacy format marker {}", m))),
            FormatMarker::Unknown(m) => Err(Error::unrecognized(format!(
                "format marker {} predates every known generation",
                m
            ))),
        }
    }
}

impl FormatMarker {
    /// Split a raw first int into the marker family; the versioned case is
    /// completed by the caller once codec name and version are read
    pub fn is_versioned_magic(first: i32) -> bool {
        first == CODEC_MAGIC
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Generation::V2 => "V2",
            Generation::V3 => "V3",
            Generation::V4 => "V4",
            Generation::V5 => "V5",
        };
        write!(f, "{}", name)
    }
}
