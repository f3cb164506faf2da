//! License key minting and validation.
//!
//! Keys use the format `GL-<TIER>-<YEAR>-<SEG1>-<SEG2>-<CHK4>`:
//!
//! - `TIER`: `DEMO`, `BASIC`, `PRO` or `ENTERPRISE`
//! - `YEAR`: four ASCII digits, the year the key was minted
//! - `SEG1`, `SEG2`: four random uppercase ASCII letters each
//! - `CHK4`: the first four hex digits (uppercase) of the MD5 of
//!   `GL-<TIER>-<YEAR>-<SEG1>-<SEG2>`
//!
//! MD5 keeps keys interchangeable with those issued by the earlier Python
//! license manager, so its documents stay fully usable.
//!
//! The checksum only catches typos and corruption. Anyone can compute it, so
//! it says nothing about whether a key was actually issued; only the store
//! can answer that.

use std::sync::atomic::{AtomicUsize, Ordering};

use gl_types::{LicenseKey, LicenseTier};
use rand::Rng;
use md5::{Digest, Md5};

use crate::error::{LicenseError, LicenseResult};

/// Literal first field of every key.
pub const KEY_PREFIX: &str = "GL";

/// Length of each random segment.
pub const SEGMENT_LEN: usize = 4;

/// Length of the checksum field.
pub const CHECKSUM_LEN: usize = 4;

/// The fields recovered from a valid key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub key: LicenseKey,
    pub tier: LicenseTier,
    pub year: u16,
    pub segments: [String; 2],
}

/// Computes the checksum field for a key prefix such as `GL-PRO-2025-ABCD-EFGH`.
#[must_use]
pub fn key_checksum(prefix: &str) -> String {
    let digest = Md5::digest(prefix.as_bytes());
    let mut hex = hex::encode_upper(digest);
    hex.truncate(CHECKSUM_LEN);
    hex
}

/// Builds a key from explicit segments.
///
/// This is a pure function: the same inputs always give the same key.
pub fn mint_key(tier: LicenseTier, year: u16, seg1: &str, seg2: &str) -> LicenseResult<LicenseKey> {
    check_year(year)?;
    check_segment(seg1)?;
    check_segment(seg2)?;
    let prefix = format!("{KEY_PREFIX}-{tier}-{year}-{seg1}-{seg2}");
    let checksum = key_checksum(&prefix);
    Ok(LicenseKey::new(format!("{prefix}-{checksum}")))
}

/// Builds a key from two segments drawn from `source`.
pub fn mint_random_key(tier: LicenseTier, year: u16, source: &dyn SegmentSource) -> LicenseResult<LicenseKey> {
    let seg1 = source.next_segment();
    let seg2 = source.next_segment();
    mint_key(tier, year, &seg1, &seg2)
}

/// Parses and checks a candidate key string.
///
/// Surrounding whitespace is ignored. The checksum comparison is exact, so
/// a lowercased checksum is a mismatch.
pub fn validate_key(candidate: &str) -> LicenseResult<DecodedKey> {
    let candidate = candidate.trim();
    let parts: Vec<&str> = candidate.split('-').collect();
    if parts.len() != 6 {
        return Err(LicenseError::MalformedKey(format!(
            "expected 6 dash-separated fields, found {}",
            parts.len()
        )));
    }
    if parts[0] != KEY_PREFIX {
        return Err(LicenseError::MalformedKey(format!(
            "key must start with {KEY_PREFIX}-"
        )));
    }

    let tier = LicenseTier::from_token(parts[1])
        .ok_or_else(|| LicenseError::UnknownTier(parts[1].to_string()))?;

    let year_field = parts[2];
    if year_field.len() != 4 || !year_field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LicenseError::MalformedKey(format!(
            "year must be four digits, found {year_field:?}"
        )));
    }
    let year: u16 = year_field
        .parse()
        .map_err(|_| LicenseError::MalformedKey(format!("invalid year {year_field:?}")))?;

    check_segment(parts[3])?;
    check_segment(parts[4])?;

    let prefix = &candidate[..candidate.len() - parts[5].len() - 1];
    let expected = key_checksum(prefix);
    if parts[5] != expected {
        return Err(LicenseError::ChecksumMismatch {
            expected,
            found: parts[5].to_string(),
        });
    }

    Ok(DecodedKey {
        key: LicenseKey::new(candidate),
        tier,
        year,
        segments: [parts[3].to_string(), parts[4].to_string()],
    })
}

fn check_year(year: u16) -> LicenseResult<()> {
    if (1000..=9999).contains(&year) {
        Ok(())
    } else {
        Err(LicenseError::MalformedKey(format!("year {year} is not four digits")))
    }
}

fn check_segment(segment: &str) -> LicenseResult<()> {
    if segment.len() == SEGMENT_LEN && segment.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(LicenseError::MalformedKey(format!(
            "segment must be {SEGMENT_LEN} uppercase letters, found {segment:?}"
        )))
    }
}

/// Supplies the random segments of new keys.
pub trait SegmentSource: Send + Sync {
    /// Returns a segment of [`SEGMENT_LEN`] uppercase ASCII letters.
    fn next_segment(&self) -> String;
}

/// Segments from the thread-local RNG.
///
/// Two segments give 26^8 (about 2 * 10^11) keys per tier and year.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSegments;

impl SegmentSource for RandomSegments {
    fn next_segment(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..SEGMENT_LEN)
            .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
            .collect()
    }
}

/// Replays a fixed list of segments, wrapping around at the end.
#[derive(Debug)]
pub struct ScriptedSegments {
    segments: Vec<String>,
    next: AtomicUsize,
}

impl ScriptedSegments {
    /// Cycles through `segments` forever.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn cycle<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        assert!(!segments.is_empty(), "scripted segment list must not be empty");
        Self {
            segments,
            next: AtomicUsize::new(0),
        }
    }
}

impl SegmentSource for ScriptedSegments {
    fn next_segment(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.segments.len();
        self.segments[index].clone()
    }
}
