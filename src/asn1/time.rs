//! GeneralizedTime that tolerates fractional seconds.
//!
//! TSTInfo `genTime` and OCSP timestamps routinely carry fractions
//! (`20240102030405.123Z`), which the strict DER type rejects.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use der::{DecodeValue, EncodeValue, FixedTag, Header, Length, Reader, Tag, Writer};

/// A `GeneralizedTime` value in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenTime(pub DateTime<Utc>);

impl GenTime {
    /// The instant.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for GenTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl FixedTag for GenTime {
    const TAG: Tag = Tag::GeneralizedTime;
}

impl<'a> DecodeValue<'a> for GenTime {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let bytes = reader.read_vec(header.length)?;
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(parse_generalized_time)
            .map(GenTime)
            .ok_or_else(|| Tag::GeneralizedTime.value_error())
    }
}

impl EncodeValue for GenTime {
    fn value_len(&self) -> der::Result<Length> {
        Ok(Length::new(15))
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(self.0.format("%Y%m%d%H%M%SZ").to_string().as_bytes())
    }
}

/// Parse `YYYYMMDDHHMMSS[.f*](Z|±HHMM)`.
pub fn parse_generalized_time(s: &str) -> Option<DateTime<Utc>> {
    if s.len() < 14 || !s.is_char_boundary(14) {
        return None;
    }
    let (base, rest) = s.split_at(14);
    let naive = NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S").ok()?;

    let (nanos, zone) = match rest.strip_prefix('.').or_else(|| rest.strip_prefix(',')) {
        Some(frac_and_zone) => {
            let digits: String = frac_and_zone.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            let padded = format!("{:0<9}", &digits[..digits.len().min(9)]);
            (padded.parse::<u32>().ok()?, &frac_and_zone[digits.len()..])
        },
        None => (0, rest),
    };

    let offset_secs = match zone {
        "Z" | "" => 0,
        z if z.len() == 5 && (z.starts_with('+') || z.starts_with('-')) => {
            let hours: i32 = z[1..3].parse().ok()?;
            let minutes: i32 = z[3..5].parse().ok()?;
            let secs = hours * 3600 + minutes * 60;
            if z.starts_with('-') {
                -secs
            } else {
                secs
            }
        },
        _ => return None,
    };

    let utc = Utc.from_utc_datetime(&naive) - chrono::Duration::seconds(offset_secs as i64);
    utc.checked_add_signed(chrono::Duration::nanoseconds(nanos as i64))
}
