//! TimeStampResp parsing.
//!
//! Decoding goes through a list of [`ResponseDecoder`]s tried in order: the
//! strict schema decoder first, then a positional walker that tolerates
//! servers emitting slightly non-conformant encodings. The first decoder that
//! succeeds provides the whole result.

use crate::asn1::cms::TimestampToken;
use crate::asn1::tlv::{self, read_tlv};
use crate::asn1::tsp::{failure_info_names, status_is_granted, status_name, TimeStampResp};
use crate::error::{Error, Result};
use crate::timestamp::{HashAlgorithm, TimestampInfo};
use der::{Decode, Encode};

/// Smallest plausible TimeStampResp (status-only rejection).
pub const MIN_RESPONSE_LEN: usize = 11;

/// Response fields before token interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTimestampResponse {
    /// PKIStatus
    pub status: u32,
    /// statusString entries
    pub status_text: Vec<String>,
    /// Names of failInfo bits set
    pub fail_info: Vec<&'static str>,
    /// Encoded TimeStampToken
    pub token: Option<Vec<u8>>,
}

/// Decodes the outer TimeStampResp.
pub trait ResponseDecoder {
    /// Decoder name for logs.
    fn name(&self) -> &'static str;

    /// Decode `der`.
    fn decode(&self, der: &[u8]) -> Result<RawTimestampResponse>;
}

/// Strict decoder over the typed schema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaDecoder;

impl ResponseDecoder for SchemaDecoder {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn decode(&self, der: &[u8]) -> Result<RawTimestampResponse> {
        let resp = TimeStampResp::from_der(der)?;
        Ok(RawTimestampResponse {
            status: resp.status.status,
            status_text: resp.status.status_string.unwrap_or_default(),
            fail_info: resp
                .status
                .fail_info
                .as_ref()
                .map(|bits| failure_info_names(bits.raw_bytes()))
                .unwrap_or_default(),
            token: resp.time_stamp_token.map(|t| t.to_der()).transpose()?,
        })
    }
}

/// Field-position decoder.
///
/// Reads `status` as the first element of the first SEQUENCE (INTEGER or
/// ENUMERATED), takes string and BIT STRING siblings as statusString and
/// failInfo, and the second top-level element as the token, whatever its
/// inner encoding. Trailing garbage after the response is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalDecoder;

impl ResponseDecoder for PositionalDecoder {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn decode(&self, der: &[u8]) -> Result<RawTimestampResponse> {
        let (outer, _) = read_tlv(der)?;
        let fields = outer.children()?;
        let status_info = fields
            .first()
            .ok_or_else(|| Error::Asn1("empty TimeStampResp".to_string()))?;

        let mut status_text = Vec::new();
        let mut fail_info = Vec::new();
        let status = if status_info.is_constructed() {
            let parts = status_info.children()?;
            let status = parts
                .first()
                .ok_or_else(|| Error::Asn1("PKIStatusInfo has no status".to_string()))?
                .as_u64()?;
            for part in parts.iter().skip(1) {
                match part.tag {
                    tlv::tag::SEQUENCE => {
                        for text in part.children()? {
                            status_text.push(String::from_utf8_lossy(text.value).into_owned());
                        }
                    },
                    tlv::tag::UTF8_STRING => status_text.push(String::from_utf8_lossy(part.value).into_owned()),
                    tlv::tag::BIT_STRING if !part.value.is_empty() => {
                        fail_info = failure_info_names(&part.value[1..]);
                    },
                    _ => {},
                }
            }
            status
        } else {
            status_info.as_u64()?
        };

        Ok(RawTimestampResponse {
            status: u32::try_from(status).map_err(|_| Error::Asn1("PKIStatus out of range".to_string()))?,
            status_text,
            fail_info,
            token: fields.get(1).map(|t| t.raw.to_vec()),
        })
    }
}

/// A decoded TimeStampResp.
#[derive(Debug, Clone)]
pub struct ParsedTimestampResponse {
    /// PKIStatus
    pub status: u32,
    /// statusString entries
    pub status_text: Vec<String>,
    /// Names of failInfo bits set
    pub fail_info: Vec<&'static str>,
    /// Encoded token; only present for granted statuses
    pub token: Option<Vec<u8>>,
    /// TSTInfo view of the token
    pub info: Option<TimestampInfo>,
    /// Decoder that produced this result
    pub decoder: &'static str,
}

impl ParsedTimestampResponse {
    /// Whether the TSA issued a token.
    pub fn is_granted(&self) -> bool {
        status_is_granted(self.status)
    }

    /// Status, text and failure info in one line.
    pub fn status_message(&self) -> String {
        let mut message = status_name(self.status).to_string();
        if !self.status_text.is_empty() {
            message.push_str(": ");
            message.push_str(&self.status_text.join("; "));
        }
        if !self.fail_info.is_empty() {
            message.push_str(&format!(" [{}]", self.fail_info.join(", ")));
        }
        message
    }

    /// Token and info of a granted response.
    ///
    /// # Errors
    ///
    /// [`Error::TsaRejected`] for rejection statuses, [`Error::InvalidResponse`]
    /// when a granted response carries no token.
    pub fn into_token(self) -> Result<(Vec<u8>, TimestampInfo)> {
        if !self.is_granted() {
            return Err(Error::TsaRejected {
                status: self.status,
                message: self.status_message(),
            });
        }
        match (self.token, self.info) {
            (Some(token), Some(info)) => Ok((token, info)),
            _ => Err(Error::InvalidResponse("granted response carries no timestamp token".to_string())),
        }
    }
}

/// Parse a TimeStampResp with the default decoder chain.
pub fn parse_timestamp_response(bytes: &[u8]) -> Result<ParsedTimestampResponse> {
    parse_timestamp_response_with(bytes, &[&SchemaDecoder, &PositionalDecoder])
}

/// Parse with an explicit decoder chain.
pub fn parse_timestamp_response_with(
    bytes: &[u8],
    decoders: &[&dyn ResponseDecoder],
) -> Result<ParsedTimestampResponse> {
    if bytes.len() < MIN_RESPONSE_LEN {
        return Err(Error::InvalidResponse(format!(
            "response of {} bytes is too short for a TimeStampResp",
            bytes.len()
        )));
    }

    let mut last_error = None;
    let mut decoded = None;
    for decoder in decoders {
        match decoder.decode(bytes) {
            Ok(raw) => {
                decoded = Some((decoder.name(), raw));
                break;
            },
            Err(e) => {
                log::debug!("{} decoder rejected TimeStampResp: {}", decoder.name(), e);
                last_error = Some(e);
            },
        }
    }
    let (decoder, raw) = decoded.ok_or_else(|| {
        Error::InvalidResponse(match last_error {
            Some(e) => format!("unable to decode TimeStampResp: {}", e),
            None => "no response decoder configured".to_string(),
        })
    })?;

    let granted = status_is_granted(raw.status);
    let (token, info) = match raw.token {
        Some(token) if granted => {
            let parsed = TimestampToken::from_der(&token)?;
            let info = parsed.info()?;
            (Some(token), Some(info))
        },
        Some(_) => {
            log::warn!("Ignoring token in response with status {}", status_name(raw.status));
            (None, None)
        },
        None => (None, None),
    };

    Ok(ParsedTimestampResponse {
        status: raw.status,
        status_text: raw.status_text,
        fail_info: raw.fail_info,
        token,
        info,
        decoder,
    })
}

/// Whether `info` timestamps `hash` under `algorithm`.
pub fn validate_timestamp_response(info: &TimestampInfo, hash: &[u8], algorithm: HashAlgorithm) -> bool {
    info.hash_algorithm == algorithm && info.message_digest.eq_ignore_ascii_case(&hex::encode(hash))
}

/// Whether the TSTInfo echoes the request nonce.
pub fn nonce_matches(info: &TimestampInfo, nonce: &[u8]) -> bool {
    info.nonce
        .as_deref()
        .is_some_and(|echoed| tlv::strip_leading_zeros(echoed) == tlv::strip_leading_zeros(nonce))
}
