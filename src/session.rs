//! Staged workflows.
//!
//! [`TimestampSession`] moves `INITIALIZED → PREPARED → COMPLETED`;
//! [`ValidationSession`] moves `INITIALIZED → ACTIVE → COMPLETED`. Calling a
//! method in the wrong state fails with [`Error::InvalidState`] and leaves the
//! session unchanged.

use crate::asn1::TimestampToken;
use crate::config::{TimestampOptions, ValidationOptions};
use crate::error::{Error, Result};
use crate::ltv::{read_dss, LtvData};
use crate::network::Fetcher;
use crate::signatures::{
    embed_timestamp_token, extract_timestamps, prepare_pdf_for_timestamp, ExtractedTimestamp, PreparedPdf,
};
use crate::timestamp::{validate_timestamp_response, TimestampInfo};
use crate::validation::{RichValidationResult, TimestampValidator};

#[derive(Debug)]
enum TimestampState {
    Initialized,
    Prepared {
        prepared: PreparedPdf,
        hash: Vec<u8>,
    },
    Completed {
        bytes: Vec<u8>,
        info: TimestampInfo,
    },
}

impl TimestampState {
    fn name(&self) -> &'static str {
        match self {
            TimestampState::Initialized => "INITIALIZED",
            TimestampState::Prepared { .. } => "PREPARED",
            TimestampState::Completed { .. } => "COMPLETED",
        }
    }
}

/// Adds one document timestamp: prepare, obtain a token for the hash, complete.
#[derive(Debug)]
pub struct TimestampSession {
    options: TimestampOptions,
    state: TimestampState,
}

impl TimestampSession {
    pub fn new(options: TimestampOptions) -> Self {
        Self {
            options,
            state: TimestampState::Initialized,
        }
    }

    pub fn options(&self) -> &TimestampOptions {
        &self.options
    }

    /// Current state name.
    pub fn state(&self) -> &'static str {
        self.state.name()
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Insert the placeholder and hash the ByteRange. Returns the digest to timestamp.
    pub fn prepare(&mut self, pdf: &[u8]) -> Result<&[u8]> {
        if !matches!(self.state, TimestampState::Initialized) {
            return Err(self.invalid("prepare"));
        }
        let prepared = prepare_pdf_for_timestamp(pdf, &self.options.effective_prepare())?;
        let hash = prepared
            .byte_range
            .digest(&prepared.bytes, self.options.hash_algorithm)?;
        log::debug!(
            "Prepared '{}', {} digest {}",
            prepared.field_name,
            self.options.hash_algorithm,
            hex::encode(&hash)
        );
        self.state = TimestampState::Prepared { prepared, hash };
        self.document_hash()
    }

    /// Digest of the prepared ByteRange.
    pub fn document_hash(&self) -> Result<&[u8]> {
        match &self.state {
            TimestampState::Prepared { hash, .. } => Ok(hash),
            _ => Err(self.invalid("read the document hash")),
        }
    }

    /// The prepared document.
    pub fn prepared(&self) -> Result<&PreparedPdf> {
        match &self.state {
            TimestampState::Prepared { prepared, .. } => Ok(prepared),
            _ => Err(self.invalid("read the prepared document")),
        }
    }

    /// Embed `token`, which must timestamp the prepared hash.
    pub fn complete(&mut self, token: &[u8]) -> Result<&TimestampInfo> {
        let (prepared, hash) = match &self.state {
            TimestampState::Prepared { prepared, hash } => (prepared, hash),
            _ => return Err(self.invalid("complete")),
        };
        let info = TimestampToken::from_der(token)?.info()?;
        if !validate_timestamp_response(&info, hash, self.options.hash_algorithm) {
            return Err(Error::HashMismatch(format!(
                "token imprint {} {} does not match the prepared {} digest",
                info.hash_algorithm, info.message_digest, self.options.hash_algorithm
            )));
        }
        let bytes = embed_timestamp_token(prepared, token)?;
        self.state = TimestampState::Completed { bytes, info };
        match &self.state {
            TimestampState::Completed { info, .. } => Ok(info),
            _ => Err(self.invalid("complete")),
        }
    }

    /// The timestamped document.
    pub fn output(&self) -> Result<&[u8]> {
        match &self.state {
            TimestampState::Completed { bytes, .. } => Ok(bytes),
            _ => Err(self.invalid("read the output")),
        }
    }

    /// Take the timestamped document.
    pub fn into_output(self) -> Result<(Vec<u8>, TimestampInfo)> {
        match self.state {
            TimestampState::Completed { bytes, info } => Ok((bytes, info)),
            other => Err(Error::InvalidState {
                operation: "take the output",
                state: other.name(),
            }),
        }
    }
}

#[derive(Debug)]
enum ValidationState {
    Initialized,
    Active {
        pdf: Vec<u8>,
        timestamps: Vec<ExtractedTimestamp>,
        dss: LtvData,
        results: Vec<RichValidationResult>,
    },
    Completed {
        results: Vec<RichValidationResult>,
    },
}

impl ValidationState {
    fn name(&self) -> &'static str {
        match self {
            ValidationState::Initialized => "INITIALIZED",
            ValidationState::Active { .. } => "ACTIVE",
            ValidationState::Completed { .. } => "COMPLETED",
        }
    }
}

/// Validates every timestamp of one document.
#[derive(Debug)]
pub struct ValidationSession {
    options: ValidationOptions,
    state: ValidationState,
}

impl ValidationSession {
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            state: ValidationState::Initialized,
        }
    }

    /// Current state name.
    pub fn state(&self) -> &'static str {
        self.state.name()
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Load `pdf`, its timestamps and its DSS. Returns the number of timestamps.
    pub fn start(&mut self, pdf: &[u8]) -> Result<usize> {
        if !matches!(self.state, ValidationState::Initialized) {
            return Err(self.invalid("start"));
        }
        let timestamps = extract_timestamps(pdf)?;
        let dss = read_dss(pdf)?;
        let count = timestamps.len();
        self.state = ValidationState::Active {
            pdf: pdf.to_vec(),
            timestamps,
            dss,
            results: Vec::new(),
        };
        Ok(count)
    }

    /// Timestamps found by [`start`](Self::start).
    pub fn timestamps(&self) -> Result<&[ExtractedTimestamp]> {
        match &self.state {
            ValidationState::Active { timestamps, .. } => Ok(timestamps),
            _ => Err(self.invalid("list timestamps")),
        }
    }

    /// Validate every timestamp. Without a fetcher only embedded data is consulted.
    pub async fn validate_all(&mut self, fetcher: Option<&Fetcher>) -> Result<&[RichValidationResult]> {
        let state_name = self.state.name();
        let ValidationState::Active {
            pdf,
            timestamps,
            dss,
            results,
        } = &mut self.state
        else {
            return Err(Error::InvalidState {
                operation: "validate",
                state: state_name,
            });
        };

        let validator = TimestampValidator::new(fetcher, &self.options);
        let mut fresh = Vec::with_capacity(timestamps.len());
        for ts in timestamps.iter() {
            fresh.push(validator.validate(pdf, ts, dss).await);
        }
        *results = fresh;
        Ok(results)
    }

    /// Close the session, keeping the results.
    pub fn finish(&mut self) -> Result<&[RichValidationResult]> {
        let state = std::mem::replace(&mut self.state, ValidationState::Initialized);
        match state {
            ValidationState::Active { results, .. } => {
                self.state = ValidationState::Completed { results };
                self.results()
            },
            other => {
                self.state = other;
                Err(self.invalid("finish"))
            },
        }
    }

    /// Results of a completed session.
    pub fn results(&self) -> Result<&[RichValidationResult]> {
        match &self.state {
            ValidationState::Completed { results } => Ok(results),
            _ => Err(self.invalid("read results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_session_order() {
        let mut session = TimestampSession::new(TimestampOptions::default());
        assert_eq!(session.state(), "INITIALIZED");
        let err = session.complete(&[0x30, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "complete",
                state: "INITIALIZED"
            }
        ));
        assert!(session.output().is_err());
        assert!(session.document_hash().is_err());
    }

    #[test]
    fn test_validation_session_order() {
        let mut session = ValidationSession::new(ValidationOptions::default());
        assert!(session.finish().is_err());
        assert_eq!(session.state(), "INITIALIZED");
        assert!(session.results().is_err());
        assert_eq!(session.timestamps().unwrap_err().code(), crate::error::ErrorCode::InvalidState);
    }
}
