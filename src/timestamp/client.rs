//! RFC 3161 exchange with a Time Stamping Authority.

use crate::error::{Error, Result};
use crate::network::Fetcher;
use crate::timestamp::request::{create_timestamp_request, RequestOptions};
use crate::timestamp::response::{nonce_matches, parse_timestamp_response, validate_timestamp_response};
use crate::timestamp::{HashAlgorithm, TimestampInfo};

/// A validated token returned by a TSA.
#[derive(Debug, Clone)]
pub struct IssuedTimestamp {
    /// DER TimeStampToken
    pub token: Vec<u8>,
    /// TSTInfo view
    pub info: TimestampInfo,
    /// Response decoder that succeeded
    pub decoder: &'static str,
}

/// Posts TimeStampReqs through a [`Fetcher`].
#[derive(Debug, Clone, Copy)]
pub struct TsaClient<'a> {
    fetcher: &'a Fetcher,
}

impl<'a> TsaClient<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    /// Request a token for `hash` from the TSA at `url`.
    ///
    /// The response must be granted, echo the request nonce and carry a
    /// message imprint equal to `hash` under `algorithm`.
    ///
    /// # Errors
    ///
    /// - [`Error::TsaRejected`] if the TSA refused the request
    /// - [`Error::InvalidResponse`] if the nonce is missing or differs
    /// - [`Error::HashMismatch`] if the TSA timestamped something else
    /// - network errors from the resilient client
    pub async fn timestamp(
        &self,
        url: &str,
        hash: &[u8],
        algorithm: HashAlgorithm,
        options: &RequestOptions,
    ) -> Result<IssuedTimestamp> {
        let request = create_timestamp_request(hash, algorithm, options)?;
        log::debug!("Requesting {} timestamp from {}", algorithm, url);

        let body = self.fetcher.request_timestamp(url, &request.der).await?;
        let parsed = parse_timestamp_response(&body)?;
        let decoder = parsed.decoder;
        if decoder != "schema" {
            log::debug!("TSA {} response needed the {} decoder", url, decoder);
        }
        let (token, info) = parsed.into_token()?;

        if !nonce_matches(&info, &request.nonce) {
            return Err(Error::InvalidResponse(format!(
                "TSA {} did not echo the request nonce",
                url
            )));
        }
        if !validate_timestamp_response(&info, hash, algorithm) {
            return Err(Error::HashMismatch(format!(
                "TSA {} timestamped {} {} instead of {} {}",
                url,
                info.hash_algorithm,
                info.message_digest,
                algorithm,
                hex::encode(hash)
            )));
        }
        if options.cert_req && !info.has_certificate {
            log::warn!("TSA {} omitted its certificate despite certReq", url);
        }

        log::info!("Received timestamp from {} (genTime {}, serial {})", url, info.gen_time, info.serial_number);
        Ok(IssuedTimestamp { token, info, decoder })
    }
}
