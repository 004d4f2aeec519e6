//! RFC 3161 requests, responses and the TSA exchange.

mod client;
mod info;
pub mod request;
pub mod response;

pub use client::{IssuedTimestamp, TsaClient};
pub use info::{HashAlgorithm, TimestampAccuracy, TimestampInfo};
pub use request::{create_timestamp_request, parse_timestamp_request, RequestOptions, TimestampRequest};
pub use response::{
    nonce_matches, parse_timestamp_response, parse_timestamp_response_with, validate_timestamp_response,
    ParsedTimestampResponse, PositionalDecoder, RawTimestampResponse, ResponseDecoder, SchemaDecoder,
};
