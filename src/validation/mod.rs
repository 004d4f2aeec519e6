//! Timestamp validation.
//!
//! Each timestamp runs through up to six stages; a stage that fails makes
//! the result INVALID, one that cannot decide makes it INDETERMINATE.
//!
//! | stage                | checks                                                   |
//! |----------------------|----------------------------------------------------------|
//! | FORMAT               | token parses, ByteRange in bounds                        |
//! | SIGNATURE            | CMS signature, TSA certificate validity at genTime       |
//! | DOCUMENT_INTEGRITY   | ByteRange digest equals the message imprint              |
//! | ALGORITHM_PROTECTION | RFC 8933 digest algorithm consistency (opt-in)           |
//! | CERTIFICATE_CHAIN    | issuers up to a trusted self-signed root                 |
//! | REVOCATION           | OCSP/CRL status, embedded DSS data before the network    |

mod result;
mod validator;

pub use result::{
    RichValidationResult, ValidationCode, ValidationDetail, ValidationResult, ValidationStage, ValidationStatus,
};
pub use validator::TimestampValidator;
