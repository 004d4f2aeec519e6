//! RFC 3161 Time-Stamp Protocol structures.

use crate::asn1::time::GenTime;
use der::asn1::{BitString, ObjectIdentifier, OctetString, Uint};
use der::{Any, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::Extensions;

/// ```text
/// MessageImprint ::= SEQUENCE {
///     hashAlgorithm   AlgorithmIdentifier,
///     hashedMessage   OCTET STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

/// ```text
/// TimeStampReq ::= SEQUENCE {
///     version         INTEGER { v1(1) },
///     messageImprint  MessageImprint,
///     reqPolicy       TSAPolicyId OPTIONAL,
///     nonce           INTEGER OPTIONAL,
///     certReq         BOOLEAN DEFAULT FALSE,
///     extensions      [0] IMPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<ObjectIdentifier>,
    #[asn1(optional = "true")]
    pub nonce: Option<Uint>,
    #[asn1(default = "Default::default")]
    pub cert_req: bool,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// ```text
/// PKIStatusInfo ::= SEQUENCE {
///     status        PKIStatus,
///     statusString  PKIFreeText OPTIONAL,
///     failInfo      PKIFailureInfo OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u32,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

/// ```text
/// TimeStampResp ::= SEQUENCE {
///     status          PKIStatusInfo,
///     timeStampToken  TimeStampToken OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<Any>,
}

/// ```text
/// Accuracy ::= SEQUENCE {
///     seconds  INTEGER           OPTIONAL,
///     millis   [0] INTEGER (1..999) OPTIONAL,
///     micros   [1] INTEGER (1..999) OPTIONAL }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    pub seconds: Option<u32>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub millis: Option<u16>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub micros: Option<u16>,
}

/// ```text
/// TSTInfo ::= SEQUENCE {
///     version         INTEGER { v1(1) },
///     policy          TSAPolicyId,
///     messageImprint  MessageImprint,
///     serialNumber    INTEGER,
///     genTime         GeneralizedTime,
///     accuracy        Accuracy OPTIONAL,
///     ordering        BOOLEAN DEFAULT FALSE,
///     nonce           INTEGER OPTIONAL,
///     tsa             [0] GeneralName OPTIONAL,
///     extensions      [1] IMPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Uint,
    pub gen_time: GenTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "Default::default")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Uint>,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub tsa: Option<GeneralName>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

/// PKIStatus values.
pub mod status {
    pub const GRANTED: u32 = 0;
    pub const GRANTED_WITH_MODS: u32 = 1;
    pub const REJECTION: u32 = 2;
    pub const WAITING: u32 = 3;
    pub const REVOCATION_WARNING: u32 = 4;
    pub const REVOCATION_NOTIFICATION: u32 = 5;
}

/// Whether a PKIStatus means a token was issued.
pub fn status_is_granted(status: u32) -> bool {
    matches!(
        status,
        status::GRANTED | status::GRANTED_WITH_MODS | status::REVOCATION_WARNING | status::REVOCATION_NOTIFICATION
    )
}

/// Human-readable PKIStatus.
pub fn status_name(status: u32) -> &'static str {
    match status {
        status::GRANTED => "granted",
        status::GRANTED_WITH_MODS => "grantedWithMods",
        status::REJECTION => "rejection",
        status::WAITING => "waiting",
        status::REVOCATION_WARNING => "revocationWarning",
        status::REVOCATION_NOTIFICATION => "revocationNotification",
        _ => "unknown",
    }
}

/// PKIFailureInfo bit names.
const FAILURE_BITS: &[(usize, &str)] = &[
    (0, "badAlg"),
    (2, "badRequest"),
    (5, "badDataFormat"),
    (14, "timeNotAvailable"),
    (15, "unacceptedPolicy"),
    (16, "unacceptedExtension"),
    (17, "addInfoNotAvailable"),
    (25, "systemFailure"),
];

/// Names of the bits set in a PKIFailureInfo BIT STRING body (without the unused-bits octet).
pub fn failure_info_names(bits: &[u8]) -> Vec<&'static str> {
    FAILURE_BITS
        .iter()
        .filter(|(bit, _)| bits.get(bit / 8).is_some_and(|byte| byte & (0x80 >> (bit % 8)) != 0))
        .map(|(_, name)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};

    fn imprint() -> MessageImprint {
        MessageImprint {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: crate::asn1::oid::SHA256,
                parameters: None,
            },
            hashed_message: OctetString::new(vec![0xAB; 32]).unwrap(),
        }
    }

    #[test]
    fn test_request_encoding() {
        let req = TimeStampReq {
            version: 1,
            message_imprint: imprint(),
            req_policy: None,
            nonce: Some(Uint::new(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap()),
            cert_req: true,
            extensions: None,
        };
        let der = req.to_der().unwrap();
        assert_eq!(der[0], 0x30);
        // certReq TRUE is present because it differs from the default
        assert!(der.windows(3).any(|w| w == [0x01, 0x01, 0xFF]));

        let back = TimeStampReq::from_der(&der).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_status_classification() {
        assert!(status_is_granted(0));
        assert!(status_is_granted(1));
        assert!(!status_is_granted(2));
        assert!(!status_is_granted(3));
        assert!(status_is_granted(4));
        assert!(status_is_granted(5));
        assert_eq!(status_name(2), "rejection");
    }

    #[test]
    fn test_failure_info_names() {
        // badAlg (bit 0) and badDataFormat (bit 5)
        assert_eq!(failure_info_names(&[0b1000_0100]), vec!["badAlg", "badDataFormat"]);
        // systemFailure (bit 25)
        assert_eq!(failure_info_names(&[0, 0, 0, 0b0100_0000]), vec!["systemFailure"]);
        assert!(failure_info_names(&[]).is_empty());
    }
}
