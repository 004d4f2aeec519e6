//! Document timestamp types.

use crate::object::ObjectRef;
use crate::signatures::byterange::ByteRange;
use crate::timestamp::TimestampInfo;

/// `/Contents` size in bytes for a plain timestamp.
pub const DEFAULT_SIGNATURE_SIZE: usize = 8192;

/// `/Contents` size in bytes when LTV data is requested.
pub const LTV_SIGNATURE_SIZE: usize = 16384;

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    Pkcs7Detached,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
    /// ETSI.RFC3161 - Timestamp token
    #[default]
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }
}

/// Options for inserting a timestamp placeholder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PrepareOptions {
    /// Bytes reserved for the DER token (the hex string is twice as long)
    pub signature_size: usize,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
    /// Leave out `/M`
    pub omit_modification_time: bool,
    /// Field name; `Timestamp<N>` when unset
    pub field_name: Option<String>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            signature_size: DEFAULT_SIGNATURE_SIZE,
            reason: None,
            location: None,
            contact_info: None,
            omit_modification_time: false,
            field_name: None,
        }
    }
}

impl PrepareOptions {
    /// Options sized for a token followed by LTV enrichment.
    pub fn for_ltv() -> Self {
        Self {
            signature_size: LTV_SIGNATURE_SIZE,
            ..Self::default()
        }
    }

    /// Set the placeholder size.
    pub fn with_signature_size(mut self, size: usize) -> Self {
        self.signature_size = size;
        self
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Set the field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Leave out `/M`.
    pub fn without_modification_time(mut self) -> Self {
        self.omit_modification_time = true;
        self
    }
}

/// A document with a timestamp placeholder, ready for its token.
#[derive(Debug, Clone)]
pub struct PreparedPdf {
    /// Original bytes plus the incremental update
    pub bytes: Vec<u8>,
    /// Final `/ByteRange`, already patched into `bytes`
    pub byte_range: ByteRange,
    /// Offset of the first hex digit of `/Contents`
    pub contents_offset: usize,
    /// Number of hex digits in the placeholder
    pub placeholder_length: usize,
    /// Signature dictionary
    pub signature_ref: ObjectRef,
    /// Name of the new field
    pub field_name: String,
}

impl PreparedPdf {
    /// Largest DER token that fits, in bytes.
    pub fn capacity(&self) -> usize {
        self.placeholder_length / 2
    }
}

/// A document timestamp found in a PDF.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractedTimestamp {
    /// Fully qualified field name
    pub field_name: String,
    /// TSTInfo view
    pub info: TimestampInfo,
    /// DER token with `/Contents` padding removed
    #[serde(skip)]
    pub token: Vec<u8>,
    /// `/ByteRange`
    pub byte_range: ByteRange,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    /// `/M`, as written
    pub modification_time: Option<String>,
    /// Whether the range reaches the end of the file
    pub covers_whole_document: bool,
    /// Set by verification
    pub verified: Option<bool>,
    /// Set by verification on failure
    pub verification_error: Option<String>,
}

/// Outcome of verifying one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TimestampVerification {
    /// Token signature (and document hash, when checked) hold
    pub verified: bool,
    /// Why verification failed
    pub error: Option<String>,
    /// Whether the document hash was compared
    pub document_checked: bool,
}

impl TimestampVerification {
    pub(crate) fn ok(document_checked: bool) -> Self {
        Self {
            verified: true,
            error: None,
            document_checked,
        }
    }

    pub(crate) fn failed(error: impl Into<String>, document_checked: bool) -> Self {
        Self {
            verified: false,
            error: Some(error.into()),
            document_checked,
        }
    }
}
