//! Validation outcomes.

use crate::ltv::{CertificateChain, RevocationInfo};
use crate::timestamp::TimestampInfo;
use std::fmt;

/// Overall or per-stage verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Indeterminate,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationStatus::Valid => "VALID",
            ValidationStatus::Invalid => "INVALID",
            ValidationStatus::Indeterminate => "INDETERMINATE",
        })
    }
}

/// Validation stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStage {
    Format,
    Signature,
    DocumentIntegrity,
    AlgorithmProtection,
    CertificateChain,
    Revocation,
}

/// Error and warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MalformedToken,
    SignatureInvalid,
    MissingTsaCertificate,
    CertificateNotValidAtGenTime,
    MissingTimestampingEku,
    DocumentModified,
    PartialCoverage,
    AlgorithmProtectionFailed,
    AlgorithmProtectionAbsent,
    ChainIncomplete,
    ChainInvalid,
    UntrustedRoot,
    CertificateRevoked,
    RevocationUnknown,
    DeltaCrl,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::MalformedToken => "MALFORMED_TOKEN",
            ValidationCode::SignatureInvalid => "SIGNATURE_INVALID",
            ValidationCode::MissingTsaCertificate => "MISSING_TSA_CERTIFICATE",
            ValidationCode::CertificateNotValidAtGenTime => "CERTIFICATE_NOT_VALID_AT_GEN_TIME",
            ValidationCode::MissingTimestampingEku => "MISSING_TIMESTAMPING_EKU",
            ValidationCode::DocumentModified => "DOCUMENT_MODIFIED",
            ValidationCode::PartialCoverage => "PARTIAL_COVERAGE",
            ValidationCode::AlgorithmProtectionFailed => "ALGORITHM_PROTECTION_FAILED",
            ValidationCode::AlgorithmProtectionAbsent => "ALGORITHM_PROTECTION_ABSENT",
            ValidationCode::ChainIncomplete => "CHAIN_INCOMPLETE",
            ValidationCode::ChainInvalid => "CHAIN_INVALID",
            ValidationCode::UntrustedRoot => "UNTRUSTED_ROOT",
            ValidationCode::CertificateRevoked => "CERTIFICATE_REVOKED",
            ValidationCode::RevocationUnknown => "REVOCATION_UNKNOWN",
            ValidationCode::DeltaCrl => "DELTA_CRL",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationDetail {
    pub stage: ValidationStage,
    pub status: ValidationStatus,
    pub message: String,
}

/// Compact outcome: status and codes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationResult {
    pub field_name: String,
    pub overall_status: ValidationStatus,
    pub errors: Vec<ValidationCode>,
    pub warnings: Vec<ValidationCode>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.overall_status == ValidationStatus::Valid
    }
}

/// Full outcome with per-stage details, revocation evidence and the chain.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RichValidationResult {
    pub field_name: String,
    pub overall_status: ValidationStatus,
    pub errors: Vec<ValidationCode>,
    pub warnings: Vec<ValidationCode>,
    pub details: Vec<ValidationDetail>,
    pub revocation: Vec<RevocationInfo>,
    #[serde(skip)]
    pub chain: Option<CertificateChain>,
    pub info: Option<TimestampInfo>,
}

impl RichValidationResult {
    pub(crate) fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            overall_status: ValidationStatus::Indeterminate,
            errors: Vec::new(),
            warnings: Vec::new(),
            details: Vec::new(),
            revocation: Vec::new(),
            chain: None,
            info: None,
        }
    }

    pub(crate) fn pass(&mut self, stage: ValidationStage, message: impl Into<String>) {
        self.detail(stage, ValidationStatus::Valid, message);
    }

    pub(crate) fn fail(&mut self, stage: ValidationStage, code: ValidationCode, message: impl Into<String>) {
        if !self.errors.contains(&code) {
            self.errors.push(code);
        }
        self.detail(stage, ValidationStatus::Invalid, message);
    }

    pub(crate) fn undecided(&mut self, stage: ValidationStage, code: ValidationCode, message: impl Into<String>) {
        self.warn(code);
        self.detail(stage, ValidationStatus::Indeterminate, message);
    }

    pub(crate) fn warn(&mut self, code: ValidationCode) {
        if !self.warnings.contains(&code) {
            self.warnings.push(code);
        }
    }

    fn detail(&mut self, stage: ValidationStage, status: ValidationStatus, message: impl Into<String>) {
        self.details.push(ValidationDetail {
            stage,
            status,
            message: message.into(),
        });
    }

    /// Derive the overall status: any error is INVALID, any undecided stage INDETERMINATE.
    pub(crate) fn conclude(&mut self) {
        self.overall_status = if !self.errors.is_empty()
            || self.details.iter().any(|d| d.status == ValidationStatus::Invalid)
        {
            ValidationStatus::Invalid
        } else if self.details.iter().any(|d| d.status == ValidationStatus::Indeterminate) {
            ValidationStatus::Indeterminate
        } else {
            ValidationStatus::Valid
        };
    }

    /// Status of `stage`, if it ran.
    pub fn stage(&self, stage: ValidationStage) -> Option<&ValidationDetail> {
        self.details.iter().find(|d| d.stage == stage)
    }

    pub fn is_valid(&self) -> bool {
        self.overall_status == ValidationStatus::Valid
    }

    pub fn summary(&self) -> ValidationResult {
        ValidationResult {
            field_name: self.field_name.clone(),
            overall_status: self.overall_status,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }
}
