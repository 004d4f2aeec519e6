//! Signature verification for RSA PKCS#1 v1.5 and ECDSA (P-256, P-384).

use crate::asn1::oid;
use crate::error::{Error, Result};
use crate::timestamp::HashAlgorithm;
use der::asn1::ObjectIdentifier;
use der::Decode;
use signature::hazmat::PrehashVerifier;
use spki::SubjectPublicKeyInfoRef;

/// Digest implied by a signature algorithm OID, if it names one.
pub fn digest_for_signature_algorithm(alg: &ObjectIdentifier) -> Option<HashAlgorithm> {
    match *alg {
        oid::SHA1_WITH_RSA | oid::ECDSA_WITH_SHA1 => Some(HashAlgorithm::Sha1),
        oid::SHA256_WITH_RSA | oid::ECDSA_WITH_SHA256 => Some(HashAlgorithm::Sha256),
        oid::SHA384_WITH_RSA | oid::ECDSA_WITH_SHA384 => Some(HashAlgorithm::Sha384),
        oid::SHA512_WITH_RSA | oid::ECDSA_WITH_SHA512 => Some(HashAlgorithm::Sha512),
        _ => None,
    }
}

/// Verify `signature` over `message` with the key in `spki_der`.
///
/// The digest comes from `signature_algorithm` when it names one
/// (`sha256WithRSAEncryption`, `ecdsa-with-SHA384`, ...); bare key algorithms
/// (`rsaEncryption`, as CMS signers often declare) fall back to `digest`.
pub fn verify(
    spki_der: &[u8],
    signature_algorithm: &ObjectIdentifier,
    digest: Option<HashAlgorithm>,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    if *signature_algorithm == oid::RSASSA_PSS {
        return Err(Error::Unsupported("RSASSA-PSS signatures".to_string()));
    }
    let hash = digest_for_signature_algorithm(signature_algorithm)
        .or(digest)
        .ok_or_else(|| Error::Unsupported(format!("signature algorithm {}", signature_algorithm)))?;
    let prehash = hash.digest(message);

    let spki = SubjectPublicKeyInfoRef::from_der(spki_der)
        .map_err(|e| Error::Certificate(format!("invalid public key info: {}", e)))?;

    match spki.algorithm.oid {
        oid::RSA_ENCRYPTION => verify_rsa(spki_der, hash, &prehash, signature),
        oid::EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|_| Error::Certificate("EC key without named curve".to_string()))?;
            match curve {
                oid::SECP256R1 => {
                    use p256::pkcs8::DecodePublicKey;
                    let key = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                        .map_err(|e| Error::Certificate(format!("invalid P-256 key: {}", e)))?;
                    let sig = p256::ecdsa::Signature::from_der(signature)
                        .map_err(|e| Error::Verification(format!("malformed ECDSA signature: {}", e)))?;
                    key.verify_prehash(&prehash, &sig)
                        .map_err(|_| Error::Verification("ECDSA P-256 signature does not verify".to_string()))
                },
                oid::SECP384R1 => {
                    use p384::pkcs8::DecodePublicKey;
                    let key = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                        .map_err(|e| Error::Certificate(format!("invalid P-384 key: {}", e)))?;
                    let sig = p384::ecdsa::Signature::from_der(signature)
                        .map_err(|e| Error::Verification(format!("malformed ECDSA signature: {}", e)))?;
                    key.verify_prehash(&prehash, &sig)
                        .map_err(|_| Error::Verification("ECDSA P-384 signature does not verify".to_string()))
                },
                other => Err(Error::Unsupported(format!("elliptic curve {}", other))),
            }
        },
        other => Err(Error::Unsupported(format!("public key algorithm {}", other))),
    }
}

fn verify_rsa(spki_der: &[u8], hash: HashAlgorithm, prehash: &[u8], signature: &[u8]) -> Result<()> {
    use rsa::pkcs8::DecodePublicKey;
    use rsa::Pkcs1v15Sign;

    let key = rsa::RsaPublicKey::from_public_key_der(spki_der)
        .map_err(|e| Error::Certificate(format!("invalid RSA key: {}", e)))?;
    let scheme = match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    };
    key.verify(scheme, prehash, signature)
        .map_err(|_| Error::Verification("RSA signature does not verify".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{signature::Signer, DerSignature, SigningKey};
    use p256::pkcs8::EncodePublicKey;

    fn key_pair() -> (SigningKey, Vec<u8>) {
        let signing = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let spki = signing.verifying_key().to_public_key_der().unwrap().as_bytes().to_vec();
        (signing, spki)
    }

    #[test]
    fn test_ecdsa_p256_round_trip() {
        let (signing, spki) = key_pair();
        let sig: DerSignature = signing.sign(b"to be signed");
        verify(&spki, &oid::ECDSA_WITH_SHA256, None, b"to be signed", sig.as_bytes()).unwrap();
    }

    #[test]
    fn test_ecdsa_rejects_other_message() {
        let (signing, spki) = key_pair();
        let sig: DerSignature = signing.sign(b"to be signed");
        let err = verify(&spki, &oid::ECDSA_WITH_SHA256, None, b"tampered", sig.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Verification(_)));
    }

    #[test]
    fn test_bare_key_algorithm_uses_digest_hint() {
        let (signing, spki) = key_pair();
        let sig: DerSignature = signing.sign(b"msg");
        assert!(verify(&spki, &oid::EC_PUBLIC_KEY, None, b"msg", sig.as_bytes()).is_err());
        verify(&spki, &oid::EC_PUBLIC_KEY, Some(HashAlgorithm::Sha256), b"msg", sig.as_bytes()).unwrap();
    }

    #[test]
    fn test_pss_unsupported() {
        let (_, spki) = key_pair();
        let err = verify(&spki, &oid::RSASSA_PSS, None, b"m", b"s").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Unsupported);
    }
}
