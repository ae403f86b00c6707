//! trustcache Test Utilities
//!
//! Shared test infrastructure for the trustcache workspace:
//! - Real certificates, CRLs and proxy credentials generated at test time
//! - Instrumented loaders for counting and slowing down loads
//! - Proptest generators for names, metadata and serials
//! - Helpers for file-backed scenarios with controlled modification times

// Re-export core types for convenience
pub use trustcache_core::{ObjectKind, ResourceMetadata, Timestamp};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Real X.509 material built with `rcgen`.

    use rcgen::{
        date_time_ymd, BasicConstraints, CertificateParams, CertificateRevocationListParams,
        DistinguishedName, DnType, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose,
        RevocationReason, RevokedCertParams, SerialNumber,
    };
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    /// A self-signed certificate authority that can issue CRLs and leaves.
    pub struct TestCa {
        cert: rcgen::Certificate,
        key: KeyPair,
    }

    /// A leaf certificate and its private key, both PEM.
    #[derive(Debug, Clone)]
    pub struct LeafCredential {
        pub cert_pem: String,
        pub key_pem: String,
    }

    fn distinguished_name(common_name: &str) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "trustcache tests");
        dn.push(DnType::CommonName, common_name);
        dn
    }

    impl TestCa {
        pub fn new(common_name: &str) -> Self {
            let key = KeyPair::generate().expect("generate CA key");
            let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
            params.distinguished_name = distinguished_name(common_name);
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
                KeyUsagePurpose::DigitalSignature,
            ];
            params.not_before = date_time_ymd(2020, 1, 1);
            params.not_after = date_time_ymd(2040, 1, 1);
            let cert = params.self_signed(&key).expect("self-sign CA");
            Self { cert, key }
        }

        pub fn cert_pem(&self) -> String {
            self.cert.pem()
        }

        pub fn cert_der(&self) -> Vec<u8> {
            self.cert.der().to_vec()
        }

        fn crl(&self, crl_number: u64, revoked: &[u64]) -> rcgen::CertificateRevocationList {
            let revoked_certs = revoked
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from(*serial),
                    revocation_time: date_time_ymd(2024, 1, 1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect();
            CertificateRevocationListParams {
                this_update: date_time_ymd(2024, 1, 1),
                next_update: date_time_ymd(2039, 1, 1),
                crl_number: SerialNumber::from(crl_number),
                issuing_distribution_point: None,
                revoked_certs,
                key_identifier_method: KeyIdMethod::Sha256,
            }
            .signed_by(&self.cert, &self.key)
            .expect("sign CRL")
        }

        /// A PEM CRL revoking the given serial numbers.
        pub fn crl_pem(&self, crl_number: u64, revoked: &[u64]) -> String {
            self.crl(crl_number, revoked).pem().expect("encode CRL")
        }

        pub fn crl_der(&self, crl_number: u64, revoked: &[u64]) -> Vec<u8> {
            self.crl(crl_number, revoked).der().to_vec()
        }

        /// Issue an end-entity certificate signed by this CA.
        pub fn issue_leaf(&self, common_name: &str) -> LeafCredential {
            let key = KeyPair::generate().expect("generate leaf key");
            let mut params = CertificateParams::new(Vec::<String>::new()).expect("leaf params");
            params.distinguished_name = distinguished_name(common_name);
            params.is_ca = IsCa::ExplicitNoCa;
            params.not_before = date_time_ymd(2024, 1, 1);
            params.not_after = date_time_ymd(2039, 1, 1);
            let cert = params
                .signed_by(&key, &self.cert, &self.key)
                .expect("sign leaf");
            LeafCredential {
                cert_pem: cert.pem(),
                key_pem: key.serialize_pem(),
            }
        }
    }

    /// Write `contents` to `path` and pin its modification time to
    /// `secs` seconds after the Unix epoch.
    pub fn write_with_mtime(path: &Path, contents: impl AsRef<[u8]>, secs: u64) {
        fs::write(path, contents).expect("write fixture");
        let file = File::options().write(true).open(path).expect("reopen fixture");
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .expect("set mtime");
    }
}

// ============================================================================
// INSTRUMENTED LOADERS
// ============================================================================

pub mod loaders {
    //! Loaders that wrap another loader and observe it.

    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use trustcache_core::{LoadError, ObjectKind, ObjectLoader};

    /// Counts calls to the inner loader and optionally sleeps before each,
    /// to widen race windows in concurrency tests.
    #[derive(Debug)]
    pub struct CountingLoader<L> {
        inner: L,
        loads: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl<L: ObjectLoader> CountingLoader<L> {
        pub fn new(inner: L) -> Self {
            Self {
                inner,
                loads: Arc::new(AtomicUsize::new(0)),
                delay: None,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Shared counter, readable after the loader has moved into a store.
        pub fn counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.loads)
        }

        pub fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl<L: ObjectLoader> ObjectLoader for CountingLoader<L> {
        type Object = L::Object;

        fn kind(&self) -> ObjectKind {
            self.inner.kind()
        }

        fn load(&self, stream: &mut dyn Read) -> Result<Self::Object, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            self.inner.load(stream)
        }
    }

    /// Loader producing the resource content as a UTF-8 string.
    #[derive(Debug, Clone, Copy)]
    pub struct TextLoader {
        kind: ObjectKind,
    }

    impl TextLoader {
        pub fn new(kind: ObjectKind) -> Self {
            Self { kind }
        }
    }

    impl ObjectLoader for TextLoader {
        type Object = String;

        fn kind(&self) -> ObjectKind {
            self.kind
        }

        fn load(&self, stream: &mut dyn Read) -> Result<String, LoadError> {
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            let text = String::from_utf8(bytes)
                .map_err(|e| LoadError::unsupported(format!("not UTF-8 text: {e}")))?;
            if text.trim().is_empty() {
                return Err(LoadError::malformed("empty resource"));
            }
            Ok(text)
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for trustcache types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    pub fn arb_metadata() -> impl Strategy<Value = ResourceMetadata> {
        prop_oneof![
            1 => Just(ResourceMetadata::absent()),
            4 => (proptest::option::of(arb_timestamp()), proptest::option::of(0u64..1 << 20))
                .prop_map(|(lm, size)| ResourceMetadata::present(lm, size)),
        ]
    }

    pub fn arb_object_kind() -> impl Strategy<Value = ObjectKind> {
        prop_oneof![
            Just(ObjectKind::Crl),
            Just(ObjectKind::CaCertificate),
            Just(ObjectKind::TrustAnchorBundle),
            Just(ObjectKind::ProxyCredential),
        ]
    }

    /// File names as they appear in a CA certificates directory.
    pub fn arb_resource_name() -> impl Strategy<Value = String> {
        ("[0-9a-f]{8}", prop_oneof![Just("r0"), Just("0"), Just("pem")])
            .prop_map(|(hash, ext)| format!("{hash}.{ext}"))
    }

    /// Absolute paths with redundant separators and `.` segments mixed in.
    pub fn arb_messy_path() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                3 => "[a-z0-9_-]{1,8}",
                1 => Just(".".to_string()),
                1 => Just(String::new()),
            ],
            1..6,
        )
        .prop_map(|parts| format!("/{}", parts.join("/")))
    }

    /// Hex serial numbers, possibly with leading zeros and mixed case.
    pub fn arb_serial_hex() -> impl Strategy<Value = String> {
        ("0{0,3}", "[0-9a-fA-F]{1,16}").prop_map(|(zeros, digits)| format!("{zeros}{digits}"))
    }
}
