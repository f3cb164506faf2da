use gl_license::LicenseError;
use gl_store::StoreError;

#[test]
fn error_display_malformed_key() {
    let err = LicenseError::MalformedKey("bad format".into());
    assert!(format!("{err}").contains("malformed license key"));
}

#[test]
fn error_display_checksum_mismatch() {
    let err = LicenseError::ChecksumMismatch {
        expected: "AB12".into(),
        found: "0000".into(),
    };
    let msg = format!("{err}");
    assert!(msg.contains("AB12"));
    assert!(msg.contains("0000"));
}

#[test]
fn error_display_expired() {
    let err = LicenseError::Expired("2025-01-01T00:00:00Z".into());
    assert!(format!("{err}").contains("expired"));
}

#[test]
fn error_display_quota() {
    let err = LicenseError::QuotaExceeded(3);
    assert!(format!("{err}").contains("max 3"));
}

#[test]
fn store_errors_map_to_license_errors() {
    assert!(matches!(
        LicenseError::from(StoreError::NotFound("k".into())),
        LicenseError::NotFound(k) if k == "k"
    ));
    assert!(matches!(
        LicenseError::from(StoreError::DuplicateKey("k".into())),
        LicenseError::DuplicateKey(_)
    ));
    assert!(matches!(
        LicenseError::from(StoreError::DeviceBlacklisted("d".into())),
        LicenseError::DeviceBlacklisted(_)
    ));
    assert!(matches!(
        LicenseError::from(StoreError::QuotaExceeded(5)),
        LicenseError::QuotaExceeded(5)
    ));
    assert!(matches!(
        LicenseError::from(StoreError::PermanentBlacklist("d".into())),
        LicenseError::PermanentBlacklist(_)
    ));
}

#[test]
fn io_errors_become_io_failure() {
    let err = LicenseError::from(StoreError::Io(std::io::Error::other("disk full")));
    assert!(matches!(err, LicenseError::IoFailure(_)));
    assert!(format!("{err}").contains("disk full"));
}

#[test]
fn other_store_errors_are_wrapped() {
    let err = LicenseError::from(StoreError::InvalidData("bad counters".into()));
    assert!(matches!(err, LicenseError::Storage(_)));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn type_errors_map_to_license_errors() {
    let err = LicenseError::from(gl_types::Error::UnknownTier("GOLD".into()));
    assert!(matches!(err, LicenseError::UnknownTier(t) if t == "GOLD"));

    let err = LicenseError::from(gl_types::Error::InvalidDeviceId(String::new()));
    assert!(matches!(err, LicenseError::InvalidInput(_)));
}

#[test]
fn error_is_debug() {
    let err = LicenseError::NotFound("GL-PRO-2025-ABCD-EFGH-0000".into());
    let debug = format!("{err:?}");
    assert!(debug.contains("NotFound"));
}
