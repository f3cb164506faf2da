//! Plain-text and JSON views of the license document.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use gl_store::LicenseDocument;
use gl_types::{LicenseRecord, LicenseStatus, LicenseTier, RevocationRecord};
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A flattened license for `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseView {
    pub license_key: String,
    pub license_type: LicenseTier,
    pub owner: String,
    pub email: String,
    pub status: LicenseStatus,
    pub days_left: i64,
    pub expiry_date: DateTime<Utc>,
    pub devices: usize,
    pub max_devices: u32,
}

impl LicenseView {
    #[must_use]
    pub fn from_record(record: &LicenseRecord, now: DateTime<Utc>) -> Self {
        Self {
            license_key: record.license_key.to_string(),
            license_type: record.tier,
            owner: record.owner_info.name.clone(),
            email: record.owner_info.email.clone(),
            status: record.status_at(now),
            days_left: record.days_remaining(now),
            expiry_date: record.expiry_at,
            devices: record.bound_count(),
            max_devices: record.max_devices,
        }
    }
}

/// The system summary: totals, then every active and revoked license.
#[must_use]
pub fn render_summary(document: &LicenseDocument, now: DateTime<Utc>) -> String {
    let counts = document.counts(now);
    let mut out = String::new();

    let _ = writeln!(out, "LICENSE SYSTEM SUMMARY");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Total Licenses: {}", counts.total);
    let _ = writeln!(out, "Active Licenses: {}", counts.active);
    let _ = writeln!(out, "Expired Licenses: {}", counts.expired);
    let _ = writeln!(out, "Revoked Licenses: {}", counts.revoked);
    let _ = writeln!(out, "Blacklisted Devices: {}", counts.blacklisted);
    out.push('\n');

    if !document.license_keys.is_empty() {
        let _ = writeln!(out, "ACTIVE LICENSES:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for record in document.license_keys.values() {
            let _ = writeln!(out, "Key: {}", record.license_key);
            let _ = writeln!(out, "Type: {}", record.tier);
            let _ = writeln!(out, "Owner: {}", record.owner_info.name);
            let _ = writeln!(out, "Devices: {}/{}", record.bound_count(), record.max_devices);
            let _ = writeln!(out, "Status: {}", status_line(record, now));
            out.push('\n');
        }
    }

    if !document.revoked_licenses.is_empty() {
        let _ = writeln!(out, "REVOKED LICENSES:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for revocation in document.revoked_licenses.values() {
            out.push_str(&render_revocation(revocation));
            out.push('\n');
        }
    }

    out
}

/// Full detail for one active license.
#[must_use]
pub fn render_license(record: &LicenseRecord, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Key: {}", record.license_key);
    let _ = writeln!(out, "Type: {}", record.tier);
    let _ = writeln!(out, "Owner: {} ({})", record.owner_info.name, record.owner_info.email);
    let _ = writeln!(out, "Created: {}", record.created_at.format(DATE_FORMAT));
    let _ = writeln!(out, "Expires: {}", record.expiry_at.format(DATE_FORMAT));
    let _ = writeln!(out, "Status: {}", status_line(record, now));
    let _ = writeln!(out, "Devices: {}/{}", record.bound_count(), record.max_devices);
    for (device, binding) in &record.device_bindings {
        let name = binding.device_name.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "  {device} {name} (first {}, last {})",
            binding.first_activation.format(DATE_FORMAT),
            binding.last_seen.format(DATE_FORMAT)
        );
    }
    let features: Vec<&str> = record.features.iter().map(|f| f.as_str()).collect();
    let _ = writeln!(out, "Features: {}", features.join(", "));
    let stats = &record.usage_statistics;
    let _ = writeln!(
        out,
        "Activations: {}, Launches: {}",
        stats.total_activations, stats.total_launches
    );
    out
}

#[must_use]
pub fn render_revocation(revocation: &RevocationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Key: {}", revocation.license_key);
    let _ = writeln!(out, "Revoked: {}", revocation.revoked_at.format(DATE_FORMAT));
    let _ = writeln!(out, "Reason: {}", revocation.reason);
    let _ = writeln!(out, "Original Expiry: {}", revocation.original_expiry.format(DATE_FORMAT));
    out
}

fn status_line(record: &LicenseRecord, now: DateTime<Utc>) -> String {
    if record.is_expired(now) {
        format!("Expired ({})", record.expiry_at.format(DATE_FORMAT))
    } else {
        format!("Active ({} days left)", record.days_remaining(now))
    }
}
