//! Turns a [`MetricSnapshot`] into line-protocol measurements.
//!
//! Every record built from one snapshot shares the same timestamp. Derived
//! throughput rates are validated here so that a zero sampling window or a
//! NaN counter is reported as an [`EncodingError`] rather than written to the
//! database.

use crate::domain::{EncodingError, MacUserMetrics, Measurement, MetricSnapshot};
use std::collections::BTreeMap;

/// Name of the per-process resource record.
pub const SYS_MEASUREMENT: &str = "ue_sys";
/// Name of the per-user throughput record.
pub const USER_MEASUREMENT: &str = "ue_user";

#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementBuilder;

impl MeasurementBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the summary record: carrier-0 link quality plus aggregate
    /// downlink/uplink rates over all users.
    pub fn build(
        &self,
        name: &str,
        fixed_tags: &BTreeMap<String, String>,
        snapshot: &MetricSnapshot,
        timestamp: u64,
    ) -> Result<Measurement, EncodingError> {
        check_user_correspondence(snapshot)?;

        let dl = snapshot
            .phy
            .dl
            .first()
            .ok_or(EncodingError::MissingCarrier {
                direction: "downlink",
            })?;

        let mut dl_brate = 0.0;
        let mut ul_brate = 0.0;
        for (user, mac) in snapshot.stack.mac.iter().enumerate() {
            let (user_dl, user_ul) = user_rates(user, mac)?;
            dl_brate += user_dl;
            ul_brate += user_ul;
        }

        let mut measurement = with_tags(Measurement::new(name, timestamp), fixed_tags)
            .field("dl_mcs", finite("dl_mcs", dl.mcs)?)
            .field("dl_snr", finite("dl_snr", dl.snr)?);

        if let Some(ul) = snapshot.phy.ul.first() {
            measurement = measurement.field("ul_mcs", finite("ul_mcs", ul.mcs)?);
        }

        Ok(measurement
            .field("dl_brate", dl_brate.max(0.0))
            .field("ul_brate", ul_brate.max(0.0))
            .field("nof_users", snapshot.stack.mac.len() as i64))
    }

    /// Build the full record set for one reporting period: the summary record,
    /// one process record and one record per user.
    pub fn build_set(
        &self,
        name: &str,
        fixed_tags: &BTreeMap<String, String>,
        snapshot: &MetricSnapshot,
        timestamp: u64,
    ) -> Result<Vec<Measurement>, EncodingError> {
        let mut measurements = Vec::with_capacity(2 + snapshot.stack.mac.len());
        measurements.push(self.build(name, fixed_tags, snapshot, timestamp)?);
        measurements.push(self.build_sys(fixed_tags, snapshot, timestamp)?);

        for (user, (mac, rrc)) in snapshot
            .stack
            .mac
            .iter()
            .zip(&snapshot.stack.rrc)
            .enumerate()
        {
            let (dl_brate, ul_brate) = user_rates(user, mac)?;

            let mut measurement = Measurement::new(USER_MEASUREMENT, timestamp);
            for (key, value) in fixed_tags.iter().filter(|(key, _)| *key != "rnti") {
                measurement = measurement.tag(key.as_str(), value.as_str());
            }
            measurements.push(
                measurement
                    .tag("rnti", rrc.rnti.to_string())
                    .field("dl_brate", dl_brate.max(0.0))
                    .field("ul_brate", ul_brate.max(0.0))
                    .field("tx_pkts", counter(mac.tx_pkts))
                    .field("rx_pkts", counter(mac.rx_pkts))
                    .field("tx_errors", counter(mac.tx_errors))
                    .field("rx_errors", counter(mac.rx_errors)),
            );
        }

        Ok(measurements)
    }

    fn build_sys(
        &self,
        fixed_tags: &BTreeMap<String, String>,
        snapshot: &MetricSnapshot,
        timestamp: u64,
    ) -> Result<Measurement, EncodingError> {
        let sys = &snapshot.sys;
        Ok(with_tags(Measurement::new(SYS_MEASUREMENT, timestamp), fixed_tags)
            .field("proc_rmem_kb", counter(sys.process_realmem_kb))
            .field("proc_vmem_kb", counter(sys.process_virtualmem_kb))
            .field(
                "proc_rmem_pct",
                finite("proc_rmem_pct", sys.process_realmem_pct)?,
            )
            .field("proc_cpu", finite("proc_cpu", sys.process_cpu_usage)?)
            .field("thread_count", sys.thread_count as i64))
    }
}

fn with_tags(mut measurement: Measurement, tags: &BTreeMap<String, String>) -> Measurement {
    for (key, value) in tags {
        measurement = measurement.tag(key.as_str(), value.as_str());
    }
    measurement
}

fn check_user_correspondence(snapshot: &MetricSnapshot) -> Result<(), EncodingError> {
    let mac = snapshot.stack.mac.len();
    let rrc = snapshot.stack.rrc.len();
    if mac != rrc {
        return Err(EncodingError::MismatchedUsers { mac, rrc });
    }
    Ok(())
}

/// Downlink and uplink rate in bytes per second for one user.
fn user_rates(user: usize, mac: &MacUserMetrics) -> Result<(f64, f64), EncodingError> {
    let elapsed_ms = finite("elapsed_ms", mac.elapsed_ms)?;
    if elapsed_ms <= 0.0 {
        return Err(EncodingError::ZeroDuration { user });
    }

    let dl = mac.tx_bytes as f64 * 1000.0 / elapsed_ms;
    let ul = mac.rx_bytes as f64 * 1000.0 / elapsed_ms;
    Ok((dl, ul))
}

fn finite(field: &str, value: f64) -> Result<f64, EncodingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EncodingError::NonFinite {
            field: field.to_string(),
            value,
        })
    }
}

fn counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, PhyDlMetrics, PhyUlMetrics, RrcUserMetrics};

    fn snapshot_with_users(users: &[(u64, u64, f64)]) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::default();
        snapshot.phy.dl.push(PhyDlMetrics {
            mcs: 27.0,
            snr: 18.5,
        });
        snapshot.phy.ul.push(PhyUlMetrics { mcs: 20.0 });
        for (index, &(tx_bytes, rx_bytes, elapsed_ms)) in users.iter().enumerate() {
            snapshot.stack.mac.push(MacUserMetrics {
                tx_bytes,
                rx_bytes,
                elapsed_ms,
                ..Default::default()
            });
            snapshot.stack.rrc.push(RrcUserMetrics {
                rnti: 70 + index as u16,
                state: "connected".to_string(),
            });
        }
        snapshot
    }

    fn tags() -> BTreeMap<String, String> {
        BTreeMap::from([("testbed".to_string(), "lab".to_string())])
    }

    #[test]
    fn test_single_user_rate() {
        let snapshot = snapshot_with_users(&[(1000, 0, 10.0)]);
        let measurement = MeasurementBuilder::new()
            .build("ue_info", &tags(), &snapshot, 99)
            .unwrap();

        assert_eq!(measurement.name, "ue_info");
        assert_eq!(measurement.timestamp, 99);
        assert_eq!(measurement.tag_value("testbed"), Some("lab"));
        assert_eq!(
            measurement.field_value("dl_brate"),
            Some(&FieldValue::Float(100_000.0))
        );
        assert_eq!(
            measurement.field_value("ul_brate"),
            Some(&FieldValue::Float(0.0))
        );
        assert_eq!(
            measurement.field_value("nof_users"),
            Some(&FieldValue::Integer(1))
        );
    }

    #[test]
    fn test_rates_sum_over_users() {
        let snapshot = snapshot_with_users(&[(1000, 500, 10.0), (2000, 0, 1000.0)]);
        let measurement = MeasurementBuilder::new()
            .build("ue_info", &tags(), &snapshot, 1)
            .unwrap();

        assert_eq!(
            measurement.field_value("dl_brate"),
            Some(&FieldValue::Float(102_000.0))
        );
        assert_eq!(
            measurement.field_value("ul_brate"),
            Some(&FieldValue::Float(50_000.0))
        );
    }

    #[test]
    fn test_zero_elapsed_rejected() {
        let snapshot = snapshot_with_users(&[(1000, 0, 10.0), (1000, 0, 0.0)]);
        let result = MeasurementBuilder::new().build("ue_info", &tags(), &snapshot, 1);
        assert_eq!(result, Err(EncodingError::ZeroDuration { user: 1 }));
    }

    #[test]
    fn test_mismatched_users_rejected() {
        let mut snapshot = snapshot_with_users(&[(1000, 0, 10.0), (1000, 0, 10.0)]);
        snapshot.stack.rrc.pop();

        let builder = MeasurementBuilder::new();
        assert_eq!(
            builder.build("ue_info", &tags(), &snapshot, 1),
            Err(EncodingError::MismatchedUsers { mac: 2, rrc: 1 })
        );
        assert!(builder.build_set("ue_info", &tags(), &snapshot, 1).is_err());
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut snapshot = snapshot_with_users(&[(1000, 0, 10.0)]);
        snapshot.phy.dl[0].snr = f64::NAN;
        assert!(matches!(
            MeasurementBuilder::new().build("ue_info", &tags(), &snapshot, 1),
            Err(EncodingError::NonFinite { ref field, .. }) if field == "dl_snr"
        ));

        let mut snapshot = snapshot_with_users(&[(1000, 0, f64::INFINITY)]);
        snapshot.sys.process_cpu_usage = 1.0;
        assert!(matches!(
            MeasurementBuilder::new().build("ue_info", &tags(), &snapshot, 1),
            Err(EncodingError::NonFinite { ref field, .. }) if field == "elapsed_ms"
        ));
    }

    #[test]
    fn test_missing_downlink_carrier() {
        let mut snapshot = snapshot_with_users(&[]);
        snapshot.phy.dl.clear();
        assert_eq!(
            MeasurementBuilder::new().build("ue_info", &tags(), &snapshot, 1),
            Err(EncodingError::MissingCarrier {
                direction: "downlink"
            })
        );
    }

    #[test]
    fn test_build_set_contains_sys_and_per_user_records() {
        let mut snapshot = snapshot_with_users(&[(1000, 0, 10.0), (0, 4000, 2000.0)]);
        snapshot.sys.process_realmem_kb = 2048;
        snapshot.sys.thread_count = 12;
        snapshot.sys.process_cpu_usage = 37.5;

        let set = MeasurementBuilder::new()
            .build_set("ue_info", &tags(), &snapshot, 7)
            .unwrap();

        assert_eq!(set.len(), 4);
        assert!(set.iter().all(|m| m.timestamp == 7));

        let sys = &set[1];
        assert_eq!(sys.name, SYS_MEASUREMENT);
        assert_eq!(
            sys.field_value("proc_rmem_kb"),
            Some(&FieldValue::Integer(2048))
        );
        assert_eq!(
            sys.field_value("thread_count"),
            Some(&FieldValue::Integer(12))
        );

        let second_user = &set[3];
        assert_eq!(second_user.name, USER_MEASUREMENT);
        assert_eq!(second_user.tag_value("rnti"), Some("71"));
        assert_eq!(second_user.tag_value("testbed"), Some("lab"));
        assert_eq!(
            second_user.field_value("ul_brate"),
            Some(&FieldValue::Float(2000.0))
        );
    }
}
