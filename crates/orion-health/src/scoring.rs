//! Composite health scoring (spec §4.K steps 2-4).

use crate::metrics::HealthMetrics;
use serde::{Deserialize, Serialize};

/// Low/high bands for one penalty's step function (spec §4.K step 2):
/// a count at or below `low` draws 30% of the metric's max penalty,
/// above `low` and at or below `high` draws 60%, above `high` draws
/// the full 100%.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepThresholds {
    pub low: f64,
    pub high: f64,
}

impl StepThresholds {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn fraction(&self, count: f64) -> f64 {
        if count <= 0.0 {
            0.0
        } else if count <= self.low {
            0.3
        } else if count <= self.high {
            0.6
        } else {
            1.0
        }
    }
}

/// Per-metric `{low, high}` thresholds feeding every component's step
/// function (spec §4.K step 2). Each field corresponds to one raw
/// count gathered in [`HealthMetrics`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringThresholds {
    pub unknown_devices: StepThresholds,
    pub untagged_devices: StepThresholds,
    pub high_risk_changes: StepThresholds,
    pub high_anomalies: StepThresholds,
    pub intel_matches_24h: StepThresholds,
    pub intel_matches_7d: StepThresholds,
    pub suricata_alerts_24h: StepThresholds,
    pub critical_events_7d: StepThresholds,
    pub new_devices_7d: StepThresholds,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            unknown_devices: StepThresholds::new(2.0, 5.0),
            untagged_devices: StepThresholds::new(2.0, 5.0),
            high_risk_changes: StepThresholds::new(1.0, 3.0),
            high_anomalies: StepThresholds::new(2.0, 5.0),
            intel_matches_24h: StepThresholds::new(1.0, 3.0),
            intel_matches_7d: StepThresholds::new(3.0, 8.0),
            suricata_alerts_24h: StepThresholds::new(3.0, 8.0),
            critical_events_7d: StepThresholds::new(1.0, 3.0),
            new_devices_7d: StepThresholds::new(2.0, 5.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_composite(score: i64) -> Self {
        if score >= 90 {
            Grade::A
        } else if score >= 80 {
            Grade::B
        } else if score >= 70 {
            Grade::C
        } else if score >= 60 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentScore {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub penalty: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub composite: i64,
    pub grade: Grade,
    pub inventory: ComponentScore,
    pub threat: ComponentScore,
    pub change: ComponentScore,
    pub hygiene: ComponentScore,
    pub recommendations: Vec<String>,
}

fn step_penalty(count: usize, thresholds: StepThresholds, max_penalty: f64) -> f64 {
    max_penalty * thresholds.fraction(count as f64)
}

fn score_inventory(metrics: &HealthMetrics, thresholds: &ScoringThresholds) -> ComponentScore {
    let unknown_penalty = step_penalty(metrics.unknown_devices, thresholds.unknown_devices, 30.0);
    // Unknown-type and untagged are gathered as separate counts (a
    // device can have a guessed type and still carry no tags), but an
    // unmanaged fleet tends to produce both symptoms from the same
    // devices. Taking the worst single driver avoids double-counting
    // that overlap rather than summing two views of one problem.
    let untagged_penalty = step_penalty(metrics.untagged_devices, thresholds.untagged_devices, 20.0);
    let high_risk_penalty = step_penalty(metrics.high_risk_changes_7d, thresholds.high_risk_changes, 50.0);
    let penalty = unknown_penalty.max(untagged_penalty).max(high_risk_penalty);
    let score = (100.0 - penalty).max(0.0);

    let reason = if metrics.unknown_devices > 0 {
        Some(format!("Tag {} unknown devices", metrics.unknown_devices))
    } else {
        None
    };

    ComponentScore {
        name: "inventory".to_string(),
        weight: 0.25,
        score,
        penalty,
        reason,
    }
}

fn score_threat(metrics: &HealthMetrics, thresholds: &ScoringThresholds) -> ComponentScore {
    let high_anomalies = step_penalty(metrics.high_anomalies_24h, thresholds.high_anomalies, 40.0);
    let intel_24h = step_penalty(metrics.intel_matches_24h, thresholds.intel_matches_24h, 30.0);
    let intel_7d = step_penalty(metrics.intel_matches_7d, thresholds.intel_matches_7d, 20.0);
    let alerts_24h = step_penalty(metrics.suricata_alerts_24h, thresholds.suricata_alerts_24h, 10.0);
    let critical_events = step_penalty(metrics.critical_events_7d, thresholds.critical_events_7d, 20.0);
    let penalty = high_anomalies + intel_24h + intel_7d + alerts_24h + critical_events;
    let score = (100.0 - penalty).max(0.0);

    let reason = if metrics.high_anomalies_24h > 0 {
        Some(format!("Investigate {} high-severity device anomalies", metrics.high_anomalies_24h))
    } else if metrics.intel_matches_24h > 0 {
        Some(format!("Review {} threat-intel matches from the last 24h", metrics.intel_matches_24h))
    } else {
        None
    };

    ComponentScore {
        name: "threat".to_string(),
        weight: 0.35,
        score,
        penalty,
        reason,
    }
}

fn score_change(metrics: &HealthMetrics, thresholds: &ScoringThresholds) -> ComponentScore {
    let new_devices = step_penalty(metrics.new_devices_7d, thresholds.new_devices_7d, 30.0);
    let high_risk_changes = step_penalty(metrics.high_risk_changes_7d, thresholds.high_risk_changes, 70.0);
    let penalty = new_devices + high_risk_changes;
    let score = (100.0 - penalty).max(0.0);

    let reason = if metrics.new_devices_7d > 0 {
        Some(format!("Review {} devices that joined the network this week", metrics.new_devices_7d))
    } else {
        None
    };

    ComponentScore {
        name: "change".to_string(),
        weight: 0.20,
        score,
        penalty,
        reason,
    }
}

fn score_hygiene(metrics: &HealthMetrics) -> ComponentScore {
    let mut score = 0.0;
    let mut missing = Vec::new();
    if metrics.hygiene.backups_ok {
        score += 40.0;
    } else {
        missing.push("verify backups");
    }
    if metrics.hygiene.updates_current {
        score += 40.0;
    } else {
        missing.push("apply pending updates");
    }
    if metrics.hygiene.firewall_enabled {
        score += 20.0;
    } else {
        missing.push("enable the firewall");
    }

    ComponentScore {
        name: "hygiene".to_string(),
        weight: 0.20,
        score,
        penalty: 100.0 - score,
        reason: missing.first().map(|m| m.to_string()),
    }
}

/// Compute the composite report (spec §4.K steps 2-4).
pub fn score(metrics: &HealthMetrics, thresholds: &ScoringThresholds) -> HealthReport {
    let inventory = score_inventory(metrics, thresholds);
    let threat = score_threat(metrics, thresholds);
    let change = score_change(metrics, thresholds);
    let hygiene = score_hygiene(metrics);

    let composite = (inventory.weight * inventory.score
        + threat.weight * threat.score
        + change.weight * change.score
        + hygiene.weight * hygiene.score)
        .round() as i64;

    let components = [&inventory, &threat, &change, &hygiene];
    let worst = components
        .iter()
        .max_by(|a, b| a.penalty.partial_cmp(&b.penalty).unwrap())
        .unwrap();

    let mut recommendations: Vec<String> = components.iter().filter_map(|c| c.reason.clone()).collect();
    if recommendations.is_empty() {
        recommendations.push("No action needed; posture is healthy".to_string());
    } else if let Some(reason) = &worst.reason {
        // Surface the largest realized penalty first (spec §4.K step 4).
        recommendations.retain(|r| r != reason);
        recommendations.insert(0, reason.clone());
    }

    HealthReport {
        composite,
        grade: Grade::from_composite(composite),
        inventory,
        threat,
        change,
        hygiene,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::HygieneFlags;

    fn metrics(unknown_devices: usize) -> HealthMetrics {
        HealthMetrics {
            unknown_devices,
            // In practice an unmanaged device is untagged too; mirror
            // that here rather than leaving the new metric at zero.
            untagged_devices: unknown_devices,
            total_devices: unknown_devices,
            high_anomalies_24h: 0,
            intel_matches_24h: 0,
            intel_matches_7d: 0,
            new_devices_7d: 0,
            critical_events_7d: 0,
            suricata_alerts_24h: 0,
            high_risk_changes_7d: 0,
            hygiene: HygieneFlags {
                backups_ok: true,
                updates_current: true,
                firewall_enabled: true,
            },
        }
    }

    #[test]
    fn healthy_network_scores_perfect() {
        let report = score(&metrics(0), &ScoringThresholds::default());
        assert_eq!(report.composite, 100);
        assert_eq!(report.grade, Grade::A);
    }

    #[test]
    fn three_unknown_devices_scores_grade_a_with_recommendation() {
        // unknown=untagged=3 falls in the (low=2, high=5] mid band: 60%
        // of each metric's max penalty. unknown_penalty=18,
        // untagged_penalty=12; inventory takes the worse of the two.
        let report = score(&metrics(3), &ScoringThresholds::default());
        assert_eq!(report.inventory.score, 82.0);
        assert_eq!(report.composite, 96);
        assert_eq!(report.grade, Grade::A);
        assert!(report.recommendations.iter().any(|r| r.contains("Tag 3 unknown devices")));
    }

    #[test]
    fn missing_hygiene_flags_lower_the_hygiene_score() {
        let mut m = metrics(0);
        m.hygiene = HygieneFlags::default();
        let report = score(&m, &ScoringThresholds::default());
        assert_eq!(report.hygiene.score, 0.0);
        assert!(report.composite < 100);
    }

    #[test]
    fn heavy_threat_activity_degrades_grade() {
        let mut m = metrics(0);
        m.high_anomalies_24h = 20;
        m.intel_matches_24h = 10;
        m.critical_events_7d = 10;
        let report = score(&m, &ScoringThresholds::default());
        assert!(report.threat.score < 30.0);
        assert!(matches!(report.grade, Grade::D | Grade::F));
    }

    #[test]
    fn step_thresholds_apply_30_60_100_bands() {
        let t = StepThresholds::new(2.0, 5.0);
        assert_eq!(step_penalty(0, t, 100.0), 0.0);
        assert_eq!(step_penalty(2, t, 100.0), 30.0);
        assert_eq!(step_penalty(5, t, 100.0), 60.0);
        assert_eq!(step_penalty(6, t, 100.0), 100.0);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_composite(90), Grade::A);
        assert_eq!(Grade::from_composite(89), Grade::B);
        assert_eq!(Grade::from_composite(80), Grade::B);
        assert_eq!(Grade::from_composite(70), Grade::C);
        assert_eq!(Grade::from_composite(60), Grade::D);
        assert_eq!(Grade::from_composite(59), Grade::F);
    }
}
