//! Classification functions
//!
//! Map counts onto fixed ordinal scales by threshold comparison. Every
//! function here is a pure function of (count, optional total).

use serde::Serialize;

// ============================================================================
// Color Constants (RGB 0-255)
// ============================================================================

pub const COLOR_CRITICAL: (u8, u8, u8) = (192, 0, 0);
pub const COLOR_WARNING: (u8, u8, u8) = (255, 140, 0);
pub const COLOR_NORMAL: (u8, u8, u8) = (0, 128, 0);
pub const COLOR_EXCELLENT: (u8, u8, u8) = (0, 112, 192);
pub const COLOR_GRAY: (u8, u8, u8) = (128, 128, 128);

/// Share of `count` in `total` as a percentage rounded to one decimal.
/// A zero total yields 0 instead of dividing by zero.
pub fn percentage(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round1(count as f64 * 100.0 / total as f64)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Patient activity
// ============================================================================

/// Activity of a patient by number of requests in the period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ActivityLevel {
    #[serde(rename = "Sin actividad")]
    None,
    #[serde(rename = "Baja")]
    Low,
    #[serde(rename = "Media")]
    Medium,
    #[serde(rename = "Alta")]
    High,
    #[serde(rename = "Muy Alta")]
    VeryHigh,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::None,
        ActivityLevel::Low,
        ActivityLevel::Medium,
        ActivityLevel::High,
        ActivityLevel::VeryHigh,
    ];

    pub fn from_requests(count: i64) -> Self {
        match count {
            i64::MIN..=0 => ActivityLevel::None,
            1..=2 => ActivityLevel::Low,
            3..=5 => ActivityLevel::Medium,
            6..=10 => ActivityLevel::High,
            _ => ActivityLevel::VeryHigh,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityLevel::None => "Sin actividad",
            ActivityLevel::Low => "Baja",
            ActivityLevel::Medium => "Media",
            ActivityLevel::High => "Alta",
            ActivityLevel::VeryHigh => "Muy Alta",
        }
    }

    /// Range description for legends
    pub fn range(&self) -> &'static str {
        match self {
            ActivityLevel::None => "0 solicitudes",
            ActivityLevel::Low => "1-2 solicitudes",
            ActivityLevel::Medium => "3-5 solicitudes",
            ActivityLevel::High => "6-10 solicitudes",
            ActivityLevel::VeryHigh => "Más de 10 solicitudes",
        }
    }

    /// Ordinal position on the scale, 0 for no activity
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            ActivityLevel::None => COLOR_GRAY,
            ActivityLevel::Low | ActivityLevel::Medium => COLOR_NORMAL,
            ActivityLevel::High => COLOR_WARNING,
            ActivityLevel::VeryHigh => COLOR_CRITICAL,
        }
    }
}

// ============================================================================
// Exam attention (unfinished workload)
// ============================================================================

/// How urgently an exam's backlog needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AttentionLevel {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "ATENCIÓN")]
    Attention,
    #[serde(rename = "CRÍTICO")]
    Critical,
}

impl AttentionLevel {
    /// Classify by the share of pending plus in-process work
    pub fn from_counts(pending: i64, in_process: i64, total: i64) -> Self {
        let unfinished = percentage(pending + in_process, total);
        if total <= 0 {
            AttentionLevel::Normal
        } else if unfinished >= 50.0 {
            AttentionLevel::Critical
        } else if unfinished >= 25.0 {
            AttentionLevel::Attention
        } else {
            AttentionLevel::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttentionLevel::Normal => "Normal",
            AttentionLevel::Attention => "ATENCIÓN",
            AttentionLevel::Critical => "CRÍTICO",
        }
    }

    /// Ordinal severity, 0 for normal
    pub fn severity(&self) -> u8 {
        *self as u8
    }

    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            AttentionLevel::Normal => COLOR_NORMAL,
            AttentionLevel::Attention => COLOR_WARNING,
            AttentionLevel::Critical => COLOR_CRITICAL,
        }
    }
}

// ============================================================================
// Exam performance (completion rate)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PerformanceLevel {
    #[serde(rename = "Sin datos")]
    NoData,
    #[serde(rename = "Requiere atención")]
    NeedsAttention,
    #[serde(rename = "Rendimiento regular")]
    Fair,
    #[serde(rename = "Buen rendimiento")]
    Good,
    #[serde(rename = "Excelente rendimiento")]
    Excellent,
}

impl PerformanceLevel {
    pub fn from_completion(completed: i64, total: i64) -> Self {
        if total <= 0 {
            return PerformanceLevel::NoData;
        }
        let rate = percentage(completed, total);
        if rate >= 90.0 {
            PerformanceLevel::Excellent
        } else if rate >= 70.0 {
            PerformanceLevel::Good
        } else if rate >= 50.0 {
            PerformanceLevel::Fair
        } else {
            PerformanceLevel::NeedsAttention
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceLevel::NoData => "Sin datos",
            PerformanceLevel::NeedsAttention => "Requiere atención",
            PerformanceLevel::Fair => "Rendimiento regular",
            PerformanceLevel::Good => "Buen rendimiento",
            PerformanceLevel::Excellent => "Excelente rendimiento",
        }
    }

    /// Ordinal position on the scale, 0 when there is no data
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            PerformanceLevel::NoData => COLOR_GRAY,
            PerformanceLevel::NeedsAttention => COLOR_CRITICAL,
            PerformanceLevel::Fair => COLOR_WARNING,
            PerformanceLevel::Good => COLOR_NORMAL,
            PerformanceLevel::Excellent => COLOR_EXCELLENT,
        }
    }
}

// ============================================================================
// Demographic buckets
// ============================================================================

/// Age bucket labels in display order
pub const AGE_BUCKETS: [&str; 6] = [
    "0-17 años",
    "18-30 años",
    "31-50 años",
    "51-65 años",
    "Más de 65 años",
    "No especificado",
];

pub fn age_bucket(age: Option<i64>) -> &'static str {
    match age {
        Some(a) if a < 0 => AGE_BUCKETS[5],
        Some(0..=17) => AGE_BUCKETS[0],
        Some(18..=30) => AGE_BUCKETS[1],
        Some(31..=50) => AGE_BUCKETS[2],
        Some(51..=65) => AGE_BUCKETS[3],
        Some(_) => AGE_BUCKETS[4],
        None => AGE_BUCKETS[5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(9, 10), 90.0);
    }

    #[test]
    fn test_activity_levels() {
        assert_eq!(ActivityLevel::from_requests(0), ActivityLevel::None);
        assert_eq!(ActivityLevel::from_requests(2), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_requests(4), ActivityLevel::Medium);
        assert_eq!(ActivityLevel::from_requests(10), ActivityLevel::High);
        assert_eq!(ActivityLevel::from_requests(15), ActivityLevel::VeryHigh);
        assert_eq!(ActivityLevel::from_requests(15).label(), "Muy Alta");
        assert_eq!(ActivityLevel::VeryHigh.rank(), 4);
    }

    #[test]
    fn test_activity_is_monotonic() {
        let mut previous = ActivityLevel::from_requests(0);
        for count in 0..200 {
            let level = ActivityLevel::from_requests(count);
            assert!(level >= previous, "count {} lowered activity", count);
            previous = level;
        }
    }

    #[test]
    fn test_attention_is_monotonic_in_unfinished_work() {
        let total = 40;
        let mut previous = AttentionLevel::Normal;
        for pending in 0..=total {
            let level = AttentionLevel::from_counts(pending, 0, total);
            assert!(level >= previous, "pending {} lowered attention", pending);
            previous = level;
        }
        assert_eq!(AttentionLevel::from_counts(20, 0, 40), AttentionLevel::Critical);
        assert_eq!(AttentionLevel::from_counts(5, 5, 40), AttentionLevel::Attention);
        assert_eq!(AttentionLevel::from_counts(1, 1, 40), AttentionLevel::Normal);
        assert_eq!(AttentionLevel::from_counts(0, 0, 0), AttentionLevel::Normal);
        assert!(AttentionLevel::Critical.severity() > AttentionLevel::Attention.severity());
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_completion(9, 10), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_completion(9, 10).label(), "Excelente rendimiento");
        assert_eq!(PerformanceLevel::from_completion(7, 10), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_completion(5, 10), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_completion(4, 10), PerformanceLevel::NeedsAttention);
        assert_eq!(PerformanceLevel::from_completion(0, 0), PerformanceLevel::NoData);
    }

    #[test]
    fn test_performance_is_monotonic() {
        let total = 37;
        let mut previous = PerformanceLevel::from_completion(0, total);
        for completed in 0..=total {
            let level = PerformanceLevel::from_completion(completed, total);
            assert!(level >= previous, "completed {} lowered performance", completed);
            previous = level;
        }
    }

    #[test]
    fn test_age_buckets() {
        assert_eq!(age_bucket(Some(5)), "0-17 años");
        assert_eq!(age_bucket(Some(30)), "18-30 años");
        assert_eq!(age_bucket(Some(66)), "Más de 65 años");
        assert_eq!(age_bucket(None), "No especificado");
    }
}
