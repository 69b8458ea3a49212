//! Report aggregation
//!
//! Groups, counts and percentages computed from a [`ReportDataset`]. The
//! result is built fresh for every report and never persisted.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::classify::{
    age_bucket, percentage, ActivityLevel, AttentionLevel, PerformanceLevel, AGE_BUCKETS,
};
use super::dataset::ReportDataset;
use super::DateRange;
use crate::models::{ExamStatus, Sex};

/// Placeholder for groups with no name
pub const UNASSIGNED: &str = "Sin asignar";

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Length of the top-N lists
    pub top_n: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// One row of a grouped count table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    /// Registered patients
    pub patients: i64,
    /// Patients with at least one request in the range
    pub active_patients: i64,
    pub requests: i64,
    pub exams: i64,
    pub doctors: i64,
    pub completed_exams: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientActivity {
    pub patient_id: i64,
    pub codigo: Option<i64>,
    pub name: Option<String>,
    pub document: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<Sex>,
    pub requests: i64,
    pub exams: i64,
    pub last_visit: Option<String>,
    pub activity: ActivityLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamStats {
    pub exam_id: i64,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub total: i64,
    pub pending: i64,
    pub in_process: i64,
    pub completed: i64,
    pub completion_percentage: f64,
    pub performance: PerformanceLevel,
    pub attention: AttentionLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorStats {
    pub doctor_id: Option<i64>,
    pub name: Option<String>,
    pub requests: i64,
    pub patients: i64,
    pub exams: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub requests: i64,
    pub exams: i64,
    pub completed: i64,
}

/// Computed report aggregate
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub range: DateRange,
    pub totals: Totals,
    /// Exam details by status
    pub exam_status: Vec<GroupCount>,
    /// Requests by status
    pub request_status: Vec<GroupCount>,
    pub by_gender: Vec<GroupCount>,
    pub by_age: Vec<GroupCount>,
    pub activity: Vec<GroupCount>,
    pub by_category: Vec<GroupCount>,
    pub by_service: Vec<GroupCount>,
    pub top_patients: Vec<PatientActivity>,
    pub top_exams: Vec<ExamStats>,
    pub top_doctors: Vec<DoctorStats>,
    pub daily: Vec<DailyPoint>,
}

impl ReportData {
    pub fn build(dataset: &ReportDataset, options: ReportOptions) -> Self {
        let exam_stats = exam_stats(dataset);

        Self {
            range: dataset.range.clone(),
            totals: totals(dataset),
            exam_status: group_fixed(
                ExamStatus::ALL.iter().map(|s| s.display_name()),
                dataset.details.iter().map(|d| d.status.display_name()),
            ),
            request_status: group_fixed(
                ExamStatus::ALL.iter().map(|s| s.display_name()),
                dataset.requests.iter().map(|r| r.status.display_name()),
            ),
            by_gender: group_fixed(
                ["Masculino", "Femenino", "Otro", "No especificado"],
                dataset
                    .patients
                    .iter()
                    .map(|p| p.sex.map(|s| s.display_name()).unwrap_or("No especificado")),
            ),
            by_age: group_fixed(AGE_BUCKETS, dataset.patients.iter().map(|p| age_bucket(p.age))),
            activity: group_fixed(
                ActivityLevel::ALL.iter().map(|a| a.label()),
                dataset
                    .patients
                    .iter()
                    .map(|p| ActivityLevel::from_requests(p.request_count).label()),
            ),
            by_category: group_dynamic(
                dataset
                    .details
                    .iter()
                    .map(|d| d.category_name.as_deref().unwrap_or(UNASSIGNED)),
            ),
            by_service: group_dynamic(
                dataset
                    .requests
                    .iter()
                    .map(|r| r.service_name.as_deref().unwrap_or(UNASSIGNED)),
            ),
            top_patients: top_patients(dataset, options.top_n),
            top_exams: exam_stats.into_iter().take(options.top_n).collect(),
            top_doctors: top_doctors(dataset, options.top_n),
            daily: daily_series(dataset),
        }
    }

    /// Whether the range contains no activity at all
    pub fn is_empty(&self) -> bool {
        self.totals.requests == 0 && self.totals.exams == 0
    }
}

fn totals(dataset: &ReportDataset) -> Totals {
    let exams = dataset.details.len() as i64;
    let completed = dataset
        .details
        .iter()
        .filter(|d| d.status == ExamStatus::Completado)
        .count() as i64;
    let doctors: HashSet<i64> = dataset.requests.iter().filter_map(|r| r.doctor_id).collect();

    Totals {
        patients: dataset.patients.len() as i64,
        active_patients: dataset.patients.iter().filter(|p| p.request_count > 0).count() as i64,
        requests: dataset.requests.len() as i64,
        exams,
        doctors: doctors.len() as i64,
        completed_exams: completed,
        completion_percentage: percentage(completed, exams),
    }
}

/// Count items against a fixed ordered label scale. Every label appears,
/// including those with zero items.
fn group_fixed<'a, L, I>(labels: L, items: I) -> Vec<GroupCount>
where
    L: IntoIterator<Item = &'a str>,
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    let mut total = 0;
    for item in items {
        *counts.entry(item).or_default() += 1;
        total += 1;
    }

    labels
        .into_iter()
        .map(|label| {
            let count = counts.get(label).copied().unwrap_or(0);
            GroupCount {
                label: label.to_string(),
                count,
                percentage: percentage(count, total),
            }
        })
        .collect()
}

/// Count items by their own labels, largest group first
fn group_dynamic<'a, I>(items: I) -> Vec<GroupCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    let mut total = 0;
    for item in items {
        *counts.entry(item).or_default() += 1;
        total += 1;
    }

    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(label, count)| GroupCount {
            label: label.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    groups
}

fn top_patients(dataset: &ReportDataset, top_n: usize) -> Vec<PatientActivity> {
    let mut active: Vec<PatientActivity> = dataset
        .patients
        .iter()
        .filter(|p| p.request_count > 0)
        .map(|p| PatientActivity {
            patient_id: p.id,
            codigo: p.codigo,
            name: p.full_name.clone(),
            document: p.document.clone(),
            age: p.age,
            sex: p.sex,
            requests: p.request_count,
            exams: p.exam_count,
            last_visit: p.last_visit.clone(),
            activity: ActivityLevel::from_requests(p.request_count),
        })
        .collect();

    active.sort_by(|a, b| {
        b.requests
            .cmp(&a.requests)
            .then_with(|| b.exams.cmp(&a.exams))
            .then_with(|| a.patient_id.cmp(&b.patient_id))
    });
    active.truncate(top_n);
    active
}

/// Per-exam status counts, most requested first
fn exam_stats(dataset: &ReportDataset) -> Vec<ExamStats> {
    let mut by_exam: HashMap<i64, ExamStats> = HashMap::new();

    for d in &dataset.details {
        let entry = by_exam.entry(d.exam_id).or_insert_with(|| ExamStats {
            exam_id: d.exam_id,
            code: d.exam_code.clone(),
            name: d.exam_name.clone(),
            category: d.category_name.clone(),
            total: 0,
            pending: 0,
            in_process: 0,
            completed: 0,
            completion_percentage: 0.0,
            performance: PerformanceLevel::NoData,
            attention: AttentionLevel::Normal,
        });
        entry.total += 1;
        match d.status {
            ExamStatus::Pendiente => entry.pending += 1,
            ExamStatus::EnProceso => entry.in_process += 1,
            ExamStatus::Completado => entry.completed += 1,
        }
    }

    let mut stats: Vec<ExamStats> = by_exam
        .into_values()
        .map(|mut s| {
            s.completion_percentage = percentage(s.completed, s.total);
            s.performance = PerformanceLevel::from_completion(s.completed, s.total);
            s.attention = AttentionLevel::from_counts(s.pending, s.in_process, s.total);
            s
        })
        .collect();

    stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    stats
}

fn top_doctors(dataset: &ReportDataset, top_n: usize) -> Vec<DoctorStats> {
    struct Acc {
        name: Option<String>,
        requests: i64,
        patients: HashSet<i64>,
        exams: i64,
    }

    let exams_per_request: HashMap<i64, i64> =
        dataset.details.iter().fold(HashMap::new(), |mut acc, d| {
            *acc.entry(d.request_id).or_default() += 1;
            acc
        });

    let mut by_doctor: HashMap<Option<i64>, Acc> = HashMap::new();
    for r in &dataset.requests {
        let acc = by_doctor.entry(r.doctor_id).or_insert_with(|| Acc {
            name: r.doctor_name.clone(),
            requests: 0,
            patients: HashSet::new(),
            exams: 0,
        });
        acc.requests += 1;
        acc.patients.insert(r.patient_id);
        acc.exams += exams_per_request.get(&r.id).copied().unwrap_or(0);
    }

    let total_requests = dataset.requests.len() as i64;
    let mut doctors: Vec<DoctorStats> = by_doctor
        .into_iter()
        .map(|(doctor_id, acc)| DoctorStats {
            doctor_id,
            name: acc.name,
            requests: acc.requests,
            patients: acc.patients.len() as i64,
            exams: acc.exams,
            percentage: percentage(acc.requests, total_requests),
        })
        .collect();

    doctors.sort_by(|a, b| {
        b.requests
            .cmp(&a.requests)
            .then_with(|| b.exams.cmp(&a.exams))
            .then_with(|| a.doctor_id.cmp(&b.doctor_id))
    });
    doctors.truncate(top_n);
    doctors
}

/// One point per day of the range, zero-filled
fn daily_series(dataset: &ReportDataset) -> Vec<DailyPoint> {
    let mut points: BTreeMap<String, DailyPoint> = dataset
        .range
        .days()
        .map(|d| {
            let date = d.format("%Y-%m-%d").to_string();
            (
                date.clone(),
                DailyPoint { date, requests: 0, exams: 0, completed: 0 },
            )
        })
        .collect();

    for r in &dataset.requests {
        if let Some(p) = points.get_mut(&r.date) {
            p.requests += 1;
        }
    }
    for d in &dataset.details {
        if let Some(p) = points.get_mut(&d.request_date) {
            p.exams += 1;
            if d.status == ExamStatus::Completado {
                p.completed += 1;
            }
        }
    }

    points.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::dataset::{DetailRow, PatientRow, RequestRow};

    fn range() -> DateRange {
        DateRange::parse("2025-03-01", "2025-03-03").unwrap()
    }

    fn patient(id: i64, requests: i64, age: Option<i64>, sex: Option<Sex>) -> PatientRow {
        PatientRow {
            id,
            codigo: Some(id),
            document: Some(format!("DOC{}", id)),
            full_name: Some(format!("Paciente {}", id)),
            age,
            sex,
            phone: None,
            request_count: requests,
            exam_count: requests,
            last_visit: None,
        }
    }

    fn request(id: i64, patient_id: i64, doctor: Option<i64>, date: &str) -> RequestRow {
        RequestRow {
            id,
            date: date.to_string(),
            receipt_number: format!("R{}", id),
            status: ExamStatus::Pendiente,
            patient_id,
            service_name: Some("Emergencia".into()),
            doctor_id: doctor,
            doctor_name: doctor.map(|d| format!("Dr. {}", d)),
        }
    }

    fn detail(id: i64, request_id: i64, exam_id: i64, status: ExamStatus, date: &str) -> DetailRow {
        DetailRow {
            id,
            request_id,
            patient_id: 1,
            request_date: date.to_string(),
            exam_id,
            exam_code: format!("E{}", exam_id),
            exam_name: format!("Examen {}", exam_id),
            category_name: if exam_id == 1 { Some("Hematología".into()) } else { None },
            status,
            result: None,
            observations: None,
            completed_at: None,
        }
    }

    fn dataset(
        patients: Vec<PatientRow>,
        requests: Vec<RequestRow>,
        details: Vec<DetailRow>,
    ) -> ReportDataset {
        ReportDataset { range: range(), patients, requests, details, values: vec![] }
    }

    fn assert_sums_to_100(groups: &[GroupCount]) {
        let sum: f64 = groups.iter().map(|g| g.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.5, "percentages sum to {}", sum);
    }

    #[test]
    fn test_activity_buckets_scenario() {
        let data = ReportData::build(
            &dataset(
                vec![patient(1, 0, None, None), patient(2, 2, None, None), patient(3, 15, None, None)],
                vec![],
                vec![],
            ),
            ReportOptions::default(),
        );

        let get = |label: &str| data.activity.iter().find(|g| g.label == label).unwrap().clone();
        assert_eq!(get("Sin actividad").count, 1);
        assert_eq!(get("Baja").count, 1);
        assert_eq!(get("Muy Alta").count, 1);
        assert_eq!(get("Media").count, 0);
        assert_eq!(get("Sin actividad").percentage, 33.3);
        assert_eq!(get("Baja").percentage, 33.3);
        assert_eq!(get("Muy Alta").percentage, 33.3);
        assert_sums_to_100(&data.activity);
    }

    #[test]
    fn test_exam_performance_scenario() {
        let mut details = Vec::new();
        for i in 0..10 {
            let status = if i < 9 { ExamStatus::Completado } else { ExamStatus::Pendiente };
            details.push(detail(i + 1, i + 1, 1, status, "2025-03-01"));
        }
        let data = ReportData::build(&dataset(vec![], vec![], details), ReportOptions::default());

        let exam = &data.top_exams[0];
        assert_eq!(exam.total, 10);
        assert_eq!(exam.completed, 9);
        assert_eq!(exam.completion_percentage, 90.0);
        assert_eq!(exam.performance, PerformanceLevel::Excellent);
        assert_eq!(exam.attention, AttentionLevel::Normal);
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let patients = vec![
            patient(1, 1, Some(10), Some(Sex::Female)),
            patient(2, 1, Some(25), Some(Sex::Male)),
            patient(3, 3, Some(70), None),
            patient(4, 0, None, Some(Sex::Female)),
            patient(5, 7, Some(45), Some(Sex::Other)),
            patient(6, 1, Some(52), Some(Sex::Male)),
        ];
        let requests = vec![
            request(1, 1, Some(1), "2025-03-01"),
            request(2, 2, Some(2), "2025-03-02"),
            request(3, 3, None, "2025-03-02"),
        ];
        let details = vec![
            detail(1, 1, 1, ExamStatus::Completado, "2025-03-01"),
            detail(2, 1, 2, ExamStatus::Pendiente, "2025-03-01"),
            detail(3, 2, 1, ExamStatus::EnProceso, "2025-03-02"),
            detail(4, 3, 3, ExamStatus::Completado, "2025-03-02"),
            detail(5, 3, 1, ExamStatus::Completado, "2025-03-02"),
            detail(6, 3, 2, ExamStatus::Pendiente, "2025-03-02"),
            detail(7, 3, 4, ExamStatus::Pendiente, "2025-03-02"),
        ];
        let data = ReportData::build(&dataset(patients, requests, details), ReportOptions::default());

        for groups in [
            &data.exam_status,
            &data.request_status,
            &data.by_gender,
            &data.by_age,
            &data.activity,
            &data.by_category,
            &data.by_service,
        ] {
            assert_sums_to_100(groups);
        }
        let doctor_sum: f64 = data.top_doctors.iter().map(|d| d.percentage).sum();
        assert!((doctor_sum - 100.0).abs() <= 0.5);
    }

    #[test]
    fn test_zero_totals_give_zero_percentages() {
        let data = ReportData::build(&dataset(vec![], vec![], vec![]), ReportOptions::default());

        assert!(data.is_empty());
        for groups in [&data.exam_status, &data.by_gender, &data.by_age, &data.activity] {
            assert!(!groups.is_empty());
            assert!(groups.iter().all(|g| g.count == 0 && g.percentage == 0.0));
        }
        assert!(data.by_category.is_empty());
        assert!(data.top_patients.is_empty());
        assert_eq!(data.totals.completion_percentage, 0.0);
        assert_eq!(data.daily.len(), 3);
    }

    #[test]
    fn test_doctors_and_daily_series() {
        let requests = vec![
            request(1, 1, Some(7), "2025-03-01"),
            request(2, 2, Some(7), "2025-03-03"),
            request(3, 1, Some(7), "2025-03-03"),
            request(4, 3, Some(8), "2025-03-03"),
        ];
        let details = vec![
            detail(1, 1, 1, ExamStatus::Completado, "2025-03-01"),
            detail(2, 2, 1, ExamStatus::Pendiente, "2025-03-03"),
            detail(3, 2, 2, ExamStatus::Completado, "2025-03-03"),
        ];
        let data = ReportData::build(&dataset(vec![], requests, details), ReportOptions { top_n: 1 });

        assert_eq!(data.totals.doctors, 2);
        assert_eq!(data.top_doctors.len(), 1);
        let top = &data.top_doctors[0];
        assert_eq!(top.doctor_id, Some(7));
        assert_eq!(top.requests, 3);
        assert_eq!(top.patients, 2);
        assert_eq!(top.exams, 3);
        assert_eq!(top.percentage, 75.0);

        let dates: Vec<&str> = data.daily.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-03-01", "2025-03-02", "2025-03-03"]);
        assert_eq!(data.daily[1].requests, 0);
        assert_eq!(data.daily[2].requests, 3);
        assert_eq!(data.daily[2].exams, 2);
        assert_eq!(data.daily[2].completed, 1);
    }

    #[test]
    fn test_top_patients_ordering() {
        let data = ReportData::build(
            &dataset(
                vec![patient(1, 2, None, None), patient(2, 0, None, None), patient(3, 9, None, None)],
                vec![],
                vec![],
            ),
            ReportOptions::default(),
        );
        let ids: Vec<i64> = data.top_patients.iter().map(|p| p.patient_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(data.top_patients[0].activity, ActivityLevel::High);
        assert_eq!(data.totals.active_patients, 2);
    }
}
