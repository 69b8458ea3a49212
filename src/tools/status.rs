//! Clinlab Status Tool
//!
//! Runtime status of the service plus the usage guide handed to assistants.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;

/// Laboratory workflow instructions for AI assistants
pub const LAB_INSTRUCTIONS: &str = r#"
# Clinical Laboratory Instructions

This guide explains how to record lab work and produce reports with the
clinlab tools.

## Overview

1. **Catalog** - categories, services, doctors, exams and exam fields
2. **Patients** - registered once, identified by document number and an
   automatic sequential code
3. **Requests (solicitudes)** - one visit: a date, a patient, an optional
   service and requesting doctor, and a list of exams
4. **Exam details** - one row per exam in a request, each with its own status
   and result
5. **Reports** - aggregated statistics and Excel workbooks over a date range

---

## Registering a Request

```
register_patient(document: "1234567", first_names: "Ana", last_names: "Pérez", age: 34, sex: "F")
create_request(patient_id: 1, date: "2025-03-10", exam_ids: [1, 4], doctor_id: 2)
```

Every exam starts as `pendiente`. A receipt number `R<YYYYMMDD>-<id>` is
generated when none is given.

---

## Exam Status

| Status | Meaning |
|--------|---------|
| pendiente | waiting for the sample or the analysis |
| en_proceso | being analysed |
| completado | result available |

- Status moves forward (pendiente → en_proceso → completado); skipping
  en_proceso is allowed.
- A detail can be reset to pendiente.
- completado → en_proceso is rejected.
- The request status follows its exams: completado when all are completed,
  pendiente when all are pending, en_proceso otherwise.

---

## Recording Results

**Simple exams:** `set_exam_result(detail_id, result: "95 mg/dL", complete: true)`

**Compound exams (hemogram, lipid panel):**
```
record_result_values(detail_id, values: [
  {field_id: 7, value: "13.5"},
  {field_id: 8, value: "41", out_of_range: false}
])
```

When `out_of_range` is omitted it is computed from the field's reference
range ("12-16", "<200", ">40"). Non-numeric values are never flagged.

---

## Reports

- `get_report_data(start_date, end_date, top_n)` - JSON statistics
- `export_report(report_type, start_date, end_date)` - Excel workbook
  - `general`: every section
  - `pacientes`, `examenes`, `doctores`: the matching sections
  - `resultados`: one results sheet per patient with requests in the range
- `export_patient_results(start_date, end_date, patient_id)` - results
  workbook for one patient (or all active patients)

Dates use ISO format: YYYY-MM-DD. The range is inclusive and start must not
be after end. Workbooks are written to the export directory
(`CLINLAB_EXPORT_DIR`) as `reporte_<tipo>_<inicio>_<fin>.xlsx`.

Empty periods still produce a workbook: each section shows
"No hay datos disponibles para el período seleccionado".
"#;

/// Runtime status of the clinlab service
#[derive(Debug, Clone, Serialize)]
pub struct ClinlabStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Storage
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub export_dir: String,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    export_dir: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
            export_dir,
        }
    }

    pub fn export_dir(&self) -> &PathBuf {
        &self.export_dir
    }

    /// Get the current status
    pub fn get_status(&self) -> ClinlabStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        ClinlabStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            export_dir: self.export_dir.display().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
