//! Fixed vocabulary of the reporting module: report types, output formats,
//! report tabs and report statuses, each mapped to the value the portal's
//! markup or JSON uses for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! report_types {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// Report types offered by the report-name dropdown, keyed by option value.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ReportType {
            $($variant),+
        }

        impl ReportType {
            pub const ALL: &'static [ReportType] = &[$(ReportType::$variant),+];

            /// Value of the `<option>` in `#ddlReportName`.
            pub fn option_value(self) -> &'static str {
                match self {
                    $(ReportType::$variant => $code),+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ReportType::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

report_types! {
    // Time and attendance
    BankAccruals => "94",
    ClockDevice => "14",
    ContractedHoursComparison => "100",
    Cost => "13",
    Evacuation => "59",
    EventVariance => "80",
    Exception => "12",
    LeaveTaken => "45",
    ManualEventTimesheet => "54",
    ManualTimesheet => "35",
    PayAdjustmentSummary => "96",
    PayComparisonSummary => "95",
    PayrollDetails => "28",
    PayrollHoursBreakdown => "98",
    RawClockingComparison => "87",
    RejectedClocking => "67",
    ResourceClockingDetails => "10",
    ResourceNotWorked => "86",
    ResourcePaidHours => "66",
    ResourcePayGroupException => "33",
    ResourcePeriodToDateHours => "85",
    ResourceSignOff => "61",
    ScheduleAndTimeSheetComparison => "57",
    SignOffSheet => "76",
    TaActivityCode => "92",
    TaDepartmentActivity => "88",
    TaDetails => "69",
    TaPeriodToDateSummary => "72",
    TaSignOff => "39",
    TaVariance => "30",
    TaVarianceByEvent => "53",
    TaVarianceByPayGroup => "44",
    TaVarianceWithBudgets => "68",
    TaVarianceWithLabourStandard => "79",
    TimesheetResultsSummary => "65",
    TotalHoursWorked => "11",
    UnapprovedClockings => "38",
    WeeklyTimesheet => "78",
    WorkRule => "29",
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the variant name (case-insensitive) or the raw option value.
impl FromStr for ReportType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ReportType::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(wanted) || t.option_value() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "report type",
                value: s.to_string(),
            })
    }
}

/// Output formats offered by `#ddlReportFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportFormat {
    Pdf,
    Excel,
    Doc,
    Rtf,
    Csv,
}

impl ReportFormat {
    pub const ALL: &'static [ReportFormat] = &[
        ReportFormat::Pdf,
        ReportFormat::Excel,
        ReportFormat::Doc,
        ReportFormat::Rtf,
        ReportFormat::Csv,
    ];

    pub fn option_value(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "1",
            ReportFormat::Excel => "2",
            ReportFormat::Doc => "3",
            ReportFormat::Rtf => "4",
            ReportFormat::Csv => "6",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "PDF",
            ReportFormat::Excel => "EXCEL",
            ReportFormat::Doc => "DOC",
            ReportFormat::Rtf => "RTF",
            ReportFormat::Csv => "CSV",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ReportFormat::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(wanted) || f.option_value() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "report format",
                value: s.to_string(),
            })
    }
}

/// Tabs across the top of the reports page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportTab {
    TimeAttendance,
    Schedule,
    Reports,
}

impl ReportTab {
    pub fn selector(self) -> &'static str {
        match self {
            ReportTab::TimeAttendance => "#TimeAttendanceReport",
            ReportTab::Schedule => "#SchedulingReport",
            ReportTab::Reports => "#RequestPreview",
        }
    }

    /// The Reports tab only lists past requests; the others carry the request form.
    pub fn has_report_form(self) -> bool {
        !matches!(self, ReportTab::Reports)
    }

    /// Parse a tab a report can be requested from.
    pub fn parse_form_tab(s: &str) -> Result<Self, UnknownVariant> {
        match s.parse::<ReportTab>()? {
            tab if tab.has_report_form() => Ok(tab),
            _ => Err(UnknownVariant {
                kind: "report form tab",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for ReportTab {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timeattendance" | "time-attendance" | "time_attendance" => {
                Ok(ReportTab::TimeAttendance)
            }
            "schedule" | "scheduling" => Ok(ReportTab::Schedule),
            "reports" | "requestpreview" => Ok(ReportTab::Reports),
            _ => Err(UnknownVariant {
                kind: "report tab",
                value: s.to_string(),
            }),
        }
    }
}

/// Generation status reported in the request-preview list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    Processing,
    Completed,
    Viewed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Processing => "Processing",
            ReportStatus::Completed => "Completed",
            ReportStatus::Viewed => "Viewed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(ReportStatus::Processing),
            "Completed" => Ok(ReportStatus::Completed),
            "Viewed" => Ok(ReportStatus::Viewed),
            _ => Err(UnknownVariant {
                kind: "report status",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_type_parses_name_or_code() {
        assert_eq!(
            "totalhoursworked".parse::<ReportType>(),
            Ok(ReportType::TotalHoursWorked)
        );
        assert_eq!("57".parse::<ReportType>(), Ok(ReportType::ScheduleAndTimeSheetComparison));
        assert!("NoSuchReport".parse::<ReportType>().is_err());
    }

    #[test]
    fn option_values_are_unique() {
        let mut codes: Vec<_> = ReportType::ALL.iter().map(|t| t.option_value()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ReportType::ALL.len());
    }

    #[test]
    fn format_option_values() {
        assert_eq!(ReportFormat::Csv.option_value(), "6");
        assert_eq!("excel".parse::<ReportFormat>(), Ok(ReportFormat::Excel));
    }

    #[test]
    fn only_form_tabs_take_requests() {
        assert_eq!(
            ReportTab::parse_form_tab("scheduling"),
            Ok(ReportTab::Schedule)
        );
        assert_eq!("reports".parse::<ReportTab>(), Ok(ReportTab::Reports));
        assert!(ReportTab::parse_form_tab("reports").is_err());
        assert!(!ReportTab::Reports.has_report_form());
    }

    #[test]
    fn status_is_exact_match() {
        assert_eq!("Viewed".parse::<ReportStatus>(), Ok(ReportStatus::Viewed));
        assert!("viewed".parse::<ReportStatus>().is_err());
    }
}
