//! Page-specific glue for the reporting portal.
//!
//! Each function returns a [`PageStep`]: a named group of [`PortalAction`]s
//! that runs as one step of a [`Sequence`](crate::sequence::Sequence).

use crate::actions::PortalAction;
use crate::dates::DateRange;
use crate::portal::{Locator, Portal};
use crate::sequence::{ActionError, Step};
use async_trait::async_trait;
use chrono::Datelike;
use serde_json::Value;
use std::time::Duration;
use tally_common::catalog::{ReportFormat, ReportTab, ReportType};

pub const REPORT_NAME_SELECT: &str = "#ddlReportName";
pub const REPORT_FORMAT_SELECT: &str = "#ddlReportFormat";
pub const ORG_PROFILE_SELECT: &str = "#ddlOrgProfile";
pub const ORG_TREE: &str = "#divOrganisationTreeContainer";
pub const DATE_RANGE_RADIO: &str = "#radDateRange";
pub const DATE_RANGE_INPUT: &str = "#txtAvailabilityProfilesDateRange";
pub const BACKGROUND: &str = "#module-container section";
pub const RELOAD_BUTTON: &str = "#reloadPage";

/// Settle times the portal's widgets need after the network goes idle.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub after_tab_switch: Duration,
    pub after_select: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_tab_switch: Duration::from_secs(5),
            after_select: Duration::from_secs(1),
        }
    }
}

/// Named group of portal actions run in order as a single step.
#[derive(Debug, Clone)]
pub struct PageStep {
    name: String,
    actions: Vec<PortalAction>,
}

impl PageStep {
    pub fn new(name: impl Into<String>, actions: Vec<PortalAction>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    pub fn actions(&self) -> &[PortalAction] {
        &self.actions
    }

    /// Runs every action and returns the last one's result.
    pub async fn perform<P: Portal + ?Sized>(&self, portal: &mut P) -> Result<Value, ActionError> {
        let mut last = Value::Null;
        for action in &self.actions {
            last = action.perform(portal).await?;
        }
        Ok(last)
    }
}

#[async_trait]
impl<P: Portal + ?Sized + 'static> Step<P> for PageStep {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, ctx: &mut P) -> Result<Value, ActionError> {
        self.perform(ctx).await
    }
}

pub fn goto_reports_page() -> PageStep {
    PageStep::new(
        "goto_reports_page",
        vec![
            PortalAction::click(Locator::text("a", "Reports")),
            PortalAction::WaitForNetworkQuiescence,
        ],
    )
}

pub fn switch_report_tab(tab: ReportTab, pacing: &Pacing) -> PageStep {
    PageStep::new(
        format!("switch_report_tab({:?})", tab),
        vec![
            PortalAction::click(Locator::css(tab.selector())),
            PortalAction::WaitForNetworkQuiescence,
            PortalAction::Pause(pacing.after_tab_switch),
        ],
    )
}

pub fn select_report_type(report_type: ReportType, pacing: &Pacing) -> PageStep {
    PageStep::new(
        format!("select_report_type({})", report_type),
        vec![
            PortalAction::select(Locator::css(REPORT_NAME_SELECT), report_type.option_value()),
            PortalAction::WaitForNetworkQuiescence,
            PortalAction::Pause(pacing.after_select),
        ],
    )
}

pub fn select_report_format(format: ReportFormat, pacing: &Pacing) -> PageStep {
    PageStep::new(
        format!("select_report_format({})", format),
        vec![
            PortalAction::select(Locator::css(REPORT_FORMAT_SELECT), format.option_value()),
            PortalAction::WaitForNetworkQuiescence,
            PortalAction::Pause(pacing.after_select),
        ],
    )
}

pub fn select_org_template(template: &str, pacing: &Pacing) -> PageStep {
    PageStep::new(
        format!("select_org_template({})", template),
        vec![
            PortalAction::select(Locator::css(ORG_PROFILE_SELECT), template),
            PortalAction::WaitForNetworkQuiescence,
            PortalAction::Pause(pacing.after_select),
        ],
    )
}

/// Ticks each unit in the organisation tree and confirms the dialog.
pub fn select_org_units(units: &[String], pacing: &Pacing) -> PageStep {
    let mut actions = Vec::new();
    for unit in units {
        actions.push(PortalAction::click(Locator::text(
            format!("{} [role=treeitem] > a", ORG_TREE),
            unit.clone(),
        )));
        actions.push(PortalAction::WaitForNetworkQuiescence);
        actions.push(PortalAction::Pause(pacing.after_select));
        actions.push(PortalAction::click(Locator::text("button", "OK")));
        actions.push(PortalAction::WaitForNetworkQuiescence);
    }
    PageStep::new(format!("select_org_units({})", units.join(", ")), actions)
}

/// Picks `range` in the two-calendar date picker and applies it.
pub fn select_date_range(range: &DateRange) -> PageStep {
    let mut actions = vec![
        PortalAction::click(Locator::css(DATE_RANGE_RADIO)),
        PortalAction::click(Locator::css(DATE_RANGE_INPUT)),
    ];
    actions.extend(pick_calendar_day("left", range.start()));
    actions.extend(pick_calendar_day("right", range.end()));
    actions.push(PortalAction::click(Locator::text(
        ".daterangepicker button",
        "Apply",
    )));
    PageStep::new(format!("select_date_range({})", range), actions)
}

fn pick_calendar_day(side: &str, date: chrono::NaiveDate) -> Vec<PortalAction> {
    let calendar = format!(".daterangepicker .{} .calendar-date", side);
    vec![
        PortalAction::select(
            Locator::css(format!("{} .yearselect", calendar)),
            date.year().to_string(),
        ),
        // The month dropdown is zero-based.
        PortalAction::select(
            Locator::css(format!("{} .monthselect", calendar)),
            date.month0().to_string(),
        ),
        PortalAction::click(Locator::text(
            format!("{} tbody td:not(.off)", calendar),
            date.day().to_string(),
        )),
    ]
}

pub fn click_background() -> PageStep {
    PageStep::new(
        "click_background",
        vec![
            PortalAction::click(Locator::css(BACKGROUND)),
            PortalAction::WaitForNetworkQuiescence,
        ],
    )
}

/// Opens Manage → Report Request and confirms.
pub fn run_report() -> PageStep {
    PageStep::new(
        "run_report",
        vec![
            PortalAction::click(Locator::text("a", "Manage")),
            PortalAction::click(Locator::text("a", "Report Request")),
            PortalAction::click(Locator::text("button", "OK")),
        ],
    )
}

pub fn reload_report_list() -> PageStep {
    PageStep::new(
        "reload_report_list",
        vec![
            PortalAction::click(Locator::css(RELOAD_BUTTON)),
            PortalAction::WaitForNetworkQuiescence,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_range_picks_zero_based_month() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 12, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 8).unwrap(),
        )
        .unwrap();
        let step = select_date_range(&range);
        let months: Vec<_> = step
            .actions()
            .iter()
            .filter_map(|a| match a {
                PortalAction::SelectOption { locator, value }
                    if locator.to_string().ends_with(".monthselect") =>
                {
                    Some(value.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(months, vec!["11", "11"]);
    }

    #[test]
    fn org_units_confirm_each_unit() {
        let step = select_org_units(&["Laundry".into(), "Transport".into()], &Pacing::default());
        let confirms = step
            .actions()
            .iter()
            .filter(|a| matches!(a, PortalAction::Click { locator } if *locator == Locator::text("button", "OK")))
            .count();
        assert_eq!(confirms, 2);
    }
}
