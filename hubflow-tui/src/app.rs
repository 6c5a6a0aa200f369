//! Application state: single-owner, main-thread only.
//!
//! All dashboard state lives here. The worker thread communicates via channels.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use hubflow_core::domain::{AllocationRow, BranchId, ProductId};
use hubflow_core::query::{Identifier, TableKind, DEFAULT_SCHEMA};
use hubflow_core::MinimumShipmentPolicy;
use hubflow_runner::DistributionParams;

use crate::worker::{WorkerCommand, WorkerResponse};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const ERROR_HISTORY_CAP: usize = 50;

/// Which panel is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Panel {
    Settings,
    Results,
    Charts,
    Help,
}

impl Panel {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Panel::Settings => 0,
            Panel::Results => 1,
            Panel::Charts => 2,
            Panel::Help => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Panel::Settings),
            1 => Some(Panel::Results),
            2 => Some(Panel::Charts),
            3 => Some(Panel::Help),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Panel::Settings => "Settings",
            Panel::Results => "Results",
            Panel::Charts => "Charts",
            Panel::Help => "Help",
        }
    }

    pub fn next(self) -> Panel {
        Panel::from_index((self.index() + 1) % Self::COUNT).unwrap_or(Panel::Settings)
    }

    pub fn prev(self) -> Panel {
        Panel::from_index((self.index() + Self::COUNT - 1) % Self::COUNT).unwrap_or(Panel::Settings)
    }
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// An entry in the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub message: String,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    ErrorHistory,
}

// ── Settings ─────────────────────────────────────────────────────────

/// Everything that shapes a `/distribution` call. Persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    /// `None` means "today" on the server.
    pub run_date: Option<NaiveDate>,
    pub schema: String,
    pub tables: BTreeMap<TableKind, String>,
    pub respect_volume: bool,
    pub minimum_policy: MinimumShipmentPolicy,
    /// 0 means unbounded.
    pub limit: usize,
    pub min_demand: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            run_date: None,
            schema: DEFAULT_SCHEMA.to_string(),
            tables: TableKind::ALL
                .iter()
                .map(|&k| (k, k.default_name().to_string()))
                .collect(),
            respect_volume: false,
            minimum_policy: MinimumShipmentPolicy::default(),
            limit: 100,
            min_demand: None,
        }
    }
}

/// One editable row of the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ApiUrl,
    RunDate,
    Schema,
    Table(TableKind),
    RespectVolume,
    MinimumPolicy,
    Limit,
    MinDemand,
}

impl SettingsField {
    /// Display order.
    pub fn all() -> Vec<SettingsField> {
        let mut fields = vec![
            SettingsField::ApiUrl,
            SettingsField::RunDate,
            SettingsField::RespectVolume,
            SettingsField::MinimumPolicy,
            SettingsField::Limit,
            SettingsField::MinDemand,
            SettingsField::Schema,
        ];
        fields.extend(TableKind::ALL.iter().map(|&k| SettingsField::Table(k)));
        fields
    }

    pub fn label(self) -> String {
        match self {
            SettingsField::ApiUrl => "API URL".into(),
            SettingsField::RunDate => "Run date".into(),
            SettingsField::Schema => "Schema".into(),
            SettingsField::Table(kind) => format!("{kind:?} table"),
            SettingsField::RespectVolume => "Respect volume".into(),
            SettingsField::MinimumPolicy => "Minimum policy".into(),
            SettingsField::Limit => "Limit".into(),
            SettingsField::MinDemand => "Min demand".into(),
        }
    }

    /// Toggled with Enter instead of edited as text.
    pub fn is_toggle(self) -> bool {
        matches!(self, SettingsField::RespectVolume | SettingsField::MinimumPolicy)
    }

    /// Rendered under the "Source tables" heading.
    pub fn is_table_group(self) -> bool {
        matches!(self, SettingsField::Schema | SettingsField::Table(_))
    }
}

impl Settings {
    pub fn value(&self, field: SettingsField) -> String {
        match field {
            SettingsField::ApiUrl => self.api_url.clone(),
            SettingsField::RunDate => self
                .run_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            SettingsField::Schema => self.schema.clone(),
            SettingsField::Table(kind) => self.table(kind).to_string(),
            SettingsField::RespectVolume => if self.respect_volume { "on" } else { "off" }.into(),
            SettingsField::MinimumPolicy => self.minimum_policy.to_string(),
            SettingsField::Limit => self.limit.to_string(),
            SettingsField::MinDemand => self
                .min_demand
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn table(&self, kind: TableKind) -> &str {
        self.tables
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(kind.default_name())
    }

    /// Apply typed input to a text field. Empty input clears optional fields.
    pub fn set(&mut self, field: SettingsField, input: &str) -> Result<(), String> {
        let input = input.trim();
        match field {
            SettingsField::ApiUrl => {
                if !(input.starts_with("http://") || input.starts_with("https://")) {
                    return Err(format!("'{input}' is not an http(s) URL"));
                }
                self.api_url = input.trim_end_matches('/').to_string();
            }
            SettingsField::RunDate => {
                self.run_date = if input.is_empty() {
                    None
                } else {
                    Some(
                        NaiveDate::parse_from_str(input, "%Y-%m-%d")
                            .map_err(|e| format!("run date '{input}': {e}"))?,
                    )
                };
            }
            SettingsField::Schema => {
                self.schema = Identifier::parse(input).map_err(|e| e.to_string())?.to_string();
            }
            SettingsField::Table(kind) => {
                let name = Identifier::parse(input).map_err(|e| e.to_string())?;
                self.tables.insert(kind, name.to_string());
            }
            SettingsField::Limit => {
                self.limit = if input.is_empty() {
                    0
                } else {
                    input.parse().map_err(|_| format!("limit '{input}' is not a number"))?
                };
            }
            SettingsField::MinDemand => {
                self.min_demand = if input.is_empty() {
                    None
                } else {
                    Some(input.parse().map_err(|_| format!("min demand '{input}' is not a number"))?)
                };
            }
            SettingsField::RespectVolume | SettingsField::MinimumPolicy => self.toggle(field),
        }
        Ok(())
    }

    /// Restore one field to its default value.
    pub fn reset(&mut self, field: SettingsField) {
        let d = Settings::default();
        match field {
            SettingsField::ApiUrl => self.api_url = d.api_url,
            SettingsField::RunDate => self.run_date = d.run_date,
            SettingsField::Schema => self.schema = d.schema,
            SettingsField::Table(kind) => {
                self.tables.insert(kind, kind.default_name().to_string());
            }
            SettingsField::RespectVolume => self.respect_volume = d.respect_volume,
            SettingsField::MinimumPolicy => self.minimum_policy = d.minimum_policy,
            SettingsField::Limit => self.limit = d.limit,
            SettingsField::MinDemand => self.min_demand = d.min_demand,
        }
    }

    pub fn toggle(&mut self, field: SettingsField) {
        match field {
            SettingsField::RespectVolume => self.respect_volume = !self.respect_volume,
            SettingsField::MinimumPolicy => {
                self.minimum_policy = match self.minimum_policy {
                    MinimumShipmentPolicy::Clamp => MinimumShipmentPolicy::Filter,
                    MinimumShipmentPolicy::Filter => MinimumShipmentPolicy::Clamp,
                }
            }
            _ => {}
        }
    }

    /// Query parameters for `/distribution`. Only non-default table names are sent.
    pub fn to_params(&self) -> DistributionParams {
        let overridden = |kind: TableKind| {
            let name = self.table(kind);
            (name != kind.default_name()).then(|| name.to_string())
        };
        DistributionParams {
            run_date: self.run_date,
            min_demand: self.min_demand,
            limit: Some(self.limit),
            respect_volume: self.respect_volume,
            minimum_policy: Some(self.minimum_policy),
            schema: (self.schema != DEFAULT_SCHEMA).then(|| self.schema.clone()),
            rc_table: overridden(TableKind::HubHistory),
            branch_table: overridden(TableKind::BranchHistory),
            needs_table: overridden(TableKind::Needs),
            min_table: overridden(TableKind::MinShipment),
            volume_table: overridden(TableKind::ProductVolume),
            limit_table: overridden(TableKind::StorageLimit),
            product_table: overridden(TableKind::Product),
            logdays_table: overridden(TableKind::LeadTime),
            ..DistributionParams::default()
        }
    }
}

/// Settings panel cursor and in-progress edit.
#[derive(Debug, Default)]
pub struct SettingsPanelState {
    pub cursor: usize,
    /// Text being typed into the field under the cursor.
    pub editing: Option<String>,
}

impl SettingsPanelState {
    pub fn field(&self) -> SettingsField {
        let fields = SettingsField::all();
        fields[self.cursor.min(fields.len() - 1)]
    }
}

// ── Results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fetched_at: NaiveDateTime,
    pub elapsed_ms: u64,
    pub params: DistributionParams,
}

#[derive(Debug, Default)]
pub struct ResultsState {
    pub rows: Vec<AllocationRow>,
    pub cursor: usize,
    pub scroll_offset: usize,
    pub last_run: Option<RunSummary>,
}

impl ResultsState {
    pub fn total_qty(&self) -> f64 {
        self.rows.iter().map(|r| r.qty).sum()
    }

    /// Shipped quantity per product, largest first.
    pub fn qty_by_product(&self) -> Vec<(ProductId, f64)> {
        let mut totals: BTreeMap<ProductId, f64> = BTreeMap::new();
        for r in &self.rows {
            *totals.entry(r.product_id).or_default() += r.qty;
        }
        sorted_desc(totals)
    }

    /// The `n` branches receiving the most, largest first.
    pub fn top_branches(&self, n: usize) -> Vec<(BranchId, f64)> {
        let mut totals: BTreeMap<BranchId, f64> = BTreeMap::new();
        for r in &self.rows {
            *totals.entry(r.branch_id).or_default() += r.qty;
        }
        let mut out = sorted_desc(totals);
        out.truncate(n);
        out
    }

    pub fn move_cursor(&mut self, delta: isize, visible: usize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if visible > 0 && self.cursor >= self.scroll_offset + visible {
            self.scroll_offset = self.cursor + 1 - visible;
        }
    }
}

// Ties keep key order, so the output is stable across refreshes
fn sorted_desc<K: Ord>(totals: BTreeMap<K, f64>) -> Vec<(K, f64)> {
    let mut out: Vec<_> = totals.into_iter().collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out
}

// ── App ──────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct AppState {
    pub active_panel: Panel,
    pub running: bool,

    pub settings: Settings,
    pub settings_panel: SettingsPanelState,
    pub results: ResultsState,
    pub fetch_in_progress: bool,

    pub worker_tx: Sender<WorkerCommand>,
    pub worker_rx: Receiver<WorkerResponse>,

    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,
    pub overlay: Overlay,
}

impl AppState {
    pub fn new(worker_tx: Sender<WorkerCommand>, worker_rx: Receiver<WorkerResponse>) -> Self {
        Self {
            active_panel: Panel::Settings,
            running: true,
            settings: Settings::default(),
            settings_panel: SettingsPanelState::default(),
            results: ResultsState::default(),
            fetch_in_progress: false,
            worker_tx,
            worker_rx,
            status_message: None,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            overlay: Overlay::None,
        }
    }

    /// Ask the worker for a fresh allocation with the current settings.
    pub fn request_distribution(&mut self) {
        if self.fetch_in_progress {
            self.set_warning("A request is already running");
            return;
        }
        let command = WorkerCommand::FetchDistribution {
            api_url: self.settings.api_url.clone(),
            params: self.settings.to_params(),
        };
        if self.worker_tx.send(command).is_err() {
            self.push_error("worker thread is gone".into(), "fetch".into());
            return;
        }
        self.fetch_in_progress = true;
        self.set_status(format!("Requesting {}/distribution ...", self.settings.api_url));
    }

    pub fn apply_worker_response(&mut self, resp: WorkerResponse) {
        match resp {
            WorkerResponse::Distribution {
                rows,
                elapsed_ms,
                params,
            } => {
                self.fetch_in_progress = false;
                self.set_status(format!("{} rows in {elapsed_ms} ms", rows.len()));
                self.results = ResultsState {
                    rows,
                    cursor: 0,
                    scroll_offset: 0,
                    last_run: Some(RunSummary {
                        fetched_at: chrono::Local::now().naive_local(),
                        elapsed_ms,
                        params,
                    }),
                };
            }
            WorkerResponse::Error { message, context } => {
                self.fetch_in_progress = false;
                self.push_error(message, context);
            }
        }
    }

    /// Push an error to the history, capping its length.
    pub fn push_error(&mut self, message: String, context: String) {
        tracing::warn!(error = %message, context = %context, "dashboard error");
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            message: message.clone(),
            context,
        };
        self.error_history.push_front(record);
        if self.error_history.len() > ERROR_HISTORY_CAP {
            self.error_history.pop_back();
        }
        self.status_message = Some((message, StatusLevel::Error));
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }
}
