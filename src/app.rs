use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::api::types::{valid_discord_token, valid_google_api_key, valid_openrouter_key};
use crate::api::{BackendClient, DashboardConfig, MessageCacheInfo, ResponseStatus, TaskConfig};
use crate::config::AppConfig;
use crate::stream::{LogStream, SseTransport};

/// Delay between the last edit and the POST to /save_config
const SAVE_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Status line messages auto-clear after this many seconds
const STATUS_CLEAR_SECS: u64 = 3;

const MIN_DELAY_SECS: u64 = 5;
const DELAY_STEP_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Accounts,
    Tasks,
    Logs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    AddToken,
    AddGoogleKey,
    AddOpenRouterKey,
    AddTask, // Channel ID + account index
    Help,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    DiscordToken,
    GoogleKey,
    OpenRouterKey,
}

impl CredentialKind {
    pub fn label(self) -> &'static str {
        match self {
            CredentialKind::DiscordToken => "Discord",
            CredentialKind::GoogleKey => "Google",
            CredentialKind::OpenRouterKey => "OpenRouter",
        }
    }
}

/// Task state as last reported by the backend's control endpoints. The
/// backend has no status query; before the first start/stop this is Unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Unknown,
    Running,
    Stopped,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Unknown => "?",
            TaskStatus::Running => "Running",
            TaskStatus::Stopped => "Stopped",
        }
    }
}

#[derive(Debug, Clone)]
enum PendingDelete {
    Credential(CredentialKind, usize),
    Task(usize),
}

pub struct App {
    pub section: Section,
    pub popup: Popup,

    // Local panel config + backend client
    pub config: AppConfig,
    pub client: BackendClient,

    // The backend's config being edited
    pub dashboard: DashboardConfig,

    // Live log stream (core component)
    pub logs: LogStream<SseTransport>,
    pub log_scroll: usize, // lines scrolled up from the newest entry

    // Selection state
    pub selected_credential: usize,
    pub selected_task: usize,
    pub show_secrets: bool,

    // Task status badges, keyed by task id
    pub task_status: HashMap<String, TaskStatus>,

    // pesan.txt cache info from the last refresh
    pub message_cache: Option<MessageCacheInfo>,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    status_message_time: Option<Instant>,

    // Debounced auto-save: set on every edit, flushed from tick()
    dirty_since: Option<Instant>,

    // Popup input buffers (AddTask uses both: channel id + account index)
    pub input_buffer: String,
    pub input_secondary: String,
    pub input_field: usize,
    pending_delete: Option<PendingDelete>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = BackendClient::new(&config.backend_url);

        let dashboard = match &config.backend_config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse backend config: {}", e);
                        DashboardConfig::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read backend config: {}", e);
                    DashboardConfig::default()
                }
            },
            _ => DashboardConfig::default(),
        };

        // The stream session lives for the whole UI lifetime; connect now.
        let mut logs = LogStream::new(SseTransport::new(client.logs_url()));
        logs.connect();

        Ok(Self {
            section: Section::Tasks,
            popup: Popup::None,
            config,
            client,
            dashboard,
            logs,
            log_scroll: 0,
            selected_credential: 0,
            selected_task: 0,
            show_secrets: false,
            task_status: HashMap::new(),
            message_cache: None,
            status_message: None,
            status_message_time: None,
            dirty_since: None,
            input_buffer: String::new(),
            input_secondary: String::new(),
            input_field: 0,
            pending_delete: None,
        })
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    fn notify(&self, body: &str) {
        if !self.config.notifications {
            return;
        }
        let _ = notify_rust::Notification::new()
            .summary("kendali")
            .body(body)
            .icon("utilities-terminal")
            .show();
    }

    /// All credential rows for the Accounts box, flattened in display order.
    pub fn credential_rows(&self) -> Vec<(CredentialKind, usize, &str)> {
        let mut rows = Vec::new();
        for (i, token) in self.dashboard.discord_tokens.iter().enumerate() {
            rows.push((CredentialKind::DiscordToken, i, token.as_str()));
        }
        for (i, key) in self.dashboard.google_api_keys.iter().enumerate() {
            rows.push((CredentialKind::GoogleKey, i, key.as_str()));
        }
        for (i, key) in self.dashboard.openrouter_api_keys.iter().enumerate() {
            rows.push((CredentialKind::OpenRouterKey, i, key.as_str()));
        }
        rows
    }

    pub fn credential_count(&self) -> usize {
        self.dashboard.discord_tokens.len()
            + self.dashboard.google_api_keys.len()
            + self.dashboard.openrouter_api_keys.len()
    }

    /// Map a display row back to the credential list it belongs to.
    fn credential_at(&self, row: usize) -> Option<(CredentialKind, usize)> {
        let tokens = self.dashboard.discord_tokens.len();
        let google = self.dashboard.google_api_keys.len();
        if row < tokens {
            Some((CredentialKind::DiscordToken, row))
        } else if row < tokens + google {
            Some((CredentialKind::GoogleKey, row - tokens))
        } else if row < self.credential_count() {
            Some((CredentialKind::OpenRouterKey, row - tokens - google))
        } else {
            None
        }
    }

    pub fn status_of(&self, task_id: &str) -> TaskStatus {
        self.task_status
            .get(task_id)
            .copied()
            .unwrap_or(TaskStatus::Unknown)
    }

    /// Restart the save debounce; the config is POSTed once edits settle.
    fn mark_dirty(&mut self) {
        self.dirty_since = Some(Instant::now());
    }

    pub fn save_pending(&self) -> bool {
        self.dirty_since.is_some()
    }

    pub async fn tick(&mut self) -> Result<()> {
        self.logs.tick(Instant::now());
        if self.logs.take_scroll_request() {
            self.log_scroll = 0;
        }

        // Clear status message after 3 seconds
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_CLEAR_SECS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        // Flush the debounced save once edits have settled
        if let Some(since) = self.dirty_since {
            if since.elapsed() >= SAVE_DEBOUNCE {
                self.dirty_since = None;
                self.save_dashboard().await;
            }
        }

        Ok(())
    }

    async fn save_dashboard(&mut self) {
        for task in &mut self.dashboard.tasks {
            task.sync_compat_flags();
        }

        match self.client.save_config(&self.dashboard).await {
            Ok(response) => {
                self.set_status(response.message.clone());
                if !response.is_success() {
                    self.notify(&format!("Gagal menyimpan: {}", response.message));
                }
            }
            Err(e) => {
                tracing::error!("save_config failed: {}", e);
                self.set_status("Gagal menyimpan konfigurasi.");
                self.notify("Gagal menyimpan konfigurasi.");
            }
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup != Popup::None {
            return self.handle_popup_key(key).await;
        }
        self.handle_normal_key(key).await
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            // Navigation between sections (Accounts ↔ Tasks ↔ Logs)
            KeyCode::Tab => {
                self.switch_section(match self.section {
                    Section::Accounts => Section::Tasks,
                    Section::Tasks => Section::Logs,
                    Section::Logs => Section::Accounts,
                });
            }
            KeyCode::BackTab => {
                self.switch_section(match self.section {
                    Section::Accounts => Section::Logs,
                    Section::Tasks => Section::Accounts,
                    Section::Logs => Section::Tasks,
                });
            }

            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),

            // Help
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            // Refresh the backend pesan.txt cache
            KeyCode::Char('R') => self.refresh_message_cache().await,

            _ => match self.section {
                Section::Accounts => self.handle_accounts_key(key)?,
                Section::Tasks => self.handle_tasks_key(key).await?,
                Section::Logs => self.handle_logs_key(key),
            },
        }
        Ok(())
    }

    fn switch_section(&mut self, section: Section) {
        self.section = section;
        // The log panel may have sat hidden through a dead connection;
        // resubscribe if the transport is gone (never duplicates).
        if section == Section::Logs {
            self.logs.reconnect_if_closed();
        }
    }

    fn handle_accounts_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('t') => self.open_input_popup(Popup::AddToken),
            KeyCode::Char('g') => self.open_input_popup(Popup::AddGoogleKey),
            KeyCode::Char('o') => self.open_input_popup(Popup::AddOpenRouterKey),
            KeyCode::Char('v') => {
                self.show_secrets = !self.show_secrets;
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some((kind, index)) = self.credential_at(self.selected_credential) {
                    self.pending_delete = Some(PendingDelete::Credential(kind, index));
                    self.set_status(format!("Hapus {} #{}? (y/n)", kind.label(), index + 1));
                    self.popup = Popup::Confirm;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_tasks_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('a') => self.open_input_popup(Popup::AddTask),
            KeyCode::Char('s') | KeyCode::Enter => self.control_selected_task(true).await,
            KeyCode::Char('x') => self.control_selected_task(false).await,
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(task) = self.dashboard.tasks.get(self.selected_task) {
                    self.pending_delete = Some(PendingDelete::Task(self.selected_task));
                    self.set_status(format!("Hapus tugas '{}'? (y/n)", task.id));
                    self.popup = Popup::Confirm;
                }
            }
            KeyCode::Char('m') => self.edit_selected_task(|task| {
                task.mode = task.mode.next();
                format!("Mode: {}", task.mode.label())
            }),
            KeyCode::Char('i') => {
                let accounts = self.dashboard.discord_tokens.len();
                if accounts == 0 {
                    self.set_status("Belum ada akun. Tambah token dulu (t).");
                } else {
                    self.edit_selected_task(move |task| {
                        task.assigned_token_index = (task.assigned_token_index + 1) % accounts;
                        format!("Akun bertugas: #{}", task.assigned_token_index + 1)
                    });
                }
            }
            KeyCode::Char('u') => self.edit_selected_task(|task| {
                task.use_reply = !task.use_reply;
                format!("Balas sebagai reply: {}", if task.use_reply { "ya" } else { "tidak" })
            }),
            KeyCode::Char('+') | KeyCode::Char('=') => self.edit_selected_task(|task| {
                task.delay_interval = task.delay_interval.saturating_add(DELAY_STEP_SECS);
                format!("Interval kirim: {}s", task.delay_interval)
            }),
            KeyCode::Char('-') => self.edit_selected_task(|task| {
                task.delay_interval =
                    task.delay_interval.saturating_sub(DELAY_STEP_SECS).max(MIN_DELAY_SECS);
                format!("Interval kirim: {}s", task.delay_interval)
            }),
            KeyCode::Char(']') => self.edit_selected_task(|task| {
                task.read_delay = task.read_delay.saturating_add(DELAY_STEP_SECS);
                format!("Delay baca: {}s", task.read_delay)
            }),
            KeyCode::Char('[') => self.edit_selected_task(|task| {
                task.read_delay = task.read_delay.saturating_sub(DELAY_STEP_SECS).max(MIN_DELAY_SECS);
                format!("Delay baca: {}s", task.read_delay)
            }),
            _ => {}
        }
        Ok(())
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') => {
                self.logs.clear();
                self.log_scroll = 0;
            }
            KeyCode::Char('r') => {
                self.logs.reconnect_if_closed();
            }
            KeyCode::PageUp => {
                self.log_scroll = (self.log_scroll + 10).min(self.logs.buffer().len());
            }
            KeyCode::PageDown => {
                self.log_scroll = self.log_scroll.saturating_sub(10);
            }
            KeyCode::Char('G') | KeyCode::End => self.log_scroll = 0,
            _ => {}
        }
    }

    async fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::AddToken | Popup::AddGoogleKey | Popup::AddOpenRouterKey => {
                self.handle_credential_input_key(key)
            }
            Popup::AddTask => self.handle_add_task_key(key),
            Popup::Help => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')
                ) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::Confirm => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.confirm_delete();
                        self.popup = Popup::None;
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.pending_delete = None;
                        self.popup = Popup::None;
                    }
                    _ => {}
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    fn open_input_popup(&mut self, popup: Popup) {
        self.popup = popup;
        self.input_buffer.clear();
        self.input_secondary.clear();
        self.input_field = 0;
    }

    fn handle_credential_input_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.input_buffer.clear();
            }
            KeyCode::Enter => self.submit_credential(),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Char(c) if !c.is_whitespace() => self.input_buffer.push(c),
            _ => {}
        }
        Ok(())
    }

    fn submit_credential(&mut self) {
        let value = self.input_buffer.trim().to_string();
        if value.is_empty() {
            return;
        }

        let accepted = match self.popup {
            Popup::AddToken => {
                if valid_discord_token(&value) {
                    self.dashboard.discord_tokens.push(value);
                    self.set_status("Token ditambahkan.");
                    true
                } else {
                    self.set_status("Format token tidak valid (harus panjang dan mengandung titik).");
                    false
                }
            }
            Popup::AddGoogleKey => {
                if valid_google_api_key(&value) {
                    self.dashboard.google_api_keys.push(value);
                    self.set_status("API key ditambahkan.");
                    true
                } else {
                    self.set_status("Format API key tidak valid (harus diawali AIzaSy).");
                    false
                }
            }
            Popup::AddOpenRouterKey => {
                if valid_openrouter_key(&value) {
                    self.dashboard.openrouter_api_keys.push(value);
                    self.set_status("OpenRouter key ditambahkan.");
                    true
                } else {
                    self.set_status("Format key tidak valid (harus diawali sk-or-).");
                    false
                }
            }
            _ => false,
        };

        if accepted {
            self.mark_dirty();
            self.popup = Popup::None;
            self.input_buffer.clear();
        }
        // Invalid input keeps the popup open for correction.
    }

    fn handle_add_task_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.input_buffer.clear();
                self.input_secondary.clear();
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.input_field = if self.input_field == 0 { 1 } else { 0 };
            }
            KeyCode::Enter => {
                if self.input_field == 0 {
                    self.input_field = 1;
                } else {
                    self.submit_new_task();
                }
            }
            KeyCode::Backspace => {
                if self.input_field == 0 {
                    self.input_buffer.pop();
                } else {
                    self.input_secondary.pop();
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                // Both fields are numeric: channel id and account number
                if self.input_field == 0 {
                    self.input_buffer.push(c);
                } else {
                    self.input_secondary.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn submit_new_task(&mut self) {
        let channel_id = self.input_buffer.trim().to_string();
        if channel_id.is_empty() {
            self.set_status("Masukkan Channel ID yang valid.");
            return;
        }

        let accounts = self.dashboard.discord_tokens.len();
        if accounts == 0 {
            self.set_status("Belum ada akun bot. Tambah token dulu.");
            return;
        }

        // Account numbers are 1-based in the UI; empty means the first one.
        let token_index = match self.input_secondary.trim() {
            "" => 0,
            s => match s.parse::<usize>() {
                Ok(n) if (1..=accounts).contains(&n) => n - 1,
                _ => {
                    self.set_status(format!("Pilih akun bot 1..{}.", accounts));
                    return;
                }
            },
        };

        let task = TaskConfig::new(next_task_id(), channel_id, token_index);
        self.dashboard.tasks.push(task);
        self.selected_task = self.dashboard.tasks.len() - 1;
        self.set_status("Tugas baru ditambahkan.");
        self.mark_dirty();

        self.popup = Popup::None;
        self.input_buffer.clear();
        self.input_secondary.clear();
    }

    fn confirm_delete(&mut self) {
        match self.pending_delete.take() {
            Some(PendingDelete::Credential(kind, index)) => {
                let removed = match kind {
                    CredentialKind::DiscordToken => {
                        (index < self.dashboard.discord_tokens.len())
                            .then(|| self.dashboard.discord_tokens.remove(index))
                    }
                    CredentialKind::GoogleKey => {
                        (index < self.dashboard.google_api_keys.len())
                            .then(|| self.dashboard.google_api_keys.remove(index))
                    }
                    CredentialKind::OpenRouterKey => {
                        (index < self.dashboard.openrouter_api_keys.len())
                            .then(|| self.dashboard.openrouter_api_keys.remove(index))
                    }
                };

                if removed.is_some() {
                    let rows = self.credential_count();
                    if self.selected_credential >= rows && rows > 0 {
                        self.selected_credential = rows - 1;
                    }
                    self.set_status(format!("{} dihapus.", kind.label()));
                    self.mark_dirty();
                }
            }
            Some(PendingDelete::Task(index)) => {
                if index < self.dashboard.tasks.len() {
                    let task = self.dashboard.tasks.remove(index);
                    self.task_status.remove(&task.id);
                    if self.selected_task >= self.dashboard.tasks.len()
                        && !self.dashboard.tasks.is_empty()
                    {
                        self.selected_task = self.dashboard.tasks.len() - 1;
                    }
                    self.set_status(format!("Tugas '{}' dihapus.", task.id));
                    self.mark_dirty();
                }
            }
            None => {}
        }
    }

    fn move_down(&mut self) {
        match self.section {
            Section::Accounts => {
                let rows = self.credential_count();
                if rows > 0 {
                    self.selected_credential = (self.selected_credential + 1) % rows;
                }
            }
            Section::Tasks => {
                if !self.dashboard.tasks.is_empty() {
                    self.selected_task = (self.selected_task + 1) % self.dashboard.tasks.len();
                }
            }
            Section::Logs => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
        }
    }

    fn move_up(&mut self) {
        match self.section {
            Section::Accounts => {
                let rows = self.credential_count();
                if rows > 0 {
                    self.selected_credential =
                        self.selected_credential.checked_sub(1).unwrap_or(rows - 1);
                }
            }
            Section::Tasks => {
                if !self.dashboard.tasks.is_empty() {
                    self.selected_task = self
                        .selected_task
                        .checked_sub(1)
                        .unwrap_or(self.dashboard.tasks.len() - 1);
                }
            }
            Section::Logs => {
                self.log_scroll = (self.log_scroll + 1).min(self.logs.buffer().len());
            }
        }
    }

    fn edit_selected_task(&mut self, edit: impl FnOnce(&mut TaskConfig) -> String) {
        if let Some(task) = self.dashboard.tasks.get_mut(self.selected_task) {
            let status = edit(task);
            self.set_status(status);
            self.mark_dirty();
        }
    }

    async fn control_selected_task(&mut self, start: bool) {
        let Some(task) = self.dashboard.tasks.get(self.selected_task) else {
            return;
        };
        let task_id = task.id.clone();

        let result = if start {
            self.client.start_task(&task_id).await
        } else {
            self.client.stop_task(&task_id).await
        };

        match result {
            Ok(response) => {
                match response.status {
                    ResponseStatus::Success => {
                        let status = if start { TaskStatus::Running } else { TaskStatus::Stopped };
                        self.task_status.insert(task_id, status);
                    }
                    // "Already running" on start still means the task runs.
                    ResponseStatus::Warning if start => {
                        self.task_status.insert(task_id, TaskStatus::Running);
                    }
                    _ => {}
                }
                self.notify(&response.message);
                self.set_status(response.message);
            }
            Err(e) => {
                tracing::error!("task control failed: {}", e);
                self.set_status(format!(
                    "Gagal {} tugas.",
                    if start { "memulai" } else { "menghentikan" }
                ));
            }
        }
    }

    async fn refresh_message_cache(&mut self) {
        match self.client.refresh_messages().await {
            Ok(response) => {
                self.message_cache = response.info.clone();
                self.set_status(response.message);
            }
            Err(e) => {
                tracing::error!("refresh_pesan failed: {}", e);
                self.set_status("Gagal refresh pesan.txt.");
            }
        }
    }
}

/// Unique-enough task id from epoch millis.
fn next_task_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("task_{}", millis)
}
