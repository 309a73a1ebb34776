//! dbchat Desktop: egui app state and UI.

use dbchat::api::{AuthClient, ChatClient};
use dbchat::catalog::Catalog;
use dbchat::conversation::{ChatBackend, Conversation, SendOutcome};
use dbchat::history::{self, HistorySidebar};
use dbchat::models::{
    ChatHistory, LoginCredentials, Message, ModelType, RegisterData, Role, User,
};
use dbchat::render;
use dbchat::routing::{Navigator, Route, Section};
use dbchat::session::SessionStore;
use eframe::egui;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

const CHAT_INPUT_HEIGHT: f32 = 90.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // HTTP stack debug output drowns ours.
        metadata.level() <= log::Level::Info || metadata.target().starts_with("dbchat")
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

/// Run `fut` on a fresh current-thread runtime in a background thread. The result
/// arrives on the returned receiver; a disconnect means the runtime could not start.
fn spawn_task<T, F>(fut: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("failed to start background runtime: {}", e);
                return;
            }
        };
        let _ = tx.send(rt.block_on(fut));
    });
    rx
}

/// What the central panel shows. Everything but Logs mirrors the current route.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Screen {
    Login,
    Register,
    Chat,
    StandardQueries,
    Logs,
}

/// Result of a send: the conversation comes back from the worker with the outcome.
struct ChatTurn {
    conversation: Conversation,
    outcome: Option<SendOutcome>,
}

#[derive(Default)]
struct AuthForm {
    email: String,
    username: String,
    password: String,
    error: Option<String>,
}

pub struct DbChatApp {
    session: SessionStore,
    auth: AuthClient,
    chat: ChatClient,
    catalog: Catalog,
    /// Signed-in user, re-read from the session store after login, register and logout.
    user: Option<User>,
    nav: Navigator,
    show_logs: bool,

    auth_form: AuthForm,
    /// When Some, a login or register request is in flight.
    auth_receiver: Option<mpsc::Receiver<Result<User, String>>>,

    /// None while the conversation is away in a worker (send or open in flight).
    conversation: Option<Conversation>,
    /// Messages shown while the conversation is away.
    messages_snapshot: Vec<Message>,
    /// User message of the in-flight send, shown under the snapshot.
    pending_user_message: Option<String>,
    chat_turn_receiver: Option<mpsc::Receiver<ChatTurn>>,
    open_receiver: Option<mpsc::Receiver<Conversation>>,
    chat_input: String,
    model: ModelType,

    sidebar: HistorySidebar,
    history_receiver: Option<mpsc::Receiver<Option<Vec<ChatHistory>>>>,
    delete_receiver: Option<mpsc::Receiver<(String, bool)>>,

    query_search: String,
}

impl DbChatApp {
    /// Space between the main screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 48.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);

        let (config, path) = match dbchat::config::load_config(None) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("failed to load config, using defaults: {:#}", e);
                (
                    dbchat::config::Config::default(),
                    dbchat::config::default_config_path(),
                )
            }
        };
        let base_url = dbchat::config::resolve_api_base_url(&config);
        let session_path = dbchat::config::resolve_session_path(&config, &path);
        let session = SessionStore::file(session_path);
        let user = session.current_user();
        log::info!("desktop started (api {})", base_url);

        let mut app = Self {
            nav: Navigator::new(Route::Index, user.is_some()),
            session,
            auth: AuthClient::new(Some(base_url.clone())),
            chat: ChatClient::new(Some(base_url)),
            catalog: Catalog::standard(),
            user,
            show_logs: false,
            auth_form: AuthForm::default(),
            auth_receiver: None,
            conversation: None,
            messages_snapshot: Vec::new(),
            pending_user_message: None,
            chat_turn_receiver: None,
            open_receiver: None,
            chat_input: String::new(),
            model: dbchat::config::resolve_default_model(&config),
            sidebar: HistorySidebar::new(),
            history_receiver: None,
            delete_receiver: None,
            query_search: String::new(),
        };
        app.refresh_history();
        app
    }

    fn has_session(&self) -> bool {
        self.user.is_some()
    }

    fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::new(self.chat.clone())
    }

    fn user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| u.id.clone())
            .filter(|id| !id.is_empty())
    }

    fn screen(&self) -> Screen {
        if self.show_logs {
            return Screen::Logs;
        }
        match self.nav.current() {
            Route::Login => Screen::Login,
            Route::Register => Screen::Register,
            Route::StandardQueries => Screen::StandardQueries,
            _ => Screen::Chat,
        }
    }

    fn go(&mut self, route: Route) {
        self.show_logs = false;
        let has_session = self.has_session();
        self.nav.go(route, has_session);
    }

    fn new_chat(&mut self) {
        self.show_logs = false;
        let has_session = self.has_session();
        self.nav.new_chat(has_session);
    }

    fn is_busy(&self) -> bool {
        self.auth_receiver.is_some()
            || self.chat_turn_receiver.is_some()
            || self.open_receiver.is_some()
            || self.history_receiver.is_some()
            || self.delete_receiver.is_some()
    }

    fn start_login(&mut self) {
        if self.auth_receiver.is_some() {
            return;
        }
        self.auth_form.error = None;
        let creds = LoginCredentials {
            email: self.auth_form.email.trim().to_string(),
            password: self.auth_form.password.clone(),
        };
        let session = self.session.clone();
        let auth = self.auth.clone();
        self.auth_receiver = Some(spawn_task(async move {
            session
                .login(&auth, &creds)
                .await
                .map(|res| res.user)
                .map_err(|e| e.to_string())
        }));
    }

    fn start_register(&mut self) {
        if self.auth_receiver.is_some() {
            return;
        }
        self.auth_form.error = None;
        let data = RegisterData {
            email: self.auth_form.email.trim().to_string(),
            password: self.auth_form.password.clone(),
            username: self.auth_form.username.trim().to_string(),
        };
        let session = self.session.clone();
        let auth = self.auth.clone();
        self.auth_receiver = Some(spawn_task(async move {
            session
                .register(&auth, &data)
                .await
                .map(|res| res.user)
                .map_err(|e| e.to_string())
        }));
    }

    fn poll_auth(&mut self) {
        let Some(rx) = &self.auth_receiver else { return };
        let result = match rx.try_recv() {
            Ok(r) => r,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("Unable to connect to the server".to_string()),
        };
        self.auth_receiver = None;
        match result {
            Ok(user) => {
                self.user = Some(user);
                self.auth_form = AuthForm::default();
                self.conversation = None;
                self.go(Route::Chat(None));
                self.refresh_history();
            }
            Err(e) => self.auth_form.error = Some(e),
        }
    }

    fn logout(&mut self) {
        if let Err(e) = self.session.logout() {
            log::error!("logout failed: {}", e);
        }
        self.user = None;
        self.conversation = None;
        self.messages_snapshot.clear();
        self.sidebar = HistorySidebar::new();
        self.go(Route::Login);
    }

    fn refresh_history(&mut self) {
        let Some(user_id) = self.user_id() else { return };
        let chat = self.chat.clone();
        self.history_receiver = Some(spawn_task(async move {
            let mut sidebar = HistorySidebar::new();
            sidebar
                .refresh(&chat, &user_id)
                .await
                .then(|| sidebar.items().to_vec())
        }));
    }

    fn poll_history(&mut self) {
        if let Some(rx) = &self.history_receiver {
            match rx.try_recv() {
                Ok(items) => {
                    self.history_receiver = None;
                    // A failed refresh keeps what we had.
                    if let Some(items) = items {
                        self.sidebar.set_items(items);
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.history_receiver = None,
            }
        }
        if let Some(rx) = &self.delete_receiver {
            match rx.try_recv() {
                Ok((chat_id, true)) => {
                    self.delete_receiver = None;
                    self.sidebar.remove_deleted(&chat_id, &mut self.nav);
                }
                Ok((chat_id, false)) => {
                    self.delete_receiver = None;
                    log::warn!("chat {} was not deleted", chat_id);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.delete_receiver = None,
            }
        }
    }

    fn start_delete(&mut self, chat_id: String) {
        if self.delete_receiver.is_some() {
            return;
        }
        let chat = self.chat.clone();
        self.delete_receiver = Some(spawn_task(async move {
            let ok = match chat.delete_chat_history(&chat_id).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("deleting chat {} failed: {}", chat_id, e);
                    false
                }
            };
            (chat_id, ok)
        }));
    }

    /// Keep the conversation in step with the route: open the chat the route names,
    /// or start a fresh one. Then hand over a pending standard query.
    fn sync_conversation(&mut self) {
        if self.chat_turn_receiver.is_some() || self.open_receiver.is_some() {
            return;
        }
        if !matches!(self.nav.current(), Route::Chat(_)) {
            return;
        }
        let wanted = self.nav.current().chat_id().map(str::to_string);
        let have = self
            .conversation
            .as_ref()
            .map(|c| c.chat_id().map(str::to_string));
        let fresh = self.nav.take_fresh_request() && wanted.is_none();
        if fresh || have.as_ref() != Some(&wanted) {
            let backend = self.backend();
            let user_id = self.user_id();
            match wanted {
                None => {
                    self.conversation = Some(Conversation::fresh(backend, user_id));
                }
                Some(id) => {
                    self.messages_snapshot.clear();
                    self.conversation = None;
                    self.open_receiver = Some(spawn_task(async move {
                        Conversation::open(backend, user_id, Some(&id)).await
                    }));
                    return;
                }
            }
        }
        if let Some(query) = self.nav.take_pending_query() {
            self.start_chat_turn(query);
        }
    }

    fn poll_open(&mut self) {
        let Some(rx) = &self.open_receiver else { return };
        match rx.try_recv() {
            Ok(conversation) => {
                self.open_receiver = None;
                self.conversation = Some(conversation);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.open_receiver = None;
                self.go(Route::Chat(None));
                self.conversation = Some(Conversation::fresh(self.backend(), self.user_id()));
            }
        }
    }

    /// Move the conversation into a worker and send `text`. One send at a time.
    fn start_chat_turn(&mut self, text: String) {
        if self.chat_turn_receiver.is_some() || text.trim().is_empty() {
            return;
        }
        let Some(mut conversation) = self.conversation.take() else {
            return;
        };
        self.messages_snapshot = conversation.messages().to_vec();
        self.pending_user_message = Some(text.trim().to_string());
        let model = self.model;
        self.chat_turn_receiver = Some(spawn_task(async move {
            let outcome = conversation.send(&text, model).await;
            ChatTurn {
                conversation,
                outcome,
            }
        }));
    }

    fn poll_chat_turn(&mut self) {
        let Some(rx) = &self.chat_turn_receiver else { return };
        let turn = match rx.try_recv() {
            Ok(turn) => turn,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                self.chat_turn_receiver = None;
                self.pending_user_message = None;
                self.conversation = Some(Conversation::fresh(self.backend(), self.user_id()));
                return;
            }
        };
        self.chat_turn_receiver = None;
        self.pending_user_message = None;
        let created = turn
            .outcome
            .as_ref()
            .and_then(SendOutcome::created_chat_id)
            .map(str::to_string);
        if let Some(id) = created {
            // Only follow the new chat if the user is still looking at the fresh one.
            if self.nav.current() == &Route::Chat(None) && !self.nav.has_fresh_request() {
                self.nav.replace(Route::Chat(Some(id)));
            }
            self.refresh_history();
        }
        self.conversation = Some(turn.conversation);
    }

    fn render_chat_message(ui: &mut egui::Ui, idx: usize, m: &Message) {
        let is_user = m.role == Role::User;
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            if is_user {
                ui.label(egui::RichText::new(&m.content).strong());
                return;
            }
            ui.label(m.display_text());
            if let Some(sql) = m.sql_query.as_deref().filter(|s| !s.trim().is_empty()) {
                ui.add_space(6.0);
                egui::CollapsingHeader::new("SQL Query")
                    .id_source(("sql", idx))
                    .default_open(true)
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(sql.trim()).family(egui::FontFamily::Monospace));
                    });
            }
            let rows = m.rows();
            if !rows.is_empty() {
                ui.add_space(6.0);
                Self::render_table(ui, idx, rows);
            }
            if let Some(n) = m.rowcount.filter(|n| *n > 0) {
                ui.add_space(4.0);
                ui.label(egui::RichText::new(format!("Returned {} rows", n)).weak());
            }
        });
    }

    fn render_table(ui: &mut egui::Ui, idx: usize, rows: &[dbchat::models::Row]) {
        let columns = render::columns(rows);
        egui::ScrollArea::horizontal()
            .id_source(("table_scroll", idx))
            .show(ui, |ui| {
                egui::Grid::new(("table", idx))
                    .striped(true)
                    .show(ui, |ui| {
                        for c in &columns {
                            ui.label(egui::RichText::new(c).strong());
                        }
                        ui.end_row();
                        for row in rows {
                            for c in &columns {
                                let text = row.get(c).map(render::cell_text).unwrap_or_default();
                                ui.label(text);
                            }
                            ui.end_row();
                        }
                    });
            });
    }

    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let sending = self.chat_turn_receiver.is_some();
        let opening = self.open_receiver.is_some();
        let can_send = self.conversation.is_some();

        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height =
            CHAT_INPUT_HEIGHT + 8.0 + row_height + Self::SCREEN_FOOTER_SPACING;
        let available = ui.available_height();
        let messages_height = (available - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);
        let messages_rect = ui
            .allocate_exact_size(
                egui::vec2(ui.available_width(), messages_height),
                egui::Sense::hover(),
            )
            .0;
        let mut messages_ui =
            ui.child_ui(messages_rect, egui::Layout::top_down(egui::Align::Min));

        let messages: &[Message] = match &self.conversation {
            Some(c) => c.messages(),
            None => &self.messages_snapshot,
        };
        let pending = self.pending_user_message.as_deref();
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .show(&mut messages_ui, |ui| {
                let content_width = ui.available_width();
                ui.allocate_exact_size(egui::vec2(content_width, 0.0), egui::Sense::hover());
                for (idx, m) in messages.iter().enumerate() {
                    Self::render_chat_message(ui, idx, m);
                    ui.add_space(8.0);
                }
                if let Some(text) = pending {
                    Self::render_chat_message(ui, messages.len(), &Message::user(text));
                    ui.add_space(8.0);
                }
                if sending || opening {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(if opening { "Loading chat..." } else { "Thinking..." });
                    });
                } else if messages.is_empty() {
                    ui.label("This chat could not be loaded.");
                }
            });

        ui.add_space(8.0);
        let response = ui
            .add_enabled_ui(can_send, |ui| {
                ui.add_sized(
                    [ui.available_width(), CHAT_INPUT_HEIGHT],
                    egui::TextEdit::multiline(&mut self.chat_input)
                        .hint_text("Ask about your data..."),
                )
            })
            .inner;
        ui.add_space(8.0);

        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), row_height),
            egui::Sense::hover(),
        );
        let mut row_ui = ui.child_ui(rect, egui::Layout::right_to_left(egui::Align::Center));
        egui::Frame::none()
            .inner_margin(egui::Margin {
                left: 0.0,
                right: 8.0,
                top: 4.0,
                bottom: 4.0,
            })
            .show(&mut row_ui, |ui| {
                // Right-to-left: Send is rightmost, then the model selector.
                let mut send_now = ui.add_enabled(can_send, egui::Button::new("Send")).clicked();
                ui.add_space(8.0);
                egui::ComboBox::from_id_source("model_select")
                    .selected_text(self.model.label())
                    .show_ui(ui, |ui| {
                        for m in ModelType::ALL {
                            ui.selectable_value(&mut self.model, m, m.label());
                        }
                    });
                if can_send && response.has_focus() {
                    let enter = ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift);
                    if enter {
                        send_now = true;
                    }
                }
                if send_now {
                    let text = std::mem::take(&mut self.chat_input);
                    self.start_chat_turn(text);
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_recent_chats(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Recent chats");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        if ui.button("New chat").clicked() {
            self.new_chat();
        }
        ui.add_space(8.0);
        if self.history_receiver.is_some() && self.sidebar.is_empty() {
            ui.spinner();
        } else if self.sidebar.is_empty() {
            ui.label("No chats yet. Send a message to start one.");
        }

        let mut open = None;
        let mut delete = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for item in self.sidebar.items() {
                let active = history::is_active(item, self.nav.current());
                ui.horizontal(|ui| {
                    let title = if item.title.is_empty() { "Untitled" } else { item.title.as_str() };
                    if ui.selectable_label(active, title).clicked() {
                        open = Some(item.id.clone());
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Delete chat").clicked() {
                            delete = Some(item.id.clone());
                        }
                    });
                });
                if let Some(ts) = item.updated_at.as_deref().or(item.created_at.as_deref()) {
                    ui.label(egui::RichText::new(render::format_timestamp(ts)).small().weak());
                }
                ui.add_space(6.0);
            }
        });
        if let Some(id) = open {
            self.go(Route::Chat(Some(id)));
        }
        if let Some(id) = delete {
            self.start_delete(id);
        }
    }

    fn ui_standard_queries(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Standard Queries");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        ui.add(
            egui::TextEdit::singleline(&mut self.query_search)
                .hint_text("Search queries...")
                .desired_width(f32::INFINITY),
        );
        ui.add_space(12.0);

        let groups = self.catalog.filter(&self.query_search);
        let mut ask = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            if groups.is_empty() {
                ui.label("No queries match your search.");
            }
            for group in &groups {
                egui::Frame::none()
                    .stroke(egui::Stroke::new(
                        1.0,
                        ui.style().visuals.widgets.noninteractive.bg_stroke.color,
                    ))
                    .rounding(egui::Rounding::same(8.0))
                    .inner_margin(egui::Margin::same(12.0))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(group.category).strong());
                            ui.label(egui::RichText::new(group.count_label()).weak());
                        });
                        ui.add_space(6.0);
                        for q in &group.queries {
                            ui.horizontal(|ui| {
                                if ui.button("Ask").clicked() {
                                    ask = Some(*q);
                                }
                                if ui.button("Copy").clicked() {
                                    ui.output_mut(|o| o.copied_text = q.to_string());
                                    log::debug!("copied standard query to clipboard");
                                }
                                ui.label(*q);
                            });
                        }
                    });
                ui.add_space(10.0);
            }
        });
        if let Some(q) = ask {
            self.show_logs = false;
            let has_session = self.has_session();
            self.nav.navigate_with_query(q, has_session);
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_auth_screen(&mut self, ui: &mut egui::Ui, register: bool) {
        let busy = self.auth_receiver.is_some();
        ui.add_space(48.0);
        ui.vertical_centered(|ui| {
            ui.set_max_width(360.0);
            ui.heading(if register { "Create an account" } else { "Sign in" });
            ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
            if register {
                ui.add(egui::TextEdit::singleline(&mut self.auth_form.username).hint_text("Username"));
                ui.add_space(8.0);
            }
            ui.add(egui::TextEdit::singleline(&mut self.auth_form.email).hint_text("Email"));
            ui.add_space(8.0);
            let pw = ui.add(
                egui::TextEdit::singleline(&mut self.auth_form.password)
                    .password(true)
                    .hint_text("Password"),
            );
            ui.add_space(12.0);
            let submit_label = if register { "Register" } else { "Sign in" };
            let mut submit = ui.add_enabled(!busy, egui::Button::new(submit_label)).clicked();
            if pw.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }
            if busy {
                ui.add_space(8.0);
                ui.spinner();
            }
            if let Some(ref err) = self.auth_form.error {
                ui.add_space(8.0);
                ui.colored_label(egui::Color32::RED, err);
            }
            ui.add_space(16.0);
            let (switch_label, target) = if register {
                ("Already have an account? Sign in", Route::Login)
            } else {
                ("No account? Register", Route::Register)
            };
            if ui.link(switch_label).clicked() {
                self.auth_form.error = None;
                self.go(target);
            }
            if submit && !busy {
                if register {
                    self.start_register();
                } else {
                    self.start_login();
                }
            }
        });
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for DbChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_auth();
        self.poll_history();
        self.poll_open();
        self.poll_chat_turn();
        self.sync_conversation();
        if self.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("dbchat");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if let Some(user) = self.user.clone() {
                                if ui.button("Logout").clicked() {
                                    self.logout();
                                }
                                ui.label(user.username);
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let section = self.nav.active_section();
        let signed_in = self.has_session();
        let mut clicked = None;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(170.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if signed_in {
                            let chat = !self.show_logs && section == Some(Section::Chat);
                            if ui.selectable_label(chat, "Chat").clicked() {
                                clicked = Some(Some(Route::Chat(None)));
                            }
                            ui.add_space(12.0);
                            let queries = !self.show_logs && section == Some(Section::StandardQueries);
                            if ui.selectable_label(queries, "Standard Queries").clicked() {
                                clicked = Some(Some(Route::StandardQueries));
                            }
                            ui.add_space(12.0);
                        }
                        if ui.selectable_label(self.show_logs, "Logs").clicked() {
                            clicked = Some(None);
                        }
                    });
            });
        match clicked {
            Some(Some(Route::Chat(None))) if section == Some(Section::Chat) => {
                // Back to whatever chat was open.
                self.show_logs = false;
            }
            Some(Some(Route::Chat(None))) => self.new_chat(),
            Some(Some(route)) => self.go(route),
            Some(None) => self.show_logs = true,
            None => {}
        }

        let screen = self.screen();
        if screen == Screen::Chat {
            egui::SidePanel::right("recent_chats")
                .resizable(false)
                .exact_width(240.0)
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .inner_margin(egui::Margin::symmetric(16.0, 0.0))
                        .show(ui, |ui| self.ui_recent_chats(ui));
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match screen {
                    Screen::Login => self.ui_auth_screen(ui, false),
                    Screen::Register => self.ui_auth_screen(ui, true),
                    Screen::Chat => {
                        ui.add_space(24.0);
                        ui.heading("Chat");
                        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
                        self.ui_chat(ui);
                    }
                    Screen::StandardQueries => self.ui_standard_queries(ui),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }
}
