use crossbeam::channel::{self, Receiver, Sender};
use raylib::prelude::*;
use std::sync::{Arc, Mutex};

use video_ideas::api::{GeminiClient, GenerationApi};
use video_ideas::config::{Config, DEFAULT_CONFIG_PATH, GenerationSettings};
use video_ideas::credential::StoredCredential;
use video_ideas::editor::{DEFAULT_DESCRIPTION, DEFAULT_TITLE};
use video_ideas::init;
use video_ideas::platform;
use video_ideas::session::MediaSession;
use video_ideas::set_log_hook;
use video_ideas::storage::LocalStorage;
use video_ideas::studio::{Studio, Submission};
use video_ideas::workflow::{Attempt, AttemptPlan, CancelFlag, GenerationError, Outcome, Phase};

const LOG_MAX_LINES: usize = 300;
const LOG_LINE_MAX: usize = 600;

const COLOR_BG: Color = Color::new(11, 22, 25, 255);
const COLOR_PANEL: Color = Color::new(16, 31, 34, 255);
const COLOR_BTN: Color = Color::new(19, 200, 236, 255);
const COLOR_BTN_HOVER: Color = Color::new(240, 250, 252, 255);
const COLOR_BTN_DISABLED: Color = Color::new(40, 60, 64, 255);
const COLOR_FIELD: Color = Color::new(24, 40, 44, 255);
const COLOR_FIELD_FOCUS: Color = Color::new(19, 200, 236, 255);
const COLOR_LOG_BG: Color = Color::new(8, 16, 18, 255);
const COLOR_LOG_TEXT: Color = Color::new(170, 190, 196, 255);
const COLOR_ERROR: Color = Color::new(248, 113, 113, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Prompt,
    Voiceover,
    Key,
}

enum WorkerMessage {
    Phase(Phase),
    Finished(Result<Outcome, GenerationError>, Vec<Phase>),
}

struct AppState {
    studio: Studio<StoredCredential>,
    api: Arc<GeminiClient>,
    focus: Focus,
    log_buffer: Arc<Mutex<Vec<String>>>,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
}

fn push_log_line(buffer: &Arc<Mutex<Vec<String>>>, line: &str) {
    let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
    if guard.len() >= LOG_MAX_LINES {
        let excess = guard.len() + 1 - LOG_MAX_LINES;
        guard.drain(0..excess);
    }
    let mut text = line.to_string();
    if text.len() > LOG_LINE_MAX {
        let mut cut = LOG_LINE_MAX;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    guard.push(text);
}

fn snapshot_logs(buffer: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn clicked(d: &RaylibDrawHandle, rect: Rectangle) -> bool {
    rect.check_collision_point_rec(d.get_mouse_position())
        && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT)
}

fn draw_button(
    d: &mut RaylibDrawHandle,
    rect: Rectangle,
    label: &str,
    enabled: bool,
    font_size: f32,
) -> bool {
    let mouse = d.get_mouse_position();
    let hot = rect.check_collision_point_rec(mouse);

    let bg = if !enabled {
        COLOR_BTN_DISABLED
    } else if hot {
        COLOR_BTN_HOVER
    } else {
        COLOR_BTN
    };

    d.draw_rectangle_rounded(rect, 0.25, 10, bg);

    let ts = d.measure_text(label, font_size as i32);
    let pos_x = rect.x + (rect.width - ts as f32) * 0.5;
    let pos_y = rect.y + (rect.height - font_size) * 0.5;
    d.draw_text(label, pos_x as i32, pos_y as i32, font_size as i32, COLOR_BG);

    enabled && hot && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT)
}

/// Longest suffix of `text` that fits in `width` pixels.
fn fit_tail(d: &RaylibDrawHandle, text: &str, width: f32, font_size: i32) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        let tail: String = chars[start..].iter().collect();
        if (d.measure_text(&tail, font_size) as f32) <= width {
            return tail;
        }
        start += 1;
    }
    String::new()
}

fn draw_field(
    d: &mut RaylibDrawHandle,
    rect: Rectangle,
    label: &str,
    text: &str,
    placeholder: &str,
    focused: bool,
) -> bool {
    d.draw_text(label, rect.x as i32, rect.y as i32 - 18, 12, Color::GRAY);
    d.draw_rectangle_rounded(rect, 0.2, 8, COLOR_FIELD);
    if focused {
        d.draw_rectangle_rounded_lines(rect, 0.2, 8, COLOR_FIELD_FOCUS);
    }

    let pad = 10.0;
    let font_size = 16;
    let y = rect.y as i32 + (rect.height as i32 - font_size) / 2;
    if text.is_empty() {
        d.draw_text(placeholder, (rect.x + pad) as i32, y, font_size, Color::DARKGRAY);
    } else {
        let shown = fit_tail(d, text, rect.width - 2.0 * pad, font_size);
        d.draw_text(&shown, (rect.x + pad) as i32, y, font_size, Color::RAYWHITE);
    }

    clicked(d, rect)
}

fn draw_log_panel(d: &mut RaylibDrawHandle, rect: Rectangle, lines: &[String]) {
    d.draw_rectangle_rec(rect, COLOR_LOG_BG);
    d.draw_rectangle_lines_ex(rect, 2.0, COLOR_PANEL);

    let font_size = 12;
    let pad = 8.0;
    let line_h = 14.0;
    let max_lines = ((rect.height - 2.0 * pad) / line_h).floor().max(1.0) as usize;

    let start = lines.len().saturating_sub(max_lines);

    let mut y = rect.y + pad;
    for line in lines.iter().skip(start) {
        d.draw_text(line, (rect.x + pad) as i32, y as i32, font_size, COLOR_LOG_TEXT);
        y += line_h;
    }
}

fn start_attempt_thread(
    api: Arc<GeminiClient>,
    settings: GenerationSettings,
    session: Arc<MediaSession>,
    cancel: CancelFlag,
    plan: AttemptPlan,
    log_buffer: Arc<Mutex<Vec<String>>>,
    tx: Sender<WorkerMessage>,
) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => {
                push_log_line(&log_buffer, &format!("[ERROR] {}", err));
                let _ = tx.send(WorkerMessage::Finished(
                    Err(GenerationError::Submit(anyhow::Error::new(err))),
                    Vec::new(),
                ));
                return;
            }
        };

        let phase_tx = tx.clone();
        let api: &dyn GenerationApi = api.as_ref();
        let mut attempt = Attempt::new(api, &settings, &session, cancel).with_observer(Box::new(
            move |phase| {
                let _ = phase_tx.send(WorkerMessage::Phase(phase));
            },
        ));
        let result = rt.block_on(attempt.run(&plan));
        let _ = tx.send(WorkerMessage::Finished(result, attempt.into_trace()));
    });
}

impl AppState {
    fn launch(&mut self, submission: Submission) {
        match submission {
            Submission::Ready(plan) => {
                self.log_buffer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clear();
                start_attempt_thread(
                    Arc::clone(&self.api),
                    self.studio.settings().clone(),
                    self.studio.session(),
                    self.studio.cancel_flag(),
                    plan,
                    Arc::clone(&self.log_buffer),
                    self.tx.clone(),
                );
            }
            Submission::NeedsKey => self.focus = Focus::Key,
            Submission::Ignored => {}
        }
    }

    fn drain_worker(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                WorkerMessage::Phase(phase) => self.studio.observe(phase),
                WorkerMessage::Finished(result, trace) => {
                    self.studio.set_last_trace(trace);
                    self.studio.finish(result);
                    if self.focus == Focus::Key {
                        self.focus = Focus::Prompt;
                    }
                }
            }
        }
    }

    fn handle_typing(&mut self, rl: &mut RaylibHandle) {
        let editing_key = self.studio.editor().is_open();
        if !editing_key && self.studio.is_generating() {
            return;
        }
        let focus = if editing_key { Focus::Key } else { self.focus };

        while let Some(ch) = rl.get_char_pressed() {
            match focus {
                Focus::Prompt => self.studio.prompt.push(ch),
                Focus::Voiceover => self.studio.voiceover.push(ch),
                Focus::Key => self.studio.editor_mut().push_char(ch),
            }
        }
        let modifier = rl.is_key_down(KeyboardKey::KEY_LEFT_CONTROL)
            || rl.is_key_down(KeyboardKey::KEY_RIGHT_CONTROL)
            || rl.is_key_down(KeyboardKey::KEY_LEFT_SUPER)
            || rl.is_key_down(KeyboardKey::KEY_RIGHT_SUPER);
        if modifier && rl.is_key_pressed(KeyboardKey::KEY_V) {
            if let Ok(text) = rl.get_clipboard_text() {
                match focus {
                    Focus::Prompt => self.studio.prompt.push_str(&text.replace('\n', " ")),
                    Focus::Voiceover => self.studio.voiceover.push_str(&text.replace('\n', " ")),
                    Focus::Key => self.studio.editor_mut().paste(&text),
                }
            }
        }
        if rl.is_key_pressed(KeyboardKey::KEY_BACKSPACE) {
            match focus {
                Focus::Prompt => {
                    self.studio.prompt.pop();
                }
                Focus::Voiceover => {
                    self.studio.voiceover.pop();
                }
                Focus::Key => self.studio.editor_mut().pop_char(),
            }
        }
        if rl.is_key_pressed(KeyboardKey::KEY_TAB) && !editing_key {
            self.focus = match self.focus {
                Focus::Prompt => Focus::Voiceover,
                _ => Focus::Prompt,
            };
        }
    }
}

fn draw_key_modal(d: &mut RaylibDrawHandle, state: &mut AppState, screen: Rectangle) {
    d.draw_rectangle_rec(screen, Color::new(0, 0, 0, 200));

    let w = 520.0;
    let h = 300.0;
    let modal = Rectangle::new((screen.width - w) * 0.5, (screen.height - h) * 0.5, w, h);
    d.draw_rectangle_rounded(modal, 0.08, 10, COLOR_PANEL);
    d.draw_text(DEFAULT_TITLE, modal.x as i32 + 24, modal.y as i32 + 20, 22, Color::RAYWHITE);
    let desc = fit_tail(d, DEFAULT_DESCRIPTION, w - 48.0, 12);
    d.draw_text(&desc, modal.x as i32 + 24, modal.y as i32 + 52, 12, Color::GRAY);

    let editor = state.studio.editor();
    let shown = editor.display_value('*');
    let placeholder = editor.placeholder();
    let reveal_label = editor.reveal_label();
    let can_save = editor.can_save();

    let field = Rectangle::new(modal.x + 24.0, modal.y + 100.0, w - 48.0, 40.0);
    draw_field(d, field, "Gemini API key", &shown, placeholder, true);

    if draw_button(d, Rectangle::new(modal.x + 24.0, modal.y + 150.0, 130.0, 28.0), reveal_label, true, 12.0) {
        state.studio.editor_mut().toggle_reveal();
    }
    if draw_button(d, Rectangle::new(modal.x + w - 174.0, modal.y + 150.0, 150.0, 28.0), "Clear saved key", true, 12.0) {
        state.studio.clear_key();
    }

    let cancel = Rectangle::new(modal.x + 24.0, modal.y + 200.0, (w - 60.0) * 0.5, 40.0);
    let save = Rectangle::new(modal.x + 36.0 + (w - 60.0) * 0.5, modal.y + 200.0, (w - 60.0) * 0.5, 40.0);
    if draw_button(d, cancel, "Cancel", true, 14.0) {
        state.studio.cancel_key_entry();
        state.focus = Focus::Prompt;
    }
    let pressed_enter = d.is_key_pressed(KeyboardKey::KEY_ENTER);
    if draw_button(d, save, "Save key", can_save, 14.0) || (pressed_enter && can_save) {
        let submission = state.studio.save_key();
        state.focus = Focus::Prompt;
        state.launch(submission);
    }

    d.draw_text(
        "The key is stored only on this machine. On a shared computer, clear it when done.",
        modal.x as i32 + 24,
        modal.y as i32 + 262,
        11,
        Color::DARKGRAY,
    );
}

fn main() {
    tracing_subscriber::fmt::init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("[ERROR] Failed to create async runtime: {}", err);
            std::process::exit(1);
        }
    };
    let cfg = match rt.block_on(Config::load(DEFAULT_CONFIG_PATH)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("[ERROR] {:#}", err);
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(init::ensure_directories(&cfg)) {
        eprintln!("[ERROR] Failed to create directories: {:#}", e);
    }
    drop(rt);

    let (api, session) = match (GeminiClient::new(&cfg), MediaSession::new()) {
        (Ok(api), Ok(session)) => (api, session),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("[ERROR] {:#}", err);
            std::process::exit(1);
        }
    };

    let log_buffer = Arc::new(Mutex::new(Vec::with_capacity(LOG_MAX_LINES)));
    let hook_buffer = Arc::clone(&log_buffer);
    set_log_hook(Some(Arc::new(Mutex::new(move |line: &str| {
        push_log_line(&hook_buffer, line);
    }))));

    let store = StoredCredential::new(LocalStorage::open(&cfg.storage_path)).with_dev_fallback();
    let (tx, rx) = channel::unbounded();
    let mut state = AppState {
        studio: Studio::new(store, cfg.settings(), session),
        api: Arc::new(api),
        focus: Focus::Prompt,
        log_buffer,
        tx,
        rx,
    };

    let (mut rl, thread) = raylib::init()
        .size(980, 640)
        .resizable()
        .title("Video Ideas")
        .build();
    rl.set_target_fps(60);

    while !rl.window_should_close() {
        state.drain_worker();
        state.handle_typing(&mut rl);

        let screen = Rectangle::new(
            0.0,
            0.0,
            rl.get_screen_width() as f32,
            rl.get_screen_height() as f32,
        );
        let mut d = rl.begin_drawing(&thread);
        d.clear_background(COLOR_BG);
        d.draw_text("VIDEO IDEAS", 30, 20, 20, Color::RAYWHITE);

        let modal_open = state.studio.editor().is_open();

        let prompt_rect = Rectangle::new(30.0, 80.0, 440.0, 44.0);
        let voice_rect = Rectangle::new(490.0, 80.0, 460.0, 44.0);
        let prompt_text = state.studio.prompt.clone();
        let voice_text = state.studio.voiceover.clone();
        if draw_field(&mut d, prompt_rect, "VIDEO IDEA", &prompt_text, "A cozy office setting with soft sunlight...", state.focus == Focus::Prompt && !modal_open) && !modal_open {
            state.focus = Focus::Prompt;
        }
        if draw_field(&mut d, voice_rect, "VOICEOVER PLAN", &voice_text, "What should the voice say?", state.focus == Focus::Voiceover && !modal_open) && !modal_open {
            state.focus = Focus::Voiceover;
        }

        let busy = state.studio.is_generating();
        let label = if busy {
            state.studio.status().to_string()
        } else {
            "Let's see it!".to_string()
        };
        let can_start = state.studio.can_submit() && !modal_open;
        if draw_button(&mut d, Rectangle::new(750.0, 140.0, 200.0, 40.0), &label, can_start, 14.0) {
            let submission = state.studio.submit();
            state.launch(submission);
        }
        if busy {
            if draw_button(&mut d, Rectangle::new(630.0, 140.0, 110.0, 40.0), "Stop", !modal_open, 14.0) {
                state.studio.cancel();
            }
        } else if draw_button(&mut d, Rectangle::new(590.0, 140.0, 150.0, 40.0), "Change key", !modal_open, 14.0) {
            state.studio.open_key_editor();
            state.focus = Focus::Key;
        }

        if let Some(err) = state.studio.system_error() {
            d.draw_text(err, 30, 150, 14, COLOR_ERROR);
        } else if let Some(notice) = state.studio.notice() {
            d.draw_text(notice, 30, 150, 14, Color::GRAY);
        }

        d.draw_text("OUR CREATIONS", 30, 200, 14, COLOR_BTN);
        let mut y = 225.0;
        let mut open_target = None;
        for video in state.studio.videos().iter().take(8) {
            let row = Rectangle::new(30.0, y, 440.0, 40.0);
            d.draw_rectangle_rounded(row, 0.2, 8, COLOR_PANEL);
            let caption = format!("\"{}\"", video.prompt);
            let caption = fit_tail(&d, &caption, 300.0, 12);
            d.draw_text(&caption, 40, y as i32 + 8, 12, Color::LIGHTGRAY);
            let stamp = video.timestamp.format("%H:%M:%S").to_string();
            let stamp = if video.has_audio() { format!("{} + voiceover", stamp) } else { stamp };
            d.draw_text(&stamp, 40, y as i32 + 24, 10, Color::GRAY);
            if draw_button(&mut d, Rectangle::new(390.0, y + 6.0, 70.0, 28.0), "Open", !modal_open, 12.0) {
                open_target = Some(video.url.clone());
            }
            y += 48.0;
        }
        if let Some(path) = open_target {
            platform::open_path(path);
        }

        d.draw_text("LOG", 490, 200, 14, COLOR_BTN);
        let lines = snapshot_logs(&state.log_buffer);
        draw_log_panel(
            &mut d,
            Rectangle::new(490.0, 225.0, 460.0, screen.height - 255.0),
            &lines,
        );

        if modal_open || state.studio.show_key_prompt() {
            draw_key_modal(&mut d, &mut state, screen);
        }
    }
}
