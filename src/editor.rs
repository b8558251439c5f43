use crate::credential::CredentialStore;

pub const DEFAULT_TITLE: &str = "API key required";
pub const DEFAULT_DESCRIPTION: &str = "This build can't keep a secret API key for you. Paste your Gemini API key to use it on this machine.";

/// Modal form for entering the API key. The field is masked until revealed.
#[derive(Debug, Clone, Default)]
pub struct CredentialEditor {
    open: bool,
    value: String,
    show: bool,
}

impl CredentialEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self, store: &dyn CredentialStore) {
        self.value = store.get();
        self.show = false;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
    }

    pub fn push_char(&mut self, ch: char) {
        self.value.push(ch);
    }

    /// Appends clipboard text. Keys never contain whitespace, so line breaks and
    /// stray spaces from the copy are dropped.
    pub fn paste(&mut self, text: &str) {
        self.value.extend(text.chars().filter(|c| !c.is_whitespace()));
    }

    pub fn pop_char(&mut self) {
        self.value.pop();
    }

    pub fn is_revealed(&self) -> bool {
        self.show
    }

    pub fn toggle_reveal(&mut self) {
        self.show = !self.show;
    }

    pub fn reveal_label(&self) -> &'static str {
        if self.show { "Hide key" } else { "Show key" }
    }

    pub fn placeholder(&self) -> &'static str {
        if self.show { "Paste your key here" } else { "AIza…" }
    }

    /// What the input box shows: the raw value when revealed, `mask` per char otherwise.
    pub fn display_value(&self, mask: char) -> String {
        if self.show {
            self.value.clone()
        } else {
            std::iter::repeat(mask).take(self.value.chars().count()).collect()
        }
    }

    pub fn can_save(&self) -> bool {
        !self.value.trim().is_empty()
    }

    pub fn clear(&mut self, store: &mut dyn CredentialStore) {
        store.clear();
        self.value.clear();
    }

    /// Persists the trimmed value, runs `on_saved` and closes. A blank field is a no-op.
    pub fn save<F: FnOnce()>(&mut self, store: &mut dyn CredentialStore, on_saved: F) -> bool {
        let trimmed = self.value.trim();
        if trimmed.is_empty() {
            return false;
        }
        store.set(trimmed);
        on_saved();
        self.close();
        true
    }

    pub fn cancel(&mut self) {
        self.close();
    }
}
