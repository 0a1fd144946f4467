use std::time::Duration;

use crate::layout::Viewport;
use crate::permalink::{self, Permalink};
use crate::store::Store;

/// Why observations are being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// First load of a session; resets interaction state.
    Initial,
    /// Periodic refresh; keeps interaction state.
    Incremental,
    /// Builder's "preload types"; only fills in type colors.
    TypePreview,
}

/// A fetch handed to the host. The host echoes it back unchanged in
/// [`crate::actions::Action::FetchCompleted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub purpose: FetchPurpose,
    pub generation: u64,
}

/// Host capabilities the dashboard needs.
pub trait Environment {
    /// Root the dashboard route hangs off, e.g. `https://host/app`.
    fn base_url(&self) -> String;
    fn viewport(&self) -> Viewport;
    /// Start an HTTP GET; the body comes back as an action.
    fn fetch(&mut self, request: FetchRequest);
    /// (Re)start the periodic refresh timer, replacing any running one.
    fn start_timer(&mut self, interval: Duration);
    fn stop_timer(&mut self);
    fn write_clipboard(&mut self, text: &str);
    fn save_file(&mut self, file_name: &str, contents: &str);
}

/// Deferred effects that must run outside the main reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch(FetchRequest),
    StartRefreshTimer { interval: Duration },
    StopRefreshTimer,
    /// Copy the link for this configuration to the clipboard.
    CopyPermalink { link: Permalink },
    SaveFile { file_name: String, contents: String },
}

/// Execute a single effect against the host
pub fn run(store: &mut Store, effect: Effect, env: &mut dyn Environment) {
    match effect {
        Effect::Fetch(request) => {
            tracing::debug!(
                url = %request.url,
                purpose = ?request.purpose,
                generation = request.generation,
                "fetching observations"
            );
            env.fetch(request);
        }
        Effect::StartRefreshTimer { interval } => env.start_timer(interval),
        Effect::StopRefreshTimer => env.stop_timer(),
        Effect::CopyPermalink { link } => {
            match permalink::href(&env.base_url(), &link) {
                Ok(href) => {
                    tracing::info!(len = href.len(), "permalink copied");
                    env.write_clipboard(&href);
                }
                Err(e) => {
                    store.error_message =
                        Some(format!("Failed to build permalink: {e}"));
                }
            }
        }
        Effect::SaveFile {
            file_name,
            contents,
        } => env.save_file(&file_name, &contents),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every host call; fetches are answered by the test.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingEnvironment {
        pub fetches: Vec<FetchRequest>,
        pub timer: Option<Duration>,
        pub timer_starts: usize,
        pub timer_stops: usize,
        pub clipboard: Option<String>,
        pub saved: Vec<(String, String)>,
    }

    impl Environment for RecordingEnvironment {
        fn base_url(&self) -> String {
            "https://host.example/geo".to_string()
        }
        fn viewport(&self) -> Viewport {
            Viewport {
                width: 1280.0,
                height: 720.0,
                root_font_size: 16.0,
            }
        }
        fn fetch(&mut self, request: FetchRequest) {
            self.fetches.push(request);
        }
        fn start_timer(&mut self, interval: Duration) {
            self.timer = Some(interval);
            self.timer_starts += 1;
        }
        fn stop_timer(&mut self) {
            self.timer = None;
            self.timer_stops += 1;
        }
        fn write_clipboard(&mut self, text: &str) {
            self.clipboard = Some(text.to_string());
        }
        fn save_file(&mut self, file_name: &str, contents: &str) {
            self.saved.push((file_name.to_string(), contents.to_string()));
        }
    }
}
