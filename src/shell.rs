//! Host shell boundary
//!
//! The application hosting the trace tools shows messages to the user and opens
//! exported diagrams. `ConsoleShell` serves the CLI; `RecordingShell` keeps
//! everything in memory for embedding and tests.

use std::sync::Mutex;

/// Size of the window an exported diagram opens in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 700,
        }
    }
}

impl ViewerOptions {
    /// Window feature string for a new browser window
    pub fn window_features(&self) -> String {
        format!(
            "toolbar=1, scrollbars=1, resizable=1, width={}, height={}",
            self.width, self.height
        )
    }
}

/// User-facing side of the host application
pub trait HostShell: Send + Sync {
    /// Show a blocking message to the user
    fn alert(&self, message: &str);

    /// Open `href` in a new viewing context
    fn open_link(&self, href: &str, viewer: &ViewerOptions);
}

/// Writes alerts to stderr and links to stdout
#[derive(Debug, Default)]
pub struct ConsoleShell;

impl HostShell for ConsoleShell {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn open_link(&self, href: &str, viewer: &ViewerOptions) {
        tracing::debug!("Opening {} ({})", href, viewer.window_features());
        println!("Diagram: {}", href);
    }
}

/// Keeps alerts and opened links in memory
#[derive(Debug, Default)]
pub struct RecordingShell {
    alerts: Mutex<Vec<String>>,
    links: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.links.lock().unwrap().clone()
    }
}

impl HostShell for RecordingShell {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn open_link(&self, href: &str, _viewer: &ViewerOptions) {
        self.links.lock().unwrap().push(href.to_string());
    }
}
