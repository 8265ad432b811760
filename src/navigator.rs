/*!
 * Interactive directory navigation
 *
 * The navigator is a small state machine: `Browsing` until the user confirms
 * a directory (`Confirmed`) or gives up (`Cancelled`). `transition` is a pure
 * function of the current state, one input event and a `ListingSource`, which
 * keeps terminal rendering and file system access out of the state logic.
 */

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Non-fatal navigation failure; the browser stays where it was
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// Directory could not be listed
    #[error("Cannot open {}: {reason}", .path.display())]
    Unreadable {
        /// Directory that was requested
        path: PathBuf,
        /// Short description of the failure
        reason: String,
    },

    /// Tried to descend into something that is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Neither the start path nor any of its ancestors could be listed
    #[error("No readable directory found at or above {}", .0.display())]
    NoReadableDirectory(PathBuf),
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name
    pub name: String,
    /// Entry is (or links to) a directory
    pub is_dir: bool,
    /// Absolute path of the entry
    pub full_path: PathBuf,
}

impl DirEntry {
    /// Name starts with a dot
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Sorted, immutable listing of one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    path: PathBuf,
    entries: Vec<DirEntry>,
}

impl DirectoryListing {
    /// Build a listing, ordering directories first and then by name
    pub fn new(path: PathBuf, mut entries: Vec<DirEntry>) -> Self {
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Self { path, entries }
    }

    /// Directory this listing describes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in display order
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for an empty directory (or one with only hidden entries filtered out)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at an index
    pub fn get(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

/// Where listings come from
pub trait ListingSource {
    /// List `path`, leaving out hidden entries unless `show_hidden` is set
    fn list(&self, path: &Path, show_hidden: bool) -> Result<DirectoryListing, NavigationError>;
}

/// Lists the real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsListingSource;

impl ListingSource for FsListingSource {
    fn list(&self, path: &Path, show_hidden: bool) -> Result<DirectoryListing, NavigationError> {
        let unreadable = |err: std::io::Error| NavigationError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        };

        let metadata = fs::metadata(path).map_err(unreadable)?;
        if !metadata.is_dir() {
            return Err(NavigationError::NotADirectory(path.to_path_buf()));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(unreadable)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry in {}: {}", path.display(), err);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let full_path = entry.path();
            entries.push(DirEntry {
                name,
                // follows symlinks so linked directories can be browsed
                is_dir: full_path.is_dir(),
                full_path,
            });
        }

        Ok(DirectoryListing::new(path.to_path_buf(), entries))
    }
}

/// Input events understood by the navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    /// Move the cursor up
    Up,
    /// Move the cursor down
    Down,
    /// Descend into the selected directory
    Enter,
    /// Go to the parent directory
    Parent,
    /// Choose the current directory for scanning
    Confirm,
    /// Leave without choosing
    Cancel,
    /// Flip hidden entry visibility
    ToggleHidden,
    /// Re-read the current directory
    Refresh,
}

/// Navigator mode, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Waiting for input
    Browsing,
    /// A directory was chosen
    Confirmed,
    /// The user gave up
    Cancelled,
}

/// State while browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Browser {
    listing: DirectoryListing,
    selected: usize,
    show_hidden: bool,
}

impl Browser {
    fn new(listing: DirectoryListing, show_hidden: bool) -> Self {
        Self {
            listing,
            selected: 0,
            show_hidden,
        }
    }

    /// Current directory
    pub fn current_path(&self) -> &Path {
        self.listing.path()
    }

    /// Listing of the current directory
    pub fn listing(&self) -> &DirectoryListing {
        &self.listing
    }

    /// Cursor position; always 0 for an empty listing
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Entry under the cursor
    pub fn selected_entry(&self) -> Option<&DirEntry> {
        self.listing.get(self.selected)
    }

    /// Whether hidden entries are listed
    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Swap in a new listing, keeping the cursor on the same name if possible
    fn relisted(mut self, listing: DirectoryListing) -> Self {
        let previous = self.selected_entry().map(|e| e.name.clone());
        let last = listing.len().saturating_sub(1);
        self.selected = previous
            .and_then(|name| listing.position(&name))
            .unwrap_or_else(|| self.selected.min(last));
        self.listing = listing;
        self
    }
}

/// Navigator state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigatorState {
    /// Waiting for input in a directory
    Browsing(Browser),
    /// Directory chosen for scanning
    Confirmed(PathBuf),
    /// Navigation abandoned
    Cancelled,
}

impl NavigatorState {
    /// Start browsing at `path`, falling back to the nearest readable ancestor
    pub fn start(
        path: &Path,
        show_hidden: bool,
        source: &dyn ListingSource,
    ) -> Result<Self, NavigationError> {
        let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let mut candidate = Some(absolute.as_path());
        while let Some(dir) = candidate {
            match source.list(dir, show_hidden) {
                Ok(listing) => {
                    return Ok(NavigatorState::Browsing(Browser::new(listing, show_hidden)))
                }
                Err(err) => debug!("Start directory fallback: {}", err),
            }
            candidate = dir.parent();
        }

        Err(NavigationError::NoReadableDirectory(absolute))
    }

    /// Confirm `path` directly, without browsing. The path must be listable.
    pub fn confirm_path(path: &Path, source: &dyn ListingSource) -> Result<Self, NavigationError> {
        let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let listing = source.list(&absolute, true)?;
        Ok(NavigatorState::Confirmed(listing.path().to_path_buf()))
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        match self {
            NavigatorState::Browsing(_) => Mode::Browsing,
            NavigatorState::Confirmed(_) => Mode::Confirmed,
            NavigatorState::Cancelled => Mode::Cancelled,
        }
    }

    /// Browser state while browsing
    pub fn browser(&self) -> Option<&Browser> {
        match self {
            NavigatorState::Browsing(browser) => Some(browser),
            _ => None,
        }
    }

    /// Root chosen for scanning, once confirmed
    pub fn confirmed_root(&self) -> Option<&Path> {
        match self {
            NavigatorState::Confirmed(root) => Some(root),
            _ => None,
        }
    }
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub state: NavigatorState,
    /// Non-fatal error to show the user
    pub error: Option<NavigationError>,
}

impl Transition {
    fn ok(state: NavigatorState) -> Self {
        Self { state, error: None }
    }

    fn stay(browser: Browser, error: NavigationError) -> Self {
        Self {
            state: NavigatorState::Browsing(browser),
            error: Some(error),
        }
    }
}

/// Apply one input event to the navigator state
pub fn transition(
    state: NavigatorState,
    event: NavEvent,
    source: &dyn ListingSource,
) -> Transition {
    // Confirmed and Cancelled are terminal
    let mut browser = match state {
        NavigatorState::Browsing(browser) => browser,
        terminal => return Transition::ok(terminal),
    };

    match event {
        NavEvent::Up => {
            browser.selected = browser.selected.saturating_sub(1);
            Transition::ok(NavigatorState::Browsing(browser))
        }
        NavEvent::Down => {
            let last = browser.listing.len().saturating_sub(1);
            browser.selected = (browser.selected + 1).min(last);
            Transition::ok(NavigatorState::Browsing(browser))
        }
        NavEvent::Enter => {
            let Some(entry) = browser.selected_entry().cloned() else {
                return Transition::ok(NavigatorState::Browsing(browser));
            };
            if !entry.is_dir {
                return Transition::stay(browser, NavigationError::NotADirectory(entry.full_path));
            }
            match source.list(&entry.full_path, browser.show_hidden) {
                Ok(listing) => Transition::ok(NavigatorState::Browsing(Browser::new(
                    listing,
                    browser.show_hidden,
                ))),
                Err(err) => Transition::stay(browser, err),
            }
        }
        NavEvent::Parent => {
            let Some(parent) = browser.current_path().parent().map(Path::to_path_buf) else {
                return Transition::ok(NavigatorState::Browsing(browser));
            };
            match source.list(&parent, browser.show_hidden) {
                Ok(listing) => Transition::ok(NavigatorState::Browsing(Browser::new(
                    listing,
                    browser.show_hidden,
                ))),
                Err(err) => Transition::stay(browser, err),
            }
        }
        NavEvent::Confirm => match source.list(browser.current_path(), browser.show_hidden) {
            Ok(_) => Transition::ok(NavigatorState::Confirmed(
                browser.current_path().to_path_buf(),
            )),
            Err(err) => Transition::stay(browser, err),
        },
        NavEvent::Cancel => Transition::ok(NavigatorState::Cancelled),
        NavEvent::ToggleHidden => {
            let show_hidden = !browser.show_hidden;
            match source.list(browser.current_path(), show_hidden) {
                Ok(listing) => {
                    browser.show_hidden = show_hidden;
                    Transition::ok(NavigatorState::Browsing(browser.relisted(listing)))
                }
                Err(err) => Transition::stay(browser, err),
            }
        }
        NavEvent::Refresh => match source.list(browser.current_path(), browser.show_hidden) {
            Ok(listing) => Transition::ok(NavigatorState::Browsing(browser.relisted(listing))),
            Err(err) => Transition::stay(browser, err),
        },
    }
}
