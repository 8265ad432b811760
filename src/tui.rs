/*!
 * Terminal front end
 *
 * A ratatui implementation of `Frontend`: the browsing screen with its file
 * preview, the output form, the overwrite prompt and the scan gauge. Key
 * handling is kept in plain functions over `KeyEvent` so it can be tested
 * without a terminal.
 */

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Gauge, List, ListItem, ListState, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use crate::classifier::Classifier;
use crate::error::Result;
use crate::export::{Compression, ReportFormat};
use crate::navigator::{Browser, NavEvent, NavigationError};
use crate::orchestrator::{Frontend, OutputChoice, DEFAULT_REPORT_NAME};
use crate::progress::{CancelFlag, ProgressSink, ProgressState};

/// Minimum time between two gauge redraws
const REDRAW_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes of a file read for the preview popup
const PREVIEW_BYTES: usize = 16 * 1024;

const BROWSE_HELP: &str = "↑↓/jk move  Enter/l open  Backspace/h up  p preview  s/c scan here  \
                           t hidden  r refresh  q quit";

/// Map a key press to a navigator event
pub fn key_to_event(key: KeyEvent) -> Option<NavEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(NavEvent::Cancel);
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(NavEvent::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(NavEvent::Down),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(NavEvent::Enter),
        KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => Some(NavEvent::Parent),
        KeyCode::Char('s') | KeyCode::Char('c') => Some(NavEvent::Confirm),
        KeyCode::Char('t') => Some(NavEvent::ToggleHidden),
        KeyCode::Char('r') => Some(NavEvent::Refresh),
        KeyCode::Char('q') | KeyCode::Esc => Some(NavEvent::Cancel),
        _ => None,
    }
}

/// Whether a key press during a scan asks to stop it
pub fn is_cancel_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
}

/// Field of the output form with focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    /// Report file name
    FileName,
    /// Report format selector
    Format,
    /// Compression selector
    Compression,
    /// Destination directory
    Directory,
}

/// What the form wants after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    /// Keep editing
    Continue,
    /// The user accepted the form
    Submit(OutputChoice),
    /// The user backed out
    Cancel,
}

/// Editable state of the output form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputForm {
    /// Report file name
    pub file_name: String,
    /// Selected format
    pub format: ReportFormat,
    /// Selected compression
    pub compression: Compression,
    /// Destination directory as typed
    pub directory: String,
    /// Focused field
    pub focus: FormField,
}

impl OutputForm {
    /// Form with the default name and the given selections
    pub fn new(format: ReportFormat, compression: Compression, directory: &Path) -> Self {
        Self {
            file_name: DEFAULT_REPORT_NAME.to_string(),
            format,
            compression,
            directory: directory.display().to_string(),
            focus: FormField::FileName,
        }
    }

    /// Apply one key press
    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return FormAction::Cancel;
        }

        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit(self.choice()),
            KeyCode::Tab | KeyCode::Down => self.focus = self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.previous_field(),
            _ => match self.focus {
                FormField::Format => self.cycle_format(key.code),
                FormField::Compression => self.cycle_compression(key.code),
                FormField::FileName => edit(&mut self.file_name, key.code),
                FormField::Directory => edit(&mut self.directory, key.code),
            },
        }

        FormAction::Continue
    }

    /// Current answers as an output choice
    pub fn choice(&self) -> OutputChoice {
        OutputChoice {
            format: self.format.to_string(),
            directory: PathBuf::from(self.directory.trim()),
            file_name: self.file_name.trim().to_string(),
            compression: self.compression,
        }
    }

    fn cycle_format(&mut self, code: KeyCode) {
        match code {
            KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => {
                self.format = self.format.next()
            }
            KeyCode::Left | KeyCode::Char('h') => {
                // previous = four steps forward in a five-entry cycle
                for _ in 1..ReportFormat::ALL.len() {
                    self.format = self.format.next();
                }
            }
            _ => {}
        }
    }

    fn cycle_compression(&mut self, code: KeyCode) {
        let steps = match code {
            KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => 1,
            KeyCode::Left | KeyCode::Char('h') => Compression::ALL.len() - 1,
            _ => 0,
        };
        for _ in 0..steps {
            self.compression = self.compression.next();
        }
    }

    fn next_field(&self) -> FormField {
        match self.focus {
            FormField::FileName => FormField::Format,
            FormField::Format => FormField::Compression,
            FormField::Compression => FormField::Directory,
            FormField::Directory => FormField::FileName,
        }
    }

    fn previous_field(&self) -> FormField {
        match self.focus {
            FormField::FileName => FormField::Directory,
            FormField::Format => FormField::FileName,
            FormField::Compression => FormField::Format,
            FormField::Directory => FormField::Compression,
        }
    }
}

/// Lines shown in the preview popup for `path`, at most `max_lines` of
/// content plus a trailing marker when there is more
pub fn preview_lines(path: &Path, max_lines: usize) -> Vec<String> {
    let result = Classifier::new(PREVIEW_BYTES).classify(path);
    if let Some(err) = result.error {
        return vec![format!("[cannot preview: {}]", err)];
    }
    let content = match result.content {
        Some(content) => content,
        None => return vec!["[binary file, no preview available]".to_string()],
    };
    if content.is_empty() {
        return vec!["[empty file]".to_string()];
    }

    let mut lines: Vec<String> = content
        .lines()
        .take(max_lines)
        .map(|line| line.replace('\t', "    "))
        .collect();
    if result.truncated || content.lines().nth(max_lines).is_some() {
        lines.push("...".to_string());
    }
    lines
}

fn edit(text: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) => text.push(c),
        KeyCode::Backspace => {
            text.pop();
        }
        _ => {}
    }
}

/// Ratatui front end
pub struct TerminalUi {
    terminal: DefaultTerminal,
    cancel: CancelFlag,
    status: Option<String>,
    progress: ProgressState,
    last_draw: Option<Instant>,
}

impl TerminalUi {
    /// Switch the terminal to the alternate screen; restored on drop
    pub fn new(cancel: CancelFlag) -> Result<Self> {
        let terminal = ratatui::try_init()?;
        Ok(Self {
            terminal,
            cancel,
            status: None,
            progress: ProgressState::default(),
            last_draw: None,
        })
    }

    /// Show the selected file until a key is pressed
    fn show_preview(&mut self, path: &Path) -> Result<()> {
        let height = usize::from(self.terminal.size()?.height);
        let lines = preview_lines(path, height.saturating_sub(4).max(1));
        self.terminal.draw(|frame| draw_preview(frame, path, &lines))?;
        self.read_key()?;
        Ok(())
    }

    /// Block until the next key press
    fn read_key(&mut self) -> Result<KeyEvent> {
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(key);
                }
            }
        }
    }

    /// Drain pending input without blocking, raising the cancel flag on q/Esc
    fn poll_cancel(&mut self) {
        while event::poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press && is_cancel_key(key) => {
                    self.cancel.cancel()
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}

impl Drop for TerminalUi {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

impl ProgressSink for TerminalUi {
    fn report(&mut self, current: usize, total: usize) {
        self.progress = ProgressState { current, total };
        self.poll_cancel();

        let due = self
            .last_draw
            .map_or(true, |at| at.elapsed() >= REDRAW_INTERVAL);
        if !due && current < total {
            return;
        }
        self.last_draw = Some(Instant::now());

        let progress = self.progress;
        let cancelling = self.cancel.is_cancelled();
        // a failed redraw must not stop the scan
        let _ = self
            .terminal
            .draw(|frame| draw_scan(frame, progress, cancelling));
    }
}

impl Frontend for TerminalUi {
    fn next_event(&mut self, browser: &Browser) -> Result<NavEvent> {
        loop {
            let status = self.status.as_deref();
            self.terminal.draw(|frame| draw_browser(frame, browser, status))?;

            let key = self.read_key()?;
            if key.code == KeyCode::Char('p') {
                if let Some(entry) = browser.selected_entry().filter(|e| !e.is_dir) {
                    self.show_preview(&entry.full_path)?;
                }
                continue;
            }
            if let Some(event) = key_to_event(key) {
                self.status = None;
                return Ok(event);
            }
        }
    }

    fn choose_output(
        &mut self,
        root: &Path,
        default_format: ReportFormat,
        default_compression: Compression,
    ) -> Result<Option<OutputChoice>> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut form = OutputForm::new(default_format, default_compression, &cwd);

        loop {
            self.terminal.draw(|frame| draw_form(frame, root, &form))?;
            match form.handle_key(self.read_key()?) {
                FormAction::Continue => {}
                FormAction::Submit(choice) => return Ok(Some(choice)),
                FormAction::Cancel => return Ok(None),
            }
        }
    }

    fn confirm_overwrite(&mut self, destination: &Path) -> Result<bool> {
        loop {
            self.terminal.draw(|frame| draw_prompt(frame, destination))?;
            match self.read_key()?.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Enter => {
                    return Ok(false)
                }
                _ => {}
            }
        }
    }

    fn navigation_error(&mut self, error: &NavigationError) {
        self.status = Some(error.to_string());
    }
}

fn draw_browser(frame: &mut Frame, browser: &Browser, status: Option<&str>) {
    let [header, body, status_area, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let title = if browser.show_hidden() {
        " dirscan (showing hidden) "
    } else {
        " dirscan "
    };
    frame.render_widget(
        Paragraph::new(browser.current_path().display().to_string())
            .block(Block::bordered().title(title)),
        header,
    );

    let items: Vec<ListItem> = browser
        .listing()
        .entries()
        .iter()
        .map(|entry| {
            if entry.is_dir {
                ListItem::new(Line::from(Span::styled(
                    format!("📁 {}/", entry.name),
                    Style::default().fg(Color::Cyan),
                )))
            } else {
                ListItem::new(format!("   {}", entry.name))
            }
        })
        .collect();

    if items.is_empty() {
        frame.render_widget(
            Paragraph::new("(empty directory)").block(Block::bordered()),
            body,
        );
    } else {
        let list = List::new(items)
            .block(Block::bordered())
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(browser.selected_index()));
        frame.render_stateful_widget(list, body, &mut state);
    }

    if let Some(status) = status {
        frame.render_widget(
            Paragraph::new(status).style(Style::default().fg(Color::Red)),
            status_area,
        );
    }
    frame.render_widget(
        Paragraph::new(BROWSE_HELP).style(Style::default().fg(Color::DarkGray)),
        help,
    );
}

fn draw_form(frame: &mut Frame, root: &Path, form: &OutputForm) {
    let area = centered(frame.area(), 70, 12);
    frame.render_widget(Clear, area);

    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::raw(format!("{:<12}", label)),
            Span::styled(value, style),
        ])
    };

    let lines = vec![
        Line::from(format!("Scanning {}", root.display())),
        Line::from(""),
        field(
            "File name",
            format!("{}_", form.file_name),
            form.focus == FormField::FileName,
        ),
        field(
            "Format",
            format!("< {} >", form.format),
            form.focus == FormField::Format,
        ),
        field(
            "Compression",
            format!("< {} >", form.compression),
            form.focus == FormField::Compression,
        ),
        field(
            "Directory",
            format!("{}_", form.directory),
            form.focus == FormField::Directory,
        ),
        Line::from(""),
        Line::from(Span::styled(
            "Tab/↑↓ field  ←→ format  Enter start  Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(
        Paragraph::new(lines).block(Block::bordered().title(" Output ")),
        area,
    );
}

fn draw_preview(frame: &mut Frame, path: &Path, lines: &[String]) {
    let outer = frame.area();
    let area = centered(
        outer,
        outer.width.saturating_sub(4),
        outer.height.saturating_sub(2),
    );
    frame.render_widget(Clear, area);

    let name = path.file_name().unwrap_or_default().to_string_lossy();
    let text: Vec<Line> = lines.iter().map(|l| Line::from(l.as_str())).collect();
    frame.render_widget(
        Paragraph::new(text).block(
            Block::bordered()
                .title(format!(" Preview: {} ", name))
                .title_bottom(" any key to return "),
        ),
        area,
    );
}

fn draw_prompt(frame: &mut Frame, destination: &Path) {
    let area = centered(frame.area(), 70, 5);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(format!("{} already exists.", destination.display())),
            Line::from("Overwrite it? [y/N]"),
        ])
        .block(Block::bordered().title(" Confirm ")),
        area,
    );
}

fn draw_scan(frame: &mut Frame, progress: ProgressState, cancelling: bool) {
    let area = centered(frame.area(), 70, 3);
    frame.render_widget(Clear, area);

    let title = if cancelling {
        " Cancelling... "
    } else {
        " Scanning (q to cancel) "
    };
    let gauge = Gauge::default()
        .block(Block::bordered().title(title))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(progress.ratio())
        .label(format!(
            "{}/{} files ({}%)",
            progress.current,
            progress.total,
            progress.percentage()
        ));
    frame.render_widget(gauge, area);
}

/// Rectangle of at most `width` x `height` centred in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(key_to_event(key(KeyCode::Char('j'))), Some(NavEvent::Down));
        assert_eq!(key_to_event(key(KeyCode::Up)), Some(NavEvent::Up));
        assert_eq!(key_to_event(key(KeyCode::Enter)), Some(NavEvent::Enter));
        assert_eq!(key_to_event(key(KeyCode::Backspace)), Some(NavEvent::Parent));
        assert_eq!(key_to_event(key(KeyCode::Char('s'))), Some(NavEvent::Confirm));
        assert_eq!(key_to_event(key(KeyCode::Esc)), Some(NavEvent::Cancel));
        assert_eq!(key_to_event(key(KeyCode::Char('x'))), None);
        assert_eq!(
            key_to_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(NavEvent::Cancel)
        );
    }

    #[test]
    fn test_form_editing_and_submit() {
        let mut form = OutputForm::new(ReportFormat::Txt, Compression::None, Path::new("/tmp"));
        for _ in 0.."scan_results".len() {
            form.handle_key(key(KeyCode::Backspace));
        }
        for c in "out".chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
        form.handle_key(key(KeyCode::Tab));
        assert_eq!(form.focus, FormField::Format);
        form.handle_key(key(KeyCode::Right));
        form.handle_key(key(KeyCode::Right));
        assert_eq!(form.format, ReportFormat::Csv);
        form.handle_key(key(KeyCode::Left));
        assert_eq!(form.format, ReportFormat::Json);

        form.handle_key(key(KeyCode::Tab));
        assert_eq!(form.focus, FormField::Compression);
        form.handle_key(key(KeyCode::Left));
        assert_eq!(form.compression, Compression::Xz);
        form.handle_key(key(KeyCode::Right));
        form.handle_key(key(KeyCode::Right));
        assert_eq!(form.compression, Compression::Gzip);

        match form.handle_key(key(KeyCode::Enter)) {
            FormAction::Submit(choice) => {
                assert_eq!(choice.file_name, "out");
                assert_eq!(choice.format, "json");
                assert_eq!(choice.compression, Compression::Gzip);
                assert_eq!(choice.directory, PathBuf::from("/tmp"));
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn test_form_escape_cancels() {
        let mut form = OutputForm::new(ReportFormat::Pdf, Compression::None, Path::new("."));
        assert_eq!(form.handle_key(key(KeyCode::Esc)), FormAction::Cancel);
    }

    #[test]
    fn test_preview_of_text_file() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "one\n\ttwo\nthree\nfour\n")?;

        assert_eq!(preview_lines(&path, 10), vec!["one", "    two", "three", "four"]);
        assert_eq!(preview_lines(&path, 2), vec!["one", "    two", "..."]);
        Ok(())
    }

    #[test]
    fn test_preview_of_binary_and_missing_files() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 3])?;

        assert_eq!(
            preview_lines(&path, 10),
            vec!["[binary file, no preview available]"]
        );
        assert_eq!(
            preview_lines(&dir.path().join("gone.txt"), 10),
            vec!["[cannot preview: file not found]"]
        );
        Ok(())
    }

    #[test]
    fn test_centered_fits_small_areas() {
        let area = Rect::new(0, 0, 40, 2);
        let rect = centered(area, 70, 5);
        assert_eq!(rect, Rect::new(0, 0, 40, 2));
    }
}
