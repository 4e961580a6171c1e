//! Backend-agnostic dialogs.
//!
//! A [`Dialog`] is configured for one [`DialogKind`] and rendered on whichever
//! dialog program the host has installed. Each `run()` detects the backend,
//! spawns exactly one process and routes the result back to the caller: menus
//! invoke the chosen option's [`Action`], file selections call the result
//! handler, info and error dialogs just wait for acknowledgement.

mod backend;
mod render;

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::error::LauncherError;
use crate::process::{run_captured, ProcessRunner};

pub use backend::{detect, Backend, ExecutableLocator, WhichLocator};

#[cfg(test)]
pub(crate) use backend::testing::FakeLocator;

const DEFAULT_WIDTH: u32 = 200;
const DEFAULT_HEIGHT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    Info,
    Error,
    Menu,
    FileSelect,
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogKind::Info => "info",
            DialogKind::Error => "error",
            DialogKind::Menu => "menu",
            DialogKind::FileSelect => "file-select",
        };
        f.write_str(name)
    }
}

/// A unit of work bound to a menu option.
pub trait Action {
    fn invoke(&mut self) -> Result<(), LauncherError>;
}

impl<F> Action for F
where
    F: FnMut() -> Result<(), LauncherError>,
{
    fn invoke(&mut self) -> Result<(), LauncherError> {
        self()
    }
}

pub struct MenuOption<'a> {
    label: String,
    action: Box<dyn Action + 'a>,
}

impl<'a> MenuOption<'a> {
    pub fn new(label: impl Into<String>, action: impl Action + 'a) -> Self {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// What a backend reported as the chosen menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    Label(String),
}

/// Menu options by the position they are shown at. Renderers emit entries by
/// walking this map, so positions sent to the backend and positions resolved
/// here cannot drift apart.
pub struct OptionIndexMap<'a> {
    entries: Vec<MenuOption<'a>>,
}

impl<'a> OptionIndexMap<'a> {
    pub fn new(entries: Vec<MenuOption<'a>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(position, option)| (position, option.label()))
    }

    pub fn resolve(&self, selection: &Selection) -> Option<usize> {
        match selection {
            Selection::Index(position) if *position < self.entries.len() => Some(*position),
            Selection::Index(_) => None,
            Selection::Label(label) => self
                .entries
                .iter()
                .position(|option| option.label == *label),
        }
    }

    pub fn label(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(MenuOption::label)
    }

    pub fn action_mut(&mut self, position: usize) -> Option<&mut (dyn Action + 'a)> {
        self.entries
            .get_mut(position)
            .map(|option| option.action.as_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub title: String,
    pub header: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            title: String::new(),
            header: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

type ResultHandler<'a> = Box<dyn FnMut(&str) -> Result<(), LauncherError> + 'a>;

/// Builder for one dialog invocation.
pub struct Dialog<'a> {
    kind: DialogKind,
    window: Window,
    messages: Vec<String>,
    options: Vec<MenuOption<'a>>,
    on_result: Option<ResultHandler<'a>>,
}

impl<'a> Dialog<'a> {
    pub fn new(kind: DialogKind) -> Self {
        Self {
            kind,
            window: Window::default(),
            messages: Vec::new(),
            options: Vec::new(),
            on_result: None,
        }
    }

    fn require(&self, allowed: &[DialogKind], method: &'static str) -> Result<(), LauncherError> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(LauncherError::InvalidOperation {
                kind: self.kind,
                method,
            })
        }
    }

    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.window.title = text.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    pub fn header(mut self, text: impl Into<String>) -> Result<Self, LauncherError> {
        self.require(&[DialogKind::Menu], "header")?;
        self.window.header = Some(text.into());
        Ok(self)
    }

    pub fn add_option(
        mut self,
        label: impl Into<String>,
        action: impl Action + 'a,
    ) -> Result<Self, LauncherError> {
        self.require(&[DialogKind::Menu], "add_option")?;
        let option = MenuOption::new(label, action);
        debug!(label = %option.label, "adding option");
        self.options.push(option);
        Ok(self)
    }

    pub fn add_message(mut self, text: impl Into<String>) -> Result<Self, LauncherError> {
        self.require(&[DialogKind::Info, DialogKind::Error], "add_message")?;
        self.messages.push(text.into());
        Ok(self)
    }

    pub fn on_result<F>(mut self, handler: F) -> Result<Self, LauncherError>
    where
        F: FnMut(&str) -> Result<(), LauncherError> + 'a,
    {
        self.require(&[DialogKind::FileSelect], "on_result")?;
        self.on_result = Some(Box::new(handler));
        Ok(self)
    }

    fn validate(&self) -> Result<(), LauncherError> {
        let missing = match self.kind {
            DialogKind::Menu if self.options.is_empty() => Some("at least one option"),
            DialogKind::Info | DialogKind::Error if self.messages.is_empty() => {
                Some("at least one message")
            }
            DialogKind::FileSelect if self.on_result.is_none() => Some("a result handler"),
            _ => None,
        };
        match missing {
            Some(what) => Err(LauncherError::MissingRequiredData {
                kind: self.kind,
                what,
            }),
            None => Ok(()),
        }
    }

    /// Shows the dialog and blocks until the backend program exits.
    ///
    /// A cancelled menu or file selection is not an error: nothing is invoked
    /// and `Ok(())` is returned. Errors from the invoked action or handler are
    /// passed through.
    pub fn run(self, ui: &Ui<'_>) -> Result<(), LauncherError> {
        self.validate()?;
        let backend = ui.detect_backend()?;

        let Dialog {
            kind,
            window,
            messages,
            options,
            on_result,
        } = self;
        let mut index = OptionIndexMap::new(options);
        let content = render::Content {
            window: &window,
            messages: &messages,
            options: &index,
        };
        debug!(kind = %kind, backend = %backend, "rendering dialog");
        let invocation = render::build(kind, backend, &content)?;
        let output = run_captured(ui.runner, &invocation)?;

        match kind {
            DialogKind::Info | DialogKind::Error => {
                debug!(status = output.status_code, "dialog acknowledged");
                Ok(())
            }
            DialogKind::Menu => {
                let Some(selection) = render::parse_selection(backend, &output) else {
                    debug!(status = output.status_code, "menu cancelled");
                    return Ok(());
                };
                let position = index.resolve(&selection).ok_or_else(|| {
                    LauncherError::Process(format!(
                        "{backend} returned an unknown menu selection: {selection:?}"
                    ))
                })?;
                debug!(label = index.label(position).unwrap_or_default(), "running option");
                match index.action_mut(position) {
                    Some(action) => action.invoke(),
                    None => Ok(()),
                }
            }
            DialogKind::FileSelect => {
                if !output.success() {
                    debug!(status = output.status_code, "file selection cancelled");
                    return Ok(());
                }
                let text = output.stdout_text();
                let path = text.trim();
                if path.is_empty() {
                    return Ok(());
                }
                match on_result {
                    Some(mut handler) => handler(path),
                    None => Ok(()),
                }
            }
        }
    }
}

/// The host services a dialog needs: program lookup and process spawning.
#[derive(Clone, Copy)]
pub struct Ui<'r> {
    locator: &'r dyn ExecutableLocator,
    runner: &'r dyn ProcessRunner,
}

impl<'r> Ui<'r> {
    pub fn new(locator: &'r dyn ExecutableLocator, runner: &'r dyn ProcessRunner) -> Self {
        Self { locator, runner }
    }

    pub fn detect_backend(&self) -> Result<Backend, LauncherError> {
        detect(self.locator)
    }

    pub fn show_error(&self, message: &str) -> Result<(), LauncherError> {
        Dialog::new(DialogKind::Error)
            .title("Error")
            .add_message(message)?
            .run(self)
    }

    pub fn show_info(&self, message: &str) -> Result<(), LauncherError> {
        Dialog::new(DialogKind::Info).add_message(message)?.run(self)
    }

    /// Asks for a file. `None` when the user cancels.
    pub fn choose_file(&self, title: &str) -> Result<Option<PathBuf>, LauncherError> {
        let mut chosen = None;
        Dialog::new(DialogKind::FileSelect)
            .title(title)
            .on_result(|path: &str| {
                chosen = Some(PathBuf::from(path));
                Ok(())
            })?
            .run(self)?;
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::MockRunner;
    use std::cell::RefCell;

    fn recording<'a>(log: &'a RefCell<Vec<&'static str>>, name: &'static str) -> impl Action + 'a {
        move || -> Result<(), LauncherError> {
            log.borrow_mut().push(name);
            Ok(())
        }
    }

    #[test]
    fn wrong_kind_methods_fail_with_invalid_operation() {
        let log = RefCell::new(Vec::new());
        let err = Dialog::new(DialogKind::Info)
            .add_option("A", recording(&log, "a"))
            .err()
            .expect("options on info");
        assert!(matches!(
            err,
            LauncherError::InvalidOperation {
                kind: DialogKind::Info,
                method: "add_option"
            }
        ));

        let err = Dialog::new(DialogKind::Menu)
            .add_message("hello")
            .err()
            .expect("messages on menu");
        assert!(matches!(err, LauncherError::InvalidOperation { kind: DialogKind::Menu, .. }));

        let err = Dialog::new(DialogKind::Error)
            .header("nope")
            .err()
            .expect("header on error");
        assert!(matches!(err, LauncherError::InvalidOperation { method: "header", .. }));

        let err = Dialog::new(DialogKind::Menu)
            .on_result(|_: &str| Ok(()))
            .err()
            .expect("handler on menu");
        assert!(matches!(err, LauncherError::InvalidOperation { method: "on_result", .. }));

        let err = Dialog::new(DialogKind::FileSelect)
            .add_message("hello")
            .err()
            .expect("messages on file select");
        assert!(matches!(err, LauncherError::InvalidOperation { .. }));
    }

    #[test]
    fn missing_required_data_fails_before_spawning() {
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);
        for kind in [
            DialogKind::Menu,
            DialogKind::Info,
            DialogKind::Error,
            DialogKind::FileSelect,
        ] {
            let err = Dialog::new(kind).run(&ui).expect_err("empty dialog");
            assert!(matches!(err, LauncherError::MissingRequiredData { kind: k, .. } if k == kind));
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn option_index_map_keeps_insertion_order() {
        let log = RefCell::new(Vec::new());
        let names = ["zero", "one", "two", "three", "four"];
        let mut map = OptionIndexMap::new(
            names
                .iter()
                .map(|name| MenuOption::new(*name, recording(&log, *name)))
                .collect(),
        );
        assert_eq!(map.entries().count(), names.len());
        let labels: Vec<&str> = map.entries().map(|(_, label)| label).collect();
        assert_eq!(labels, names);
        for (position, name) in names.iter().enumerate() {
            assert_eq!(map.resolve(&Selection::Index(position)), Some(position));
            assert_eq!(map.resolve(&Selection::Label(name.to_string())), Some(position));
            map.action_mut(position).unwrap().invoke().unwrap();
            assert_eq!(log.borrow().last(), Some(name));
        }
        assert_eq!(map.resolve(&Selection::Index(names.len())), None);
        assert_eq!(map.resolve(&Selection::Label("five".to_string())), None);
    }

    #[test]
    fn menu_selection_invokes_only_the_chosen_action() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "1\n");
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);
        let log = RefCell::new(Vec::new());

        Dialog::new(DialogKind::Menu)
            .add_option("A", recording(&log, "a"))
            .unwrap()
            .add_option("B", recording(&log, "b"))
            .unwrap()
            .run(&ui)
            .unwrap();

        assert_eq!(*log.borrow(), vec!["b"]);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].capture_output);
        assert_eq!(
            calls[0].invocation.tokens(),
            &["kdialog", "--menu", "Choose an option", "0", "A", "1", "B"]
        );
    }

    #[test]
    fn cancelled_menu_invokes_nothing() {
        let runner = MockRunner::default();
        runner.push_stdout(1, "");
        let locator = FakeLocator(vec!["zenity"]);
        let ui = Ui::new(&locator, &runner);
        let log = RefCell::new(Vec::new());

        Dialog::new(DialogKind::Menu)
            .header("ZoneBuilder Options")
            .unwrap()
            .add_option("A", recording(&log, "a"))
            .unwrap()
            .add_option("B", recording(&log, "b"))
            .unwrap()
            .run(&ui)
            .unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn label_selection_from_osascript_resolves_by_name() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "Run Regedit\n");
        let locator = FakeLocator(vec!["osascript"]);
        let ui = Ui::new(&locator, &runner);
        let log = RefCell::new(Vec::new());

        Dialog::new(DialogKind::Menu)
            .add_option("Run Winecfg", recording(&log, "winecfg"))
            .unwrap()
            .add_option("Run Regedit", recording(&log, "regedit"))
            .unwrap()
            .run(&ui)
            .unwrap();

        assert_eq!(*log.borrow(), vec!["regedit"]);
    }

    #[test]
    fn out_of_range_selection_is_an_error() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "7\n");
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);
        let log = RefCell::new(Vec::new());

        let err = Dialog::new(DialogKind::Menu)
            .add_option("A", recording(&log, "a"))
            .unwrap()
            .run(&ui)
            .expect_err("index 7 does not exist");
        assert!(matches!(err, LauncherError::Process(_)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn action_errors_propagate_out_of_run() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "0");
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);

        let err = Dialog::new(DialogKind::Menu)
            .add_option("Fail", || -> Result<(), LauncherError> {
                Err(LauncherError::Process("boom".to_string()))
            })
            .unwrap()
            .run(&ui)
            .expect_err("action fails");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn file_select_with_empty_output_skips_handler() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "\n");
        let locator = FakeLocator(vec!["zenity"]);
        let ui = Ui::new(&locator, &runner);
        let calls = RefCell::new(0);

        Dialog::new(DialogKind::FileSelect)
            .on_result(|_: &str| {
                *calls.borrow_mut() += 1;
                Ok(())
            })
            .unwrap()
            .run(&ui)
            .unwrap();

        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn choose_file_returns_trimmed_path() {
        let runner = MockRunner::default();
        runner.push_stdout(0, "/home/user/levels/setup.exe\n");
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);

        let chosen = ui.choose_file("Select EXE").unwrap();
        assert_eq!(chosen, Some(PathBuf::from("/home/user/levels/setup.exe")));
        assert_eq!(
            runner.calls()[0].invocation.tokens(),
            &["kdialog", "--title", "Select EXE", "--getopenfilename"]
        );

        runner.push_stdout(1, "");
        assert_eq!(ui.choose_file("Select EXE").unwrap(), None);
    }

    #[test]
    fn error_dialog_joins_messages() {
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["kdialog"]);
        let ui = Ui::new(&locator, &runner);

        Dialog::new(DialogKind::Error)
            .add_message("first")
            .unwrap()
            .add_message("second")
            .unwrap()
            .run(&ui)
            .unwrap();

        assert_eq!(
            runner.calls()[0].invocation.tokens(),
            &["kdialog", "--error", "first\nsecond"]
        );
    }

    #[test]
    fn no_backend_fails_without_spawning() {
        let runner = MockRunner::default();
        let locator = FakeLocator(Vec::new());
        let ui = Ui::new(&locator, &runner);
        let err = ui.show_error("anything").expect_err("no backend");
        assert!(matches!(err, LauncherError::NoBackendAvailable { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn unsupported_pair_is_an_error_not_an_empty_command() {
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["xmessage"]);
        let ui = Ui::new(&locator, &runner);
        let err = ui.choose_file("Select EXE").expect_err("xmessage has no file picker");
        assert!(matches!(
            err,
            LauncherError::UnsupportedCombination {
                kind: DialogKind::FileSelect,
                backend: Backend::Xmessage
            }
        ));
        assert!(runner.calls().is_empty());
    }
}
