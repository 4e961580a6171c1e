//! Token construction for every (dialog kind, backend) pair.

use super::backend::Backend;
use super::{DialogKind, OptionIndexMap, Selection, Window};
use crate::error::LauncherError;
use crate::process::{CommandInvocation, CommandOutput};

const DEFAULT_HEADER: &str = "Choose an option";

/// Everything a renderer may read from the dialog being run.
pub(crate) struct Content<'c, 'a> {
    pub window: &'c Window,
    pub messages: &'c [String],
    pub options: &'c OptionIndexMap<'a>,
}

type Renderer = fn(&mut CommandInvocation, &Content<'_, '_>) -> Result<(), LauncherError>;

/// The dispatch matrix. `None` marks a pair the backend cannot express.
fn renderer(kind: DialogKind, backend: Backend) -> Option<Renderer> {
    match (kind, backend) {
        (DialogKind::Info, Backend::Kdialog) => Some(kdialog_info),
        (DialogKind::Error, Backend::Kdialog) => Some(kdialog_error),
        (DialogKind::Menu, Backend::Kdialog) => Some(kdialog_menu),
        (DialogKind::FileSelect, Backend::Kdialog) => Some(kdialog_file_select),

        (DialogKind::Info, Backend::Zenity) => Some(zenity_info),
        (DialogKind::Error, Backend::Zenity) => Some(zenity_error),
        (DialogKind::Menu, Backend::Zenity) => Some(zenity_menu),
        (DialogKind::FileSelect, Backend::Zenity) => Some(zenity_file_select),

        (DialogKind::Info, Backend::Osascript) => Some(osascript_info),
        (DialogKind::Error, Backend::Osascript) => Some(osascript_error),
        (DialogKind::Menu, Backend::Osascript) => Some(osascript_menu),
        (DialogKind::FileSelect, Backend::Osascript) => Some(osascript_file_select),

        (DialogKind::Info, Backend::Xmessage) => Some(xmessage_message),
        (DialogKind::Error, Backend::Xmessage) => Some(xmessage_message),
        (DialogKind::Menu, Backend::Xmessage) => Some(xmessage_menu),
        (DialogKind::FileSelect, Backend::Xmessage) => None,
    }
}

pub(crate) fn build(
    kind: DialogKind,
    backend: Backend,
    content: &Content<'_, '_>,
) -> Result<CommandInvocation, LauncherError> {
    let render = renderer(kind, backend)
        .ok_or(LauncherError::UnsupportedCombination { kind, backend })?;
    let mut invocation = base(backend, content.window);
    render(&mut invocation, content)?;
    Ok(invocation)
}

fn base(backend: Backend, window: &Window) -> CommandInvocation {
    let mut invocation = CommandInvocation::new(backend.program());
    match backend {
        Backend::Kdialog => {
            if !window.title.is_empty() {
                invocation.arg("--title").arg(window.title.clone());
            }
        }
        Backend::Zenity => {
            if !window.title.is_empty() {
                invocation.arg(format!("--title={}", window.title));
            }
            invocation
                .arg(format!("--width={}", window.width))
                .arg(format!("--height={}", window.height));
        }
        // AppleScript carries the title inside each script.
        Backend::Osascript => {}
        Backend::Xmessage => {
            invocation.arg("-center");
            if !window.title.is_empty() {
                invocation.arg("-title").arg(window.title.clone());
            }
        }
    }
    invocation
}

fn header(window: &Window) -> String {
    window
        .header
        .clone()
        .unwrap_or_else(|| DEFAULT_HEADER.to_string())
}

fn kdialog_info(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--msgbox").arg(content.messages.join("\n"));
    Ok(())
}

fn kdialog_error(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--error").arg(content.messages.join("\n"));
    Ok(())
}

fn kdialog_menu(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--menu").arg(header(content.window));
    for (position, label) in content.options.entries() {
        cmd.arg(position.to_string()).arg(label);
    }
    Ok(())
}

fn kdialog_file_select(
    cmd: &mut CommandInvocation,
    _content: &Content<'_, '_>,
) -> Result<(), LauncherError> {
    cmd.arg("--getopenfilename");
    Ok(())
}

fn zenity_info(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--info")
        .arg("--no-markup")
        .arg(format!("--text={}", content.messages.join("\n")));
    Ok(())
}

fn zenity_error(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--error")
        .arg("--no-markup")
        .arg(format!("--text={}", content.messages.join("\n")));
    Ok(())
}

fn zenity_menu(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    cmd.arg("--list")
        .arg(format!("--text={}", header(content.window)))
        .arg("--column=#")
        .arg("--column=Option")
        .arg("--hide-column=1")
        .arg("--print-column=1")
        .arg("--hide-header");
    for (position, label) in content.options.entries() {
        cmd.arg(position.to_string()).arg(label);
    }
    Ok(())
}

fn zenity_file_select(
    cmd: &mut CommandInvocation,
    _content: &Content<'_, '_>,
) -> Result<(), LauncherError> {
    cmd.arg("--file-selection");
    Ok(())
}

fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn applescript_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| applescript_string(line))
        .collect::<Vec<_>>()
        .join(" & return & ")
}

fn osascript_info(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    let mut script = format!("display dialog {}", applescript_lines(content.messages));
    if !content.window.title.is_empty() {
        script.push_str(&format!(" with title {}", applescript_string(&content.window.title)));
    }
    script.push_str(" buttons {\"OK\"} default button \"OK\"");
    cmd.arg("-e").arg(script);
    Ok(())
}

fn osascript_error(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    let title = if content.window.title.is_empty() {
        "Error"
    } else {
        content.window.title.as_str()
    };
    cmd.arg("-e").arg(format!(
        "display alert {} message {} as critical",
        applescript_string(title),
        applescript_lines(content.messages)
    ));
    Ok(())
}

fn osascript_menu(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    let items = content
        .options
        .entries()
        .map(|(_, label)| applescript_string(label))
        .collect::<Vec<_>>()
        .join(", ");
    let mut script = format!(
        "choose from list {{{items}}} with prompt {}",
        applescript_string(&header(content.window))
    );
    if !content.window.title.is_empty() {
        script.push_str(&format!(" with title {}", applescript_string(&content.window.title)));
    }
    cmd.arg("-e").arg(script);
    Ok(())
}

fn osascript_file_select(
    cmd: &mut CommandInvocation,
    content: &Content<'_, '_>,
) -> Result<(), LauncherError> {
    let prompt = if content.window.title.is_empty() {
        "Select a file"
    } else {
        content.window.title.as_str()
    };
    cmd.arg("-e").arg(format!(
        "POSIX path of (choose file with prompt {})",
        applescript_string(prompt)
    ));
    Ok(())
}

fn xmessage_message(
    cmd: &mut CommandInvocation,
    content: &Content<'_, '_>,
) -> Result<(), LauncherError> {
    cmd.arg("-buttons").arg("OK:0").arg(content.messages.join("\n"));
    Ok(())
}

fn xmessage_menu(cmd: &mut CommandInvocation, content: &Content<'_, '_>) -> Result<(), LauncherError> {
    let mut buttons = Vec::new();
    for (_, label) in content.options.entries() {
        // xmessage has no escaping for its button list separators.
        if label.contains(',') || label.contains(':') {
            return Err(LauncherError::InvalidArgument(format!(
                "xmessage cannot show the option `{label}` (contains ',' or ':')"
            )));
        }
        buttons.push(format!("{label}:0"));
    }
    cmd.arg("-print")
        .arg("-buttons")
        .arg(buttons.join(","))
        .arg(header(content.window));
    Ok(())
}

/// Reads a menu selection from the backend's output. `None` means the user
/// closed the dialog or picked nothing.
pub(crate) fn parse_selection(backend: Backend, output: &CommandOutput) -> Option<Selection> {
    if !output.success() {
        return None;
    }
    let text = output.stdout_text();
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    match backend {
        Backend::Kdialog | Backend::Zenity => Some(match raw.parse::<usize>() {
            Ok(position) => Selection::Index(position),
            Err(_) => Selection::Label(raw.to_string()),
        }),
        // `choose from list` prints `false` when cancelled.
        Backend::Osascript if raw == "false" => None,
        Backend::Osascript | Backend::Xmessage => Some(Selection::Label(raw.to_string())),
    }
}
