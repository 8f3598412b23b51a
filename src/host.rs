// SPDX-License-Identifier: MPL-2.0

//! Terminal host: drives one switcher from a calloop event loop.
//!
//! Commands arrive line by line on stdin, rotation ticks come from calloop
//! timers, and edits to the options file are picked up through `notify`. All
//! of them are dispatched on the loop thread.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bg_switcher_lib::{
    CalloopScheduler, Config, MemorySink, Options, PresentationSink, RotationHost, RotationToken,
    Stylesheet, SwitcherSlot,
};
use calloop::{EventLoop, LoopHandle, channel};
use eyre::{Context, eyre};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

type SharedSink = Rc<RefCell<MemorySink>>;

#[derive(Debug)]
pub struct HostConfig {
    pub options: Options,
    pub options_path: Option<PathBuf>,
    pub stylesheets: Vec<Stylesheet>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(usize),
    Click(usize),
    Next,
    Prev,
    Random,
    Thumbs(Option<bool>),
    Start,
    Stop,
    Interval(u64),
    Attach,
    Status,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> eyre::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(eyre!("too many arguments"));
        }

        let command = match (verb, arg) {
            ("select", Some(index)) => Command::Select(parse_number(index)?),
            ("click", Some(index)) => Command::Click(parse_number(index)?),
            ("next", None) => Command::Next,
            ("prev", None) => Command::Prev,
            ("random", None) => Command::Random,
            ("thumbs", None) => Command::Thumbs(None),
            ("thumbs", Some("on")) => Command::Thumbs(Some(true)),
            ("thumbs", Some("off")) => Command::Thumbs(Some(false)),
            ("start", None) => Command::Start,
            ("stop", None) => Command::Stop,
            ("interval", Some(ms)) => Command::Interval(parse_number(ms)?),
            ("attach", None) => Command::Attach,
            ("status", None) => Command::Status,
            ("quit" | "exit", None) => Command::Quit,
            _ => return Err(eyre!("unknown command: {line}")),
        };
        Ok(Some(command))
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> eyre::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .wrap_err_with(|| format!("invalid number: {value}"))
}

/// A live setting that differs between two loads of the options file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionChange {
    Interval(u64),
    AutoRotate(bool),
}

/// Settings to push into a running switcher when the options file moves from
/// `previous` to `current`. Unchanged settings are left alone so that a save
/// does not reset the rotation clock or undo a manual `stop`.
fn option_changes(previous: &Config, current: &Config) -> Vec<OptionChange> {
    let mut changes = Vec::new();
    if current.auto_rotate_interval != previous.auto_rotate_interval {
        changes.push(OptionChange::Interval(current.auto_rotate_interval));
    }
    if current.auto_rotate != previous.auto_rotate {
        changes.push(OptionChange::AutoRotate(current.auto_rotate));
    }
    if current.container != previous.container
        || current.enable_thumbs != previous.enable_thumbs
        || current.enable_progressive_blur != previous.enable_progressive_blur
    {
        tracing::info!("markup options changed, restart to apply them");
    }
    changes
}

pub struct Host {
    slot: SwitcherSlot<SharedSink, CalloopScheduler<Host>>,
    sink: SharedSink,
    options_path: Option<PathBuf>,
    /// Options as last loaded from `options_path`.
    loaded: Config,
    exit: bool,
}

impl RotationHost for Host {
    fn on_rotation_tick(&mut self, token: RotationToken) {
        self.slot.on_rotation_tick(token);
        self.log_state();
    }
}

impl Host {
    pub fn run(config: HostConfig) -> eyre::Result<()> {
        let mut event_loop: EventLoop<'static, Host> =
            EventLoop::try_new().wrap_err("failed to create event loop")?;
        let handle = event_loop.handle();

        let sink = config
            .stylesheets
            .iter()
            .fold(MemorySink::new(), |sink, sheet| sink.with_stylesheet(sheet));
        let sink = Rc::new(RefCell::new(sink));

        let mut host = Host {
            slot: SwitcherSlot::new(),
            sink: sink.clone(),
            options_path: config.options_path,
            loaded: config.options.clone().merge(),
            exit: false,
        };

        let scheduler = CalloopScheduler::new(handle.clone());
        let initialised = if config.force {
            host.slot.init(config.options, sink, scheduler)?;
            true
        } else {
            host.slot.auto_init(&config.stylesheets, sink, scheduler)?
        };
        if !initialised {
            tracing::info!("no stylesheet references the switcher; pass --force to construct it");
        }

        insert_stdin_source(&handle)?;
        let _watcher = match host.options_path.clone() {
            Some(path) => watch_options(&handle, &path)?,
            None => None,
        };

        host.log_state();

        loop {
            event_loop.dispatch(None, &mut host)?;

            if host.exit {
                break;
            }
        }

        host.slot.destroy();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle_command(command),
            Ok(None) => {}
            Err(err) => tracing::warn!("{err}"),
        }
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, "command");
        match command {
            Command::Select(index) => self.slot.switch_background(index),
            Command::Click(position) => self.slot.on_thumb_click(position),
            Command::Next => self.slot.next_background(),
            Command::Prev => self.slot.prev_background(),
            Command::Random => self.slot.random_background(),
            Command::Thumbs(show) => self.slot.toggle_thumbs(show),
            Command::Start => self.slot.start_auto_rotate(),
            Command::Stop => self.slot.stop_auto_rotate(),
            Command::Interval(ms) => self.slot.set_auto_rotate_interval(ms),
            Command::Attach => self.slot.attach(),
            Command::Status => println!("{}", self.status()),
            Command::Quit => self.exit = true,
        }
        self.log_state();
    }

    fn reload_options(&mut self) {
        let Some(path) = self.options_path.as_deref() else {
            return;
        };
        let options = match Options::load_or_default(path) {
            Ok(options) => options,
            Err(err) => {
                tracing::error!(%err, "failed to reload options");
                return;
            }
        };
        let loaded = options.merge();
        let changes = option_changes(&self.loaded, &loaded);
        self.loaded = loaded;
        if changes.is_empty() {
            return;
        }
        tracing::info!(?path, ?changes, "options changed");

        for change in changes {
            match change {
                OptionChange::Interval(ms) => self.slot.set_auto_rotate_interval(ms),
                OptionChange::AutoRotate(true) => self.slot.start_auto_rotate(),
                OptionChange::AutoRotate(false) => self.slot.stop_auto_rotate(),
            }
        }
    }

    fn status(&self) -> String {
        let Some(switcher) = self.slot.instance() else {
            return "no switcher".to_string();
        };
        let sink = self.sink.borrow();
        format!(
            "background {} rotating={} thumbs={} classes=[{}] --bg={}",
            switcher.current_index(),
            switcher.is_rotating(),
            match switcher.thumbs_visible() {
                Some(true) => "shown",
                Some(false) => "hidden",
                None => "none",
            },
            sink.root_classes().join(" "),
            sink.computed_variable("--bg")
                .unwrap_or_else(|| "unset".to_string()),
        )
    }

    fn log_state(&self) {
        if self.slot.instance().is_some() {
            tracing::info!("{}", self.status());
        }
    }
}

fn insert_stdin_source(handle: &LoopHandle<'static, Host>) -> eyre::Result<()> {
    let (line_tx, line_rx) = channel::channel::<String>();

    handle
        .insert_source(line_rx, |event, _, host: &mut Host| match event {
            channel::Event::Msg(line) => host.handle_line(&line),
            channel::Event::Closed => {
                tracing::debug!("stdin closed");
                host.exit = true;
            }
        })
        .map_err(|err| eyre!("failed to insert stdin source: {}", err.error))?;

    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .wrap_err("failed to spawn stdin reader")?;

    Ok(())
}

fn watch_options(
    handle: &LoopHandle<'static, Host>,
    path: &Path,
) -> eyre::Result<Option<RecommendedWatcher>> {
    let Some(dir) = path.parent().filter(|dir| dir.is_dir()) else {
        tracing::debug!(?path, "options directory missing, not watching");
        return Ok(None);
    };

    let (event_tx, event_rx) = channel::sync_channel::<notify::Event>(20);
    let watched = path.to_path_buf();
    handle
        .insert_source(event_rx, move |event, _, host: &mut Host| {
            if let channel::Event::Msg(event) = event {
                let relevant = (event.kind.is_modify() || event.kind.is_create())
                    && event.paths.iter().any(|p| p.file_name() == watched.file_name());
                if relevant {
                    host.reload_options();
                }
            }
        })
        .map_err(|err| eyre!("failed to insert options watcher: {}", err.error))?;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => tracing::warn!(%err, "options watcher error"),
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    Ok(Some(watcher))
}
