//! `wterm connect <user@host>...` — open one tab per target and drive them
//! from the local terminal.
//!
//! Every target's connect is started at once and the gateway answers are
//! collected before the terminal enters raw mode. The event loop then
//! multiplexes keystrokes, terminal resizes and registry events. `Ctrl+]`
//! starts a prefix command (tab switching, sticky modifiers, quit).

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wterm_client::{
    HttpGateway, InputRouter, RegistryEvent, SessionRegistry, Vt100Surface, WsConnector,
};
use wterm_core::Credentials;

use crate::config::{parse_target, Config};
use crate::render::Renderer;
use crate::terminal as term;

/// Keep-alive period for open channels.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long quitting waits for the gateway to release the sessions.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Byte sent for a literal `Ctrl+]`.
const PREFIX_BYTE: &str = "\x1d";

/// Options of the `connect` subcommand.
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    pub targets: Vec<String>,
    pub port: Option<u16>,
    pub key_file: Option<PathBuf>,
    pub passphrase_env: Option<String>,
}

/// How every target authenticates.
enum Secret {
    Password(String),
    Key {
        text: String,
        passphrase: Option<String>,
    },
}

impl Secret {
    fn resolve(args: &ConnectArgs) -> Result<Self> {
        if let Some(path) = &args.key_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read key file {}", path.display()))?;
            let passphrase = match &args.passphrase_env {
                Some(var) => Some(
                    std::env::var(var)
                        .with_context(|| format!("passphrase variable {var} is not set"))?,
                ),
                None => None,
            };
            return Ok(Self::Key { text, passphrase });
        }

        let password = dialoguer::Password::new()
            .with_prompt("Password")
            .allow_empty_password(false)
            .interact()
            .context("failed to read password")?;
        Ok(Self::Password(password))
    }

    fn credentials(&self, host: &str, port: u16, user: &str) -> Credentials {
        match self {
            Self::Password(password) => Credentials::password(host, port, user, password.as_str()),
            Self::Key { text, passphrase } => {
                Credentials::private_key(host, port, user, text.as_str(), passphrase.clone())
            }
        }
    }
}

/// Commands entered after the `Ctrl+]` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrefixCommand {
    ArmCtrl,
    ArmAlt,
    Next,
    Previous,
    Switch(usize),
    Close,
    Disconnect,
    Quit,
    SendPrefix,
}

fn is_prefix(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(']')
}

fn prefix_command(key: &KeyEvent) -> Option<PrefixCommand> {
    if is_prefix(key) {
        return Some(PrefixCommand::SendPrefix);
    }
    let KeyCode::Char(c) = key.code else {
        return None;
    };
    let command = match c {
        'c' => PrefixCommand::ArmCtrl,
        'a' => PrefixCommand::ArmAlt,
        'n' => PrefixCommand::Next,
        'p' => PrefixCommand::Previous,
        'x' => PrefixCommand::Close,
        'd' => PrefixCommand::Disconnect,
        'q' => PrefixCommand::Quit,
        '1'..='9' => PrefixCommand::Switch(c as usize - '1' as usize),
        _ => return None,
    };
    Some(command)
}

fn run_prefix_command(
    command: PrefixCommand,
    registry: &mut SessionRegistry<Vt100Surface>,
    router: &mut InputRouter,
) -> Result<()> {
    match command {
        PrefixCommand::ArmCtrl => {
            router.virtual_key(registry, "Ctrl");
        }
        PrefixCommand::ArmAlt => {
            router.virtual_key(registry, "Alt");
        }
        PrefixCommand::Next => registry.next_session(),
        PrefixCommand::Previous => registry.previous_session(),
        PrefixCommand::Switch(index) => {
            if registry.switch_index(index).is_err() {
                debug!(index, "no tab at index");
            }
        }
        PrefixCommand::Close => {
            let id = registry.active_id();
            registry.close_session(id)?;
        }
        PrefixCommand::Disconnect => {
            let id = registry.active_id();
            registry.disconnect(id)?;
        }
        PrefixCommand::SendPrefix => {
            registry.send_input(PREFIX_BYTE);
        }
        PrefixCommand::Quit => {}
    }
    Ok(())
}

/// Open one tab per target and run until the user quits or every tab has
/// lost its connection.
pub async fn run(args: ConnectArgs, cfg: &Config) -> Result<()> {
    let port = args.port.unwrap_or(cfg.defaults.port);
    let targets = args
        .targets
        .iter()
        .map(|t| parse_target(t, cfg.defaults.username.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    if targets.is_empty() {
        anyhow::bail!("no target given");
    }

    let secret = Secret::resolve(&args)?;

    let gateway_config = cfg.gateway_config();
    let connector = WsConnector::new(gateway_config.ws_base()?)?;
    let gateway = HttpGateway::new(gateway_config)?;

    let (cols, rows) = term::get_terminal_size();
    let pane = term::pane_viewport(cols, rows);
    let (mut registry, mut events) = SessionRegistry::new(
        Arc::new(gateway),
        Arc::new(connector),
        Box::new(move || Vt100Surface::new(pane)),
    );
    registry.resize_all(pane);

    let mut labels = HashMap::new();
    for (i, (user, host)) in targets.iter().enumerate() {
        let id = if i == 0 {
            registry.active_id()
        } else {
            registry.create_session()
        };
        info!(user = %user, host = %host, port, "connecting");
        match registry.start_connect(id, secret.credentials(host, port, user)) {
            Ok(()) => {
                labels.insert(id, format!("{user}@{host}"));
            }
            Err(e) => eprintln!("wterm: {user}@{host}: {}", e.user_message()),
        }
    }

    // The gateway requests run concurrently; report each failure as it lands.
    while registry.has_pending_connects() {
        let Some(event) = events.recv().await else {
            break;
        };
        match event {
            RegistryEvent::Connect(outcome) => {
                let id = outcome.session;
                if let Err(e) = registry.complete_connect(outcome) {
                    let label = labels.get(&id).map(String::as_str).unwrap_or("session");
                    eprintln!("wterm: {label}: {}", e.user_message());
                }
            }
            other => {
                registry.handle_event(other);
            }
        }
    }
    if !registry.any_connected() {
        anyhow::bail!("no session could be established");
    }
    registry.switch_index(0)?;

    let snapshots = registry.subscribe();
    let guard = term::RawModeGuard::enter().context("failed to enter raw terminal mode")?;

    // Blocking thread for crossterm events (stdin + resize).
    let (tx_term, mut rx_term) = mpsc::channel::<Event>(64);
    let input_handle = tokio::task::spawn_blocking(move || loop {
        match event::read() {
            Ok(ev) => {
                if tx_term.blocking_send(ev).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("crossterm event error: {e}");
                break;
            }
        }
    });

    let mut router = InputRouter::new();
    let mut renderer = Renderer::new(rows);
    let mut stdout = std::io::stdout();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;
    let mut prefix = false;

    renderer.draw(&registry, &snapshots.borrow(), router.modifier(), prefix, &mut stdout)?;

    loop {
        tokio::select! {
            Some(ev) = events.recv() => {
                registry.handle_event(ev);
            }
            Some(ev) = rx_term.recv() => {
                match ev {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if prefix {
                            prefix = false;
                            match prefix_command(&key) {
                                Some(PrefixCommand::Quit) => break,
                                Some(command) => {
                                    debug!(?command, "prefix command");
                                    run_prefix_command(command, &mut registry, &mut router)?;
                                }
                                None => debug!(?key, "unknown prefix command"),
                            }
                        } else if is_prefix(&key) {
                            prefix = true;
                        } else if let Some((value, emulated)) = key_event_to_input(&key) {
                            router.physical(&mut registry, &value, &emulated);
                        }
                    }
                    Event::Paste(text) => {
                        registry.send_input(&text);
                    }
                    Event::Resize(new_cols, new_rows) => {
                        registry.resize_all(term::pane_viewport(new_cols, new_rows));
                        renderer.resize(new_rows);
                    }
                    _ => {}
                }
            }
            _ = ping.tick() => registry.ping_all(),
            else => break,
        }

        if !registry.any_connected() {
            info!("no connected session left");
            break;
        }
        renderer.draw(&registry, &snapshots.borrow(), router.modifier(), prefix, &mut stdout)?;
    }

    input_handle.abort();
    let releases = registry.shutdown();

    drop(guard);
    stdout.flush()?;

    let released = tokio::time::timeout(SHUTDOWN_GRACE, async {
        for task in releases {
            let _ = task.await;
        }
    })
    .await;
    if released.is_err() {
        warn!("gateway did not confirm every disconnect in time");
    }
    let closed: Vec<String> = targets.iter().map(|(u, h)| format!("{u}@{h}")).collect();
    eprintln!("Connections to {} closed.", closed.join(", "));
    Ok(())
}

/// Convert a crossterm key event into `(key value, emulated input)`.
///
/// The key value is what the modifier encoder matches on (`"c"`, `"Enter"`);
/// the emulated input is what a plain terminal would send for the event.
fn key_event_to_input(event: &KeyEvent) -> Option<(String, String)> {
    let named = |name: &str, seq: &str| Some((name.to_string(), seq.to_string()));
    match event.code {
        KeyCode::Char(c) => {
            let value = c.to_string();
            if event.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+A = 0x01, Ctrl+B = 0x02, etc.
                let byte = c.to_ascii_lowercase() as u8 - b'a' + 1;
                return Some((value, char::from(byte).to_string()));
            }
            if event.modifiers.contains(KeyModifiers::ALT) {
                return Some((value, format!("\x1b{c}")));
            }
            Some((value.clone(), value))
        }
        KeyCode::Enter => named("Enter", "\r"),
        KeyCode::Backspace => named("Backspace", "\x7f"),
        KeyCode::Tab => named("Tab", "\t"),
        KeyCode::BackTab => named("Tab", "\x1b[Z"),
        KeyCode::Esc => named("Escape", "\x1b"),
        KeyCode::Up => named("ArrowUp", "\x1b[A"),
        KeyCode::Down => named("ArrowDown", "\x1b[B"),
        KeyCode::Right => named("ArrowRight", "\x1b[C"),
        KeyCode::Left => named("ArrowLeft", "\x1b[D"),
        KeyCode::Home => named("Home", "\x1b[H"),
        KeyCode::End => named("End", "\x1b[F"),
        KeyCode::PageUp => named("PageUp", "\x1b[5~"),
        KeyCode::PageDown => named("PageDown", "\x1b[6~"),
        KeyCode::Insert => named("Insert", "\x1b[2~"),
        KeyCode::Delete => named("Delete", "\x1b[3~"),
        KeyCode::F(n) => {
            let seq = match n {
                1 => "\x1bOP",
                2 => "\x1bOQ",
                3 => "\x1bOR",
                4 => "\x1bOS",
                5 => "\x1b[15~",
                6 => "\x1b[17~",
                7 => "\x1b[18~",
                8 => "\x1b[19~",
                9 => "\x1b[20~",
                10 => "\x1b[21~",
                11 => "\x1b[23~",
                12 => "\x1b[24~",
                _ => return None,
            };
            Some((format!("F{n}"), seq.to_string()))
        }
        _ => None,
    }
}
