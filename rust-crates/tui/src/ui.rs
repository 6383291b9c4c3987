use crate::{
    client::{
        AppSnapshot,
        StatusKind,
    },
    session::{
        MAX_SESSION,
        Phase,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ledger::{
    TokenAmount,
    TokenInfo,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    io::stdout,
    time::Duration,
};

const DISPLAY_PLACES: usize = 3;
const VISIBLE_ERRORS: usize = 4;

pub type InputEventReceiver = EventStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Tap,
    StartSession,
    StopAndClaim,
    ApproveClaim,
    DeclineClaim,
    Connect,
    Disconnect,
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    Approval,
    Help,
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    match input.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// The approval prompt follows the controller: it is open exactly while a
/// claim waits for the user's decision.
fn sync_mode(state: &mut UiState, snap: &AppSnapshot) {
    match (snap.approval.is_some(), state.mode) {
        (true, Mode::Normal | Mode::Help) => state.mode = Mode::Approval,
        (false, Mode::Approval) => state.mode = Mode::Normal,
        _ => {}
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    sync_mode(state, snap);
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    match state.mode {
        Mode::Approval => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                state.mode = Mode::Normal;
                Some(UserEvent::ApproveClaim)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::DeclineClaim)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Help => {
            state.mode = Mode::Normal;
            Some(UserEvent::Redraw)
        }
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('?') => {
                state.mode = Mode::Help;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(' ') | KeyCode::Char('t') | KeyCode::Enter => {
                Some(UserEvent::Tap)
            }
            KeyCode::Char('s') => Some(UserEvent::StartSession),
            KeyCode::Char('c') => Some(UserEvent::StopAndClaim),
            KeyCode::Char('w') => Some(UserEvent::Connect),
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // wallet
            Constraint::Length(3), // contract
            Constraint::Min(9),    // session
            Constraint::Length(7), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], snap);
    draw_contract_panel(f, chunks[1], snap);
    draw_session_panel(f, chunks[2], snap);
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    draw_modals(f, state, snap);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = match &snap.account {
        Some(address) => address.short(),
        None => "not connected".to_string(),
    };
    let text = format!(
        "Network: {} | Connector: {} | Account: {} | Claimed: {}",
        snap.network,
        snap.strategy,
        account,
        format_amount(snap.token.as_ref(), snap.claimed_total)
    );
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_contract_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Contract");
    let widget = if let Some(err) = &snap.config_error {
        Paragraph::new(format!("Unavailable: {err}"))
            .style(Style::default().fg(Color::Red))
            .block(block)
    } else {
        let contract = snap
            .contract_id
            .as_deref()
            .map(id_preview)
            .unwrap_or_else(|| "loading...".to_string());
        let pool = snap
            .pool_balance
            .map(|b| format_amount(snap.token.as_ref(), b))
            .unwrap_or_else(|| "N/A".to_string());
        let per_tap = snap
            .token
            .as_ref()
            .map(|t| format_amount(Some(t), t.unit_reward))
            .unwrap_or_else(|| "N/A".to_string());
        Paragraph::new(format!(
            "Contract: {contract} | Reward pool: {pool} | Per tap: {per_tap}"
        ))
        .block(block)
    };
    f.render_widget(widget, area);
}

fn draw_session_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Session ({})", phase_label(snap.phase)));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let taps_style = if snap.can_tap {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let taps = Paragraph::new(Line::from(vec![
        Span::raw("Taps: "),
        Span::styled(snap.tap_count.to_string(), taps_style),
        Span::raw(format!(
            "   Potential reward: {}",
            format_amount(snap.token.as_ref(), snap.potential_reward)
        )),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(taps, rows[0]);

    let ratio = if snap.phase == Phase::Idle {
        0.0
    } else {
        (snap.elapsed.as_secs_f64() / MAX_SESSION.as_secs_f64()).clamp(0.0, 1.0)
    };
    let gauge_color = if snap.phase == Phase::TimedOut {
        Color::Red
    } else {
        Color::Cyan
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(gauge_color))
        .ratio(ratio)
        .label(format!(
            "{} / {} ({} left)",
            clock(snap.elapsed),
            clock(MAX_SESSION),
            clock(snap.remaining)
        ));
    f.render_widget(gauge, rows[1]);

    if let Some(stage) = snap.claim_stage {
        let p = Paragraph::new(stage.message())
            .style(Style::default().fg(Color::Magenta))
            .alignment(Alignment::Center);
        f.render_widget(p, rows[2]);
    }

    let mut lines = Vec::new();
    if let Some(receipt) = &snap.last_receipt {
        lines.push(Line::from(format!(
            "Last claim: {} taps, {} (tx {})",
            receipt.taps,
            format_amount(snap.token.as_ref(), receipt.reward),
            id_preview(&receipt.tx_id)
        )));
    }
    if let Some(link) = &snap.share_link {
        lines.push(Line::from(format!("Share: {link}")));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), rows[3]);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let color = match snap.status.kind {
        StatusKind::Info => Color::White,
        StatusKind::Success => Color::Green,
        StatusKind::Warning => Color::Yellow,
        StatusKind::Error => Color::Red,
    };
    let status = Paragraph::new(snap.status.message.clone())
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[0]);

    let lines: Vec<Line> = snap
        .errors
        .iter()
        .rev()
        .take(VISIBLE_ERRORS)
        .map(|e| Line::from(e.clone()))
        .collect();
    let errors = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors, chunks[1]);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "s start | space/t tap | c stop & claim | w connect | d disconnect | ? help | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match state.mode {
        Mode::Approval => {
            let Some(prompt) = &snap.approval else {
                return;
            };
            let area = centered_rect(50, 25, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Wallet Approval");
            let account = snap
                .account
                .as_ref()
                .map(|a| a.short())
                .unwrap_or_default();
            let lines = vec![
                Line::from(format!("Account {account} requests a claim")),
                Line::from(format!(
                    "{} taps for {}",
                    prompt.taps,
                    format_amount(snap.token.as_ref(), prompt.reward)
                )),
                Line::from(""),
                Line::from("Approve? (Y/N)"),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::Help => {
            let area = centered_rect(60, 50, f.area());
            let block = Block::default().borders(Borders::ALL).title("How to play");
            let lines = vec![
                Line::from("1. Connect a wallet (w) unless it connects on its own."),
                Line::from("2. Start a session (s) and tap (space) as fast as you can."),
                Line::from(format!(
                    "3. Sessions stop accepting taps after {}.",
                    clock(MAX_SESSION)
                )),
                Line::from("4. Stop & claim (c) to turn taps into tokens."),
                Line::from(""),
                Line::from("Press any key to close."),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Active => "tapping",
        Phase::TimedOut => "time's up",
        Phase::ClaimPending => "claiming",
    }
}

fn format_amount(token: Option<&TokenInfo>, amount: TokenAmount) -> String {
    match token {
        Some(token) => format!("{} {}", token.format(amount, DISPLAY_PLACES), token.symbol),
        None => amount.to_string(),
    }
}

fn clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn id_preview(id: &str) -> String {
    if id.len() <= 14 {
        id.to_string()
    } else {
        format!("{}...{}", &id[..8], &id[id.len() - 4..])
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::{
        KeyEvent,
        KeyEventState,
        KeyModifiers,
    };

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn interpret_event__maps_game_keys() {
        let mut state = UiState::default();

        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char('s'))),
            Some(UserEvent::StartSession)
        );
        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char(' '))),
            Some(UserEvent::Tap)
        );
        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char('c'))),
            Some(UserEvent::StopAndClaim)
        );
        assert_eq!(interpret_event(&mut state, key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn interpret_event__ignores_key_repeats() {
        let mut state = UiState::default();
        let repeat = Event::Key(KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Repeat,
            state: KeyEventState::NONE,
        });

        assert_eq!(interpret_event(&mut state, repeat), None);
    }

    #[test]
    fn interpret_event__approval_answers_yes_or_no() {
        // given
        let mut state = UiState {
            mode: Mode::Approval,
            ..UiState::default()
        };

        // when
        let ignored = interpret_event(&mut state, key(KeyCode::Char(' ')));
        let declined = interpret_event(&mut state, key(KeyCode::Char('n')));

        // then
        assert_eq!(ignored, None);
        assert_eq!(declined, Some(UserEvent::DeclineClaim));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__quit_needs_confirmation() {
        let mut state = UiState::default();

        let first = interpret_event(&mut state, key(KeyCode::Char('q')));
        let second = interpret_event(&mut state, key(KeyCode::Char('y')));

        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(second, Some(UserEvent::Quit));
    }

    #[test]
    fn clock__formats_minutes_and_seconds() {
        assert_eq!(clock(Duration::from_secs(0)), "00:00");
        assert_eq!(clock(Duration::from_secs(299)), "04:59");
        assert_eq!(clock(MAX_SESSION), "05:00");
    }
}
