use std::fs;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use engine::agent::{perceive, AgentCommand, CommandRegistry, LocalAction, ParsedCommand};
use engine::content::load_content;
use engine::persistence::{FileSaveStore, SaveStore};
use engine::sim::{FixedStepClock, TileCoord};
use engine::{registry_document, ClickOutcome, GameWorld, SessionConfig, TickReport};
use serde::Serialize;
use tracing::{debug, info};

use super::bootstrap::{AppError, Boot};
use super::cli::RunOptions;

const CONTROL_PREFIX: &str = "C ";
const TELEMETRY_PREFIX: &str = "T ";
const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Owns the world and applies one text command at a time. Control replies
/// are `C `-prefixed, JSON documents are `T `-prefixed.
pub(crate) struct Session<S> {
    world: GameWorld,
    commands: CommandRegistry,
    store: S,
    clock: FixedStepClock,
}

impl<S: SaveStore> Session<S> {
    pub(crate) fn new(world: GameWorld, config: &SessionConfig, store: S) -> Self {
        Self {
            world,
            commands: CommandRegistry::with_builtins(),
            store,
            clock: FixedStepClock::new(config.target_tps, config.max_ticks_per_advance),
        }
    }

    pub(crate) fn world(&self) -> &GameWorld {
        &self.world
    }

    pub(crate) fn announce<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        control(
            out,
            &format!(
                "ready v{PROTOCOL_VERSION} map:{} tps:{}",
                self.world.active_map_id(),
                (1.0 / self.clock.fixed_dt_seconds()).round()
            ),
        )
    }

    /// Runs however many fixed ticks the elapsed wall time covers.
    pub(crate) fn advance_wall_time<W: Write>(
        &mut self,
        elapsed: Duration,
        out: &mut W,
    ) -> Result<(), AppError> {
        let plan = self.clock.advance(elapsed);
        self.run_ticks(plan.ticks_to_run, out)
    }

    pub(crate) fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow, AppError> {
        let parsed = match self.commands.parse_line(line) {
            Ok(None) => return Ok(Flow::Continue),
            Ok(Some(parsed)) => parsed,
            Err(err) => {
                control(out, &format!("error: {err}"))?;
                return Ok(Flow::Continue);
            }
        };

        match parsed {
            ParsedCommand::Local(LocalAction::Help) => {
                for line in self.commands.help_lines() {
                    control(out, &line)?;
                }
                Ok(Flow::Continue)
            }
            ParsedCommand::World(command) => self.apply(command, out),
        }
    }

    fn apply<W: Write>(&mut self, command: AgentCommand, out: &mut W) -> Result<Flow, AppError> {
        debug!(?command, "agent_command");
        match command {
            AgentCommand::Click { cell } => {
                let reply = match self.world.click(cell) {
                    ClickOutcome::DialogueOpened(view) => {
                        format!("ok: dialogue {} at {}", view.entity_id, view.state_id)
                    }
                    ClickOutcome::Moving {
                        destination,
                        pending,
                    } => match (destination, pending) {
                        (Some(dest), Some(_)) => {
                            format!("ok: moving to {} to interact", fmt_cell(dest))
                        }
                        (Some(dest), None) => format!("ok: moving to {}", fmt_cell(dest)),
                        (None, _) => "ok: already there".to_string(),
                    },
                    ClickOutcome::NoDialogue { entity_id } => {
                        format!("ok: {entity_id} has nothing to say")
                    }
                    ClickOutcome::Unreachable => {
                        format!("error: {} is unreachable", fmt_cell(cell))
                    }
                    ClickOutcome::OutOfBounds => {
                        format!("error: {} is outside the map", fmt_cell(cell))
                    }
                };
                control(out, &reply)?;
                self.emit_perception(out)?;
            }
            AgentCommand::Choose { option_index } => {
                match self.world.choose_option(option_index) {
                    Ok(report) => {
                        let failed = report.actions.iter().filter(|a| !a.success).count();
                        let reply = match &report.view {
                            Some(view) => format!(
                                "ok: {} actions ({failed} failed), now at {}",
                                report.actions.len(),
                                view.state_id
                            ),
                            None => format!(
                                "ok: {} actions ({failed} failed), dialogue closed",
                                report.actions.len()
                            ),
                        };
                        control(out, &reply)?;
                    }
                    Err(err) => control(out, &format!("error: {err}"))?,
                }
                self.emit_perception(out)?;
            }
            AgentCommand::Close => {
                let reply = if self.world.close_dialogue() {
                    "ok: dialogue closed"
                } else {
                    "ok: no dialogue open"
                };
                control(out, reply)?;
                self.emit_perception(out)?;
            }
            AgentCommand::Wait { ticks } => {
                self.run_ticks(ticks, out)?;
                control(out, &format!("ok: waited {ticks} ticks"))?;
                self.emit_perception(out)?;
            }
            AgentCommand::Perceive => self.emit_perception(out)?,
            AgentCommand::Registry => {
                telemetry(out, &registry_document(&self.world.option_context()))?;
            }
            AgentCommand::Exec { action_id, params } => {
                let reply = if self.world.apply_action_raw(&action_id, &params) {
                    format!("ok: {action_id} applied")
                } else {
                    format!("error: {action_id} failed")
                };
                control(out, &reply)?;
                self.emit_perception(out)?;
            }
            AgentCommand::Save { slot } => {
                let document = self.world.save_document();
                match self.store.write(&slot, &document) {
                    Ok(()) => control(out, &format!("ok: saved {slot}"))?,
                    Err(err) => control(out, &format!("error: {err}"))?,
                }
            }
            AgentCommand::Load { slot } => {
                let restored = self
                    .store
                    .read(&slot)
                    .map_err(|err| err.to_string())
                    .and_then(|document| {
                        self.world.restore(document).map_err(|err| err.to_string())
                    });
                match restored {
                    Ok(report) if report.content_matches => {
                        control(out, &format!("ok: loaded {slot}"))?
                    }
                    Ok(_) => control(
                        out,
                        &format!("ok: loaded {slot} (warning: content changed since save)"),
                    )?,
                    Err(err) => control(out, &format!("error: {err}"))?,
                }
                self.emit_perception(out)?;
            }
            AgentCommand::Quit => {
                control(out, "ok: quit")?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn run_ticks<W: Write>(&mut self, ticks: u32, out: &mut W) -> Result<(), AppError> {
        let dt = self.clock.fixed_dt_seconds();
        for _ in 0..ticks {
            let report = self.world.tick(dt);
            emit_tick_events(&report, out)?;
        }
        Ok(())
    }

    /// Messages are drained once they have been reported.
    fn emit_perception<W: Write>(&mut self, out: &mut W) -> Result<(), AppError> {
        telemetry(out, &perceive(&self.world))?;
        self.world.drain_messages();
        Ok(())
    }
}

pub(crate) fn run_session(boot: &Boot, options: RunOptions) -> Result<(), AppError> {
    let bundle = load_content(&boot.paths, &boot.config)?;
    let world = GameWorld::new(bundle, &boot.config);
    let save_dir = options
        .save_dir
        .clone()
        .unwrap_or_else(|| boot.paths.saves_dir.clone());
    let mut session = Session::new(world, &boot.config, FileSaveStore::new(save_dir));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    session.announce(&mut out)?;

    match &options.script {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| AppError::Script {
                path: path.display().to_string(),
                source,
            })?;
            for line in text.lines() {
                if session.handle_line(line, &mut out)? == Flow::Quit {
                    break;
                }
            }
        }
        None => {
            let stdin = io::stdin();
            let mut last = Instant::now();
            for line in stdin.lock().lines() {
                let line = line.map_err(|source| AppError::Io {
                    stream: "stdin",
                    source,
                })?;
                if options.realtime {
                    let now = Instant::now();
                    session.advance_wall_time(now.duration_since(last), &mut out)?;
                    last = now;
                }
                if session.handle_line(&line, &mut out)? == Flow::Quit {
                    break;
                }
            }
        }
    }

    info!(
        ticks = session.world().tick_count(),
        map = %session.world().active_map_id(),
        "session_finished"
    );
    Ok(())
}

fn emit_tick_events<W: Write>(report: &TickReport, out: &mut W) -> Result<(), AppError> {
    if let Some(transition) = &report.transition {
        control(
            out,
            &format!(
                "event: map {} -> {} at {}",
                transition.from_map,
                transition.to_map,
                fmt_cell(transition.to_cell)
            ),
        )?;
    }
    if let Some(view) = &report.dialogue_opened {
        control(
            out,
            &format!("event: dialogue {} at {}", view.entity_id, view.state_id),
        )?;
    }
    Ok(())
}

fn fmt_cell(cell: TileCoord) -> String {
    format!("({}, {})", cell.x, cell.y)
}

fn control<W: Write>(out: &mut W, payload: &str) -> Result<(), AppError> {
    writeln!(out, "{CONTROL_PREFIX}{payload}").map_err(|source| AppError::Io {
        stream: "stdout",
        source,
    })
}

fn telemetry<W: Write, T: Serialize>(out: &mut W, document: &T) -> Result<(), AppError> {
    let payload = serde_json::to_string(document)?;
    writeln!(out, "{TELEMETRY_PREFIX}{payload}").map_err(|source| AppError::Io {
        stream: "stdout",
        source,
    })
}

#[cfg(test)]
mod tests {
    use engine::content::{lower_content, RawContent};
    use engine::persistence::MemorySaveStore;
    use serde_json::{json, Value};

    use super::*;

    fn world() -> (GameWorld, SessionConfig) {
        let mut raw = RawContent::default();
        raw.tiles = Some(serde_json::from_value(json!({ "unwalkable": [1] })).expect("tiles"));
        raw.maps.insert(
            "town".to_string(),
            serde_json::from_value(json!({
                "width": 4,
                "height": 3,
                "tiles": [[0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
                "transitions": [{ "x": 3, "y": 0, "targetMap": "field", "targetX": 0, "targetY": 0 }],
                "entities": [{ "id": "old_man", "x": 3, "y": 2 }]
            }))
            .expect("town"),
        );
        raw.maps.insert(
            "field".to_string(),
            serde_json::from_value(json!({ "width": 2, "height": 2, "tiles": [0, 0, 0, 0] }))
                .expect("field"),
        );
        raw.entities.insert(
            "old_man".to_string(),
            serde_json::from_value(json!({
                "name": "Old Man",
                "dialogue": {
                    "start": { "text": "Hi", "options": [{
                        "text": "Accept",
                        "nextState": "accepted",
                        "actions": [{ "id": "changeQuestState", "params": { "questId": "q1", "newState": "accepted" } }]
                    }] },
                    "accepted": { "text": "Good luck", "options": [] }
                }
            }))
            .expect("script"),
        );
        raw.world = Some(
            serde_json::from_value(json!({
                "activeMap": "town",
                "player": { "position": { "x": 0, "y": 0 } },
                "quests": { "q1": "not_started" }
            }))
            .expect("world"),
        );
        let config = SessionConfig {
            target_tps: 10,
            step_interval_seconds: 0.1,
            ..SessionConfig::default()
        };
        let checked = lower_content(&raw, Vec::new(), &config.terminal_state).expect("lower");
        assert!(checked.report.is_ok(), "{}", checked.report);
        (GameWorld::new(checked.bundle, &config), config)
    }

    fn session() -> Session<MemorySaveStore> {
        let (world, config) = world();
        Session::new(world, &config, MemorySaveStore::default())
    }

    fn run(session: &mut Session<MemorySaveStore>, line: &str) -> Vec<String> {
        let mut out = Vec::new();
        session.handle_line(line, &mut out).expect("handle line");
        String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn last_perception(lines: &[String]) -> Value {
        let payload = lines
            .iter()
            .rev()
            .find_map(|line| line.strip_prefix(TELEMETRY_PREFIX))
            .expect("telemetry line");
        serde_json::from_str(payload).expect("perception json")
    }

    #[test]
    fn announce_reports_map_and_rate() {
        let session = session();
        let mut out = Vec::new();
        session.announce(&mut out).expect("announce");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "C ready v1 map:town tps:10\n"
        );
    }

    #[test]
    fn click_walk_talk_and_accept() {
        let mut session = session();
        let lines = run(&mut session, "click 3 2");
        assert_eq!(lines[0], "C ok: moving to (2, 1) to interact");

        let lines = run(&mut session, "wait 10");
        assert!(lines.contains(&"C event: dialogue old_man at start".to_string()));
        let perception = last_perception(&lines);
        assert_eq!(perception["dialogue"]["text"], "Hi");

        let lines = run(&mut session, "choose 0");
        assert_eq!(lines[0], "C ok: 1 actions (0 failed), now at accepted");
        assert_eq!(session.world().quests().status("q1"), Some("accepted"));
    }

    #[test]
    fn parse_errors_are_reported_without_stopping() {
        let mut session = session();
        let lines = run(&mut session, "click nowhere");
        assert!(lines[0].starts_with("C error: "));
        assert!(run(&mut session, "   ").is_empty());
        let lines = run(&mut session, "choose 0");
        assert_eq!(lines[0], "C error: no dialogue is open");
    }

    #[test]
    fn walking_onto_transition_emits_event() {
        let mut session = session();
        run(&mut session, "click 3 0");
        let lines = run(&mut session, "wait 5");
        assert!(lines.contains(&"C event: map town -> field at (0, 0)".to_string()));
        assert_eq!(session.world().active_map_id(), "field");
    }

    #[test]
    fn save_then_load_restores_state() {
        let mut session = session();
        run(&mut session, "exec addMoney {\"amount\": 25}");
        assert_eq!(run(&mut session, "save slot_a")[0], "C ok: saved slot_a");
        run(&mut session, "exec addMoney {\"amount\": 100}");
        assert_eq!(session.world().player().money, 125);

        let lines = run(&mut session, "load slot_a");
        assert_eq!(lines[0], "C ok: loaded slot_a");
        assert_eq!(session.world().player().money, 25);
        assert!(run(&mut session, "load missing")[0].starts_with("C error: "));
    }

    #[test]
    fn registry_and_quit() {
        let mut session = session();
        let lines = run(&mut session, "registry");
        let payload = lines[0].strip_prefix(TELEMETRY_PREFIX).expect("telemetry");
        let document: Value = serde_json::from_str(payload).expect("json");
        assert!(document.get("changeQuestState").is_some());

        let mut out = Vec::new();
        let flow = session.handle_line("quit", &mut out).expect("quit");
        assert_eq!(flow, Flow::Quit);
    }

    #[test]
    fn wall_time_drives_fixed_ticks() {
        let mut session = session();
        let mut out = Vec::new();
        session
            .advance_wall_time(Duration::from_millis(350), &mut out)
            .expect("advance");
        assert_eq!(session.world().tick_count(), 3);
    }
}
