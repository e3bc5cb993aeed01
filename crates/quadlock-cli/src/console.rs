//! Line-based operator console.
//!
//! Each stdin line is parsed into a [`Command`]. Keypad keys and sensor
//! stimuli are routed to the simulated devices, so they take the same path
//! through the orchestrator as real hardware would. Admin commands run
//! against the current [`AdminSession`] in the background, leaving the
//! console free to feed the sensors they wait on.

use anyhow::{Context, Result, bail};
use quadlock_controller::{AdminSession, OrchestratorHandle, SimulatedHandles, StatusEvent};
use quadlock_core::{CardUid, FingerprintSlot};
use quadlock_hardware::KeypadInput;
use quadlock_hardware::sim::FaceScene;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// How long `scan-card` waits for a card.
const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

pub const HELP: &str = "\
keys <seq>          keypad: 0-9 digits, * admin, # start, e enter, c clear, x cancel
face <name>         show a person to the camera (stranger | none | fault <msg>)
finger <name>       place a finger on the sensor
card <uid>          present a card, hex bytes like e5a8bd02
passcode <code>     submit the unlock passcode
admin               admin hotkey
password <code>     submit the admin password
start | cancel      restart authentication | cancel the open prompt
status              show the current step
admin commands:     list, set-passcode <code>, add-card <uid>, scan-card,
                    remove-card <uid>, enroll-finger, remove-finger <slot>,
                    enroll-face <name>, exit-admin
quit                lock the door and stop";

/// One console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Keys(Vec<KeypadInput>),
    Face(FaceScene),
    Finger(String),
    Card(CardUid),
    Passcode(String),
    AdminHotkey,
    AdminPassword(String),
    Start,
    Cancel,
    Status,
    Admin(AdminCommand),
    Help,
    Quit,
}

/// Operation run inside the admin session.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    List,
    SetPasscode(String),
    AddCard(CardUid),
    ScanCard,
    RemoveCard(CardUid),
    EnrollFinger,
    RemoveFinger(FingerprintSlot),
    EnrollFace(String),
    Exit,
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(None),
        "keys" => Command::Keys(parse_keys(rest)?),
        "face" => Command::Face(parse_scene(rest)?),
        "finger" => Command::Finger(required(rest, "finger name")?.to_string()),
        "card" => Command::Card(required(rest, "card UID")?.parse()?),
        "passcode" => Command::Passcode(required(rest, "passcode")?.to_string()),
        "admin" => Command::AdminHotkey,
        "password" => Command::AdminPassword(required(rest, "password")?.to_string()),
        "start" => Command::Start,
        "cancel" => Command::Cancel,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "list" => Command::Admin(AdminCommand::List),
        "set-passcode" => Command::Admin(AdminCommand::SetPasscode(
            required(rest, "passcode")?.to_string(),
        )),
        "add-card" => Command::Admin(AdminCommand::AddCard(required(rest, "card UID")?.parse()?)),
        "scan-card" => Command::Admin(AdminCommand::ScanCard),
        "remove-card" => {
            Command::Admin(AdminCommand::RemoveCard(required(rest, "card UID")?.parse()?))
        }
        "enroll-finger" => Command::Admin(AdminCommand::EnrollFinger),
        "remove-finger" => {
            let slot: u16 = required(rest, "slot")?
                .trim_start_matches('#')
                .parse()
                .context("slot must be a number")?;
            Command::Admin(AdminCommand::RemoveFinger(FingerprintSlot::new(slot)))
        }
        "enroll-face" => Command::Admin(AdminCommand::EnrollFace(
            required(rest, "name")?.to_string(),
        )),
        "exit-admin" => Command::Admin(AdminCommand::Exit),
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.is_empty() {
        bail!("missing {what}");
    }
    Ok(value)
}

fn parse_keys(sequence: &str) -> Result<Vec<KeypadInput>> {
    required(sequence, "key sequence")?
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '0'..='9' => Ok(KeypadInput::Digit(c as u8 - b'0')),
            '*' => Ok(KeypadInput::Star),
            '#' => Ok(KeypadInput::Hash),
            'e' | 'E' => Ok(KeypadInput::Enter),
            'c' | 'C' => Ok(KeypadInput::Clear),
            'x' | 'X' => Ok(KeypadInput::Cancel),
            other => bail!("unknown key '{other}'"),
        })
        .collect()
}

fn parse_scene(arg: &str) -> Result<FaceScene> {
    let (word, rest) = match arg.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (arg, ""),
    };
    Ok(match word {
        "none" | "" => FaceScene::Empty,
        "stranger" => FaceScene::Stranger,
        "fault" => FaceScene::Fault(if rest.is_empty() {
            "camera read failed".to_string()
        } else {
            rest.to_string()
        }),
        name => FaceScene::person(name),
    })
}

/// Reads commands from stdin until `quit` or end of input.
pub struct Console {
    controller: OrchestratorHandle,
    sim: SimulatedHandles,
}

impl Console {
    pub fn new(controller: OrchestratorHandle, sim: SimulatedHandles) -> Self {
        Self { controller, sim }
    }

    pub async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");

        while let Some(line) = lines.next_line().await? {
            let command = match parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("! {e}");
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.execute(command).await {
                println!("! {e}");
            }
        }

        info!("Console closed");
        Ok(())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Keys(keys) => {
                for key in keys {
                    self.sim.keypad.send_input(key).await?;
                }
            }
            Command::Face(scene) => self.sim.face.show(scene),
            Command::Finger(name) => self.sim.fingerprint.place_finger(name).await?,
            Command::Card(uid) => self.sim.card.present_card(uid).await?,
            Command::Passcode(code) => self.controller.submit_passcode(&code).await?,
            Command::AdminHotkey => self.controller.force_admin_mode().await?,
            Command::AdminPassword(code) => self.controller.submit_admin_password(&code).await?,
            Command::Start => self.controller.start_authentication().await?,
            Command::Cancel => self.controller.cancel_prompt().await?,
            Command::Status => {
                let snapshot = self.controller.snapshot();
                println!(
                    "step {} (epoch {}), door {}, attempts fp {} card {} code {}",
                    snapshot.step,
                    snapshot.epoch,
                    snapshot.door,
                    snapshot.attempts.fingerprint,
                    snapshot.attempts.card,
                    snapshot.attempts.passcode,
                );
            }
            Command::Admin(command) => {
                let session = self.controller.admin_session()?;
                tokio::spawn(async move {
                    if let Err(e) = run_admin(session, command).await {
                        println!("! {e}");
                    }
                });
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }
}

async fn run_admin(session: AdminSession, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::List => {
            let summary = session.credentials().await?;
            let cards: Vec<String> = summary.cards.iter().map(ToString::to_string).collect();
            let fingers: Vec<String> = summary
                .fingerprints
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("cards: {}", cards.join(", "));
            println!("fingerprints: {}", fingers.join(", "));
            println!("passcode: {} digits", summary.passcode_length);
        }
        AdminCommand::SetPasscode(code) => {
            session.change_passcode(&code).await?;
            println!("passcode changed");
        }
        AdminCommand::AddCard(uid) => {
            session.add_card(uid.clone()).await?;
            println!("card {uid} added");
        }
        AdminCommand::ScanCard => {
            println!("present the card within {}s", SCAN_TIMEOUT.as_secs());
            let uid = session.scan_and_add_card(SCAN_TIMEOUT).await?;
            println!("card {uid} added");
        }
        AdminCommand::RemoveCard(uid) => {
            session.remove_card(&uid).await?;
            println!("card {uid} removed");
        }
        AdminCommand::EnrollFinger => {
            println!("place the finger, then place it again");
            let slot = session.enroll_fingerprint().await?;
            println!("fingerprint stored in slot {slot}");
        }
        AdminCommand::RemoveFinger(slot) => {
            session.remove_fingerprint(slot).await?;
            println!("fingerprint {slot} removed");
        }
        AdminCommand::EnrollFace(name) => {
            println!("look at the camera");
            session.enroll_face(&name).await?;
            println!("{name} enrolled");
        }
        AdminCommand::Exit => session.exit().await?,
    }
    Ok(())
}

/// Print status events until the orchestrator stops.
pub async fn render_events(controller: OrchestratorHandle) {
    let mut events = controller.subscribe();
    loop {
        match events.recv().await {
            Ok(StatusEvent::FaceFrame(_)) => {}
            Ok(StatusEvent::Stopped) => {
                println!("* stopped");
                break;
            }
            Ok(event) => println!("* {}", describe(&event)),
            Err(RecvError::Lagged(missed)) => warn!(missed, "Console fell behind on events"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(event: &StatusEvent) -> String {
    use quadlock_controller::Prompt;

    match event {
        StatusEvent::Ready {
            cards,
            fingerprints,
        } => format!("ready: {cards} cards, {fingerprints} fingerprints"),
        StatusEvent::StepChanged { to, epoch, .. } => format!("step {to} (epoch {epoch})"),
        StatusEvent::FaceProgress {
            consecutive,
            required,
        } => format!("face {consecutive}/{required}"),
        StatusEvent::FactorPassed(step) => format!("{step} passed"),
        StatusEvent::AttemptFailed {
            step, remaining, ..
        } => format!("{step} failed, {remaining} attempts left"),
        StatusEvent::PromptOpened(Prompt::Passcode { attempts_left }) => {
            format!("enter passcode ({attempts_left} attempts left)")
        }
        StatusEvent::PromptOpened(Prompt::AdminPassword) => "enter admin password".to_string(),
        StatusEvent::EntryChanged { digits } => "*".repeat(*digits),
        StatusEvent::SensorFault { step, message, .. } => format!("{step} sensor: {message}"),
        StatusEvent::SensorAlert { step, consecutive } => {
            format!("ALERT: {consecutive} sensor faults in a row on {step}, check the hardware")
        }
        StatusEvent::CountdownTick { remaining_secs } => format!("relock in {remaining_secs}s"),
        StatusEvent::DoorChanged(door) => format!("door {door}"),
        StatusEvent::Feedback(cue) => format!("({cue})"),
        StatusEvent::AdminSessionOpened => "admin session open".to_string(),
        StatusEvent::AdminSessionClosed => "admin session closed".to_string(),
        StatusEvent::Rejected { message } => format!("rejected: {message}"),
        StatusEvent::FaceFrame(frame) => format!("frame {}", frame.sequence),
        StatusEvent::Stopped => "stopped".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", Command::Start)]
    #[case("  admin  ", Command::AdminHotkey)]
    #[case("passcode 1234", Command::Passcode("1234".to_string()))]
    #[case("finger alice-thumb", Command::Finger("alice-thumb".to_string()))]
    #[case("face none", Command::Face(FaceScene::Empty))]
    #[case("face stranger", Command::Face(FaceScene::Stranger))]
    #[case("face alice", Command::Face(FaceScene::person("alice")))]
    #[case("scan-card", Command::Admin(AdminCommand::ScanCard))]
    #[case(
        "remove-finger #3",
        Command::Admin(AdminCommand::RemoveFinger(FingerprintSlot::new(3)))
    )]
    #[case("quit", Command::Quit)]
    fn test_parse_commands(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse(line).unwrap(), Some(expected));
    }

    #[test]
    fn test_parse_keys() {
        let command = parse("keys 12 e*#cx").unwrap();
        assert_eq!(
            command,
            Some(Command::Keys(vec![
                KeypadInput::Digit(1),
                KeypadInput::Digit(2),
                KeypadInput::Enter,
                KeypadInput::Star,
                KeypadInput::Hash,
                KeypadInput::Clear,
                KeypadInput::Cancel,
            ]))
        );
    }

    #[test]
    fn test_parse_card_uid() {
        let command = parse("card e5:a8:bd:02").unwrap();
        assert_eq!(
            command,
            Some(Command::Card(CardUid::from([0xe5, 0xa8, 0xbd, 0x02])))
        );
    }

    #[test]
    fn test_parse_fault_scene_keeps_message() {
        let command = parse("face fault lens covered").unwrap();
        assert_eq!(
            command,
            Some(Command::Face(FaceScene::Fault("lens covered".to_string())))
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_blank_lines_are_skipped(#[case] line: &str) {
        assert!(parse(line).unwrap().is_none());
    }

    #[rstest]
    #[case("open-sesame")]
    #[case("passcode")]
    #[case("keys 12q")]
    #[case("card zz")]
    #[case("remove-finger thumb")]
    fn test_rejects_bad_input(#[case] line: &str) {
        assert!(parse(line).is_err());
    }

    #[test]
    fn test_describe_hides_entered_digits() {
        assert_eq!(describe(&StatusEvent::EntryChanged { digits: 3 }), "***");
    }
}
