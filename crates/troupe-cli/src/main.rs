use std::env;
use std::net::SocketAddr;
use std::time::Instant;

use contracts::{ChatMessage, ChatMode, TurnRequest, USER_SPEAKER};
use rayon::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use troupe_api::{policy_from_env, roster_from_env, serve};
use troupe_core::{orchestrate_turn, orchestrate_with_trace, Roster, ScriptedVoice};

const DEMO_CONTENT: &str =
    "okay huge update, my attempt to fix my sleep schedule has failed spectacularly \
     and I need new ideas";

fn print_usage() {
    println!("troupe-cli <command>");
    println!("commands:");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  plan <seed> [content]");
    println!("    plans one deterministic turn and prints the envelope with its trace");
    println!("  roster");
    println!("  sweep <turns> [content]");
    println!("    plans <turns> seeded turns in parallel and prints aggregate stats");
    println!("env:");
    println!("  TROUPE_LOG           tracing filter (default: info)");
    println!("  TROUPE_ROSTER_PATH   roster JSON file override");
    println!("  TROUPE_POLICY_PATH   selection policy JSON file override");
}

fn init_tracing() {
    let filter = env::var("TROUPE_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {}: {}", label, raw))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn demo_request(content: &str, roster: &Roster, seed: u64) -> TurnRequest {
    TurnRequest {
        messages: vec![ChatMessage {
            id: "m1".to_string(),
            speaker: USER_SPEAKER.to_string(),
            content: content.to_string(),
            created_at: 1_700_000_000_000,
            client_message_id: Some("c1".to_string()),
            reply_to_client_message_id: None,
            reaction: None,
        }],
        active_gang_ids: roster
            .characters()
            .iter()
            .map(|character| character.id.clone())
            .collect(),
        user_name: "You".to_string(),
        user_nickname: None,
        silent_turns: 0,
        burst_count: 0,
        chat_mode: ChatMode::Ecosystem,
        seed: Some(seed),
    }
}

fn run_plan(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.get(2), "seed")?;
    let content = args.get(3).map(String::as_str).unwrap_or(DEMO_CONTENT);

    let roster = roster_from_env().map_err(|err| err.to_string())?;
    let policy = policy_from_env().map_err(|err| err.to_string())?;
    let request = demo_request(content, &roster, seed);

    let (envelope, trace) =
        orchestrate_with_trace(&request, &roster, &policy, &ScriptedVoice, seed);
    let output = serde_json::json!({
        "envelope": envelope,
        "trace": trace,
    });
    let rendered = serde_json::to_string_pretty(&output).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn run_roster() -> Result<(), String> {
    let roster = roster_from_env().map_err(|err| err.to_string())?;
    let rendered =
        serde_json::to_string_pretty(roster.characters()).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct SweepStats {
    turns: u64,
    events: u64,
    responders: u64,
    max_responders: u64,
    message_turns: u64,
}

impl SweepStats {
    fn merge(self, other: Self) -> Self {
        Self {
            turns: self.turns + other.turns,
            events: self.events + other.events,
            responders: self.responders + other.responders,
            max_responders: self.max_responders.max(other.max_responders),
            message_turns: self.message_turns + other.message_turns,
        }
    }
}

fn run_sweep(args: &[String]) -> Result<(), String> {
    let turns = parse_u64(args.get(2), "turns")?;
    if turns == 0 {
        return Err("turns must be >= 1".to_string());
    }
    let content = args.get(3).map(String::as_str).unwrap_or(DEMO_CONTENT);

    let roster = roster_from_env().map_err(|err| err.to_string())?;
    let policy = policy_from_env().map_err(|err| err.to_string())?;
    let template = demo_request(content, &roster, 0);

    let started = Instant::now();
    let stats = (0..turns)
        .into_par_iter()
        .map(|seed| {
            let mut request = template.clone();
            request.seed = Some(seed);
            let envelope = orchestrate_turn(&request, &roster, &policy, &ScriptedVoice, seed);
            let spoke = envelope
                .events
                .iter()
                .any(|event| event.kind() == "message");
            SweepStats {
                turns: 1,
                events: envelope.events.len() as u64,
                responders: envelope.responders.len() as u64,
                max_responders: envelope.responders.len() as u64,
                message_turns: u64::from(spoke),
            }
        })
        .reduce(SweepStats::default, SweepStats::merge);

    let elapsed_ms = started.elapsed().as_millis().max(1);
    let turns_per_sec = stats.turns as u128 * 1_000 / elapsed_ms;
    println!(
        "swept turns={} events={} responders={} max_responders={} message_turns={} \
         elapsed_ms={} turns_per_sec={}",
        stats.turns,
        stats.events,
        stats.responders,
        stats.max_responders,
        stats.message_turns,
        elapsed_ms,
        turns_per_sec
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                println!("serving chat orchestrator on http://{addr}");
                if let Err(err) = serve(addr).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("plan") => {
            if let Err(err) = run_plan(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("roster") => {
            if let Err(err) = run_roster() {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        }
        Some("sweep") => {
            if let Err(err) = run_sweep(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
