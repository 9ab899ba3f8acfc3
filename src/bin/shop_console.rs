//! Text console for a shopping session.
//!
//! Every stdin line is a user turn. Lines of the form `@sender: message`
//! are delivered as mentions from an external agent instead.
//!
//! Environment: `LLM_PROVIDER`, `LLM_MODEL`, `API_KEY`, `RUST_LOG`.

use std::sync::Arc;

use shopping_agents::config::VoiceTable;
use shopping_agents::{
    AgentKind, ChannelBridge, Mention, MentionBridge, MentionListener, OpenAIProvider, Session,
    ShopConfig, Turn, TurnOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_outcome(outcome: &TurnOutcome, voices: &VoiceTable) {
    for t in &outcome.transitions {
        let voice = AgentKind::from_name(&t.to).map(|kind| voices.voice_for(kind));
        println!("--- {} (voice {}) ---", t.to, voice.unwrap_or("default"));
    }
    for reply in &outcome.replies {
        println!("[{}] {}", reply.agent, reply.text);
    }
}

fn parse_mention(line: &str) -> Option<Mention> {
    let rest = line.strip_prefix('@')?;
    let (sender, content) = rest.split_once(':')?;
    Some(Mention::new(sender.trim(), content.trim()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = ShopConfig::from_env();
    if let Some(url) = config.mentions_url() {
        info!(%url, "external coordination endpoint");
    }

    let (bridge, mentions) = ChannelBridge::new();
    let bridge: Arc<dyn MentionBridge> = Arc::new(bridge);
    let provider = OpenAIProvider::from_config(&config);
    info!(model = %provider.model(), "using model");

    let mut session = Session::from_config(&config, provider, bridge.clone());
    print_outcome(&session.start("greeter").await?, &config.voices);

    let (turn_tx, turn_rx) = mpsc::channel::<Turn>(16);
    let (out_tx, mut out_rx) = mpsc::channel(16);
    let listener = MentionListener::spawn(bridge, turn_tx.clone());
    let runner = tokio::spawn(session.run(turn_rx, out_tx));

    let voices = config.voices.clone();
    let printer = tokio::spawn(async move {
        while let Some(result) = out_rx.recv().await {
            match result {
                Ok(outcome) => print_outcome(&outcome, &voices),
                Err(e) => eprintln!("error: {e}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(mention) = parse_mention(line) {
            mentions.send(mention).await?;
        } else if turn_tx.send(Turn::User(line.to_string())).await.is_err() {
            break;
        }
    }

    listener.shutdown().await;
    drop(mentions);
    drop(turn_tx);
    let session = runner.await?;
    printer.await?;

    let state = session.state();
    info!(checked_out = state.checked_out, cart = ?state.cart, "session finished");
    Ok(())
}
