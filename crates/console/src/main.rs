use std::{error::Error, time::Duration};

use api_types::permission::{Decision, RequestStatus};
use clap::{Parser, Subcommand, ValueEnum};
use console::{ApiClient, ConsoleSettings, Notice, NoticeLevel, PendingOp, Reconciler, View};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "stockroom_console")]
#[command(about = "Follow and operate a stockroom server")]
struct Cli {
    /// Settings file (TOML), read from its `[console]` table.
    #[arg(long)]
    config: Option<String>,
    /// Override base URL (e.g. http://127.0.0.1:3000/).
    #[arg(long)]
    base_url: Option<String>,
    /// Actor id sent as `x-user-id`.
    #[arg(long, env = "STOCKROOM_ACTOR")]
    actor: Option<Uuid>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep a live summary of the inventory on screen.
    Watch,
    /// Sell one unit of a product.
    Sell {
        product_id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List pending permission requests.
    Pending,
    /// Approve or reject a permission request.
    Resolve {
        request_id: Uuid,
        decision: DecisionArg,
        #[arg(long)]
        note: Option<String>,
    },
    /// Withdraw one of your own pending requests.
    Withdraw { request_id: Uuid },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecisionArg {
    Approve,
    Reject,
}

fn summary(view: &View) -> String {
    let low: Vec<_> = view
        .products
        .iter()
        .filter(|product| product.low_stock)
        .map(|product| format!("{} ({})", product.name, product.stock))
        .collect();
    format!(
        "{}{} products, {} pending requests, balance {}{}",
        if view.online { "" } else { "[offline] " },
        view.products.len(),
        view.pending_requests().count(),
        view.balance_minor,
        if low.is_empty() {
            String::new()
        } else {
            format!(", low stock: {}", low.join(", "))
        }
    )
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => println!("{}", notice.message),
        NoticeLevel::Error => eprintln!("{}", notice.message),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let mut settings = ConsoleSettings::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!("console={level}", level = settings.level))
        .init();

    let Some(actor) = cli.actor.or(settings.actor_id) else {
        eprintln!("no actor id: pass --actor or set console.actor_id");
        std::process::exit(2);
    };
    let client = ApiClient::new(&settings.base_url, actor)?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let (feed, _feed_task) = console::spawn_event_feed(
                client.clone(),
                Duration::from_millis(settings.reconnect_delay_ms),
            );
            let (views, mut latest) = watch::channel(View::default());
            let (notices, mut notice_rx) = mpsc::unbounded_channel();
            let reconciler = Reconciler::new(client);
            let refresh_every = Duration::from_secs(settings.refresh_interval_secs.max(1));
            tokio::spawn(reconciler.run(feed, refresh_every, views, notices));

            loop {
                tokio::select! {
                    changed = latest.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let line = summary(&latest.borrow_and_update());
                        println!("{line}");
                    }
                    Some(notice) = notice_rx.recv() => print_notice(&notice),
                }
            }
        }
        Command::Sell { product_id, reason } => {
            let mut reconciler = Reconciler::new(client.clone());
            reconciler.refresh().await;
            reconciler
                .perform(
                    PendingOp::AdjustStock {
                        product_id,
                        delta: -1,
                    },
                    client.quick_sell(product_id, reason),
                )
                .await;

            let notices = reconciler.take_notices();
            notices.iter().for_each(print_notice);
            if notices.iter().any(|notice| notice.level == NoticeLevel::Error) {
                std::process::exit(1);
            }
            println!("{}", summary(&reconciler.view()));
        }
        Command::Pending => {
            for request in client
                .permission_requests(Some(RequestStatus::Pending))
                .await?
            {
                let payload = serde_json::to_string(&request.mutation)?;
                println!(
                    "{} by {} at {}: {payload}",
                    request.id, request.requester_id, request.created_at
                );
            }
        }
        Command::Resolve {
            request_id,
            decision,
            note,
        } => {
            let decision = match decision {
                DecisionArg::Approve => Decision::Approved,
                DecisionArg::Reject => Decision::Rejected,
            };
            let request = client.resolve(request_id, decision, note).await?;
            println!("request {} is now {:?}", request.id, request.status);
        }
        Command::Withdraw { request_id } => {
            let request = client.withdraw(request_id, None).await?;
            println!("request {} is now {:?}", request.id, request.status);
        }
    }

    Ok(())
}
