mod render;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ism_client::{
    list_view::REFRESH_DEBOUNCE, HttpPolicyService, ListViewController, Navigator, Notifier,
};
use ism_shared::domain::{SortDirection, SortField};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse and manage index state management policies")]
struct Cli {
    #[arg(long, env = "ISM_SERVER_URL", default_value = "http://127.0.0.1:5601")]
    server_url: String,
    /// Location query string the table opens with, e.g. `search=hot&from=20`.
    #[arg(long, default_value = "")]
    query: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the page described by `--query`.
    List,
    Search {
        term: String,
    },
    /// Jump to a zero-based page.
    Page {
        page: u64,
    },
    Sort {
        #[arg(value_parser = parse_sort_field)]
        field: SortField,
        #[arg(long)]
        desc: bool,
    },
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Show {
        id: String,
    },
    Edit {
        id: String,
    },
    Create,
}

fn parse_sort_field(raw: &str) -> Result<SortField, String> {
    SortField::from_param(raw)
        .ok_or_else(|| format!("unknown sort field '{raw}' (id, description, lastUpdatedTime)"))
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn add_success(&self, message: &str) {
        info!(message, "notification");
        println!("ok: {message}");
    }

    fn add_danger(&self, message: &str) {
        warn!(message, "notification");
        eprintln!("error: {message}");
    }
}

struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn push(&self, path: &str) {
        println!("navigate: {path}");
    }

    fn replace_search(&self, search: &str) {
        info!(search, "location updated");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let service = Arc::new(
        HttpPolicyService::new(&cli.server_url)
            .with_context(|| format!("connecting to {}", cli.server_url))?,
    );

    if let Command::Show { id } = &cli.command {
        let item = service
            .get_policy(id)
            .await
            .map_err(|err| anyhow!("fetching policy {id}: {err}"))?;
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    let controller = ListViewController::new(
        service,
        Arc::new(ConsoleNotifier),
        Arc::new(ConsoleNavigator),
        &cli.query,
    );
    controller.mount().await;

    match cli.command {
        Command::List | Command::Show { .. } => {}
        Command::Search { term } => controller.on_search_change(&term).await,
        Command::Page { page } => controller.on_page_click(page).await,
        Command::Sort { field, desc } => {
            let query = controller.query().await;
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            controller
                .on_table_change(query.page_index(), query.page_size, field, direction)
                .await;
        }
        Command::Delete { ids } => controller.bulk_delete(&ids).await,
        Command::Edit { id } => {
            let view = controller.view().await;
            match view.items.into_iter().find(|item| item.id == id) {
                Some(item) => controller.on_click_modal_edit(&item),
                None => return Err(anyhow!("policy {id} is not on the current page")),
            }
            return Ok(());
        }
        Command::Create => {
            controller.on_click_create();
            return Ok(());
        }
    }

    settle(&controller).await;
    let view = controller.view().await;
    println!("{}", render::render_table(&view, &chrono::Local));
    println!("location: ?{}", view.query.to_query_string());
    Ok(())
}

/// Waits out the refresh window so a trailing fetch lands before rendering.
async fn settle(controller: &ListViewController) {
    tokio::time::sleep(REFRESH_DEBOUNCE + Duration::from_millis(50)).await;
    while controller.view().await.loading {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
