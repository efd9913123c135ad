use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::models::{Order, OrderRequest};
use crate::store::{collections, format_timestamp, from_document, DocumentStore, Page, PageRequest};

#[derive(Subcommand)]
pub enum RecordCommands {
    #[command(about = "List one page of records ordered by document id")]
    List {
        #[arg(long, help = "Page size (clamped to LIST_MAX_PAGE_SIZE)")]
        limit: Option<usize>,

        #[arg(long, help = "Resume after this document id")]
        cursor: Option<String>,
    },
}

async fn fetch_page(
    cmd: RecordCommands,
    collection: &str,
    store: &dyn DocumentStore,
    config: &AppConfig,
) -> anyhow::Result<Page> {
    let RecordCommands::List { limit, cursor } = cmd;
    let page = store
        .list(
            collection,
            &PageRequest {
                cursor,
                limit: config.page_size(limit),
            },
        )
        .await?;
    Ok(page)
}

fn next_page_hint(next_cursor: Option<&str>) -> String {
    next_cursor
        .map(|cursor| format!("\n(more: --cursor {})", cursor))
        .unwrap_or_default()
}

pub async fn handle_requests(
    cmd: RecordCommands,
    store: &dyn DocumentStore,
    config: &AppConfig,
    output_format: OutputFormat,
) -> anyhow::Result<String> {
    let page = fetch_page(cmd, collections::ORDER_REQUESTS, store, config).await?;
    if page.is_empty() {
        return render_empty_collection(output_format, "requests", "No pending order requests");
    }

    let next_cursor = page.next_cursor.clone();
    let requests = page
        .documents
        .into_iter()
        .map(from_document)
        .collect::<Result<Vec<OrderRequest>, _>>()?;

    match output_format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "requests": requests,
            "next_cursor": next_cursor,
        }))?),
        OutputFormat::Text => {
            let mut out = format!("{:<32} {:<28} {:<6} {:<26} {}\n", "DOC ID", "EMAIL", "DAYS", "REQUESTED", "SYMPTOMS");
            out.push_str(&"-".repeat(110));
            for request in &requests {
                out.push_str(&format!(
                    "\n{:<32} {:<28} {:<6} {:<26} {}",
                    truncate(&request.doc_id, 32),
                    truncate(&request.email, 28),
                    request.symptom_days,
                    request.requested_at.map(format_timestamp).unwrap_or_default(),
                    truncate(&request.symptoms, 40),
                ));
            }
            out.push_str(&next_page_hint(next_cursor.as_deref()));
            Ok(out)
        }
    }
}

pub async fn handle_orders(
    cmd: RecordCommands,
    store: &dyn DocumentStore,
    config: &AppConfig,
    output_format: OutputFormat,
) -> anyhow::Result<String> {
    let page = fetch_page(cmd, collections::ORDERS, store, config).await?;
    if page.is_empty() {
        return render_empty_collection(output_format, "orders", "No orders");
    }

    let next_cursor = page.next_cursor.clone();
    let orders = page
        .documents
        .into_iter()
        .map(from_document)
        .collect::<Result<Vec<Order>, _>>()?;

    match output_format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "orders": orders,
            "next_cursor": next_cursor,
        }))?),
        OutputFormat::Text => {
            let mut out = format!("{:<32} {:<28} {:<28} {}\n", "DOC ID", "PATIENT EMAIL", "PRESCRIBED BY", "DELIVER TO");
            out.push_str(&"-".repeat(110));
            for order in &orders {
                out.push_str(&format!(
                    "\n{:<32} {:<28} {:<28} {}",
                    truncate(order.doc_id(), 32),
                    truncate(&order.request.email, 28),
                    truncate(&order.prescribed_by_email, 28),
                    truncate(&order.request.deliver_to, 40),
                ));
            }
            out.push_str(&next_page_hint(next_cursor.as_deref()));
            Ok(out)
        }
    }
}
