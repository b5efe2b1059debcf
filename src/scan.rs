use aws_sdk_dynamodb::Client;
use futures::{future::BoxFuture, FutureExt};
use tracing::{info, warn, Instrument};

use crate::errors::Result;
use crate::record::{decode_items, Item, Record};
use crate::session::Session;

pub const TRANSACTION_NAME: &str = "dynamoScan";

/// Items returned by a single scan request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// The table has more items than this page holds.
    pub truncated: bool,
}

/// Something that can scan a whole table in one request.
pub trait TableScanner {
    fn scan_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<ScanPage>>;
}

impl TableScanner for Client {
    fn scan_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<ScanPage>> {
        async move {
            let output = self.scan().table_name(table).send().await?;
            let truncated = output.last_evaluated_key().is_some();

            Ok(ScanPage {
                items: output.items.unwrap_or_default(),
                truncated,
            })
        }
        .boxed()
    }
}

/// Runs the scan inside a `dynamoScan` transaction, decodes the page and logs
/// every record in response order.
///
/// The transaction is ended as soon as the scan call returns, whether or not
/// it succeeded. Nothing is logged unless the whole page decodes.
pub async fn scan_and_log<S>(scanner: &S, session: &Session, table: &str) -> Result<Vec<Record>>
where
    S: TableScanner + ?Sized,
{
    let txn = session.start_transaction(TRANSACTION_NAME);
    txn.add_attribute("table", table.to_owned());

    let page = scanner
        .scan_table(table)
        .instrument(txn.span().clone())
        .await;
    txn.end();
    let page = page?;

    if page.truncated {
        warn!(
            table,
            items = page.items.len(),
            "scan returned a continuation key, only the first page is decoded"
        );
    }

    let records = decode_items(&page.items)?;
    for record in &records {
        info!(id = %record.id, urls = ?record.urls, "Record");
    }

    Ok(records)
}
