use super::records;
use crate::models::ContentItem;
use crate::record::list_at;
use serde_json::Value;
use tracing::debug;

pub(super) fn parse(raw: &Value) -> Vec<ContentItem> {
    let Some(list) = list_at(raw, &["data"]) else {
        debug!("No coin list in crypto response");
        return Vec::new();
    };

    records(list, "crypto")
        .filter_map(|r| {
            let (Some(name), Some(symbol)) = (r.get_opt(&["name"]), r.get_opt(&["symbol"])) else {
                debug!("Skipped coin: missing name or symbol");
                return None;
            };
            let price = r.get_string(&["price_usd", "price"], "N/A");
            Some(ContentItem {
                title: format!("{name} ({})", symbol.to_uppercase()),
                content: format!("Current price: ${price}"),
                url: r.get_string(&["website", "url"], ""),
                image: r.get_opt(&["icon", "image"]),
                category: "Crypto".to_string(),
                provider: "coinapi".to_string(),
                post_type: "post".to_string(),
                published_at: None,
            })
        })
        .collect()
}
