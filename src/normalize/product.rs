use super::news::clean_content;
use super::records;
use crate::models::ContentItem;
use crate::record::list_at;
use serde_json::Value;
use tracing::debug;

pub(super) fn parse(raw: &Value) -> Vec<ContentItem> {
    let Some(list) = list_at(raw, &["items", "products"]) else {
        debug!("No item list in product response");
        return Vec::new();
    };

    records(list, "product")
        .filter_map(|r| {
            let Some(name) = r.get_opt(&["name"]) else {
                debug!("Skipped product: missing name");
                return None;
            };
            Some(ContentItem {
                title: name,
                content: clean_content(&r.get_string(&["description", "content"], "")),
                url: r.get_string(&["affiliate_link", "url", "link"], ""),
                image: r.get_opt(&["image", "urlToImage", "thumbnail"]),
                category: r.get_string(&["category"], "Products"),
                provider: "productapi".to_string(),
                post_type: "product".to_string(),
                published_at: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requires_name_and_prefers_affiliate_link() {
        let raw = json!({"products": [
            {"name": "Kettle", "affiliate_link": "https://aff.io/k", "url": "https://shop.io/k",
             "description": "Boils  water", "thumbnail": "https://shop.io/k.jpg"},
            {"name": "", "url": "https://shop.io/blank"},
            {"title": "Not a product name"}
        ]});
        let items = parse(&raw);
        assert_eq!(items.len(), 1);
        let k = &items[0];
        assert_eq!(k.url, "https://aff.io/k");
        assert_eq!(k.content, "Boils water");
        assert_eq!(k.image.as_deref(), Some("https://shop.io/k.jpg"));
        assert_eq!(k.category, "Products");
        assert_eq!(k.post_type, "product");
    }

    #[test]
    fn test_image_fallback_order() {
        let raw = json!([
            {"name": "A", "image": "i", "urlToImage": "u", "thumbnail": "t"},
            {"name": "B", "urlToImage": "u", "thumbnail": "t"},
            {"name": "C"}
        ]);
        let images: Vec<_> = parse(&raw).into_iter().map(|i| i.image).collect();
        assert_eq!(images, [Some("i".to_string()), Some("u".to_string()), None]);
    }
}
