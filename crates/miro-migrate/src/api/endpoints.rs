//! API endpoint URL builders
//!
//! Path segments that come from data (space names, external identifiers,
//! image ids) are percent-encoded.

use urlencoding::encode;

/// Storage service: ingests for a bag, most recent first
pub fn find_ingests_url(api_url: &str, space: &str, external_identifier: &str) -> String {
    format!(
        "{}/ingests/find_by_bag_id/{}:{}",
        api_url,
        encode(space),
        encode(external_identifier)
    )
}

/// Storage service: latest version of a bag
pub fn bag_url(api_url: &str, space: &str, external_identifier: &str) -> String {
    format!("{}/bags/{}/{}", api_url, encode(space), encode(external_identifier))
}

/// DLCS: queue a batch of images
pub fn queue_url(api_url: &str, customer_id: u32) -> String {
    format!("{}/customers/{}/queue", api_url, customer_id)
}

/// DLCS: a batch, given either the `@id` returned on submission or a bare id
pub fn batch_url(api_url: &str, customer_id: u32, batch_id: &str) -> String {
    if batch_id.starts_with("http://") || batch_id.starts_with("https://") {
        batch_id.to_string()
    } else {
        format!("{}/customers/{}/queue/batches/{}", api_url, customer_id, encode(batch_id))
    }
}

/// DLCS: a single image
pub fn image_url(api_url: &str, customer_id: u32, space_id: u32, image_id: &str) -> String {
    format!(
        "{}/customers/{}/spaces/{}/images/{}",
        api_url,
        customer_id,
        space_id,
        encode(image_id)
    )
}
